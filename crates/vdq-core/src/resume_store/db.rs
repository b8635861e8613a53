//! SQLite-backed key-value store implementation.
//!
//! A single `kv` table keyed by (namespace, key) with JSON values. The
//! resume-record layer on top lives in `records`.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the SQLite-backed key-value store.
///
/// The database file is stored under the XDG state directory:
/// `~/.local/state/vdq/resume.db`.
#[derive(Clone)]
pub struct KvDb {
    pub(crate) pool: Pool<Sqlite>,
}

impl KvDb {
    /// Open (or create) the default store and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("vdq")?;
        let state_dir = xdg_dirs.get_state_home();
        let db_path = state_dir.join("resume.db");

        // Ensure parent directory exists.
        tokio::fs::create_dir_all(&state_dir).await?;

        let uri = path_to_sqlite_uri(&db_path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;

        let db = KvDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Open (or create) the store at a specific path. Creates parent dirs if needed.
    /// Intended for tests so the DB can be placed in a temp directory.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;
        let db = KvDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert or replace one value.
    pub async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO kv (namespace, key, value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(namespace)
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            r#"
            SELECT value FROM kv
            WHERE namespace = ?1 AND key = ?2
            "#,
        )
        .bind(namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get("value")))
    }

    pub async fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM kv
            WHERE namespace = ?1 AND key = ?2
            "#,
        )
        .bind(namespace)
        .bind(key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All keys in a namespace, sorted for deterministic iteration.
    pub async fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT key FROM kv
            WHERE namespace = ?1
            ORDER BY key ASC
            "#,
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.get("key")).collect())
    }

    /// Delete every key in a namespace.
    pub async fn clear(&self, namespace: &str) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM kv
            WHERE namespace = ?1
            "#,
        )
        .bind(namespace)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Current time as Unix seconds (for row timestamps).
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
/// Open an in-memory store for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<KvDb> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let db = KvDb { pool };
    db.migrate().await?;
    Ok(db)
}
