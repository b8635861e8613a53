//! Resume-record operations on top of the key-value store.
//!
//! Two persisted shapes:
//! - namespace `download_resume`: `{id -> JobDescriptor}` for in-flight jobs
//! - key `download_queue`: one ordered JSON list of `QueuedResumeRecord`
//!
//! Recovery must survive one bad record, so list elements and namespace
//! values are decoded individually and undecodable ones skipped.

use anyhow::Result;

use super::db::KvDb;
use super::types::{JobDescriptor, QueuedResumeRecord};
use crate::engine::JobId;

/// Namespace holding one serialized descriptor per in-flight job.
pub const KEY_RESUME_PACKAGES: &str = "download_resume";
/// Namespace/key holding the ordered list of queued resume records.
pub const KEY_RESUME_QUEUE: &str = "download_queue";
const QUEUE_LIST_KEY: &str = "queue";

/// Records plus how many persisted entries could not be decoded.
#[derive(Debug)]
pub struct LoadedRecords<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

#[derive(Clone)]
pub struct ResumeStore {
    db: KvDb,
}

impl ResumeStore {
    pub fn new(db: KvDb) -> Self {
        Self { db }
    }

    /// Write (or overwrite) the resume record of an in-flight job.
    pub async fn save_active(&self, descriptor: &JobDescriptor) -> Result<()> {
        let json = serde_json::to_string(descriptor)?;
        self.db
            .set(KEY_RESUME_PACKAGES, &descriptor.id.to_string(), &json)
            .await
    }

    pub async fn load_active(&self, id: JobId) -> Result<Option<JobDescriptor>> {
        let Some(json) = self.db.get(KEY_RESUME_PACKAGES, &id.to_string()).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    pub async fn remove_active(&self, id: JobId) -> Result<()> {
        self.db.remove(KEY_RESUME_PACKAGES, &id.to_string()).await
    }

    /// All decodable in-flight resume records. A corrupt record is skipped
    /// with a warning, never a failure.
    pub async fn load_all_active(&self) -> Result<LoadedRecords<JobDescriptor>> {
        let keys = self.db.keys(KEY_RESUME_PACKAGES).await?;
        let mut records = Vec::with_capacity(keys.len());
        let mut skipped = 0usize;
        for key in keys {
            let Some(json) = self.db.get(KEY_RESUME_PACKAGES, &key).await? else {
                continue;
            };
            match serde_json::from_str::<JobDescriptor>(&json) {
                Ok(descriptor) => records.push(descriptor),
                Err(e) => {
                    tracing::warn!(key, "skipping undecodable resume record: {}", e);
                    skipped += 1;
                }
            }
        }
        Ok(LoadedRecords { records, skipped })
    }

    /// Persist the whole ordered queue under its single key.
    pub async fn save_queue(&self, records: &[QueuedResumeRecord]) -> Result<()> {
        let json = serde_json::to_string(records)?;
        self.db.set(KEY_RESUME_QUEUE, QUEUE_LIST_KEY, &json).await
    }

    /// The persisted queue, element-decoded so one corrupt entry doesn't
    /// drop the rest. Order is as stored; replay sorts by index.
    pub async fn load_queue(&self) -> Result<LoadedRecords<QueuedResumeRecord>> {
        let Some(json) = self.db.get(KEY_RESUME_QUEUE, QUEUE_LIST_KEY).await? else {
            return Ok(LoadedRecords {
                records: Vec::new(),
                skipped: 0,
            });
        };
        let raw: Vec<serde_json::Value> = match serde_json::from_str(&json) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("queue record list undecodable, treating as empty: {}", e);
                return Ok(LoadedRecords {
                    records: Vec::new(),
                    skipped: 1,
                });
            }
        };
        let mut records = Vec::with_capacity(raw.len());
        let mut skipped = 0usize;
        for value in raw {
            match serde_json::from_value::<QueuedResumeRecord>(value) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("skipping undecodable queue record: {}", e);
                    skipped += 1;
                }
            }
        }
        Ok(LoadedRecords { records, skipped })
    }

    /// Delete every trace of a job: its in-flight record and any queue
    /// record with the same id. Used on terminal cleanup and `remove`.
    pub async fn remove_all(&self, id: JobId) -> Result<()> {
        self.remove_active(id).await?;
        let queue = self.load_queue().await?;
        if queue.records.iter().any(|r| r.descriptor.id == id) {
            let kept: Vec<QueuedResumeRecord> = queue
                .records
                .into_iter()
                .filter(|r| r.descriptor.id != id)
                .collect();
            self.save_queue(&kept).await?;
        }
        Ok(())
    }

    /// Raw access for callers layering their own keys (tests, tooling).
    pub fn db(&self) -> &KvDb {
        &self.db
    }
}
