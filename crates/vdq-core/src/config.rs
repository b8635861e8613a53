use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Global configuration loaded from `~/.config/vdq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VdqConfig {
    /// Maximum number of downloads running at the same time. The scheduler
    /// re-reads this every iteration, so edits take effect within one tick.
    pub max_concurrent_downloads: usize,
    /// Scheduler iteration interval in milliseconds.
    pub tick_interval_ms: u64,
    /// Progress granularity for resume checkpoints: a job's resume record is
    /// rewritten after this many newly transferred bytes (not every byte).
    pub checkpoint_bytes: u64,
    /// Directory new downloads are written to (default: current directory).
    #[serde(default)]
    pub download_dir: Option<String>,
}

impl Default for VdqConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 3,
            tick_interval_ms: 500,
            checkpoint_bytes: 1_048_576,
            download_dir: None,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("vdq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<VdqConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = VdqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: VdqConfig = toml::from_str(&data)?;
    Ok(cfg)
}
