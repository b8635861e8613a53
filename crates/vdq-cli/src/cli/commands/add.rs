//! `vdq add <url>` – queue a new download.

use anyhow::{bail, Context, Result};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use vdq_core::config::VdqConfig;
use vdq_core::engine::TransferStatus;
use vdq_core::queue::{DownloadQueue, EnqueueError};
use vdq_core::resume_store::{EpisodeRef, JobDescriptor, ResumeStore};

pub struct AddRequest {
    pub url: String,
    pub id: Option<i64>,
    pub dest: Option<String>,
    pub name: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

pub async fn run_add(store: &ResumeStore, cfg: &VdqConfig, req: AddRequest) -> Result<()> {
    let parsed = url::Url::parse(&req.url).context("invalid URL")?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("only http/https URLs are supported");
    }

    let id = req.id.unwrap_or_else(|| stable_id(&req.url));
    let destination_path = match req.dest {
        Some(dest) => dest,
        None => {
            let filename = url_filename(&parsed);
            match &cfg.download_dir {
                Some(dir) => format!("{}/{}", dir.trim_end_matches('/'), filename),
                None => std::env::current_dir()?
                    .join(filename)
                    .to_string_lossy()
                    .into_owned(),
            }
        }
    };

    let active = store.load_all_active().await?;
    if active.records.iter().any(|d| d.id == id) {
        bail!("job {id} is already downloading; stop it first");
    }

    let descriptor = JobDescriptor {
        id,
        episode: EpisodeRef {
            parent_id: id,
            name: req.name,
            season: req.season,
            episode: req.episode,
        },
        source_url: req.url.clone(),
        destination_path,
        headers: HashMap::new(),
        bytes_transferred: 0,
        total_bytes: None,
        status: TransferStatus::Waiting,
    };

    // Layer onto whatever queue is already persisted. A live `vdq run`
    // absorbs records persisted here on its next iteration.
    let queue = DownloadQueue::new(store.clone());
    queue.restore(store.load_queue().await?.records).await?;
    match queue.push(descriptor).await {
        Ok(index) => println!("Queued job {id} at position {index} for URL: {}", req.url),
        Err(EnqueueError::Duplicate(_)) => println!("Job {id} is already queued."),
        Err(EnqueueError::Store(e)) => return Err(e),
    }
    Ok(())
}

/// Stable positive id derived from the URL, so re-adding the same URL
/// addresses the same job.
fn stable_id(url: &str) -> i64 {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    (hasher.finish() & i64::MAX as u64) as i64
}

fn url_filename(url: &url::Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| "download.bin".to_string())
}
