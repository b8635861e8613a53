//! One running download: an engine handle plus its durable checkpoint.
//!
//! Lifecycle queries derive from the engine status on every call; nothing
//! is tracked independently, so the instance can never disagree with the
//! engine about whether a transfer finished. Progress is checkpointed to
//! the resume store at a configurable byte granularity; that checkpoint is
//! the only thing that lets a killed process resume instead of restarting.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::engine::{JobId, TransferHandle, TransferStatus};
use crate::resume_store::{JobDescriptor, ResumeStore};

pub struct DownloadInstance {
    descriptor: JobDescriptor,
    handle: Box<dyn TransferHandle>,
    store: ResumeStore,
    started: AtomicBool,
    checkpoint_task: Option<tokio::task::JoinHandle<()>>,
}

impl DownloadInstance {
    pub fn new(descriptor: JobDescriptor, handle: Box<dyn TransferHandle>, store: ResumeStore) -> Self {
        Self {
            descriptor,
            handle,
            store,
            started: AtomicBool::new(false),
            checkpoint_task: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.descriptor.id
    }

    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    /// Begin or resume the transfer. Idempotent: a second call does nothing.
    ///
    /// The resume record is written before the engine starts, then rewritten
    /// by a background task every `checkpoint_bytes` of progress.
    pub async fn start_download(&mut self, checkpoint_bytes: u64) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let snapshot = self.snapshot();
        self.store.save_active(&snapshot).await?;
        self.handle.start(snapshot.bytes_transferred)?;

        let mut progress = self.handle.progress();
        let store = self.store.clone();
        let base = self.descriptor.clone();
        let granularity = checkpoint_bytes.max(1);
        self.checkpoint_task = Some(tokio::spawn(async move {
            let mut last_persisted = base.bytes_transferred;
            while progress.changed().await.is_ok() {
                let p = *progress.borrow();
                if p.bytes_transferred.saturating_sub(last_persisted) < granularity {
                    continue;
                }
                last_persisted = p.bytes_transferred;
                let mut d = base.clone();
                d.bytes_transferred = p.bytes_transferred;
                d.total_bytes = p.total_bytes.or(d.total_bytes);
                d.status = TransferStatus::Active;
                if let Err(e) = store.save_active(&d).await {
                    tracing::warn!(id = d.id, "checkpoint write failed: {:#}", e);
                }
            }
        }));
        Ok(())
    }

    /// Derived from engine status, never cached.
    pub fn is_completed(&self) -> bool {
        self.handle.status() == TransferStatus::Complete
    }

    /// Error and Removed both end the job; retry is a caller decision.
    pub fn is_failed(&self) -> bool {
        matches!(
            self.handle.status(),
            TransferStatus::Error | TransferStatus::Removed
        )
    }

    /// Pause the engine and checkpoint immediately, so a paused job that
    /// never comes back before process death resumes rather than restarts.
    pub async fn pause(&mut self) -> Result<()> {
        self.handle.pause();
        self.checkpoint_now().await
    }

    pub fn resume(&mut self) {
        self.handle.resume();
    }

    /// Cooperative stop; the scheduler reaps us once the engine settles.
    pub fn stop(&mut self) {
        self.handle.cancel();
    }

    /// Write the current descriptor snapshot to the resume store.
    pub async fn checkpoint_now(&self) -> Result<()> {
        self.store.save_active(&self.snapshot()).await
    }

    /// Stop the background checkpoint writer. Call before deleting the
    /// job's records, so no stale checkpoint lands after the delete.
    pub fn shutdown_checkpoint(&mut self) {
        if let Some(task) = self.checkpoint_task.take() {
            task.abort();
        }
    }

    fn snapshot(&self) -> JobDescriptor {
        let p = *self.handle.progress().borrow();
        let mut d = self.descriptor.clone();
        d.bytes_transferred = d.bytes_transferred.max(p.bytes_transferred);
        d.total_bytes = p.total_bytes.or(d.total_bytes);
        d.status = self.handle.status();
        d
    }
}

impl Drop for DownloadInstance {
    fn drop(&mut self) {
        self.shutdown_checkpoint();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngine;
    use crate::engine::{TransferEngine, TransferStatus};
    use crate::resume_store::db::open_memory;
    use crate::resume_store::EpisodeRef;
    use std::collections::HashMap;

    fn descriptor(id: i64) -> JobDescriptor {
        JobDescriptor {
            id,
            episode: EpisodeRef {
                parent_id: 1,
                name: None,
                season: None,
                episode: None,
            },
            source_url: format!("https://example.com/{id}"),
            destination_path: format!("/tmp/{id}.mp4"),
            headers: HashMap::new(),
            bytes_transferred: 0,
            total_bytes: None,
            status: TransferStatus::Waiting,
        }
    }

    #[tokio::test]
    async fn start_download_is_idempotent() {
        let store = ResumeStore::new(open_memory().await.unwrap());
        let engine = MockEngine::new();
        let d = descriptor(1);
        let handle = engine.create(&d).unwrap();
        let mut inst = DownloadInstance::new(d, handle, store);

        inst.start_download(1).await.unwrap();
        inst.start_download(1).await.unwrap();
        inst.start_download(1).await.unwrap();
        assert_eq!(engine.start_count(1), 1);
    }

    #[tokio::test]
    async fn lifecycle_queries_follow_engine_status() {
        let store = ResumeStore::new(open_memory().await.unwrap());
        let engine = MockEngine::new();
        let d = descriptor(2);
        let handle = engine.create(&d).unwrap();
        let mut inst = DownloadInstance::new(d, handle, store);
        inst.start_download(1).await.unwrap();

        assert!(!inst.is_completed());
        assert!(!inst.is_failed());

        engine.set_status(2, TransferStatus::Complete);
        assert!(inst.is_completed());
        assert!(!inst.is_failed());

        engine.set_status(2, TransferStatus::Error);
        assert!(inst.is_failed());

        engine.set_status(2, TransferStatus::Removed);
        assert!(inst.is_failed());
    }

    #[tokio::test]
    async fn progress_checkpoints_reach_the_store() {
        let store = ResumeStore::new(open_memory().await.unwrap());
        let engine = MockEngine::new();
        let d = descriptor(3);
        let handle = engine.create(&d).unwrap();
        let mut inst = DownloadInstance::new(d, handle, store.clone());
        inst.start_download(100).await.unwrap();

        engine.push_progress(3, 250, Some(1000));
        // Let the checkpoint task observe the watch update.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let persisted = store.load_active(3).await.unwrap().expect("checkpointed");
        assert_eq!(persisted.bytes_transferred, 250);
        assert_eq!(persisted.total_bytes, Some(1000));
        assert_eq!(persisted.status, TransferStatus::Active);
    }

    #[tokio::test]
    async fn pause_checkpoints_immediately() {
        let store = ResumeStore::new(open_memory().await.unwrap());
        let engine = MockEngine::new();
        let d = descriptor(4);
        let handle = engine.create(&d).unwrap();
        let mut inst = DownloadInstance::new(d, handle, store.clone());
        inst.start_download(u64::MAX).await.unwrap();

        engine.push_progress(4, 512, Some(2048));
        inst.pause().await.unwrap();

        let persisted = store.load_active(4).await.unwrap().expect("checkpointed");
        assert_eq!(persisted.status, TransferStatus::Paused);
        assert_eq!(persisted.bytes_transferred, 512);
    }
}
