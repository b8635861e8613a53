//! Scriptable in-memory engine for scheduler and instance tests.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use super::{JobId, TransferEngine, TransferHandle, TransferProgress, TransferStatus};
use crate::resume_store::JobDescriptor;

struct MockJob {
    status: Arc<Mutex<TransferStatus>>,
    progress_tx: watch::Sender<TransferProgress>,
    starts: Arc<AtomicU32>,
}

#[derive(Default)]
pub struct MockEngine {
    jobs: Mutex<HashMap<JobId, MockJob>>,
    created: Mutex<Vec<JobId>>,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Flip a job's engine status from the outside (e.g. "the transfer
    /// finished" or "the remote closed the connection").
    pub fn set_status(&self, id: JobId, status: TransferStatus) {
        if let Some(job) = self.jobs.lock().unwrap().get(&id) {
            *job.status.lock().unwrap() = status;
        }
    }

    pub fn push_progress(&self, id: JobId, bytes: u64, total: Option<u64>) {
        if let Some(job) = self.jobs.lock().unwrap().get(&id) {
            let _ = job.progress_tx.send(TransferProgress {
                bytes_transferred: bytes,
                total_bytes: total,
            });
        }
    }

    pub fn status_of(&self, id: JobId) -> Option<TransferStatus> {
        self.jobs
            .lock()
            .unwrap()
            .get(&id)
            .map(|j| *j.status.lock().unwrap())
    }

    /// How many times `start` ran for this job (idempotence checks).
    pub fn start_count(&self, id: JobId) -> u32 {
        self.jobs
            .lock()
            .unwrap()
            .get(&id)
            .map(|j| j.starts.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Ids in handle-creation order (promotion order checks).
    pub fn created(&self) -> Vec<JobId> {
        self.created.lock().unwrap().clone()
    }
}

impl TransferEngine for MockEngine {
    fn create(&self, descriptor: &JobDescriptor) -> Result<Box<dyn TransferHandle>> {
        let status = Arc::new(Mutex::new(TransferStatus::Waiting));
        let (progress_tx, progress_rx) = watch::channel(TransferProgress {
            bytes_transferred: descriptor.bytes_transferred,
            total_bytes: descriptor.total_bytes,
        });
        let starts = Arc::new(AtomicU32::new(0));
        self.jobs.lock().unwrap().insert(
            descriptor.id,
            MockJob {
                status: Arc::clone(&status),
                progress_tx,
                starts: Arc::clone(&starts),
            },
        );
        self.created.lock().unwrap().push(descriptor.id);
        Ok(Box::new(MockHandle {
            status,
            progress_rx,
            starts,
        }))
    }

    fn active_jobs(&self) -> Vec<JobId> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, j)| *j.status.lock().unwrap() == TransferStatus::Active)
            .map(|(id, _)| *id)
            .collect()
    }
}

struct MockHandle {
    status: Arc<Mutex<TransferStatus>>,
    progress_rx: watch::Receiver<TransferProgress>,
    starts: Arc<AtomicU32>,
}

impl TransferHandle for MockHandle {
    fn start(&mut self, _resume_from: u64) -> Result<()> {
        self.starts.fetch_add(1, Ordering::Relaxed);
        let mut status = self.status.lock().unwrap();
        if matches!(*status, TransferStatus::Waiting | TransferStatus::Paused) {
            *status = TransferStatus::Active;
        }
        Ok(())
    }

    fn pause(&mut self) {
        let mut status = self.status.lock().unwrap();
        if *status == TransferStatus::Active {
            *status = TransferStatus::Paused;
        }
    }

    fn resume(&mut self) {
        let mut status = self.status.lock().unwrap();
        if *status == TransferStatus::Paused {
            *status = TransferStatus::Active;
        }
    }

    fn cancel(&mut self) {
        let mut status = self.status.lock().unwrap();
        if !status.is_terminal() {
            *status = TransferStatus::Removed;
        }
    }

    fn status(&self) -> TransferStatus {
        *self.status.lock().unwrap()
    }

    fn progress(&self) -> watch::Receiver<TransferProgress> {
        self.progress_rx.clone()
    }
}
