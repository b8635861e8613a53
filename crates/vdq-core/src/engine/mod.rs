//! Transfer engine abstraction.
//!
//! The scheduler never touches a concrete HTTP client: it talks to a
//! `TransferEngine` (a factory for per-job handles) and derives all job
//! lifecycle decisions from `TransferHandle::status()`. The curl-backed
//! engine lives in `curl`; tests use the scriptable mock.

pub mod curl;

#[cfg(test)]
pub(crate) mod mock;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::resume_store::JobDescriptor;

/// Job identifier, stable across process restarts.
pub type JobId = i64;

/// Status reported by the underlying transfer engine for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Waiting,
    Active,
    Paused,
    Complete,
    Error,
    Removed,
}

impl TransferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferStatus::Waiting => "waiting",
            TransferStatus::Active => "active",
            TransferStatus::Paused => "paused",
            TransferStatus::Complete => "complete",
            TransferStatus::Error => "error",
            TransferStatus::Removed => "removed",
        }
    }

    /// Terminal statuses are never left; the scheduler drops such jobs.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransferStatus::Complete | TransferStatus::Error | TransferStatus::Removed
        )
    }
}

/// Byte-level progress of one transfer, published through a watch channel
/// so observers see the latest value without backpressure on the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_transferred: u64,
    pub total_bytes: Option<u64>,
}

/// One in-flight (or not-yet-started) file transfer. `Sync` is required:
/// instances hold handles across await points inside the scheduler task.
pub trait TransferHandle: Send + Sync {
    /// Begin or resume the transfer from `resume_from` bytes. Calling this
    /// on an already running transfer is a no-op.
    fn start(&mut self, resume_from: u64) -> Result<()>;

    /// Ask the engine to stop transferring while keeping the job resumable.
    fn pause(&mut self);

    /// Continue a paused transfer from where it left off.
    fn resume(&mut self);

    /// Cooperative cancel; the engine settles into `Removed` on its own time.
    fn cancel(&mut self);

    /// Current engine status. Never cached by callers.
    fn status(&self) -> TransferStatus;

    /// Subscribe to byte progress for this transfer.
    fn progress(&self) -> watch::Receiver<TransferProgress>;
}

/// Factory for transfer handles plus a view of what the engine itself
/// considers in flight (used for double-count-free observer totals).
pub trait TransferEngine: Send + Sync {
    fn create(&self, descriptor: &JobDescriptor) -> Result<Box<dyn TransferHandle>>;

    /// Ids of jobs the engine is currently transferring.
    fn active_jobs(&self) -> Vec<JobId>;
}
