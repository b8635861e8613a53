//! Recovery: rebuild active instances and the ordered queue from the
//! resume store after a process/service restart.

use anyhow::Result;

use super::Scheduler;
use crate::instance::DownloadInstance;

/// What a replay reconstructed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Jobs re-submitted straight into the active set.
    pub active: usize,
    /// Records restored into the queue, ascending by index.
    pub queued: usize,
    /// Persisted records that could not be decoded or restarted.
    pub skipped: usize,
}

impl Scheduler {
    /// Replay persisted state: in-flight records go directly into the
    /// active set (they were already running, the queue is bypassed);
    /// queued records are restored in ascending index order.
    ///
    /// Safe to call with no resume data (no-op) and safe against a live
    /// loop iteration: queue mutation goes through the queue's own mutex,
    /// and the active set is only touched here, before/between ticks.
    pub async fn replay(&mut self) -> Result<ReplayReport> {
        let mut report = ReplayReport::default();

        let active = self.store.load_all_active().await?;
        report.skipped += active.skipped;
        for descriptor in active.records {
            let id = descriptor.id;
            if self.active.iter().any(|i| i.id() == id) {
                continue;
            }
            let handle = match self.engine.create(&descriptor) {
                Ok(h) => h,
                Err(e) => {
                    tracing::warn!(id, "engine rejected resumed job: {:#}", e);
                    report.skipped += 1;
                    continue;
                }
            };
            let mut instance = DownloadInstance::new(descriptor, handle, self.store.clone());
            if let Err(e) = instance.start_download(self.checkpoint_bytes).await {
                tracing::warn!(id, "could not restart resumed job: {:#}", e);
                report.skipped += 1;
                continue;
            }
            tracing::debug!(id, "resumed in-flight job");
            self.active.push(instance);
            report.active += 1;
        }
        self.sync_active_ids();

        let queued = self.store.load_queue().await?;
        report.skipped += queued.skipped;
        let records: Vec<_> = queued
            .records
            .into_iter()
            .filter(|r| !self.active.iter().any(|i| i.id() == r.descriptor.id))
            .collect();
        report.queued = self.queue.restore(records).await?;

        if report.active + report.queued > 0 {
            tracing::info!(
                active = report.active,
                queued = report.queued,
                skipped = report.skipped,
                "replayed persisted downloads"
            );
        }
        Ok(report)
    }
}
