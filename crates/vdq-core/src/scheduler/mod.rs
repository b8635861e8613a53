//! The scheduler loop: bounded-concurrency promotion from the durable
//! queue to running download instances.
//!
//! Cooperative polling on a fixed cadence. Each iteration does bounded
//! work: dispatch queued commands, reap finished/failed instances, promote
//! queued entries up to a concurrency cap recomputed every iteration, and
//! publish observer counters. The loop exits once both the queue and the
//! active set are empty.

mod counters;
mod recovery;


pub use counters::QueueCounters;
pub use recovery::ReplayReport;

use anyhow::Result;
use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::commands::{CommandBus, DownloadAction};
use crate::config::VdqConfig;
use crate::engine::{JobId, TransferEngine};
use crate::instance::DownloadInstance;
use crate::queue::{DownloadQueue, EnqueueError};
use crate::resume_store::{JobDescriptor, ResumeStore};

/// How a scheduler run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Queue and active set drained; nothing left to do.
    Idle,
    /// `shutdown()` was requested with work still in flight; everything was
    /// checkpointed and the supervisor should relaunch with the replay flag.
    RestartRequested,
}

/// Concurrency cap provider, re-evaluated every iteration so policy changes
/// (network, device, config) take effect within one tick.
pub type ConcurrencyPolicy = Box<dyn Fn() -> usize + Send + Sync>;

pub struct Scheduler {
    store: ResumeStore,
    engine: Arc<dyn TransferEngine>,
    queue: Arc<DownloadQueue>,
    active: Vec<DownloadInstance>,
    active_ids: Arc<StdMutex<HashSet<JobId>>>,
    commands_rx: mpsc::UnboundedReceiver<(JobId, DownloadAction)>,
    counters_tx: watch::Sender<QueueCounters>,
    shutdown_rx: watch::Receiver<bool>,
    policy: ConcurrencyPolicy,
    tick_interval: Duration,
    checkpoint_bytes: u64,
}

/// Cheap handle for everything outside the loop: enqueue new work, send
/// commands, observe counters, request shutdown.
#[derive(Clone)]
pub struct SchedulerHandle {
    queue: Arc<DownloadQueue>,
    commands: CommandBus,
    counters: watch::Receiver<QueueCounters>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    active_ids: Arc<StdMutex<HashSet<JobId>>>,
}

impl SchedulerHandle {
    /// Enqueue a new job. Rejects ids already queued or currently active,
    /// so an id lives in at most one of the two places.
    pub async fn enqueue(&self, descriptor: JobDescriptor) -> Result<u32, EnqueueError> {
        if self.active_ids.lock().unwrap().contains(&descriptor.id) {
            return Err(EnqueueError::Duplicate(descriptor.id));
        }
        self.queue.push(descriptor).await
    }

    pub fn commands(&self) -> &CommandBus {
        &self.commands
    }

    pub fn counters(&self) -> watch::Receiver<QueueCounters> {
        self.counters.clone()
    }

    /// Ask the loop to stop after checkpointing all live instances.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Scheduler {
    pub fn new(
        store: ResumeStore,
        engine: Arc<dyn TransferEngine>,
        cfg: &VdqConfig,
    ) -> (Self, SchedulerHandle) {
        let queue = Arc::new(DownloadQueue::new(store.clone()));
        let (commands, commands_rx) = CommandBus::channel();
        let (counters_tx, counters_rx) = watch::channel(QueueCounters::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let active_ids = Arc::new(StdMutex::new(HashSet::new()));

        let cap = cfg.max_concurrent_downloads;
        let scheduler = Self {
            store,
            engine,
            queue: Arc::clone(&queue),
            active: Vec::new(),
            active_ids: Arc::clone(&active_ids),
            commands_rx,
            counters_tx,
            shutdown_rx,
            policy: Box::new(move || cap),
            tick_interval: Duration::from_millis(cfg.tick_interval_ms),
            checkpoint_bytes: cfg.checkpoint_bytes,
        };
        let handle = SchedulerHandle {
            queue,
            commands,
            counters: counters_rx,
            shutdown_tx: Arc::new(shutdown_tx),
            active_ids,
        };
        (scheduler, handle)
    }

    /// Replace the concurrency cap provider (e.g. network-aware policy).
    pub fn set_policy(&mut self, policy: ConcurrencyPolicy) {
        self.policy = policy;
    }

    /// Run until both queue and active set are empty, or until shutdown.
    ///
    /// A failing iteration is logged and the loop continues on the next
    /// tick; dying here would silently stop all downloads.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        let mut ticker = tokio::time::interval(self.tick_interval);
        loop {
            ticker.tick().await;

            if *self.shutdown_rx.borrow() {
                self.checkpoint_all().await;
                tracing::info!("scheduler stopping with work in flight, restart requested");
                return Ok(RunOutcome::RestartRequested);
            }

            match self.tick().await {
                Ok(true) => {
                    tracing::debug!("queue and active set empty, scheduler going idle");
                    return Ok(RunOutcome::Idle);
                }
                Ok(false) => {}
                Err(e) => tracing::warn!("scheduler iteration failed: {:#}", e),
            }
        }
    }

    /// One scheduling iteration. Returns true when there is nothing left.
    async fn tick(&mut self) -> Result<bool> {
        self.dispatch_commands().await;
        self.reap_terminal().await;
        self.absorb_external_pushes().await?;
        self.promote().await?;
        self.publish_counters().await;
        Ok(self.active.is_empty() && self.queue.is_empty().await)
    }

    /// Pick up queue records persisted by another process (`vdq add` while
    /// this scheduler runs). Without this, the next push/pop here would
    /// rewrite the persisted list from this process's memory alone and
    /// silently drop them.
    async fn absorb_external_pushes(&mut self) -> Result<()> {
        let persisted = self.store.load_queue().await?;
        let records: Vec<_> = persisted
            .records
            .into_iter()
            .filter(|r| !self.active.iter().any(|i| i.id() == r.descriptor.id))
            .collect();
        let added = self.queue.restore(records).await?;
        if added > 0 {
            tracing::debug!(added, "absorbed jobs queued by another process");
        }
        Ok(())
    }

    /// Deliver pending commands to their instances. Commands addressed to
    /// ids with no active instance are dropped by design.
    async fn dispatch_commands(&mut self) {
        while let Ok((id, action)) = self.commands_rx.try_recv() {
            let Some(instance) = self.active.iter_mut().find(|i| i.id() == id) else {
                tracing::debug!(id, action = action.as_str(), "command for inactive job dropped");
                continue;
            };
            match action {
                DownloadAction::Pause => {
                    if let Err(e) = instance.pause().await {
                        tracing::warn!(id, "pause checkpoint failed: {:#}", e);
                    }
                }
                DownloadAction::Resume => instance.resume(),
                DownloadAction::Stop => instance.stop(),
            }
        }
    }

    /// Drop instances whose engine status went terminal and delete their
    /// resume records. Per-job failure is isolated: no retry, no effect on
    /// other jobs.
    async fn reap_terminal(&mut self) {
        let mut kept = Vec::with_capacity(self.active.len());
        for mut instance in self.active.drain(..) {
            if !(instance.is_completed() || instance.is_failed()) {
                kept.push(instance);
                continue;
            }
            let id = instance.id();
            tracing::info!(id, completed = instance.is_completed(), "download finished");
            instance.shutdown_checkpoint();
            if let Err(e) = self.store.remove_all(id).await {
                tracing::warn!(id, "could not delete resume records: {:#}", e);
            }
        }
        self.active = kept;
        self.sync_active_ids();
    }

    /// Promote queued entries while capacity allows. The cap is recomputed
    /// here every iteration; shrinking it never cancels running jobs, it
    /// only blocks promotions.
    async fn promote(&mut self) -> Result<()> {
        let cap = (self.policy)();
        let capacity = cap.saturating_sub(self.active.len());
        for _ in 0..capacity {
            let Some(entry) = self.queue.pop().await? else {
                break;
            };
            let id = entry.id;
            let handle = match self.engine.create(&entry.descriptor) {
                Ok(h) => h,
                Err(e) => {
                    tracing::warn!(id, "engine rejected job: {:#}", e);
                    continue;
                }
            };
            let mut instance =
                DownloadInstance::new(entry.descriptor, handle, self.store.clone());
            if let Err(e) = instance.start_download(self.checkpoint_bytes).await {
                tracing::warn!(id, "could not start download: {:#}", e);
                if let Err(e) = self.store.remove_all(id).await {
                    tracing::warn!(id, "could not delete resume records: {:#}", e);
                }
                continue;
            }
            tracing::debug!(id, "promoted from queue");
            self.active.push(instance);
        }
        self.sync_active_ids();
        Ok(())
    }

    async fn publish_counters(&mut self) {
        let engine_ids: HashSet<JobId> = self.engine.active_jobs().into_iter().collect();
        let active = counters::visible_active(&engine_ids, self.active.iter().map(|i| i.id()));
        let queued = self.queue.len().await;
        let _ = self.counters_tx.send(QueueCounters { active, queued });
    }

    /// Shutdown path: persist a resumable checkpoint for every live job.
    async fn checkpoint_all(&mut self) {
        for instance in &mut self.active {
            if let Err(e) = instance.pause().await {
                tracing::warn!(id = instance.id(), "shutdown checkpoint failed: {:#}", e);
            }
        }
    }

    fn sync_active_ids(&self) {
        *self.active_ids.lock().unwrap() = self.active.iter().map(|i| i.id()).collect();
    }
}
