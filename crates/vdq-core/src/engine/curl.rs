//! Curl-backed transfer engine: one ranged HTTP GET per job on a worker thread.
//!
//! Pause and cancel are abort tokens checked in the write callback; the
//! worker classifies the abort afterwards so a user pause ends as `Paused`
//! (resumable) and a cancel as `Removed`.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use super::{JobId, TransferEngine, TransferHandle, TransferProgress, TransferStatus};
use crate::resume_store::JobDescriptor;

/// Engine producing one `CurlHandle` per job and tracking which ids are
/// currently on a worker thread.
pub struct CurlEngine {
    active: Arc<Mutex<HashSet<JobId>>>,
}

impl CurlEngine {
    pub fn new() -> Self {
        Self {
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl Default for CurlEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferEngine for CurlEngine {
    fn create(&self, descriptor: &JobDescriptor) -> Result<Box<dyn TransferHandle>> {
        Ok(Box::new(CurlHandle::new(
            descriptor.clone(),
            Arc::clone(&self.active),
        )))
    }

    fn active_jobs(&self) -> Vec<JobId> {
        self.active.lock().unwrap().iter().copied().collect()
    }
}

/// State shared between a handle and its worker thread.
struct Shared {
    status: Mutex<TransferStatus>,
    /// Bumped on every worker spawn. A worker whose generation is stale
    /// has been superseded by a later start/resume: it must stop
    /// transferring and leave status, progress and the registry to its
    /// successor.
    generation: AtomicU64,
    paused: AtomicBool,
    cancelled: AtomicBool,
    progress_tx: watch::Sender<TransferProgress>,
}

impl Shared {
    fn superseded(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    /// Final status write for a finished worker.
    fn settle(
        &self,
        generation: u64,
        outcome: Result<()>,
        id: JobId,
        registry: &Mutex<HashSet<JobId>>,
    ) {
        if self.superseded(generation) {
            return;
        }
        let final_status = match outcome {
            Ok(()) => TransferStatus::Complete,
            Err(_) if self.cancelled.load(Ordering::Relaxed) => TransferStatus::Removed,
            Err(_) if self.paused.load(Ordering::Relaxed) => TransferStatus::Paused,
            Err(e) => {
                tracing::warn!(id, "transfer failed: {:#}", e);
                TransferStatus::Error
            }
        };
        *self.status.lock().unwrap() = final_status;
        registry.lock().unwrap().remove(&id);
    }
}

pub struct CurlHandle {
    descriptor: JobDescriptor,
    shared: Arc<Shared>,
    progress_rx: watch::Receiver<TransferProgress>,
    registry: Arc<Mutex<HashSet<JobId>>>,
}

impl CurlHandle {
    fn new(descriptor: JobDescriptor, registry: Arc<Mutex<HashSet<JobId>>>) -> Self {
        let (progress_tx, progress_rx) = watch::channel(TransferProgress {
            bytes_transferred: descriptor.bytes_transferred,
            total_bytes: descriptor.total_bytes,
        });
        Self {
            descriptor,
            shared: Arc::new(Shared {
                status: Mutex::new(TransferStatus::Waiting),
                generation: AtomicU64::new(0),
                paused: AtomicBool::new(false),
                cancelled: AtomicBool::new(false),
                progress_tx,
            }),
            progress_rx,
            registry,
        }
    }

    fn spawn_worker(&mut self, resume_from: u64) {
        let id = self.descriptor.id;
        // Advance the generation before clearing the abort flags: a worker
        // from a previous spawn sees itself superseded and aborts even
        // though the flags are fresh again.
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.paused.store(false, Ordering::Relaxed);
        self.shared.cancelled.store(false, Ordering::Relaxed);
        *self.shared.status.lock().unwrap() = TransferStatus::Active;
        self.registry.lock().unwrap().insert(id);

        let shared = Arc::clone(&self.shared);
        let registry = Arc::clone(&self.registry);
        let descriptor = self.descriptor.clone();
        std::thread::spawn(move || {
            let outcome = run_transfer(&descriptor, resume_from, &shared, generation);
            shared.settle(generation, outcome, id, &registry);
        });
    }
}

impl TransferHandle for CurlHandle {
    fn start(&mut self, resume_from: u64) -> Result<()> {
        if self.status() == TransferStatus::Active {
            return Ok(());
        }
        self.spawn_worker(resume_from);
        Ok(())
    }

    fn pause(&mut self) {
        if self.status() == TransferStatus::Active {
            self.shared.paused.store(true, Ordering::Relaxed);
        }
        // Settle immediately so callers checkpoint with a resumable status;
        // the worker thread exits on the next write callback.
        let mut status = self.shared.status.lock().unwrap();
        if !status.is_terminal() {
            *status = TransferStatus::Paused;
        }
    }

    fn resume(&mut self) {
        if self.status() != TransferStatus::Paused {
            return;
        }
        let from = self.progress_rx.borrow().bytes_transferred;
        self.spawn_worker(from);
    }

    fn cancel(&mut self) {
        self.shared.cancelled.store(true, Ordering::Relaxed);
        let mut status = self.shared.status.lock().unwrap();
        if !matches!(*status, TransferStatus::Active) && !status.is_terminal() {
            // No worker is running to observe the token; settle here.
            *status = TransferStatus::Removed;
            self.registry.lock().unwrap().remove(&self.descriptor.id);
        }
    }

    fn status(&self) -> TransferStatus {
        *self.shared.status.lock().unwrap()
    }

    fn progress(&self) -> watch::Receiver<TransferProgress> {
        self.progress_rx.clone()
    }
}

impl Drop for CurlHandle {
    fn drop(&mut self) {
        // Worker threads are detached; make sure one can't outlive its job.
        self.shared.cancelled.store(true, Ordering::Relaxed);
    }
}

/// Performs the GET, writing sequentially to the destination starting at
/// `resume_from`. Returns Ok only on a fully completed 2xx transfer.
fn run_transfer(
    descriptor: &JobDescriptor,
    resume_from: u64,
    shared: &Arc<Shared>,
    generation: u64,
) -> Result<()> {
    let dest = Path::new(&descriptor.destination_path);
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(dest)
        .with_context(|| format!("open {}", dest.display()))?;
    file.seek(SeekFrom::Start(resume_from))?;

    let mut easy = curl::easy::Easy::new();
    easy.url(&descriptor.source_url).context("invalid URL")?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(Duration::from_secs(30))?;
    easy.low_speed_limit(1024)
        .map_err(|e| anyhow::anyhow!("curl: {}", e))?;
    easy.low_speed_time(Duration::from_secs(60))?;
    if resume_from > 0 {
        easy.resume_from(resume_from)
            .map_err(|e| anyhow::anyhow!("curl: {}", e))?;
    }

    if !descriptor.headers.is_empty() {
        let mut list = curl::easy::List::new();
        for (k, v) in &descriptor.headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        easy.http_headers(list)?;
    }

    let total_hint = descriptor.total_bytes;
    // Filled from the response's Content-Length; the server reports the
    // remaining bytes for a ranged request, so the whole file is
    // resume_from plus that.
    let reported_total: Arc<Mutex<Option<u64>>> = Arc::new(Mutex::new(None));
    {
        let shared = Arc::clone(shared);
        let reported = Arc::clone(&reported_total);
        let mut written = resume_from;
        let mut transfer = easy.transfer();
        {
            let reported = Arc::clone(&reported_total);
            transfer.header_function(move |header| {
                if header.starts_with(b"HTTP/") {
                    // New status line means a new response (redirect hop);
                    // its length supersedes the previous one.
                    *reported.lock().unwrap() = None;
                } else if let Some(len) = parse_content_length(header) {
                    *reported.lock().unwrap() = Some(resume_from + len);
                }
                true
            })?;
        }
        transfer.write_function(move |data| {
            if shared.superseded(generation)
                || shared.cancelled.load(Ordering::Relaxed)
                || shared.paused.load(Ordering::Relaxed)
            {
                return Ok(0); // abort transfer
            }
            match file.write_all(data) {
                Ok(()) => {
                    written += data.len() as u64;
                    let _ = shared.progress_tx.send(TransferProgress {
                        bytes_transferred: written,
                        total_bytes: reported.lock().unwrap().or(total_hint),
                    });
                    Ok(data.len())
                }
                Err(e) => {
                    tracing::warn!("download write failed: {}", e);
                    Ok(0)
                }
            }
        })?;
        transfer.perform().context("GET request failed")?;
    }

    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        anyhow::bail!("GET {} returned HTTP {}", descriptor.source_url, code);
    }
    Ok(())
}

/// Value of a "Content-Length: N" header line (case-insensitive), else None.
fn parse_content_length(header: &[u8]) -> Option<u64> {
    let line = std::str::from_utf8(header).ok()?;
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse().ok()
}
