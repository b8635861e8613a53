//! Ordered, thread-safe queue of pending download descriptors.
//!
//! Push persists the entry as a `QueuedResumeRecord` before returning, so a
//! crash right after push never loses work. Pop removes from memory and
//! store under the same mutex; recovery (`restore`) goes through that mutex
//! too, so a live scheduler iteration and a replay can't tear the queue.

use anyhow::Result;
use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::engine::JobId;
use crate::resume_store::{JobDescriptor, QueueEntry, QueuedResumeRecord, ResumeStore};

#[derive(Debug, Error)]
pub enum EnqueueError {
    /// Duplicate-id policy: a second push of an id already queued is
    /// rejected, leaving the queue untouched.
    #[error("job {0} is already queued")]
    Duplicate(JobId),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

struct Inner {
    entries: VecDeque<QueueEntry>,
    next_index: u32,
}

pub struct DownloadQueue {
    store: ResumeStore,
    inner: Mutex<Inner>,
}

impl DownloadQueue {
    pub fn new(store: ResumeStore) -> Self {
        Self {
            store,
            inner: Mutex::new(Inner {
                entries: VecDeque::new(),
                next_index: 1,
            }),
        }
    }

    /// Enqueue a descriptor, returning its assigned `enqueue_index`.
    /// The record is durable before this returns.
    pub async fn push(&self, descriptor: JobDescriptor) -> Result<u32, EnqueueError> {
        let mut inner = self.inner.lock().await;
        if inner.entries.iter().any(|e| e.id == descriptor.id) {
            return Err(EnqueueError::Duplicate(descriptor.id));
        }
        let index = inner.next_index;
        let entry = QueueEntry {
            id: descriptor.id,
            episode: descriptor.episode.clone(),
            enqueue_index: index,
            descriptor,
        };

        let mut records = records_of(&inner.entries);
        records.push(entry.to_record());
        self.store.save_queue(&records).await?;

        let id = entry.id;
        inner.entries.push_back(entry);
        inner.next_index += 1;
        tracing::debug!(id, index, "job queued");
        Ok(index)
    }

    /// Remove and return the first entry (FIFO by `enqueue_index`), or None
    /// if the queue is empty. Popping empty is not an error; callers poll.
    pub async fn pop(&self) -> Result<Option<QueueEntry>> {
        let mut inner = self.inner.lock().await;
        if inner.entries.is_empty() {
            return Ok(None);
        }
        let remaining: Vec<QueuedResumeRecord> = inner
            .entries
            .iter()
            .skip(1)
            .map(|e| e.to_record())
            .collect();
        self.store.save_queue(&remaining).await?;
        Ok(inner.entries.pop_front())
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }

    pub async fn contains(&self, id: JobId) -> bool {
        self.inner.lock().await.entries.iter().any(|e| e.id == id)
    }

    /// Merge persisted records into the queue: sorted ascending by index,
    /// deduplicated by id (first occurrence wins). Returns how many of the
    /// given records were actually added. Used by recovery, by `add`
    /// processes layering onto an existing persisted queue, and by the
    /// scheduler to absorb records another process persisted mid-run.
    pub async fn restore(&self, mut records: Vec<QueuedResumeRecord>) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        records.sort_by_key(|r| r.index);

        let mut added = 0usize;
        for record in records {
            if inner.entries.iter().any(|e| e.id == record.descriptor.id) {
                continue;
            }
            inner.entries.push_back(QueueEntry::from_record(record));
            added += 1;
        }
        if added == 0 {
            return Ok(0);
        }
        inner
            .entries
            .make_contiguous()
            .sort_by_key(|e| e.enqueue_index);
        let max_index = inner.entries.iter().map(|e| e.enqueue_index).max().unwrap_or(0);
        inner.next_index = inner.next_index.max(max_index + 1);

        self.store.save_queue(&records_of(&inner.entries)).await?;
        Ok(added)
    }
}

fn records_of(entries: &VecDeque<QueueEntry>) -> Vec<QueuedResumeRecord> {
    entries.iter().map(|e| e.to_record()).collect()
}
