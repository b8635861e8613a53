//! Types persisted by the resume store.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::engine::{JobId, TransferStatus};

/// Opaque media metadata carried for display purposes only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRef {
    /// Id of the show/season grouping this episode belongs to.
    pub parent_id: JobId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
}

impl EpisodeRef {
    pub fn label(&self) -> String {
        match (&self.name, self.season, self.episode) {
            (Some(name), Some(s), Some(e)) => format!("{} S{:02}E{:02}", name, s, e),
            (Some(name), _, Some(e)) => format!("{} E{:02}", name, e),
            (Some(name), _, _) => name.clone(),
            (None, _, _) => format!("#{}", self.parent_id),
        }
    }
}

/// The resume package: serialized checkpoint of one job. This is the only
/// thing ever written to durable storage for a download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub id: JobId,
    pub episode: EpisodeRef,
    pub source_url: String,
    pub destination_path: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    pub bytes_transferred: u64,
    pub total_bytes: Option<u64>,
    pub status: TransferStatus,
}

/// A descriptor paired with its position in the logical queue; used only
/// for jobs that had not yet started transferring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedResumeRecord {
    pub descriptor: JobDescriptor,
    pub index: u32,
}

/// In-memory queue entry. Immutable once created; `enqueue_index` is the
/// only ordering key and survives restarts via `QueuedResumeRecord`.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: JobId,
    pub episode: EpisodeRef,
    pub enqueue_index: u32,
    pub descriptor: JobDescriptor,
}

impl QueueEntry {
    pub fn from_record(record: QueuedResumeRecord) -> Self {
        Self {
            id: record.descriptor.id,
            episode: record.descriptor.episode.clone(),
            enqueue_index: record.index,
            descriptor: record.descriptor,
        }
    }

    pub fn to_record(&self) -> QueuedResumeRecord {
        QueuedResumeRecord {
            descriptor: self.descriptor.clone(),
            index: self.enqueue_index,
        }
    }
}
