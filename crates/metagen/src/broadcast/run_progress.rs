//! Run progress broadcaster for real-time batch status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::orchestrator::{JobState, RunReport};

/// Phase of a generation run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Started,
    ChunkMerged,
    Settled,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Started => write!(f, "Started"),
            RunPhase::ChunkMerged => write!(f, "Chunk merged"),
            RunPhase::Settled => write!(f, "Settled"),
        }
    }
}

/// Progress event for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunProgressEvent {
    /// Unique run identifier.
    pub job_id: String,
    /// Name of the uploaded file.
    pub file_name: String,
    pub phase: RunPhase,
    /// Orchestrator state at the time of the event.
    pub state: JobState,
    /// Processed rows in the session.
    pub processed: usize,
    /// Rows in the original upload.
    pub total: usize,
    /// Tokens consumed by this run so far.
    pub tokens_used: u64,
    /// 1-based index of the merged chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,
    /// Human-readable message describing current activity.
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl RunProgressEvent {
    pub fn started(
        job_id: &str,
        file_name: &str,
        processed: usize,
        total: usize,
        chunk_count: usize,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            file_name: file_name.to_string(),
            phase: RunPhase::Started,
            state: JobState::Running,
            processed,
            total,
            tokens_used: 0,
            chunk: None,
            chunk_count: Some(chunk_count),
            message: format!("Generating meta content in {} chunk(s)", chunk_count),
            timestamp: Utc::now(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn chunk_merged(
        job_id: &str,
        file_name: &str,
        chunk: usize,
        chunk_count: usize,
        processed: usize,
        total: usize,
        tokens_used: u64,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            file_name: file_name.to_string(),
            phase: RunPhase::ChunkMerged,
            state: JobState::Running,
            processed,
            total,
            tokens_used,
            chunk: Some(chunk),
            chunk_count: Some(chunk_count),
            message: format!("Processed {} of {} products", processed, total),
            timestamp: Utc::now(),
        }
    }

    pub fn settled(file_name: &str, report: &RunReport) -> Self {
        Self {
            job_id: report.job_id.clone(),
            file_name: file_name.to_string(),
            phase: RunPhase::Settled,
            state: report.outcome,
            processed: report.processed,
            total: report.total,
            tokens_used: report.tokens_used,
            chunk: None,
            chunk_count: None,
            message: report.message.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Fraction of the upload processed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

/// Broadcasts run progress events for streaming.
#[derive(Clone)]
pub struct RunProgressBroadcaster {
    sender: Arc<broadcast::Sender<RunProgressEvent>>,
}

impl RunProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends a progress event to all subscribers.
    pub fn send(&self, event: RunProgressEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunProgressEvent> {
        self.sender.subscribe()
    }
}

impl Default for RunProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}
