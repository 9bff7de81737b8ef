//! Persistence of the working session across restarts.
//!
//! The store is written to, never observed: the orchestrator and the row
//! override controller call [`SessionStore::save`] at their merge points.

pub mod blob;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::generation::Instructions;
use crate::record::{ProcessedRecord, Record};

pub use blob::{BlobStore, FileBlobStore, MemoryBlobStore};

/// Blob name of the persisted session snapshot.
pub const SESSION_BLOB: &str = "metagen-session";

/// Blob name of user-edited instructions.
pub const INSTRUCTIONS_BLOB: &str = "metagen-instructions";

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to access session blob '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Stored blob '{name}' is corrupt: {reason}")]
    Corrupt { name: String, reason: String },

    #[error("Session store lock poisoned")]
    Poisoned,
}

/// Serializable state of one upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub version: u32,
    pub file_name: String,
    pub original_records: Vec<Record>,
    /// Best-known processed rows, in `original_records` order.
    pub processed_records: Vec<ProcessedRecord>,
    pub resumable: bool,
    pub saved_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn new(
        file_name: impl Into<String>,
        original_records: Vec<Record>,
        processed_records: Vec<ProcessedRecord>,
        resumable: bool,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            file_name: file_name.into(),
            original_records,
            processed_records,
            resumable,
            saved_at: Utc::now(),
        }
    }

    pub fn total(&self) -> usize {
        self.original_records.len()
    }

    pub fn processed_count(&self) -> usize {
        self.processed_records.len()
    }
}

/// Loads, saves and clears the session snapshot in a [`BlobStore`].
#[derive(Clone)]
pub struct SessionStore {
    blob: Arc<dyn BlobStore>,
    name: String,
}

impl SessionStore {
    pub fn new(blob: Arc<dyn BlobStore>) -> Self {
        Self::with_name(blob, SESSION_BLOB)
    }

    pub fn with_name(blob: Arc<dyn BlobStore>, name: &str) -> Self {
        Self {
            blob,
            name: name.to_string(),
        }
    }

    pub fn load(&self) -> Result<Option<SessionSnapshot>, SessionError> {
        let Some(bytes) = self.blob.get(&self.name)? else {
            return Ok(None);
        };

        let snapshot: SessionSnapshot =
            serde_json::from_slice(&bytes).map_err(|e| SessionError::Corrupt {
                name: self.name.clone(),
                reason: e.to_string(),
            })?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SessionError::Corrupt {
                name: self.name.clone(),
                reason: format!("unsupported snapshot version {}", snapshot.version),
            });
        }

        Ok(Some(snapshot))
    }

    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SessionError> {
        let bytes = serde_json::to_vec(snapshot)?;
        self.blob.set(&self.name, &bytes)?;
        log::debug!(
            "Saved session snapshot ({} of {} processed, resumable={})",
            snapshot.processed_count(),
            snapshot.total(),
            snapshot.resumable
        );
        Ok(())
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        self.blob.remove(&self.name)
    }
}

#[derive(Serialize, Deserialize)]
struct StoredInstructions {
    text: String,
}

/// Persists user-edited instructions. Default instructions are never stored.
#[derive(Clone)]
pub struct InstructionStore {
    blob: Arc<dyn BlobStore>,
}

impl InstructionStore {
    pub fn new(blob: Arc<dyn BlobStore>) -> Self {
        Self { blob }
    }

    pub fn load(&self) -> Result<Option<Instructions>, SessionError> {
        let Some(bytes) = self.blob.get(INSTRUCTIONS_BLOB)? else {
            return Ok(None);
        };
        let stored: StoredInstructions =
            serde_json::from_slice(&bytes).map_err(|e| SessionError::Corrupt {
                name: INSTRUCTIONS_BLOB.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Some(Instructions::custom(stored.text)))
    }

    pub fn save(&self, instructions: &Instructions) -> Result<(), SessionError> {
        if instructions.is_default() {
            return self.reset();
        }
        let bytes = serde_json::to_vec(&StoredInstructions {
            text: instructions.text().to_string(),
        })?;
        self.blob.set(INSTRUCTIONS_BLOB, &bytes)
    }

    pub fn reset(&self) -> Result<(), SessionError> {
        self.blob.remove(INSTRUCTIONS_BLOB)
    }
}
