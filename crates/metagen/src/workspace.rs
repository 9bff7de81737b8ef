//! The in-memory working set shared by the orchestrator and the row
//! override controller.
//!
//! Held behind `Arc<Mutex<_>>` and never locked across an `.await`. Write
//! ownership per key: the active run owns the keys of the chunk currently in
//! flight (`bulk_owned`); a regenerate owns its key while in flight
//! (`regenerating`).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::orchestrator::JobState;
use crate::record::{GeneratedFields, ProcessedRecord, Record};
use crate::session::SessionSnapshot;

pub type SharedWorkspace = Arc<Mutex<Workspace>>;

/// Locks the workspace, recovering the data if a holder panicked.
pub fn lock(workspace: &SharedWorkspace) -> MutexGuard<'_, Workspace> {
    workspace.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
pub struct Workspace {
    file_name: String,
    original: Vec<Record>,
    /// Key → position of its first occurrence in `original`.
    index: HashMap<String, usize>,
    processed: HashMap<String, ProcessedRecord>,
    resumable: bool,
    state: JobState,
    progress: f64,
    message: Option<String>,
    bulk_owned: HashSet<String>,
    regenerating: HashSet<String>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedWorkspace {
        Arc::new(Mutex::new(self))
    }

    /// Replaces everything with a fresh upload.
    pub fn load(&mut self, file_name: &str, records: Vec<Record>) {
        *self = Self::default();
        self.file_name = file_name.to_string();
        self.index = build_index(&records);
        self.original = records;
    }

    /// Restores a persisted snapshot. Processed rows whose key is not in the
    /// original set are dropped. Returns how many were dropped.
    pub fn restore(&mut self, snapshot: SessionSnapshot) -> usize {
        self.load(&snapshot.file_name, snapshot.original_records);
        let mut orphaned = 0;
        for processed in snapshot.processed_records {
            if self.index.contains_key(processed.key()) {
                self.processed.insert(processed.key().to_string(), processed);
            } else {
                orphaned += 1;
            }
        }
        self.resumable = snapshot.resumable;
        self.progress = self.ratio();
        orphaned
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn original(&self) -> &[Record] {
        &self.original
    }

    pub fn total(&self) -> usize {
        self.original.len()
    }

    pub fn is_loaded(&self) -> bool {
        !self.original.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub fn processed(&self, key: &str) -> Option<&ProcessedRecord> {
        self.processed.get(key)
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn resumable(&self) -> bool {
        self.resumable
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Processed rows in original order. Rows without a processed
    /// counterpart are left out, as are empty and repeated keys.
    pub fn ordered(&self) -> Vec<ProcessedRecord> {
        self.unique_records()
            .filter_map(|record| self.processed.get(&record.key).cloned())
            .collect()
    }

    /// Original rows with a usable key that have not been processed yet.
    pub fn remaining(&self) -> Vec<Record> {
        self.unique_records()
            .filter(|record| !self.processed.contains_key(&record.key))
            .cloned()
            .collect()
    }

    /// Number of rows that can never be processed because their key is empty.
    pub fn unmatchable_count(&self) -> usize {
        self.original.iter().filter(|r| r.key.is_empty()).count()
    }


    pub(crate) fn clear_processed(&mut self) {
        self.processed.clear();
        self.progress = 0.0;
    }

    pub(crate) fn begin_run(&mut self) {
        self.state = JobState::Running;
        self.resumable = false;
        self.message = None;
    }

    pub(crate) fn finish_run(&mut self, state: JobState, resumable: bool, message: String) {
        self.state = state;
        self.resumable = resumable;
        self.message = Some(message);
        self.bulk_owned.clear();
    }

    /// Last-write-wins merge keyed by SKU. Keys outside the original set are
    /// dropped. Returns the number of rows merged.
    pub(crate) fn merge(&mut self, results: Vec<(String, GeneratedFields)>) -> usize {
        let mut merged = 0;
        for (key, generated) in results {
            let Some(&position) = self.index.get(&key) else {
                log::debug!("Dropping result for unknown SKU '{}'", key);
                continue;
            };
            match self.processed.get_mut(&key) {
                Some(existing) => existing.generated = generated,
                None => {
                    let record = self.original[position].clone();
                    self.processed
                        .insert(key, ProcessedRecord::new(record, generated));
                }
            }
            merged += 1;
        }
        self.progress = self.ratio();
        merged
    }

    /// Overwrites the generated fields of an already processed key. Returns
    /// `false` when the key has no processed row.
    pub(crate) fn set_generated(&mut self, key: &str, generated: GeneratedFields) -> bool {
        match self.processed.get_mut(key) {
            Some(existing) => {
                existing.generated = generated;
                true
            }
            None => false,
        }
    }

    pub(crate) fn processed_mut(&mut self, key: &str) -> Option<&mut ProcessedRecord> {
        self.processed.get_mut(key)
    }

    pub(crate) fn claim_bulk(&mut self, records: &[Record]) {
        self.bulk_owned
            .extend(records.iter().map(|r| r.key.clone()));
    }

    pub(crate) fn release_bulk(&mut self) {
        self.bulk_owned.clear();
    }

    pub fn is_bulk_owned(&self, key: &str) -> bool {
        self.bulk_owned.contains(key)
    }

    pub fn is_regenerating(&self, key: &str) -> bool {
        self.regenerating.contains(key)
    }

    pub(crate) fn mark_regenerating(&mut self, key: &str) {
        self.regenerating.insert(key.to_string());
    }

    pub(crate) fn clear_regenerating(&mut self, key: &str) {
        self.regenerating.remove(key);
    }

    /// Snapshot of the current state. While a run is active the snapshot is
    /// marked resumable whenever work remains, so an interrupted process can
    /// pick up where it left off.
    pub fn snapshot(&self) -> SessionSnapshot {
        let resumable = match self.state {
            JobState::Running => !self.remaining().is_empty(),
            _ => self.resumable,
        };
        SessionSnapshot::new(
            self.file_name.clone(),
            self.original.clone(),
            self.ordered(),
            resumable,
        )
    }

    fn unique_records(&self) -> impl Iterator<Item = &Record> {
        self.original
            .iter()
            .enumerate()
            .filter(|(i, record)| {
                !record.key.is_empty() && self.index.get(&record.key) == Some(i)
            })
            .map(|(_, record)| record)
    }

    fn ratio(&self) -> f64 {
        if self.original.is_empty() {
            0.0
        } else {
            self.processed.len() as f64 / self.original.len() as f64
        }
    }
}

fn build_index(records: &[Record]) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        if !record.key.is_empty() {
            index.entry(record.key.clone()).or_insert(i);
        }
    }
    index
}
