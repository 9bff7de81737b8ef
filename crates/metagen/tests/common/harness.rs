//! Test harness for isolated orchestrator and override tests.
//!
//! The scripted service answers each call with the next queued [`Reply`]
//! (echoing every requested product once the queue is empty) and records
//! which SKUs every call asked for.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use metagen::generation::{GenerationRequest, GenerationService, RawResponse, ServiceError};
use metagen::orchestrator::{ProgressEvent, ProgressReporter};
use metagen::session::{BlobStore, MemoryBlobStore, SessionError};
use metagen::workspace::{self, SharedWorkspace, Workspace};
use metagen::{
    BatchOrchestrator, GenerationClient, OutputLanguage, ProcessedRecord, Record,
    RowOverrideController, SessionSnapshot, SessionStore,
};

/// Tokens the scripted service reports per requested product.
pub const TOKENS_PER_PRODUCT: u64 = 10;

pub const INSTRUCTIONS: &str = "Write concise, keyword-rich meta content.";

/// One scripted answer.
pub enum Reply {
    /// Generate content for every requested product.
    Echo,
    /// Like `Echo` but leave these SKUs out.
    Omit(Vec<&'static str>),
    /// Fail with a resource-exhaustion error.
    Quota,
    /// Fail with a non-quota error.
    Fail(&'static str),
    /// Return this payload verbatim.
    Payload(Value),
    /// Signal `entered`, wait for `release`, then echo.
    Hold {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    },
}

pub fn title_for(record: &Record) -> String {
    format!("{} | Acme Store", record.display_name)
}

fn echo(records: &[Record], omit: &[&str]) -> Value {
    let items: Vec<Value> = records
        .iter()
        .filter(|r| !omit.contains(&r.key.as_str()))
        .map(|r| {
            json!({
                "sku": r.key,
                "meta_title": title_for(r),
                "meta_description": format!("Buy {} online with fast delivery.", r.display_name),
                "meta_title_ar": format!("{} | متجر", r.display_name),
                "meta_description_ar": format!("اشترِ {} الآن", r.display_name),
            })
        })
        .collect();
    Value::Array(items)
}

#[derive(Default)]
pub struct ScriptedService {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedService {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// SKUs requested by each call, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn requested_keys(&self) -> Vec<String> {
        self.calls().into_iter().flatten().collect()
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn generate(&self, request: &GenerationRequest) -> Result<RawResponse, ServiceError> {
        self.calls
            .lock()
            .unwrap()
            .push(request.records.iter().map(|r| r.key.clone()).collect());
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Echo);
        let tokens_used = TOKENS_PER_PRODUCT * request.records.len() as u64;

        let payload = match reply {
            Reply::Echo => echo(&request.records, &[]),
            Reply::Omit(keys) => echo(&request.records, &keys),
            Reply::Quota => {
                return Err(ServiceError::new(
                    Some(429),
                    "Resource has been exhausted (e.g. check quota). (RESOURCE_EXHAUSTED)",
                ))
            }
            Reply::Fail(message) => return Err(ServiceError::new(Some(500), message)),
            Reply::Payload(value) => value,
            Reply::Hold { entered, release } => {
                entered.notify_one();
                release.notified().await;
                echo(&request.records, &[])
            }
        };

        Ok(RawResponse {
            payload,
            tokens_used,
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Memory blob store that counts writes.
#[derive(Default)]
pub struct CountingBlobStore {
    inner: MemoryBlobStore,
    writes: AtomicUsize,
}

impl CountingBlobStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl BlobStore for CountingBlobStore {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, SessionError> {
        self.inner.get(name)
    }

    fn set(&self, name: &str, bytes: &[u8]) -> Result<(), SessionError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(name, bytes)
    }

    fn remove(&self, name: &str) -> Result<(), SessionError> {
        self.inner.remove(name)
    }
}

/// Blob store whose writes always fail.
pub struct BrokenBlobStore;

impl BlobStore for BrokenBlobStore {
    fn get(&self, _name: &str) -> Result<Option<Vec<u8>>, SessionError> {
        Ok(None)
    }

    fn set(&self, name: &str, _bytes: &[u8]) -> Result<(), SessionError> {
        Err(SessionError::Io {
            name: name.to_string(),
            source: std::io::Error::other("disk full"),
        })
    }

    fn remove(&self, _name: &str) -> Result<(), SessionError> {
        Ok(())
    }
}

/// Records events and optionally cancels a token once a given chunk merged.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
}

impl RecordingProgress {
    pub fn cancel_after_chunk(&self, chunk: usize, token: CancellationToken) {
        *self.cancel_after.lock().unwrap() = Some((chunk, token));
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn merged_chunks(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::ChunkMerged { .. }))
            .count()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        if let ProgressEvent::ChunkMerged { chunk, .. } = &event {
            if let Some((after, token)) = self.cancel_after.lock().unwrap().as_ref() {
                if chunk == after {
                    token.cancel();
                }
            }
        }
        self.events.lock().unwrap().push(event);
    }
}

pub struct TestHarness {
    pub service: Arc<ScriptedService>,
    pub blob: Arc<CountingBlobStore>,
    pub store: SessionStore,
    pub workspace: SharedWorkspace,
    pub progress: Arc<RecordingProgress>,
    pub orchestrator: Arc<BatchOrchestrator>,
    pub overrides: Arc<RowOverrideController>,
}

impl TestHarness {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self::with_chunk_size(replies, 15)
    }

    pub fn with_chunk_size(replies: Vec<Reply>, chunk_size: usize) -> Self {
        Self::build(
            ScriptedService::new(replies),
            Arc::new(CountingBlobStore::default()),
            chunk_size,
            OutputLanguage::English,
        )
    }

    pub fn build(
        service: Arc<ScriptedService>,
        blob: Arc<CountingBlobStore>,
        chunk_size: usize,
        language: OutputLanguage,
    ) -> Self {
        let client = GenerationClient::new(service.clone(), language);
        let store = SessionStore::new(blob.clone());
        let workspace = Workspace::new().shared();
        let progress = Arc::new(RecordingProgress::default());

        let orchestrator = BatchOrchestrator::new(
            client.clone(),
            store.clone(),
            workspace.clone(),
            progress.clone(),
            chunk_size,
        );
        let overrides = RowOverrideController::new(client, store.clone(), workspace.clone());

        Self {
            service,
            blob,
            store,
            workspace,
            progress,
            orchestrator: Arc::new(orchestrator),
            overrides: Arc::new(overrides),
        }
    }

    /// A fresh process over the same session storage.
    pub fn restart(&self, replies: Vec<Reply>) -> Self {
        Self::build(
            ScriptedService::new(replies),
            self.blob.clone(),
            self.orchestrator.chunk_size(),
            OutputLanguage::English,
        )
    }

    pub fn open(&self, records: Vec<Record>) {
        self.orchestrator
            .open("catalog.csv", records)
            .expect("open should succeed while idle");
    }

    pub fn ordered(&self) -> Vec<ProcessedRecord> {
        workspace::lock(&self.workspace).ordered()
    }

    pub fn ordered_keys(&self) -> Vec<String> {
        self.ordered().iter().map(|p| p.key().to_string()).collect()
    }

    pub fn row(&self, key: &str) -> ProcessedRecord {
        workspace::lock(&self.workspace)
            .processed(key)
            .cloned()
            .unwrap_or_else(|| panic!("no processed row for {key}"))
    }

    pub fn saved(&self) -> Option<SessionSnapshot> {
        self.store.load().expect("session blob should load")
    }
}
