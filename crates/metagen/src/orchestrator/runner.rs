use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::generation::{GenerationClient, GenerationError};
use crate::record::Record;
use crate::sanitize;
use crate::session::{SessionError, SessionSnapshot, SessionStore};
use crate::workspace::{self, SharedWorkspace};

use super::progress::{ProgressEvent, ProgressReporter};
use super::state::{JobState, RunReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    Fresh,
    Resume,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Fresh => write!(f, "fresh"),
            RunMode::Resume => write!(f, "resume"),
        }
    }
}

/// Summary of a restored session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredSession {
    pub file_name: String,
    pub processed: usize,
    pub total: usize,
    pub resumable: bool,
    /// Processed rows dropped because their SKU is not in the upload.
    pub orphaned: usize,
}

/// Drives chunked generation runs over the shared workspace.
///
/// Exactly one run may be active at a time. Runs are cancelled
/// cooperatively: the token is checked before each chunk is dispatched, so
/// an in-flight call always completes and merges.
pub struct BatchOrchestrator {
    client: GenerationClient,
    store: SessionStore,
    workspace: SharedWorkspace,
    progress: Arc<dyn ProgressReporter>,
    chunk_size: usize,
    active: Mutex<Option<CancellationToken>>,
}

impl BatchOrchestrator {
    pub fn new(
        client: GenerationClient,
        store: SessionStore,
        workspace: SharedWorkspace,
        progress: Arc<dyn ProgressReporter>,
        chunk_size: usize,
    ) -> Self {
        Self {
            client,
            store,
            workspace,
            progress,
            chunk_size: chunk_size.max(1),
            active: Mutex::new(None),
        }
    }

    pub fn workspace(&self) -> SharedWorkspace {
        Arc::clone(&self.workspace)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn state(&self) -> JobState {
        workspace::lock(&self.workspace).state()
    }

    /// Loads a freshly parsed upload, superseding any persisted session.
    pub fn open(&self, file_name: &str, records: Vec<Record>) -> Result<(), OrchestratorError> {
        let snapshot = {
            let mut ws = workspace::lock(&self.workspace);
            if ws.state() == JobState::Running {
                return Err(OrchestratorError::AlreadyRunning);
            }
            ws.load(file_name, records);
            if ws.unmatchable_count() > 0 {
                warn!(
                    skipped = ws.unmatchable_count(),
                    "Rows without a SKU will not be generated"
                );
            }
            ws.snapshot()
        };
        info!(
            file = %sanitize::redact_path(Path::new(file_name)),
            total = snapshot.total(),
            "Opened upload"
        );
        self.persist(&snapshot);
        Ok(())
    }

    /// Restores the persisted session into the workspace, if there is one.
    pub fn restore(&self) -> Result<Option<RestoredSession>, SessionError> {
        let Some(snapshot) = self.store.load()? else {
            return Ok(None);
        };

        let mut ws = workspace::lock(&self.workspace);
        if ws.state() == JobState::Running {
            // The live run owns the workspace; its snapshot is newer.
            return Ok(None);
        }
        let orphaned = ws.restore(snapshot);
        if orphaned > 0 {
            warn!(orphaned, "Dropped processed rows with unknown SKUs from restored session");
        }

        Ok(Some(RestoredSession {
            file_name: ws.file_name().to_string(),
            processed: ws.processed_count(),
            total: ws.total(),
            resumable: ws.resumable(),
            orphaned,
        }))
    }

    /// Forgets the persisted session and clears the workspace.
    pub fn dismiss(&self) -> crate::error::Result<()> {
        {
            let mut ws = workspace::lock(&self.workspace);
            if ws.state() == JobState::Running {
                return Err(OrchestratorError::AlreadyRunning.into());
            }
            ws.load("", Vec::new());
        }
        self.store.clear()?;
        info!("Dismissed session");
        Ok(())
    }

    /// Requests cancellation of the active run. Returns `false` when nothing
    /// is running.
    pub fn stop(&self) -> bool {
        let guard = self.active.lock().unwrap_or_else(|p| p.into_inner());
        match guard.as_ref() {
            Some(token) => {
                info!("Stop requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Runs generation over every loaded record, discarding prior results.
    pub async fn start(
        &self,
        instructions: &str,
        cancel: CancellationToken,
    ) -> Result<RunReport, OrchestratorError> {
        self.run(RunMode::Fresh, instructions, cancel).await
    }

    /// Runs generation over the loaded records that have not been processed.
    pub async fn resume(
        &self,
        instructions: &str,
        cancel: CancellationToken,
    ) -> Result<RunReport, OrchestratorError> {
        self.run(RunMode::Resume, instructions, cancel).await
    }

    async fn run(
        &self,
        mode: RunMode,
        instructions: &str,
        cancel: CancellationToken,
    ) -> Result<RunReport, OrchestratorError> {
        let (records, file_name, processed, total) = {
            let mut ws = workspace::lock(&self.workspace);
            if !ws.state().can_start() {
                return Err(OrchestratorError::AlreadyRunning);
            }
            if !ws.is_loaded() {
                return Err(match mode {
                    RunMode::Fresh => OrchestratorError::NoRecords,
                    RunMode::Resume => OrchestratorError::NothingToResume,
                });
            }
            if mode == RunMode::Fresh {
                ws.clear_processed();
            }
            ws.begin_run();
            (
                ws.remaining(),
                ws.file_name().to_string(),
                ws.processed_count(),
                ws.total(),
            )
        };
        *self.active.lock().unwrap_or_else(|p| p.into_inner()) = Some(cancel.clone());

        let job_id = Uuid::new_v4().to_string();
        let mut guard = RunGuard {
            orchestrator: self,
            job_id: job_id.clone(),
            file_name: file_name.clone(),
            settled: false,
        };
        let span = info_span!("generation_run",
            job_id = %job_id,
            file = %sanitize::redact_path(Path::new(&file_name)),
            mode = %mode,
        );

        let report = self
            .drive(&job_id, &file_name, records, processed, total, instructions, &cancel)
            .instrument(span)
            .await;

        guard.settled = true;
        drop(guard);
        self.progress.report(ProgressEvent::Settled {
            file_name,
            report: report.clone(),
        });
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        job_id: &str,
        file_name: &str,
        records: Vec<Record>,
        processed: usize,
        total: usize,
        instructions: &str,
        cancel: &CancellationToken,
    ) -> RunReport {
        let chunks: Vec<&[Record]> = records.chunks(self.chunk_size).collect();
        let chunk_count = chunks.len();
        info!(
            pending = records.len(),
            processed,
            total,
            chunk_count,
            "Starting generation run"
        );
        self.progress.report(ProgressEvent::Started {
            job_id: job_id.to_string(),
            file_name: file_name.to_string(),
            processed,
            total,
            chunk_count,
        });

        let mut tokens_used = 0u64;
        for (index, chunk) in chunks.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!(chunk = index + 1, "Cancelled before dispatch");
                return self.settle(job_id, JobState::Stopped, tokens_used, None);
            }

            workspace::lock(&self.workspace).claim_bulk(chunk);
            let result = self
                .client
                .generate_batch(chunk, instructions)
                .instrument(info_span!("chunk", index = index + 1, size = chunk.len()))
                .await;
            workspace::lock(&self.workspace).release_bulk();

            let batch = match result {
                Ok(batch) => batch,
                Err(GenerationError::QuotaExceeded(detail)) => {
                    warn!(chunk = index + 1, detail = %detail, "Quota exceeded");
                    return self.settle(job_id, JobState::QuotaExceeded, tokens_used, None);
                }
                Err(GenerationError::Failed(detail)) => {
                    warn!(chunk = index + 1, detail = %detail, "Generation failed");
                    return self.settle(job_id, JobState::Failed, tokens_used, Some(detail));
                }
            };

            tokens_used += batch.tokens_used;
            if batch.missing > 0 {
                warn!(
                    chunk = index + 1,
                    missing = batch.missing,
                    "Service omitted products; marked with the no-response sentinel"
                );
            }

            let (processed, snapshot) = {
                let mut ws = workspace::lock(&self.workspace);
                ws.merge(batch.results);
                (ws.processed_count(), ws.snapshot())
            };
            self.persist(&snapshot);
            debug!(chunk = index + 1, processed, total, "Merged chunk");

            self.progress.report(ProgressEvent::ChunkMerged {
                job_id: job_id.to_string(),
                file_name: file_name.to_string(),
                chunk: index + 1,
                chunk_count,
                processed,
                total,
                tokens_used,
            });
        }

        self.settle(job_id, JobState::Completed, tokens_used, None)
    }

    /// Moves the workspace into a terminal state and persists the result.
    fn settle(
        &self,
        job_id: &str,
        outcome: JobState,
        tokens_used: u64,
        detail: Option<String>,
    ) -> RunReport {
        let (report, snapshot) = {
            let mut ws = workspace::lock(&self.workspace);
            let processed = ws.processed_count();
            let total = ws.total();
            let resumable = outcome.leaves_resumable();
            let message = match outcome {
                JobState::Completed => format!(
                    "Generated meta content for {} products ({} tokens used).",
                    processed, tokens_used
                ),
                JobState::Stopped => format!(
                    "Generation stopped. {} of {} products processed.",
                    processed, total
                ),
                JobState::QuotaExceeded => format!(
                    "API quota exceeded. {} of {} products processed. \
                     You can download partial results or resume generation later.",
                    processed, total
                ),
                _ => detail.unwrap_or_else(|| "Generation failed".to_string()),
            };
            ws.finish_run(outcome, resumable, message.clone());

            let report = RunReport {
                job_id: job_id.to_string(),
                outcome,
                processed,
                total,
                tokens_used,
                resumable,
                message,
            };
            (report, ws.snapshot())
        };

        self.persist(&snapshot);
        info!(
            outcome = %report.outcome,
            processed = report.processed,
            total = report.total,
            tokens_used = report.tokens_used,
            "Generation run settled"
        );
        report
    }

    fn clear_active(&self) {
        *self.active.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }

    /// Settles a run whose future was dropped mid-flight as stopped. The
    /// in-flight chunk is discarded and its keys are released.
    fn abandon(&self, job_id: &str, file_name: &str) {
        if self.state() != JobState::Running {
            return;
        }
        warn!(job_id = %job_id, "Generation run dropped before settling");
        let report = self.settle(job_id, JobState::Stopped, 0, None);
        self.progress.report(ProgressEvent::Settled {
            file_name: file_name.to_string(),
            report,
        });
    }

    /// Persistence failures are logged and never abort a run.
    fn persist(&self, snapshot: &SessionSnapshot) {
        if let Err(e) = self.store.save(snapshot) {
            warn!(error = %e, "Failed to persist session snapshot");
        }
    }
}

/// Releases the active run when its future is dropped before settling, so
/// the workspace never stays `Running` without a driver.
struct RunGuard<'a> {
    orchestrator: &'a BatchOrchestrator,
    job_id: String,
    file_name: String,
    settled: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.clear_active();
        if !self.settled {
            self.orchestrator.abandon(&self.job_id, &self.file_name);
        }
    }
}
