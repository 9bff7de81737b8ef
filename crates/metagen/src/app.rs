//! Wiring of the orchestrator, the row override controller and the stores
//! around one shared workspace.

use std::sync::Arc;

use log::info;

use crate::broadcast::RunProgressBroadcaster;
use crate::config::{load_instructions, Config};
use crate::error::Result;
use crate::generation::{
    GeminiService, GenerationClient, GenerationError, GenerationService, Instructions,
    UnavailableService,
};
use crate::ingest::{export_csv, export_file_name};
use crate::orchestrator::{BatchOrchestrator, BroadcastProgress};
use crate::overrides::RowOverrideController;
use crate::record::OutputLanguage;
use crate::secrets::resolve_api_key;
use crate::session::{BlobStore, FileBlobStore, InstructionStore, SessionStore};
use crate::workspace::{self, SharedWorkspace, Workspace};

pub struct MetagenApp {
    pub orchestrator: Arc<BatchOrchestrator>,
    pub overrides: Arc<RowOverrideController>,
    pub broadcaster: RunProgressBroadcaster,
    instructions: InstructionStore,
    configured_instructions: Instructions,
    language: OutputLanguage,
    workspace: SharedWorkspace,
}

impl MetagenApp {
    /// Production constructor: Gemini service, file-backed session store.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = resolve_api_key(&config.generation)?;
        let service = GeminiService::new(&config.generation, api_key)
            .map_err(|e| GenerationError::Failed(e.message))?;
        Self::with_service(config, Arc::new(service))
    }

    /// Like [`MetagenApp::from_config`] but never needs an API key. Any
    /// generation attempt fails with `reason`.
    pub fn offline(config: &Config, reason: &str) -> Result<Self> {
        Self::with_service(config, Arc::new(UnavailableService::new(reason)))
    }

    fn with_service(config: &Config, service: Arc<dyn GenerationService>) -> Result<Self> {
        let directory = config.session.resolved_directory();
        info!("Session directory: {}", directory.display());
        let blob: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(directory));

        let mut app = Self::new(
            service,
            blob,
            RunProgressBroadcaster::default(),
            config.language,
            config.batch.chunk_size,
        );
        app.configured_instructions = load_instructions(config)?;
        Ok(app)
    }

    /// Assembles an app from injected parts. Run progress is published on
    /// `broadcaster`.
    pub fn new(
        service: Arc<dyn GenerationService>,
        blob: Arc<dyn BlobStore>,
        broadcaster: RunProgressBroadcaster,
        language: OutputLanguage,
        chunk_size: usize,
    ) -> Self {
        let workspace = Workspace::new().shared();
        let progress = BroadcastProgress::new(broadcaster.clone());
        let client = GenerationClient::new(service, language);
        let store = SessionStore::new(Arc::clone(&blob));

        let orchestrator = BatchOrchestrator::new(
            client.clone(),
            store.clone(),
            Arc::clone(&workspace),
            progress,
            chunk_size,
        );
        let overrides = RowOverrideController::new(client, store, Arc::clone(&workspace));

        Self {
            orchestrator: Arc::new(orchestrator),
            overrides: Arc::new(overrides),
            broadcaster,
            instructions: InstructionStore::new(blob),
            configured_instructions: Instructions::default(),
            language,
            workspace,
        }
    }

    pub fn workspace(&self) -> SharedWorkspace {
        Arc::clone(&self.workspace)
    }

    /// Saved user instructions win over configured ones.
    pub fn instructions(&self) -> Result<Instructions> {
        Ok(self
            .instructions
            .load()?
            .unwrap_or_else(|| self.configured_instructions.clone()))
    }

    pub fn save_instructions(&self, instructions: &Instructions) -> Result<()> {
        self.instructions.save(instructions)?;
        Ok(())
    }

    pub fn reset_instructions(&self) -> Result<()> {
        self.instructions.reset()?;
        Ok(())
    }

    /// Serializes the processed rows for download. Returns the file name and
    /// the CSV bytes.
    pub fn export(&self) -> Result<(String, Vec<u8>)> {
        let ws = workspace::lock(&self.workspace);
        let bytes = export_csv(&ws.ordered(), self.language)?;
        Ok((export_file_name(ws.file_name()), bytes))
    }
}
