pub mod app;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod generation;
pub mod ingest;
pub mod orchestrator;
pub mod overrides;
pub mod record;
pub mod sanitize;
pub mod secrets;
pub mod session;
pub mod workspace;

pub use app::MetagenApp;
pub use broadcast::{RunPhase, RunProgressBroadcaster, RunProgressEvent};
pub use config::{load_config, Config};
pub use error::{
    ConfigError, IngestError, MetagenError, OrchestratorError, OverrideError, Result,
};
pub use generation::{GenerationClient, GenerationError, GenerationService, Instructions};
pub use ingest::parse_and_normalize;
pub use orchestrator::{BatchOrchestrator, JobState, RunReport};
pub use overrides::{EditOutcome, RegenerateOutcome, RowOverrideController};
pub use record::{GeneratedField, GeneratedFields, OutputLanguage, ProcessedRecord, Record};
pub use secrets::{resolve_api_key, resolve_secret, SecretError};
pub use session::{SessionSnapshot, SessionStore};
pub use workspace::{SharedWorkspace, Workspace};
