use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetagenError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Generation error: {0}")]
    Generation(#[from] crate::generation::GenerationError),

    #[error("Session error: {0}")]
    Session(#[from] crate::session::SessionError),

    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("Row override error: {0}")]
    Override(#[from] OverrideError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Failures raised while turning an uploaded file into canonical records.
/// All of them occur before any working state exists.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to parse spreadsheet: {0}")]
    Parse(String),

    #[error("No product rows found in file")]
    EmptyFile,

    #[error("Missing required columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("First row is missing a value for required column '{column}'")]
    MissingRequiredValue { column: String },

    #[error("Failed to write export: {0}")]
    Export(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("A generation run is already in progress")]
    AlreadyRunning,

    #[error("No session is loaded to resume")]
    NothingToResume,

    #[error("No products are loaded")]
    NoRecords,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OverrideError {
    #[error("No product with SKU '{0}' in the current session")]
    UnknownKey(String),

    #[error("Unknown column '{0}'")]
    UnknownField(String),

    #[error("The SKU column cannot be edited")]
    KeyNotEditable,

    #[error("Product '{0}' is currently being generated")]
    KeyBusy(String),
}

pub type Result<T> = std::result::Result<T, MetagenError>;
