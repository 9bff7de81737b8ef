//! Generation of SEO meta content through an external text service.
//!
//! [`GenerationService`] is the raw external capability (one HTTP call per
//! request). [`GenerationClient`] wraps it with the contract the rest of the
//! crate relies on: stripped inputs, one result per input key, schema
//! validation, and quota-vs-failure classification.

pub mod client;
pub mod gemini;
pub mod prompt;

use async_trait::async_trait;
use thiserror::Error;

use crate::record::{OutputLanguage, Record};

pub use client::{classify, BatchResult, GenerationClient, SingleResult};
pub use gemini::GeminiService;
pub use prompt::{build_prompt, Instructions, DEFAULT_INSTRUCTIONS};

/// Classified failure of a generation call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// The service reported resource exhaustion (quota or rate limit).
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Any other failure, including malformed responses.
    #[error("Generation failed: {0}")]
    Failed(String),
}

impl GenerationError {
    pub fn detail(&self) -> &str {
        match self {
            GenerationError::QuotaExceeded(d) | GenerationError::Failed(d) => d,
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, GenerationError::QuotaExceeded(_))
    }
}

/// Unclassified failure reported by a service implementation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ServiceError {
    /// HTTP status (or provider error code) when one is known.
    pub status: Option<u16>,
    pub message: String,
}

impl ServiceError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// One request to the service. Records are already stripped of generated fields.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub records: Vec<Record>,
    pub instructions: String,
    pub language: OutputLanguage,
}

/// Raw structured payload returned by the service plus its token usage.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub payload: serde_json::Value,
    pub tokens_used: u64,
}

/// External text generation capability.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<RawResponse, ServiceError>;

    /// Short provider name for logs.
    fn name(&self) -> &str;
}

/// Stand-in used when no API key is available. Every call fails with the
/// reason, so offline commands (status, export, edit) still work.
pub struct UnavailableService {
    reason: String,
}

impl UnavailableService {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl GenerationService for UnavailableService {
    async fn generate(&self, _request: &GenerationRequest) -> Result<RawResponse, ServiceError> {
        Err(ServiceError::new(
            None,
            format!("Generation service unavailable: {}", self.reason),
        ))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}
