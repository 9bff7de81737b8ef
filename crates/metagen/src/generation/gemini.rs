//! Gemini `generateContent` REST implementation of [`GenerationService`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GenerationConfig;
use crate::sanitize;

use super::prompt::build_prompt;
use super::{GenerationRequest, GenerationService, RawResponse, ServiceError};

/// Default connect timeout for HTTP requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GeminiService {
    client: Client,
    base_url: String,
    model: String,
    api_key: SecretString,
}

impl GeminiService {
    pub fn new(config: &GenerationConfig, api_key: SecretString) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServiceError::new(None, format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn redact(&self, text: &str) -> String {
        sanitize::redact_secret(text, self.api_key.expose_secret())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationSettings,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    total_token_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Removes a Markdown code fence some models wrap JSON output in.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[async_trait]
impl GenerationService for GeminiService {
    async fn generate(&self, request: &GenerationRequest) -> Result<RawResponse, ServiceError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(build_prompt(request)),
                }],
            }],
            generation_config: GenerationSettings {
                response_mime_type: "application/json",
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                ServiceError::new(e.status().map(|s| s.as_u16()), self.redact(&e.to_string()))
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::new(Some(status.as_u16()), self.redact(&e.to_string())))?;

        if !status.is_success() {
            let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&text) {
                Ok(ErrorEnvelope { error }) => {
                    let message = match error.status {
                        Some(code_name) => format!("{} ({})", error.message, code_name),
                        None => error.message,
                    };
                    (error.code.unwrap_or(status.as_u16()), message)
                }
                Err(_) => (
                    status.as_u16(),
                    format!("HTTP {}: {}", status.as_u16(), text.trim()),
                ),
            };
            return Err(ServiceError::new(Some(code), self.redact(&message)));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text).map_err(|e| {
            ServiceError::new(None, format!("Unexpected response envelope: {}", e))
        })?;

        let tokens_used = parsed
            .usage_metadata
            .as_ref()
            .map(|u| u.total_token_count)
            .unwrap_or(0);

        let output: String = parsed
            .candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect();

        if output.trim().is_empty() {
            let reason = parsed
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "empty response".to_string());
            return Err(ServiceError::new(None, format!("No content returned: {}", reason)));
        }

        debug!(tokens_used, bytes = output.len(), "Received generation response");

        let payload = serde_json::from_str(strip_code_fence(&output)).map_err(|e| {
            ServiceError::new(None, format!("Response was not valid JSON: {}", e))
        })?;

        Ok(RawResponse {
            payload,
            tokens_used,
        })
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
