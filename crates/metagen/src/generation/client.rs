use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::record::{GeneratedFields, OutputLanguage, Record, NO_RESPONSE_SENTINEL};
use crate::sanitize;

use super::{GenerationError, GenerationRequest, GenerationService, ServiceError};

/// Wording providers use for quota and rate-limit exhaustion. Status codes
/// are only trusted from the response status, never from message text.
static QUOTA_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(resource[\s_-]?(has\s+been\s+)?exhausted|exceeded\s+(your\s+)?(current\s+)?quota|quota\s+(has\s+been\s+)?exceeded|rate[\s_-]?limit(ed)?|too\s+many\s+requests)\b",
    )
    .expect("quota pattern is valid")
});

/// Classifies a raw service failure. Quota exhaustion is kept distinct
/// because it makes a run resumable rather than failed.
pub fn classify(error: &ServiceError) -> GenerationError {
    let detail = sanitize::truncate_detail(&error.message);
    if error.status == Some(429) || QUOTA_PATTERN.is_match(&error.message) {
        GenerationError::QuotaExceeded(detail)
    } else {
        GenerationError::Failed(detail)
    }
}

/// Results for one batch, one entry per input record in input order.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub results: Vec<(String, GeneratedFields)>,
    pub tokens_used: u64,
    /// How many keys the service left out (filled with the sentinel).
    pub missing: usize,
}

#[derive(Debug, Clone)]
pub struct SingleResult {
    pub generated: GeneratedFields,
    pub tokens_used: u64,
}

/// Uniform result-or-typed-failure wrapper around a [`GenerationService`].
/// Never retries; a failure is returned to the caller as-is.
#[derive(Clone)]
pub struct GenerationClient {
    service: Arc<dyn GenerationService>,
    language: OutputLanguage,
}

impl GenerationClient {
    pub fn new(service: Arc<dyn GenerationService>, language: OutputLanguage) -> Self {
        Self { service, language }
    }

    pub fn language(&self) -> OutputLanguage {
        self.language
    }

    /// Generates content for a batch. On success there is exactly one result
    /// per input record; keys the service omitted get [`NO_RESPONSE_SENTINEL`].
    pub async fn generate_batch(
        &self,
        records: &[Record],
        instructions: &str,
    ) -> Result<BatchResult, GenerationError> {
        let (mut by_key, tokens_used) = self.call(records, instructions).await?;

        let mut missing = 0;
        let results = records
            .iter()
            .map(|record| {
                let generated = by_key.remove(&record.key).unwrap_or_else(|| {
                    missing += 1;
                    GeneratedFields::sentinel(self.language, NO_RESPONSE_SENTINEL)
                });
                (record.key.clone(), generated)
            })
            .collect();

        if missing > 0 {
            warn!(
                missing,
                requested = records.len(),
                "Service response omitted some products"
            );
        }

        Ok(BatchResult {
            results,
            tokens_used,
            missing,
        })
    }

    /// Generates content for a single record.
    pub async fn generate_one(
        &self,
        record: &Record,
        instructions: &str,
    ) -> Result<SingleResult, GenerationError> {
        let (mut by_key, tokens_used) =
            self.call(std::slice::from_ref(record), instructions).await?;

        let generated = by_key.remove(&record.key).ok_or_else(|| {
            GenerationError::Failed(format!("No AI response for '{}'", record.key))
        })?;

        Ok(SingleResult {
            generated,
            tokens_used,
        })
    }

    async fn call(
        &self,
        records: &[Record],
        instructions: &str,
    ) -> Result<(HashMap<String, GeneratedFields>, u64), GenerationError> {
        let request = GenerationRequest {
            records: records.iter().map(Record::stripped).collect(),
            instructions: instructions.to_string(),
            language: self.language,
        };

        debug!(
            service = self.service.name(),
            records = request.records.len(),
            "Sending generation request"
        );

        let response = self
            .service
            .generate(&request)
            .await
            .map_err(|e| classify(&e))?;

        let by_key = parse_payload(&response.payload, self.language)
            .map_err(|reason| GenerationError::Failed(format!("Malformed response: {}", reason)))?;

        Ok((by_key, response.tokens_used))
    }
}

/// Validates the service payload shape and indexes results by SKU.
///
/// Accepts a bare array, or an object wrapping the array under `products` or
/// `results`. Every element must be an object with a string `sku` and a
/// string for each field the language requires.
pub fn parse_payload(
    payload: &Value,
    language: OutputLanguage,
) -> Result<HashMap<String, GeneratedFields>, String> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("products").or_else(|| map.get("results")) {
            Some(Value::Array(items)) => items,
            _ => return Err("expected an array of products".to_string()),
        },
        _ => return Err("expected an array of products".to_string()),
    };

    let mut by_key = HashMap::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let object = item
            .as_object()
            .ok_or_else(|| format!("item {} is not an object", index))?;

        let sku = match object.get("sku") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(format!("item {} has no 'sku'", index)),
        };

        let mut generated = GeneratedFields::default();
        for field in language.fields() {
            let value = object
                .get(field.json_key())
                .and_then(Value::as_str)
                .ok_or_else(|| format!("item '{}' is missing '{}'", sku, field.json_key()))?;
            generated.set(*field, value.trim().to_string());
        }

        by_key.insert(sku, generated);
    }

    Ok(by_key)
}
