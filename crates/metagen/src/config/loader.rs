use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::generation::Instructions;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Resolves the effective instructions: inline text wins over a file, and
/// neither means the built-in default.
pub fn load_instructions(config: &Config) -> Result<Instructions, ConfigError> {
    if let Some(text) = &config.instructions {
        return Ok(Instructions::custom(text.clone()));
    }
    if let Some(file) = &config.instructions_file {
        let text = std::fs::read_to_string(file).map_err(|e| ConfigError::ReadFile {
            path: file.into(),
            source: e,
        })?;
        return Ok(Instructions::custom(text));
    }
    Ok(Instructions::default())
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.batch.chunk_size == 0 {
        return Err(ConfigError::Validation {
            message: "batch.chunk_size must be at least 1".to_string(),
        });
    }

    if config.generation.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "generation.timeout_secs must be at least 1".to_string(),
        });
    }

    if !config.generation.base_url.starts_with("http://")
        && !config.generation.base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation {
            message: format!(
                "generation.base_url must be an http(s) URL: {}",
                config.generation.base_url
            ),
        });
    }

    Ok(())
}
