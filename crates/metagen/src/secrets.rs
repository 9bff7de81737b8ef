//! Resolution of the generation service API key.
//!
//! Sources are tried in priority order:
//!
//! 1. **Direct value** from the config (`api_key`), for quick local testing
//! 2. **File reference** (`api_key_file`), for Docker-style secrets
//! 3. **Env var reference** (`api_key_env_var`, `GEMINI_API_KEY` by default)

use secrecy::SecretString;
use std::fs;

use crate::config::GenerationConfig;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No API key configured (set api_key, api_key_file, or api_key_env_var)")]
    NoSourceProvided,

    #[error("Failed to read API key from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves the API key for the configured generation service.
pub fn resolve_api_key(config: &GenerationConfig) -> Result<SecretString> {
    resolve_secret(
        config.api_key.as_deref(),
        config.api_key_file.as_deref(),
        config.api_key_env_var.as_deref(),
    )
}

/// Resolves a secret from a direct value, a file, or an environment
/// variable, in that order. Empty values are skipped.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        return fs::read_to_string(&expanded)
            .map(|content| SecretString::from(content.trim().to_string()))
            .map_err(|e| SecretError::FileReadError {
                path: expanded,
                source: e,
            });
    }

    if let Some(name) = env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(name) {
            Ok(value) if !value.is_empty() => Ok(SecretString::from(value)),
            Ok(_) | Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).display().to_string();
        }
    }
    path.to_string()
}
