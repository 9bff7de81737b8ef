use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::record::OutputLanguage;

/// Chunk size used when the config does not set one.
pub const DEFAULT_CHUNK_SIZE: usize = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub language: OutputLanguage,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub instructions_file: Option<String>,
    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            generation: GenerationConfig::default(),
            batch: BatchConfig::default(),
            language: OutputLanguage::default(),
            instructions: None,
            instructions_file: None,
            session: SessionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_api_key_env_var() -> Option<String> {
    Some("GEMINI_API_KEY".to_string())
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding the session blobs. Defaults to the platform data dir.
    #[serde(default)]
    pub directory: Option<String>,
}

impl SessionConfig {
    pub fn resolved_directory(&self) -> PathBuf {
        match &self.directory {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .map(|d| d.join("metagen"))
                .unwrap_or_else(|| PathBuf::from(".metagen")),
        }
    }
}
