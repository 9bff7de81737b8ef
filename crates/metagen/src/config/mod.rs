pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, load_instructions};
pub use schema::{BatchConfig, Config, GenerationConfig, SessionConfig, DEFAULT_CHUNK_SIZE};
