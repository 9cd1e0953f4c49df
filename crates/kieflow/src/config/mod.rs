pub mod loader;
pub mod schema;

pub use loader::{default_config_path, load_config, load_config_from_str, load_config_or_default};
pub use schema::{
    BatchConfig, Config, LlmConfig, OcrConfig, SessionConfig, StorageConfig, CONFIG_VERSION,
};
