use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::secrets::{expand_home, SecretSource};

pub const CONFIG_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// SQLite database file. Defaults to `~/.kieflow/data/kieflow.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            database_path: None,
            storage: StorageConfig::default(),
            ocr: OcrConfig::default(),
            llm: LlmConfig::default(),
            batch: BatchConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(PathBuf::from(expand_home(path))),
            None => crate::db::default_database_path(),
        }
    }
}

/// Object storage: uploaded files live under `root/bucket/filename`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

fn default_storage_root() -> String {
    "~/.kieflow/storage".to_string()
}

fn default_bucket() -> String {
    "kyc-files".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            bucket: default_bucket(),
        }
    }
}

impl StorageConfig {
    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(expand_home(&self.root))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_ocr_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_file: Option<String>,
    #[serde(default)]
    pub token_env_var: Option<String>,
}

fn default_ocr_endpoint() -> String {
    "http://localhost:8866/".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ocr_endpoint(),
            timeout_secs: default_timeout_secs(),
            token: None,
            token_file: None,
            token_env_var: None,
        }
    }
}

impl OcrConfig {
    pub fn resolve_token(&self) -> Result<Option<SecretString>, ConfigError> {
        SecretSource {
            direct: self.token.as_deref(),
            file: self.token_file.as_deref(),
            env_var: self.token_env_var.as_deref(),
        }
        .resolve_optional()
        .map_err(|source| ConfigError::Secret {
            name: "ocr.token".to_string(),
            source,
        })
    }
}

/// OpenAI-compatible chat completion service used for extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Prompt with `{text}` and `{format_instructions}` placeholders.
    #[serde(default)]
    pub prompt_template: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default)]
    pub api_key_env_var: Option<String>,
}

fn default_api_base() -> String {
    "http://localhost:8000/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u32 {
    200
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
            prompt_template: None,
            api_key: None,
            api_key_file: None,
            api_key_env_var: None,
        }
    }
}

impl LlmConfig {
    pub fn resolve_api_key(&self) -> Result<Option<SecretString>, ConfigError> {
        SecretSource {
            direct: self.api_key.as_deref(),
            file: self.api_key_file.as_deref(),
            env_var: self.api_key_env_var.as_deref(),
        }
        .resolve_optional()
        .map_err(|source| ConfigError::Secret {
            name: "llm.api_key".to_string(),
            source,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Minimum delay between two collaborator calls in a batch. 0 disables throttling.
    #[serde(default)]
    pub min_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_idle_timeout() -> u64 {
    30 * 60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}
