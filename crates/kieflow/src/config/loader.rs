use std::path::{Path, PathBuf};

use crate::config::schema::{Config, CONFIG_VERSION};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

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

/// Loads an explicit config file, or the default one when it exists.
///
/// An explicit path must exist. A missing default file yields the built-in
/// defaults.
pub fn load_config_or_default(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    match default_config_path() {
        Some(path) if path.exists() => load_config(path),
        _ => {
            log::debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

/// `~/.kieflow/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".kieflow").join("config.json"))
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
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.storage.bucket.trim().is_empty() || config.storage.bucket.contains('/') {
        return Err(ConfigError::Validation {
            message: format!("Invalid storage bucket name: '{}'", config.storage.bucket),
        });
    }

    validate_url("ocr.endpoint", &config.ocr.endpoint)?;
    validate_url("llm.api_base", &config.llm.api_base)?;

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        return Err(ConfigError::Validation {
            message: format!(
                "llm.temperature must be between 0 and 2, got {}",
                config.llm.temperature
            ),
        });
    }

    if let Some(template) = &config.llm.prompt_template {
        if !template.contains("{text}") {
            return Err(ConfigError::Validation {
                message: "llm.prompt_template must contain a {text} placeholder".to_string(),
            });
        }
    }

    Ok(())
}

fn validate_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value).map_err(|e| ConfigError::Validation {
        message: format!("{} is not a valid URL '{}': {}", key, value, e),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Validation {
            message: format!("{} must use http or https, got '{}'", key, other),
        }),
    }
}
