//! Credential lookup for the OCR and LLM services.
//!
//! A credential can be configured three ways, checked in this order:
//! an inline value, a file holding the value (Docker secrets), or the name of
//! an environment variable.

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source configured")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// The configured places a single credential may come from.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSource<'a> {
    pub direct: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

impl SecretSource<'_> {
    pub fn is_configured(&self) -> bool {
        non_empty(self.direct).is_some()
            || non_empty(self.file).is_some()
            || non_empty(self.env_var).is_some()
    }

    pub fn resolve(&self) -> Result<SecretString, SecretError> {
        if let Some(value) = non_empty(self.direct) {
            return Ok(SecretString::from(value.to_string()));
        }

        if let Some(path) = non_empty(self.file) {
            let expanded = expand_home(path);
            return std::fs::read_to_string(&expanded)
                .map(|content| SecretString::from(content.trim().to_string()))
                .map_err(|source| SecretError::FileRead {
                    path: expanded,
                    source,
                });
        }

        if let Some(name) = non_empty(self.env_var) {
            return match std::env::var(name) {
                Ok(value) => Ok(SecretString::from(value.trim().to_string())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Err(SecretError::NoSourceProvided)
    }

    /// Like [`resolve`](Self::resolve) but an unconfigured credential is `None`.
    pub fn resolve_optional(&self) -> Result<Option<SecretString>, SecretError> {
        match self.resolve() {
            Ok(secret) => Ok(Some(secret)),
            Err(SecretError::NoSourceProvided) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn test_direct_value_wins() {
        std::env::set_var("KIEFLOW_TEST_SECRET_1", "from-env");
        let source = SecretSource {
            direct: Some("inline"),
            file: None,
            env_var: Some("KIEFLOW_TEST_SECRET_1"),
        };
        assert_eq!(source.resolve().unwrap().expose_secret(), "inline");
        std::env::remove_var("KIEFLOW_TEST_SECRET_1");
    }

    #[test]
    #[serial]
    fn test_file_wins_over_env() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "  from-file  ").unwrap();
        std::env::set_var("KIEFLOW_TEST_SECRET_2", "from-env");

        let path = file.path().to_str().unwrap().to_string();
        let source = SecretSource {
            direct: Some(""),
            file: Some(&path),
            env_var: Some("KIEFLOW_TEST_SECRET_2"),
        };
        assert_eq!(source.resolve().unwrap().expose_secret(), "from-file");
        std::env::remove_var("KIEFLOW_TEST_SECRET_2");
    }

    #[test]
    #[serial]
    fn test_env_fallback() {
        std::env::set_var("KIEFLOW_TEST_SECRET_3", "from-env\n");
        let source = SecretSource {
            env_var: Some("KIEFLOW_TEST_SECRET_3"),
            ..Default::default()
        };
        assert_eq!(source.resolve().unwrap().expose_secret(), "from-env");
        std::env::remove_var("KIEFLOW_TEST_SECRET_3");
    }

    #[test]
    fn test_unconfigured_is_optional_none() {
        let source = SecretSource::default();
        assert!(!source.is_configured());
        assert!(matches!(source.resolve(), Err(SecretError::NoSourceProvided)));
        assert!(source.resolve_optional().unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_error() {
        let source = SecretSource {
            file: Some("/nonexistent/kieflow/secret"),
            ..Default::default()
        };
        assert!(matches!(
            source.resolve_optional(),
            Err(SecretError::FileRead { .. })
        ));
    }

    #[test]
    fn test_missing_env_var_is_error() {
        let source = SecretSource {
            env_var: Some("KIEFLOW_DEFINITELY_UNSET_98765"),
            ..Default::default()
        };
        assert!(matches!(
            source.resolve(),
            Err(SecretError::EnvVarNotSet { .. })
        ));
    }

    #[test]
    fn test_expand_home_leaves_other_paths() {
        assert_eq!(expand_home("/abs/path"), "/abs/path");
        assert_eq!(expand_home("rel/path"), "rel/path");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                expand_home("~/x"),
                format!("{}/x", home.to_string_lossy())
            );
        }
    }
}
