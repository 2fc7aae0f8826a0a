//! Storage configuration.
//!
//! ```toml
//! namespace = ["repos", "example"]
//! layout = "dual"
//! chunk_size = 10000
//! scan_page_size = 256
//! retry_limit = 10
//!
//! [limits]
//! max_value_size = 100000
//! ```
//!
//! Every field is optional; omitted fields take their defaults.

use std::path::Path;

use gitkv_backend::{KvLimits, MemoryOptions};
use gitkv_store::{KeyLayout, DEFAULT_CHUNK_SIZE, DEFAULT_PAGE_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Default transaction retry limit.
pub const DEFAULT_RETRY_LIMIT: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory path of the repository namespace.
    pub namespace: Vec<String>,
    /// Which object header keys are maintained.
    pub layout: KeyLayout,
    /// Object content chunk size in bytes.
    pub chunk_size: usize,
    /// Keys fetched per page when enumerating.
    pub scan_page_size: usize,
    /// Retries granted to a conflicting transaction.
    pub retry_limit: usize,
    /// Backend size ceilings.
    pub limits: KvLimits,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            namespace: vec!["gitkv".to_string()],
            layout: KeyLayout::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            scan_page_size: DEFAULT_PAGE_SIZE,
            retry_limit: DEFAULT_RETRY_LIMIT,
            limits: KvLimits::default(),
        }
    }
}

impl StorageConfig {
    /// Default settings for the given namespace path.
    pub fn for_namespace<S: Into<String>>(namespace: impl IntoIterator<Item = S>) -> Self {
        Self {
            namespace: namespace.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(toml: &str) -> StorageResult<Self> {
        let config: Self = toml::from_str(toml)
            .map_err(|e| StorageError::Config(format!("failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StorageError::Config(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> StorageResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| StorageError::Config(format!("failed to encode TOML: {e}")))
    }

    /// Validate configuration values, returning the first problem found.
    pub fn validate(&self) -> StorageResult<()> {
        if self.namespace.is_empty() {
            return Err(StorageError::Config("namespace must not be empty".into()));
        }
        if self.namespace.iter().any(String::is_empty) {
            return Err(StorageError::Config(format!(
                "namespace {:?} has an empty segment",
                self.namespace
            )));
        }
        if self.chunk_size == 0 {
            return Err(StorageError::Config("chunk_size must be greater than 0".into()));
        }
        if self.chunk_size > self.limits.max_value_size {
            return Err(StorageError::Config(format!(
                "chunk_size {} exceeds limits.max_value_size {}",
                self.chunk_size, self.limits.max_value_size
            )));
        }
        if self.scan_page_size == 0 {
            return Err(StorageError::Config(
                "scan_page_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Options for an in-memory backend matching this configuration.
    pub fn memory_options(&self) -> MemoryOptions {
        MemoryOptions {
            limits: self.limits,
            retry_limit: self.retry_limit,
            ..MemoryOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let c = StorageConfig::default();
        assert_eq!(c.layout, KeyLayout::Dual);
        assert_eq!(c.chunk_size, 10_000);
        assert_eq!(c.scan_page_size, 256);
        assert_eq!(c.retry_limit, 10);
        assert_eq!(c.limits.max_value_size, 100_000);
        c.validate().unwrap();
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let c = StorageConfig::from_toml_str(
            r#"
            namespace = ["repos", "alice"]
            layout = "type-first"
            "#,
        )
        .unwrap();
        assert_eq!(c.namespace, vec!["repos", "alice"]);
        assert_eq!(c.layout, KeyLayout::TypeFirst);
        assert_eq!(c.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn nested_limits_parse() {
        let c = StorageConfig::from_toml_str(
            r#"
            chunk_size = 4096
            [limits]
            max_value_size = 8192
            "#,
        )
        .unwrap();
        assert_eq!(c.limits.max_value_size, 8192);
        assert_eq!(c.limits.max_key_size, 10_000);
        assert_eq!(c.memory_options().limits, c.limits);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            "namespace = []",
            r#"namespace = ["a", ""]"#,
            "chunk_size = 0",
            "chunk_size = 200000",
            "scan_page_size = 0",
            r#"layout = "sideways""#,
        ];
        for toml in cases {
            assert!(
                matches!(StorageConfig::from_toml_str(toml), Err(StorageError::Config(_))),
                "{toml}"
            );
        }
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "namespace = [\"from\", \"file\"]").unwrap();
        writeln!(file, "retry_limit = 3").unwrap();
        let c = StorageConfig::load(file.path()).unwrap();
        assert_eq!(c.namespace, vec!["from", "file"]);
        assert_eq!(c.retry_limit, 3);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StorageConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn toml_round_trip() {
        let c = StorageConfig::for_namespace(["x", "y"]);
        let back = StorageConfig::from_toml_str(&c.to_toml_string().unwrap()).unwrap();
        assert_eq!(back, c);
    }
}
