//! Configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file
//! at all) is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub server: ServerConfig,
}

/// Limits and markers used while printing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Nested `ExpandedItem` splices allowed before truncation
    pub max_expansion_depth: usize,
    /// Nested display strings rendered before truncation
    pub max_format_depth: usize,
    /// Inline marker for a failed expression, `{}` is replaced by the message
    pub error_marker: String,
    /// Rendered instead of recursing into a value already being printed
    pub cycle_marker: String,
    /// Characters read for `char*` display
    pub max_string_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_expansion_depth: 8,
            max_format_depth: 16,
            error_marker: "<error: {}>".to_string(),
            cycle_marker: "{...}".to_string(),
            max_string_length: 256,
        }
    }
}

impl EngineConfig {
    pub fn error_text(&self, message: impl std::fmt::Display) -> String {
        self.error_marker.replace("{}", &message.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Children returned per print response unless the request says otherwise
    pub max_children: usize,
    pub log_level: String,
    /// Visualizer files loaded at startup
    pub documents: Vec<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_children: 256,
            log_level: "info".to_string(),
            documents: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.engine.max_expansion_depth, 8);
        assert_eq!(config.engine.cycle_marker, "{...}");
        assert_eq!(config.server.max_children, 256);
    }

    #[test]
    fn test_partial_config() {
        let config = Config::from_str(
            r#"
[engine]
max_expansion_depth = 2
error_marker = "??{}??"

[server]
documents = ["a.natvis", "b.natvis"]
"#,
        )
        .unwrap();
        assert_eq!(config.engine.max_expansion_depth, 2);
        assert_eq!(config.engine.max_format_depth, 16);
        assert_eq!(config.engine.error_text("boom"), "??boom??");
        assert_eq!(config.server.documents.len(), 2);
        assert_eq!(config.server.log_level, "info");
    }

    #[test]
    fn test_invalid_config() {
        let result = Config::from_str("[engine]\nmax_expansion_depth = \"deep\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nmax_children = 10").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.max_children, 10);

        let missing = Config::from_file(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
