//! Configuration management for lrumap
//!
//! Handles loading and validation of `lrumap.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logging::{LogConfig, LogLevel};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "LRUMAP_CONFIG";

const CONFIG_FILE_NAME: &str = "lrumap.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

/// `[cache]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries a map holds before evicting
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

fn default_capacity() -> usize {
    64
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown log format: {s}. Expected pretty or json")),
        }
    }
}

/// Resolve which config file to read, if any.
///
/// Order: explicit path, `$LRUMAP_CONFIG`, `<config dir>/lrumap/lrumap.toml`
/// when it exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|dir| dir.join("lrumap").join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

impl Config {
    /// Load configuration, falling back to defaults when no file is found.
    ///
    /// An explicit or env-provided path that does not exist is an error.
    pub fn load(explicit: Option<&Path>) -> crate::Result<Self> {
        match resolve_config_path(explicit) {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()).into());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(config_path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::ParseFailed)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> crate::Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeFailed(e).into())
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.cache.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "cache.capacity must be greater than zero".to_string(),
            )
            .into());
        }
        self.logging
            .level
            .parse::<LogLevel>()
            .map_err(|e| ConfigError::ValidationError(format!("logging.level: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.cache.capacity, 64);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        config.validate().unwrap();
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn parses_all_sections() {
        let config = Config::from_toml(
            r#"
[cache]
capacity = 3

[logging]
level = "debug"
format = "json"
file = "/tmp/lrumap.log"
"#,
        )
        .unwrap();
        assert_eq!(config.cache.capacity, 3);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.logging.file.as_deref(),
            Some(Path::new("/tmp/lrumap.log"))
        );
    }

    #[test]
    fn zero_capacity_fails_validation() {
        let err = Config::from_toml("[cache]\ncapacity = 0\n").unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Config(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn bad_level_fails_validation() {
        let err = Config::from_toml("[logging]\nlevel = \"loud\"\n").unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = Config::from_toml("[cache\ncapacity = ").unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Config(ConfigError::ParseFailed(_))
        ));
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = Config::default();
        config.cache.capacity = 12;
        config.logging.format = LogFormat::Json;
        let text = config.to_toml().unwrap();
        let parsed = Config::from_toml(&text).unwrap();
        assert_eq!(parsed.cache.capacity, 12);
        assert_eq!(parsed.logging.format, LogFormat::Json);
    }

    #[test]
    fn load_from_missing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = Config::load_from(&tmp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Config(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("lrumap.toml");
        std::fs::write(&path, "[cache]\ncapacity = 5\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.cache.capacity, 5);
    }

    #[test]
    fn explicit_path_wins_resolution() {
        let path = Path::new("/somewhere/else.toml");
        assert_eq!(resolve_config_path(Some(path)), Some(path.to_path_buf()));
    }

    #[test]
    fn log_format_parse_and_display() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Json.to_string(), "json");
    }
}
