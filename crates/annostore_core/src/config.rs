//! Runtime configuration for the annotation store.
//!
//! # Responsibility
//! - Collect tunables (paging, traversal bound, storage and log locations)
//!   from defaults, JSON, or `ANNOSTORE_*` environment variables.
//!
//! # Invariants
//! - A config returned by `from_json_str`/`from_env` has passed `validate()`.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const PAGE_SIZE_MAX: u32 = 500;
pub const DEFAULT_MAX_GRAPH_DEPTH: usize = 64;

const ENV_PAGE_SIZE: &str = "ANNOSTORE_PAGE_SIZE";
const ENV_MAX_GRAPH_DEPTH: &str = "ANNOSTORE_MAX_GRAPH_DEPTH";
const ENV_DB_PATH: &str = "ANNOSTORE_DB_PATH";
const ENV_LOG_LEVEL: &str = "ANNOSTORE_LOG_LEVEL";
const ENV_LOG_DIR: &str = "ANNOSTORE_LOG_DIR";

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
    /// A required setting has no value.
    Missing { key: &'static str },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid configuration document: {err}"),
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
            Self::Missing { key } => write!(f, "{key} is not set"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::InvalidValue { .. } | Self::Missing { .. } => None,
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Documents per page for list operations.
    pub page_size: u32,
    /// Maximum nesting of annotation-on-annotation traversal.
    pub max_graph_depth: usize,
    /// SQLite database file; `None` keeps the store in memory.
    pub db_path: Option<PathBuf>,
    /// `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute log directory; `None` disables file logging.
    pub log_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_graph_depth: DEFAULT_MAX_GRAPH_DEPTH,
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl StoreConfig {
    /// Parses a JSON config; missing keys take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a config from `ANNOSTORE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_PAGE_SIZE) {
            config.page_size = parse_number(ENV_PAGE_SIZE, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_GRAPH_DEPTH) {
            config.max_graph_depth = parse_number(ENV_MAX_GRAPH_DEPTH, &value)?;
        }
        if let Some(value) = lookup(ENV_DB_PATH).filter(|value| !value.trim().is_empty()) {
            config.db_path = Some(PathBuf::from(value.trim()));
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            config.log_level = value.trim().to_string();
        }
        if let Some(value) = lookup(ENV_LOG_DIR).filter(|value| !value.trim().is_empty()) {
            config.log_dir = Some(PathBuf::from(value.trim()));
        }
        config.validate()?;
        Ok(config)
    }

    /// Database file for this run: `explicit` when given, else `db_path`.
    ///
    /// # Errors
    /// - `Missing` when neither is set.
    pub fn database_path<'a>(
        &'a self,
        explicit: Option<&'a str>,
    ) -> Result<&'a Path, ConfigError> {
        explicit
            .map(Path::new)
            .or(self.db_path.as_deref())
            .ok_or(ConfigError::Missing { key: ENV_DB_PATH })
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > PAGE_SIZE_MAX {
            return Err(ConfigError::InvalidValue {
                key: "page_size",
                value: self.page_size.to_string(),
                reason: "must be between 1 and 500",
            });
        }
        if self.max_graph_depth == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_graph_depth",
                value: self.max_graph_depth.to_string(),
                reason: "must be at least 1",
            });
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::InvalidValue {
                    key: "log_dir",
                    value: dir.display().to_string(),
                    reason: "must be an absolute path",
                });
            }
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: "not a non-negative integer",
    })
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, StoreConfig, DEFAULT_MAX_GRAPH_DEPTH};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    #[test]
    fn json_config_fills_missing_keys_with_defaults() {
        let config = StoreConfig::from_json_str(r#"{"page_size": 5}"#).unwrap();
        assert_eq!(config.page_size, 5);
        assert_eq!(config.max_graph_depth, DEFAULT_MAX_GRAPH_DEPTH);
        assert_eq!(config.db_path, None);
    }

    #[test]
    fn lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("ANNOSTORE_PAGE_SIZE", "50"),
            ("ANNOSTORE_DB_PATH", "/tmp/annotations.db"),
        ]
        .into_iter()
        .collect();
        let config =
            StoreConfig::from_lookup(|key| vars.get(key).map(|value| value.to_string())).unwrap();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/annotations.db")));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = StoreConfig::from_json_str(r#"{"page_size": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "page_size", .. }));

        let err = StoreConfig::from_lookup(|key| {
            (key == "ANNOSTORE_MAX_GRAPH_DEPTH").then(|| "deep".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("ANNOSTORE_MAX_GRAPH_DEPTH"));
    }

    #[test]
    fn explicit_database_path_wins_over_configured_one() {
        let config = StoreConfig {
            db_path: Some(PathBuf::from("/var/lib/annostore.db")),
            ..StoreConfig::default()
        };
        assert_eq!(
            config.database_path(Some("local.db")).unwrap(),
            Path::new("local.db")
        );
        assert_eq!(
            config.database_path(None).unwrap(),
            Path::new("/var/lib/annostore.db")
        );

        let err = StoreConfig::default().database_path(None).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { key: "ANNOSTORE_DB_PATH" }));
    }
}
