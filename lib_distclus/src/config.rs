//! Boundary configuration: where and how verbosely the library logs.
//!
//! Resolved in layers, each overriding the `Some` values of the one before:
//! built-in defaults, then the JSON file named by `DISTCLUS_CONFIG_PATH`, then
//! the `DISTCLUS_*` environment variables.

#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const ENV_CONFIG_PATH: &str = "DISTCLUS_CONFIG_PATH";
pub const ENV_LOG_LEVEL: &str = "DISTCLUS_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "DISTCLUS_LOG_DIR";
pub const ENV_MAX_LOG_FILES: &str = "DISTCLUS_MAX_LOG_FILES";

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BoundaryConfig {
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub max_log_files: Option<usize>,
}

impl BoundaryConfig {
    pub fn defaults() -> Self {
        Self {
            log_level: Some("info".to_string()),
            log_dir: None,
            max_log_files: Some(7),
        }
    }

    // 'other' overrides 'self' for Some values
    pub fn merge(self, other: BoundaryConfig) -> BoundaryConfig {
        BoundaryConfig {
            log_level: other.log_level.or(self.log_level),
            log_dir: other.log_dir.or(self.log_dir),
            max_log_files: other.max_log_files.or(self.max_log_files),
        }
    }

    /// Reads a JSON config file. A missing, unreadable or malformed file
    /// yields `None` and is logged.
    pub fn from_file(path: &Path) -> Option<BoundaryConfig> {
        if !path.exists() {
            tracing::info!("Config file not found at {}. Using defaults and environment.", path.display());
            return None;
        }
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str::<BoundaryConfig>(&text) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Builds the environment layer from a variable lookup.
    pub fn from_env<F>(lookup: F) -> BoundaryConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_log_files = lookup(ENV_MAX_LOG_FILES).and_then(|v| match v.trim().parse::<usize>() {
            Ok(n) => Some(n),
            Err(_) => {
                tracing::warn!("Ignoring {}={:?}: not a file count", ENV_MAX_LOG_FILES, v);
                None
            }
        });
        BoundaryConfig {
            log_level: lookup(ENV_LOG_LEVEL).filter(|v| !v.is_empty()),
            log_dir: lookup(ENV_LOG_DIR).filter(|v| !v.is_empty()).map(PathBuf::from),
            max_log_files,
        }
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

/// Layers defaults, the optional config file and the environment.
pub fn load_config_with<F>(lookup: F) -> BoundaryConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = BoundaryConfig::defaults();
    if let Some(path) = lookup(ENV_CONFIG_PATH) {
        if let Some(file_config) = BoundaryConfig::from_file(Path::new(&path)) {
            config = config.merge(file_config);
        }
    }
    config.merge(BoundaryConfig::from_env(&lookup))
}

pub fn load_config() -> BoundaryConfig {
    load_config_with(|name| std::env::var(name).ok())
}
