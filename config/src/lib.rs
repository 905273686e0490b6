//! Configuration file for Dialectic.
//!
//! `~/.dialectic/config.toml` is optional, and so is every section in it.
//! [`DialecticConfig`] mirrors the file as written; [`ResolvedConfig`] is the
//! validated form with defaults applied that the rest of the workspace uses.

use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

mod resolved;

pub use resolved::{ResolvedConfig, UPSTREAM_ENV_VAR};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DialecticConfig {
    pub upstream: Option<UpstreamSection>,
    pub retry: Option<RetrySection>,
    pub cache: Option<CacheSection>,
    pub settings: Option<SettingsSection>,
    pub page: Option<PageSection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpstreamSection {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub health_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetrySection {
    pub max_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CacheSection {
    pub ttl_secs: Option<u64>,
    pub max_entries: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsSection {
    /// Where the settings record is persisted. `~/` is expanded.
    pub path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageSection {
    pub debounce_ms: Option<u64>,
    pub blur_grace_ms: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::Invalid { .. } => None,
        }
    }
}

/// Replace `${VAR}` references with the variable's value. Unset variables
/// become empty; an unterminated `${` is kept literally.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

impl DialecticConfig {
    /// Load the config from its default location. A missing file is `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

/// Root of Dialectic's per-user state: `~/.dialectic`.
#[must_use]
pub fn dialectic_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".dialectic"))
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dialectic_dir().map(|dir| dir.join("config.toml"))
}
