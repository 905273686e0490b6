//! Validated configuration with defaults applied.

use std::path::PathBuf;
use std::time::Duration;

use dialectic_gateway::{CacheConfig, GatewayConfig, RetryConfig};
use dialectic_page::PageConfig;

use crate::{ConfigError, DialecticConfig, dialectic_dir, expand_env_vars};

/// Environment variable that overrides `upstream.base_url`.
pub const UPSTREAM_ENV_VAR: &str = "DIALECTIC_UPSTREAM";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub gateway: GatewayConfig,
    pub page: PageConfig,
    pub settings_path: PathBuf,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            page: PageConfig::default(),
            settings_path: default_settings_path(),
        }
    }
}

impl ResolvedConfig {
    /// Resolve `config`, honoring [`UPSTREAM_ENV_VAR`] from the environment.
    pub fn from_config(config: &DialecticConfig) -> Result<Self, ConfigError> {
        let env_override = std::env::var(UPSTREAM_ENV_VAR).ok();
        Self::with_override(config, env_override.as_deref())
    }

    /// Resolve `config` with an explicit upstream override.
    pub fn with_override(
        config: &DialecticConfig,
        upstream_override: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let defaults = GatewayConfig::default();
        let upstream = config.upstream.as_ref();

        let base_url = upstream_override
            .map(str::to_string)
            .filter(|url| !url.trim().is_empty())
            .or_else(|| upstream.and_then(|u| u.base_url.as_deref()).map(expand_env_vars))
            .unwrap_or(defaults.base_url);
        let base_url = validate_base_url(base_url.trim())?;

        let timeout = match upstream.and_then(|u| u.timeout_secs) {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    field: "upstream.timeout_secs",
                    reason: "must be greater than zero".into(),
                });
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.timeout,
        };

        let health_path = upstream
            .and_then(|u| u.health_path.as_deref())
            .map(expand_env_vars)
            .unwrap_or(defaults.health_path);

        let retry = config.retry.as_ref();
        let retry = RetryConfig {
            max_retries: retry
                .and_then(|r| r.max_retries)
                .unwrap_or(defaults.retry.max_retries),
            base_delay: retry
                .and_then(|r| r.base_delay_ms)
                .map_or(defaults.retry.base_delay, Duration::from_millis),
        };

        let cache = config.cache.as_ref();
        let cache = CacheConfig {
            ttl: match cache.and_then(|c| c.ttl_secs) {
                Some(0) => {
                    return Err(ConfigError::Invalid {
                        field: "cache.ttl_secs",
                        reason: "must be greater than zero".into(),
                    });
                }
                Some(secs) => Duration::from_secs(secs),
                None => defaults.cache.ttl,
            },
            max_entries: match cache.and_then(|c| c.max_entries) {
                Some(0) => {
                    return Err(ConfigError::Invalid {
                        field: "cache.max_entries",
                        reason: "must be greater than zero".into(),
                    });
                }
                Some(n) => n,
                None => defaults.cache.max_entries,
            },
        };

        let page_defaults = PageConfig::default();
        let page = config.page.as_ref();
        let page = PageConfig {
            debounce: page
                .and_then(|p| p.debounce_ms)
                .map_or(page_defaults.debounce, Duration::from_millis),
            blur_grace: page
                .and_then(|p| p.blur_grace_ms)
                .map_or(page_defaults.blur_grace, Duration::from_millis),
        };

        let settings_path = config
            .settings
            .as_ref()
            .and_then(|s| s.path.as_deref())
            .map(|raw| expand_home(&expand_env_vars(raw)))
            .unwrap_or_else(default_settings_path);

        Ok(Self {
            gateway: GatewayConfig {
                base_url,
                timeout,
                health_path,
                retry,
                cache,
            },
            page,
            settings_path,
        })
    }
}

fn validate_base_url(raw: &str) -> Result<String, ConfigError> {
    let url = url::Url::parse(raw).map_err(|e| ConfigError::Invalid {
        field: "upstream.base_url",
        reason: format!("'{raw}' is not a valid URL: {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            field: "upstream.base_url",
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(raw.to_string())
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

fn default_settings_path() -> PathBuf {
    dialectic_dir()
        .unwrap_or_else(|| PathBuf::from(".dialectic"))
        .join("settings.json")
}
