//! Background gateway for Dialectic.
//!
//! The gateway is the only component that performs network I/O. Page-side
//! surfaces talk to it exclusively through a [`GatewayHandle`], sending a typed
//! [`Request`](dialectic_types::Request) and receiving a
//! [`Reply`](dialectic_types::Reply). Behind the handle a single command loop
//! owns:
//!
//! - the [`ResponseCache`] (TTL + size-bounded, FIFO eviction)
//! - the [`SettingsStore`] (persisted record, broadcast on change)
//! - the [`UpstreamClient`] with per-attempt deadlines
//! - bounded retry with linear backoff ([`retry`])
//!
//! ```rust,no_run
//! use dialectic_gateway::{Gateway, GatewayConfig, MemoryBackend, SettingsStore};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SettingsStore::open(MemoryBackend::new());
//! let gateway = Gateway::start(GatewayConfig::default(), store)?;
//! let dual = gateway
//!     .analyze_dual("All politicians lie, so none can be trusted.")
//!     .await?;
//! println!("{}", dual.defence.response.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

#![allow(clippy::missing_errors_doc)]

mod cache;
pub mod retry;
mod service;
mod settings;
mod upstream;

use std::time::Duration;

pub use cache::{CacheConfig, CacheEntry, CacheStats, ResponseCache, cache_key};
pub use retry::{RetryConfig, RetryOutcome};
pub use service::{Gateway, GatewayHandle, StartError};
pub use settings::{FileBackend, MemoryBackend, SettingsBackend, SettingsError, SettingsStore};
pub use upstream::{Route, UpstreamClient, extract_error_message, route_for};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_HEALTH_PATH: &str = "/health";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the gateway needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Base URL every upstream route is appended to.
    pub base_url: String,
    /// Per-attempt deadline.
    pub timeout: Duration,
    pub health_path: String,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}
