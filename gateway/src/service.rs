//! Gateway command loop and the handle consumers talk to.
//!
//! Construction is initialization: [`Gateway::start`] spawns the command loop,
//! the cache sweep and the startup health probe, and returns a cloneable
//! [`GatewayHandle`]. There is no separate `init` step.
//!
//! Settings commands are handled inline by the loop, so settings writes are
//! serialized. Network-bound commands are handed to a worker task per request,
//! so several analyses can be in flight at once while the loop keeps serving.

use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use dialectic_types::{
    DualResponse, GatewayError, MAX_TEXT_LENGTH, Reply, Request, Settings, SettingsPatch,
    text_length,
};

use crate::GatewayConfig;
use crate::cache::{CacheStats, ResponseCache, cache_key};
use crate::retry::{RetryConfig, RetryOutcome, generate_idempotency_key, run_with_retry};
use crate::settings::SettingsStore;
use crate::upstream::UpstreamClient;

const COMMAND_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("invalid upstream base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// One request travelling from a handle to the loop.
///
/// The token is cancelled when the caller stops waiting, which aborts the
/// worker and whatever attempt it is in.
struct Command {
    request: Request,
    token: CancellationToken,
    reply: oneshot::Sender<Reply>,
}

type SharedCache = Arc<Mutex<ResponseCache>>;

fn lock(cache: &SharedCache) -> std::sync::MutexGuard<'_, ResponseCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Gateway {
    upstream: UpstreamClient,
    retry: RetryConfig,
    cache: SharedCache,
    settings: SettingsStore,
}

impl Gateway {
    /// Start the gateway and return a handle to it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: GatewayConfig, settings: SettingsStore) -> Result<GatewayHandle, StartError> {
        let base = url::Url::parse(&config.base_url).map_err(|source| StartError::InvalidBaseUrl {
            url: config.base_url.clone(),
            source,
        })?;
        let upstream = UpstreamClient::new(&base, &config.health_path, config.timeout)?;
        let cache = Arc::new(Mutex::new(ResponseCache::new(&config.cache)));
        let settings_tx = settings.sender();
        let shutdown = CancellationToken::new();
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        tracing::info!(
            base_url = %base,
            timeout_ms = config.timeout.as_millis(),
            max_retries = config.retry.max_retries,
            "Starting gateway"
        );

        tokio::spawn(sweep_cache(Arc::clone(&cache), shutdown.clone()));
        tokio::spawn(probe_health(upstream.clone()));

        let gateway = Gateway {
            upstream,
            retry: config.retry,
            cache: Arc::clone(&cache),
            settings,
        };
        tokio::spawn(gateway.run(rx, shutdown.clone()));

        Ok(GatewayHandle {
            tx,
            cache,
            settings_tx,
            shutdown,
        })
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                command = rx.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
        }
        tracing::debug!("Gateway command loop stopped");
    }

    fn handle(&mut self, command: Command) {
        let Command {
            request,
            token,
            reply,
        } = command;

        let result = match request {
            Request::GetSettings => settings_value(self.settings.get()),
            Request::UpdateSettings(patch) => self.update_settings(&patch),
            request => {
                self.dispatch(request, token, reply);
                return;
            }
        };
        let _ = reply.send(Reply::from(result));
    }

    fn update_settings(&mut self, patch: &SettingsPatch) -> Result<serde_json::Value, GatewayError> {
        match self.settings.update(patch) {
            Ok(merged) => {
                tracing::info!(?patch, "Settings updated");
                settings_value(merged)
            }
            Err(e) => {
                tracing::warn!("Failed to persist settings: {e}");
                Err(GatewayError::unknown("settings could not be saved"))
            }
        }
    }

    /// Serve from cache or hand the request to a worker.
    fn dispatch(&self, request: Request, token: CancellationToken, reply: oneshot::Sender<Reply>) {
        let action = request.action();

        if let Some(text) = request.text() {
            let len = text_length(text);
            if len > MAX_TEXT_LENGTH {
                tracing::debug!(%action, len, "Rejected over-long text");
                let err = GatewayError::upstream(
                    None,
                    format!("text is too long ({len} characters, maximum {MAX_TEXT_LENGTH})"),
                );
                let _ = reply.send(Reply::err(err));
                return;
            }
        }

        let key = cache_key(&request);
        if let Some(key) = &key
            && let Some(value) = lock(&self.cache).get(key, Instant::now())
        {
            tracing::debug!(%action, cache_key = %key, "Cache hit");
            let _ = reply.send(Reply::ok(value));
            return;
        }

        let upstream = self.upstream.clone();
        let retry = self.retry.clone();
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            let idempotency_key = generate_idempotency_key();
            let attempt = |retry_count| upstream.send(&request, retry_count, &idempotency_key);

            let outcome = tokio::select! {
                () = token.cancelled() => {
                    tracing::debug!(%action, "Caller stopped waiting; request abandoned");
                    return;
                }
                outcome = run_with_retry(&retry, attempt) => outcome,
            };

            match &outcome {
                RetryOutcome::Success { attempts, .. } => {
                    tracing::debug!(%action, attempts, "Upstream request succeeded");
                }
                RetryOutcome::Exhausted { error, attempts } => {
                    tracing::warn!(%action, attempts, kind = %error.kind, "Retry budget exhausted");
                }
                RetryOutcome::Rejected { error, attempts } => {
                    tracing::debug!(%action, attempts, kind = %error.kind, "Upstream rejected request");
                }
            }

            let result = outcome.into_result();
            if let (Some(key), Ok(value)) = (key, &result) {
                lock(&cache).insert(key, value.clone(), Instant::now());
            }
            let _ = reply.send(Reply::from(result));
        });
    }
}

fn settings_value(settings: Settings) -> Result<serde_json::Value, GatewayError> {
    serde_json::to_value(settings)
        .map_err(|e| GatewayError::unknown(format!("failed to encode settings: {e}")))
}

async fn sweep_cache(cache: SharedCache, shutdown: CancellationToken) {
    let ttl = lock(&cache).ttl();
    let mut ticker = tokio::time::interval_at(Instant::now() + ttl, ttl);
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let removed = lock(&cache).purge_expired(Instant::now());
                if removed > 0 {
                    tracing::debug!(removed, "Purged stale cache entries");
                }
            }
        }
    }
}

async fn probe_health(upstream: UpstreamClient) {
    match upstream.check_health().await {
        Ok(_) => tracing::info!("Upstream health check passed"),
        Err(e) => tracing::warn!(kind = %e.kind, "Upstream health check failed: {}", e.message),
    }
}

/// Cloneable entry point to a running gateway.
#[derive(Debug, Clone)]
pub struct GatewayHandle {
    tx: mpsc::Sender<Command>,
    cache: SharedCache,
    settings_tx: broadcast::Sender<Settings>,
    shutdown: CancellationToken,
}

impl GatewayHandle {
    /// Send one request and wait for its reply.
    ///
    /// Dropping the returned future before it resolves cancels the request.
    /// A stopped gateway yields a `NetworkError` reply rather than an error.
    pub async fn send(&self, request: Request) -> Reply {
        let token = CancellationToken::new();
        let guard = token.clone().drop_guard();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = Command {
            request,
            token,
            reply: reply_tx,
        };
        if self.tx.send(command).await.is_err() {
            guard.disarm();
            return Reply::err(GatewayError::network("gateway unavailable"));
        }

        let reply = reply_rx
            .await
            .unwrap_or_else(|_| Reply::err(GatewayError::unknown("gateway dropped the request")));
        guard.disarm();
        reply
    }

    /// Send a request and decode its successful payload.
    pub async fn call<T: DeserializeOwned>(&self, request: Request) -> Result<T, GatewayError> {
        let value = self.send(request).await.into_result()?;
        serde_json::from_value(value)
            .map_err(|e| GatewayError::unknown(format!("unexpected response shape: {e}")))
    }

    pub async fn analyze_dual(&self, text: impl Into<String>) -> Result<DualResponse, GatewayError> {
        self.call(Request::analyze_dual(text)).await
    }

    pub async fn get_settings(&self) -> Result<Settings, GatewayError> {
        self.call(Request::GetSettings).await
    }

    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<Settings, GatewayError> {
        self.call(Request::UpdateSettings(patch)).await
    }

    pub async fn check_health(&self) -> Result<serde_json::Value, GatewayError> {
        self.send(Request::CheckHealth).await.into_result()
    }

    /// Receive every settings record accepted from now on.
    #[must_use]
    pub fn subscribe_settings(&self) -> broadcast::Receiver<Settings> {
        self.settings_tx.subscribe()
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        lock(&self.cache).stats()
    }

    #[must_use]
    pub fn cache_len(&self) -> usize {
        lock(&self.cache).len()
    }

    /// Drop every cached response, as a cold start would.
    pub fn reset_cache(&self) {
        lock(&self.cache).clear();
    }

    /// Stop the command loop and the sweep. In-flight workers finish on their own.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
