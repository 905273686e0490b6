//! HTTP client for the remote analysis service.
//!
//! One attempt per call: retries, caching and the per-attempt deadline are
//! layered on by the gateway. Every failure is classified into an
//! [`ErrorKind`] here, so nothing above this module inspects HTTP details.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};

use dialectic_types::{GatewayError, Request, truncate_with_ellipsis};

use crate::retry::add_retry_headers;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const POOL_MAX_IDLE_PER_HOST: usize = 8;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Upstream messages are shown to users; anything longer is cut.
const MAX_ERROR_MESSAGE_CHARS: usize = 300;

/// Method and path for one upstream call, relative to the base URL.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Get(String),
    Post(String, Value),
}

impl Route {
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Route::Get(path) | Route::Post(path, _) => path,
        }
    }
}

/// Map a request onto its upstream route.
///
/// Settings actions never leave the gateway and have no route.
#[must_use]
pub fn route_for(request: &Request, health_path: &str) -> Option<Route> {
    let route = match request {
        Request::AnalyzeText(r) => Route::Post("/analyze".into(), json!(r)),
        Request::AnalyzeDualMode(r) => {
            Route::Post("/analyze_dual".into(), json!({ "argument_text": r.text }))
        }
        Request::GenerateReply(r) => Route::Post("/generate-reply".into(), json!(r)),
        Request::DetectFallacies(r) => Route::Post("/detect-fallacies".into(), json!(r)),
        Request::RewriteText(r) => Route::Post("/rewrite".into(), json!(r)),
        Request::GetModels => Route::Get("/models".into()),
        Request::CheckHealth => Route::Get(health_path.to_string()),
        Request::GetSettings | Request::UpdateSettings(_) => return None,
    };
    Some(route)
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base: String,
    health_path: String,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(
        base_url: &url::Url,
        health_path: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
            .build()?;
        Ok(Self {
            client,
            base: base_url.as_str().trim_end_matches('/').to_string(),
            health_path: health_path.to_string(),
            timeout,
        })
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base)
        } else {
            format!("{}/{path}", self.base)
        }
    }

    /// Perform one attempt for `request`.
    ///
    /// The deadline covers connecting, sending and reading the whole body.
    pub async fn send(
        &self,
        request: &Request,
        retry_count: u32,
        idempotency_key: &str,
    ) -> Result<Value, GatewayError> {
        let Some(route) = route_for(request, &self.health_path) else {
            return Err(GatewayError::unknown(format!(
                "{} is not an upstream action",
                request.action()
            )));
        };

        let url = self.url_for(route.path());
        let builder = match &route {
            Route::Get(_) => self.client.get(&url),
            Route::Post(_, body) => self.client.post(&url).json(body),
        };
        let builder = add_retry_headers(builder, retry_count, idempotency_key);

        tracing::debug!(action = %request.action(), %url, retry_count, "Upstream request");

        match tokio::time::timeout(self.timeout, execute(builder)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::timeout(self.timeout)),
        }
    }

    /// Single liveness probe, without retries.
    pub async fn check_health(&self) -> Result<Value, GatewayError> {
        let key = crate::retry::generate_idempotency_key();
        self.send(&Request::CheckHealth, 0, &key).await
    }
}

async fn execute(builder: reqwest::RequestBuilder) -> Result<Value, GatewayError> {
    let response = builder.send().await.map_err(classify_transport)?;
    let status = response.status();
    let body = response.text().await.map_err(classify_transport)?;

    if !status.is_success() {
        return Err(classify_status(status, &body));
    }

    serde_json::from_str(&body)
        .map_err(|e| GatewayError::unknown(format!("upstream returned malformed JSON: {e}")))
}

/// Classify a transport-level failure.
#[must_use]
pub fn classify_transport(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        return GatewayError::new(
            dialectic_types::ErrorKind::TimeoutError,
            "upstream request timed out",
        );
    }
    if error.is_connect() || error.is_request() || error.is_body() {
        return GatewayError::network("could not reach the analysis service");
    }
    GatewayError::unknown(format!("upstream transport failure: {error}"))
}

/// Classify a non-2xx response.
#[must_use]
pub fn classify_status(status: StatusCode, body: &str) -> GatewayError {
    let message = extract_error_message(body)
        .map(|m| truncate_with_ellipsis(m.trim(), MAX_ERROR_MESSAGE_CHARS))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("analysis service returned {status}"));

    let code = Some(status.as_u16());
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::PAYMENT_REQUIRED
        || is_quota_message(&message)
    {
        return GatewayError::quota(code, message);
    }
    GatewayError::upstream(code, message)
}

/// Pull a human-readable message out of an upstream error body.
#[must_use]
pub fn extract_error_message(body: &str) -> Option<String> {
    let payload: Value = serde_json::from_str(body.trim()).ok()?;
    payload
        .pointer("/message")
        .and_then(Value::as_str)
        .or_else(|| payload.pointer("/error/message").and_then(Value::as_str))
        .or_else(|| payload.pointer("/error").and_then(Value::as_str))
        .or_else(|| payload.pointer("/support/error").and_then(Value::as_str))
        .or_else(|| payload.as_str())
        .map(ToString::to_string)
}

#[must_use]
pub fn is_quota_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("rate limit")
        || lower.contains("rate-limit")
        || lower.contains("quota")
        || lower.contains("credits")
        || lower.contains("too many requests")
}
