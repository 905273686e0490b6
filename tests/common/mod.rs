//! Shared test utilities and fixtures
//!
//! A wiremock server standing in for the upstream analysis service, plus a
//! gateway wired to it with fast retry timings.

#![allow(dead_code)]

use std::time::Duration;

use dialectic_gateway::{CacheConfig, Gateway, GatewayConfig, GatewayHandle, MemoryBackend, RetryConfig, SettingsStore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// The canonical over-generalizing argument used throughout.
pub const ARGUMENT: &str = "All politicians lie, so none can be trusted.";

pub fn dual_body() -> serde_json::Value {
    serde_json::json!({
        "support": {
            "elements": {
                "claim": {"text": "None can be trusted", "strength": 4},
                "data": {"text": "All politicians lie", "strength": 3}
            },
            "fallacies": [
                {"type": "Hasty Generalization", "explanation": "Generalizes from some to all.", "confidence": 87}
            ],
            "suggestions": ["Qualify the claim."],
            "improved_statement": "Some politicians have lied.",
            "feedback": "Narrow the scope of the claim."
        },
        "defence": {
            "response": "Trust can be earned through a track record.",
            "overallAssessment": "The argument overgeneralizes."
        },
        "_meta": {"model": "test"}
    })
}

pub fn gateway_config(server: &MockServer) -> GatewayConfig {
    GatewayConfig {
        base_url: format!("{}/api", server.uri()),
        timeout: Duration::from_secs(5),
        retry: RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(10),
        },
        cache: CacheConfig::default(),
        ..GatewayConfig::default()
    }
}

/// Start a gateway against `server` with in-memory settings.
pub fn start_gateway(server: &MockServer) -> GatewayHandle {
    start_gateway_with(gateway_config(server))
}

pub fn start_gateway_with(config: GatewayConfig) -> GatewayHandle {
    Gateway::start(config, SettingsStore::open(MemoryBackend::new())).expect("gateway starts")
}

/// Healthy `/api/health` so the startup probe stays quiet.
pub async fn mount_health(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})))
        .mount(server)
        .await;
}

/// `/api/analyze_dual` answering with [`dual_body`], expected `times` times.
pub async fn mount_dual(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/analyze_dual"))
        .respond_with(ResponseTemplate::new(200).set_body_json(dual_body()))
        .expect(times)
        .mount(server)
        .await;
}
