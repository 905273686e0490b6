//! Gateway behavior against a mock upstream: caching, retry bounds, error
//! classification and settings persistence.

use std::time::Duration;

use dialectic_gateway::{FileBackend, Gateway, RetryConfig, SettingsStore};
use dialectic_types::{ErrorKind, Mode, Request, Settings, SettingsPatch};
use tempfile::tempdir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, Request as ReceivedRequest, ResponseTemplate};

use crate::common::{ARGUMENT, dual_body, gateway_config, mount_dual, mount_health, start_gateway, start_gateway_with};

#[tokio::test]
async fn repeated_argument_is_served_from_cache() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/analyze_dual"))
        .and(body_json(serde_json::json!({"argument_text": ARGUMENT})))
        .respond_with(ResponseTemplate::new(200).set_body_json(dual_body()))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = start_gateway(&server);
    let first = gateway.analyze_dual(ARGUMENT).await.unwrap();
    let second = gateway.analyze_dual(ARGUMENT).await.unwrap();

    assert_eq!(first, second);
    assert!(first.support.elements.is_some());
    assert!(first.defence.response.is_some());
    assert_eq!(gateway.cache_stats().hits, 1);
    assert_eq!(gateway.cache_len(), 1);
}

#[tokio::test]
async fn whitespace_variants_share_a_cache_entry() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    mount_dual(&server, 1).await;

    let gateway = start_gateway(&server);
    gateway.analyze_dual(ARGUMENT).await.unwrap();
    gateway
        .analyze_dual(ARGUMENT.replace(' ', "  "))
        .await
        .unwrap();
    assert_eq!(gateway.cache_len(), 1);
}

#[tokio::test]
async fn hundred_and_first_entry_evicts_the_oldest() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    // 101 distinct inserts plus one re-fetch of the evicted first entry.
    mount_dual(&server, 102).await;

    let gateway = start_gateway(&server);
    let texts: Vec<String> = (0..101)
        .map(|i| format!("Argument number {i} claims every swan is white."))
        .collect();
    for text in &texts {
        gateway.analyze_dual(text.clone()).await.unwrap();
    }
    assert_eq!(gateway.cache_len(), 100);
    assert_eq!(gateway.cache_stats().evictions, 1);

    // The newest entry is still cached; the oldest is not.
    gateway.analyze_dual(texts[100].clone()).await.unwrap();
    assert_eq!(gateway.cache_stats().hits, 1);
    gateway.analyze_dual(texts[0].clone()).await.unwrap();
}

#[tokio::test]
async fn upstream_failure_is_not_retried() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/analyze_dual"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(serde_json::json!({"error": "model overloaded"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let gateway = start_gateway(&server);
    let err = gateway.analyze_dual(ARGUMENT).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::UpstreamError);
    assert_eq!(err.status, Some(503));
    assert_eq!(gateway.cache_len(), 0);
}

#[tokio::test]
async fn quota_failure_is_classified_and_not_retried() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/analyze_dual"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(serde_json::json!({"message": "Rate limit exceeded"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let gateway = start_gateway(&server);
    let err = gateway.analyze_dual(ARGUMENT).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::QuotaError);
}

#[tokio::test]
async fn timeouts_are_retried_with_one_idempotency_key() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/analyze_dual"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(dual_body())
                .set_delay(Duration::from_millis(500)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let mut config = gateway_config(&server);
    config.timeout = Duration::from_millis(50);
    let gateway = start_gateway_with(config);

    let err = gateway.analyze_dual(ARGUMENT).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::TimeoutError);

    let attempts: Vec<ReceivedRequest> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/api/analyze_dual")
        .collect();
    assert_eq!(attempts.len(), 3);

    let header = |r: &ReceivedRequest, name: &str| {
        r.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let keys: Vec<_> = attempts.iter().map(|r| header(r, "idempotency-key")).collect();
    assert!(keys[0].as_deref().is_some_and(|k| k.starts_with("dialectic-")));
    assert!(keys.iter().all(|k| *k == keys[0]));

    let mut counts: Vec<_> = attempts
        .iter()
        .filter_map(|r| header(r, "x-retry-count"))
        .collect();
    counts.sort();
    assert_eq!(counts, ["0", "1", "2"]);
}

#[tokio::test]
async fn zero_retries_means_one_attempt() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/analyze_dual"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = gateway_config(&server);
    config.timeout = Duration::from_millis(50);
    config.retry = RetryConfig {
        max_retries: 0,
        base_delay: Duration::from_millis(10),
    };
    let gateway = start_gateway_with(config);

    let err = gateway.analyze_dual(ARGUMENT).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::TimeoutError);
}

#[tokio::test]
async fn unreachable_upstream_is_a_network_error() {
    let mut config = dialectic_gateway::GatewayConfig {
        base_url: "http://127.0.0.1:9/api".into(),
        ..Default::default()
    };
    config.retry.base_delay = Duration::from_millis(1);
    let gateway = start_gateway_with(config);

    let err = gateway.analyze_dual(ARGUMENT).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NetworkError);
}

#[tokio::test]
async fn field_actions_reach_their_routes() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/detect-fallacies"))
        .and(body_json(serde_json::json!({"text": ARGUMENT, "use_local_only": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"fallacies_present": ["hasty generalization"]})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": []})))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = start_gateway(&server);
    let reply = gateway
        .send(Request::DetectFallacies(dialectic_types::DetectRequest {
            text: ARGUMENT.into(),
            use_local_only: true,
        }))
        .await;
    assert!(reply.success);
    assert!(gateway.send(Request::GetModels).await.success);
}

#[tokio::test]
async fn settings_persist_across_restarts() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    let dir = tempdir().unwrap();
    let file = dir.path().join("nested").join("settings.json");

    let gateway = Gateway::start(
        gateway_config(&server),
        SettingsStore::open(FileBackend::new(&file)),
    )
    .unwrap();
    assert_eq!(gateway.get_settings().await.unwrap(), Settings::default());

    let mut rx = gateway.subscribe_settings();
    let updated = gateway
        .update_settings(SettingsPatch {
            mode: Some(Mode::Reply),
            enable_chatbot: Some(false),
            ..SettingsPatch::default()
        })
        .await
        .unwrap();
    assert_eq!(updated.mode, Mode::Reply);
    assert_eq!(rx.recv().await.unwrap(), updated);
    gateway.shutdown();

    let restarted = Gateway::start(
        gateway_config(&server),
        SettingsStore::open(FileBackend::new(&file)),
    )
    .unwrap();
    let reloaded = restarted.get_settings().await.unwrap();
    assert_eq!(reloaded, updated);
    assert!(reloaded.enable_detection, "unpatched keys keep their values");
}

#[tokio::test]
async fn health_check_reports_upstream_status() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    let gateway = start_gateway(&server);
    let body = gateway.check_health().await.unwrap();
    assert_eq!(body["status"], "ok");
}
