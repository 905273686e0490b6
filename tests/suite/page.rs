//! Page runtime driving a real gateway against a mock upstream.

use dialectic_gateway::GatewayHandle;
use dialectic_page::dom::{Document, NodeId, NodeSpec};
use dialectic_page::{
    FieldState, PageConfig, PageEvent, PageRuntime, Rect, Selection, live_buttons_for,
};
use dialectic_types::{DisplayMode, Settings};
use tokio::time::Instant;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{ARGUMENT, mount_dual, mount_health, start_gateway};

fn selection(text: &str) -> PageEvent {
    PageEvent::SelectionChanged(Some(Selection::new(
        text,
        Rect {
            x: 40.0,
            y: 120.0,
            width: 200.0,
            height: 18.0,
        },
    )))
}

async fn runtime_on(server: &MockServer, host: &str) -> (GatewayHandle, PageRuntime<GatewayHandle>) {
    let gateway = start_gateway(server);
    let runtime = PageRuntime::connect(gateway.clone(), host, &PageConfig::default()).await;
    (gateway, runtime)
}

#[tokio::test]
async fn selection_to_chat_to_toggle() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    mount_dual(&server, 1).await;
    let (_gateway, mut rt) = runtime_on(&server, "example.org").await;
    let now = Instant::now();

    rt.dispatch(selection("1234567890123456789"), now);
    assert!(!rt.selection().is_visible(), "19 characters is below the threshold");
    rt.dispatch(selection(ARGUMENT), now);
    assert!(rt.selection().is_visible());

    rt.dispatch(PageEvent::SelectionAffordanceClicked, now);
    assert!(!rt.selection().is_visible());
    assert!(rt.chat().is_open());
    rt.settle_all().await;

    let support = rt.take_output().concat();
    assert!(support.contains("Hasty Generalization (87% confidence)"));
    assert!(support.contains("claim (4/10)"));

    rt.dispatch(PageEvent::SetDisplayMode(DisplayMode::Defence), now);
    let defence = rt.take_output().concat();
    assert!(defence.contains("Trust can be earned through a track record."));
    rt.dispatch(PageEvent::SetDisplayMode(DisplayMode::Support), now);
    assert!(rt.take_output().concat().contains("Narrow the scope"));
    assert!(!rt.has_pending());
}

#[tokio::test]
async fn twenty_character_selection_shows_affordance() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    let (_gateway, mut rt) = runtime_on(&server, "example.org").await;
    rt.dispatch(selection("12345678901234567890"), Instant::now());
    assert!(rt.selection().is_visible());
    rt.dispatch(PageEvent::SelectionChanged(None), Instant::now());
    assert!(!rt.selection().is_visible());
}

#[tokio::test]
async fn repeated_chat_submission_hits_cache() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    mount_dual(&server, 1).await;
    let (gateway, mut rt) = runtime_on(&server, "example.org").await;
    rt.dispatch(PageEvent::LauncherClicked, Instant::now());

    for _ in 0..2 {
        rt.dispatch(PageEvent::ChatSubmit(ARGUMENT.into()), Instant::now());
        rt.settle_all().await;
    }
    assert_eq!(gateway.cache_stats().hits, 1);
    assert_eq!(rt.chat().entries().len(), 4);
}

#[tokio::test]
async fn detection_toggle_is_independent_of_chatbot() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(0)
        .mount(&server)
        .await;
    let (gateway, mut rt) = runtime_on(&server, "example.org").await;

    let settings = gateway
        .update_settings(dialectic_types::SettingsPatch {
            enable_detection: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();
    let now = Instant::now();
    rt.dispatch(PageEvent::SettingsChanged(settings), now);

    let root = rt.doc().root();
    let field = rt
        .doc_mut()
        .append(root, NodeSpec::new("textarea").text(ARGUMENT))
        .unwrap();
    rt.dispatch(PageEvent::Focus(field), now);
    rt.dispatch(PageEvent::ButtonPressed(field), now);
    assert_eq!(live_buttons_for(rt.doc(), field), 0);
    assert!(!rt.has_pending());

    // The chat surfaces are untouched.
    assert!(rt.launcher().is_some());
    rt.dispatch(selection(ARGUMENT), now);
    assert!(rt.selection().is_visible());
}

#[tokio::test]
async fn master_switch_hides_every_surface() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    mount_dual(&server, 0).await;
    let (_gateway, mut rt) = runtime_on(&server, "example.org").await;
    let root = rt.doc().root();
    let field = rt.doc_mut().append(root, NodeSpec::new("textarea")).unwrap();
    let now = Instant::now();
    rt.dispatch(PageEvent::Focus(field), now);
    rt.dispatch(selection(ARGUMENT), now);
    rt.dispatch(PageEvent::LauncherClicked, now);
    assert_eq!(live_buttons_for(rt.doc(), field), 1);
    assert!(rt.chat().is_open());

    rt.dispatch(
        PageEvent::SettingsChanged(Settings {
            enabled: false,
            ..Settings::default()
        }),
        now,
    );
    assert_eq!(live_buttons_for(rt.doc(), field), 0);
    assert!(rt.launcher().is_none());
    assert!(!rt.selection().is_visible());
    assert!(!rt.chat().is_open());

    rt.dispatch(PageEvent::ChatSubmit(ARGUMENT.into()), now);
    rt.dispatch(PageEvent::SelectionAffordanceClicked, now);
    assert!(!rt.has_pending());
    let analyses = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/api/analyze_dual")
        .count();
    assert_eq!(analyses, 0);
}

fn reddit_thread(doc: &mut Document) -> NodeId {
    let post = doc
        .append(
            doc.root(),
            NodeSpec::new("shreddit-post")
                .child(NodeSpec::new("h1").text("Remote work is strictly better than office work."))
                .child(NodeSpec::new("shreddit-comment")),
        )
        .unwrap();
    let comment = doc.node(post).unwrap().children()[1];
    doc.append(comment, NodeSpec::new("textarea").attr("name", "comment"))
        .unwrap()
}

#[tokio::test]
async fn reply_field_analysis_carries_context() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/analyze"))
        .and(body_partial_json(serde_json::json!({
            "text": ARGUMENT,
            "context": {
                "platform": "reddit",
                "postType": "reply",
                "originalPost": "Remote work is strictly better than office work."
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "fallacies": [{"type": "Hasty Generalization", "confidence": 80}],
            "feedback": "Consider counterexamples."
        })))
        .expect(1)
        .mount(&server)
        .await;
    let (_gateway, mut rt) = runtime_on(&server, "www.reddit.com").await;

    // Mounted after attach: discovered on the debounced pass.
    let t0 = Instant::now();
    let field = reddit_thread(rt.doc_mut());
    rt.dispatch(PageEvent::Tick, t0);
    assert_eq!(rt.detector().tracked().count(), 0);
    rt.dispatch(PageEvent::Tick, t0 + PageConfig::default().debounce);
    assert!(rt.detector().tracked().any(|id| id == field));

    rt.dispatch(PageEvent::Focus(field), t0);
    rt.dispatch(
        PageEvent::Input {
            field,
            text: ARGUMENT.into(),
        },
        t0,
    );
    let button = rt.detector().button_for(field).unwrap();
    rt.dispatch(PageEvent::ButtonPressed(button), t0);
    rt.dispatch(PageEvent::ButtonPressed(button), t0);
    rt.settle_all().await;

    assert!(matches!(rt.detector().state(field), Some(FieldState::Active { .. })));
    let output = rt.take_output().concat();
    assert!(output.contains("Hasty Generalization (80% confidence)"));
    assert!(output.contains("Consider counterexamples."));
}

#[tokio::test]
async fn field_failure_shows_message_and_keeps_one_button() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/analyze"))
        .respond_with(
            ResponseTemplate::new(402).set_body_json(serde_json::json!({"error": "Out of credits"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    let (_gateway, mut rt) = runtime_on(&server, "example.org").await;
    let root = rt.doc().root();
    let field = rt
        .doc_mut()
        .append(root, NodeSpec::new("textarea").text(ARGUMENT))
        .unwrap();
    let now = Instant::now();

    rt.dispatch(PageEvent::Focus(field), now);
    rt.dispatch(PageEvent::ButtonPressed(field), now);
    rt.settle_all().await;

    assert!(matches!(rt.detector().state(field), Some(FieldState::Error { .. })));
    assert!(rt.take_output().concat().contains("quota"));

    for _ in 0..3 {
        rt.dispatch(PageEvent::Blur(field), now);
        rt.dispatch(PageEvent::Focus(field), now);
    }
    assert_eq!(live_buttons_for(rt.doc(), field), 1);
}
