//! Integration tests for the model gateway HTTP surface.
//!
//! Each test spins up the real gateway router on a random port, backed by
//! stub Gemini and Grok upstreams (also Axum), and drives it with reqwest.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use lead_assist::config::{GATEWAY_PATH, GatewayConfig, HandoffTiming};
use lead_assist::gateway::{Gateway, GatewayState, gateway_routes};
use lead_assist::intake::{ActivePanel, IntakeField, SiteSurface};
use lead_assist::llm::{ModelSelector, Providers};
use lead_assist::orchestrator::{ChatState, HttpGatewayClient, Orchestrator, SendOutcome};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const ORIGIN: &str = "https://tekguyz.example";

/// Requests seen by the stub upstreams.
#[derive(Clone, Default)]
struct Upstream {
    grok_bodies: Arc<Mutex<Vec<Value>>>,
    gemini_bodies: Arc<Mutex<Vec<Value>>>,
}

/// Grok stub: OpenAI-style chat completions. A message containing
/// "rate limit" gets a 429.
async fn grok_completions(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    upstream.grok_bodies.lock().unwrap().push(body.clone());

    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer grok-key") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "Incorrect API key"}})),
        );
    }

    let last = body["messages"]
        .as_array()
        .and_then(|m| m.last())
        .and_then(|m| m["content"].as_str())
        .unwrap_or_default()
        .to_string();

    if last.contains("rate limit") {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": {"message": "Rate limit exceeded"}})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Grok here. [CHIPS:[\"Pricing\", \"Timeline\"]]"
                }
            }]
        })),
    )
}

/// Gemini stub: generateContent. Replies with a handoff once the user gives
/// their name.
async fn gemini_generate(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    upstream.gemini_bodies.lock().unwrap().push(body.clone());

    if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some("gemini-key") {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": {"message": "API key not valid"}})),
        );
    }

    let last = body["contents"]
        .as_array()
        .and_then(|c| c.last())
        .and_then(|c| c["parts"][0]["text"].as_str())
        .unwrap_or_default()
        .to_string();

    let text = if last.contains("Jane") {
        r#"Thanks Jane, let's get this started. [ACTION:OPEN_FORM]{"prefill":{"name":"Jane","service":"Custom chatbot","budget":"$10k"},"confidence":0.8}"#
    } else {
        "Hello from Gemini."
    };

    (
        StatusCode::OK,
        Json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5}
        })),
    )
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Start stub upstreams plus a gateway in front of them.
///
/// Returns the gateway base URL and the upstream recorder.
async fn start_gateway(with_keys: bool, allowed_origin: Option<&str>) -> (String, Upstream) {
    let upstream = Upstream::default();
    let upstream_app = Router::new()
        .route("/v1/chat/completions", post(grok_completions))
        .route("/v1beta/models/{*rest}", post(gemini_generate))
        .with_state(upstream.clone());
    let upstream_url = serve(upstream_app).await;

    let config = GatewayConfig {
        gemini_api_key: with_keys.then(|| SecretString::from("gemini-key".to_string())),
        grok_api_key: with_keys.then(|| SecretString::from("grok-key".to_string())),
        allowed_origin: allowed_origin.map(str::to_string),
        gemini_base_url: upstream_url.clone(),
        grok_base_url: upstream_url,
        ..GatewayConfig::default()
    };

    let app = gateway_routes(GatewayState {
        gateway: Arc::new(Gateway::new(Providers::from_config(&config))),
        allowed_origin: config.allowed_origin.clone(),
    });
    let gateway_url = serve(app).await;

    // Give the servers a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (gateway_url, upstream)
}

fn proxy_url(base: &str) -> String {
    format!("{base}{GATEWAY_PATH}")
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn preflight_answers_before_any_check() {
    timeout(TEST_TIMEOUT, async {
        // Origin enforcement is on, yet the preflight carries no origin.
        let (base, _) = start_gateway(false, Some(ORIGIN)).await;

        let res = reqwest::Client::new()
            .request(reqwest::Method::OPTIONS, proxy_url(&base))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 204);
        let headers = res.headers();
        assert_eq!(headers["access-control-allow-origin"], ORIGIN);
        assert_eq!(headers["access-control-allow-methods"], "POST, OPTIONS");
        assert_eq!(headers["access-control-allow-headers"], "Content-Type");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn non_post_is_method_not_allowed() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_gateway(true, None).await;

        let res = reqwest::get(proxy_url(&base)).await.unwrap();
        assert_eq!(res.status(), 405);
        assert_eq!(res.headers()["access-control-allow-origin"], "*");

        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"]["code"], 405);
        assert_eq!(body["error"]["message"], "Method Not Allowed");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn foreign_origin_is_unauthorized() {
    timeout(TEST_TIMEOUT, async {
        let (base, upstream) = start_gateway(true, Some(ORIGIN)).await;
        let client = reqwest::Client::new();

        let res = client
            .post(proxy_url(&base))
            .header("Origin", "https://evil.example")
            .json(&json!({"message": "hi"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 401);

        let res = client
            .post(proxy_url(&base))
            .json(&json!({"message": "hi"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 401);

        let res = client
            .post(proxy_url(&base))
            .header("Origin", ORIGIN)
            .json(&json!({"message": "hi"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);

        assert_eq!(upstream.gemini_bodies.lock().unwrap().len(), 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn missing_message_is_bad_request() {
    timeout(TEST_TIMEOUT, async {
        let (base, upstream) = start_gateway(true, None).await;
        let client = reqwest::Client::new();

        for body in [json!({}), json!({"message": ""}), json!({"history": []})] {
            let res = client.post(proxy_url(&base)).json(&body).send().await.unwrap();
            assert_eq!(res.status(), 400, "body {body}");
            let err: Value = res.json().await.unwrap();
            assert_eq!(err["error"]["message"], "Bad Request: Message content is required.");
        }

        let res = client
            .post(proxy_url(&base))
            .header("Content-Type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400);

        assert!(upstream.gemini_bodies.lock().unwrap().is_empty());
        assert!(upstream.grok_bodies.lock().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn missing_keys_report_service_offline() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_gateway(false, None).await;
        let client = reqwest::Client::new();

        let res = client
            .post(proxy_url(&base))
            .json(&json!({"message": "hi", "model": "grok"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 503);
        let body: Value = res.json().await.unwrap();
        assert_eq!(
            body["error"]["message"],
            "Grok AI Service Offline. API key is not configured."
        );

        let res = client
            .post(proxy_url(&base))
            .json(&json!({"message": "hi", "model": "anything-else"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 503);
        let body: Value = res.json().await.unwrap();
        assert_eq!(
            body["error"]["message"],
            "Gemini AI Service Offline. API key is not configured."
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn grok_reply_is_normalized() {
    timeout(TEST_TIMEOUT, async {
        let (base, upstream) = start_gateway(true, None).await;

        let res = reqwest::Client::new()
            .post(proxy_url(&base))
            .json(&json!({
                "history": [
                    {"role": "user", "content": "Hi"},
                    {"role": "model", "content": "Hello! What brings you here?"}
                ],
                "message": "I need a chatbot",
                "model": "grok"
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 200);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body, json!({"text": "Grok here. [CHIPS:[\"Pricing\", \"Timeline\"]]"}));

        let sent = upstream.grok_bodies.lock().unwrap()[0].clone();
        let roles: Vec<&str> = sent["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(sent["messages"][3]["content"], "I need a chatbot");
        assert_eq!(sent["model"], "grok-4-latest");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn grok_upstream_status_is_propagated() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_gateway(true, None).await;

        let res = reqwest::Client::new()
            .post(proxy_url(&base))
            .json(&json!({"message": "hit the rate limit", "model": "grok"}))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 429);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"]["code"], 429);
        assert_eq!(body["error"]["message"], "Rate limit exceeded");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn gemini_payload_passes_through() {
    timeout(TEST_TIMEOUT, async {
        let (base, upstream) = start_gateway(true, None).await;

        let res = reqwest::Client::new()
            .post(proxy_url(&base))
            .json(&json!({"message": "Hello"}))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 200);
        let body: Value = res.json().await.unwrap();
        assert_eq!(
            body["candidates"][0]["content"]["parts"][0]["text"],
            "Hello from Gemini."
        );
        assert_eq!(body["usageMetadata"]["promptTokenCount"], 10);

        let sent = upstream.gemini_bodies.lock().unwrap()[0].clone();
        assert!(sent["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("[ACTION:OPEN_FORM]"));
        assert_eq!(sent["generationConfig"]["maxOutputTokens"], 2048);
        assert_eq!(sent["contents"][0]["role"], "user");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn health_reports_ok() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_gateway(false, None).await;

        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"status": "ok", "service": "lead-assist-gateway"}));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn conversation_qualifies_lead_end_to_end() {
    timeout(TEST_TIMEOUT, async {
        let (base, upstream) = start_gateway(true, None).await;

        let surface = Arc::new(SiteSurface::new());
        surface.set_chat_open(true).await;
        let orchestrator = Orchestrator::new(
            Arc::new(HttpGatewayClient::new(proxy_url(&base))),
            surface.clone(),
            ModelSelector::Gemini,
            HandoffTiming::immediate(),
        );

        let first = orchestrator.send_message("Hello").await;
        assert!(matches!(
            first,
            SendOutcome::Replied { ref text, handoff: None, .. } if text == "Hello from Gemini."
        ));

        orchestrator.set_model(ModelSelector::Grok).await;
        let second = orchestrator.send_message("What does it cost?").await;
        assert!(matches!(
            second,
            SendOutcome::Replied { ref text, ref chips, .. }
                if text == "Grok here." && chips == &["Pricing".to_string(), "Timeline".to_string()]
        ));

        // The Grok request replays the earlier Gemini turn without the welcome.
        let grok_sent = upstream.grok_bodies.lock().unwrap()[0].clone();
        assert_eq!(grok_sent["messages"].as_array().unwrap().len(), 4);

        orchestrator.set_model(ModelSelector::Gemini).await;
        let SendOutcome::Replied { text, handoff, .. } =
            orchestrator.send_message("I'm Jane and I want a chatbot").await
        else {
            panic!("expected a reply");
        };
        assert_eq!(text, "Thanks Jane, let's get this started.");
        handoff.expect("handoff scheduled").wait().await;

        assert!(!surface.is_chat_open().await);
        assert_eq!(surface.active_panel().await, ActivePanel::IntakeForm);
        let form = surface.form().await;
        assert_eq!(form.value(IntakeField::Name), Some("Jane"));
        assert_eq!(form.value(IntakeField::ProjectType), Some("Custom chatbot"));
        assert!(form.is_ai_sourced(IntakeField::Budget));
        assert_eq!(orchestrator.state().await, ChatState::Idle);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unconfigured_backend_degrades_conversation() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_gateway(false, None).await;

        let orchestrator = Orchestrator::new(
            Arc::new(HttpGatewayClient::new(proxy_url(&base))),
            Arc::new(SiteSurface::new()),
            ModelSelector::Grok,
            HandoffTiming::immediate(),
        );

        let outcome = orchestrator.send_message("Hi").await;
        assert!(matches!(outcome, SendOutcome::WentOffline { .. }));
        assert_eq!(orchestrator.state().await, ChatState::Degraded);
        assert_eq!(orchestrator.history().await.len(), 3);
    })
    .await
    .expect("test timed out");
}
