use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::ServiceExt;

use webhook_relay::config::{ForwardConfig, WebhookConfig};
use webhook_relay::server::{router, AppState};
use webhook_relay::{
    DeliveryError, DeliveryRecord, DeliverySink, Forwarder, MappingRule, MemorySink, Recorder,
    RelayConfig, RelayEvent, SinkError,
};

#[derive(Debug, Clone)]
struct Received {
    content_type: Option<String>,
    user_agent: Option<String>,
    body: Value,
}

type Seen = Arc<Mutex<Vec<Received>>>;

async fn created(State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, &'static str) {
    let get = |name: header::HeaderName| headers.get(name).and_then(|v| v.to_str().ok()).map(String::from);
    seen.lock().unwrap().push(Received {
        content_type: get(header::CONTENT_TYPE),
        user_agent: get(header::USER_AGENT),
        body,
    });
    (StatusCode::CREATED, "created")
}

async fn spawn_target() -> (SocketAddr, Seen) {
    let seen: Seen = Arc::default();
    let app = Router::new()
        .route("/created", post(created))
        .route("/broken", post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }))
        .route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        )
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (addr, seen)
}

/// An address nothing listens on.
fn closed_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

fn forwarder(sink: Arc<MemorySink>) -> Forwarder {
    Forwarder::new(&ForwardConfig::default(), sink).unwrap()
}

#[tokio::test]
async fn test_forward_records_target_status() {
    let (addr, seen) = spawn_target().await;
    let sink = Arc::new(MemorySink::new());
    let source = json!({"user": {"name": "John"}});
    let transformed = json!({"author": "John"});

    let response = forwarder(sink.clone())
        .forward("gh", &format!("http://{addr}/created"), &source, &transformed)
        .await
        .unwrap();
    assert_eq!(response.status, 201);
    assert_eq!(response.body, "created");
    assert!(response.is_success());

    let received = seen.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].body, transformed);
    assert_eq!(received[0].content_type.as_deref(), Some("application/json"));
    assert!(received[0].user_agent.as_deref().unwrap().starts_with("webhook-relay/"));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].webhook_id, "gh");
    assert_eq!(records[0].response_code, 201);
    assert_eq!(records[0].response_body, "created");
    assert_eq!(serde_json::from_str::<Value>(&records[0].source_payload).unwrap(), source);
    assert_eq!(serde_json::from_str::<Value>(&records[0].payload).unwrap(), transformed);
}

#[tokio::test]
async fn test_forward_keeps_non_2xx_answers() {
    let (addr, _) = spawn_target().await;
    let sink = Arc::new(MemorySink::new());
    let response = forwarder(sink.clone())
        .forward("gh", &format!("http://{addr}/broken"), &json!({}), &json!({}))
        .await
        .unwrap();
    assert_eq!(response.status, 500);
    assert!(!response.is_success());
    assert_eq!(sink.records()[0].response_code, 500);
    assert_eq!(sink.records()[0].response_body, "boom");
}

#[tokio::test]
async fn test_forward_connection_refused() {
    let sink = Arc::new(MemorySink::new());
    let recorder = Arc::new(Recorder::new());
    let result = forwarder(sink.clone())
        .with_observer(recorder.clone())
        .forward("gh", &format!("http://{}/", closed_addr()), &json!({"a": 1}), &json!({"b": 1}))
        .await;
    assert!(matches!(result, Err(DeliveryError::Transport(_))));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].transport_failed());
    assert!(records[0].response_body.starts_with("Error: "));
    assert!(recorder
        .events()
        .iter()
        .any(|e| matches!(e, RelayEvent::DeliveryFailed { .. })));
}

#[tokio::test]
async fn test_forward_times_out() {
    let (addr, _) = spawn_target().await;
    let sink = Arc::new(MemorySink::new());
    let config = ForwardConfig { timeout_secs: 1, ..ForwardConfig::default() };
    let result = Forwarder::new(&config, sink.clone())
        .unwrap()
        .forward("gh", &format!("http://{addr}/slow"), &json!({}), &json!({}))
        .await;
    assert!(result.is_err());
    assert_eq!(sink.records()[0].response_code, 0);
}

struct FailingSink;

#[async_trait]
impl DeliverySink for FailingSink {
    async fn record(&self, _record: DeliveryRecord) -> Result<(), SinkError> {
        Err(SinkError::Io(std::io::Error::other("disk full")))
    }
}

#[tokio::test]
async fn test_sink_failure_does_not_fail_delivery() {
    let (addr, _) = spawn_target().await;
    let recorder = Arc::new(Recorder::new());
    let response = Forwarder::new(&ForwardConfig::default(), Arc::new(FailingSink))
        .unwrap()
        .with_observer(recorder.clone())
        .forward("gh", &format!("http://{addr}/created"), &json!({}), &json!({}))
        .await
        .unwrap();
    assert_eq!(response.status, 201);
    assert!(recorder
        .events()
        .iter()
        .any(|e| matches!(e, RelayEvent::SinkFailed { error, .. } if error.contains("disk full"))));
}

// ---------- HTTP surface ----------

fn relay_app(target_url: String, mappings: Vec<MappingRule>, sink: Arc<MemorySink>) -> Router {
    let config = RelayConfig {
        webhooks: vec![WebhookConfig {
            id: "gh".into(),
            name: None,
            target_url,
            mappings,
        }],
        ..RelayConfig::default()
    };
    let forwarder = Forwarder::new(&config.forward, sink).unwrap();
    router(AppState::new(config, forwarder))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_hook_delivers_transformed_payload() {
    let (addr, seen) = spawn_target().await;
    let sink = Arc::new(MemorySink::new());
    let app = relay_app(
        format!("http://{addr}/created"),
        vec![MappingRule::field("user.name", "author")],
        sink.clone(),
    );

    let response = app
        .oneshot(post_json("/hook/gh", json!({"user": {"name": "John"}})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!({"status": "delivered"}));

    assert_eq!(seen.lock().unwrap()[0].body, json!({"author": "John"}));
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].response_code, 201);
    assert_eq!(records[0].payload, r#"{"author":"John"}"#);
    assert_eq!(records[0].source_payload, r#"{"user":{"name":"John"}}"#);
}

#[tokio::test]
async fn test_hook_without_mappings_forwards_unchanged() {
    let (addr, seen) = spawn_target().await;
    let app = relay_app(format!("http://{addr}/created"), vec![], Arc::new(MemorySink::new()));
    let payload = json!({"event": "push", "commits": [1, 2]});

    let response = app.oneshot(post_json("/hook/gh", payload.clone())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(seen.lock().unwrap()[0].body, payload);
}

#[tokio::test]
async fn test_hook_answers_502_on_target_error() {
    let (addr, _) = spawn_target().await;
    let sink = Arc::new(MemorySink::new());
    let app = relay_app(format!("http://{addr}/broken"), vec![], sink.clone());

    let response = app.oneshot(post_json("/hook/gh", json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(read_json(response).await, json!({"error": "Bad Gateway"}));
    assert_eq!(sink.records()[0].response_code, 500);
}

#[tokio::test]
async fn test_hook_answers_502_when_target_unreachable() {
    let sink = Arc::new(MemorySink::new());
    let app = relay_app(format!("http://{}/", closed_addr()), vec![], sink.clone());

    let response = app.oneshot(post_json("/hook/gh", json!({"a": 1}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(read_json(response).await, json!({"error": "Bad Gateway"}));
    assert_eq!(sink.records()[0].response_code, 0);
}

#[tokio::test]
async fn test_unknown_hook_is_404() {
    let sink = Arc::new(MemorySink::new());
    let app = relay_app("http://127.0.0.1:9/".into(), vec![], sink.clone());

    let response = app.oneshot(post_json("/hook/nope", json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(response).await, json!({"error": "Webhook not found"}));
    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn test_fields_extract_route() {
    let app = relay_app("http://127.0.0.1:9/".into(), vec![], Arc::new(MemorySink::new()));
    let response = app
        .oneshot(post_json("/fields/extract", json!({"payload": {"user": {"name": "John"}}})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_json(response).await,
        json!({"fields": [
            {"path": "user", "type": "object (→ JSON string)", "sample": "{name}"},
            {"path": "user.name", "type": "string", "sample": "John"}
        ]})
    );
}

#[tokio::test]
async fn test_hook_reports_mapping_events() {
    let (addr, seen) = spawn_target().await;
    let config = RelayConfig {
        webhooks: vec![WebhookConfig {
            id: "gh".into(),
            name: Some("GitHub".into()),
            target_url: format!("http://{addr}/created"),
            mappings: vec![
                MappingRule::field("user.email", "email"),
                MappingRule::field("user.name", "author"),
            ],
        }],
        ..RelayConfig::default()
    };
    let forwarder = Forwarder::new(&config.forward, Arc::new(MemorySink::new())).unwrap();
    let recorder = Arc::new(Recorder::new());
    let app = router(AppState::new(config, forwarder).with_observer(recorder.clone()));

    let response = app
        .oneshot(post_json("/hook/gh", json!({"user": {"name": "John"}})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(seen.lock().unwrap()[0].body, json!({"author": "John"}));
    assert!(matches!(
        recorder.events().as_slice(),
        [RelayEvent::RuleSkipped { index: 0, .. }]
    ));
}
