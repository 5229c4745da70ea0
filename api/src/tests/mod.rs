//! Router-level tests: the full route table and middleware stack driven
//! in-process, with the event stream captured in memory.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::config::{AppConfig, SimulationConfig};
use crate::logging::{LogEntry, MemorySink};
use crate::server::{AppState, create_router};

struct TestApp {
    state: AppState,
    sink: MemorySink,
}

impl TestApp {
    fn new() -> Self {
        let config = AppConfig {
            simulation: SimulationConfig::instant(),
            ..AppConfig::default()
        };
        let sink = MemorySink::new();
        let state = AppState::from_config(config, Arc::new(sink.clone()));
        Self { state, sink }
    }

    fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router().oneshot(request).await.unwrap()
    }

    fn events(&self, kind: &str) -> Vec<LogEntry> {
        self.sink
            .entries()
            .into_iter()
            .filter(|entry| entry.get_str("type") == Some(kind))
            .collect()
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn header<'a>(response: &'a Response, name: &str) -> &'a str {
    response.headers()[name].to_str().unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app.send(get("/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_client_trace_id_is_echoed() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/health")
        .header("x-trace-id", "trace-frontend-123")
        .header("x-request-id", "req-frontend-1")
        .body(Body::empty())
        .unwrap();

    let response = app.send(request).await;

    assert_eq!(header(&response, "x-trace-id"), "trace-frontend-123");
    assert_eq!(header(&response, "x-request-id"), "req-frontend-1");
    assert!(header(&response, "x-span-id").starts_with("trace-frontend-123-api-"));
    for entry in app.sink.entries() {
        assert_eq!(entry.get_str("traceId"), Some("trace-frontend-123"));
    }
}

#[tokio::test]
async fn test_generated_trace_ids_are_unique() {
    let app = TestApp::new();
    let mut seen = std::collections::HashSet::new();

    for _ in 0..20 {
        let response = app.send(get("/health")).await;
        let trace_id = header(&response, "x-trace-id").to_string();
        assert!(!trace_id.is_empty());
        assert!(seen.insert(trace_id));
    }
}

#[tokio::test]
async fn test_login_missing_password() {
    let app = TestApp::new();
    let response = app.send(post_json("/login", json!({ "username": "ada" }))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let trace_id = header(&response, "x-trace-id").to_string();
    let body = json_body(response).await;
    assert_eq!(body["error"], "Missing username or password");
    assert_eq!(body["traceId"], trace_id.as_str());
    assert!(body["spanId"].is_string());
    assert_eq!(
        body["observabilityMetadata"],
        json!({ "action": "LOGIN", "result": "FAILURE", "reason": "Missing credentials" })
    );

    let security = app.events("SECURITY_EVENT");
    assert_eq!(security.len(), 1);
    assert_eq!(security[0].get_str("action"), Some("LOGIN_FAILED"));
    assert_eq!(security[0].get_str("result"), Some("FAILURE"));
    assert_eq!(security[0].get_str("level"), Some("WARN"));
    assert_eq!(security[0].get_str("username"), Some("ada"));
}

#[tokio::test]
async fn test_login_without_body_counts_as_missing() {
    let app = TestApp::new();
    let request = Request::builder().method("POST").uri("/login").body(Body::empty()).unwrap();

    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let security = app.events("SECURITY_EVENT");
    assert_eq!(security[0].get_str("username"), Some("unknown"));
}

#[tokio::test]
async fn test_login_success() {
    let app = TestApp::new();
    let response = app
        .send(post_json("/login", json!({ "username": "ada", "password": "secret" })))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["username"], "ada");
    assert!(body["token"].as_str().unwrap().starts_with("token-"));
    assert_eq!(body["observabilityMetadata"]["result"], "SUCCESS");

    let success: Vec<_> = app
        .events("BUSINESS_EVENT")
        .into_iter()
        .filter(|e| e.get_str("result") == Some("SUCCESS"))
        .collect();
    assert_eq!(success.len(), 1);
    assert_eq!(success[0].get_str("message"), Some("Business Event: User LOGIN"));
    assert_eq!(success[0].get("tokenIssued"), Some(&json!(true)));
    assert!(app.sink.lines().iter().all(|line| !line.contains("secret")));
}

#[tokio::test]
async fn test_dashboard() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/dashboard")
        .header("x-user-id", "user-7")
        .body(Body::empty())
        .unwrap();

    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["welcome"], "Welcome to your dashboard!");
    assert_eq!(body["metrics"]["totalTickets"], 42);
    assert_eq!(body["metrics"]["openTickets"], 7);
    assert_eq!(body["metrics"]["avgResponseTime"], "2.5 hours");
    assert_eq!(body["observabilityMetadata"]["dataPoints"], 10);

    let access = app.sink.entries_with_message("Business Event: Dashboard ACCESS");
    assert_eq!(access[0].get_str("userId"), Some("user-7"));
}

#[tokio::test]
async fn test_ticket_created_and_assigned() {
    let app = TestApp::new();
    let request = Request::builder()
        .method("POST")
        .uri("/tickets/create")
        .header("content-type", "application/json")
        .header("x-trace-id", "trace-ticket")
        .header("x-bp-id", "BP-77")
        .body(Body::from(
            json!({ "title": "VPN down", "description": "cannot connect", "priority": "high" })
                .to_string(),
        ))
        .unwrap();

    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    let ticket_id = body["ticketId"].as_str().unwrap().to_string();
    assert!(regex::Regex::new(r"^TKT-\d{6}$").unwrap().is_match(&ticket_id));
    assert_eq!(body["status"], "created");
    assert_eq!(body["priority"], "high");
    assert_eq!(body["observabilityMetadata"]["ticketId"], ticket_id.as_str());

    assert!(app.state.tasks.wait_idle(Duration::from_secs(5)).await);

    let assigned = app.sink.entries_with_message("Business Event: Ticket ASSIGN_OFFICER");
    assert_eq!(assigned.len(), 1);
    let entry = &assigned[0];
    assert_eq!(entry.get_str("type"), Some("BATCH_PROCESS"));
    assert_eq!(entry.get_str("processType"), Some("AUTO_ASSIGNMENT"));
    assert_eq!(entry.get_str("traceId"), Some("trace-ticket"));
    assert_eq!(entry.get_str("bpId"), Some("BP-77"));
    assert_eq!(entry.get_str("ticketId"), Some(ticket_id.as_str()));
    assert!(entry.get_str("spanId").unwrap().starts_with("trace-ticket-batch-"));
    assert!(entry.get_str("assignedOfficer").unwrap().starts_with("OFF-"));
}

#[tokio::test]
async fn test_ticket_missing_fields() {
    let app = TestApp::new();
    let response = app.send(post_json("/tickets/create", json!({ "title": "only a title" }))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Title and description are required");
    assert_eq!(body["observabilityMetadata"]["reason"], "Missing required fields");

    let failures: Vec<_> = app
        .events("BUSINESS_EVENT")
        .into_iter()
        .filter(|e| e.get_str("result") == Some("FAILURE"))
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(app.state.tasks.in_flight(), 0);
}

#[tokio::test]
async fn test_search_vpn() {
    let app = TestApp::new();
    let body = json_body(app.send(get("/search?q=vpn")).await).await;

    assert_eq!(body["results"], json!(["VPN configuration steps"]));
    assert_eq!(body["count"], 1);
    assert_eq!(body["observabilityMetadata"]["resultCount"], 1);
}

#[tokio::test]
async fn test_search_without_query() {
    let app = TestApp::new();
    let body = json_body(app.send(get("/search")).await).await;

    assert_eq!(body["query"], "");
    assert_eq!(body["results"], json!([]));
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_one_completion_entry_per_request() {
    let app = TestApp::new();
    app.send(get("/search?q=guide")).await;
    app.send(post_json("/login", json!({}))).await;

    let completions: Vec<_> = app
        .events("EXTERNAL_CALL")
        .into_iter()
        .filter(|e| e.get_str("message").is_some_and(|m| m.starts_with("Request completed")))
        .collect();
    assert_eq!(completions.len(), 2);
    for entry in &completions {
        assert!(entry.get("duration").and_then(Value::as_u64).is_some());
    }
    assert_eq!(completions[0].get_str("result"), Some("SUCCESS"));
    assert_eq!(completions[1].get_str("result"), Some("FAILURE"));
}

#[tokio::test]
async fn test_malformed_json_is_reported() {
    let app = TestApp::new();
    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header("content-type", "application/json")
        .header("x-trace-id", "trace-bad-json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Internal server error");
    assert_eq!(body["traceId"], "trace-bad-json");
    assert_eq!(body["observabilityMetadata"]["action"], "ERROR_HANDLER");
    assert_eq!(body["observabilityMetadata"]["result"], "FAILURE");

    let errors = app.events("SYSTEM_ERROR");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].get_str("traceId"), Some("trace-bad-json"));
    assert!(errors[0].get_str("error").unwrap().starts_with("Malformed request"));
}

#[tokio::test]
async fn test_non_string_credentials_are_a_fault() {
    let app = TestApp::new();
    let response = app
        .send(post_json("/login", json!({ "username": 123, "password": "x" })))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.events("SYSTEM_ERROR").len(), 1);
    assert!(app.events("SECURITY_EVENT").is_empty());
}

#[tokio::test]
async fn test_duplicate_query_parameter_is_a_fault() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/search?q=a&q=b")
        .header("x-trace-id", "trace-bad-query")
        .body(Body::empty())
        .unwrap();

    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(header(&response, "x-trace-id"), "trace-bad-query");
    let body = json_body(response).await;
    assert_eq!(body["traceId"], "trace-bad-query");
    assert_eq!(body["observabilityMetadata"]["result"], "FAILURE");

    let errors = app.events("SYSTEM_ERROR");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].get_str("traceId"), Some("trace-bad-query"));
}

#[tokio::test]
async fn test_request_dropped_mid_handler_schedules_no_follow_up() {
    let config = AppConfig {
        simulation: SimulationConfig {
            ticket_delay_ms: 500,
            ..SimulationConfig::instant()
        },
        ..AppConfig::default()
    };
    let sink = MemorySink::new();
    let state = AppState::from_config(config, Arc::new(sink.clone()));
    let request = post_json(
        "/tickets/create",
        json!({ "title": "Monitor", "description": "flickers" }),
    );

    let dropped = tokio::time::timeout(
        Duration::from_millis(50),
        create_router(state.clone()).oneshot(request),
    )
    .await;
    assert!(dropped.is_err());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(state.tasks.wait_idle(Duration::from_secs(1)).await);
    assert_eq!(state.tasks.in_flight(), 0);
    assert!(sink.entries_with_message("Business Event: Ticket ASSIGN_OFFICER").is_empty());
    assert!(
        sink.entries()
            .iter()
            .all(|entry| entry.get_str("result") != Some("SUCCESS"))
    );
    assert!(
        sink.entries_with_message("Request completed: POST /tickets/create")
            .is_empty()
    );
}

#[tokio::test]
async fn test_cors_exposes_correlation_headers() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/health")
        .header("origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.send(request).await;

    let exposed = header(&response, "access-control-expose-headers").to_lowercase();
    for name in ["x-trace-id", "x-request-id", "x-span-id", "x-debug-traceid"] {
        assert!(exposed.contains(name), "{} not exposed", name);
    }
}

#[tokio::test]
async fn test_readiness_follows_state() {
    let app = TestApp::new();
    assert_eq!(app.send(get("/health/ready")).await.status(), StatusCode::SERVICE_UNAVAILABLE);

    app.state.readiness.mark_ready();
    let response = app.send(get("/health/ready")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "status": "ready" }));
}
