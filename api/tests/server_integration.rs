use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;

use portal_api::config::{AppConfig, SimulationConfig};
use portal_api::logging::MemorySink;
use portal_api::server::{AppState, serve};

struct RunningServer {
    base_url: String,
    sink: MemorySink,
    stop: oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<Result<()>>,
}

async fn start(simulation: SimulationConfig) -> Result<RunningServer> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);

    let mut config = AppConfig::default();
    config.simulation = simulation;
    config.server.shutdown_timeout = 5;

    let sink = MemorySink::new();
    let state = AppState::from_config(config, Arc::new(sink.clone()));
    let (stop, stopped) = oneshot::channel::<()>();

    let handle = tokio::spawn(serve(listener, state, async move {
        let _ = stopped.await;
    }));

    Ok(RunningServer {
        base_url,
        sink,
        stop,
        handle,
    })
}

/// Test that the server answers on its bound port with correlation headers
#[tokio::test]
async fn test_server_serves_health_with_correlation_headers() -> Result<()> {
    let server = start(SimulationConfig::instant()).await?;
    let client = reqwest::Client::new();

    let response = timeout(
        Duration::from_secs(5),
        client
            .get(format!("{}/health", server.base_url))
            .header("x-trace-id", "trace-integration")
            .send(),
    )
    .await??;

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-trace-id"], "trace-integration");
    assert!(response.headers().contains_key("x-request-id"));
    assert!(response.headers().contains_key("x-span-id"));
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "ok");

    let ready = client.get(format!("{}/health/ready", server.base_url)).send().await?;
    assert_eq!(ready.status(), 200);

    server.stop.send(()).ok();
    timeout(Duration::from_secs(5), server.handle).await???;
    Ok(())
}

/// Test that the ticket follow-up outlives the response but keeps its trace
#[tokio::test]
async fn test_ticket_follow_up_is_logged_after_response() -> Result<()> {
    let simulation = SimulationConfig {
        assignment_delay_ms: 100,
        ..SimulationConfig::instant()
    };
    let server = start(simulation).await?;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/tickets/create", server.base_url))
        .header("x-trace-id", "trace-follow-up")
        .json(&serde_json::json!({
            "title": "Printer",
            "description": "jammed",
            "priority": "low",
        }))
        .send()
        .await?;
    assert_eq!(response.status(), 201);

    // The response is back before the assignment fires.
    assert!(
        server
            .sink
            .entries_with_message("Business Event: Ticket ASSIGN_OFFICER")
            .is_empty()
    );

    let mut assigned = Vec::new();
    for _ in 0..50 {
        assigned = server.sink.entries_with_message("Business Event: Ticket ASSIGN_OFFICER");
        if !assigned.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].get_str("traceId"), Some("trace-follow-up"));

    server.stop.send(()).ok();
    timeout(Duration::from_secs(5), server.handle).await???;
    Ok(())
}

/// Test that shutdown cancels pending follow-up work instead of waiting it out
#[tokio::test]
async fn test_graceful_shutdown_cancels_pending_follow_up() -> Result<()> {
    let simulation = SimulationConfig {
        assignment_delay_ms: 60_000,
        ..SimulationConfig::instant()
    };
    let server = start(simulation).await?;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/tickets/create", server.base_url))
        .json(&serde_json::json!({ "title": "Laptop", "description": "broken screen" }))
        .send()
        .await?;
    assert_eq!(response.status(), 201);
    drop(client);

    server.stop.send(()).ok();
    timeout(Duration::from_secs(5), server.handle).await???;

    assert!(
        server
            .sink
            .entries_with_message("Business Event: Ticket ASSIGN_OFFICER")
            .is_empty()
    );
    Ok(())
}
