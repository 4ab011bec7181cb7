//! End-to-end tests of the control channel: a real control server, the
//! `hs-worker` binary, and stand-in workers built on tokio-tungstenite.

use std::time::Duration;

use assert_cmd::cargo::cargo_bin_cmd;
use futures_util::{SinkExt, StreamExt};
use hs_sandbox::{
    generate_token, ControlServer, Message, MessageKind, ParseResponse, RpcClient, RpcError,
    WorkerConfig,
};
use serde_json::json;
use tokio::process::{Child, Command};
use tokio_tungstenite::tungstenite::{self, Message as Frame};

const ACCEPT_TIMEOUT: Duration = Duration::from_secs(10);

// =========================================================================
// Helpers
// =========================================================================

fn spawn_worker(config: &WorkerConfig) -> Child {
    Command::new(env!("CARGO_BIN_EXE_hs-worker"))
        .arg(config.to_json().unwrap())
        .kill_on_drop(true)
        .spawn()
        .expect("failed to start hs-worker")
}

async fn accept(server: &mut ControlServer) -> RpcClient {
    tokio::time::timeout(ACCEPT_TIMEOUT, server.accept())
        .await
        .expect("no worker connected")
        .unwrap()
}

/// A control server with a real worker attached.
async fn sandbox() -> (ControlServer, RpcClient, Child) {
    let mut server = ControlServer::bind(0, generate_token()).await.unwrap();
    let mut config = server.worker_config();
    // loaded CI machines can be slow to open loopback connections
    config.connect_timeout_ms = 2000;
    let worker = spawn_worker(&config);
    let client = accept(&mut server).await;
    (server, client, worker)
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

// =========================================================================
// Parsing through the worker
// =========================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_parse_output() {
    let (_server, client, _worker) = sandbox().await;

    let response = client.parse("on click toggle .active").await.unwrap();
    assert!(matches!(response, ParseResponse::Output(_)));
    let document = response.document().unwrap().unwrap();
    assert_eq!(document["nodeData"]["type"], "hyperscript");
    assert_eq!(document["tokens"][0]["value"], "on");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_parse_error_and_critical() {
    let (_server, client, _worker) = sandbox().await;

    let response = client.parse("on click put 1").await.unwrap();
    assert!(matches!(response, ParseResponse::Error(_)));
    let document = response.document().unwrap().unwrap();
    assert_eq!(document["token"]["type"], "EOF");

    let response = client.parse("log \"unterminated").await.unwrap();
    assert!(matches!(response, ParseResponse::Critical(_)));

    // the worker survives both and keeps answering
    let response = client.parse("init log 1").await.unwrap();
    assert!(matches!(response, ParseResponse::Output(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_method() {
    let (_server, client, _worker) = sandbox().await;

    let payload = client.call("evaluate", json!("1 + 1")).await.unwrap();
    assert_eq!(payload, json!({"criticalError": "unknown method: \"evaluate\""}));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_calls() {
    let (_server, client, _worker) = sandbox().await;

    let (first, second, third) = tokio::join!(
        client.parse("init log 1"),
        client.parse("on click put 1"),
        client.parse("on load add .ready"),
    );
    assert!(matches!(first.unwrap(), ParseResponse::Output(_)));
    assert!(matches!(second.unwrap(), ParseResponse::Error(_)));
    assert!(matches!(third.unwrap(), ParseResponse::Output(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_worker_reconnects() {
    let mut server = ControlServer::bind(0, generate_token()).await.unwrap();
    let mut config = server.worker_config();
    config.connect_timeout_ms = 2000;
    let _worker = spawn_worker(&config);

    let client = accept(&mut server).await;
    assert!(client.parse("init").await.is_ok());
    drop(client);

    let client = accept(&mut server).await;
    let response = client.parse("init log 2").await.unwrap();
    assert!(matches!(response, ParseResponse::Output(_)));
}

// =========================================================================
// Correlation and failures, with a stand-in worker
// =========================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_responses_are_routed_by_id() {
    let mut server = ControlServer::bind(0, "secret").await.unwrap();
    let url = server.worker_config().control_url();

    tokio::spawn(async move {
        let (mut connection, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        let mut requests = Vec::new();
        while requests.len() < 2 {
            match connection.next().await {
                Some(Ok(Frame::Text(text))) => {
                    requests.push(serde_json::from_str::<Message>(text.as_str()).unwrap())
                }
                Some(Ok(_)) => continue,
                other => panic!("connection ended early: {other:?}"),
            }
        }
        // answer in reverse order of arrival
        for request in requests.into_iter().rev() {
            assert_eq!(request.kind, MessageKind::Request);
            let response = Message::response(request.id, json!({ "echo": request.payload }));
            let frame = serde_json::to_string(&response).unwrap();
            connection.send(Frame::Text(frame.into())).await.unwrap();
        }
        connection.next().await;
    });

    let client = accept(&mut server).await;
    let (first, second) = tokio::join!(
        client.call("echo", json!("first")),
        client.call("echo", json!("second")),
    );
    assert_eq!(first.unwrap(), json!({"echo": "first"}));
    assert_eq!(second.unwrap(), json!({"echo": "second"}));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_call_times_out() {
    let mut server = ControlServer::bind(0, "secret").await.unwrap();
    let url = server.worker_config().control_url();

    tokio::spawn(async move {
        let (mut connection, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        // read and never answer
        while connection.next().await.is_some() {}
    });

    let client = accept(&mut server)
        .await
        .with_timeout(Duration::from_millis(100));
    let result = client.call("echo", json!(1)).await;
    assert!(matches!(result, Err(RpcError::Timeout(_, _))));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disconnect_fails_pending_calls() {
    let mut server = ControlServer::bind(0, "secret").await.unwrap();
    let url = server.worker_config().control_url();

    tokio::spawn(async move {
        let (mut connection, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        connection.next().await;
        let _ = connection.close(None).await;
    });

    let client = accept(&mut server).await;
    let result = client.call("echo", json!(1)).await;
    assert!(matches!(result, Err(RpcError::Disconnected)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wrong_token_is_rejected() {
    let server = ControlServer::bind(0, "secret").await.unwrap();
    let url = format!("ws://localhost:{}/?token=guess", server.port());

    match tokio_tungstenite::connect_async(url).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 401),
        other => panic!("Expected a 401 rejection, got {other:?}"),
    }

    let url = format!("ws://localhost:{}/", server.port());
    assert!(tokio_tungstenite::connect_async(url).await.is_err());
}

// =========================================================================
// Worker process
// =========================================================================

#[test]
fn test_worker_exits_without_control_server() {
    let config = WorkerConfig::new(free_port(), "token");
    cargo_bin_cmd!("hs-worker")
        .arg(config.to_json().unwrap())
        .timeout(Duration::from_secs(10))
        .assert()
        .code(1);
}

#[test]
fn test_worker_exits_when_handshake_stalls() {
    // accepts TCP connections but never speaks websocket
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let config = WorkerConfig::new(listener.local_addr().unwrap().port(), "token");
    cargo_bin_cmd!("hs-worker")
        .arg(config.to_json().unwrap())
        .timeout(Duration::from_secs(10))
        .assert()
        .code(1);
}

#[test]
fn test_worker_rejects_bad_config() {
    cargo_bin_cmd!("hs-worker").assert().code(2);
    cargo_bin_cmd!("hs-worker")
        .arg(r#"{"controlServerPort": 80}"#)
        .assert()
        .code(2);
    cargo_bin_cmd!("hs-worker")
        .arg(r#"{"controlServerPort": 80, "token": "a b"}"#)
        .assert()
        .code(2);
}
