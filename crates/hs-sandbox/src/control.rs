//! Host side of the control channel.
//!
//! [`ControlServer`] listens on loopback and only upgrades connections that
//! present the process token; each accepted worker connection becomes an
//! [`RpcClient`].

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use rand::RngCore;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::RpcClient;
use crate::config::WorkerConfig;

/// Upgraded connections waiting for `accept`.
const CONNECTION_BACKLOG: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("failed to bind the control server: {0}")]
    Bind(#[from] std::io::Error),
    #[error("the control server stopped")]
    Closed,
}

/// A fresh process token: 32 random bytes, hex encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

struct ControlState {
    token: String,
    connections: mpsc::Sender<WebSocket>,
}

pub struct ControlServer {
    addr: SocketAddr,
    token: String,
    connections: mpsc::Receiver<WebSocket>,
    task: JoinHandle<()>,
}

impl ControlServer {
    /// Listen on loopback. Port 0 picks a free port.
    pub async fn bind(port: u16, token: impl Into<String>) -> Result<Self, ControlError> {
        let token = token.into();
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await?;
        let addr = listener.local_addr()?;

        let (sender, connections) = mpsc::channel(CONNECTION_BACKLOG);
        let state = Arc::new(ControlState {
            token: token.clone(),
            connections: sender,
        });
        let app = Router::new().route("/", get(upgrade)).with_state(state);
        let task = tokio::spawn(async move {
            if let Err(error) = axum::serve(listener, app).await {
                eprintln!("control server: {error}");
            }
        });

        Ok(Self {
            addr,
            token,
            connections,
            task,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// The launch configuration for a worker that should dial this server.
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::new(self.port(), self.token.clone())
    }

    /// Wait for the next authenticated worker connection.
    pub async fn accept(&mut self) -> Result<RpcClient, ControlError> {
        let socket = self.connections.recv().await.ok_or(ControlError::Closed)?;
        Ok(RpcClient::new(socket))
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn upgrade(
    State(state): State<Arc<ControlState>>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let presented = params.get("token").map(String::as_str);
    if !token_matches(&state.token, presented) {
        eprintln!("Warning: rejected a control connection with an invalid token");
        return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
    }
    let connections = state.connections.clone();
    ws.on_upgrade(move |socket| async move {
        if connections.send(socket).await.is_err() {
            eprintln!("Warning: dropped a control connection, the server is shutting down");
        }
    })
}

/// Constant-time comparison of a presented token against the process token.
/// Only the length can leak, and generated tokens have a fixed length.
pub fn token_matches(expected: &str, presented: Option<&str>) -> bool {
    let Some(presented) = presented else {
        return false;
    };
    if presented.len() != expected.len() {
        return false;
    }
    expected
        .bytes()
        .zip(presented.bytes())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generate_token() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());

        let config = WorkerConfig::new(1, token);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_token_matches() {
        let token = generate_token();
        assert!(token_matches(&token, Some(token.as_str())));
        assert!(!token_matches(&token, None));
        assert!(!token_matches(&token, Some("")));
        assert!(!token_matches(&token, Some(&token[..63])));

        let mut flipped = token.clone().into_bytes();
        flipped[63] = if flipped[63] == b'0' { b'1' } else { b'0' };
        let flipped = String::from_utf8(flipped).unwrap();
        assert!(!token_matches(&token, Some(flipped.as_str())));
    }

    #[tokio::test]
    async fn test_bind_picks_a_port() {
        let server = ControlServer::bind(0, "secret").await.unwrap();
        assert_ne!(server.port(), 0);
        assert_eq!(server.token(), "secret");

        let config = server.worker_config();
        assert_eq!(config.control_server_port, server.port());
        assert_eq!(
            config.control_url(),
            format!("ws://localhost:{}/?token=secret", server.port())
        );
    }
}
