//! Host-side RPC client over an accepted worker connection.
//!
//! Requests get increasing numeric ids. A reader task routes every response
//! to the waiter registered under its id, whatever order the worker answers
//! in. When the connection drops, every pending call fails with
//! [`RpcError::Disconnected`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::ws::{Message as Frame, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use hs_parser::report::ParseRequest;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::protocol::{Message, MessageId, MessageKind, ParseResponse, PARSE_METHOD};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("no response to request {0} within {1:?}")]
    Timeout(MessageId, Duration),
    #[error("the worker disconnected")]
    Disconnected,
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("transport failure: {0}")]
    Transport(#[from] axum::Error),
}

type Pending = Arc<Mutex<HashMap<MessageId, oneshot::Sender<Value>>>>;

pub struct RpcClient {
    sink: tokio::sync::Mutex<SplitSink<WebSocket, Frame>>,
    pending: Pending,
    next_id: AtomicU64,
    timeout: Duration,
    reader: JoinHandle<()>,
}

impl RpcClient {
    pub fn new(socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        let pending = Pending::default();
        let reader = tokio::spawn(route_responses(stream, Arc::clone(&pending)));
        Self {
            sink: tokio::sync::Mutex::new(sink),
            pending,
            next_id: AtomicU64::new(1),
            timeout: DEFAULT_CALL_TIMEOUT,
            reader,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        !self.reader.is_finished()
    }

    /// Send a request and wait for the response with the same id.
    pub async fn call(&self, method: &str, payload: Value) -> Result<Value, RpcError> {
        let id = MessageId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let frame = serde_json::to_string(&Message::request(id.clone(), method, payload))?;

        let (waiter, response) = oneshot::channel();
        lock(&self.pending).insert(id.clone(), waiter);
        if !self.is_connected() {
            lock(&self.pending).remove(&id);
            return Err(RpcError::Disconnected);
        }

        let sent = self.sink.lock().await.send(Frame::Text(frame.into())).await;
        if let Err(error) = sent {
            lock(&self.pending).remove(&id);
            return Err(RpcError::Transport(error));
        }

        match tokio::time::timeout(self.timeout, response).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(RpcError::Disconnected),
            Err(_) => {
                lock(&self.pending).remove(&id);
                Err(RpcError::Timeout(id, self.timeout))
            }
        }
    }

    /// Parse `source` in the worker.
    pub async fn parse(&self, source: &str) -> Result<ParseResponse, RpcError> {
        self.parse_request(&ParseRequest::Options {
            input: source.to_string(),
            do_not_include_node_data: false,
        })
        .await
    }

    pub async fn parse_request(&self, request: &ParseRequest) -> Result<ParseResponse, RpcError> {
        let payload = self
            .call(PARSE_METHOD, serde_json::to_value(request)?)
            .await?;
        Ok(serde_json::from_value(payload)?)
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn lock(pending: &Pending) -> MutexGuard<'_, HashMap<MessageId, oneshot::Sender<Value>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn route_responses(mut stream: SplitStream<WebSocket>, pending: Pending) {
    while let Some(Ok(frame)) = stream.next().await {
        let text = match frame {
            Frame::Text(text) => text,
            Frame::Close(_) => break,
            _ => continue,
        };
        let message: Message = match serde_json::from_str(text.as_str()) {
            Ok(message) => message,
            Err(error) => {
                eprintln!("Warning: skipping malformed frame from the worker: {error}");
                continue;
            }
        };
        if message.kind != MessageKind::Response {
            continue;
        }
        match lock(&pending).remove(&message.id) {
            Some(waiter) => {
                let _ = waiter.send(message.payload);
            }
            None => eprintln!("Warning: response to unknown request {}", message.id),
        }
    }
    // dropping the waiters fails their calls with `Disconnected`
    lock(&pending).clear();
}
