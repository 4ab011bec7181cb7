//! The connect-serve-reconnect loop of the sandboxed worker.
//!
//! The worker dials out to the control server and never listens itself. A
//! connection that does not open within the configured timeout ends the
//! loop with an error, which the binary turns into exit status 1. A closed
//! connection is simply dialed again.

use std::convert::Infallible;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message as Frame};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::WorkerConfig;
use crate::handler::Handlers;
use crate::protocol::Message;

pub type Connection = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("the control connection did not open within {0:?}")]
    HandshakeTimeout(Duration),
    #[error("failed to connect to the control server: {0}")]
    Connect(#[source] tungstenite::Error),
    #[error("control connection failed: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("failed to encode a response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Serve the control server until a connection attempt fails.
pub async fn run(config: &WorkerConfig) -> Result<Infallible, WorkerError> {
    let handlers = Handlers::worker();
    loop {
        let mut connection = connect(config).await?;
        eprintln!(
            "hs-worker: connected to control server on port {}",
            config.control_server_port
        );
        if let Err(error) = serve(&mut connection, &handlers, config.verbose).await {
            eprintln!("hs-worker: {error}");
        }
        eprintln!("hs-worker: control connection closed, reconnecting");
    }
}

/// Open the control connection, giving up after the connect timeout.
pub async fn connect(config: &WorkerConfig) -> Result<Connection, WorkerError> {
    let timeout = config.connect_timeout();
    match tokio::time::timeout(timeout, connect_async(config.control_url())).await {
        Ok(Ok((connection, _))) => Ok(connection),
        Ok(Err(error)) => Err(WorkerError::Connect(error)),
        Err(_) => Err(WorkerError::HandshakeTimeout(timeout)),
    }
}

/// Answer requests one at a time until the connection closes.
pub async fn serve(
    connection: &mut Connection,
    handlers: &Handlers,
    verbose: bool,
) -> Result<(), WorkerError> {
    while let Some(frame) = connection.next().await {
        let text = match frame? {
            Frame::Text(text) => text,
            Frame::Close(_) => break,
            _ => continue,
        };
        let message: Message = match serde_json::from_str(text.as_str()) {
            Ok(message) => message,
            Err(error) => {
                eprintln!("hs-worker: skipping malformed frame: {error}");
                continue;
            }
        };
        if verbose {
            eprintln!(
                "hs-worker: request {} {}",
                message.id,
                message.method.as_deref().unwrap_or("-")
            );
        }
        if let Some(response) = handlers.handle(&message) {
            let frame = serde_json::to_string(&response)?;
            connection.send(Frame::Text(frame.into())).await?;
        }
    }
    Ok(())
}
