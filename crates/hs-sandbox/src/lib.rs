//! Sandboxed hyperscript parsing.
//!
//! A host process runs a [`ControlServer`] on loopback and launches the
//! `hs-worker` binary with a [`WorkerConfig`] naming the server's port and a
//! freshly generated token. The worker dials out, authenticates with the
//! token, and answers `parseHyperScript` requests until the connection
//! closes, then dials again. A worker that cannot connect within its
//! timeout exits with status 1.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use hs_sandbox::{generate_token, ControlServer};
//!
//! let mut server = ControlServer::bind(0, generate_token()).await?;
//! let config = server.worker_config().to_json()?;
//! let _worker = tokio::process::Command::new("hs-worker").arg(config).spawn()?;
//!
//! let client = server.accept().await?;
//! let response = client.parse("on click toggle .active").await?;
//! println!("{response:?}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod control;
pub mod handler;
pub mod protocol;
pub mod worker;

pub use client::{RpcClient, RpcError};
pub use config::{ConfigError, WorkerConfig};
pub use control::{generate_token, ControlError, ControlServer};
pub use protocol::{Message, MessageId, MessageKind, ParseResponse};
pub use worker::WorkerError;
