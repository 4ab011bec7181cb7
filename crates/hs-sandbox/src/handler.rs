//! Request handlers of the worker.
//!
//! Handlers are plain functions keyed by method name. Every failure becomes
//! a response payload: parse errors as `errorJSON`, everything else,
//! including a panic inside the parser, as `criticalError`. The parser runs
//! each parse on its own large-stack thread, so neither deep nesting nor a
//! panic takes the worker down.

use std::collections::HashMap;

use hs_parser::report::{parse_request, Outcome, ParseRequest};
use serde_json::Value;

use crate::protocol::{Message, MessageKind, ParseResponse, PARSE_METHOD};

pub type Handler = fn(&Value) -> ParseResponse;

pub struct Handlers {
    handlers: HashMap<&'static str, Handler>,
}

impl Handlers {
    /// The worker's handler set: `parseHyperScript` only.
    pub fn worker() -> Self {
        let mut handlers = Self {
            handlers: HashMap::new(),
        };
        handlers.register(PARSE_METHOD, parse_hyper_script);
        handlers
    }

    pub fn register(&mut self, method: &'static str, handler: Handler) {
        self.handlers.insert(method, handler);
    }

    /// Answer a request frame. Frames of any other kind get no response.
    pub fn handle(&self, message: &Message) -> Option<Message> {
        if message.kind != MessageKind::Request {
            return None;
        }
        let method = message.method.as_deref().unwrap_or_default();
        let response = match self.handlers.get(method) {
            Some(handler) => handler(&message.payload),
            None => ParseResponse::Critical(format!("unknown method: {method:?}")),
        };
        let payload = match serde_json::to_value(&response) {
            Ok(payload) => payload,
            Err(error) => serde_json::json!({ "criticalError": error.to_string() }),
        };
        Some(Message::response(message.id.clone(), payload))
    }
}

/// Parse the source in `payload`, a bare string or `{input, doNotIncludeNodeData}`.
pub fn parse_hyper_script(payload: &Value) -> ParseResponse {
    let request: ParseRequest = match serde_json::from_value(payload.clone()) {
        Ok(request) => request,
        Err(error) => return ParseResponse::Critical(format!("invalid payload: {error}")),
    };

    let outcome = parse_request(&request);
    let serialized = match &outcome {
        Outcome::Output(output) => serde_json::to_string(output).map(ParseResponse::Output),
        Outcome::Error(report) => serde_json::to_string(report).map(ParseResponse::Error),
        Outcome::Critical(message) => Ok(ParseResponse::Critical(message.clone())),
    };
    serialized.unwrap_or_else(|error| ParseResponse::Critical(error.to_string()))
}
