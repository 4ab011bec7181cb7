//! JSON reports of a parse.
//!
//! A parse request ends in exactly one [`Outcome`]:
//! - [`ParseOutput`] with the AST and the full token list;
//! - [`ErrorReport`] for a positioned parse error, again with every token so
//!   a client can render the context without tokenizing the source itself;
//! - a critical message for lexical and internal failures.

use hs_lexer::Token;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ParseError};
use crate::stream::TokenStream;
use crate::Parser;

/// The payload of a `parseHyperScript` request: a bare source string or an
/// options object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParseRequest {
    Source(String),
    Options {
        input: String,
        #[serde(rename = "doNotIncludeNodeData", default)]
        do_not_include_node_data: bool,
    },
}

impl ParseRequest {
    pub fn input(&self) -> &str {
        match self {
            ParseRequest::Source(input) | ParseRequest::Options { input, .. } => input,
        }
    }

    pub fn include_node_data(&self) -> bool {
        match self {
            ParseRequest::Source(_) => true,
            ParseRequest::Options {
                do_not_include_node_data,
                ..
            } => !do_not_include_node_data,
        }
    }
}

impl From<&str> for ParseRequest {
    fn from(input: &str) -> Self {
        ParseRequest::Source(input.to_string())
    }
}

/// A successful parse.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOutput {
    /// The `hyperscript` root node, or `{}` when node data was not requested.
    pub node_data: serde_json::Value,
    pub tokens: Vec<Token>,
}

/// A parse error, flattened for the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub message: String,
    pub message_at_token: String,
    pub token: Token,
    pub tokens: Vec<Token>,
}

impl ErrorReport {
    pub fn new(error: &ParseError, tokens: Vec<Token>) -> Self {
        Self {
            message: error.full_message.clone(),
            message_at_token: error.message_at_token.clone(),
            token: error.token.clone(),
            tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Output(ParseOutput),
    Error(ErrorReport),
    Critical(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Output(_))
    }
}

/// Parse a request into its outcome. Never fails: every error tier maps to
/// one of the three outcome shapes.
pub fn parse_request(request: &ParseRequest) -> Outcome {
    let mut stream = match TokenStream::tokenize(request.input()) {
        Ok(stream) => stream,
        Err(error) => return Outcome::Critical(error.to_string()),
    };
    let tokens = stream.all_tokens().to_vec();

    match Parser::parse_tokens(&mut stream) {
        Ok(node) => {
            let node_data = if request.include_node_data() {
                match serde_json::to_value(&node) {
                    Ok(value) => value,
                    Err(error) => return Outcome::Critical(error.to_string()),
                }
            } else {
                serde_json::Value::Object(serde_json::Map::new())
            };
            Outcome::Output(ParseOutput { node_data, tokens })
        }
        Err(Error::Parse(error)) => Outcome::Error(ErrorReport::new(&error, tokens)),
        Err(error) => Outcome::Critical(error.to_string()),
    }
}
