//! Parse error model.
//!
//! Grammar rules report three kinds of failure: a lexical error raised while
//! re-lexing an embedded template, a positioned [`ParseError`] for input that
//! does not fit the grammar, and an internal error for everything else
//! (nesting limit, unknown rule names).

use hs_lexer::{LexerError, Token};

/// A grammar rule required something that was not there.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{full_message}")]
pub struct ParseError {
    /// `message_at_token` followed by the position and a caret under the
    /// offending source line.
    pub full_message: String,
    pub message_at_token: String,
    /// The token the parser was looking at, possibly the synthesized EOF.
    pub token: Token,
    /// Unconsumed tokens from `token` onwards, whitespace included.
    pub remaining_tokens: Vec<Token>,
}

impl ParseError {
    pub fn new(
        message: Option<&str>,
        token: Token,
        remaining_tokens: Vec<Token>,
        source: &str,
    ) -> Self {
        let message_at_token = match message {
            Some(message) => message.to_string(),
            None => format!("Unexpected Token : {}", token.text),
        };
        let full_message = format!(
            "{} (line {}, column {})\n\n{}",
            message_at_token,
            token.span.line,
            token.span.column + 1,
            render_context(source, &token)
        );
        Self {
            full_message,
            message_at_token,
            token,
            remaining_tokens,
        }
    }
}

/// The source line holding `token`, with `^^` under its first column.
fn render_context(source: &str, token: &Token) -> String {
    let lines = split_lines(source);
    let index = (token.span.line as usize)
        .checked_sub(1)
        .filter(|index| *index < lines.len())
        .unwrap_or(lines.len().saturating_sub(1));
    let line = lines.get(index).copied().unwrap_or_default();
    let pad = " ".repeat(token.span.column as usize);
    format!("{line}\n{pad}^^")
}

/// Split on `\r\n`, `\n` and lone `\r`, the same breaks the scanner counts.
fn split_lines(source: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&source[start..i]);
                start = i + 1;
            }
            b'\r' => {
                lines.push(&source[start..i]);
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    lines.push(&source[start..]);
    lines
}

/// Result type of every grammar rule.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexerError),
    #[error(transparent)]
    Parse(Box<ParseError>),
    #[error("{0}")]
    Internal(String),
}

impl From<ParseError> for Error {
    fn from(error: ParseError) -> Self {
        Error::Parse(Box::new(error))
    }
}

impl Error {
    /// The positioned parse error, if this is one.
    pub fn as_parse_error(&self) -> Option<&ParseError> {
        match self {
            Error::Parse(error) => Some(error),
            _ => None,
        }
    }
}
