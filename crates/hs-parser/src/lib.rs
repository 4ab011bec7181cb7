//! Hyperscript Parser
//!
//! Parses hyperscript source into an Abstract Syntax Tree without ever
//! evaluating it. The grammar is a registry of named rules (see
//! [`grammar`]) driven over a [`TokenStream`]; failures come back as one of
//! the three [`Error`] tiers.
//!
//! # Example
//!
//! ```
//! use hs_parser::Parser;
//!
//! let script = Parser::parse("on click toggle .active").unwrap();
//! assert_eq!(script.node.type_name(), "hyperscript");
//!
//! let error = Parser::parse("on click if").unwrap_err();
//! assert_eq!(error.as_parse_error().unwrap().message_at_token, "Expected expression");
//! ```

pub mod ast;
pub mod error;
pub mod grammar;
pub mod report;
pub mod stream;

pub use ast::{Node, NodeKind};
pub use error::{Error, ParseError};
pub use grammar::{Grammar, ParseResult, Rule};
pub use report::{parse_request, ErrorReport, Outcome, ParseOutput, ParseRequest};
pub use stream::TokenStream;

use std::any::Any;
use std::thread;

use hs_lexer::Token;

/// Stack of the thread every parse runs on. [`stream::MAX_DEPTH`] nested
/// rule frames fit inside it, unoptimized builds included, so deep input ends
/// in `Error::Internal` rather than a stack overflow.
pub const PARSE_STACK_SIZE: usize = 64 * 1024 * 1024;

/// A parsed script with every token of its source, whitespace included.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScript {
    pub node: Node,
    pub tokens: Vec<Token>,
}

/// Entry points over the shared hyperscript grammar.
pub struct Parser;

impl Parser {
    /// Parse a complete script.
    pub fn parse(source: &str) -> Result<ParsedScript, Error> {
        let mut tokens = TokenStream::tokenize(source)?;
        let node = Self::parse_tokens(&mut tokens)?;
        Ok(ParsedScript {
            node,
            tokens: tokens.all_tokens().to_vec(),
        })
    }

    /// Parse a complete script from an existing stream. Tokens left over
    /// after the last feature are an error.
    pub fn parse_tokens(tokens: &mut TokenStream<'_>) -> Result<Node, Error> {
        on_parse_stack(|| {
            let node = Grammar::global().require("hyperscript", tokens)?;
            if tokens.has_more() {
                return Err(tokens.parse_error(None));
            }
            Ok(node)
        })
    }

    /// Require a single grammar element spanning all of `source`.
    pub fn parse_element(rule: &str, source: &str) -> Result<ParsedScript, Error> {
        let grammar = Grammar::global();
        if !grammar.has_element(rule) {
            return Err(Error::Internal(format!("Unknown grammar element: {rule}")));
        }
        let mut tokens = TokenStream::tokenize(source)?;
        let node = on_parse_stack(|| {
            let node = grammar.require(rule, &mut tokens)?;
            if tokens.has_more() {
                return Err(tokens.parse_error(None));
            }
            Ok(node)
        })?;
        Ok(ParsedScript {
            node,
            tokens: tokens.all_tokens().to_vec(),
        })
    }
}

/// Run a parse on a scoped thread with [`PARSE_STACK_SIZE`] of stack,
/// whatever thread the caller is on. A panic inside `parse` comes back as
/// `Error::Internal`.
pub fn on_parse_stack<T: Send>(
    parse: impl FnOnce() -> Result<T, Error> + Send,
) -> Result<T, Error> {
    thread::scope(|scope| {
        let handle = thread::Builder::new()
            .name("hs-parse".to_string())
            .stack_size(PARSE_STACK_SIZE)
            .spawn_scoped(scope, parse)
            .map_err(|error| Error::Internal(format!("failed to start parser thread: {error}")))?;
        handle
            .join()
            .unwrap_or_else(|panic| Err(Error::Internal(panic_message(panic.as_ref()))))
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "parser panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn features(source: &str) -> Vec<&'static str> {
        let script = Parser::parse(source).unwrap();
        match script.node.kind {
            NodeKind::Hyperscript { features } => {
                features.iter().map(Node::type_name).collect()
            }
            other => panic!("Expected hyperscript, got {other:?}"),
        }
    }

    fn message(result: Result<ParsedScript, Error>) -> String {
        result.unwrap_err().as_parse_error().unwrap().message_at_token.clone()
    }

    // =========================================================================
    // Scripts
    // =========================================================================

    #[test]
    fn test_parse_features() {
        assert_eq!(
            features("on click add .clicked end\ndef greet(name) log name end\ninit log 1"),
            vec!["onFeature", "defFeature", "initFeature"]
        );
    }

    #[test]
    fn test_parse_empty_script() {
        assert_eq!(features(""), Vec::<&str>::new());
        assert_eq!(features("  -- only a comment\n"), Vec::<&str>::new());
    }

    #[test]
    fn test_parse_keeps_whitespace_tokens() {
        let script = Parser::parse("on click").unwrap();
        let texts: Vec<_> = script.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["on", " ", "click"]);
    }

    #[test]
    fn test_leftover_tokens() {
        assert_eq!(message(Parser::parse("log 1")), "Unexpected Token : log");
        assert_eq!(message(Parser::parse("on click log 1 end end")), "Unexpected Token : end");
    }

    #[test]
    fn test_missing_condition_points_at_eof() {
        let error = Parser::parse("if").unwrap_err();
        let parse_error = error.as_parse_error().unwrap();
        assert_eq!(parse_error.message_at_token, "Unexpected Token : if");

        let error = Parser::parse_element("command", "if").unwrap_err();
        let parse_error = error.as_parse_error().unwrap();
        assert_eq!(parse_error.message_at_token, "Expected expression");
        assert!(parse_error.token.is_eof());
    }

    #[test]
    fn test_lexical_errors_pass_through() {
        assert!(matches!(Parser::parse("log \"open"), Err(Error::Lex(_))));
    }

    // =========================================================================
    // Elements
    // =========================================================================

    #[test]
    fn test_parse_element() {
        let parsed = Parser::parse_element("expression", "1 + 2 + 3").unwrap();
        assert_eq!(parsed.node.type_name(), "mathOperator");

        assert!(Parser::parse_element("expression", "1 + 2 * 3").is_err());
        assert!(matches!(
            Parser::parse_element("nope", "1"),
            Err(Error::Internal(_))
        ));
    }

    // =========================================================================
    // Parse stack
    // =========================================================================

    /// Runs on a thread with the 2 MB default stack of std and tokio workers.
    fn on_small_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
        thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(f)
            .unwrap()
            .join()
            .unwrap()
    }

    #[test]
    fn test_nesting_on_a_small_stack() {
        let parsed = on_small_stack(|| {
            let source = format!("init log {}1{}", "(".repeat(30), ")".repeat(30));
            Parser::parse(&source).map(|script| script.node.type_name())
        });
        assert_eq!(parsed, Ok("hyperscript"));
    }

    #[test]
    fn test_deep_nesting_on_a_small_stack_is_internal() {
        let result = on_small_stack(|| {
            let source = format!("{}1{}", "(".repeat(2000), ")".repeat(2000));
            Parser::parse_element("expression", &source).err()
        });
        assert!(matches!(
            result,
            Some(Error::Internal(message)) if message == "maximum nesting depth exceeded"
        ));
    }

    #[test]
    fn test_panic_becomes_internal_error() {
        let result: Result<(), Error> = on_parse_stack(|| panic!("grammar bug"));
        assert!(matches!(result, Err(Error::Internal(message)) if message == "grammar bug"));
    }
}
