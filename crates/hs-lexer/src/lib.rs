//! Hyperscript Lexer
//!
//! Converts hyperscript source into a flat sequence of tokens with byte
//! offsets, line/column positions and a semantic classification. Whitespace
//! is kept as tokens (the parser's token stream skips it); comments are
//! dropped.
//!
//! # Example
//!
//! ```
//! use hs_lexer::{Scanner, TokenKind};
//!
//! let tokens = Scanner::tokenize("add .active").unwrap();
//! assert_eq!(tokens[0].kind, TokenKind::Identifier);
//! assert_eq!(tokens[2].kind, TokenKind::ClassRef);
//! ```

pub mod scanner;
pub mod token;

pub use scanner::Scanner;
pub use token::{OpKind, Span, Token, TokenJson, TokenKind};

/// The malformed character sequences the scanner rejects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexErrorKind {
    #[error("Unterminated string")]
    UnterminatedString,
    #[error("Unterminated class reference")]
    UnterminatedClassRef,
    #[error("Unterminated id reference")]
    UnterminatedIdRef,
    #[error("Invalid hexadecimal escape")]
    InvalidHexEscape,
    #[error("Unknown token: {0}")]
    UnknownCharacter(char),
}

/// Lexer error with position information. Both `line` and `column` are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at [Line: {line}, Column: {column}]")]
pub struct LexerError {
    pub kind: LexErrorKind,
    pub line: u32,
    pub column: u32,
}
