//! Token stream.
//!
//! A cursor over the scanner's output. Whitespace tokens stay in the buffer
//! (string templates and naked strings need them) but are skipped by every
//! lookahead and consumed automatically after each match.
//!
//! Two pieces of dynamic context live here:
//! - the follow stack, a set of identifiers that `match_token` refuses while a
//!   rule is parsing a sub-expression (e.g. `to` inside `set x to y`);
//! - the possessive switch, which stops `'s` from chaining onto an expression.
//!
//! Both are changed through [`Scoped`] guards that restore the previous state
//! on drop, so the stack unwinds on every exit path including `?`.

use std::ops::{Deref, DerefMut};

use hs_lexer::{LexerError, Scanner, Span, Token, TokenKind};

use crate::error::{Error, ParseError};

/// Rule frames allowed on the stack before parsing gives up.
pub const MAX_DEPTH: usize = 512;

pub struct TokenStream<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'src str,
    last_match: Option<usize>,
    follows: Vec<String>,
    possessives_disabled: bool,
    eof: Token,
    depth: usize,
}

impl<'src> TokenStream<'src> {
    pub fn new(tokens: Vec<Token>, source: &'src str) -> Self {
        let eof = synthesize_eof(&tokens);
        let mut stream = Self {
            tokens,
            pos: 0,
            source,
            last_match: None,
            follows: Vec::new(),
            possessives_disabled: false,
            eof,
            depth: 0,
        };
        stream.consume_whitespace();
        stream
    }

    /// Tokenize `source` and wrap the result.
    pub fn tokenize(source: &'src str) -> Result<Self, LexerError> {
        Ok(Self::new(Scanner::tokenize(source)?, source))
    }

    /// Tokenize the body of a template string.
    pub fn tokenize_template(source: &'src str) -> Result<Self, LexerError> {
        Ok(Self::new(Scanner::tokenize_template(source)?, source))
    }

    /// A stream over embedded source (template bodies, braced references)
    /// that shares this stream's nesting depth.
    pub(crate) fn nested<'a>(&self, inner: TokenStream<'a>) -> TokenStream<'a> {
        TokenStream {
            depth: self.depth,
            ..inner
        }
    }

    // =========================================================================
    // Lookahead
    // =========================================================================

    /// The `n`th unconsumed token, or the synthesized EOF past the end.
    pub fn token(&self, n: usize, include_whitespace: bool) -> &Token {
        self.tokens[self.pos..]
            .iter()
            .filter(|token| include_whitespace || !token.is_whitespace())
            .nth(n)
            .unwrap_or(&self.eof)
    }

    pub fn peek(&self, n: usize) -> &Token {
        self.token(n, false)
    }

    pub fn peek_raw(&self, n: usize) -> &Token {
        self.token(n, true)
    }

    pub fn current_token(&self) -> &Token {
        self.token(0, false)
    }

    /// The raw token `n` places ahead if it is `value` of `kind`. Ignores the
    /// follow stack.
    pub fn peek_token(&self, value: &str, n: usize, kind: TokenKind) -> Option<&Token> {
        self.tokens
            .get(self.pos + n)
            .filter(|token| token.kind == kind && token.text == value)
    }

    pub fn has_more(&self) -> bool {
        self.pos < self.tokens.len()
    }

    /// The most recently consumed non-whitespace token.
    pub fn last_match(&self) -> Option<&Token> {
        self.last_match.map(|index| &self.tokens[index])
    }

    /// The text of the whitespace token consumed just before the cursor.
    pub fn last_whitespace(&self) -> &str {
        match self.pos.checked_sub(1).map(|index| &self.tokens[index]) {
            Some(token) if token.is_whitespace() => &token.text,
            _ => "",
        }
    }

    pub fn source(&self) -> &'src str {
        self.source
    }

    pub fn consumed(&self) -> &[Token] {
        &self.tokens[..self.pos]
    }

    pub fn remaining(&self) -> &[Token] {
        &self.tokens[self.pos..]
    }

    pub fn all_tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn eof(&self) -> &Token {
        &self.eof
    }

    // =========================================================================
    // Matching
    // =========================================================================

    pub fn match_op_token(&mut self, value: &str) -> Option<Token> {
        if self.current_token().is_op(value) {
            Some(self.consume_token())
        } else {
            None
        }
    }

    pub fn match_any_op_token(&mut self, values: &[&str]) -> Option<Token> {
        values.iter().find_map(|value| self.match_op_token(value))
    }

    /// Match an identifier with this exact text, unless it is on the follow
    /// stack.
    pub fn match_token(&mut self, value: &str) -> Option<Token> {
        self.match_token_of_kind(value, TokenKind::Identifier)
    }

    pub fn match_token_of_kind(&mut self, value: &str, kind: TokenKind) -> Option<Token> {
        if self.follows.iter().any(|follow| follow == value) {
            return None;
        }
        let current = self.current_token();
        if current.kind == kind && current.text == value {
            Some(self.consume_token())
        } else {
            None
        }
    }

    pub fn match_any_token(&mut self, values: &[&str]) -> Option<Token> {
        values.iter().find_map(|value| self.match_token(value))
    }

    pub fn match_token_type(&mut self, kinds: &[TokenKind]) -> Option<Token> {
        if kinds.contains(&self.current_token().kind) {
            Some(self.consume_token())
        } else {
            None
        }
    }

    pub fn require_op_token(&mut self, value: &str) -> Result<Token, Error> {
        match self.match_op_token(value) {
            Some(token) => Ok(token),
            None => Err(self.expected(value)),
        }
    }

    pub fn require_token(&mut self, value: &str) -> Result<Token, Error> {
        self.require_token_of_kind(value, TokenKind::Identifier)
    }

    pub fn require_token_of_kind(&mut self, value: &str, kind: TokenKind) -> Result<Token, Error> {
        match self.match_token_of_kind(value, kind) {
            Some(token) => Ok(token),
            None => Err(self.expected(value)),
        }
    }

    pub fn require_token_type(&mut self, kinds: &[TokenKind]) -> Result<Token, Error> {
        match self.match_token_type(kinds) {
            Some(token) => Ok(token),
            None => {
                let names: Vec<String> = kinds
                    .iter()
                    .map(|kind| format!("\"{}\"", kind.type_name()))
                    .collect();
                Err(self.parse_error(Some(&format!("Expected one of [{}]", names.join(",")))))
            }
        }
    }

    fn expected(&self, value: &str) -> Error {
        let message = format!(
            "Expected '{}' but found '{}'",
            value,
            self.current_token().text
        );
        self.parse_error(Some(&message))
    }

    // =========================================================================
    // Consuming
    // =========================================================================

    /// Consume the current token and any whitespace after it. Past the end
    /// this returns the EOF token and consumes nothing.
    pub fn consume_token(&mut self) -> Token {
        if !self.has_more() {
            return self.eof.clone();
        }
        let token = self.tokens[self.pos].clone();
        self.last_match = Some(self.pos);
        self.pos += 1;
        self.consume_whitespace();
        token
    }

    /// Consume raw tokens (whitespace included) up to the first one with the
    /// given text or kind, or the end of input. The stop token is left in
    /// place.
    pub fn consume_until(&mut self, value: Option<&str>, kind: Option<TokenKind>) -> Vec<Token> {
        let mut taken = Vec::new();
        while let Some(token) = self.tokens.get(self.pos) {
            if kind.is_some_and(|kind| token.kind == kind)
                || value.is_some_and(|value| token.text == value)
            {
                break;
            }
            taken.push(token.clone());
            self.pos += 1;
        }
        self.consume_whitespace();
        taken
    }

    pub fn consume_until_whitespace(&mut self) -> Vec<Token> {
        self.consume_until(None, Some(TokenKind::Whitespace))
    }

    fn consume_whitespace(&mut self) {
        while self.tokens.get(self.pos).is_some_and(Token::is_whitespace) {
            self.pos += 1;
        }
    }

    // =========================================================================
    // Scoped context
    // =========================================================================

    /// Forbid `value` from matching until the guard is dropped.
    pub fn push_follow(&mut self, value: &str) -> Scoped<'_, 'src> {
        self.follows.push(value.to_string());
        Scoped {
            stream: self,
            restore: Restore::PopFollow,
        }
    }

    /// Clear the follow stack until the guard is dropped (parenthesized
    /// expressions may use any keyword).
    pub fn clear_follows(&mut self) -> Scoped<'_, 'src> {
        let saved = std::mem::take(&mut self.follows);
        Scoped {
            stream: self,
            restore: Restore::Follows(saved),
        }
    }

    pub fn disable_possessives(&mut self) -> Scoped<'_, 'src> {
        let saved = std::mem::replace(&mut self.possessives_disabled, true);
        Scoped {
            stream: self,
            restore: Restore::Possessives(saved),
        }
    }

    pub fn follows(&self) -> &[String] {
        &self.follows
    }

    pub fn possessives_disabled(&self) -> bool {
        self.possessives_disabled
    }

    // =========================================================================
    // Errors and depth
    // =========================================================================

    /// A parse error at the current token.
    pub fn parse_error(&self, message: Option<&str>) -> Error {
        ParseError::new(
            message,
            self.current_token().clone(),
            self.remaining().to_vec(),
            self.source,
        )
        .into()
    }

    pub(crate) fn enter(&mut self) -> Result<(), Error> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::Internal("maximum nesting depth exceeded".to_string()));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// Zero-width EOF just past the last non-whitespace token.
fn synthesize_eof(tokens: &[Token]) -> Token {
    let span = match tokens.iter().rev().find(|token| !token.is_whitespace()) {
        Some(last) => {
            let offset = last.span.end + 1;
            let width = last.text.chars().count() as u32;
            Span::new(offset, offset, last.span.line, last.span.column + width + 1)
        }
        None => Span::new(1, 1, 1, 0),
    };
    Token::new(TokenKind::Eof, Token::EOF_TEXT, span)
}

enum Restore {
    PopFollow,
    Follows(Vec<String>),
    Possessives(bool),
}

/// Guard returned by the scoped-context methods. Dereferences to the stream.
pub struct Scoped<'a, 'src> {
    stream: &'a mut TokenStream<'src>,
    restore: Restore,
}

impl<'src> Deref for Scoped<'_, 'src> {
    type Target = TokenStream<'src>;

    fn deref(&self) -> &Self::Target {
        self.stream
    }
}

impl DerefMut for Scoped<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.stream
    }
}

impl Drop for Scoped<'_, '_> {
    fn drop(&mut self) {
        match &mut self.restore {
            Restore::PopFollow => {
                self.stream.follows.pop();
            }
            Restore::Follows(saved) => self.stream.follows = std::mem::take(saved),
            Restore::Possessives(saved) => self.stream.possessives_disabled = *saved,
        }
    }
}
