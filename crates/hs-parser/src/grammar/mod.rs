//! Grammar registry and parsing engine.
//!
//! Every construct of the language is a named rule. Rules are plain
//! functions over the token stream that return `Ok(None)` when they do not
//! apply at the cursor, so alternation is just trying rules in order.
//!
//! The registry also keeps:
//! - the command and feature keyword tables used for dispatch;
//! - the ordered leaf expressions, tried before a bare symbol;
//! - the ordered indirect expressions, tried repeatedly against an already
//!   parsed expression to build property access, calls, `of`, `'s` and the
//!   rest without left recursion.
//!
//! The full hyperscript grammar is built once by [`Grammar::global`] and is
//! read-only from then on.

use std::collections::HashMap;
use std::sync::LazyLock;

use hs_lexer::{Token, TokenKind};

use crate::ast::{Node, NodeKind, TemplatePart};
use crate::error::Error;
use crate::stream::TokenStream;

mod commands;
mod core;
mod expressions;
mod features;
mod literals;
mod web;

pub type ParseResult = Result<Option<Node>, Error>;

/// A grammar rule.
#[derive(Clone, Copy)]
pub enum Rule {
    /// Parses from the cursor.
    Element(fn(&Grammar, &mut TokenStream<'_>) -> ParseResult),
    /// Extends an already parsed node. The rule takes the root out of the
    /// slot only once it has matched.
    Indirect(fn(&Grammar, &mut TokenStream<'_>, &mut Option<Node>) -> ParseResult),
}

static HYPERSCRIPT: LazyLock<Grammar> = LazyLock::new(Grammar::hyperscript);

#[derive(Default)]
pub struct Grammar {
    elements: HashMap<&'static str, Rule>,
    commands: HashMap<&'static str, &'static str>,
    features: HashMap<&'static str, &'static str>,
    leaf_expressions: Vec<&'static str>,
    indirect_expressions: Vec<&'static str>,
}

impl Grammar {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The complete hyperscript grammar, core and web rules.
    pub fn hyperscript() -> Self {
        let mut grammar = Self::new();
        core::install(&mut grammar);
        literals::install(&mut grammar);
        expressions::install(&mut grammar);
        features::install(&mut grammar);
        commands::install(&mut grammar);
        web::install(&mut grammar);
        grammar
    }

    /// The shared hyperscript grammar.
    pub fn global() -> &'static Grammar {
        &HYPERSCRIPT
    }

    // =========================================================================
    // Registration
    // =========================================================================

    pub fn add_element(&mut self, name: &'static str, rule: Rule) {
        self.elements.insert(name, rule);
    }

    /// Register `rule` as element `name` and dispatch `keyword` to it.
    pub fn add_command(&mut self, keyword: &'static str, name: &'static str, rule: Rule) {
        self.add_element(name, rule);
        self.commands.insert(keyword, name);
    }

    pub fn add_feature(&mut self, keyword: &'static str, name: &'static str, rule: Rule) {
        self.add_element(name, rule);
        self.features.insert(keyword, name);
    }

    pub fn add_leaf_expression(&mut self, name: &'static str, rule: Rule) {
        self.add_element(name, rule);
        self.leaf_expressions.push(name);
    }

    pub fn add_indirect_expression(&mut self, name: &'static str, rule: Rule) {
        self.add_element(name, rule);
        self.indirect_expressions.push(name);
    }

    pub fn leaf_expressions(&self) -> &[&'static str] {
        &self.leaf_expressions
    }

    pub fn indirect_expressions(&self) -> &[&'static str] {
        &self.indirect_expressions
    }

    pub fn has_element(&self, name: &str) -> bool {
        self.elements.contains_key(name)
    }

    // =========================================================================
    // Engine
    // =========================================================================

    pub fn parse(&self, name: &str, tokens: &mut TokenStream<'_>) -> ParseResult {
        self.parse_with(name, tokens, &mut None)
    }

    /// Run rule `name`, offering it `root` if it is an indirect rule.
    ///
    /// A matched node gets the token at the cursor as its start token and,
    /// unless the rule set one, the last consumed token as its end token.
    /// The roots of an indirect chain share the chain's start token.
    pub fn parse_with(
        &self,
        name: &str,
        tokens: &mut TokenStream<'_>,
        root: &mut Option<Node>,
    ) -> ParseResult {
        let rule = *self
            .elements
            .get(name)
            .ok_or_else(|| Error::Internal(format!("Unknown grammar element: {name}")))?;

        let start = tokens.current_token().clone();
        tokens.enter()?;
        let result = match rule {
            Rule::Element(parse) => parse(self, tokens),
            Rule::Indirect(parse) => parse(self, tokens, root),
        };
        tokens.leave();

        Ok(result?.map(|mut node| {
            if node.end_token.is_none() {
                node.end_token = tokens.last_match().cloned();
            }
            let mut root = node.kind.root_mut();
            while let Some(inner) = root {
                inner.start_token = Some(start.clone());
                root = inner.kind.root_mut();
            }
            node.start_token = Some(start);
            node
        }))
    }

    pub fn require(&self, name: &str, tokens: &mut TokenStream<'_>) -> Result<Node, Error> {
        match self.parse(name, tokens)? {
            Some(node) => Ok(node),
            None => Err(tokens.parse_error(Some(&format!("Expected {name}")))),
        }
    }

    pub fn require_msg(
        &self,
        name: &str,
        tokens: &mut TokenStream<'_>,
        message: &str,
    ) -> Result<Node, Error> {
        match self.parse(name, tokens)? {
            Some(node) => Ok(node),
            None => Err(tokens.parse_error(Some(message))),
        }
    }

    /// The first of `names` that matches.
    pub fn parse_any_of(&self, names: &[&str], tokens: &mut TokenStream<'_>) -> ParseResult {
        for name in names {
            if let Some(node) = self.parse(name, tokens)? {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    // =========================================================================
    // Shared helpers for rules
    // =========================================================================

    /// The command element a keyword dispatches to.
    pub fn command_for(&self, keyword: &str) -> Option<&'static str> {
        self.commands.get(keyword).copied()
    }

    pub fn feature_for(&self, keyword: &str) -> Option<&'static str> {
        self.features.get(keyword).copied()
    }

    pub fn command_start(&self, token: &Token) -> bool {
        self.commands.contains_key(token.text.as_str())
    }

    pub fn feature_start(&self, token: &Token) -> bool {
        self.features.contains_key(token.text.as_str())
    }

    /// Tokens that end the current command.
    pub fn command_boundary(&self, token: &Token) -> bool {
        matches!(token.text.as_str(), "end" | "then" | "else" | "otherwise" | ")")
            || self.command_start(token)
            || self.feature_start(token)
            || token.kind == TokenKind::Eof
    }

    /// Terminate a feature body with an implicit return.
    pub fn ensure_terminated(&self, list: &mut Node) {
        list.append(Node::new(NodeKind::ImplicitReturn));
    }

    /// Split a lexed template body into text and `$x` / `${expr}`
    /// interpolations. Whitespace between tokens is kept; a backslash makes
    /// the following token literal text.
    pub fn parse_string_template(
        &self,
        tokens: &mut TokenStream<'_>,
    ) -> Result<Vec<TemplatePart>, Error> {
        let mut parts = Vec::new();
        while tokens.has_more() {
            push_text(&mut parts, tokens.last_whitespace());
            if tokens.current_token().text == "$" {
                tokens.consume_token();
                let brace = tokens.match_op_token("{");
                let expr = self.require("expression", tokens)?;
                if brace.is_some() {
                    tokens.require_op_token("}")?;
                }
                parts.push(TemplatePart::Expr(Box::new(expr)));
            } else if tokens.current_token().is_op("\\") {
                tokens.consume_token();
                let escaped = tokens.consume_token();
                push_text(&mut parts, &escaped.text);
            } else {
                let token = tokens.consume_token();
                push_text(&mut parts, &token.text);
            }
        }
        push_text(&mut parts, tokens.last_whitespace());
        Ok(parts)
    }
}

fn push_text(parts: &mut Vec<TemplatePart>, text: &str) {
    if text.is_empty() {
        return;
    }
    match parts.last_mut() {
        Some(TemplatePart::Text(last)) => last.push_str(text),
        _ => parts.push(TemplatePart::Text(text.to_string())),
    }
}

/// Take the root offered to an indirect rule that has matched.
pub(crate) fn take_root(root: &mut Option<Node>) -> Result<Node, Error> {
    root.take()
        .ok_or_else(|| Error::Internal("indirect expression has no root".to_string()))
}
