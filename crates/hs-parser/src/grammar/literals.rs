//! Literal and reference leaves: strings, numbers, CSS-like references,
//! object/array/block literals and symbols.

use hs_lexer::TokenKind;

use super::{Grammar, ParseResult, Rule};
use crate::ast::{NamedArgument, Node, NodeKind, SymbolScope};
use crate::error::Error;
use crate::stream::TokenStream;

pub(super) fn install(grammar: &mut Grammar) {
    grammar.add_leaf_expression("parenthesized", Rule::Element(parenthesized));
    grammar.add_leaf_expression("string", Rule::Element(string));
    grammar.add_leaf_expression("number", Rule::Element(number));
    grammar.add_leaf_expression("idRef", Rule::Element(id_ref));
    grammar.add_leaf_expression("classRef", Rule::Element(class_ref));
    grammar.add_leaf_expression("queryRef", Rule::Element(query_ref));
    grammar.add_leaf_expression("attributeRef", Rule::Element(attribute_ref));
    grammar.add_leaf_expression("styleRef", Rule::Element(style_ref));
    grammar.add_leaf_expression("objectLiteral", Rule::Element(object_literal));
    grammar.add_leaf_expression("boolean", Rule::Element(boolean));
    grammar.add_leaf_expression("null", Rule::Element(null));
    grammar.add_leaf_expression("arrayLiteral", Rule::Element(array_literal));
    grammar.add_leaf_expression("blockLiteral", Rule::Element(block_literal));

    grammar.add_element("nakedString", Rule::Element(naked_string));
    grammar.add_element("stringLike", Rule::Element(string_like));
    grammar.add_element("objectKey", Rule::Element(object_key));
    grammar.add_element("nakedNamedArgumentList", Rule::Element(naked_named_argument_list));
    grammar.add_element("namedArgumentList", Rule::Element(named_argument_list));
    grammar.add_element("symbol", Rule::Element(symbol));
    grammar.add_element("implicitMeTarget", Rule::Element(implicit_me_target));
    grammar.add_element("dotOrColonPath", Rule::Element(dot_or_colon_path));
    grammar.add_element("eventName", Rule::Element(event_name));
}

// =========================================================================
// Strings
// =========================================================================

fn parenthesized(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_op_token("(").is_none() {
        return Ok(None);
    }
    let expr = {
        let mut inner = tokens.clear_follows();
        grammar.require("expression", &mut inner)?
    };
    tokens.require_op_token(")")?;
    Ok(Some(expr))
}

fn string(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let Some(token) = tokens.match_token_type(&[TokenKind::String]) else {
        return Ok(None);
    };
    let parts = if token.template {
        let mut inner = tokens.nested(TokenStream::tokenize_template(&token.text)?);
        grammar.parse_string_template(&mut inner)?
    } else {
        Vec::new()
    };
    Ok(Some(Node::new(NodeKind::StringLiteral { token, parts })))
}

/// Everything up to the next whitespace, e.g. a bare URL.
fn naked_string(_: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if !tokens.has_more() {
        return Ok(None);
    }
    let taken = tokens.consume_until_whitespace();
    let end = taken.last().cloned();
    let mut node = Node::new(NodeKind::NakedString { tokens: taken });
    node.end_token = end;
    Ok(Some(node))
}

fn string_like(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    grammar.parse_any_of(&["string", "nakedString"], tokens)
}

fn number(_: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let Some(number_token) = tokens.match_token_type(&[TokenKind::Number]) else {
        return Ok(None);
    };
    let value = number_token.text.parse().unwrap_or(f64::NAN);
    Ok(Some(Node::new(NodeKind::Number {
        value,
        number_token,
    })))
}

// =========================================================================
// CSS-like references
// =========================================================================

/// The expression inside `#{...}` / `.{...}`.
fn template_body(text: &str) -> &str {
    let body = text.get(2..).unwrap_or_default();
    body.strip_suffix('}').unwrap_or(body)
}

fn template_expression(grammar: &Grammar, tokens: &TokenStream<'_>, text: &str) -> Result<Node, Error> {
    let mut inner = tokens.nested(TokenStream::tokenize(template_body(text))?);
    grammar.require("expression", &mut inner)
}

fn id_ref(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let Some(token) = tokens.match_token_type(&[TokenKind::IdRef]) else {
        return Ok(None);
    };
    if token.template {
        let expr = template_expression(grammar, tokens, &token.text)?;
        return Ok(Some(Node::new(NodeKind::IdRefTemplate {
            expr: Box::new(expr),
        })));
    }
    let value = token.text.get(1..).unwrap_or_default().to_string();
    Ok(Some(Node::new(NodeKind::IdRef {
        css: token.text,
        value,
    })))
}

fn class_ref(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let Some(token) = tokens.match_token_type(&[TokenKind::ClassRef]) else {
        return Ok(None);
    };
    if token.template {
        let expr = template_expression(grammar, tokens, &token.text)?;
        return Ok(Some(Node::new(NodeKind::ClassRefTemplate {
            expr: Box::new(expr),
        })));
    }
    Ok(Some(Node::new(NodeKind::ClassRef { css: token.text })))
}

/// `<css selector/>`, with `$x` / `${expr}` interpolation.
fn query_ref(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_op_token("<").is_none() {
        return Ok(None);
    }
    let taken = tokens.consume_until(Some("/"), None);
    tokens.require_op_token("/")?;
    tokens.require_op_token(">")?;

    let css: String = taken
        .iter()
        .map(|token| match token.kind {
            TokenKind::String => format!("\"{}\"", token.text),
            _ => token.text.clone(),
        })
        .collect();

    let template = css.contains('$');
    let parts = if template {
        let mut inner = tokens.nested(TokenStream::tokenize_template(&css)?);
        grammar.parse_string_template(&mut inner)?
    } else {
        Vec::new()
    };
    Ok(Some(Node::new(NodeKind::QueryRef {
        css,
        template,
        parts,
    })))
}

fn attribute_ref(_: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let Some(token) = tokens.match_token_type(&[TokenKind::AttributeRef]) else {
        return Ok(None);
    };
    let inner = match token.text.strip_prefix('[') {
        Some(long) => long
            .get(1..)
            .map(|rest| rest.strip_suffix(']').unwrap_or(rest))
            .unwrap_or_default(),
        None => token.text.get(1..).unwrap_or_default(),
    };

    let mut split = inner.split('=');
    let name = split.next().unwrap_or_default().to_string();
    let value = split.next().filter(|value| !value.is_empty()).map(|value| {
        match value.strip_prefix('"') {
            Some(quoted) => quoted.strip_suffix('"').unwrap_or(quoted).to_string(),
            None => value.to_string(),
        }
    });
    Ok(Some(Node::new(NodeKind::AttributeRef {
        name,
        css: format!("[{inner}]"),
        value,
    })))
}

fn style_ref(_: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let Some(token) = tokens.match_token_type(&[TokenKind::StyleRef]) else {
        return Ok(None);
    };
    let name = token.text.get(1..).unwrap_or_default();
    let kind = match name.strip_prefix("computed-") {
        Some(computed) => NodeKind::ComputedStyleRef {
            name: computed.to_string(),
        },
        None => NodeKind::StyleRef {
            name: name.to_string(),
        },
    };
    Ok(Some(Node::new(kind)))
}

// =========================================================================
// Compound literals
// =========================================================================

/// A string key, a computed `[expr]` key, or a dashed bare name.
fn object_key(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if let Some(token) = tokens.match_token_type(&[TokenKind::String]) {
        return Ok(Some(Node::new(NodeKind::ObjectKey {
            key: Some(token.text),
            expr: None,
        })));
    }
    if tokens.match_op_token("[").is_some() {
        let expr = grammar.parse("expression", tokens)?;
        tokens.require_op_token("]")?;
        return Ok(Some(Node::new(NodeKind::ObjectKey {
            key: None,
            expr: expr.map(Box::new),
        })));
    }

    let mut key = String::new();
    while let Some(token) = tokens
        .match_token_type(&[TokenKind::Identifier])
        .or_else(|| tokens.match_op_token("-"))
    {
        key.push_str(&token.text);
    }
    Ok(Some(Node::new(NodeKind::ObjectKey {
        key: Some(key),
        expr: None,
    })))
}

fn object_literal(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_op_token("{").is_none() {
        return Ok(None);
    }
    let mut keys = Vec::new();
    let mut values = Vec::new();
    if tokens.match_op_token("}").is_none() {
        loop {
            keys.push(grammar.require("objectKey", tokens)?);
            tokens.require_op_token(":")?;
            values.push(grammar.require("expression", tokens)?);
            if tokens.match_op_token(",").is_none() {
                break;
            }
        }
        tokens.require_op_token("}")?;
    }
    Ok(Some(Node::new(NodeKind::ObjectLiteral { keys, values })))
}

/// `name: expr, ...` without parentheses. Matches empty.
fn naked_named_argument_list(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let mut fields = Vec::new();
    if tokens.current_token().kind == TokenKind::Identifier {
        loop {
            let name = tokens.require_token_type(&[TokenKind::Identifier])?;
            tokens.require_op_token(":")?;
            let value = grammar.require("expression", tokens)?;
            fields.push(NamedArgument { name, value });
            if tokens.match_op_token(",").is_none() {
                break;
            }
        }
    }
    Ok(Some(Node::new(NodeKind::NamedArgumentList { fields })))
}

fn named_argument_list(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_op_token("(").is_none() {
        return Ok(None);
    }
    let list = grammar.require("nakedNamedArgumentList", tokens)?;
    tokens.require_op_token(")")?;
    Ok(Some(list))
}

fn array_literal(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_op_token("[").is_none() {
        return Ok(None);
    }
    let mut values = Vec::new();
    if tokens.match_op_token("]").is_none() {
        loop {
            values.push(grammar.require("expression", tokens)?);
            if tokens.match_op_token(",").is_none() {
                break;
            }
        }
        tokens.require_op_token("]")?;
    }
    Ok(Some(Node::new(NodeKind::ArrayLiteral { values })))
}

/// `\ a, b -> expr`
fn block_literal(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_op_token("\\").is_none() {
        return Ok(None);
    }
    let mut args = Vec::new();
    if let Some(first) = tokens.match_token_type(&[TokenKind::Identifier]) {
        args.push(first);
        while tokens.match_op_token(",").is_some() {
            args.push(tokens.require_token_type(&[TokenKind::Identifier])?);
        }
    }
    tokens.require_op_token("-")?;
    tokens.require_op_token(">")?;
    let expr = grammar.require("expression", tokens)?;
    Ok(Some(Node::new(NodeKind::BlockLiteral {
        args,
        expr: Box::new(expr),
    })))
}

fn boolean(_: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let Some(token) = tokens.match_any_token(&["true", "false"]) else {
        return Ok(None);
    };
    Ok(Some(Node::new(NodeKind::Boolean {
        value: token.text == "true",
    })))
}

fn null(_: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    Ok(tokens.match_token("null").map(|_| Node::new(NodeKind::Null)))
}

// =========================================================================
// Names
// =========================================================================

fn symbol(_: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let mut scope = SymbolScope::Default;
    if tokens.match_token("global").is_some() {
        scope = SymbolScope::Global;
    } else if tokens.match_any_token(&["element", "module"]).is_some() {
        scope = SymbolScope::Element;
        if tokens.match_op_token("'").is_some() {
            tokens.require_token("s")?;
        }
    } else if tokens.match_token("local").is_some() {
        scope = SymbolScope::Local;
    }

    let element_prefix = tokens.match_op_token(":").is_some();
    let Some(identifier) = tokens.match_token_type(&[TokenKind::Identifier]) else {
        return Ok(None);
    };
    let name = if element_prefix {
        format!(":{}", identifier.text)
    } else {
        identifier.text.clone()
    };
    if scope == SymbolScope::Default {
        if name.starts_with('$') {
            scope = SymbolScope::Global;
        } else if name.starts_with(':') {
            scope = SymbolScope::Element;
        }
    }
    Ok(Some(Node::new(NodeKind::Symbol {
        token: Some(identifier),
        scope,
        name,
    })))
}

/// Always matches: the target defaults to `me`.
fn implicit_me_target(_: &Grammar, _: &mut TokenStream<'_>) -> ParseResult {
    Ok(Some(Node::new(NodeKind::ImplicitMeTarget)))
}

/// `a.b.c` or `a:b:c`
fn dot_or_colon_path(_: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let Some(root) = tokens.match_token_type(&[TokenKind::Identifier]) else {
        return Ok(None);
    };
    let mut path = vec![root.text];
    let separator = tokens.match_any_op_token(&[".", ":"]).map(|token| token.text);
    if let Some(separator) = &separator {
        loop {
            let segment = tokens.require_token_type(&[TokenKind::Identifier, TokenKind::Number])?;
            path.push(segment.text);
            if tokens.match_op_token(separator).is_none() {
                break;
            }
        }
    }
    Ok(Some(Node::new(NodeKind::DotOrColonPath { path, separator })))
}

fn event_name(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if let Some(token) = tokens.match_token_type(&[TokenKind::String]) {
        return Ok(Some(Node::new(NodeKind::EventName { name: token.text })));
    }
    grammar.parse("dotOrColonPath", tokens)
}
