//! Top-level features: `on`, `def`, `set`, `init`, `behavior`, `install`
//! and `js` blocks.

use hs_lexer::{Token, TokenKind};

use super::{Grammar, ParseResult, Rule};
use crate::ast::{
    EventSpec, IntersectionSpec, MutationSpec, Node, NodeKind, QueuePolicy, SymbolScope,
};
use crate::error::Error;
use crate::stream::TokenStream;

const WORKER_PLUGIN_MESSAGE: &str = "In order to use the 'worker' feature, include the \
    _hyperscript worker plugin. See https://hyperscript.org/features/worker/ for more info.";

pub(super) fn install(grammar: &mut Grammar) {
    grammar.add_feature("on", "onFeature", Rule::Element(on_feature));
    grammar.add_feature("def", "defFeature", Rule::Element(def_feature));
    grammar.add_feature("set", "setFeature", Rule::Element(set_feature));
    grammar.add_feature("init", "initFeature", Rule::Element(init_feature));
    grammar.add_feature("worker", "workerFeature", Rule::Element(worker_feature));
    grammar.add_feature("behavior", "behaviorFeature", Rule::Element(behavior_feature));
    grammar.add_feature("install", "installFeature", Rule::Element(install_feature));
    grammar.add_feature("js", "jsFeature", Rule::Element(js_feature));
    grammar.add_element("jsBody", Rule::Element(js_body));
}

/// `(a, b)` after an event name. Only taken when the parenthesis clearly
/// holds a parameter list rather than an expression.
pub(super) fn event_args(tokens: &mut TokenStream<'_>) -> Result<Vec<Token>, Error> {
    let mut args = Vec::new();
    let is_list = tokens.peek(0).is_op("(")
        && (tokens.peek(1).is_op(")") || tokens.peek(2).is_op(",") || tokens.peek(2).is_op(")"));
    if !is_list {
        return Ok(args);
    }
    tokens.require_op_token("(")?;
    if tokens.match_op_token(")").is_some() {
        return Ok(args);
    }
    loop {
        args.push(tokens.require_token_type(&[TokenKind::Identifier])?);
        if tokens.match_op_token(",").is_none() {
            break;
        }
    }
    tokens.require_op_token(")")?;
    Ok(args)
}

/// Identifiers in parentheses: `(a, b)`, `()` or nothing at all.
fn parameter_list(tokens: &mut TokenStream<'_>) -> Result<Vec<Token>, Error> {
    let mut params = Vec::new();
    if tokens.match_op_token("(").is_none() || tokens.match_op_token(")").is_some() {
        return Ok(params);
    }
    loop {
        params.push(tokens.require_token_type(&[TokenKind::Identifier])?);
        if tokens.match_op_token(",").is_none() {
            break;
        }
    }
    tokens.require_op_token(")")?;
    Ok(params)
}

/// A dotted name as text.
fn require_path(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> Result<String, Error> {
    let path = grammar.require("dotOrColonPath", tokens)?;
    Ok(path.kind.path_name().unwrap_or_default())
}

/// A feature body: a command list closed by an implicit return.
fn terminated_body(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> Result<Box<Node>, Error> {
    let mut body = grammar.require("commandList", tokens)?;
    grammar.ensure_terminated(&mut body);
    Ok(Box::new(body))
}

/// `catch <name> <commands>`
fn catch_block(
    grammar: &Grammar,
    tokens: &mut TokenStream<'_>,
) -> Result<(Option<String>, Option<Box<Node>>), Error> {
    if tokens.match_token("catch").is_none() {
        return Ok((None, None));
    }
    let symbol = tokens.require_token_type(&[TokenKind::Identifier])?;
    let handler = terminated_body(grammar, tokens)?;
    Ok((Some(symbol.text), Some(handler)))
}

fn finally_block(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> Result<Option<Box<Node>>, Error> {
    if tokens.match_token("finally").is_none() {
        return Ok(None);
    }
    terminated_body(grammar, tokens).map(Some)
}

// =========================================================================
// on
// =========================================================================

fn on_feature(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("on").is_none() {
        return Ok(None);
    }
    let every = tokens.match_token("every").is_some();

    let mut events = Vec::new();
    let mut display_name = String::from("on ");
    loop {
        let event = event_spec(grammar, tokens)?;
        if !events.is_empty() {
            display_name.push_str(" or ");
        }
        display_name.push_str(&event.on);
        events.push(event);
        if tokens.match_token("or").is_none() {
            break;
        }
    }

    let mut queue = QueuePolicy::Last;
    if !every && tokens.match_token("queue").is_some() {
        queue = if tokens.match_token("all").is_some() {
            QueuePolicy::All
        } else if tokens.match_token("first").is_some() {
            QueuePolicy::First
        } else if tokens.match_token("none").is_some() {
            QueuePolicy::None
        } else {
            tokens.require_token("last")?;
            QueuePolicy::Last
        };
    }

    let start = terminated_body(grammar, tokens)?;
    let (error_symbol, error_handler) = catch_block(grammar, tokens)?;
    let finally_handler = finally_block(grammar, tokens)?;

    Ok(Some(Node::new(NodeKind::OnFeature {
        display_name,
        every,
        events,
        queue,
        start,
        error_symbol,
        error_handler,
        finally_handler,
    })))
}

fn event_spec(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> Result<EventSpec, Error> {
    let name = grammar.require_msg("eventName", tokens, "Expected event name")?;
    let on = name.kind.path_name().unwrap_or_default();
    let args = event_args(tokens)?;

    let mut filter = None;
    if tokens.match_op_token("[").is_some() {
        filter = Some(grammar.require("expression", tokens)?);
        tokens.require_op_token("]")?;
    }

    let (mut start_count, mut end_count, mut unbounded) = (None, None, false);
    if tokens.current_token().kind == TokenKind::Number {
        start_count = count(&tokens.consume_token());
        if tokens.match_token("to").is_some() {
            end_count = count(&tokens.consume_token());
        } else if tokens.match_token("and").is_some() {
            unbounded = true;
            tokens.require_token("on")?;
        }
    }

    let mut intersection_spec = None;
    let mut mutation_spec = None;
    match on.as_str() {
        "intersection" => intersection_spec = Some(intersection(grammar, tokens)?),
        "mutation" => mutation_spec = Some(mutation(tokens)?),
        _ => {}
    }

    let mut from = None;
    let mut elsewhere = false;
    if tokens.match_token("from").is_some() {
        if tokens.match_token("elsewhere").is_some() {
            elsewhere = true;
        } else {
            let mut guard = tokens.push_follow("or");
            from = Some(grammar.require("expression", &mut guard)?);
        }
    }
    if from.is_none() && !elsewhere && tokens.match_token("elsewhere").is_some() {
        elsewhere = true;
    }

    let mut in_expr = None;
    if tokens.match_token("in").is_some() {
        in_expr = grammar.parse("unaryExpression", tokens)?;
    }

    let (mut debounce_time, mut throttle_time) = (None, None);
    if tokens.match_token("debounced").is_some() {
        tokens.require_token("at")?;
        debounce_time = Some(grammar.require("unaryExpression", tokens)?);
    } else if tokens.match_token("throttled").is_some() {
        tokens.require_token("at")?;
        throttle_time = Some(grammar.require("unaryExpression", tokens)?);
    }

    Ok(EventSpec {
        on,
        args,
        filter,
        start_count,
        end_count,
        unbounded,
        from,
        elsewhere,
        in_expr,
        debounce_time,
        throttle_time,
        mutation_spec,
        intersection_spec,
    })
}

/// Integer part of a count like `3` in `on click 3`.
fn count(token: &Token) -> Option<u32> {
    token.text.split('.').next()?.parse().ok()
}

/// `with <expr> having margin <string> and threshold <expr>`
fn intersection(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> Result<IntersectionSpec, Error> {
    let mut spec = IntersectionSpec::default();
    if tokens.match_token("with").is_some() {
        spec.with = Some(grammar.require("expression", tokens)?);
    }
    if tokens.match_token("having").is_some() {
        loop {
            if tokens.match_token("margin").is_some() {
                spec.margin = Some(grammar.require("stringLike", tokens)?);
            } else if tokens.match_token("threshold").is_some() {
                spec.threshold = Some(grammar.require("expression", tokens)?);
            } else {
                return Err(tokens.parse_error(Some("Unknown intersection config specification")));
            }
            if tokens.match_token("and").is_none() {
                break;
            }
        }
    }
    Ok(spec)
}

/// `of childList or @title or ...`; without `of`, attributes, character
/// data and child list changes are observed.
fn mutation(tokens: &mut TokenStream<'_>) -> Result<MutationSpec, Error> {
    let mut spec = MutationSpec::default();
    if tokens.match_token("of").is_none() {
        spec.attributes = true;
        spec.character_data = true;
        spec.child_list = true;
        return Ok(spec);
    }
    loop {
        if tokens.match_token("anything").is_some() {
            spec.attributes = true;
            spec.subtree = true;
            spec.character_data = true;
            spec.child_list = true;
        } else if tokens.match_token("childList").is_some() {
            spec.child_list = true;
        } else if tokens.match_token("attributes").is_some() {
            spec.attributes = true;
            spec.attribute_old_value = true;
        } else if tokens.match_token("subtree").is_some() {
            spec.subtree = true;
        } else if tokens.match_token("characterData").is_some() {
            spec.character_data = true;
            spec.character_data_old_value = true;
        } else if tokens.current_token().kind == TokenKind::AttributeRef {
            let attribute = tokens.consume_token();
            let Some(name) = attribute.text.strip_prefix('@') else {
                return Err(tokens.parse_error(Some(
                    "Only shorthand attribute references are allowed here",
                )));
            };
            spec.attribute_filter
                .get_or_insert_with(Vec::new)
                .push(name.to_string());
        } else {
            return Err(tokens.parse_error(Some("Unknown mutation config specification")));
        }
        if tokens.match_token("or").is_none() {
            break;
        }
    }
    Ok(spec)
}

// =========================================================================
// def, set, init
// =========================================================================

fn def_feature(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("def").is_none() {
        return Ok(None);
    }
    let full_name = require_path(grammar, tokens)?;
    let mut namespace: Vec<String> = full_name.split('.').map(str::to_string).collect();
    let name = namespace.pop().unwrap_or_default();

    let args = parameter_list(tokens)?;
    let start = terminated_body(grammar, tokens)?;
    let (error_symbol, error_handler) = catch_block(grammar, tokens)?;
    let finally_handler = finally_block(grammar, tokens)?;

    let arg_names: Vec<&str> = args.iter().map(|arg| arg.text.as_str()).collect();
    let display_name = format!("{name}({})", arg_names.join(", "));

    Ok(Some(Node::new(NodeKind::DefFeature {
        display_name,
        name,
        namespace,
        args,
        start,
        error_symbol,
        error_handler,
        finally_handler,
    })))
}

/// `set :x to ...` at feature level; only element-scoped variables.
fn set_feature(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let Some(mut command) = grammar.parse("setCommand", tokens)? else {
        return Ok(None);
    };
    let element_scoped = matches!(
        &command.kind,
        NodeKind::SetCommand { target, .. }
            if matches!(target.kind, NodeKind::Symbol { scope: SymbolScope::Element, .. })
    );
    if !element_scoped {
        return Err(tokens.parse_error(Some(
            "variables declared at the feature level must be element scoped.",
        )));
    }
    grammar.ensure_terminated(&mut command);
    Ok(Some(Node::new(NodeKind::SetFeature {
        start: Box::new(command),
    })))
}

fn init_feature(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("init").is_none() {
        return Ok(None);
    }
    let immediately = tokens.match_token("immediately").is_some();
    let start = terminated_body(grammar, tokens)?;
    Ok(Some(Node::new(NodeKind::InitFeature { immediately, start })))
}

fn worker_feature(_: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("worker").is_none() {
        return Ok(None);
    }
    Err(tokens.parse_error(Some(WORKER_PLUGIN_MESSAGE)))
}

// =========================================================================
// behavior, install
// =========================================================================

fn behavior_feature(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("behavior").is_none() {
        return Ok(None);
    }
    let path = require_path(grammar, tokens)?;
    let name = path.rsplit('.').next().unwrap_or_default().to_string();
    let params = parameter_list(tokens)?
        .into_iter()
        .map(|param| param.text)
        .collect();

    let body = grammar.require("hyperscript", tokens)?;
    let features = match body.kind {
        NodeKind::Hyperscript { features } => features,
        _ => Vec::new(),
    };
    Ok(Some(Node::new(NodeKind::BehaviorFeature {
        path,
        name,
        params,
        features,
    })))
}

fn install_feature(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("install").is_none() {
        return Ok(None);
    }
    let path = require_path(grammar, tokens)?;
    let args = grammar.parse("namedArgumentList", tokens)?.map(Box::new);
    Ok(Some(Node::new(NodeKind::InstallFeature { path, args })))
}

// =========================================================================
// js
// =========================================================================

/// Raw JavaScript up to the closing `end`, and the names of the functions
/// it declares.
fn js_body(_: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let start = tokens.current_token().span.start as usize;
    let mut last: Option<Token> = None;
    let mut names = Vec::new();
    let mut name = String::new();
    let mut in_declaration = false;

    while tokens.has_more() && !is_end(tokens.current_token()) {
        let token = tokens.consume_token();
        if in_declaration {
            if matches!(token.kind, TokenKind::Identifier | TokenKind::Number) {
                name.push_str(&token.text);
            } else {
                if !name.is_empty() {
                    names.push(std::mem::take(&mut name));
                }
                in_declaration = false;
            }
        } else if token.kind == TokenKind::Identifier && token.text == "function" {
            in_declaration = true;
        }
        last = Some(token);
    }

    let js_source = last
        .and_then(|last| tokens.source().get(start..last.span.end as usize))
        .unwrap_or_default()
        .to_string();
    Ok(Some(Node::new(NodeKind::JsBody {
        js_source,
        exposed_function_names: names,
    })))
}

fn is_end(token: &Token) -> bool {
    token.kind == TokenKind::Identifier && token.text == "end"
}

fn js_feature(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("js").is_none() {
        return Ok(None);
    }
    let body = grammar.require("jsBody", tokens)?;
    let NodeKind::JsBody {
        js_source,
        exposed_function_names,
    } = body.kind
    else {
        return Err(Error::Internal("jsBody produced an unexpected node".to_string()));
    };

    let exports: Vec<String> = exposed_function_names
        .iter()
        .map(|name| format!("{name}:{name}"))
        .collect();
    let js_source = format!("{js_source}\nreturn {{ {} }} ", exports.join(","));
    Ok(Some(Node::new(NodeKind::JsFeature {
        js_source,
        exposed_function_names,
    })))
}
