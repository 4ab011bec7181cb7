//! Core commands: control flow, events, variables and the `js` escape hatch.

use hs_lexer::TokenKind;

use super::features::event_args;
use super::{Grammar, ParseResult, Rule};
use crate::ast::{
    Node, NodeKind, PickRange, PickSelection, RepeatLoop, SymbolScope, WaitEvent,
};
use crate::error::Error;
use crate::stream::TokenStream;

pub(super) fn install(grammar: &mut Grammar) {
    grammar.add_command("js", "jsCommand", Rule::Element(js_command));
    grammar.add_command("async", "asyncCommand", Rule::Element(async_command));
    grammar.add_command("tell", "tellCommand", Rule::Element(tell_command));
    grammar.add_command("wait", "waitCommand", Rule::Element(wait_command));
    grammar.add_command("trigger", "triggerCommand", Rule::Element(trigger_command));
    grammar.add_command("send", "sendCommand", Rule::Element(send_command));
    grammar.add_command("return", "returnCommand", Rule::Element(return_command));
    grammar.add_command("exit", "exitCommand", Rule::Element(exit_command));
    grammar.add_command("halt", "haltCommand", Rule::Element(halt_command));
    grammar.add_command("log", "logCommand", Rule::Element(log_command));
    grammar.add_command("beep!", "beep!Command", Rule::Element(beep_command));
    grammar.add_command("throw", "throwCommand", Rule::Element(throw_command));
    grammar.add_command("call", "callCommand", Rule::Element(call_command));
    grammar.add_command("get", "getCommand", Rule::Element(get_command));
    grammar.add_command("make", "makeCommand", Rule::Element(make_command));
    grammar.add_command("default", "defaultCommand", Rule::Element(default_command));
    grammar.add_command("set", "setCommand", Rule::Element(set_command));
    grammar.add_command("if", "ifCommand", Rule::Element(if_command));
    grammar.add_command("repeat", "repeatCommand", Rule::Element(repeat_command));
    grammar.add_command("for", "forCommand", Rule::Element(for_command));
    grammar.add_command("continue", "continueCommand", Rule::Element(continue_command));
    grammar.add_command("break", "breakCommand", Rule::Element(break_command));
    grammar.add_command("append", "appendCommand", Rule::Element(append_command));
    grammar.add_command("pick", "pickCommand", Rule::Element(pick_command));
    grammar.add_command("increment", "incrementCommand", Rule::Element(increment_command));
    grammar.add_command("decrement", "decrementCommand", Rule::Element(decrement_command));
    grammar.add_command("fetch", "fetchCommand", Rule::Element(fetch_command));
    grammar.add_element("pseudoCommand", Rule::Element(pseudo_command));
}

/// Check that `target` can be written to and report whether it is a plain
/// variable.
pub(super) fn check_setter(
    grammar: &Grammar,
    tokens: &mut TokenStream<'_>,
    target: &Node,
) -> Result<bool, Error> {
    match target.kind {
        NodeKind::Symbol { .. } => Ok(true),
        NodeKind::AttributeRef { .. } | NodeKind::StyleRef { .. } => {
            grammar.require("implicitMeTarget", tokens)?;
            Ok(false)
        }
        _ if target.kind.root().is_none() => Err(tokens.parse_error(Some(
            "Can only put directly into symbols, not references",
        ))),
        _ => Ok(false),
    }
}

fn boxed(node: Node) -> Box<Node> {
    Box::new(node)
}

// =========================================================================
// js, async, tell
// =========================================================================

fn js_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("js").is_none() {
        return Ok(None);
    }
    let mut inputs = Vec::new();
    if tokens.match_op_token("(").is_some() && tokens.match_op_token(")").is_none() {
        loop {
            inputs.push(tokens.require_token_type(&[TokenKind::Identifier])?.text);
            if tokens.match_op_token(",").is_none() {
                break;
            }
        }
        tokens.require_op_token(")")?;
    }

    let body = grammar.require("jsBody", tokens)?;
    tokens.match_token("end");
    let js_source = match body.kind {
        NodeKind::JsBody { js_source, .. } => js_source,
        _ => String::new(),
    };
    Ok(Some(Node::new(NodeKind::JsCommand { js_source, inputs })))
}

fn async_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("async").is_none() {
        return Ok(None);
    }
    let body = if tokens.match_token("do").is_some() {
        let body = grammar.require("commandList", tokens)?;
        tokens.require_token("end")?;
        body
    } else {
        grammar.require("command", tokens)?
    };
    Ok(Some(Node::new(NodeKind::AsyncCommand { body: boxed(body) })))
}

fn tell_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("tell").is_none() {
        return Ok(None);
    }
    let value = grammar.require("expression", tokens)?;
    let body = grammar.require("commandList", tokens)?;
    if tokens.has_more() && !grammar.feature_start(tokens.current_token()) {
        tokens.require_token("end")?;
    }
    Ok(Some(Node::new(NodeKind::TellCommand {
        value: boxed(value),
        body: boxed(body),
    })))
}

// =========================================================================
// Events
// =========================================================================

/// `wait 2s`, `wait a tick`, or `wait for load or 1s from #frame`.
fn wait_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("wait").is_none() {
        return Ok(None);
    }

    if tokens.match_token("for").is_some() {
        tokens.match_token("a");
        let mut events = Vec::new();
        loop {
            let lookahead = tokens.current_token();
            if lookahead.kind == TokenKind::Number || lookahead.is_op("(") {
                let time = grammar.require("expression", tokens)?;
                events.push(WaitEvent::Timeout { time });
            } else {
                let name = grammar.require_msg("dotOrColonPath", tokens, "Expected event name")?;
                events.push(WaitEvent::Event {
                    name: name.kind.path_name().unwrap_or_default(),
                    args: event_args(tokens)?,
                });
            }
            if tokens.match_token("or").is_none() {
                break;
            }
        }
        let from = match tokens.match_token("from") {
            Some(_) => Some(boxed(grammar.require("expression", tokens)?)),
            None => None,
        };
        return Ok(Some(Node::new(NodeKind::WaitCommand {
            events,
            from,
            time: None,
            tick: false,
        })));
    }

    let (time, tick) = if tokens.match_token("a").is_some() {
        tokens.require_token("tick")?;
        (None, true)
    } else {
        (Some(boxed(grammar.require("expression", tokens)?)), false)
    };
    Ok(Some(Node::new(NodeKind::WaitCommand {
        events: Vec::new(),
        from: None,
        time,
        tick,
    })))
}

/// Event name, optional details and the target. `send` names its target
/// with `to`, `trigger` with `on`; both default to `me`.
fn event_dispatch(
    grammar: &Grammar,
    tokens: &mut TokenStream<'_>,
    target_word: &str,
) -> Result<(Box<Node>, Option<Box<Node>>, Box<Node>), Error> {
    let event_name = grammar.require("eventName", tokens)?;
    let details = grammar.parse("namedArgumentList", tokens)?.map(boxed);
    let to = if tokens.match_token(target_word).is_some() {
        grammar.require("expression", tokens)?
    } else {
        grammar.require("implicitMeTarget", tokens)?
    };
    Ok((boxed(event_name), details, boxed(to)))
}

fn trigger_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("trigger").is_none() {
        return Ok(None);
    }
    let (event_name, details, to) = event_dispatch(grammar, tokens, "on")?;
    Ok(Some(Node::new(NodeKind::TriggerCommand {
        event_name,
        details,
        to,
    })))
}

fn send_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("send").is_none() {
        return Ok(None);
    }
    let (event_name, details, to) = event_dispatch(grammar, tokens, "to")?;
    Ok(Some(Node::new(NodeKind::SendCommand {
        event_name,
        details,
        to,
    })))
}

// =========================================================================
// return, exit, halt
// =========================================================================

fn return_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("return").is_none() {
        return Ok(None);
    }
    if grammar.command_boundary(tokens.current_token()) {
        return Err(tokens.parse_error(Some(
            "'return' commands must return a value.  If you do not wish to return a value, use 'exit' instead.",
        )));
    }
    let value = grammar.require("expression", tokens)?;
    Ok(Some(Node::new(NodeKind::ReturnCommand {
        value: boxed(value),
    })))
}

fn exit_command(_: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    Ok(tokens
        .match_token("exit")
        .map(|_| Node::new(NodeKind::ExitCommand)))
}

/// `halt [the event['s]] [bubbling | default]`
fn halt_command(_: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("halt").is_none() {
        return Ok(None);
    }
    let mut keep_executing = false;
    if tokens.match_token("the").is_some() {
        tokens.require_token("event")?;
        if tokens.match_op_token("'").is_some() {
            tokens.require_token("s")?;
        }
        keep_executing = true;
    }
    let mut bubbling = false;
    let mut halt_default = false;
    if tokens.match_token("bubbling").is_some() {
        bubbling = true;
    } else if tokens.match_token("default").is_some() {
        halt_default = true;
    }
    Ok(Some(Node::new(NodeKind::HaltCommand {
        keep_executing,
        bubbling,
        halt_default,
    })))
}

// =========================================================================
// log, beep!, throw, call, get, make
// =========================================================================

/// An optional first expression followed by `, expr` repeats.
fn expression_list(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> Result<Vec<Node>, Error> {
    let mut exprs: Vec<Node> = grammar.parse("expression", tokens)?.into_iter().collect();
    while tokens.match_op_token(",").is_some() {
        exprs.push(grammar.require("expression", tokens)?);
    }
    Ok(exprs)
}

fn log_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("log").is_none() {
        return Ok(None);
    }
    let exprs = expression_list(grammar, tokens)?;
    let with_expr = match tokens.match_token("with") {
        Some(_) => Some(boxed(grammar.require("expression", tokens)?)),
        None => None,
    };
    Ok(Some(Node::new(NodeKind::LogCommand { exprs, with_expr })))
}

fn beep_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("beep!").is_none() {
        return Ok(None);
    }
    let exprs = expression_list(grammar, tokens)?;
    Ok(Some(Node::new(NodeKind::BeepCommand { exprs })))
}

fn throw_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("throw").is_none() {
        return Ok(None);
    }
    let expr = grammar.require("expression", tokens)?;
    Ok(Some(Node::new(NodeKind::ThrowCommand { expr: boxed(expr) })))
}

fn call_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("call").is_none() {
        return Ok(None);
    }
    let expr = grammar.require("expression", tokens)?;
    if expr.type_name() != "functionCall" {
        return Err(tokens.parse_error(Some("Must be a function invocation")));
    }
    Ok(Some(Node::new(NodeKind::CallCommand { expr: boxed(expr) })))
}

fn get_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("get").is_none() {
        return Ok(None);
    }
    let expr = grammar.require("expression", tokens)?;
    Ok(Some(Node::new(NodeKind::GetCommand { expr: boxed(expr) })))
}

/// `make a <expr> [from args] [called name]`. Query references take no
/// constructor arguments.
fn make_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("make").is_none() {
        return Ok(None);
    }
    tokens.match_any_token(&["a", "an"]);
    let expr = grammar.require("expression", tokens)?;

    let mut args = Vec::new();
    if expr.type_name() != "queryRef" && tokens.match_token("from").is_some() {
        loop {
            args.push(grammar.require("expression", tokens)?);
            if tokens.match_op_token(",").is_none() {
                break;
            }
        }
    }
    let target = match tokens.match_token("called") {
        Some(_) => Some(boxed(grammar.require("symbol", tokens)?)),
        None => None,
    };
    Ok(Some(Node::new(NodeKind::MakeCommand {
        expr: boxed(expr),
        args,
        target,
    })))
}

/// A bare method call used as a command: `foo.bar()` or `reset() on #form`.
fn pseudo_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let lookahead = tokens.peek(1);
    if !(lookahead.is_op(".") || lookahead.is_op("(")) {
        return Ok(None);
    }

    let expr = grammar.require("primaryExpression", tokens)?;
    let NodeKind::FunctionCall { root, .. } = &expr.kind else {
        return Err(tokens.parse_error(Some("Pseudo-commands must be function calls")));
    };

    let mut target = None;
    if root.kind.root().is_none() {
        if tokens
            .match_any_token(&["the", "to", "on", "with", "into", "from", "at"])
            .is_some()
        {
            target = Some(boxed(grammar.require("expression", tokens)?));
        } else if tokens.match_token("me").is_some() {
            target = Some(boxed(grammar.require("implicitMeTarget", tokens)?));
        }
    }
    Ok(Some(Node::new(NodeKind::PseudoCommand {
        expr: boxed(expr),
        target,
    })))
}

// =========================================================================
// default, set
// =========================================================================

fn default_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("default").is_none() {
        return Ok(None);
    }
    let target = grammar.require("assignableExpression", tokens)?;
    tokens.require_token("to")?;
    let value = grammar.require("expression", tokens)?;
    check_setter(grammar, tokens, &target)?;
    Ok(Some(Node::new(NodeKind::DefaultCommand {
        target: boxed(target),
        value: boxed(value),
    })))
}

/// `set <target> to <expr>` or `set {a: 1} on <target>`.
fn set_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("set").is_none() {
        return Ok(None);
    }

    if tokens.current_token().is_op("{") {
        let object = grammar.require("objectLiteral", tokens)?;
        tokens.require_token("on")?;
        let target = grammar.require("expression", tokens)?;
        return Ok(Some(Node::new(NodeKind::SetCommand {
            target: boxed(target),
            value: None,
            object_literal: Some(boxed(object)),
            symbol_write: false,
        })));
    }

    let target = {
        let mut guard = tokens.push_follow("to");
        grammar.require("assignableExpression", &mut guard)?
    };
    tokens.require_token("to")?;
    let value = grammar.require("expression", tokens)?;
    let symbol_write = check_setter(grammar, tokens, &target)?;
    Ok(Some(Node::new(NodeKind::SetCommand {
        target: boxed(target),
        value: Some(boxed(value)),
        object_literal: None,
        symbol_write,
    })))
}

// =========================================================================
// if, repeat, for
// =========================================================================

/// `if <expr> [then] ... [else | otherwise ...] end`. An `else if` on the
/// same line chains without its own `end`.
fn if_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("if").is_none() {
        return Ok(None);
    }
    let expr = grammar.require("expression", tokens)?;
    tokens.match_token("then");
    let true_branch = grammar.require("commandList", tokens)?;

    let mut false_branch = None;
    let mut chained = false;
    if let Some(else_token) = tokens.match_any_token(&["else", "otherwise"]) {
        chained = tokens
            .peek_token("if", 0, TokenKind::Identifier)
            .is_some_and(|token| token.span.line == else_token.span.line);
        false_branch = if chained {
            grammar.parse("command", tokens)?
        } else {
            grammar.parse("commandList", tokens)?
        };
    }
    if tokens.has_more() && !chained {
        tokens.require_token("end")?;
    }

    Ok(Some(Node::new(NodeKind::IfCommand {
        expr: boxed(expr),
        true_branch: boxed(true_branch),
        false_branch: false_branch.map(boxed),
    })))
}

fn repeat_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("repeat").is_none() {
        return Ok(None);
    }
    let repeat = repeat_loop(grammar, tokens, false)?;
    Ok(Some(Node::new(NodeKind::RepeatCommand(repeat))))
}

fn for_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("for").is_none() {
        return Ok(None);
    }
    let repeat = repeat_loop(grammar, tokens, true)?;
    Ok(Some(Node::new(NodeKind::ForCommand(repeat))))
}

/// The loop header and body shared by `repeat` and `for`:
///
/// - `for x in <expr>` / `in <expr>` iterate a collection
/// - `while <expr>` / `until <expr>` / `until event e [from <expr>]`
/// - `<expr> times`
/// - `forever`, or nothing at all
///
/// followed by an optional `index i`.
fn repeat_loop(
    grammar: &Grammar,
    tokens: &mut TokenStream<'_>,
    started_with_for: bool,
) -> Result<RepeatLoop, Error> {
    let start = tokens.current_token().span.start;
    let mut identifier = None;
    let mut expression = None;
    let mut while_expr = None;
    let mut until = false;
    let mut event = None;
    let mut on = None;
    let mut times = None;
    let mut forever = false;

    if started_with_for || tokens.match_token("for").is_some() {
        identifier = Some(tokens.require_token_type(&[TokenKind::Identifier])?.text);
        tokens.require_token("in")?;
        expression = Some(boxed(grammar.require("expression", tokens)?));
    } else if tokens.match_token("in").is_some() {
        identifier = Some("it".to_string());
        expression = Some(boxed(grammar.require("expression", tokens)?));
    } else if tokens.match_token("while").is_some() {
        while_expr = Some(boxed(grammar.require("expression", tokens)?));
    } else if tokens.match_token("until").is_some() {
        until = true;
        if tokens.match_token("event").is_some() {
            event = Some(boxed(grammar.require_msg(
                "dotOrColonPath",
                tokens,
                "Expected event name",
            )?));
            if tokens.match_token("from").is_some() {
                on = Some(boxed(grammar.require("expression", tokens)?));
            }
        } else {
            while_expr = Some(boxed(grammar.require("expression", tokens)?));
        }
    } else if !grammar.command_boundary(tokens.current_token())
        && tokens.current_token().text != "forever"
    {
        times = Some(boxed(grammar.require("expression", tokens)?));
        tokens.require_token("times")?;
    } else {
        tokens.match_token("forever");
        forever = true;
    }

    let index_identifier = match tokens.match_token("index") {
        Some(_) => Some(tokens.require_token_type(&[TokenKind::Identifier])?.text),
        None => None,
    };

    let mut body = grammar.require("commandList", tokens)?;
    if event.is_some() {
        // let the awaited event fire between iterations
        body.append(Node::new(NodeKind::WaitATick));
    }
    if tokens.has_more() {
        tokens.require_token("end")?;
    }

    let (identifier, slot) = match identifier {
        Some(identifier) => {
            let slot = format!("{identifier}_{start}");
            (identifier, slot)
        }
        None => {
            let identifier = format!("_implicit_repeat_{start}");
            (identifier.clone(), identifier)
        }
    };

    Ok(RepeatLoop {
        identifier,
        index_identifier,
        slot,
        expression,
        forever,
        times,
        until,
        event,
        on,
        while_expr,
        body: boxed(body),
    })
}

fn continue_command(_: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    Ok(tokens
        .match_token("continue")
        .map(|_| Node::new(NodeKind::ContinueCommand)))
}

fn break_command(_: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    Ok(tokens
        .match_token("break")
        .map(|_| Node::new(NodeKind::BreakCommand)))
}

// =========================================================================
// append, pick, increment, decrement
// =========================================================================

fn implicit_result() -> Node {
    Node::new(NodeKind::Symbol {
        token: None,
        scope: SymbolScope::Default,
        name: "result".to_string(),
    })
}

fn append_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("append").is_none() {
        return Ok(None);
    }
    let value = grammar.require("expression", tokens)?;
    let target = match tokens.match_token("to") {
        Some(_) => grammar.require("expression", tokens)?,
        None => implicit_result(),
    };
    if matches!(target.kind, NodeKind::Symbol { .. } | NodeKind::AttributeRef { .. })
        || target.kind.root().is_some()
    {
        check_setter(grammar, tokens, &target)?;
    }
    Ok(Some(Node::new(NodeKind::AppendCommand {
        value: boxed(value),
        target: boxed(target),
    })))
}

/// `[at | from] (start | <expr>) [(to | ..) (end | <expr>)] [inclusive | exclusive]`
fn pick_range(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> Result<PickRange, Error> {
    tokens.match_any_token(&["at", "from"]);
    let from = match tokens.match_token("start") {
        Some(_) => None,
        None => Some(boxed(grammar.require("expression", tokens)?)),
    };

    let mut to = None;
    let mut to_end = false;
    if tokens.match_token("to").is_some() || tokens.match_op_token("..").is_some() {
        if tokens.match_token("end").is_some() {
            to_end = true;
        } else {
            to = Some(boxed(grammar.require("expression", tokens)?));
        }
    }

    let (mut include_start, mut include_end) = (true, false);
    if tokens.match_token("inclusive").is_some() {
        include_end = true;
    } else if tokens.match_token("exclusive").is_some() {
        include_start = false;
    }
    Ok(PickRange {
        from,
        to,
        to_end,
        include_start,
        include_end,
    })
}

/// `| flags` after a pick pattern.
fn regex_flags(tokens: &mut TokenStream<'_>) -> Result<Option<String>, Error> {
    if tokens.match_op_token("|").is_none() {
        return Ok(None);
    }
    Ok(Some(tokens.require_token_type(&[TokenKind::Identifier])?.text))
}

fn pick_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("pick").is_none() {
        return Ok(None);
    }
    tokens.match_token("the");

    if let Some(unit) = tokens.match_any_token(&["item", "items", "character", "characters"]) {
        let range = pick_range(grammar, tokens)?;
        tokens.require_token("from")?;
        let root = grammar.require("expression", tokens)?;
        let selection = if unit.text.starts_with("item") {
            PickSelection::Items { range }
        } else {
            PickSelection::Characters { range }
        };
        return Ok(Some(Node::new(NodeKind::PickCommand {
            selection,
            root: Some(boxed(root)),
        })));
    }

    let all = if tokens.match_token("match").is_some() {
        false
    } else if tokens.match_token("matches").is_some() {
        true
    } else {
        return Ok(None);
    };
    tokens.match_token("of");
    let pattern = grammar.parse("expression", tokens)?.map(boxed);
    let flags = regex_flags(tokens)?;
    tokens.require_token("from")?;
    let root = grammar.parse("expression", tokens)?.map(boxed);

    let selection = if all {
        // global matching is always on for `matches`
        let flags = match flags {
            Some(flags) => format!("g{}", flags.replacen('g', "", 1)),
            None => "gu".to_string(),
        };
        PickSelection::Matches { pattern, flags }
    } else {
        PickSelection::Match {
            pattern,
            flags: flags.unwrap_or_default(),
        }
    };
    Ok(Some(Node::new(NodeKind::PickCommand { selection, root })))
}

/// Target and `by` amount shared by `increment` and `decrement`.
fn step(
    grammar: &Grammar,
    tokens: &mut TokenStream<'_>,
) -> Result<(Box<Node>, Option<Box<Node>>, bool), Error> {
    let target = grammar.require("assignableExpression", tokens)?;
    let amount = match tokens.match_token("by") {
        Some(_) => Some(boxed(grammar.require("expression", tokens)?)),
        None => None,
    };
    let symbol_write = check_setter(grammar, tokens, &target)?;
    Ok((boxed(target), amount, symbol_write))
}

fn increment_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("increment").is_none() {
        return Ok(None);
    }
    let (target, amount, symbol_write) = step(grammar, tokens)?;
    Ok(Some(Node::new(NodeKind::IncrementCommand {
        target,
        amount,
        symbol_write,
    })))
}

fn decrement_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("decrement").is_none() {
        return Ok(None);
    }
    let (target, amount, symbol_write) = step(grammar, tokens)?;
    Ok(Some(Node::new(NodeKind::DecrementCommand {
        target,
        amount,
        symbol_write,
    })))
}

// =========================================================================
// fetch
// =========================================================================

/// `as [a | an] (json | Object | response | html | text | <conversion>)`
fn conversion_info(
    grammar: &Grammar,
    tokens: &mut TokenStream<'_>,
) -> Result<(String, Option<String>), Error> {
    tokens.match_any_token(&["a", "an"]);
    let info = if tokens.match_any_token(&["json", "Object"]).is_some() {
        ("json".to_string(), None)
    } else if tokens.match_token("response").is_some() {
        ("response".to_string(), None)
    } else if tokens.match_token("html").is_some() {
        ("html".to_string(), None)
    } else if tokens.match_token("text").is_some() {
        ("text".to_string(), None)
    } else {
        let path = grammar.require("dotOrColonPath", tokens)?;
        ("text".to_string(), path.kind.path_name())
    };
    Ok(info)
}

fn fetch_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("fetch").is_none() {
        return Ok(None);
    }
    let url = grammar.require("stringLike", tokens)?;

    let mut conversion = None;
    if tokens.match_token("as").is_some() {
        conversion = Some(conversion_info(grammar, tokens)?);
    }

    let args = if tokens.match_token("with").is_some() && !tokens.current_token().is_op("{") {
        grammar.parse("nakedNamedArgumentList", tokens)?
    } else {
        grammar.parse("objectLiteral", tokens)?
    };

    if conversion.is_none() && tokens.match_token("as").is_some() {
        conversion = Some(conversion_info(grammar, tokens)?);
    }
    let (conversion_type, conversion) = conversion.unwrap_or_else(|| ("text".to_string(), None));

    Ok(Some(Node::new(NodeKind::FetchCommand {
        url: boxed(url),
        args: args.map(boxed),
        conversion_type,
        conversion,
    })))
}
