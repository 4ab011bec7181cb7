//! DOM commands and the `closest` expression.

use hs_lexer::TokenKind;

use super::{Grammar, ParseResult, Rule};
use crate::ast::{Node, NodeKind, ScrollOptions, TemplatePart};
use crate::error::Error;
use crate::stream::TokenStream;

const HIDE_SHOW_STRATEGIES: &[&str] = &["display", "visibility", "opacity"];

pub(super) fn install(grammar: &mut Grammar) {
    grammar.add_command("settle", "settleCommand", Rule::Element(settle_command));
    grammar.add_command("add", "addCommand", Rule::Element(add_command));
    grammar.add_element("styleLiteral", Rule::Element(style_literal));
    grammar.add_command("remove", "removeCommand", Rule::Element(remove_command));
    grammar.add_command("toggle", "toggleCommand", Rule::Element(toggle_command));
    grammar.add_command("hide", "hideCommand", Rule::Element(hide_command));
    grammar.add_command("show", "showCommand", Rule::Element(show_command));
    grammar.add_command("take", "takeCommand", Rule::Element(take_command));
    grammar.add_command("put", "putCommand", Rule::Element(put_command));
    grammar.add_command("transition", "transitionCommand", Rule::Element(transition_command));
    grammar.add_command("measure", "measureCommand", Rule::Element(measure_command));
    grammar.add_leaf_expression("closestExpr", Rule::Element(closest_expr));
    grammar.add_command("go", "goCommand", Rule::Element(go_command));
}

fn boxed(node: Node) -> Box<Node> {
    Box::new(node)
}

/// One or more class references, if the first one matches.
fn class_refs(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> Result<Vec<Node>, Error> {
    let mut refs = Vec::new();
    while let Some(class_ref) = grammar.parse("classRef", tokens)? {
        refs.push(class_ref);
    }
    Ok(refs)
}

/// `<keyword> <expr>` or the implicit `me`.
fn target_or_me(
    grammar: &Grammar,
    tokens: &mut TokenStream<'_>,
    keyword: &str,
) -> Result<Box<Node>, Error> {
    let target = match tokens.match_token(keyword) {
        Some(_) => grammar.require("expression", tokens)?,
        None => grammar.require("implicitMeTarget", tokens)?,
    };
    Ok(boxed(target))
}

fn optional_expression(
    grammar: &Grammar,
    tokens: &mut TokenStream<'_>,
    keyword: &str,
) -> Result<Option<Box<Node>>, Error> {
    match tokens.match_token(keyword) {
        Some(_) => Ok(Some(boxed(grammar.require("expression", tokens)?))),
        None => Ok(None),
    }
}

fn settle_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("settle").is_none() {
        return Ok(None);
    }
    let on = if grammar.command_boundary(tokens.current_token()) {
        grammar.require("implicitMeTarget", tokens)?
    } else {
        grammar.require("expression", tokens)?
    };
    Ok(Some(Node::new(NodeKind::SettleCommand { on: boxed(on) })))
}

// =========================================================================
// add, remove, toggle
// =========================================================================

/// `add .a .b`, `add @attr=value` or `add {color: red}`, `to <expr>` and
/// an optional `when` filter.
fn add_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("add").is_none() {
        return Ok(None);
    }
    let class_refs = class_refs(grammar, tokens)?;
    let mut attribute_ref = None;
    let mut css_declaration = None;
    if class_refs.is_empty() {
        attribute_ref = grammar.parse("attributeRef", tokens)?.map(boxed);
        if attribute_ref.is_none() {
            css_declaration = grammar.parse("styleLiteral", tokens)?.map(boxed);
            if css_declaration.is_none() {
                return Err(tokens.parse_error(Some(
                    "Expected either a class reference or attribute expression",
                )));
            }
        }
    }

    let to = target_or_me(grammar, tokens, "to")?;

    let mut when = None;
    if tokens.match_token("when").is_some() {
        if css_declaration.is_some() {
            return Err(tokens.parse_error(Some(
                "Only class and properties are supported with a when clause",
            )));
        }
        when = Some(boxed(grammar.require("expression", tokens)?));
    }

    Ok(Some(Node::new(NodeKind::AddCommand {
        class_refs,
        attribute_ref,
        css_declaration,
        to,
        when,
    })))
}

/// `{ color: red; width: ${w}px }` kept as source text with interpolations.
fn style_literal(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_op_token("{").is_none() {
        return Ok(None);
    }
    let mut parts = vec![TemplatePart::Text(String::new())];
    while tokens.has_more() {
        if tokens.match_op_token("\\").is_some() {
            let escaped = tokens.consume_token();
            push_source(&mut parts, tokens.source(), &escaped.span);
        } else if tokens.match_op_token("}").is_some() {
            break;
        } else if tokens.current_token().text == "$" {
            tokens.consume_token();
            let brace = tokens.match_op_token("{");
            let expr = grammar.require("expression", tokens)?;
            if brace.is_some() {
                tokens.require_op_token("}")?;
            }
            parts.push(TemplatePart::Expr(boxed(expr)));
            parts.push(TemplatePart::Text(String::new()));
        } else {
            let token = tokens.consume_token();
            push_source(&mut parts, tokens.source(), &token.span);
        }
        let whitespace = tokens.last_whitespace().to_string();
        if let Some(TemplatePart::Text(text)) = parts.last_mut() {
            text.push_str(&whitespace);
        }
    }
    parts.retain(|part| part.as_text() != Some(""));
    Ok(Some(Node::new(NodeKind::StyleLiteral { parts })))
}

fn push_source(parts: &mut [TemplatePart], source: &str, span: &hs_lexer::Span) {
    let text = source
        .get(span.start as usize..span.end as usize)
        .unwrap_or_default();
    if let Some(TemplatePart::Text(last)) = parts.last_mut() {
        last.push_str(text);
    }
}

fn remove_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("remove").is_none() {
        return Ok(None);
    }
    let class_refs = class_refs(grammar, tokens)?;
    let mut attribute_ref = None;
    let mut element_expr = None;
    if class_refs.is_empty() {
        attribute_ref = grammar.parse("attributeRef", tokens)?.map(boxed);
        if attribute_ref.is_none() {
            element_expr = grammar.parse("expression", tokens)?.map(boxed);
            if element_expr.is_none() {
                return Err(tokens.parse_error(Some(
                    "Expected either a class reference, attribute expression or value expression",
                )));
            }
        }
    }

    let from = if tokens.match_token("from").is_some() {
        Some(boxed(grammar.require("expression", tokens)?))
    } else if element_expr.is_none() {
        Some(boxed(grammar.require("implicitMeTarget", tokens)?))
    } else {
        None
    };

    Ok(Some(Node::new(NodeKind::RemoveCommand {
        class_refs,
        attribute_ref,
        element_expr,
        from,
    })))
}

/// A hide/show strategy name, `display` when none is given.
fn resolve_strategy(tokens: &TokenStream<'_>, name: Option<&str>) -> Result<String, Error> {
    let name = name.unwrap_or("display");
    if HIDE_SHOW_STRATEGIES.contains(&name) {
        Ok(name.to_string())
    } else {
        Err(tokens.parse_error(Some(&format!("Unknown show/hide strategy : {name}"))))
    }
}

fn toggle_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("toggle").is_none() {
        return Ok(None);
    }
    tokens.match_any_token(&["the", "my"]);

    let mut between = false;
    let mut class_ref = None;
    let mut class_ref2 = None;
    let mut class_refs = Vec::new();
    let mut attribute_ref = None;
    let mut strategy = None;
    let mut on = None;

    if tokens.current_token().kind == TokenKind::StyleRef {
        let style_ref = tokens.consume_token();
        let name = style_ref.text.strip_prefix('*').unwrap_or(&style_ref.text);
        strategy = Some(resolve_strategy(tokens, Some(name))?);
        on = Some(if tokens.match_token("of").is_some() {
            let mut guard = tokens.push_follow("with");
            boxed(grammar.require("expression", &mut guard)?)
        } else {
            boxed(grammar.require("implicitMeTarget", tokens)?)
        });
    } else if tokens.match_token("between").is_some() {
        between = true;
        class_ref = grammar.parse("classRef", tokens)?.map(boxed);
        tokens.require_token("and")?;
        class_ref2 = Some(boxed(grammar.require("classRef", tokens)?));
    } else {
        class_refs = self::class_refs(grammar, tokens)?;
        if class_refs.is_empty() {
            attribute_ref = grammar.parse("attributeRef", tokens)?.map(boxed);
            if attribute_ref.is_none() {
                return Err(tokens.parse_error(Some(
                    "Expected either a class reference or attribute expression",
                )));
            }
        }
    }

    let on = match on {
        Some(on) => on,
        None => target_or_me(grammar, tokens, "on")?,
    };

    let mut time = None;
    let mut evt = None;
    let mut from = None;
    if tokens.match_token("for").is_some() {
        time = Some(boxed(grammar.require("expression", tokens)?));
    } else if tokens.match_token("until").is_some() {
        evt = Some(boxed(grammar.require_msg(
            "dotOrColonPath",
            tokens,
            "Expected event name",
        )?));
        from = optional_expression(grammar, tokens, "from")?;
    }

    Ok(Some(Node::new(NodeKind::ToggleCommand {
        between,
        class_ref,
        class_ref2,
        class_refs,
        attribute_ref,
        strategy,
        on,
        time,
        evt,
        from,
    })))
}

// =========================================================================
// hide, show
// =========================================================================

fn show_hide_target(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> Result<Box<Node>, Error> {
    let current = tokens.current_token();
    let implicit = current.text == "when"
        || current.text == "with"
        || grammar.command_boundary(current);
    let target = if implicit {
        grammar.require("implicitMeTarget", tokens)?
    } else {
        grammar.require("expression", tokens)?
    };
    Ok(boxed(target))
}

/// `with <strategy>`, with or without the `*` of a style reference.
fn strategy_name(tokens: &mut TokenStream<'_>) -> Result<Option<String>, Error> {
    if tokens.match_token("with").is_none() {
        return Ok(None);
    }
    let token = tokens.require_token_type(&[TokenKind::Identifier, TokenKind::StyleRef])?;
    let name = token.text.strip_prefix('*').unwrap_or(&token.text);
    Ok(Some(name.to_string()))
}

fn hide_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("hide").is_none() {
        return Ok(None);
    }
    let target = show_hide_target(grammar, tokens)?;
    let name = strategy_name(tokens)?;
    let strategy = resolve_strategy(tokens, name.as_deref())?;
    Ok(Some(Node::new(NodeKind::HideCommand { target, strategy })))
}

/// `show <target> [with <strategy>][:<arg>] [when <expr>]`
fn show_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("show").is_none() {
        return Ok(None);
    }
    let target = show_hide_target(grammar, tokens)?;
    let name = strategy_name(tokens)?;

    let mut arg = None;
    if tokens.match_op_token(":").is_some() {
        let taken = tokens.consume_until_whitespace();
        arg = Some(taken.iter().map(|token| token.text.as_str()).collect::<String>());
    }

    let when = optional_expression(grammar, tokens, "when")?;
    let strategy = resolve_strategy(tokens, name.as_deref())?;
    Ok(Some(Node::new(NodeKind::ShowCommand {
        target,
        strategy,
        arg,
        when,
    })))
}

// =========================================================================
// take, put
// =========================================================================

fn take_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("take").is_none() {
        return Ok(None);
    }
    let class_refs = class_refs(grammar, tokens)?;
    let mut attribute_ref = None;
    let mut replacement = None;
    if class_refs.is_empty() {
        attribute_ref = grammar.parse("attributeRef", tokens)?.map(boxed);
        if attribute_ref.is_none() {
            return Err(tokens.parse_error(Some(
                "Expected either a class reference or attribute expression",
            )));
        }
        replacement = optional_expression(grammar, tokens, "with")?;
    }

    let from = optional_expression(grammar, tokens, "from")?;
    let for_elt = target_or_me(grammar, tokens, "for")?;
    Ok(Some(Node::new(NodeKind::TakeCommand {
        class_refs,
        attribute_ref,
        replacement,
        from,
        for_elt,
    })))
}

/// `put <expr> (into | before | after | at [the] (start | end) of) <target>`
fn put_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("put").is_none() {
        return Ok(None);
    }
    let value = grammar.require("expression", tokens)?;

    let mut operation = tokens.match_any_token(&["into", "before", "after"]);
    if operation.is_none() && tokens.match_token("at").is_some() {
        tokens.match_token("the");
        operation = tokens.match_any_token(&["start", "end"]);
        tokens.require_token("of")?;
    }
    let Some(operation) = operation else {
        return Err(tokens.parse_error(Some(
            "Expected one of 'into', 'before', 'at start of', 'at end of', 'after'",
        )));
    };
    let target = grammar.require("expression", tokens)?;

    let into = operation.text == "into";
    let symbol_write = into && matches!(target.kind, NodeKind::Symbol { .. });
    if into && matches!(target.kind, NodeKind::AttributeRef { .. } | NodeKind::StyleRef { .. }) {
        grammar.require("implicitMeTarget", tokens)?;
    }

    Ok(Some(Node::new(NodeKind::PutCommand {
        value: boxed(value),
        operation: operation.text,
        target: boxed(target),
        symbol_write,
    })))
}

// =========================================================================
// transition, measure
// =========================================================================

/// The element a `transition` or `measure` acts on: `the x`, `#id's`,
/// `its`, or `my`/`me` (the default).
fn pseudopossessive_target(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> Result<Box<Node>, Error> {
    let current = tokens.current_token();
    let explicit = matches!(current.kind, TokenKind::ClassRef | TokenKind::IdRef)
        || current.is_op("<");
    if tokens.match_any_token(&["the", "element", "elements"]).is_some() || explicit {
        let target = {
            let mut guard = tokens.disable_possessives();
            grammar.require("expression", &mut guard)?
        };
        if tokens.match_op_token("'").is_some() {
            tokens.require_token("s")?;
        }
        return Ok(boxed(target));
    }
    if let Some(its) = tokens.match_token("its") {
        let name = its.text.clone();
        return Ok(boxed(Node::new(NodeKind::PseudopossessiveIts { token: its, name })));
    }
    tokens.match_any_token(&["my", "me"]);
    Ok(boxed(grammar.require("implicitMeTarget", tokens)?))
}

/// `transition [target] *prop [from x] to y ... [over t | using s]`
fn transition_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("transition").is_none() {
        return Ok(None);
    }
    let target = pseudopossessive_target(grammar, tokens)?;

    let mut properties = Vec::new();
    let mut from = Vec::new();
    let mut to = Vec::new();
    while !grammar.command_boundary(tokens.current_token())
        && !matches!(tokens.current_token().text.as_str(), "over" | "using")
    {
        if tokens.current_token().kind == TokenKind::StyleRef {
            let style_ref = tokens.consume_token();
            let name = style_ref.text.strip_prefix('*').unwrap_or(&style_ref.text);
            properties.push(Node::new(NodeKind::StyleRefValue {
                name: name.to_string(),
            }));
        } else {
            properties.push(grammar.require("stringLike", tokens)?);
        }

        from.push(match tokens.match_token("from") {
            Some(_) => Some(grammar.require("expression", tokens)?),
            None => None,
        });
        tokens.require_token("to")?;
        to.push(match tokens.match_token("initial") {
            Some(_) => Node::new(NodeKind::InitialLiteral),
            None => grammar.require("expression", tokens)?,
        });
    }

    let mut over = None;
    let mut using = None;
    if tokens.match_token("over").is_some() {
        over = Some(boxed(grammar.require("expression", tokens)?));
    } else if tokens.match_token("using").is_some() {
        using = Some(boxed(grammar.require("expression", tokens)?));
    }

    Ok(Some(Node::new(NodeKind::TransitionCommand {
        target,
        properties,
        from,
        to,
        using,
        over,
    })))
}

fn measure_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("measure").is_none() {
        return Ok(None);
    }
    let target = pseudopossessive_target(grammar, tokens)?;

    let mut properties = Vec::new();
    if !grammar.command_boundary(tokens.current_token()) {
        loop {
            properties.push(tokens.require_token_type(&[TokenKind::Identifier])?.text);
            if tokens.match_op_token(",").is_none() {
                break;
            }
        }
    }
    Ok(Some(Node::new(NodeKind::MeasureCommand { target, properties })))
}

// =========================================================================
// closest
// =========================================================================

/// `closest [parent] <css expr | @attr> [to <expr>]`. An attribute form
/// reads that attribute from the matched ancestor.
fn closest_expr(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("closest").is_none() {
        return Ok(None);
    }
    let parent_search = tokens.match_token("parent").is_some();

    let mut attribute = None;
    let mut expr = None;
    let css = if tokens.current_token().kind == TokenKind::AttributeRef {
        let attribute_ref = grammar.require("attributeRef", tokens)?;
        let css = match &attribute_ref.kind {
            NodeKind::AttributeRef { name, .. } => format!("[{name}]"),
            _ => String::new(),
        };
        attribute = Some(attribute_ref);
        css
    } else {
        let css_expr = grammar.require("expression", tokens)?;
        let Some(css) = css_expr.kind.css().map(str::to_string) else {
            return Err(tokens.parse_error(Some("Expected a CSS expression")));
        };
        expr = Some(boxed(css_expr));
        css
    };

    let to = if tokens.match_token("to").is_some() {
        grammar.parse("expression", tokens)?
    } else {
        grammar.parse("implicitMeTarget", tokens)?
    };

    let closest = Node::new(NodeKind::ClosestExpr {
        parent_search,
        expr,
        css,
        to: to.map(boxed),
    });
    Ok(Some(match attribute {
        Some(attribute) => Node::new(NodeKind::AttributeRefAccess {
            root: boxed(closest),
            attribute: boxed(attribute),
        }),
        None => closest,
    }))
}

// =========================================================================
// go
// =========================================================================

/// `go back`, `go to url <url> [in new window]`, or scroll to an element:
/// `go to the top of #x +10px smoothly`.
fn go_command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("go").is_none() {
        return Ok(None);
    }
    if tokens.match_token("back").is_some() {
        return Ok(Some(Node::new(NodeKind::GoCommand {
            back: true,
            target: None,
            url: false,
            new_window: false,
            offset: None,
            scroll: None,
        })));
    }

    tokens.match_token("to");
    if tokens.match_token("url").is_some() {
        let target = grammar.require("stringLike", tokens)?;
        let mut new_window = false;
        if tokens.match_token("in").is_some() {
            tokens.require_token("new")?;
            tokens.require_token("window")?;
            new_window = true;
        }
        return Ok(Some(Node::new(NodeKind::GoCommand {
            back: false,
            target: Some(boxed(target)),
            url: true,
            new_window,
            offset: None,
            scroll: None,
        })));
    }

    tokens.match_token("the");
    let vertical = tokens.match_any_token(&["top", "middle", "bottom"]);
    let horizontal = tokens.match_any_token(&["left", "center", "right"]);
    if vertical.is_some() || horizontal.is_some() {
        tokens.require_token("of")?;
    }
    let target = grammar.require("unaryExpression", tokens)?;

    let mut offset = None;
    if tokens.match_any_op_token(&["+", "-"]).is_some() {
        let mut guard = tokens.push_follow("px");
        offset = Some(boxed(grammar.require("expression", &mut guard)?));
    }
    tokens.match_token("px");
    let smoothness = tokens.match_any_token(&["smoothly", "instantly"]);

    let block = match vertical.as_ref().map(|token| token.text.as_str()) {
        Some("bottom") => "end",
        Some("middle") => "center",
        _ => "start",
    };
    let inline = match horizontal.as_ref().map(|token| token.text.as_str()) {
        Some("left") => "start",
        Some("center") => "center",
        Some("right") => "end",
        _ => "nearest",
    };
    let behavior = smoothness.map(|token| match token.text.as_str() {
        "smoothly" => "smooth".to_string(),
        _ => "instant".to_string(),
    });

    Ok(Some(Node::new(NodeKind::GoCommand {
        back: false,
        target: Some(boxed(target)),
        url: false,
        new_window: false,
        offset,
        scroll: Some(ScrollOptions {
            block: block.to_string(),
            inline: inline.to_string(),
            behavior,
        }),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(rule: &str, source: &str) -> Node {
        let mut tokens = TokenStream::tokenize(source).unwrap();
        Grammar::global().require(rule, &mut tokens).unwrap()
    }

    fn command(source: &str) -> Node {
        parse("command", source)
    }

    fn error(source: &str) -> String {
        let mut tokens = TokenStream::tokenize(source).unwrap();
        let error = Grammar::global().require("command", &mut tokens).unwrap_err();
        error.as_parse_error().unwrap().message_at_token.clone()
    }

    // =========================================================================
    // add, remove, toggle
    // =========================================================================

    #[test]
    fn test_add_class_refs() {
        match command("add .a .b to #box when it matches .c").kind {
            NodeKind::AddCommand {
                class_refs,
                to,
                when,
                ..
            } => {
                assert_eq!(class_refs.len(), 2);
                assert_eq!(to.type_name(), "idRef");
                assert!(when.is_some());
            }
            other => panic!("Expected add, got {other:?}"),
        }
    }

    #[test]
    fn test_add_attribute_and_style() {
        match command("add @disabled").kind {
            NodeKind::AddCommand {
                attribute_ref, to, ..
            } => {
                assert!(attribute_ref.is_some());
                assert_eq!(to.type_name(), "implicitMeTarget");
            }
            other => panic!("Expected add, got {other:?}"),
        }
        match command("add {color: red; width: ${w}px}").kind {
            NodeKind::AddCommand {
                css_declaration, ..
            } => match css_declaration.unwrap().kind {
                NodeKind::StyleLiteral { parts } => {
                    assert_eq!(parts.len(), 3);
                    assert_eq!(parts[0].as_text(), Some("color: red; width: "));
                    assert!(matches!(&parts[1], TemplatePart::Expr(_)));
                    assert_eq!(parts[2].as_text(), Some("px"));
                }
                other => panic!("Expected style literal, got {other:?}"),
            },
            other => panic!("Expected add, got {other:?}"),
        }
    }

    #[test]
    fn test_add_errors() {
        assert_eq!(
            error("add 42"),
            "Expected either a class reference or attribute expression"
        );
        assert_eq!(
            error("add {color: red} when x"),
            "Only class and properties are supported with a when clause"
        );
    }

    #[test]
    fn test_remove_forms() {
        match command("remove .a from #list").kind {
            NodeKind::RemoveCommand {
                class_refs, from, ..
            } => {
                assert_eq!(class_refs.len(), 1);
                assert_eq!(from.unwrap().type_name(), "idRef");
            }
            other => panic!("Expected remove, got {other:?}"),
        }
        match command("remove me").kind {
            NodeKind::RemoveCommand {
                element_expr, from, ..
            } => {
                assert_eq!(element_expr.unwrap().type_name(), "symbol");
                assert!(from.is_none());
            }
            other => panic!("Expected remove, got {other:?}"),
        }
        match command("remove @hidden").kind {
            NodeKind::RemoveCommand {
                attribute_ref, from, ..
            } => {
                assert!(attribute_ref.is_some());
                assert_eq!(from.unwrap().type_name(), "implicitMeTarget");
            }
            other => panic!("Expected remove, got {other:?}"),
        }
    }

    #[test]
    fn test_toggle_forms() {
        match command("toggle .on for 2s").kind {
            NodeKind::ToggleCommand {
                class_refs, time, on, ..
            } => {
                assert_eq!(class_refs.len(), 1);
                assert!(time.is_some());
                assert_eq!(on.type_name(), "implicitMeTarget");
            }
            other => panic!("Expected toggle, got {other:?}"),
        }
        match command("toggle between .a and .b on #x").kind {
            NodeKind::ToggleCommand {
                between,
                class_ref,
                class_ref2,
                on,
                ..
            } => {
                assert!(between);
                assert!(class_ref.is_some() && class_ref2.is_some());
                assert_eq!(on.type_name(), "idRef");
            }
            other => panic!("Expected toggle, got {other:?}"),
        }
        match command("toggle my *opacity until done from #x").kind {
            NodeKind::ToggleCommand {
                strategy, evt, from, ..
            } => {
                assert_eq!(strategy.as_deref(), Some("opacity"));
                assert!(evt.is_some());
                assert!(from.is_some());
            }
            other => panic!("Expected toggle, got {other:?}"),
        }
        assert_eq!(error("toggle *color"), "Unknown show/hide strategy : color");
    }

    // =========================================================================
    // hide, show
    // =========================================================================

    #[test]
    fn test_hide_and_show() {
        match command("hide").kind {
            NodeKind::HideCommand { target, strategy } => {
                assert_eq!(target.type_name(), "implicitMeTarget");
                assert_eq!(strategy, "display");
            }
            other => panic!("Expected hide, got {other:?}"),
        }
        match command("hide #x with *visibility").kind {
            NodeKind::HideCommand { strategy, .. } => assert_eq!(strategy, "visibility"),
            other => panic!("Expected hide, got {other:?}"),
        }
        match command("show #x with display:inline-block when ready").kind {
            NodeKind::ShowCommand {
                strategy,
                arg,
                when,
                ..
            } => {
                assert_eq!(strategy, "display");
                assert_eq!(arg.as_deref(), Some("inline-block"));
                assert!(when.is_some());
            }
            other => panic!("Expected show, got {other:?}"),
        }
        assert_eq!(error("hide me with fade"), "Unknown show/hide strategy : fade");
    }

    // =========================================================================
    // take, put
    // =========================================================================

    #[test]
    fn test_take_forms() {
        match command("take .active from .tabs for #tab2").kind {
            NodeKind::TakeCommand {
                class_refs,
                from,
                for_elt,
                ..
            } => {
                assert_eq!(class_refs.len(), 1);
                assert!(from.is_some());
                assert_eq!(for_elt.type_name(), "idRef");
            }
            other => panic!("Expected take, got {other:?}"),
        }
        match command("take @aria-selected with 'true'").kind {
            NodeKind::TakeCommand {
                replacement,
                for_elt,
                ..
            } => {
                assert!(replacement.is_some());
                assert_eq!(for_elt.type_name(), "implicitMeTarget");
            }
            other => panic!("Expected take, got {other:?}"),
        }
    }

    #[test]
    fn test_put_operations() {
        match command("put 'hi' into x").kind {
            NodeKind::PutCommand {
                operation,
                symbol_write,
                ..
            } => {
                assert_eq!(operation, "into");
                assert!(symbol_write);
            }
            other => panic!("Expected put, got {other:?}"),
        }
        match command("put 'hi' at the end of #log").kind {
            NodeKind::PutCommand {
                operation,
                symbol_write,
                ..
            } => {
                assert_eq!(operation, "end");
                assert!(!symbol_write);
            }
            other => panic!("Expected put, got {other:?}"),
        }
        assert_eq!(
            error("put 1 onto x"),
            "Expected one of 'into', 'before', 'at start of', 'at end of', 'after'"
        );
    }

    // =========================================================================
    // transition, measure
    // =========================================================================

    #[test]
    fn test_transition() {
        match command("transition #box's *width from 0px to 100px *opacity to initial over 1s")
            .kind
        {
            NodeKind::TransitionCommand {
                target,
                properties,
                from,
                to,
                over,
                ..
            } => {
                assert_eq!(target.type_name(), "idRef");
                let names: Vec<_> = properties.iter().map(Node::type_name).collect();
                assert_eq!(names, vec!["styleRefValue", "styleRefValue"]);
                assert!(from[0].is_some());
                assert!(from[1].is_none());
                assert_eq!(to[1].type_name(), "initial_literal");
                assert!(over.is_some());
            }
            other => panic!("Expected transition, got {other:?}"),
        }
        match command("transition its opacity to 0").kind {
            NodeKind::TransitionCommand {
                target, properties, ..
            } => {
                assert_eq!(target.type_name(), "pseudopossessiveIts");
                assert_eq!(properties[0].type_name(), "nakedString");
            }
            other => panic!("Expected transition, got {other:?}"),
        }
    }

    #[test]
    fn test_measure() {
        match command("measure my top, height").kind {
            NodeKind::MeasureCommand { target, properties } => {
                assert_eq!(target.type_name(), "implicitMeTarget");
                assert_eq!(properties, vec!["top", "height"]);
            }
            other => panic!("Expected measure, got {other:?}"),
        }
    }

    // =========================================================================
    // closest, go, settle
    // =========================================================================

    #[test]
    fn test_closest_expression() {
        match parse("expression", "closest parent <form/>").kind {
            NodeKind::ClosestExpr {
                parent_search,
                css,
                to,
                ..
            } => {
                assert!(parent_search);
                assert_eq!(css, "form");
                assert_eq!(to.unwrap().type_name(), "implicitMeTarget");
            }
            other => panic!("Expected closest, got {other:?}"),
        }
        match parse("expression", "closest @data-id").kind {
            NodeKind::AttributeRefAccess { root, .. } => match root.kind {
                NodeKind::ClosestExpr { css, .. } => assert_eq!(css, "[data-id]"),
                other => panic!("Expected closest, got {other:?}"),
            },
            other => panic!("Expected attribute access, got {other:?}"),
        }
        let mut tokens = TokenStream::tokenize("closest x").unwrap();
        let error = Grammar::global().require("expression", &mut tokens).unwrap_err();
        assert_eq!(
            error.as_parse_error().unwrap().message_at_token,
            "Expected a CSS expression"
        );
    }

    #[test]
    fn test_go_forms() {
        match command("go back").kind {
            NodeKind::GoCommand { back, target, .. } => {
                assert!(back);
                assert!(target.is_none());
            }
            other => panic!("Expected go, got {other:?}"),
        }
        match command("go to url /home in new window").kind {
            NodeKind::GoCommand {
                url, new_window, ..
            } => {
                assert!(url);
                assert!(new_window);
            }
            other => panic!("Expected go, got {other:?}"),
        }
        match command("go to the bottom right of #footer -10px smoothly").kind {
            NodeKind::GoCommand { offset, scroll, .. } => {
                assert!(offset.is_some());
                assert_eq!(
                    scroll,
                    Some(ScrollOptions {
                        block: "end".to_string(),
                        inline: "end".to_string(),
                        behavior: Some("smooth".to_string()),
                    })
                );
            }
            other => panic!("Expected go, got {other:?}"),
        }
    }

    #[test]
    fn test_settle() {
        match command("settle").kind {
            NodeKind::SettleCommand { on } => assert_eq!(on.type_name(), "implicitMeTarget"),
            other => panic!("Expected settle, got {other:?}"),
        }
        match command("settle #x").kind {
            NodeKind::SettleCommand { on } => assert_eq!(on.type_name(), "idRef"),
            other => panic!("Expected settle, got {other:?}"),
        }
    }
}
