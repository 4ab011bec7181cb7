//! Expression grammar.
//!
//! Loosest binding first: `async`, logical chains, a single comparison, math
//! chains, unary prefixes and postfix units. Math and logical chains only
//! accept one operator each; mixing operators needs parentheses.

use hs_lexer::{Token, TokenKind};

use super::{take_root, Grammar, ParseResult, Rule};
use crate::ast::{Node, NodeKind};
use crate::error::Error;
use crate::stream::TokenStream;

/// CSS length units accepted as a number suffix (`in` clashes with the
/// grammar and is left out).
const STRING_POSTFIXES: &[&str] = &[
    "em", "ex", "cap", "ch", "ic", "rem", "lh", "rlh", "vw", "vh", "vi", "vb", "vmin", "vmax",
    "cm", "mm", "Q", "pc", "pt", "px",
];

pub(super) fn install(grammar: &mut Grammar) {
    grammar.add_indirect_expression("propertyAccess", Rule::Indirect(property_access));
    grammar.add_indirect_expression("of", Rule::Indirect(of));
    grammar.add_indirect_expression("possessive", Rule::Indirect(possessive));
    grammar.add_indirect_expression("inExpression", Rule::Indirect(in_expression));
    grammar.add_indirect_expression("asExpression", Rule::Indirect(as_expression));
    grammar.add_indirect_expression("functionCall", Rule::Indirect(function_call));
    grammar.add_indirect_expression("attributeRefAccess", Rule::Indirect(attribute_ref_access));
    grammar.add_indirect_expression("arrayIndex", Rule::Indirect(array_index));

    grammar.add_leaf_expression("some", Rule::Element(some));

    grammar.add_element("postfixExpression", Rule::Element(postfix_expression));
    grammar.add_element("logicalNot", Rule::Element(logical_not));
    grammar.add_element("noExpression", Rule::Element(no_expression));
    grammar.add_element("negativeNumber", Rule::Element(negative_number));
    grammar.add_element("unaryExpression", Rule::Element(unary_expression));
    grammar.add_element("beepExpression", Rule::Element(beep_expression));
    grammar.add_element(
        "relativePositionalExpression",
        Rule::Element(relative_positional_expression),
    );
    grammar.add_element("positionalExpression", Rule::Element(positional_expression));
    grammar.add_element("mathOperator", Rule::Element(math_operator));
    grammar.add_element("mathExpression", Rule::Element(math_expression));
    grammar.add_element("comparisonOperator", Rule::Element(comparison_operator));
    grammar.add_element("comparisonExpression", Rule::Element(comparison_expression));
    grammar.add_element("logicalOperator", Rule::Element(logical_operator));
    grammar.add_element("logicalExpression", Rule::Element(logical_expression));
    grammar.add_element("asyncExpression", Rule::Element(async_expression));
    grammar.add_element("expression", Rule::Element(expression));
    grammar.add_element("assignableExpression", Rule::Element(assignable_expression));
}

/// Continue the indirect chain from a freshly built node.
fn chain(grammar: &Grammar, tokens: &mut TokenStream<'_>, kind: NodeKind) -> ParseResult {
    grammar.parse_with("indirectExpression", tokens, &mut Some(Node::new(kind)))
}

// =========================================================================
// Indirect expressions
// =========================================================================

fn property_access(
    grammar: &Grammar,
    tokens: &mut TokenStream<'_>,
    root: &mut Option<Node>,
) -> ParseResult {
    if tokens.match_op_token(".").is_none() {
        return Ok(None);
    }
    let prop = tokens.require_token_type(&[TokenKind::Identifier])?;
    let root = take_root(root)?;
    chain(
        grammar,
        tokens,
        NodeKind::PropertyAccess {
            root: Box::new(root),
            prop,
        },
    )
}

/// `x of y`, `x.z of y`: the innermost root of the chain becomes the looked
/// up property and `y` takes its place.
fn of(grammar: &Grammar, tokens: &mut TokenStream<'_>, root: &mut Option<Node>) -> ParseResult {
    if tokens.match_token("of").is_none() {
        return Ok(None);
    }
    let new_root = grammar.require("unaryExpression", tokens)?;
    let mut root = take_root(root)?;

    let rewritten = match innermost_root(&mut root) {
        Some(slot) => {
            let property = std::mem::replace(&mut **slot, Node::new(NodeKind::Null));
            **slot = of_expression(tokens, property, new_root)?;
            root
        }
        None => of_expression(tokens, root, new_root)?,
    };
    grammar.parse_with("indirectExpression", tokens, &mut Some(rewritten))
}

fn innermost_root(node: &mut Node) -> Option<&mut Box<Node>> {
    let child = node.kind.root_mut()?;
    if child.kind.root().is_some() {
        innermost_root(child)
    } else {
        Some(child)
    }
}

fn of_expression(tokens: &TokenStream<'_>, property: Node, root: Node) -> Result<Node, Error> {
    match property.kind {
        NodeKind::Symbol { .. }
        | NodeKind::AttributeRef { .. }
        | NodeKind::StyleRef { .. }
        | NodeKind::ComputedStyleRef { .. } => Ok(Node::new(NodeKind::OfExpression {
            property: Box::new(property),
            root: Box::new(root),
        })),
        _ => Err(tokens.parse_error(Some(&format!(
            "Cannot take a property of a non-symbol: {}",
            property.type_name()
        )))),
    }
}

/// `x's y`, or `my y` / `its y` / `your y` without the apostrophe.
fn possessive(
    grammar: &Grammar,
    tokens: &mut TokenStream<'_>,
    root: &mut Option<Node>,
) -> ParseResult {
    if tokens.possessives_disabled() {
        return Ok(None);
    }
    let apostrophe = tokens.match_op_token("'").is_some();
    if !apostrophe && !(is_pronoun(root.as_ref()) && possessable(tokens.current_token())) {
        return Ok(None);
    }
    if apostrophe {
        tokens.require_token("s")?;
    }

    let mut prop = None;
    let mut attribute = grammar.parse("attributeRef", tokens)?;
    if attribute.is_none() {
        attribute = grammar.parse("styleRef", tokens)?;
        if attribute.is_none() {
            prop = Some(tokens.require_token_type(&[TokenKind::Identifier])?);
        }
    }
    let root = take_root(root)?;
    chain(
        grammar,
        tokens,
        NodeKind::Possessive {
            root: Box::new(root),
            attribute: attribute.map(Box::new),
            prop,
        },
    )
}

fn is_pronoun(root: Option<&Node>) -> bool {
    matches!(
        root.map(|node| &node.kind),
        Some(NodeKind::Symbol { name, .. }) if matches!(name.as_str(), "my" | "its" | "your")
    )
}

fn possessable(token: &Token) -> bool {
    matches!(
        token.kind,
        TokenKind::Identifier | TokenKind::AttributeRef | TokenKind::StyleRef
    )
}

fn in_expression(
    grammar: &Grammar,
    tokens: &mut TokenStream<'_>,
    root: &mut Option<Node>,
) -> ParseResult {
    if tokens.match_token("in").is_none() {
        return Ok(None);
    }
    let target = grammar.require("unaryExpression", tokens)?;
    let root = take_root(root)?;
    chain(
        grammar,
        tokens,
        NodeKind::InExpression {
            root: Box::new(root),
            target: Box::new(target),
        },
    )
}

/// `x as Int`, `x as a Date`, `x as JSON`
fn as_expression(
    grammar: &Grammar,
    tokens: &mut TokenStream<'_>,
    root: &mut Option<Node>,
) -> ParseResult {
    if tokens.match_token("as").is_none() {
        return Ok(None);
    }
    tokens.match_any_token(&["a", "an"]);
    let conversion = grammar.require("dotOrColonPath", tokens)?;
    let root = take_root(root)?;
    chain(
        grammar,
        tokens,
        NodeKind::AsExpression {
            root: Box::new(root),
            conversion: Box::new(conversion),
        },
    )
}

fn function_call(
    grammar: &Grammar,
    tokens: &mut TokenStream<'_>,
    root: &mut Option<Node>,
) -> ParseResult {
    if tokens.match_op_token("(").is_none() {
        return Ok(None);
    }
    let mut args = Vec::new();
    if tokens.match_op_token(")").is_none() {
        loop {
            args.push(grammar.require("expression", tokens)?);
            if tokens.match_op_token(",").is_none() {
                break;
            }
        }
        tokens.require_op_token(")")?;
    }
    let root = take_root(root)?;
    chain(
        grammar,
        tokens,
        NodeKind::FunctionCall {
            root: Box::new(root),
            args,
        },
    )
}

/// `x @attr`. Ends the chain.
fn attribute_ref_access(
    grammar: &Grammar,
    tokens: &mut TokenStream<'_>,
    root: &mut Option<Node>,
) -> ParseResult {
    let Some(attribute) = grammar.parse("attributeRef", tokens)? else {
        return Ok(None);
    };
    let root = take_root(root)?;
    Ok(Some(Node::new(NodeKind::AttributeRefAccess {
        root: Box::new(root),
        attribute: Box::new(attribute),
    })))
}

/// `x[i]`, `x[..i]`, `x[i..]`, `x[i..j]`
fn array_index(
    grammar: &Grammar,
    tokens: &mut TokenStream<'_>,
    root: &mut Option<Node>,
) -> ParseResult {
    if tokens.match_op_token("[").is_none() {
        return Ok(None);
    }
    let mut and_before = false;
    let mut and_after = false;
    let mut second_index = None;
    let first_index = if tokens.match_op_token("..").is_some() {
        and_before = true;
        grammar.require("expression", tokens)?
    } else {
        let first = grammar.require("expression", tokens)?;
        if tokens.match_op_token("..").is_some() {
            and_after = true;
            if !tokens.current_token().is_op("]") {
                second_index = grammar.parse("expression", tokens)?;
            }
        }
        first
    };
    tokens.require_op_token("]")?;

    let root = take_root(root)?;
    chain(
        grammar,
        tokens,
        NodeKind::ArrayIndex {
            root: Box::new(root),
            first_index: Box::new(first_index),
            second_index: second_index.map(Box::new),
            and_before,
            and_after,
        },
    )
}

// =========================================================================
// Unary and postfix
// =========================================================================

fn postfix_expression(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let Some(root) = grammar.parse("primaryExpression", tokens)? else {
        return Ok(None);
    };

    if let Some(postfix) = tokens
        .match_any_token(STRING_POSTFIXES)
        .or_else(|| tokens.match_op_token("%"))
    {
        return Ok(Some(Node::new(NodeKind::StringPostfix {
            root: Box::new(root),
            postfix: postfix.text,
        })));
    }

    let factor = if tokens.match_any_token(&["s", "seconds"]).is_some() {
        Some(1000)
    } else if tokens.match_any_token(&["ms", "milliseconds"]).is_some() {
        Some(1)
    } else {
        None
    };
    if let Some(factor) = factor {
        return Ok(Some(Node::new(NodeKind::TimeExpression {
            time: Box::new(root),
            factor,
        })));
    }

    if tokens.match_op_token(":").is_some() {
        let type_name = tokens.require_token_type(&[TokenKind::Identifier])?;
        let null_ok = tokens.match_op_token("!").is_none();
        return Ok(Some(Node::new(NodeKind::TypeCheck {
            root: Box::new(root),
            type_name,
            null_ok,
        })));
    }
    Ok(Some(root))
}

fn prefixed(
    grammar: &Grammar,
    tokens: &mut TokenStream<'_>,
    keyword: &str,
    build: fn(Box<Node>) -> NodeKind,
) -> ParseResult {
    if tokens.match_token(keyword).is_none() {
        return Ok(None);
    }
    let root = grammar.require("unaryExpression", tokens)?;
    Ok(Some(Node::new(build(Box::new(root)))))
}

fn logical_not(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    prefixed(grammar, tokens, "not", |root| NodeKind::LogicalNot { root })
}

fn no_expression(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    prefixed(grammar, tokens, "no", |root| NodeKind::NoExpression { root })
}

fn some(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("some").is_none() {
        return Ok(None);
    }
    let root = grammar.require("expression", tokens)?;
    Ok(Some(Node::new(NodeKind::SomeExpression {
        root: Box::new(root),
    })))
}

fn negative_number(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_op_token("-").is_none() {
        return Ok(None);
    }
    let root = grammar.require("unaryExpression", tokens)?;
    Ok(Some(Node::new(NodeKind::NegativeNumber {
        root: Box::new(root),
    })))
}

fn unary_expression(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    tokens.match_token("the");
    grammar.parse_any_of(
        &[
            "beepExpression",
            "logicalNot",
            "relativePositionalExpression",
            "positionalExpression",
            "noExpression",
            "negativeNumber",
            "postfixExpression",
        ],
        tokens,
    )
}

fn beep_expression(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("beep!").is_none() {
        return Ok(None);
    }
    let root = grammar.parse("unaryExpression", tokens)?;
    Ok(root.map(|root| {
        Node::new(NodeKind::BeepExpression {
            root: Box::new(root),
        })
    }))
}

/// `next <li/> from me within #list with wrapping`
fn relative_positional_expression(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let Some(op) = tokens.match_any_token(&["next", "previous"]) else {
        return Ok(None);
    };
    let thing = grammar.parse("expression", tokens)?;

    let from = if tokens.match_token("from").is_some() {
        let mut inner = tokens.push_follow("in");
        grammar.require("unaryExpression", &mut inner)?
    } else {
        grammar.require("implicitMeTarget", tokens)?
    };

    let mut in_elt = None;
    let mut within_elt = None;
    if tokens.match_token("in").is_some() {
        in_elt = Some(grammar.require("unaryExpression", tokens)?);
    } else if tokens.match_token("within").is_some() {
        within_elt = Some(grammar.require("unaryExpression", tokens)?);
    }

    let wrapping = if tokens.match_token("with").is_some() {
        tokens.require_token("wrapping")?;
        true
    } else {
        false
    };

    Ok(Some(Node::new(NodeKind::RelativePositionalExpression {
        forward_search: op.text == "next",
        operator: op.text,
        thing: thing.map(Box::new),
        from: Box::new(from),
        in_search: in_elt.is_some(),
        wrapping,
        in_elt: in_elt.map(Box::new),
        within_elt: within_elt.map(Box::new),
    })))
}

fn positional_expression(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let Some(op) = tokens.match_any_token(&["first", "last", "random"]) else {
        return Ok(None);
    };
    tokens.match_any_token(&["in", "from", "of"]);
    let rhs = grammar.require("unaryExpression", tokens)?;
    Ok(Some(Node::new(NodeKind::PositionalExpression {
        operator: op.text,
        rhs: Box::new(rhs),
    })))
}

// =========================================================================
// Binary operators
// =========================================================================

fn match_math_op(tokens: &mut TokenStream<'_>) -> Option<Token> {
    tokens
        .match_any_op_token(&["+", "-", "*", "/"])
        .or_else(|| tokens.match_token("mod"))
}

fn math_operator(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let Some(mut expr) = grammar.parse("unaryExpression", tokens)? else {
        return Ok(None);
    };
    let mut first: Option<String> = None;
    while let Some(op) = match_math_op(tokens) {
        let operator = op.text;
        match &first {
            Some(first) if *first != operator => {
                return Err(tokens.parse_error(Some(
                    "You must parenthesize math operations with different operators",
                )));
            }
            Some(_) => {}
            None => first = Some(operator.clone()),
        }
        let rhs = grammar.require("unaryExpression", tokens)?;
        expr = Node::new(NodeKind::MathOperator {
            operator,
            lhs: Box::new(expr),
            rhs: Box::new(rhs),
        });
    }
    Ok(Some(expr))
}

fn math_expression(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    grammar.parse_any_of(&["mathOperator", "unaryExpression"], tokens)
}

/// How a comparison continues after its operator.
enum Operand {
    Value,
    Type,
    Nothing,
}

/// Symbolic or English comparison after the left operand, if any.
fn comparison_keyword(tokens: &mut TokenStream<'_>) -> Result<Option<(String, Operand)>, Error> {
    if let Some(token) =
        tokens.match_any_op_token(&["<", ">", "<=", ">=", "==", "===", "!=", "!=="])
    {
        return Ok(Some((token.text, Operand::Value)));
    }

    let found = |operator: &str, operand| Ok(Some((operator.to_string(), operand)));

    if tokens.match_any_token(&["is", "am"]).is_some() {
        if tokens.match_token("not").is_some() {
            if tokens.match_token("in").is_some() {
                return found("not in", Operand::Value);
            }
            if tokens.match_token("a").is_some() {
                return found("not a", Operand::Type);
            }
            if tokens.match_token("empty").is_some() {
                return found("not empty", Operand::Nothing);
            }
            let operator = if tokens.match_token("really").is_some() {
                "!=="
            } else {
                "!="
            };
            if tokens.match_token("equal").is_some() {
                tokens.match_token("to");
            }
            return found(operator, Operand::Value);
        }
        if tokens.match_token("in").is_some() {
            return found("in", Operand::Value);
        }
        if tokens.match_token("a").is_some() {
            return found("a", Operand::Type);
        }
        if tokens.match_token("empty").is_some() {
            return found("empty", Operand::Nothing);
        }
        for (word, strict, inclusive) in [("less", "<", "<="), ("greater", ">", ">=")] {
            if tokens.match_token(word).is_some() {
                tokens.require_token("than")?;
                if tokens.match_token("or").is_some() {
                    tokens.require_token("equal")?;
                    tokens.require_token("to")?;
                    return found(inclusive, Operand::Value);
                }
                return found(strict, Operand::Value);
            }
        }
        let operator = if tokens.match_token("really").is_some() {
            "==="
        } else {
            "=="
        };
        if tokens.match_token("equal").is_some() {
            tokens.match_token("to");
        }
        return found(operator, Operand::Value);
    }

    if tokens.match_token("equals").is_some() {
        return found("==", Operand::Value);
    }
    if tokens.match_token("really").is_some() {
        tokens.require_token("equals")?;
        return found("===", Operand::Value);
    }
    if tokens.match_any_token(&["exist", "exists"]).is_some() {
        return found("exist", Operand::Nothing);
    }
    if tokens.match_any_token(&["matches", "match"]).is_some() {
        return found("match", Operand::Value);
    }
    if tokens.match_any_token(&["contains", "contain"]).is_some() {
        return found("contain", Operand::Value);
    }
    if tokens.match_any_token(&["includes", "include"]).is_some() {
        return found("include", Operand::Value);
    }
    if tokens.match_any_token(&["do", "does"]).is_some() {
        tokens.require_token("not")?;
        if tokens.match_any_token(&["matches", "match"]).is_some() {
            return found("not match", Operand::Value);
        }
        if tokens.match_any_token(&["contains", "contain"]).is_some() {
            return found("not contain", Operand::Value);
        }
        if tokens.match_token("exist").is_some() {
            return found("not exist", Operand::Nothing);
        }
        if tokens.match_token("include").is_some() {
            return found("not include", Operand::Value);
        }
        return Err(tokens.parse_error(Some("Expected matches or contains")));
    }
    Ok(None)
}

/// A single comparison; comparisons do not chain.
fn comparison_operator(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let Some(lhs) = grammar.parse("mathExpression", tokens)? else {
        return Ok(None);
    };
    let Some((operator, operand)) = comparison_keyword(tokens)? else {
        return Ok(Some(lhs));
    };

    let mut type_name = None;
    let mut null_ok = None;
    let mut rhs = None;
    match operand {
        Operand::Type => {
            type_name = Some(tokens.require_token_type(&[TokenKind::Identifier])?);
            null_ok = Some(tokens.match_op_token("!").is_none());
        }
        Operand::Value => rhs = Some(Box::new(grammar.require("mathExpression", tokens)?)),
        Operand::Nothing => {}
    }
    Ok(Some(Node::new(NodeKind::ComparisonOperator {
        operator,
        lhs: Box::new(lhs),
        rhs,
        type_name,
        null_ok,
    })))
}

fn comparison_expression(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    grammar.parse_any_of(&["comparisonOperator", "mathExpression"], tokens)
}

fn logical_operator(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let Some(mut expr) = grammar.parse("comparisonExpression", tokens)? else {
        return Ok(None);
    };
    let mut first: Option<String> = None;
    while let Some(op) = tokens.match_any_token(&["and", "or"]) {
        let operator = op.text;
        match &first {
            Some(first) if *first != operator => {
                return Err(tokens.parse_error(Some(
                    "You must parenthesize logical operations with different operators",
                )));
            }
            Some(_) => {}
            None => first = Some(operator.clone()),
        }
        let rhs = grammar.require("comparisonExpression", tokens)?;
        expr = Node::new(NodeKind::LogicalOperator {
            operator,
            lhs: Box::new(expr),
            rhs: Box::new(rhs),
        });
    }
    Ok(Some(expr))
}

fn logical_expression(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    grammar.parse_any_of(&["logicalOperator", "mathExpression"], tokens)
}

fn async_expression(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_token("async").is_none() {
        return grammar.parse("logicalExpression", tokens);
    }
    let value = grammar.require("logicalExpression", tokens)?;
    Ok(Some(Node::new(NodeKind::AsyncExpression {
        value: Box::new(value),
    })))
}

fn expression(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    tokens.match_token("the");
    grammar.parse("asyncExpression", tokens)
}

/// A primary expression that can be written to.
fn assignable_expression(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    tokens.match_token("the");
    let expr = grammar.parse("primaryExpression", tokens)?;
    match expr {
        Some(expr) if expr.kind.is_assignable() => Ok(Some(expr)),
        other => {
            let type_name = other.as_ref().map_or("undefined", Node::type_name);
            Err(tokens.parse_error(Some(&format!(
                "A target expression must be writable.  The expression type '{type_name}' is not."
            ))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MAX_DEPTH;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Node {
        parse_rule("expression", source)
    }

    fn parse_rule(rule: &str, source: &str) -> Node {
        let mut tokens = TokenStream::tokenize(source).unwrap();
        Grammar::global().require(rule, &mut tokens).unwrap()
    }

    fn error(rule: &str, source: &str) -> String {
        let mut tokens = TokenStream::tokenize(source).unwrap();
        let error = Grammar::global().require(rule, &mut tokens).unwrap_err();
        error.as_parse_error().unwrap().message_at_token.clone()
    }

    fn symbol_name(node: &Node) -> &str {
        match &node.kind {
            NodeKind::Symbol { name, .. } => name,
            other => panic!("Expected symbol, got {other:?}"),
        }
    }

    // =========================================================================
    // Operator chains
    // =========================================================================

    #[test]
    fn test_mixed_math_operators_are_rejected() {
        assert_eq!(
            error("expression", "1 + 2 * 3"),
            "You must parenthesize math operations with different operators"
        );
    }

    #[test]
    fn test_same_math_operator_is_left_associative() {
        match parse("1 + 2 + 3").kind {
            NodeKind::MathOperator { operator, lhs, rhs } => {
                assert_eq!(operator, "+");
                assert_eq!(lhs.type_name(), "mathOperator");
                assert_eq!(rhs.type_name(), "number");
            }
            other => panic!("Expected math operator, got {other:?}"),
        }
    }

    #[test]
    fn test_parentheses_allow_mixing() {
        match parse("(1 + 2) * 3").kind {
            NodeKind::MathOperator { operator, lhs, .. } => {
                assert_eq!(operator, "*");
                assert_eq!(lhs.type_name(), "mathOperator");
            }
            other => panic!("Expected math operator, got {other:?}"),
        }
        assert_eq!(parse("x mod 2").type_name(), "mathOperator");
    }

    #[test]
    fn test_missing_right_operand() {
        assert_eq!(error("expression", "1 +"), "Expected unaryExpression");
    }

    #[test]
    fn test_mixed_logical_operators_are_rejected() {
        assert_eq!(
            error("expression", "a and b or c"),
            "You must parenthesize logical operations with different operators"
        );
        assert_eq!(parse("a and b and c").type_name(), "logicalOperator");
    }

    // =========================================================================
    // Comparisons
    // =========================================================================

    fn comparison(source: &str) -> (String, bool, Option<bool>) {
        match parse(source).kind {
            NodeKind::ComparisonOperator {
                operator,
                rhs,
                null_ok,
                ..
            } => (operator, rhs.is_some(), null_ok),
            other => panic!("Expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn test_english_comparisons() {
        assert_eq!(comparison("x is 1"), ("==".to_string(), true, None));
        assert_eq!(comparison("x is not really 1"), ("!==".to_string(), true, None));
        assert_eq!(comparison("x is not empty"), ("not empty".to_string(), false, None));
        assert_eq!(
            comparison("x is less than or equal to 3"),
            ("<=".to_string(), true, None)
        );
        assert_eq!(comparison("x is greater than 3"), (">".to_string(), true, None));
        assert_eq!(comparison("x is a String!"), ("a".to_string(), false, Some(false)));
        assert_eq!(comparison("x is not a Number"), ("not a".to_string(), false, Some(true)));
        assert_eq!(comparison("x exists"), ("exist".to_string(), false, None));
        assert_eq!(comparison("x does not exist"), ("not exist".to_string(), false, None));
        assert_eq!(comparison("x does not match .foo"), ("not match".to_string(), true, None));
        assert_eq!(comparison("x contains y"), ("contain".to_string(), true, None));
        assert_eq!(comparison("x really equals y"), ("===".to_string(), true, None));
        assert_eq!(comparison("x >= 2"), (">=".to_string(), true, None));
    }

    #[test]
    fn test_does_not_needs_known_verb() {
        assert_eq!(error("expression", "x does not frob"), "Expected matches or contains");
        assert_eq!(
            error("expression", "x is less 3"),
            "Expected 'than' but found '3'"
        );
    }

    // =========================================================================
    // Indirect expressions
    // =========================================================================

    #[test]
    fn test_property_access_chain() {
        let node = parse("foo.bar.baz");
        match &node.kind {
            NodeKind::PropertyAccess { root, prop } => {
                assert_eq!(prop.text, "baz");
                assert_eq!(root.type_name(), "propertyAccess");
            }
            other => panic!("Expected property access, got {other:?}"),
        }
        assert_eq!(node.start_token.unwrap().text, "foo");
        assert_eq!(node.end_token.unwrap().text, "baz");
    }

    #[test]
    fn test_of_wraps_symbol() {
        match parse("the x of #y").kind {
            NodeKind::OfExpression { property, root } => {
                assert_eq!(symbol_name(&property), "x");
                assert_eq!(root.type_name(), "idRef");
            }
            other => panic!("Expected of expression, got {other:?}"),
        }
    }

    #[test]
    fn test_of_rewrites_innermost_root() {
        match parse("foo.bar of baz").kind {
            NodeKind::PropertyAccess { root, prop } => {
                assert_eq!(prop.text, "bar");
                match root.kind {
                    NodeKind::OfExpression { property, root } => {
                        assert_eq!(symbol_name(&property), "foo");
                        assert_eq!(symbol_name(&root), "baz");
                    }
                    other => panic!("Expected of expression, got {other:?}"),
                }
            }
            other => panic!("Expected property access, got {other:?}"),
        }
    }

    #[test]
    fn test_of_needs_symbol() {
        assert_eq!(
            error("expression", "1 of x"),
            "Cannot take a property of a non-symbol: number"
        );
    }

    #[test]
    fn test_possessives() {
        match parse("my value").kind {
            NodeKind::Possessive { root, prop, attribute } => {
                assert_eq!(symbol_name(&root), "my");
                assert_eq!(prop.unwrap().text, "value");
                assert!(attribute.is_none());
            }
            other => panic!("Expected possessive, got {other:?}"),
        }
        match parse("x's @title").kind {
            NodeKind::Possessive { attribute, prop, .. } => {
                assert_eq!(attribute.unwrap().type_name(), "attributeRef");
                assert!(prop.is_none());
            }
            other => panic!("Expected possessive, got {other:?}"),
        }
        match parse("its *color").kind {
            NodeKind::Possessive { attribute, .. } => {
                assert_eq!(attribute.unwrap().type_name(), "styleRef");
            }
            other => panic!("Expected possessive, got {other:?}"),
        }
    }

    #[test]
    fn test_disabled_possessives() {
        let mut tokens = TokenStream::tokenize("x's y").unwrap();
        let mut tokens = tokens.disable_possessives();
        let node = Grammar::global().require("expression", &mut tokens).unwrap();
        assert_eq!(node.type_name(), "symbol");
    }

    #[test]
    fn test_call_then_index() {
        match parse("f(1, 2)[0]").kind {
            NodeKind::ArrayIndex { root, .. } => match root.kind {
                NodeKind::FunctionCall { args, .. } => assert_eq!(args.len(), 2),
                other => panic!("Expected call, got {other:?}"),
            },
            other => panic!("Expected array index, got {other:?}"),
        }
    }

    #[test]
    fn test_array_ranges() {
        match parse("arr[..2]").kind {
            NodeKind::ArrayIndex {
                and_before,
                and_after,
                second_index,
                ..
            } => assert_eq!((and_before, and_after, second_index.is_none()), (true, false, true)),
            other => panic!("Expected array index, got {other:?}"),
        }
        match parse("arr[1..]").kind {
            NodeKind::ArrayIndex {
                and_after,
                second_index,
                ..
            } => assert_eq!((and_after, second_index.is_none()), (true, true)),
            other => panic!("Expected array index, got {other:?}"),
        }
        match parse("arr[1..3]").kind {
            NodeKind::ArrayIndex { second_index, .. } => assert!(second_index.is_some()),
            other => panic!("Expected array index, got {other:?}"),
        }
    }

    #[test]
    fn test_as_and_in() {
        match parse("x as an Int").kind {
            NodeKind::AsExpression { conversion, .. } => {
                assert_eq!(conversion.type_name(), "dotOrColonPath")
            }
            other => panic!("Expected as expression, got {other:?}"),
        }
        assert_eq!(parse("x in y").type_name(), "inExpression");
        assert_eq!(parse("x @foo").type_name(), "attributeRefAccess");
    }

    // =========================================================================
    // Unary and postfix
    // =========================================================================

    #[test]
    fn test_postfixes() {
        match parse("10px").kind {
            NodeKind::StringPostfix { postfix, .. } => assert_eq!(postfix, "px"),
            other => panic!("Expected postfix, got {other:?}"),
        }
        assert_eq!(parse("50%").type_name(), "stringPostfix");
        match parse("2s").kind {
            NodeKind::TimeExpression { factor, .. } => assert_eq!(factor, 1000),
            other => panic!("Expected time, got {other:?}"),
        }
        match parse("20 milliseconds").kind {
            NodeKind::TimeExpression { factor, .. } => assert_eq!(factor, 1),
            other => panic!("Expected time, got {other:?}"),
        }
        match parse("x:String!").kind {
            NodeKind::TypeCheck {
                type_name, null_ok, ..
            } => {
                assert_eq!(type_name.text, "String");
                assert!(!null_ok);
            }
            other => panic!("Expected type check, got {other:?}"),
        }
    }

    #[test]
    fn test_prefix_forms() {
        assert_eq!(parse("not x").type_name(), "logicalNot");
        assert_eq!(parse("no x").type_name(), "noExpression");
        assert_eq!(parse("some x").type_name(), "someExpression");
        assert_eq!(parse("-1").type_name(), "negativeNumber");
        assert_eq!(parse("beep! x").type_name(), "beepExpression");
        assert_eq!(parse("async x").type_name(), "asyncExpression");
        assert_eq!(parse("first in items").type_name(), "positionalExpression");
    }

    #[test]
    fn test_relative_positional() {
        match parse("next <li/> from me within #list with wrapping").kind {
            NodeKind::RelativePositionalExpression {
                operator,
                thing,
                from,
                forward_search,
                in_search,
                wrapping,
                within_elt,
                ..
            } => {
                assert_eq!(operator, "next");
                assert_eq!(thing.unwrap().type_name(), "queryRef");
                assert_eq!(symbol_name(&from), "me");
                assert!(forward_search);
                assert!(!in_search);
                assert!(wrapping);
                assert_eq!(within_elt.unwrap().type_name(), "idRef");
            }
            other => panic!("Expected relative positional, got {other:?}"),
        }
        match parse("previous .item").kind {
            NodeKind::RelativePositionalExpression { from, .. } => {
                assert_eq!(from.type_name(), "implicitMeTarget")
            }
            other => panic!("Expected relative positional, got {other:?}"),
        }
    }

    // =========================================================================
    // Assignable targets and limits
    // =========================================================================

    #[test]
    fn test_assignable_expression() {
        assert_eq!(parse_rule("assignableExpression", "the x").type_name(), "symbol");
        assert_eq!(
            error("assignableExpression", "1"),
            "A target expression must be writable.  The expression type 'number' is not."
        );
        assert_eq!(
            error("assignableExpression", ")"),
            "A target expression must be writable.  The expression type 'undefined' is not."
        );
    }

    #[test]
    fn test_missing_expression() {
        let mut tokens = TokenStream::tokenize("").unwrap();
        let error = Grammar::global().require("expression", &mut tokens).unwrap_err();
        let error = error.as_parse_error().unwrap();
        assert_eq!(error.message_at_token, "Expected expression");
        assert!(error.token.is_eof());
    }

    fn run_with_big_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
        std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(f)
            .unwrap()
            .join()
            .unwrap()
    }

    #[test]
    fn test_moderate_nesting_parses() {
        let parsed = run_with_big_stack(|| {
            let source = format!("{}1{}", "(".repeat(20), ")".repeat(20));
            let mut tokens = TokenStream::tokenize(&source).unwrap();
            Grammar::global()
                .require("expression", &mut tokens)
                .map(|node| node.type_name())
        });
        assert_eq!(parsed, Ok("number"));
    }

    #[test]
    fn test_deep_nesting_is_an_internal_error() {
        let result = run_with_big_stack(|| {
            let depth = MAX_DEPTH * 2;
            let source = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
            let mut tokens = TokenStream::tokenize(&source).unwrap();
            Grammar::global().require("expression", &mut tokens).err()
        });
        assert!(matches!(
            result,
            Some(Error::Internal(message)) if message == "maximum nesting depth exceeded"
        ));
    }
}
