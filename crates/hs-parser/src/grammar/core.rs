//! Structural rules: features, commands, command lists and the expression
//! skeleton that leaf and indirect expressions plug into.

use hs_lexer::TokenKind;

use super::{take_root, Grammar, ParseResult, Rule};
use crate::ast::{Node, NodeKind};
use crate::stream::TokenStream;

pub(super) fn install(grammar: &mut Grammar) {
    grammar.add_element("feature", Rule::Element(feature));
    grammar.add_element("command", Rule::Element(command));
    grammar.add_element("commandList", Rule::Element(command_list));
    grammar.add_element("leaf", Rule::Element(leaf));
    grammar.add_element("indirectExpression", Rule::Indirect(indirect_expression));
    grammar.add_element("indirectStatement", Rule::Indirect(indirect_statement));
    grammar.add_element("primaryExpression", Rule::Element(primary_expression));
    grammar.add_element("hyperscript", Rule::Element(hyperscript));
}

fn feature(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_op_token("(").is_some() {
        let feature = grammar.require("feature", tokens)?;
        tokens.require_op_token(")")?;
        return Ok(Some(feature));
    }
    match grammar.feature_for(&tokens.current_token().text) {
        Some(name) => grammar.parse(name, tokens),
        None => Ok(None),
    }
}

fn command(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if tokens.match_op_token("(").is_some() {
        let command = grammar.require("command", tokens)?;
        tokens.require_op_token(")")?;
        return Ok(Some(command));
    }

    let keyword = grammar.command_for(&tokens.current_token().text);
    let identifier = tokens.current_token().kind == TokenKind::Identifier;
    let command = match keyword {
        Some(name) => grammar.parse(name, tokens)?,
        None if identifier => grammar.parse("pseudoCommand", tokens)?,
        None => None,
    };
    match command {
        Some(command) => grammar.parse_with("indirectStatement", tokens, &mut Some(command)),
        None => Ok(None),
    }
}

/// Commands separated by optional `then`, linked through `next` and closed
/// by an `emptyCommandListCommand`.
fn command_list(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let mut commands = Vec::new();
    while tokens.has_more() {
        let Some(command) = grammar.parse("command", tokens)? else {
            break;
        };
        commands.push(command);
        tokens.match_token("then");
    }

    let mut list = Node::new(NodeKind::EmptyCommandListCommand);
    list.start_token = Some(tokens.current_token().clone());
    list.end_token = tokens.last_match().cloned();
    while let Some(mut command) = commands.pop() {
        command.next = Some(Box::new(list));
        list = command;
    }
    Ok(Some(list))
}

fn leaf(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    if let Some(leaf) = grammar.parse_any_of(grammar.leaf_expressions(), tokens)? {
        return Ok(Some(leaf));
    }
    // symbols last so keywords like `true` are not taken as names
    grammar.parse("symbol", tokens)
}

fn indirect_expression(
    grammar: &Grammar,
    tokens: &mut TokenStream<'_>,
    root: &mut Option<Node>,
) -> ParseResult {
    for name in grammar.indirect_expressions() {
        if let Some(root) = root.as_mut() {
            root.end_token = tokens.last_match().cloned();
        }
        if let Some(node) = grammar.parse_with(name, tokens, root)? {
            return Ok(Some(node));
        }
    }
    Ok(root.take())
}

/// `<command> unless <expr>`
fn indirect_statement(
    grammar: &Grammar,
    tokens: &mut TokenStream<'_>,
    root: &mut Option<Node>,
) -> ParseResult {
    if tokens.match_token("unless").is_some() {
        let mut command = take_root(root)?;
        command.end_token = tokens.last_match().cloned();
        let conditional = grammar.require("expression", tokens)?;
        return Ok(Some(Node::new(NodeKind::UnlessStatementModifier {
            conditional: Box::new(conditional),
            command: Box::new(command),
        })));
    }
    Ok(root.take())
}

fn primary_expression(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    match grammar.parse("leaf", tokens)? {
        Some(leaf) => grammar.parse_with("indirectExpression", tokens, &mut Some(leaf)),
        None => Ok(None),
    }
}

fn hyperscript(grammar: &Grammar, tokens: &mut TokenStream<'_>) -> ParseResult {
    let mut features = Vec::new();
    if tokens.has_more() {
        while grammar.feature_start(tokens.current_token()) || tokens.current_token().text == "(" {
            features.push(grammar.require("feature", tokens)?);
            tokens.match_token("end");
        }
    }
    Ok(Some(Node::new(NodeKind::Hyperscript { features })))
}
