//! Abstract Syntax Tree for hyperscript.
//!
//! One variant per grammar rule. Nodes only describe the program, they
//! carry no way to evaluate it. The serialized `type` of each variant is the
//! rule name (`mathOperator`, `ifCommand`, `onFeature`, ...).

use hs_lexer::Token;
use serde::Serialize;

/// A parsed grammar element with the tokens it spans.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_token: Option<Token>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_token: Option<Token>,
    /// The following command in a command list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Box<Node>>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            start_token: None,
            end_token: None,
            next: None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Link `node` after the last command of the list starting here.
    pub fn append(&mut self, node: Node) {
        let mut slot = &mut self.next;
        while let Some(next) = slot {
            slot = &mut next.next;
        }
        *slot = Some(Box::new(node));
    }

    /// Iterate a command list from this node.
    pub fn commands(&self) -> impl Iterator<Item = &Node> {
        std::iter::successors(Some(self), |node| node.next.as_deref())
    }
}

impl From<NodeKind> for Node {
    fn from(kind: NodeKind) -> Self {
        Node::new(kind)
    }
}

// =========================================================================
// Node kinds
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum NodeKind {
    // --- Literals and references ---
    #[serde(rename = "string")]
    StringLiteral {
        token: Token,
        /// Text and interpolated expressions of a template string.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        parts: Vec<TemplatePart>,
    },
    NakedString {
        tokens: Vec<Token>,
    },
    Number {
        value: f64,
        number_token: Token,
    },
    IdRef {
        css: String,
        value: String,
    },
    IdRefTemplate {
        expr: Box<Node>,
    },
    ClassRef {
        css: String,
    },
    ClassRefTemplate {
        expr: Box<Node>,
    },
    QueryRef {
        css: String,
        template: bool,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        parts: Vec<TemplatePart>,
    },
    AttributeRef {
        name: String,
        css: String,
        value: Option<String>,
    },
    StyleRef {
        name: String,
    },
    ComputedStyleRef {
        name: String,
    },
    ObjectKey {
        key: Option<String>,
        expr: Option<Box<Node>>,
    },
    ObjectLiteral {
        keys: Vec<Node>,
        values: Vec<Node>,
    },
    NamedArgumentList {
        fields: Vec<NamedArgument>,
    },
    Symbol {
        token: Option<Token>,
        scope: SymbolScope,
        name: String,
    },
    ImplicitMeTarget,
    Boolean {
        value: bool,
    },
    Null,
    ArrayLiteral {
        values: Vec<Node>,
    },
    BlockLiteral {
        args: Vec<Token>,
        expr: Box<Node>,
    },
    EventName {
        name: String,
    },
    DotOrColonPath {
        path: Vec<String>,
        separator: Option<String>,
    },
    StyleLiteral {
        parts: Vec<TemplatePart>,
    },
    StyleRefValue {
        name: String,
    },
    #[serde(rename = "initial_literal")]
    InitialLiteral,
    PseudopossessiveIts {
        token: Token,
        name: String,
    },
    ClosestExpr {
        parent_search: bool,
        expr: Option<Box<Node>>,
        css: String,
        to: Option<Box<Node>>,
    },

    // --- Indirect expressions ---
    PropertyAccess {
        root: Box<Node>,
        prop: Token,
    },
    OfExpression {
        /// The symbol or attribute/style reference being looked up.
        property: Box<Node>,
        root: Box<Node>,
    },
    Possessive {
        root: Box<Node>,
        attribute: Option<Box<Node>>,
        prop: Option<Token>,
    },
    InExpression {
        root: Box<Node>,
        target: Box<Node>,
    },
    AsExpression {
        root: Box<Node>,
        conversion: Box<Node>,
    },
    FunctionCall {
        root: Box<Node>,
        args: Vec<Node>,
    },
    AttributeRefAccess {
        root: Box<Node>,
        attribute: Box<Node>,
    },
    ArrayIndex {
        root: Box<Node>,
        first_index: Box<Node>,
        second_index: Option<Box<Node>>,
        and_before: bool,
        and_after: bool,
    },

    // --- Unary and postfix ---
    StringPostfix {
        root: Box<Node>,
        postfix: String,
    },
    TimeExpression {
        time: Box<Node>,
        factor: u32,
    },
    TypeCheck {
        root: Box<Node>,
        type_name: Token,
        null_ok: bool,
    },
    LogicalNot {
        root: Box<Node>,
    },
    NoExpression {
        root: Box<Node>,
    },
    SomeExpression {
        root: Box<Node>,
    },
    NegativeNumber {
        root: Box<Node>,
    },
    BeepExpression {
        root: Box<Node>,
    },
    RelativePositionalExpression {
        operator: String,
        thing: Option<Box<Node>>,
        from: Box<Node>,
        forward_search: bool,
        in_search: bool,
        wrapping: bool,
        in_elt: Option<Box<Node>>,
        within_elt: Option<Box<Node>>,
    },
    PositionalExpression {
        operator: String,
        rhs: Box<Node>,
    },

    // --- Operators ---
    MathOperator {
        operator: String,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    ComparisonOperator {
        operator: String,
        lhs: Box<Node>,
        rhs: Option<Box<Node>>,
        type_name: Option<Token>,
        null_ok: Option<bool>,
    },
    LogicalOperator {
        operator: String,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    AsyncExpression {
        value: Box<Node>,
    },

    // --- Features ---
    Hyperscript {
        features: Vec<Node>,
    },
    OnFeature {
        display_name: String,
        every: bool,
        events: Vec<EventSpec>,
        queue: QueuePolicy,
        start: Box<Node>,
        error_symbol: Option<String>,
        error_handler: Option<Box<Node>>,
        finally_handler: Option<Box<Node>>,
    },
    DefFeature {
        display_name: String,
        name: String,
        namespace: Vec<String>,
        args: Vec<Token>,
        start: Box<Node>,
        error_symbol: Option<String>,
        error_handler: Option<Box<Node>>,
        finally_handler: Option<Box<Node>>,
    },
    SetFeature {
        start: Box<Node>,
    },
    InitFeature {
        immediately: bool,
        start: Box<Node>,
    },
    BehaviorFeature {
        path: String,
        name: String,
        params: Vec<String>,
        features: Vec<Node>,
    },
    InstallFeature {
        path: String,
        args: Option<Box<Node>>,
    },
    JsFeature {
        js_source: String,
        exposed_function_names: Vec<String>,
    },
    JsBody {
        js_source: String,
        exposed_function_names: Vec<String>,
    },

    // --- Commands ---
    JsCommand {
        js_source: String,
        inputs: Vec<String>,
    },
    AsyncCommand {
        body: Box<Node>,
    },
    TellCommand {
        value: Box<Node>,
        body: Box<Node>,
    },
    WaitCommand {
        events: Vec<WaitEvent>,
        from: Option<Box<Node>>,
        time: Option<Box<Node>>,
        /// `wait a tick`
        tick: bool,
    },
    TriggerCommand {
        event_name: Box<Node>,
        details: Option<Box<Node>>,
        to: Box<Node>,
    },
    SendCommand {
        event_name: Box<Node>,
        details: Option<Box<Node>>,
        to: Box<Node>,
    },
    ReturnCommand {
        value: Box<Node>,
    },
    ExitCommand,
    HaltCommand {
        keep_executing: bool,
        bubbling: bool,
        halt_default: bool,
    },
    LogCommand {
        exprs: Vec<Node>,
        with_expr: Option<Box<Node>>,
    },
    #[serde(rename = "beep!Command")]
    BeepCommand {
        exprs: Vec<Node>,
    },
    ThrowCommand {
        expr: Box<Node>,
    },
    CallCommand {
        expr: Box<Node>,
    },
    GetCommand {
        expr: Box<Node>,
    },
    MakeCommand {
        expr: Box<Node>,
        args: Vec<Node>,
        target: Option<Box<Node>>,
    },
    PseudoCommand {
        expr: Box<Node>,
        target: Option<Box<Node>>,
    },
    DefaultCommand {
        target: Box<Node>,
        value: Box<Node>,
    },
    SetCommand {
        target: Box<Node>,
        value: Option<Box<Node>>,
        object_literal: Option<Box<Node>>,
        symbol_write: bool,
    },
    IfCommand {
        expr: Box<Node>,
        true_branch: Box<Node>,
        false_branch: Option<Box<Node>>,
    },
    RepeatCommand(RepeatLoop),
    ForCommand(RepeatLoop),
    ContinueCommand,
    BreakCommand,
    AppendCommand {
        value: Box<Node>,
        target: Box<Node>,
    },
    PickCommand {
        selection: PickSelection,
        root: Option<Box<Node>>,
    },
    IncrementCommand {
        target: Box<Node>,
        amount: Option<Box<Node>>,
        symbol_write: bool,
    },
    DecrementCommand {
        target: Box<Node>,
        amount: Option<Box<Node>>,
        symbol_write: bool,
    },
    FetchCommand {
        url: Box<Node>,
        args: Option<Box<Node>>,
        conversion_type: String,
        conversion: Option<String>,
    },
    SettleCommand {
        on: Box<Node>,
    },
    AddCommand {
        class_refs: Vec<Node>,
        attribute_ref: Option<Box<Node>>,
        css_declaration: Option<Box<Node>>,
        to: Box<Node>,
        when: Option<Box<Node>>,
    },
    RemoveCommand {
        class_refs: Vec<Node>,
        attribute_ref: Option<Box<Node>>,
        element_expr: Option<Box<Node>>,
        from: Option<Box<Node>>,
    },
    ToggleCommand {
        /// `toggle between .a and .b`
        between: bool,
        class_ref: Option<Box<Node>>,
        class_ref2: Option<Box<Node>>,
        class_refs: Vec<Node>,
        attribute_ref: Option<Box<Node>>,
        /// Style toggles (`toggle *display`) name the hide/show strategy.
        strategy: Option<String>,
        on: Box<Node>,
        time: Option<Box<Node>>,
        evt: Option<Box<Node>>,
        from: Option<Box<Node>>,
    },
    HideCommand {
        target: Box<Node>,
        strategy: String,
    },
    ShowCommand {
        target: Box<Node>,
        strategy: String,
        arg: Option<String>,
        when: Option<Box<Node>>,
    },
    TakeCommand {
        class_refs: Vec<Node>,
        attribute_ref: Option<Box<Node>>,
        replacement: Option<Box<Node>>,
        from: Option<Box<Node>>,
        for_elt: Box<Node>,
    },
    PutCommand {
        value: Box<Node>,
        operation: String,
        target: Box<Node>,
        symbol_write: bool,
    },
    TransitionCommand {
        target: Box<Node>,
        properties: Vec<Node>,
        from: Vec<Option<Node>>,
        to: Vec<Node>,
        using: Option<Box<Node>>,
        over: Option<Box<Node>>,
    },
    MeasureCommand {
        target: Box<Node>,
        properties: Vec<String>,
    },
    GoCommand {
        back: bool,
        target: Option<Box<Node>>,
        url: bool,
        new_window: bool,
        offset: Option<Box<Node>>,
        scroll: Option<ScrollOptions>,
    },
    UnlessStatementModifier {
        conditional: Box<Node>,
        command: Box<Node>,
    },
    ImplicitReturn,
    EmptyCommandListCommand,
    WaitATick,
}

impl NodeKind {
    /// The rule name this node is serialized under.
    pub fn type_name(&self) -> &'static str {
        use NodeKind::*;
        match self {
            StringLiteral { .. } => "string",
            NakedString { .. } => "nakedString",
            Number { .. } => "number",
            IdRef { .. } => "idRef",
            IdRefTemplate { .. } => "idRefTemplate",
            ClassRef { .. } => "classRef",
            ClassRefTemplate { .. } => "classRefTemplate",
            QueryRef { .. } => "queryRef",
            AttributeRef { .. } => "attributeRef",
            StyleRef { .. } => "styleRef",
            ComputedStyleRef { .. } => "computedStyleRef",
            ObjectKey { .. } => "objectKey",
            ObjectLiteral { .. } => "objectLiteral",
            NamedArgumentList { .. } => "namedArgumentList",
            Symbol { .. } => "symbol",
            ImplicitMeTarget => "implicitMeTarget",
            Boolean { .. } => "boolean",
            Null => "null",
            ArrayLiteral { .. } => "arrayLiteral",
            BlockLiteral { .. } => "blockLiteral",
            EventName { .. } => "eventName",
            DotOrColonPath { .. } => "dotOrColonPath",
            StyleLiteral { .. } => "styleLiteral",
            StyleRefValue { .. } => "styleRefValue",
            InitialLiteral => "initial_literal",
            PseudopossessiveIts { .. } => "pseudopossessiveIts",
            ClosestExpr { .. } => "closestExpr",
            PropertyAccess { .. } => "propertyAccess",
            OfExpression { .. } => "ofExpression",
            Possessive { .. } => "possessive",
            InExpression { .. } => "inExpression",
            AsExpression { .. } => "asExpression",
            FunctionCall { .. } => "functionCall",
            AttributeRefAccess { .. } => "attributeRefAccess",
            ArrayIndex { .. } => "arrayIndex",
            StringPostfix { .. } => "stringPostfix",
            TimeExpression { .. } => "timeExpression",
            TypeCheck { .. } => "typeCheck",
            LogicalNot { .. } => "logicalNot",
            NoExpression { .. } => "noExpression",
            SomeExpression { .. } => "someExpression",
            NegativeNumber { .. } => "negativeNumber",
            BeepExpression { .. } => "beepExpression",
            RelativePositionalExpression { .. } => "relativePositionalExpression",
            PositionalExpression { .. } => "positionalExpression",
            MathOperator { .. } => "mathOperator",
            ComparisonOperator { .. } => "comparisonOperator",
            LogicalOperator { .. } => "logicalOperator",
            AsyncExpression { .. } => "asyncExpression",
            Hyperscript { .. } => "hyperscript",
            OnFeature { .. } => "onFeature",
            DefFeature { .. } => "defFeature",
            SetFeature { .. } => "setFeature",
            InitFeature { .. } => "initFeature",
            BehaviorFeature { .. } => "behaviorFeature",
            InstallFeature { .. } => "installFeature",
            JsFeature { .. } => "jsFeature",
            JsBody { .. } => "jsBody",
            JsCommand { .. } => "jsCommand",
            AsyncCommand { .. } => "asyncCommand",
            TellCommand { .. } => "tellCommand",
            WaitCommand { .. } => "waitCommand",
            TriggerCommand { .. } => "triggerCommand",
            SendCommand { .. } => "sendCommand",
            ReturnCommand { .. } => "returnCommand",
            ExitCommand => "exitCommand",
            HaltCommand { .. } => "haltCommand",
            LogCommand { .. } => "logCommand",
            BeepCommand { .. } => "beep!Command",
            ThrowCommand { .. } => "throwCommand",
            CallCommand { .. } => "callCommand",
            GetCommand { .. } => "getCommand",
            MakeCommand { .. } => "makeCommand",
            PseudoCommand { .. } => "pseudoCommand",
            DefaultCommand { .. } => "defaultCommand",
            SetCommand { .. } => "setCommand",
            IfCommand { .. } => "ifCommand",
            RepeatCommand(_) => "repeatCommand",
            ForCommand(_) => "forCommand",
            ContinueCommand => "continueCommand",
            BreakCommand => "breakCommand",
            AppendCommand { .. } => "appendCommand",
            PickCommand { .. } => "pickCommand",
            IncrementCommand { .. } => "incrementCommand",
            DecrementCommand { .. } => "decrementCommand",
            FetchCommand { .. } => "fetchCommand",
            SettleCommand { .. } => "settleCommand",
            AddCommand { .. } => "addCommand",
            RemoveCommand { .. } => "removeCommand",
            ToggleCommand { .. } => "toggleCommand",
            HideCommand { .. } => "hideCommand",
            ShowCommand { .. } => "showCommand",
            TakeCommand { .. } => "takeCommand",
            PutCommand { .. } => "putCommand",
            TransitionCommand { .. } => "transitionCommand",
            MeasureCommand { .. } => "measureCommand",
            GoCommand { .. } => "goCommand",
            UnlessStatementModifier { .. } => "unlessStatementModifier",
            ImplicitReturn => "implicitReturn",
            EmptyCommandListCommand => "emptyCommandListCommand",
            WaitATick => "waitATick",
        }
    }

    /// The expression an indirect expression was built on.
    pub fn root(&self) -> Option<&Node> {
        use NodeKind::*;
        match self {
            PropertyAccess { root, .. }
            | OfExpression { root, .. }
            | Possessive { root, .. }
            | InExpression { root, .. }
            | AsExpression { root, .. }
            | FunctionCall { root, .. }
            | AttributeRefAccess { root, .. }
            | ArrayIndex { root, .. } => Some(root),
            _ => None,
        }
    }

    pub fn root_mut(&mut self) -> Option<&mut Box<Node>> {
        use NodeKind::*;
        match self {
            PropertyAccess { root, .. }
            | OfExpression { root, .. }
            | Possessive { root, .. }
            | InExpression { root, .. }
            | AsExpression { root, .. }
            | FunctionCall { root, .. }
            | AttributeRefAccess { root, .. }
            | ArrayIndex { root, .. } => Some(root),
            _ => None,
        }
    }

    /// The CSS selector of a reference-like expression.
    pub fn css(&self) -> Option<&str> {
        use NodeKind::*;
        match self {
            IdRef { css, .. }
            | ClassRef { css }
            | QueryRef { css, .. }
            | AttributeRef { css, .. }
            | ClosestExpr { css, .. } => Some(css),
            _ => None,
        }
    }

    /// The text an event name or dotted path stands for (`a.b.c`, `x:y`).
    pub fn path_name(&self) -> Option<String> {
        match self {
            NodeKind::EventName { name } => Some(name.clone()),
            NodeKind::DotOrColonPath { path, separator } => {
                Some(path.join(separator.as_deref().unwrap_or_default()))
            }
            _ => None,
        }
    }

    /// Whether the expression can be the target of `set`, `put` and friends.
    pub fn is_assignable(&self) -> bool {
        use NodeKind::*;
        matches!(
            self,
            Symbol { .. }
                | OfExpression { .. }
                | PropertyAccess { .. }
                | AttributeRefAccess { .. }
                | AttributeRef { .. }
                | StyleRef { .. }
                | ArrayIndex { .. }
                | Possessive { .. }
        )
    }
}

// =========================================================================
// Supporting types
// =========================================================================

/// A piece of a template string: literal text or an interpolated expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TemplatePart {
    Text(String),
    Expr(Box<Node>),
}

impl TemplatePart {
    /// The literal text of a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TemplatePart::Text(text) => Some(text),
            TemplatePart::Expr(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolScope {
    Default,
    Global,
    Element,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedArgument {
    pub name: Token,
    pub value: Node,
}

/// How an `on` handler treats events arriving while it is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuePolicy {
    All,
    First,
    Last,
    None,
}

/// One `or`-joined event of an `on` feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSpec {
    pub on: String,
    pub args: Vec<Token>,
    pub filter: Option<Node>,
    pub start_count: Option<u32>,
    pub end_count: Option<u32>,
    pub unbounded: bool,
    pub from: Option<Node>,
    pub elsewhere: bool,
    pub in_expr: Option<Node>,
    pub debounce_time: Option<Node>,
    pub throttle_time: Option<Node>,
    pub mutation_spec: Option<MutationSpec>,
    pub intersection_spec: Option<IntersectionSpec>,
}

/// Options for a `mutation` event's observer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationSpec {
    pub attributes: bool,
    pub subtree: bool,
    pub character_data: bool,
    pub child_list: bool,
    pub attribute_old_value: bool,
    pub character_data_old_value: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_filter: Option<Vec<String>>,
}

/// Options for an `intersection` event's observer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntersectionSpec {
    pub with: Option<Node>,
    pub margin: Option<Node>,
    pub threshold: Option<Node>,
}

/// An event (or a timeout) a `wait for` can resume on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WaitEvent {
    Event { name: String, args: Vec<Token> },
    Timeout { time: Node },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatLoop {
    pub identifier: String,
    pub index_identifier: Option<String>,
    pub slot: String,
    pub expression: Option<Box<Node>>,
    pub forever: bool,
    pub times: Option<Box<Node>>,
    pub until: bool,
    pub event: Option<Box<Node>>,
    pub on: Option<Box<Node>>,
    pub while_expr: Option<Box<Node>>,
    #[serde(rename = "loop")]
    pub body: Box<Node>,
}

/// What a `pick` command selects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PickSelection {
    Items { range: PickRange },
    Characters { range: PickRange },
    Match { pattern: Option<Box<Node>>, flags: String },
    Matches { pattern: Option<Box<Node>>, flags: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickRange {
    /// `None` for `start`.
    pub from: Option<Box<Node>>,
    pub to: Option<Box<Node>>,
    pub to_end: bool,
    pub include_start: bool,
    pub include_end: bool,
}

/// `scrollIntoView` options of a `go to` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrollOptions {
    pub block: String,
    pub inline: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_lexer::{Span, TokenKind};
    use pretty_assertions::assert_eq;

    fn symbol(name: &str) -> Node {
        let token = Token::new(TokenKind::Identifier, name, Span::new(0, name.len() as u32, 1, 0));
        Node::new(NodeKind::Symbol {
            token: Some(token),
            scope: SymbolScope::Default,
            name: name.to_string(),
        })
    }

    #[test]
    fn test_type_names_match_serialized_tag() {
        let nodes = [
            symbol("x"),
            Node::new(NodeKind::Null),
            Node::new(NodeKind::BeepCommand { exprs: vec![] }),
            Node::new(NodeKind::InitialLiteral),
            Node::new(NodeKind::EmptyCommandListCommand),
        ];
        for node in nodes {
            let json = serde_json::to_value(&node).unwrap();
            assert_eq!(json["type"], node.type_name());
        }
    }

    #[test]
    fn test_fields_are_camel_case() {
        let node = Node::new(NodeKind::ArrayIndex {
            root: Box::new(symbol("arr")),
            first_index: Box::new(symbol("i")),
            second_index: None,
            and_before: false,
            and_after: true,
        });
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "arrayIndex");
        assert_eq!(json["firstIndex"]["name"], "i");
        assert_eq!(json["andAfter"], true);
        assert!(json.get("next").is_none());
    }

    #[test]
    fn test_append_links_to_end() {
        let mut list = Node::new(NodeKind::ExitCommand);
        list.append(Node::new(NodeKind::BreakCommand));
        list.append(Node::new(NodeKind::ImplicitReturn));
        let names: Vec<_> = list.commands().map(Node::type_name).collect();
        assert_eq!(names, vec!["exitCommand", "breakCommand", "implicitReturn"]);
    }

    #[test]
    fn test_repeat_loop_flattens_into_node() {
        let node = Node::new(NodeKind::RepeatCommand(RepeatLoop {
            identifier: "x".to_string(),
            index_identifier: None,
            slot: "x_7".to_string(),
            expression: None,
            forever: true,
            times: None,
            until: false,
            event: None,
            on: None,
            while_expr: None,
            body: Box::new(Node::new(NodeKind::EmptyCommandListCommand)),
        }));
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "repeatCommand");
        assert_eq!(json["loop"]["type"], "emptyCommandListCommand");
        assert_eq!(json["forever"], true);
    }

    #[test]
    fn test_template_parts_are_untagged() {
        let parts = vec![
            TemplatePart::Text("a ".to_string()),
            TemplatePart::Expr(Box::new(symbol("x"))),
        ];
        let json = serde_json::to_value(&parts).unwrap();
        assert_eq!(json[0], "a ");
        assert_eq!(json[1]["type"], "symbol");
    }
}
