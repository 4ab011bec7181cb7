use serde::{Deserialize, Serialize};

/// A position in source text. `start`/`end` are byte offsets (half-open),
/// `line` is 1-based and `column` is 0-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: u32, end: u32, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }
}

/// Operator tokens, resolved through a longest-match table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    // Arithmetic
    Plus,
    Minus,
    Multiply,
    Divide,
    Percent,

    // Punctuation
    Period,
    Ellipsis,
    Backslash,
    Colon,
    Pipe,
    Exclamation,
    Question,
    Pound,
    Ampersand,
    Dollar,
    Semi,
    Comma,
    Equals,
    /// A `'` that does not open a string (possessive `'s`).
    Apostrophe,

    // Brackets
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    // Comparison
    LAng,
    RAng,
    LteAng,
    GteAng,
    Eq,
    Eqq,
    Neq,
    Neqq,
}

impl OpKind {
    /// Look up an operator by its exact symbol.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => OpKind::Plus,
            "-" => OpKind::Minus,
            "*" => OpKind::Multiply,
            "/" => OpKind::Divide,
            "." => OpKind::Period,
            ".." => OpKind::Ellipsis,
            "\\" => OpKind::Backslash,
            ":" => OpKind::Colon,
            "%" => OpKind::Percent,
            "|" => OpKind::Pipe,
            "!" => OpKind::Exclamation,
            "?" => OpKind::Question,
            "#" => OpKind::Pound,
            "&" => OpKind::Ampersand,
            "$" => OpKind::Dollar,
            ";" => OpKind::Semi,
            "," => OpKind::Comma,
            "(" => OpKind::LParen,
            ")" => OpKind::RParen,
            "<" => OpKind::LAng,
            ">" => OpKind::RAng,
            "<=" => OpKind::LteAng,
            ">=" => OpKind::GteAng,
            "==" => OpKind::Eq,
            "===" => OpKind::Eqq,
            "!=" => OpKind::Neq,
            "!==" => OpKind::Neqq,
            "{" => OpKind::LBrace,
            "}" => OpKind::RBrace,
            "[" => OpKind::LBracket,
            "]" => OpKind::RBracket,
            "=" => OpKind::Equals,
            _ => return None,
        };
        Some(op)
    }

    /// Name used in the JSON token format.
    pub fn type_name(self) -> &'static str {
        match self {
            OpKind::Plus => "PLUS",
            OpKind::Minus => "MINUS",
            OpKind::Multiply => "MULTIPLY",
            OpKind::Divide => "DIVIDE",
            OpKind::Percent => "PERCENT",
            OpKind::Period => "PERIOD",
            OpKind::Ellipsis => "ELLIPSIS",
            OpKind::Backslash => "BACKSLASH",
            OpKind::Colon => "COLON",
            OpKind::Pipe => "PIPE",
            OpKind::Exclamation => "EXCLAMATION",
            OpKind::Question => "QUESTION",
            OpKind::Pound => "POUND",
            OpKind::Ampersand => "AMPERSAND",
            OpKind::Dollar => "DOLLAR",
            OpKind::Semi => "SEMI",
            OpKind::Comma => "COMMA",
            OpKind::Equals => "EQUALS",
            OpKind::Apostrophe => "APOSTROPHE",
            OpKind::LParen => "L_PAREN",
            OpKind::RParen => "R_PAREN",
            OpKind::LBrace => "L_BRACE",
            OpKind::RBrace => "R_BRACE",
            OpKind::LBracket => "L_BRACKET",
            OpKind::RBracket => "R_BRACKET",
            OpKind::LAng => "L_ANG",
            OpKind::RAng => "R_ANG",
            OpKind::LteAng => "LTE_ANG",
            OpKind::GteAng => "GTE_ANG",
            OpKind::Eq => "EQ",
            OpKind::Eqq => "EQQ",
            OpKind::Neq => "NEQ",
            OpKind::Neqq => "NEQQ",
        }
    }
}

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Whitespace,
    Identifier,
    Number,
    String,
    ClassRef,
    IdRef,
    AttributeRef,
    StyleRef,
    Operator(OpKind),
    Reserved,
    /// Synthesized by the token stream, never produced by the scanner.
    Eof,
}

impl TokenKind {
    /// Name used in the JSON token format.
    pub fn type_name(self) -> &'static str {
        match self {
            TokenKind::Whitespace => "WHITESPACE",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Number => "NUMBER",
            TokenKind::String => "STRING",
            TokenKind::ClassRef => "CLASS_REF",
            TokenKind::IdRef => "ID_REF",
            TokenKind::AttributeRef => "ATTRIBUTE_REF",
            TokenKind::StyleRef => "STYLE_REF",
            TokenKind::Operator(op) => op.type_name(),
            TokenKind::Reserved => "RESERVED",
            TokenKind::Eof => "EOF",
        }
    }
}

/// A token produced by the scanner.
///
/// `text` holds the token's value: the decoded contents for strings, the
/// full reference (`.foo`, `#bar`, `@x=1`) for CSS-like references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
    /// Backtick strings and `{...}` class/id references.
    pub template: bool,
}

impl Token {
    pub const EOF_TEXT: &'static str = "<<<EOF>>>";

    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
            template: false,
        }
    }

    pub fn is_operator(&self) -> bool {
        matches!(self.kind, TokenKind::Operator(_))
    }

    pub fn is_whitespace(&self) -> bool {
        self.kind == TokenKind::Whitespace
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// True for an operator token with exactly this symbol.
    pub fn is_op(&self, symbol: &str) -> bool {
        self.is_operator() && self.text == symbol
    }
}

/// The JSON shape of a token on the wire. Columns are 1-based here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenJson {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub start: u32,
    pub end: u32,
    pub line: u32,
    pub column: u32,
}

impl From<&Token> for TokenJson {
    fn from(token: &Token) -> Self {
        Self {
            kind: token.kind.type_name().to_string(),
            value: token.text.clone(),
            start: token.span.start,
            end: token.span.end,
            line: token.span.line,
            column: token.span.column + 1,
        }
    }
}

impl Serialize for Token {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TokenJson::from(self).serialize(serializer)
    }
}
