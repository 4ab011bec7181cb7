use crate::token::{OpKind, Span, Token, TokenKind};
use crate::{LexErrorKind, LexerError};

/// Hyperscript source scanner.
///
/// A single left-to-right pass over the source characters. Positions are
/// tracked as byte offsets alongside a 1-based line and 0-based column.
///
/// Two pieces of context change how characters are read:
/// - the last consumed character decides whether `.foo`/`#foo` is a CSS
///   reference or a property access (`a.b` never yields a class ref);
/// - in template mode (the body of a backtick string) `$` is an operator and
///   quotes are reserved until a `${` interpolation is opened.
pub struct Scanner {
    chars: Vec<char>,
    pos: usize,
    offset: u32,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
    last_char: Option<char>,
    template: bool,
    template_braces: u32,
}

impl Scanner {
    /// Create a new scanner for the given source.
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            offset: 0,
            line: 1,
            column: 0,
            tokens: Vec::new(),
            last_char: None,
            template: false,
            template_braces: 0,
        }
    }

    /// Tokenize the entire source into a vector of tokens.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, LexerError> {
        let mut scanner = Scanner::new(source);
        scanner.scan_tokens()?;
        Ok(scanner.tokens)
    }

    /// Tokenize the body of a backtick string.
    pub fn tokenize_template(source: &str) -> Result<Vec<Token>, LexerError> {
        let mut scanner = Scanner::new(source);
        scanner.template = true;
        scanner.scan_tokens()?;
        Ok(scanner.tokens)
    }

    fn scan_tokens(&mut self) -> Result<(), LexerError> {
        while !self.is_at_end() {
            self.scan_token()?;
        }
        Ok(())
    }

    /// Scan the next token.
    fn scan_token(&mut self) -> Result<(), LexerError> {
        let ch = self.peek();
        let next = self.peek_next();

        match ch {
            // Comments
            '-' | '/' if next == ch && self.comment_start_follows(ch) => {
                self.skip_line_comment();
                Ok(())
            }
            '/' if next == '*' && self.comment_start_follows('*') => {
                self.skip_block_comment();
                Ok(())
            }

            c if is_whitespace(c) => {
                self.scan_whitespace();
                Ok(())
            }

            // CSS-like references
            '.' if !self.possible_preceding_symbol()
                && (is_alpha(next) || next == '{' || next == '-') =>
            {
                self.scan_reference(TokenKind::ClassRef)
            }
            '#' if !self.possible_preceding_symbol() && (is_alpha(next) || next == '{') => {
                self.scan_reference(TokenKind::IdRef)
            }
            '[' if next == '@' => {
                self.scan_attribute_ref();
                Ok(())
            }
            '@' => self.scan_short_attribute_ref(),
            '*' if is_alpha(next) => {
                self.scan_style_ref();
                Ok(())
            }

            c if is_alpha(c) || (!self.in_template() && is_identifier_char(c)) => {
                let start = self.mark();
                let text = self.read_identifier();
                self.push(TokenKind::Identifier, text, start);
                Ok(())
            }
            c if c.is_ascii_digit() => {
                self.scan_number();
                Ok(())
            }

            // Strings
            '"' | '`' if !self.in_template() => self.scan_string(),
            '\'' if !self.in_template() => {
                if self.single_quote_starts_string() {
                    self.scan_string()
                } else {
                    self.scan_operator();
                    Ok(())
                }
            }

            c if is_operator_start(c) => {
                if self.last_char == Some('$') && c == '{' {
                    self.template_braces += 1;
                }
                if c == '}' {
                    self.template_braces = self.template_braces.saturating_sub(1);
                }
                self.scan_operator();
                Ok(())
            }

            c if self.in_template() || is_reserved(c) => {
                let start = self.mark();
                self.advance();
                self.push(TokenKind::Reserved, c.to_string(), start);
                Ok(())
            }

            c => Err(self.error(LexErrorKind::UnknownCharacter(c), self.mark())),
        }
    }

    // --- Trivia ---

    /// `--`, `//` and `/*` only start a comment when followed by whitespace,
    /// the end of input, or another copy of the comment character.
    fn comment_start_follows(&self, repeat: char) -> bool {
        match self.chars.get(self.pos + 2) {
            None => true,
            Some(&c) => is_whitespace(c) || c == repeat,
        }
    }

    fn skip_line_comment(&mut self) {
        while !self.is_at_end() && !is_newline(self.peek()) {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        while !self.is_at_end() && !(self.peek() == '*' && self.peek_next() == '/') {
            self.advance();
        }
        self.advance();
        self.advance();
    }

    fn scan_whitespace(&mut self) {
        let start = self.mark();
        let mut text = String::new();
        while !self.is_at_end() && is_whitespace(self.peek()) {
            text.push(self.advance());
        }
        self.push(TokenKind::Whitespace, text, start);
    }

    // --- Scanners ---

    /// `.class`, `#id`, or their `{expr}` template forms.
    fn scan_reference(&mut self, kind: TokenKind) -> Result<(), LexerError> {
        let start = self.mark();
        let mut text = String::new();
        text.push(self.advance());

        let template = self.peek() == '{';
        if template {
            text.push(self.advance());
            while !self.is_at_end() && self.peek() != '}' {
                text.push(self.advance());
            }
            if self.is_at_end() {
                let error = if kind == TokenKind::ClassRef {
                    LexErrorKind::UnterminatedClassRef
                } else {
                    LexErrorKind::UnterminatedIdRef
                };
                return Err(self.error(error, start));
            }
            text.push(self.advance());
        } else {
            while is_css_char(self.peek()) {
                text.push(self.advance());
            }
        }

        self.push(kind, text, start);
        if let Some(token) = self.tokens.last_mut() {
            token.template = template;
        }
        Ok(())
    }

    /// Long form `[@name=value]`, consumed up to the closing bracket.
    fn scan_attribute_ref(&mut self) {
        let start = self.mark();
        let mut text = String::new();
        while !self.is_at_end() && self.peek() != ']' {
            text.push(self.advance());
        }
        if self.peek() == ']' {
            text.push(self.advance());
        }
        self.push(TokenKind::AttributeRef, text, start);
    }

    /// Short form `@name`, `@name="value"` or `@name=value`.
    fn scan_short_attribute_ref(&mut self) -> Result<(), LexerError> {
        let start = self.mark();
        let mut text = String::new();
        text.push(self.advance());
        while is_css_char(self.peek()) {
            text.push(self.advance());
        }
        if self.peek() == '=' {
            text.push(self.advance());
            let c = self.peek();
            if c == '"' || c == '\'' {
                text.push_str(&self.read_string()?);
            } else if is_alpha(c) || c.is_ascii_digit() || is_identifier_char(c) {
                text.push_str(&self.read_identifier());
            }
        }
        self.push(TokenKind::AttributeRef, text, start);
        Ok(())
    }

    fn scan_style_ref(&mut self) {
        let start = self.mark();
        let mut text = String::new();
        text.push(self.advance());
        while is_alpha(self.peek()) || self.peek() == '-' {
            text.push(self.advance());
        }
        self.push(TokenKind::StyleRef, text, start);
    }

    fn read_identifier(&mut self) -> String {
        let mut text = String::new();
        text.push(self.advance());
        while is_alpha(self.peek()) || self.peek().is_ascii_digit() || is_identifier_char(self.peek())
        {
            text.push(self.advance());
        }
        if text == "beep" && self.peek() == '!' {
            text.push(self.advance());
        }
        text
    }

    /// Integer part, optional fraction, optional exponent with optional sign.
    fn scan_number(&mut self) {
        let start = self.mark();
        let mut text = String::new();
        self.push_digits(&mut text);

        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            text.push(self.advance());
            self.push_digits(&mut text);
        }

        if self.peek() == 'e' || self.peek() == 'E' {
            let next = self.peek_next();
            let signed = (next == '-' || next == '+')
                && self.chars.get(self.pos + 2).is_some_and(|c| c.is_ascii_digit());
            if next.is_ascii_digit() {
                text.push(self.advance());
            } else if signed {
                text.push(self.advance());
                text.push(self.advance());
            }
            self.push_digits(&mut text);
        }

        self.push(TokenKind::Number, text, start);
    }

    fn push_digits(&mut self, text: &mut String) {
        while self.peek().is_ascii_digit() {
            text.push(self.advance());
        }
    }

    fn scan_string(&mut self) -> Result<(), LexerError> {
        let start = self.mark();
        let template = self.peek() == '`';
        let value = self.read_string()?;
        self.push(TokenKind::String, value, start);
        if let Some(token) = self.tokens.last_mut() {
            token.template = template;
        }
        Ok(())
    }

    /// Read a quoted string starting at the opening quote and return its
    /// decoded contents.
    fn read_string(&mut self) -> Result<String, LexerError> {
        let start = self.mark();
        let quote = self.advance();
        let mut value = String::new();

        while !self.is_at_end() && self.peek() != quote {
            let c = self.advance();
            if c != '\\' {
                value.push(c);
                continue;
            }
            if self.is_at_end() {
                break;
            }
            match self.advance() {
                'b' => value.push('\u{8}'),
                'f' => value.push('\u{c}'),
                'n' => value.push('\n'),
                'r' => value.push('\r'),
                't' => value.push('\t'),
                'v' => value.push('\u{b}'),
                'x' => {
                    let decoded = self
                        .read_hex_escape()
                        .ok_or_else(|| self.error(LexErrorKind::InvalidHexEscape, start))?;
                    value.push(decoded);
                }
                other => value.push(other),
            }
        }

        if self.is_at_end() {
            return Err(self.error(LexErrorKind::UnterminatedString, start));
        }
        self.advance(); // closing quote
        Ok(value)
    }

    fn read_hex_escape(&mut self) -> Option<char> {
        let mut code = 0;
        for _ in 0..2 {
            if self.is_at_end() {
                return None;
            }
            code = code * 16 + self.advance().to_digit(16)?;
        }
        char::from_u32(code)
    }

    /// Longest match against the operator table.
    fn scan_operator(&mut self) {
        let start = self.mark();
        let mut text = String::new();
        text.push(self.advance());
        while !self.is_at_end() {
            let mut candidate = text.clone();
            candidate.push(self.peek());
            if OpKind::from_symbol(&candidate).is_none() {
                break;
            }
            text.push(self.advance());
        }
        let op = OpKind::from_symbol(&text).unwrap_or(OpKind::Apostrophe);
        self.push(TokenKind::Operator(op), text, start);
    }

    // --- Context ---

    fn in_template(&self) -> bool {
        self.template && self.template_braces == 0
    }

    /// Whether the previous character could end an operand, which turns a
    /// following `.`/`#` into an operator instead of a CSS reference.
    fn possible_preceding_symbol(&self) -> bool {
        match self.last_char {
            Some(c) => {
                is_alpha(c)
                    || c.is_ascii_digit()
                    || matches!(c, ')' | '"' | '\'' | '`' | '}' | ']')
            }
            None => false,
        }
    }

    /// A `'` directly after an identifier, reference, `>` or `)` is the
    /// possessive apostrophe, not a string.
    fn single_quote_starts_string(&self) -> bool {
        match self.tokens.last() {
            None => true,
            Some(previous) => match previous.kind {
                TokenKind::Identifier | TokenKind::ClassRef | TokenKind::IdRef => false,
                TokenKind::Operator(OpKind::RAng | OpKind::RParen) => false,
                _ => true,
            },
        }
    }

    // --- Helpers ---

    fn mark(&self) -> Span {
        Span::new(self.offset, self.offset, self.line, self.column)
    }

    fn push(&mut self, kind: TokenKind, text: String, mut span: Span) {
        span.end = self.offset;
        self.tokens.push(Token::new(kind, text, span));
    }

    fn peek(&self) -> char {
        self.chars.get(self.pos).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.chars.get(self.pos + 1).copied().unwrap_or('\0')
    }

    /// Consume one character. A `\r\n` pair counts as a single line break.
    fn advance(&mut self) -> char {
        let Some(&c) = self.chars.get(self.pos) else {
            return '\0';
        };
        self.pos += 1;
        self.offset += c.len_utf8() as u32;
        self.last_char = Some(c);
        if c == '\n' || (c == '\r' && self.peek() != '\n') {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        c
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn error(&self, kind: LexErrorKind, at: Span) -> LexerError {
        LexerError {
            kind,
            line: at.line,
            column: at.column + 1,
        }
    }
}

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic()
}

fn is_identifier_char(c: char) -> bool {
    c == '_' || c == '$'
}

fn is_newline(c: char) -> bool {
    c == '\r' || c == '\n'
}

fn is_whitespace(c: char) -> bool {
    c == ' ' || c == '\t' || is_newline(c)
}

fn is_css_char(c: char) -> bool {
    is_alpha(c) || c.is_ascii_digit() || matches!(c, '-' | '_' | ':')
}

fn is_reserved(c: char) -> bool {
    c == '`' || c == '^'
}

fn is_operator_start(c: char) -> bool {
    let mut buf = [0; 4];
    OpKind::from_symbol(c.encode_utf8(&mut buf)).is_some()
}
