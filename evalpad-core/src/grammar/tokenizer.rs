//! State-stack tokenizer for Jinja2 templates.
//!
//! Never fails: any character it does not recognise becomes an
//! [`TokenKind::Invalid`] token and scanning continues. Tokens are
//! contiguous and cover the whole input, so a renderer can colour the
//! text by walking them in order.

use super::LanguageDefinition;

/// Deepest nesting level the depth overlay reports.
pub const MAX_DEPTH: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Text,
    Comment,
    /// `{{`, `}}` and their whitespace-control forms.
    ExpressionDelimiter,
    /// `{%`, `%}` and their whitespace-control forms.
    StatementDelimiter,
    /// The `%}` opening a raw block and the whole `{% endraw %}` tag.
    RawDelimiter,
    Keyword,
    /// Known filter or test name.
    Filter,
    /// Unknown test name after `is`.
    TypeIdentifier,
    Variable,
    String,
    Number,
    Operator,
    Delimiter,
    Whitespace,
    Invalid,
}

impl TokenKind {
    /// Editor-style scope name, without the language postfix.
    pub fn scope(self) -> &'static str {
        match self {
            TokenKind::Text => "",
            TokenKind::Comment => "comment.block",
            TokenKind::ExpressionDelimiter => "delimiter.brace-expression",
            TokenKind::StatementDelimiter => "delimiter.brace-statement",
            TokenKind::RawDelimiter => "delimiter.brace",
            TokenKind::Keyword => "keyword",
            TokenKind::Filter => "predefined",
            TokenKind::TypeIdentifier => "type.identifier",
            TokenKind::Variable => "variable",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::Operator => "operator",
            TokenKind::Delimiter => "delimiter",
            TokenKind::Whitespace => "white",
            TokenKind::Invalid => "invalid",
        }
    }

    fn merges(self) -> bool {
        matches!(self, TokenKind::Text | TokenKind::Comment | TokenKind::Whitespace)
    }
}

/// A run of source text. `start..end` are byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    /// Block nesting depth in templates, bracket depth in bare expressions.
    pub depth: u8,
}

impl Token {
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.start..self.end]
    }

    pub fn scope_name(&self, lang: &LanguageDefinition) -> String {
        let scope = self.kind.scope();
        if scope.is_empty() {
            String::new()
        } else {
            format!("{}{}", scope, lang.token_postfix)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Root,
    Comment,
    Output,
    Tag,
    RawBlock,
    /// Expression syntax with no enclosing delimiters (JSON panes).
    Bare,
}

pub struct Tokenizer<'l> {
    lang: &'l LanguageDefinition,
}

impl<'l> Tokenizer<'l> {
    pub fn new(lang: &'l LanguageDefinition) -> Self {
        Self { lang }
    }

    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        Scanner::new(self.lang, text, State::Root).run()
    }

    /// Tokenize `text` as one expression, e.g. a JSON document.
    pub fn tokenize_expression(&self, text: &str) -> Vec<Token> {
        Scanner::new(self.lang, text, State::Bare).run()
    }
}

struct Scanner<'t, 'l> {
    lang: &'l LanguageDefinition,
    text: &'t str,
    pos: usize,
    stack: Vec<State>,
    depth: u8,
    tokens: Vec<Token>,
    statement_start: bool,
    expect_test: bool,
}

impl<'t, 'l> Scanner<'t, 'l> {
    fn new(lang: &'l LanguageDefinition, text: &'t str, initial: State) -> Self {
        Self {
            lang,
            text,
            pos: 0,
            stack: vec![initial],
            depth: 0,
            tokens: Vec::new(),
            statement_start: false,
            expect_test: false,
        }
    }

    fn run(mut self) -> Vec<Token> {
        while self.pos < self.text.len() {
            match self.state() {
                State::Root => self.root(),
                State::Comment => self.comment(),
                State::Output => {
                    if let Some(len) = closer(self.rest(), "}}") {
                        self.emit(TokenKind::ExpressionDelimiter, len);
                        self.stack.pop();
                    } else {
                        self.expression(Some("}}"));
                    }
                }
                State::Tag => {
                    if let Some(len) = closer(self.rest(), "%}") {
                        self.emit(TokenKind::StatementDelimiter, len);
                        self.stack.pop();
                        self.statement_start = false;
                    } else {
                        self.expression(Some("%}"));
                    }
                }
                State::RawBlock => self.raw_block(),
                State::Bare => self.expression(None),
            }
        }
        self.tokens
    }

    fn state(&self) -> State {
        self.stack.last().copied().unwrap_or(State::Root)
    }

    fn rest(&self) -> &'t str {
        &self.text[self.pos..]
    }

    fn emit(&mut self, kind: TokenKind, len: usize) {
        self.emit_at_depth(kind, len, self.depth);
    }

    fn emit_at_depth(&mut self, kind: TokenKind, len: usize, depth: u8) {
        if len == 0 {
            return;
        }
        let start = self.pos;
        self.pos += len;

        if kind != TokenKind::Whitespace {
            self.statement_start = false;
        }

        if let Some(last) = self.tokens.last_mut() {
            if kind.merges() && last.kind == kind && last.end == start && last.depth == depth {
                last.end = self.pos;
                return;
            }
        }
        self.tokens.push(Token {
            kind,
            start,
            end: self.pos,
            depth,
        });
    }

    fn root(&mut self) {
        let rest = self.rest();
        if let Some(len) = opener(rest, "{#") {
            self.emit(TokenKind::Comment, len);
            self.stack.push(State::Comment);
        } else if let Some(len) = opener(rest, "{{") {
            self.emit(TokenKind::ExpressionDelimiter, len);
            self.stack.push(State::Output);
        } else if let Some(len) = opener(rest, "{%") {
            self.emit(TokenKind::StatementDelimiter, len);
            self.stack.push(State::Tag);
            self.statement_start = true;
        } else {
            let len = run_until(rest, |c| c == '{');
            self.emit(TokenKind::Text, len);
        }
    }

    fn comment(&mut self) {
        let rest = self.rest();
        if let Some(len) = closer(rest, "#}") {
            self.emit(TokenKind::Comment, len);
            self.stack.pop();
        } else {
            let len = run_until(rest, |c| c == '#' || c == '-');
            self.emit(TokenKind::Comment, len);
        }
    }

    fn raw_block(&mut self) {
        let rest = self.rest();
        if let Some(len) = endraw_len(rest) {
            self.depth = self.depth.saturating_sub(1);
            self.emit(TokenKind::RawDelimiter, len);
            self.stack.pop();
        } else {
            let len = run_until(rest, |c| c == '{');
            self.emit(TokenKind::Text, len);
        }
    }

    fn expression(&mut self, close: Option<&str>) {
        let rest = self.rest();
        let Some(c) = rest.chars().next() else {
            return;
        };

        if c.is_whitespace() {
            let len = leading_len(rest, char::is_whitespace);
            self.emit(TokenKind::Whitespace, len);
        } else if matches!(c, '"' | '\'' | '`') {
            match string_len(rest, c) {
                Some(len) => self.emit(TokenKind::String, len),
                None => self.emit(TokenKind::Invalid, c.len_utf8()),
            }
        } else if c.is_ascii_digit() {
            self.emit(TokenKind::Number, number_len(rest));
        } else if c == '|' {
            self.emit(TokenKind::Operator, 1);
            self.filter_name();
        } else if is_symbol(c) {
            self.symbols(close);
        } else if c.is_alphabetic() || c == '_' {
            self.word();
        } else if matches!(c, '{' | '[') && self.state() == State::Bare {
            let depth = self.depth;
            self.depth = (self.depth + 1).min(MAX_DEPTH);
            self.emit_at_depth(TokenKind::Delimiter, 1, depth);
        } else if matches!(c, '}' | ']') && self.state() == State::Bare {
            self.depth = self.depth.saturating_sub(1);
            self.emit(TokenKind::Delimiter, 1);
        } else if matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '.' | ',' | ';') {
            self.emit(TokenKind::Delimiter, 1);
        } else {
            self.emit(TokenKind::Invalid, c.len_utf8());
        }
    }

    fn filter_name(&mut self) {
        let ws = leading_len(self.rest(), char::is_whitespace);
        let after = &self.rest()[ws..];
        let name_len = identifier_len(after);
        if name_len == 0 {
            return;
        }
        let kind = if self.lang.is_filter(&after[..name_len]) {
            TokenKind::Filter
        } else {
            TokenKind::Variable
        };
        self.emit(TokenKind::Whitespace, ws);
        self.emit(kind, name_len);
    }

    fn symbols(&mut self, close: Option<&str>) {
        let rest = self.rest();
        let mut run = 0;
        for (i, c) in rest.char_indices() {
            if !is_symbol(c) || close.is_some_and(|close| closer(&rest[i..], close).is_some()) {
                break;
            }
            run = i + c.len_utf8();
        }

        // Longest known operator at the front of the run.
        let longest = (1..=run).rev().find(|&len| self.lang.is_operator(&rest[..len]));
        match longest {
            Some(len) => self.emit(TokenKind::Operator, len),
            None => self.emit(TokenKind::Invalid, 1),
        }
    }

    fn word(&mut self) {
        let rest = self.rest();
        let len = identifier_len(rest);
        let word = &rest[..len];
        let statement = self.statement_start && self.state() == State::Tag;

        if self.expect_test && word != "not" {
            self.expect_test = false;
            let kind = if self.lang.is_filter(word) {
                TokenKind::Filter
            } else {
                TokenKind::TypeIdentifier
            };
            self.emit(kind, len);
            return;
        }

        if !self.lang.is_keyword(word) {
            self.emit(TokenKind::Variable, len);
            return;
        }

        if word == "is" {
            self.expect_test = true;
        }

        if !statement {
            self.emit(TokenKind::Keyword, len);
            return;
        }

        if self.lang.is_block_opener(word) {
            let depth = self.depth;
            self.depth = (self.depth + 1).min(MAX_DEPTH);
            self.emit_at_depth(TokenKind::Keyword, len, depth);
            if word == "raw" {
                self.enter_raw();
            }
        } else if self.lang.block_closer_of(word).is_some() {
            self.depth = self.depth.saturating_sub(1);
            self.emit(TokenKind::Keyword, len);
        } else if self.lang.is_branch(word) {
            self.emit_at_depth(TokenKind::Keyword, len, self.depth.saturating_sub(1));
        } else {
            self.emit(TokenKind::Keyword, len);
        }
    }

    /// After `{% raw`: if the tag closes right away, the body up to
    /// `{% endraw %}` is literal text.
    fn enter_raw(&mut self) {
        let ws = leading_len(self.rest(), char::is_whitespace);
        if let Some(len) = closer(&self.rest()[ws..], "%}") {
            self.emit(TokenKind::Whitespace, ws);
            self.emit(TokenKind::RawDelimiter, len);
            self.stack.pop();
            self.stack.push(State::RawBlock);
        }
    }
}

/// `open` optionally followed by `-`.
fn opener(rest: &str, open: &str) -> Option<usize> {
    let after = rest.strip_prefix(open)?;
    Some(if after.starts_with('-') { open.len() + 1 } else { open.len() })
}

/// `close` optionally preceded by `-`.
fn closer(rest: &str, close: &str) -> Option<usize> {
    if rest.starts_with(close) {
        Some(close.len())
    } else if rest.strip_prefix('-').is_some_and(|r| r.starts_with(close)) {
        Some(close.len() + 1)
    } else {
        None
    }
}

/// `{% endraw %}` with optional whitespace control and spacing.
fn endraw_len(rest: &str) -> Option<usize> {
    let mut len = opener(rest, "{%")?;
    len += leading_len(&rest[len..], char::is_whitespace);
    if !rest[len..].starts_with("endraw") {
        return None;
    }
    len += "endraw".len();
    len += leading_len(&rest[len..], char::is_whitespace);
    closer(&rest[len..], "%}").map(|close| len + close)
}

/// Length up to (not including) the next char matching `stop`, always
/// covering at least the first char.
fn run_until(rest: &str, stop: impl Fn(char) -> bool) -> usize {
    let mut chars = rest.char_indices();
    let first = chars.next().map(|(_, c)| c.len_utf8()).unwrap_or(0);
    chars.find(|&(_, c)| stop(c)).map(|(i, _)| i).unwrap_or(rest.len()).max(first)
}

fn leading_len(rest: &str, pred: impl Fn(char) -> bool) -> usize {
    rest.char_indices()
        .find(|&(_, c)| !pred(c))
        .map(|(i, _)| i)
        .unwrap_or(rest.len())
}

fn identifier_len(rest: &str) -> usize {
    match rest.chars().next() {
        Some(c) if c.is_alphabetic() || c == '_' => leading_len(rest, |c| c.is_alphanumeric() || c == '_'),
        _ => 0,
    }
}

fn is_symbol(c: char) -> bool {
    matches!(c, '=' | '>' | '<' | '!' | '~' | '?' | ':' | '&' | '|' | '+' | '-' | '*' | '/' | '%' | '^')
}

/// Quoted string on a single line, with backslash escapes. `None` when
/// the line ends first.
fn string_len(rest: &str, quote: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in rest.char_indices().skip(1) {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '\n' => return None,
            c if c == quote => return Some(i + c.len_utf8()),
            _ => {}
        }
    }
    None
}

fn number_len(rest: &str) -> usize {
    let bytes = rest.as_bytes();
    let digits = |from: usize| from + bytes[from..].iter().take_while(|b| b.is_ascii_digit() || **b == b'_').count();

    let mut len = digits(0);
    if bytes.get(len) == Some(&b'.') && bytes.get(len + 1).is_some_and(u8::is_ascii_digit) {
        len = digits(len + 1);
    }
    if matches!(bytes.get(len), Some(b'e') | Some(b'E')) {
        let mut exp = len + 1;
        if matches!(bytes.get(exp), Some(b'+') | Some(b'-')) {
            exp += 1;
        }
        if bytes.get(exp).is_some_and(u8::is_ascii_digit) {
            len = digits(exp);
        }
    }
    len
}
