//! Recursive-descent parser for the style-sheet subset
//!
//! Grammar, informally:
//!
//! ```text
//! stylesheet  := rule*
//! rule        := selectors '{' (declaration | rule)* '}'
//! declaration := property ':' value (';' | before '}')
//! value       := space-list (',' space-list)*
//! space-list  := primary+
//! primary     := '(' ... ')' | '#' hex | string | number unit? | ident | ident '(' args ')'
//! ```
//!
//! `//` line comments and `/* */` block comments are allowed anywhere
//! whitespace is.
//!
//! Parentheses, call arguments and nested rules may be at most
//! [`MAX_NESTING_DEPTH`] levels deep.

use crate::compiler::ast::{Call, Declaration, Expr, LineIndex, Rule, RuleItem, Stylesheet};
use stylebind_runtime::interop::{alpha_to_wire, Color, Number, Separator, MAX_ENCODE_DEPTH};
use stylebind_runtime::TaggedValue;
use thiserror::Error;
use tracing::{debug, instrument};

/// Deepest nesting of parentheses, calls and rules; matches the encoder's
/// limit so every parsed value can be passed back out of a callback
pub const MAX_NESTING_DEPTH: usize = MAX_ENCODE_DEPTH;

/// Syntax error at a byte offset
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

#[instrument(skip(source), fields(source_len = source.len()))]
pub fn parse_stylesheet(source: &str) -> Result<Stylesheet, ParseError> {
    debug!("Parsing stylesheet");
    let result = Parser::new(source).parse();
    match &result {
        Ok(sheet) => debug!(rules = sheet.rules.len(), "Parsed stylesheet"),
        Err(e) => debug!(error = %e, offset = e.offset, "Failed to parse stylesheet"),
    }
    result
}

/// Parse a single value expression, as found after `property:`
pub fn parse_value(source: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(source);
    parser.skip_trivia()?;
    let value = parser.parse_comma_list()?;
    parser.skip_trivia()?;
    match parser.peek() {
        None => Ok(value),
        Some(ch) => Err(parser.unexpected(ch)),
    }
}

struct Parser<'src> {
    source: &'src str,
    pos: usize,
    depth: usize,
    index: LineIndex,
}

impl<'src> Parser<'src> {
    fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            depth: 0,
            index: LineIndex::new(source),
        }
    }

    fn parse(mut self) -> Result<Stylesheet, ParseError> {
        let mut rules = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.peek().is_none() {
                break;
            }
            rules.push(self.parse_rule()?);
        }
        Ok(Stylesheet { rules })
    }

    // ─────────────────────────────────────────────────────────────
    // Cursor helpers
    // ─────────────────────────────────────────────────────────────

    fn rest(&self) -> &'src str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected \"{}\".", expected)))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        self.error_at(self.pos, message)
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            offset,
        }
    }

    fn unexpected(&self, ch: char) -> ParseError {
        self.error(format!("invalid CSS: unexpected \"{}\".", ch))
    }

    /// Run `parse` one nesting level deeper
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error("nesting too deep."));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Skip whitespace and comments
    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();

            if trimmed.starts_with("//") {
                let len = trimmed.find('\n').unwrap_or(trimmed.len());
                self.pos += len;
            } else if trimmed.starts_with("/*") {
                let end = trimmed[2..]
                    .find("*/")
                    .ok_or_else(|| self.error("unterminated comment."))?;
                self.pos += end + 4;
            } else {
                return Ok(());
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Rules and declarations
    // ─────────────────────────────────────────────────────────────

    fn parse_rule(&mut self) -> Result<Rule, ParseError> {
        let start = self.pos;
        let selector_end = find_in_code(self.rest(), |c| matches!(c, '{' | ';' | '}'))
            .filter(|&i| self.rest()[i..].starts_with('{'))
            .ok_or_else(|| self.error("expected \"{\"."))?;

        let selectors: Vec<String> = strip_comments(&self.rest()[..selector_end])
            .split(',')
            .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|s| !s.is_empty())
            .collect();
        if selectors.is_empty() {
            return Err(self.error("expected selector."));
        }

        self.pos += selector_end + 1;
        let items = self.parse_block()?;

        Ok(Rule {
            selectors,
            items,
            location: self.index.location(self.source, start),
        })
    }

    /// Items up to and including the closing brace
    fn parse_block(&mut self) -> Result<Vec<RuleItem>, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                None => return Err(self.error("expected \"}\".")),
                Some('}') => {
                    self.bump();
                    return Ok(items);
                }
                Some(';') => {
                    self.bump();
                }
                Some(_) if self.next_is_rule() => {
                    items.push(RuleItem::Rule(self.nested(Self::parse_rule)?))
                }
                Some(_) => items.push(RuleItem::Declaration(self.parse_declaration()?)),
            }
        }
    }

    /// Whether a `{` comes before the next `;` or `}` at paren depth zero
    fn next_is_rule(&self) -> bool {
        let rest = self.rest();
        find_in_code(rest, |c| matches!(c, '{' | ';' | '}'))
            .map_or(false, |i| rest[i..].starts_with('{'))
    }

    fn parse_declaration(&mut self) -> Result<Declaration, ParseError> {
        let start = self.pos;
        let colon = find_in_code(self.rest(), |c| matches!(c, ':' | ';' | '{' | '}'))
            .filter(|&i| self.rest()[i..].starts_with(':'))
            .ok_or_else(|| self.error("expected \":\"."))?;

        let property = strip_comments(&self.rest()[..colon]).trim().to_string();
        if property.is_empty() || property.contains(char::is_whitespace) {
            return Err(self.error("invalid property name."));
        }
        self.pos += colon + 1;

        self.skip_trivia()?;
        let value = self.parse_comma_list()?;
        self.skip_trivia()?;

        match self.peek() {
            Some(';') => {
                self.bump();
            }
            Some('}') => {}
            _ => return Err(self.error("expected \";\".")),
        }

        Ok(Declaration {
            property,
            value,
            location: self.index.location(self.source, start),
        })
    }

    // ─────────────────────────────────────────────────────────────
    // Values
    // ─────────────────────────────────────────────────────────────

    fn at_value_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some(ch) => matches!(ch, ',' | ';' | '}' | '{' | ')' | ':'),
        }
    }

    fn parse_comma_list(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_space_list()?;
        let mut items = vec![first];
        let mut saw_comma = false;

        loop {
            self.skip_trivia()?;
            if !self.eat(',') {
                break;
            }
            saw_comma = true;
            self.skip_trivia()?;
            if self.at_value_end() {
                break;
            }
            items.push(self.parse_space_list()?);
        }

        if saw_comma {
            Ok(Expr::List {
                items,
                separator: Separator::Comma,
            })
        } else {
            Ok(Expr::list(items, Separator::Comma))
        }
    }

    fn parse_space_list(&mut self) -> Result<Expr, ParseError> {
        if self.at_value_end() {
            return Err(self.error("expected expression."));
        }
        let mut items = vec![self.parse_primary()?];
        loop {
            self.skip_trivia()?;
            if self.at_value_end() {
                break;
            }
            items.push(self.parse_primary()?);
        }
        Ok(Expr::list(items, Separator::Space))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let ch = match self.peek() {
            Some(ch) => ch,
            None => return Err(self.error("expected expression.")),
        };

        match ch {
            '(' => self.nested(Self::parse_parens),
            '#' => self.parse_hex_color(),
            '"' | '\'' => self.parse_quoted(),
            c if self.starts_number(c) => self.parse_number(),
            c if is_name_start(c) || c == '-' => self.parse_ident_or_call(),
            c => Err(self.unexpected(c)),
        }
    }

    fn starts_number(&self, ch: char) -> bool {
        match ch {
            '0'..='9' => true,
            '.' => self.peek_second().map_or(false, |c| c.is_ascii_digit()),
            '+' | '-' => match self.peek_second() {
                Some(c) if c.is_ascii_digit() => true,
                Some('.') => self.rest().chars().nth(2).map_or(false, |c| c.is_ascii_digit()),
                _ => false,
            },
            _ => false,
        }
    }

    /// `()`, `(a, b)`, `(k: v, k2: v2)` or a grouped expression
    fn parse_parens(&mut self) -> Result<Expr, ParseError> {
        self.expect('(')?;
        self.skip_trivia()?;
        if self.eat(')') {
            return Ok(Expr::Literal(TaggedValue::empty_list()));
        }

        let first = self.parse_space_list()?;
        self.skip_trivia()?;

        if self.eat(':') {
            self.skip_trivia()?;
            let value = self.parse_space_list()?;
            let mut entries = vec![(first, value)];
            loop {
                self.skip_trivia()?;
                if !self.eat(',') {
                    break;
                }
                self.skip_trivia()?;
                if self.peek() == Some(')') {
                    break;
                }
                let key = self.parse_space_list()?;
                self.skip_trivia()?;
                self.expect(':')?;
                self.skip_trivia()?;
                let value = self.parse_space_list()?;
                entries.push((key, value));
            }
            self.expect(')')?;
            return Ok(Expr::Map(entries));
        }

        let mut items = vec![first];
        let mut saw_comma = false;
        loop {
            self.skip_trivia()?;
            if !self.eat(',') {
                break;
            }
            saw_comma = true;
            self.skip_trivia()?;
            if self.peek() == Some(')') {
                break;
            }
            items.push(self.parse_space_list()?);
        }
        self.expect(')')?;

        if saw_comma {
            Ok(Expr::List {
                items,
                separator: Separator::Comma,
            })
        } else {
            Ok(Expr::list(items, Separator::Comma))
        }
    }

    fn parse_hex_color(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos;
        self.expect('#')?;
        let digits_len = self
            .rest()
            .find(|c: char| !c.is_ascii_hexdigit())
            .unwrap_or(self.rest().len());
        let digits = &self.rest()[..digits_len];
        self.pos += digits_len;

        if self.peek().map_or(false, is_name_char) {
            return Err(self.error_at(start, "invalid hex color."));
        }

        hex_color(digits)
            .map(|color| Expr::Literal(TaggedValue::Color(color)))
            .ok_or_else(|| self.error_at(start, "invalid hex color."))
    }

    fn parse_quoted(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos;
        let quote = self.bump().unwrap_or('"');
        let mut text = String::new();

        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error_at(start, "unterminated string.")),
                Some('\\') => match self.bump() {
                    Some(escaped) => text.push(escaped),
                    None => return Err(self.error_at(start, "unterminated string.")),
                },
                Some(c) if c == quote => break,
                Some(c) => text.push(c),
            }
        }

        Ok(Expr::Literal(TaggedValue::quoted(text)))
    }

    fn parse_number(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos;
        if matches!(self.peek(), Some('+' | '-')) {
            self.bump();
        }
        self.skip_digits();
        if self.peek() == Some('.') && self.peek_second().map_or(false, |c| c.is_ascii_digit()) {
            self.bump();
            self.skip_digits();
        }

        let magnitude: f64 = self.source[start..self.pos]
            .parse()
            .map_err(|_| self.error_at(start, "invalid number."))?;

        let unit_start = self.pos;
        if !self.eat('%') {
            while self.peek().map_or(false, |c| c.is_ascii_alphabetic()) {
                self.bump();
            }
        }
        let unit = &self.source[unit_start..self.pos];

        Ok(Expr::Literal(TaggedValue::Number(Number::new(magnitude, unit))))
    }

    fn skip_digits(&mut self) {
        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.bump();
        }
    }

    fn parse_ident_or_call(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos;
        if self.peek() == Some('-') && !self.peek_second().map_or(false, |c| is_name_start(c) || c == '-') {
            return Err(self.unexpected('-'));
        }
        while self.peek().map_or(false, is_name_char) {
            self.bump();
        }
        let name = &self.source[start..self.pos];

        if self.peek() == Some('(') {
            let args = self.nested(Self::parse_call_args)?;
            return Ok(Expr::Call(Call {
                name: name.to_string(),
                args,
                location: self.index.location(self.source, start),
            }));
        }

        let value = match name {
            "null" => TaggedValue::Null,
            "true" => TaggedValue::Bool(true),
            "false" => TaggedValue::Bool(false),
            other => TaggedValue::unquoted(other),
        };
        Ok(Expr::Literal(value))
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect('(')?;
        let mut args = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.eat(')') {
                return Ok(args);
            }
            args.push(self.parse_space_list()?);
            self.skip_trivia()?;
            if !self.eat(',') {
                self.skip_trivia()?;
                self.expect(')')?;
                return Ok(args);
            }
        }
    }
}

/// One step of a scan over source text
enum Piece {
    Code(char),
    /// Part of a quoted string, delimiters included
    Quoted,
    Comment,
}

/// Walks source text the way the parser sees it: quoted strings are opaque
/// and each comment is a single piece
struct Pieces<'src> {
    text: &'src str,
    pos: usize,
    quote: Option<char>,
}

impl<'src> Pieces<'src> {
    fn new(text: &'src str) -> Self {
        Self {
            text,
            pos: 0,
            quote: None,
        }
    }
}

impl Iterator for Pieces<'_> {
    /// Byte range and kind
    type Item = (usize, usize, Piece);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.pos;
        let rest = &self.text[start..];
        let ch = rest.chars().next()?;

        let (len, piece) = match self.quote {
            Some(quote) => {
                let mut len = ch.len_utf8();
                if ch == '\\' {
                    len += rest[1..].chars().next().map_or(0, char::len_utf8);
                } else if ch == quote {
                    self.quote = None;
                }
                (len, Piece::Quoted)
            }
            // Unterminated comments run to the end; `skip_trivia` reports them
            None if rest.starts_with("/*") => (
                rest[2..].find("*/").map_or(rest.len(), |end| end + 4),
                Piece::Comment,
            ),
            None if rest.starts_with("//") => {
                (rest.find('\n').unwrap_or(rest.len()), Piece::Comment)
            }
            None if ch == '"' || ch == '\'' => {
                self.quote = Some(ch);
                (1, Piece::Quoted)
            }
            None => (ch.len_utf8(), Piece::Code(ch)),
        };

        self.pos += len;
        Some((start, self.pos, piece))
    }
}

/// Byte offset of the first code character at paren depth zero matching `stop`
fn find_in_code(text: &str, stop: impl Fn(char) -> bool) -> Option<usize> {
    let mut depth = 0usize;
    for (start, _, piece) in Pieces::new(text) {
        match piece {
            Piece::Code(c) if depth == 0 && stop(c) => return Some(start),
            Piece::Code('(') => depth += 1,
            Piece::Code(')') => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    None
}

/// `text` with every comment replaced by a space
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (start, end, piece) in Pieces::new(text) {
        match piece {
            Piece::Comment => out.push(' '),
            Piece::Code(_) | Piece::Quoted => out.push_str(&text[start..end]),
        }
    }
    out
}

/// `rgb`, `rrggbb` or `rrggbbaa`
fn hex_color(digits: &str) -> Option<Color> {
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    let short = |i: usize| channel(&digits[i..i + 1].repeat(2));

    match digits.len() {
        3 => Some(Color::rgb(short(0)?, short(1)?, short(2)?)),
        6 => Some(Color::rgb(
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
        )),
        8 => Some(Color::rgba(
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
            alpha_to_wire(channel(&digits[6..8])?),
        )),
        _ => None,
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}
