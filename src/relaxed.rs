//! Relaxed JSON (JSON5) rewritten as strict JSON.
//!
//! The rewrite keeps number literals as text, so a relaxed document decodes
//! with the same integer and float handling as a strict one. Accepted on
//! top of JSON: `//` and `/* */` comments, trailing commas, unquoted
//! (identifier) keys, single quoted strings, the JSON5 string escapes,
//! hexadecimal integers, a leading `+` and leading or trailing decimal
//! points. `Infinity` and `NaN` are rejected.

use crate::error::ParseError;

/// Deepest nesting the rewrite accepts.
const MAX_DEPTH: usize = 128;

/// Rewrites `text` as strict JSON.
///
/// # Errors
///
/// Returns [`ParseError::Syntax`] with the 1-based position of the first
/// offending character.
pub(crate) fn to_strict_json(text: &str) -> Result<String, ParseError> {
    let mut rewriter = Rewriter {
        chars: text.chars().collect(),
        pos: 0,
        depth: 0,
        out: String::with_capacity(text.len()),
    };
    rewriter.skip_trivia()?;
    rewriter.value()?;
    rewriter.skip_trivia()?;
    if rewriter.peek().is_some() {
        return Err(rewriter.error("trailing characters after the document"));
    }
    Ok(rewriter.out)
}

struct Rewriter {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
    out: String,
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    is_identifier_start(c) || c.is_alphanumeric() || c == '\u{200c}' || c == '\u{200d}'
}

impl Rewriter {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let consumed = &self.chars[..self.pos.min(self.chars.len())];
        let line = consumed.iter().filter(|&&c| c == '\n').count() + 1;
        let column = consumed.iter().rev().take_while(|&&c| c != '\n').count() + 1;
        ParseError::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    fn unexpected(&self) -> ParseError {
        match self.peek() {
            Some(c) => self.error(format!("unexpected character '{}'", c.escape_debug())),
            None => self.error("unexpected end of input"),
        }
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() || c == '\u{feff}' => {
                    self.pos += 1;
                }
                (Some('/'), Some('/')) => {
                    while self.peek().is_some_and(|c| !is_line_terminator(c)) {
                        self.pos += 1;
                    }
                }
                (Some('/'), Some('*')) => {
                    self.pos += 2;
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some('*'), Some('/')) => {
                                self.pos += 2;
                                break;
                            }
                            (Some(_), _) => self.pos += 1,
                            (None, _) => return Err(self.error("unterminated block comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn value(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            Some('{') => self.nested(Self::object),
            Some('[') => self.nested(Self::array),
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let text = self.string(quote)?;
                self.push_string(&text);
                Ok(())
            }
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.number(),
            Some(c) if is_identifier_start(c) => self.literal(),
            _ => Err(self.unexpected()),
        }
    }

    fn nested(&mut self, body: fn(&mut Self) -> Result<(), ParseError>) -> Result<(), ParseError> {
        if self.depth == MAX_DEPTH {
            return Err(self.error("document is nested too deeply"));
        }
        self.depth += 1;
        body(self)?;
        self.depth -= 1;
        Ok(())
    }

    fn object(&mut self) -> Result<(), ParseError> {
        self.pos += 1;
        self.out.push('{');
        self.skip_trivia()?;
        if self.peek() == Some('}') {
            self.pos += 1;
            self.out.push('}');
            return Ok(());
        }
        loop {
            self.key()?;
            self.skip_trivia()?;
            if self.peek() != Some(':') {
                return Err(self.error("expected ':' after property name"));
            }
            self.pos += 1;
            self.out.push(':');
            self.skip_trivia()?;
            self.value()?;
            if self.close_or_continue('}')? {
                return Ok(());
            }
        }
    }

    /// After a member: consumes `,` (and a trailing `close`) or `close`.
    /// Returns `true` once the container is closed.
    fn close_or_continue(&mut self, close: char) -> Result<bool, ParseError> {
        self.skip_trivia()?;
        match self.peek() {
            Some(',') => {
                self.pos += 1;
                self.skip_trivia()?;
                if self.peek() == Some(close) {
                    self.pos += 1;
                    self.out.push(close);
                    return Ok(true);
                }
                self.out.push(',');
                Ok(false)
            }
            Some(c) if c == close => {
                self.pos += 1;
                self.out.push(close);
                Ok(true)
            }
            _ => Err(self.error(format!("expected ',' or '{close}'"))),
        }
    }

    fn key(&mut self) -> Result<(), ParseError> {
        let key = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                self.string(quote)?
            }
            Some(c) if is_identifier_start(c) || c == '\\' => self.identifier()?,
            None => return Err(self.unexpected()),
            Some(_) => return Err(self.error("expected a property name")),
        };
        self.push_string(&key);
        Ok(())
    }

    fn array(&mut self) -> Result<(), ParseError> {
        self.pos += 1;
        self.out.push('[');
        self.skip_trivia()?;
        if self.peek() == Some(']') {
            self.pos += 1;
            self.out.push(']');
            return Ok(());
        }
        loop {
            self.value()?;
            if self.close_or_continue(']')? {
                return Ok(());
            }
        }
    }

    /// Decodes a string body; the opening quote is already consumed.
    fn string(&mut self, quote: char) -> Result<String, ParseError> {
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(text),
                Some('\n' | '\r') => return Err(self.error("unterminated string")),
                Some('\\') => {
                    if let Some(c) = self.escape()? {
                        text.push(c);
                    }
                }
                Some(c) => text.push(c),
            }
        }
    }

    /// Decodes the escape after a backslash. Line continuations yield `None`.
    fn escape(&mut self) -> Result<Option<char>, ParseError> {
        let c = match self.bump() {
            None => return Err(self.error("unterminated string")),
            Some(c) => c,
        };
        let decoded = match c {
            'b' => '\u{8}',
            'f' => '\u{c}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\u{b}',
            '0' if !self.peek().is_some_and(|c| c.is_ascii_digit()) => '\0',
            '0'..='9' => return Err(self.error("invalid escape: octal escapes are not allowed")),
            'x' => {
                let value = self.hex_digits(2)?;
                char::from_u32(value).ok_or_else(|| self.error("invalid \\x escape"))?
            }
            'u' => self.unicode_escape()?,
            '\r' => {
                if self.peek() == Some('\n') {
                    self.pos += 1;
                }
                return Ok(None);
            }
            '\n' | '\u{2028}' | '\u{2029}' => return Ok(None),
            other => other,
        };
        Ok(Some(decoded))
    }

    fn hex_digits(&mut self, count: usize) -> Result<u32, ParseError> {
        let mut value = 0;
        for _ in 0..count {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("invalid hexadecimal escape"))?;
            value = value * 16 + digit;
        }
        Ok(value)
    }

    /// `\uXXXX`, joining a surrogate pair written as two escapes.
    fn unicode_escape(&mut self) -> Result<char, ParseError> {
        let high = self.hex_digits(4)?;
        if (0xDC00..=0xDFFF).contains(&high) {
            return Err(self.error("unpaired surrogate in \\u escape"));
        }
        if !(0xD800..=0xDBFF).contains(&high) {
            return char::from_u32(high).ok_or_else(|| self.error("invalid \\u escape"));
        }

        if self.peek() != Some('\\') || self.peek_at(1) != Some('u') {
            return Err(self.error("unpaired surrogate in \\u escape"));
        }
        self.pos += 2;
        let low = self.hex_digits(4)?;
        if !(0xDC00..=0xDFFF).contains(&low) {
            return Err(self.error("unpaired surrogate in \\u escape"));
        }
        let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
        char::from_u32(code).ok_or_else(|| self.error("invalid \\u escape"))
    }

    fn identifier(&mut self) -> Result<String, ParseError> {
        let mut name = String::new();
        loop {
            match self.peek() {
                Some('\\') => {
                    self.pos += 1;
                    if self.bump() != Some('u') {
                        return Err(self.error("expected \\u escape in property name"));
                    }
                    name.push(self.unicode_escape()?);
                }
                Some(c) if is_identifier_part(c) => {
                    self.pos += 1;
                    name.push(c);
                }
                _ => return Ok(name),
            }
        }
    }

    fn literal(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let word = self.identifier()?;
        match word.as_str() {
            "null" | "true" | "false" => {
                self.out.push_str(&word);
                Ok(())
            }
            "Infinity" | "NaN" => {
                self.pos = start;
                Err(self.error(format!("non-finite number {word} is not supported")))
            }
            _ => {
                self.pos = start;
                Err(self.error(format!("unexpected identifier '{word}'")))
            }
        }
    }

    fn digits(&mut self, radix: u32) -> String {
        let mut digits = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_digit(radix)) {
            self.pos += 1;
            digits.push(c);
        }
        digits
    }

    fn number(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let negative = match self.peek() {
            Some('-') => {
                self.pos += 1;
                true
            }
            Some('+') => {
                self.pos += 1;
                false
            }
            _ => false,
        };
        let sign = if negative { "-" } else { "" };

        if self.peek().is_some_and(is_identifier_start) {
            let word = self.identifier()?;
            self.pos = start;
            return Err(match word.as_str() {
                "Infinity" | "NaN" => {
                    self.error(format!("non-finite number {word} is not supported"))
                }
                _ => self.error("invalid number"),
            });
        }

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.pos += 2;
            let digits = self.digits(16);
            let value = u128::from_str_radix(&digits, 16)
                .map_err(|_| self.error("invalid hexadecimal number"))?;
            self.out.push_str(sign);
            self.out.push_str(&value.to_string());
            return Ok(());
        }

        let integer = self.digits(10);
        if integer.len() > 1 && integer.starts_with('0') {
            return Err(self.error("leading zeros are not allowed"));
        }

        let mut fraction = None;
        if self.peek() == Some('.') {
            self.pos += 1;
            fraction = Some(self.digits(10));
        }
        if integer.is_empty() && fraction.as_deref().is_none_or(str::is_empty) {
            return Err(self.error("invalid number"));
        }

        let mut exponent = String::new();
        if matches!(self.peek(), Some('e' | 'E')) {
            self.pos += 1;
            exponent.push('e');
            if let Some(c @ ('+' | '-')) = self.peek() {
                self.pos += 1;
                exponent.push(c);
            }
            let digits = self.digits(10);
            if digits.is_empty() {
                return Err(self.error("missing exponent digits"));
            }
            exponent.push_str(&digits);
        }

        self.out.push_str(sign);
        self.out.push_str(if integer.is_empty() { "0" } else { &integer });
        if let Some(fraction) = fraction {
            self.out.push('.');
            self.out.push_str(if fraction.is_empty() { "0" } else { &fraction });
        }
        self.out.push_str(&exponent);
        Ok(())
    }

    fn push_string(&mut self, text: &str) {
        self.out.push('"');
        for c in text.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                c if (c as u32) < 0x20 => self.out.push_str(&format!("\\u{:04x}", c as u32)),
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }
}
