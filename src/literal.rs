//! Lenient mapping-literal extraction
//!
//! The survey platform embeds questionnaire answers as a string-encoded
//! mapping inside a larger text field (e.g. `"...{\"q1\": \"yes\"}"`), and
//! question order as a bracketed integer list (`"[3,1,2]"`). This module
//! locates the literal inside the surrounding text and parses it into typed
//! values without evaluating arbitrary expressions.
//!
//! The parser accepts single- or double-quoted keys and strings, integers,
//! floats, booleans and null. Anything else is a structured failure.

use crate::types::FieldValue;
use thiserror::Error;

/// Failures while extracting or parsing an embedded literal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiteralError {
    #[error("no brace-delimited mapping found in input")]
    NoMapping,

    #[error("no bracket-delimited list found in input")]
    NoList,

    #[error("unexpected character `{found}` at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },

    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),

    #[error("invalid number `{0}`")]
    InvalidNumber(String),

    #[error("unexpected end of input")]
    UnexpectedEnd,
}

/// Extract the first `{...}` substring and parse it as a flat mapping.
///
/// The span runs from the first `{` to the last `}` in the input, matching
/// how the platform wraps the mapping in prefix/suffix text. Pairs are
/// returned in source order.
pub fn extract_map(raw: &str) -> Result<Vec<(String, FieldValue)>, LiteralError> {
    let start = raw.find('{').ok_or(LiteralError::NoMapping)?;
    let end = raw.rfind('}').ok_or(LiteralError::NoMapping)?;
    if end <= start {
        return Err(LiteralError::NoMapping);
    }
    parse_map(&raw[start..=end])
}

/// Extract the first `[...]` substring and parse it as an integer list.
pub fn extract_int_list(raw: &str) -> Result<Vec<i64>, LiteralError> {
    let start = raw.find('[').ok_or(LiteralError::NoList)?;
    let end = raw.rfind(']').ok_or(LiteralError::NoList)?;
    if end <= start {
        return Err(LiteralError::NoList);
    }
    let inner = &raw[start + 1..end];
    let mut out = Vec::new();
    for part in inner.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let n = part
            .parse::<i64>()
            .map_err(|_| LiteralError::InvalidNumber(part.to_string()))?;
        out.push(n);
    }
    Ok(out)
}

fn parse_map(src: &str) -> Result<Vec<(String, FieldValue)>, LiteralError> {
    let mut p = Scanner::new(src);
    p.expect('{')?;
    let mut pairs = Vec::new();
    p.skip_ws();
    if p.peek() == Some('}') {
        return Ok(pairs);
    }
    loop {
        p.skip_ws();
        let key = p.parse_string()?;
        p.skip_ws();
        p.expect(':')?;
        p.skip_ws();
        let value = p.parse_value()?;
        pairs.push((key, value));
        p.skip_ws();
        match p.next() {
            Some(',') => continue,
            Some('}') => break,
            Some(c) => {
                return Err(LiteralError::UnexpectedChar {
                    found: c,
                    offset: p.pos - 1,
                })
            }
            None => return Err(LiteralError::UnexpectedEnd),
        }
    }
    Ok(pairs)
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
}

impl Scanner {
    fn new(src: &str) -> Self {
        Scanner {
            chars: src.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, want: char) -> Result<(), LiteralError> {
        match self.next() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(LiteralError::UnexpectedChar {
                found: c,
                offset: self.pos - 1,
            }),
            None => Err(LiteralError::UnexpectedEnd),
        }
    }

    /// Quoted string with either quote style; backslash escapes the next char.
    fn parse_string(&mut self) -> Result<String, LiteralError> {
        let start = self.pos;
        let quote = match self.next() {
            Some(q @ ('"' | '\'')) => q,
            Some(c) => {
                return Err(LiteralError::UnexpectedChar {
                    found: c,
                    offset: self.pos - 1,
                })
            }
            None => return Err(LiteralError::UnexpectedEnd),
        };
        let mut out = String::new();
        loop {
            match self.next() {
                Some('\\') => match self.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => return Err(LiteralError::UnterminatedString(start)),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(LiteralError::UnterminatedString(start)),
            }
        }
    }

    fn parse_value(&mut self) -> Result<FieldValue, LiteralError> {
        match self.peek() {
            Some('"' | '\'') => Ok(FieldValue::Text(self.parse_string()?)),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() => self.parse_word(),
            Some(c) => Err(LiteralError::UnexpectedChar {
                found: c,
                offset: self.pos,
            }),
            None => Err(LiteralError::UnexpectedEnd),
        }
    }

    fn parse_number(&mut self) -> Result<FieldValue, LiteralError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || "+-.eE".contains(c)) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if let Ok(i) = text.parse::<i64>() {
            return Ok(FieldValue::Integer(i));
        }
        text.parse::<f64>()
            .map(FieldValue::Number)
            .map_err(|_| LiteralError::InvalidNumber(text))
    }

    /// Bare words: booleans and null in both JSON and Python spellings.
    fn parse_word(&mut self) -> Result<FieldValue, LiteralError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "true" | "True" => Ok(FieldValue::Bool(true)),
            "false" | "False" => Ok(FieldValue::Bool(false)),
            "null" | "None" => Ok(FieldValue::Null),
            _ => Err(LiteralError::UnexpectedChar {
                found: word.chars().next().unwrap_or(' '),
                offset: start,
            }),
        }
    }
}
