//! Request-text parser.

use thiserror::Error;

use crate::escape::read_string;
use crate::value::Sexp;

/// Deepest list nesting accepted in request text.
pub const MAX_DEPTH: usize = 256;

/// Syntax error raised while decoding request text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}")]
pub struct ParseError {
    /// Description of the failure.
    pub message: String,
    /// Byte offset in the input where the failure was detected.
    pub offset: usize,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Parses exactly one expression from `text`.
///
/// Leading and trailing whitespace is ignored; anything else after the first
/// expression is an error.
///
/// # Errors
///
/// Returns [`ParseError`] for empty input, unbalanced parentheses, malformed
/// string literals, empty keywords, lists nested deeper than [`MAX_DEPTH`]
/// and trailing input.
pub fn parse(text: &str) -> Result<Sexp, ParseError> {
    let mut parser = Parser::new(text);
    parser.skip_ws();
    if parser.eof() {
        return Err(ParseError::new("empty expression", parser.index));
    }
    let expr = parser.parse_expr()?;
    parser.skip_ws();
    if !parser.eof() {
        return Err(ParseError::new("trailing input after expression", parser.index));
    }
    Ok(expr)
}

struct Parser<'a> {
    src: &'a str,
    index: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    const fn new(src: &'a str) -> Self {
        Self {
            src,
            index: 0,
            depth: 0,
        }
    }

    const fn eof(&self) -> bool {
        self.index >= self.src.len()
    }

    fn current(&self) -> Option<char> {
        self.src.get(self.index..).and_then(|rest| rest.chars().next())
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current() {
            self.index += ch.len_utf8();
        }
    }

    fn skip_ws(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn parse_expr(&mut self) -> Result<Sexp, ParseError> {
        self.skip_ws();
        match self.current() {
            None => Err(ParseError::new("unexpected end of input", self.index)),
            Some('(') => self.parse_list(),
            Some(')') => Err(ParseError::new("unexpected ')'", self.index)),
            Some('"') => {
                let (value, end) = read_string(self.src, self.index)?;
                self.index = end;
                Ok(Sexp::String(value))
            }
            Some(':') => self.parse_keyword(),
            Some(_) => self.parse_atom(),
        }
    }

    fn parse_list(&mut self) -> Result<Sexp, ParseError> {
        let start = self.index;
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::new("expression nested too deeply", start));
        }
        self.depth += 1;
        self.advance();
        let items = self.parse_items(start);
        self.depth -= 1;
        items.map(Sexp::List)
    }

    fn parse_items(&mut self, start: usize) -> Result<Vec<Sexp>, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.current() {
                None => return Err(ParseError::new("unterminated list", start)),
                Some(')') => {
                    self.advance();
                    return Ok(items);
                }
                Some(_) => items.push(self.parse_expr()?),
            }
        }
    }

    fn parse_keyword(&mut self) -> Result<Sexp, ParseError> {
        let start = self.index;
        self.advance();
        let name = self.take_atom_text();
        if name.is_empty() {
            return Err(ParseError::new("empty keyword", start));
        }
        Ok(Sexp::Keyword(name.to_owned()))
    }

    fn parse_atom(&mut self) -> Result<Sexp, ParseError> {
        let start = self.index;
        let text = self.take_atom_text();
        if text.is_empty() {
            return Err(ParseError::new("unexpected character", start));
        }
        let looks_numeric = text
            .trim_start_matches(['-', '+'])
            .starts_with(|ch: char| ch.is_ascii_digit());
        if looks_numeric {
            return text
                .parse::<i64>()
                .map(Sexp::Number)
                .map_err(|_| ParseError::new(format!("invalid number '{text}'"), start));
        }
        Ok(Sexp::Symbol(text.to_owned()))
    }

    fn take_atom_text(&mut self) -> &'a str {
        let src = self.src;
        let start = self.index;
        while let Some(ch) = self.current() {
            if is_atom_char(ch) {
                self.advance();
            } else {
                break;
            }
        }
        src.get(start..self.index).unwrap_or_default()
    }
}

fn is_atom_char(ch: char) -> bool {
    !ch.is_whitespace() && !matches!(ch, '(' | ')' | '"' | ';')
}
