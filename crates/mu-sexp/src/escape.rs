//! String-literal escaping and the matching lexer.

use crate::parser::ParseError;

/// Renders `text` as a double-quoted literal.
///
/// Quotes and backslashes are escaped, newline, carriage return and tab use
/// their mnemonic escapes, and every other control character becomes a
/// three-digit octal escape.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            control if control.is_control() => {
                // Every Cc code point is below 0o400, so three digits suffice.
                out.push_str(&format!("\\{:03o}", u32::from(control)));
            }
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Reads back a literal produced by [`escape`].
///
/// The whole input must be one literal, optionally surrounded by whitespace.
///
/// # Errors
///
/// Returns [`ParseError`] when the input is not a single well-formed literal.
pub fn parse_string_literal(text: &str) -> Result<String, ParseError> {
    let start = text.len() - text.trim_start().len();
    if !text.get(start..).is_some_and(|rest| rest.starts_with('"')) {
        return Err(ParseError::new("expected string literal", start));
    }
    let (value, end) = read_string(text, start)?;
    if !text.get(end..).unwrap_or_default().trim().is_empty() {
        return Err(ParseError::new("trailing input after string literal", end));
    }
    Ok(value)
}

/// Lexes the literal whose opening quote sits at byte `start`.
///
/// Returns the unescaped value and the byte offset just past the closing quote.
pub(crate) fn read_string(src: &str, start: usize) -> Result<(String, usize), ParseError> {
    let mut value = String::new();
    let mut chars = src.get(start + 1..).unwrap_or_default().char_indices();
    let offset = |relative: usize| start + 1 + relative;

    while let Some((index, ch)) = chars.next() {
        match ch {
            '"' => return Ok((value, offset(index) + 1)),
            '\\' => {
                let Some((escape_index, escaped)) = chars.next() else {
                    return Err(ParseError::new("incomplete escape", offset(index)));
                };
                match escaped {
                    '"' => value.push('"'),
                    '\\' => value.push('\\'),
                    'n' => value.push('\n'),
                    'r' => value.push('\r'),
                    't' => value.push('\t'),
                    '0'..='7' => {
                        let digits = src
                            .get(offset(escape_index)..offset(escape_index) + 3)
                            .filter(|digits| digits.bytes().all(|b| (b'0'..=b'7').contains(&b)))
                            .ok_or_else(|| {
                                ParseError::new("octal escape needs three digits", offset(index))
                            })?;
                        let code = u32::from_str_radix(digits, 8)
                            .map_err(|_| ParseError::new("invalid octal escape", offset(index)))?;
                        let decoded = char::from_u32(code)
                            .ok_or_else(|| ParseError::new("invalid octal escape", offset(index)))?;
                        value.push(decoded);
                        chars.next();
                        chars.next();
                    }
                    other => {
                        return Err(ParseError::new(
                            format!("unknown escape: \\{other}"),
                            offset(index),
                        ));
                    }
                }
            }
            other => value.push(other),
        }
    }

    Err(ParseError::new("unterminated string literal", start))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("plain", "\"plain\"")]
    #[case("say \"hi\"", "\"say \\\"hi\\\"\"")]
    #[case("C:\\mail", "\"C:\\\\mail\"")]
    #[case("line\nbreak", "\"line\\nbreak\"")]
    #[case("bell\u{7}", "\"bell\\007\"")]
    #[case("del\u{7f}", "\"del\\177\"")]
    #[case("caf\u{e9}", "\"caf\u{e9}\"")]
    fn escapes_special_characters(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(escape(input), expected);
    }

    #[test]
    fn reads_octal_escapes() {
        let value = parse_string_literal("\"a\\033[0m\"").expect("literal should parse");
        assert_eq!(value, "a\u{1b}[0m");
    }

    #[rstest]
    #[case("\"open")]
    #[case("\"bad \\q escape\"")]
    #[case("\"short \\01\"")]
    #[case("\"done\" extra")]
    #[case("bare")]
    fn rejects_malformed_literals(#[case] input: &str) {
        assert!(parse_string_literal(input).is_err(), "{input:?} should fail");
    }
}
