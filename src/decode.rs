//! Lenient decoding of JavaScript object literals into JSON values.
//!
//! Embedded page data is usually valid JSON, but older inline scripts carry
//! plain JS literals: unquoted keys, single-quoted strings, trailing commas,
//! comments and `"a" + "b"` concatenations. The decoder rewrites those into
//! strict JSON text and hands it to `serde_json`. It does not attempt to
//! cover the JS expression grammar beyond that.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),

    #[error("unterminated comment starting at offset {0}")]
    UnterminatedComment(usize),

    #[error("unexpected character {ch:?} at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unsupported identifier `{0}`")]
    UnexpectedIdentifier(String),

    #[error("invalid number literal `{0}`")]
    InvalidNumber(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Turns script text into a JSON value.
pub trait ScriptDecoder {
    fn decode(&self, source: &str) -> Result<Value, DecodeError>;
}

/// Default decoder: strict JSON first, tolerant rewrite second.
#[derive(Debug, Default, Clone, Copy)]
pub struct LenientDecoder;

impl ScriptDecoder for LenientDecoder {
    fn decode(&self, source: &str) -> Result<Value, DecodeError> {
        if let Ok(value) = serde_json::from_str(source) {
            return Ok(value);
        }
        let json = to_strict_json(source)?;
        Ok(serde_json::from_str(&json)?)
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open(char),
    Close(char),
    Colon,
    Comma,
    Plus,
    Minus,
    Str(String),
    Num(String),
    Ident(String),
}

fn tokenize(source: &str) -> Result<Vec<Token>, DecodeError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            ';' => i += 1,
            '{' | '[' => {
                tokens.push(Token::Open(c));
                i += 1;
            }
            '}' | ']' => {
                tokens.push(Token::Close(c));
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '/' if matches!(chars.get(i + 1), Some((_, '/'))) => {
                while i < chars.len() && chars[i].1 != '\n' {
                    i += 1;
                }
            }
            '/' if matches!(chars.get(i + 1), Some((_, '*'))) => {
                i += 2;
                loop {
                    match (chars.get(i), chars.get(i + 1)) {
                        (Some((_, '*')), Some((_, '/'))) => {
                            i += 2;
                            break;
                        }
                        (Some(_), _) => i += 1,
                        (None, _) => return Err(DecodeError::UnterminatedComment(offset)),
                    }
                }
            }
            '"' | '\'' => {
                let (text, next) = read_string(&chars, i)?;
                tokens.push(Token::Str(text));
                i = next;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].1.is_ascii_alphanumeric() || matches!(chars[i].1, '.' | '_'))
                {
                    // exponent sign
                    if matches!(chars[i].1, 'e' | 'E')
                        && matches!(chars.get(i + 1), Some((_, '+' | '-')))
                        && !is_hex_prefix(&chars, start)
                    {
                        i += 1;
                    }
                    i += 1;
                }
                let literal: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                tokens.push(Token::Num(literal));
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].1.is_alphanumeric() || matches!(chars[i].1, '_' | '$'))
                {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                tokens.push(Token::Ident(ident));
            }
            ch => return Err(DecodeError::UnexpectedChar { ch, offset }),
        }
    }

    Ok(tokens)
}

fn is_hex_prefix(chars: &[(usize, char)], start: usize) -> bool {
    matches!(
        (chars.get(start), chars.get(start + 1)),
        (Some((_, '0')), Some((_, 'x' | 'X')))
    )
}

/// Reads a quoted string starting at `start`, returning the unescaped text
/// and the index just past the closing quote.
fn read_string(chars: &[(usize, char)], start: usize) -> Result<(String, usize), DecodeError> {
    let (offset, quote) = chars[start];
    let mut text = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i].1;
        if c == quote {
            return Ok((text, i + 1));
        }
        if c != '\\' {
            text.push(c);
            i += 1;
            continue;
        }

        let Some(&(_, escaped)) = chars.get(i + 1) else {
            break;
        };
        i += 2;
        match escaped {
            'n' => text.push('\n'),
            't' => text.push('\t'),
            'r' => text.push('\r'),
            'b' => text.push('\u{8}'),
            'f' => text.push('\u{c}'),
            'v' => text.push('\u{b}'),
            '0' => text.push('\0'),
            'u' | 'x' => {
                let width = if escaped == 'u' { 4 } else { 2 };
                let hex: String = chars.iter().skip(i).take(width).map(|(_, c)| *c).collect();
                match u32::from_str_radix(&hex, 16) {
                    Ok(code) if hex.len() == width => {
                        i += width;
                        if (0xD800..0xDC00).contains(&code) {
                            // surrogate pair written as two \u escapes
                            let low: String =
                                chars.iter().skip(i + 2).take(4).map(|(_, c)| *c).collect();
                            let is_pair = matches!(chars.get(i), Some((_, '\\')))
                                && matches!(chars.get(i + 1), Some((_, 'u')));
                            match u32::from_str_radix(&low, 16) {
                                Ok(low_code) if is_pair && (0xDC00..0xE000).contains(&low_code) => {
                                    i += 6;
                                    let combined =
                                        0x10000 + ((code - 0xD800) << 10) + (low_code - 0xDC00);
                                    text.extend(char::from_u32(combined));
                                }
                                _ => text.push('\u{FFFD}'),
                            }
                        } else {
                            text.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                        }
                    }
                    _ => text.push(escaped),
                }
            }
            // line continuation
            '\n' => {}
            other => text.push(other),
        }
    }

    Err(DecodeError::UnterminatedString(offset))
}

// ============================================================================
// Rewriting
// ============================================================================

fn normalize_number(literal: &str, negative: bool) -> Result<String, DecodeError> {
    let sign = if negative { "-" } else { "" };
    let lower = literal.to_ascii_lowercase();

    if let Some(hex) = lower.strip_prefix("0x") {
        let value = i64::from_str_radix(hex, 16)
            .map_err(|_| DecodeError::InvalidNumber(literal.to_string()))?;
        return Ok(format!("{sign}{value}"));
    }

    let mut text = lower.replace('_', "");
    if text.starts_with('.') {
        text.insert(0, '0');
    }
    if text.ends_with('.') {
        text.pop();
    }
    if text.parse::<f64>().is_err() {
        return Err(DecodeError::InvalidNumber(literal.to_string()));
    }
    // JSON forbids leading zeros such as `007`.
    let trimmed = text.trim_start_matches('0');
    let text = if trimmed.is_empty() || trimmed.starts_with('.') || trimmed.starts_with('e') {
        format!("0{trimmed}")
    } else {
        trimmed.to_string()
    };
    Ok(format!("{sign}{text}"))
}

fn literal_for_ident(ident: &str) -> Result<&'static str, DecodeError> {
    match ident {
        "true" => Ok("true"),
        "false" => Ok("false"),
        "null" | "undefined" | "NaN" | "Infinity" => Ok("null"),
        other => Err(DecodeError::UnexpectedIdentifier(other.to_string())),
    }
}

/// Rewrites a JS object literal into strict JSON text.
pub fn to_strict_json(source: &str) -> Result<String, DecodeError> {
    let tokens = tokenize(source)?;
    let mut out = String::with_capacity(source.len());
    let mut i = 0;

    while i < tokens.len() {
        let is_key = matches!(tokens.get(i + 1), Some(Token::Colon));
        match &tokens[i] {
            Token::Open(c) | Token::Close(c) => out.push(*c),
            Token::Colon => out.push(':'),
            Token::Comma => {
                // trailing commas and array holes
                if !matches!(tokens.get(i + 1), None | Some(Token::Close(_) | Token::Comma)) {
                    out.push(',');
                }
            }
            Token::Plus => {}
            Token::Minus => match tokens.get(i + 1) {
                Some(Token::Num(literal)) => {
                    out.push_str(&normalize_number(literal, true)?);
                    i += 1;
                }
                Some(Token::Ident(ident)) if ident == "Infinity" => {
                    out.push_str("null");
                    i += 1;
                }
                _ => return Err(DecodeError::UnexpectedIdentifier("-".to_string())),
            },
            Token::Str(first) => {
                let mut text = first.clone();
                while let (Some(Token::Plus), Some(Token::Str(next))) =
                    (tokens.get(i + 1), tokens.get(i + 2))
                {
                    text.push_str(next);
                    i += 2;
                }
                out.push_str(&serde_json::to_string(&text)?);
            }
            Token::Num(literal) if is_key => {
                out.push_str(&serde_json::to_string(literal)?);
            }
            Token::Num(literal) => out.push_str(&normalize_number(literal, false)?),
            Token::Ident(ident) if is_key => out.push_str(&serde_json::to_string(ident)?),
            Token::Ident(ident) => out.push_str(literal_for_ident(ident)?),
        }
        i += 1;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(source: &str) -> Value {
        LenientDecoder.decode(source).unwrap()
    }

    #[test]
    fn test_strict_json_passes_through() {
        assert_eq!(decode(r#"{"a": [1, 2], "b": null}"#), json!({"a": [1, 2], "b": null}));
    }

    #[test]
    fn test_unquoted_keys_and_single_quotes() {
        assert_eq!(
            decode("{title: 'It\\'s \"here\"', count: 3}"),
            json!({"title": "It's \"here\"", "count": 3})
        );
    }

    #[test]
    fn test_trailing_commas_and_comments() {
        let source = "{\n  // the list\n  items: [1, 2, ],\n  /* flag */ done: true,\n}";
        assert_eq!(decode(source), json!({"items": [1, 2], "done": true}));
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(
            decode(r#"{url: "https://x.example.com" + "/album/a"}"#),
            json!({"url": "https://x.example.com/album/a"})
        );
    }

    #[test]
    fn test_js_only_literals() {
        assert_eq!(
            decode("{a: undefined, b: -Infinity, c: .5, d: 0x1F, e: -2}"),
            json!({"a": null, "b": null, "c": 0.5, "d": 31, "e": -2})
        );
    }

    #[test]
    fn test_escapes() {
        assert_eq!(decode(r"{s: 'café \x41'}"), json!({"s": "café A"}));
        assert_eq!(decode(r"{s: '\uD83C\uDFB5'}"), json!({"s": "\u{1F3B5}"}));
    }

    #[test]
    fn test_nested_numeric_keys() {
        assert_eq!(
            decode("{sellers: {123: {name: 'Label'}}}"),
            json!({"sellers": {"123": {"name": "Label"}}})
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            LenientDecoder.decode("{a: 'open"),
            Err(DecodeError::UnterminatedString(_))
        ));
        assert!(matches!(
            LenientDecoder.decode("{a: someCall()}"),
            Err(DecodeError::UnexpectedIdentifier(_)) | Err(DecodeError::UnexpectedChar { .. })
        ));
        assert!(LenientDecoder.decode("{a: 1").is_err());
    }
}
