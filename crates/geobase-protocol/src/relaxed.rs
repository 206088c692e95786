//! Lenient JSON as typed by people in a browser console.
//!
//! Accepted on top of strict JSON:
//!
//! - bare identifiers, as keys or values: `{type: bus}` is `{"type": "bus"}`
//!   (`true`, `false` and `null` keep their meaning)
//! - single-quoted strings
//! - a trailing comma before `}` or `]`
//! - `//` line and `/* */` block comments
//!
//! The input is rewritten to strict JSON and handed to `serde_json`.

use std::iter::Peekable;
use std::str::Chars;

use serde_json::Value;

use crate::ProtocolError;

/// Parses a relaxed JSON document.
pub fn parse(input: &str) -> Result<Value, ProtocolError> {
    let strict = to_strict(input)?;
    serde_json::from_str(&strict).map_err(|e| ProtocolError::InvalidBody(e.to_string()))
}

/// Rewrites relaxed JSON into strict JSON without validating structure.
pub fn to_strict(input: &str) -> Result<String, ProtocolError> {
    let mut out = String::with_capacity(input.len() + 16);
    let mut chars = input.chars().peekable();
    let mut pending_comma = false;

    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            out.push(c);
            continue;
        }
        if c == '/' && skip_comment(&mut chars)? {
            continue;
        }
        if c == ',' {
            if pending_comma {
                // `,,` is not valid JSON either; let serde_json report it.
                out.push(',');
            }
            pending_comma = true;
            continue;
        }
        if pending_comma {
            if c != '}' && c != ']' {
                out.push(',');
            }
            pending_comma = false;
        }

        match c {
            '"' => copy_double_quoted(&mut chars, &mut out)?,
            '\'' => convert_single_quoted(&mut chars, &mut out)?,
            c if is_ident_start(c) => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !is_ident_continue(next) {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                match word.as_str() {
                    "true" | "false" | "null" => out.push_str(&word),
                    _ => {
                        out.push('"');
                        out.push_str(&word);
                        out.push('"');
                    }
                }
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                if c != '+' {
                    out.push(c);
                }
                while let Some(&next) = chars.peek() {
                    if !(next.is_ascii_alphanumeric() || matches!(next, '.' | '+' | '-')) {
                        break;
                    }
                    out.push(next);
                    chars.next();
                }
            }
            other => out.push(other),
        }
    }

    if pending_comma {
        out.push(',');
    }
    Ok(out)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Consumes a comment whose leading `/` was already read. Returns `false`
/// (consuming nothing) when the slash does not start a comment.
fn skip_comment(chars: &mut Peekable<Chars<'_>>) -> Result<bool, ProtocolError> {
    match chars.peek() {
        Some('/') => {
            for c in chars.by_ref() {
                if c == '\n' {
                    break;
                }
            }
            Ok(true)
        }
        Some('*') => {
            chars.next();
            let mut previous = '\0';
            for c in chars.by_ref() {
                if previous == '*' && c == '/' {
                    return Ok(true);
                }
                previous = c;
            }
            Err(ProtocolError::InvalidBody("unterminated comment".into()))
        }
        _ => Ok(false),
    }
}

fn copy_double_quoted(
    chars: &mut Peekable<Chars<'_>>,
    out: &mut String,
) -> Result<(), ProtocolError> {
    out.push('"');
    while let Some(c) = chars.next() {
        out.push(c);
        match c {
            '\\' => match chars.next() {
                Some(escaped) => out.push(escaped),
                None => break,
            },
            '"' => return Ok(()),
            _ => {}
        }
    }
    Err(ProtocolError::InvalidBody("unterminated string".into()))
}

fn convert_single_quoted(
    chars: &mut Peekable<Chars<'_>>,
    out: &mut String,
) -> Result<(), ProtocolError> {
    out.push('"');
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\'') => out.push('\''),
                Some(escaped) => {
                    out.push('\\');
                    out.push(escaped);
                }
                None => break,
            },
            '"' => out.push_str("\\\""),
            '\'' => {
                out.push('"');
                return Ok(());
            }
            other => out.push(other),
        }
    }
    Err(ProtocolError::InvalidBody("unterminated string".into()))
}
