use serde::Serialize;
use serde_json::Value;

use crate::{relaxed, ProtocolError};

/// A message split into its command keyword and optional body.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Upper-cased keyword.
    pub command: String,
    pub body: Option<Value>,
}

impl Frame {
    pub fn new(command: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            command: command.into(),
            body,
        }
    }
}

/// Parses `"<command>[ <relaxed json>]"`.
///
/// Surrounding whitespace is ignored and the command is matched
/// case-insensitively: `"  uPdAtE  {type: 'x'} "` has command `UPDATE`.
///
/// # Errors
///
/// `ProtocolError::Empty` for a blank message, `ProtocolError::InvalidBody`
/// when the text after the first space is not relaxed JSON.
pub fn parse(message: &str) -> Result<Frame, ProtocolError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ProtocolError::Empty);
    }

    let (command, rest) = match message.split_once(' ') {
        Some((command, rest)) => (command, Some(rest.trim())),
        None => (message, None),
    };

    let body = match rest {
        Some(text) if !text.is_empty() => Some(relaxed::parse(text)?),
        _ => None,
    };

    Ok(Frame::new(command.trim().to_uppercase(), body))
}

/// Renders `"<COMMAND> <json>"`, or just `"<COMMAND>"` when there is no body
/// or the body serializes to `null`.
pub fn stringify<T: Serialize + ?Sized>(
    command: &str,
    body: Option<&T>,
) -> Result<String, ProtocolError> {
    let command = stringify_command(command);
    let Some(body) = body else {
        return Ok(command);
    };
    let json = serde_json::to_string(body)?;
    if json == "null" {
        Ok(command)
    } else {
        Ok(format!("{command} {json}"))
    }
}

/// Renders a bodiless message.
pub fn stringify_command(command: &str) -> String {
    command.trim().to_uppercase()
}
