//! Newline framing
//!
//! Converts between command/response values and newline-delimited byte
//! lines. A partial line (delimiter not yet observed) is the channel's
//! concern, not a framing error; this module only sees complete lines.

use super::command::{Command, Response};
use super::error::{DecodeError, EncodeError};

/// Line delimiter in both directions
pub const DELIMITER: u8 = b'\n';

/// Frame a command as one line: payload plus a single trailing `\n`.
///
/// Payloads containing a line delimiter cannot be framed and are
/// rejected with [`EncodeError::EmbeddedDelimiter`].
pub fn encode_line(command: &Command) -> Result<Vec<u8>, EncodeError> {
    let payload = command.payload();
    if payload.contains('\n') || payload.contains('\r') {
        return Err(EncodeError::EmbeddedDelimiter);
    }

    let mut bytes = payload.into_bytes();
    bytes.push(DELIMITER);
    Ok(bytes)
}

/// Decode one received line into a [`Response`].
///
/// Strips the trailing delimiter (tolerating `\r\n` from firmware using
/// `Serial.println`) and trims surrounding whitespace.
pub fn decode_line(bytes: &[u8]) -> Result<Response, DecodeError> {
    let mut line = bytes;
    if line.last() == Some(&b'\n') {
        line = &line[..line.len() - 1];
    }
    if line.last() == Some(&b'\r') {
        line = &line[..line.len() - 1];
    }

    let text = std::str::from_utf8(line).map_err(|_| DecodeError::InvalidEncoding)?;
    Ok(Response::new(text.trim()))
}
