//! Channel errors

use thiserror::Error;

use super::connection::ChannelState;

/// Errors establishing a connection to a serial endpoint
#[derive(Error, Debug)]
pub enum ConnError {
    /// The device path could not be opened or claimed: missing, already
    /// in use by another program, or a permissions problem.
    #[error("serial port unavailable: {0}")]
    PortUnavailable(String),

    /// I/O error while configuring an opened port
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors encoding an outbound command line
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// The command payload contains a line delimiter and cannot be framed
    /// as a single line
    #[error("command payload contains an embedded line delimiter")]
    EmbeddedDelimiter,
}

/// Errors decoding an inbound line
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The received bytes are not valid UTF-8 text
    #[error("response bytes are not valid text")]
    InvalidEncoding,
}

/// Errors surfaced by a channel exchange.
///
/// A reply that never arrives is not represented here: `send` returns
/// `Ok(None)` when the response timeout elapses, so the expected-absence
/// case and the fault channel stay separate.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// `send` was called outside the `Ready` state; nothing was written
    #[error("channel not ready (state: {0:?})")]
    NotReady(ChannelState),

    /// The transport write failed; the link is likely dead and the
    /// command is not retried
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// The caller-supplied validator refused the command before any
    /// bytes were written
    #[error("command rejected: {0}")]
    CommandRejected(String),

    /// The command could not be framed as a line
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// A reply line arrived but could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The transport failed while polling for a reply
    #[error("transport error: {0}")]
    Transport(String),

    /// The connection could not be established
    #[error(transparent)]
    Connect(#[from] ConnError),
}
