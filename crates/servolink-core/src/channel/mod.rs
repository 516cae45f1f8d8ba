//! Serial Command Channel
//!
//! Implements a line-oriented, half-duplex request/response exchange with
//! an Arduino-compatible microcontroller over a serial link.
//!
//! At most one command is in flight at a time; replies are correlated to
//! commands purely by send order. An absent reply within the response
//! timeout is a normal outcome (`Ok(None)`), not an error.

pub mod command;
mod connection;
mod diagnostics;
mod error;
pub mod framer;
pub mod serial;
mod session;
mod transport;

pub use command::{angle_range_validator, Command, CommandValidator, Response};
pub use connection::{Channel, ChannelState};
pub use diagnostics::{
    run_diagnostics, run_serial_diagnostics, DiagnosticRun, ProbeReport, ECHO_PROBE_PAYLOAD,
};
pub use error::{ChannelError, ConnError, DecodeError, EncodeError};
pub use serial::{list_ports, PortInfo, SerialTransport};
pub use session::Session;
pub use transport::{Transport, TransportConfig};

/// Default baud rate for Arduino-class boards
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default timeout for a reply line in milliseconds
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 1500;

/// Default settle delay after port open in milliseconds.
/// Opening the port resets the board; anything written during roughly the
/// first three seconds is discarded by the bootloader.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 3000;

/// Default upper bound on a single read poll in milliseconds
pub const DEFAULT_BYTE_TIMEOUT_MS: u64 = 100;
