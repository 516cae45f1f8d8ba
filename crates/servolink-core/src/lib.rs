//! # ServoLink Core Library
//!
//! Core functionality for the ServoLink serial command channel.
//!
//! This library provides:
//! - A line-oriented, half-duplex command channel over a serial link
//! - Connection lifecycle management (open, settle, ready, closed)
//! - Retry-on-no-response session policy
//! - A field diagnostic probe sequence for flaky links
//!
//! The reference target is an Arduino-class board that resets when the
//! host opens the serial port and then exchanges newline-delimited ASCII
//! lines with the host.
//!
//! ## Example
//!
//! ```rust,ignore
//! use servolink_core::channel::{Command, Session, TransportConfig};
//!
//! let config = TransportConfig::new("/dev/ttyACM0");
//! let mut session = Session::connect(config)?;
//!
//! // Move the servo and read the firmware's acknowledgement
//! if let Some(reply) = session.send(&Command::servo(90))? {
//!     println!("board says: {}", reply);
//! }
//! ```

#![warn(missing_docs)]

pub mod channel;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::channel::{
        angle_range_validator, list_ports, run_serial_diagnostics, Channel, ChannelError,
        ChannelState, Command, ConnError, DiagnosticRun, PortInfo, ProbeReport, Response, Session,
        Transport, TransportConfig,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
