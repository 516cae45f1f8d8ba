//! Transport abstraction
//!
//! The byte-level seam between the channel and a physical (or simulated)
//! serial device. The channel is generic over [`Transport`], which is
//! also the seam the test suite mocks.

use std::io;
use std::time::Duration;

use super::{DEFAULT_BAUD_RATE, DEFAULT_BYTE_TIMEOUT_MS, DEFAULT_SETTLE_DELAY_MS};

/// Configuration for one serial endpoint
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Device path (e.g., "/dev/ttyACM0" or "COM3")
    pub port_name: String,

    /// Baud rate
    pub baud_rate: u32,

    /// Upper bound on a single read poll
    pub byte_timeout: Duration,

    /// Wait after port open before the board accepts traffic. The board
    /// resets when the port is opened and drops anything sent before
    /// this elapses.
    pub settle_delay: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            byte_timeout: Duration::from_millis(DEFAULT_BYTE_TIMEOUT_MS),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
        }
    }
}

impl TransportConfig {
    /// Configuration for `port_name` with default timings
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }

    /// Override the baud rate
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Override the settle delay
    pub fn settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }
}

/// Byte-oriented duplex connection to one serial device.
///
/// Absence of data is a normal outcome: `read_available` returns an
/// empty buffer on timeout, never an error. Implementations close the
/// underlying device on drop so the port is released on every exit path.
pub trait Transport {
    /// Write the whole buffer to the device
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Return whatever bytes are queued, waiting at most `max_wait`
    fn read_available(&mut self, max_wait: Duration) -> io::Result<Vec<u8>>;

    /// Discard bytes queued in both directions
    fn clear_buffers(&mut self) -> io::Result<()>;
}
