//! Channel state machine
//!
//! Handles the connection lifecycle and one half-duplex command/response
//! exchange at a time over an exclusively owned transport.

use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::command::{Command, CommandValidator, Response};
use super::error::{ChannelError, ConnError};
use super::framer;
use super::serial::SerialTransport;
use super::transport::{Transport, TransportConfig};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    /// No transport attached
    Closed,
    /// Port claim in progress (transient, visible to state observers
    /// only while `connect` runs)
    Opening,
    /// Transport open, settle delay not yet waited out
    Settling,
    /// Accepting commands
    Ready,
}

/// Half-duplex command channel over one serial transport.
///
/// Exactly one command is in flight at a time; `send` takes `&mut self`,
/// so single-flight discipline holds by construction. Correlation is
/// purely by send order — the link carries no message identifiers.
pub struct Channel<T: Transport> {
    /// Transport handle; present in every state except `Closed`
    transport: Option<T>,
    /// Current lifecycle state
    state: ChannelState,
    /// Endpoint configuration
    config: TransportConfig,
    /// Caller-supplied command policy
    validator: Option<CommandValidator>,
    /// When the settle window ends; set on open, consumed by `settle`
    settle_deadline: Option<Instant>,
    /// Metrics: lines sent and reply lines received
    tx_lines: u64,
    rx_lines: u64,
}

impl<T: Transport> Channel<T> {
    /// Attach an already-open transport and begin the settle window.
    ///
    /// The board resets when its port is opened; the channel stays in
    /// `Settling` until [`settle`](Self::settle) has waited out
    /// `config.settle_delay`.
    pub fn open(transport: T, config: TransportConfig) -> Self {
        debug!(
            settle_ms = config.settle_delay.as_millis() as u64,
            "channel opened, waiting out board reset"
        );
        Self {
            transport: Some(transport),
            state: ChannelState::Settling,
            settle_deadline: Some(Instant::now() + config.settle_delay),
            config,
            validator: None,
            tx_lines: 0,
            rx_lines: 0,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Install a command validator, run before every write
    pub fn set_validator(&mut self, validator: CommandValidator) {
        self.validator = Some(validator);
    }

    /// Cumulative (sent, received) line counts
    pub fn counters(&self) -> (u64, u64) {
        (self.tx_lines, self.rx_lines)
    }

    /// Wait out the remainder of the settle delay, then drain and clear
    /// the buffers and transition to `Ready`.
    ///
    /// Returns the startup banner line if the firmware printed one while
    /// resetting. A partial or absent banner is `Ok(None)`; the bytes
    /// are discarded either way so the first real exchange starts clean.
    pub fn settle(&mut self) -> Result<Option<Response>, ChannelError> {
        match self.state {
            ChannelState::Settling => {}
            ChannelState::Ready => return Ok(None),
            other => return Err(ChannelError::NotReady(other)),
        }

        if let Some(deadline) = self.settle_deadline.take() {
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            }
        }

        let byte_timeout = self.config.byte_timeout;
        let transport = self
            .transport
            .as_mut()
            .ok_or(ChannelError::NotReady(ChannelState::Closed))?;

        // Anything queued now arrived during the reset; the first
        // complete line is the startup banner, the rest is stale.
        let drained = transport
            .read_available(byte_timeout)
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        let banner = match drained.iter().position(|&b| b == framer::DELIMITER) {
            Some(pos) => framer::decode_line(&drained[..=pos]).ok(),
            None => None,
        };
        if let Some(b) = &banner {
            debug!(banner = %b, "startup banner observed during settle");
        }

        transport
            .clear_buffers()
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        self.state = ChannelState::Ready;
        debug!("channel ready");
        Ok(banner)
    }

    /// Send one command and wait at most `response_timeout` for one
    /// correlated reply line.
    ///
    /// `Ok(None)` means the timeout elapsed without a complete line —
    /// an expected outcome for fire-and-forget commands, never an error.
    /// Write failures are surfaced immediately and not retried here; a
    /// dead link should not be retried silently.
    pub fn send(
        &mut self,
        command: &Command,
        response_timeout: Duration,
    ) -> Result<Option<Response>, ChannelError> {
        if self.state != ChannelState::Ready {
            return Err(ChannelError::NotReady(self.state));
        }

        if let Some(validator) = &self.validator {
            validator(command).map_err(ChannelError::CommandRejected)?;
        }

        let frame = framer::encode_line(command)?;
        let byte_timeout = self.config.byte_timeout;
        let transport = self
            .transport
            .as_mut()
            .ok_or(ChannelError::NotReady(ChannelState::Closed))?;

        transport
            .write_bytes(&frame)
            .map_err(|e| ChannelError::WriteFailed(e.to_string()))?;
        self.tx_lines += 1;
        debug!(command = %command, bytes = frame.len(), "command sent");

        // Poll for one complete reply line until the deadline.
        let deadline = Instant::now() + response_timeout;
        let mut pending: Vec<u8> = Vec::new();

        loop {
            let now = Instant::now();
            if now >= deadline {
                if !pending.is_empty() {
                    debug!(
                        bytes = pending.len(),
                        "no delimiter before timeout, discarding partial line"
                    );
                }
                return Ok(None);
            }

            let wait = byte_timeout.min(deadline - now);
            let chunk = transport
                .read_available(wait)
                .map_err(|e| ChannelError::Transport(e.to_string()))?;
            if chunk.is_empty() {
                continue;
            }
            pending.extend_from_slice(&chunk);

            if let Some(pos) = pending.iter().position(|&b| b == framer::DELIMITER) {
                let response = framer::decode_line(&pending[..=pos])?;
                self.rx_lines += 1;
                if pending.len() > pos + 1 {
                    warn!(
                        extra = pending.len() - pos - 1,
                        "bytes past the reply line discarded"
                    );
                }
                debug!(response = %response, "reply received");
                return Ok(Some(response));
            }
        }
    }

    /// Discard any bytes queued in both directions, so the next exchange
    /// cannot consume stale data from an earlier one.
    pub fn clear(&mut self) -> Result<(), ChannelError> {
        let transport = self
            .transport
            .as_mut()
            .ok_or(ChannelError::NotReady(ChannelState::Closed))?;
        transport
            .clear_buffers()
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }

    /// Release the transport and return to `Closed`. Also runs on drop.
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            debug!("channel closed");
        }
        self.settle_deadline = None;
        self.state = ChannelState::Closed;
    }
}

impl Channel<SerialTransport> {
    /// Open the configured serial device and begin the settle window.
    ///
    /// The returned channel is `Settling`; call
    /// [`settle`](Self::settle) (or use `Session::connect`, which does
    /// the whole bootstrap) before sending.
    pub fn connect(config: TransportConfig) -> Result<Self, ConnError> {
        let transport = SerialTransport::open(&config)?;
        Ok(Self::open(transport, config))
    }
}

impl<T: Transport> Drop for Channel<T> {
    fn drop(&mut self) {
        self.close();
    }
}
