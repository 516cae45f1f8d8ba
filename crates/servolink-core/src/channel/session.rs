//! Session bootstrap and retry policy
//!
//! Wraps a [`Channel`] with the open → settle → ready bootstrap, done
//! exactly once per connection, and a configurable retry on absent
//! responses. Write failures are not retried: a dead link is surfaced,
//! not papered over.

use std::time::Duration;
use tracing::{debug, info};

use super::command::{Command, CommandValidator, Response};
use super::connection::{Channel, ChannelState};
use super::error::ChannelError;
use super::serial::SerialTransport;
use super::transport::{Transport, TransportConfig};
use super::DEFAULT_RESPONSE_TIMEOUT_MS;

/// A bootstrapped, ready-to-send command channel
pub struct Session<T: Transport> {
    channel: Channel<T>,
    /// Startup banner captured while settling, if the firmware sent one
    banner: Option<Response>,
    /// Default reply timeout for [`send`](Self::send)
    response_timeout: Duration,
}

impl Session<SerialTransport> {
    /// Open the configured serial device, wait out the board reset,
    /// clear the buffers and return a ready session.
    pub fn connect(config: TransportConfig) -> Result<Self, ChannelError> {
        info!(port = %config.port_name, baud = config.baud_rate, "connecting");
        let channel = Channel::connect(config)?;
        Self::bootstrap(channel)
    }
}

impl<T: Transport> Session<T> {
    /// Bootstrap over an already-open transport (the seam used by tests
    /// and non-serial carriers).
    pub fn establish(transport: T, config: TransportConfig) -> Result<Self, ChannelError> {
        Self::bootstrap(Channel::open(transport, config))
    }

    fn bootstrap(mut channel: Channel<T>) -> Result<Self, ChannelError> {
        let banner = channel.settle()?;
        if let Some(b) = &banner {
            info!(banner = %b, "board startup banner");
        }
        debug_assert_eq!(channel.state(), ChannelState::Ready);
        Ok(Self {
            channel,
            banner,
            response_timeout: Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS),
        })
    }

    /// Startup banner observed while the board was resetting, if any
    pub fn banner(&self) -> Option<&Response> {
        self.banner.as_ref()
    }

    /// Install a command validator on the underlying channel
    pub fn set_validator(&mut self, validator: CommandValidator) {
        self.channel.set_validator(validator);
    }

    /// Change the default reply timeout used by [`send`](Self::send)
    pub fn set_response_timeout(&mut self, timeout: Duration) {
        self.response_timeout = timeout;
    }

    /// Send one command with the session's default reply timeout
    pub fn send(&mut self, command: &Command) -> Result<Option<Response>, ChannelError> {
        self.channel.send(command, self.response_timeout)
    }

    /// Send one command, retrying while no reply arrives.
    ///
    /// Issues at most `retries` underlying sends and stops at the first
    /// non-absent outcome. Only the `None` case is retried; errors
    /// (including write failures) propagate immediately.
    pub fn send_with_retry(
        &mut self,
        command: &Command,
        retries: u32,
        per_attempt_timeout: Duration,
    ) -> Result<Option<Response>, ChannelError> {
        let attempts = retries.max(1);
        for attempt in 1..=attempts {
            match self.channel.send(command, per_attempt_timeout)? {
                Some(response) => return Ok(Some(response)),
                None => debug!(attempt, attempts, "no reply within attempt timeout"),
            }
        }
        Ok(None)
    }

    /// Direct access to the underlying channel
    pub fn channel_mut(&mut self) -> &mut Channel<T> {
        &mut self.channel
    }

    /// Close the connection. Also happens on drop.
    pub fn close(&mut self) {
        self.channel.close();
    }
}
