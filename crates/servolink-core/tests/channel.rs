//! End-to-end channel tests against a scripted transport
//!
//! The scripted transport plays the part of the Arduino: replies become
//! readable a fixed delay after the host's write, or never.

use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use servolink_core::channel::{
    angle_range_validator, run_diagnostics, Channel, ChannelError, ChannelState, Command, Session,
    Transport, TransportConfig,
};

/// Bytes that become readable `delay` after the preceding host write
struct ScriptedReply {
    delay: Duration,
    bytes: Vec<u8>,
}

/// Transport standing in for the board.
///
/// Every write consumes the next scripted reply; reads honor the reply's
/// delay but never sleep past the caller's `max_wait`. Writes are logged
/// through a shared handle so tests can assert on them after the
/// transport has moved into a channel.
struct ScriptedTransport {
    replies: VecDeque<ScriptedReply>,
    /// Bytes readable before any write (startup banner)
    queued: Vec<u8>,
    /// When the pending reply becomes readable
    pending: Option<(Instant, Vec<u8>)>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    fail_writes: bool,
}

impl ScriptedTransport {
    fn new(replies: Vec<ScriptedReply>) -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
        let writes = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                replies: replies.into(),
                queued: Vec::new(),
                pending: None,
                writes: Arc::clone(&writes),
                fail_writes: false,
            },
            writes,
        )
    }

    fn silent() -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
        Self::new(Vec::new())
    }

    fn with_banner(mut self, banner: &str) -> Self {
        self.queued = banner.as_bytes().to_vec();
        self
    }

    fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }
}

impl Transport for ScriptedTransport {
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        self.writes.lock().unwrap().push(buf.to_vec());
        if let Some(reply) = self.replies.pop_front() {
            self.pending = Some((Instant::now() + reply.delay, reply.bytes));
        }
        Ok(())
    }

    fn read_available(&mut self, max_wait: Duration) -> io::Result<Vec<u8>> {
        if !self.queued.is_empty() {
            return Ok(std::mem::take(&mut self.queued));
        }
        if let Some((ready_at, _)) = self.pending {
            let now = Instant::now();
            if ready_at <= now {
                return Ok(self.pending.take().map(|(_, b)| b).unwrap_or_default());
            }
            if ready_at - now <= max_wait {
                thread::sleep(ready_at - now);
                return Ok(self.pending.take().map(|(_, b)| b).unwrap_or_default());
            }
        }
        thread::sleep(max_wait);
        Ok(Vec::new())
    }

    fn clear_buffers(&mut self) -> io::Result<()> {
        self.queued.clear();
        self.pending = None;
        Ok(())
    }
}

fn fast_config() -> TransportConfig {
    TransportConfig {
        port_name: "/dev/ttyTEST".to_string(),
        settle_delay: Duration::ZERO,
        byte_timeout: Duration::from_millis(10),
        ..TransportConfig::default()
    }
}

#[test]
fn send_before_settle_elapses_is_not_ready() {
    let (transport, writes) = ScriptedTransport::silent();
    let config = TransportConfig {
        settle_delay: Duration::from_secs(3),
        ..fast_config()
    };
    let mut channel = Channel::open(transport, config);

    let err = channel
        .send(&Command::servo(90), Duration::from_millis(100))
        .unwrap_err();

    assert!(matches!(err, ChannelError::NotReady(ChannelState::Settling)));
    assert!(writes.lock().unwrap().is_empty(), "nothing may reach the wire");
}

#[test]
fn validator_rejects_before_any_write() {
    let (transport, writes) = ScriptedTransport::silent();
    let mut session = Session::establish(transport, fast_config()).unwrap();
    session.set_validator(angle_range_validator("SERVO", 0, 180));

    let err = session.send(&Command::servo(200)).unwrap_err();

    assert!(matches!(err, ChannelError::CommandRejected(_)));
    assert!(writes.lock().unwrap().is_empty(), "nothing may reach the wire");

    // In-range commands still go out
    session.send(&Command::servo(90)).unwrap();
    assert_eq!(writes.lock().unwrap().as_slice(), &[b"SERVO:90\n".to_vec()]);
}

#[test]
fn echo_round_trip_with_latency() {
    let (transport, _) = ScriptedTransport::new(vec![ScriptedReply {
        delay: Duration::from_millis(200),
        bytes: b"Hello Arduino!\n".to_vec(),
    }]);
    let mut session = Session::establish(transport, fast_config()).unwrap();

    let reply = session
        .channel_mut()
        .send(&Command::text("Hello Arduino!"), Duration::from_millis(1500))
        .unwrap();

    assert_eq!(reply.unwrap().text(), "Hello Arduino!");
}

#[test]
fn no_reply_times_out_near_deadline() {
    let (transport, _) = ScriptedTransport::silent();
    let mut session = Session::establish(transport, fast_config()).unwrap();

    let start = Instant::now();
    let reply = session
        .channel_mut()
        .send(&Command::text("PING"), Duration::from_millis(500))
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(reply, None);
    assert!(elapsed >= Duration::from_millis(500), "returned early: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(900), "returned late: {:?}", elapsed);
}

#[test]
fn partial_line_without_delimiter_is_no_response() {
    let (transport, _) = ScriptedTransport::new(vec![ScriptedReply {
        delay: Duration::from_millis(20),
        bytes: b"Servo moved to".to_vec(), // board died mid-line
    }]);
    let mut session = Session::establish(transport, fast_config()).unwrap();

    let reply = session
        .channel_mut()
        .send(&Command::servo(90), Duration::from_millis(200))
        .unwrap();

    assert_eq!(reply, None);
}

#[test]
fn reply_split_across_reads_is_assembled() {
    // Delimiter arrives in a later chunk than the start of the line
    let (mut transport, _) = ScriptedTransport::silent();
    transport.replies = VecDeque::from(vec![ScriptedReply {
        delay: Duration::from_millis(10),
        bytes: b"Servo".to_vec(),
    }]);
    // The rest of the line follows on a later read, but only once the
    // host has actually written something.
    struct TwoChunk {
        inner: ScriptedTransport,
        tail: Option<Vec<u8>>,
        wrote: bool,
    }
    impl Transport for TwoChunk {
        fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
            self.wrote = true;
            self.inner.write_bytes(buf)
        }
        fn read_available(&mut self, max_wait: Duration) -> io::Result<Vec<u8>> {
            let chunk = self.inner.read_available(max_wait)?;
            if !chunk.is_empty() || !self.wrote {
                return Ok(chunk);
            }
            Ok(self.tail.take().unwrap_or_default())
        }
        fn clear_buffers(&mut self) -> io::Result<()> {
            self.inner.clear_buffers()
        }
    }

    let transport = TwoChunk {
        inner: transport,
        tail: Some(b" moved to 90\n".to_vec()),
        wrote: false,
    };
    let mut session = Session::establish(transport, fast_config()).unwrap();

    let reply = session
        .channel_mut()
        .send(&Command::servo(90), Duration::from_millis(500))
        .unwrap();

    assert_eq!(reply.unwrap().text(), "Servo moved to 90");
}

#[test]
fn retry_stops_at_first_reply() {
    // First attempt gets nothing, second gets the acknowledgement
    let (transport, writes) = ScriptedTransport::new(vec![
        ScriptedReply {
            delay: Duration::from_secs(60), // effectively never
            bytes: b"late\n".to_vec(),
        },
        ScriptedReply {
            delay: Duration::from_millis(10),
            bytes: b"Servo moved to 90\n".to_vec(),
        },
    ]);
    let mut session = Session::establish(transport, fast_config()).unwrap();

    let reply = session
        .send_with_retry(&Command::servo(90), 3, Duration::from_millis(100))
        .unwrap();

    assert_eq!(reply.unwrap().text(), "Servo moved to 90");
    assert_eq!(writes.lock().unwrap().len(), 2);
}

#[test]
fn retry_issues_at_most_the_requested_attempts() {
    let (transport, writes) = ScriptedTransport::silent();
    let mut session = Session::establish(transport, fast_config()).unwrap();

    let reply = session
        .send_with_retry(&Command::text("PING"), 3, Duration::from_millis(20))
        .unwrap();

    assert_eq!(reply, None);
    assert_eq!(writes.lock().unwrap().len(), 3);
}

#[test]
fn write_failure_propagates_and_is_not_retried() {
    let (transport, writes) = ScriptedTransport::silent();
    let transport = transport.failing_writes();
    let mut session = Session::establish(transport, fast_config()).unwrap();

    let err = session
        .send_with_retry(&Command::servo(90), 3, Duration::from_millis(20))
        .unwrap_err();

    assert!(matches!(err, ChannelError::WriteFailed(_)));
    assert!(writes.lock().unwrap().is_empty());
}

#[test]
fn banner_is_captured_during_bootstrap() {
    let (transport, _) = ScriptedTransport::silent();
    let transport = transport.with_banner("Arduino ready\n");
    let session = Session::establish(transport, fast_config()).unwrap();

    assert_eq!(session.banner().unwrap().text(), "Arduino ready");
}

#[test]
fn diagnostics_pass_against_a_healthy_board() {
    let config = fast_config();
    let run = run_diagnostics(
        || {
            let (transport, _) = ScriptedTransport::new(vec![ScriptedReply {
                delay: Duration::from_millis(10),
                bytes: b"Echo: Test Message\n".to_vec(),
            }]);
            Ok(transport.with_banner("Arduino ready\n"))
        },
        &config,
    );

    assert_eq!(run.reports.len(), 5);
    assert!(run.reports.iter().all(|r| r.passed), "{}", run);
    assert!(run.passed());
}
