//! Link diagnostics
//!
//! A fixed, ordered probe sequence for field-debugging a flaky serial
//! link: open the port, wait out the board reset, look for the startup
//! banner, clear the buffers, and run an echo round trip. Every probe is
//! reported individually and the sequence always runs to completion — an
//! early failure is exactly what the operator needs to see in context.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::info;

use super::command::Command;
use super::connection::Channel;
use super::error::ConnError;
use super::serial::SerialTransport;
use super::transport::{Transport, TransportConfig};
use super::DEFAULT_RESPONSE_TIMEOUT_MS;

/// Payload sent by the echo round-trip probe
pub const ECHO_PROBE_PAYLOAD: &str = "Test Message";

/// Outcome of one diagnostic probe
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    /// Probe identifier
    pub name: &'static str,

    /// Whether the probe succeeded
    pub passed: bool,

    /// Human-facing explanation of what was observed
    pub detail: String,
}

impl ProbeReport {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Results of a full diagnostic sequence
#[derive(Debug, Serialize)]
pub struct DiagnosticRun {
    /// Per-probe outcomes, in execution order
    pub reports: Vec<ProbeReport>,
}

impl DiagnosticRun {
    /// Overall verdict. The startup banner probe is best-effort (plenty
    /// of sketches never print one) and does not affect the verdict.
    pub fn passed(&self) -> bool {
        self.reports
            .iter()
            .filter(|r| r.name != "startup_banner")
            .all(|r| r.passed)
    }
}

impl fmt::Display for DiagnosticRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "serial link diagnostic")?;
        for report in &self.reports {
            let mark = if report.passed { "ok" } else { "FAIL" };
            writeln!(f, "  [{:>4}] {}: {}", mark, report.name, report.detail)?;
        }
        if self.passed() {
            write!(f, "result: link is working")
        } else {
            writeln!(f, "result: link is NOT working")?;
            writeln!(f, "things to check:")?;
            writeln!(f, "  - is the board connected, and the sketch uploaded?")?;
            writeln!(f, "  - is the Arduino Serial Monitor closed? (only one program can hold the port)")?;
            writeln!(f, "  - is the device path right? try listing ports")?;
            write!(f, "  - permissions: is your user in the dialout group?")
        }
    }
}

/// Run the probe sequence over any transport source.
///
/// `opener` supplies the transport (probe 1); the remaining probes run
/// against the resulting channel. A failed probe is recorded and the
/// sequence continues — later probes that depend on an earlier failure
/// report themselves as skipped rather than aborting the run.
pub fn run_diagnostics<T, F>(opener: F, config: &TransportConfig) -> DiagnosticRun
where
    T: Transport,
    F: FnOnce() -> Result<T, ConnError>,
{
    let mut reports = Vec::with_capacity(5);

    let mut channel = match opener() {
        Ok(transport) => {
            reports.push(ProbeReport::pass(
                "open_port",
                format!("opened {}", config.port_name),
            ));
            Some(Channel::open(transport, config.clone()))
        }
        Err(e) => {
            reports.push(ProbeReport::fail("open_port", e.to_string()));
            None
        }
    };

    let mut settled = false;
    match channel.as_mut() {
        Some(ch) => match ch.settle() {
            Ok(banner) => {
                settled = true;
                reports.push(ProbeReport::pass(
                    "wait_for_reset",
                    format!(
                        "waited {}ms for the board to reset",
                        config.settle_delay.as_millis()
                    ),
                ));
                reports.push(match banner {
                    Some(b) => ProbeReport::pass("startup_banner", format!("board sent '{}'", b)),
                    None => ProbeReport::fail(
                        "startup_banner",
                        "no startup message observed (sketch may not print one)",
                    ),
                });
            }
            Err(e) => {
                reports.push(ProbeReport::fail("wait_for_reset", e.to_string()));
                reports.push(ProbeReport::fail("startup_banner", "skipped: settle failed"));
            }
        },
        None => {
            reports.push(ProbeReport::fail("wait_for_reset", "skipped: port not open"));
            reports.push(ProbeReport::fail("startup_banner", "skipped: port not open"));
        }
    }

    match channel.as_mut().filter(|_| settled) {
        Some(ch) => reports.push(match ch.clear() {
            Ok(()) => ProbeReport::pass("clear_buffers", "input and output buffers cleared"),
            Err(e) => ProbeReport::fail("clear_buffers", e.to_string()),
        }),
        None => reports.push(ProbeReport::fail("clear_buffers", "skipped: channel not ready")),
    }

    match channel.as_mut().filter(|_| settled) {
        Some(ch) => {
            let command = Command::text(ECHO_PROBE_PAYLOAD);
            let timeout = Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS);
            reports.push(match ch.send(&command, timeout) {
                Ok(Some(reply)) if !reply.is_empty() => {
                    ProbeReport::pass("echo_round_trip", format!("board replied '{}'", reply))
                }
                Ok(Some(_)) => ProbeReport::fail("echo_round_trip", "board replied with an empty line"),
                Ok(None) => ProbeReport::fail(
                    "echo_round_trip",
                    format!("no reply within {}ms", timeout.as_millis()),
                ),
                Err(e) => ProbeReport::fail("echo_round_trip", e.to_string()),
            });
        }
        None => reports.push(ProbeReport::fail("echo_round_trip", "skipped: channel not ready")),
    }

    let run = DiagnosticRun { reports };
    info!(passed = run.passed(), "diagnostic sequence complete");
    run
}

/// Run the probe sequence against the configured serial device
pub fn run_serial_diagnostics(config: &TransportConfig) -> DiagnosticRun {
    run_diagnostics(|| SerialTransport::open(config), config)
}
