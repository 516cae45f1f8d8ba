//! Serial port transport
//!
//! serialport-backed implementation of [`Transport`] plus device
//! enumeration helpers.

use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::error::ConnError;
use super::transport::{Transport, TransportConfig};

/// Sleep granularity while polling for queued bytes
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// An available serial device
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Device path (e.g., "/dev/ttyACM0" or "COM3")
    pub name: String,

    /// USB product string, when the driver reports one
    pub product: Option<String>,

    /// USB manufacturer string, when the driver reports one
    pub manufacturer: Option<String>,
}

/// Sort key placing likely Arduino ports first: ttyACM* before ttyUSB*
/// before everything else, numeric suffixes in order.
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let base = name.rsplit('/').next().unwrap_or(name);
    for (rank, prefix) in [(0u8, "ttyACM"), (1, "ttyUSB")] {
        if let Some(suffix) = base.strip_prefix(prefix) {
            let num = suffix.parse::<usize>().unwrap_or(usize::MAX);
            return (rank, num, base.to_string());
        }
    }
    (2, 0, base.to_string())
}

/// List available serial devices in deterministic order.
///
/// On Linux, /dev is also scanned for ttyACM*/ttyUSB* nodes the
/// serialport enumeration sometimes misses (e.g. inside containers).
pub fn list_ports() -> Vec<PortInfo> {
    let mut found: HashMap<String, PortInfo> = HashMap::new();

    for info in serialport::available_ports().unwrap_or_default() {
        let (product, manufacturer) = match info.port_type {
            SerialPortType::UsbPort(usb) => (usb.product, usb.manufacturer),
            _ => (None, None),
        };
        found.entry(info.port_name.clone()).or_insert(PortInfo {
            name: info.port_name,
            product,
            manufacturer,
        });
    }

    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyACM") || fname.starts_with("ttyUSB") {
                    let full = format!("/dev/{}", fname);
                    found.entry(full.clone()).or_insert(PortInfo {
                        name: full,
                        product: None,
                        manufacturer: None,
                    });
                }
            }
        }
    }

    let mut ports: Vec<PortInfo> = found.into_values().collect();
    ports.sort_by_key(|p| port_sort_key(&p.name));
    ports
}

/// Serial device transport.
///
/// Owns the port exclusively for its lifetime; dropping the transport
/// closes the port, so it is released on every exit path.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    baud_rate: u32,
    byte_timeout: Duration,
}

impl SerialTransport {
    /// Open and configure the device described by `config` (8N1, no
    /// flow control).
    ///
    /// Fails with [`ConnError::PortUnavailable`] when the device is
    /// missing, claimed by another program (an open Serial Monitor is
    /// the classic case), or not readable by the current user.
    pub fn open(config: &TransportConfig) -> Result<Self, ConnError> {
        let port = serialport::new(&config.port_name, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.byte_timeout)
            .open()
            .map_err(|e| {
                ConnError::PortUnavailable(format!("{}: {}", config.port_name, e))
            })?;

        debug!(
            port = %config.port_name,
            baud = config.baud_rate,
            "serial port opened"
        );

        Ok(Self {
            port,
            baud_rate: config.baud_rate,
            byte_timeout: config.byte_timeout,
        })
    }

    /// Per-poll read timeout configured at open
    pub fn byte_timeout(&self) -> Duration {
        self.byte_timeout
    }
}

impl Transport for SerialTransport {
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        self.port.write_all(buf)?;

        // flush() reaches tcdrain, which can block indefinitely on some
        // USB CDC drivers. write_all already hands the bytes to the
        // kernel; waiting out the transmit time at the configured baud
        // rate is enough. Each byte is 10 bits on the wire (start + 8
        // data + stop).
        let bits = (buf.len() * 10) as u64;
        let wait_ms = bits * 1000 / u64::from(self.baud_rate.max(1)) + 5;
        trace!(bytes = buf.len(), wait_ms, "wrote, waiting for transmission");
        thread::sleep(Duration::from_millis(wait_ms));

        Ok(())
    }

    fn read_available(&mut self, max_wait: Duration) -> io::Result<Vec<u8>> {
        // read() on a serial port can block for the full port timeout
        // even when nothing will arrive, so check bytes_to_read() first
        // and only read what is actually queued.
        let deadline = Instant::now() + max_wait;
        let mut buf = [0u8; 512];

        loop {
            let queued = self.port.bytes_to_read().map_err(io::Error::from)? as usize;

            if queued > 0 {
                let want = queued.min(buf.len());
                match self.port.read(&mut buf[..want]) {
                    Ok(0) => return Ok(Vec::new()),
                    Ok(n) => {
                        trace!(n, "read queued bytes");
                        return Ok(buf[..n].to_vec());
                    }
                    Err(ref e)
                        if e.kind() == io::ErrorKind::TimedOut
                            || e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => return Err(e),
                }
            }

            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn clear_buffers(&mut self) -> io::Result<()> {
        trace!("clearing serial buffers");
        self.port
            .clear(serialport::ClearBuffer::All)
            .map_err(io::Error::from)
    }
}
