//! Serial Link Diagnostic Tool
//!
//! Runs the full probe sequence against a connected board and prints a
//! per-probe report. Useful when a sketch is uploaded but the host sees
//! no replies.
//!
//! Usage:
//!   cargo run --example link_diag -- [OPTIONS] [PORT]
//!
//! Options:
//!   --port PORT     Serial port (default: first detected, else /dev/ttyACM0)
//!   --baud RATE     Baud rate (default: 9600)
//!   --settle MS     Settle delay after port open in ms (default: 3000)
//!   --list          List detected serial ports and exit

use std::process::ExitCode;
use std::time::Duration;

use servolink_core::channel::{list_ports, run_serial_diagnostics, TransportConfig};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut port_name: Option<String> = None;
    let mut baud_rate = 9600u32;
    let mut settle_ms = 3000u64;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                i += 1;
                if i < args.len() {
                    port_name = Some(args[i].clone());
                }
            }
            "--baud" | "-b" => {
                i += 1;
                if i < args.len() {
                    baud_rate = args[i].parse().unwrap_or(9600);
                }
            }
            "--settle" | "-s" => {
                i += 1;
                if i < args.len() {
                    settle_ms = args[i].parse().unwrap_or(3000);
                }
            }
            "--list" | "-l" => {
                for port in list_ports() {
                    match &port.product {
                        Some(product) => println!("{}  ({})", port.name, product),
                        None => println!("{}", port.name),
                    }
                }
                return ExitCode::SUCCESS;
            }
            other if !other.starts_with('-') => {
                port_name = Some(other.to_string());
            }
            other => {
                eprintln!("unknown option: {}", other);
                return ExitCode::FAILURE;
            }
        }
        i += 1;
    }

    let port_name = port_name
        .or_else(|| list_ports().first().map(|p| p.name.clone()))
        .unwrap_or_else(|| "/dev/ttyACM0".to_string());

    let config = TransportConfig::new(&port_name)
        .baud_rate(baud_rate)
        .settle_delay(Duration::from_millis(settle_ms));

    println!("probing {} at {} baud...\n", port_name, baud_rate);
    let run = run_serial_diagnostics(&config);
    println!("{}", run);

    if run.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
