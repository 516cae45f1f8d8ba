//! Servo Motion Demo
//!
//! Drives an SG90-class servo through the SERVO:<angle> firmware
//! vocabulary: center, sweep, and a smooth interpolated move. Motion
//! sequencing lives here, in the caller; the library only carries the
//! command channel.
//!
//! Usage:
//!   cargo run --example servo_demo -- [OPTIONS] [PORT]
//!
//! Options:
//!   --port PORT     Serial port (default: /dev/ttyACM0)
//!   --baud RATE     Baud rate (default: 9600)

use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use servolink_core::channel::{angle_range_validator, Command, Session, TransportConfig};

/// Step delay while sweeping
const SWEEP_DELAY: Duration = Duration::from_millis(500);

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut port_name = "/dev/ttyACM0".to_string();
    let mut baud_rate = 9600u32;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                i += 1;
                if i < args.len() {
                    port_name = args[i].clone();
                }
            }
            "--baud" | "-b" => {
                i += 1;
                if i < args.len() {
                    baud_rate = args[i].parse().unwrap_or(9600);
                }
            }
            other if !other.starts_with('-') => {
                port_name = other.to_string();
            }
            other => {
                eprintln!("unknown option: {}", other);
                return ExitCode::FAILURE;
            }
        }
        i += 1;
    }

    let config = TransportConfig::new(&port_name).baud_rate(baud_rate);

    println!("connecting to {} (board resets on open, settling)...", port_name);
    let mut session = match Session::connect(config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("could not connect: {}", e);
            eprintln!("is the board plugged in, and the Serial Monitor closed?");
            return ExitCode::FAILURE;
        }
    };
    session.set_validator(angle_range_validator("SERVO", 0, 180));

    if let Some(banner) = session.banner() {
        println!("board says: {}", banner);
    }

    let result = (|| {
        println!("\ncentering...");
        move_to(&mut session, 90)?;

        println!("sweeping 0 -> 180 and back...");
        for angle in (0..=180).step_by(15) {
            move_to(&mut session, angle)?;
            thread::sleep(SWEEP_DELAY);
        }
        for angle in (0..=180).rev().step_by(15) {
            move_to(&mut session, angle)?;
            thread::sleep(SWEEP_DELAY);
        }

        println!("smooth move 0 -> 180...");
        smooth_move(&mut session, 0, 180, 30)?;

        // Leave the horn centered, like the original bench setup
        println!("centering before exit...");
        move_to(&mut session, 90)
    })();

    session.close();

    match result {
        Ok(()) => {
            println!("done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("demo aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Position the servo, retrying once if the acknowledgement is missed
fn move_to(
    session: &mut Session<servolink_core::channel::SerialTransport>,
    angle: u16,
) -> Result<(), servolink_core::channel::ChannelError> {
    let reply = session.send_with_retry(&Command::servo(angle), 2, Duration::from_millis(750))?;
    match reply {
        Some(ack) => println!("  {:>3}°  {}", angle, ack),
        None => println!("  {:>3}°  (no acknowledgement)", angle),
    }
    Ok(())
}

/// Interpolate between two angles in `steps` increments
fn smooth_move(
    session: &mut Session<servolink_core::channel::SerialTransport>,
    from: i32,
    to: i32,
    steps: i32,
) -> Result<(), servolink_core::channel::ChannelError> {
    let step = (to - from) as f64 / steps as f64;
    for i in 0..=steps {
        let angle = (from as f64 + step * i as f64).round() as u16;
        session.send_with_retry(&Command::servo(angle), 1, Duration::from_millis(100))?;
        thread::sleep(Duration::from_millis(50));
    }
    Ok(())
}
