//! Command and response values
//!
//! A [`Command`] serializes to exactly one line of text; a [`Response`]
//! is one trimmed reply line. Tag-specific validation (servo range and
//! the like) is caller policy, supplied through [`CommandValidator`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outbound command payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Free-form text line
    Text(String),

    /// Tagged form, serialized as `<TAG>:<value>`
    Tagged {
        /// Command tag (e.g., "SERVO")
        tag: String,
        /// Value rendered after the colon
        value: String,
    },
}

impl Command {
    /// Free-form text command
    pub fn text(line: impl Into<String>) -> Self {
        Command::Text(line.into())
    }

    /// Tagged command serialized as `<TAG>:<value>`
    pub fn tagged(tag: impl Into<String>, value: impl ToString) -> Self {
        Command::Tagged {
            tag: tag.into(),
            value: value.to_string(),
        }
    }

    /// Servo position command in the firmware's `SERVO:<angle>` vocabulary
    pub fn servo(angle: u16) -> Self {
        Self::tagged("SERVO", angle)
    }

    /// Render the line body (without the trailing delimiter)
    pub fn payload(&self) -> String {
        match self {
            Command::Text(line) => line.clone(),
            Command::Tagged { tag, value } => format!("{}:{}", tag, value),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.payload())
    }
}

/// One inbound reply line, trimmed of the delimiter and surrounding
/// whitespace. Transient: not stored beyond the call that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response(String);

impl Response {
    pub(crate) fn new(text: &str) -> Self {
        Response(text.to_string())
    }

    /// The reply text
    pub fn text(&self) -> &str {
        &self.0
    }

    /// True when the reply line was empty after trimming
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the response, yielding the reply text
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-supplied command policy, run before any bytes are written.
/// A rejection surfaces as `ChannelError::CommandRejected`.
pub type CommandValidator = Box<dyn Fn(&Command) -> Result<(), String> + Send>;

/// Range validator for integer-valued tagged commands.
///
/// Rejects `<tag>:<value>` commands whose value is missing, non-numeric,
/// or outside `[min, max]`; all other commands pass through. The servo
/// policy from the reference firmware is `angle_range_validator("SERVO",
/// 0, 180)`.
pub fn angle_range_validator(tag: &str, min: i64, max: i64) -> CommandValidator {
    let tag = tag.to_string();
    Box::new(move |command| match command {
        Command::Tagged { tag: t, value } if *t == tag => {
            let parsed: i64 = value
                .parse()
                .map_err(|_| format!("{} value '{}' is not an integer", tag, value))?;
            if parsed < min || parsed > max {
                return Err(format!(
                    "{} value {} outside allowed range {}..={}",
                    tag, parsed, min, max
                ));
            }
            Ok(())
        }
        _ => Ok(()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_servo_payload() {
        assert_eq!(Command::servo(90).payload(), "SERVO:90");
        assert_eq!(Command::servo(0).payload(), "SERVO:0");
    }

    #[test]
    fn test_text_payload() {
        let cmd = Command::text("Hello from Raspberry Pi!");
        assert_eq!(cmd.payload(), "Hello from Raspberry Pi!");
        assert_eq!(cmd.to_string(), "Hello from Raspberry Pi!");
    }

    #[test]
    fn test_angle_validator_accepts_in_range() {
        let validator = angle_range_validator("SERVO", 0, 180);
        assert!(validator(&Command::servo(0)).is_ok());
        assert!(validator(&Command::servo(90)).is_ok());
        assert!(validator(&Command::servo(180)).is_ok());
    }

    #[test]
    fn test_angle_validator_rejects_out_of_range() {
        let validator = angle_range_validator("SERVO", 0, 180);
        let err = validator(&Command::servo(200)).unwrap_err();
        assert!(err.contains("200"));
    }

    #[test]
    fn test_angle_validator_rejects_non_numeric() {
        let validator = angle_range_validator("SERVO", 0, 180);
        assert!(validator(&Command::tagged("SERVO", "fast")).is_err());
    }

    #[test]
    fn test_angle_validator_ignores_other_commands() {
        let validator = angle_range_validator("SERVO", 0, 180);
        assert!(validator(&Command::text("STATUS")).is_ok());
        assert!(validator(&Command::tagged("LED", 9000)).is_ok());
    }
}
