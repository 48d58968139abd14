//! # Tuning protocol
//!
//! The ground station tunes the balance controller with short comma separated
//! ASCII frames. The first character of a frame is its tag:
//!
//! | Tag | Fields             | Meaning                                  |
//! |-----|--------------------|------------------------------------------|
//! | `1` | `k_p,k_i,k_d`      | Replace the balance PID gains            |
//! | `2` | `target_angle_deg` | Replace the rest angle                   |
//! | `3` | `wheel_k_p,wheel_k_d` | Replace the wheel position gains      |
//! | `4` | `target_position`  | Replace the target position, echo state  |
//! | `A` | -                  | Pause, hold until [`RESUME_BYTE`]        |
//! | `G` | -                  | Handshake, echo state then [`HANDSHAKE_REPLY`] |
//!
//! Frames carry no terminator, a frame is whatever arrived since the last
//! control cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Longest accepted frame, in bytes.
pub const MAX_FRAME_LEN: usize = 32;

/// Byte which ends a pause.
pub const RESUME_BYTE: u8 = b'C';

/// Reply sent after calibration and after a handshake.
pub const HANDSHAKE_REPLY: &str = "Initialized\n";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// State echoed back to the ground station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Telemetry {
    pub k_p: f64,
    pub k_i: f64,
    pub k_d: f64,
    pub target_angle_deg: f64,
    pub wheel_k_p: f64,
    pub wheel_k_d: f64,
    pub target_position: i64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A decoded tuning frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TuningCmd {
    SetPidGains {
        k_p: f64,
        k_i: f64,
        k_d: f64,
    },

    /// Range checking is left to the receiver.
    SetTargetAngle {
        target_angle_deg: f64,
    },

    SetWheelGains {
        wheel_k_p: f64,
        wheel_k_d: f64,
    },

    SetTargetPosition {
        target_position: i64,
    },

    Pause,

    Handshake,
}

/// Reasons a frame can be rejected.
#[derive(Debug, Error, PartialEq)]
pub enum TuningParseError {
    #[error("The frame is empty")]
    Empty,

    #[error("The frame is {0} bytes long, at most {} are allowed", MAX_FRAME_LEN)]
    TooLong(usize),

    #[error("The frame contains non-ASCII bytes")]
    NotAscii,

    #[error("Unrecognised frame tag {0:?}")]
    UnknownTag(char),

    #[error("The frame tag must be a single character, found {0:?}")]
    BadTag(String),

    #[error("Frame {tag:?} is missing the {field} field")]
    MissingField { tag: char, field: &'static str },

    #[error("Field {field} of frame {tag:?} is not a valid number: {value:?}")]
    InvalidNumber {
        tag: char,
        field: &'static str,
        value: String,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TuningCmd {
    /// Decode a raw frame.
    ///
    /// Trailing whitespace (including CR/LF) is ignored. Fields after those a
    /// tag needs are ignored too.
    pub fn parse(frame: &[u8]) -> Result<Self, TuningParseError> {
        if frame.len() > MAX_FRAME_LEN {
            return Err(TuningParseError::TooLong(frame.len()));
        }

        if !frame.is_ascii() {
            return Err(TuningParseError::NotAscii);
        }

        // All bytes are ASCII so this can't fail
        let text = std::str::from_utf8(frame)
            .map_err(|_| TuningParseError::NotAscii)?
            .trim_end();

        let head = text.split(',').next().unwrap_or("");
        let mut head_chars = head.chars();

        let tag = match (head_chars.next(), head_chars.next()) {
            (Some(c), None) => c,
            (None, _) => return Err(TuningParseError::Empty),
            (Some(_), Some(_)) => return Err(TuningParseError::BadTag(head.to_string())),
        };

        let mut fields = Fields::new(tag, text);

        match tag {
            '1' => Ok(TuningCmd::SetPidGains {
                k_p: fields.next_f64("k_p")?,
                k_i: fields.next_f64("k_i")?,
                k_d: fields.next_f64("k_d")?,
            }),
            '2' => Ok(TuningCmd::SetTargetAngle {
                target_angle_deg: fields.next_f64("target_angle_deg")?,
            }),
            '3' => Ok(TuningCmd::SetWheelGains {
                wheel_k_p: fields.next_f64("wheel_k_p")?,
                wheel_k_d: fields.next_f64("wheel_k_d")?,
            }),
            '4' => Ok(TuningCmd::SetTargetPosition {
                target_position: fields.next_i64("target_position")?,
            }),
            'A' => Ok(TuningCmd::Pause),
            'G' => Ok(TuningCmd::Handshake),
            c => Err(TuningParseError::UnknownTag(c)),
        }
    }

    /// True if the ground station expects a telemetry echo after this command.
    pub fn echoes_telemetry(&self) -> bool {
        matches!(self, TuningCmd::SetTargetPosition { .. } | TuningCmd::Handshake)
    }
}

impl Telemetry {
    /// Format the telemetry as the line sent to the ground station.
    ///
    /// Every real field is printed with 3 decimals in a 6 character wide
    /// column, the position as a plain integer.
    pub fn to_frame(&self) -> String {
        format!(
            "{:6.3},{:6.3},{:6.3},{:6.3},{:6.3},{:6.3},{}\n",
            self.k_p,
            self.k_i,
            self.k_d,
            self.target_angle_deg,
            self.wheel_k_p,
            self.wheel_k_d,
            self.target_position
        )
    }
}

/// Iterator over the comma separated fields following a frame's tag.
struct Fields<'a> {
    tag: char,
    inner: std::str::Split<'a, char>,
}

impl<'a> Fields<'a> {
    fn new(tag: char, text: &'a str) -> Self {
        let mut inner = text.split(',');

        // First token holds the tag
        inner.next();

        Self { tag, inner }
    }

    fn next_str(&mut self, field: &'static str) -> Result<&'a str, TuningParseError> {
        match self.inner.next().map(str::trim) {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(TuningParseError::MissingField {
                tag: self.tag,
                field,
            }),
        }
    }

    fn next_f64(&mut self, field: &'static str) -> Result<f64, TuningParseError> {
        let s = self.next_str(field)?;

        match s.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(self.invalid(field, s)),
        }
    }

    fn next_i64(&mut self, field: &'static str) -> Result<i64, TuningParseError> {
        let s = self.next_str(field)?;

        s.parse::<i64>().map_err(|_| self.invalid(field, s))
    }

    fn invalid(&self, field: &'static str, value: &str) -> TuningParseError {
        TuningParseError::InvalidNumber {
            tag: self.tag,
            field,
            value: value.to_string(),
        }
    }
}
