//! # Drive mapping module
//!
//! Splits the balance controller's drive demand between the two wheels.
//! The sign of the demand picks the direction, its magnitude the duty cycle.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod cmd;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use serde::Serialize;

pub use cmd::*;
use util::maths::clamp_flagged;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Factor applied to the left wheel's share of the demand to trim out the
/// difference between the two motors.
pub const LEFT_WHEEL_TRIM: f64 = 0.9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Status report for drive mapping.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct StatusReport {
    /// The left duty cycle had to be limited to [0, 1].
    pub left_duty_limited: bool,

    /// The right duty cycle had to be limited to [0, 1].
    pub right_duty_limited: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Map a drive demand onto the two wheels.
pub fn map(drive: f64) -> (WheelDems, StatusReport) {
    let (left, left_duty_limited) = wheel_cmd(drive * LEFT_WHEEL_TRIM);
    let (right, right_duty_limited) = wheel_cmd(drive);

    if left_duty_limited || right_duty_limited {
        trace!("Drive demand {} saturated the wheels", drive);
    }

    (
        WheelDems { left, right },
        StatusReport {
            left_duty_limited,
            right_duty_limited,
        }
    )
}

/// Convert a signed demand into a wheel command, flagging a limited duty.
fn wheel_cmd(demand: f64) -> (WheelCmd, bool) {
    if demand.is_nan() {
        return (WheelCmd::stop(), true);
    }

    let dir = if demand >= 0.0 {
        Direction::Forward
    } else {
        Direction::Backward
    };

    let (duty, limited) = clamp_flagged(demand.abs(), 0.0, 1.0);

    (WheelCmd { dir, duty }, limited)
}
