//! Wheel commands produced by DriveMap

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Command for a single wheel motor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct WheelCmd {
    pub dir: Direction,

    /// Fraction of the PWM period the motor is driven for, between 0 and 1.
    pub duty: f64,
}

/// Commands for both wheels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct WheelDems {
    pub left: WheelCmd,
    pub right: WheelCmd,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Direction a wheel is driven in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Direction {
    Forward,
    Backward,
    /// Not driven, the motor is braked.
    None,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl WheelCmd {
    /// A braked wheel.
    pub fn stop() -> Self {
        Self {
            dir: Direction::None,
            duty: 0.0,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.dir == Direction::None
    }
}

impl Default for WheelCmd {
    fn default() -> Self {
        Self::stop()
    }
}

impl WheelDems {
    /// Both wheels braked.
    pub fn stop() -> Self {
        Self {
            left: WheelCmd::stop(),
            right: WheelCmd::stop(),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.left.is_stopped() && self.right.is_stopped()
    }
}

impl Default for WheelDems {
    fn default() -> Self {
        Self::stop()
    }
}
