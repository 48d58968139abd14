//! # Hardware abstraction
//!
//! The control loop only ever touches the vehicle through these traits:
//! - [`Sensors`] - raw gyro and accelerometer readings, plus the indicator
//!   lights used during calibration.
//! - [`Actuators`] - wheel drive commands and the wheel encoders.
//! - [`Clock`] - a microsecond clock and the ability to wait.
//!
//! Readings are raw ADC counts, scaling lives in [`crate::sensing`].

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod mock;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::thread;
use std::time::{Duration, Instant};

use nalgebra::Vector3;

use crate::drive_map::WheelDems;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Source of raw inertial readings.
pub trait Sensors {
    /// Read the pitch axis gyro.
    ///
    /// Units: ADC counts
    fn read_gyro(&mut self) -> Result<f64, HalError>;

    /// Read the three accelerometer axes, ordered x, y, z. The y axis is the
    /// vertical reference.
    ///
    /// Units: ADC counts
    fn read_accel(&mut self) -> Result<Vector3<f64>, HalError>;

    /// Switch the indicator lights on or off.
    fn set_indicator(&mut self, _on: bool) {}
}

/// Sink for wheel commands.
pub trait Actuators {
    /// Command both wheels. A wheel with no direction is braked.
    fn set_wheel_drive(&mut self, dems: &WheelDems) -> Result<(), HalError>;

    /// Zero the wheel encoder counts.
    fn reset_wheel_positions(&mut self) -> Result<(), HalError>;
}

/// Monotonic time source.
pub trait Clock {
    /// Microseconds since an arbitrary, fixed epoch.
    fn now_us(&self) -> u64;

    /// Wait for the given number of microseconds.
    fn sleep_us(&mut self, us: u64);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// [`Clock`] backed by the operating system.
pub struct SystemClock {
    epoch: Instant,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum HalError {
    #[error("Could not read the {0} sensor: {1}")]
    SensorError(&'static str, String),

    #[error("Could not command the actuators: {0}")]
    ActuatorError(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    fn sleep_us(&mut self, us: u64) {
        thread::sleep(Duration::from_micros(us));
    }
}
