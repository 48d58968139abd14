//! # Balancing vehicle library.
//!
//! This library holds the modules of the balance executable so they can be
//! tested and benchmarked outside of it.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Attitude estimation - fuses gyro rate and accelerometer tilt into an angle estimate
pub mod att_est;

/// Balance control - PID converting tilt error into a drive demand
pub mod bal_ctrl;

/// Control loop - sequences sensing, estimation, tuning, safety and actuation each cycle
pub mod ctrl_loop;

/// Data store - all state mutated by the control loop
pub mod data_store;

/// Drive mapping - turns a drive demand into per-wheel commands
pub mod drive_map;

/// Hardware abstraction - sensors, actuators and time
pub mod hal;

/// Executable parameters
pub mod params;

/// Sensing - calibration and conversion of raw sensor readings
pub mod sensing;

/// Simulated vehicle
#[cfg(feature = "sim")]
pub mod sim;

/// Tuning processor - applies tuning frames received from the ground station
pub mod tuning_processor;
