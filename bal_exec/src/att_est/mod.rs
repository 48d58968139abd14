//! # Attitude estimation module
//!
//! Two state Kalman filter tracking the pitch angle and the gyro bias. The
//! gyro rate drives the prediction, the accelerometer tilt corrects it.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during AttEst operation.
#[derive(Debug, thiserror::Error)]
pub enum AttEstError {
    #[error("Could not load the parameters: {0}")]
    ParamsError(#[from] util::params::LoadError),

    #[error("Invalid parameters: {0}")]
    InvalidParams(&'static str),

    #[error("Invalid prediction interval: {0} s")]
    InvalidDt(f64),

    #[error("Invalid gyro rate: {0} deg/s")]
    InvalidRate(f64),
}
