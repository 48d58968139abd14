//! Parameters structure for AttEst

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for attitude estimation.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {

    // ---- PROCESS NOISE ----

    /// Process noise of the angle.
    ///
    /// Units: deg^2/s
    pub q_angle: f64,

    /// Process noise of the gyro bias.
    ///
    /// Units: (deg/s)^2/s
    pub q_gyro: f64,

    // ---- MEASUREMENT NOISE ----

    /// Variance of the accelerometer angle.
    ///
    /// Units: deg^2
    pub r_angle: f64,

    // ---- INITIAL STATE ----

    /// Error covariance the filter starts from, row major.
    #[serde(default)]
    pub init_covariance: [[f64; 2]; 2],
}

impl Default for Params {
    fn default() -> Self {
        Self {
            q_angle: 0.001,
            q_gyro: 0.003,
            r_angle: 0.03,
            init_covariance: [[0.0; 2]; 2],
        }
    }
}
