//! Parameters structure for BalCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use comms_if::tuning::Telemetry;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Tunable parameters of balance control. All of these can be replaced from
/// the ground station while running.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Params {

    // ---- PITCH PID ----

    pub k_p: f64,
    pub k_i: f64,
    pub k_d: f64,

    /// Pitch the controller holds the vehicle at.
    ///
    /// Units: degrees
    pub target_angle_deg: f64,

    // ---- WHEEL POSITION ----

    /// Gains of the wheel position loop. Stored and reported but not yet
    /// acted on.
    #[serde(default)]
    pub wheel_k_p: f64,
    #[serde(default)]
    pub wheel_k_d: f64,

    /// Units: encoder counts
    #[serde(default)]
    pub target_position: i64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            k_p: 11.0,
            k_i: 2.0,
            k_d: 12.0,
            target_angle_deg: super::REST_ANGLE_DEG,
            wheel_k_p: 0.0,
            wheel_k_d: 0.0,
            target_position: 0,
        }
    }
}

impl Params {
    /// The parameters as reported to the ground station.
    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            k_p: self.k_p,
            k_i: self.k_i,
            k_d: self.k_d,
            target_angle_deg: self.target_angle_deg,
            wheel_k_p: self.wheel_k_p,
            wheel_k_d: self.wheel_k_d,
            target_position: self.target_position,
        }
    }
}
