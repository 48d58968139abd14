//! # Balance control module
//!
//! PID controller turning the error between the target and estimated pitch
//! into a signed drive demand for [`crate::drive_map`].

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
// CONSTANTS
// ---------------------------------------------------------------------------

/// Lowest pitch at which the vehicle is still driven.
///
/// Units: degrees
pub const UPRIGHT_MIN_ANGLE_DEG: f64 = 75.0;

/// Highest pitch at which the vehicle is still driven.
///
/// Units: degrees
pub const UPRIGHT_MAX_ANGLE_DEG: f64 = 105.0;

/// Pitch of the vehicle standing straight up.
///
/// Units: degrees
pub const REST_ANGLE_DEG: f64 = 90.0;

/// Divisor applied to the angle error before the gains. The gains are tuned
/// against the scaled error.
pub const ERROR_SCALE: f64 = 100.0;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// True if the pitch is inside the upright envelope, bounds included.
pub fn is_upright(angle_deg: f64) -> bool {
    angle_deg >= UPRIGHT_MIN_ANGLE_DEG && angle_deg <= UPRIGHT_MAX_ANGLE_DEG
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_upright_envelope() {
        assert!(is_upright(75.0));
        assert!(is_upright(90.0));
        assert!(is_upright(105.0));
        assert!(!is_upright(74.9));
        assert!(!is_upright(105.1));
        assert!(!is_upright(std::f64::NAN));
    }
}
