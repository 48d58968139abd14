//! # Sensing
//!
//! Calibration and conversion of raw ADC readings into physical units.
//!
//! The gyro and accelerometer are analogue parts sampled by a 12 bit ADC.
//! Calibration is performed with the vehicle lying on its back: the gyro is
//! still, the x and z accelerometer axes see no gravity and the y axis sees
//! -1 g. The offsets recorded there are subtracted from every later reading,
//! and the y axis is shifted back down by 1 g.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// ADC count of a full scale reading.
pub const ADC_FULL_SCALE: f64 = 4095.0;

/// Gravity seen by the vertical (y) accelerometer axis in the calibration pose.
///
/// Units: g
pub const CALIB_POSE_VERTICAL_G: f64 = -1.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Scale factors of the analogue sensors.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct SensingParams {
    /// Gyro sensitivity, 3.33 mV per deg/s on a 3.3 V, 12 bit ADC
    /// (0.00333 / 3.3 * 4095).
    ///
    /// Units: counts/(deg/s)
    pub gyro_sensitivity: f64,

    /// Accelerometer sensitivity, 330 mV per g on a 3.3 V, 12 bit ADC
    /// (0.33 / 3.3 * 4095).
    ///
    /// Units: counts/g
    pub accel_sensitivity: f64,
}

/// Zero reference of each channel, measured once at startup.
///
/// Units: ADC counts
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct CalibrationOffsets {
    pub gyro: f64,
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
}

/// One raw reading of every channel.
#[derive(Debug, Clone, Copy)]
pub struct RawSample {
    pub gyro: f64,
    pub accel: Vector3<f64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SensingParams {
    fn default() -> Self {
        Self {
            gyro_sensitivity: 4.132227273,
            accel_sensitivity: 409.5,
        }
    }
}

impl CalibrationOffsets {
    /// Average a set of samples into offsets, or `None` if there are none.
    pub fn from_samples(samples: &[RawSample]) -> Option<Self> {
        let channel = |f: fn(&RawSample) -> f64| {
            let values: Vec<f64> = samples.iter().map(f).collect();
            util::maths::mean(&values)
        };

        Some(Self {
            gyro: channel(|s| s.gyro)?,
            accel_x: channel(|s| s.accel[0])?,
            accel_y: channel(|s| s.accel[1])?,
            accel_z: channel(|s| s.accel[2])?,
        })
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Convert a raw gyro reading into a pitch rate.
///
/// The gyro is mounted inverted relative to the tilt convention, hence the
/// sign flip.
///
/// Units: deg/s
pub fn gyro_rate_dps(raw: f64, offsets: &CalibrationOffsets, params: &SensingParams) -> f64 {
    -((raw - offsets.gyro) / params.gyro_sensitivity)
}

/// Convert a raw accelerometer reading into a gravity vector, with the
/// vertical axis corrected for the calibration pose.
///
/// Units: g
pub fn accel_vector_g(
    raw: &Vector3<f64>,
    offsets: &CalibrationOffsets,
    params: &SensingParams
) -> Vector3<f64> {
    let s = params.accel_sensitivity;

    Vector3::new(
        (raw[0] - offsets.accel_x) / s,
        (raw[1] - offsets.accel_y) / s + CALIB_POSE_VERTICAL_G,
        (raw[2] - offsets.accel_z) / s,
    )
}

/// Tilt angle implied by a gravity vector, the angle between the vertical
/// axis and the vector. 90 degrees is upright.
///
/// Returns `None` for a zero length (free fall) or non-finite vector, in which
/// case there is no usable measurement.
///
/// Units: degrees
pub fn accel_angle_deg(accel_g: &Vector3<f64>) -> Option<f64> {
    let norm = accel_g.norm();

    if !norm.is_finite() || norm == 0.0 {
        return None;
    }

    // Rounding can push the ratio fractionally outside acos's domain
    let ratio = (accel_g[1] / norm).max(-1.0).min(1.0);

    Some(ratio.acos().to_degrees())
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn offsets() -> CalibrationOffsets {
        CalibrationOffsets {
            gyro: 1650.0,
            accel_x: 2000.0,
            accel_y: 2100.0,
            accel_z: 2050.0,
        }
    }

    #[test]
    fn test_default_sensitivities() {
        let p = SensingParams::default();
        assert_relative_eq!(p.gyro_sensitivity, 0.00333 / 3.3 * ADC_FULL_SCALE, epsilon = 1e-6);
        assert_relative_eq!(p.accel_sensitivity, 0.33 / 3.3 * ADC_FULL_SCALE, epsilon = 1e-9);
    }

    #[test]
    fn test_from_samples() {
        assert_eq!(CalibrationOffsets::from_samples(&[]), None);

        let samples = [
            RawSample { gyro: 1000.0, accel: Vector3::new(2000.0, 2100.0, 2050.0) },
            RawSample { gyro: 1010.0, accel: Vector3::new(2010.0, 2090.0, 2040.0) },
        ];

        assert_eq!(
            CalibrationOffsets::from_samples(&samples),
            Some(CalibrationOffsets {
                gyro: 1005.0,
                accel_x: 2005.0,
                accel_y: 2095.0,
                accel_z: 2045.0,
            })
        );
    }

    #[test]
    fn test_gyro_rate() {
        let p = SensingParams::default();
        let o = offsets();

        assert_eq!(gyro_rate_dps(1650.0, &o, &p), 0.0);
        assert_relative_eq!(
            gyro_rate_dps(1650.0 - 10.0 * p.gyro_sensitivity, &o, &p),
            10.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_calibration_pose_reads_lying_down() {
        let p = SensingParams::default();
        let o = offsets();
        let raw = Vector3::new(o.accel_x, o.accel_y, o.accel_z);

        let g = accel_vector_g(&raw, &o, &p);
        assert_relative_eq!(g, Vector3::new(0.0, -1.0, 0.0));
        assert_relative_eq!(accel_angle_deg(&g).unwrap(), 180.0, epsilon = 1e-9);
    }

    #[test]
    fn test_accel_angle() {
        assert_relative_eq!(
            accel_angle_deg(&Vector3::new(1.0, 0.0, 0.0)).unwrap(),
            90.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            accel_angle_deg(&Vector3::new(0.0, 2.0, 0.0)).unwrap(),
            0.0,
            epsilon = 1e-9
        );

        let t = 80f64.to_radians();
        assert_relative_eq!(
            accel_angle_deg(&Vector3::new(t.sin(), t.cos(), 0.0)).unwrap(),
            80.0,
            epsilon = 1e-9
        );

        // Only the direction matters
        assert_relative_eq!(
            accel_angle_deg(&Vector3::new(0.0, 0.5, 0.5)).unwrap(),
            45.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_accel_angle_degenerate() {
        assert_eq!(accel_angle_deg(&Vector3::zeros()), None);
        assert_eq!(accel_angle_deg(&Vector3::new(std::f64::NAN, 0.0, 1.0)), None);
    }
}
