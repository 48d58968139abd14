//! Scripted hardware and clock used by the unit tests.

use nalgebra::Vector3;

use super::{Actuators, Clock, HalError, Sensors};
use crate::drive_map::WheelDems;
use crate::sensing::{CalibrationOffsets, SensingParams};

/// ADC count of every channel while the vehicle lies in its calibration pose.
pub(crate) const ADC_MID: f64 = 2048.0;

/// Vehicle whose tilt and gyro rate are set directly by the test.
pub(crate) struct MockHw {
    /// Lying in the calibration pose, all channels read [`ADC_MID`].
    pub lying: bool,
    pub tilt_deg: f64,
    pub gyro_rate_dps: f64,
    pub fail_sensors: bool,
    pub fail_actuators: bool,

    pub indicator_history: Vec<bool>,
    pub wheel_dems: Vec<WheelDems>,
    pub position_resets: usize,

    params: SensingParams,
}

/// Clock which only moves when slept on or advanced by the test.
#[derive(Default)]
pub(crate) struct VirtualClock {
    pub now_us: u64,
    pub sleeps_us: Vec<u64>,
}

impl MockHw {
    pub fn lying() -> Self {
        Self {
            lying: true,
            tilt_deg: 180.0,
            gyro_rate_dps: 0.0,
            fail_sensors: false,
            fail_actuators: false,
            indicator_history: Vec::new(),
            wheel_dems: Vec::new(),
            position_resets: 0,
            params: SensingParams::default(),
        }
    }

    pub fn standing(tilt_deg: f64) -> Self {
        let mut hw = Self::lying();
        hw.stand_at(tilt_deg);
        hw
    }

    pub fn stand_at(&mut self, tilt_deg: f64) {
        self.lying = false;
        self.tilt_deg = tilt_deg;
    }

    /// Offsets a calibration in the lying pose produces.
    pub fn offsets() -> CalibrationOffsets {
        CalibrationOffsets {
            gyro: ADC_MID,
            accel_x: ADC_MID,
            accel_y: ADC_MID,
            accel_z: ADC_MID,
        }
    }

    pub fn last_dems(&self) -> Option<&WheelDems> {
        self.wheel_dems.last()
    }
}

impl Sensors for MockHw {
    fn read_gyro(&mut self) -> Result<f64, HalError> {
        if self.fail_sensors {
            return Err(HalError::SensorError("gyro", String::from("scripted failure")));
        }

        if self.lying {
            Ok(ADC_MID)
        } else {
            Ok(ADC_MID - self.gyro_rate_dps * self.params.gyro_sensitivity)
        }
    }

    fn read_accel(&mut self) -> Result<Vector3<f64>, HalError> {
        if self.fail_sensors {
            return Err(HalError::SensorError("accel", String::from("scripted failure")));
        }

        if self.lying {
            return Ok(Vector3::repeat(ADC_MID));
        }

        let t = self.tilt_deg.to_radians();
        let s = self.params.accel_sensitivity;

        Ok(Vector3::new(
            ADC_MID + t.sin() * s,
            ADC_MID + (t.cos() + 1.0) * s,
            ADC_MID,
        ))
    }

    fn set_indicator(&mut self, on: bool) {
        self.indicator_history.push(on);
    }
}

impl Actuators for MockHw {
    fn set_wheel_drive(&mut self, dems: &WheelDems) -> Result<(), HalError> {
        if self.fail_actuators {
            return Err(HalError::ActuatorError(String::from("scripted failure")));
        }

        self.wheel_dems.push(*dems);
        Ok(())
    }

    fn reset_wheel_positions(&mut self) -> Result<(), HalError> {
        self.position_resets += 1;
        Ok(())
    }
}

impl Clock for VirtualClock {
    fn now_us(&self) -> u64 {
        self.now_us
    }

    fn sleep_us(&mut self, us: u64) {
        self.sleeps_us.push(us);
        self.now_us += us;
    }
}
