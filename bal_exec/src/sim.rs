//! # Simulated vehicle
//!
//! Inverted pendulum on two driven wheels, standing in for the real
//! hardware. The wheels' average signed duty accelerates the body back
//! towards upright, gravity pulls it away.
//!
//! Readings are produced in the same raw ADC counts the real sensors give,
//! with every channel at `adc_mid` while the vehicle lies on its back.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::time::Instant;

use log::debug;
use nalgebra::Vector3;
use serde::Deserialize;

use crate::{
    drive_map::{Direction, WheelCmd, WheelDems},
    hal::{Actuators, HalError, Sensors},
    sensing::SensingParams,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Integration steps per plant update.
const NUM_SUBSTEPS: usize = 10;

/// Tilt of the vehicle lying on its back, or on its front.
const LYING_BACK_DEG: f64 = 180.0;
const LYING_FRONT_DEG: f64 = 0.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the simulated vehicle.
#[derive(Debug, Clone, Deserialize)]
pub struct SimParams {
    /// Gravity over the pendulum length.
    ///
    /// Units: 1/s^2
    pub gravity_over_length: f64,

    /// Angular acceleration of the body per unit of duty.
    ///
    /// Units: rad/s^2
    pub drive_gain: f64,

    /// Viscous damping of the body rate.
    ///
    /// Units: 1/s
    pub damping: f64,

    /// ADC count every channel reads at zero.
    pub adc_mid: f64,

    /// Tilt the vehicle is placed at by [`SimPlatform::stand_up`].
    ///
    /// Units: degrees
    pub stand_angle_deg: f64,

    /// Advance the plant by this fixed step on every gyro read rather than
    /// by the wall clock time since the last read.
    ///
    /// Units: seconds
    #[serde(default)]
    pub fixed_step_s: Option<f64>,

    #[serde(default)]
    pub sensing: SensingParams,
}

/// The simulated vehicle.
pub struct SimPlatform {
    params: SimParams,

    /// Units: degrees
    tilt_deg: f64,

    /// Units: degrees/second
    rate_dps: f64,

    /// Average signed duty of the two wheels.
    drive: f64,

    indicator: bool,

    last_tick: Option<Instant>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            gravity_over_length: 20.0,
            drive_gain: 40.0,
            damping: 20.0,
            adc_mid: 2048.0,
            stand_angle_deg: 85.0,
            fixed_step_s: None,
            sensing: SensingParams::default(),
        }
    }
}

impl SimPlatform {
    /// Create a vehicle lying on its back, ready to be calibrated.
    pub fn new(params: SimParams) -> Self {
        Self {
            params,
            tilt_deg: LYING_BACK_DEG,
            rate_dps: 0.0,
            drive: 0.0,
            indicator: false,
            last_tick: None,
        }
    }

    pub fn tilt(&self) -> f64 {
        self.tilt_deg
    }

    pub fn rate(&self) -> f64 {
        self.rate_dps
    }

    pub fn indicator(&self) -> bool {
        self.indicator
    }

    /// Pick the vehicle up and hold it still at the stand angle.
    pub fn stand_up(&mut self) {
        self.place(self.params.stand_angle_deg);
    }

    /// Hold the vehicle still at the given tilt.
    pub fn place(&mut self, tilt_deg: f64) {
        debug!("Sim vehicle placed at {} deg", tilt_deg);
        self.tilt_deg = tilt_deg.max(LYING_FRONT_DEG).min(LYING_BACK_DEG);
        self.rate_dps = 0.0;
    }

    /// Integrate the plant forward by `dt_s`.
    pub fn advance(&mut self, dt_s: f64) {
        let h = dt_s / NUM_SUBSTEPS as f64;

        for _ in 0..NUM_SUBSTEPS {
            let lean_rad = (self.tilt_deg - 90.0).to_radians();

            let accel_rad = self.params.gravity_over_length * lean_rad.sin()
                + self.params.drive_gain * self.drive
                - self.params.damping * self.rate_dps.to_radians();

            self.rate_dps += accel_rad.to_degrees() * h;
            self.tilt_deg += self.rate_dps * h;

            // Lying on the ground
            if self.tilt_deg <= LYING_FRONT_DEG || self.tilt_deg >= LYING_BACK_DEG {
                self.tilt_deg = self.tilt_deg.max(LYING_FRONT_DEG).min(LYING_BACK_DEG);
                self.rate_dps = 0.0;
            }
        }
    }

    /// Advance the plant up to the present.
    fn tick(&mut self) {
        match self.params.fixed_step_s {
            Some(dt_s) => self.advance(dt_s),
            None => {
                let now = Instant::now();
                if let Some(last) = self.last_tick {
                    self.advance((now - last).as_secs_f64());
                }
                self.last_tick = Some(now);
            }
        }
    }

    fn signed_duty(cmd: &WheelCmd) -> f64 {
        match cmd.dir {
            Direction::Forward => cmd.duty,
            Direction::Backward => -cmd.duty,
            Direction::None => 0.0,
        }
    }
}

impl Sensors for SimPlatform {
    /// Reading the gyro moves the simulation on, it is the first reading of
    /// every cycle.
    fn read_gyro(&mut self) -> Result<f64, HalError> {
        self.tick();

        Ok(self.params.adc_mid - self.rate_dps * self.params.sensing.gyro_sensitivity)
    }

    fn read_accel(&mut self) -> Result<Vector3<f64>, HalError> {
        let t = self.tilt_deg.to_radians();
        let s = self.params.sensing.accel_sensitivity;
        let mid = self.params.adc_mid;

        Ok(Vector3::new(
            mid + t.sin() * s,
            mid + (t.cos() + 1.0) * s,
            mid,
        ))
    }

    fn set_indicator(&mut self, on: bool) {
        self.indicator = on;
    }
}

impl Actuators for SimPlatform {
    fn set_wheel_drive(&mut self, dems: &WheelDems) -> Result<(), HalError> {
        self.drive = 0.5 * (Self::signed_duty(&dems.left) + Self::signed_duty(&dems.right));
        Ok(())
    }

    fn reset_wheel_positions(&mut self) -> Result<(), HalError> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use comms_if::serial::MemLink;
    use util::archive::Archiver;

    use crate::{
        ctrl_loop::ControlLoop,
        data_store::{DataStore, LoopMode},
        hal::mock::VirtualClock,
        params::ExecParams,
        sensing::{self, CalibrationOffsets},
    };

    const DT: f64 = 0.01;

    fn fixed_step() -> SimParams {
        SimParams {
            fixed_step_s: Some(DT),
            ..SimParams::default()
        }
    }

    #[test]
    fn test_lying_reads_midpoint() {
        let mut sim = SimPlatform::new(fixed_step());

        assert_eq!(sim.read_gyro().unwrap(), 2048.0);
        assert_relative_eq!(sim.read_accel().unwrap(), Vector3::repeat(2048.0), epsilon = 1e-9);

        // Gravity holds it on the ground
        for _ in 0..100 {
            sim.read_gyro().unwrap();
        }
        assert_eq!(sim.tilt(), 180.0);
    }

    #[test]
    fn test_sensed_tilt() {
        let mut sim = SimPlatform::new(fixed_step());
        sim.place(80.0);

        let offsets = CalibrationOffsets {
            gyro: 2048.0,
            accel_x: 2048.0,
            accel_y: 2048.0,
            accel_z: 2048.0,
        };
        let params = SensingParams::default();

        let accel_g = sensing::accel_vector_g(&sim.read_accel().unwrap(), &offsets, &params);
        assert_relative_eq!(sensing::accel_angle_deg(&accel_g).unwrap(), 80.0, epsilon = 1e-9);
    }

    #[test]
    fn test_falls_without_drive() {
        let mut sim = SimPlatform::new(fixed_step());
        sim.place(88.0);

        for _ in 0..400 {
            sim.advance(DT);
        }

        assert!(sim.tilt() < 75.0);
    }

    #[test]
    fn test_forward_drive_raises_tilt() {
        let mut sim = SimPlatform::new(fixed_step());
        sim.place(85.0);

        let (dems, _) = crate::drive_map::map(1.0);
        sim.set_wheel_drive(&dems).unwrap();
        sim.advance(DT);

        assert!(sim.rate() > 0.0);

        sim.set_wheel_drive(&WheelDems::stop()).unwrap();
        sim.place(85.0);
        sim.advance(DT);

        assert!(sim.rate() < 0.0);
    }

    #[test]
    fn test_balances_in_closed_loop() {
        let mut ctrl = ControlLoop::new(
            SimPlatform::new(fixed_step()),
            MemLink::new(),
            VirtualClock::default(),
            ExecParams {
                max_cycles: Some(500),
                ..ExecParams::default()
            }
        );
        let mut ds = DataStore::default();

        ctrl.calibrate(&mut ds).unwrap();
        ctrl.hw_mut().stand_up();
        ctrl.start(&mut ds).unwrap();
        ctrl.run(&mut ds, &mut Archiver::default()).unwrap();

        assert!(!ctrl.hw().indicator());
        assert_eq!(ds.mode, LoopMode::Running);
        assert_eq!(ds.num_safety_holds, 0);
        assert!((ctrl.hw().tilt() - 90.0).abs() < 0.5, "tilt {}", ctrl.hw().tilt());
    }
}
