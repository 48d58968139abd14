//! # Control loop
//!
//! Sequences one control cycle:
//!
//! 1. Read the sensors and convert them with the calibration offsets
//! 2. Run attitude estimation over the time since the last update
//! 3. Handle any tuning frame waiting on the link
//! 4. Check the pitch is inside the upright envelope, holding the vehicle
//!    safe if not
//! 5. Run balance control and drive mapping, and command the wheels
//! 6. Wait out the rest of the cycle period
//!
//! While paused by the ground station steps 3 to 5 are replaced by polling
//! the link for the resume byte, with the wheels kept stopped.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace, warn};

// Internal
use comms_if::{serial::SerialLink, tuning::RESUME_BYTE};
use util::{
    archive::Archiver,
    module::State,
    time::micros_to_seconds};

use crate::{
    att_est::{self, AttEstError},
    bal_ctrl::{self, is_upright},
    data_store::{CycleRecord, DataStore, HoldCause, LoopMode},
    drive_map::{self, WheelDems},
    hal::{Actuators, Clock, HalError, Sensors},
    params::ExecParams,
    sensing::{self, CalibrationOffsets, RawSample},
    tuning_processor::{self, TuningAction},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The balancing control loop and the resources it drives.
pub struct ControlLoop<H, L, C> {
    hw: H,
    link: L,
    clock: C,
    params: ExecParams,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which stop the control loop.
#[derive(Debug, thiserror::Error)]
pub enum CtrlLoopError {
    #[error("Hardware error: {0}")]
    Hal(#[from] HalError),

    #[error("Attitude estimation error: {0}")]
    AttEst(#[from] AttEstError),

    #[error("The sensors have not been calibrated")]
    NotCalibrated,

    #[error("Calibration is configured to take no samples")]
    NoCalibrationSamples,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<H, L, C> ControlLoop<H, L, C>
where
    H: Sensors + Actuators,
    L: SerialLink,
    C: Clock
{
    pub fn new(hw: H, link: L, clock: C, params: ExecParams) -> Self {
        Self {
            hw,
            link,
            clock,
            params,
        }
    }

    pub fn hw(&self) -> &H {
        &self.hw
    }

    pub fn hw_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    // ---- STARTUP ----

    /// Measure the sensor offsets. The vehicle must be lying still in its
    /// calibration pose.
    ///
    /// The indicator is lit while sampling.
    pub fn calibrate(&mut self, ds: &mut DataStore) -> Result<CalibrationOffsets, CtrlLoopError> {
        ds.mode = LoopMode::Calibrating;

        info!(
            "Calibrating from {} samples, keep the vehicle still",
            self.params.calib_num_samples
        );

        self.hw.set_indicator(true);
        let samples = self.take_calib_samples();
        self.hw.set_indicator(false);

        let offsets = CalibrationOffsets::from_samples(&samples?)
            .ok_or(CtrlLoopError::NoCalibrationSamples)?;

        info!("Calibration complete: {:?}", offsets);
        ds.offsets = Some(offsets);

        Ok(offsets)
    }

    /// Prepare for the first cycle once the vehicle has been stood up.
    ///
    /// Seeds the estimator with the accelerometer's angle and greets the
    /// ground station.
    pub fn start(&mut self, ds: &mut DataStore) -> Result<(), CtrlLoopError> {
        let offsets = ds.offsets.ok_or(CtrlLoopError::NotCalibrated)?;
        let raw = self.read_raw()?;

        let accel_g = sensing::accel_vector_g(&raw.accel, &offsets, &self.params.sensing);
        match sensing::accel_angle_deg(&accel_g) {
            Some(angle) => ds.att_est.set_angle(angle),
            None => warn!("No accelerometer angle at startup, estimate starts from 0"),
        }

        ds.att_est_output = att_est::OutputData {
            angle_deg: ds.att_est.angle(),
            bias_dps: ds.att_est.bias(),
        };

        tuning_processor::send_handshake(&mut self.link);
        tuning_processor::send_telemetry(ds, &mut self.link);

        let now = self.clock.now_us();
        ds.est_timer_us = now;
        ds.loop_start_us = now;
        ds.mode = LoopMode::Running;

        info!("Starting control at {:.2} deg", ds.att_est.angle());

        Ok(())
    }

    // ---- CYCLIC ----

    /// Run cycles until `max_cycles` is reached, forever if it isn't set.
    ///
    /// Each cycle is written to `archiver`. Archiving is abandoned on the
    /// first failure rather than stopping the vehicle.
    pub fn run(&mut self, ds: &mut DataStore, archiver: &mut Archiver) -> Result<(), CtrlLoopError> {
        info!("Beginning main loop");

        loop {
            if let Some(max) = self.params.max_cycles {
                if ds.num_cycles >= max {
                    info!("Reached {} cycles, stopping", max);
                    return Ok(());
                }
            }

            self.step(ds)?;

            if let Err(e) = archiver.serialise(CycleRecord::from(&*ds)) {
                warn!("Cycle archiving failed, disabling it: {}", e);
                *archiver = Archiver::default();
            }
        }
    }

    /// Execute one control cycle.
    pub fn step(&mut self, ds: &mut DataStore) -> Result<(), CtrlLoopError> {
        ds.loop_start_us = self.clock.now_us();
        ds.cycle_start();

        self.sense_and_estimate(ds)?;

        if ds.is_paused() {
            self.poll_resume(ds)?;
        }
        else {
            match tuning_processor::service(ds, &mut self.link) {
                TuningAction::Pause => self.stop_and_reset(ds, HoldCause::Paused)?,
                TuningAction::None => self.actuate(ds)?,
            }
        }

        self.enforce_cadence(ds);

        ds.num_cycles += 1;

        Ok(())
    }

    /// Apply the safety envelope to the current estimate, then either hold
    /// the vehicle or drive it.
    pub fn actuate(&mut self, ds: &mut DataStore) -> Result<(), CtrlLoopError> {
        let angle_deg = ds.att_est_output.angle_deg;

        if !is_upright(angle_deg) {
            return self.stop_and_reset(ds, HoldCause::Tilt);
        }

        let (output, report) = match ds.bal_ctrl.proc(&bal_ctrl::InputData {
            measured_angle_deg: angle_deg,
        }) {
            Ok(o) => o,
            Err(e) => match e {},
        };
        ds.bal_ctrl_output = output;
        ds.bal_ctrl_status_rpt = report;

        let (dems, report) = drive_map::map(output.drive);
        self.hw.set_wheel_drive(&dems)?;

        ds.wheel_dems = dems;
        ds.drive_map_status_rpt = report;
        ds.make_unsafe();

        trace!(
            "Angle {:.3} deg, drive {:.4}, left {:?}, right {:?}",
            angle_deg, output.drive, dems.left, dems.right
        );

        Ok(())
    }

    // ---- PRIVATE ----

    fn read_raw(&mut self) -> Result<RawSample, HalError> {
        Ok(RawSample {
            gyro: self.hw.read_gyro()?,
            accel: self.hw.read_accel()?,
        })
    }

    fn take_calib_samples(&mut self) -> Result<Vec<RawSample>, HalError> {
        let num_samples = self.params.calib_num_samples;
        let interval_us = self.params.calib_sample_interval_ms * 1000;

        let mut samples = Vec::with_capacity(num_samples);

        for _ in 0..num_samples {
            samples.push(self.read_raw()?);
            self.clock.sleep_us(interval_us);
        }

        Ok(samples)
    }

    fn sense_and_estimate(&mut self, ds: &mut DataStore) -> Result<(), CtrlLoopError> {
        let offsets = ds.offsets.ok_or(CtrlLoopError::NotCalibrated)?;
        let raw = self.read_raw()?;

        ds.gyro_rate_dps = sensing::gyro_rate_dps(raw.gyro, &offsets, &self.params.sensing);
        ds.accel_angle_deg = sensing::accel_angle_deg(
            &sensing::accel_vector_g(&raw.accel, &offsets, &self.params.sensing)
        );

        let now = self.clock.now_us();
        let dt_s = micros_to_seconds(now.saturating_sub(ds.est_timer_us));
        ds.est_timer_us = now;

        let (output, report) = ds.att_est.proc(&att_est::InputData {
            gyro_rate_dps: ds.gyro_rate_dps,
            accel_angle_deg: ds.accel_angle_deg,
            dt_s,
        })?;

        ds.att_est_output = output;
        ds.att_est_status_rpt = report;

        Ok(())
    }

    /// Stop the wheels, clear the PID and the wheel positions, and enter a
    /// safety hold.
    fn stop_and_reset(&mut self, ds: &mut DataStore, cause: HoldCause) -> Result<(), CtrlLoopError> {
        self.hw.set_wheel_drive(&WheelDems::stop())?;
        ds.wheel_dems = WheelDems::stop();

        ds.bal_ctrl.reset();
        self.hw.reset_wheel_positions()?;

        ds.make_safe(cause);

        Ok(())
    }

    /// While paused, keep the wheels stopped and look for the resume byte.
    /// Anything received before it is discarded.
    fn poll_resume(&mut self, ds: &mut DataStore) -> Result<(), CtrlLoopError> {
        self.hw.set_wheel_drive(&WheelDems::stop())?;

        let resumed = match self.link.skip_until(RESUME_BYTE) {
            Ok(r) => r,
            Err(e) => {
                warn!("Could not read from the tuning link: {}", e);
                false
            }
        };

        if resumed {
            info!("Resumed by the ground station");
            ds.bal_ctrl.reset();
            ds.mode = LoopMode::Running;
        }

        Ok(())
    }

    /// Sleep out the remainder of the cycle period, or record an overrun.
    pub(crate) fn enforce_cadence(&mut self, ds: &mut DataStore) {
        let period_us = self.params.loop_period_us;
        let elapsed_us = self.clock.now_us().saturating_sub(ds.loop_start_us);

        if elapsed_us < period_us {
            self.clock.sleep_us(period_us - elapsed_us);
            ds.num_consec_cycle_overruns = 0;
        }
        else if elapsed_us > period_us {
            ds.num_consec_cycle_overruns += 1;
            ds.num_cycle_overruns += 1;

            if ds.num_consec_cycle_overruns == 1 {
                warn!(
                    "Cycle overran by {:.6} s",
                    micros_to_seconds(elapsed_us - period_us)
                );
            }
            else {
                debug!(
                    "Cycle overran by {:.6} s, {} in a row",
                    micros_to_seconds(elapsed_us - period_us),
                    ds.num_consec_cycle_overruns
                );
            }
        }
        else {
            ds.num_consec_cycle_overruns = 0;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use comms_if::serial::MemLink;

    use crate::bal_ctrl::PidState;
    use crate::drive_map::Direction;
    use crate::hal::mock::{MockHw, VirtualClock};

    type TestLoop = ControlLoop<MockHw, MemLink, VirtualClock>;

    fn params() -> ExecParams {
        ExecParams {
            calib_num_samples: 5,
            ..ExecParams::default()
        }
    }

    /// A loop calibrated on its back and started at the given tilt, with the
    /// startup messages already taken off the link.
    fn started(tilt_deg: f64) -> (TestLoop, DataStore) {
        let mut ctrl = ControlLoop::new(
            MockHw::lying(),
            MemLink::new(),
            VirtualClock::default(),
            params()
        );
        let mut ds = DataStore::default();

        ctrl.calibrate(&mut ds).unwrap();
        ctrl.hw_mut().stand_at(tilt_deg);
        ctrl.start(&mut ds).unwrap();
        ctrl.link_mut().take_outbound();

        (ctrl, ds)
    }

    #[test]
    fn test_calibration() {
        let mut ctrl = ControlLoop::new(
            MockHw::lying(),
            MemLink::new(),
            VirtualClock::default(),
            params()
        );
        let mut ds = DataStore::default();

        let offsets = ctrl.calibrate(&mut ds).unwrap();

        assert_eq!(offsets, MockHw::offsets());
        assert_eq!(ds.offsets, Some(offsets));
        assert_eq!(ds.mode, LoopMode::Calibrating);
        assert_eq!(ctrl.hw().indicator_history, vec![true, false]);
        assert_eq!(ctrl.clock().sleeps_us, vec![10_000; 5]);
    }

    #[test]
    fn test_calibration_failure_clears_indicator() {
        let mut hw = MockHw::lying();
        hw.fail_sensors = true;

        let mut ctrl = ControlLoop::new(hw, MemLink::new(), VirtualClock::default(), params());
        let mut ds = DataStore::default();

        assert!(matches!(ctrl.calibrate(&mut ds), Err(CtrlLoopError::Hal(_))));
        assert_eq!(ctrl.hw().indicator_history, vec![true, false]);
        assert_eq!(ds.offsets, None);
    }

    #[test]
    fn test_calibration_needs_samples() {
        let mut ctrl = ControlLoop::new(
            MockHw::lying(),
            MemLink::new(),
            VirtualClock::default(),
            ExecParams {
                calib_num_samples: 0,
                ..params()
            }
        );

        assert!(matches!(
            ctrl.calibrate(&mut DataStore::default()),
            Err(CtrlLoopError::NoCalibrationSamples)
        ));
    }

    #[test]
    fn test_start_greets_ground_station() {
        let mut ctrl = ControlLoop::new(
            MockHw::lying(),
            MemLink::new(),
            VirtualClock::default(),
            params()
        );
        let mut ds = DataStore::default();

        assert!(matches!(ctrl.start(&mut ds), Err(CtrlLoopError::NotCalibrated)));

        ctrl.calibrate(&mut ds).unwrap();
        ctrl.hw_mut().stand_at(92.0);
        ctrl.start(&mut ds).unwrap();

        assert_eq!(ds.mode, LoopMode::Running);
        assert_relative_eq!(ds.att_est.angle(), 92.0, epsilon = 1e-6);
        assert_eq!(
            ctrl.link_mut().take_outbound_string(),
            "Initialized\n11.000, 2.000,12.000,90.000, 0.000, 0.000,0\n"
        );
    }

    #[test]
    fn test_step_requires_calibration() {
        let mut ctrl = ControlLoop::new(
            MockHw::standing(90.0),
            MemLink::new(),
            VirtualClock::default(),
            params()
        );

        assert!(matches!(
            ctrl.step(&mut DataStore::default()),
            Err(CtrlLoopError::NotCalibrated)
        ));
    }

    #[test]
    fn test_step_drives_wheels() {
        let (mut ctrl, mut ds) = started(85.0);
        ds.bal_ctrl.set_pid_gains(2.0, 0.5, 1.0);

        ctrl.step(&mut ds).unwrap();

        // error = 0.05, p = 0.1, i = 0.025, d = 0.05
        let dems = *ctrl.hw().last_dems().unwrap();
        assert_eq!(dems.right.dir, Direction::Forward);
        assert_relative_eq!(dems.right.duty, 0.175, epsilon = 1e-6);
        assert_relative_eq!(dems.left.duty, 0.1575, epsilon = 1e-6);

        assert_eq!(ds.mode, LoopMode::Running);
        assert_eq!(ds.wheel_dems, dems);
        assert!(!ds.safe);
        assert_eq!(ds.num_cycles, 1);
    }

    #[test]
    fn test_envelope_boundaries_keep_driving() {
        for &angle in &[75.0, 90.0, 105.0] {
            let (mut ctrl, mut ds) = started(90.0);
            ds.att_est_output.angle_deg = angle;

            ctrl.actuate(&mut ds).unwrap();

            assert_eq!(ds.mode, LoopMode::Running, "angle {}", angle);
            assert!(!ds.safe);
            assert_eq!(ctrl.hw().position_resets, 0);
        }
    }

    #[test]
    fn test_envelope_violation_holds() {
        for &angle in &[74.9, 105.1, 30.0, 150.0] {
            let (mut ctrl, mut ds) = started(90.0);

            // Build up some PID state first
            ds.att_est_output.angle_deg = 88.0;
            ctrl.actuate(&mut ds).unwrap();
            assert_ne!(ds.bal_ctrl.pid_state(), PidState::default());

            ds.att_est_output.angle_deg = angle;
            ctrl.actuate(&mut ds).unwrap();

            assert_eq!(ds.mode, LoopMode::SafetyHold(HoldCause::Tilt), "angle {}", angle);
            assert!(ctrl.hw().last_dems().unwrap().is_stopped());
            assert_eq!(ds.bal_ctrl.pid_state(), PidState::default());
            assert_eq!(ctrl.hw().position_resets, 1);
            assert_eq!(ds.num_safety_holds, 1);
        }
    }

    #[test]
    fn test_tilt_hold_repeats_until_upright() {
        let (mut ctrl, mut ds) = started(90.0);
        ctrl.step(&mut ds).unwrap();
        assert!(!ds.safe);

        ctrl.hw_mut().stand_at(60.0);
        ds.att_est.set_angle(60.0);

        for _ in 0..3 {
            ctrl.step(&mut ds).unwrap();
            assert_eq!(ds.mode, LoopMode::SafetyHold(HoldCause::Tilt));
            assert!(ctrl.hw().last_dems().unwrap().is_stopped());
        }
        assert_eq!(ctrl.hw().position_resets, 3);
        assert_eq!(ds.num_safety_holds, 1);

        ctrl.hw_mut().stand_at(90.0);
        ds.att_est.set_angle(90.0);
        ctrl.step(&mut ds).unwrap();

        assert_eq!(ds.mode, LoopMode::Running);
        assert!(!ds.safe);
    }

    #[test]
    fn test_tuning_frames_applied_in_cycle() {
        let (mut ctrl, mut ds) = started(90.0);

        ctrl.link_mut().push_inbound(b"1,2.000,0.500,1.000");
        ctrl.step(&mut ds).unwrap();

        let p = *ds.bal_ctrl.params();
        assert_eq!((p.k_p, p.k_i, p.k_d), (2.0, 0.5, 1.0));
        assert_eq!(p.target_angle_deg, 90.0);

        ctrl.link_mut().push_inbound(b"2,110.0");
        ctrl.step(&mut ds).unwrap();
        assert_eq!(ds.bal_ctrl.params().target_angle_deg, 90.0);

        ctrl.link_mut().push_inbound(b"G");
        ctrl.step(&mut ds).unwrap();
        assert_eq!(
            ctrl.link_mut().take_outbound_string(),
            " 2.000, 0.500, 1.000,90.000, 0.000, 0.000,0\nInitialized\n"
        );

        ctrl.link_mut().push_inbound(b"2,1x");
        ctrl.step(&mut ds).unwrap();
        assert_eq!(ds.num_rejected_frames, 1);
        assert_eq!(ds.mode, LoopMode::Running);
    }

    #[test]
    fn test_pause_and_resume() {
        let (mut ctrl, mut ds) = started(88.0);

        for _ in 0..5 {
            ctrl.step(&mut ds).unwrap();
        }
        assert_ne!(ds.bal_ctrl.pid_state(), PidState::default());

        ctrl.link_mut().push_inbound(b"A");
        ctrl.step(&mut ds).unwrap();

        assert!(ds.is_paused());
        assert!(ctrl.hw().last_dems().unwrap().is_stopped());
        assert_eq!(ds.bal_ctrl.pid_state(), PidState::default());
        assert_eq!(ctrl.hw().position_resets, 1);

        // Frames sent while paused are thrown away, the estimator keeps going
        let params_before = *ds.bal_ctrl.params();
        let cycles_before = ds.num_cycles;
        ctrl.link_mut().push_inbound(b"1,9,9,9");
        ctrl.step(&mut ds).unwrap();
        ctrl.step(&mut ds).unwrap();

        assert!(ds.is_paused());
        assert_eq!(*ds.bal_ctrl.params(), params_before);
        assert_eq!(ds.num_cycles, cycles_before + 2);
        assert!(ctrl.hw().last_dems().unwrap().is_stopped());
        assert_relative_eq!(ds.att_est_output.angle_deg, 88.0, epsilon = 1e-6);

        ctrl.link_mut().push_inbound(b"C");
        ctrl.step(&mut ds).unwrap();

        assert_eq!(ds.mode, LoopMode::Running);
        assert!(ctrl.hw().last_dems().unwrap().is_stopped());

        // First cycle after the resume starts from a clean PID
        assert_eq!(ds.bal_ctrl.pid_state(), PidState::default());
        ctrl.step(&mut ds).unwrap();
        assert!(!ctrl.hw().last_dems().unwrap().is_stopped());
    }

    #[test]
    fn test_cadence() {
        let (mut ctrl, mut ds) = started(90.0);

        ctrl.step(&mut ds).unwrap();
        assert_eq!(ctrl.clock().sleeps_us.last(), Some(&10_000));

        // Overrun: nothing to sleep
        let num_sleeps = ctrl.clock().sleeps_us.len();
        ds.loop_start_us = ctrl.clock().now_us;
        ctrl.clock_mut().now_us += 12_000;
        ctrl.enforce_cadence(&mut ds);
        ctrl.enforce_cadence(&mut ds);

        assert_eq!(ctrl.clock().sleeps_us.len(), num_sleeps);
        assert_eq!(ds.num_cycle_overruns, 2);
        assert_eq!(ds.num_consec_cycle_overruns, 2);

        // Partial cycle
        ds.loop_start_us = ctrl.clock().now_us;
        ctrl.clock_mut().now_us += 4_000;
        ctrl.enforce_cadence(&mut ds);

        assert_eq!(ctrl.clock().sleeps_us.last(), Some(&6_000));
        assert_eq!(ds.num_consec_cycle_overruns, 0);
        assert_eq!(ds.num_cycle_overruns, 2);
    }

    #[test]
    fn test_estimator_sees_cycle_time() {
        let (mut ctrl, mut ds) = started(90.0);
        ctrl.hw_mut().gyro_rate_dps = 10.0;

        // No time has passed since start, so the first cycle can't move
        ctrl.step(&mut ds).unwrap();
        assert_relative_eq!(ds.gyro_rate_dps, 10.0, epsilon = 1e-9);
        assert_relative_eq!(ds.att_est_output.angle_deg, 90.0, epsilon = 1e-6);

        // One full period later the gyro has been integrated
        ctrl.step(&mut ds).unwrap();
        assert!(ds.att_est_output.angle_deg > 90.05);
        assert!(ds.att_est_output.angle_deg < 90.1 + 1e-9);
    }

    #[test]
    fn test_sensor_failure_stops_loop() {
        let (mut ctrl, mut ds) = started(90.0);
        ctrl.hw_mut().fail_sensors = true;

        assert!(matches!(ctrl.step(&mut ds), Err(CtrlLoopError::Hal(_))));
    }

    #[test]
    fn test_actuator_failure_stops_loop() {
        let (mut ctrl, mut ds) = started(90.0);
        ctrl.hw_mut().fail_actuators = true;

        assert!(matches!(
            ctrl.step(&mut ds),
            Err(CtrlLoopError::Hal(HalError::ActuatorError(_)))
        ));

        let mut archiver = Archiver::default();
        assert!(ctrl.run(&mut ds, &mut archiver).is_err());
    }

    #[test]
    fn test_bad_gyro_sample_keeps_running() {
        let (mut ctrl, mut ds) = started(90.0);
        ctrl.hw_mut().gyro_rate_dps = std::f64::NAN;

        ctrl.step(&mut ds).unwrap();

        assert!(ds.att_est_status_rpt.prediction_skipped);
        assert!(!ds.att_est_status_rpt.correction_skipped);
        assert_eq!(ds.mode, LoopMode::Running);
        assert_relative_eq!(ds.att_est_output.angle_deg, 90.0, epsilon = 1e-6);

        ctrl.hw_mut().gyro_rate_dps = 0.0;
        ctrl.step(&mut ds).unwrap();
        assert!(!ds.att_est_status_rpt.prediction_skipped);
    }

    #[test]
    fn test_run_to_max_cycles() {
        let (mut ctrl, mut ds) = started(90.0);
        ctrl.params.max_cycles = Some(7);

        ctrl.run(&mut ds, &mut Archiver::default()).unwrap();

        assert_eq!(ds.num_cycles, 7);
        assert_eq!(ctrl.hw().wheel_dems.len(), 7);
    }
}
