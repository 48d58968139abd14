//! # Data Store
//!
//! Everything the control loop carries from one cycle to the next lives in
//! the [`DataStore`], which is owned by `main` and handed to the loop.

use log::{info, warn};
use serde::Serialize;

use crate::{
    att_est,
    bal_ctrl,
    drive_map::{self, Direction, WheelDems},
    sensing::CalibrationOffsets,
};

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// Phase of the control loop.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize)]
pub enum LoopMode {
    /// Measuring the sensor offsets, entered once at startup.
    Calibrating,

    /// Balancing.
    Running,

    /// Wheels stopped, for the given reason.
    SafetyHold(HoldCause),
}

/// Gives the reason the vehicle has been put into a safety hold
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize)]
pub enum HoldCause {
    /// The estimated pitch left the upright envelope. Cleared on the next
    /// cycle, and raised again for as long as the vehicle stays tilted.
    Tilt,

    /// The ground station paused the vehicle. Cleared only by the resume
    /// byte.
    Paused,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u64,

    /// Session time at the start of this cycle
    pub time_s: f64,

    pub mode: LoopMode,

    // Safe mode variables
    /// True from a safety hold until the wheels are next driven.
    pub safe: bool,

    // Sensing
    pub offsets: Option<CalibrationOffsets>,
    pub gyro_rate_dps: f64,
    pub accel_angle_deg: Option<f64>,

    // AttEst
    pub att_est: att_est::AttEst,
    pub att_est_output: att_est::OutputData,
    pub att_est_status_rpt: att_est::StatusReport,

    // BalCtrl
    pub bal_ctrl: bal_ctrl::BalCtrl,
    pub bal_ctrl_output: bal_ctrl::OutputData,
    pub bal_ctrl_status_rpt: bal_ctrl::StatusReport,

    // DriveMap
    pub wheel_dems: WheelDems,
    pub drive_map_status_rpt: drive_map::StatusReport,

    // Timers
    /// Clock reading of the last estimator update
    ///
    /// Units: microseconds
    pub est_timer_us: u64,

    /// Clock reading at the start of this cycle
    ///
    /// Units: microseconds
    pub loop_start_us: u64,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,

    /// Total number of cycle overruns
    pub num_cycle_overruns: u64,

    /// Number of times a safety hold was entered from a driving state
    pub num_safety_holds: u64,

    /// Number of tuning frames discarded as malformed
    pub num_rejected_frames: u64,
}

/// Flat record of a single cycle, written to the cycle archive.
#[derive(Debug, Serialize)]
pub struct CycleRecord {
    pub num_cycles: u64,
    pub time_s: f64,
    pub mode: String,
    pub gyro_rate_dps: f64,
    pub accel_angle_deg: Option<f64>,
    pub angle_deg: f64,
    pub bias_dps: f64,
    pub innovation_deg: f64,
    pub prediction_skipped: bool,
    pub correction_skipped: bool,
    pub error: f64,
    pub p_term: f64,
    pub i_term: f64,
    pub d_term: f64,
    pub drive: f64,
    pub left_dir: Direction,
    pub left_duty: f64,
    pub right_dir: Direction,
    pub right_duty: f64,
}

/// End of session summary.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub num_cycles: u64,
    pub num_cycle_overruns: u64,
    pub num_safety_holds: u64,
    pub num_rejected_frames: u64,
    pub offsets: Option<CalibrationOffsets>,
    pub bal_ctrl_params: bal_ctrl::Params,
    pub final_angle_deg: f64,
    pub final_bias_dps: f64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Default for DataStore {
    fn default() -> Self {
        Self {
            num_cycles: 0,
            time_s: 0.0,
            mode: LoopMode::Calibrating,
            safe: true,
            offsets: None,
            gyro_rate_dps: 0.0,
            accel_angle_deg: None,
            att_est: att_est::AttEst::default(),
            att_est_output: att_est::OutputData::default(),
            att_est_status_rpt: att_est::StatusReport::default(),
            bal_ctrl: bal_ctrl::BalCtrl::default(),
            bal_ctrl_output: bal_ctrl::OutputData::default(),
            bal_ctrl_status_rpt: bal_ctrl::StatusReport::default(),
            wheel_dems: WheelDems::stop(),
            drive_map_status_rpt: drive_map::StatusReport::default(),
            est_timer_us: 0,
            loop_start_us: 0,
            num_consec_cycle_overruns: 0,
            num_cycle_overruns: 0,
            num_safety_holds: 0,
            num_rejected_frames: 0,
        }
    }
}

impl DataStore {
    /// Create a data store around already initialised modules.
    pub fn new(att_est: att_est::AttEst, bal_ctrl: bal_ctrl::BalCtrl) -> Self {
        Self {
            att_est,
            bal_ctrl,
            ..Default::default()
        }
    }

    /// Puts the vehicle into a safety hold with the given cause.
    pub fn make_safe(&mut self, cause: HoldCause) {
        if !self.safe {
            warn!(
                "Safety hold at {:.2} deg, cause: {:?}",
                self.att_est_output.angle_deg, cause
            );
            self.num_safety_holds += 1;
        }

        self.safe = true;
        self.mode = LoopMode::SafetyHold(cause);
    }

    /// Clears safe mode once the wheels are being driven again.
    pub fn make_unsafe(&mut self) {
        if self.safe {
            info!(
                "Driving at {:.2} deg, safety hold cleared",
                self.att_est_output.angle_deg
            );
            self.safe = false;
        }
    }

    pub fn is_paused(&self) -> bool {
        self.mode == LoopMode::SafetyHold(HoldCause::Paused)
    }

    /// Perform actions required at the start of a cycle.
    ///
    /// Clears the per cycle outputs and lifts a tilt hold, which only lasts a
    /// single cycle.
    pub fn cycle_start(&mut self) {
        if self.mode == LoopMode::SafetyHold(HoldCause::Tilt) {
            self.mode = LoopMode::Running;
        }

        self.att_est_status_rpt = att_est::StatusReport::default();
        self.bal_ctrl_output = bal_ctrl::OutputData::default();
        self.bal_ctrl_status_rpt = bal_ctrl::StatusReport::default();
        self.wheel_dems = WheelDems::stop();
        self.drive_map_status_rpt = drive_map::StatusReport::default();

        self.time_s = util::session::get_elapsed_seconds();
    }

    pub fn summary(&self) -> Summary {
        Summary {
            num_cycles: self.num_cycles,
            num_cycle_overruns: self.num_cycle_overruns,
            num_safety_holds: self.num_safety_holds,
            num_rejected_frames: self.num_rejected_frames,
            offsets: self.offsets,
            bal_ctrl_params: *self.bal_ctrl.params(),
            final_angle_deg: self.att_est_output.angle_deg,
            final_bias_dps: self.att_est_output.bias_dps,
        }
    }
}

impl From<&DataStore> for CycleRecord {
    fn from(ds: &DataStore) -> Self {
        Self {
            num_cycles: ds.num_cycles,
            time_s: ds.time_s,
            mode: format!("{:?}", ds.mode),
            gyro_rate_dps: ds.gyro_rate_dps,
            accel_angle_deg: ds.accel_angle_deg,
            angle_deg: ds.att_est_output.angle_deg,
            bias_dps: ds.att_est_output.bias_dps,
            innovation_deg: ds.att_est_status_rpt.innovation_deg,
            prediction_skipped: ds.att_est_status_rpt.prediction_skipped,
            correction_skipped: ds.att_est_status_rpt.correction_skipped,
            error: ds.bal_ctrl_status_rpt.error,
            p_term: ds.bal_ctrl_status_rpt.p_term,
            i_term: ds.bal_ctrl_status_rpt.i_term,
            d_term: ds.bal_ctrl_status_rpt.d_term,
            drive: ds.bal_ctrl_output.drive,
            left_dir: ds.wheel_dems.left.dir,
            left_duty: ds.wheel_dems.left.duty,
            right_dir: ds.wheel_dems.right.dir,
            right_duty: ds.wheel_dems.right.duty,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tilt_hold_lasts_one_cycle() {
        let mut ds = DataStore::default();
        ds.mode = LoopMode::Running;
        ds.make_unsafe();

        ds.make_safe(HoldCause::Tilt);
        assert_eq!(ds.mode, LoopMode::SafetyHold(HoldCause::Tilt));
        assert_eq!(ds.num_safety_holds, 1);

        ds.cycle_start();
        assert_eq!(ds.mode, LoopMode::Running);

        // Still tilted, a repeated hold isn't counted again
        ds.make_safe(HoldCause::Tilt);
        assert_eq!(ds.num_safety_holds, 1);
    }

    #[test]
    fn test_pause_survives_cycle_start() {
        let mut ds = DataStore::default();
        ds.mode = LoopMode::Running;

        ds.make_safe(HoldCause::Paused);
        ds.cycle_start();

        assert!(ds.is_paused());
        assert!(ds.safe);
    }

    #[test]
    fn test_cycle_record() {
        let mut ds = DataStore::default();
        ds.num_cycles = 12;
        ds.accel_angle_deg = Some(88.0);

        let rec = CycleRecord::from(&ds);
        assert_eq!(rec.num_cycles, 12);
        assert_eq!(rec.mode, "Calibrating");
        assert_eq!(rec.accel_angle_deg, Some(88.0));
        assert_eq!(rec.left_dir, Direction::None);
    }
}
