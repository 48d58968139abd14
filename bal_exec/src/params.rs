//! # Balance Executable Parameters
//!
//! This module provides parameters for the balance executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::sensing::SensingParams;
use util::logger::LogLevels;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExecParams {

    /// Target period of one control cycle.
    ///
    /// Units: microseconds
    pub loop_period_us: u64,

    /// Number of readings averaged per channel during calibration.
    pub calib_num_samples: usize,

    /// Time between two calibration readings.
    ///
    /// Units: milliseconds
    pub calib_sample_interval_ms: u64,

    /// Serial device the ground station is attached to. Without one the
    /// loop runs untuned with the parameters from `bal_ctrl.toml`.
    #[serde(default)]
    pub tuning_port: Option<String>,

    /// Symbol rate of the tuning link.
    #[serde(default = "default_baud")]
    pub tuning_baud: u32,

    /// Stop after this many control cycles. Runs forever if not set.
    #[serde(default)]
    pub max_cycles: Option<u64>,

    /// Write a CSV record of every control cycle into the session archive.
    #[serde(default)]
    pub archive_cycles: bool,

    /// Minimum levels of the diagnostic channel and the log file.
    #[serde(default)]
    pub log_levels: LogLevels,

    /// Raw sensor scaling.
    #[serde(default)]
    pub sensing: SensingParams,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for ExecParams {
    fn default() -> Self {
        Self {
            loop_period_us: 10_000,
            calib_num_samples: 100,
            calib_sample_interval_ms: 10,
            tuning_port: None,
            tuning_baud: default_baud(),
            max_cycles: None,
            archive_cycles: false,
            log_levels: LogLevels::default(),
            sensing: SensingParams::default(),
        }
    }
}

fn default_baud() -> u32 {
    comms_if::serial::DEFAULT_BAUD
}
