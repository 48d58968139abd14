//! Implementations for the BalCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use serde::Serialize;
use std::convert::Infallible;

// Internal
use super::{is_upright, Params, ERROR_SCALE, REST_ANGLE_DEG};
use util::{
    params,
    module::State,
    session::Session};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Balance control module state
#[derive(Debug, Default)]
pub struct BalCtrl {

    pub(crate) params: Params,

    pub(crate) report: StatusReport,

    pid: PidState,
}

/// Running state of the PID, carried from one cycle to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PidState {
    /// Accumulated integral term. Not bounded.
    pub integral: f64,

    /// Scaled error of the previous update.
    pub prev_error: f64,
}

/// Input data to balance control.
#[derive(Debug, Clone, Copy)]
pub struct InputData {
    /// Units: degrees
    pub measured_angle_deg: f64,
}

/// Output of balance control.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OutputData {
    /// Signed drive demand, positive drives forwards.
    pub drive: f64,
}

/// Status report for BalCtrl processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// Scaled angle error.
    pub error: f64,

    pub p_term: f64,
    pub i_term: f64,
    pub d_term: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl BalCtrl {
    pub fn new(params: Params) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn pid_state(&self) -> PidState {
        self.pid
    }

    /// Compute the drive demand for one cycle.
    pub fn update(&mut self, target_angle_deg: f64, measured_angle_deg: f64) -> f64 {
        let error = (target_angle_deg - measured_angle_deg) / ERROR_SCALE;

        self.pid.integral += self.params.k_i * error;
        let derivative = self.params.k_d * (error - self.pid.prev_error);
        self.pid.prev_error = error;

        let proportional = self.params.k_p * error;

        self.report = StatusReport {
            error,
            p_term: proportional,
            i_term: self.pid.integral,
            d_term: derivative,
        };

        proportional + self.pid.integral + derivative
    }

    /// Zero the integral and the remembered error.
    pub fn reset(&mut self) {
        self.pid = PidState::default();
    }

    pub fn set_pid_gains(&mut self, k_p: f64, k_i: f64, k_d: f64) {
        self.params.k_p = k_p;
        self.params.k_i = k_i;
        self.params.k_d = k_d;
    }

    /// Set the target pitch. A target outside the upright envelope is
    /// replaced by the rest angle, in which case `false` is returned.
    pub fn set_target_angle(&mut self, target_angle_deg: f64) -> bool {
        if is_upright(target_angle_deg) {
            self.params.target_angle_deg = target_angle_deg;
            true
        }
        else {
            self.params.target_angle_deg = REST_ANGLE_DEG;
            false
        }
    }

    pub fn set_wheel_gains(&mut self, wheel_k_p: f64, wheel_k_d: f64) {
        self.params.wheel_k_p = wheel_k_p;
        self.params.wheel_k_d = wheel_k_d;
    }

    pub fn set_target_position(&mut self, target_position: i64) {
        self.params.target_position = target_position;
    }
}

impl State for BalCtrl {
    const NAME: &'static str = "BalCtrl";

    type InitData = &'static str;
    type InitError = params::LoadError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = Infallible;

    /// Initialise the BalCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, _session: &Session)
        -> Result<(), Self::InitError>
    {
        let loaded: Params = params::load(init_data)?;

        *self = Self::new(loaded);

        if !self.set_target_angle(loaded.target_angle_deg) {
            warn!(
                "Configured target angle {} is outside the upright envelope, using {}",
                loaded.target_angle_deg, REST_ANGLE_DEG
            );
        }

        debug!("BalCtrl initialised with {:?}", self.params);

        Ok(())
    }

    /// Run the PID against the configured target angle.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let drive = self.update(self.params.target_angle_deg, input_data.measured_angle_deg);

        Ok((OutputData { drive }, self.report))
    }
}
