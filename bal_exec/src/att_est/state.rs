//! Implementations for the AttEst state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{trace, warn};
use nalgebra::Matrix2;
use serde::Serialize;

// Internal
use super::{AttEstError, Params};
use util::{
    params,
    module::State,
    session::Session};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Attitude estimation module state
pub struct AttEst {

    pub(crate) params: Params,

    pub(crate) report: StatusReport,

    /// Estimated pitch angle.
    ///
    /// Units: degrees
    angle_deg: f64,

    /// Estimated gyro bias.
    ///
    /// Units: degrees/second
    bias_dps: f64,

    /// Error covariance of (angle, bias).
    p: Matrix2<f64>,
}

/// Input data to attitude estimation.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// Calibrated gyro pitch rate.
    ///
    /// Units: degrees/second
    pub gyro_rate_dps: f64,

    /// Tilt measured by the accelerometer, or `None` if this cycle's reading
    /// couldn't produce one.
    ///
    /// Units: degrees
    pub accel_angle_deg: Option<f64>,

    /// Time since the previous estimator update.
    ///
    /// Units: seconds
    pub dt_s: f64,
}

/// Output of attitude estimation.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OutputData {
    /// Units: degrees
    pub angle_deg: f64,

    /// Units: degrees/second
    pub bias_dps: f64,
}

/// Status report for AttEst processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// The gyro rate was not finite so the state was not propagated.
    pub prediction_skipped: bool,

    /// No accelerometer angle was available so only the prediction ran.
    pub correction_skipped: bool,

    /// Measured minus predicted angle.
    ///
    /// Units: degrees
    pub innovation_deg: f64,

    pub gain_angle: f64,
    pub gain_bias: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for AttEst {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

impl AttEst {
    /// Create a new estimator at angle zero with no bias.
    pub fn new(params: Params) -> Self {
        let c = params.init_covariance;

        Self {
            p: Matrix2::new(c[0][0], c[0][1], c[1][0], c[1][1]),
            params,
            report: StatusReport::default(),
            angle_deg: 0.0,
            bias_dps: 0.0,
        }
    }

    /// Overwrite the angle estimate, leaving the bias and covariance alone.
    pub fn set_angle(&mut self, angle_deg: f64) {
        self.angle_deg = angle_deg;
    }

    pub fn angle(&self) -> f64 {
        self.angle_deg
    }

    pub fn bias(&self) -> f64 {
        self.bias_dps
    }

    pub fn covariance(&self) -> &Matrix2<f64> {
        &self.p
    }

    /// Propagate the state and covariance forward by `dt_s` using the gyro.
    pub fn predict(&mut self, gyro_rate_dps: f64, dt_s: f64) -> Result<(), AttEstError> {
        if !dt_s.is_finite() || dt_s < 0.0 {
            return Err(AttEstError::InvalidDt(dt_s));
        }
        if !gyro_rate_dps.is_finite() {
            return Err(AttEstError::InvalidRate(gyro_rate_dps));
        }

        self.angle_deg += dt_s * (gyro_rate_dps - self.bias_dps);

        let p01 = self.p[(0, 1)];
        let p10 = self.p[(1, 0)];
        let p11 = self.p[(1, 1)];

        self.p[(0, 0)] += -dt_s * (p10 + p01) + self.params.q_angle * dt_s;
        self.p[(0, 1)] += -dt_s * p11;
        self.p[(1, 0)] += -dt_s * p11;
        self.p[(1, 1)] += self.params.q_gyro * dt_s;

        Ok(())
    }

    /// Fuse a measured angle into the estimate and return the new angle.
    ///
    /// The covariance update uses the prior `P00` and `P01` throughout, so a
    /// symmetric covariance stays symmetric.
    pub fn correct(&mut self, measured_angle_deg: f64) -> f64 {
        let p00 = self.p[(0, 0)];
        let p01 = self.p[(0, 1)];
        let p10 = self.p[(1, 0)];

        let s = p00 + self.params.r_angle;
        let k0 = p00 / s;
        let k1 = p10 / s;

        let y = measured_angle_deg - self.angle_deg;

        self.angle_deg += k0 * y;
        self.bias_dps += k1 * y;

        self.p[(0, 0)] -= k0 * p00;
        self.p[(0, 1)] -= k0 * p01;
        self.p[(1, 0)] -= k1 * p00;
        self.p[(1, 1)] -= k1 * p01;

        self.report.innovation_deg = y;
        self.report.gain_angle = k0;
        self.report.gain_bias = k1;

        self.angle_deg
    }

    fn output(&self) -> OutputData {
        OutputData {
            angle_deg: self.angle_deg,
            bias_dps: self.bias_dps,
        }
    }
}

impl State for AttEst {
    const NAME: &'static str = "AttEst";

    type InitData = &'static str;
    type InitError = AttEstError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = AttEstError;

    /// Initialise the AttEst module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, _session: &Session)
        -> Result<(), Self::InitError>
    {
        let params: Params = params::load(init_data)?;

        if !(params.r_angle > 0.0) {
            return Err(AttEstError::InvalidParams("r_angle must be positive"));
        }
        if !(params.q_angle >= 0.0 && params.q_gyro >= 0.0) {
            return Err(AttEstError::InvalidParams("process noise must not be negative"));
        }

        *self = Self::new(params);

        Ok(())
    }

    /// Predict with the gyro if its rate is usable, then correct with the accelerometer if a
    /// measurement is available.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        self.report = StatusReport::default();

        if input_data.gyro_rate_dps.is_finite() {
            self.predict(input_data.gyro_rate_dps, input_data.dt_s)?;
        }
        else {
            warn!("Gyro rate {} is not finite, skipping the prediction", input_data.gyro_rate_dps);
            self.report.prediction_skipped = true;
        }

        match input_data.accel_angle_deg {
            Some(m) if m.is_finite() => {
                self.correct(m);
            },
            _ => {
                trace!("No accelerometer angle, skipping the correction");
                self.report.correction_skipped = true;
            }
        }

        Ok((self.output(), self.report))
    }
}
