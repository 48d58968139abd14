//! # Tuning processor module
//!
//! Applies tuning frames from the ground station to the data store and
//! answers them on the same link.
//!
//! Whatever is waiting on the link at the start of a cycle is taken as one
//! frame. The ground station sends at most one frame per cycle and never
//! terminates them, so no further framing is needed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};

// Internal
use comms_if::{
    serial::SerialLink,
    tuning::{TuningCmd, HANDSHAKE_REPLY},
};
use crate::data_store::DataStore;

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// What the control loop has to do after a frame was handled.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum TuningAction {
    /// Carry on with the cycle.
    None,

    /// Stop the wheels and wait for the resume byte.
    Pause,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Take any waiting frame off the link and execute it.
///
/// Malformed frames are logged, counted and otherwise ignored. Link errors
/// are logged and treated as no frame.
pub fn service<L: SerialLink + ?Sized>(ds: &mut DataStore, link: &mut L) -> TuningAction {
    let frame = match link.drain() {
        Ok(Some(f)) => f,
        Ok(None) => return TuningAction::None,
        Err(e) => {
            warn!("Could not read from the tuning link: {}", e);
            return TuningAction::None;
        }
    };

    match TuningCmd::parse(&frame) {
        Ok(cmd) => exec(ds, &cmd, link),
        Err(e) => {
            ds.num_rejected_frames += 1;
            warn!(
                "Rejected tuning frame {:?}: {}",
                String::from_utf8_lossy(&frame),
                e
            );
            TuningAction::None
        }
    }
}

/// Execute a tuning command.
///
/// Mutates the datastore to update the control parameters.
pub fn exec<L: SerialLink + ?Sized>(
    ds: &mut DataStore,
    cmd: &TuningCmd,
    link: &mut L
) -> TuningAction {

    let mut action = TuningAction::None;

    match *cmd {
        TuningCmd::SetPidGains { k_p, k_i, k_d } => {
            debug!("PID gains set to {}, {}, {}", k_p, k_i, k_d);
            ds.bal_ctrl.set_pid_gains(k_p, k_i, k_d);
        },
        TuningCmd::SetTargetAngle { target_angle_deg } => {
            if ds.bal_ctrl.set_target_angle(target_angle_deg) {
                debug!("Target angle set to {}", target_angle_deg);
            }
            else {
                warn!(
                    "Target angle {} is outside the upright envelope, using {}",
                    target_angle_deg,
                    ds.bal_ctrl.params().target_angle_deg
                );
            }
        },
        TuningCmd::SetWheelGains { wheel_k_p, wheel_k_d } => {
            debug!("Wheel gains set to {}, {}", wheel_k_p, wheel_k_d);
            ds.bal_ctrl.set_wheel_gains(wheel_k_p, wheel_k_d);
        },
        TuningCmd::SetTargetPosition { target_position } => {
            debug!("Target position set to {}", target_position);
            ds.bal_ctrl.set_target_position(target_position);
        },
        TuningCmd::Pause => {
            info!("Pause requested by the ground station");
            action = TuningAction::Pause;
        },
        TuningCmd::Handshake => {
            info!("Handshake from the ground station");
        }
    }

    if cmd.echoes_telemetry() {
        send_telemetry(ds, link);
    }

    if let TuningCmd::Handshake = cmd {
        send_handshake(link);
    }

    action
}

/// Report the current control parameters to the ground station.
pub fn send_telemetry<L: SerialLink + ?Sized>(ds: &DataStore, link: &mut L) {
    let frame = ds.bal_ctrl.params().telemetry().to_frame();
    send(link, frame.as_bytes());
}

/// Send the handshake reply to the ground station.
pub fn send_handshake<L: SerialLink + ?Sized>(link: &mut L) {
    send(link, HANDSHAKE_REPLY.as_bytes());
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn send<L: SerialLink + ?Sized>(link: &mut L, data: &[u8]) {
    if let Err(e) = link.write_all(data) {
        warn!("Could not write to the tuning link: {}", e);
    }
}
