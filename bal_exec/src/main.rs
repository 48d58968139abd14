//! Main balancing vehicle executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Calibrate the sensors with the vehicle lying on its back
//!     - Greet the ground station
//!     - Main loop:
//!         - Sensor acquisition
//!         - Attitude estimation
//!         - Tuning frame processing
//!         - Safety envelope check
//!         - Balance control processing
//!         - Drive mapping and wheel commands
//!
//! # Modules
//!
//! All cyclic modules (e.g. `bal_ctrl`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.
//!

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::Report;
#[cfg(feature = "sim")]
use color_eyre::eyre::WrapErr;
#[cfg(not(feature = "sim"))]
use color_eyre::eyre::eyre;
#[cfg(feature = "sim")]
use log::info;

// Internal
#[cfg(feature = "sim")]
use bal_lib::{
    att_est::AttEst,
    bal_ctrl::BalCtrl,
    ctrl_loop::ControlLoop,
    data_store::DataStore,
    hal::SystemClock,
    params::ExecParams,
    sim::{SimParams, SimPlatform},
};
#[cfg(feature = "sim")]
use comms_if::serial::{MemLink, SerialLink, SerialPortLink};
#[cfg(feature = "sim")]
use util::{
    archive::Archiver,
    module::init_module,
    logger::logger_init,
    session::Session};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
#[cfg(feature = "sim")]
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "bal_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Exec parameters hold the log levels so must come first
    let exec_params: ExecParams = util::params::load(
        "bal_exec.toml"
    ).wrap_err("Could not load exec params")?;

    // Initialise logger
    logger_init(exec_params.log_levels, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Balancing Vehicle Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let sim_params: SimParams = util::params::load(
        "sim.toml"
    ).wrap_err("Could not load sim params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let att_est: AttEst = init_module("att_est.toml", &session)
        .wrap_err("Failed to initialise AttEst")?;

    let bal_ctrl: BalCtrl = init_module("bal_ctrl.toml", &session)
        .wrap_err("Failed to initialise BalCtrl")?;

    let mut ds = DataStore::new(att_est, bal_ctrl);

    info!("Module initialisation complete\n");

    // ---- INITIALISE TUNING LINK ----

    let link: Box<dyn SerialLink> = match exec_params.tuning_port {
        Some(ref port) => Box::new(
            SerialPortLink::open(port, exec_params.tuning_baud)
                .wrap_err("Failed to open the tuning link")?
        ),
        None => {
            info!("No tuning port configured, running untuned");
            Box::new(MemLink::new())
        }
    };

    let mut archiver = if exec_params.archive_cycles {
        Archiver::from_path(&session, "ctrl_loop/cycles.csv")
            .wrap_err("Failed to create the cycle archive")?
    }
    else {
        Archiver::default()
    };

    let mut ctrl = ControlLoop::new(
        SimPlatform::new(sim_params),
        link,
        SystemClock::new(),
        exec_params
    );

    // ---- CALIBRATION ----

    let offsets = ctrl.calibrate(&mut ds)
        .wrap_err("Sensor calibration failed")?;
    session.save("calib/offsets.json", offsets);

    ctrl.hw_mut().stand_up();

    // ---- MAIN LOOP ----

    ctrl.start(&mut ds)
        .wrap_err("Failed to start the control loop")?;

    let result = ctrl.run(&mut ds, &mut archiver);

    // ---- SHUTDOWN ----

    info!(
        "Ran {} cycles, {} overruns, {} safety holds, {} rejected frames",
        ds.num_cycles,
        ds.num_cycle_overruns,
        ds.num_safety_holds,
        ds.num_rejected_frames
    );
    session.save("summary.json", ds.summary());
    session.exit();

    result.wrap_err("Control loop stopped")
}

/// Without the simulated plant there is no platform to run on.
#[cfg(not(feature = "sim"))]
fn main() -> Result<(), Report> {
    Err(eyre!(
        "No hardware platform is available in this build, enable the \"sim\" feature"
    ))
}
