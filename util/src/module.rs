//! Cyclic module interface
//!
//! The estimator and the controller share one lifecycle: they are built
//! from a parameter file once, then stepped once per control cycle with a
//! borrowed input. `proc` returns both the output consumed by the next
//! stage and a status report destined for the cycle archive.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use log::info;

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A module stepped by the control loop.
pub trait State {
    /// Short name used in logs.
    const NAME: &'static str;

    /// Data needed to initialise, usually the parameter file name.
    type InitData;
    type InitError;

    type InputData;
    type OutputData;
    type StatusReport;
    type ProcError;

    /// Replace the module's state with one built from `init_data`.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>;

    /// Step the module by one control cycle.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>;
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build a module from its default state and initialise it.
pub fn init_module<S>(init_data: S::InitData, session: &Session) -> Result<S, S::InitError>
where
    S: State + Default
{
    let mut module = S::default();
    module.init(init_data, session)?;

    info!("{} init complete", S::NAME);

    Ok(module)
}
