//! # Communications interface crate.
//!
//! Provides the tuning/telemetry protocol spoken with the ground station and
//! the serial link it travels over.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Tuning frames and telemetry echo
pub mod tuning;

/// Byte-level serial links
pub mod serial;
