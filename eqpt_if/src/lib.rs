//! # Equipment interface crate.
//!
//! Provides the interfaces to all equipment the mission software talks to,
//! the equipment context which owns them, and synthetic equipment used for
//! simulation and testing.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Equipment traits, data types and the equipment context
pub mod eqpt;

/// Synthetic equipment and the simulation world
pub mod sim;

// ------------------------------------------------------------------------------------------------
// REEXPORTS
// ------------------------------------------------------------------------------------------------

pub use eqpt::{Eqpt, EqptError};
