//! # CanSat library.
//!
//! This library allows other crates in the workspace, the integration tests and the benchmarks to
//! access the control components of the mission executable.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Anomaly filter - rejects implausible sensor readings
pub mod anomaly;

/// Data store - cycle bookkeeping of the executable
pub mod data_store;

/// Motion control - ramped drive commands, stall detection and recovery
pub mod motion;

/// Navigation - GPS guidance towards the goal
pub mod nav;

/// Executable parameters
pub mod params;

/// Phase controller - the mission state machine
pub mod phase_ctrl;

/// Altitude staging - launch and landing detection, and the release
pub mod staging;

/// Vision - camera and rangefinder homing on the goal marker
pub mod vision;
