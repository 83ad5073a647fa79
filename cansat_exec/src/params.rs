//! # CanSat Executable Parameters
//!
//! This module provides parameters for the mission executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use eqpt_if::eqpt::gps::GeoFix;
use serde::Deserialize;
use util::logger::LogParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CansatExecParams {
    /// Where the equipment comes from
    pub eqpt_source: EqptSource,

    /// Target period of one cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// The goal marker position
    pub goal: GeoFix,

    /// BCM numbers of the lines driven by the rover
    pub pins: PinMap,

    /// Log verbosity and file name
    pub log: LogParams,

    /// Consecutive cycle overruns in Standby after which the loop is reported
    /// as unable to keep up
    pub max_consec_overruns: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PinMap {
    pub release: u8,
    pub status_led: u8,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum EqptSource {
    /// The kinematic simulation world
    Sim,

    /// Sensor and actuator drivers on the flight computer
    Hardware,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for CansatExecParams {
    fn default() -> Self {
        Self {
            eqpt_source: EqptSource::Sim,
            cycle_period_s: 0.1,
            goal: GeoFix::new(35.0, 139.0),
            pins: PinMap::default(),
            log: LogParams::default(),
            max_consec_overruns: 10,
        }
    }
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            release: 16,
            status_led: 5,
        }
    }
}
