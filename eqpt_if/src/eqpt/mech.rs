//! # Mechanisms Equipment Interface
//!
//! Wheel motors and the discrete output lines (release wire, status LED).

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::EqptError;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// IDs of all discrete output lines
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub enum LineId {
    /// Nichrome release wire
    Release,

    /// Status LED
    StatusLed,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Differential drive motors.
pub trait Motors {
    /// Set the signed power of the left and right wheels, both in [-1, 1].
    fn set_wheel_power(&mut self, left: f64, right: f64) -> Result<(), EqptError>;
}

pub trait GpioLines {
    fn set_line(&mut self, line: LineId, high: bool) -> Result<(), EqptError>;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LineId {
    pub const ALL: [LineId; 2] = [LineId::Release, LineId::StatusLed];
}

/// Check that both wheel demands are within [-1, 1].
pub fn validate_wheel_demand(left: f64, right: f64) -> Result<(), EqptError> {
    let ok = |p: f64| p.is_finite() && (-1.0..=1.0).contains(&p);

    if ok(left) && ok(right) {
        Ok(())
    }
    else {
        Err(EqptError::InvalidWheelDemand(left, right))
    }
}
