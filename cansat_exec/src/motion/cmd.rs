//! Motion command definitions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::MotionError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An open loop drive command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionCommand {
    pub direction: Direction,

    /// Target power in [0, 1]
    pub power: f64,

    /// Total duration of the command including the ramp up.
    ///
    /// Units: seconds
    pub duration_s: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    PivotLeft,
    PivotRight,
    Stop,
}

/// Result of the stall detector for one drive command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallState {
    Clear,
    Stalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RightingOutcome {
    Righted,
    Failed,
}

/// Result of the stall escape sequence.
///
/// The sequence is open loop, so completion does not mean the rover is
/// free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    NotRequired,
    CompletedUnverified,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotionCommand {
    pub fn new(direction: Direction, power: f64, duration_s: f64) -> Self {
        Self {
            direction,
            power,
            duration_s,
        }
    }

    pub fn validate(&self, max_duration_s: f64) -> Result<(), MotionError> {
        if !(self.power.is_finite() && (0.0..=1.0).contains(&self.power)) {
            return Err(MotionError::InvalidPower(self.power));
        }

        if !(self.duration_s.is_finite() && self.duration_s >= 0.0 && self.duration_s <= max_duration_s) {
            return Err(MotionError::InvalidDuration(self.duration_s, max_duration_s));
        }

        Ok(())
    }
}

impl Direction {
    /// Sign applied to the (left, right) wheel power.
    pub fn wheel_signs(&self) -> (f64, f64) {
        match self {
            Direction::Forward => (1.0, 1.0),
            Direction::Backward => (-1.0, -1.0),
            Direction::TurnLeft => (-1.0, 1.0),
            Direction::TurnRight => (1.0, -1.0),
            Direction::PivotLeft => (0.0, 1.0),
            Direction::PivotRight => (1.0, 0.0),
            Direction::Stop => (0.0, 0.0),
        }
    }

    /// True for commands which rotate the rover about its vertical axis.
    pub fn is_turn(&self) -> bool {
        matches!(
            self,
            Direction::TurnLeft | Direction::TurnRight | Direction::PivotLeft | Direction::PivotRight
        )
    }
}
