//! Parameters structure for the motion controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the motion controller.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MotionParams {
    // ---- COMMAND LIMITS ----

    /// Longest duration accepted for a single command.
    ///
    /// Units: seconds
    pub max_duration_s: f64,

    // ---- RAMPING ----

    /// Power increment of each ramp step.
    pub ramp_step: f64,

    /// Time between ramp up steps.
    ///
    /// Units: seconds
    pub ramp_up_interval_s: f64,

    /// Time between ramp down steps.
    ///
    /// Units: seconds
    pub ramp_down_interval_s: f64,

    /// Settling time after reaching a full stop.
    ///
    /// Units: seconds
    pub stop_settle_s: f64,

    // ---- STALL DETECTION ----

    /// Commands shorter than this are never stall checked.
    ///
    /// Units: seconds
    pub stall_min_duration_s: f64,

    /// Number of angular rate samples in one stall window.
    pub stall_window_samples: usize,

    /// Time between angular rate samples.
    ///
    /// Units: seconds
    pub stall_sample_interval_s: f64,

    /// Angular rate above which a sample counts as activity.
    ///
    /// Units: radians/second
    pub stall_rate_threshold_rads: f64,

    // ---- SELF RIGHTING ----

    /// Gravity z component below which the rover is considered tipped over.
    ///
    /// Units: meters/second^2
    pub tip_over_gravity_z_ms2: f64,

    /// Length of each forward righting pulse.
    ///
    /// Units: seconds
    pub righting_pulse_s: f64,

    pub righting_power: f64,

    /// Longest time spent trying to right the rover.
    ///
    /// Units: seconds
    pub righting_max_s: f64,

    // ---- STALL RECOVERY ----

    pub recovery_power: f64,

    /// Number of status LED blinks signalling a recovery.
    pub recovery_blinks: u32,

    /// On and off time of each blink.
    ///
    /// Units: seconds
    pub recovery_blink_s: f64,

    pub recovery_reverse_s: f64,
    pub recovery_turn_s: f64,
    pub recovery_probe_s: f64,

    /// Pause between recovery manoeuvres.
    ///
    /// Units: seconds
    pub recovery_settle_s: f64,
}

impl Default for MotionParams {
    fn default() -> Self {
        Self {
            max_duration_s: 30.0,
            ramp_step: 0.1,
            ramp_up_interval_s: 0.025,
            ramp_down_interval_s: 0.05,
            stop_settle_s: 0.1,
            stall_min_duration_s: 2.0,
            stall_window_samples: 5,
            stall_sample_interval_s: 0.2,
            stall_rate_threshold_rads: 0.4,
            tip_over_gravity_z_ms2: 0.5,
            righting_pulse_s: 0.5,
            righting_power: 1.0,
            righting_max_s: 5.0,
            recovery_power: 1.0,
            recovery_blinks: 2,
            recovery_blink_s: 0.25,
            recovery_reverse_s: 3.0,
            recovery_turn_s: 1.0,
            recovery_probe_s: 2.0,
            recovery_settle_s: 0.5,
        }
    }
}
