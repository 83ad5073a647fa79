//! Parameters structure for the phase controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhaseCtrlParams {
    // ---- STANDBY ----

    /// Longest time spent waiting for launch.
    ///
    /// Units: seconds
    pub standby_timeout_s: f64,

    // ---- LONG RANGE NAVIGATION ----

    /// Number of GPS reads tried when acquiring the first fix after release
    pub gps_acquire_attempts: u32,

    /// Number of GPS reads tried after each forward leg
    pub gps_fix_attempts: u32,

    /// Time between GPS reads.
    ///
    /// Units: seconds
    pub gps_retry_s: f64,

    /// Duration of the leg driven before the first bearing is known.
    ///
    /// Units: seconds
    pub initial_leg_s: f64,

    pub leg_power: f64,

    /// Duration of each forward leg.
    ///
    /// Units: seconds
    pub leg_s: f64,

    pub turn_power: f64,

    /// Yaw rate of the rover turning on the spot at `turn_power`.
    ///
    /// Units: radians/second
    pub turn_rate_rads: f64,

    /// Pause after each manoeuvre.
    ///
    /// Units: seconds
    pub nav_settle_s: f64,

    /// Goal distance at which short range navigation takes over.
    ///
    /// Units: meters
    pub short_range_switch_m: f64,

    /// Consecutive legs without measurable travel before handing over to
    /// short range navigation
    pub max_stationary_cycles: u32,

    /// Longest time spent in long range navigation.
    ///
    /// Units: seconds
    pub long_range_timeout_s: f64,

    // ---- SHORT RANGE NAVIGATION ----

    pub camera_start_attempts: u32,

    /// Units: seconds
    pub camera_retry_s: f64,

    pub search_power: f64,

    /// Duration of the search turn when nothing is seen.
    ///
    /// Units: seconds
    pub search_turn_s: f64,

    /// Units: seconds
    pub search_settle_s: f64,

    pub approach_power: f64,

    /// Duration of the forward step when the target is centred.
    ///
    /// Units: seconds
    pub approach_s: f64,

    pub steer_power: f64,

    /// Turn duration per unit of normalised horizontal offset.
    ///
    /// Units: seconds
    pub steer_s_per_offset: f64,

    /// Units: seconds
    pub short_range_settle_s: f64,

    pub nudge_power: f64,

    /// Units: seconds
    pub nudge_s: f64,

    /// Longest time spent in short range navigation.
    ///
    /// Units: seconds
    pub short_range_timeout_s: f64,
}

impl Default for PhaseCtrlParams {
    fn default() -> Self {
        Self {
            standby_timeout_s: 7200.0,
            gps_acquire_attempts: 120,
            gps_fix_attempts: 20,
            gps_retry_s: 0.5,
            initial_leg_s: 5.0,
            leg_power: 1.0,
            leg_s: 5.0,
            turn_power: 1.0,
            turn_rate_rads: std::f64::consts::FRAC_PI_2,
            nav_settle_s: 1.0,
            short_range_switch_m: 10.0,
            max_stationary_cycles: 20,
            long_range_timeout_s: 1200.0,
            camera_start_attempts: 3,
            camera_retry_s: 1.0,
            search_power: 1.0,
            search_turn_s: 0.2,
            search_settle_s: 0.8,
            approach_power: 1.0,
            approach_s: 0.5,
            steer_power: 1.0,
            steer_s_per_offset: 1.0,
            short_range_settle_s: 0.5,
            nudge_power: 0.8,
            nudge_s: 0.1,
            short_range_timeout_s: 600.0,
        }
    }
}
