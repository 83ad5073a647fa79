//! Parameters structure for altitude staging

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StagingParams {
    // ---- BASELINE ----

    /// Number of barometer reads thrown away before calibrating
    pub warmup_reads: usize,

    /// Number of reads in the calibration window
    pub baseline_reads: usize,

    /// Time between calibration reads.
    ///
    /// Units: seconds
    pub baseline_interval_s: f64,

    /// Leading fraction of the calibration window which is discarded
    pub baseline_discard_fraction: f64,

    /// Reference pressure used when calibration gets no valid reads.
    ///
    /// Units: hectopascal
    pub default_reference_hpa: f64,

    // ---- ASCENT AND LANDING ----

    /// Altitude at which the CanSat is considered launched.
    ///
    /// Units: meters
    pub launch_altitude_m: f64,

    /// Altitude below which a stable reading counts towards landing.
    ///
    /// Units: meters
    pub landing_altitude_m: f64,

    /// Largest altitude change between samples considered stable.
    ///
    /// Units: meters
    pub landing_delta_m: f64,

    /// Consecutive stable samples needed to declare landing
    pub landing_samples: u32,

    /// Time between descent samples.
    ///
    /// Units: seconds
    pub descent_sample_interval_s: f64,

    /// Descent duration after which the release is forced.
    ///
    /// Units: seconds
    pub descent_timeout_s: f64,

    // ---- RELEASE ----

    /// Time the release line is held high.
    ///
    /// Units: seconds
    pub release_duration_s: f64,
}

impl Default for StagingParams {
    fn default() -> Self {
        Self {
            warmup_reads: 20,
            baseline_reads: 100,
            baseline_interval_s: 0.01,
            baseline_discard_fraction: 0.25,
            default_reference_hpa: eqpt_if::eqpt::baro::STD_PRESSURE_HPA,
            launch_altitude_m: 10.0,
            landing_altitude_m: 10.0,
            landing_delta_m: 0.5,
            landing_samples: 5,
            descent_sample_interval_s: 1.0,
            descent_timeout_s: 180.0,
            release_duration_s: 15.0,
        }
    }
}
