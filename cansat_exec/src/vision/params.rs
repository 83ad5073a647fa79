//! Parameters structure for the vision target tracker

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::blob::{HsvBand, RED_BANDS};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionParams {
    // ---- COLOUR BLOB ----

    /// Hue bands making up the target colour
    pub target_bands: Vec<HsvBand>,

    /// Blobs of this many pixels or fewer are noise
    pub min_blob_px: usize,

    // ---- CASCADE ----

    /// Blob area fraction above which the target is close
    pub close_area_fraction: f64,

    /// Blob area fraction above which the blob is trusted for steering
    pub steer_area_fraction: f64,

    /// Smallest blob area fraction used when the detector sees nothing
    pub faint_area_fraction: f64,

    /// Half width of the centre band of the normalised horizontal offset
    pub centre_band: f64,

    /// Class id of the target in the detector output
    pub target_class: u32,

    // ---- RANGE CONFIRMATION ----

    /// Range below which the target is reached.
    ///
    /// Units: centimeters
    pub goal_range_cm: f64,

    /// Time between range retries.
    ///
    /// Units: seconds
    pub range_retry_s: f64,

    /// Consecutive failed reads forcing a nudge
    pub range_nudge_after: u32,

    /// Consecutive failed reads forcing the end of the approach
    pub range_give_up_after: u32,
}

impl Default for VisionParams {
    fn default() -> Self {
        Self {
            target_bands: RED_BANDS.to_vec(),
            min_blob_px: 20,
            close_area_fraction: 0.3,
            steer_area_fraction: 0.05,
            faint_area_fraction: 0.001,
            centre_band: 0.25,
            target_class: 0,
            goal_range_cm: 60.0,
            range_retry_s: 0.06,
            range_nudge_after: 10,
            range_give_up_after: 20,
        }
    }
}
