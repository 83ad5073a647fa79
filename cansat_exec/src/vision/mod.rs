//! # Vision target tracker
//!
//! Short range target detection. The colour blob is tried first, the neural
//! detector only when the blob is too small to trust, and the ultrasonic
//! rangefinder confirms the final approach.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod blob;
mod params;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use eqpt_if::eqpt::cam::{RgbImage, TargetDetector};
use log::{debug, warn};
use serde::Serialize;
use std::cmp::Ordering;

pub use params::VisionParams;

use crate::anomaly::{AnomalyFilter, Field, SensorClass};
use self::blob::largest_blob;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Steering order produced from one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CameraOrder {
    None,
    Center,
    Right,
    Left,
    Close,
}

/// Outcome of one range confirmation attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeOutcome {
    /// A plausible range, in centimeters
    Range(f64),

    /// The read failed, this many consecutive failures so far
    Retrying(u32),

    /// Too many failures, move a little and try again
    Nudge,

    /// Give up on the confirmation
    GiveUp,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectionResult {
    pub order: CameraOrder,

    /// Horizontal offset of the target from the image centre, as a fraction
    /// of the image width in [-0.5, 0.5]
    pub relative_x: f64,

    /// Fraction of the image covered by the target
    pub area_fraction: f64,
}

pub struct VisionTargetTracker {
    pub params: VisionParams,
}

/// Retry bookkeeping for the ultrasonic confirmation.
pub struct RangeProbe {
    filter: AnomalyFilter,
    nudge_after: u32,
    give_up_after: u32,
    num_failures: u32,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Steering order for a raw normalised offset, and the offset clamped to
/// [-0.5, 0.5].
pub fn steer(raw_offset: f64, centre_band: f64) -> (CameraOrder, f64) {
    let order = if raw_offset > centre_band {
        CameraOrder::Right
    }
    else if raw_offset < -centre_band {
        CameraOrder::Left
    }
    else {
        CameraOrder::Center
    };

    (order, raw_offset.max(-0.5).min(0.5))
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DetectionResult {
    pub fn none() -> Self {
        Self {
            order: CameraOrder::None,
            relative_x: 0.0,
            area_fraction: 0.0,
        }
    }
}

impl VisionTargetTracker {
    pub fn new(params: VisionParams) -> Self {
        Self { params }
    }

    /// Find the target in a frame.
    ///
    /// `detector` is `None` when the model could not be loaded, in which case
    /// faint blobs are used directly.
    pub fn detect(
        &self,
        frame: &RgbImage,
        detector: Option<&mut (dyn TargetDetector + 'static)>,
    ) -> DetectionResult {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            warn!("Empty frame");
            return DetectionResult::none();
        }

        let blob = largest_blob(frame, &self.params.target_bands, self.params.min_blob_px);
        let blob_area = blob.map_or(0.0, |b| b.area_fraction(width, height));

        if let Some(b) = blob {
            if blob_area > self.params.close_area_fraction {
                let (_, relative_x) = steer(self.offset(b.centre_x(), width), self.params.centre_band);
                return DetectionResult {
                    order: CameraOrder::Close,
                    relative_x,
                    area_fraction: blob_area,
                };
            }

            if blob_area >= self.params.steer_area_fraction {
                return self.result_at(b.centre_x(), width, blob_area);
            }
        }

        if let Some(detector) = detector {
            let best = detector
                .detect_target(frame)
                .into_iter()
                .filter(|d| {
                    d.class_id == self.params.target_class
                        && d.confidence.is_finite()
                        && d.bbox.centre_x().is_finite()
                        && d.bbox.area().is_finite()
                })
                .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(Ordering::Equal));

            if let Some(d) = best {
                debug!("Detector found the target with confidence {:.2}", d.confidence);
                let area = (d.bbox.area() / (width as f64 * height as f64)).max(0.0).min(1.0);
                return self.result_at(d.bbox.centre_x(), width, area);
            }
        }

        match blob {
            Some(b) if blob_area > self.params.faint_area_fraction => {
                self.result_at(b.centre_x(), width, blob_area)
            }
            _ => DetectionResult::none(),
        }
    }

    fn offset(&self, centre_x: f64, width: u32) -> f64 {
        let width = width as f64;
        (centre_x - width / 2.0) / width
    }

    fn result_at(&self, centre_x: f64, width: u32, area_fraction: f64) -> DetectionResult {
        let (order, relative_x) = steer(self.offset(centre_x, width), self.params.centre_band);

        DetectionResult {
            order,
            relative_x,
            area_fraction,
        }
    }
}

impl RangeProbe {
    pub fn new(params: &VisionParams) -> Self {
        Self {
            filter: AnomalyFilter::default(),
            nudge_after: params.range_nudge_after,
            give_up_after: params.range_give_up_after,
            num_failures: 0,
        }
    }

    /// Classify one raw rangefinder read.
    pub fn probe(&mut self, raw_cm: Option<f64>) -> RangeOutcome {
        match self.filter.check(SensorClass::Rangefinder, Field::Distance, raw_cm) {
            Some(cm) => {
                self.num_failures = 0;
                RangeOutcome::Range(cm)
            }
            None => {
                self.num_failures += 1;

                if self.num_failures >= self.give_up_after {
                    self.num_failures = 0;
                    RangeOutcome::GiveUp
                }
                else if self.num_failures == self.nudge_after {
                    RangeOutcome::Nudge
                }
                else {
                    RangeOutcome::Retrying(self.num_failures)
                }
            }
        }
    }

    pub fn num_failures(&self) -> u32 {
        self.num_failures
    }

    pub fn reset(&mut self) {
        self.num_failures = 0;
    }
}
