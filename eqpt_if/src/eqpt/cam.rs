//! # Camera and target detector interfaces

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

pub use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::EqptError;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Axis aligned box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

/// One detection returned by the neural detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f64,
    pub class_id: u32,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Source of RGB frames, already rotated and converted to RGB.
pub trait Camera {
    /// Start streaming. Called once before the first frame is requested.
    fn start(&mut self) -> Result<(), EqptError> {
        Ok(())
    }

    /// Capture a frame, `None` if the capture failed.
    fn frame(&mut self) -> Option<RgbImage>;
}

/// Neural object detector.
pub trait TargetDetector {
    fn detect_target(&mut self, frame: &RgbImage) -> Vec<Detection>;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BoundingBox {
    pub fn width(&self) -> f64 {
        (self.x_max - self.x_min).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y_max - self.y_min).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn centre_x(&self) -> f64 {
        0.5 * (self.x_min + self.x_max)
    }
}
