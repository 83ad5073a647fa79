//! # GPS receiver interface

use serde::{Deserialize, Serialize};

/// A position fix in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
}

pub trait GpsReceiver {
    /// Get the latest fix.
    ///
    /// Implementations bound their own wait for a sentence and return `None`
    /// if no valid fix arrived in time.
    fn fix(&mut self) -> Option<GeoFix>;
}

impl GeoFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}
