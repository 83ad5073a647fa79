//! # Barometric sensor interface

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Standard sea level pressure, used when no reference could be measured.
pub const STD_PRESSURE_HPA: f64 = 1013.25;

const ALT_SCALE_M: f64 = 44330.0;
const ALT_EXPONENT: f64 = 0.1903;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One compensated reading from the barometric sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaroReading {
    pub temperature_c: f64,
    pub pressure_hpa: f64,
    pub humidity_pct: f64,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait Barometer {
    /// Read the sensor, `None` if it did not answer.
    fn read(&mut self) -> Option<BaroReading>;

    /// Altitude above the reference pressure level in metres.
    fn altitude(&self, pressure_hpa: f64, reference_hpa: f64) -> Option<f64> {
        pressure_to_altitude(pressure_hpa, reference_hpa)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Hypsometric altitude `44330 * (1 - (p / p0)^0.1903)`.
///
/// `None` if either pressure is not strictly positive and finite.
pub fn pressure_to_altitude(pressure_hpa: f64, reference_hpa: f64) -> Option<f64> {
    if !(pressure_hpa.is_finite() && reference_hpa.is_finite())
        || pressure_hpa <= 0.0
        || reference_hpa <= 0.0
    {
        return None;
    }

    Some(ALT_SCALE_M * (1.0 - (pressure_hpa / reference_hpa).powf(ALT_EXPONENT)))
}

/// Inverse of [`pressure_to_altitude`].
pub fn altitude_to_pressure(altitude_m: f64, reference_hpa: f64) -> f64 {
    reference_hpa * (1.0 - altitude_m / ALT_SCALE_M).powf(1.0 / ALT_EXPONENT)
}
