//! # Anomaly filter
//!
//! Every raw sensor value passes through an [`AnomalyFilter`] before it
//! reaches any decision logic. Implausible values are turned into absent
//! ones, so callers only ever deal with `Option<T>`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use nalgebra::Vector3;
use std::collections::HashMap;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Default plausibility table, inclusive `[min, max]` for each reading.
///
/// Vector readings are checked using the sum of the absolute values of
/// their components.
pub const DEFAULT_LIMITS: [(SensorClass, Field, f64, f64); 13] = [
    (SensorClass::Barometer, Field::Temperature, 0.0, 60.0),
    (SensorClass::Barometer, Field::Humidity, 0.0, 100.0),
    (SensorClass::Barometer, Field::Pressure, 800.0, 1100.0),
    (SensorClass::Orientation, Field::Acceleration, 0.0, 50.0),
    (SensorClass::Orientation, Field::AngularRate, 0.0, 45.0),
    (SensorClass::Orientation, Field::MagneticField, 0.0, 250.0),
    (SensorClass::Orientation, Field::LinearAccel, 0.0, 25.0),
    (SensorClass::Orientation, Field::Gravity, 0.0, 15.0),
    (SensorClass::Orientation, Field::Temperature, 0.0, 60.0),
    (SensorClass::Gps, Field::Latitude, -90.0, 90.0),
    (SensorClass::Gps, Field::Longitude, -180.0, 180.0),
    (SensorClass::Gps, Field::Altitude, -100.0, 500.0),
    (SensorClass::Rangefinder, Field::Distance, 2.0, 450.0),
];

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorClass {
    Barometer,
    Orientation,
    Gps,
    Rangefinder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Temperature,
    Humidity,
    Pressure,
    Acceleration,
    AngularRate,
    MagneticField,
    LinearAccel,
    Gravity,
    Latitude,
    Longitude,
    Altitude,
    Distance,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A reading which can be checked against a plausible range.
pub trait Checkable {
    /// The scalar compared against the range.
    fn magnitude(&self) -> f64;

    /// True for vectors whose components are all exactly zero.
    fn is_all_zero(&self) -> bool;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone)]
pub struct AnomalyFilter {
    limits: HashMap<(SensorClass, Field), Limits>,

    /// Number of readings rejected by this filter
    pub num_rejected: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Checkable for f64 {
    fn magnitude(&self) -> f64 {
        *self
    }

    fn is_all_zero(&self) -> bool {
        false
    }
}

impl Checkable for Vector3<f64> {
    fn magnitude(&self) -> f64 {
        self.iter().map(|c| c.abs()).sum()
    }

    fn is_all_zero(&self) -> bool {
        self.iter().all(|c| *c == 0.0)
    }
}

impl Default for AnomalyFilter {
    fn default() -> Self {
        Self::with_limits(&DEFAULT_LIMITS)
    }
}

impl AnomalyFilter {
    pub fn with_limits(table: &[(SensorClass, Field, f64, f64)]) -> Self {
        Self {
            limits: table
                .iter()
                .map(|(c, f, min, max)| ((*c, *f), Limits { min: *min, max: *max }))
                .collect(),
            num_rejected: 0,
        }
    }

    pub fn limits(&self, class: SensorClass, field: Field) -> Option<Limits> {
        self.limits.get(&(class, field)).copied()
    }

    /// Check a reading, returning `None` if it is absent or implausible.
    pub fn check<T: Checkable>(
        &mut self,
        class: SensorClass,
        field: Field,
        value: Option<T>,
    ) -> Option<T> {
        let value = value?;

        let limits = match self.limits(class, field) {
            Some(l) => l,
            None => {
                warn!("No plausibility limits for {:?}/{:?}, passing value through", class, field);
                return Some(value);
            }
        };

        // A gyro at rest legitimately reads zero on every axis
        if value.is_all_zero() && field != Field::AngularRate {
            self.reject(class, field, "all components are zero");
            return None;
        }

        let m = value.magnitude();
        if m >= limits.min && m <= limits.max {
            Some(value)
        }
        else {
            self.reject(
                class,
                field,
                &format!("{} outside [{}, {}]", m, limits.min, limits.max),
            );
            None
        }
    }

    fn reject(&mut self, class: SensorClass, field: Field, reason: &str) {
        self.num_rejected += 1;
        warn!("Rejected {:?}/{:?} reading: {}", class, field, reason);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn next_up(v: f64) -> f64 {
        if v == 0.0 {
            f64::from_bits(1)
        }
        else if v > 0.0 {
            f64::from_bits(v.to_bits() + 1)
        }
        else {
            f64::from_bits(v.to_bits() - 1)
        }
    }

    fn next_down(v: f64) -> f64 {
        -next_up(-v)
    }

    const VECTOR_FIELDS: [Field; 5] = [
        Field::Acceleration,
        Field::AngularRate,
        Field::MagneticField,
        Field::LinearAccel,
        Field::Gravity,
    ];

    #[test]
    fn test_scalar_boundaries() {
        let mut filter = AnomalyFilter::default();

        for (class, field, min, max) in DEFAULT_LIMITS.iter().copied() {
            if class == SensorClass::Orientation && VECTOR_FIELDS.contains(&field) {
                continue;
            }

            assert_eq!(filter.check(class, field, Some(min)), Some(min), "{:?}", field);
            assert_eq!(filter.check(class, field, Some(max)), Some(max), "{:?}", field);
            assert_eq!(filter.check(class, field, Some(next_down(min))), None, "{:?}", field);
            assert_eq!(filter.check(class, field, Some(next_up(max))), None, "{:?}", field);
        }
    }

    #[test]
    fn test_vector_boundaries() {
        let mut filter = AnomalyFilter::default();

        for field in VECTOR_FIELDS.iter().copied() {
            let max = filter.limits(SensorClass::Orientation, field).unwrap().max;

            let at_max = Vector3::new(max, 0.0, 0.0);
            let above = Vector3::new(next_up(max), 0.0, 0.0);

            assert_eq!(filter.check(SensorClass::Orientation, field, Some(at_max)), Some(at_max));
            assert_eq!(filter.check(SensorClass::Orientation, field, Some(above)), None);
        }
    }

    #[test]
    fn test_vector_sum_of_abs() {
        let mut filter = AnomalyFilter::default();

        // Each component is small but the sum of magnitudes is over the limit
        let v = Vector3::new(-6.0, 5.0, -5.0);
        assert_eq!(filter.check(SensorClass::Orientation, Field::Gravity, Some(v)), None);

        let v = Vector3::new(-0.1, 0.2, -9.7);
        assert_eq!(filter.check(SensorClass::Orientation, Field::Gravity, Some(v)), Some(v));
    }

    #[test]
    fn test_all_zero_vectors() {
        let mut filter = AnomalyFilter::default();
        let zero = Vector3::<f64>::zeros();

        for field in VECTOR_FIELDS.iter().copied() {
            let res = filter.check(SensorClass::Orientation, field, Some(zero));

            if field == Field::AngularRate {
                assert_eq!(res, Some(zero));
            }
            else {
                assert_eq!(res, None, "{:?}", field);
            }
        }

        assert_eq!(filter.num_rejected, 4);
    }

    #[test]
    fn test_absent_and_unknown() {
        let mut filter = AnomalyFilter::default();

        assert_eq!(filter.check::<f64>(SensorClass::Gps, Field::Latitude, None), None);
        assert_eq!(filter.num_rejected, 0);

        // No gravity entry for the barometer, value is passed through
        assert_eq!(
            filter.check(SensorClass::Barometer, Field::Gravity, Some(1e9)),
            Some(1e9)
        );

        assert_eq!(filter.check(SensorClass::Gps, Field::Latitude, Some(f64::NAN)), None);
        assert_eq!(filter.num_rejected, 1);
    }
}
