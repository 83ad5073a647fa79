//! # Ultrasonic rangefinder interface

pub trait Rangefinder {
    /// Distance to the nearest echo in centimetres, `None` on timeout.
    fn distance_cm(&mut self) -> Option<f64>;
}
