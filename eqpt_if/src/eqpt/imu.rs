//! # Orientation sensor interface

use nalgebra::Vector3;

/// A 9-axis orientation sensor running its onboard fusion.
///
/// Each read returns `None` if the sensor did not answer.
pub trait Orientation {
    /// Angular rate in rad/s, z is yaw.
    fn angular_rate(&mut self) -> Option<Vector3<f64>>;

    /// Gravity vector in the body frame in m/s², z is up when upright.
    fn gravity(&mut self) -> Option<Vector3<f64>>;

    /// Acceleration with gravity removed in m/s².
    fn linear_acceleration(&mut self) -> Option<Vector3<f64>>;
}
