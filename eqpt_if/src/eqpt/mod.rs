//! # Equipment Interface
//!
//! Every piece of equipment the controller uses is reached through one of
//! the traits in this module. The [`Eqpt`] context owns one implementation of
//! each and is passed by mutable reference into every control component.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod baro;
pub mod cam;
pub mod clock;
pub mod gps;
pub mod imu;
pub mod mech;
pub mod range;
pub mod tm;

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use log::warn;
use thiserror::Error;

use self::{
    baro::Barometer,
    cam::{Camera, TargetDetector},
    clock::Clock,
    gps::GpsReceiver,
    imu::Orientation,
    mech::{GpioLines, LineId, Motors},
    range::Rangefinder,
    tm::{Telemetry, TmValue},
};

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

/// The equipment context.
///
/// Created once at startup and released on shutdown. Dropping the context
/// (including during a panic unwind) zeroes the motors and de-asserts all
/// output lines.
pub struct Eqpt {
    pub imu: Box<dyn Orientation>,
    pub baro: Box<dyn Barometer>,
    pub gps: Box<dyn GpsReceiver>,
    pub range: Box<dyn Rangefinder>,
    pub cam: Box<dyn Camera>,

    /// Neural target detector, `None` if the model could not be loaded.
    pub detector: Option<Box<dyn TargetDetector>>,

    pub motors: Box<dyn Motors>,
    pub lines: Box<dyn GpioLines>,
    pub tm: Box<dyn Telemetry>,
    pub clock: Box<dyn Clock>,

    released: bool,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

/// Errors raised by equipment at the collaborator boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EqptError {
    #[error("The {0} driver is not initialised")]
    NotInitialised(&'static str),

    #[error("Write to {0} failed: {1}")]
    WriteFailed(&'static str, String),

    #[error("Invalid wheel demand: left = {0}, right = {1}")]
    InvalidWheelDemand(f64, f64),

    #[error("Device failed to start: {0}")]
    StartFailed(String),
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl Eqpt {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        imu: Box<dyn Orientation>,
        baro: Box<dyn Barometer>,
        gps: Box<dyn GpsReceiver>,
        range: Box<dyn Rangefinder>,
        cam: Box<dyn Camera>,
        detector: Option<Box<dyn TargetDetector>>,
        motors: Box<dyn Motors>,
        lines: Box<dyn GpioLines>,
        tm: Box<dyn Telemetry>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            imu,
            baro,
            gps,
            range,
            cam,
            detector,
            motors,
            lines,
            tm,
            clock,
            released: false,
        }
    }

    /// Record a telemetry value stamped with the current clock time.
    pub fn tm<V: Into<TmValue>>(&mut self, field: &str, value: V) {
        let time_s = self.clock.now_s();
        self.tm.record(time_s, field, value.into());
    }

    /// Current clock time in seconds.
    pub fn now_s(&self) -> f64 {
        self.clock.now_s()
    }

    /// Wait on the clock.
    pub fn sleep(&mut self, duration_s: f64) {
        self.clock.sleep(duration_s);
    }

    /// Stop both wheels and de-assert every output line.
    ///
    /// Failures are logged, the remaining outputs are still set.
    pub fn make_safe(&mut self) {
        if let Err(e) = self.motors.set_wheel_power(0.0, 0.0) {
            warn!("Could not stop the motors: {}", e);
        }

        for line in LineId::ALL.iter() {
            if let Err(e) = self.lines.set_line(*line, false) {
                warn!("Could not de-assert line {:?}: {}", line, e);
            }
        }
    }

    /// Release the equipment at the end of the mission.
    pub fn release(&mut self) {
        if !self.released {
            self.make_safe();
            self.released = true;
        }
    }
}

impl Drop for Eqpt {
    fn drop(&mut self) {
        self.release();
    }
}
