//! # Synthetic equipment
//!
//! Scripted and recording implementations of every equipment trait, all
//! running on a shared virtual [`SimClock`]. A [`Rig`] wires them into an
//! [`Eqpt`] for tests. The [`world`] module provides a kinematic world for
//! complete simulated missions.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod world;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector3;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::eqpt::{
    baro::{altitude_to_pressure, BaroReading, Barometer, STD_PRESSURE_HPA},
    cam::{Camera, Detection, RgbImage, TargetDetector},
    clock::Clock,
    gps::{GeoFix, GpsReceiver},
    imu::Orientation,
    mech::{validate_wheel_demand, GpioLines, LineId, Motors},
    range::Rangefinder,
    tm::{Telemetry, TmValue},
    Eqpt, EqptError,
};

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

pub type Shared<T> = Rc<RefCell<T>>;

/// A reading expressed as a function of virtual time.
pub type TimeFn<T> = Box<dyn FnMut(f64) -> Option<T>>;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Virtual clock, sleeping advances time instantly. Clones share the time.
#[derive(Clone, Default)]
pub struct SimClock {
    time_s: Rc<Cell<f64>>,
}

/// A wheel power demand as seen by the motors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelCommand {
    pub time_s: f64,
    pub left: f64,
    pub right: f64,
}

/// A change of an output line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineEvent {
    pub time_s: f64,
    pub line: LineId,
    pub high: bool,
}

/// A telemetry record kept in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct TmRecord {
    pub time_s: f64,
    pub field: String,
    pub value: TmValue,
}

/// Sequence of scripted readings. Once exhausted the last reading repeats.
pub struct Script<T: Clone> {
    queue: VecDeque<Option<T>>,
    last: Option<T>,
}

pub struct ScriptedImu {
    clock: SimClock,
    rate: TimeFn<Vector3<f64>>,
    gravity: TimeFn<Vector3<f64>>,
    lin_acc: TimeFn<Vector3<f64>>,
}

pub struct ScriptedBaro {
    clock: SimClock,
    altitude: TimeFn<f64>,
    reference_hpa: f64,
}

pub struct ScriptedGps(Script<GeoFix>);

pub struct ScriptedRange(Script<f64>);

pub struct ScriptedCamera {
    frames: Script<RgbImage>,
    started: Rc<Cell<bool>>,
}

pub struct ScriptedDetector {
    detections: Vec<Detection>,
}

pub struct RecordingMotors {
    clock: SimClock,
    log: Shared<Vec<WheelCommand>>,
    failing: bool,
}

pub struct RecordingLines {
    clock: SimClock,
    log: Shared<Vec<LineEvent>>,
}

#[derive(Default)]
pub struct MemoryTelemetry {
    log: Shared<Vec<TmRecord>>,
}

/// Builder for an [`Eqpt`] made of scripted and recording equipment.
pub struct Rig {
    clock: SimClock,
    rate: TimeFn<Vector3<f64>>,
    gravity: TimeFn<Vector3<f64>>,
    lin_acc: TimeFn<Vector3<f64>>,
    altitude: TimeFn<f64>,
    fixes: Vec<Option<GeoFix>>,
    ranges: Vec<Option<f64>>,
    frames: Vec<Option<RgbImage>>,
    detections: Option<Vec<Detection>>,
    failing_motors: bool,
}

/// Handles onto the recorded outputs of a [`Rig`].
#[derive(Clone)]
pub struct RigHandles {
    pub clock: SimClock,
    pub wheels: Shared<Vec<WheelCommand>>,
    pub lines: Shared<Vec<LineEvent>>,
    pub tm: Shared<Vec<TmRecord>>,
    pub camera_started: Rc<Cell<bool>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, time_s: f64) {
        self.time_s.set(time_s);
    }

    pub fn now(&self) -> f64 {
        self.time_s.get()
    }
}

impl Clock for SimClock {
    fn now_s(&self) -> f64 {
        self.time_s.get()
    }

    fn sleep(&mut self, duration_s: f64) {
        if duration_s.is_finite() && duration_s > 0.0 {
            self.time_s.set(self.time_s.get() + duration_s);
        }
    }
}

impl<T: Clone> Script<T> {
    pub fn new(items: Vec<Option<T>>) -> Self {
        Self {
            queue: items.into(),
            last: None,
        }
    }

    pub fn next(&mut self) -> Option<T> {
        match self.queue.pop_front() {
            Some(item) => {
                self.last = item.clone();
                item
            }
            None => self.last.clone(),
        }
    }
}

impl Orientation for ScriptedImu {
    fn angular_rate(&mut self) -> Option<Vector3<f64>> {
        (self.rate)(self.clock.now_s())
    }

    fn gravity(&mut self) -> Option<Vector3<f64>> {
        (self.gravity)(self.clock.now_s())
    }

    fn linear_acceleration(&mut self) -> Option<Vector3<f64>> {
        (self.lin_acc)(self.clock.now_s())
    }
}

impl Barometer for ScriptedBaro {
    fn read(&mut self) -> Option<BaroReading> {
        let alt = (self.altitude)(self.clock.now_s())?;

        Some(BaroReading {
            temperature_c: 20.0,
            pressure_hpa: altitude_to_pressure(alt, self.reference_hpa),
            humidity_pct: 50.0,
        })
    }
}

impl GpsReceiver for ScriptedGps {
    fn fix(&mut self) -> Option<GeoFix> {
        self.0.next()
    }
}

impl Rangefinder for ScriptedRange {
    fn distance_cm(&mut self) -> Option<f64> {
        self.0.next()
    }
}

impl Camera for ScriptedCamera {
    fn start(&mut self) -> Result<(), EqptError> {
        self.started.set(true);
        Ok(())
    }

    fn frame(&mut self) -> Option<RgbImage> {
        self.frames.next()
    }
}

impl TargetDetector for ScriptedDetector {
    fn detect_target(&mut self, _frame: &RgbImage) -> Vec<Detection> {
        self.detections.clone()
    }
}

impl Motors for RecordingMotors {
    fn set_wheel_power(&mut self, left: f64, right: f64) -> Result<(), EqptError> {
        if self.failing {
            return Err(EqptError::NotInitialised("motor"));
        }
        validate_wheel_demand(left, right)?;

        self.log.borrow_mut().push(WheelCommand {
            time_s: self.clock.now_s(),
            left,
            right,
        });
        Ok(())
    }
}

impl GpioLines for RecordingLines {
    fn set_line(&mut self, line: LineId, high: bool) -> Result<(), EqptError> {
        self.log.borrow_mut().push(LineEvent {
            time_s: self.clock.now_s(),
            line,
            high,
        });
        Ok(())
    }
}

impl MemoryTelemetry {
    pub fn new(log: Shared<Vec<TmRecord>>) -> Self {
        Self { log }
    }
}

impl Telemetry for MemoryTelemetry {
    fn record(&mut self, time_s: f64, field: &str, value: TmValue) {
        self.log.borrow_mut().push(TmRecord {
            time_s,
            field: field.to_string(),
            value,
        });
    }
}

impl Default for Rig {
    fn default() -> Self {
        Self::new()
    }
}

impl Rig {
    /// A rig on the ground at rest: quiet gyro, upright gravity, zero
    /// altitude, no GPS, no echoes, no frames and a detector that sees
    /// nothing.
    pub fn new() -> Self {
        Self {
            clock: SimClock::new(),
            rate: Box::new(|_| Some(Vector3::zeros())),
            gravity: Box::new(|_| Some(Vector3::new(0.0, 0.0, 9.81))),
            lin_acc: Box::new(|_| Some(Vector3::new(0.02, -0.01, 0.03))),
            altitude: Box::new(|_| Some(0.0)),
            fixes: Vec::new(),
            ranges: Vec::new(),
            frames: Vec::new(),
            detections: Some(Vec::new()),
            failing_motors: false,
        }
    }

    pub fn angular_rate<F>(mut self, f: F) -> Self
    where
        F: FnMut(f64) -> Option<Vector3<f64>> + 'static,
    {
        self.rate = Box::new(f);
        self
    }

    pub fn gravity<F>(mut self, f: F) -> Self
    where
        F: FnMut(f64) -> Option<Vector3<f64>> + 'static,
    {
        self.gravity = Box::new(f);
        self
    }

    /// Altitude above the reference level as a function of time.
    pub fn altitude<F>(mut self, f: F) -> Self
    where
        F: FnMut(f64) -> Option<f64> + 'static,
    {
        self.altitude = Box::new(f);
        self
    }

    pub fn gps_fixes(mut self, fixes: Vec<Option<GeoFix>>) -> Self {
        self.fixes = fixes;
        self
    }

    pub fn ranges(mut self, ranges: Vec<Option<f64>>) -> Self {
        self.ranges = ranges;
        self
    }

    pub fn frames(mut self, frames: Vec<Option<RgbImage>>) -> Self {
        self.frames = frames;
        self
    }

    pub fn detections(mut self, detections: Vec<Detection>) -> Self {
        self.detections = Some(detections);
        self
    }

    pub fn without_detector(mut self) -> Self {
        self.detections = None;
        self
    }

    pub fn failing_motors(mut self) -> Self {
        self.failing_motors = true;
        self
    }

    pub fn build(self) -> (Eqpt, RigHandles) {
        let handles = RigHandles {
            clock: self.clock.clone(),
            wheels: Rc::new(RefCell::new(Vec::new())),
            lines: Rc::new(RefCell::new(Vec::new())),
            tm: Rc::new(RefCell::new(Vec::new())),
            camera_started: Rc::new(Cell::new(false)),
        };

        let eqpt = Eqpt::new(
            Box::new(ScriptedImu {
                clock: self.clock.clone(),
                rate: self.rate,
                gravity: self.gravity,
                lin_acc: self.lin_acc,
            }),
            Box::new(ScriptedBaro {
                clock: self.clock.clone(),
                altitude: self.altitude,
                reference_hpa: STD_PRESSURE_HPA,
            }),
            Box::new(ScriptedGps(Script::new(self.fixes))),
            Box::new(ScriptedRange(Script::new(self.ranges))),
            Box::new(ScriptedCamera {
                frames: Script::new(self.frames),
                started: handles.camera_started.clone(),
            }),
            self.detections
                .map(|detections| Box::new(ScriptedDetector { detections }) as Box<dyn TargetDetector>),
            Box::new(RecordingMotors {
                clock: self.clock.clone(),
                log: handles.wheels.clone(),
                failing: self.failing_motors,
            }),
            Box::new(RecordingLines {
                clock: self.clock.clone(),
                log: handles.lines.clone(),
            }),
            Box::new(MemoryTelemetry::new(handles.tm.clone())),
            Box::new(self.clock),
        );

        (eqpt, handles)
    }
}

impl RigHandles {
    /// Last commanded state of a line, low if never set.
    pub fn line_state(&self, line: LineId) -> bool {
        self.lines
            .borrow()
            .iter()
            .rev()
            .find(|e| e.line == line)
            .map(|e| e.high)
            .unwrap_or(false)
    }

    /// Number of low to high transitions of a line.
    pub fn rising_edges(&self, line: LineId) -> usize {
        let mut high = false;
        let mut count = 0;

        for e in self.lines.borrow().iter().filter(|e| e.line == line) {
            if e.high && !high {
                count += 1;
            }
            high = e.high;
        }

        count
    }

    /// All values recorded under a telemetry field.
    pub fn tm_values(&self, field: &str) -> Vec<TmValue> {
        self.tm
            .borrow()
            .iter()
            .filter(|r| r.field == field)
            .map(|r| r.value.clone())
            .collect()
    }
}
