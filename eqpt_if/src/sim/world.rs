//! # Kinematic simulation world
//!
//! A flat-earth differential drive model of the rover with a single target
//! cone. Time only advances through the world's clock, and every sleep
//! integrates the rover's motion from the last wheel demand. All sensors
//! read the shared world state, so a complete flight (pad, ascent, descent,
//! landing, drive to the cone) can be run on virtual time.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::Rgb;
use nalgebra::Vector3;
use serde::Deserialize;
use std::cell::RefCell;
use std::f64::consts::PI;
use std::rc::Rc;

use super::{LineEvent, Shared, TmRecord};
use crate::eqpt::{
    baro::{altitude_to_pressure, BaroReading, Barometer},
    cam::{BoundingBox, Camera, Detection, RgbImage, TargetDetector},
    clock::Clock,
    gps::{GeoFix, GpsReceiver},
    imu::Orientation,
    mech::{validate_wheel_demand, GpioLines, LineId, Motors},
    range::Rangefinder,
    tm::Telemetry,
    Eqpt, EqptError,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Mean earth radius used for the local tangent plane.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

const STD_GRAVITY_MS2: f64 = 9.81;

/// Largest integration step.
const MAX_STEP_S: f64 = 0.01;

const BACKGROUND: Rgb<u8> = Rgb([90, 96, 90]);
const CONE_COLOUR: Rgb<u8> = Rgb([200, 20, 20]);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the simulation world.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorldParams {
    /// Where the rover lands.
    pub landing_site: GeoFix,

    /// Compass azimuth of the rover on landing, degrees clockwise from north.
    pub initial_azimuth_deg: f64,

    /// Time on the pad before the ascent starts.
    pub pad_time_s: f64,
    pub ascent_rate_ms: f64,
    pub apex_altitude_m: f64,
    pub descent_rate_ms: f64,

    /// Ground speed at full power on both wheels.
    pub full_speed_ms: f64,

    /// Yaw rate at full opposite power.
    pub full_yaw_rate_rads: f64,

    /// Body vibration seen by the gyro while the wheels turn at full power.
    pub vibration_rads: f64,

    /// Interval of mission time in which the rover is physically stuck.
    pub stuck_window_s: Option<[f64; 2]>,

    /// Rover lands upside down.
    pub start_inverted: bool,

    /// Forward drive time needed to flip back over.
    pub righting_drive_s: f64,

    pub image_width: u32,
    pub image_height: u32,
    pub camera_fov_deg: f64,

    /// Apparent cone side at 1 m as a fraction of the image width.
    pub cone_scale: f64,
    pub cone_visible_range_m: f64,

    pub range_beam_half_angle_deg: f64,
    pub range_max_cm: f64,

    pub reference_pressure_hpa: f64,
    pub temperature_c: f64,
}

/// Mutable state of the world.
#[derive(Debug, Clone)]
pub struct WorldState {
    pub time_s: f64,
    pub north_m: f64,
    pub east_m: f64,

    /// Compass azimuth, radians clockwise from north.
    pub azimuth_rad: f64,

    pub left: f64,
    pub right: f64,

    pub inverted: bool,
    righting_progress_s: f64,

    pub lines: Vec<LineEvent>,
}

/// The simulation world. Clones share the same state.
#[derive(Clone)]
pub struct SimWorld {
    params: Rc<WorldParams>,
    cone: GeoFix,
    state: Shared<WorldState>,
}

/// Everything the world's devices need: shared state and common geometry.
#[derive(Clone)]
struct WorldDevice(SimWorld);

/// What the rover would see of the cone right now.
struct ConeView {
    distance_m: f64,

    /// Angle of the cone from the rover's heading, positive to the right.
    relative_rad: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for WorldParams {
    fn default() -> Self {
        Self {
            landing_site: GeoFix::new(35.0, 139.0),
            initial_azimuth_deg: 0.0,
            pad_time_s: 5.0,
            ascent_rate_ms: 5.0,
            apex_altitude_m: 40.0,
            descent_rate_ms: 4.0,
            full_speed_ms: 0.5,
            full_yaw_rate_rads: PI / 2.0,
            vibration_rads: 0.8,
            stuck_window_s: None,
            start_inverted: false,
            righting_drive_s: 1.0,
            image_width: 160,
            image_height: 120,
            camera_fov_deg: 90.0,
            cone_scale: 0.35,
            cone_visible_range_m: 15.0,
            range_beam_half_angle_deg: 25.0,
            range_max_cm: 450.0,
            reference_pressure_hpa: 1013.25,
            temperature_c: 20.0,
        }
    }
}

impl SimWorld {
    /// Create a new world with the target cone at the given position.
    pub fn new(params: WorldParams, cone: GeoFix) -> Self {
        let state = WorldState {
            time_s: 0.0,
            north_m: 0.0,
            east_m: 0.0,
            azimuth_rad: params.initial_azimuth_deg.to_radians(),
            left: 0.0,
            right: 0.0,
            inverted: params.start_inverted,
            righting_progress_s: 0.0,
            lines: Vec::new(),
        };

        Self {
            params: Rc::new(params),
            cone,
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Build an equipment context backed by this world.
    pub fn build_eqpt(&self, tm: Box<dyn Telemetry>) -> Eqpt {
        let dev = WorldDevice(self.clone());

        Eqpt::new(
            Box::new(dev.clone()),
            Box::new(dev.clone()),
            Box::new(dev.clone()),
            Box::new(dev.clone()),
            Box::new(dev.clone()),
            Some(Box::new(dev.clone())),
            Box::new(dev.clone()),
            Box::new(dev.clone()),
            tm,
            Box::new(dev),
        )
    }

    /// Snapshot of the world state.
    pub fn state(&self) -> WorldState {
        self.state.borrow().clone()
    }

    /// Current position of the rover.
    pub fn position(&self) -> GeoFix {
        let s = self.state.borrow();
        self.local_to_geo(s.north_m, s.east_m)
    }

    /// Ground distance from the rover to the cone.
    pub fn distance_to_cone_m(&self) -> f64 {
        self.cone_view().distance_m
    }

    /// Altitude profile of the flight: pad, climb, fall, then ground.
    pub fn altitude_at(&self, t: f64) -> f64 {
        let p = &self.params;
        let climb_s = p.apex_altitude_m / p.ascent_rate_ms.max(1e-6);
        let fall_s = p.apex_altitude_m / p.descent_rate_ms.max(1e-6);

        if t < p.pad_time_s {
            0.0
        }
        else if t < p.pad_time_s + climb_s {
            (t - p.pad_time_s) * p.ascent_rate_ms
        }
        else if t < p.pad_time_s + climb_s + fall_s {
            p.apex_altitude_m - (t - p.pad_time_s - climb_s) * p.descent_rate_ms
        }
        else {
            0.0
        }
    }

    fn local_to_geo(&self, north_m: f64, east_m: f64) -> GeoFix {
        let origin = self.params.landing_site;
        let lat = origin.latitude + (north_m / EARTH_RADIUS_M).to_degrees();
        let lon = origin.longitude
            + (east_m / (EARTH_RADIUS_M * origin.latitude.to_radians().cos())).to_degrees();

        GeoFix::new(lat, lon)
    }

    fn geo_to_local(&self, fix: GeoFix) -> (f64, f64) {
        let origin = self.params.landing_site;
        let north = (fix.latitude - origin.latitude).to_radians() * EARTH_RADIUS_M;
        let east = (fix.longitude - origin.longitude).to_radians()
            * EARTH_RADIUS_M
            * origin.latitude.to_radians().cos();

        (north, east)
    }

    fn cone_view(&self) -> ConeView {
        let (cone_n, cone_e) = self.geo_to_local(self.cone);
        let s = self.state.borrow();

        let dn = cone_n - s.north_m;
        let de = cone_e - s.east_m;

        ConeView {
            distance_m: dn.hypot(de),
            relative_rad: wrap_pi(de.atan2(dn) - s.azimuth_rad),
        }
    }

    fn is_stuck(&self, t: f64) -> bool {
        match self.params.stuck_window_s {
            Some([from, until]) => t >= from && t < until,
            None => false,
        }
    }

    /// Advance the world by `duration_s` using the current wheel demand.
    fn advance(&self, duration_s: f64) {
        let p = &self.params;
        let mut s = self.state.borrow_mut();
        let mut remaining = duration_s;

        while remaining > 0.0 {
            let dt = remaining.min(MAX_STEP_S);
            remaining -= dt;

            let stuck = self.is_stuck(s.time_s);
            s.time_s += dt;

            if stuck {
                continue;
            }

            if s.inverted {
                if s.left > 0.0 && s.right > 0.0 {
                    s.righting_progress_s += dt;
                    if s.righting_progress_s >= p.righting_drive_s {
                        s.inverted = false;
                    }
                }
                continue;
            }

            let speed = p.full_speed_ms * 0.5 * (s.left + s.right);
            let yaw_left = p.full_yaw_rate_rads * 0.5 * (s.right - s.left);

            s.azimuth_rad = wrap_pi(s.azimuth_rad - yaw_left * dt);
            s.north_m += speed * s.azimuth_rad.cos() * dt;
            s.east_m += speed * s.azimuth_rad.sin() * dt;
        }
    }

    /// Square of the cone in image coordinates, if it's in view.
    fn cone_in_image(&self) -> Option<BoundingBox> {
        let p = &self.params;
        let view = self.cone_view();
        let half_fov = 0.5 * p.camera_fov_deg.to_radians();

        if self.state.borrow().inverted
            || view.relative_rad.abs() > half_fov
            || view.distance_m > p.cone_visible_range_m
        {
            return None;
        }

        let w = p.image_width as f64;
        let h = p.image_height as f64;

        let side = (w * p.cone_scale / view.distance_m.max(0.05)).min(h);
        let cx = 0.5 * w + (view.relative_rad / half_fov) * 0.5 * w;
        let cy = 0.5 * h;

        let bbox = BoundingBox {
            x_min: (cx - 0.5 * side).max(0.0),
            y_min: (cy - 0.5 * side).max(0.0),
            x_max: (cx + 0.5 * side).min(w),
            y_max: (cy + 0.5 * side).min(h),
        };

        if bbox.width() >= 1.0 && bbox.height() >= 1.0 {
            Some(bbox)
        }
        else {
            None
        }
    }
}

impl WorldDevice {
    fn state(&self) -> std::cell::Ref<'_, WorldState> {
        self.0.state.borrow()
    }
}

impl Clock for WorldDevice {
    fn now_s(&self) -> f64 {
        self.state().time_s
    }

    fn sleep(&mut self, duration_s: f64) {
        if duration_s.is_finite() && duration_s > 0.0 {
            self.0.advance(duration_s);
        }
    }
}

impl Orientation for WorldDevice {
    fn angular_rate(&mut self) -> Option<Vector3<f64>> {
        let s = self.state();
        if self.0.is_stuck(s.time_s) {
            return Some(Vector3::zeros());
        }

        let p = &self.0.params;
        let effort = 0.5 * (s.left.abs() + s.right.abs());
        let yaw = if s.inverted {
            0.0
        }
        else {
            p.full_yaw_rate_rads * 0.5 * (s.right - s.left)
        };

        Some(Vector3::new(p.vibration_rads * effort, 0.0, yaw))
    }

    fn gravity(&mut self) -> Option<Vector3<f64>> {
        let z = if self.state().inverted {
            -STD_GRAVITY_MS2
        }
        else {
            STD_GRAVITY_MS2
        };

        Some(Vector3::new(0.0, 0.0, z))
    }

    fn linear_acceleration(&mut self) -> Option<Vector3<f64>> {
        Some(Vector3::new(0.02, -0.01, 0.03))
    }
}

impl Barometer for WorldDevice {
    fn read(&mut self) -> Option<BaroReading> {
        let p = &self.0.params;
        let alt = self.0.altitude_at(self.now_s());

        Some(BaroReading {
            temperature_c: p.temperature_c,
            pressure_hpa: altitude_to_pressure(alt, p.reference_pressure_hpa),
            humidity_pct: 45.0,
        })
    }
}

impl GpsReceiver for WorldDevice {
    fn fix(&mut self) -> Option<GeoFix> {
        Some(self.0.position())
    }
}

impl Rangefinder for WorldDevice {
    fn distance_cm(&mut self) -> Option<f64> {
        let p = &self.0.params;
        let view = self.0.cone_view();
        let cm = view.distance_m * 100.0;

        if view.relative_rad.abs() <= p.range_beam_half_angle_deg.to_radians()
            && cm <= p.range_max_cm
        {
            Some(cm)
        }
        else {
            None
        }
    }
}

impl Camera for WorldDevice {
    fn frame(&mut self) -> Option<RgbImage> {
        let p = &self.0.params;
        let mut img = RgbImage::from_pixel(p.image_width, p.image_height, BACKGROUND);

        if let Some(bbox) = self.0.cone_in_image() {
            for y in (bbox.y_min as u32)..(bbox.y_max as u32).min(p.image_height) {
                for x in (bbox.x_min as u32)..(bbox.x_max as u32).min(p.image_width) {
                    img.put_pixel(x, y, CONE_COLOUR);
                }
            }
        }

        Some(img)
    }
}

impl TargetDetector for WorldDevice {
    fn detect_target(&mut self, _frame: &RgbImage) -> Vec<Detection> {
        match self.0.cone_in_image() {
            Some(bbox) => vec![Detection {
                bbox,
                confidence: 0.9,
                class_id: 0,
            }],
            None => Vec::new(),
        }
    }
}

impl Motors for WorldDevice {
    fn set_wheel_power(&mut self, left: f64, right: f64) -> Result<(), EqptError> {
        validate_wheel_demand(left, right)?;

        let mut s = self.0.state.borrow_mut();
        s.left = left;
        s.right = right;
        Ok(())
    }
}

impl GpioLines for WorldDevice {
    fn set_line(&mut self, line: LineId, high: bool) -> Result<(), EqptError> {
        let mut s = self.0.state.borrow_mut();
        let time_s = s.time_s;
        s.lines.push(LineEvent { time_s, line, high });
        Ok(())
    }
}

/// Keeps telemetry of a simulated run in memory.
pub fn memory_telemetry() -> (Box<dyn Telemetry>, Shared<Vec<TmRecord>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    (Box::new(super::MemoryTelemetry::new(log.clone())), log)
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn wrap_pi(angle: f64) -> f64 {
    if angle > -PI && angle <= PI {
        return angle;
    }

    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI {
        wrapped + 2.0 * PI
    }
    else {
        wrapped
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn cone_north_of(site: GeoFix, north_m: f64) -> GeoFix {
        GeoFix::new(
            site.latitude + (north_m / EARTH_RADIUS_M).to_degrees(),
            site.longitude,
        )
    }

    #[test]
    fn test_drive_forward() {
        let params = WorldParams::default();
        let site = params.landing_site;
        let world = SimWorld::new(params, cone_north_of(site, 10.0));
        let mut eqpt = world.build_eqpt(memory_telemetry().0);

        eqpt.motors.set_wheel_power(1.0, 1.0).unwrap();
        eqpt.sleep(4.0);

        // 0.5 m/s for 4 s straight at the cone
        assert!((world.distance_to_cone_m() - 8.0).abs() < 1e-6);
        assert!((world.state().time_s - 4.0).abs() < 1e-9);

        let rate = eqpt.imu.angular_rate().unwrap();
        assert!(rate.norm() > 0.4);
        assert_eq!(rate.z, 0.0);
    }

    #[test]
    fn test_turn_left_reduces_azimuth() {
        let params = WorldParams::default();
        let site = params.landing_site;
        let world = SimWorld::new(params, cone_north_of(site, 10.0));
        let mut eqpt = world.build_eqpt(memory_telemetry().0);

        eqpt.motors.set_wheel_power(-1.0, 1.0).unwrap();
        eqpt.sleep(1.0);

        // pi/2 rad/s to the left, now facing west
        let az = world.state().azimuth_rad;
        assert!((az + PI / 2.0).abs() < 1e-6, "az = {}", az);
        assert!(eqpt.imu.angular_rate().unwrap().z > 1.5);
    }

    #[test]
    fn test_camera_sees_cone_ahead() {
        let params = WorldParams::default();
        let site = params.landing_site;
        let world = SimWorld::new(params, cone_north_of(site, 1.0));
        let mut eqpt = world.build_eqpt(memory_telemetry().0);

        let frame = eqpt.cam.frame().unwrap();
        assert_eq!(*frame.get_pixel(80, 60), CONE_COLOUR);
        assert_eq!(*frame.get_pixel(2, 2), BACKGROUND);

        let dets = eqpt.detector.as_mut().unwrap().detect_target(&frame);
        assert_eq!(dets.len(), 1);
        assert!((dets[0].bbox.centre_x() - 80.0).abs() < 1.0);

        let range = eqpt.range.distance_cm().unwrap();
        assert!((range - 100.0).abs() < 0.5);
    }

    #[test]
    fn test_altitude_profile() {
        let world = SimWorld::new(WorldParams::default(), GeoFix::new(35.0, 139.0));

        assert_eq!(world.altitude_at(0.0), 0.0);
        assert!((world.altitude_at(9.0) - 20.0).abs() < 1e-9);
        assert!((world.altitude_at(13.0) - 40.0).abs() < 1e-9);
        assert!((world.altitude_at(18.0) - 20.0).abs() < 1e-9);
        assert_eq!(world.altitude_at(30.0), 0.0);
    }

    #[test]
    fn test_stuck_window() {
        let params = WorldParams {
            stuck_window_s: Some([0.0, 2.0]),
            ..WorldParams::default()
        };
        let site = params.landing_site;
        let world = SimWorld::new(params, cone_north_of(site, 10.0));
        let mut eqpt = world.build_eqpt(memory_telemetry().0);

        eqpt.motors.set_wheel_power(1.0, 1.0).unwrap();
        assert_eq!(eqpt.imu.angular_rate().unwrap().norm(), 0.0);
        eqpt.sleep(2.0);
        assert!((world.distance_to_cone_m() - 10.0).abs() < 1e-6);
        eqpt.sleep(1.0);
        assert!(world.distance_to_cone_m() < 9.6);
    }
}
