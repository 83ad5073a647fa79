//! # Navigation engine
//!
//! Long range guidance from consecutive GPS fixes. The direction of travel
//! is the geodesic from the previous fix to the current one, the bearing to
//! the goal is measured relative to it.
//!
//! Bearing convention: positive when the goal is to the left of the
//! direction of travel, negative when it's to the right.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod geodesic;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use eqpt_if::eqpt::gps::GeoFix;
use util::maths::wrap_pi;

use self::geodesic::inverse;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Distance reported when any of the fixes is absent.
pub const NO_FIX_DISTANCE_M: f64 = 2_727_272_727.0;

/// Travel shorter than this is GPS noise, the direction of travel is undefined.
pub const TRAVEL_NOISE_FLOOR_M: f64 = 0.1;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Guidance solution for one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavSolution {
    pub distance_m: f64,
    pub bearing_rad: f64,

    /// Distance between the previous and current fixes, `None` without both.
    pub travel_m: Option<f64>,
}

/// Keeps the last two fixes and solves for the goal.
#[derive(Debug, Clone)]
pub struct NavigationEngine {
    goal: GeoFix,
    previous: Option<GeoFix>,
    current: Option<GeoFix>,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Distance to the goal and the bearing of the goal relative to the
/// direction of travel, as `(distance_m, bearing_rad)`.
///
/// If the vehicle moved less than [`TRAVEL_NOISE_FLOOR_M`] the bearing is
/// zero. If any fix is absent the distance is [`NO_FIX_DISTANCE_M`].
pub fn bearing_and_distance(
    current: Option<GeoFix>,
    previous: Option<GeoFix>,
    goal: Option<GeoFix>,
) -> (f64, f64) {
    let (current, previous, goal) = match (current, previous, goal) {
        (Some(c), Some(p), Some(g)) => (c, p, g),
        _ => return (NO_FIX_DISTANCE_M, 0.0),
    };

    let travel = inverse(previous, current);
    let target = inverse(current, goal);

    if travel.distance_m < TRAVEL_NOISE_FLOOR_M {
        return (target.distance_m, 0.0);
    }

    (
        target.distance_m,
        wrap_pi(-(target.azimuth_rad - travel.azimuth_rad)),
    )
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NavigationEngine {
    pub fn new(goal: GeoFix) -> Self {
        Self {
            goal,
            previous: None,
            current: None,
        }
    }

    pub fn goal(&self) -> GeoFix {
        self.goal
    }

    pub fn current(&self) -> Option<GeoFix> {
        self.current
    }

    pub fn previous(&self) -> Option<GeoFix> {
        self.previous
    }

    /// Forget any travel history and start from the given fix.
    pub fn reset(&mut self, fix: GeoFix) {
        self.previous = None;
        self.current = Some(fix);
    }

    /// Shift the current fix into the previous slot and store the new one.
    pub fn advance(&mut self, fix: GeoFix) {
        self.previous = self.current;
        self.current = Some(fix);
    }

    /// Drop the previous fix, the direction of travel is unknown until the next one.
    pub fn forget_travel(&mut self) {
        self.previous = None;
    }

    pub fn solve(&self) -> NavSolution {
        let (distance_m, bearing_rad) = match (self.previous, self.current) {
            (None, Some(c)) => (inverse(c, self.goal).distance_m, 0.0),
            _ => bearing_and_distance(self.current, self.previous, Some(self.goal)),
        };

        let travel_m = match (self.previous, self.current) {
            (Some(p), Some(c)) => Some(inverse(p, c).distance_m),
            _ => None,
        };

        NavSolution {
            distance_m,
            bearing_rad,
            travel_m,
        }
    }

    /// True if both fixes are known and the vehicle moved less than the
    /// noise floor between them.
    pub fn is_stationary(&self) -> bool {
        matches!(self.solve().travel_m, Some(t) if t < TRAVEL_NOISE_FLOOR_M)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fix(lat: f64, lon: f64) -> Option<GeoFix> {
        Some(GeoFix::new(lat, lon))
    }

    #[test]
    fn test_stationary_zero_bearing() {
        let p = fix(35.0, 139.0);

        for goal in [fix(35.001, 139.0), fix(34.9, 139.1), fix(35.0, 138.99)] {
            let (dist, bearing) = bearing_and_distance(p, p, goal);
            assert_eq!(bearing, 0.0);
            assert!(dist > 0.0 && dist < NO_FIX_DISTANCE_M);
        }
    }

    #[test]
    fn test_below_noise_floor() {
        // About 5 cm of travel
        let (_, bearing) = bearing_and_distance(
            fix(35.000_000_45, 139.0),
            fix(35.0, 139.0),
            fix(35.0, 139.001),
        );
        assert_eq!(bearing, 0.0);
    }

    #[test]
    fn test_north_travel_east_goal() {
        let (_, bearing) = bearing_and_distance(
            fix(35.0001, 139.0),
            fix(35.0, 139.0),
            fix(35.0001, 139.001),
        );
        assert!(bearing < 0.0);
        assert!((bearing + std::f64::consts::FRAC_PI_2).abs() < 0.01);
    }

    #[test]
    fn test_north_travel_west_goal() {
        let (_, bearing) = bearing_and_distance(
            fix(35.0001, 139.0),
            fix(35.0, 139.0),
            fix(35.0003, 138.9998),
        );
        assert!(bearing > 0.0);
    }

    #[test]
    fn test_mirror_negates() {
        let prev = fix(0.0, 0.0);
        let cur = fix(0.0001, 0.0);

        let (dl, bl) = bearing_and_distance(cur, prev, fix(0.0003, -0.0002));
        let (dr, br) = bearing_and_distance(cur, prev, fix(0.0003, 0.0002));

        assert_eq!(bl, -br);
        assert_eq!(dl, dr);
    }

    #[test]
    fn test_missing_fix() {
        let p = fix(35.0, 139.0);

        assert_eq!(bearing_and_distance(None, p, p), (NO_FIX_DISTANCE_M, 0.0));
        assert_eq!(bearing_and_distance(p, None, p), (NO_FIX_DISTANCE_M, 0.0));
        assert_eq!(bearing_and_distance(p, p, None), (NO_FIX_DISTANCE_M, 0.0));
    }

    #[test]
    fn test_equator_end_to_end() {
        let mut nav = NavigationEngine::new(GeoFix::new(0.0001, 0.0001));

        nav.reset(GeoFix::new(0.0, 0.0));
        assert_eq!(nav.solve().travel_m, None);
        assert!(!nav.is_stationary());

        nav.advance(GeoFix::new(0.0001, 0.0));
        let sol = nav.solve();

        assert!((sol.distance_m - 11.1).abs() < 0.1, "{}", sol.distance_m);
        assert!(sol.bearing_rad < 0.0);
        assert!(!nav.is_stationary());

        nav.advance(GeoFix::new(0.0001, 0.0));
        assert!(nav.is_stationary());
        assert_eq!(nav.solve().bearing_rad, 0.0);
    }

    #[test]
    fn test_forget_travel() {
        let mut nav = NavigationEngine::new(GeoFix::new(0.0001, 0.0001));

        nav.reset(GeoFix::new(0.0, 0.0));
        nav.advance(GeoFix::new(0.0001, 0.0));
        nav.forget_travel();

        // Distance still known from the last fix, no direction of travel
        let sol = nav.solve();
        assert_eq!(sol.travel_m, None);
        assert_eq!(sol.bearing_rad, 0.0);
        assert!((sol.distance_m - 11.1).abs() < 0.1, "{}", sol.distance_m);
        assert!(!nav.is_stationary());

        // The next fix measures travel from the last known one
        nav.advance(GeoFix::new(0.0002, 0.0));
        assert_eq!(nav.previous(), Some(GeoFix::new(0.0001, 0.0)));
        assert!(nav.solve().travel_m.is_some());
    }
}
