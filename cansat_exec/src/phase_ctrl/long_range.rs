//! # [`Phase::LongRangeNav`] implementation
//!
//! GPS guidance towards the goal. Each cycle is one leg: turn towards the goal by the bearing
//! measured over the previous leg, drive forward, then take a new fix.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use eqpt_if::{eqpt::gps::GeoFix, Eqpt};
use log::{debug, info, warn};

use super::{
    phase_elapsed_s, states::ShortRangeNav, Phase, PhaseCtrlError, PhaseCtrlParams,
    PhaseCtrlPersistantData, StepOutput,
};
use crate::{
    anomaly::{AnomalyFilter, Field, SensorClass},
    motion::{Direction, MotionCommand},
    nav::TRAVEL_NOISE_FLOOR_M,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Long range navigation.
///
/// Possible transitions:
/// - ShortRangeNav, when close to the goal, when no GPS fix can be acquired, after too many
///   stationary legs, or on timeout
#[derive(Debug, Default)]
pub struct LongRangeNav {
    start_s: Option<f64>,

    pub stage: LongRangeStage,

    /// Number of consecutive legs without measurable travel
    pub num_stationary: u32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongRangeStage {
    /// Waiting for the first fix after the release
    Acquire,

    /// Driving blind to establish a direction of travel
    InitialLeg,

    /// Steering legs towards the goal
    Navigate,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for LongRangeStage {
    fn default() -> Self {
        LongRangeStage::Acquire
    }
}

impl LongRangeNav {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(
        &mut self,
        params: &PhaseCtrlParams,
        persistant: &mut PhaseCtrlPersistantData,
        eqpt: &mut Eqpt,
    ) -> Result<StepOutput, PhaseCtrlError> {
        let elapsed_s = phase_elapsed_s(&mut self.start_s, eqpt);

        if elapsed_s >= params.long_range_timeout_s {
            warn!("Long range navigation timed out after {:.0} s", elapsed_s);
            eqpt.tm("warning", "long range timeout");
            return Ok(to_short_range());
        }

        match self.stage {
            LongRangeStage::Acquire => self.acquire(params, persistant, eqpt),
            LongRangeStage::InitialLeg => self.initial_leg(params, persistant, eqpt),
            LongRangeStage::Navigate => self.navigate(params, persistant, eqpt),
        }
    }

    fn acquire(
        &mut self,
        params: &PhaseCtrlParams,
        persistant: &mut PhaseCtrlPersistantData,
        eqpt: &mut Eqpt,
    ) -> Result<StepOutput, PhaseCtrlError> {
        match get_fix(&mut persistant.filter, eqpt, params.gps_acquire_attempts, params.gps_retry_s) {
            Some(fix) => {
                info!("First fix acquired at ({:.6}, {:.6})", fix.latitude, fix.longitude);
                persistant.nav.reset(fix);
                self.stage = LongRangeStage::InitialLeg;
                Ok(StepOutput::stay())
            }
            None => {
                warn!(
                    "No GPS fix after {} attempts, switching to short range navigation",
                    params.gps_acquire_attempts
                );
                eqpt.tm("warning", "gps unavailable");
                Ok(to_short_range())
            }
        }
    }

    fn initial_leg(
        &mut self,
        params: &PhaseCtrlParams,
        persistant: &mut PhaseCtrlPersistantData,
        eqpt: &mut Eqpt,
    ) -> Result<StepOutput, PhaseCtrlError> {
        let motion = &mut persistant.motion;

        let stall = motion.drive(
            eqpt,
            MotionCommand::new(Direction::Forward, params.leg_power, params.initial_leg_s),
            true,
        );
        motion.check_stuck(eqpt, stall);
        eqpt.sleep(params.nav_settle_s);

        self.update_fix(params, persistant, eqpt);
        self.stage = LongRangeStage::Navigate;

        Ok(StepOutput::stay())
    }

    fn navigate(
        &mut self,
        params: &PhaseCtrlParams,
        persistant: &mut PhaseCtrlPersistantData,
        eqpt: &mut Eqpt,
    ) -> Result<StepOutput, PhaseCtrlError> {
        let sol = persistant.nav.solve();
        eqpt.tm("goal_distance", sol.distance_m);
        eqpt.tm("goal_relative_angle_rad", sol.bearing_rad);
        debug!(
            "Goal at {:.1} m, bearing {:.1} deg",
            sol.distance_m,
            sol.bearing_rad.to_degrees()
        );

        if sol.distance_m <= params.short_range_switch_m {
            info!("Within {:.1} m of the goal", sol.distance_m);
            return Ok(to_short_range());
        }

        match sol.travel_m {
            Some(t) if t < TRAVEL_NOISE_FLOOR_M => {
                self.num_stationary += 1;
                warn!("No travel over the last leg ({} consecutive)", self.num_stationary);
            }
            Some(_) => {
                self.num_stationary = 0;
                Self::turn_towards(params, persistant, eqpt, sol.bearing_rad);
            }
            // Legs without a fix are counted in update_fix
            None => debug!("Direction of travel unknown, holding heading"),
        }

        if self.num_stationary >= params.max_stationary_cycles {
            warn!("Rover not moving, switching to short range navigation");
            eqpt.tm("warning", "stationary");
            return Ok(to_short_range());
        }

        let motion = &mut persistant.motion;
        let stall = motion.drive(
            eqpt,
            MotionCommand::new(Direction::Forward, params.leg_power, params.leg_s),
            true,
        );
        motion.check_stuck(eqpt, stall);
        eqpt.sleep(params.nav_settle_s);

        self.update_fix(params, persistant, eqpt);

        Ok(StepOutput::stay())
    }

    fn update_fix(
        &mut self,
        params: &PhaseCtrlParams,
        persistant: &mut PhaseCtrlPersistantData,
        eqpt: &mut Eqpt,
    ) {
        match get_fix(&mut persistant.filter, eqpt, params.gps_fix_attempts, params.gps_retry_s) {
            Some(fix) => persistant.nav.advance(fix),
            None => {
                // Without a new fix there's no evidence of travel
                warn!("No GPS fix after the leg");
                self.num_stationary += 1;
                persistant.nav.forget_travel();
            }
        }
    }

    fn turn_towards(
        params: &PhaseCtrlParams,
        persistant: &mut PhaseCtrlPersistantData,
        eqpt: &mut Eqpt,
        bearing_rad: f64,
    ) {
        if params.turn_rate_rads <= 0.0 || bearing_rad == 0.0 {
            return;
        }

        let direction = if bearing_rad > 0.0 {
            Direction::TurnLeft
        }
        else {
            Direction::TurnRight
        };
        let turn_s = bearing_rad.abs() / params.turn_rate_rads;

        persistant
            .motion
            .drive(eqpt, MotionCommand::new(direction, params.turn_power, turn_s), false);
        eqpt.sleep(params.nav_settle_s);
    }
}

fn to_short_range() -> StepOutput {
    StepOutput::advance(Phase::ShortRangeNav(ShortRangeNav::new()))
}

/// Read the GPS until a plausible fix arrives, at most `attempts` times.
fn get_fix(
    filter: &mut AnomalyFilter,
    eqpt: &mut Eqpt,
    attempts: u32,
    retry_s: f64,
) -> Option<GeoFix> {
    for attempt in 0..attempts {
        let raw = eqpt.gps.fix();

        let lat = filter.check(SensorClass::Gps, Field::Latitude, raw.map(|f| f.latitude));
        let lon = filter.check(SensorClass::Gps, Field::Longitude, raw.map(|f| f.longitude));

        if let (Some(lat), Some(lon)) = (lat, lon) {
            eqpt.tm("lat", lat);
            eqpt.tm("lon", lon);
            return Some(GeoFix::new(lat, lon));
        }

        if attempt + 1 < attempts {
            eqpt.sleep(retry_s);
        }
    }

    None
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::phase_ctrl::{test::controller, PhaseId};
    use eqpt_if::sim::Rig;
    use nalgebra::Vector3;

    fn moving_rig() -> Rig {
        Rig::new().angular_rate(|_| Some(Vector3::new(1.0, 0.0, 0.0)))
    }

    #[test]
    fn test_no_gps() {
        let (mut eqpt, handles) = moving_rig().build();
        let mut pc = controller(GeoFix::new(35.001, 139.0));
        pc.phase = Phase::LongRangeNav(LongRangeNav::new());

        assert_eq!(pc.step(&mut eqpt), PhaseId::ShortRangeNav);

        // 120 attempts spaced 0.5 s
        assert!((handles.clock.now() - 59.5).abs() < 1e-6);
    }

    #[test]
    fn test_implausible_fix_rejected() {
        let (mut eqpt, _) = moving_rig()
            .gps_fixes(vec![Some(GeoFix::new(95.0, 139.0)), Some(GeoFix::new(35.0, 139.0))])
            .build();
        let mut filter = AnomalyFilter::default();

        let fix = get_fix(&mut filter, &mut eqpt, 5, 0.5).unwrap();
        assert_eq!(fix, GeoFix::new(35.0, 139.0));
        assert_eq!(filter.num_rejected, 1);
    }

    #[test]
    fn test_close_goal_hands_over() {
        let (mut eqpt, _) = moving_rig()
            .gps_fixes(vec![Some(GeoFix::new(35.0, 139.0)), Some(GeoFix::new(35.00001, 139.0))])
            .build();
        let mut pc = controller(GeoFix::new(35.00003, 139.0));
        pc.phase = Phase::LongRangeNav(LongRangeNav::new());

        // Acquire, initial leg, then the goal is within range
        assert_eq!(pc.step(&mut eqpt), PhaseId::LongRangeNav);
        assert_eq!(pc.step(&mut eqpt), PhaseId::LongRangeNav);
        assert_eq!(pc.step(&mut eqpt), PhaseId::ShortRangeNav);
    }

    #[test]
    fn test_stationary_hands_over() {
        // Same fix every time, far from the goal
        let (mut eqpt, handles) = moving_rig()
            .gps_fixes(vec![Some(GeoFix::new(35.0, 139.0))])
            .build();
        let mut pc = controller(GeoFix::new(35.01, 139.0));
        pc.phase = Phase::LongRangeNav(LongRangeNav::new());

        let mut num_steps = 0;
        while pc.step(&mut eqpt) == PhaseId::LongRangeNav {
            num_steps += 1;
            assert!(num_steps < 30);
        }

        // Acquire and initial leg, then 20 stationary cycles
        assert_eq!(num_steps, 21);
        assert_eq!(pc.phase_id(), PhaseId::ShortRangeNav);

        // Every stationary leg still drove forward
        let num_legs = handles
            .wheels
            .borrow()
            .windows(2)
            .filter(|w| w[0].left != 1.0 && w[1].left == 1.0 && w[1].right == 1.0)
            .count();
        assert_eq!(num_legs, 20);
    }

    #[test]
    fn test_turns_towards_goal() {
        // Travelling north, goal to the east
        let (mut eqpt, handles) = moving_rig()
            .gps_fixes(vec![
                Some(GeoFix::new(35.0, 139.0)),
                Some(GeoFix::new(35.0001, 139.0)),
            ])
            .build();
        let mut pc = controller(GeoFix::new(35.0001, 139.01));
        pc.phase = Phase::LongRangeNav(LongRangeNav::new());

        pc.step(&mut eqpt);
        pc.step(&mut eqpt);
        let num_before = handles.wheels.borrow().len();
        pc.step(&mut eqpt);

        // The first command of the leg is a right turn
        let first = handles.wheels.borrow()[num_before];
        assert!(first.left > 0.0 && first.right < 0.0);

        let angles = handles.tm_values("goal_relative_angle_rad");
        assert_eq!(angles.len(), 1);
    }

    #[test]
    fn test_gps_lost_while_navigating() {
        // Travelling north, goal far to the east, then the receiver goes silent
        let (mut eqpt, handles) = moving_rig()
            .gps_fixes(vec![
                Some(GeoFix::new(35.0, 139.0)),
                Some(GeoFix::new(35.0001, 139.0)),
                None,
            ])
            .build();
        let mut pc = controller(GeoFix::new(35.0001, 139.01));
        pc.phase = Phase::LongRangeNav(LongRangeNav::new());

        let mut stationary = Vec::new();
        let mut num_steps = 0;
        while pc.step(&mut eqpt) == PhaseId::LongRangeNav {
            if let Phase::LongRangeNav(ref lr) = pc.phase {
                stationary.push(lr.num_stationary);
            }
            num_steps += 1;
            assert!(num_steps < 40);
        }

        // Acquire and initial leg, then one counted leg per lost fix up to the bound
        assert_eq!(pc.phase_id(), PhaseId::ShortRangeNav);
        assert_eq!(num_steps, 22);
        assert_eq!(&stationary[2..5], &[1, 2, 3]);
        assert!(handles.clock.now() < 1200.0);

        // Only the first leg turned, the stale bearing is never reused
        let num_turns = handles
            .wheels
            .borrow()
            .windows(2)
            .filter(|w| w[0].left == 0.0 && w[0].right == 0.0 && w[1].left * w[1].right < 0.0)
            .count();
        assert_eq!(num_turns, 1);
    }
}
