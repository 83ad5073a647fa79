//! Motion control module
//!
//! Ramped open loop drive commands for the two wheel rover, with stall
//! detection from gyro activity, automatic self righting and the stall
//! escape sequence.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod cmd;
mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use eqpt_if::{eqpt::mech::LineId, Eqpt, EqptError};
use log::{debug, info, warn};

// Internal
pub use cmd::*;
pub use params::*;

use crate::anomaly::{AnomalyFilter, Field, SensorClass};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during motion control.
#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    #[error("Power must be in [0, 1], found {0}")]
    InvalidPower(f64),

    #[error("Duration must be in [0, {1}] s, found {0}")]
    InvalidDuration(f64, f64),

    #[error("Actuation failed: {0}")]
    Actuation(EqptError),
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct MotionController {
    pub params: MotionParams,

    filter: AnomalyFilter,

    /// Last (left, right) demand accepted by the motors
    wheels: (f64, f64),

    /// Outcome of the most recent self righting attempt
    pub last_righting: Option<RightingOutcome>,

    /// Number of motor writes that failed
    pub num_actuation_failures: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotionController {
    pub fn new(params: MotionParams) -> Self {
        Self {
            params,
            filter: AnomalyFilter::default(),
            wheels: (0.0, 0.0),
            last_righting: None,
            num_actuation_failures: 0,
        }
    }

    /// Last wheel demand accepted by the motors.
    pub fn wheels(&self) -> (f64, f64) {
        self.wheels
    }

    /// Execute a drive command, blocking until the rover has stopped again.
    ///
    /// Invalid commands and actuation failures are logged and treated as
    /// no-ops. Stall detection runs only when `stall_check` is set and the
    /// command is long enough.
    pub fn drive(&mut self, eqpt: &mut Eqpt, cmd: MotionCommand, stall_check: bool) -> StallState {
        if let Err(e) = cmd.validate(self.params.max_duration_s) {
            warn!("Rejected motion command {:?}: {}", cmd, e);
            return StallState::Clear;
        }

        if cmd.direction == Direction::Stop {
            self.stop(eqpt);
            return StallState::Clear;
        }

        debug!("Drive {:?}", cmd);
        let start_s = eqpt.now_s();
        let (sign_l, sign_r) = cmd.direction.wheel_signs();

        if self.ramp_up(eqpt, sign_l, sign_r, cmd.power).is_err() {
            self.stop(eqpt);
            return StallState::Clear;
        }

        eqpt.tm("motor_l", self.wheels.0);
        eqpt.tm("motor_r", self.wheels.1);

        // The ramp eats into the commanded duration
        let hold_s = (cmd.duration_s - (eqpt.now_s() - start_s)).max(0.0);

        let state = if stall_check && cmd.duration_s >= self.params.stall_min_duration_s {
            self.hold_checked(eqpt, &cmd, hold_s)
        }
        else {
            eqpt.sleep(hold_s);
            StallState::Clear
        };

        self.stop(eqpt);

        state
    }

    /// Ramp down to a full stop.
    ///
    /// Always ends with an exact zero demand on both wheels.
    pub fn stop(&mut self, eqpt: &mut Eqpt) {
        let (left, right) = self.wheels;
        let level = left.abs().max(right.abs());
        let step = self.params.ramp_step;

        if level > 0.0 && step > 0.0 {
            let num_steps = (level / step).ceil() as u32;

            for k in 1..=num_steps {
                let scale = (level - k as f64 * step).max(0.0) / level;

                if self.set_wheels(eqpt, left * scale, right * scale).is_err() {
                    break;
                }
                eqpt.sleep(self.params.ramp_down_interval_s);
            }
        }

        self.set_wheels(eqpt, 0.0, 0.0).ok();
        eqpt.sleep(self.params.stop_settle_s);

        eqpt.tm("motor_l", 0.0);
        eqpt.tm("motor_r", 0.0);
    }

    /// Run the stall escape sequence if the last command stalled.
    ///
    /// The sequence is bounded and open loop: the stall is not re-checked
    /// afterwards.
    pub fn check_stuck(&mut self, eqpt: &mut Eqpt, stall: StallState) -> RecoveryOutcome {
        if stall == StallState::Clear {
            return RecoveryOutcome::NotRequired;
        }

        warn!("Rover stuck, running escape sequence");
        eqpt.tm("warning", "stuck");

        for _ in 0..self.params.recovery_blinks {
            self.set_led(eqpt, true);
            eqpt.sleep(self.params.recovery_blink_s);
            self.set_led(eqpt, false);
            eqpt.sleep(self.params.recovery_blink_s);
        }

        let p = &self.params;
        let sequence = [
            MotionCommand::new(Direction::Backward, p.recovery_power, p.recovery_reverse_s),
            MotionCommand::new(Direction::TurnRight, p.recovery_power, p.recovery_turn_s),
            MotionCommand::new(Direction::Forward, p.recovery_power, p.recovery_probe_s),
        ];
        let settle_s = p.recovery_settle_s;

        for cmd in sequence.iter() {
            self.drive(eqpt, *cmd, false);
            eqpt.sleep(settle_s);
        }

        info!("Escape sequence complete, stall clearance not verified");
        eqpt.tm("msg", "escape sequence complete (unverified)");

        RecoveryOutcome::CompletedUnverified
    }

    /// True if the gravity vector says the rover is on its back or side.
    pub fn is_tipped_over(&mut self, eqpt: &mut Eqpt) -> bool {
        let gravity = eqpt.imu.gravity();

        match self.filter.check(SensorClass::Orientation, Field::Gravity, gravity) {
            Some(g) => g.z < self.params.tip_over_gravity_z_ms2,
            None => false,
        }
    }

    fn ramp_up(
        &mut self,
        eqpt: &mut Eqpt,
        sign_l: f64,
        sign_r: f64,
        power: f64,
    ) -> Result<(), MotionError> {
        let step = if self.params.ramp_step > 0.0 {
            self.params.ramp_step
        }
        else {
            power
        };

        let mut k = 1u32;
        loop {
            let level = (k as f64 * step).min(power);

            self.set_wheels(eqpt, sign_l * level, sign_r * level)?;
            eqpt.sleep(self.params.ramp_up_interval_s);

            if level >= power {
                break;
            }
            k += 1;
        }

        Ok(())
    }

    /// Hold the current demand for `hold_s`, checking for stalls and tip over.
    fn hold_checked(&mut self, eqpt: &mut Eqpt, cmd: &MotionCommand, hold_s: f64) -> StallState {
        let samples = self.params.stall_window_samples;
        let interval_s = self.params.stall_sample_interval_s;
        let window_s = samples as f64 * interval_s;

        let mut remaining_s = hold_s;
        let mut righting_done = false;

        while window_s > 0.0 && remaining_s >= window_s {
            let mut num_answered = 0;
            let mut num_active = 0;

            for _ in 0..samples {
                let rate = eqpt.imu.angular_rate();
                let rate = self.filter.check(SensorClass::Orientation, Field::AngularRate, rate);

                if let Some(r) = rate {
                    num_answered += 1;

                    // Yaw is the only meaningful axis while turning on the spot
                    let activity = if cmd.direction.is_turn() {
                        r.z.abs()
                    }
                    else {
                        r.norm()
                    };

                    if activity > self.params.stall_rate_threshold_rads {
                        num_active += 1;
                    }
                }

                eqpt.sleep(interval_s);
            }
            remaining_s -= window_s;

            if !righting_done && self.is_tipped_over(eqpt) {
                let used_s = self.self_right(eqpt);
                remaining_s = (remaining_s - used_s).max(0.0);
                righting_done = true;
            }

            if num_answered > 0 && num_active == 0 {
                warn!(
                    "Stall detected during {:?}, no gyro activity in {} samples",
                    cmd.direction, num_answered
                );
                return StallState::Stalled;
            }
        }

        eqpt.sleep(remaining_s);
        StallState::Clear
    }

    /// Drive forward in short ramped pulses until the gravity vector is
    /// upright again, then ramp back to the demand that was active. Returns
    /// the time spent.
    fn self_right(&mut self, eqpt: &mut Eqpt) -> f64 {
        warn!("Rover tipped over, attempting to self right");
        eqpt.tm("warning", "tipped over");

        let start_s = eqpt.now_s();
        let restore = self.wheels;
        let p = self.params.righting_power;
        let mut outcome = RightingOutcome::Failed;

        // The active demand may be a turn, leave it gradually
        self.stop(eqpt);

        while eqpt.now_s() - start_s < self.params.righting_max_s {
            if self.ramp_up(eqpt, 1.0, 1.0, p).is_err() {
                break;
            }
            eqpt.sleep(self.params.righting_pulse_s);
            self.stop(eqpt);

            if !self.is_tipped_over(eqpt) {
                outcome = RightingOutcome::Righted;
                break;
            }
        }

        match outcome {
            RightingOutcome::Righted => info!("Rover righted after {:.1} s", eqpt.now_s() - start_s),
            RightingOutcome::Failed => warn!("Rover could not be righted"),
        }
        eqpt.tm("msg", format!("self righting: {:?}", outcome));
        self.last_righting = Some(outcome);

        if self.ramp_to(eqpt, restore).is_err() {
            self.stop(eqpt);
        }

        eqpt.now_s() - start_s
    }

    /// Ramp up from rest to a demand of equal magnitude on both wheels.
    fn ramp_to(&mut self, eqpt: &mut Eqpt, demand: (f64, f64)) -> Result<(), MotionError> {
        let level = demand.0.abs().max(demand.1.abs());
        if level == 0.0 {
            return Ok(());
        }

        self.ramp_up(eqpt, demand.0 / level, demand.1 / level, level)
    }

    fn set_wheels(&mut self, eqpt: &mut Eqpt, left: f64, right: f64) -> Result<(), MotionError> {
        match eqpt.motors.set_wheel_power(left, right) {
            Ok(()) => {
                self.wheels = (left, right);
                Ok(())
            }
            Err(e) => {
                self.num_actuation_failures += 1;
                warn!("Could not set wheel power ({}, {}): {}", left, right, e);
                Err(MotionError::Actuation(e))
            }
        }
    }

    fn set_led(&mut self, eqpt: &mut Eqpt, on: bool) {
        if let Err(e) = eqpt.lines.set_line(LineId::StatusLed, on) {
            warn!("Could not set the status LED: {}", e);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use eqpt_if::sim::Rig;
    use nalgebra::Vector3;

    fn forward(power: f64, duration_s: f64) -> MotionCommand {
        MotionCommand::new(Direction::Forward, power, duration_s)
    }

    #[test]
    fn test_stall_zero_rate() {
        let (mut eqpt, handles) = Rig::new().build();
        let mut mc = MotionController::new(MotionParams::default());

        let state = mc.drive(&mut eqpt, forward(1.0, 3.0), true);
        assert_eq!(state, StallState::Stalled);

        // The stall ends the hold early
        assert!(handles.clock.now() < 3.0);

        let last = *handles.wheels.borrow().last().unwrap();
        assert_eq!((last.left, last.right), (0.0, 0.0));
    }

    #[test]
    fn test_no_stall_with_activity() {
        // Hovering around the threshold, one sample in five above it
        let mut num_reads = 0u32;
        let (mut eqpt, _) = Rig::new()
            .angular_rate(move |_| {
                num_reads += 1;
                let x = if num_reads % 5 == 3 { 0.45 } else { 0.35 };
                Some(Vector3::new(x, 0.0, 0.0))
            })
            .build();
        let mut mc = MotionController::new(MotionParams::default());

        assert_eq!(mc.drive(&mut eqpt, forward(1.0, 3.0), true), StallState::Clear);

        // The same oscillation kept just under the threshold is a stall
        let mut num_reads = 0u32;
        let (mut eqpt, _) = Rig::new()
            .angular_rate(move |_| {
                num_reads += 1;
                let x = if num_reads % 2 == 0 { 0.39 } else { 0.3 };
                Some(Vector3::new(x, 0.0, 0.0))
            })
            .build();

        assert_eq!(mc.drive(&mut eqpt, forward(1.0, 3.0), true), StallState::Stalled);
    }

    #[test]
    fn test_turn_uses_yaw() {
        let mut mc = MotionController::new(MotionParams::default());
        let turn = MotionCommand::new(Direction::TurnLeft, 1.0, 3.0);

        // Strong roll but no yaw still reads as stalled while turning
        let (mut eqpt, _) = Rig::new()
            .angular_rate(|_| Some(Vector3::new(2.0, 0.0, 0.0)))
            .build();
        assert_eq!(mc.drive(&mut eqpt, turn, true), StallState::Stalled);

        let (mut eqpt, _) = Rig::new()
            .angular_rate(|_| Some(Vector3::new(0.0, 0.0, 1.2)))
            .build();
        assert_eq!(mc.drive(&mut eqpt, turn, true), StallState::Clear);
    }

    #[test]
    fn test_absent_gyro_is_not_a_stall() {
        let (mut eqpt, _) = Rig::new().angular_rate(|_| None).build();
        let mut mc = MotionController::new(MotionParams::default());

        assert_eq!(mc.drive(&mut eqpt, forward(1.0, 3.0), true), StallState::Clear);
    }

    #[test]
    fn test_short_commands_not_checked() {
        let (mut eqpt, _) = Rig::new().build();
        let mut mc = MotionController::new(MotionParams::default());

        assert_eq!(mc.drive(&mut eqpt, forward(1.0, 1.5), true), StallState::Clear);
    }

    #[test]
    fn test_ramp_up_then_stop() {
        let (mut eqpt, handles) = Rig::new().build();
        let mut mc = MotionController::new(MotionParams::default());

        mc.drive(&mut eqpt, forward(0.8, 1.0), false);

        let wheels = handles.wheels.borrow();
        let peak_idx = wheels
            .iter()
            .position(|w| w.left == 0.8)
            .unwrap();

        // Strictly increasing up to the requested power, in 0.1 steps
        assert_eq!(peak_idx, 7);
        for pair in wheels[..=peak_idx].windows(2) {
            assert!(pair[1].left > pair[0].left);
            assert!((pair[1].left - pair[0].left - 0.1).abs() < 1e-9);
        }

        // The peak is held until the commanded duration has elapsed
        let ramp_down_start = wheels[peak_idx + 1].time_s;
        assert!((ramp_down_start - 1.0).abs() < 1e-9, "{}", ramp_down_start);

        // Never exceeds the requested power and always ends at exactly zero
        assert!(wheels.iter().all(|w| w.left <= 0.8 && w.right <= 0.8));
        let last = wheels.last().unwrap();
        assert_eq!((last.left, last.right), (0.0, 0.0));
    }

    #[test]
    fn test_ramp_down_monotonic() {
        let (mut eqpt, handles) = Rig::new().build();
        let mut mc = MotionController::new(MotionParams::default());

        mc.drive(&mut eqpt, MotionCommand::new(Direction::TurnRight, 0.55, 0.5), false);

        let wheels = handles.wheels.borrow();
        let peak_idx = wheels.iter().position(|w| w.left == 0.55).unwrap();

        for pair in wheels[peak_idx..].windows(2) {
            assert!(pair[1].left <= pair[0].left);
            assert!(pair[1].right >= pair[0].right);
        }
        assert_eq!(mc.wheels(), (0.0, 0.0));
    }

    #[test]
    fn test_invalid_commands_rejected() {
        let (mut eqpt, handles) = Rig::new().build();
        let mut mc = MotionController::new(MotionParams::default());

        assert_eq!(mc.drive(&mut eqpt, forward(1.5, 1.0), true), StallState::Clear);
        assert_eq!(mc.drive(&mut eqpt, forward(-0.1, 1.0), true), StallState::Clear);
        assert_eq!(mc.drive(&mut eqpt, forward(0.5, 31.0), true), StallState::Clear);
        assert_eq!(mc.drive(&mut eqpt, forward(0.5, f64::NAN), true), StallState::Clear);

        assert!(handles.wheels.borrow().is_empty());
        assert_eq!(handles.clock.now(), 0.0);
    }

    #[test]
    fn test_actuation_failure_is_noop() {
        let (mut eqpt, _) = Rig::new().failing_motors().build();
        let mut mc = MotionController::new(MotionParams::default());

        assert_eq!(mc.drive(&mut eqpt, forward(1.0, 3.0), true), StallState::Clear);
        assert!(mc.num_actuation_failures > 0);
        assert_eq!(mc.wheels(), (0.0, 0.0));
    }

    #[test]
    fn test_self_righting() {
        let (mut eqpt, _) = Rig::new()
            .angular_rate(|_| Some(Vector3::new(1.0, 0.0, 0.0)))
            .gravity(|t| Some(Vector3::new(0.0, 0.0, if t < 2.0 { -9.81 } else { 9.81 })))
            .build();
        let mut mc = MotionController::new(MotionParams::default());

        assert_eq!(mc.drive(&mut eqpt, forward(1.0, 3.0), true), StallState::Clear);
        assert_eq!(mc.last_righting, Some(RightingOutcome::Righted));
    }

    #[test]
    fn test_self_righting_is_ramped() {
        // Tipped over part way through a turn
        let (mut eqpt, handles) = Rig::new()
            .angular_rate(|_| Some(Vector3::new(0.0, 0.0, 1.2)))
            .gravity(|t| Some(Vector3::new(0.0, 0.0, if t < 2.0 { -9.81 } else { 9.81 })))
            .build();
        let mut mc = MotionController::new(MotionParams::default());
        let step = mc.params.ramp_step;

        mc.drive(&mut eqpt, MotionCommand::new(Direction::TurnLeft, 1.0, 4.0), true);
        assert_eq!(mc.last_righting, Some(RightingOutcome::Righted));

        let wheels = handles.wheels.borrow();
        assert!(wheels.iter().any(|w| w.left > 0.0 && w.right > 0.0));
        for pair in wheels.windows(2) {
            assert!((pair[1].left - pair[0].left).abs() <= step + 1e-9, "{:?}", pair);
            assert!((pair[1].right - pair[0].right).abs() <= step + 1e-9, "{:?}", pair);
        }

        // Back on the turn after righting, then stopped
        assert!(wheels.iter().rev().any(|w| w.left == -1.0 && w.right == 1.0 && w.time_s > 2.0));
        let last = wheels.last().unwrap();
        assert_eq!((last.left, last.right), (0.0, 0.0));
    }

    #[test]
    fn test_self_righting_bounded() {
        let (mut eqpt, handles) = Rig::new()
            .angular_rate(|_| Some(Vector3::new(1.0, 0.0, 0.0)))
            .gravity(|_| Some(Vector3::new(0.0, 0.0, -9.81)))
            .build();
        let mut mc = MotionController::new(MotionParams::default());

        mc.drive(&mut eqpt, forward(1.0, 3.0), true);
        assert_eq!(mc.last_righting, Some(RightingOutcome::Failed));

        // One righting attempt of at most 5 s plus its ramps and the command
        assert!(handles.clock.now() < 3.0 + 5.0 + 1.0);
    }

    #[test]
    fn test_check_stuck() {
        let (mut eqpt, handles) = Rig::new().build();
        let mut mc = MotionController::new(MotionParams::default());

        assert_eq!(mc.check_stuck(&mut eqpt, StallState::Clear), RecoveryOutcome::NotRequired);
        assert!(handles.wheels.borrow().is_empty());

        assert_eq!(
            mc.check_stuck(&mut eqpt, StallState::Stalled),
            RecoveryOutcome::CompletedUnverified
        );

        assert_eq!(handles.rising_edges(LineId::StatusLed), 2);
        assert!(!handles.line_state(LineId::StatusLed));

        let wheels = handles.wheels.borrow();
        assert!(wheels.iter().any(|w| w.left == -1.0 && w.right == -1.0));
        assert!(wheels.iter().any(|w| w.left == 1.0 && w.right == -1.0));
        assert!(wheels.iter().any(|w| w.left == 1.0 && w.right == 1.0));

        let last = wheels.last().unwrap();
        assert_eq!((last.left, last.right), (0.0, 0.0));
    }
}
