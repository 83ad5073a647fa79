//! # [`Phase::ShortRangeNav`] implementation

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use eqpt_if::Eqpt;
use log::{debug, info, warn};

use super::{
    phase_elapsed_s, Phase, PhaseCtrlError, PhaseCtrlParams, PhaseCtrlPersistantData, StepOutput,
};
use crate::{
    motion::{Direction, MotionCommand},
    vision::{CameraOrder, RangeOutcome},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Camera homing onto the goal marker.
///
/// Possible transitions:
/// - Goal, when the rangefinder confirms the marker is reached, when the confirmation gives up,
///   or on timeout
#[derive(Debug, Default)]
pub struct ShortRangeNav {
    start_s: Option<f64>,

    camera_started: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ShortRangeNav {
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

        if elapsed_s >= params.short_range_timeout_s {
            warn!("Short range navigation timed out after {:.0} s", elapsed_s);
            eqpt.tm("warning", "short range timeout");
            return Ok(StepOutput::advance(Phase::Goal));
        }

        if !self.camera_started {
            self.start_camera(params, eqpt)?;
        }

        let frame = match eqpt.cam.frame() {
            Some(f) => f,
            None => {
                warn!("No camera frame");
                return Ok(StepOutput::stay());
            }
        };

        let res = persistant
            .tracker
            .detect(&frame, eqpt.detector.as_deref_mut());

        eqpt.tm("camera_order", format!("{:?}", res.order));
        eqpt.tm("goal_relative_x", res.relative_x);
        eqpt.tm("camera_area", res.area_fraction);
        debug!("Camera: {:?}", res);

        let motion = &mut persistant.motion;

        match res.order {
            CameraOrder::None => {
                motion.drive(
                    eqpt,
                    MotionCommand::new(Direction::TurnRight, params.search_power, params.search_turn_s),
                    false,
                );
                eqpt.sleep(params.search_settle_s);
            }
            CameraOrder::Center => {
                motion.drive(
                    eqpt,
                    MotionCommand::new(Direction::Forward, params.approach_power, params.approach_s),
                    false,
                );
                eqpt.sleep(params.short_range_settle_s);
            }
            CameraOrder::Left | CameraOrder::Right => {
                let direction = if res.order == CameraOrder::Left {
                    Direction::TurnLeft
                }
                else {
                    Direction::TurnRight
                };

                motion.drive(
                    eqpt,
                    MotionCommand::new(
                        direction,
                        params.steer_power,
                        res.relative_x.abs() * params.steer_s_per_offset,
                    ),
                    false,
                );
                eqpt.sleep(params.short_range_settle_s);
            }
            CameraOrder::Close => return Ok(self.confirm_range(params, persistant, eqpt)),
        }

        Ok(StepOutput::stay())
    }

    fn start_camera(&mut self, params: &PhaseCtrlParams, eqpt: &mut Eqpt) -> Result<(), PhaseCtrlError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match eqpt.cam.start() {
                Ok(()) => {
                    info!("Camera started");
                    self.camera_started = true;
                    return Ok(());
                }
                Err(e) if attempt >= params.camera_start_attempts => {
                    return Err(PhaseCtrlError::CameraStartFailed(attempt, e));
                }
                Err(e) => {
                    warn!("Camera start attempt {} failed: {}", attempt, e);
                    eqpt.sleep(params.camera_retry_s);
                }
            }
        }
    }

    /// The marker fills the view, confirm the distance with the rangefinder.
    fn confirm_range(
        &mut self,
        params: &PhaseCtrlParams,
        persistant: &mut PhaseCtrlPersistantData,
        eqpt: &mut Eqpt,
    ) -> StepOutput {
        let nudge = MotionCommand::new(Direction::Forward, params.nudge_power, params.nudge_s);
        let goal_range_cm = persistant.tracker.params.goal_range_cm;
        let retry_s = persistant.tracker.params.range_retry_s;

        loop {
            match persistant.range_probe.probe(eqpt.range.distance_cm()) {
                RangeOutcome::Range(cm) if cm < goal_range_cm => {
                    info!("Goal confirmed at {:.0} cm", cm);
                    persistant.motion.drive(eqpt, nudge, false);
                    eqpt.tm("msg", "goal reached");
                    return StepOutput::advance(Phase::Goal);
                }
                RangeOutcome::Range(cm) => {
                    debug!("Marker still {:.0} cm away, creeping forward", cm);
                    persistant.motion.drive(eqpt, nudge, false);
                    return StepOutput::stay();
                }
                RangeOutcome::Retrying(_) => eqpt.sleep(retry_s),
                RangeOutcome::Nudge => {
                    warn!("No range to the marker, nudging forward");
                    persistant.motion.drive(eqpt, nudge, false);
                    return StepOutput::stay();
                }
                RangeOutcome::GiveUp => {
                    warn!("Range to the marker could not be confirmed, assuming the goal is reached");
                    eqpt.tm("warning", "range unconfirmed");
                    return StepOutput::advance(Phase::Goal);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::phase_ctrl::{test::controller, PhaseId};
    use eqpt_if::{eqpt::gps::GeoFix, sim::Rig};
    use image::{Rgb, RgbImage};

    fn frame_with_rect(x0: u32, w: u32, h: u32) -> RgbImage {
        let mut img = RgbImage::from_pixel(100, 100, Rgb([90, 96, 90]));
        for y in 0..h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, Rgb([200, 20, 20]));
            }
        }
        img
    }

    fn short_range(rig: Rig) -> (crate::phase_ctrl::PhaseController, Eqpt, eqpt_if::sim::RigHandles) {
        let (eqpt, handles) = rig.build();
        let mut pc = controller(GeoFix::new(35.0, 139.0));
        pc.phase = Phase::ShortRangeNav(ShortRangeNav::new());
        (pc, eqpt, handles)
    }

    #[test]
    fn test_search_when_nothing_seen() {
        let (mut pc, mut eqpt, handles) =
            short_range(Rig::new().frames(vec![Some(frame_with_rect(0, 0, 0))]));

        assert_eq!(pc.step(&mut eqpt), PhaseId::ShortRangeNav);
        assert!(handles.camera_started.get());

        let wheels = handles.wheels.borrow();
        assert!(wheels[0].left > 0.0 && wheels[0].right < 0.0);
        assert_eq!(handles.tm_values("camera_order")[0].to_string(), "None");
    }

    #[test]
    fn test_missing_frame_stays() {
        let (mut pc, mut eqpt, handles) = short_range(Rig::new());

        assert_eq!(pc.step(&mut eqpt), PhaseId::ShortRangeNav);
        assert!(handles.wheels.borrow().is_empty());
    }

    #[test]
    fn test_steer_left() {
        let (mut pc, mut eqpt, handles) =
            short_range(Rig::new().frames(vec![Some(frame_with_rect(0, 20, 50))]));

        pc.step(&mut eqpt);

        let wheels = handles.wheels.borrow();
        assert!(wheels[0].left < 0.0 && wheels[0].right > 0.0);
    }

    #[test]
    fn test_close_and_confirmed() {
        let (mut pc, mut eqpt, handles) = short_range(
            Rig::new()
                .frames(vec![Some(frame_with_rect(20, 60, 60))])
                .ranges(vec![Some(45.0)]),
        );

        assert_eq!(pc.step(&mut eqpt), PhaseId::Goal);

        // Nudged forward onto the marker
        let wheels = handles.wheels.borrow();
        assert!(wheels.iter().any(|w| w.left == 0.8 && w.right == 0.8));
        assert!(wheels.iter().all(|w| w.left >= 0.0 && w.right >= 0.0));
    }

    #[test]
    fn test_close_but_too_far_creeps() {
        let (mut pc, mut eqpt, _) = short_range(
            Rig::new()
                .frames(vec![Some(frame_with_rect(20, 60, 60))])
                .ranges(vec![Some(120.0), Some(50.0)]),
        );

        assert_eq!(pc.step(&mut eqpt), PhaseId::ShortRangeNav);
        assert_eq!(pc.step(&mut eqpt), PhaseId::Goal);
    }

    #[test]
    fn test_range_gives_up() {
        let (mut pc, mut eqpt, _) =
            short_range(Rig::new().frames(vec![Some(frame_with_rect(20, 60, 60))]));

        // First cycle nudges after 10 failed reads, the second gives up after 20
        assert_eq!(pc.step(&mut eqpt), PhaseId::ShortRangeNav);
        assert_eq!(pc.step(&mut eqpt), PhaseId::Goal);
    }

    #[test]
    fn test_timeout() {
        let (mut pc, mut eqpt, _) = short_range(Rig::new());

        pc.step(&mut eqpt);
        eqpt.sleep(600.0);
        assert_eq!(pc.step(&mut eqpt), PhaseId::Goal);
    }
}
