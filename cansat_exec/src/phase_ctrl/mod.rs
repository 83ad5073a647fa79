//! # Phase controller
//!
//! This module implements the [`PhaseController`] state machine, which sequences the mission of
//! the rover from the pad to the goal. The mission is broken down into phases:
//!
//! - `Standby` - On the pad, waiting for the launch altitude.
//! - `Descending` - Falling under the parachute, waiting for the landing and firing the release.
//! - `LongRangeNav` - Driving towards the goal using GPS fixes.
//! - `ShortRangeNav` - Homing in on the goal marker using the camera and rangefinder.
//! - `Goal` - Mission complete, nothing more to do.
//!
//! Phases only ever move forward. Every phase is bounded in time, so a fault in one of them
//! can only delay the mission, never stall it.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod descending;
mod long_range;
mod params;
mod short_range;
mod standby;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use eqpt_if::{eqpt::gps::GeoFix, Eqpt, EqptError};
use log::{error, info};
use serde::Serialize;
use std::fmt::Display;

pub use self::params::PhaseCtrlParams;

use crate::{
    anomaly::AnomalyFilter,
    motion::{MotionController, MotionParams},
    nav::NavigationEngine,
    staging::{AltitudeStaging, StagingParams},
    vision::{RangeProbe, VisionParams, VisionTargetTracker},
};

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub mod states {
    pub use super::descending::Descending;
    pub use super::long_range::{LongRangeNav, LongRangeStage};
    pub use super::short_range::ShortRangeNav;
    pub use super::standby::Standby;
}

use states::*;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Mission phase controller
pub struct PhaseController {
    /// Parameters for the controller and all its phases.
    pub params: PhaseCtrlParams,

    /// Data valid over all phases, such as the navigation history and the control components.
    pub persistant: PhaseCtrlPersistantData,

    /// The currently active phase.
    phase: Phase,
}

pub struct PhaseCtrlPersistantData {
    /// Filter for readings taken directly by the phases
    pub filter: AnomalyFilter,

    pub staging: AltitudeStaging,

    pub nav: NavigationEngine,

    pub motion: MotionController,

    pub tracker: VisionTargetTracker,

    /// Range confirmation retry state, kept across short range cycles
    pub range_probe: RangeProbe,
}

/// Output of a phase's step function.
pub struct StepOutput {
    pub action: PhaseAction,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors that can occur in the phase controller.
#[derive(Debug, thiserror::Error)]
pub enum PhaseCtrlError {
    #[error("Failed to load {0}: {1}")]
    ParamLoadError(&'static str, util::params::LoadError),

    #[error("Camera could not be started after {0} attempts: {1}")]
    CameraStartFailed(u32, EqptError),
}

#[derive(Debug)]
pub enum Phase {
    Standby(Standby),
    Descending(Descending),
    LongRangeNav(LongRangeNav),
    ShortRangeNav(ShortRangeNav),
    Goal,
}

/// Payload free identifier of a [`Phase`], used in telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PhaseId {
    Standby = 0,
    Descending = 1,
    LongRangeNav = 2,
    ShortRangeNav = 3,
    Goal = 4,
}

/// Actions that can be performed at the end of a phase's step function.
#[derive(Debug)]
pub enum PhaseAction {
    Stay,
    Advance(Phase),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PhaseController {
    pub fn new(
        params: PhaseCtrlParams,
        motion_params: MotionParams,
        vision_params: VisionParams,
        staging_params: StagingParams,
        goal: GeoFix,
    ) -> Self {
        Self {
            params,
            persistant: PhaseCtrlPersistantData {
                filter: AnomalyFilter::default(),
                staging: AltitudeStaging::new(staging_params),
                nav: NavigationEngine::new(goal),
                motion: MotionController::new(motion_params),
                range_probe: RangeProbe::new(&vision_params),
                tracker: VisionTargetTracker::new(vision_params),
            },
            phase: Phase::Standby(Standby::new()),
        }
    }

    /// Load all parameter files and create the controller in Standby.
    pub fn init(goal: GeoFix) -> Result<Self, PhaseCtrlError> {
        Ok(Self::new(
            load_params("phase_ctrl.toml")?,
            load_params("motion.toml")?,
            load_params("vision.toml")?,
            load_params("staging.toml")?,
            goal,
        ))
    }

    /// Run one cycle of the current phase, returning the phase active afterwards.
    pub fn step(&mut self, eqpt: &mut Eqpt) -> PhaseId {
        let output = match self.phase.step(&self.params, &mut self.persistant, eqpt) {
            Ok(o) => o,
            Err(e) => {
                // Errors never end the mission, they push it on to the next phase
                error!("{}", e);
                eqpt.tm("error", e.to_string());
                StepOutput::advance(self.forced_successor(eqpt))
            }
        };

        if let PhaseAction::Advance(next) = output.action {
            info!("Phase change: {} -> {}", self.phase, next);
            eqpt.tm("msg", format!("phase {}", next));
            self.phase = next;
        }

        let id = self.phase.id();
        eqpt.tm("phase", id as u32);

        id
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn phase_id(&self) -> PhaseId {
        self.phase.id()
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.phase, Phase::Goal)
    }

    fn forced_successor(&mut self, eqpt: &mut Eqpt) -> Phase {
        match self.phase {
            Phase::Standby(_) => Phase::Descending(Descending::new()),
            Phase::Descending(_) => {
                // Leaving descent must never skip the release
                self.persistant.staging.fire_release(eqpt);
                Phase::LongRangeNav(LongRangeNav::new())
            }
            Phase::LongRangeNav(_) => Phase::ShortRangeNav(ShortRangeNav::new()),
            Phase::ShortRangeNav(_) | Phase::Goal => Phase::Goal,
        }
    }
}

fn load_params<P>(file: &'static str) -> Result<P, PhaseCtrlError>
where
    P: serde::de::DeserializeOwned,
{
    util::params::load(file).map_err(|e| PhaseCtrlError::ParamLoadError(file, e))
}

impl Phase {
    fn step(
        &mut self,
        params: &PhaseCtrlParams,
        persistant: &mut PhaseCtrlPersistantData,
        eqpt: &mut Eqpt,
    ) -> Result<StepOutput, PhaseCtrlError> {
        match self {
            Phase::Standby(s) => s.step(params, persistant, eqpt),
            Phase::Descending(s) => s.step(params, persistant, eqpt),
            Phase::LongRangeNav(s) => s.step(params, persistant, eqpt),
            Phase::ShortRangeNav(s) => s.step(params, persistant, eqpt),
            Phase::Goal => Ok(StepOutput::stay()),
        }
    }

    pub fn id(&self) -> PhaseId {
        match self {
            Phase::Standby(_) => PhaseId::Standby,
            Phase::Descending(_) => PhaseId::Descending,
            Phase::LongRangeNav(_) => PhaseId::LongRangeNav,
            Phase::ShortRangeNav(_) => PhaseId::ShortRangeNav,
            Phase::Goal => PhaseId::Goal,
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Standby(_) => write!(f, "Phase::Standby"),
            Phase::Descending(_) => write!(f, "Phase::Descending"),
            Phase::LongRangeNav(_) => write!(f, "Phase::LongRangeNav"),
            Phase::ShortRangeNav(_) => write!(f, "Phase::ShortRangeNav"),
            Phase::Goal => write!(f, "Phase::Goal"),
        }
    }
}

impl StepOutput {
    pub fn stay() -> Self {
        Self {
            action: PhaseAction::Stay,
        }
    }

    pub fn advance(next: Phase) -> Self {
        Self {
            action: PhaseAction::Advance(next),
        }
    }
}

/// Time since a phase started, starting the phase clock on the first call.
pub(crate) fn phase_elapsed_s(start_s: &mut Option<f64>, eqpt: &Eqpt) -> f64 {
    let now_s = eqpt.now_s();
    now_s - *start_s.get_or_insert(now_s)
}
