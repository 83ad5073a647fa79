//! # [`Phase::Descending`] implementation

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use eqpt_if::Eqpt;
use log::info;

use super::{
    states::LongRangeNav, Phase, PhaseCtrlError, PhaseCtrlParams, PhaseCtrlPersistantData,
    StepOutput,
};
use crate::staging::{DescentMonitor, StagingEvent};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Falling under the parachute.
///
/// Possible transitions:
/// - LongRangeNav, after the release has been fired on landing or on the descent timeout
#[derive(Debug, Default)]
pub struct Descending {
    monitor: Option<DescentMonitor>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Descending {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(
        &mut self,
        _params: &PhaseCtrlParams,
        persistant: &mut PhaseCtrlPersistantData,
        eqpt: &mut Eqpt,
    ) -> Result<StepOutput, PhaseCtrlError> {
        let now_s = eqpt.now_s();
        let monitor = self
            .monitor
            .get_or_insert_with(|| DescentMonitor::new(now_s));

        match monitor.poll(&mut persistant.staging, eqpt) {
            event @ (StagingEvent::Landed | StagingEvent::DescentTimeout) => {
                info!("Descent over ({:?}), releasing the rover", event);
                persistant.staging.fire_release(eqpt);

                Ok(StepOutput::advance(Phase::LongRangeNav(LongRangeNav::new())))
            }
            _ => Ok(StepOutput::stay()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::phase_ctrl::{test::controller, PhaseId};
    use eqpt_if::{
        eqpt::{gps::GeoFix, mech::LineId},
        sim::Rig,
    };

    #[test]
    fn test_release_on_landing() {
        let (mut eqpt, handles) = Rig::new()
            .altitude(|t| Some(if t < 20.0 { 30.0 - t } else { 1.0 }))
            .build();
        let mut pc = controller(GeoFix::new(35.0, 139.0));
        pc.phase = Phase::Descending(Descending::new());

        let mut release_s = None;
        while eqpt.now_s() < 100.0 {
            if pc.step(&mut eqpt) == PhaseId::LongRangeNav {
                release_s = Some(eqpt.now_s());
                break;
            }
            eqpt.sleep(0.1);
        }

        // 15 s of release after landing just after 25 s
        let release_s = release_s.unwrap();
        assert!(release_s > 35.0 && release_s < 45.0, "{}", release_s);
        assert_eq!(handles.rising_edges(LineId::Release), 1);
        assert!(!handles.line_state(LineId::Release));
    }
}
