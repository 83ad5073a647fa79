//! # [`Phase::Standby`] implementation

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use eqpt_if::Eqpt;
use log::{info, warn};

use super::{
    phase_elapsed_s, states::Descending, Phase, PhaseCtrlError, PhaseCtrlParams,
    PhaseCtrlPersistantData, StepOutput,
};
use crate::staging::StagingEvent;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Waiting on the pad for the launch.
///
/// Possible transitions:
/// - Descending, on reaching the launch altitude or on timeout
/// - Descending, straight after calibration if the barometer never answered
#[derive(Debug, Default)]
pub struct Standby {
    start_s: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Standby {
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

        // The ground reference is measured once, on the pad
        if !persistant.staging.is_calibrated() {
            info!("Calibrating the ground reference pressure");
            persistant.staging.calibrate(eqpt);

            // Launch can't be seen, the descent ceiling still bounds the release
            if !persistant.staging.has_measured_reference() {
                warn!("Barometer gave no readings, skipping launch detection");
                eqpt.tm("warning", "no barometer");
                return Ok(StepOutput::advance(Phase::Descending(Descending::new())));
            }

            return Ok(StepOutput::stay());
        }

        if elapsed_s >= params.standby_timeout_s {
            warn!("No launch detected after {:.0} s, assuming descent", elapsed_s);
            eqpt.tm("warning", "standby timeout");
            return Ok(StepOutput::advance(Phase::Descending(Descending::new())));
        }

        match persistant.staging.check_ascent(eqpt) {
            StagingEvent::Ascended => Ok(StepOutput::advance(Phase::Descending(Descending::new()))),
            _ => Ok(StepOutput::stay()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::phase_ctrl::{test::controller, PhaseId};
    use eqpt_if::{eqpt::gps::GeoFix, sim::Rig};

    #[test]
    fn test_launch_detected() {
        let (mut eqpt, _) = Rig::new()
            .altitude(|t| Some(if t < 3.0 { 0.0 } else { 12.0 }))
            .build();
        let mut pc = controller(GeoFix::new(35.0, 139.0));

        while eqpt.now_s() < 3.0 {
            assert_eq!(pc.step(&mut eqpt), PhaseId::Standby);
            eqpt.sleep(0.1);
        }

        assert_eq!(pc.step(&mut eqpt), PhaseId::Descending);
    }

    #[test]
    fn test_standby_timeout() {
        let (mut eqpt, handles) = Rig::new().build();
        let mut pc = controller(GeoFix::new(35.0, 139.0));
        pc.params.standby_timeout_s = 5.0;

        pc.step(&mut eqpt);
        let mut num_steps = 0;
        while pc.step(&mut eqpt) == PhaseId::Standby {
            eqpt.sleep(0.5);
            num_steps += 1;
            assert!(num_steps < 20);
        }

        assert_eq!(pc.phase_id(), PhaseId::Descending);
        assert!(handles.clock.now() >= 5.0);
    }

    #[test]
    fn test_dead_barometer_skips_launch_detection() {
        let (mut eqpt, handles) = Rig::new().altitude(|_| None).build();
        let mut pc = controller(GeoFix::new(35.0, 139.0));

        assert_eq!(pc.step(&mut eqpt), PhaseId::Descending);
        assert!(handles.clock.now() < pc.params.standby_timeout_s);
        assert!(handles
            .tm_values("warning")
            .iter()
            .any(|v| v.to_string() == "no barometer"));
    }

    #[test]
    fn test_partial_calibration_waits_for_launch() {
        // Only the first read of the window answers
        let mut num_reads = 0u32;
        let (mut eqpt, _) = Rig::new()
            .altitude(move |_| {
                num_reads += 1;
                if num_reads == 1 { Some(0.0) } else { None }
            })
            .build();
        let mut pc = controller(GeoFix::new(35.0, 139.0));
        pc.persistant.staging.params.warmup_reads = 0;

        assert_eq!(pc.step(&mut eqpt), PhaseId::Standby);
        assert!(pc.persistant.staging.has_measured_reference());
    }
}
