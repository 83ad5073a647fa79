//! # Data Store

use eqpt_if::eqpt::Eqpt;
use log::warn;

use crate::phase_ctrl::PhaseId;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Debug)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Phase active at the end of the last cycle
    pub phase: PhaseId,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,

    /// Total number of cycle overruns
    pub num_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Default for DataStore {
    fn default() -> Self {
        Self {
            num_cycles: 0,
            is_1_hz_cycle: false,
            phase: PhaseId::Standby,
            num_consec_cycle_overruns: 0,
            num_cycle_overruns: 0,
        }
    }
}

impl DataStore {
    /// Perform actions required at the start of a cycle.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64) {
        let cycles_per_s = (cycle_frequency_hz.round() as u128).max(1);
        self.is_1_hz_cycle = self.num_cycles % cycles_per_s == 0;
    }

    /// Perform actions required at the end of a cycle, given how long the cycle overran for.
    pub fn cycle_end(&mut self, overrun_s: Option<f64>) {
        match overrun_s {
            Some(s) => {
                // Phases block during manoeuvres so long cycles are expected there
                if self.phase == PhaseId::Standby {
                    warn!("Cycle overran by {:.06} s", s);
                }
                self.num_consec_cycle_overruns += 1;
                self.num_cycle_overruns += 1;
            }
            None => self.num_consec_cycle_overruns = 0,
        }

        self.num_cycles += 1;
    }

    /// True once Standby has overrun `max` cycles in a row.
    ///
    /// Only reported on the cycle the limit is reached.
    pub fn overrun_limit_reached(&self, max: u64) -> bool {
        self.phase == PhaseId::Standby && max > 0 && self.num_consec_cycle_overruns == max
    }

    /// Write the once per second summary record on 1 Hz cycles.
    pub fn record_summary(&self, eqpt: &mut Eqpt) {
        if !self.is_1_hz_cycle {
            return;
        }

        eqpt.tm("cycle", self.num_cycles as f64);
        eqpt.tm("cycle_phase", self.phase as u32);
        eqpt.tm("cycle_overruns", self.num_cycle_overruns as f64);
        eqpt.tm("consec_cycle_overruns", self.num_consec_cycle_overruns as f64);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use eqpt_if::sim::Rig;

    #[test]
    fn test_cycle_counters() {
        let mut ds = DataStore::default();

        ds.cycle_start(10.0);
        assert!(ds.is_1_hz_cycle);
        ds.cycle_end(None);

        ds.cycle_start(10.0);
        assert!(!ds.is_1_hz_cycle);
        ds.cycle_end(Some(0.2));
        ds.cycle_end(Some(0.2));
        assert_eq!(ds.num_consec_cycle_overruns, 2);

        ds.cycle_end(None);
        assert_eq!(ds.num_consec_cycle_overruns, 0);
        assert_eq!(ds.num_cycle_overruns, 2);
        assert_eq!(ds.num_cycles, 4);
    }

    #[test]
    fn test_summary_at_1_hz() {
        let (mut eqpt, handles) = Rig::new().build();
        let mut ds = DataStore::default();

        for _ in 0..25 {
            ds.cycle_start(10.0);
            ds.record_summary(&mut eqpt);
            ds.cycle_end(None);
        }

        let cycles = handles.tm_values("cycle");
        assert_eq!(cycles.len(), 3);
        assert_eq!(cycles[2].to_string(), "20");
        assert_eq!(handles.tm_values("cycle_phase")[0].to_string(), "0");
    }

    #[test]
    fn test_overrun_limit_reported_once() {
        let mut ds = DataStore::default();
        let mut num_reports = 0;

        for _ in 0..15 {
            ds.cycle_end(Some(0.05));
            if ds.overrun_limit_reached(10) {
                num_reports += 1;
            }
        }
        assert_eq!(num_reports, 1);

        // Blocking manoeuvres overrun by design
        let mut ds = DataStore::default();
        ds.phase = PhaseId::LongRangeNav;
        for _ in 0..10 {
            ds.cycle_end(Some(5.0));
        }
        assert!(!ds.overrun_limit_reached(10));
    }
}
