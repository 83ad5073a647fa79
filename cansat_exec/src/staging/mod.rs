//! # Altitude staging
//!
//! Barometric detection of launch and landing, and the single shot release
//! of the rover from the CanSat.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use eqpt_if::{eqpt::mech::LineId, Eqpt};
use log::{debug, info, warn};

pub use params::StagingParams;

use crate::anomaly::{AnomalyFilter, Field, SensorClass};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingEvent {
    /// Nothing to report this cycle
    Waiting,

    /// Launch altitude reached
    Ascended,

    /// Altitude has been stable near the ground for long enough
    Landed,

    /// The descent took too long, release regardless
    DescentTimeout,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct AltitudeStaging {
    pub params: StagingParams,

    filter: AnomalyFilter,

    reference_hpa: Option<f64>,

    /// Valid samples behind the reference, zero if the default was used
    num_reference_samples: usize,

    released: bool,
}

/// Landing detection state, created when the descent starts.
#[derive(Debug, Clone)]
pub struct DescentMonitor {
    start_s: f64,
    next_sample_s: f64,
    last_altitude_m: Option<f64>,
    num_stable: u32,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl AltitudeStaging {
    pub fn new(params: StagingParams) -> Self {
        Self {
            params,
            filter: AnomalyFilter::default(),
            reference_hpa: None,
            num_reference_samples: 0,
            released: false,
        }
    }

    /// Measure the ground level reference pressure.
    ///
    /// Blocks for the warm up and sample window, returns the reference used.
    pub fn calibrate(&mut self, eqpt: &mut Eqpt) -> f64 {
        for _ in 0..self.params.warmup_reads {
            eqpt.baro.read();
            eqpt.sleep(self.params.baseline_interval_s);
        }

        let mut samples = Vec::with_capacity(self.params.baseline_reads);
        for _ in 0..self.params.baseline_reads {
            if let Some(p) = self.pressure(eqpt) {
                samples.push(p);
            }
            eqpt.sleep(self.params.baseline_interval_s);
        }

        // The first readings after power up still drift
        let num_discard = (samples.len() as f64 * self.params.baseline_discard_fraction) as usize;
        let kept = &samples[num_discard.min(samples.len())..];

        let reference_hpa = match util::maths::mean(kept) {
            Some(p) => {
                info!(
                    "Reference pressure {:.2} hPa from {} samples",
                    p,
                    kept.len()
                );
                p
            }
            None => {
                warn!(
                    "No valid pressure during calibration, using {:.2} hPa",
                    self.params.default_reference_hpa
                );
                self.params.default_reference_hpa
            }
        };

        eqpt.tm("msg", format!("reference pressure {:.2} hPa", reference_hpa));
        self.reference_hpa = Some(reference_hpa);
        self.num_reference_samples = kept.len();

        reference_hpa
    }

    pub fn is_calibrated(&self) -> bool {
        self.reference_hpa.is_some()
    }

    /// True if calibration got at least one valid pressure reading.
    pub fn has_measured_reference(&self) -> bool {
        self.num_reference_samples > 0
    }

    pub fn reference_hpa(&self) -> f64 {
        self.reference_hpa.unwrap_or(self.params.default_reference_hpa)
    }

    /// Read the current altitude above the reference.
    pub fn altitude(&mut self, eqpt: &mut Eqpt) -> Option<f64> {
        let pressure_hpa = self.pressure(eqpt)?;
        eqpt.tm("press", pressure_hpa);

        let altitude_m = eqpt.baro.altitude(pressure_hpa, self.reference_hpa())?;
        eqpt.tm("alt", altitude_m);

        Some(altitude_m)
    }

    /// One Standby sample, `Ascended` once the launch altitude is reached.
    pub fn check_ascent(&mut self, eqpt: &mut Eqpt) -> StagingEvent {
        match self.altitude(eqpt) {
            Some(a) if a >= self.params.launch_altitude_m => {
                info!("Launch detected at {:.1} m", a);
                StagingEvent::Ascended
            }
            _ => StagingEvent::Waiting,
        }
    }

    /// Drive the release line high for the release duration.
    ///
    /// Only the first call has an effect, returns false for any later one.
    pub fn fire_release(&mut self, eqpt: &mut Eqpt) -> bool {
        if self.released {
            warn!("Release already fired, ignoring");
            return false;
        }
        self.released = true;

        info!("Firing release for {:.1} s", self.params.release_duration_s);
        eqpt.tm("msg", "release");

        if let Err(e) = eqpt.lines.set_line(LineId::Release, true) {
            warn!("Could not set the release line: {}", e);
        }

        eqpt.sleep(self.params.release_duration_s);

        if let Err(e) = eqpt.lines.set_line(LineId::Release, false) {
            warn!("Could not clear the release line: {}", e);
        }

        true
    }

    pub fn has_released(&self) -> bool {
        self.released
    }

    fn pressure(&mut self, eqpt: &mut Eqpt) -> Option<f64> {
        let reading = eqpt.baro.read();
        self.filter
            .check(SensorClass::Barometer, Field::Pressure, reading.map(|r| r.pressure_hpa))
    }
}

impl DescentMonitor {
    pub fn new(start_s: f64) -> Self {
        Self {
            start_s,
            next_sample_s: start_s,
            last_altitude_m: None,
            num_stable: 0,
        }
    }

    pub fn start_s(&self) -> f64 {
        self.start_s
    }

    pub fn num_stable(&self) -> u32 {
        self.num_stable
    }

    /// Sample the altitude if a sample is due. Never blocks.
    pub fn poll(&mut self, staging: &mut AltitudeStaging, eqpt: &mut Eqpt) -> StagingEvent {
        let now_s = eqpt.now_s();

        if now_s - self.start_s >= staging.params.descent_timeout_s {
            warn!("Landing not detected after {:.0} s", now_s - self.start_s);
            return StagingEvent::DescentTimeout;
        }

        if now_s < self.next_sample_s {
            return StagingEvent::Waiting;
        }
        self.next_sample_s = now_s + staging.params.descent_sample_interval_s;

        let altitude_m = staging.altitude(eqpt);
        self.update(&staging.params, altitude_m)
    }

    /// Feed one altitude sample.
    ///
    /// An absent sample is skipped, the stable count and the last altitude are held.
    pub fn update(&mut self, params: &StagingParams, altitude_m: Option<f64>) -> StagingEvent {
        let a = match altitude_m {
            Some(a) => a,
            None => {
                debug!("No altitude sample, holding {} stable samples", self.num_stable);
                return StagingEvent::Waiting;
            }
        };

        let stable = match self.last_altitude_m {
            Some(last) => (a - last).abs() <= params.landing_delta_m,
            None => false,
        };

        if stable && a <= params.landing_altitude_m {
            self.num_stable += 1;
        }
        else {
            self.num_stable = 0;
        }

        self.last_altitude_m = Some(a);

        if self.num_stable >= params.landing_samples {
            info!("Landing detected");
            StagingEvent::Landed
        }
        else {
            StagingEvent::Waiting
        }
    }
}
