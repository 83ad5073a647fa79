//! The shipped parameter files must parse and agree with the built in defaults.

use std::path::PathBuf;

use cansat_lib::{
    motion::MotionParams,
    params::{CansatExecParams, EqptSource},
    phase_ctrl::PhaseCtrlParams,
    staging::StagingParams,
    vision::VisionParams,
};
use eqpt_if::sim::world::WorldParams;
use util::params::load_from_path;

fn params_file(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.pop();
    path.push("params");
    path.push(name);
    path
}

#[test]
fn test_exec_params() {
    let p: CansatExecParams = load_from_path(params_file("cansat_exec.toml")).unwrap();

    assert_eq!(p.eqpt_source, EqptSource::Sim);
    assert_eq!(p.pins.release, 16);
    assert_eq!(p.pins.status_led, 5);
    assert_eq!(p.log.default_level().unwrap(), util::logger::LevelFilter::Info);
    assert_eq!(p.log.module_levels().unwrap().len(), 1);
    assert_eq!(p.max_consec_overruns, CansatExecParams::default().max_consec_overruns);
    assert!(p.goal.latitude > 35.0 && p.goal.longitude > 139.0);
}

#[test]
fn test_module_params() {
    let phase: PhaseCtrlParams = load_from_path(params_file("phase_ctrl.toml")).unwrap();
    let motion: MotionParams = load_from_path(params_file("motion.toml")).unwrap();
    let vision: VisionParams = load_from_path(params_file("vision.toml")).unwrap();
    let staging: StagingParams = load_from_path(params_file("staging.toml")).unwrap();

    assert_eq!(phase.max_stationary_cycles, PhaseCtrlParams::default().max_stationary_cycles);
    assert_eq!(motion.stall_window_samples, MotionParams::default().stall_window_samples);
    assert_eq!(vision.target_bands, VisionParams::default().target_bands);
    assert_eq!(staging.release_duration_s, 15.0);
}

#[test]
fn test_sim_params() {
    let world: WorldParams = load_from_path(params_file("sim.toml")).unwrap();

    assert_eq!(world.initial_azimuth_deg, 90.0);
    assert!(world.stuck_window_s.is_none());
}
