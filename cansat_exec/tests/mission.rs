//! Full flights against the simulation world, from the pad to the goal marker.

use cansat_lib::{
    motion::MotionParams,
    phase_ctrl::{PhaseCtrlParams, PhaseController, PhaseId},
    staging::StagingParams,
    vision::VisionParams,
};
use eqpt_if::{
    eqpt::{gps::GeoFix, mech::LineId},
    sim::world::{memory_telemetry, SimWorld, WorldParams},
};

const CYCLE_PERIOD_S: f64 = 0.1;
const MAX_CYCLES: usize = 50_000;
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Goal offset from the landing site by the given local distances.
fn offset(site: GeoFix, north_m: f64, east_m: f64) -> GeoFix {
    GeoFix::new(
        site.latitude + (north_m / EARTH_RADIUS_M).to_degrees(),
        site.longitude
            + (east_m / (EARTH_RADIUS_M * site.latitude.to_radians().cos())).to_degrees(),
    )
}

struct Flight {
    world: SimWorld,
    phases: Vec<PhaseId>,
    end_s: f64,
}

fn fly(params: WorldParams, goal: GeoFix) -> Flight {
    let world = SimWorld::new(params, goal);
    let (tm, _log) = memory_telemetry();
    let mut eqpt = world.build_eqpt(tm);

    let mut pc = PhaseController::new(
        PhaseCtrlParams::default(),
        MotionParams::default(),
        VisionParams::default(),
        StagingParams::default(),
        goal,
    );

    let mut phases = vec![pc.phase_id()];

    for _ in 0..MAX_CYCLES {
        let start_s = eqpt.now_s();
        let id = pc.step(&mut eqpt);

        if phases.last() != Some(&id) {
            phases.push(id);
        }

        if id == PhaseId::Goal {
            break;
        }

        let dur_s = eqpt.now_s() - start_s;
        if dur_s < CYCLE_PERIOD_S {
            eqpt.sleep(CYCLE_PERIOD_S - dur_s);
        }
    }

    let end_s = eqpt.now_s();
    eqpt.release();

    Flight { world, phases, end_s }
}

fn release_edges(world: &SimWorld) -> usize {
    let mut high = false;
    let mut count = 0;

    for e in world.state().lines.iter().filter(|e| e.line == LineId::Release) {
        if e.high && !high {
            count += 1;
        }
        high = e.high;
    }

    count
}

#[test]
fn test_nominal_flight() {
    let params = WorldParams {
        initial_azimuth_deg: 90.0,
        ..WorldParams::default()
    };
    let goal = offset(params.landing_site, 20.0, 20.0);

    let flight = fly(params, goal);

    assert_eq!(
        flight.phases,
        vec![
            PhaseId::Standby,
            PhaseId::Descending,
            PhaseId::LongRangeNav,
            PhaseId::ShortRangeNav,
            PhaseId::Goal
        ]
    );
    assert_eq!(release_edges(&flight.world), 1);
    assert!(
        flight.world.distance_to_cone_m() < 1.0,
        "ended {:.2} m from the marker",
        flight.world.distance_to_cone_m()
    );

    // Release line is low again once the mission has finished
    let last = flight
        .world
        .state()
        .lines
        .iter()
        .rev()
        .find(|e| e.line == LineId::Release)
        .map(|e| e.high);
    assert_eq!(last, Some(false));
}

#[test]
fn test_flight_landing_inverted() {
    let params = WorldParams {
        start_inverted: true,
        ..WorldParams::default()
    };
    let goal = offset(params.landing_site, 25.0, -5.0);

    let flight = fly(params, goal);

    assert_eq!(flight.phases.last(), Some(&PhaseId::Goal));
    assert!(!flight.world.state().inverted);
    assert!(flight.world.distance_to_cone_m() < 1.0);
}

#[test]
fn test_flight_with_stuck_interval() {
    // Stuck during the first legs after the release
    let params = WorldParams {
        stuck_window_s: Some([45.0, 60.0]),
        ..WorldParams::default()
    };
    let goal = offset(params.landing_site, 30.0, 0.0);

    let flight = fly(params, goal);

    assert_eq!(flight.phases.last(), Some(&PhaseId::Goal));
    assert_eq!(release_edges(&flight.world), 1);
    assert!(flight.world.distance_to_cone_m() < 1.0);
    assert!(flight.end_s < 7200.0);
}
