//! Main CanSat mission executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Build the equipment context, either from the simulation world or hardware drivers
//!     - Main loop:
//!         - Step the phase controller, which reads sensors and drives actuators
//!         - Cycle management
//!     - Release the equipment, leaving motors stopped and lines low
//!
//! All timing goes through the equipment clock, so a simulated mission runs on virtual time.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use structopt::StructOpt;

// Internal
use cansat_lib::{
    data_store::DataStore,
    params::{CansatExecParams, EqptSource},
    phase_ctrl::{PhaseController, PhaseId},
};
use eqpt_if::sim::world::{SimWorld, WorldParams};
use util::{
    archive::TelemetryArchive,
    logger::logger_init,
    raise_error,
    session::Session,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// CanSat rover mission executable
#[derive(Debug, StructOpt)]
#[structopt(name = "cansat_exec")]
struct Opts {
    /// Run against the simulation world regardless of the configured equipment source
    #[structopt(long)]
    sim: bool,

    /// Stop after this many cycles, even if the goal hasn't been reached
    #[structopt(long)]
    max_cycles: Option<u128>,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("cansat_exec", "sessions").wrap_err("Failed to create the session")?;

    // ---- LOAD PARAMETERS ----

    // Loaded before the logger, which takes its levels from them
    let exec_params: CansatExecParams =
        util::params::load("cansat_exec.toml").wrap_err("Could not load exec params")?;

    // Initialise logger
    logger_init(&exec_params.log, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("CanSat Mission Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    let source = if opts.sim {
        EqptSource::Sim
    }
    else {
        exec_params.eqpt_source
    };

    info!("Exec parameters loaded, equipment source: {:?}", source);
    info!("Goal at ({:.6}, {:.6})", exec_params.goal.latitude, exec_params.goal.longitude);

    // ---- INITIALISE EQUIPMENT ----

    let tm = TelemetryArchive::new(&session).wrap_err("Failed to open the telemetry archive")?;

    let (mut eqpt, world) = match source {
        EqptSource::Sim => {
            let world_params: WorldParams =
                util::params::load("sim.toml").wrap_err("Could not load sim params")?;

            let world = SimWorld::new(world_params, exec_params.goal);
            info!("Simulation world initialised");

            (world.build_eqpt(Box::new(tm)), Some(world))
        }
        EqptSource::Hardware => {
            info!("Pin map: {:?}", exec_params.pins);
            return Err(eyre!("No hardware drivers are available in this build, use --sim"));
        }
    };

    if !exec_params.cycle_period_s.is_finite() || exec_params.cycle_period_s <= 0.0 {
        raise_error!(
            "Cycle period must be positive, found {}",
            exec_params.cycle_period_s
        );
    }

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    let mut phase_ctrl =
        PhaseController::init(exec_params.goal).wrap_err("Failed to initialise PhaseController")?;
    info!("PhaseController init complete");

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let cycle_frequency_hz = 1.0 / exec_params.cycle_period_s;

    loop {
        // Get cycle start time
        let cycle_start_s = eqpt.now_s();

        ds.cycle_start(cycle_frequency_hz);

        // ---- PHASE PROCESSING ----

        ds.phase = phase_ctrl.step(&mut eqpt);
        ds.record_summary(&mut eqpt);

        if ds.phase == PhaseId::Goal {
            info!("Goal reached after {} cycles", ds.num_cycles + 1);
            break;
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur_s = eqpt.now_s() - cycle_start_s;

        if cycle_dur_s < exec_params.cycle_period_s {
            eqpt.sleep(exec_params.cycle_period_s - cycle_dur_s);
            ds.cycle_end(None);
        }
        else {
            ds.cycle_end(Some(cycle_dur_s - exec_params.cycle_period_s));
        }

        if ds.overrun_limit_reached(exec_params.max_consec_overruns) {
            warn!(
                "{} consecutive overruns in Standby, the {} s cycle period cannot be kept",
                ds.num_consec_cycle_overruns, exec_params.cycle_period_s
            );
            eqpt.tm("warning", "cycle overruns");
        }

        if let Some(max) = opts.max_cycles {
            if ds.num_cycles >= max {
                info!("Maximum number of cycles ({}) reached, stopping", max);
                break;
            }
        }
    }

    // ---- SHUTDOWN ----

    if let Some(w) = world {
        info!(
            "Final simulated position ({:.6}, {:.6}), {:.2} m from the goal",
            w.position().latitude,
            w.position().longitude,
            w.distance_to_cone_m()
        );
    }

    info!(
        "{} cycles, {} overruns, {} motor write failures",
        ds.num_cycles,
        ds.num_cycle_overruns,
        phase_ctrl.persistant.motion.num_actuation_failures
    );

    eqpt.release();

    info!("End of execution");

    Ok(())
}
