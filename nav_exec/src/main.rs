//! Navigation executable entry point.
//!
//! # Architecture
//!
//! The navigation engine runs its own thread, and the executable interacts with it in three ways:
//!
//!     - Commands, issued from the main loop through the locked robot handle.
//!     - Callbacks, made by the engine on its own thread when a goal ends or the path state
//!       changes.
//!     - The sensor cycle, in which the engine runs the telemetry publisher at a fixed period.
//!
//! The main loop runs at the goal polling period:
//!
//!     - Telecommand processing and handling
//!     - Goal execution polling
//!     - Telemetry publishing
//!
//! # Usage
//!
//!     nav_exec [map_file]

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, error, info, warn};
use std::{
    env, process,
    sync::{atomic::Ordering, Arc},
    thread,
    time::{Duration, Instant},
};

// Internal
use comms_if::{net::NetParams, tc::Tc};
use nav_lib::{
    data_store::DataStore,
    engine::sim::SimEngine,
    frame::{FrameLookup, StaticFrames},
    goal_coord::StepOutcome,
    params::NavExecParams,
    robot::RobotHandle,
    tc_processor,
    tc_server::{TcServer, TcServerError},
    tm_pub::TelemetryPublisher,
    tm_server::{self, TmServer},
};
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Exit status for an invalid command line.
const EXIT_BAD_ARGS: i32 = 1;

/// Exit status when the engine could not be set up.
const EXIT_ENGINE_SETUP: i32 = 2;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("nav_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Navigation Bridge Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // Collect all arguments
    let args: Vec<String> = env::args().collect();
    debug!("CLI arguments: {:?}", args);

    if args.len() > 2 {
        error!(
            "Expected at most one argument (the map file), found {}",
            args.len() - 1
        );
        process::exit(EXIT_BAD_ARGS);
    }

    // ---- LOAD PARAMETERS ----

    let net_params: NetParams =
        util::params::load("net.toml").wrap_err("Could not load net params")?;

    let params: NavExecParams =
        util::params::load("nav_exec.toml").wrap_err("Could not load nav_exec params")?;
    params.validate().wrap_err("Invalid nav_exec params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE ENGINE ----

    info!("Connecting to the navigation engine...");

    let engine = match SimEngine::connect(params.sim.clone()) {
        Ok(e) => e,
        Err(e) => {
            error!("Could not connect to the navigation engine: {}", e);
            process::exit(EXIT_ENGINE_SETUP);
        }
    };
    let robot = RobotHandle::new(Box::new(engine));

    info!("Navigation engine connected");

    if let Some(map_file) = args.get(1) {
        match robot.lock().set_map(map_file) {
            true => info!("Map \"{}\" loaded", map_file),
            false => warn!(
                "Could not load map \"{}\", the default map will be used",
                map_file
            ),
        }
    }

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let (tm_tx, tm_rx) = tm_server::channel();

    let frames: Arc<dyn FrameLookup> =
        Arc::new(StaticFrames::new(&params.tf_prefix, &params.static_frames));

    let mut ds = DataStore::new(params, robot, frames, tm_tx.clone());

    ds.coord.register_callbacks();
    info!("GoalCoordinator initialised");

    TelemetryPublisher::new(
        ds.names.clone(),
        ds.coord.context(),
        tm_tx,
        ds.params.battery_period_s,
        ds.params.cycle_budget_ms,
    )
    .install(&mut *ds.robot.lock());
    info!("TelemetryPublisher initialised");

    {
        let shutdown = ds.shutdown.clone();
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
            .wrap_err("Failed to set the interrupt handler")?;
    }

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let tc_server = {
        let s = TcServer::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise TcServer")?;
        info!("TcServer initialised");
        s
    };

    let tm_server = {
        let s = TmServer::new(&zmq_ctx, &net_params, tm_rx)
            .wrap_err("Failed to initialise TmServer")?;
        info!("TmServer initialised");
        s
    };

    info!("Network initialisation complete");

    // ---- MAIN LOOP ----

    info!("Beginning main loop\n");

    let cycle_period = Duration::from_secs_f64(ds.params.goal_poll_period_s);

    // Error which stopped the main loop, if any
    let mut fatal: Option<Report> = None;

    while ds.is_alive() {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- TELECOMMAND PROCESSING ----

        // Get commands until none remain
        loop {
            match tc_server.receive_tc() {
                Ok(Some(tc)) => {
                    if !matches!(tc, Tc::CmdVel(_)) {
                        debug!("Received {:?}", tc);
                    }

                    let response = tc_processor::exec(&mut ds, &tc);

                    if let Err(e) = tc_server.send_response(response) {
                        warn!("Could not respond to TC: {}", e);
                    }

                    if ds.shutdown_requested() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(TcServerError::TcParseError(e)) => {
                    warn!("Could not parse received TC: {}", e);
                    break;
                }
                Err(TcServerError::NonUtf8Request) => {
                    warn!("Received a TC which was not valid UTF-8");
                    break;
                }
                Err(e) => {
                    fatal = Some(
                        Report::new(e)
                            .wrap_err("An error occured while receiving TCs from the client"),
                    );
                    break;
                }
            }
        }

        if fatal.is_some() {
            break;
        }

        // ---- GOAL EXECUTION ----

        match ds.coord.step() {
            StepOutcome::Finished(status) => info!("Goal execution finished: {:?}", status),
            StepOutcome::Cancelled => info!("Goal execution cancelled"),
            StepOutcome::Replaced => info!("Goal replaced, executing the new goal"),
            StepOutcome::Idle | StepOutcome::Running => (),
        }

        // ---- TELEMETRY ----

        if let Err(e) = tm_server.flush() {
            warn!("TmServer error: {}", e);
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
            ),
        }

        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    let result = ds.end_execution(fatal);

    if let Err(e) = tm_server.flush() {
        warn!("Could not publish the final telemetry: {}", e);
    }

    info!("End of execution after {} cycles", ds.num_cycles);

    result
}
