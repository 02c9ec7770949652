//! # Navigation command line
//!
//! Interactive console which sends telecommands to the navigation executable and prints the
//! responses. Type `help` for the list of commands.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod command;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use color_eyre::{eyre::WrapErr, Report};
use comms_if::{
    net::{open_socket, zmq, NetParams, SocketOptions},
    tc::{Tc, TcResponse},
};
use log::{info, warn};
use rustyline::{error::ReadlineError, Editor};
use util::logger::{console_logger_init, LevelFilter};

use command::Command;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const PROMPT: &str = "nav $ ";

const HISTORY_PATH: &str = "data/history.txt";

/// Time to wait for a response. Global localisation blocks the executable, so this is generous.
///
/// Units: milliseconds
const RESPONSE_TIMEOUT_MS: i32 = 30_000;

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn main() -> Result<(), Report> {
    color_eyre::install()?;

    console_logger_init(LevelFilter::Info).wrap_err("Failed to initialise logging")?;

    let net_params: NetParams =
        util::params::load("net.toml").wrap_err("Could not load net params")?;

    let ctx = zmq::Context::new();
    let socket_options = SocketOptions {
        connect_timeout: 1000,
        linger: 1,
        recv_timeout: RESPONSE_TIMEOUT_MS,
        send_timeout: 1000,
        req_correlate: true,
        req_relaxed: true,
        ..Default::default()
    };
    let socket = open_socket(&ctx, zmq::REQ, &socket_options, &net_params.tc_endpoint)
        .wrap_err("Failed to connect to the executable")?;

    info!("Connected to {}", net_params.tc_endpoint);

    let mut rl = Editor::<(), rustyline::history::DefaultHistory>::new().wrap_err("Failed to start the line editor")?;
    if rl.load_history(HISTORY_PATH).is_err() {
        info!("No history detected");
    }

    let mut next_goal_id = 1;

    loop {
        let line = match rl.readline(PROMPT) {
            Ok(l) => l,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                warn!("Unhandled error: {:?}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }
        rl.add_history_entry(line.as_str());

        let cmd = match Command::parse(&line) {
            Ok(c) => c,
            Err(e) => {
                println!("{}", e.message);
                continue;
            }
        };

        let tc = match cmd.to_tc(&mut next_goal_id) {
            Some(tc) => tc,
            None => break,
        };

        match send(&socket, &tc) {
            Ok(r) => print_response(&r),
            Err(e) => warn!("{:#}", e),
        }

        if tc == Tc::Shutdown {
            break;
        }
    }

    if let Err(e) = rl.save_history(HISTORY_PATH) {
        warn!("Could not save the command history: {}", e);
    }

    println!("Exiting...");

    Ok(())
}

/// Send a telecommand and wait for the response.
fn send(socket: &zmq::Socket, tc: &Tc) -> Result<TcResponse, Report> {
    let tc_str = tc.to_json().wrap_err("Could not serialize the TC")?;

    socket
        .send(&tc_str, 0)
        .wrap_err("Could not send the TC")?;

    let response_str = socket
        .recv_string(0)
        .wrap_err("No response from the executable")?
        .map_err(|_| color_eyre::eyre::eyre!("The response was not valid UTF-8"))?;

    serde_json::from_str(&response_str).wrap_err("Could not parse the response")
}

fn print_response(response: &TcResponse) {
    match response {
        TcResponse::GoalStatus(Some(r)) => {
            println!("Goal {}: {:?} {}", r.id, r.status, r.text)
        }
        TcResponse::GoalStatus(None) => println!("No goal has been received"),
        r => println!("{:?}", r),
    }
}
