//! # Navigation Executable Library
//!
//! Bridges the goal protocol and direct commands received over the network to a navigation engine
//! which runs its own thread of control and reports goal completion through callbacks.
//!
//! The executable is made of the following parts:
//!
//! - `engine`: the interface to the navigation engine, and a simulated engine.
//! - `robot`: the single locked handle through which the engine is commanded.
//! - `frame`: conversions between engine and external poses.
//! - `cmd_vel`: translation of velocity commands into engine drive commands.
//! - `goal_coord`: the goal lifecycle state machine.
//! - `tm_pub`: telemetry published from the engine's sensor cycle.
//! - `tc_processor`: direct command handling.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod cmd_vel;
pub mod data_store;
pub mod engine;
pub mod frame;
pub mod goal_coord;
pub mod params;
pub mod robot;
pub mod tc_processor;
pub mod tc_server;
pub mod tm_pub;
pub mod tm_server;
