//! # Telecommand module
//!
//! Direct commands, streamed inputs and goal protocol requests sent to the navigation executable,
//! and the responses it sends back.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal
use crate::{
    geom::{PoseStamped, Twist},
    goal::{GoalRequest, GoalResult},
};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the executable by an external client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tc {
    /// Enable the drive motors, waiting for confirmation.
    EnableMotors,

    /// Disable the drive motors, waiting for confirmation.
    DisableMotors,

    /// Enter wander mode.
    Wander,

    /// Stop all motion.
    Stop,

    /// Drive to the docking station and dock.
    Dock,

    /// Leave the docking station.
    Undock,

    /// Set the wheel light pattern.
    ///
    /// `mode` must be in [0, 10], mode 0 restores the automatic lighting behaviour. `value` must be
    /// in [0, 100].
    WheelLight { mode: i32, value: i32 },

    /// Speak the text through the platform's speech synthesiser.
    Speak(String),

    /// Globally re-localise the robot, blocking until complete.
    GlobalLocalization,

    /// Set the localisation estimate to the given pose.
    InitialPose(PoseStamped),

    /// Request the executable shuts down.
    Shutdown,

    /// Velocity command.
    CmdVel(Twist),

    /// Navigate to a destination named in the engine's map.
    GoalName(String),

    /// Navigate to a pose without progress tracking.
    SimpleGoal(PoseStamped),

    /// Submit a goal to the goal protocol, replacing any goal in progress.
    SendGoal(GoalRequest),

    /// Cancel the goal in progress.
    CancelGoal,

    /// Query the status of the current or most recent goal.
    GoalStatus,
}

/// Response to a telecommand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TcResponse {
    /// The command was executed.
    Ok,

    /// The command was valid but could not be executed.
    Failed,

    /// The command could not be parsed.
    Invalid,

    /// The platform does not support this command.
    Unsupported,

    /// Status of the current or most recent goal, `None` if no goal has been received.
    GoalStatus(Option<GoalResult>),
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {
    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }

    /// Serialise the TC into a JSON packet
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<bool> for TcResponse {
    fn from(success: bool) -> Self {
        match success {
            true => TcResponse::Ok,
            false => TcResponse::Failed,
        }
    }
}
