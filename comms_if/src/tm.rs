//! # Telemetry module
//!
//! Messages published by the navigation executable. Each message is sent on its own topic so that
//! subscribers may filter on the topic prefix.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::{
    geom::{Pose, PoseWithCovarianceStamped, TransformStamped},
    goal::{GoalFeedback, GoalResult},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Battery state of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryStatus {
    /// State of charge.
    ///
    /// Units: percent
    pub charge_percent: f64,

    /// Platform-specific charging state code.
    pub charging_state: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A telemetry message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TmMsg {
    /// Localised pose of the robot with covariance
    Pose(PoseWithCovarianceStamped),

    /// Operating frame to robot base transform
    Transform(TransformStamped),

    /// Whether the motors are enabled
    MotorsState(bool),

    DockState(String),

    ServerMode(String),

    ServerStatus(String),

    Battery(BatteryStatus),

    /// The goal most recently adopted by the engine, whatever its source
    CurrentGoal(Pose),

    /// Path planning state of the engine
    PathState(String),

    GoalFeedback(GoalFeedback),

    GoalResult(GoalResult),

    /// Confirmation that a shutdown request was accepted
    ShutdownConfirm,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TmMsg {
    /// Topic the message is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            TmMsg::Pose(_) => "pose",
            TmMsg::Transform(_) => "tf",
            TmMsg::MotorsState(_) => "motors_state",
            TmMsg::DockState(_) => "dock_state",
            TmMsg::ServerMode(_) => "server_mode",
            TmMsg::ServerStatus(_) => "server_status",
            TmMsg::Battery(_) => "battery_status",
            TmMsg::CurrentGoal(_) => "current_goal",
            TmMsg::PathState(_) => "path_state",
            TmMsg::GoalFeedback(_) => "goal/feedback",
            TmMsg::GoalResult(_) => "goal/result",
            TmMsg::ShutdownConfirm => "shutdown_status",
        }
    }
}
