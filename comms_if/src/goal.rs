//! # Goal protocol
//!
//! A goal is submitted with a [`GoalRequest`], reports progress with [`GoalFeedback`] and ends with a
//! single [`GoalResult`] whose status is one of `Succeeded`, `Aborted` or `Preempted`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::geom::PoseStamped;

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// Client-chosen identifier of a goal.
pub type GoalId = u64;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Request to navigate to a target pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalRequest {
    pub id: GoalId,

    /// The target pose. An undefined (NaN) orientation leaves the final heading free.
    pub target_pose: PoseStamped,
}

/// Periodic progress report for the executing goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalFeedback {
    pub id: GoalId,

    /// Current pose of the robot base
    pub base_position: PoseStamped,
}

/// Status of a goal, either terminal or still in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalResult {
    pub id: GoalId,
    pub status: GoalStatus,
    pub text: String,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Lifecycle status of a navigation goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalStatus {
    /// Accepted but not yet submitted to the engine
    Pending,

    /// Submitted to the engine and being executed
    Active,

    /// The engine reached the goal
    Succeeded,

    /// The engine could not reach the goal
    Failed,

    /// Cancelled or replaced before completion
    Preempted,

    /// Ended because the executable is terminating
    Aborted,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GoalStatus {
    /// True if no further transition can occur from this status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GoalStatus::Pending | GoalStatus::Active)
    }

    /// The status reported to protocol clients.
    ///
    /// The protocol has no separate failure result, an engine failure is reported as `Aborted`.
    pub fn protocol_result(&self) -> GoalStatus {
        match self {
            GoalStatus::Failed => GoalStatus::Aborted,
            s => *s,
        }
    }
}
