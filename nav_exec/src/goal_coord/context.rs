//! # Action execution context
//!
//! The record of the goal being executed, shared between the main loop and the engine's
//! callbacks. The `executing` and `done` flags are atomics so that they can be polled cheaply, the
//! remainder of the record sits behind a mutex which is only ever held for short, non-blocking
//! sections.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard, PoisonError,
};

use comms_if::{
    goal::{GoalId, GoalRequest, GoalResult, GoalStatus},
    tm::TmMsg,
};
use log::{debug, info};

use crate::{engine::EnginePose, frame, tm_server::TmSender};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// A navigation goal accepted by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct NavGoal {
    pub id: GoalId,

    /// Target in the engine's operating frame
    pub target: EnginePose,

    /// False if the final heading is unconstrained
    pub use_heading: bool,

    pub status: GoalStatus,

    /// Description of the last status change
    pub text: String,
}

/// Goal state behind the context's mutex.
#[derive(Debug, Default)]
pub struct ActionState {
    /// The goal submitted to the engine, kept after it ends for status queries
    pub current: Option<NavGoal>,

    /// A goal waiting to replace the current one
    pub pending: Option<GoalRequest>,

    /// Set when the current goal should be cancelled or replaced
    pub preempt_requested: bool,

    /// Target of a goal that was replaced, whose last engine event has not arrived yet
    pub superseded: Option<EnginePose>,

    /// The last goal event reported by the engine, for any goal
    pub engine_status: Option<GoalStatus>,
}

/// The single in-flight goal execution record.
pub struct ActionExecutionContext {
    executing: AtomicBool,
    done: AtomicBool,
    state: Mutex<ActionState>,
    tm: TmSender,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl NavGoal {
    pub fn new(id: GoalId, target: EnginePose) -> Self {
        Self {
            id,
            target,
            use_heading: !target.th_deg.is_nan(),
            status: GoalStatus::Active,
            text: String::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == GoalStatus::Active
    }

    pub fn to_result(&self) -> GoalResult {
        GoalResult {
            id: self.id,
            status: self.status.protocol_result(),
            text: self.text.clone(),
        }
    }
}

impl ActionExecutionContext {
    pub fn new(tm: TmSender) -> Self {
        Self {
            executing: AtomicBool::new(false),
            done: AtomicBool::new(false),
            state: Mutex::new(ActionState::default()),
            tm,
        }
    }

    /// True while a protocol goal execution is in progress.
    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }

    /// True once the engine has ended the current goal.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// The goal feedback should be published for, if one is executing.
    pub fn feedback_goal_id(&self) -> Option<GoalId> {
        if !self.is_executing() {
            return None;
        }

        self.state().current.as_ref().map(|g| g.id)
    }

    /// The last goal event the engine reported, for any goal.
    pub fn engine_status(&self) -> Option<GoalStatus> {
        self.state().engine_status
    }

    pub(crate) fn state(&self) -> MutexGuard<ActionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_executing(&self, executing: bool) {
        self.executing.store(executing, Ordering::SeqCst)
    }

    /// Clear the executing flag, returning its previous value.
    pub(crate) fn take_executing(&self) -> bool {
        self.executing.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn set_done(&self, done: bool) {
        self.done.store(done, Ordering::SeqCst)
    }

    /// End the current goal with the given terminal status and publish its result.
    ///
    /// Does nothing if the current goal has already ended.
    pub(crate) fn finish(&self, state: &mut ActionState, status: GoalStatus, text: &str) -> bool {
        match state.current {
            Some(ref mut g) if g.is_active() => {
                g.status = status;
                g.text = String::from(text);
                info!("Goal {} ended: {:?} ({})", g.id, status, text);
                self.tm.send(TmMsg::GoalResult(g.to_result()));
                true
            }
            _ => false,
        }
    }

    /// Publish a terminal result for a request which never became the current goal.
    pub(crate) fn reject(&self, req: &GoalRequest, status: GoalStatus, text: &str) {
        info!("Goal {} rejected: {:?} ({})", req.id, status, text);
        self.tm.send(TmMsg::GoalResult(GoalResult {
            id: req.id,
            status,
            text: String::from(text),
        }))
    }

    // ---- ENGINE CALLBACKS ----

    /// The engine adopted a new goal.
    pub fn on_new_goal(&self, pose: EnginePose) {
        debug!(
            "Engine adopted goal {:.0} mm, {:.0} mm, {:.0} deg",
            pose.x_mm, pose.y_mm, pose.th_deg
        );
        self.tm.send(TmMsg::CurrentGoal(frame::engine_to_pose(&pose)));
    }

    pub fn on_goal_reached(&self, pose: EnginePose) {
        self.on_goal_ended(pose, GoalStatus::Succeeded, "Goal reached")
    }

    pub fn on_goal_failed(&self, pose: EnginePose) {
        self.on_goal_ended(pose, GoalStatus::Failed, "Goal failed")
    }

    /// The engine stopped pursuing a goal before completing it.
    pub fn on_goal_interrupted(&self, pose: EnginePose) {
        let mut state = self.state();
        state.engine_status = Some(GoalStatus::Preempted);

        if !self.is_executing() || self.is_superseded(&mut state, &pose) {
            return;
        }

        if self.is_current(&state, &pose) && self.finish(&mut state, GoalStatus::Preempted, "Goal interrupted") {
            self.set_done(true);
        }
    }

    pub fn on_path_state_changed(&self, path_state: &str) {
        info!("Path planning state changed to {}", path_state);
        self.tm.send(TmMsg::PathState(String::from(path_state)));
    }

    /// While a goal executes, only an event matching its target sets `done`. Events for other
    /// goals leave the executing goal running.
    fn on_goal_ended(&self, pose: EnginePose, status: GoalStatus, text: &str) {
        let mut state = self.state();
        state.engine_status = Some(status);

        if !self.is_executing() {
            self.set_done(true);
            return;
        }

        if self.is_superseded(&mut state, &pose) {
            return;
        }

        if self.is_current(&state, &pose) && self.finish(&mut state, status, text) {
            self.set_done(true);
        }
    }

    /// If the event is for a replaced goal, consume the record of it and return true.
    fn is_superseded(&self, state: &mut ActionState, pose: &EnginePose) -> bool {
        match state.superseded {
            Some(s) if s.same_goal(pose) => {
                debug!("Ignoring engine event for a replaced goal");
                state.superseded = None;
                true
            }
            _ => false,
        }
    }

    fn is_current(&self, state: &ActionState, pose: &EnginePose) -> bool {
        match state.current {
            Some(ref g) if g.target.same_goal(pose) => true,
            Some(_) => {
                debug!("Ignoring engine event for a goal not submitted by the coordinator");
                false
            }
            None => false,
        }
    }
}
