//! # Goal Coordinator
//!
//! Owns the lifecycle of goals submitted through the goal protocol.
//!
//! A goal request is resolved into the engine's operating frame and submitted to the engine. The
//! engine reports the outcome through callbacks on its own thread, which update the shared
//! [`ActionExecutionContext`]. The main loop calls [`GoalCoordinator::step`] once per cycle to
//! observe the outcome, handle cancellation and swap in replacement goals.
//!
//! Each accepted request ends with exactly one [`GoalResult`], published as telemetry.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod context;

pub use context::{ActionExecutionContext, ActionState, NavGoal};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::Arc;

use comms_if::{
    goal::{GoalRequest, GoalResult, GoalStatus},
    tc::TcResponse,
};
use log::{info, warn};

use crate::{
    engine::{EngineCallbacks, EnginePose},
    frame::{self, FrameError, FrameLookup},
    robot::RobotHandle,
    tm_server::TmSender,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

pub struct GoalCoordinator {
    ctx: Arc<ActionExecutionContext>,
    robot: RobotHandle,
    frames: Arc<dyn FrameLookup>,
    operating_frame: String,
}

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// What happened during one polling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// No goal is executing
    Idle,

    /// The goal is still being executed
    Running,

    /// The goal ended with the given status
    Finished(GoalStatus),

    /// The goal was cancelled and the engine deactivated
    Cancelled,

    /// The goal was replaced by a new one, which is now running
    Replaced,
}

/// An engine command decided on under the state lock, issued once it has been released.
enum EngineAction {
    None,
    Goto(EnginePose, bool),
    Deactivate,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl GoalCoordinator {
    pub fn new(
        robot: RobotHandle,
        frames: Arc<dyn FrameLookup>,
        operating_frame: &str,
        tm: TmSender,
    ) -> Self {
        Self {
            ctx: Arc::new(ActionExecutionContext::new(tm)),
            robot,
            frames,
            operating_frame: String::from(operating_frame),
        }
    }

    /// Register the goal event callbacks with the engine.
    pub fn register_callbacks(&self) {
        let callbacks = {
            let (c0, c1, c2, c3, c4) = (
                self.ctx.clone(),
                self.ctx.clone(),
                self.ctx.clone(),
                self.ctx.clone(),
                self.ctx.clone(),
            );

            EngineCallbacks {
                new_goal: Some(Box::new(move |p| c0.on_new_goal(p))),
                goal_reached: Some(Box::new(move |p| c1.on_goal_reached(p))),
                goal_failed: Some(Box::new(move |p| c2.on_goal_failed(p))),
                goal_interrupted: Some(Box::new(move |p| c3.on_goal_interrupted(p))),
                path_state_changed: Some(Box::new(move |s| c4.on_path_state_changed(s))),
            }
        };

        self.robot.lock().set_callbacks(callbacks);
    }

    /// The shared execution context.
    pub fn context(&self) -> Arc<ActionExecutionContext> {
        self.ctx.clone()
    }

    /// Accept a goal request.
    ///
    /// If no goal is executing the request is submitted immediately. Otherwise it replaces the
    /// executing goal on the next step. A request still waiting from an earlier call is dropped
    /// with a `Preempted` result.
    pub fn request_goal(&self, req: GoalRequest) -> TcResponse {
        if !self.ctx.is_executing() {
            return self.begin(req);
        }

        let mut state = self.ctx.state();
        info!("Goal {} will replace the executing goal", req.id);

        if let Some(old) = state.pending.replace(req) {
            self.ctx
                .reject(&old, GoalStatus::Preempted, "Replaced by a newer request");
        }
        state.preempt_requested = true;

        TcResponse::Ok
    }

    /// Cancel the executing goal and any pending replacement.
    pub fn cancel_goal(&self) -> TcResponse {
        if !self.ctx.is_executing() {
            warn!("Cannot cancel, no goal is executing");
            return TcResponse::Failed;
        }

        let mut state = self.ctx.state();
        if let Some(old) = state.pending.take() {
            self.ctx.reject(&old, GoalStatus::Preempted, "Cancelled");
        }
        state.preempt_requested = true;

        TcResponse::Ok
    }

    /// Run one iteration of goal execution polling.
    pub fn step(&self) -> StepOutcome {
        if !self.ctx.is_executing() {
            return StepOutcome::Idle;
        }

        let (outcome, action) = {
            let mut state = self.ctx.state();

            if self.ctx.is_done() {
                self.ctx.set_executing(false);
                let status = state
                    .current
                    .as_ref()
                    .map(|g| g.status)
                    .unwrap_or(GoalStatus::Aborted);
                info!("Goal done, ending execution");

                // A replacement requested as the goal ended starts from idle
                let next = state.pending.take();
                state.preempt_requested = false;
                drop(state);

                if let Some(req) = next {
                    self.begin(req);
                }

                return StepOutcome::Finished(status);
            }

            if !state.preempt_requested {
                return StepOutcome::Running;
            }
            state.preempt_requested = false;

            match state.pending.take() {
                Some(req) => match self.resolve(&req) {
                    Ok(target) => {
                        self.ctx
                            .finish(&mut state, GoalStatus::Preempted, "Replaced by a new goal");
                        state.superseded = state.current.as_ref().map(|g| g.target);

                        let goal = NavGoal::new(req.id, target);
                        let action = EngineAction::Goto(goal.target, goal.use_heading);
                        info!("Goal {} interrupted the current goal", goal.id);
                        state.current = Some(goal);
                        self.ctx.set_done(false);

                        (StepOutcome::Replaced, action)
                    }
                    Err(e) => {
                        warn!("Replacement goal {} rejected: {}", req.id, e);
                        self.ctx.reject(&req, GoalStatus::Aborted, &e.to_string());
                        (StepOutcome::Running, EngineAction::None)
                    }
                },
                None => {
                    self.ctx
                        .finish(&mut state, GoalStatus::Preempted, "Goal cancelled");
                    self.ctx.set_executing(false);
                    info!("Goal cancelled, ending execution");
                    (StepOutcome::Cancelled, EngineAction::Deactivate)
                }
            }
        };

        match action {
            EngineAction::None => (),
            EngineAction::Goto(target, use_heading) => {
                self.robot.lock().goto_pose(target, use_heading)
            }
            EngineAction::Deactivate => self.robot.lock().deactivate_goto(),
        }

        outcome
    }

    /// End any outstanding goal because the executable is stopping.
    ///
    /// The executing goal, and any pending replacement, each receive one `Aborted` result.
    pub fn shutdown(&self) {
        let mut state = self.ctx.state();

        if let Some(req) = state.pending.take() {
            self.ctx
                .reject(&req, GoalStatus::Aborted, "The executable is shutting down");
        }

        if self.ctx.take_executing() {
            self.ctx.finish(
                &mut state,
                GoalStatus::Aborted,
                "The executable is shutting down",
            );
        }
    }

    /// Status of the current or most recent goal.
    pub fn status(&self) -> Option<GoalResult> {
        self.ctx.state().current.as_ref().map(|g| g.to_result())
    }

    /// Start executing a goal from idle.
    fn begin(&self, req: GoalRequest) -> TcResponse {
        let target = match self.resolve(&req) {
            Ok(t) => t,
            Err(e) => {
                warn!("Goal {} rejected: {}", req.id, e);
                self.ctx.reject(&req, GoalStatus::Aborted, &e.to_string());
                return TcResponse::Failed;
            }
        };

        let goal = NavGoal::new(req.id, target);
        let use_heading = goal.use_heading;
        info!(
            "Goal {}: planning to {:.0} mm, {:.0} mm, {:.0} deg",
            goal.id, target.x_mm, target.y_mm, target.th_deg
        );

        {
            let mut state = self.ctx.state();
            state.current = Some(goal);
            state.pending = None;
            state.preempt_requested = false;
            state.superseded = None;
            self.ctx.set_done(false);
            self.ctx.set_executing(true);
        }

        self.robot.lock().goto_pose(target, use_heading);

        TcResponse::Ok
    }

    /// Convert the request's target into an engine pose in the operating frame.
    fn resolve(&self, req: &GoalRequest) -> Result<EnginePose, FrameError> {
        let resolved = frame::resolve_into(&*self.frames, &self.operating_frame, &req.target_pose)?;
        Ok(frame::pose_to_engine(&resolved.pose))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        engine::{
            sim::{SimEngine, SimParams},
            test_engine::{Capabilities, EngineCall, Remote, TestEngine},
        },
        frame::{yaw_to_quaternion, StaticFrames},
        tm_server::{self, TmReceiver},
    };
    use chrono::Utc;
    use comms_if::{
        geom::{Header, Point, Pose, PoseStamped},
        goal::GoalId,
        tm::TmMsg,
    };
    use std::{
        sync::Barrier,
        thread,
        time::{Duration, Instant},
    };

    fn setup() -> (GoalCoordinator, Remote, TmReceiver) {
        let (engine, remote) = TestEngine::new(Capabilities::default());
        let robot = RobotHandle::new(Box::new(engine));
        let (tx, rx) = tm_server::channel();
        let coord = GoalCoordinator::new(robot, Arc::new(StaticFrames::default()), "map", tx);
        coord.register_callbacks();
        (coord, remote, rx)
    }

    fn request(id: GoalId, frame_id: &str, x: f64, y: f64) -> GoalRequest {
        GoalRequest {
            id,
            target_pose: PoseStamped {
                header: Header::new(frame_id, Utc::now()),
                pose: Pose {
                    position: Point { x, y, z: 0.0 },
                    orientation: yaw_to_quaternion(0.0),
                },
            },
        }
    }

    fn engine_pose(x: f64, y: f64) -> EnginePose {
        EnginePose::new(x * 1000.0, y * 1000.0, 0.0)
    }

    fn results(rx: &TmReceiver) -> Vec<GoalResult> {
        rx.drain()
            .into_iter()
            .filter_map(|m| match m {
                TmMsg::GoalResult(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// A coordinator over a running simulated engine with its motors enabled.
    fn sim_setup() -> (GoalCoordinator, TmReceiver) {
        let engine = SimEngine::connect(SimParams {
            cycle_period_s: 0.01,
            max_speed_mms: 2000.0,
            max_rate_degs: 720.0,
            motor_switch_delay_s: 0.01,
            ..Default::default()
        })
        .unwrap();
        let robot = RobotHandle::new(Box::new(engine));

        robot.lock().enable_motors();
        assert!(robot.wait_for(
            Duration::from_secs(2),
            Duration::from_millis(5),
            |e| e.motors_enabled()
        ));

        let (tx, rx) = tm_server::channel();
        let coord = GoalCoordinator::new(robot, Arc::new(StaticFrames::default()), "map", tx);
        coord.register_callbacks();
        (coord, rx)
    }

    /// Step until the goal stops running, giving up after five seconds.
    fn step_until_settled(coord: &GoalCoordinator) -> StepOutcome {
        let start = Instant::now();
        loop {
            match coord.step() {
                StepOutcome::Running if start.elapsed() < Duration::from_secs(5) => {
                    thread::sleep(Duration::from_millis(5))
                }
                o => return o,
            }
        }
    }

    fn ids_and_statuses(r: &[GoalResult]) -> Vec<(GoalId, GoalStatus)> {
        r.iter().map(|r| (r.id, r.status)).collect()
    }

    #[test]
    fn test_goal_succeeds() {
        let (coord, remote, rx) = setup();

        assert_eq!(coord.request_goal(request(1, "map", 1.0, 2.0)), TcResponse::Ok);
        assert!(coord.context().is_executing());
        assert_eq!(
            remote.calls(),
            vec![EngineCall::GotoPose(engine_pose(1.0, 2.0), true)]
        );
        assert_eq!(coord.step(), StepOutcome::Running);

        remote.fire_reached(engine_pose(1.0, 2.0));
        assert!(coord.context().is_done());
        assert_eq!(coord.step(), StepOutcome::Finished(GoalStatus::Succeeded));
        assert!(!coord.context().is_executing());

        let r = results(&rx);
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].id, 1);
        assert_eq!(r[0].status, GoalStatus::Succeeded);
    }

    #[test]
    fn test_failure_reported_as_aborted() {
        let (coord, remote, rx) = setup();

        coord.request_goal(request(1, "map", 1.0, 0.0));
        remote.fire_failed(engine_pose(1.0, 0.0));

        assert_eq!(coord.step(), StepOutcome::Finished(GoalStatus::Failed));
        let r = results(&rx);
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].status, GoalStatus::Aborted);
        assert_eq!(coord.status().unwrap().status, GoalStatus::Aborted);
    }

    #[test]
    fn test_free_heading() {
        let (coord, remote, _rx) = setup();

        let mut req = request(1, "map", 1.0, 0.0);
        req.target_pose.pose.orientation = comms_if::geom::Quaternion::undefined();
        coord.request_goal(req);

        match remote.calls().as_slice() {
            [EngineCall::GotoPose(p, use_heading)] => {
                assert!(p.th_deg.is_nan());
                assert!(!use_heading);
            }
            c => panic!("Unexpected calls {:?}", c),
        }
    }

    #[test]
    fn test_replacement_applies_one_terminal() {
        let (coord, remote, rx) = setup();
        let a = engine_pose(1.0, 0.0);
        let b = engine_pose(0.0, 1.0);

        coord.request_goal(request(1, "map", 1.0, 0.0));
        assert_eq!(coord.request_goal(request(2, "map", 0.0, 1.0)), TcResponse::Ok);
        assert!(coord.context().is_executing());

        assert_eq!(coord.step(), StepOutcome::Replaced);
        assert!(coord.context().is_executing());
        assert!(!coord.context().is_done());

        // The old goal's events arrive after the replacement was submitted
        remote.fire_new_goal(b);
        remote.fire_interrupted(a);
        assert!(!coord.context().is_done());
        assert!(coord.context().is_executing());
        assert_eq!(coord.step(), StepOutcome::Running);

        remote.fire_reached(b);
        assert!(coord.context().is_done());
        assert_eq!(coord.step(), StepOutcome::Finished(GoalStatus::Succeeded));

        // A late event for either goal changes nothing
        remote.fire_reached(a);
        assert_eq!(coord.status().unwrap().id, 2);

        let r = results(&rx);
        assert_eq!(r.len(), 2);
        assert_eq!((r[0].id, r[0].status), (1, GoalStatus::Preempted));
        assert_eq!((r[1].id, r[1].status), (2, GoalStatus::Succeeded));

        assert_eq!(remote.count(|c| matches!(c, EngineCall::GotoPose(..))), 2);
        assert_eq!(remote.count(|c| *c == EngineCall::DeactivateGoto), 0);
    }

    #[test]
    fn test_replacement_events_in_either_order() {
        let (coord, remote, rx) = setup();
        let a = engine_pose(1.0, 0.0);
        let b = engine_pose(0.0, 1.0);

        coord.request_goal(request(1, "map", 1.0, 0.0));
        coord.request_goal(request(2, "map", 0.0, 1.0));
        coord.step();

        // Old goal reached just before the engine saw the replacement
        remote.fire_reached(a);
        remote.fire_new_goal(b);
        assert!(!coord.context().is_done());

        remote.fire_failed(b);
        assert_eq!(coord.step(), StepOutcome::Finished(GoalStatus::Failed));

        let r = results(&rx);
        assert_eq!(r.len(), 2);
        assert_eq!((r[1].id, r[1].status), (2, GoalStatus::Aborted));
    }

    #[test]
    fn test_cancel_deactivates_once() {
        let (coord, remote, rx) = setup();
        let a = engine_pose(1.0, 0.0);

        coord.request_goal(request(1, "map", 1.0, 0.0));
        assert_eq!(coord.cancel_goal(), TcResponse::Ok);
        assert_eq!(coord.step(), StepOutcome::Cancelled);
        assert!(!coord.context().is_executing());

        // The engine reports the interruption after deactivation
        remote.fire_interrupted(a);
        assert_eq!(coord.step(), StepOutcome::Idle);

        assert_eq!(remote.count(|c| *c == EngineCall::DeactivateGoto), 1);

        let r = results(&rx);
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].status, GoalStatus::Preempted);
        assert_eq!(coord.status().unwrap().status, GoalStatus::Preempted);
        assert_eq!(coord.context().engine_status(), Some(GoalStatus::Preempted));
    }

    #[test]
    fn test_cancel_when_idle() {
        let (coord, remote, _rx) = setup();
        assert_eq!(coord.cancel_goal(), TcResponse::Failed);
        assert!(remote.calls().is_empty());
    }

    #[test]
    fn test_shutdown_aborts_once() {
        let (coord, _remote, rx) = setup();

        coord.request_goal(request(1, "map", 1.0, 0.0));
        coord.step();
        coord.shutdown();
        coord.shutdown();

        assert!(!coord.context().is_executing());
        let r = results(&rx);
        assert_eq!(r.len(), 1);
        assert_eq!((r[0].id, r[0].status), (1, GoalStatus::Aborted));
    }

    #[test]
    fn test_shutdown_after_goal_done() {
        let (coord, remote, rx) = setup();

        coord.request_goal(request(1, "map", 1.0, 0.0));
        remote.fire_reached(engine_pose(1.0, 0.0));
        coord.shutdown();

        let r = results(&rx);
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].status, GoalStatus::Succeeded);
    }

    #[test]
    fn test_unresolvable_frame() {
        let (coord, remote, rx) = setup();

        assert_eq!(
            coord.request_goal(request(1, "camera", 1.0, 0.0)),
            TcResponse::Failed
        );
        assert!(!coord.context().is_executing());
        assert!(remote.calls().is_empty());

        let r = results(&rx);
        assert_eq!((r[0].id, r[0].status), (1, GoalStatus::Aborted));
    }

    #[test]
    fn test_unresolvable_replacement_keeps_current() {
        let (coord, remote, rx) = setup();

        coord.request_goal(request(1, "map", 1.0, 0.0));
        coord.request_goal(request(2, "camera", 0.0, 1.0));
        assert_eq!(coord.step(), StepOutcome::Running);
        assert!(coord.context().is_executing());
        assert_eq!(coord.status().unwrap().id, 1);

        let r = results(&rx);
        assert_eq!((r[0].id, r[0].status), (2, GoalStatus::Aborted));

        remote.fire_reached(engine_pose(1.0, 0.0));
        assert_eq!(coord.step(), StepOutcome::Finished(GoalStatus::Succeeded));
    }

    #[test]
    fn test_side_channel_events_ignored() {
        let (coord, remote, rx) = setup();

        // Reached while idle only updates the engine status
        remote.fire_reached(engine_pose(5.0, 5.0));
        assert_eq!(coord.context().engine_status(), Some(GoalStatus::Succeeded));
        assert!(results(&rx).is_empty());

        // Events for a different goal while executing do not end the current one
        coord.request_goal(request(1, "map", 1.0, 0.0));
        remote.fire_reached(engine_pose(5.0, 5.0));
        assert!(!coord.context().is_done());
        assert_eq!(coord.step(), StepOutcome::Running);
    }

    #[test]
    fn test_pending_request_replaced() {
        let (coord, _remote, rx) = setup();

        coord.request_goal(request(1, "map", 1.0, 0.0));
        coord.request_goal(request(2, "map", 2.0, 0.0));
        coord.request_goal(request(3, "map", 3.0, 0.0));
        assert_eq!(coord.step(), StepOutcome::Replaced);

        let r = results(&rx);
        assert_eq!(r.len(), 2);
        assert_eq!((r[0].id, r[0].status), (2, GoalStatus::Preempted));
        assert_eq!((r[1].id, r[1].status), (1, GoalStatus::Preempted));
        assert_eq!(coord.status().unwrap().id, 3);
    }

    #[test]
    fn test_new_goal_published() {
        let (_coord, remote, rx) = setup();

        remote.fire_new_goal(engine_pose(2.0, 0.0));
        remote.fire_path_state("PLANNING_PATH");

        let msgs = rx.drain();
        assert!(matches!(msgs[0], TmMsg::CurrentGoal(ref p) if (p.position.x - 2.0).abs() < 1e-9));
        assert_eq!(msgs[1], TmMsg::PathState(String::from("PLANNING_PATH")));
    }

    #[test]
    fn test_replacement_with_engine_thread() {
        let (coord, rx) = sim_setup();

        coord.request_goal(request(1, "map", 3.0, 0.0));
        for _ in 0..5 {
            assert_eq!(coord.step(), StepOutcome::Running);
            thread::sleep(Duration::from_millis(10));
        }

        coord.request_goal(request(2, "map", 0.0, 0.5));
        assert!(coord.context().is_executing());
        assert_eq!(coord.step(), StepOutcome::Replaced);
        assert!(coord.context().is_executing());

        // The interruption of goal 1 arrives on the engine thread and must not end goal 2
        assert_eq!(
            step_until_settled(&coord),
            StepOutcome::Finished(GoalStatus::Succeeded)
        );
        assert!(!coord.context().is_executing());

        thread::sleep(Duration::from_millis(50));
        assert_eq!(
            ids_and_statuses(&results(&rx)),
            vec![(1, GoalStatus::Preempted), (2, GoalStatus::Succeeded)]
        );
        assert_eq!(coord.context().engine_status(), Some(GoalStatus::Succeeded));
    }

    #[test]
    fn test_goal_completes_with_engine_thread() {
        let (coord, rx) = sim_setup();

        coord.request_goal(request(1, "map", 0.2, 0.2));
        assert_eq!(
            step_until_settled(&coord),
            StepOutcome::Finished(GoalStatus::Succeeded)
        );

        // A second goal from idle after the first has ended
        coord.request_goal(request(2, "map", 0.0, 0.0));
        assert_eq!(
            step_until_settled(&coord),
            StepOutcome::Finished(GoalStatus::Succeeded)
        );

        assert_eq!(
            ids_and_statuses(&results(&rx)),
            vec![(1, GoalStatus::Succeeded), (2, GoalStatus::Succeeded)]
        );
    }

    #[test]
    fn test_reached_races_replacement() {
        let a = engine_pose(1.0, 0.0);
        let b = engine_pose(0.0, 1.0);

        for _ in 0..200 {
            let (coord, remote, rx) = setup();
            coord.request_goal(request(1, "map", 1.0, 0.0));

            let barrier = Arc::new(Barrier::new(2));
            let engine_thread = {
                let (remote, barrier) = (remote.clone(), barrier.clone());
                thread::spawn(move || {
                    barrier.wait();
                    remote.fire_reached(a);
                })
            };

            barrier.wait();
            coord.request_goal(request(2, "map", 0.0, 1.0));
            let outcome = coord.step();
            engine_thread.join().unwrap();

            // Either goal 1 finished first and goal 2 started from idle, or goal 2 replaced it
            assert!(
                outcome == StepOutcome::Replaced
                    || outcome == StepOutcome::Finished(GoalStatus::Succeeded),
                "{:?}",
                outcome
            );
            assert!(coord.context().is_executing());
            assert_eq!(coord.step(), StepOutcome::Running);

            remote.fire_reached(b);
            assert_eq!(coord.step(), StepOutcome::Finished(GoalStatus::Succeeded));

            let r = ids_and_statuses(&results(&rx));
            assert_eq!(r.len(), 2, "{:?}", r);
            assert!(
                r[0] == (1, GoalStatus::Succeeded) || r[0] == (1, GoalStatus::Preempted),
                "{:?}",
                r
            );
            assert_eq!(r[1], (2, GoalStatus::Succeeded));
        }
    }

    #[test]
    fn test_reached_races_shutdown() {
        let a = engine_pose(1.0, 0.0);

        for _ in 0..200 {
            let (coord, remote, rx) = setup();
            coord.request_goal(request(1, "map", 1.0, 0.0));

            let barrier = Arc::new(Barrier::new(2));
            let engine_thread = {
                let (remote, barrier) = (remote.clone(), barrier.clone());
                thread::spawn(move || {
                    barrier.wait();
                    remote.fire_reached(a);
                })
            };

            barrier.wait();
            coord.shutdown();
            engine_thread.join().unwrap();

            assert!(!coord.context().is_executing());

            let r = ids_and_statuses(&results(&rx));
            assert_eq!(r.len(), 1, "{:?}", r);
            assert!(
                r[0] == (1, GoalStatus::Succeeded) || r[0] == (1, GoalStatus::Aborted),
                "{:?}",
                r
            );
        }
    }
}
