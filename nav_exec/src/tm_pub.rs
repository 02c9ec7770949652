//! # Telemetry publisher
//!
//! Runs as a task inside the engine's sensor cycle, turning the robot state of each cycle into
//! telemetry. Pose and transform are published every cycle, state reports only when they change,
//! and the battery report at a fixed period.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{sync::Arc, time::Instant};

use chrono::{DateTime, Duration, Utc};
use comms_if::{
    geom::{Header, PoseWithCovarianceStamped, COV_DIM},
    goal::GoalFeedback,
    tm::{BatteryStatus, TmMsg},
};
use log::{debug, warn};

use crate::{
    engine::{CycleState, NavEngine},
    frame::{self, FrameNames, COV_UNKNOWN},
    goal_coord::ActionExecutionContext,
    tm_server::TmSender,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Name the publisher is registered with in the engine's cycle.
pub const CYCLE_TASK_NAME: &str = "telemetry_publisher";

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

pub struct TelemetryPublisher {
    names: FrameNames,
    ctx: Arc<ActionExecutionContext>,
    tm: TmSender,

    battery_period: Duration,

    /// Time a single publish may take before a warning is raised
    cycle_budget: std::time::Duration,

    last_motors_state: Option<bool>,
    last_dock_state: Option<String>,
    last_server_mode: Option<String>,
    last_server_status: Option<String>,
    last_battery: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl TelemetryPublisher {
    pub fn new(
        names: FrameNames,
        ctx: Arc<ActionExecutionContext>,
        tm: TmSender,
        battery_period_s: f64,
        cycle_budget_ms: u64,
    ) -> Self {
        Self {
            names,
            ctx,
            tm,
            battery_period: util::time::seconds_to_duration(battery_period_s),
            cycle_budget: std::time::Duration::from_millis(cycle_budget_ms),
            last_motors_state: None,
            last_dock_state: None,
            last_server_mode: None,
            last_server_status: None,
            last_battery: None,
        }
    }

    /// Register the publisher as a task in the engine's sensor cycle.
    pub fn install(mut self, engine: &mut dyn NavEngine) {
        engine.add_cycle_task(
            CYCLE_TASK_NAME,
            Box::new(move |state: &dyn CycleState| self.publish(state)),
        )
    }

    /// Publish the telemetry for one sensor cycle.
    pub fn publish(&mut self, state: &dyn CycleState) {
        let start = Instant::now();

        self.publish_at(state, Utc::now());

        let elapsed = start.elapsed();
        if elapsed > self.cycle_budget {
            warn!(
                "Telemetry publishing took {:.03} ms, longer than the {} ms cycle budget",
                elapsed.as_secs_f64() * 1000.0,
                self.cycle_budget.as_millis()
            );
        }
    }

    pub fn publish_at(&mut self, state: &dyn CycleState, now: DateTime<Utc>) {
        let pose = state.pose();

        // ---- POSE ----

        let loc_stamp = now - Duration::milliseconds(state.ms_since_last_loc());
        let covariance = match state.loc_mean_var() {
            Some(l) => frame::covariance_to_external(&l.var),
            None => [[COV_UNKNOWN; COV_DIM]; COV_DIM],
        };

        self.tm.send(TmMsg::Pose(PoseWithCovarianceStamped {
            header: Header::new(&self.names.operating, loc_stamp),
            pose: frame::engine_to_pose(&pose),
            covariance,
        }));

        self.tm
            .send(TmMsg::Transform(frame::transform_for(&pose, &self.names, now)));

        // ---- STATE REPORTS ----

        let motors = state.motors_enabled();
        if self.last_motors_state != Some(motors) {
            debug!("Motors state changed to {}", motors);
            self.last_motors_state = Some(motors);
            self.tm.send(TmMsg::MotorsState(motors));
        }

        if let Some(dock) = changed(&mut self.last_dock_state, Some(state.dock_state())) {
            self.tm.send(TmMsg::DockState(dock));
        }

        if let Some(mode) = changed(&mut self.last_server_mode, state.server_mode()) {
            self.tm.send(TmMsg::ServerMode(mode));
        }

        if let Some(status) = changed(&mut self.last_server_status, state.server_status()) {
            self.tm.send(TmMsg::ServerStatus(status));
        }

        // ---- GOAL FEEDBACK ----

        if let Some(id) = self.ctx.feedback_goal_id() {
            self.tm.send(TmMsg::GoalFeedback(GoalFeedback {
                id,
                base_position: frame::engine_to_pose_stamped(&pose, &self.names.operating, now),
            }));
        }

        // ---- BATTERY ----

        let battery_due = match self.last_battery {
            Some(t) => now - t >= self.battery_period,
            None => true,
        };

        if battery_due {
            self.last_battery = Some(now);
            self.tm.send(TmMsg::Battery(BatteryStatus {
                charge_percent: state.state_of_charge(),
                charging_state: state.charge_state(),
            }));
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Record a new value, returning it if it differs from the last one recorded.
///
/// A missing value is never published and does not replace the last one.
fn changed(last: &mut Option<String>, current: Option<String>) -> Option<String> {
    match current {
        Some(c) if last.as_ref() != Some(&c) => {
            *last = Some(c.clone());
            Some(c)
        }
        _ => None,
    }
}
