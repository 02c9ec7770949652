//! # Navigation engine interface
//!
//! The navigation engine plans paths, localises the robot and drives it. It runs its own thread of
//! control, on which it calls the [`EngineCallbacks`] and any registered [`CycleTask`]s.
//!
//! Engine quantities use the engine's native units: millimeters and degrees.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod sim;

#[cfg(test)]
pub mod test_engine;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Matrix3;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

/// Callback fired with the pose of the goal it concerns.
pub type GoalCallback = Box<dyn Fn(EnginePose) + Send + Sync>;

/// Callback fired with the name of the new path planning state.
pub type PathStateCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Task run by the engine once per sensor cycle.
pub type CycleTask = Box<dyn FnMut(&dyn CycleState) + Send>;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// A planar pose in engine units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct EnginePose {
    /// Units: millimeters
    pub x_mm: f64,

    /// Units: millimeters
    pub y_mm: f64,

    /// Heading, NaN if undefined.
    ///
    /// Units: degrees
    pub th_deg: f64,
}

/// Mean and variance of the localisation estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct LocVariance {
    pub mean: EnginePose,

    /// Variance over (x, y, heading), in millimeter and degree units.
    pub var: Matrix3<f64>,
}

/// Ratio drive demand. All ratios are in per-mille of the platform's maximum.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RatioDriveCmd {
    pub trans_ratio: f64,
    pub rot_ratio: f64,
    pub throttle_ratio: f64,
    pub lateral_ratio: f64,
}

/// Raw wheel light command packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelLightPacket {
    pub pattern: u8,
    pub value: i8,
    pub flags: u8,
    pub flags2: u8,
}

/// The set of callbacks the engine fires on goal events.
///
/// All callbacks are invoked on the engine's own thread and must not block.
#[derive(Default)]
pub struct EngineCallbacks {
    /// The engine adopted a new goal, from any source.
    pub new_goal: Option<GoalCallback>,

    pub goal_reached: Option<GoalCallback>,

    pub goal_failed: Option<GoalCallback>,

    /// The goal was interrupted before completion, usually by a newer goal.
    pub goal_interrupted: Option<GoalCallback>,

    pub path_state_changed: Option<PathStateCallback>,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Robot state which may be read from within a sensor cycle.
///
/// The engine guarantees these reads are consistent for the duration of the cycle, so they do not
/// go through the robot lock.
pub trait CycleState {
    fn pose(&self) -> EnginePose;

    /// The localisation mean and variance, if a valid estimate exists this cycle.
    fn loc_mean_var(&self) -> Option<LocVariance>;

    /// Milliseconds elapsed since the last localisation update.
    fn ms_since_last_loc(&self) -> i64;

    fn motors_enabled(&self) -> bool;

    fn dock_state(&self) -> String;

    fn server_mode(&self) -> Option<String>;

    fn server_status(&self) -> Option<String>;

    /// Units: percent
    fn state_of_charge(&self) -> f64;

    fn charge_state(&self) -> i32;
}

/// Optional wheel light hardware.
pub trait WheelLights {
    /// Enable or disable the platform's automatic lighting behaviour.
    fn set_default_mode(&mut self, enabled: bool);

    /// Write a raw command to the lights.
    fn send(&mut self, packet: &WheelLightPacket);
}

/// Optional speech synthesiser.
pub trait Speech {
    /// Speak the text aloud, returning once it has been queued.
    fn speak(&mut self, text: &str);
}

/// Command and state interface of the navigation engine.
///
/// Implementors are only ever accessed through a [`crate::robot::RobotHandle`].
pub trait NavEngine: Send {
    // ---- STATE ----

    /// False once the connection to the engine or platform has been lost.
    fn is_connected(&self) -> bool;

    fn motors_enabled(&self) -> bool;

    fn is_estop_pressed(&self) -> bool;

    // ---- CAPABILITIES ----

    fn has_ratio_drive(&self) -> bool;

    fn has_lat_vel(&self) -> bool;

    /// The wheel lights, if the platform has them.
    fn wheel_lights(&mut self) -> Option<&mut dyn WheelLights>;

    /// The speech synthesiser, if the platform has one.
    fn speech(&mut self) -> Option<&mut dyn Speech>;

    // ---- MOTION ----

    fn enable_motors(&mut self);

    fn disable_motors(&mut self);

    fn ratio_drive(&mut self, cmd: &RatioDriveCmd);

    /// Units: millimeters/second
    fn set_vel(&mut self, vel_mms: f64);

    /// Units: millimeters/second
    fn set_lat_vel(&mut self, vel_mms: f64);

    /// Units: degrees/second
    fn set_rot_vel(&mut self, rate_degs: f64);

    // ---- MODES ----

    /// Go to the given pose, only constraining the final heading if `use_heading` is true.
    fn goto_pose(&mut self, pose: EnginePose, use_heading: bool);

    /// Go to a goal named in the engine's map.
    fn goto_goal(&mut self, name: &str);

    /// Deactivate the goto mode, abandoning any goal in progress.
    fn deactivate_goto(&mut self);

    fn activate_wander(&mut self);

    fn activate_stop(&mut self);

    fn dock(&mut self);

    fn undock(&mut self);

    // ---- LOCALISATION ----

    /// Localise the robot at its home position, blocking until complete.
    fn localize_at_home_blocking(&mut self) -> bool;

    fn force_update_pose(&mut self, pose: EnginePose);

    fn set_map(&mut self, map_file: &str) -> bool;

    // ---- REGISTRATION ----

    fn set_callbacks(&mut self, callbacks: EngineCallbacks);

    fn add_cycle_task(&mut self, name: &str, task: CycleTask);
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl EnginePose {
    pub fn new(x_mm: f64, y_mm: f64, th_deg: f64) -> Self {
        Self { x_mm, y_mm, th_deg }
    }

    /// True if both poses describe the same goal.
    ///
    /// Positions must agree to within a millimeter. Headings are only compared if both are
    /// defined, since an engine may report the heading it finished at for a free-heading goal.
    pub fn same_goal(&self, other: &EnginePose) -> bool {
        const POS_TOL_MM: f64 = 1.0;
        const HEADING_TOL_DEG: f64 = 0.1;

        let pos_eq = (self.x_mm - other.x_mm).abs() < POS_TOL_MM
            && (self.y_mm - other.y_mm).abs() < POS_TOL_MM;

        let th_eq = match self.th_deg.is_nan() || other.th_deg.is_nan() {
            true => true,
            false => util::maths::wrap_180(self.th_deg - other.th_deg).abs() < HEADING_TOL_DEG,
        };

        pos_eq && th_eq
    }
}

impl EngineCallbacks {
    pub fn fire_new_goal(&self, pose: EnginePose) {
        if let Some(ref cb) = self.new_goal {
            cb(pose)
        }
    }

    pub fn fire_goal_reached(&self, pose: EnginePose) {
        if let Some(ref cb) = self.goal_reached {
            cb(pose)
        }
    }

    pub fn fire_goal_failed(&self, pose: EnginePose) {
        if let Some(ref cb) = self.goal_failed {
            cb(pose)
        }
    }

    pub fn fire_goal_interrupted(&self, pose: EnginePose) {
        if let Some(ref cb) = self.goal_interrupted {
            cb(pose)
        }
    }

    pub fn fire_path_state_changed(&self, state: &str) {
        if let Some(ref cb) = self.path_state_changed {
            cb(state)
        }
    }
}
