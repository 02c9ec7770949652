//! # Navigation Executable Parameters
//!
//! This module provides parameters for the navigation executable, loaded from `nav_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use thiserror::Error;

use crate::{engine::sim::SimParams, frame::StaticFrame};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NavExecParams {
    /// Prefix applied to every published frame name, empty for none
    pub tf_prefix: String,

    /// Frame the engine navigates in
    pub operating_frame: String,

    /// Frame attached to the robot base
    pub base_frame: String,

    /// Period of the main loop, and so of goal polling.
    ///
    /// Units: seconds
    pub goal_poll_period_s: f64,

    /// Time to wait for the motors to reach the commanded state.
    ///
    /// Units: seconds
    pub motor_confirm_timeout_s: f64,

    /// Units: seconds
    pub battery_period_s: f64,

    /// Time the telemetry publisher may take in one sensor cycle before warning.
    ///
    /// Units: milliseconds
    pub cycle_budget_ms: u64,

    /// Throttle used in ratio drive mode.
    ///
    /// Units: percent
    pub throttle_ratio: f64,

    /// Transforms available for resolving goal frames
    pub static_frames: Vec<StaticFrame>,

    /// Simulated engine parameters
    pub sim: SimParams,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A parameter with a value the executable cannot run with.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("{name} must be positive and finite, found {value}")]
    NotPositive { name: &'static str, value: f64 },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NavExecParams {
    /// Check the periods and timeouts can be used as durations.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let durations = [
            ("goal_poll_period_s", self.goal_poll_period_s),
            ("motor_confirm_timeout_s", self.motor_confirm_timeout_s),
            ("battery_period_s", self.battery_period_s),
            ("sim.cycle_period_s", self.sim.cycle_period_s),
        ];

        for &(name, value) in durations.iter() {
            if !(value.is_finite() && value > 0.0) {
                return Err(ParamsError::NotPositive { name, value });
            }
        }

        Ok(())
    }
}

impl Default for NavExecParams {
    fn default() -> Self {
        Self {
            tf_prefix: String::new(),
            operating_frame: String::from("map"),
            base_frame: String::from("base_link"),
            goal_poll_period_s: 0.05,
            motor_confirm_timeout_s: 1.0,
            battery_period_s: 5.0,
            cycle_budget_ms: 20,
            throttle_ratio: 20.0,
            static_frames: Vec::new(),
            sim: SimParams::default(),
        }
    }
}
