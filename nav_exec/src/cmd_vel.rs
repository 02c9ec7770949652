//! # Velocity command translation
//!
//! Velocity commands are applied to the engine in one of two ways, depending on what the platform
//! supports. The choice is made once, when the executable starts.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::geom::Twist;
use log::{debug, info};

use crate::{
    engine::{NavEngine, RatioDriveCmd},
    frame::MM_PER_M,
    robot::RobotHandle,
};

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// How velocity commands are applied to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveMode {
    /// Drive through the engine's ratio drive mode, with a fixed throttle.
    RatioDrive {
        /// Units: percent
        throttle_ratio: f64,
    },

    /// Set velocities directly. Lateral velocity is only set if the platform supports it.
    DirectVelocity { lat_vel: bool },
}

/// A velocity command in engine units, ready to be applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveCmd {
    Ratio(RatioDriveCmd),

    Direct {
        /// Units: millimeters/second
        vel_mms: f64,

        /// Units: millimeters/second
        lat_vel_mms: Option<f64>,

        /// Units: degrees/second
        rot_vel_degs: f64,
    },
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DriveMode {
    /// Pick the drive mode from the engine's capabilities.
    pub fn select(engine: &dyn NavEngine, throttle_ratio: f64) -> Self {
        let mode = match engine.has_ratio_drive() {
            true => DriveMode::RatioDrive { throttle_ratio },
            false => DriveMode::DirectVelocity {
                lat_vel: engine.has_lat_vel(),
            },
        };

        info!("Velocity commands will use {:?}", mode);

        mode
    }

    /// Convert a velocity command into engine units.
    pub fn translate(&self, twist: &Twist) -> DriveCmd {
        match *self {
            DriveMode::RatioDrive { throttle_ratio } => DriveCmd::Ratio(RatioDriveCmd {
                trans_ratio: twist.fwd_ms * MM_PER_M,
                rot_ratio: twist.rate_rads.to_degrees() * MM_PER_M,
                throttle_ratio,
                lateral_ratio: twist.lat_ms * MM_PER_M,
            }),
            DriveMode::DirectVelocity { lat_vel } => DriveCmd::Direct {
                vel_mms: twist.fwd_ms * MM_PER_M,
                lat_vel_mms: match lat_vel {
                    true => Some(twist.lat_ms * MM_PER_M),
                    false => None,
                },
                rot_vel_degs: twist.rate_rads.to_degrees(),
            },
        }
    }

    /// Apply a velocity command to the engine.
    ///
    /// All set calls are made under a single acquisition of the robot lock.
    pub fn apply(&self, robot: &RobotHandle, twist: &Twist) {
        let cmd = self.translate(twist);
        debug!("Drive command: {:?}", cmd);

        let mut engine = robot.lock();

        match cmd {
            DriveCmd::Ratio(r) => engine.ratio_drive(&r),
            DriveCmd::Direct {
                vel_mms,
                lat_vel_mms,
                rot_vel_degs,
            } => {
                engine.set_vel(vel_mms);
                if let Some(l) = lat_vel_mms {
                    engine.set_lat_vel(l);
                }
                engine.set_rot_vel(rot_vel_degs);
            }
        }
    }
}
