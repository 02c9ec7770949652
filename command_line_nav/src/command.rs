//! # Console commands
//!
//! Each line typed into the console is parsed into a [`Command`], which is then converted into the
//! telecommand sent to the executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::Utc;
use comms_if::{
    geom::{Header, Point, Pose, PoseStamped, Quaternion, Twist},
    goal::{GoalId, GoalRequest},
    tc::Tc,
};
use structopt::{clap::AppSettings, StructOpt};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A command typed into the console.
#[derive(Debug, Clone, PartialEq, StructOpt)]
#[structopt(
    name = "nav",
    global_settings = &[AppSettings::AllowNegativeNumbers, AppSettings::VersionlessSubcommands]
)]
pub enum Command {
    /// Enable the drive motors.
    #[structopt(name = "enable")]
    EnableMotors,

    /// Disable the drive motors.
    #[structopt(name = "disable")]
    DisableMotors,

    #[structopt(name = "wander")]
    Wander,

    /// Stop all motion.
    #[structopt(name = "stop")]
    Stop,

    #[structopt(name = "dock")]
    Dock,

    #[structopt(name = "undock")]
    Undock,

    /// Set the wheel light pattern, mode 0 restores the automatic lighting.
    #[structopt(name = "light")]
    WheelLight { mode: i32, value: i32 },

    /// Speak a phrase through the robot's speech synthesiser.
    #[structopt(name = "say")]
    Speak {
        #[structopt(required = true)]
        words: Vec<String>,
    },

    /// Localise the robot at its home position.
    #[structopt(name = "localize")]
    GlobalLocalization,

    /// Set the localisation estimate.
    #[structopt(name = "initpose")]
    InitialPose {
        #[structopt(flatten)]
        target: TargetArgs,
    },

    /// Shut down the executable.
    #[structopt(name = "shutdown")]
    Shutdown,

    /// Send a velocity command.
    #[structopt(name = "vel")]
    CmdVel {
        /// Forward speed in meters/second
        fwd_ms: f64,

        /// Turn rate in radians/second, positive to the left
        rate_rads: f64,

        /// Lateral speed in meters/second, positive to the left
        #[structopt(short, long, default_value = "0")]
        lat_ms: f64,
    },

    /// Go to a destination named in the map.
    #[structopt(name = "goto")]
    GoalName { name: String },

    /// Go to a pose without tracking progress.
    #[structopt(name = "simple")]
    SimpleGoal {
        #[structopt(flatten)]
        target: TargetArgs,
    },

    /// Submit a tracked goal, replacing any goal in progress.
    #[structopt(name = "goal")]
    SendGoal {
        #[structopt(flatten)]
        target: TargetArgs,
    },

    /// Cancel the goal in progress.
    #[structopt(name = "cancel")]
    CancelGoal,

    /// Show the status of the current goal.
    #[structopt(name = "status")]
    GoalStatus,

    /// Leave the console.
    #[structopt(name = "exit")]
    Exit,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A target pose given on the command line.
#[derive(Debug, Clone, PartialEq, StructOpt)]
pub struct TargetArgs {
    /// Units: meters
    pub x_m: f64,

    /// Units: meters
    pub y_m: f64,

    /// Final heading in degrees, omit to leave the heading free
    pub heading_deg: Option<f64>,

    /// Frame the pose is given in
    #[structopt(short, long, default_value = "map")]
    pub frame: String,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Command {
    /// Parse a console line.
    pub fn parse(line: &str) -> Result<Self, structopt::clap::Error> {
        Self::from_iter_safe(std::iter::once("nav").chain(line.split_whitespace()))
    }

    /// The telecommand for this command, `None` for commands handled by the console itself.
    ///
    /// `next_goal_id` is used for, and advanced by, tracked goals.
    pub fn to_tc(&self, next_goal_id: &mut GoalId) -> Option<Tc> {
        let tc = match self {
            Command::EnableMotors => Tc::EnableMotors,
            Command::DisableMotors => Tc::DisableMotors,
            Command::Wander => Tc::Wander,
            Command::Stop => Tc::Stop,
            Command::Dock => Tc::Dock,
            Command::Undock => Tc::Undock,
            Command::WheelLight { mode, value } => Tc::WheelLight {
                mode: *mode,
                value: *value,
            },
            Command::Speak { words } => Tc::Speak(words.join(" ")),
            Command::GlobalLocalization => Tc::GlobalLocalization,
            Command::InitialPose { target } => Tc::InitialPose(target.to_pose()),
            Command::Shutdown => Tc::Shutdown,
            Command::CmdVel {
                fwd_ms,
                rate_rads,
                lat_ms,
            } => Tc::CmdVel(Twist {
                fwd_ms: *fwd_ms,
                lat_ms: *lat_ms,
                rate_rads: *rate_rads,
            }),
            Command::GoalName { name } => Tc::GoalName(name.clone()),
            Command::SimpleGoal { target } => Tc::SimpleGoal(target.to_pose()),
            Command::SendGoal { target } => {
                let id = *next_goal_id;
                *next_goal_id += 1;
                Tc::SendGoal(GoalRequest {
                    id,
                    target_pose: target.to_pose(),
                })
            }
            Command::CancelGoal => Tc::CancelGoal,
            Command::GoalStatus => Tc::GoalStatus,
            Command::Exit => return None,
        };

        Some(tc)
    }
}

impl TargetArgs {
    pub fn to_pose(&self) -> PoseStamped {
        let orientation = match self.heading_deg {
            Some(h) => {
                let half = h.to_radians() / 2.0;
                Quaternion {
                    x: 0.0,
                    y: 0.0,
                    z: half.sin(),
                    w: half.cos(),
                }
            }
            None => Quaternion::undefined(),
        };

        PoseStamped {
            header: Header::new(&self.frame, Utc::now()),
            pose: Pose {
                position: Point {
                    x: self.x_m,
                    y: self.y_m,
                    z: 0.0,
                },
                orientation,
            },
        }
    }
}
