//! # Geometry types
//!
//! Poses, transforms and velocity commands in the external representation: linear units in meters,
//! orientation as a unit quaternion, and a named reference frame.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Side length of the external pose covariance matrix (x, y, z, roll, pitch, yaw).
pub const COV_DIM: usize = 6;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A point in 3D space.
///
/// Units: meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// An orientation quaternion.
///
/// A quaternion with NaN components represents an undefined orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

/// Position and orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub orientation: Quaternion,
}

/// The frame and acquisition time of a stamped quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Name of the frame the data is expressed in
    pub frame_id: String,

    /// UTC time at which the data was valid. Defaults to the time of parsing if not given.
    #[serde(with = "ts_milliseconds", default = "Utc::now")]
    pub stamp: DateTime<Utc>,
}

/// A pose expressed in a named frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseStamped {
    pub header: Header,
    pub pose: Pose,
}

/// A pose with its 6x6 covariance over (x, y, z, roll, pitch, yaw).
///
/// Entries with no estimate hold `-1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseWithCovarianceStamped {
    pub header: Header,
    pub pose: Pose,
    pub covariance: [[f64; COV_DIM]; COV_DIM],
}

/// Rigid transform between two frames.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Point,
    pub rotation: Quaternion,
}

/// A transform from `header.frame_id` to `child_frame_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    pub header: Header,
    pub child_frame_id: String,
    pub transform: Transform,
}

/// Planar velocity command in the robot body frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist {
    /// Forward speed.
    ///
    /// Units: meters/second
    pub fwd_ms: f64,

    /// Lateral speed, positive to the left.
    ///
    /// Units: meters/second
    pub lat_ms: f64,

    /// Turn rate about the body Z+ axis, positive to the left.
    ///
    /// Units: radians/second
    pub rate_rads: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    /// The identity rotation.
    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }

    /// An orientation with no defined heading.
    pub fn undefined() -> Self {
        Self {
            x: std::f64::NAN,
            y: std::f64::NAN,
            z: std::f64::NAN,
            w: std::f64::NAN,
        }
    }
}

impl Header {
    pub fn new(frame_id: &str, stamp: DateTime<Utc>) -> Self {
        Self {
            frame_id: String::from(frame_id),
            stamp,
        }
    }
}
