//! # Pose and frame conversion
//!
//! The engine works in millimeters and degrees in its own operating frame. Externally, poses are
//! in meters with quaternion orientations, and are stamped with the name of the frame they are
//! expressed in.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use comms_if::geom::{
    Header, Point, Pose, PoseStamped, Quaternion, Transform, TransformStamped, COV_DIM,
};
use nalgebra::{Isometry3, Matrix3, Point3, UnitQuaternion, Vector3};
use serde::Deserialize;
use thiserror::Error;

use crate::engine::EnginePose;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Engine linear units per external linear unit.
pub const MM_PER_M: f64 = 1000.0;

/// Value of a covariance entry for which there is no estimate.
pub const COV_UNKNOWN: f64 = -1.0;

/// Index of each engine covariance axis (x, y, yaw) in the external covariance matrix.
const COV_AXIS_MAP: [usize; 3] = [0, 1, 5];

/// Index of yaw in the engine covariance matrix.
const ENGINE_YAW: usize = 2;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// The resolved names of the frames used by the executable.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameNames {
    /// The frame the engine operates in
    pub operating: String,

    /// The robot base frame
    pub base: String,
}

/// A fixed planar transform from a parent frame to a child frame.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticFrame {
    pub parent: String,
    pub child: String,

    /// Position of the child origin in the parent frame.
    ///
    /// Units: meters
    #[serde(default)]
    pub x_m: f64,

    /// Units: meters
    #[serde(default)]
    pub y_m: f64,

    /// Rotation of the child frame about the parent Z+ axis.
    ///
    /// Units: radians
    #[serde(default)]
    pub yaw_rad: f64,
}

/// Frame lookup over a fixed set of transforms.
#[derive(Debug, Clone, Default)]
pub struct StaticFrames {
    frames: Vec<StaticFrame>,
}

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    #[error("No transform is available from {source_frame:?} into {target_frame:?}")]
    Unavailable {
        target_frame: String,
        source_frame: String,
    },
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Provides transforms between named frames.
pub trait FrameLookup: Send + Sync {
    /// The transform which maps coordinates in `source` into `target`.
    fn lookup(&self, target: &str, source: &str) -> Result<Isometry3<f64>, FrameError>;
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl FrameNames {
    pub fn new(tf_prefix: &str, operating: &str, base: &str) -> Self {
        Self {
            operating: resolve_name(tf_prefix, operating),
            base: resolve_name(tf_prefix, base),
        }
    }
}

impl StaticFrames {
    /// Build the lookup, resolving every frame name with the given prefix.
    pub fn new(tf_prefix: &str, frames: &[StaticFrame]) -> Self {
        Self {
            frames: frames
                .iter()
                .map(|f| StaticFrame {
                    parent: resolve_name(tf_prefix, &f.parent),
                    child: resolve_name(tf_prefix, &f.child),
                    ..f.clone()
                })
                .collect(),
        }
    }
}

impl StaticFrame {
    /// Transform from child coordinates into parent coordinates.
    fn isometry(&self) -> Isometry3<f64> {
        Isometry3::new(
            Vector3::new(self.x_m, self.y_m, 0.0),
            Vector3::z() * self.yaw_rad,
        )
    }
}

impl FrameLookup for StaticFrames {
    fn lookup(&self, target: &str, source: &str) -> Result<Isometry3<f64>, FrameError> {
        if same_frame(target, source) {
            return Ok(Isometry3::identity());
        }

        for f in self.frames.iter() {
            if same_frame(&f.parent, target) && same_frame(&f.child, source) {
                return Ok(f.isometry());
            }
            if same_frame(&f.child, target) && same_frame(&f.parent, source) {
                return Ok(f.isometry().inverse());
            }
        }

        Err(FrameError::Unavailable {
            target_frame: String::from(target),
            source_frame: String::from(source),
        })
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Resolve a frame name against a prefix.
///
/// A non-empty prefix `p` maps `name` to `/p/name`. Names which already start with `/` are
/// absolute and are left untouched.
pub fn resolve_name(tf_prefix: &str, name: &str) -> String {
    if name.starts_with('/') {
        return String::from(name);
    }

    match tf_prefix.trim_matches('/') {
        "" => String::from(name),
        p => format!("/{}/{}", p, name),
    }
}

/// True if both names refer to the same frame, ignoring a leading `/`.
pub fn same_frame(a: &str, b: &str) -> bool {
    a.strip_prefix('/').unwrap_or(a) == b.strip_prefix('/').unwrap_or(b)
}

/// Quaternion for a rotation of `yaw_rad` about Z+. A NaN yaw gives an undefined quaternion.
pub fn yaw_to_quaternion(yaw_rad: f64) -> Quaternion {
    if yaw_rad.is_nan() {
        return Quaternion::undefined();
    }

    from_unit_quaternion(&UnitQuaternion::from_euler_angles(0.0, 0.0, yaw_rad))
}

/// Yaw of a quaternion about Z+, NaN if the quaternion is undefined.
///
/// The quaternion is normalised first, so it need not be a unit quaternion.
///
/// Units: radians
pub fn quaternion_to_yaw(q: &Quaternion) -> f64 {
    if q.x.is_nan() || q.y.is_nan() || q.z.is_nan() || q.w.is_nan() {
        return std::f64::NAN;
    }

    UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(q.w, q.x, q.y, q.z))
        .euler_angles()
        .2
}

/// Convert an engine pose into the external representation.
pub fn engine_to_pose(p: &EnginePose) -> Pose {
    Pose {
        position: Point {
            x: p.x_mm / MM_PER_M,
            y: p.y_mm / MM_PER_M,
            z: 0.0,
        },
        orientation: yaw_to_quaternion(p.th_deg.to_radians()),
    }
}

/// Convert an external pose into an engine pose. An undefined orientation gives a NaN heading.
pub fn pose_to_engine(p: &Pose) -> EnginePose {
    EnginePose {
        x_mm: p.position.x * MM_PER_M,
        y_mm: p.position.y * MM_PER_M,
        th_deg: quaternion_to_yaw(&p.orientation).to_degrees(),
    }
}

/// Stamp an engine pose in the given frame.
pub fn engine_to_pose_stamped(p: &EnginePose, frame_id: &str, stamp: DateTime<Utc>) -> PoseStamped {
    PoseStamped {
        header: Header::new(frame_id, stamp),
        pose: engine_to_pose(p),
    }
}

/// The transform from the operating frame to the robot base for the given robot pose.
pub fn transform_for(
    p: &EnginePose,
    names: &FrameNames,
    stamp: DateTime<Utc>,
) -> TransformStamped {
    let pose = engine_to_pose(p);

    TransformStamped {
        header: Header::new(&names.operating, stamp),
        child_frame_id: names.base.clone(),
        transform: Transform {
            translation: pose.position,
            rotation: pose.orientation,
        },
    }
}

/// Map the engine's (x, y, yaw) covariance into the external 6x6 covariance.
///
/// Only the x, y and yaw rows and columns are populated, all other entries are [`COV_UNKNOWN`].
/// Entries involving a linear axis are scaled by 1/1000, entries involving yaw are converted from
/// degrees to radians.
pub fn covariance_to_external(var: &Matrix3<f64>) -> [[f64; COV_DIM]; COV_DIM] {
    let mut cov = [[COV_UNKNOWN; COV_DIM]; COV_DIM];

    for (r, &er) in COV_AXIS_MAP.iter().enumerate() {
        for (c, &ec) in COV_AXIS_MAP.iter().enumerate() {
            let touches_yaw = r == ENGINE_YAW || c == ENGINE_YAW;
            let linear = r != ENGINE_YAW || c != ENGINE_YAW;

            let mut v = var[(r, c)];
            if linear {
                v /= MM_PER_M;
            }
            if touches_yaw {
                v = v.to_radians();
            }

            cov[er][ec] = v;
        }
    }

    cov
}

/// Express a stamped pose in the target frame.
///
/// Poses already in the target frame are returned unchanged apart from the frame name. Otherwise
/// the transform is taken from `lookup`, and an error is returned if none is available. An
/// undefined orientation stays undefined.
pub fn resolve_into(
    lookup: &dyn FrameLookup,
    target_frame: &str,
    pose: &PoseStamped,
) -> Result<PoseStamped, FrameError> {
    let mut resolved = pose.clone();
    resolved.header.frame_id = String::from(target_frame);

    if same_frame(&pose.header.frame_id, target_frame) {
        return Ok(resolved);
    }

    let iso = lookup.lookup(target_frame, &pose.header.frame_id)?;

    let pos = &pose.pose.position;
    let p = iso * Point3::new(pos.x, pos.y, pos.z);
    resolved.pose.position = Point {
        x: p.x,
        y: p.y,
        z: p.z,
    };

    let q = &pose.pose.orientation;
    resolved.pose.orientation = match quaternion_to_yaw(q).is_nan() {
        true => Quaternion::undefined(),
        false => {
            let rot = UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(q.w, q.x, q.y, q.z));
            from_unit_quaternion(&(iso.rotation * rot))
        }
    };

    Ok(resolved)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn from_unit_quaternion(uq: &UnitQuaternion<f64>) -> Quaternion {
    let q = uq.quaternion();
    Quaternion {
        x: q.i,
        y: q.j,
        z: q.k,
        w: q.w,
    }
}
