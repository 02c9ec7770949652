//! # Data Store
//!
//! Everything the main loop and the telecommand processor share.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use color_eyre::{eyre::eyre, Report};
use log::error;

use crate::{
    cmd_vel::DriveMode,
    frame::{FrameLookup, FrameNames},
    goal_coord::GoalCoordinator,
    params::NavExecParams,
    robot::RobotHandle,
    tm_server::TmSender,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
pub struct DataStore {
    pub params: NavExecParams,

    pub robot: RobotHandle,

    pub coord: GoalCoordinator,

    /// How velocity commands are applied, chosen at startup
    pub drive_mode: DriveMode,

    pub frames: Arc<dyn FrameLookup>,

    pub names: FrameNames,

    pub tm: TmSender,

    /// Set by the shutdown telecommand or an interrupt signal
    pub shutdown: Arc<AtomicBool>,

    // Monitoring Counters
    /// Number of cycles already executed
    pub num_cycles: u128,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    pub fn new(
        params: NavExecParams,
        robot: RobotHandle,
        frames: Arc<dyn FrameLookup>,
        tm: TmSender,
    ) -> Self {
        let names = FrameNames::new(&params.tf_prefix, &params.operating_frame, &params.base_frame);

        let coord = GoalCoordinator::new(robot.clone(), frames.clone(), &names.operating, tm.clone());

        let drive_mode = DriveMode::select(&*robot.lock(), params.throttle_ratio);

        Self {
            params,
            robot,
            coord,
            drive_mode,
            frames,
            names,
            tm,
            shutdown: Arc::new(AtomicBool::new(false)),
            num_cycles: 0,
        }
    }

    /// Request the main loop exits at the end of this cycle.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst)
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// False once shutdown has been requested or the engine connection is lost.
    pub fn is_alive(&self) -> bool {
        !self.shutdown_requested() && self.robot.lock().is_connected()
    }

    /// Bring the execution to an end, aborting any goal still in progress.
    ///
    /// `fatal` is the error which stopped the main loop, if there was one. Without it, leaving the
    /// loop before shutdown was requested means the engine was lost. The returned result is the
    /// one the executable should exit with.
    pub fn end_execution(&mut self, fatal: Option<Report>) -> Result<(), Report> {
        let result = match fatal {
            Some(e) => Err(e),
            None if !self.shutdown_requested() => {
                Err(eyre!("Connection to the navigation engine lost"))
            }
            None => Ok(()),
        };

        if let Err(ref e) = result {
            error!("{:#}", e);
        }

        self.coord.shutdown();

        result
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::{
        engine::test_engine::{Capabilities, Remote, TestEngine},
        frame::StaticFrames,
        tm_server::{self, TmReceiver},
    };

    /// A data store over the test engine.
    pub(crate) fn data_store(caps: Capabilities) -> (DataStore, Remote, TmReceiver) {
        let (engine, remote) = TestEngine::new(caps);
        let (tx, rx) = tm_server::channel();
        let ds = DataStore::new(
            NavExecParams::default(),
            RobotHandle::new(Box::new(engine)),
            Arc::new(StaticFrames::default()),
            tx,
        );
        ds.coord.register_callbacks();
        (ds, remote, rx)
    }

    #[test]
    fn test_liveness() {
        let (ds, remote, _rx) = data_store(Capabilities::default());
        assert!(ds.is_alive());

        remote.set_connected(false);
        assert!(!ds.is_alive());

        remote.set_connected(true);
        ds.request_shutdown();
        assert!(!ds.is_alive());
    }

    #[test]
    fn test_end_execution_aborts_goal() {
        use crate::frame::yaw_to_quaternion;
        use chrono::Utc;
        use comms_if::{
            geom::{Header, Point, Pose, PoseStamped},
            goal::{GoalRequest, GoalStatus},
            tm::TmMsg,
        };

        let (mut ds, _remote, rx) = data_store(Capabilities::default());
        ds.coord.request_goal(GoalRequest {
            id: 9,
            target_pose: PoseStamped {
                header: Header::new("map", Utc::now()),
                pose: Pose {
                    position: Point {
                        x: 1.0,
                        y: 0.0,
                        z: 0.0,
                    },
                    orientation: yaw_to_quaternion(0.0),
                },
            },
        });
        assert!(ds.coord.context().is_executing());

        // The main loop stopped on an error rather than a shutdown request
        let result = ds.end_execution(Some(eyre!("TC socket closed")));
        assert!(result.is_err());
        assert!(!ds.coord.context().is_executing());

        let results: Vec<_> = rx
            .drain()
            .into_iter()
            .filter_map(|m| match m {
                TmMsg::GoalResult(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(results.len(), 1);
        assert_eq!((results[0].id, results[0].status), (9, GoalStatus::Aborted));

        // Only one result however many times execution is ended
        ds.request_shutdown();
        assert!(ds.end_execution(None).is_ok());
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn test_end_execution_engine_lost() {
        let (mut ds, remote, _rx) = data_store(Capabilities::default());
        remote.set_connected(false);
        assert!(ds.end_execution(None).is_err());
    }

    #[test]
    fn test_drive_mode_from_capabilities() {
        let (ds, _, _) = data_store(Capabilities {
            ratio_drive: true,
            ..Default::default()
        });
        assert!(matches!(ds.drive_mode, DriveMode::RatioDrive { .. }));
    }
}
