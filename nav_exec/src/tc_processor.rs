//! # Telecommand processor module
//!
//! The telecommand processor handles the direct commands and streamed inputs, and forwards goal
//! protocol requests to the goal coordinator.
//!
//! Commands which move the robot are gated on the e-stop. The e-stop is checked under the same
//! robot lock as the command itself, so that it cannot be pressed in between.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::time::Duration;

use comms_if::tc::{Tc, TcResponse};
use log::{debug, info, warn};

use crate::{
    data_store::DataStore,
    engine::{NavEngine, WheelLightPacket},
    frame,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Highest valid wheel light pattern.
const WHEEL_LIGHT_MODE_MAX: i32 = 10;

/// Highest valid wheel light value.
const WHEEL_LIGHT_VALUE_MAX: i32 = 100;

/// Period at which the motor state is polled while waiting for confirmation.
const MOTOR_POLL_PERIOD: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a telecommand, returning the response to send back.
pub fn exec(ds: &mut DataStore, tc: &Tc) -> TcResponse {
    match tc {
        Tc::EnableMotors => set_motors(ds, true).into(),
        Tc::DisableMotors => set_motors(ds, false).into(),
        Tc::Wander => gated(ds, "wander", |e| e.activate_wander()).into(),
        Tc::Stop => {
            debug!("Stopping");
            ds.robot.lock().activate_stop();
            TcResponse::Ok
        }
        Tc::Dock => gated(ds, "dock", |e| e.dock()).into(),
        Tc::Undock => gated(ds, "undock", |e| e.undock()).into(),
        Tc::WheelLight { mode, value } => wheel_light(ds, *mode, *value),
        Tc::Speak(text) => match ds.robot.lock().speech() {
            Some(s) => {
                s.speak(text);
                TcResponse::Ok
            }
            None => {
                warn!("Platform has no speech synthesiser");
                TcResponse::Unsupported
            }
        },
        Tc::GlobalLocalization => {
            info!("Localising at home, this may take some time");
            let ok = ds.robot.lock().localize_at_home_blocking();
            match ok {
                true => info!("Localisation complete"),
                false => warn!("Global localisation failed"),
            }
            ok.into()
        }
        Tc::InitialPose(p) => match frame::resolve_into(&*ds.frames, &ds.names.operating, p) {
            Ok(resolved) => {
                let pose = frame::pose_to_engine(&resolved.pose);
                info!(
                    "Setting pose estimate to {:.0} mm, {:.0} mm, {:.0} deg",
                    pose.x_mm, pose.y_mm, pose.th_deg
                );
                ds.robot.lock().force_update_pose(pose);
                TcResponse::Ok
            }
            Err(e) => {
                warn!("Cannot set initial pose: {}", e);
                TcResponse::Failed
            }
        },
        Tc::Shutdown => {
            info!("Shutdown requested");
            ds.request_shutdown();
            ds.tm.send(comms_if::tm::TmMsg::ShutdownConfirm);
            TcResponse::Ok
        }
        Tc::CmdVel(twist) => {
            if ds.robot.lock().is_estop_pressed() {
                warn!("Robot e-stop button pressed, cannot drive");
                return TcResponse::Failed;
            }
            ds.drive_mode.apply(&ds.robot, twist);
            TcResponse::Ok
        }
        Tc::GoalName(name) => {
            info!("Navigating to goal \"{}\"", name);
            ds.robot.lock().goto_goal(name);
            TcResponse::Ok
        }
        Tc::SimpleGoal(p) => match frame::resolve_into(&*ds.frames, &ds.names.operating, p) {
            Ok(resolved) => {
                let pose = frame::pose_to_engine(&resolved.pose);
                ds.robot.lock().goto_pose(pose, !pose.th_deg.is_nan());
                TcResponse::Ok
            }
            Err(e) => {
                warn!("Cannot navigate to simple goal: {}", e);
                TcResponse::Failed
            }
        },
        Tc::SendGoal(req) => ds.coord.request_goal(req.clone()),
        Tc::CancelGoal => ds.coord.cancel_goal(),
        Tc::GoalStatus => TcResponse::GoalStatus(ds.coord.status()),
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Run an action unless the e-stop is pressed, both under one acquisition of the robot lock.
fn gated<F>(ds: &DataStore, action: &str, f: F) -> bool
where
    F: FnOnce(&mut dyn NavEngine),
{
    let mut engine = ds.robot.lock();

    if engine.is_estop_pressed() {
        warn!("Robot e-stop button pressed, cannot {}", action);
        return false;
    }

    info!("Commanding {}", action);
    f(&mut *engine);
    true
}

/// Enable or disable the motors and wait for the engine to confirm.
fn set_motors(ds: &DataStore, enable: bool) -> bool {
    let commanded = match enable {
        true => gated(ds, "enable motors", |e| e.enable_motors()),
        false => {
            ds.robot.lock().disable_motors();
            true
        }
    };

    if !commanded {
        return false;
    }

    let confirmed = ds.robot.wait_for(
        Duration::from_secs_f64(ds.params.motor_confirm_timeout_s),
        MOTOR_POLL_PERIOD,
        |e| e.motors_enabled() == enable,
    );

    if !confirmed {
        warn!(
            "Motors did not reach the {} state within {:.2} s",
            if enable { "enabled" } else { "disabled" },
            ds.params.motor_confirm_timeout_s
        );
    }

    confirmed
}

fn wheel_light(ds: &DataStore, mode: i32, value: i32) -> TcResponse {
    if !(0..=WHEEL_LIGHT_MODE_MAX).contains(&mode) || !(0..=WHEEL_LIGHT_VALUE_MAX).contains(&value)
    {
        warn!(
            "Invalid wheel light command: mode {} must be in [0, {}], value {} must be in [0, {}]",
            mode, WHEEL_LIGHT_MODE_MAX, value, WHEEL_LIGHT_VALUE_MAX
        );
        return TcResponse::Failed;
    }

    let mut engine = ds.robot.lock();

    let lights = match engine.wheel_lights() {
        Some(l) => l,
        None => {
            warn!("Platform has no wheel lights");
            return TcResponse::Unsupported;
        }
    };

    if mode == 0 {
        lights.set_default_mode(true);
    } else {
        lights.set_default_mode(false);
        lights.send(&WheelLightPacket {
            pattern: mode as u8,
            value: value as i8,
            flags: 0,
            flags2: 0,
        });
    }

    TcResponse::Ok
}
