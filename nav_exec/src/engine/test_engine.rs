//! # Test engine
//!
//! An engine double which records every command it receives. Callbacks and sensor cycles are fired
//! synchronously from the test through the [`Remote`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nalgebra::Matrix3;

use super::*;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Capabilities the test engine reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub ratio_drive: bool,
    pub lat_vel: bool,
    pub wheel_lights: bool,
    pub speech: bool,
}

pub struct TestEngine {
    shared: Arc<Shared>,
    caps: Capabilities,
    wheel_lights: Option<TestWheelLights>,
    speech: Option<TestSpeech>,
}

/// Test-side handle onto the engine's recorded calls and registered callbacks.
#[derive(Clone)]
pub struct Remote {
    shared: Arc<Shared>,
}

/// A fixed robot state to run sensor cycles with.
#[derive(Debug, Clone)]
pub struct TestCycleState {
    pub pose: EnginePose,
    pub loc: Option<LocVariance>,
    pub ms_since_last_loc: i64,
    pub motors_enabled: bool,
    pub dock_state: String,
    pub server_mode: Option<String>,
    pub server_status: Option<String>,
    pub state_of_charge: f64,
    pub charge_state: i32,
}

struct TestWheelLights {
    shared: Arc<Shared>,
}

struct TestSpeech {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<TestState>,
    callbacks: Mutex<EngineCallbacks>,
    tasks: Mutex<Vec<(String, CycleTask)>>,
}

struct TestState {
    calls: Vec<EngineCall>,
    connected: bool,
    estop: bool,
    motors_enabled: bool,
    motors_respond: bool,
    localize_ok: bool,
}

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// A command received by the test engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    EnableMotors,
    DisableMotors,
    RatioDrive(RatioDriveCmd),
    SetVel(f64),
    SetLatVel(f64),
    SetRotVel(f64),
    GotoPose(EnginePose, bool),
    GotoGoal(String),
    DeactivateGoto,
    Wander,
    Stop,
    Dock,
    Undock,
    WheelLightDefaultMode(bool),
    WheelLight(WheelLightPacket),
    Speak(String),
    LocalizeAtHome,
    ForceUpdatePose(EnginePose),
    SetMap(String),
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Default for TestState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            connected: true,
            estop: false,
            motors_enabled: false,
            motors_respond: true,
            localize_ok: true,
        }
    }
}

impl Default for TestCycleState {
    fn default() -> Self {
        Self {
            pose: EnginePose::default(),
            loc: None,
            ms_since_last_loc: 0,
            motors_enabled: false,
            dock_state: String::from("Undocked"),
            server_mode: Some(String::from("Idle")),
            server_status: Some(String::from("Idle")),
            state_of_charge: 90.0,
            charge_state: 0,
        }
    }
}

impl TestCycleState {
    pub fn with_loc(mut self) -> Self {
        self.loc = Some(LocVariance {
            mean: self.pose,
            var: Matrix3::new(4.0, 1.0, 2.0, 1.0, 9.0, 3.0, 2.0, 3.0, 5.0),
        });
        self
    }
}

impl TestEngine {
    pub fn new(caps: Capabilities) -> (Self, Remote) {
        let shared = Arc::new(Shared::default());
        let wheel_lights = match caps.wheel_lights {
            true => Some(TestWheelLights {
                shared: shared.clone(),
            }),
            false => None,
        };
        let speech = match caps.speech {
            true => Some(TestSpeech {
                shared: shared.clone(),
            }),
            false => None,
        };

        (
            Self {
                shared: shared.clone(),
                caps,
                wheel_lights,
                speech,
            },
            Remote { shared },
        )
    }

    fn record(&self, call: EngineCall) {
        self.shared.state().calls.push(call);
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<TestState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Remote {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.shared.state().calls.clone()
    }

    pub fn count(&self, f: impl Fn(&EngineCall) -> bool) -> usize {
        self.shared.state().calls.iter().filter(|c| f(*c)).count()
    }

    pub fn clear_calls(&self) {
        self.shared.state().calls.clear();
    }

    pub fn set_estop(&self, pressed: bool) {
        self.shared.state().estop = pressed;
    }

    pub fn set_connected(&self, connected: bool) {
        self.shared.state().connected = connected;
    }

    pub fn set_motors_enabled(&self, enabled: bool) {
        self.shared.state().motors_enabled = enabled;
    }

    /// Choose whether motor commands take effect. If not, motor state never changes.
    pub fn set_motors_respond(&self, respond: bool) {
        self.shared.state().motors_respond = respond;
    }

    pub fn set_localize_ok(&self, ok: bool) {
        self.shared.state().localize_ok = ok;
    }

    pub fn fire_new_goal(&self, pose: EnginePose) {
        self.callbacks().fire_new_goal(pose)
    }

    pub fn fire_reached(&self, pose: EnginePose) {
        self.callbacks().fire_goal_reached(pose)
    }

    pub fn fire_failed(&self, pose: EnginePose) {
        self.callbacks().fire_goal_failed(pose)
    }

    pub fn fire_interrupted(&self, pose: EnginePose) {
        self.callbacks().fire_goal_interrupted(pose)
    }

    pub fn fire_path_state(&self, state: &str) {
        self.callbacks().fire_path_state_changed(state)
    }

    /// Run every registered cycle task once with the given state.
    pub fn run_cycle(&self, state: &dyn CycleState) {
        let mut tasks = self
            .shared
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (_, task) in tasks.iter_mut() {
            task(state);
        }
    }

    pub fn num_cycle_tasks(&self) -> usize {
        self.shared
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn callbacks(&self) -> MutexGuard<EngineCallbacks> {
        self.shared
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl NavEngine for TestEngine {
    fn is_connected(&self) -> bool {
        self.shared.state().connected
    }

    fn motors_enabled(&self) -> bool {
        self.shared.state().motors_enabled
    }

    fn is_estop_pressed(&self) -> bool {
        self.shared.state().estop
    }

    fn has_ratio_drive(&self) -> bool {
        self.caps.ratio_drive
    }

    fn has_lat_vel(&self) -> bool {
        self.caps.lat_vel
    }

    fn wheel_lights(&mut self) -> Option<&mut dyn WheelLights> {
        self.wheel_lights
            .as_mut()
            .map(|w| w as &mut dyn WheelLights)
    }

    fn speech(&mut self) -> Option<&mut dyn Speech> {
        self.speech.as_mut().map(|s| s as &mut dyn Speech)
    }

    fn enable_motors(&mut self) {
        let mut state = self.shared.state();
        state.calls.push(EngineCall::EnableMotors);
        if state.motors_respond {
            state.motors_enabled = true;
        }
    }

    fn disable_motors(&mut self) {
        let mut state = self.shared.state();
        state.calls.push(EngineCall::DisableMotors);
        if state.motors_respond {
            state.motors_enabled = false;
        }
    }

    fn ratio_drive(&mut self, cmd: &RatioDriveCmd) {
        self.record(EngineCall::RatioDrive(*cmd))
    }

    fn set_vel(&mut self, vel_mms: f64) {
        self.record(EngineCall::SetVel(vel_mms))
    }

    fn set_lat_vel(&mut self, vel_mms: f64) {
        self.record(EngineCall::SetLatVel(vel_mms))
    }

    fn set_rot_vel(&mut self, rate_degs: f64) {
        self.record(EngineCall::SetRotVel(rate_degs))
    }

    fn goto_pose(&mut self, pose: EnginePose, use_heading: bool) {
        self.record(EngineCall::GotoPose(pose, use_heading))
    }

    fn goto_goal(&mut self, name: &str) {
        self.record(EngineCall::GotoGoal(String::from(name)))
    }

    fn deactivate_goto(&mut self) {
        self.record(EngineCall::DeactivateGoto)
    }

    fn activate_wander(&mut self) {
        self.record(EngineCall::Wander)
    }

    fn activate_stop(&mut self) {
        self.record(EngineCall::Stop)
    }

    fn dock(&mut self) {
        self.record(EngineCall::Dock)
    }

    fn undock(&mut self) {
        self.record(EngineCall::Undock)
    }

    fn localize_at_home_blocking(&mut self) -> bool {
        let mut state = self.shared.state();
        state.calls.push(EngineCall::LocalizeAtHome);
        state.localize_ok
    }

    fn force_update_pose(&mut self, pose: EnginePose) {
        self.record(EngineCall::ForceUpdatePose(pose))
    }

    fn set_map(&mut self, map_file: &str) -> bool {
        self.record(EngineCall::SetMap(String::from(map_file)));
        true
    }

    fn set_callbacks(&mut self, callbacks: EngineCallbacks) {
        *self
            .shared
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = callbacks;
    }

    fn add_cycle_task(&mut self, name: &str, task: CycleTask) {
        self.shared
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((String::from(name), task));
    }
}

impl WheelLights for TestWheelLights {
    fn set_default_mode(&mut self, enabled: bool) {
        self.shared
            .state()
            .calls
            .push(EngineCall::WheelLightDefaultMode(enabled));
    }

    fn send(&mut self, packet: &WheelLightPacket) {
        self.shared.state().calls.push(EngineCall::WheelLight(*packet));
    }
}

impl Speech for TestSpeech {
    fn speak(&mut self, text: &str) {
        self.shared
            .state()
            .calls
            .push(EngineCall::Speak(String::from(text)));
    }
}

impl CycleState for TestCycleState {
    fn pose(&self) -> EnginePose {
        self.pose
    }

    fn loc_mean_var(&self) -> Option<LocVariance> {
        self.loc.clone()
    }

    fn ms_since_last_loc(&self) -> i64 {
        self.ms_since_last_loc
    }

    fn motors_enabled(&self) -> bool {
        self.motors_enabled
    }

    fn dock_state(&self) -> String {
        self.dock_state.clone()
    }

    fn server_mode(&self) -> Option<String> {
        self.server_mode.clone()
    }

    fn server_status(&self) -> Option<String> {
        self.server_status.clone()
    }

    fn state_of_charge(&self) -> f64 {
        self.state_of_charge
    }

    fn charge_state(&self) -> i32 {
        self.charge_state
    }
}
