//! # Simulated navigation engine
//!
//! An in-process engine which runs its own thread, stepping simple planar kinematics once per
//! sensor cycle, firing goal callbacks and running the registered cycle tasks.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info, warn};
use nalgebra::Matrix3;
use serde::Deserialize;
use std::{
    collections::HashMap,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use thiserror::Error;
use util::maths::{clamp, wrap_180};

use super::{
    CycleState, CycleTask, EngineCallbacks, EnginePose, LocVariance, NavEngine, RatioDriveCmd,
    Speech, WheelLightPacket, WheelLights,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

pub const PATH_STATE_IDLE: &str = "NOT_INITIALIZED";
pub const PATH_STATE_PLANNING: &str = "PLANNING_PATH";
pub const PATH_STATE_MOVING: &str = "MOVING_TO_GOAL";
pub const PATH_STATE_REACHED: &str = "REACHED_GOAL";
pub const PATH_STATE_FAILED: &str = "FAILED_MOVE";

pub const DOCK_STATE_UNDOCKED: &str = "Undocked";
pub const DOCK_STATE_DOCKING: &str = "Docking";
pub const DOCK_STATE_DOCKED: &str = "Docked";
pub const DOCK_STATE_UNDOCKING: &str = "Undocking";

/// Time spent reversing off the dock.
const UNDOCK_DURATION_S: f64 = 1.5;

/// Charging state code reported while docked.
const CHARGE_STATE_CHARGING: i32 = 1;

const CHARGE_STATE_NOT_CHARGING: i32 = 0;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Parameters of the simulated engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Period of the sensor cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Units: millimeters/second
    pub max_speed_mms: f64,

    /// Units: degrees/second
    pub max_rate_degs: f64,

    /// Distance from a goal at which it is considered reached.
    ///
    /// Units: millimeters
    pub goal_tolerance_mm: f64,

    /// Units: degrees
    pub heading_tolerance_deg: f64,

    /// Goals further than this from the map origin cannot be planned to and fail.
    ///
    /// Units: millimeters
    pub max_goal_range_mm: f64,

    /// Time taken for the motors to change state after a command.
    ///
    /// Units: seconds
    pub motor_switch_delay_s: f64,

    /// Pose used by global localisation
    pub home: EnginePose,

    /// Pose of the docking station
    pub dock: EnginePose,

    /// Goals which can be requested by name
    pub goals: HashMap<String, EnginePose>,

    /// Units: percent/second
    pub battery_drain_pct_s: f64,

    /// Units: percent/second
    pub battery_charge_pct_s: f64,

    pub has_ratio_drive: bool,
    pub has_lat_vel: bool,
    pub has_wheel_lights: bool,
    pub has_speech: bool,

    /// Start with the e-stop pressed.
    pub estop_pressed: bool,

    /// Make global localisation fail.
    pub localization_fails: bool,
}

/// The simulated engine.
///
/// Dropping the engine stops its thread.
pub struct SimEngine {
    state: Arc<Mutex<SimState>>,
    callbacks: Arc<Mutex<EngineCallbacks>>,
    tasks: Arc<Mutex<Vec<(String, CycleTask)>>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    wheel_lights: Option<SimWheelLights>,
    speech: Option<SimSpeech>,
    has_ratio_drive: bool,
    has_lat_vel: bool,
}

/// The simulated robot state, shared between the engine thread and the command interface.
pub struct SimState {
    params: SimParams,
    pose: EnginePose,
    mode: SimMode,
    motors_enabled: bool,
    motors_demand: Option<MotorsDemand>,
    estop: bool,
    vel_mms: f64,
    lat_vel_mms: f64,
    rot_vel_degs: f64,
    path_state: &'static str,
    dock_state: &'static str,
    server_status: String,
    loc_valid: bool,
    last_loc: Instant,
    charge_percent: f64,
    events: Vec<SimEvent>,
}

#[derive(Debug, Default)]
struct SimWheelLights {
    default_mode: bool,
    last_packet: Option<WheelLightPacket>,
}

/// Speech synthesiser which logs what it would say.
#[derive(Debug, Default)]
struct SimSpeech;

#[derive(Debug, Clone, Copy)]
struct MotorsDemand {
    enabled: bool,
    remaining_s: f64,
}

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// Errors which prevent the engine from starting.
#[derive(Debug, Error)]
pub enum EngineSetupError {
    #[error("The engine cycle period must be positive, found {0} s")]
    InvalidCyclePeriod(f64),

    #[error("Could not start the engine thread: {0}")]
    ThreadSpawnError(std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SimMode {
    Idle,
    Stopped,
    Goto {
        target: EnginePose,
        use_heading: bool,
    },
    Wander,
    Docking,
    Docked,
    Undocking {
        remaining_s: f64,
    },
    Drive,
}

/// An event raised while the state was locked, fired once it has been released.
#[derive(Debug, Clone, Copy)]
enum SimEvent {
    NewGoal(EnginePose),
    Reached(EnginePose),
    Failed(EnginePose),
    Interrupted(EnginePose),
    PathState(&'static str),
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.1,
            max_speed_mms: 500.0,
            max_rate_degs: 90.0,
            goal_tolerance_mm: 50.0,
            heading_tolerance_deg: 2.0,
            max_goal_range_mm: 50_000.0,
            motor_switch_delay_s: 0.2,
            home: EnginePose::default(),
            dock: EnginePose::new(-1000.0, 0.0, 180.0),
            goals: HashMap::new(),
            battery_drain_pct_s: 0.01,
            battery_charge_pct_s: 0.05,
            has_ratio_drive: true,
            has_lat_vel: false,
            has_wheel_lights: false,
            has_speech: false,
            estop_pressed: false,
            localization_fails: false,
        }
    }
}

impl SimEngine {
    /// Start the simulated engine.
    pub fn connect(params: SimParams) -> Result<Self, EngineSetupError> {
        if !(params.cycle_period_s > 0.0) {
            return Err(EngineSetupError::InvalidCyclePeriod(params.cycle_period_s));
        }

        let period = Duration::from_secs_f64(params.cycle_period_s);
        let wheel_lights = match params.has_wheel_lights {
            true => Some(SimWheelLights::default()),
            false => None,
        };
        let speech = match params.has_speech {
            true => Some(SimSpeech::default()),
            false => None,
        };
        let has_ratio_drive = params.has_ratio_drive;
        let has_lat_vel = params.has_lat_vel;

        let state = Arc::new(Mutex::new(SimState::new(params)));
        let callbacks = Arc::new(Mutex::new(EngineCallbacks::default()));
        let tasks: Arc<Mutex<Vec<(String, CycleTask)>>> = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicBool::new(true));

        let thread = {
            let state = state.clone();
            let callbacks = callbacks.clone();
            let tasks = tasks.clone();
            let running = running.clone();

            thread::Builder::new()
                .name(String::from("sim_engine"))
                .spawn(move || run(state, callbacks, tasks, running, period))
                .map_err(EngineSetupError::ThreadSpawnError)?
        };

        info!(target: "engine", "Simulated engine started, cycle period {:?}", period);

        Ok(Self {
            state,
            callbacks,
            tasks,
            running,
            thread: Some(thread),
            wheel_lights,
            speech,
            has_ratio_drive,
            has_lat_vel,
        })
    }

    /// Press or release the simulated e-stop button.
    pub fn set_estop(&mut self, pressed: bool) {
        lock(&self.state).estop = pressed;
    }

    fn state(&self) -> MutexGuard<SimState> {
        lock(&self.state)
    }
}

impl Drop for SimEngine {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(t) = self.thread.take() {
            if t.join().is_err() {
                warn!(target: "engine", "Simulated engine thread panicked");
            }
        }
    }
}

impl NavEngine for SimEngine {
    fn is_connected(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn motors_enabled(&self) -> bool {
        self.state().motors_enabled
    }

    fn is_estop_pressed(&self) -> bool {
        self.state().estop
    }

    fn has_ratio_drive(&self) -> bool {
        self.has_ratio_drive
    }

    fn has_lat_vel(&self) -> bool {
        self.has_lat_vel
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
        self.state().demand_motors(true);
    }

    fn disable_motors(&mut self) {
        self.state().demand_motors(false);
    }

    fn ratio_drive(&mut self, cmd: &RatioDriveCmd) {
        let mut state = self.state();
        let throttle = clamp(cmd.throttle_ratio / 100.0, 0.0, 1.0);
        let max_speed = state.params.max_speed_mms;
        let max_rate = state.params.max_rate_degs;

        state.enter_mode(SimMode::Drive);
        state.vel_mms = clamp(cmd.trans_ratio / 1000.0, -1.0, 1.0) * throttle * max_speed;
        state.lat_vel_mms = clamp(cmd.lateral_ratio / 1000.0, -1.0, 1.0) * throttle * max_speed;
        state.rot_vel_degs = clamp(cmd.rot_ratio / 1000.0, -1.0, 1.0) * throttle * max_rate;
    }

    fn set_vel(&mut self, vel_mms: f64) {
        let mut state = self.state();
        state.enter_mode(SimMode::Drive);
        state.vel_mms = vel_mms;
    }

    fn set_lat_vel(&mut self, vel_mms: f64) {
        let mut state = self.state();
        state.enter_mode(SimMode::Drive);
        state.lat_vel_mms = vel_mms;
    }

    fn set_rot_vel(&mut self, rate_degs: f64) {
        let mut state = self.state();
        state.enter_mode(SimMode::Drive);
        state.rot_vel_degs = rate_degs;
    }

    fn goto_pose(&mut self, pose: EnginePose, use_heading: bool) {
        let mut state = self.state();
        info!(
            target: "engine",
            "Goto {:.0} mm, {:.0} mm, {:.0} deg (heading {})",
            pose.x_mm,
            pose.y_mm,
            pose.th_deg,
            match use_heading {
                true => "constrained",
                false => "free",
            }
        );
        state.begin_goto(pose, use_heading);
    }

    fn goto_goal(&mut self, name: &str) {
        let mut state = self.state();
        match state.params.goals.get(name).copied() {
            Some(pose) => {
                info!(target: "engine", "Goto named goal \"{}\"", name);
                let use_heading = !pose.th_deg.is_nan();
                state.begin_goto(pose, use_heading);
            }
            None => {
                warn!(target: "engine", "No goal named \"{}\" in the map", name);
                state.set_path_state(PATH_STATE_FAILED);
            }
        }
    }

    fn deactivate_goto(&mut self) {
        let mut state = self.state();
        if let SimMode::Goto { .. } = state.mode {
            state.enter_mode(SimMode::Idle);
            state.set_path_state(PATH_STATE_IDLE);
        }
    }

    fn activate_wander(&mut self) {
        self.state().enter_mode(SimMode::Wander);
    }

    fn activate_stop(&mut self) {
        self.state().enter_mode(SimMode::Stopped);
    }

    fn dock(&mut self) {
        let mut state = self.state();
        if state.mode != SimMode::Docked {
            state.enter_mode(SimMode::Docking);
            state.dock_state = DOCK_STATE_DOCKING;
        }
    }

    fn undock(&mut self) {
        let mut state = self.state();
        if state.mode == SimMode::Docked {
            state.enter_mode(SimMode::Undocking {
                remaining_s: UNDOCK_DURATION_S,
            });
            state.dock_state = DOCK_STATE_UNDOCKING;
        }
    }

    fn localize_at_home_blocking(&mut self) -> bool {
        let mut state = self.state();
        if state.params.localization_fails {
            state.loc_valid = false;
            return false;
        }

        let home = state.params.home;
        state.relocalise(home);
        true
    }

    fn force_update_pose(&mut self, pose: EnginePose) {
        let mut state = self.state();
        let th_deg = match pose.th_deg.is_nan() {
            true => state.pose.th_deg,
            false => pose.th_deg,
        };
        state.relocalise(EnginePose { th_deg, ..pose });
    }

    fn set_map(&mut self, map_file: &str) -> bool {
        match Path::new(map_file).is_file() {
            true => {
                info!(target: "engine", "Loaded map {}", map_file);
                true
            }
            false => {
                warn!(target: "engine", "Map file {} does not exist", map_file);
                false
            }
        }
    }

    fn set_callbacks(&mut self, callbacks: EngineCallbacks) {
        *lock(&self.callbacks) = callbacks;
    }

    fn add_cycle_task(&mut self, name: &str, task: CycleTask) {
        debug!(target: "engine", "Adding cycle task {}", name);
        lock(&self.tasks).push((String::from(name), task));
    }
}

impl SimState {
    fn new(params: SimParams) -> Self {
        Self {
            pose: params.home,
            mode: SimMode::Idle,
            motors_enabled: false,
            motors_demand: None,
            estop: params.estop_pressed,
            vel_mms: 0.0,
            lat_vel_mms: 0.0,
            rot_vel_degs: 0.0,
            path_state: PATH_STATE_IDLE,
            dock_state: DOCK_STATE_UNDOCKED,
            server_status: String::from("Idle"),
            loc_valid: true,
            last_loc: Instant::now(),
            charge_percent: 100.0,
            events: Vec::new(),
            params,
        }
    }

    /// Advance the simulation by `dt` seconds.
    fn step(&mut self, dt: f64) {
        if let Some(d) = self.motors_demand {
            let remaining_s = d.remaining_s - dt;
            if remaining_s <= 0.0 {
                self.motors_demand = None;
                self.motors_enabled = d.enabled && !self.estop;
                info!(target: "engine", "Motors enabled: {}", self.motors_enabled);
            } else {
                self.motors_demand = Some(MotorsDemand {
                    remaining_s,
                    ..d
                });
            }
        }

        if self.estop && self.motors_enabled {
            warn!(target: "engine", "E-stop pressed, motors disabled");
            self.motors_enabled = false;
        }

        self.charge_percent = clamp(
            match self.mode {
                SimMode::Docked => self.charge_percent + self.params.battery_charge_pct_s * dt,
                _ => self.charge_percent - self.params.battery_drain_pct_s * dt,
            },
            0.0,
            100.0,
        );

        if !self.motors_enabled {
            return;
        }

        match self.mode {
            SimMode::Goto {
                target,
                use_heading,
            } => self.step_goto(target, use_heading, dt),
            SimMode::Wander => {
                let speed = 0.5 * self.params.max_speed_mms;
                let rate = 0.1 * self.params.max_rate_degs;
                self.drive(speed, 0.0, rate, dt);
            }
            SimMode::Docking => {
                let dock = self.params.dock;
                if self.move_towards(&dock, true, dt) {
                    self.mode = SimMode::Docked;
                    self.dock_state = DOCK_STATE_DOCKED;
                    self.server_status = String::from("Docked");
                }
            }
            SimMode::Undocking { remaining_s } => {
                let speed = -0.2 * self.params.max_speed_mms;
                self.drive(speed, 0.0, 0.0, dt);
                let remaining_s = remaining_s - dt;
                if remaining_s <= 0.0 {
                    self.mode = SimMode::Idle;
                    self.dock_state = DOCK_STATE_UNDOCKED;
                    self.server_status = String::from("Undocked");
                } else {
                    self.mode = SimMode::Undocking { remaining_s };
                }
            }
            SimMode::Drive => {
                let (v, l, r) = (self.vel_mms, self.lat_vel_mms, self.rot_vel_degs);
                self.drive(v, l, r, dt);
            }
            SimMode::Idle | SimMode::Stopped | SimMode::Docked => (),
        }
    }

    fn step_goto(&mut self, target: EnginePose, use_heading: bool, dt: f64) {
        if target.x_mm.hypot(target.y_mm) > self.params.max_goal_range_mm {
            warn!(target: "engine", "Cannot plan a path to the goal");
            self.mode = SimMode::Idle;
            self.server_status = String::from("Failed to get to goal");
            self.events.push(SimEvent::Failed(target));
            self.set_path_state(PATH_STATE_FAILED);
            return;
        }

        self.set_path_state(PATH_STATE_MOVING);

        if self.move_towards(&target, use_heading, dt) {
            self.mode = SimMode::Idle;
            self.server_status = String::from("Arrived at goal");
            self.events.push(SimEvent::Reached(target));
            self.set_path_state(PATH_STATE_REACHED);
        }
    }

    /// Move towards the target pose, returning true once it has been reached.
    fn move_towards(&mut self, target: &EnginePose, use_heading: bool, dt: f64) -> bool {
        let dx = target.x_mm - self.pose.x_mm;
        let dy = target.y_mm - self.pose.y_mm;
        let dist = dx.hypot(dy);

        if dist > self.params.goal_tolerance_mm {
            let step = (self.params.max_speed_mms * dt).min(dist);
            let heading = dy.atan2(dx);
            self.pose.x_mm += step * heading.cos();
            self.pose.y_mm += step * heading.sin();
            self.pose.th_deg = heading.to_degrees();
            self.last_loc = Instant::now();
            return false;
        }

        if use_heading {
            let err = wrap_180(target.th_deg - self.pose.th_deg);
            if err.abs() > self.params.heading_tolerance_deg {
                let step = (self.params.max_rate_degs * dt).min(err.abs());
                self.pose.th_deg = wrap_180(self.pose.th_deg + step.copysign(err));
                self.last_loc = Instant::now();
                return false;
            }
        }

        true
    }

    fn drive(&mut self, vel_mms: f64, lat_vel_mms: f64, rate_degs: f64, dt: f64) {
        let th = self.pose.th_deg.to_radians();
        self.pose.x_mm += (vel_mms * th.cos() - lat_vel_mms * th.sin()) * dt;
        self.pose.y_mm += (vel_mms * th.sin() + lat_vel_mms * th.cos()) * dt;
        self.pose.th_deg = wrap_180(self.pose.th_deg + rate_degs * dt);

        if vel_mms != 0.0 || lat_vel_mms != 0.0 || rate_degs != 0.0 {
            self.last_loc = Instant::now();
        }
    }

    fn begin_goto(&mut self, target: EnginePose, use_heading: bool) {
        self.enter_mode(SimMode::Goto {
            target,
            use_heading,
        });
        self.server_status = String::from("Going to goal");
        self.events.push(SimEvent::NewGoal(target));
        self.set_path_state(PATH_STATE_PLANNING);
    }

    /// Switch mode, interrupting any goal in progress and zeroing velocity demands.
    fn enter_mode(&mut self, mode: SimMode) {
        if let SimMode::Goto { target, .. } = self.mode {
            self.events.push(SimEvent::Interrupted(target));
        }

        if self.mode == SimMode::Docked {
            self.dock_state = DOCK_STATE_UNDOCKED;
        }

        self.vel_mms = 0.0;
        self.lat_vel_mms = 0.0;
        self.rot_vel_degs = 0.0;
        self.server_status = String::from(match mode {
            SimMode::Idle => "Idle",
            SimMode::Stopped => "Stopped",
            SimMode::Goto { .. } => "Going to goal",
            SimMode::Wander => "Wandering",
            SimMode::Docking => "Docking",
            SimMode::Docked => "Docked",
            SimMode::Undocking { .. } => "Undocking",
            SimMode::Drive => "Driving",
        });
        self.mode = mode;
    }

    fn set_path_state(&mut self, path_state: &'static str) {
        if self.path_state != path_state {
            self.path_state = path_state;
            self.events.push(SimEvent::PathState(path_state));
        }
    }

    fn demand_motors(&mut self, enabled: bool) {
        if enabled && self.estop {
            warn!(target: "engine", "Cannot enable motors while the e-stop is pressed");
            return;
        }

        self.motors_demand = Some(MotorsDemand {
            enabled,
            remaining_s: self.params.motor_switch_delay_s,
        });
    }

    fn relocalise(&mut self, pose: EnginePose) {
        info!(
            target: "engine",
            "Localised at {:.0} mm, {:.0} mm, {:.0} deg",
            pose.x_mm,
            pose.y_mm,
            pose.th_deg
        );
        self.pose = pose;
        self.loc_valid = true;
        self.last_loc = Instant::now();
    }

    fn mode_name(&self) -> &'static str {
        match self.mode {
            SimMode::Idle => "Idle",
            SimMode::Stopped => "Stop",
            SimMode::Goto { .. } => "Goto goal",
            SimMode::Wander => "Wander",
            SimMode::Docking | SimMode::Docked | SimMode::Undocking { .. } => "Dock",
            SimMode::Drive => "Drive",
        }
    }
}

impl CycleState for SimState {
    fn pose(&self) -> EnginePose {
        self.pose
    }

    fn loc_mean_var(&self) -> Option<LocVariance> {
        if !self.loc_valid {
            return None;
        }

        Some(LocVariance {
            mean: self.pose,
            var: Matrix3::new(100.0, 0.0, 0.0, 0.0, 100.0, 0.0, 0.0, 0.0, 1.0),
        })
    }

    fn ms_since_last_loc(&self) -> i64 {
        self.last_loc.elapsed().as_millis() as i64
    }

    fn motors_enabled(&self) -> bool {
        self.motors_enabled
    }

    fn dock_state(&self) -> String {
        String::from(self.dock_state)
    }

    fn server_mode(&self) -> Option<String> {
        Some(String::from(self.mode_name()))
    }

    fn server_status(&self) -> Option<String> {
        Some(self.server_status.clone())
    }

    fn state_of_charge(&self) -> f64 {
        self.charge_percent
    }

    fn charge_state(&self) -> i32 {
        match self.mode {
            SimMode::Docked => CHARGE_STATE_CHARGING,
            _ => CHARGE_STATE_NOT_CHARGING,
        }
    }
}

impl WheelLights for SimWheelLights {
    fn set_default_mode(&mut self, enabled: bool) {
        debug!(target: "engine", "Wheel light default mode: {}", enabled);
        self.default_mode = enabled;
    }

    fn send(&mut self, packet: &WheelLightPacket) {
        debug!(target: "engine", "Wheel light packet: {:?}", packet);
        self.last_packet = Some(*packet);
    }
}

impl Speech for SimSpeech {
    fn speak(&mut self, text: &str) {
        info!(target: "engine", "Speaking \"{}\"", text);
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Engine thread main loop.
fn run(
    state: Arc<Mutex<SimState>>,
    callbacks: Arc<Mutex<EngineCallbacks>>,
    tasks: Arc<Mutex<Vec<(String, CycleTask)>>>,
    running: Arc<AtomicBool>,
    period: Duration,
) {
    while running.load(Ordering::SeqCst) {
        let cycle_start = Instant::now();

        let events = {
            let mut state = lock(&state);
            state.step(period.as_secs_f64());
            std::mem::take(&mut state.events)
        };

        {
            let callbacks = lock(&callbacks);
            for event in events {
                match event {
                    SimEvent::NewGoal(p) => callbacks.fire_new_goal(p),
                    SimEvent::Reached(p) => callbacks.fire_goal_reached(p),
                    SimEvent::Failed(p) => callbacks.fire_goal_failed(p),
                    SimEvent::Interrupted(p) => callbacks.fire_goal_interrupted(p),
                    SimEvent::PathState(s) => callbacks.fire_path_state_changed(s),
                }
            }
        }

        {
            let state = lock(&state);
            let cycle_state: &dyn CycleState = &*state;
            for (_, task) in lock(&tasks).iter_mut() {
                task(cycle_state);
            }
        }

        if let Some(d) = period.checked_sub(cycle_start.elapsed()) {
            thread::sleep(d);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn state() -> SimState {
        let mut s = SimState::new(SimParams::default());
        s.motors_enabled = true;
        s
    }

    #[test]
    fn test_invalid_cycle_period() {
        let params = SimParams {
            cycle_period_s: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            SimEngine::connect(params),
            Err(EngineSetupError::InvalidCyclePeriod(_))
        ));
    }

    #[test]
    fn test_goto_reaches_goal() {
        let mut s = state();
        let target = EnginePose::new(200.0, 0.0, std::f64::NAN);
        s.begin_goto(target, false);

        for _ in 0..20 {
            s.step(0.1);
        }

        assert_eq!(s.mode, SimMode::Idle);
        assert!((s.pose.x_mm - 200.0).abs() <= s.params.goal_tolerance_mm);
        assert!(s
            .events
            .iter()
            .any(|e| matches!(e, SimEvent::Reached(p) if p.same_goal(&target))));
        assert_eq!(s.path_state, PATH_STATE_REACHED);
    }

    #[test]
    fn test_unreachable_goal_fails() {
        let mut s = state();
        s.begin_goto(EnginePose::new(1e9, 0.0, 0.0), true);
        s.step(0.1);

        assert!(s.events.iter().any(|e| matches!(e, SimEvent::Failed(_))));
        assert_eq!(s.path_state, PATH_STATE_FAILED);
    }

    #[test]
    fn test_replacing_goal_interrupts() {
        let mut s = state();
        let a = EnginePose::new(1000.0, 0.0, 0.0);
        let b = EnginePose::new(0.0, 1000.0, 0.0);
        s.begin_goto(a, true);
        s.begin_goto(b, true);

        let interrupted: Vec<_> = s
            .events
            .iter()
            .filter_map(|e| match e {
                SimEvent::Interrupted(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(interrupted.len(), 1);
        assert!(interrupted[0].same_goal(&a));
    }

    #[test]
    fn test_estop_prevents_motors() {
        let mut s = SimState::new(SimParams {
            estop_pressed: true,
            ..Default::default()
        });
        s.demand_motors(true);
        s.step(1.0);
        assert!(!s.motors_enabled);
    }

    /// Poll until the condition holds, giving up after two seconds.
    fn eventually<F: FnMut() -> bool>(mut f: F) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(2) {
            if f() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn fast_params() -> SimParams {
        SimParams {
            cycle_period_s: 0.01,
            motor_switch_delay_s: 0.02,
            ..Default::default()
        }
    }

    #[test]
    fn test_estop_pressed_while_running() {
        let mut engine = SimEngine::connect(fast_params()).unwrap();

        engine.enable_motors();
        assert!(eventually(|| engine.motors_enabled()));

        engine.set_estop(true);
        assert!(engine.is_estop_pressed());
        assert!(eventually(|| !engine.motors_enabled()));

        // Cannot be re-enabled until the e-stop is released
        engine.enable_motors();
        thread::sleep(Duration::from_millis(100));
        assert!(!engine.motors_enabled());

        engine.set_estop(false);
        engine.enable_motors();
        assert!(eventually(|| engine.motors_enabled()));
    }

    #[test]
    fn test_speech_capability() {
        let mut engine = SimEngine::connect(fast_params()).unwrap();
        assert!(engine.speech().is_none());

        let mut engine = SimEngine::connect(SimParams {
            has_speech: true,
            ..fast_params()
        })
        .unwrap();
        match engine.speech() {
            Some(s) => s.speak("Hello"),
            None => panic!("Expected a speech synthesiser"),
        }
    }

    #[test]
    fn test_dock_and_charge() {
        let mut s = state();
        s.enter_mode(SimMode::Docking);
        for _ in 0..100 {
            s.step(0.1);
        }
        assert_eq!(s.mode, SimMode::Docked);
        assert_eq!(s.dock_state(), DOCK_STATE_DOCKED);
        assert_eq!(s.charge_state(), CHARGE_STATE_CHARGING);
    }
}
