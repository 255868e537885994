use parking_lot::RwLock;
use std::{sync::Arc, time::Instant};

use roboseed_kinematics::{FieldPose, Vec2, WheelPowers};

/// Ground truth of the simulated chassis plus the last motor command.
#[derive(Clone, Debug)]
pub struct State {
    pub pose: FieldPose,
    /// Field-frame velocity, units/s.
    pub velocity: Vec2,
    /// Counter-clockwise yaw rate, rad/s.
    pub yaw_rate: f64,
    pub wheels: WheelPowers,
    pub last_cmd_ts: Instant,
    pub estop: bool,
    pub faults: Vec<String>,
}

impl Default for State {
    fn default() -> Self {
        State {
            pose: FieldPose::default(),
            velocity: Vec2::ZERO,
            yaw_rate: 0.0,
            wheels: WheelPowers::default(),
            last_cmd_ts: Instant::now(),
            estop: false,
            faults: Vec::new(),
        }
    }
}

impl State {
    pub fn at(pose: FieldPose) -> Self {
        State {
            pose,
            ..Default::default()
        }
    }
}

pub type Blackboard = Arc<RwLock<State>>;

pub fn snapshot(bb: &Blackboard) -> State {
    (*bb.read()).clone()
}

/// Stores a wheel command. Ignored once the e-stop has latched.
pub fn command(bb: &Blackboard, wheels: WheelPowers) -> bool {
    let mut g = bb.write();
    if g.estop {
        return false;
    }
    g.wheels = wheels;
    g.last_cmd_ts = Instant::now();
    true
}

/// Latches the e-stop and cuts all wheel power.
pub fn trigger_estop(bb: &Blackboard) {
    let mut g = bb.write();
    g.estop = true;
    g.wheels = WheelPowers::default();
}

pub fn raise_fault(bb: &Blackboard, msg: &str) {
    let mut g = bb.write();
    if !g.faults.iter().any(|s| s == msg) {
        g.faults.push(msg.to_string());
    }
}
