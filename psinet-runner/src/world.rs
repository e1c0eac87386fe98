//! Demo world and the net wired to it.
//!
//! A light level drifts along a sine wave with some noise. The net senses
//! it, keeps a leaky memory of it, and drives a motor.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use psinet_core::node_type::{ACTOR, CONCEPT, REGISTER, SENSOR};
use psinet_core::{NetResult, NodeId, Nodenet, WorldAdapter};

pub const LIGHT: &str = "light";
pub const MOTOR: &str = "motor";

pub struct DemoWorld {
    rng: StdRng,
    tick: u64,
    light: f64,
    motor: f64,
}

impl DemoWorld {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            tick: 0,
            light: 0.0,
            motor: 0.0,
        }
    }

    pub fn light(&self) -> f64 {
        self.light
    }

    /// Last value the net wrote to the motor
    pub fn motor(&self) -> f64 {
        self.motor
    }
}

impl WorldAdapter for DemoWorld {
    fn read_datasources(&mut self) -> Vec<(String, f64)> {
        let wave = 0.5 + 0.5 * (self.tick as f64 * 0.3).sin();
        let noise = self.rng.gen_range(-0.05..0.05);
        self.light = (wave + noise).clamp(0.0, 1.0);
        self.tick += 1;
        vec![(LIGHT.to_string(), self.light)]
    }

    fn write_datatargets(&mut self, values: &BTreeMap<String, f64>) {
        self.motor = values.get(MOTOR).copied().unwrap_or(0.0);
    }

    fn name(&self) -> &str {
        "demo"
    }
}

/// Handles of the demo net's interesting nodes
#[derive(Clone, Copy, Debug)]
pub struct DemoNodes {
    pub sensor: NodeId,
    pub concept: NodeId,
    pub memory: NodeId,
    pub actor: NodeId,
}

/// sensor -> concept -> actor, with the concept also charging a leaky memory
pub fn build_demo_net(net: &mut Nodenet) -> NetResult<DemoNodes> {
    let root = net.root();
    let senses = net.create_nodespace(root, Some("senses"))?;

    let sensor = net.create_node(SENSOR, senses, Some("eye"))?;
    net.set_node_parameter(sensor, "datasource", LIGHT)?;

    let concept = net.create_node(CONCEPT, root, Some("bright"))?;
    let memory = net.create_node(REGISTER, root, Some("afterglow"))?;
    let actor = net.create_node(ACTOR, root, Some("wheel"))?;
    net.set_node_parameter(actor, "datatarget", MOTOR)?;

    net.create_link(sensor, "gen", concept, "gen", 1.0)?;
    net.create_link(concept, "gen", actor, "gen", 0.8)?;
    net.create_link(concept, "gen", memory, "gen", 0.5)?;
    net.create_link(memory, "gen", memory, "gen", 0.5)?;
    net.set_gate_parameter(memory, "gen", "decay", 0.1)?;

    Ok(DemoNodes {
        sensor,
        concept,
        memory,
        actor,
    })
}
