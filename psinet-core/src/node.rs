//! # Node - Slots In, Gates Out
//!
//! A node owns a fixed set of slots and gates chosen by its node type. Each
//! step its node function reads the settled slot sums through a
//! [`NodeContext`] and hands gate inputs back through a [`NodeOutput`]. The
//! node function never sees another node, and the net applies its output
//! only after every scheduled node has been evaluated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::gate::Gate;
use crate::id::{LinkId, NodeId, NodespaceId, Position};
use crate::slot::Slot;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,

    /// Registered node type name
    pub node_type: String,

    pub name: String,

    pub position: Position,

    /// Parent nodespace
    pub nodespace: NodespaceId,

    /// Last activation reported by the node function. Informational only;
    /// the gates hold the state that propagates.
    pub activation: f64,

    /// Slots, sorted by type name
    pub slots: Vec<Slot>,

    /// Gates, sorted by type name
    pub gates: Vec<Gate>,

    /// Free-form parameters read by node functions (e.g. `datasource`)
    pub parameters: BTreeMap<String, String>,
}

impl Node {
    pub fn slot_index(&self, slot_type: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.slot_type == slot_type)
    }

    pub fn gate_index(&self, gate_type: &str) -> Option<usize> {
        self.gates.iter().position(|g| g.gate_type == gate_type)
    }

    pub fn slot(&self, slot_type: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.slot_type == slot_type)
    }

    pub fn gate(&self, gate_type: &str) -> Option<&Gate> {
        self.gates.iter().find(|g| g.gate_type == gate_type)
    }

    pub(crate) fn slot_mut(&mut self, slot_type: &str) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|s| s.slot_type == slot_type)
    }

    pub(crate) fn gate_mut(&mut self, gate_type: &str) -> Option<&mut Gate> {
        self.gates.iter_mut().find(|g| g.gate_type == gate_type)
    }

    /// Every link touching this node, outgoing first. A self-loop shows up twice.
    pub fn link_ids(&self) -> impl Iterator<Item = LinkId> + '_ {
        let outgoing = self.gates.iter().flat_map(|g| g.outgoing.iter().copied());
        let incoming = self.slots.iter().flat_map(|s| s.incoming.keys().copied());
        outgoing.chain(incoming)
    }

    /// Any slot got a nonzero contribution in the last Propagate
    pub fn is_stimulated(&self) -> bool {
        self.slots.iter().any(Slot::is_stimulated)
    }

    /// Any gate still holds nonzero activation
    pub fn has_active_gate(&self) -> bool {
        self.gates.iter().any(|g| g.activation != 0.0)
    }

    /// Activation of a gate, 0 for gates this node does not have
    pub fn gate_activation(&self, gate_type: &str) -> f64 {
        self.gate(gate_type).map(|g| g.activation).unwrap_or(0.0)
    }
}

/// Read-only view handed to a node function
pub struct NodeContext<'a> {
    node: &'a Node,
    datasources: &'a BTreeMap<String, f64>,
    step: u64,
}

impl<'a> NodeContext<'a> {
    pub fn new(node: &'a Node, datasources: &'a BTreeMap<String, f64>, step: u64) -> Self {
        Self {
            node,
            datasources,
            step,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node.id
    }

    pub fn nodespace(&self) -> NodespaceId {
        self.node.nodespace
    }

    /// Step being calculated
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Summed input of a slot; 0 for slots this node does not have
    pub fn slot(&self, slot_type: &str) -> f64 {
        self.node.slot(slot_type).map(Slot::activation).unwrap_or(0.0)
    }

    /// Slot sums in slot order
    pub fn slot_sums(&self) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        self.node
            .slots
            .iter()
            .map(|s| (s.slot_type.as_str(), s.activation()))
    }

    /// Sum over every slot and every incoming link
    pub fn total_input(&self) -> f64 {
        let sum: f64 = self.node.slots.iter().map(Slot::activation).sum();
        if sum.is_finite() {
            sum
        } else {
            0.0
        }
    }

    pub fn gate_types(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.node.gates.iter().map(|g| g.gate_type.as_str())
    }

    /// Activation a gate ended the previous step with
    pub fn gate_activation(&self, gate_type: &str) -> f64 {
        self.node.gate_activation(gate_type)
    }

    pub fn parameter(&self, name: &str) -> Option<&'a str> {
        self.node.parameters.get(name).map(String::as_str)
    }

    /// Externally injected value; 0 if the world never provided it
    pub fn datasource(&self, name: &str) -> f64 {
        self.datasources.get(name).copied().unwrap_or(0.0)
    }
}

/// What a node function asks the net to do
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeOutput {
    /// Reported node activation
    pub activation: f64,

    /// Inputs for gate functions, by gate type
    pub gate_inputs: Vec<(String, f64)>,

    /// Values to add onto named datatargets
    pub datatargets: Vec<(String, f64)>,

    /// Activator values for the node's own nodespace, by gate type
    pub activators: Vec<(String, f64)>,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_activation(&mut self, activation: f64) {
        self.activation = activation;
    }

    /// Run the gate function of `gate_type` with `input`
    pub fn drive(&mut self, gate_type: impl Into<String>, input: f64) {
        self.gate_inputs.push((gate_type.into(), input));
    }

    pub fn write_datatarget(&mut self, name: impl Into<String>, value: f64) {
        self.datatargets.push((name.into(), value));
    }

    pub fn set_activator(&mut self, gate_type: impl Into<String>, value: f64) {
        self.activators.push((gate_type.into(), value));
    }
}
