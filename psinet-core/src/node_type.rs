//! # Node Types and Node Functions
//!
//! A node type fixes which slots and gates a node has and which node
//! function computes it. Built-in types cover plain registers, concepts,
//! pipes, world sensors/actors and activators; anything else ("native
//! modules") is registered at runtime as a [`NodeFunction`] implementation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{NetError, NetResult};
use crate::node::{NodeContext, NodeOutput};

pub const REGISTER: &str = "Register";
pub const CONCEPT: &str = "Concept";
pub const PIPE: &str = "Pipe";
pub const SENSOR: &str = "Sensor";
pub const ACTOR: &str = "Actor";
pub const ACTIVATOR: &str = "Activator";

/// Slot and gate name used by every built-in type
pub const GEN: &str = "gen";

const PIPE_PORTS: [&str; 7] = ["gen", "por", "ret", "sub", "sur", "cat", "exp"];
const CONCEPT_GATES: [&str; 9] = ["gen", "por", "ret", "sub", "sur", "cat", "exp", "sym", "ref"];

/// Capability every node type provides: compute gate inputs from slot sums.
///
/// Implementations must only read from `ctx` and only write to `out`.
pub trait NodeFunction: Send + Sync {
    fn calculate(&self, ctx: &NodeContext<'_>, out: &mut NodeOutput);
}

impl<F> NodeFunction for F
where
    F: Fn(&NodeContext<'_>, &mut NodeOutput) + Send + Sync,
{
    fn calculate(&self, ctx: &NodeContext<'_>, out: &mut NodeOutput) {
        self(ctx, out)
    }
}

/// Sum of all slots drives every gate
pub struct SumAll;

impl NodeFunction for SumAll {
    fn calculate(&self, ctx: &NodeContext<'_>, out: &mut NodeOutput) {
        let activation = ctx.total_input();
        out.set_activation(activation);
        for gate in ctx.gate_types() {
            out.drive(gate, activation);
        }
    }
}

/// Each gate is driven by the slot of the same name
pub struct PortWise;

impl NodeFunction for PortWise {
    fn calculate(&self, ctx: &NodeContext<'_>, out: &mut NodeOutput) {
        out.set_activation(ctx.slot(GEN));
        for gate in ctx.gate_types() {
            out.drive(gate, ctx.slot(gate));
        }
    }
}

/// Reads the datasource named by the `datasource` parameter
pub struct SensorFunction;

impl NodeFunction for SensorFunction {
    fn calculate(&self, ctx: &NodeContext<'_>, out: &mut NodeOutput) {
        let value = ctx
            .parameter("datasource")
            .map(|name| ctx.datasource(name))
            .unwrap_or(0.0);
        out.set_activation(value);
        out.drive(GEN, value);
    }
}

/// Adds its gen input onto the datatarget named by the `datatarget` parameter
pub struct ActorFunction;

impl NodeFunction for ActorFunction {
    fn calculate(&self, ctx: &NodeContext<'_>, out: &mut NodeOutput) {
        let value = ctx.slot(GEN);
        if let Some(target) = ctx.parameter("datatarget") {
            out.write_datatarget(target, value);
        }
        out.set_activation(value);
        out.drive(GEN, value);
    }
}

/// Sets the activator named by the `type` parameter in its own nodespace
pub struct ActivatorFunction;

impl NodeFunction for ActivatorFunction {
    fn calculate(&self, ctx: &NodeContext<'_>, out: &mut NodeOutput) {
        let value = ctx.slot(GEN);
        out.set_activation(value);
        if let Some(gate_type) = ctx.parameter("type") {
            out.set_activator(gate_type, value);
        }
    }
}

/// Definition of a node type
#[derive(Clone)]
pub struct NodeType {
    pub name: String,

    /// Slot names, sorted
    pub slot_types: Vec<String>,

    /// Gate names, sorted
    pub gate_types: Vec<String>,

    /// Run the node function every step, stimulated or not
    pub always_active: bool,

    pub function: Arc<dyn NodeFunction>,
}

impl NodeType {
    pub fn new<S: AsRef<str>, G: AsRef<str>>(
        name: impl Into<String>,
        slot_types: &[S],
        gate_types: &[G],
        function: impl NodeFunction + 'static,
    ) -> Self {
        let mut slot_types: Vec<String> = slot_types.iter().map(|s| s.as_ref().to_string()).collect();
        let mut gate_types: Vec<String> = gate_types.iter().map(|g| g.as_ref().to_string()).collect();
        slot_types.sort();
        slot_types.dedup();
        gate_types.sort();
        gate_types.dedup();

        Self {
            name: name.into(),
            slot_types,
            gate_types,
            always_active: false,
            function: Arc::new(function),
        }
    }

    pub fn always_active(mut self, always_active: bool) -> Self {
        self.always_active = always_active;
        self
    }

    pub fn has_slot(&self, slot_type: &str) -> bool {
        self.slot_types.iter().any(|s| s == slot_type)
    }

    pub fn has_gate(&self, gate_type: &str) -> bool {
        self.gate_types.iter().any(|g| g == gate_type)
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeType")
            .field("name", &self.name)
            .field("slot_types", &self.slot_types)
            .field("gate_types", &self.gate_types)
            .field("always_active", &self.always_active)
            .finish()
    }
}

/// Node types known to a net
#[derive(Clone, Debug)]
pub struct NodeTypeRegistry {
    types: BTreeMap<String, NodeType>,
}

impl NodeTypeRegistry {
    /// Registry without any types
    pub fn empty() -> Self {
        Self {
            types: BTreeMap::new(),
        }
    }

    /// Registry with the built-in types
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        let builtins = [
            NodeType::new(REGISTER, &[GEN], &[GEN], SumAll),
            NodeType::new(CONCEPT, &[GEN], &CONCEPT_GATES, SumAll),
            NodeType::new(PIPE, &PIPE_PORTS, &PIPE_PORTS, PortWise),
            NodeType::new(SENSOR, &[] as &[&str], &[GEN], SensorFunction).always_active(true),
            NodeType::new(ACTOR, &[GEN], &[GEN], ActorFunction),
            NodeType::new(ACTIVATOR, &[GEN], &[] as &[&str], ActivatorFunction).always_active(true),
        ];
        for node_type in builtins {
            registry.types.insert(node_type.name.clone(), node_type);
        }
        registry
    }

    pub fn register(&mut self, node_type: NodeType) -> NetResult<()> {
        if self.types.contains_key(&node_type.name) {
            return Err(NetError::DuplicateNodeType(node_type.name));
        }
        tracing::debug!(
            "Registered node type {} ({} slots, {} gates)",
            node_type.name,
            node_type.slot_types.len(),
            node_type.gate_types.len()
        );
        self.types.insert(node_type.name.clone(), node_type);
        Ok(())
    }

    pub fn get(&self, name: &str) -> NetResult<&NodeType> {
        self.types
            .get(name)
            .ok_or_else(|| NetError::UnknownNodeType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_present() {
        let registry = NodeTypeRegistry::with_builtins();
        for name in [REGISTER, CONCEPT, PIPE, SENSOR, ACTOR, ACTIVATOR] {
            assert!(registry.contains(name), "missing {}", name);
        }
        assert!(matches!(
            registry.get("Script"),
            Err(NetError::UnknownNodeType(_))
        ));
    }

    #[test]
    fn test_ports_sorted() {
        let registry = NodeTypeRegistry::with_builtins();
        let pipe = registry.get(PIPE).unwrap();
        let mut expected: Vec<String> = PIPE_PORTS.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(pipe.gate_types, expected);
        assert!(pipe.has_slot("sur"));
        assert!(!pipe.has_gate("sym"));
    }

    #[test]
    fn test_register_closure_type() {
        let mut registry = NodeTypeRegistry::with_builtins();
        let doubler = NodeType::new(
            "Doubler",
            &["in"],
            &["out"],
            |ctx: &NodeContext<'_>, out: &mut NodeOutput| out.drive("out", ctx.slot("in") * 2.0),
        );
        registry.register(doubler.clone()).unwrap();
        assert!(matches!(
            registry.register(doubler),
            Err(NetError::DuplicateNodeType(_))
        ));
    }
}
