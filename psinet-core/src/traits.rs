//! # Traits - Seams Between the Net and Its Collaborators
//!
//! - `StepEngine`: how the two phases of a step are computed (scalar loop,
//!   batched/parallel evaluation, ...)
//! - `WorldAdapter`: the environment feeding datasources and consuming
//!   datatargets
//!
//! Engines never mutate the net. They read a [`NetView`] of committed state
//! and return what should change; the net applies it. Calculate is only
//! started once the whole Propagate result has been committed, so no engine
//! can observe a half-propagated step no matter how it batches its work.

use std::collections::BTreeMap;

use crate::error::{NetError, NetResult};
use crate::id::{LinkId, NodeId, NodespaceId};
use crate::link::Link;
use crate::node::{Node, NodeContext, NodeOutput};
use crate::node_type::NodeTypeRegistry;
use crate::nodespace::Nodespace;

/// Read-only view of the committed net state handed to engines
#[derive(Clone, Copy)]
pub struct NetView<'a> {
    pub nodes: &'a BTreeMap<NodeId, Node>,
    pub links: &'a BTreeMap<LinkId, Link>,
    pub nodespaces: &'a BTreeMap<NodespaceId, Nodespace>,
    pub registry: &'a NodeTypeRegistry,
    pub datasources: &'a BTreeMap<String, f64>,

    /// Step being computed
    pub step: u64,

    /// Bumped on every change to nodes, links, link endpoints or weights.
    /// Engines that cache link layout rebuild when it moves.
    pub topology: u64,
}

/// One link's contribution for the current step
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlotWrite {
    pub node: NodeId,
    pub slot: usize,
    pub link: LinkId,
    pub value: f64,
}

/// Result of running one node's node function
#[derive(Clone, Debug, PartialEq)]
pub struct NodeUpdate {
    pub node: NodeId,

    /// Reported node activation
    pub activation: f64,

    /// (gate index, new activation) for every driven gate
    pub gates: Vec<(usize, f64)>,

    /// Values added onto datatargets
    pub datatargets: Vec<(String, f64)>,

    /// Activator writes for the node's nodespace, applied after the phase
    pub activators: Vec<(String, f64)>,
}

impl<'a> NetView<'a> {
    pub fn node(&self, id: NodeId) -> NetResult<&'a Node> {
        self.nodes.get(&id).ok_or(NetError::UnknownNode(id))
    }

    /// Contribution of a single link, read from its source gate
    pub fn propagate_link(&self, link: &Link) -> NetResult<SlotWrite> {
        let source = self.nodes.get(&link.source_node).ok_or_else(|| {
            NetError::inconsistent(format!(
                "link {} leaves missing node {}",
                link.id, link.source_node
            ))
        })?;
        let gate = source.gate(&link.source_gate).ok_or_else(|| {
            NetError::inconsistent(format!(
                "link {} leaves missing gate {}.{}",
                link.id, link.source_node, link.source_gate
            ))
        })?;
        let target = self.nodes.get(&link.target_node).ok_or_else(|| {
            NetError::inconsistent(format!(
                "link {} enters missing node {}",
                link.id, link.target_node
            ))
        })?;
        let slot = target.slot_index(&link.target_slot).ok_or_else(|| {
            NetError::inconsistent(format!(
                "link {} enters missing slot {}.{}",
                link.id, link.target_node, link.target_slot
            ))
        })?;

        Ok(SlotWrite {
            node: link.target_node,
            slot,
            link: link.id,
            value: link.contribution(gate.activation),
        })
    }

    /// Run a node's node function and its gate functions.
    ///
    /// Reads only this node's slots and gates plus its nodespace's
    /// activators, so nodes can be evaluated in any order or in parallel.
    pub fn evaluate_node(&self, id: NodeId) -> NetResult<NodeUpdate> {
        let node = self.node(id)?;
        let node_type = self.registry.get(&node.node_type)?;
        let nodespace = self.nodespaces.get(&node.nodespace).ok_or_else(|| {
            NetError::inconsistent(format!(
                "node {} sits in missing nodespace {}",
                id, node.nodespace
            ))
        })?;

        let ctx = NodeContext::new(node, self.datasources, self.step);
        let mut out = NodeOutput::new();
        node_type.function.calculate(&ctx, &mut out);

        let mut gates = Vec::with_capacity(out.gate_inputs.len());
        for (gate_type, input) in &out.gate_inputs {
            let index = node
                .gate_index(gate_type)
                .ok_or_else(|| NetError::UnknownGateType {
                    node_type: node.node_type.clone(),
                    gate_type: gate_type.clone(),
                })?;
            let gate = &node.gates[index];
            let activation = gate.compute(*input, nodespace.activator(gate_type));
            tracing::trace!("{}.{} <- {} => {}", id, gate_type, input, activation);
            gates.push((index, activation));
        }

        Ok(NodeUpdate {
            node: id,
            activation: sanitize(out.activation, "node activation"),
            gates,
            datatargets: out
                .datatargets
                .into_iter()
                .map(|(name, v)| (name, sanitize(v, "datatarget")))
                .collect(),
            activators: out
                .activators
                .into_iter()
                .map(|(gate_type, v)| (gate_type, sanitize(v, "activator")))
                .collect(),
        })
    }
}

/// Replace a non-finite value coming out of a node function with 0
pub(crate) fn sanitize(value: f64, what: &str) -> f64 {
    if value.is_finite() {
        value
    } else {
        tracing::warn!("Non-finite {} ({}) replaced by 0", what, value);
        0.0
    }
}

/// Execution strategy for the two phases of a step
///
/// Implementations must give the same numbers as the scalar reference
/// engine and must only evaluate the nodes in the schedule.
pub trait StepEngine: Send + Sync {
    /// Compute every link's contribution from the current gate activations
    fn propagate(&mut self, view: &NetView<'_>) -> NetResult<Vec<SlotWrite>>;

    /// Evaluate the scheduled nodes against the settled slots
    fn calculate(&mut self, view: &NetView<'_>, schedule: &[NodeId]) -> NetResult<Vec<NodeUpdate>>;

    /// Statistics of the last step
    fn stats(&self) -> EngineStats;

    /// Name of this engine (for logging)
    fn name(&self) -> &'static str;
}

/// Statistics from the step engine
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineStats {
    /// Links that delivered a contribution
    pub links_propagated: u64,

    /// Nodes whose node function ran
    pub nodes_calculated: u64,

    /// Nodes left untouched by the active set
    pub nodes_skipped: u64,

    /// Time spent in both phases (microseconds)
    pub compute_time_us: u64,
}

/// Environment of a net
///
/// The net only ever sees named numbers: datasources before a step,
/// datatargets after it.
pub trait WorldAdapter: Send {
    /// Current datasource values
    fn read_datasources(&mut self) -> Vec<(String, f64)>;

    /// Datatarget values produced by the last step
    fn write_datatargets(&mut self, values: &BTreeMap<String, f64>);

    /// Name of this world (for logging)
    fn name(&self) -> &str;
}
