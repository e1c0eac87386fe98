//! # Nodenet - Entities, Lifecycle and the Step Loop
//!
//! The net owns every nodespace, node and link in flat id-keyed maps. Gates
//! and slots only ever hold link ids, so there are no reference cycles and
//! deletion order is explicit.
//!
//! ## Step
//!
//! ```text
//! Idle ──► Propagating ──► Calculating ──► Idle   (step += 1)
//! ```
//!
//! - Propagating: every link writes `source gate activation × weight` into
//!   its target slot, replacing last step's value.
//! - Calculating: every admitted node (see [`crate::activity`]) runs its node
//!   function against the settled slots; the results are applied together.
//!
//! Both phases are computed by the configured [`StepEngine`] against a
//! read-only view and committed by the net afterwards.

use std::collections::{BTreeMap, BTreeSet};

use crate::activity::{self, ActivityTracker};
use crate::config::NetConfig;
use crate::engine::ScalarEngine;
use crate::error::{ensure_finite, NetError, NetResult};
use crate::gate::{Gate, GateParameter};
use crate::id::{IdAllocator, LinkId, NodeId, NodespaceId, Position};
use crate::link::{validate_weight, Link};
use crate::node::Node;
use crate::node_type::{NodeType, NodeTypeRegistry};
use crate::nodespace::{Nodespace, NodespaceContents};
use crate::slot::Slot;
use crate::traits::{EngineStats, NetView, NodeUpdate, SlotWrite, StepEngine, WorldAdapter};

/// Slots overwritten by a Propagate commit, keyed by (node, slot index)
type SlotUndo = BTreeMap<(NodeId, usize), Slot>;

/// A node net and its step scheduler
pub struct Nodenet {
    name: String,

    /// Completed steps
    step: u64,

    /// Bumped on every structural change
    topology: u64,

    ids: IdAllocator,

    root: NodespaceId,

    nodespaces: BTreeMap<NodespaceId, Nodespace>,
    nodes: BTreeMap<NodeId, Node>,
    links: BTreeMap<LinkId, Link>,

    registry: NodeTypeRegistry,

    /// Values injected by the world before a step
    datasources: BTreeMap<String, f64>,

    /// Values written by actors during the last step
    datatargets: BTreeMap<String, f64>,

    config: NetConfig,

    engine: Box<dyn StepEngine>,

    activity: ActivityTracker,
}

impl Nodenet {
    /// Net with default configuration and the scalar engine
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), NetConfig::default(), Box::new(ScalarEngine::new()))
    }

    /// Net with an explicit configuration and engine
    pub fn with_config(
        name: impl Into<String>,
        config: NetConfig,
        engine: Box<dyn StepEngine>,
    ) -> NetResult<Self> {
        config.validate()?;
        Ok(Self::build(name.into(), config, engine))
    }

    fn build(name: String, config: NetConfig, engine: Box<dyn StepEngine>) -> Self {
        let mut ids = IdAllocator::new();
        let root = ids.nodespace();
        let nodespaces = BTreeMap::from([(root, Nodespace::new(root, "Root", None))]);

        tracing::info!("Nodenet '{}' created ({} engine)", name, engine.name());

        Self {
            name,
            step: 0,
            topology: 0,
            ids,
            root,
            nodespaces,
            nodes: BTreeMap::new(),
            links: BTreeMap::new(),
            registry: NodeTypeRegistry::with_builtins(),
            datasources: BTreeMap::new(),
            datatargets: BTreeMap::new(),
            config,
            engine,
            activity: ActivityTracker::new(),
        }
    }

    /// Swap the step engine. Takes effect on the next step.
    pub fn set_engine(&mut self, engine: Box<dyn StepEngine>) {
        tracing::info!("Nodenet '{}' switching to {} engine", self.name, engine.name());
        self.engine = engine;
    }

    /// Add a custom node type ("native module")
    pub fn register_node_type(&mut self, node_type: NodeType) -> NetResult<()> {
        self.registry.register(node_type)
    }

    // ------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of completed steps
    pub fn current_step(&self) -> u64 {
        self.step
    }

    pub fn root(&self) -> NodespaceId {
        self.root
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    pub fn registry(&self) -> &NodeTypeRegistry {
        &self.registry
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn engine_stats(&self) -> EngineStats {
        self.engine.stats()
    }

    pub fn activity(&self) -> &ActivityTracker {
        &self.activity
    }

    pub fn node(&self, id: NodeId) -> NetResult<&Node> {
        self.nodes.get(&id).ok_or(NetError::UnknownNode(id))
    }

    pub fn link(&self, id: LinkId) -> NetResult<&Link> {
        self.links.get(&id).ok_or(NetError::UnknownLink(id))
    }

    pub fn nodespace(&self, id: NodespaceId) -> NetResult<&Nodespace> {
        self.nodespaces.get(&id).ok_or(NetError::UnknownNodespace(id))
    }

    pub fn gate(&self, node: NodeId, gate_type: &str) -> NetResult<&Gate> {
        let n = self.node(node)?;
        n.gate(gate_type).ok_or_else(|| NetError::UnknownGateType {
            node_type: n.node_type.clone(),
            gate_type: gate_type.to_string(),
        })
    }

    pub fn slot(&self, node: NodeId, slot_type: &str) -> NetResult<&Slot> {
        let n = self.node(node)?;
        n.slot(slot_type).ok_or_else(|| NetError::UnknownSlotType {
            node_type: n.node_type.clone(),
            slot_type: slot_type.to_string(),
        })
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn nodespaces(&self) -> impl Iterator<Item = &Nodespace> {
        self.nodespaces.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Direct children of a nodespace
    pub fn nodespace_contents(&self, id: NodespaceId) -> NetResult<NodespaceContents> {
        let space = self.nodespace(id)?;
        Ok(NodespaceContents {
            nodes: space.nodes.iter().copied().collect(),
            nodespaces: space.nodespaces.iter().copied().collect(),
        })
    }

    /// Links joining exactly these endpoints
    pub fn links_between(
        &self,
        source: NodeId,
        gate: &str,
        target: NodeId,
        slot: &str,
    ) -> Vec<LinkId> {
        self.links
            .values()
            .filter(|l| l.joins(source, gate, target, slot))
            .map(|l| l.id)
            .collect()
    }

    /// Gate factor currently in force for `gate_type` in a nodespace
    pub fn activator(&self, nodespace: NodespaceId, gate_type: &str) -> NetResult<f64> {
        Ok(self.nodespace(nodespace)?.activator(gate_type))
    }

    pub fn datasource(&self, name: &str) -> f64 {
        self.datasources.get(name).copied().unwrap_or(0.0)
    }

    /// Value actors wrote during the last step; 0 if none did
    pub fn datatarget(&self, name: &str) -> f64 {
        self.datatargets.get(name).copied().unwrap_or(0.0)
    }

    pub fn datatargets(&self) -> &BTreeMap<String, f64> {
        &self.datatargets
    }

    fn view(&self) -> NetView<'_> {
        NetView {
            nodes: &self.nodes,
            links: &self.links,
            nodespaces: &self.nodespaces,
            registry: &self.registry,
            datasources: &self.datasources,
            step: self.step,
            topology: self.topology,
        }
    }

    /// View and engine borrowed side by side
    fn split(&mut self) -> (NetView<'_>, &mut (dyn StepEngine + 'static)) {
        let view = NetView {
            nodes: &self.nodes,
            links: &self.links,
            nodespaces: &self.nodespaces,
            registry: &self.registry,
            datasources: &self.datasources,
            step: self.step,
            topology: self.topology,
        };
        (view, self.engine.as_mut())
    }

    // ------------------------------------------------------------------
    // Nodespaces
    // ------------------------------------------------------------------

    pub fn create_nodespace(
        &mut self,
        parent: NodespaceId,
        name: Option<&str>,
    ) -> NetResult<NodespaceId> {
        self.nodespace(parent)?;

        let id = self.ids.nodespace();
        let name = name.map(str::to_string).unwrap_or_else(|| id.to_string());
        self.nodespaces.insert(id, Nodespace::new(id, name, Some(parent)));
        if let Some(p) = self.nodespaces.get_mut(&parent) {
            p.nodespaces.insert(id);
        }

        tracing::debug!("Created nodespace {} in {}", id, parent);
        Ok(id)
    }

    /// Delete a nodespace. Non-empty nodespaces need `cascade`, which deletes
    /// every contained node (with its links) and nodespace first.
    pub fn delete_nodespace(&mut self, id: NodespaceId, cascade: bool) -> NetResult<()> {
        let space = self.nodespace(id)?;
        let parent = space.parent.ok_or(NetError::RootNodespace(id))?;
        if !space.is_empty() && !cascade {
            return Err(NetError::NodespaceNotEmpty(id));
        }

        let children: Vec<NodespaceId> = space.nodespaces.iter().copied().collect();
        let nodes: Vec<NodeId> = space.nodes.iter().copied().collect();

        for child in children {
            self.delete_nodespace(child, true)?;
        }
        for node in nodes {
            self.delete_node(node, true)?;
        }

        if let Some(p) = self.nodespaces.get_mut(&parent) {
            p.nodespaces.remove(&id);
        }
        self.nodespaces.remove(&id);

        tracing::info!("Deleted nodespace {}", id);
        Ok(())
    }

    pub fn set_nodespace_position(&mut self, id: NodespaceId, position: Position) -> NetResult<()> {
        let space = self
            .nodespaces
            .get_mut(&id)
            .ok_or(NetError::UnknownNodespace(id))?;
        space.position = position;
        Ok(())
    }

    /// Set the gate factor for every `gate_type` gate of nodes in a nodespace.
    /// Applies from the next Calculate phase on.
    pub fn set_activator(
        &mut self,
        nodespace: NodespaceId,
        gate_type: &str,
        value: f64,
    ) -> NetResult<()> {
        let value = ensure_finite("activator", value)?;
        let space = self
            .nodespaces
            .get_mut(&nodespace)
            .ok_or(NetError::UnknownNodespace(nodespace))?;
        space.activators.insert(gate_type.to_string(), value);
        Ok(())
    }

    /// Remove an activator, reopening the gates it controlled
    pub fn clear_activator(&mut self, nodespace: NodespaceId, gate_type: &str) -> NetResult<()> {
        let space = self
            .nodespaces
            .get_mut(&nodespace)
            .ok_or(NetError::UnknownNodespace(nodespace))?;
        space.activators.remove(gate_type);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    pub fn create_node(
        &mut self,
        node_type: &str,
        nodespace: NodespaceId,
        name: Option<&str>,
    ) -> NetResult<NodeId> {
        let definition = self.registry.get(node_type)?;
        self.nodespace(nodespace)?;

        let id = self.ids.node();
        let node = Node {
            id,
            node_type: definition.name.clone(),
            name: name.map(str::to_string).unwrap_or_default(),
            position: [0.0, 0.0],
            nodespace,
            activation: 0.0,
            slots: definition.slot_types.iter().map(Slot::new).collect(),
            gates: definition
                .gate_types
                .iter()
                .map(|g| Gate::new(g, self.config.gates))
                .collect(),
            parameters: BTreeMap::new(),
        };

        self.nodes.insert(id, node);
        if let Some(space) = self.nodespaces.get_mut(&nodespace) {
            space.nodes.insert(id);
        }
        self.topology += 1;

        tracing::debug!("Created {} node {} in {}", node_type, id, nodespace);
        Ok(id)
    }

    /// Delete a node. Nodes with links need `cascade`, which unlinks first.
    pub fn delete_node(&mut self, id: NodeId, cascade: bool) -> NetResult<()> {
        let node = self.node(id)?;
        let links: BTreeSet<LinkId> = node.link_ids().collect();
        if !links.is_empty() && !cascade {
            return Err(NetError::NodeHasLinks {
                node: id,
                links: links.len(),
            });
        }

        for link in links {
            self.unlink(link)?;
        }

        if let Some(node) = self.nodes.remove(&id) {
            if let Some(space) = self.nodespaces.get_mut(&node.nodespace) {
                space.nodes.remove(&id);
            }
        }
        self.topology += 1;

        tracing::debug!("Deleted node {}", id);
        Ok(())
    }

    pub fn set_node_parameter(&mut self, id: NodeId, name: &str, value: &str) -> NetResult<()> {
        let node = self.nodes.get_mut(&id).ok_or(NetError::UnknownNode(id))?;
        node.parameters.insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn set_node_position(&mut self, id: NodeId, position: Position) -> NetResult<()> {
        let node = self.nodes.get_mut(&id).ok_or(NetError::UnknownNode(id))?;
        node.position = position;
        Ok(())
    }

    /// Set one gate function parameter
    pub fn set_gate_parameter(
        &mut self,
        node: NodeId,
        gate_type: &str,
        name: &str,
        value: f64,
    ) -> NetResult<()> {
        let param: GateParameter = name.parse()?;
        let params = self.gate(node, gate_type)?.params.with(param, value)?;

        if let Some(gate) = self.nodes.get_mut(&node).and_then(|n| n.gate_mut(gate_type)) {
            gate.params = params;
            gate.activation = gate.clamp(gate.activation);
        }
        Ok(())
    }

    /// Seed a gate's activation from outside. Clamped to the gate's range.
    pub fn set_gate_activation(&mut self, node: NodeId, gate_type: &str, value: f64) -> NetResult<()> {
        let value = ensure_finite("gate activation", value)?;
        let clamped = self.gate(node, gate_type)?.clamp(value);

        if let Some(gate) = self.nodes.get_mut(&node).and_then(|n| n.gate_mut(gate_type)) {
            gate.activation = clamped;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    /// Fail unless both endpoints exist on their nodes
    fn check_endpoints(
        &self,
        source: NodeId,
        gate: &str,
        target: NodeId,
        slot: &str,
    ) -> NetResult<()> {
        let source_node = self.node(source)?;
        let target_node = self.node(target)?;
        if source_node.gate_index(gate).is_none() {
            return Err(NetError::UnknownGateType {
                node_type: source_node.node_type.clone(),
                gate_type: gate.to_string(),
            });
        }
        if target_node.slot_index(slot).is_none() {
            return Err(NetError::UnknownSlotType {
                node_type: target_node.node_type.clone(),
                slot_type: slot.to_string(),
            });
        }
        Ok(())
    }

    /// Install a link id into its gate and slot
    fn attach(&mut self, link: &Link) -> NetResult<()> {
        let gate = self
            .nodes
            .get_mut(&link.source_node)
            .and_then(|n| n.gate_mut(&link.source_gate))
            .ok_or_else(|| NetError::inconsistent(format!("cannot attach {} to its gate", link.id)))?;
        gate.outgoing.insert(link.id);

        let slot = self
            .nodes
            .get_mut(&link.target_node)
            .and_then(|n| n.slot_mut(&link.target_slot))
            .ok_or_else(|| NetError::inconsistent(format!("cannot attach {} to its slot", link.id)))?;
        slot.attach(link.id);
        Ok(())
    }

    /// Remove a link id from its gate and slot
    fn detach(&mut self, link: &Link) -> NetResult<()> {
        let removed_out = self
            .nodes
            .get_mut(&link.source_node)
            .and_then(|n| n.gate_mut(&link.source_gate))
            .map(|g| g.outgoing.remove(&link.id))
            .unwrap_or(false);
        let removed_in = self
            .nodes
            .get_mut(&link.target_node)
            .and_then(|n| n.slot_mut(&link.target_slot))
            .map(|s| s.detach(link.id))
            .unwrap_or(false);

        if removed_out && removed_in {
            Ok(())
        } else {
            Err(NetError::inconsistent(format!(
                "link {} was not indexed by both endpoints",
                link.id
            )))
        }
    }

    /// Create a new link from a gate to a slot
    pub fn create_link(
        &mut self,
        source: NodeId,
        gate: &str,
        target: NodeId,
        slot: &str,
        weight: f64,
    ) -> NetResult<LinkId> {
        validate_weight(weight)?;
        self.check_endpoints(source, gate, target, slot)?;

        let link = Link {
            id: self.ids.link(),
            source_node: source,
            source_gate: gate.to_string(),
            target_node: target,
            target_slot: slot.to_string(),
            weight,
        };
        self.attach(&link)?;

        let id = link.id;
        self.links.insert(id, link);
        self.topology += 1;

        tracing::debug!("Linked {}.{} -> {}.{} ({}, w={})", source, gate, target, slot, id, weight);
        Ok(id)
    }

    /// Create a link, or update the weight of the one already joining these
    /// endpoints
    pub fn ensure_link(
        &mut self,
        source: NodeId,
        gate: &str,
        target: NodeId,
        slot: &str,
        weight: f64,
    ) -> NetResult<LinkId> {
        match self.links_between(source, gate, target, slot).first() {
            Some(&existing) => {
                self.set_link_weight(existing, weight)?;
                Ok(existing)
            }
            None => self.create_link(source, gate, target, slot, weight),
        }
    }

    /// Move a link to new endpoints. The old gate and slot lose the link
    /// before the new ones gain it.
    pub fn relink(
        &mut self,
        id: LinkId,
        source: NodeId,
        gate: &str,
        target: NodeId,
        slot: &str,
        weight: f64,
    ) -> NetResult<()> {
        validate_weight(weight)?;
        let old = self.link(id)?.clone();
        self.check_endpoints(source, gate, target, slot)?;

        self.detach(&old)?;
        let new = Link {
            id,
            source_node: source,
            source_gate: gate.to_string(),
            target_node: target,
            target_slot: slot.to_string(),
            weight,
        };
        self.attach(&new)?;
        self.links.insert(id, new);
        self.topology += 1;

        tracing::debug!("Relinked {} to {}.{} -> {}.{}", id, source, gate, target, slot);
        Ok(())
    }

    pub fn set_link_weight(&mut self, id: LinkId, weight: f64) -> NetResult<()> {
        validate_weight(weight)?;
        let link = self.links.get_mut(&id).ok_or(NetError::UnknownLink(id))?;
        link.weight = weight;
        self.topology += 1;
        Ok(())
    }

    /// Detach and remove a link. Returns the removed link.
    pub fn unlink(&mut self, id: LinkId) -> NetResult<Link> {
        let link = self.link(id)?.clone();
        self.detach(&link)?;
        self.links.remove(&id);
        self.topology += 1;

        tracing::debug!("Unlinked {}", id);
        Ok(link)
    }

    /// Remove every link joining these endpoints. Returns how many went.
    pub fn unlink_between(
        &mut self,
        source: NodeId,
        gate: &str,
        target: NodeId,
        slot: &str,
    ) -> NetResult<usize> {
        self.check_endpoints(source, gate, target, slot)?;
        let ids = self.links_between(source, gate, target, slot);
        for id in &ids {
            self.unlink(*id)?;
        }
        Ok(ids.len())
    }

    // ------------------------------------------------------------------
    // World boundary
    // ------------------------------------------------------------------

    /// Inject a datasource value for the next step
    pub fn set_datasource(&mut self, name: &str, value: f64) -> NetResult<()> {
        let value = ensure_finite(name, value)?;
        self.datasources.insert(name.to_string(), value);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------

    /// Advance the net by one step. Returns the new step counter.
    ///
    /// All or nothing: if any part of the step fails, the net is left exactly
    /// as it was before the call.
    pub fn step(&mut self) -> NetResult<u64> {
        let step = self.step;

        let (view, engine) = self.split();
        let writes = engine.propagate(&view)?;
        let undo = self.commit_propagation(&writes, step)?;

        let active = match self.calculate_phase() {
            Ok(active) => active,
            Err(e) => {
                tracing::warn!("Step {} failed, propagation rolled back: {}", step + 1, e);
                self.roll_back(undo);
                return Err(e);
            }
        };

        self.activity
            .update(active, (self.nodes.len() as u64).saturating_sub(active));
        self.step += 1;

        tracing::debug!(
            "Step {} done: {} links, {} of {} nodes active",
            self.step,
            writes.len(),
            active,
            self.nodes.len()
        );
        Ok(self.step)
    }

    /// Schedule, calculate and commit. Returns the number of nodes calculated.
    /// Commits nothing on error.
    fn calculate_phase(&mut self) -> NetResult<u64> {
        let schedule = activity::schedule(&self.view(), &self.config.scheduling)?;

        let (view, engine) = self.split();
        let updates = engine.calculate(&view, &schedule)?;
        self.commit_calculation(updates)?;

        Ok(schedule.len() as u64)
    }

    /// Read datasources from the world, step, and hand back the datatargets
    pub fn step_with_world(&mut self, world: &mut dyn WorldAdapter) -> NetResult<u64> {
        let values = world.read_datasources();
        for (name, value) in &values {
            ensure_finite(name, *value)?;
        }
        for (name, value) in values {
            self.datasources.insert(name, value);
        }

        let step = self.step()?;
        world.write_datatargets(&self.datatargets);
        tracing::trace!("World '{}' exchanged values at step {}", world.name(), step);
        Ok(step)
    }

    /// Apply Propagate results. Returns the slots as they were before, for
    /// rolling back a step that fails later on.
    fn commit_propagation(&mut self, writes: &[SlotWrite], step: u64) -> NetResult<SlotUndo> {
        for write in writes {
            let valid = self
                .nodes
                .get(&write.node)
                .map(|n| write.slot < n.slots.len())
                .unwrap_or(false);
            if !valid {
                return Err(NetError::inconsistent(format!(
                    "propagation wrote to missing slot {}#{}",
                    write.node, write.slot
                )));
            }
        }

        let mut undo = SlotUndo::new();
        for write in writes {
            if let Some(node) = self.nodes.get_mut(&write.node) {
                let slot = &mut node.slots[write.slot];
                if !undo.contains_key(&(write.node, write.slot)) {
                    undo.insert((write.node, write.slot), slot.clone());
                }
                slot.receive(write.link, write.value, step);
            }
        }
        Ok(undo)
    }

    fn roll_back(&mut self, undo: SlotUndo) {
        for ((node, index), slot) in undo {
            if let Some(node) = self.nodes.get_mut(&node) {
                node.slots[index] = slot;
            }
        }
    }

    fn commit_calculation(&mut self, updates: Vec<NodeUpdate>) -> NetResult<()> {
        for update in &updates {
            let node = self.node(update.node)?;
            if update.gates.iter().any(|(index, _)| *index >= node.gates.len()) {
                return Err(NetError::inconsistent(format!(
                    "calculation wrote to missing gate on {}",
                    update.node
                )));
            }
        }

        for value in self.datatargets.values_mut() {
            *value = 0.0;
        }

        let mut activators = Vec::new();
        for update in updates {
            let Some(node) = self.nodes.get_mut(&update.node) else {
                continue;
            };
            node.activation = update.activation;
            for (index, activation) in update.gates {
                node.gates[index].activation = activation;
            }
            for (name, value) in update.datatargets {
                *self.datatargets.entry(name).or_insert(0.0) += value;
            }
            let nodespace = node.nodespace;
            activators.extend(
                update
                    .activators
                    .into_iter()
                    .map(|(gate_type, value)| (nodespace, gate_type, value)),
            );
        }

        // Activator nodes take effect from the next step on
        for (nodespace, gate_type, value) in activators {
            if let Some(space) = self.nodespaces.get_mut(&nodespace) {
                space.activators.insert(gate_type, value);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Consistency
    // ------------------------------------------------------------------

    /// Verify every cross-reference in the net. Any error here is fatal.
    pub fn check_consistency(&self) -> NetResult<()> {
        let fault = |msg: String| Err(NetError::inconsistent(msg));

        for link in self.links.values() {
            let indexed_out = self
                .nodes
                .get(&link.source_node)
                .and_then(|n| n.gate(&link.source_gate))
                .map(|g| g.outgoing.contains(&link.id))
                .unwrap_or(false);
            let indexed_in = self
                .nodes
                .get(&link.target_node)
                .and_then(|n| n.slot(&link.target_slot))
                .map(|s| s.incoming.contains_key(&link.id))
                .unwrap_or(false);
            if !indexed_out || !indexed_in {
                return fault(format!("link {} is dangling", link.id));
            }
        }

        for node in self.nodes.values() {
            for gate in &node.gates {
                for id in &gate.outgoing {
                    match self.links.get(id) {
                        Some(l) if l.source_node == node.id && l.source_gate == gate.gate_type => {}
                        _ => return fault(format!("gate {}.{} lists stray {}", node.id, gate.gate_type, id)),
                    }
                }
            }
            for slot in &node.slots {
                for id in slot.incoming.keys() {
                    match self.links.get(id) {
                        Some(l) if l.target_node == node.id && l.target_slot == slot.slot_type => {}
                        _ => return fault(format!("slot {}.{} lists stray {}", node.id, slot.slot_type, id)),
                    }
                }
            }
            let contained = self
                .nodespaces
                .get(&node.nodespace)
                .map(|s| s.nodes.contains(&node.id))
                .unwrap_or(false);
            if !contained {
                return fault(format!("node {} is orphaned", node.id));
            }
        }

        let roots = self.nodespaces.values().filter(|s| s.is_root()).count();
        if roots != 1 {
            return fault(format!("{} root nodespaces", roots));
        }

        for space in self.nodespaces.values() {
            if let Some(parent) = space.parent {
                let contained = self
                    .nodespaces
                    .get(&parent)
                    .map(|p| p.nodespaces.contains(&space.id))
                    .unwrap_or(false);
                if !contained {
                    return fault(format!("nodespace {} is orphaned", space.id));
                }
            }

            // Walking up must reach the root within the number of nodespaces
            let mut current = space.parent;
            let mut hops = 0;
            while let Some(id) = current {
                hops += 1;
                if hops > self.nodespaces.len() {
                    return fault(format!("nodespace {} sits in a cycle", space.id));
                }
                current = self.nodespaces.get(&id).and_then(|s| s.parent);
            }

            for child in &space.nodes {
                if !self.nodes.contains_key(child) {
                    return fault(format!("nodespace {} lists missing {}", space.id, child));
                }
            }
            for child in &space.nodespaces {
                if !self.nodespaces.contains_key(child) {
                    return fault(format!("nodespace {} lists missing {}", space.id, child));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_type::{ACTOR, CONCEPT, PIPE, REGISTER, SENSOR};

    fn net_with_register() -> (Nodenet, NodeId) {
        let mut net = Nodenet::new("test");
        let root = net.root();
        let reg = net.create_node(REGISTER, root, Some("reg")).unwrap();
        (net, reg)
    }

    #[test]
    fn test_create_node_ports() {
        let mut net = Nodenet::new("test");
        let root = net.root();
        let concept = net.create_node(CONCEPT, root, None).unwrap();

        let node = net.node(concept).unwrap();
        assert_eq!(node.slots.len(), 1);
        assert_eq!(node.gates.len(), 9);
        assert!(net.nodespace(root).unwrap().nodes.contains(&concept));
        assert!(matches!(
            net.create_node("Script", root, None),
            Err(NetError::UnknownNodeType(_))
        ));
        assert!(matches!(
            net.create_node(REGISTER, NodespaceId(999), None),
            Err(NetError::UnknownNodespace(_))
        ));
    }

    #[test]
    fn test_link_validation_leaves_state_unchanged() {
        let (mut net, reg) = net_with_register();
        let root = net.root();
        let sensor = net.create_node(SENSOR, root, None).unwrap();

        assert!(matches!(
            net.create_link(reg, "sub", reg, "gen", 1.0),
            Err(NetError::UnknownGateType { .. })
        ));
        // Sensors have no slots
        assert!(matches!(
            net.create_link(reg, "gen", sensor, "gen", 1.0),
            Err(NetError::UnknownSlotType { .. })
        ));
        assert!(matches!(
            net.create_link(reg, "gen", NodeId(999), "gen", 1.0),
            Err(NetError::UnknownNode(_))
        ));
        assert!(matches!(
            net.create_link(reg, "gen", reg, "gen", f64::NAN),
            Err(NetError::InvalidWeight(_))
        ));

        assert_eq!(net.link_count(), 0);
        assert!(net.gate(reg, "gen").unwrap().outgoing.is_empty());
        net.check_consistency().unwrap();
    }

    #[test]
    fn test_link_updates_existing_weight() {
        let (mut net, reg) = net_with_register();
        let first = net.ensure_link(reg, "gen", reg, "gen", 1.0).unwrap();
        let second = net.ensure_link(reg, "gen", reg, "gen", 0.5).unwrap();

        assert_eq!(first, second);
        assert_eq!(net.link_count(), 1);
        assert_eq!(net.link(first).unwrap().weight, 0.5);
    }

    #[test]
    fn test_delete_node_requires_cascade() {
        let (mut net, reg) = net_with_register();
        let root = net.root();
        let other = net.create_node(REGISTER, root, None).unwrap();
        net.create_link(reg, "gen", other, "gen", 1.0).unwrap();
        net.create_link(reg, "gen", reg, "gen", 1.0).unwrap();

        assert!(matches!(
            net.delete_node(reg, false),
            Err(NetError::NodeHasLinks { links: 2, .. })
        ));
        assert_eq!(net.node_count(), 2);

        net.delete_node(reg, true).unwrap();
        assert_eq!(net.node_count(), 1);
        assert_eq!(net.link_count(), 0);
        assert!(net.slot(other, "gen").unwrap().incoming.is_empty());
        net.check_consistency().unwrap();
    }

    #[test]
    fn test_delete_nodespace_policy() {
        let mut net = Nodenet::new("test");
        let root = net.root();
        let outer = net.create_nodespace(root, Some("outer")).unwrap();
        let inner = net.create_nodespace(outer, None).unwrap();
        let inside = net.create_node(PIPE, inner, None).unwrap();
        let outside = net.create_node(PIPE, root, None).unwrap();
        net.create_link(outside, "sub", inside, "sub", 1.0).unwrap();

        assert!(matches!(
            net.delete_nodespace(root, true),
            Err(NetError::RootNodespace(_))
        ));
        assert!(matches!(
            net.delete_nodespace(outer, false),
            Err(NetError::NodespaceNotEmpty(_))
        ));

        net.delete_nodespace(outer, true).unwrap();
        assert!(net.nodespace(inner).is_err());
        assert!(net.node(inside).is_err());
        assert_eq!(net.link_count(), 0);
        assert!(net.gate(outside, "sub").unwrap().outgoing.is_empty());
        assert_eq!(net.nodespace_contents(root).unwrap().nodespaces, Vec::new());
        net.check_consistency().unwrap();
    }

    #[test]
    fn test_gate_parameter_errors() {
        let (mut net, reg) = net_with_register();

        assert!(matches!(
            net.set_gate_parameter(reg, "gen", "gain", 1.0),
            Err(NetError::UnknownParameter(_))
        ));
        assert!(matches!(
            net.set_gate_parameter(reg, "gen", "maximum", -2.0),
            Err(NetError::InvalidParameter { .. })
        ));
        net.set_gate_parameter(reg, "gen", "threshold", -100.0).unwrap();
        assert_eq!(net.gate(reg, "gen").unwrap().params.threshold, -100.0);
    }

    #[test]
    fn test_seeded_activation_clamped() {
        let (mut net, reg) = net_with_register();
        net.set_gate_activation(reg, "gen", 4.0).unwrap();
        assert_eq!(net.gate(reg, "gen").unwrap().activation, 1.0);
        assert!(net.set_gate_activation(reg, "gen", f64::INFINITY).is_err());
    }

    #[test]
    fn test_step_counter() {
        let (mut net, _) = net_with_register();
        assert_eq!(net.current_step(), 0);
        assert_eq!(net.step().unwrap(), 1);
        assert_eq!(net.step().unwrap(), 2);
    }

    #[test]
    fn test_actor_writes_datatarget() {
        let mut net = Nodenet::new("test");
        let root = net.root();
        let sensor = net.create_node(SENSOR, root, None).unwrap();
        let actor = net.create_node(ACTOR, root, None).unwrap();
        net.set_node_parameter(sensor, "datasource", "light").unwrap();
        net.set_node_parameter(actor, "datatarget", "motor").unwrap();
        net.create_link(sensor, "gen", actor, "gen", 0.5).unwrap();

        net.set_datasource("light", 0.8).unwrap();
        net.step().unwrap();
        assert_eq!(net.gate(sensor, "gen").unwrap().activation, 0.8);
        assert_eq!(net.datatarget("motor"), 0.0);

        net.step().unwrap();
        assert_eq!(net.datatarget("motor"), 0.4);
    }
}
