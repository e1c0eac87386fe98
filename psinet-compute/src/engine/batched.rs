//! # Batched Engine
//!
//! Link layout is flattened into parallel arrays once per topology change:
//!
//! - link id buffer
//! - source (node, gate index) buffer
//! - target (node, slot index) buffer
//! - weight buffer
//!
//! Propagate then gathers one source activation per link and multiplies it
//! with the weight buffer; Calculate evaluates the scheduled nodes. Both run
//! on all CPU cores via Rayon when `parallel` is on.

use std::time::Instant;

use rayon::prelude::*;

use psinet_core::config::EngineConfig;
use psinet_core::error::{NetError, NetResult};
use psinet_core::id::{LinkId, NodeId};
use psinet_core::link::weighted;
use psinet_core::traits::{EngineStats, NetView, NodeUpdate, SlotWrite, StepEngine};

/// Work items handed to one Rayon task at minimum
const MIN_BATCH: usize = 1024;

/// Flattened link layout
#[derive(Debug, Default)]
struct LinkBuffers {
    /// Topology counter the buffers were built from
    topology: Option<u64>,

    ids: Vec<LinkId>,
    sources: Vec<(NodeId, usize)>,
    targets: Vec<(NodeId, usize)>,
    weights: Vec<f64>,
}

impl LinkBuffers {
    fn is_current(&self, view: &NetView<'_>) -> bool {
        self.topology == Some(view.topology) && self.ids.len() == view.links.len()
    }

    fn rebuild(&mut self, view: &NetView<'_>) -> NetResult<()> {
        self.ids.clear();
        self.sources.clear();
        self.targets.clear();
        self.weights.clear();

        for link in view.links.values() {
            let source = view.nodes.get(&link.source_node);
            let gate = source.and_then(|n| n.gate_index(&link.source_gate));
            let target = view.nodes.get(&link.target_node);
            let slot = target.and_then(|n| n.slot_index(&link.target_slot));

            let (Some(gate), Some(slot)) = (gate, slot) else {
                self.topology = None;
                return Err(NetError::inconsistent(format!(
                    "link {} has a missing endpoint",
                    link.id
                )));
            };

            self.ids.push(link.id);
            self.sources.push((link.source_node, gate));
            self.targets.push((link.target_node, slot));
            self.weights.push(link.weight);
        }

        self.topology = Some(view.topology);
        tracing::debug!("Rebuilt link buffers ({} links)", self.ids.len());
        Ok(())
    }
}

/// Batched step engine using Rayon
#[derive(Debug)]
pub struct BatchedEngine {
    parallel: bool,
    buffers: LinkBuffers,
    stats: EngineStats,
    phase_start: Option<Instant>,
}

impl BatchedEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            parallel: config.parallel,
            buffers: LinkBuffers::default(),
            stats: EngineStats::default(),
            phase_start: None,
        }
    }

    /// Current activation of every link's source gate, in buffer order
    fn gather(&self, view: &NetView<'_>) -> NetResult<Vec<f64>> {
        let read = |(node, gate): &(NodeId, usize)| -> NetResult<f64> {
            view.nodes
                .get(node)
                .and_then(|n| n.gates.get(*gate))
                .map(|g| g.activation)
                .ok_or_else(|| NetError::inconsistent(format!("stale gate reference on {}", node)))
        };

        if self.parallel {
            self.buffers
                .sources
                .par_iter()
                .with_min_len(MIN_BATCH)
                .map(read)
                .collect()
        } else {
            self.buffers.sources.iter().map(read).collect()
        }
    }
}

impl StepEngine for BatchedEngine {
    fn propagate(&mut self, view: &NetView<'_>) -> NetResult<Vec<SlotWrite>> {
        self.phase_start = Some(Instant::now());

        if !self.buffers.is_current(view) {
            self.buffers.rebuild(view)?;
        }

        let activations = self.gather(view)?;
        let buffers = &self.buffers;
        let write = |i: usize| {
            let (node, slot) = buffers.targets[i];
            SlotWrite {
                node,
                slot,
                link: buffers.ids[i],
                value: weighted(activations[i], buffers.weights[i]),
            }
        };

        let writes: Vec<SlotWrite> = if self.parallel {
            (0..buffers.ids.len())
                .into_par_iter()
                .with_min_len(MIN_BATCH)
                .map(write)
                .collect()
        } else {
            (0..buffers.ids.len()).map(write).collect()
        };

        self.stats.links_propagated = writes.len() as u64;
        Ok(writes)
    }

    fn calculate(&mut self, view: &NetView<'_>, schedule: &[NodeId]) -> NetResult<Vec<NodeUpdate>> {
        let updates: Vec<NodeUpdate> = if self.parallel {
            schedule
                .par_iter()
                .map(|id| view.evaluate_node(*id))
                .collect::<NetResult<_>>()?
        } else {
            schedule
                .iter()
                .map(|id| view.evaluate_node(*id))
                .collect::<NetResult<_>>()?
        };

        self.stats.nodes_calculated = updates.len() as u64;
        self.stats.nodes_skipped = view.nodes.len().saturating_sub(updates.len()) as u64;
        self.stats.compute_time_us = self
            .phase_start
            .take()
            .map(|start| start.elapsed().as_micros() as u64)
            .unwrap_or(0);
        Ok(updates)
    }

    fn stats(&self) -> EngineStats {
        self.stats.clone()
    }

    fn name(&self) -> &'static str {
        if self.parallel {
            "Batched (Rayon)"
        } else {
            "Batched"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psinet_core::node_type::REGISTER;
    use psinet_core::{NetConfig, Nodenet};

    fn engine_net(parallel: bool) -> (Nodenet, NodeId, NodeId) {
        let mut config = NetConfig::default();
        config.engine.parallel = parallel;
        let engine = BatchedEngine::new(&config.engine);
        let mut net = Nodenet::with_config("batched", config, Box::new(engine)).unwrap();

        let root = net.root();
        let a = net.create_node(REGISTER, root, None).unwrap();
        let b = net.create_node(REGISTER, root, None).unwrap();
        net.create_link(a, "gen", a, "gen", 1.0).unwrap();
        net.create_link(a, "gen", b, "gen", 0.5).unwrap();
        net.set_gate_activation(a, "gen", 1.0).unwrap();
        (net, a, b)
    }

    #[test]
    fn test_batched_engine_steps() {
        for parallel in [false, true] {
            let (mut net, a, b) = engine_net(parallel);
            net.step().unwrap();
            net.step().unwrap();

            assert_eq!(net.gate(a, "gen").unwrap().activation, 1.0);
            assert_eq!(net.gate(b, "gen").unwrap().activation, 0.5);
            assert_eq!(net.engine_stats().links_propagated, 2);
        }
    }

    #[test]
    fn test_buffers_follow_topology() {
        let (mut net, a, b) = engine_net(true);
        net.step().unwrap();

        // Weight change and relink must both be picked up
        let link = net.links_between(a, "gen", b, "gen")[0];
        net.set_link_weight(link, 0.25).unwrap();
        net.step().unwrap();
        assert_eq!(net.gate(b, "gen").unwrap().activation, 0.25);

        net.relink(link, b, "gen", a, "gen", 1.0).unwrap();
        net.step().unwrap();
        assert_eq!(net.slot(b, "gen").unwrap().incoming.len(), 0);
        assert_eq!(net.gate(b, "gen").unwrap().activation, 0.0);
    }

    #[test]
    fn test_engine_name() {
        let mut config = EngineConfig::default();
        assert_eq!(BatchedEngine::new(&config).name(), "Batched (Rayon)");
        config.parallel = false;
        assert_eq!(BatchedEngine::new(&config).name(), "Batched");
    }
}
