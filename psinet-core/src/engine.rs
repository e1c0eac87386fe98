//! # Scalar Engine
//!
//! Reference execution strategy: one link at a time during Propagate, one
//! node at a time during Calculate. Every other engine is measured against
//! this one.

use std::time::Instant;

use crate::error::NetResult;
use crate::id::NodeId;
use crate::traits::{EngineStats, NetView, NodeUpdate, SlotWrite, StepEngine};

#[derive(Debug, Default)]
pub struct ScalarEngine {
    stats: EngineStats,
    phase_start: Option<Instant>,
}

impl ScalarEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StepEngine for ScalarEngine {
    fn propagate(&mut self, view: &NetView<'_>) -> NetResult<Vec<SlotWrite>> {
        self.phase_start = Some(Instant::now());

        let mut writes = Vec::with_capacity(view.links.len());
        for link in view.links.values() {
            writes.push(view.propagate_link(link)?);
        }

        self.stats.links_propagated = writes.len() as u64;
        Ok(writes)
    }

    fn calculate(&mut self, view: &NetView<'_>, schedule: &[NodeId]) -> NetResult<Vec<NodeUpdate>> {
        let mut updates = Vec::with_capacity(schedule.len());
        for id in schedule {
            updates.push(view.evaluate_node(*id)?);
        }

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
        "Scalar"
    }
}
