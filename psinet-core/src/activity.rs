//! # Activity Tracking - Active-Set Scheduling
//!
//! Only some nodes run their node function in a given step. After Propagate
//! has settled every slot, a node is admitted if
//!
//! 1. its type is always active (sensors, activators), or
//! 2. one of its slots received a nonzero contribution this step, or
//! 3. one of its gates still holds nonzero activation, so it gets the
//!    chance to fall back once its input is gone.
//!
//! A node outside all three has zero input and zero output; running it
//! could only turn a positive threshold into spontaneous activation.
//! Nodes that are not admitted keep their gate activations untouched.

use serde::{Deserialize, Serialize};

use crate::error::NetResult;
use crate::id::NodeId;
use crate::node::Node;
use crate::node_type::NodeType;
use crate::traits::NetView;

/// Configuration for node scheduling
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Run only admitted nodes. When false every node runs every step.
    pub sparse_updates: bool,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            sparse_updates: true,
        }
    }
}

/// Why a node was admitted to a step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    AlwaysActive,
    Stimulated,
    Settling,
}

/// Admission rule for one node
pub fn admission(node: &Node, node_type: &NodeType) -> Option<Admission> {
    if node_type.always_active {
        Some(Admission::AlwaysActive)
    } else if node.is_stimulated() {
        Some(Admission::Stimulated)
    } else if node.has_active_gate() {
        Some(Admission::Settling)
    } else {
        None
    }
}

/// Nodes to calculate this step, in id order
pub fn schedule(view: &NetView<'_>, config: &SchedulingConfig) -> NetResult<Vec<NodeId>> {
    if !config.sparse_updates {
        return Ok(view.nodes.keys().copied().collect());
    }

    let mut scheduled = Vec::new();
    for (id, node) in view.nodes {
        let node_type = view.registry.get(&node.node_type)?;
        if admission(node, node_type).is_some() {
            scheduled.push(*id);
        }
    }
    Ok(scheduled)
}

/// Tracks how much of the net is active
#[derive(Clone, Debug, Default)]
pub struct ActivityTracker {
    /// Nodes calculated last step
    pub active_count: u64,

    /// Nodes skipped last step
    pub idle_count: u64,

    /// Rolling average of the active ratio
    pub active_ratio: f32,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update statistics
    pub fn update(&mut self, active: u64, idle: u64) {
        self.active_count = active;
        self.idle_count = idle;

        let total = active + idle;
        if total > 0 {
            let current_ratio = active as f32 / total as f32;
            // Exponential moving average
            self.active_ratio = self.active_ratio * 0.95 + current_ratio * 0.05;
        }
    }

    /// Estimated work saved by skipping idle nodes
    pub fn savings_percentage(&self) -> f32 {
        (1.0 - self.active_ratio) * 100.0
    }
}
