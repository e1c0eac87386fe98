//! # Nodespace - Hierarchical Container and Activator Scope
//!
//! Nodespaces form a tree under a single root. Each one keeps a table of
//! activators: one multiplier per gate type, applied to every gate of that
//! type on nodes directly inside the nodespace. An absent entry means 1.0;
//! 0.0 closes the gates entirely.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::id::{NodeId, NodespaceId, Position};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Nodespace {
    pub id: NodespaceId,

    pub name: String,

    pub position: Position,

    /// None only for the root
    pub parent: Option<NodespaceId>,

    /// Nodes directly inside this nodespace
    pub nodes: BTreeSet<NodeId>,

    /// Nodespaces directly inside this nodespace
    pub nodespaces: BTreeSet<NodespaceId>,

    /// Gate type -> multiplier
    pub activators: BTreeMap<String, f64>,
}

impl Nodespace {
    pub fn new(id: NodespaceId, name: impl Into<String>, parent: Option<NodespaceId>) -> Self {
        Self {
            id,
            name: name.into(),
            position: [0.0, 0.0],
            parent,
            nodes: BTreeSet::new(),
            nodespaces: BTreeSet::new(),
            activators: BTreeMap::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.nodespaces.is_empty()
    }

    /// Gate factor for gates of `gate_type`
    pub fn activator(&self, gate_type: &str) -> f64 {
        self.activators.get(gate_type).copied().unwrap_or(1.0)
    }
}

/// Snapshot of a nodespace's direct children
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodespaceContents {
    pub nodes: Vec<NodeId>,
    pub nodespaces: Vec<NodespaceId>,
}
