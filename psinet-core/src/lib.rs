//! # psinet Core
//!
//! Graph model and activation spreading for node nets.
//!
//! This crate provides the building blocks:
//! - **Node**: typed unit with input slots and output gates
//! - **Link**: weighted edge from a gate to a slot
//! - **Nodespace**: hierarchical container carrying activators
//! - **Nodenet**: owner of all of the above, advanced one step at a time
//!
//! ## Step
//!
//! Every step runs two phases. Propagate moves each gate's activation over
//! its links into slots; Calculate runs node functions on the settled slots
//! and sets new gate activations. Nothing a node computes in Calculate is
//! visible to other nodes before the next Propagate.
//!
//! How the phases are computed is up to a [`StepEngine`]. This crate ships
//! the scalar reference engine; `psinet-compute` adds a batched one.

pub mod activity;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod id;
pub mod link;
pub mod node;
pub mod node_type;
pub mod nodenet;
pub mod nodespace;
pub mod shared;
pub mod slot;
pub mod traits;

// Re-export main types at crate root
pub use activity::{ActivityTracker, SchedulingConfig};
pub use config::{EngineConfig, EngineKind, NetConfig};
pub use engine::ScalarEngine;
pub use error::{NetError, NetResult};
pub use gate::{gate_function, Gate, GateParameter, GateParameters};
pub use id::{LinkId, NodeId, NodespaceId, Position};
pub use link::Link;
pub use node::{Node, NodeContext, NodeOutput};
pub use node_type::{NodeFunction, NodeType, NodeTypeRegistry};
pub use nodenet::Nodenet;
pub use nodespace::{Nodespace, NodespaceContents};
pub use shared::SharedNodenet;
pub use slot::Slot;
pub use traits::*;
