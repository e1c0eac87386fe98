//! # Error Types for psinet
//!
//! Every failing operation leaves the net exactly as it was: all checks run
//! before the first mutation.

use thiserror::Error;

use crate::id::{LinkId, NodeId, NodespaceId};

/// Main error type for node net operations
#[derive(Error, Debug)]
pub enum NetError {
    /// Node type is not registered
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// A node type with this name already exists
    #[error("Node type {0} is already registered")]
    DuplicateNodeType(String),

    /// Node not found
    #[error("Node {0} not found")]
    UnknownNode(NodeId),

    /// Link not found
    #[error("Link {0} not found")]
    UnknownLink(LinkId),

    /// Nodespace not found
    #[error("Nodespace {0} not found")]
    UnknownNodespace(NodespaceId),

    /// The node type has no gate with this name
    #[error("Node type {node_type} has no gate {gate_type}")]
    UnknownGateType { node_type: String, gate_type: String },

    /// The node type has no slot with this name
    #[error("Node type {node_type} has no slot {slot_type}")]
    UnknownSlotType { node_type: String, slot_type: String },

    /// Gate parameter name not recognized
    #[error("Unknown gate parameter: {0}")]
    UnknownParameter(String),

    /// Gate parameter value rejected
    #[error("Invalid value {value} for gate parameter {name}: {reason}")]
    InvalidParameter {
        name: String,
        value: f64,
        reason: String,
    },

    /// Link weight rejected
    #[error("Invalid link weight: {0}")]
    InvalidWeight(f64),

    /// Any other externally supplied number rejected (activation, activator, datasource)
    #[error("Invalid value for {what}: {value}")]
    InvalidValue { what: String, value: f64 },

    /// Node still has links and no cascade was requested
    #[error("Node {node} still has {links} link(s)")]
    NodeHasLinks { node: NodeId, links: usize },

    /// Nodespace still has children and no cascade was requested
    #[error("Nodespace {0} is not empty")]
    NodespaceNotEmpty(NodespaceId),

    /// The root nodespace cannot be deleted
    #[error("Nodespace {0} is the root nodespace")]
    RootNodespace(NodespaceId),

    /// Internal invariant broken (dangling link, missing endpoint).
    /// Not recoverable: the net must be discarded.
    #[error("Internal consistency fault: {0}")]
    Inconsistent(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for node net operations
pub type NetResult<T> = Result<T, NetError>;

impl NetError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal consistency fault
    pub fn inconsistent(msg: impl Into<String>) -> Self {
        Self::Inconsistent(msg.into())
    }

    /// Create an invalid value error
    pub fn invalid_value(what: impl Into<String>, value: f64) -> Self {
        Self::InvalidValue {
            what: what.into(),
            value,
        }
    }

    /// True for faults that leave the net unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Inconsistent(_))
    }
}

/// Reject NaN and infinities before they reach stored state
pub(crate) fn ensure_finite(what: &str, value: f64) -> NetResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(NetError::invalid_value(what, value))
    }
}
