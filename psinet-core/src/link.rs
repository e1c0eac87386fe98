//! # Link - Weighted Edge from a Gate to a Slot
//!
//! Links are the only carriers of activation between nodes. A link holds
//! nothing but its endpoints and weight; the gate and slot it joins index it
//! by id. Attaching and detaching those indexes is done by the net, which
//! validates new endpoints before it touches the old ones.

use serde::{Deserialize, Serialize};

use crate::error::{NetError, NetResult};
use crate::id::{LinkId, NodeId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,

    pub source_node: NodeId,
    pub source_gate: String,

    pub target_node: NodeId,
    pub target_slot: String,

    /// Any finite value; zero and negative weights are allowed
    pub weight: f64,
}

impl Link {
    /// True if this link joins exactly these endpoints
    pub fn joins(&self, source: NodeId, gate: &str, target: NodeId, slot: &str) -> bool {
        self.source_node == source
            && self.source_gate == gate
            && self.target_node == target
            && self.target_slot == slot
    }

    /// True if either end sits on `node`
    pub fn touches(&self, node: NodeId) -> bool {
        self.source_node == node || self.target_node == node
    }

    /// Activation delivered to the target slot for a given source activation
    #[inline]
    pub fn contribution(&self, source_activation: f64) -> f64 {
        weighted(source_activation, self.weight)
    }
}

/// `activation × weight`, with non-finite products delivered as 0
#[inline]
pub fn weighted(source_activation: f64, weight: f64) -> f64 {
    let value = source_activation * weight;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Weights must be finite
pub fn validate_weight(weight: f64) -> NetResult<f64> {
    if weight.is_finite() {
        Ok(weight)
    } else {
        Err(NetError::InvalidWeight(weight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Link {
        Link {
            id: LinkId(4),
            source_node: NodeId(1),
            source_gate: "gen".into(),
            target_node: NodeId(2),
            target_slot: "gen".into(),
            weight: -0.5,
        }
    }

    #[test]
    fn test_contribution() {
        assert_eq!(sample().contribution(1.0), -0.5);
        assert_eq!(sample().contribution(0.0), 0.0);
    }

    #[test]
    fn test_joins_and_touches() {
        let link = sample();
        assert!(link.joins(NodeId(1), "gen", NodeId(2), "gen"));
        assert!(!link.joins(NodeId(1), "sub", NodeId(2), "gen"));
        assert!(link.touches(NodeId(2)));
        assert!(!link.touches(NodeId(3)));
    }

    #[test]
    fn test_weight_validation() {
        assert!(validate_weight(0.0).is_ok());
        assert!(validate_weight(-3.0).is_ok());
        assert!(validate_weight(f64::NAN).is_err());
        assert!(validate_weight(f64::NEG_INFINITY).is_err());
    }
}
