//! # Slot - Activation Inlet of a Node
//!
//! A slot keeps one contribution per incoming link. Propagate overwrites
//! every entry each step, so the sum never carries anything over from a
//! previous step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::LinkId;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Slot {
    /// Slot type name (e.g. "gen", "por")
    pub slot_type: String,

    /// Contribution delivered by each incoming link in the last Propagate
    pub incoming: BTreeMap<LinkId, f64>,

    /// Step in which the slot last received contributions
    pub last_updated: Option<u64>,
}

impl Slot {
    pub fn new(slot_type: impl Into<String>) -> Self {
        Self {
            slot_type: slot_type.into(),
            incoming: BTreeMap::new(),
            last_updated: None,
        }
    }

    /// Summed activation of all incoming links.
    ///
    /// Iterates in link id order so every engine produces the same bits.
    pub fn activation(&self) -> f64 {
        let sum: f64 = self.incoming.values().sum();
        if sum.is_finite() {
            sum
        } else {
            0.0
        }
    }

    /// True if any incoming link delivered a nonzero value
    pub fn is_stimulated(&self) -> bool {
        self.incoming.values().any(|v| *v != 0.0)
    }

    pub(crate) fn attach(&mut self, link: LinkId) {
        self.incoming.insert(link, 0.0);
    }

    pub(crate) fn detach(&mut self, link: LinkId) -> bool {
        self.incoming.remove(&link).is_some()
    }

    /// Replace the contribution of `link`. Ignored for links not attached here.
    pub(crate) fn receive(&mut self, link: LinkId, value: f64, step: u64) {
        if let Some(entry) = self.incoming.get_mut(&link) {
            *entry = value;
            self.last_updated = Some(step);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_sum_replaces() {
        let mut slot = Slot::new("gen");
        slot.attach(LinkId(1));
        slot.attach(LinkId(2));

        slot.receive(LinkId(1), 0.5, 0);
        slot.receive(LinkId(2), 0.25, 0);
        assert_eq!(slot.activation(), 0.75);

        slot.receive(LinkId(1), 0.0, 1);
        assert_eq!(slot.activation(), 0.25);
        assert_eq!(slot.last_updated, Some(1));
    }

    #[test]
    fn test_receive_ignores_unknown_link() {
        let mut slot = Slot::new("gen");
        slot.receive(LinkId(9), 1.0, 0);
        assert!(slot.incoming.is_empty());
        assert!(!slot.is_stimulated());
    }
}
