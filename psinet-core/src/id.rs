//! # Entity Identity
//!
//! Typed ids for everything placed in a node net, plus the net-scoped
//! allocator that hands them out. Ids are plain counters: two nets may reuse
//! the same numbers, but within one net an id is never handed out twice.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($name:ident, $prefix:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw numeric value.
            #[inline]
            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

entity_id!(NodeId, "n", "Identifier of a node within its net.");
entity_id!(LinkId, "l", "Identifier of a link within its net.");
entity_id!(NodespaceId, "s", "Identifier of a nodespace within its net.");

/// Monotonic id source owned by a single net
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn node(&mut self) -> NodeId {
        NodeId(self.bump())
    }

    pub fn link(&mut self) -> LinkId {
        LinkId(self.bump())
    }

    pub fn nodespace(&mut self) -> NodespaceId {
        NodespaceId(self.bump())
    }
}

/// Screen position of an entity. Carried for presentation only.
pub type Position = [f64; 2];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_across_kinds() {
        let mut ids = IdAllocator::new();
        let space = ids.nodespace();
        let node = ids.node();
        let link = ids.link();

        assert_ne!(space.raw(), node.raw());
        assert_ne!(node.raw(), link.raw());
    }

    #[test]
    fn test_id_display() {
        assert_eq!(NodeId(7).to_string(), "n7");
        assert_eq!(LinkId(3).to_string(), "l3");
        assert_eq!(NodespaceId(0).to_string(), "s0");
    }
}
