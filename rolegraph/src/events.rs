// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notifications about changes of direct edges.
//!
//! Events are delivered on a broadcast channel after the transaction which changed the edge was
//! committed, see `RoleGraph::subscribe`. Idempotent no-ops (creating an already active edge,
//! deleting an already deleted one) never emit an event.
use std::fmt;

use rolegraph_store::RoleId;
use serde::{Deserialize, Serialize};

/// Parent and child of a direct edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeRef {
    pub parent: RoleId,
    pub child: RoleId,
}

impl EdgeRef {
    pub fn new(parent: RoleId, child: RoleId) -> Self {
        Self { parent, child }
    }
}

impl fmt::Display for EdgeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.parent, self.child)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EdgeEvent {
    /// A direct edge was created or a soft-deleted one was made active again.
    Created(EdgeRef),

    /// A direct edge was soft-deleted.
    Deleted(EdgeRef),
}

impl EdgeEvent {
    pub fn edge(&self) -> EdgeRef {
        match self {
            EdgeEvent::Created(edge) | EdgeEvent::Deleted(edge) => *edge,
        }
    }
}
