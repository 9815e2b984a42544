// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core data types shared by all store implementations.
use std::fmt::Display;
use std::num::ParseIntError;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Identifier of a role node, assigned by the store on insertion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleId(pub i64);

impl Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoleId {
    type Err = ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self(value.parse()?))
    }
}

impl From<i64> for RoleId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Opaque identifier of a principal (user, api client, ..) which can be member of roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(pub i64);

impl Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MemberId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Microseconds since UNIX epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        // A clock set before the epoch saturates to zero.
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_micros())
            .unwrap_or_default();
        Self(micros as u64)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node in the role hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,

    /// Unique, human-readable natural key of this role.
    pub slug: String,
}

/// Whether an edge was explicitly authored or derived by composing direct edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Explicitly authored relation.
    Direct,

    /// Multi-hop relation materialized when recomputing the transitive closure.
    Indirect,
}

impl EdgeKind {
    pub fn is_direct(&self) -> bool {
        matches!(self, EdgeKind::Direct)
    }

    pub fn from_direct(direct: bool) -> Self {
        if direct {
            EdgeKind::Direct
        } else {
            EdgeKind::Indirect
        }
    }
}

/// Lifecycle of an edge row. Rows are never removed, deleting them only changes their state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifecycle {
    Active,
    Deleted(Timestamp),
}

impl Lifecycle {
    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Active)
    }

    pub fn deleted_at(&self) -> Option<Timestamp> {
        match self {
            Lifecycle::Active => None,
            Lifecycle::Deleted(at) => Some(*at),
        }
    }
}

/// A parent-child relation between two roles: the parent transitively contains the child.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub parent: RoleId,
    pub child: RoleId,
    pub kind: EdgeKind,
    pub created: Timestamp,
    pub lifecycle: Lifecycle,
}

impl Edge {
    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub fn is_direct(&self) -> bool {
        self.kind.is_direct()
    }
}

impl Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let arrow = if self.is_direct() { "->" } else { "~>" };
        write!(f, "{} {} {}", self.parent, arrow, self.child)
    }
}

/// Pair of `(parent, child)` role identifiers.
pub type Pair = (RoleId, RoleId);
