// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces and implementations of persistence layers for role hierarchies.
//!
//! A role hierarchy is a directed graph of roles connected by parent-child edges. Next to the
//! explicitly authored ("direct") edges the store holds "indirect" edges which materialize the
//! transitive closure of the graph, so reachability can be answered with one set-based lookup
//! instead of walking the graph.
//!
//! Edges are never physically removed during normal operation: deleting an edge marks it as
//! deleted and re-creating it later undeletes the same row. At most one row exists for every
//! `(parent, child, kind)` triple.
//!
//! ## Write transactions
//!
//! All store traits build on `Transaction`. Writes and the snapshot reads used while reconciling
//! the closure are executed within a transaction which needs to be started with `begin` and
//! finished with `commit` or `rollback`. Read-only lookups (`active_parents`, `get_role`, ..) do
//! not require one.
//!
//! Two implementations are available: `MemoryStore` for tests and development and `SqliteStore`
//! backed by `sqlx`.
pub mod edges;
pub mod members;
#[cfg(feature = "memory")]
pub mod memory;
pub mod roles;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(any(test, feature = "test_utils"))]
mod test_utils;
mod traits;
mod types;

pub use edges::EdgeStore;
pub use members::MemberStore;
#[cfg(feature = "memory")]
pub use memory::MemoryStore;
pub use roles::RoleStore;
#[cfg(any(test, feature = "test_utils"))]
pub use roles::RoleTestExt;
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteError, SqliteStore, SqliteStoreBuilder};
pub use traits::Transaction;
pub use types::{Edge, EdgeKind, Lifecycle, MemberId, Pair, Role, RoleId, Timestamp};
