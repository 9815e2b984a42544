// SPDX-License-Identifier: MIT OR Apache-2.0

//! Role hierarchies with an incrementally maintained transitive closure.
//!
//! Roles inherit from other roles: a parent role "contains" the members and rights of its child
//! roles. Permission checks need to know whether a role is an ancestor or descendant of another
//! one without walking the hierarchy at query time. `RoleGraph` keeps the transitive closure of all
//! direct parent-child edges materialized as "indirect" edges in the store and reconciles it
//! whenever a direct edge is created or soft-deleted.
//!
//! ## Example
//!
//! ```rust
//! # use rolegraph::{Query, RoleGraph};
//! # use rolegraph_store::MemoryStore;
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = RoleGraph::new(MemoryStore::new());
//!
//! let admins = graph.create_role("Administrators", "admins").await?;
//! let editors = graph.create_role("Editors", "editors").await?;
//! let authors = graph.create_role("Authors", "authors").await?;
//!
//! // Administrators contain editors which contain authors.
//! graph.add_child(admins.id, editors.id).await?;
//! graph.add_child(editors.id, authors.id).await?;
//!
//! assert!(graph.is_ancestor(admins.id, authors.id).await?);
//! assert_eq!(graph.ancestors(&[authors.id], Query::new()).await?.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Bulk changes
//!
//! Many changes in a row can be wrapped with `RoleGraph::deferred`. The closure is then reconciled
//! once at the end instead of after every change.
pub mod closure;
pub mod config;
pub mod deferral;
mod error;
pub mod events;
mod graph;
mod lifecycle;
mod query;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
#[cfg(test)]
mod tests;

pub use closure::{Closure, ClosureReport};
pub use config::Config;
pub use error::RoleGraphError;
pub use events::{EdgeEvent, EdgeRef};
pub use graph::{GraphResult, GraphStore, RoleGraph, RoleGraphBuilder};
pub use query::Query;
pub use rolegraph_store::{Edge, EdgeKind, Lifecycle, MemberId, Pair, Role, RoleId, Timestamp};
