// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashSet;

use crate::traits::Transaction;
use crate::types::{Edge, EdgeKind, Pair, RoleId, Timestamp};

/// Interface for parent-child edges between roles.
///
/// At most one row exists per `(parent, child, kind)` triple. Rows are soft-deleted and later
/// re-used through "undeletion", they are never physically removed by any method of this trait
/// apart from `delete_orphaned_edges`.
///
/// All methods except `active_parents` and `active_children` run within the current
/// transaction.
pub trait EdgeStore: Transaction {
    /// Get the edge row for the given triple, including soft-deleted ones.
    fn get_edge(
        &self,
        parent: RoleId,
        child: RoleId,
        kind: EdgeKind,
    ) -> impl Future<Output = Result<Option<Edge>, Self::Error>>;

    /// Insert a new, active edge.
    ///
    /// Returns `false` when a row for this triple already exists and no insertion occurred.
    fn insert_edge(
        &self,
        parent: RoleId,
        child: RoleId,
        kind: EdgeKind,
        created: Timestamp,
    ) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Make a soft-deleted edge active again and reset its creation time.
    ///
    /// Returns `false` when no soft-deleted row was found, for example because it got undeleted
    /// concurrently.
    fn undelete_edge(
        &self,
        parent: RoleId,
        child: RoleId,
        kind: EdgeKind,
        created: Timestamp,
    ) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Mark an active edge as deleted.
    ///
    /// Returns `false` when no active row was affected.
    fn soft_delete_edge(
        &self,
        parent: RoleId,
        child: RoleId,
        kind: EdgeKind,
        deleted: Timestamp,
    ) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Get all active `(parent, child)` pairs of the given kind.
    fn active_edges(
        &self,
        kind: EdgeKind,
    ) -> impl Future<Output = Result<HashSet<Pair>, Self::Error>>;

    /// Insert the given pairs as active edges of this kind in one batch. Rows which exist in a
    /// soft-deleted state are undeleted and their creation time is reset.
    ///
    /// Returns the number of affected rows.
    fn insert_or_undelete_many(
        &self,
        pairs: &[Pair],
        kind: EdgeKind,
        created: Timestamp,
    ) -> impl Future<Output = Result<u64, Self::Error>>;

    /// Soft-delete all active edges of this kind matching the given pairs in one batch.
    ///
    /// Returns the number of affected rows.
    fn soft_delete_many(
        &self,
        pairs: &[Pair],
        kind: EdgeKind,
        deleted: Timestamp,
    ) -> impl Future<Output = Result<u64, Self::Error>>;

    /// Get parents of all active edges pointing at one of the given children, optionally
    /// restricted to one kind of edge.
    fn active_parents(
        &self,
        children: &[RoleId],
        kind: Option<EdgeKind>,
    ) -> impl Future<Output = Result<Vec<(RoleId, EdgeKind)>, Self::Error>>;

    /// Get children of all active edges starting at one of the given parents, optionally
    /// restricted to one kind of edge.
    fn active_children(
        &self,
        parents: &[RoleId],
        kind: Option<EdgeKind>,
    ) -> impl Future<Output = Result<Vec<(RoleId, EdgeKind)>, Self::Error>>;

    /// Physically remove all edges whose parent or child role does not exist anymore.
    ///
    /// Returns the number of removed rows.
    fn delete_orphaned_edges(&self) -> impl Future<Output = Result<u64, Self::Error>>;
}
