// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::traits::Transaction;
use crate::types::{Role, RoleId};

/// Interface for storing and looking up role nodes.
///
/// Roles are owned by the surrounding application, the store only needs to know about their
/// identity to keep edges consistent: deleting a role removes every edge and membership touching
/// it.
pub trait RoleStore: Transaction {
    /// Insert a new role with a store-assigned identifier.
    ///
    /// Returns `None` when a role with the same slug already exists and no insertion occurred.
    fn insert_role(
        &self,
        name: &str,
        slug: &str,
    ) -> impl Future<Output = Result<Option<Role>, Self::Error>>;

    /// Get a role by its identifier.
    fn get_role(&self, id: RoleId) -> impl Future<Output = Result<Option<Role>, Self::Error>>;

    /// Get a role by its natural key.
    fn get_role_by_slug(&self, slug: &str)
    -> impl Future<Output = Result<Option<Role>, Self::Error>>;

    /// Return all identifiers of the given list which do not resolve to a role.
    ///
    /// Runs within the current transaction.
    fn missing_roles(&self, ids: &[RoleId])
    -> impl Future<Output = Result<Vec<RoleId>, Self::Error>>;

    /// Delete a role together with all edges and memberships referencing it.
    ///
    /// Returns the number of _active direct_ edges which were removed alongside the role, `None`
    /// if the role did not exist.
    fn delete_role(&self, id: RoleId) -> impl Future<Output = Result<Option<u64>, Self::Error>>;
}

/// Methods to simulate out-of-band changes which bypass the cascading rules of the store.
#[cfg(any(test, feature = "test_utils"))]
pub trait RoleTestExt {
    /// Remove the role row only, leaving dangling edges and memberships behind.
    fn delete_role_without_cascade(&self, id: RoleId) -> impl Future<Output = bool>;
}
