// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::traits::Transaction;
use crate::types::{MemberId, RoleId};

/// Interface for direct role memberships of principals.
///
/// Inherited memberships are not stored, they follow from the role hierarchy.
pub trait MemberStore: Transaction {
    /// Add a member to a role. Runs within the current transaction.
    ///
    /// Returns `false` when the membership already existed.
    fn add_member(
        &self,
        role: RoleId,
        member: MemberId,
    ) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Remove a member from a role. Runs within the current transaction.
    ///
    /// Returns `false` when no such membership existed.
    fn remove_member(
        &self,
        role: RoleId,
        member: MemberId,
    ) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Get all `(member, role)` memberships of the given roles.
    fn members_of(
        &self,
        roles: &[RoleId],
    ) -> impl Future<Output = Result<Vec<(MemberId, RoleId)>, Self::Error>>;

    /// Get all roles the member was directly added to.
    fn roles_of(&self, member: MemberId) -> impl Future<Output = Result<Vec<RoleId>, Self::Error>>;

    /// Physically remove all memberships whose role does not exist anymore. Runs within the
    /// current transaction.
    fn delete_orphaned_members(&self) -> impl Future<Output = Result<u64, Self::Error>>;
}
