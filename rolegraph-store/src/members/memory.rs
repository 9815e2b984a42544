// SPDX-License-Identifier: MIT OR Apache-2.0

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::rc::Rc;

use crate::members::MemberStore;
use crate::memory::MemoryStore;
use crate::types::{MemberId, RoleId};

#[derive(Clone, Debug, Default)]
pub(crate) struct MemberTable {
    memberships: BTreeSet<(RoleId, MemberId)>,
}

#[derive(Clone, Debug, Default)]
pub struct MemberMemoryStore {
    pub(crate) inner: Rc<RefCell<MemberTable>>,
}

impl MemberMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn remove_role(&self, role: RoleId) {
        self.inner
            .borrow_mut()
            .memberships
            .retain(|(role_id, _)| *role_id != role);
    }
}

impl MemberStore for MemoryStore {
    async fn add_member(&self, role: RoleId, member: MemberId) -> Result<bool, Infallible> {
        Ok(self.members.inner.borrow_mut().memberships.insert((role, member)))
    }

    async fn remove_member(&self, role: RoleId, member: MemberId) -> Result<bool, Infallible> {
        Ok(self
            .members
            .inner
            .borrow_mut()
            .memberships
            .remove(&(role, member)))
    }

    async fn members_of(&self, roles: &[RoleId]) -> Result<Vec<(MemberId, RoleId)>, Infallible> {
        let table = self.members.inner.borrow();
        Ok(table
            .memberships
            .iter()
            .filter(|(role, _)| roles.contains(role))
            .map(|(role, member)| (*member, *role))
            .collect())
    }

    async fn roles_of(&self, member: MemberId) -> Result<Vec<RoleId>, Infallible> {
        let table = self.members.inner.borrow();
        Ok(table
            .memberships
            .iter()
            .filter(|(_, member_id)| *member_id == member)
            .map(|(role, _)| *role)
            .collect())
    }

    async fn delete_orphaned_members(&self) -> Result<u64, Infallible> {
        let roles = self.roles.inner.borrow();
        let mut table = self.members.inner.borrow_mut();
        let before = table.memberships.len();
        table.memberships.retain(|(role, _)| roles.contains(role));
        Ok((before - table.memberships.len()) as u64)
    }
}
