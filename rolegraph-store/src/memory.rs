// SPDX-License-Identifier: MIT OR Apache-2.0

use std::convert::Infallible;

use crate::edges::{EdgeMemoryStore, EdgeTable};
use crate::members::{MemberMemoryStore, MemberTable};
use crate::roles::{RoleMemoryStore, RoleTable};
use crate::traits::Transaction;

/// In-memory store.
///
/// This does not persist data permamently, all changes are lost when the process ends. Use this
/// only in development or test contexts.
///
/// Cloned instances share the same state. Transactions are emulated by taking a snapshot of the
/// whole state on `begin` which gets restored on `rollback`; they are not isolated from each
/// other.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    pub(crate) roles: RoleMemoryStore,
    pub(crate) edges: EdgeMemoryStore,
    pub(crate) members: MemberMemoryStore,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Snapshot of the store taken when a transaction began.
#[derive(Debug)]
pub struct MemoryPermit {
    roles: RoleTable,
    edges: EdgeTable,
    members: MemberTable,
}

impl Transaction for MemoryStore {
    type Error = Infallible;

    type Permit = MemoryPermit;

    async fn begin(&self) -> Result<MemoryPermit, Infallible> {
        Ok(MemoryPermit {
            roles: self.roles.inner.borrow().clone(),
            edges: self.edges.inner.borrow().clone(),
            members: self.members.inner.borrow().clone(),
        })
    }

    async fn rollback(&self, permit: MemoryPermit) -> Result<(), Infallible> {
        *self.roles.inner.borrow_mut() = permit.roles;
        *self.edges.inner.borrow_mut() = permit.edges;
        *self.members.inner.borrow_mut() = permit.members;
        Ok(())
    }

    async fn commit(&self, _permit: MemoryPermit) -> Result<(), Infallible> {
        Ok(())
    }
}

// Trait implementations are in the regarding modules, see for example `roles` or `edges` etc.
