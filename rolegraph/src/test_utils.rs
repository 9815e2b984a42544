// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for testing role graphs.
use std::cell::Cell;
use std::collections::HashSet;
use std::convert::Infallible;
use std::rc::Rc;

use rolegraph_store::memory::{MemoryPermit, MemoryStore};
use rolegraph_store::{
    Edge, EdgeKind, EdgeStore, MemberId, MemberStore, Pair, Role, RoleId, RoleStore, Timestamp,
    Transaction,
};
use thiserror::Error;

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

fn infallible<T>(result: Result<T, Infallible>) -> T {
    result.unwrap_or_else(|never| match never {})
}

/// Misbehaviour to inject into a `FaultyStore`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Fault {
    #[default]
    Healthy,

    /// Batched writes of indirect edges fail with an error.
    FailBatches,

    /// Batched soft-deletes report success but do not change anything.
    IgnoreSoftDeletes,

    /// Inserting single edges always reports a conflict, as if another writer was faster.
    RejectInserts,
}

#[derive(Debug, Error)]
#[error("injected store failure")]
pub struct InjectedFailure;

/// In-memory store which can be made to fail on purpose.
#[derive(Clone, Debug, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    fault: Rc<Cell<Fault>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fault(&self, fault: Fault) {
        self.fault.set(fault);
    }

    fn fail_batches(&self) -> Result<(), InjectedFailure> {
        match self.fault.get() {
            Fault::FailBatches => Err(InjectedFailure),
            _ => Ok(()),
        }
    }
}

impl Transaction for FaultyStore {
    type Error = InjectedFailure;

    type Permit = MemoryPermit;

    async fn begin(&self) -> Result<MemoryPermit, InjectedFailure> {
        Ok(infallible(self.inner.begin().await))
    }

    async fn rollback(&self, permit: MemoryPermit) -> Result<(), InjectedFailure> {
        infallible(self.inner.rollback(permit).await);
        Ok(())
    }

    async fn commit(&self, permit: MemoryPermit) -> Result<(), InjectedFailure> {
        infallible(self.inner.commit(permit).await);
        Ok(())
    }
}

impl RoleStore for FaultyStore {
    async fn insert_role(&self, name: &str, slug: &str) -> Result<Option<Role>, InjectedFailure> {
        Ok(infallible(self.inner.insert_role(name, slug).await))
    }

    async fn get_role(&self, id: RoleId) -> Result<Option<Role>, InjectedFailure> {
        Ok(infallible(self.inner.get_role(id).await))
    }

    async fn get_role_by_slug(&self, slug: &str) -> Result<Option<Role>, InjectedFailure> {
        Ok(infallible(self.inner.get_role_by_slug(slug).await))
    }

    async fn missing_roles(&self, ids: &[RoleId]) -> Result<Vec<RoleId>, InjectedFailure> {
        Ok(infallible(self.inner.missing_roles(ids).await))
    }

    async fn delete_role(&self, id: RoleId) -> Result<Option<u64>, InjectedFailure> {
        Ok(infallible(self.inner.delete_role(id).await))
    }
}

impl EdgeStore for FaultyStore {
    async fn get_edge(
        &self,
        parent: RoleId,
        child: RoleId,
        kind: EdgeKind,
    ) -> Result<Option<Edge>, InjectedFailure> {
        Ok(infallible(self.inner.get_edge(parent, child, kind).await))
    }

    async fn insert_edge(
        &self,
        parent: RoleId,
        child: RoleId,
        kind: EdgeKind,
        created: Timestamp,
    ) -> Result<bool, InjectedFailure> {
        if self.fault.get() == Fault::RejectInserts {
            return Ok(false);
        }
        Ok(infallible(
            self.inner.insert_edge(parent, child, kind, created).await,
        ))
    }

    async fn undelete_edge(
        &self,
        parent: RoleId,
        child: RoleId,
        kind: EdgeKind,
        created: Timestamp,
    ) -> Result<bool, InjectedFailure> {
        Ok(infallible(
            self.inner.undelete_edge(parent, child, kind, created).await,
        ))
    }

    async fn soft_delete_edge(
        &self,
        parent: RoleId,
        child: RoleId,
        kind: EdgeKind,
        deleted: Timestamp,
    ) -> Result<bool, InjectedFailure> {
        Ok(infallible(
            self.inner
                .soft_delete_edge(parent, child, kind, deleted)
                .await,
        ))
    }

    async fn active_edges(&self, kind: EdgeKind) -> Result<HashSet<Pair>, InjectedFailure> {
        Ok(infallible(self.inner.active_edges(kind).await))
    }

    async fn insert_or_undelete_many(
        &self,
        pairs: &[Pair],
        kind: EdgeKind,
        created: Timestamp,
    ) -> Result<u64, InjectedFailure> {
        self.fail_batches()?;
        Ok(infallible(
            self.inner
                .insert_or_undelete_many(pairs, kind, created)
                .await,
        ))
    }

    async fn soft_delete_many(
        &self,
        pairs: &[Pair],
        kind: EdgeKind,
        deleted: Timestamp,
    ) -> Result<u64, InjectedFailure> {
        self.fail_batches()?;
        if self.fault.get() == Fault::IgnoreSoftDeletes {
            return Ok(pairs.len() as u64);
        }
        Ok(infallible(
            self.inner.soft_delete_many(pairs, kind, deleted).await,
        ))
    }

    async fn active_parents(
        &self,
        children: &[RoleId],
        kind: Option<EdgeKind>,
    ) -> Result<Vec<(RoleId, EdgeKind)>, InjectedFailure> {
        Ok(infallible(self.inner.active_parents(children, kind).await))
    }

    async fn active_children(
        &self,
        parents: &[RoleId],
        kind: Option<EdgeKind>,
    ) -> Result<Vec<(RoleId, EdgeKind)>, InjectedFailure> {
        Ok(infallible(self.inner.active_children(parents, kind).await))
    }

    async fn delete_orphaned_edges(&self) -> Result<u64, InjectedFailure> {
        Ok(infallible(self.inner.delete_orphaned_edges().await))
    }
}

impl MemberStore for FaultyStore {
    async fn add_member(&self, role: RoleId, member: MemberId) -> Result<bool, InjectedFailure> {
        Ok(infallible(self.inner.add_member(role, member).await))
    }

    async fn remove_member(&self, role: RoleId, member: MemberId) -> Result<bool, InjectedFailure> {
        Ok(infallible(self.inner.remove_member(role, member).await))
    }

    async fn members_of(
        &self,
        roles: &[RoleId],
    ) -> Result<Vec<(MemberId, RoleId)>, InjectedFailure> {
        Ok(infallible(self.inner.members_of(roles).await))
    }

    async fn roles_of(&self, member: MemberId) -> Result<Vec<RoleId>, InjectedFailure> {
        Ok(infallible(self.inner.roles_of(member).await))
    }

    async fn delete_orphaned_members(&self) -> Result<u64, InjectedFailure> {
        Ok(infallible(self.inner.delete_orphaned_members().await))
    }
}
