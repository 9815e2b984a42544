// SPDX-License-Identifier: MIT OR Apache-2.0

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::rc::Rc;

use crate::edges::EdgeStore;
use crate::memory::MemoryStore;
use crate::types::{Edge, EdgeKind, Lifecycle, Pair, RoleId, Timestamp};

type EdgeKey = (RoleId, RoleId, EdgeKind);

#[derive(Clone, Debug, Default)]
pub(crate) struct EdgeTable {
    rows: HashMap<EdgeKey, Edge>,
}

#[derive(Clone, Debug, Default)]
pub struct EdgeMemoryStore {
    pub(crate) inner: Rc<RefCell<EdgeTable>>,
}

impl EdgeMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all rows touching the given role, returns how many active direct edges were among
    /// them.
    pub(crate) fn remove_touching(&self, role: RoleId) -> u64 {
        let mut table = self.inner.borrow_mut();
        let mut removed_direct = 0;
        table.rows.retain(|_, edge| {
            let touching = edge.parent == role || edge.child == role;
            if touching && edge.is_active() && edge.is_direct() {
                removed_direct += 1;
            }
            !touching
        });
        removed_direct
    }

    fn active_neighbours<F>(&self, kind: Option<EdgeKind>, select: F) -> Vec<(RoleId, EdgeKind)>
    where
        F: Fn(&Edge) -> Option<RoleId>,
    {
        self.inner
            .borrow()
            .rows
            .values()
            .filter(|edge| edge.is_active())
            .filter(|edge| kind.is_none_or(|kind| edge.kind == kind))
            .filter_map(|edge| select(edge).map(|id| (id, edge.kind)))
            .collect()
    }
}

impl EdgeStore for MemoryStore {
    async fn get_edge(
        &self,
        parent: RoleId,
        child: RoleId,
        kind: EdgeKind,
    ) -> Result<Option<Edge>, Infallible> {
        let table = self.edges.inner.borrow();
        Ok(table.rows.get(&(parent, child, kind)).cloned())
    }

    async fn insert_edge(
        &self,
        parent: RoleId,
        child: RoleId,
        kind: EdgeKind,
        created: Timestamp,
    ) -> Result<bool, Infallible> {
        let mut table = self.edges.inner.borrow_mut();
        let key = (parent, child, kind);
        if table.rows.contains_key(&key) {
            return Ok(false);
        }

        table.rows.insert(
            key,
            Edge {
                parent,
                child,
                kind,
                created,
                lifecycle: Lifecycle::Active,
            },
        );
        Ok(true)
    }

    async fn undelete_edge(
        &self,
        parent: RoleId,
        child: RoleId,
        kind: EdgeKind,
        created: Timestamp,
    ) -> Result<bool, Infallible> {
        let mut table = self.edges.inner.borrow_mut();
        match table.rows.get_mut(&(parent, child, kind)) {
            Some(edge) if !edge.is_active() => {
                edge.created = created;
                edge.lifecycle = Lifecycle::Active;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn soft_delete_edge(
        &self,
        parent: RoleId,
        child: RoleId,
        kind: EdgeKind,
        deleted: Timestamp,
    ) -> Result<bool, Infallible> {
        let mut table = self.edges.inner.borrow_mut();
        match table.rows.get_mut(&(parent, child, kind)) {
            Some(edge) if edge.is_active() => {
                edge.lifecycle = Lifecycle::Deleted(deleted);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn active_edges(&self, kind: EdgeKind) -> Result<HashSet<Pair>, Infallible> {
        let table = self.edges.inner.borrow();
        Ok(table
            .rows
            .values()
            .filter(|edge| edge.kind == kind && edge.is_active())
            .map(|edge| (edge.parent, edge.child))
            .collect())
    }

    async fn insert_or_undelete_many(
        &self,
        pairs: &[Pair],
        kind: EdgeKind,
        created: Timestamp,
    ) -> Result<u64, Infallible> {
        let mut table = self.edges.inner.borrow_mut();
        for (parent, child) in pairs {
            // Same as an upsert: existing rows get their creation time reset and are undeleted.
            table.rows.insert(
                (*parent, *child, kind),
                Edge {
                    parent: *parent,
                    child: *child,
                    kind,
                    created,
                    lifecycle: Lifecycle::Active,
                },
            );
        }
        Ok(pairs.len() as u64)
    }

    async fn soft_delete_many(
        &self,
        pairs: &[Pair],
        kind: EdgeKind,
        deleted: Timestamp,
    ) -> Result<u64, Infallible> {
        let mut table = self.edges.inner.borrow_mut();
        let mut affected = 0;
        for (parent, child) in pairs {
            match table.rows.get_mut(&(*parent, *child, kind)) {
                Some(edge) if edge.is_active() => {
                    edge.lifecycle = Lifecycle::Deleted(deleted);
                    affected += 1;
                }
                _ => (),
            }
        }
        Ok(affected)
    }

    async fn active_parents(
        &self,
        children: &[RoleId],
        kind: Option<EdgeKind>,
    ) -> Result<Vec<(RoleId, EdgeKind)>, Infallible> {
        Ok(self.edges.active_neighbours(kind, |edge| {
            children.contains(&edge.child).then_some(edge.parent)
        }))
    }

    async fn active_children(
        &self,
        parents: &[RoleId],
        kind: Option<EdgeKind>,
    ) -> Result<Vec<(RoleId, EdgeKind)>, Infallible> {
        Ok(self.edges.active_neighbours(kind, |edge| {
            parents.contains(&edge.parent).then_some(edge.child)
        }))
    }

    async fn delete_orphaned_edges(&self) -> Result<u64, Infallible> {
        let roles = self.roles.inner.borrow();
        let mut table = self.edges.inner.borrow_mut();
        let before = table.rows.len();
        table
            .rows
            .retain(|_, edge| roles.contains(&edge.parent) && roles.contains(&edge.child));
        Ok((before - table.rows.len()) as u64)
    }
}
