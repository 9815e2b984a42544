// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reachability and membership lookups.
//!
//! All lookups read the currently active edges. Since the closure is materialized, finding all
//! ancestors or descendants of a role is a single query and never walks the graph. None of these
//! methods update the closure.
use std::collections::{BTreeMap, BTreeSet};

use rolegraph_store::{EdgeKind, MemberId, Role, RoleId};
use tracing::debug;

use crate::error::RoleGraphError;
use crate::graph::{GraphResult, GraphStore, RoleGraph};

/// Options for ancestor and descendant lookups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Query {
    include_self: bool,
    kind: Option<EdgeKind>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the seed roles to the result.
    pub fn include_self(mut self, include_self: bool) -> Self {
        self.include_self = include_self;
        self
    }

    /// Only follow edges of the given kind, both kinds are followed by default.
    pub fn kind(mut self, kind: Option<EdgeKind>) -> Self {
        self.kind = kind;
        self
    }

    pub fn direct_only(self) -> Self {
        self.kind(Some(EdgeKind::Direct))
    }

    pub fn indirect_only(self) -> Self {
        self.kind(Some(EdgeKind::Indirect))
    }
}

/// Merge neighbours into the annotated result, a role reached over any direct edge counts as
/// direct.
fn annotate(
    seeds: &[RoleId],
    query: Query,
    neighbours: Vec<(RoleId, EdgeKind)>,
) -> BTreeMap<RoleId, bool> {
    let mut result = BTreeMap::new();
    if query.include_self {
        result.extend(seeds.iter().map(|seed| (*seed, true)));
    }
    for (role, kind) in neighbours {
        let direct = result.entry(role).or_insert(false);
        *direct |= kind.is_direct();
    }
    result
}

impl<S> RoleGraph<S>
where
    S: GraphStore,
{
    pub async fn role(&self, id: RoleId) -> GraphResult<Option<Role>, S> {
        self.store.get_role(id).await.map_err(RoleGraphError::Storage)
    }

    pub async fn role_by_slug(&self, slug: &str) -> GraphResult<Option<Role>, S> {
        self.store
            .get_role_by_slug(slug)
            .await
            .map_err(RoleGraphError::Storage)
    }

    /// All roles with an active edge pointing at any of the seed roles.
    pub async fn ancestors(
        &self,
        seeds: &[RoleId],
        query: Query,
    ) -> GraphResult<BTreeSet<RoleId>, S> {
        let annotated = self.ancestors_annotated(seeds, query).await?;
        Ok(annotated.into_keys().collect())
    }

    /// All roles reachable from any of the seed roles.
    pub async fn descendants(
        &self,
        seeds: &[RoleId],
        query: Query,
    ) -> GraphResult<BTreeSet<RoleId>, S> {
        let annotated = self.descendants_annotated(seeds, query).await?;
        Ok(annotated.into_keys().collect())
    }

    /// Ancestors of the seed roles, each flagged with whether it is a direct parent of one of
    /// them. Seeds added with `include_self` count as direct.
    pub async fn ancestors_annotated(
        &self,
        seeds: &[RoleId],
        query: Query,
    ) -> GraphResult<BTreeMap<RoleId, bool>, S> {
        let parents = self
            .store
            .active_parents(seeds, query.kind)
            .await
            .map_err(RoleGraphError::Storage)?;
        Ok(annotate(seeds, query, parents))
    }

    /// Descendants of the seed roles, each flagged with whether it is a direct child of one of
    /// them. Seeds added with `include_self` count as direct.
    pub async fn descendants_annotated(
        &self,
        seeds: &[RoleId],
        query: Query,
    ) -> GraphResult<BTreeMap<RoleId, bool>, S> {
        let children = self
            .store
            .active_children(seeds, query.kind)
            .await
            .map_err(RoleGraphError::Storage)?;
        Ok(annotate(seeds, query, children))
    }

    /// Returns `Some(true)` if `role` is a direct parent of any seed, `Some(false)` if it is only
    /// an inherited ancestor and `None` if it is no ancestor at all.
    pub async fn annotate_direct(
        &self,
        seeds: &[RoleId],
        role: RoleId,
    ) -> GraphResult<Option<bool>, S> {
        let annotated = self.ancestors_annotated(seeds, Query::new()).await?;
        Ok(annotated.get(&role).copied())
    }

    /// Returns `true` if `role` inherits from `ancestor`.
    ///
    /// A role is never its own ancestor, not even when it is part of a cycle or has a direct edge
    /// to itself.
    pub async fn is_ancestor(&self, ancestor: RoleId, role: RoleId) -> GraphResult<bool, S> {
        if ancestor == role {
            return Ok(false);
        }

        let parents = self
            .store
            .active_parents(&[role], None)
            .await
            .map_err(RoleGraphError::Storage)?;
        Ok(parents.iter().any(|(parent, _)| *parent == ancestor))
    }

    /// Returns `true` if `descendant` inherits from `role`.
    pub async fn is_descendant(&self, descendant: RoleId, role: RoleId) -> GraphResult<bool, S> {
        self.is_ancestor(role, descendant).await
    }

    /// Physically delete edges and memberships which reference roles that do not exist anymore.
    ///
    /// Returns the number of removed rows.
    pub async fn cleanup_orphans(&self) -> GraphResult<u64, S> {
        let (edges, members) = self
            .atomically(async || {
                let edges = self
                    .store
                    .delete_orphaned_edges()
                    .await
                    .map_err(RoleGraphError::Storage)?;
                let members = self
                    .store
                    .delete_orphaned_members()
                    .await
                    .map_err(RoleGraphError::Storage)?;
                Ok((edges, members))
            })
            .await?;

        if edges + members > 0 {
            debug!(edges, members, "removed orphaned rows");
        }
        Ok(edges + members)
    }

    /// Add a member to a role. Returns `false` if it was a member already.
    pub async fn add_member(&self, role: RoleId, member: MemberId) -> GraphResult<bool, S> {
        self.atomically(async || {
            self.ensure_roles(&[role]).await?;
            self.store
                .add_member(role, member)
                .await
                .map_err(RoleGraphError::Storage)
        })
        .await
    }

    /// Remove a member from a role. Returns `false` if it was not a member.
    pub async fn remove_member(&self, role: RoleId, member: MemberId) -> GraphResult<bool, S> {
        self.atomically(async || {
            self.store
                .remove_member(role, member)
                .await
                .map_err(RoleGraphError::Storage)
        })
        .await
    }

    /// All roles of a member, the ones it was added to and everything they inherit from.
    pub async fn roles_for_member(&self, member: MemberId) -> GraphResult<BTreeSet<RoleId>, S> {
        let roles = self
            .store
            .roles_of(member)
            .await
            .map_err(RoleGraphError::Storage)?;
        if roles.is_empty() {
            return Ok(BTreeSet::new());
        }
        self.ancestors(&roles, Query::new().include_self(true)).await
    }

    /// All members of a role including the ones inherited from its descendants.
    ///
    /// Every member is flagged with whether it was added to the role itself.
    pub async fn all_members(&self, role: RoleId) -> GraphResult<BTreeMap<MemberId, bool>, S> {
        let mut roles: Vec<RoleId> = self
            .descendants(&[role], Query::new())
            .await?
            .into_iter()
            .collect();
        roles.push(role);

        let memberships = self
            .store
            .members_of(&roles)
            .await
            .map_err(RoleGraphError::Storage)?;

        let mut result = BTreeMap::new();
        for (member, member_role) in memberships {
            let direct = result.entry(member).or_insert(false);
            *direct |= member_role == role;
        }
        Ok(result)
    }
}
