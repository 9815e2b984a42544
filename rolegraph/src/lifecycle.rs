// SPDX-License-Identifier: MIT OR Apache-2.0

//! Creating and deleting roles and the direct edges between them.
use rolegraph_store::{EdgeKind, Role, RoleId, Timestamp};
use tracing::{debug, trace, warn};

use crate::error::RoleGraphError;
use crate::events::{EdgeEvent, EdgeRef};
use crate::graph::{GraphResult, GraphStore, RoleGraph};

/// How often creating a direct edge is attempted before giving up on a concurrent writer.
const CREATE_ATTEMPTS: usize = 2;

impl<S> RoleGraph<S>
where
    S: GraphStore,
{
    /// Create a new role.
    ///
    /// Fails with `DuplicateSlug` if the slug is already taken.
    pub async fn create_role(&self, name: &str, slug: &str) -> GraphResult<Role, S> {
        let role = self
            .atomically(async || {
                self.store
                    .insert_role(name, slug)
                    .await
                    .map_err(RoleGraphError::Storage)?
                    .ok_or_else(|| RoleGraphError::DuplicateSlug(slug.to_string()))
            })
            .await?;

        debug!(id = %role.id, slug, "created role");
        Ok(role)
    }

    /// Delete a role together with all edges and memberships touching it.
    ///
    /// Returns `false` if the role did not exist.
    pub async fn delete_role(&self, id: RoleId) -> GraphResult<bool, S> {
        self.atomically(async || {
            let Some(removed_direct) = self
                .store
                .delete_role(id)
                .await
                .map_err(RoleGraphError::Storage)?
            else {
                trace!(%id, "role to delete does not exist");
                return Ok(false);
            };

            debug!(%id, removed_direct, "deleted role");
            if removed_direct > 0 {
                self.notify().await?;
            }
            Ok(true)
        })
        .await
    }

    /// Create a direct edge from `parent` to `child` or make a soft-deleted one active again.
    ///
    /// Returns `false` if the edge was already active, in this case nothing changes and no event
    /// is emitted.
    pub async fn soft_create(&self, parent: RoleId, child: RoleId) -> GraphResult<bool, S> {
        let created = self
            .atomically(async || {
                self.ensure_roles(&[parent, child]).await?;
                let created = self.create_direct_edge(parent, child).await?;
                if created {
                    self.notify().await?;
                }
                Ok(created)
            })
            .await?;

        if created {
            self.emit(EdgeEvent::Created(EdgeRef::new(parent, child)));
        }
        Ok(created)
    }

    /// Soft-delete the direct edge from `parent` to `child`.
    ///
    /// Returns `false` if there was no active edge, for example because it was deleted
    /// concurrently.
    pub async fn soft_delete(&self, parent: RoleId, child: RoleId) -> GraphResult<bool, S> {
        let deleted = self
            .atomically(async || {
                self.ensure_roles(&[parent, child]).await?;
                let deleted = self
                    .store
                    .soft_delete_edge(parent, child, EdgeKind::Direct, Timestamp::now())
                    .await
                    .map_err(RoleGraphError::Storage)?;

                if deleted {
                    debug!(%parent, %child, "soft-deleted direct edge");
                    self.notify().await?;
                } else {
                    trace!(%parent, %child, "no active direct edge to delete");
                }
                Ok(deleted)
            })
            .await?;

        if deleted {
            self.emit(EdgeEvent::Deleted(EdgeRef::new(parent, child)));
        }
        Ok(deleted)
    }

    /// Make `child` a child role of `role`.
    pub async fn add_child(&self, role: RoleId, child: RoleId) -> GraphResult<bool, S> {
        self.soft_create(role, child).await
    }

    pub async fn remove_child(&self, role: RoleId, child: RoleId) -> GraphResult<bool, S> {
        self.soft_delete(role, child).await
    }

    /// Make `parent` a parent role of `role`.
    pub async fn add_parent(&self, role: RoleId, parent: RoleId) -> GraphResult<bool, S> {
        self.soft_create(parent, role).await
    }

    pub async fn remove_parent(&self, role: RoleId, parent: RoleId) -> GraphResult<bool, S> {
        self.soft_delete(parent, role).await
    }

    /// Fail with `MissingRole` if any of the given roles does not exist.
    pub(crate) async fn ensure_roles(&self, ids: &[RoleId]) -> GraphResult<(), S> {
        let missing = self
            .store
            .missing_roles(ids)
            .await
            .map_err(RoleGraphError::Storage)?;

        match missing.first() {
            Some(id) => Err(RoleGraphError::MissingRole(*id)),
            None => Ok(()),
        }
    }

    /// Find or create the direct edge within the current transaction.
    ///
    /// A concurrent writer can insert or undelete the same row between reading and writing it, in
    /// that case the row is read again before trying once more.
    async fn create_direct_edge(&self, parent: RoleId, child: RoleId) -> GraphResult<bool, S> {
        for attempt in 1..=CREATE_ATTEMPTS {
            let edge = self
                .store
                .get_edge(parent, child, EdgeKind::Direct)
                .await
                .map_err(RoleGraphError::Storage)?;

            let written = match edge {
                Some(edge) if edge.is_active() => {
                    trace!(%edge, "direct edge is already active");
                    return Ok(false);
                }
                Some(_) => self
                    .store
                    .undelete_edge(parent, child, EdgeKind::Direct, Timestamp::now())
                    .await
                    .map_err(RoleGraphError::Storage)?,
                None => self
                    .store
                    .insert_edge(parent, child, EdgeKind::Direct, Timestamp::now())
                    .await
                    .map_err(RoleGraphError::Storage)?,
            };

            if written {
                debug!(%parent, %child, "created direct edge");
                return Ok(true);
            }

            warn!(%parent, %child, attempt, "direct edge changed concurrently, reading it again");
        }

        Err(RoleGraphError::ConstraintViolation { parent, child })
    }
}
