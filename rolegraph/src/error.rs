// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use rolegraph_store::{Pair, RoleId};
use thiserror::Error;

/// Errors which can occur when mutating or reconciling a role graph.
///
/// Generic over the error type of the underlying store.
#[derive(Debug, Error)]
pub enum RoleGraphError<E>
where
    E: Error + 'static,
{
    /// An edge or membership operation referenced a role which does not exist.
    #[error("role {0} does not exist")]
    MissingRole(RoleId),

    /// Creating a direct edge kept racing with concurrent writers, even after re-reading the row
    /// and retrying.
    #[error("uniqueness constraint violated when creating edge {parent} -> {child}")]
    ConstraintViolation { parent: RoleId, child: RoleId },

    #[error("role with slug \"{0}\" already exists")]
    DuplicateSlug(String),

    /// The materialized closure did not match the computed one after applying all changes. The
    /// batch was rolled back.
    #[error("closure verification failed for pairs {pairs:?}")]
    InvariantViolation { pairs: Vec<Pair> },

    /// The store failed, the transaction was rolled back.
    #[error(transparent)]
    Storage(E),
}
