// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashSet;

use sqlx::{FromRow, QueryBuilder, Sqlite, query, query_as};

use crate::roles::RoleStore;
#[cfg(any(test, feature = "test_utils"))]
use crate::roles::RoleTestExt;
use crate::sqlite::{SqliteError, SqliteStore};
use crate::types::{Role, RoleId};

/// A single role row as it is queried from the database.
#[derive(FromRow, Debug, Clone, PartialEq, Eq)]
struct RoleRow {
    id: i64,
    name: String,
    slug: String,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Self {
            id: RoleId(row.id),
            name: row.name,
            slug: row.slug,
        }
    }
}

impl RoleStore for SqliteStore {
    async fn insert_role(&self, name: &str, slug: &str) -> Result<Option<Role>, SqliteError> {
        let result = self
            .tx(async |tx| {
                // Ignore insertion when slug already exists (UNIQUE constraint).
                query(
                    "
                    INSERT OR IGNORE
                    INTO
                        roles_v1 (
                            name,
                            slug
                        )
                    VALUES
                        (?, ?)
                    ",
                )
                .bind(name)
                .bind(slug)
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(Role {
            id: RoleId(result.last_insert_rowid()),
            name: name.to_owned(),
            slug: slug.to_owned(),
        }))
    }

    async fn get_role(&self, id: RoleId) -> Result<Option<Role>, SqliteError> {
        let row = self
            .execute(async |pool| {
                query_as::<_, RoleRow>(
                    "
                    SELECT
                        id,
                        name,
                        slug
                    FROM
                        roles_v1
                    WHERE
                        id = ?
                    ",
                )
                .bind(id.0)
                .fetch_optional(pool)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        Ok(row.map(Role::from))
    }

    async fn get_role_by_slug(&self, slug: &str) -> Result<Option<Role>, SqliteError> {
        let row = self
            .execute(async |pool| {
                query_as::<_, RoleRow>(
                    "
                    SELECT
                        id,
                        name,
                        slug
                    FROM
                        roles_v1
                    WHERE
                        slug = ?
                    ",
                )
                .bind(slug)
                .fetch_optional(pool)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        Ok(row.map(Role::from))
    }

    async fn missing_roles(&self, ids: &[RoleId]) -> Result<Vec<RoleId>, SqliteError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found: HashSet<RoleId> = self
            .tx(async |tx| {
                let mut builder: QueryBuilder<Sqlite> =
                    QueryBuilder::new("SELECT id FROM roles_v1 WHERE id IN (");
                let mut separated = builder.separated(", ");
                for id in ids {
                    separated.push_bind(id.0);
                }
                separated.push_unseparated(")");

                let rows = builder
                    .build_query_as::<(i64,)>()
                    .fetch_all(&mut **tx)
                    .await?;
                Ok(rows.into_iter().map(|(id,)| RoleId(id)).collect())
            })
            .await?;

        Ok(ids
            .iter()
            .filter(|id| !found.contains(id))
            .copied()
            .collect())
    }

    async fn delete_role(&self, id: RoleId) -> Result<Option<u64>, SqliteError> {
        self.tx(async |tx| {
            let exists = query("SELECT 1 FROM roles_v1 WHERE id = ?")
                .bind(id.0)
                .fetch_optional(&mut **tx)
                .await?
                .is_some();

            if !exists {
                return Ok(None);
            }

            let removed_direct: (i64,) = query_as(
                "
                SELECT
                    COUNT(*)
                FROM
                    role_edges_v1
                WHERE
                    (parent_id = ? OR child_id = ?)
                    AND direct = TRUE
                    AND deleted IS NULL
                ",
            )
            .bind(id.0)
            .bind(id.0)
            .fetch_one(&mut **tx)
            .await?;

            query("DELETE FROM role_edges_v1 WHERE parent_id = ? OR child_id = ?")
                .bind(id.0)
                .bind(id.0)
                .execute(&mut **tx)
                .await?;

            query("DELETE FROM role_members_v1 WHERE role_id = ?")
                .bind(id.0)
                .execute(&mut **tx)
                .await?;

            query("DELETE FROM roles_v1 WHERE id = ?")
                .bind(id.0)
                .execute(&mut **tx)
                .await?;

            Ok(Some(removed_direct.0 as u64))
        })
        .await
    }
}

#[cfg(any(test, feature = "test_utils"))]
impl RoleTestExt for SqliteStore {
    async fn delete_role_without_cascade(&self, id: RoleId) -> bool {
        self.tx(async |tx| {
            let result = query("DELETE FROM roles_v1 WHERE id = ?")
                .bind(id.0)
                .execute(&mut **tx)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
        .unwrap()
    }
}
