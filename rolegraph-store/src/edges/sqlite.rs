// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashSet;

use sqlx::{FromRow, QueryBuilder, Sqlite, query, query_as};

use crate::edges::EdgeStore;
use crate::sqlite::{SqliteError, SqliteStore};
use crate::types::{Edge, EdgeKind, Lifecycle, Pair, RoleId, Timestamp};

/// A single edge row as it is queried from the database.
#[derive(FromRow, Debug, Clone, PartialEq, Eq)]
struct EdgeRow {
    parent_id: i64,
    child_id: i64,
    direct: bool,
    created: i64,
    deleted: Option<i64>,
}

impl TryFrom<EdgeRow> for Edge {
    type Error = SqliteError;

    fn try_from(row: EdgeRow) -> Result<Self, Self::Error> {
        let created = decode_timestamp("created", row.created)?;
        let lifecycle = match row.deleted {
            Some(deleted) => Lifecycle::Deleted(decode_timestamp("deleted", deleted)?),
            None => Lifecycle::Active,
        };

        Ok(Edge {
            parent: RoleId(row.parent_id),
            child: RoleId(row.child_id),
            kind: EdgeKind::from_direct(row.direct),
            created,
            lifecycle,
        })
    }
}

fn decode_timestamp(column: &str, value: i64) -> Result<Timestamp, SqliteError> {
    u64::try_from(value)
        .map(Timestamp)
        .map_err(|_| SqliteError::Decode(column.into()))
}

fn encode_timestamp(timestamp: Timestamp) -> i64 {
    timestamp.0 as i64
}

impl SqliteStore {
    /// Select active edges which are adjacent to any of the given roles.
    ///
    /// `filter_column` is the column the roles are matched against, `select_column` the one
    /// returned.
    async fn active_neighbours(
        &self,
        roles: &[RoleId],
        kind: Option<EdgeKind>,
        filter_column: &'static str,
        select_column: &'static str,
    ) -> Result<Vec<(RoleId, EdgeKind)>, SqliteError> {
        let mut result = Vec::new();

        for chunk in roles.chunks(self.max_batch_size()) {
            let rows = self
                .execute(async |pool| {
                    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                        "SELECT {select_column}, direct FROM role_edges_v1 WHERE deleted IS NULL AND "
                    ));
                    if let Some(kind) = kind {
                        builder.push("direct = ");
                        builder.push_bind(kind.is_direct());
                        builder.push(" AND ");
                    }
                    builder.push(filter_column);
                    builder.push(" IN (");
                    let mut separated = builder.separated(", ");
                    for id in chunk {
                        separated.push_bind(id.0);
                    }
                    separated.push_unseparated(")");

                    let rows = builder
                        .build_query_as::<(i64, bool)>()
                        .fetch_all(pool)
                        .await?;
                    Ok(rows)
                })
                .await?;

            result.extend(
                rows.into_iter()
                    .map(|(id, direct)| (RoleId(id), EdgeKind::from_direct(direct))),
            );
        }

        Ok(result)
    }
}

impl EdgeStore for SqliteStore {
    async fn get_edge(
        &self,
        parent: RoleId,
        child: RoleId,
        kind: EdgeKind,
    ) -> Result<Option<Edge>, SqliteError> {
        let row = self
            .tx(async |tx| {
                query_as::<_, EdgeRow>(
                    "
                    SELECT
                        parent_id,
                        child_id,
                        direct,
                        created,
                        deleted
                    FROM
                        role_edges_v1
                    WHERE
                        parent_id = ?
                        AND child_id = ?
                        AND direct = ?
                    ",
                )
                .bind(parent.0)
                .bind(child.0)
                .bind(kind.is_direct())
                .fetch_optional(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        row.map(Edge::try_from).transpose()
    }

    async fn insert_edge(
        &self,
        parent: RoleId,
        child: RoleId,
        kind: EdgeKind,
        created: Timestamp,
    ) -> Result<bool, SqliteError> {
        let result = self
            .tx(async |tx| {
                // Ignore insertion when the triple already exists (PRIMARY KEY constraint).
                query(
                    "
                    INSERT OR IGNORE
                    INTO
                        role_edges_v1 (
                            parent_id,
                            child_id,
                            direct,
                            created,
                            deleted
                        )
                    VALUES
                        (?, ?, ?, ?, NULL)
                    ",
                )
                .bind(parent.0)
                .bind(child.0)
                .bind(kind.is_direct())
                .bind(encode_timestamp(created))
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn undelete_edge(
        &self,
        parent: RoleId,
        child: RoleId,
        kind: EdgeKind,
        created: Timestamp,
    ) -> Result<bool, SqliteError> {
        let result = self
            .tx(async |tx| {
                query(
                    "
                    UPDATE
                        role_edges_v1
                    SET
                        created = ?,
                        deleted = NULL
                    WHERE
                        parent_id = ?
                        AND child_id = ?
                        AND direct = ?
                        AND deleted IS NOT NULL
                    ",
                )
                .bind(encode_timestamp(created))
                .bind(parent.0)
                .bind(child.0)
                .bind(kind.is_direct())
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete_edge(
        &self,
        parent: RoleId,
        child: RoleId,
        kind: EdgeKind,
        deleted: Timestamp,
    ) -> Result<bool, SqliteError> {
        let result = self
            .tx(async |tx| {
                query(
                    "
                    UPDATE
                        role_edges_v1
                    SET
                        deleted = ?
                    WHERE
                        parent_id = ?
                        AND child_id = ?
                        AND direct = ?
                        AND deleted IS NULL
                    ",
                )
                .bind(encode_timestamp(deleted))
                .bind(parent.0)
                .bind(child.0)
                .bind(kind.is_direct())
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn active_edges(&self, kind: EdgeKind) -> Result<HashSet<Pair>, SqliteError> {
        let rows: Vec<(i64, i64)> = self
            .tx(async |tx| {
                query_as(
                    "
                    SELECT
                        parent_id,
                        child_id
                    FROM
                        role_edges_v1
                    WHERE
                        direct = ?
                        AND deleted IS NULL
                    ",
                )
                .bind(kind.is_direct())
                .fetch_all(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(|(parent, child)| (RoleId(parent), RoleId(child)))
            .collect())
    }

    async fn insert_or_undelete_many(
        &self,
        pairs: &[Pair],
        kind: EdgeKind,
        created: Timestamp,
    ) -> Result<u64, SqliteError> {
        let mut affected = 0;

        for chunk in pairs.chunks(self.max_batch_size()) {
            let result = self
                .tx(async |tx| {
                    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                        "INSERT INTO role_edges_v1 (parent_id, child_id, direct, created, deleted) ",
                    );
                    builder.push_values(chunk, |mut row, (parent, child)| {
                        row.push_bind(parent.0)
                            .push_bind(child.0)
                            .push_bind(kind.is_direct())
                            .push_bind(encode_timestamp(created))
                            .push_bind(None::<i64>);
                    });
                    builder.push(
                        " ON CONFLICT (parent_id, child_id, direct) \
                        DO UPDATE SET created = excluded.created, deleted = NULL",
                    );

                    builder
                        .build()
                        .execute(&mut **tx)
                        .await
                        .map_err(SqliteError::Sqlite)
                })
                .await?;

            affected += result.rows_affected();
        }

        Ok(affected)
    }

    async fn soft_delete_many(
        &self,
        pairs: &[Pair],
        kind: EdgeKind,
        deleted: Timestamp,
    ) -> Result<u64, SqliteError> {
        let mut affected = 0;

        for chunk in pairs.chunks(self.max_batch_size()) {
            let result = self
                .tx(async |tx| {
                    let mut builder: QueryBuilder<Sqlite> =
                        QueryBuilder::new("UPDATE role_edges_v1 SET deleted = ");
                    builder.push_bind(encode_timestamp(deleted));
                    builder.push(" WHERE direct = ");
                    builder.push_bind(kind.is_direct());
                    builder.push(" AND deleted IS NULL AND (parent_id, child_id) IN (");
                    builder.push_values(chunk, |mut row, (parent, child)| {
                        row.push_bind(parent.0).push_bind(child.0);
                    });
                    builder.push(")");

                    builder
                        .build()
                        .execute(&mut **tx)
                        .await
                        .map_err(SqliteError::Sqlite)
                })
                .await?;

            affected += result.rows_affected();
        }

        Ok(affected)
    }

    async fn active_parents(
        &self,
        children: &[RoleId],
        kind: Option<EdgeKind>,
    ) -> Result<Vec<(RoleId, EdgeKind)>, SqliteError> {
        self.active_neighbours(children, kind, "child_id", "parent_id")
            .await
    }

    async fn active_children(
        &self,
        parents: &[RoleId],
        kind: Option<EdgeKind>,
    ) -> Result<Vec<(RoleId, EdgeKind)>, SqliteError> {
        self.active_neighbours(parents, kind, "parent_id", "child_id")
            .await
    }

    async fn delete_orphaned_edges(&self) -> Result<u64, SqliteError> {
        let result = self
            .tx(async |tx| {
                query(
                    "
                    DELETE FROM
                        role_edges_v1
                    WHERE
                        parent_id NOT IN (SELECT id FROM roles_v1)
                        OR child_id NOT IN (SELECT id FROM roles_v1)
                    ",
                )
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        Ok(result.rows_affected())
    }
}
