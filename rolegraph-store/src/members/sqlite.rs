// SPDX-License-Identifier: MIT OR Apache-2.0

use sqlx::{QueryBuilder, Sqlite, query, query_as};

use crate::members::MemberStore;
use crate::sqlite::{SqliteError, SqliteStore};
use crate::types::{MemberId, RoleId};

impl MemberStore for SqliteStore {
    async fn add_member(&self, role: RoleId, member: MemberId) -> Result<bool, SqliteError> {
        let result = self
            .tx(async |tx| {
                query(
                    "
                    INSERT OR IGNORE
                    INTO
                        role_members_v1 (
                            role_id,
                            member_id
                        )
                    VALUES
                        (?, ?)
                    ",
                )
                .bind(role.0)
                .bind(member.0)
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_member(&self, role: RoleId, member: MemberId) -> Result<bool, SqliteError> {
        let result = self
            .tx(async |tx| {
                query("DELETE FROM role_members_v1 WHERE role_id = ? AND member_id = ?")
                    .bind(role.0)
                    .bind(member.0)
                    .execute(&mut **tx)
                    .await
                    .map_err(SqliteError::Sqlite)
            })
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn members_of(&self, roles: &[RoleId]) -> Result<Vec<(MemberId, RoleId)>, SqliteError> {
        let mut result = Vec::new();

        for chunk in roles.chunks(self.max_batch_size()) {
            let rows = self
                .execute(async |pool| {
                    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                        "SELECT member_id, role_id FROM role_members_v1 WHERE role_id IN (",
                    );
                    let mut separated = builder.separated(", ");
                    for id in chunk {
                        separated.push_bind(id.0);
                    }
                    separated.push_unseparated(")");

                    let rows = builder
                        .build_query_as::<(i64, i64)>()
                        .fetch_all(pool)
                        .await?;
                    Ok(rows)
                })
                .await?;

            result.extend(
                rows.into_iter()
                    .map(|(member, role)| (MemberId(member), RoleId(role))),
            );
        }

        Ok(result)
    }

    async fn roles_of(&self, member: MemberId) -> Result<Vec<RoleId>, SqliteError> {
        let rows: Vec<(i64,)> = self
            .execute(async |pool| {
                query_as("SELECT role_id FROM role_members_v1 WHERE member_id = ?")
                    .bind(member.0)
                    .fetch_all(pool)
                    .await
                    .map_err(SqliteError::Sqlite)
            })
            .await?;

        Ok(rows.into_iter().map(|(role,)| RoleId(role)).collect())
    }

    async fn delete_orphaned_members(&self) -> Result<u64, SqliteError> {
        let result = self
            .tx(async |tx| {
                query(
                    "
                    DELETE FROM
                        role_members_v1
                    WHERE
                        role_id NOT IN (SELECT id FROM roles_v1)
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
