use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{MySqlPool, Row};
use tracing::debug;

use shib_slo::{
    errors::{self, WithBacktrace},
    next_id, Result,
};

use crate::identity::{Identity, IdentityStore};

#[derive(Clone, Debug)]
pub struct IdentityImpl {
    pool: MySqlPool,
    unique_identifier_field: String,
}

impl IdentityImpl {
    /// `unique_identifier_field` is mirrored into the `unique_identifier`
    /// column, which carries the uniqueness constraint.
    pub fn new(pool: MySqlPool, unique_identifier_field: String) -> Self {
        Self {
            pool,
            unique_identifier_field,
        }
    }

    async fn fields(&self, id: u64) -> Result<BTreeMap<String, String>> {
        let rows = sqlx::query(
            r#"SELECT `name`,`value` FROM `identity_field`
            WHERE `identity_id` = ?;"#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(errors::any)?;
        let mut fields = BTreeMap::new();
        for row in rows.iter() {
            fields.insert(
                row.try_get("name").map_err(errors::any)?,
                row.try_get("value").map_err(errors::any)?,
            );
        }
        Ok(fields)
    }
}

#[async_trait]
impl IdentityStore for IdentityImpl {
    #[tracing::instrument(skip(self))]
    async fn find_one(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Option<Identity>> {
        let row = match sqlx::query(
            r#"SELECT `identity`.`id`,`identity`.`saml_session_index`,
            `identity`.`created_at`,`identity`.`updated_at`
            FROM `identity_field`
            INNER JOIN `identity` ON `identity`.`id` = `identity_field`.`identity_id`
            WHERE `identity_field`.`name` = ? AND `identity_field`.`value` = ?
            AND `identity`.`deleted` = 0
            ORDER BY `identity`.`id` LIMIT 1;"#,
        )
        .bind(field)
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(errors::any)?
        {
            Some(row) => row,
            None => return Ok(None),
        };

        let id = row.try_get::<u64, _>("id").map_err(errors::any)?;
        Ok(Some(Identity {
            id: Some(id.to_string()),
            fields: self.fields(id).await?,
            saml_session_index: row
                .try_get("saml_session_index")
                .map_err(errors::any)?,
            created_at: Some(
                row.try_get::<NaiveDateTime, _>("created_at")
                    .map_err(errors::any)?,
            ),
            updated_at: Some(
                row.try_get::<NaiveDateTime, _>("updated_at")
                    .map_err(errors::any)?,
            ),
        }))
    }

    #[tracing::instrument(skip(self))]
    async fn persist(&self, identity: &mut Identity) -> Result<()> {
        let unique_identifier = identity
            .get(&self.unique_identifier_field)
            .map(str::to_owned);
        let mut tx = self.pool.begin().await.map_err(errors::any)?;

        let id = match &identity.id {
            Some(v) => {
                let id =
                    v.parse::<u64>().map_err(|err| errors::bad_request(&err))?;
                // an UPDATE reports changed rows only, check the row itself
                // so fields are never written for a missing or deleted one
                sqlx::query(
                    r#"SELECT `id` FROM `identity`
                    WHERE `id` = ? AND `deleted` = 0 FOR UPDATE;"#,
                )
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(errors::any)?
                .ok_or_else(|| {
                    errors::not_found(&format!("identity {} not found", id))
                })?;
                sqlx::query(
                    r#"UPDATE `identity` SET `unique_identifier` = ?,`saml_session_index` = ?
                    WHERE `id` = ? AND `deleted` = 0;"#,
                )
                .bind(&unique_identifier)
                .bind(&identity.saml_session_index)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(write_error)?;
                id
            }
            None => {
                let id = next_id()?;
                debug!("create identity {}", id);
                sqlx::query(
                    r#"INSERT INTO `identity`
                    (`id`,`unique_identifier`,`saml_session_index`)
                    VALUES(?,?,?);"#,
                )
                .bind(id)
                .bind(&unique_identifier)
                .bind(&identity.saml_session_index)
                .execute(&mut *tx)
                .await
                .map_err(write_error)?;
                id
            }
        };

        for (name, value) in identity.fields.iter() {
            sqlx::query(
                r#"REPLACE INTO `identity_field`
                (`identity_id`,`name`,`value`)
                VALUES(?,?,?);"#,
            )
            .bind(id)
            .bind(name)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(write_error)?;
        }
        tx.commit().await.map_err(write_error)?;

        let now = Utc::now().naive_utc();
        if identity.id.is_none() {
            identity.id = Some(id.to_string());
            identity.created_at = Some(now);
        }
        identity.updated_at = Some(now);
        Ok(())
    }
}

fn write_error(err: sqlx::Error) -> WithBacktrace {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() => {
            errors::persistence(db.message())
        }
        _ => errors::any(err),
    }
}
