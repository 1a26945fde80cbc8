use anyhow::Context;
use sqlx::{migrate::Migrator, mysql::MySqlPoolOptions, MySqlPool};
use tracing::info;

/// `identity` and `identity_field` tables.
static IDENTITY_SCHEMA: Migrator = sqlx::migrate!();

/// Open the identity database and, when asked, bring its schema up to date.
pub async fn connection_manager(
    uri: &str,
    max_size: u32,
    min_idle: u32,
    run_migrations: bool,
) -> anyhow::Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(max_size)
        .min_connections(min_idle)
        .connect(uri)
        .await
        .context("could not connect to the identity database")?;

    if run_migrations {
        info!(
            migrations = IDENTITY_SCHEMA.iter().count(),
            "migrating identity schema"
        );
        IDENTITY_SCHEMA
            .run(&pool)
            .await
            .context("could not migrate the identity schema")?;
    }

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_schema_is_embedded() {
        assert!(IDENTITY_SCHEMA
            .iter()
            .any(|migration| migration.description == "identity"));
    }
}
