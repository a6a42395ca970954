//! Schema migrations for the token ledger.
//!
//! Migrations are embedded in the binary, so `larder-tokens migrate` needs
//! no access to the source tree.

use std::borrow::Cow;

use sqlx_core::migrate::{Migration, MigrationType, Migrator};
use tracing::{info, instrument};

use crate::{PgPool, StorageError, StorageResult};

/// Embedded migrations in chronological order: (version, description, sql).
macro_rules! embedded_migrations {
    () => {
        &[(
            20250101000001i64,
            "token_ledger",
            include_str!("../../migrations/20250101000001_token_ledger.sql"),
        )]
    };
}

fn build_migrations() -> Vec<Migration> {
    embedded_migrations!()
        .iter()
        .map(|(version, description, sql)| Migration {
            version: *version,
            description: Cow::Borrowed(description),
            migration_type: MigrationType::Simple,
            sql: Cow::Borrowed(sql),
            checksum: Cow::Borrowed(&[]),
            no_tx: false,
        })
        .collect()
}

/// Versions of every embedded migration.
#[must_use]
pub fn versions() -> Vec<i64> {
    build_migrations().iter().map(|m| m.version).collect()
}

/// Applies all pending migrations.
///
/// Applied versions are tracked in `_sqlx_migrations`; running this on an
/// up-to-date database is a no-op.
///
/// # Errors
///
/// Returns `StorageError::Migration` if a migration fails to apply.
#[instrument(skip(pool))]
pub async fn run(pool: &PgPool) -> StorageResult<()> {
    let migrations = build_migrations();
    info!(count = migrations.len(), "Running token ledger migrations");

    let migrator = Migrator {
        migrations: Cow::Owned(migrations),
        ignore_missing: false,
        locking: true,
        no_tx: false,
    };

    migrator
        .run(pool)
        .await
        .map_err(|e| StorageError::Migration(format!("Migration failed: {e}")))?;

    info!("Token ledger migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_ordered() {
        let versions = versions();
        assert!(!versions.is_empty());
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_migration_sql_creates_both_tables() {
        let migrations = build_migrations();
        let sql = &migrations[0].sql;
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS blacklist"));
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS refresh_token_tracking"));
        assert!(sql.contains("WHERE used = false"));
    }
}
