use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// How far the database schema is behind the embedded migrations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied: usize,
    pub known: usize,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.applied >= self.known
    }
}

/// Reads the migration ledger without applying anything.
pub async fn status(pool: &DbPool) -> Result<MigrationStatus, sqlx::Error> {
    let known =
        MIGRATOR.iter().filter(|migration| !migration.migration_type.is_down_migration()).count();

    let ledger_exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;
    if ledger_exists == 0 {
        return Ok(MigrationStatus { applied: 0, known });
    }

    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;

    Ok(MigrationStatus { applied: usize::try_from(applied).unwrap_or(0), known })
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{run_pending, status};
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "model",
        "glass_type",
        "model_glass_type",
        "service",
        "quote",
        "quote_item",
        "quote_item_service",
        "quote_adjustment",
        "idx_model_status",
        "idx_model_glass_type_glass_type_id",
        "idx_quote_user_id",
        "idx_quote_status",
        "idx_quote_item_quote_id",
        "idx_quote_item_service_quote_item_id",
        "idx_quote_adjustment_quote_id",
    ];

    async fn table_count(pool: &sqlx::SqlitePool, table: &str) -> i64 {
        sqlx::query("SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(pool)
            .await
            .expect("check table")
            .get::<i64, _>("count")
    }

    #[tokio::test]
    async fn migrations_create_catalog_and_quote_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in [
            "model",
            "glass_type",
            "model_glass_type",
            "service",
            "quote",
            "quote_item",
            "quote_item_service",
            "quote_adjustment",
        ] {
            assert_eq!(table_count(&pool, table).await, 1, "missing table `{table}`");
        }
    }

    #[tokio::test]
    async fn status_reports_pending_until_migrations_run() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");

        let before = status(&pool).await.expect("status before");
        assert_eq!(before.applied, 0);
        assert_eq!(before.known, 2);
        assert!(!before.is_current());

        run_pending(&pool).await.expect("run migrations");

        let after = status(&pool).await.expect("status after");
        assert_eq!(after.applied, 2);
        assert!(after.is_current());
    }

    #[tokio::test]
    async fn quote_status_is_constrained() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let result = sqlx::query(
            "INSERT INTO quote (id, user_id, status, currency, total, valid_until, created_at, updated_at)
             VALUES ('q-1', 'u-1', 'approved', 'COP', '0', '2026-01-01T00:00:00+00:00',
                     '2026-01-01T00:00:00+00:00', '2026-01-01T00:00:00+00:00')",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err(), "unknown status should violate the CHECK constraint");
    }

    #[tokio::test]
    async fn sent_quote_requires_contact_and_timestamp() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let result = sqlx::query(
            "INSERT INTO quote (id, user_id, status, currency, total, valid_until, created_at, updated_at)
             VALUES ('q-1', 'u-1', 'sent', 'COP', '0', '2026-01-01T00:00:00+00:00',
                     '2026-01-01T00:00:00+00:00', '2026-01-01T00:00:00+00:00')",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err(), "sent quote without sent_at/contact_phone should be rejected");
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        assert_eq!(table_count(&pool, "quote").await, 0);
        assert_eq!(table_count(&pool, "model").await, 0);
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema_signature() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let initial_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            initial_signature.len(),
            MANAGED_SCHEMA_OBJECTS.len(),
            "initial migration pass should create all managed schema objects",
        );

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let after_down_signature = managed_schema_signature(&pool).await;
        assert!(
            after_down_signature.is_empty(),
            "managed schema objects should be removed after full undo",
        );

        run_pending(&pool).await.expect("re-run migrations");

        let after_second_up_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            after_second_up_signature, initial_signature,
            "up/down/up should preserve migration-managed schema signature",
        );
    }

    async fn managed_schema_signature(pool: &sqlx::SqlitePool) -> Vec<(String, String, String)> {
        let mut signature: Vec<(String, String, String)> = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .filter_map(|row| {
            let name = row.get::<String, _>("name");
            if MANAGED_SCHEMA_OBJECTS.contains(&name.as_str()) {
                Some((row.get::<String, _>("type"), name, row.get::<String, _>("sql")))
            } else {
                None
            }
        })
        .collect();
        signature.sort();
        signature
    }
}
