use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_MODEL_IDS: &[&str] = &["mdl-corrediza-2h", "mdl-puerta-batiente", "mdl-proyectante"];

const SEED_GLASS_TYPE_IDS: &[&str] = &["gls-claro-6", "gls-templado-8", "gls-laminado-66"];

const SEED_SERVICE_IDS: &[&str] = &["svc-instalacion", "svc-sellado", "svc-pelicula", "svc-retiro"];

const SEED_COMPATIBILITY_ROWS: i64 = 5;

/// Demo catalog used by `vitral seed`, the CLI `price` command and integration tests.
///
/// Loading is idempotent: rows that already exist are left untouched.
pub struct CatalogSeed;

impl CatalogSeed {
    pub const SQL: &str = include_str!("../../../config/fixtures/catalog_seed.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            models: SEED_MODEL_IDS.len(),
            glass_types: SEED_GLASS_TYPE_IDS.len(),
            services: SEED_SERVICE_IDS.len(),
        })
    }

    /// Checks that every seeded row exists.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        checks.push((
            "models",
            count_ids(pool, "model", SEED_MODEL_IDS).await? == SEED_MODEL_IDS.len() as i64,
        ));
        checks.push((
            "glass-types",
            count_ids(pool, "glass_type", SEED_GLASS_TYPE_IDS).await?
                == SEED_GLASS_TYPE_IDS.len() as i64,
        ));
        checks.push((
            "services",
            count_ids(pool, "service", SEED_SERVICE_IDS).await? == SEED_SERVICE_IDS.len() as i64,
        ));

        let quoted_models = sql_array_from_ids(SEED_MODEL_IDS);
        let compatibility: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM model_glass_type WHERE model_id IN {quoted_models}"
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("model-glass-compatibility", compatibility >= SEED_COMPATIBILITY_ROWS));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the seeded catalog rows. Compatibility rows go with their models.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quoted_models = sql_array_from_ids(SEED_MODEL_IDS);
        let quoted_glass = sql_array_from_ids(SEED_GLASS_TYPE_IDS);
        let quoted_services = sql_array_from_ids(SEED_SERVICE_IDS);

        sqlx::query(&format!("DELETE FROM model WHERE id IN {quoted_models}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM glass_type WHERE id IN {quoted_glass}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM service WHERE id IN {quoted_services}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn count_ids(pool: &DbPool, table: &str, ids: &[&str]) -> Result<i64, RepositoryError> {
    let quoted = sql_array_from_ids(ids);
    let count = sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {table} WHERE id IN {quoted}"))
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted =
        ids.iter().map(|id| format!("'{}'", id.replace('\'', "''"))).collect::<Vec<_>>().join(", ");
    format!("({quoted})")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedResult {
    pub models: usize,
    pub glass_types: usize,
    pub services: usize,
}

#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use vitral_core::domain::catalog::{GlassTypeId, ModelId, ModelStatus};

    use super::CatalogSeed;
    use crate::repositories::{CatalogRepository, SqlCatalogRepository};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn seed_loads_verifies_and_cleans() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let seeded = CatalogSeed::load(&pool).await.expect("seed");
        assert_eq!(seeded.models, 3);
        assert!(CatalogSeed::verify(&pool).await.expect("verify").all_present);

        CatalogSeed::clean(&pool).await.expect("clean");
        assert!(!CatalogSeed::verify(&pool).await.expect("verify after clean").all_present);
    }

    #[tokio::test]
    async fn seed_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        CatalogSeed::load(&pool).await.expect("first seed");
        CatalogSeed::load(&pool).await.expect("second seed");

        assert!(CatalogSeed::verify(&pool).await.expect("verify").all_present);
    }

    #[tokio::test]
    async fn seeded_models_decode_through_the_catalog_repository() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        CatalogSeed::load(&pool).await.expect("seed");

        let catalog = SqlCatalogRepository::new(pool);
        let corrediza = catalog
            .find_model(&ModelId("mdl-corrediza-2h".to_string()))
            .await
            .expect("lookup")
            .expect("seeded model");
        assert_eq!(corrediza.status, ModelStatus::Published);
        assert!(corrediza.accepts_glass(&GlassTypeId("gls-claro-6".to_string())));

        let proyectante = catalog
            .find_model(&ModelId("mdl-proyectante".to_string()))
            .await
            .expect("lookup")
            .expect("seeded model");
        assert!(!proyectante.is_quotable());
    }
}
