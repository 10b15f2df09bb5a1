use chrono::Utc;
use sqlx::sqlite::SqliteRow;

use vitral_core::domain::catalog::{
    GlassType, GlassTypeId, MeasureUnit, Model, ModelId, ModelStatus, Service, ServiceId,
    ServiceType,
};

use super::{
    decode_error, get_amount, get_optional_amount, get_string, get_u32, CatalogRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Published models with at least one compatible glass type: what a quote line needs.
    pub async fn quotable_model_count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT m.id)
             FROM model m
             JOIN model_glass_type mg ON mg.model_id = m.id
             JOIN glass_type g ON g.id = mg.glass_type_id
             WHERE m.status = 'published'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Upserts a model and replaces its compatible glass set.
    pub async fn save_model(&self, model: &Model) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO model (id, name, status, base_price, cost_per_mm_width, cost_per_mm_height,
                                accessory_price, min_width_mm, max_width_mm, min_height_mm,
                                max_height_mm, glass_discount_width_mm, glass_discount_height_mm,
                                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 status = excluded.status,
                 base_price = excluded.base_price,
                 cost_per_mm_width = excluded.cost_per_mm_width,
                 cost_per_mm_height = excluded.cost_per_mm_height,
                 accessory_price = excluded.accessory_price,
                 min_width_mm = excluded.min_width_mm,
                 max_width_mm = excluded.max_width_mm,
                 min_height_mm = excluded.min_height_mm,
                 max_height_mm = excluded.max_height_mm,
                 glass_discount_width_mm = excluded.glass_discount_width_mm,
                 glass_discount_height_mm = excluded.glass_discount_height_mm,
                 updated_at = excluded.updated_at",
        )
        .bind(&model.id.0)
        .bind(&model.name)
        .bind(model.status.as_str())
        .bind(model.base_price.to_string())
        .bind(model.cost_per_mm_width.to_string())
        .bind(model.cost_per_mm_height.to_string())
        .bind(model.accessory_price.map(|price| price.to_string()))
        .bind(i64::from(model.min_width_mm))
        .bind(i64::from(model.max_width_mm))
        .bind(i64::from(model.min_height_mm))
        .bind(i64::from(model.max_height_mm))
        .bind(i64::from(model.glass_discount_width_mm))
        .bind(i64::from(model.glass_discount_height_mm))
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM model_glass_type WHERE model_id = ?")
            .bind(&model.id.0)
            .execute(&mut *tx)
            .await?;

        for glass_type_id in &model.compatible_glass_type_ids {
            sqlx::query("INSERT INTO model_glass_type (model_id, glass_type_id) VALUES (?, ?)")
                .bind(&model.id.0)
                .bind(&glass_type_id.0)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn save_glass_type(&self, glass: &GlassType) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO glass_type (id, name, price_per_sqm, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 price_per_sqm = excluded.price_per_sqm",
        )
        .bind(&glass.id.0)
        .bind(&glass.name)
        .bind(glass.price_per_sqm.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn save_service(&self, service: &Service) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO service (id, name, service_type, unit, rate, minimum_billing_unit, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 service_type = excluded.service_type,
                 unit = excluded.unit,
                 rate = excluded.rate,
                 minimum_billing_unit = excluded.minimum_billing_unit",
        )
        .bind(&service.id.0)
        .bind(&service.name)
        .bind(service.service_type.as_str())
        .bind(service.unit.as_str())
        .bind(service.rate.to_string())
        .bind(service.minimum_billing_unit.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_model(
    row: &SqliteRow,
    compatible_glass_type_ids: Vec<GlassTypeId>,
) -> Result<Model, RepositoryError> {
    let status_raw = get_string(row, "status")?;
    let status = ModelStatus::parse(&status_raw)
        .ok_or_else(|| decode_error(format!("unknown model status `{status_raw}`")))?;

    Ok(Model {
        id: ModelId(get_string(row, "id")?),
        name: get_string(row, "name")?,
        status,
        base_price: get_amount(row, "base_price")?,
        cost_per_mm_width: get_amount(row, "cost_per_mm_width")?,
        cost_per_mm_height: get_amount(row, "cost_per_mm_height")?,
        accessory_price: get_optional_amount(row, "accessory_price")?,
        min_width_mm: get_u32(row, "min_width_mm")?,
        max_width_mm: get_u32(row, "max_width_mm")?,
        min_height_mm: get_u32(row, "min_height_mm")?,
        max_height_mm: get_u32(row, "max_height_mm")?,
        compatible_glass_type_ids,
        glass_discount_width_mm: get_u32(row, "glass_discount_width_mm")?,
        glass_discount_height_mm: get_u32(row, "glass_discount_height_mm")?,
    })
}

fn row_to_glass_type(row: &SqliteRow) -> Result<GlassType, RepositoryError> {
    Ok(GlassType {
        id: GlassTypeId(get_string(row, "id")?),
        name: get_string(row, "name")?,
        price_per_sqm: get_amount(row, "price_per_sqm")?,
    })
}

fn row_to_service(row: &SqliteRow) -> Result<Service, RepositoryError> {
    let type_raw = get_string(row, "service_type")?;
    let service_type = ServiceType::parse(&type_raw)
        .ok_or_else(|| decode_error(format!("unknown service type `{type_raw}`")))?;
    let unit_raw = get_string(row, "unit")?;
    let unit = MeasureUnit::parse(&unit_raw)
        .ok_or_else(|| decode_error(format!("unknown measure unit `{unit_raw}`")))?;

    Ok(Service {
        id: ServiceId(get_string(row, "id")?),
        name: get_string(row, "name")?,
        service_type,
        unit,
        rate: get_amount(row, "rate")?,
        minimum_billing_unit: get_amount(row, "minimum_billing_unit")?,
    })
}

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn find_model(&self, id: &ModelId) -> Result<Option<Model>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, status, base_price, cost_per_mm_width, cost_per_mm_height,
                    accessory_price, min_width_mm, max_width_mm, min_height_mm, max_height_mm,
                    glass_discount_width_mm, glass_discount_height_mm
             FROM model WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let compatible: Vec<String> = sqlx::query_scalar(
            "SELECT glass_type_id FROM model_glass_type WHERE model_id = ? ORDER BY glass_type_id",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        row_to_model(&row, compatible.into_iter().map(GlassTypeId).collect()).map(Some)
    }

    async fn find_glass_type(
        &self,
        id: &GlassTypeId,
    ) -> Result<Option<GlassType>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, price_per_sqm FROM glass_type WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_glass_type).transpose()
    }

    async fn find_services(&self, ids: &[ServiceId]) -> Result<Vec<Service>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, name, service_type, unit, rate, minimum_billing_unit
             FROM service WHERE id IN ({placeholders}) ORDER BY id"
        );

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(&id.0);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_service).collect()
    }
}
