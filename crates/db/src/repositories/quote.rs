//! Quote aggregate persistence.
//!
//! Every function takes a connection so the lifecycle service decides the
//! transaction boundary: pass `&mut *tx` for writes, a pooled connection for reads.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;

use vitral_core::domain::catalog::{GlassTypeId, MeasureUnit, ModelId, ServiceId};
use vitral_core::domain::quote::{
    AdjustmentScope, AdjustmentSign, AppliedAdjustment, AppliedService, ProjectAddress, Quote,
    QuoteId, QuoteItem, QuoteItemId, QuoteStatus, UserId, VendorContact,
};

use super::{
    decode_error, get_amount, get_optional_string, get_optional_timestamp, get_string,
    get_timestamp, get_u32, RepositoryError,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlQuoteRepository;

impl SqlQuoteRepository {
    pub fn new() -> Self {
        Self
    }

    /// Inserts the quote header. Items are written separately with [`Self::insert_item`].
    pub async fn insert_quote(
        &self,
        conn: &mut SqliteConnection,
        quote: &Quote,
    ) -> Result<(), RepositoryError> {
        let address = quote.project_address.as_ref();
        let contact = quote.contact.as_ref();

        sqlx::query(
            "INSERT INTO quote (id, user_id, status, currency, total, valid_until, contact_phone,
                                contact_email, project_street, project_city, project_region,
                                project_reference, sent_at, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&quote.id.0)
        .bind(&quote.user_id.0)
        .bind(quote.status.as_str())
        .bind(&quote.currency)
        .bind(quote.total.to_string())
        .bind(quote.valid_until.to_rfc3339())
        .bind(contact.map(|contact| contact.phone.clone()))
        .bind(contact.and_then(|contact| contact.email.clone()))
        .bind(address.map(|address| address.street.clone()))
        .bind(address.and_then(|address| address.city.clone()))
        .bind(address.and_then(|address| address.region.clone()))
        .bind(address.and_then(|address| address.reference.clone()))
        .bind(quote.sent_at.map(|at| at.to_rfc3339()))
        .bind(quote.version)
        .bind(quote.created_at.to_rfc3339())
        .bind(quote.updated_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Appends an item with its applied services and item-scoped adjustments.
    pub async fn insert_item(
        &self,
        conn: &mut SqliteConnection,
        item: &QuoteItem,
    ) -> Result<(), RepositoryError> {
        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM quote_item WHERE quote_id = ?",
        )
        .bind(&item.quote_id.0)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query(
            "INSERT INTO quote_item (id, quote_id, model_id, glass_type_id, name, width_mm,
                                     height_mm, quantity, subtotal, position, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.id.0)
        .bind(&item.quote_id.0)
        .bind(&item.model_id.0)
        .bind(&item.glass_type_id.0)
        .bind(&item.name)
        .bind(i64::from(item.width_mm))
        .bind(i64::from(item.height_mm))
        .bind(i64::from(item.quantity))
        .bind(item.subtotal.to_string())
        .bind(position)
        .bind(item.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;

        for service in &item.services {
            sqlx::query(
                "INSERT INTO quote_item_service (quote_item_id, service_id, name, unit, quantity,
                                                 rate, amount)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&item.id.0)
            .bind(&service.service_id.0)
            .bind(&service.name)
            .bind(service.unit.as_str())
            .bind(service.quantity.to_string())
            .bind(service.rate.to_string())
            .bind(service.amount.to_string())
            .execute(&mut *conn)
            .await?;
        }

        for adjustment in &item.adjustments {
            sqlx::query(
                "INSERT INTO quote_adjustment (quote_id, quote_item_id, scope, concept, sign, unit,
                                               value, amount)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&item.quote_id.0)
            .bind(&item.id.0)
            .bind(AdjustmentScope::Item.as_str())
            .bind(&adjustment.concept)
            .bind(adjustment.sign.as_str())
            .bind(adjustment.unit.as_str())
            .bind(adjustment.value.to_string())
            .bind(adjustment.amount.to_string())
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    pub async fn find_quote(
        &self,
        conn: &mut SqliteConnection,
        id: &QuoteId,
    ) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, status, currency, total, valid_until, contact_phone,
                    contact_email, project_street, project_city, project_region,
                    project_reference, sent_at, version, created_at, updated_at
             FROM quote WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut quote = row_to_quote(&row)?;
        quote.items = self.find_items(conn, id).await?;
        Ok(Some(quote))
    }

    async fn find_items(
        &self,
        conn: &mut SqliteConnection,
        quote_id: &QuoteId,
    ) -> Result<Vec<QuoteItem>, RepositoryError> {
        let item_rows = sqlx::query(
            "SELECT id, quote_id, model_id, glass_type_id, name, width_mm, height_mm, quantity,
                    subtotal, created_at
             FROM quote_item WHERE quote_id = ? ORDER BY position",
        )
        .bind(&quote_id.0)
        .fetch_all(&mut *conn)
        .await?;

        let service_rows = sqlx::query(
            "SELECT s.quote_item_id, s.service_id, s.name, s.unit, s.quantity, s.rate, s.amount
             FROM quote_item_service s
             JOIN quote_item i ON i.id = s.quote_item_id
             WHERE i.quote_id = ?
             ORDER BY s.id",
        )
        .bind(&quote_id.0)
        .fetch_all(&mut *conn)
        .await?;

        let adjustment_rows = sqlx::query(
            "SELECT quote_item_id, scope, concept, sign, unit, value, amount
             FROM quote_adjustment
             WHERE quote_id = ? AND scope = 'item'
             ORDER BY id",
        )
        .bind(&quote_id.0)
        .fetch_all(&mut *conn)
        .await?;

        let mut services: HashMap<String, Vec<AppliedService>> = HashMap::new();
        for row in &service_rows {
            services
                .entry(get_string(row, "quote_item_id")?)
                .or_default()
                .push(row_to_service(row)?);
        }

        let mut adjustments: HashMap<String, Vec<AppliedAdjustment>> = HashMap::new();
        for row in &adjustment_rows {
            adjustments
                .entry(get_string(row, "quote_item_id")?)
                .or_default()
                .push(row_to_adjustment(row)?);
        }

        item_rows
            .iter()
            .map(|row| {
                let mut item = row_to_item(row)?;
                item.services = services.remove(&item.id.0).unwrap_or_default();
                item.adjustments = adjustments.remove(&item.id.0).unwrap_or_default();
                Ok(item)
            })
            .collect()
    }

    /// Re-aggregates the quote total from the stored item subtotals.
    ///
    /// The write only lands while the quote is still a draft; `None` means the
    /// quote left draft (or vanished) and the caller must abort its transaction.
    pub async fn recompute_total(
        &self,
        conn: &mut SqliteConnection,
        quote_id: &QuoteId,
        now: DateTime<Utc>,
    ) -> Result<Option<Decimal>, RepositoryError> {
        let subtotals: Vec<String> =
            sqlx::query_scalar("SELECT subtotal FROM quote_item WHERE quote_id = ?")
                .bind(&quote_id.0)
                .fetch_all(&mut *conn)
                .await?;

        let total = subtotals
            .iter()
            .map(|raw| super::parse_amount("subtotal", raw))
            .sum::<Result<Decimal, _>>()?;

        let updated = sqlx::query(
            "UPDATE quote SET total = ?, version = version + 1, updated_at = ?
             WHERE id = ? AND status = 'draft'",
        )
        .bind(total.to_string())
        .bind(now.to_rfc3339())
        .bind(&quote_id.0)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        Ok((updated == 1).then_some(total))
    }

    /// Persists a status transition already applied to `quote` in memory.
    ///
    /// Matches only a draft row still at `expected_version`, so of two racing
    /// transitions at most one returns `true`.
    pub async fn update_status(
        &self,
        conn: &mut SqliteConnection,
        quote: &Quote,
        expected_version: i64,
    ) -> Result<bool, RepositoryError> {
        let contact = quote.contact.as_ref();

        let updated = sqlx::query(
            "UPDATE quote
             SET status = ?, sent_at = ?, contact_phone = ?, contact_email = ?,
                 version = version + 1, updated_at = ?
             WHERE id = ? AND status = 'draft' AND version = ?",
        )
        .bind(quote.status.as_str())
        .bind(quote.sent_at.map(|at| at.to_rfc3339()))
        .bind(contact.map(|contact| contact.phone.clone()))
        .bind(contact.and_then(|contact| contact.email.clone()))
        .bind(quote.updated_at.to_rfc3339())
        .bind(&quote.id.0)
        .bind(expected_version)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }
}

fn row_to_quote(row: &SqliteRow) -> Result<Quote, RepositoryError> {
    let status_raw = get_string(row, "status")?;
    let status = QuoteStatus::parse(&status_raw)
        .ok_or_else(|| decode_error(format!("unknown quote status `{status_raw}`")))?;

    let contact = match get_optional_string(row, "contact_phone")? {
        Some(phone) => {
            Some(VendorContact { phone, email: get_optional_string(row, "contact_email")? })
        }
        None => None,
    };
    let project_address = match get_optional_string(row, "project_street")? {
        Some(street) => Some(ProjectAddress {
            street,
            city: get_optional_string(row, "project_city")?,
            region: get_optional_string(row, "project_region")?,
            reference: get_optional_string(row, "project_reference")?,
        }),
        None => None,
    };

    Ok(Quote {
        id: QuoteId(get_string(row, "id")?),
        user_id: UserId(get_string(row, "user_id")?),
        status,
        currency: get_string(row, "currency")?,
        total: get_amount(row, "total")?,
        valid_until: get_timestamp(row, "valid_until")?,
        contact,
        project_address,
        sent_at: get_optional_timestamp(row, "sent_at")?,
        version: sqlx::Row::try_get(row, "version").map_err(decode_error)?,
        items: Vec::new(),
        created_at: get_timestamp(row, "created_at")?,
        updated_at: get_timestamp(row, "updated_at")?,
    })
}

fn row_to_item(row: &SqliteRow) -> Result<QuoteItem, RepositoryError> {
    Ok(QuoteItem {
        id: QuoteItemId(get_string(row, "id")?),
        quote_id: QuoteId(get_string(row, "quote_id")?),
        model_id: ModelId(get_string(row, "model_id")?),
        glass_type_id: GlassTypeId(get_string(row, "glass_type_id")?),
        name: get_string(row, "name")?,
        width_mm: get_u32(row, "width_mm")?,
        height_mm: get_u32(row, "height_mm")?,
        quantity: get_u32(row, "quantity")?,
        subtotal: get_amount(row, "subtotal")?,
        services: Vec::new(),
        adjustments: Vec::new(),
        created_at: get_timestamp(row, "created_at")?,
    })
}

fn parse_unit(row: &SqliteRow) -> Result<MeasureUnit, RepositoryError> {
    let raw = get_string(row, "unit")?;
    MeasureUnit::parse(&raw).ok_or_else(|| decode_error(format!("unknown measure unit `{raw}`")))
}

fn row_to_service(row: &SqliteRow) -> Result<AppliedService, RepositoryError> {
    Ok(AppliedService {
        service_id: ServiceId(get_string(row, "service_id")?),
        name: get_string(row, "name")?,
        unit: parse_unit(row)?,
        quantity: get_amount(row, "quantity")?,
        rate: get_amount(row, "rate")?,
        amount: get_amount(row, "amount")?,
    })
}

fn row_to_adjustment(row: &SqliteRow) -> Result<AppliedAdjustment, RepositoryError> {
    let scope_raw = get_string(row, "scope")?;
    let scope = AdjustmentScope::parse(&scope_raw)
        .ok_or_else(|| decode_error(format!("unknown adjustment scope `{scope_raw}`")))?;
    let sign_raw = get_string(row, "sign")?;
    let sign = AdjustmentSign::parse(&sign_raw)
        .ok_or_else(|| decode_error(format!("unknown adjustment sign `{sign_raw}`")))?;

    Ok(AppliedAdjustment {
        scope,
        concept: get_string(row, "concept")?,
        sign,
        unit: parse_unit(row)?,
        value: get_amount(row, "value")?,
        amount: get_amount(row, "amount")?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use vitral_core::domain::catalog::{GlassTypeId, MeasureUnit, ModelId, ServiceId};
    use vitral_core::domain::quote::{
        AdjustmentScope, AdjustmentSign, AppliedAdjustment, AppliedService, ProjectAddress,
        Quote, QuoteId, QuoteItem, QuoteItemId, QuoteStatus, UserId, VendorContact,
    };

    use super::SqlQuoteRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        pool
    }

    fn draft_quote(id: &str) -> Quote {
        let now = Utc::now();
        Quote {
            id: QuoteId(id.to_string()),
            user_id: UserId("user-1".to_string()),
            status: QuoteStatus::Draft,
            currency: "COP".to_string(),
            total: Decimal::ZERO,
            valid_until: now + Duration::days(15),
            contact: None,
            project_address: Some(ProjectAddress {
                street: "Calle 10 # 20-30".to_string(),
                city: Some("Medellín".to_string()),
                region: None,
                reference: None,
            }),
            sent_at: None,
            version: 1,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn item(quote_id: &str, id: &str, subtotal: Decimal) -> QuoteItem {
        QuoteItem {
            id: QuoteItemId(id.to_string()),
            quote_id: QuoteId(quote_id.to_string()),
            model_id: ModelId("mdl-corrediza".to_string()),
            glass_type_id: GlassTypeId("gls-claro-6".to_string()),
            name: "Ventana corrediza".to_string(),
            width_mm: 1000,
            height_mm: 1500,
            quantity: 1,
            subtotal,
            services: vec![AppliedService {
                service_id: ServiceId("svc-instalacion".to_string()),
                name: "Instalación".to_string(),
                unit: MeasureUnit::Unit,
                quantity: Decimal::ONE,
                rate: Decimal::new(15, 0),
                amount: Decimal::new(15, 0),
            }],
            adjustments: vec![AppliedAdjustment {
                scope: AdjustmentScope::Item,
                concept: "Descuento obra".to_string(),
                sign: AdjustmentSign::Negative,
                unit: MeasureUnit::Unit,
                value: Decimal::new(10, 0),
                amount: Decimal::new(-10, 0),
            }],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn aggregate_round_trips_with_children_in_order() {
        let pool = pool().await;
        let repo = SqlQuoteRepository::new();
        let mut conn = pool.acquire().await.expect("acquire");

        repo.insert_quote(&mut conn, &draft_quote("quote-1")).await.expect("insert quote");
        repo.insert_item(&mut conn, &item("quote-1", "item-a", Decimal::new(26755, 2)))
            .await
            .expect("insert a");
        repo.insert_item(&mut conn, &item("quote-1", "item-b", Decimal::new(10000, 2)))
            .await
            .expect("insert b");

        let quote = repo
            .find_quote(&mut conn, &QuoteId("quote-1".to_string()))
            .await
            .expect("load")
            .expect("exists");

        assert_eq!(quote.items.len(), 2);
        assert_eq!(quote.items[0].id.0, "item-a");
        assert_eq!(quote.items[1].id.0, "item-b");
        assert_eq!(quote.items[0].services.len(), 1);
        assert_eq!(quote.items[0].adjustments[0].amount, Decimal::new(-10, 0));
        assert_eq!(
            quote.project_address.as_ref().and_then(|address| address.city.as_deref()),
            Some("Medellín")
        );
    }

    #[tokio::test]
    async fn recompute_total_sums_items_and_bumps_version() {
        let pool = pool().await;
        let repo = SqlQuoteRepository::new();
        let mut conn = pool.acquire().await.expect("acquire");
        let id = QuoteId("quote-1".to_string());

        repo.insert_quote(&mut conn, &draft_quote("quote-1")).await.expect("insert quote");
        repo.insert_item(&mut conn, &item("quote-1", "item-a", Decimal::new(26255, 2)))
            .await
            .expect("insert a");
        repo.insert_item(&mut conn, &item("quote-1", "item-b", Decimal::new(1545, 1)))
            .await
            .expect("insert b");

        let total = repo.recompute_total(&mut conn, &id, Utc::now()).await.expect("recompute");
        assert_eq!(total, Some(Decimal::new(41705, 2)));

        let quote = repo.find_quote(&mut conn, &id).await.expect("load").expect("exists");
        assert_eq!(quote.total, Decimal::new(41705, 2));
        assert_eq!(quote.version, 2);
    }

    #[tokio::test]
    async fn stale_version_cannot_transition() {
        let pool = pool().await;
        let repo = SqlQuoteRepository::new();
        let mut conn = pool.acquire().await.expect("acquire");
        let id = QuoteId("quote-1".to_string());

        repo.insert_quote(&mut conn, &draft_quote("quote-1")).await.expect("insert quote");
        repo.insert_item(&mut conn, &item("quote-1", "item-a", Decimal::new(100, 0)))
            .await
            .expect("insert item");

        let loaded = repo.find_quote(&mut conn, &id).await.expect("load").expect("exists");
        let contact = VendorContact { phone: "3001234567".to_string(), email: None };

        let mut first = loaded.clone();
        first.mark_sent(contact.clone(), Utc::now()).expect("draft -> sent");
        let mut second = loaded.clone();
        second.mark_sent(contact, Utc::now()).expect("draft -> sent");

        assert!(repo.update_status(&mut conn, &first, loaded.version).await.expect("first"));
        assert!(!repo.update_status(&mut conn, &second, loaded.version).await.expect("second"));

        let stored = repo.find_quote(&mut conn, &id).await.expect("load").expect("exists");
        assert_eq!(stored.status, QuoteStatus::Sent);
        assert!(stored.sent_at.is_some());
    }

    #[tokio::test]
    async fn recompute_refuses_non_draft_quotes() {
        let pool = pool().await;
        let repo = SqlQuoteRepository::new();
        let mut conn = pool.acquire().await.expect("acquire");
        let id = QuoteId("quote-1".to_string());

        repo.insert_quote(&mut conn, &draft_quote("quote-1")).await.expect("insert quote");
        let mut canceled = repo.find_quote(&mut conn, &id).await.expect("load").expect("exists");
        canceled.mark_canceled(Utc::now()).expect("draft -> canceled");
        assert!(repo.update_status(&mut conn, &canceled, 1).await.expect("cancel"));

        let total = repo.recompute_total(&mut conn, &id, Utc::now()).await.expect("recompute");
        assert_eq!(total, None);
    }
}
