use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use thiserror::Error;

use vitral_core::domain::catalog::{GlassType, GlassTypeId, Model, ModelId, Service, ServiceId};
use vitral_core::errors::ApplicationError;

pub mod catalog;
pub mod memory;
pub mod quote;

pub use catalog::SqlCatalogRepository;
pub use memory::InMemoryCatalogRepository;
pub use quote::SqlQuoteRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

/// Read side of the product catalog. The quoting core never writes through it.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_model(&self, id: &ModelId) -> Result<Option<Model>, RepositoryError>;

    async fn find_glass_type(&self, id: &GlassTypeId)
        -> Result<Option<GlassType>, RepositoryError>;

    /// Returns the services that exist among `ids`; unknown ids are skipped.
    async fn find_services(&self, ids: &[ServiceId]) -> Result<Vec<Service>, RepositoryError>;
}

pub(crate) fn decode_error(error: impl ToString) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

pub(crate) fn get_string(row: &SqliteRow, column: &str) -> Result<String, RepositoryError> {
    row.try_get(column).map_err(decode_error)
}

pub(crate) fn get_optional_string(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<String>, RepositoryError> {
    row.try_get(column).map_err(decode_error)
}

pub(crate) fn get_u32(row: &SqliteRow, column: &str) -> Result<u32, RepositoryError> {
    let value: i64 = row.try_get(column).map_err(decode_error)?;
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!("column `{column}` out of range for u32: {value}"))
    })
}

pub(crate) fn get_amount(row: &SqliteRow, column: &str) -> Result<Decimal, RepositoryError> {
    let raw = get_string(row, column)?;
    parse_amount(column, &raw)
}

pub(crate) fn get_optional_amount(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<Decimal>, RepositoryError> {
    get_optional_string(row, column)?.map(|raw| parse_amount(column, &raw)).transpose()
}

pub(crate) fn parse_amount(column: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw.trim()).map_err(|error| {
        RepositoryError::Decode(format!("column `{column}` is not a decimal (`{raw}`): {error}"))
    })
}

pub(crate) fn get_timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, RepositoryError> {
    let raw = get_string(row, column)?;
    parse_timestamp(column, &raw)
}

pub(crate) fn get_optional_timestamp(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    get_optional_string(row, column)?.map(|raw| parse_timestamp(column, &raw)).transpose()
}

fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).map_err(|error| {
        RepositoryError::Decode(format!("column `{column}` is not RFC 3339 (`{raw}`): {error}"))
    })
}
