use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::quote::{CartItem, QuoteItem};

/// Tenant-level quoting parameters, passed explicitly to every operation that needs them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings {
    pub currency: String,
    /// Days a new quote stays valid. Windows past chrono's range end at `DateTime::MAX_UTC`.
    pub quote_validity_days: u32,
    pub max_cart_items: usize,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            currency: "COP".to_string(),
            quote_validity_days: 15,
            max_cart_items: crate::cpq::validation::MAX_CART_ITEMS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteMetadata {
    pub currency: String,
    pub valid_until: DateTime<Utc>,
}

pub fn resolve_quote_metadata(settings: &TenantSettings, now: DateTime<Utc>) -> QuoteMetadata {
    QuoteMetadata {
        currency: settings.currency.clone(),
        valid_until: now
            .checked_add_signed(Duration::days(i64::from(settings.quote_validity_days)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
    }
}

/// Sum of the subtotals locked when each line entered the cart. Never re-prices.
pub fn cart_total(items: &[CartItem]) -> Decimal {
    items.iter().map(|item| item.subtotal).sum()
}

pub fn quote_items_total(items: &[QuoteItem]) -> Decimal {
    items.iter().map(|item| item.subtotal).sum()
}
