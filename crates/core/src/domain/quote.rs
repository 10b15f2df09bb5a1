use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{GlassTypeId, MeasureUnit, ModelId, ServiceId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteItemId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Canceled,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Canceled => "canceled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "sent" => Some(Self::Sent),
            "canceled" | "cancelled" => Some(Self::Canceled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Canceled)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentSign {
    Positive,
    Negative,
}

impl AdjustmentSign {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }
}

/// Where a persisted adjustment row is attached. Pricing ignores it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentScope {
    Item,
    Quote,
}

impl AdjustmentScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Quote => "quote",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "item" => Some(Self::Item),
            "quote" => Some(Self::Quote),
            _ => None,
        }
    }
}

/// A manual, signed price correction as requested by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub concept: String,
    pub sign: AdjustmentSign,
    pub unit: MeasureUnit,
    pub value: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppliedService {
    pub service_id: ServiceId,
    pub name: String,
    pub unit: MeasureUnit,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppliedAdjustment {
    pub scope: AdjustmentScope,
    pub concept: String,
    pub sign: AdjustmentSign,
    pub unit: MeasureUnit,
    pub value: Decimal,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectAddress {
    pub street: String,
    pub city: Option<String>,
    pub region: Option<String>,
    pub reference: Option<String>,
}

/// One priced configuration inside a quote. `subtotal` is frozen at creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteItem {
    pub id: QuoteItemId,
    pub quote_id: QuoteId,
    pub model_id: ModelId,
    pub glass_type_id: GlassTypeId,
    pub name: String,
    pub width_mm: u32,
    pub height_mm: u32,
    pub quantity: u32,
    pub subtotal: Decimal,
    pub services: Vec<AppliedService>,
    pub adjustments: Vec<AppliedAdjustment>,
    pub created_at: DateTime<Utc>,
}

/// A line already priced in the customer's cart, carried into a quote as-is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub model_id: ModelId,
    pub glass_type_id: GlassTypeId,
    pub name: String,
    pub width_mm: u32,
    pub height_mm: u32,
    pub quantity: u32,
    pub subtotal: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorContact {
    pub phone: String,
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub user_id: UserId,
    pub status: QuoteStatus,
    pub currency: String,
    pub total: Decimal,
    pub valid_until: DateTime<Utc>,
    pub contact: Option<VendorContact>,
    pub project_address: Option<ProjectAddress>,
    pub sent_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub items: Vec<QuoteItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn is_draft(&self) -> bool {
        self.status == QuoteStatus::Draft
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    pub fn items_total(&self) -> Decimal {
        self.items.iter().map(|item| item.subtotal).sum()
    }

    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        matches!(
            (self.status, next),
            (QuoteStatus::Draft, QuoteStatus::Sent) | (QuoteStatus::Draft, QuoteStatus::Canceled)
        )
    }

    pub fn transition_to(&mut self, next: QuoteStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidQuoteTransition { from: self.status, to: next })
    }

    /// Applies the one-way draft -> sent transition, stamping contact data and `sent_at`.
    pub fn mark_sent(
        &mut self,
        contact: VendorContact,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.transition_to(QuoteStatus::Sent)?;
        self.contact = Some(contact);
        self.sent_at = Some(at);
        self.updated_at = at;
        Ok(())
    }

    pub fn mark_canceled(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition_to(QuoteStatus::Canceled)?;
        self.updated_at = at;
        Ok(())
    }
}
