//! Quote lifecycle events emitted after a transaction commits.
//!
//! Publishing is decoupled from delivery: the lifecycle service hands events to a
//! [`QuoteEventSink`] and moves on; a [`VendorNotifier`] delivers them elsewhere.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::quote::{QuoteId, UserId, VendorContact};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentQuoteNotice {
    pub event_id: String,
    pub quote_id: QuoteId,
    pub user_id: UserId,
    pub currency: String,
    pub total: Decimal,
    pub item_count: usize,
    pub contact: VendorContact,
    pub sent_at: DateTime<Utc>,
}

impl SentQuoteNotice {
    pub fn new(
        quote_id: QuoteId,
        user_id: UserId,
        currency: impl Into<String>,
        total: Decimal,
        item_count: usize,
        contact: VendorContact,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            quote_id,
            user_id,
            currency: currency.into(),
            total,
            item_count,
            contact,
            sent_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum QuoteEvent {
    QuoteSent(SentQuoteNotice),
    QuoteCanceled { quote_id: QuoteId, user_id: UserId, canceled_at: DateTime<Utc> },
}

impl QuoteEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::QuoteSent(_) => "quote.sent",
            Self::QuoteCanceled { .. } => "quote.canceled",
        }
    }

    pub fn quote_id(&self) -> &QuoteId {
        match self {
            Self::QuoteSent(notice) => &notice.quote_id,
            Self::QuoteCanceled { quote_id, .. } => quote_id,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EventPublishError {
    #[error("event channel is closed")]
    Closed,
    #[error("event rejected: {0}")]
    Rejected(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("vendor notification transport failed: {0}")]
    Transport(String),
    #[error("vendor endpoint rejected notification with status {status}")]
    Rejected { status: u16 },
}

pub trait QuoteEventSink: Send + Sync {
    fn publish(&self, event: QuoteEvent) -> Result<(), EventPublishError>;
}

#[async_trait::async_trait]
pub trait VendorNotifier: Send + Sync {
    async fn notify_vendor(&self, notice: &SentQuoteNotice) -> Result<(), NotificationError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopQuoteEventSink;

impl QuoteEventSink for NoopQuoteEventSink {
    fn publish(&self, _event: QuoteEvent) -> Result<(), EventPublishError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryQuoteEventSink {
    events: Arc<Mutex<Vec<QuoteEvent>>>,
}

impl InMemoryQuoteEventSink {
    pub fn events(&self) -> Vec<QuoteEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl QuoteEventSink for InMemoryQuoteEventSink {
    fn publish(&self, event: QuoteEvent) -> Result<(), EventPublishError> {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
        Ok(())
    }
}

/// Sink that refuses every event; stands in for a broken notification channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingQuoteEventSink;

impl QuoteEventSink for FailingQuoteEventSink {
    fn publish(&self, _event: QuoteEvent) -> Result<(), EventPublishError> {
        Err(EventPublishError::Closed)
    }
}
