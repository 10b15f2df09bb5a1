//! Quote lifecycle orchestration.
//!
//! Validation and catalog lookups run before a transaction opens. Each mutation
//! then writes the quote, its items and the recomputed total in one transaction,
//! and events are published only after that transaction commits.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{Sqlite, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use vitral_core::cpq::metadata::{cart_total, resolve_quote_metadata, TenantSettings};
use vitral_core::cpq::pricing::PriceBreakdown;
use vitral_core::cpq::validation::{
    validate_cart_items_count, validate_cart_not_empty, validate_draft_mutation_requirements,
    validate_quantity, validate_quote_exists, validate_quote_ownership,
    validate_send_to_vendor_requirements, validate_vendor_contact, QuoteOperation,
};
use vitral_core::cpq::{price_configuration, ItemConfiguration};
use vitral_core::domain::catalog::{GlassType, Model, Service, ServiceId};
use vitral_core::domain::quote::{
    AdjustmentScope, AppliedAdjustment, AppliedService, CartItem, ProjectAddress, Quote, QuoteId,
    QuoteItem, QuoteItemId, QuoteStatus, UserId, VendorContact,
};
use vitral_core::errors::{ApplicationError, DomainError};
use vitral_core::events::{NoopQuoteEventSink, QuoteEvent, QuoteEventSink, SentQuoteNotice};

use crate::repositories::{CatalogRepository, RepositoryError, SqlQuoteRepository};
use crate::DbPool;

#[derive(Clone, Debug)]
pub struct GenerateQuoteRequest {
    pub user_id: UserId,
    pub cart_items: Vec<CartItem>,
    pub project_address: Option<ProjectAddress>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GeneratedQuote {
    pub quote_id: QuoteId,
    pub valid_until: DateTime<Utc>,
    pub total: Decimal,
    pub item_count: usize,
}

#[derive(Clone, Debug)]
pub struct AddItemRequest {
    /// `None` opens a new draft quote for the item.
    pub quote_id: Option<QuoteId>,
    pub user_id: UserId,
    pub configuration: ItemConfiguration,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AddedItem {
    pub item_id: QuoteItemId,
    pub quote_id: QuoteId,
    pub subtotal: Decimal,
    pub quote_total: Decimal,
}

#[derive(Clone, Debug)]
pub struct SendQuoteRequest {
    pub quote_id: QuoteId,
    pub user_id: UserId,
    pub contact_phone: String,
    pub contact_email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SentQuote {
    pub id: QuoteId,
    pub status: QuoteStatus,
    pub sent_at: DateTime<Utc>,
    pub total: Decimal,
    pub currency: String,
    pub contact_phone: String,
    pub contact_email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PricePreview {
    pub breakdown: PriceBreakdown,
    pub quantity: u32,
    pub line_subtotal: Decimal,
}

pub struct QuoteLifecycleService {
    pool: DbPool,
    catalog: Arc<dyn CatalogRepository>,
    quotes: SqlQuoteRepository,
    settings: TenantSettings,
    events: Arc<dyn QuoteEventSink>,
}

impl QuoteLifecycleService {
    pub fn new(pool: DbPool, catalog: Arc<dyn CatalogRepository>, settings: TenantSettings) -> Self {
        Self {
            pool,
            catalog,
            quotes: SqlQuoteRepository::new(),
            settings,
            events: Arc::new(NoopQuoteEventSink),
        }
    }

    pub fn with_event_sink(mut self, events: Arc<dyn QuoteEventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn settings(&self) -> &TenantSettings {
        &self.settings
    }

    /// Opens an empty draft quote.
    pub async fn create_draft_quote(
        &self,
        user_id: UserId,
        project_address: Option<ProjectAddress>,
    ) -> Result<Quote, ApplicationError> {
        let correlation_id = new_correlation_id();
        let quote = self.new_draft(user_id, project_address, Decimal::ZERO, Utc::now());

        let mut tx = self.begin().await?;
        self.quotes.insert_quote(&mut tx, &quote).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(
            event_name = "quote.created",
            correlation_id = %correlation_id,
            quote_id = %quote.id.0,
            user_id = %quote.user_id.0,
            item_count = 0,
            "draft quote created"
        );

        Ok(quote)
    }

    /// Turns an already priced cart into a draft quote. Cart subtotals are copied, not re-priced.
    pub async fn generate_quote_from_cart(
        &self,
        request: GenerateQuoteRequest,
    ) -> Result<GeneratedQuote, ApplicationError> {
        let correlation_id = new_correlation_id();

        validate_cart_not_empty(&request.cart_items)?;
        validate_cart_items_count(request.cart_items.len(), self.settings.max_cart_items)?;
        for cart_item in &request.cart_items {
            validate_quantity(cart_item.quantity)?;
        }

        let now = Utc::now();
        let total = cart_total(&request.cart_items);
        let quote = self.new_draft(request.user_id, request.project_address, total, now);

        let mut tx = self.begin().await?;
        self.quotes.insert_quote(&mut tx, &quote).await?;
        for cart_item in &request.cart_items {
            let item = QuoteItem {
                id: new_item_id(),
                quote_id: quote.id.clone(),
                model_id: cart_item.model_id.clone(),
                glass_type_id: cart_item.glass_type_id.clone(),
                name: cart_item.name.clone(),
                width_mm: cart_item.width_mm,
                height_mm: cart_item.height_mm,
                quantity: cart_item.quantity,
                subtotal: cart_item.subtotal,
                services: Vec::new(),
                adjustments: Vec::new(),
                created_at: now,
            };
            self.quotes.insert_item(&mut tx, &item).await?;
        }
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(
            event_name = "quote.created",
            correlation_id = %correlation_id,
            quote_id = %quote.id.0,
            user_id = %quote.user_id.0,
            item_count = request.cart_items.len(),
            total = %total,
            "quote generated from cart"
        );

        Ok(GeneratedQuote {
            quote_id: quote.id,
            valid_until: quote.valid_until,
            total,
            item_count: request.cart_items.len(),
        })
    }

    /// Prices a configuration and appends it to a draft quote, creating the quote when needed.
    pub async fn add_item_to_quote(
        &self,
        request: AddItemRequest,
    ) -> Result<AddedItem, ApplicationError> {
        let correlation_id = new_correlation_id();

        // Quote checks come before catalog checks so a stranger learns nothing about the item.
        if let Some(quote_id) = &request.quote_id {
            let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
            let existing = self.quotes.find_quote(&mut conn, quote_id).await?;
            validate_draft_mutation_requirements(
                existing.as_ref(),
                quote_id,
                &request.user_id,
                QuoteOperation::AddItem,
            )?;
        }

        let (model, glass, services) = self.resolve_catalog(&request.configuration).await?;
        let breakdown = price_configuration(&request.configuration, &model, &glass, &services)?;
        let subtotal = breakdown.line_subtotal(request.configuration.quantity);
        let now = Utc::now();

        let mut tx = self.begin().await?;
        let quote_id = match request.quote_id {
            Some(quote_id) => {
                // The quote may have moved on since the pre-check.
                let current = self.quotes.find_quote(&mut tx, &quote_id).await?;
                validate_draft_mutation_requirements(
                    current.as_ref(),
                    &quote_id,
                    &request.user_id,
                    QuoteOperation::AddItem,
                )?;
                quote_id
            }
            None => {
                let quote = self.new_draft(request.user_id.clone(), None, Decimal::ZERO, now);
                self.quotes.insert_quote(&mut tx, &quote).await?;
                quote.id
            }
        };

        let item = QuoteItem {
            id: new_item_id(),
            quote_id: quote_id.clone(),
            model_id: model.id.clone(),
            glass_type_id: glass.id.clone(),
            name: model.name.clone(),
            width_mm: request.configuration.width_mm,
            height_mm: request.configuration.height_mm,
            quantity: request.configuration.quantity,
            subtotal,
            services: applied_services(&breakdown),
            adjustments: applied_adjustments(&breakdown),
            created_at: now,
        };
        self.quotes.insert_item(&mut tx, &item).await?;

        let Some(quote_total) = self.quotes.recompute_total(&mut tx, &quote_id, now).await? else {
            return Err(
                DomainError::invalid_state(QuoteOperation::AddItem.not_draft_message()).into()
            );
        };
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(
            event_name = "quote.item_added",
            correlation_id = %correlation_id,
            quote_id = %quote_id.0,
            user_id = %request.user_id.0,
            item_id = %item.id.0,
            subtotal = %subtotal,
            total = %quote_total,
            "item added to quote"
        );

        Ok(AddedItem { item_id: item.id, quote_id, subtotal, quote_total })
    }

    /// One-way draft -> sent transition. Notification happens after commit and cannot undo it.
    pub async fn send_quote_to_vendor(
        &self,
        request: SendQuoteRequest,
    ) -> Result<SentQuote, ApplicationError> {
        let correlation_id = new_correlation_id();
        let contact = VendorContact {
            phone: request.contact_phone.trim().to_string(),
            email: request
                .contact_email
                .map(|email| email.trim().to_string())
                .filter(|email| !email.is_empty()),
        };
        validate_vendor_contact(&contact)?;

        let now = Utc::now();
        let mut tx = self.begin().await?;
        let loaded = self.quotes.find_quote(&mut tx, &request.quote_id).await?;
        let quote =
            validate_send_to_vendor_requirements(loaded.as_ref(), &request.quote_id, &request.user_id)?;

        let expected_version = quote.version;
        let mut sent = quote.clone();
        sent.mark_sent(contact.clone(), now)?;

        if !self.quotes.update_status(&mut tx, &sent, expected_version).await? {
            return Err(DomainError::invalid_state(QuoteOperation::Send.not_draft_message()).into());
        }
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(
            event_name = "quote.sent",
            correlation_id = %correlation_id,
            quote_id = %sent.id.0,
            user_id = %sent.user_id.0,
            total = %sent.total,
            item_count = sent.items.len(),
            "quote sent to vendor"
        );

        self.publish(
            QuoteEvent::QuoteSent(SentQuoteNotice::new(
                sent.id.clone(),
                sent.user_id.clone(),
                sent.currency.clone(),
                sent.total,
                sent.items.len(),
                contact.clone(),
                now,
            )),
            &correlation_id,
        );

        Ok(SentQuote {
            id: sent.id,
            status: sent.status,
            sent_at: now,
            total: sent.total,
            currency: sent.currency,
            contact_phone: contact.phone,
            contact_email: contact.email,
        })
    }

    /// Draft -> canceled. Canceled quotes accept no further changes.
    pub async fn cancel_quote(
        &self,
        quote_id: &QuoteId,
        user_id: &UserId,
    ) -> Result<Quote, ApplicationError> {
        let correlation_id = new_correlation_id();
        let now = Utc::now();

        let mut tx = self.begin().await?;
        let loaded = self.quotes.find_quote(&mut tx, quote_id).await?;
        let quote = validate_draft_mutation_requirements(
            loaded.as_ref(),
            quote_id,
            user_id,
            QuoteOperation::Cancel,
        )?;

        let expected_version = quote.version;
        let mut canceled = quote.clone();
        canceled.mark_canceled(now)?;

        if !self.quotes.update_status(&mut tx, &canceled, expected_version).await? {
            return Err(
                DomainError::invalid_state(QuoteOperation::Cancel.not_draft_message()).into()
            );
        }
        tx.commit().await.map_err(RepositoryError::from)?;
        canceled.version = expected_version + 1;

        info!(
            event_name = "quote.canceled",
            correlation_id = %correlation_id,
            quote_id = %canceled.id.0,
            user_id = %canceled.user_id.0,
            "quote canceled"
        );

        self.publish(
            QuoteEvent::QuoteCanceled {
                quote_id: canceled.id.clone(),
                user_id: canceled.user_id.clone(),
                canceled_at: now,
            },
            &correlation_id,
        );

        Ok(canceled)
    }

    pub async fn get_quote(
        &self,
        quote_id: &QuoteId,
        user_id: &UserId,
    ) -> Result<Quote, ApplicationError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        let loaded = self.quotes.find_quote(&mut conn, quote_id).await?;
        let quote = validate_quote_exists(loaded.as_ref(), quote_id)?;
        validate_quote_ownership(quote, user_id)?;
        Ok(quote.clone())
    }

    /// Prices a configuration against the live catalog without writing anything.
    pub async fn preview_price(
        &self,
        configuration: &ItemConfiguration,
    ) -> Result<PricePreview, ApplicationError> {
        let (model, glass, services) = self.resolve_catalog(configuration).await?;
        let breakdown = price_configuration(configuration, &model, &glass, &services)?;
        let line_subtotal = breakdown.line_subtotal(configuration.quantity);

        Ok(PricePreview { breakdown, quantity: configuration.quantity, line_subtotal })
    }

    /// Write transaction that takes SQLite's write lock at `BEGIN`. Concurrent writers
    /// queue on `busy_timeout` instead of failing a deferred lock upgrade with `SQLITE_BUSY`.
    async fn begin(&self) -> Result<Transaction<'static, Sqlite>, ApplicationError> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await.map_err(RepositoryError::from)?)
    }

    async fn resolve_catalog(
        &self,
        configuration: &ItemConfiguration,
    ) -> Result<(Model, GlassType, Vec<Service>), ApplicationError> {
        let model = self
            .catalog
            .find_model(&configuration.model_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Modelo", configuration.model_id.0.clone()))?;
        let glass =
            self.catalog.find_glass_type(&configuration.glass_type_id).await?.ok_or_else(|| {
                DomainError::not_found("Tipo de vidrio", configuration.glass_type_id.0.clone())
            })?;

        let service_ids: Vec<ServiceId> =
            configuration.services.iter().map(|selection| selection.service_id.clone()).collect();
        let services = self.catalog.find_services(&service_ids).await?;

        Ok((model, glass, services))
    }

    fn new_draft(
        &self,
        user_id: UserId,
        project_address: Option<ProjectAddress>,
        total: Decimal,
        now: DateTime<Utc>,
    ) -> Quote {
        let metadata = resolve_quote_metadata(&self.settings, now);
        Quote {
            id: QuoteId(format!("quote-{}", Uuid::new_v4())),
            user_id,
            status: QuoteStatus::Draft,
            currency: metadata.currency,
            total,
            valid_until: metadata.valid_until,
            contact: None,
            project_address,
            sent_at: None,
            version: 1,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn publish(&self, event: QuoteEvent, correlation_id: &str) {
        let source_event = event.event_name();
        let quote_id = event.quote_id().0.clone();

        if let Err(error) = self.events.publish(event) {
            warn!(
                event_name = "quote.notification_failed",
                correlation_id = %correlation_id,
                quote_id = %quote_id,
                source_event,
                error = %error,
                "quote event not delivered; the transition is already committed"
            );
        }
    }
}

fn applied_services(breakdown: &PriceBreakdown) -> Vec<AppliedService> {
    breakdown
        .services
        .iter()
        .map(|line| AppliedService {
            service_id: line.service_id.clone(),
            name: line.name.clone(),
            unit: line.unit,
            quantity: line.quantity,
            rate: line.rate,
            amount: line.amount,
        })
        .collect()
}

fn applied_adjustments(breakdown: &PriceBreakdown) -> Vec<AppliedAdjustment> {
    breakdown
        .adjustments
        .iter()
        .map(|line| AppliedAdjustment {
            scope: AdjustmentScope::Item,
            concept: line.concept.clone(),
            sign: line.sign,
            unit: line.unit,
            value: line.value,
            amount: line.amount,
        })
        .collect()
}

fn new_item_id() -> QuoteItemId {
    QuoteItemId(format!("item-{}", Uuid::new_v4()))
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}
