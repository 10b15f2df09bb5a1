pub mod config;
pub mod cpq;
pub mod domain;
pub mod errors;
pub mod events;

pub use cpq::metadata::{resolve_quote_metadata, QuoteMetadata, TenantSettings};
pub use cpq::pricing::{calculate_price_item, PriceBreakdown, PriceItemInput};
pub use cpq::{price_configuration, ItemConfiguration, ServiceSelection};
pub use domain::catalog::{GlassType, GlassTypeId, Model, ModelId, Service, ServiceId};
pub use domain::quote::{Quote, QuoteId, QuoteItem, QuoteStatus, UserId, VendorContact};
pub use errors::{ApplicationError, DomainError, ErrorKind, InterfaceError};
pub use events::{QuoteEvent, QuoteEventSink, SentQuoteNotice, VendorNotifier};
