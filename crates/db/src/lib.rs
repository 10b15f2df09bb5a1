pub mod connection;
pub mod fixtures;
pub mod lifecycle;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{CatalogSeed, SeedResult, VerificationResult};
pub use lifecycle::{
    AddItemRequest, AddedItem, GenerateQuoteRequest, GeneratedQuote, PricePreview,
    QuoteLifecycleService, SendQuoteRequest, SentQuote,
};
