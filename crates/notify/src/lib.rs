//! Post-commit vendor notification for sent quotes.
//!
//! The lifecycle service publishes into a [`ChannelEventSink`]; a
//! [`VendorDispatcher`] task drains the channel and hands each sent quote to a
//! [`VendorNotifier`](vitral_core::events::VendorNotifier). Delivery failures are
//! logged and dropped.

pub mod channel;
pub mod notifier;

pub use channel::{ChannelEventSink, DispatchSummary, VendorDispatcher};
pub use notifier::{
    notifier_from_config, LogVendorNotifier, NotifierSetupError, WebhookVendorNotifier,
};
