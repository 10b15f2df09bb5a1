use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vitral_core::events::{EventPublishError, QuoteEvent, QuoteEventSink, VendorNotifier};

/// Event sink backed by an unbounded tokio channel. Publishing never blocks.
#[derive(Clone, Debug)]
pub struct ChannelEventSink {
    sender: UnboundedSender<QuoteEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, UnboundedReceiver<QuoteEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl QuoteEventSink for ChannelEventSink {
    fn publish(&self, event: QuoteEvent) -> Result<(), EventPublishError> {
        self.sender.send(event).map_err(|_| EventPublishError::Closed)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub struct VendorDispatcher {
    receiver: UnboundedReceiver<QuoteEvent>,
    notifier: Arc<dyn VendorNotifier>,
}

impl VendorDispatcher {
    pub fn new(receiver: UnboundedReceiver<QuoteEvent>, notifier: Arc<dyn VendorNotifier>) -> Self {
        Self { receiver, notifier }
    }

    /// Runs until every sender is dropped and the channel is empty.
    pub async fn run(mut self) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        while let Some(event) = self.receiver.recv().await {
            let notice = match event {
                QuoteEvent::QuoteSent(notice) => notice,
                other => {
                    debug!(
                        event_name = "notify.skipped",
                        source_event = other.event_name(),
                        quote_id = %other.quote_id().0,
                        "event does not notify the vendor"
                    );
                    summary.skipped += 1;
                    continue;
                }
            };

            match self.notifier.notify_vendor(&notice).await {
                Ok(()) => {
                    info!(
                        event_name = "notify.delivered",
                        quote_id = %notice.quote_id.0,
                        event_id = %notice.event_id,
                        "vendor notified"
                    );
                    summary.delivered += 1;
                }
                Err(error) => {
                    warn!(
                        event_name = "quote.notification_failed",
                        quote_id = %notice.quote_id.0,
                        event_id = %notice.event_id,
                        error = %error,
                        "vendor notification failed; quote remains sent"
                    );
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    pub fn spawn(self) -> JoinHandle<DispatchSummary> {
        tokio::spawn(self.run())
    }
}
