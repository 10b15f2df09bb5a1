use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::info;

use vitral_core::config::NotificationConfig;
use vitral_core::events::{NotificationError, SentQuoteNotice, VendorNotifier};

/// Writes the notice to the log. Used when no webhook is configured.
#[derive(Clone, Debug, Default)]
pub struct LogVendorNotifier {
    vendor_email: Option<String>,
}

impl LogVendorNotifier {
    pub fn new(vendor_email: Option<String>) -> Self {
        Self { vendor_email }
    }
}

#[async_trait::async_trait]
impl VendorNotifier for LogVendorNotifier {
    async fn notify_vendor(&self, notice: &SentQuoteNotice) -> Result<(), NotificationError> {
        info!(
            event_name = "notify.vendor_logged",
            quote_id = %notice.quote_id.0,
            user_id = %notice.user_id.0,
            total = %notice.total,
            currency = %notice.currency,
            item_count = notice.item_count,
            contact_phone = %notice.contact.phone,
            vendor_email = self.vendor_email.as_deref().unwrap_or("-"),
            "quote ready for vendor follow-up"
        );
        Ok(())
    }
}

/// POSTs the notice as JSON to a vendor webhook.
#[derive(Clone, Debug)]
pub struct WebhookVendorNotifier {
    http: Client,
    url: String,
    token: Option<SecretString>,
}

impl WebhookVendorNotifier {
    pub fn new(
        url: impl Into<String>,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, NotifierSetupError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url: url.into(), token })
    }
}

#[async_trait::async_trait]
impl VendorNotifier for WebhookVendorNotifier {
    async fn notify_vendor(&self, notice: &SentQuoteNotice) -> Result<(), NotificationError> {
        let mut request = self.http.post(&self.url).json(notice);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|error| NotificationError::Transport(error.to_string()))?;

        if !response.status().is_success() {
            return Err(NotificationError::Rejected { status: response.status().as_u16() });
        }

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum NotifierSetupError {
    #[error("failed to build webhook client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Picks the webhook notifier when a URL is configured, the log notifier otherwise.
pub fn notifier_from_config(
    config: &NotificationConfig,
) -> Result<Arc<dyn VendorNotifier>, NotifierSetupError> {
    match &config.webhook_url {
        Some(url) => Ok(Arc::new(WebhookVendorNotifier::new(
            url.clone(),
            config.webhook_token.clone(),
            Duration::from_secs(config.timeout_secs),
        )?)),
        None => Ok(Arc::new(LogVendorNotifier::new(config.vendor_email.clone()))),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use vitral_core::domain::quote::{QuoteId, UserId, VendorContact};
    use vitral_core::events::{NotificationError, SentQuoteNotice, VendorNotifier};

    use super::{LogVendorNotifier, WebhookVendorNotifier};

    fn notice() -> SentQuoteNotice {
        SentQuoteNotice::new(
            QuoteId("quote-42".to_string()),
            UserId("user-1".to_string()),
            "COP",
            Decimal::new(26255, 2),
            1,
            VendorContact { phone: "3001234567".to_string(), email: None },
            Utc::now(),
        )
    }

    /// Accepts one request, answers with `status_line`, and returns the raw request text.
    async fn one_shot_server(status_line: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let url = format!("http://{}/hooks/quotes", listener.local_addr().expect("addr"));

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut received = Vec::new();
            let mut buffer = [0_u8; 4096];
            loop {
                let read = socket.read(&mut buffer).await.expect("read");
                if read == 0 {
                    break;
                }
                received.extend_from_slice(&buffer[..read]);
                if request_complete(&received) {
                    break;
                }
            }
            let response = format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\n\r\n");
            socket.write_all(response.as_bytes()).await.expect("write");
            String::from_utf8_lossy(&received).into_owned()
        });

        (url, handle)
    }

    fn request_complete(received: &[u8]) -> bool {
        let text = String::from_utf8_lossy(received);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse().ok())?
            })
            .unwrap_or(0_usize);
        received.len() >= header_end + 4 + content_length
    }

    #[tokio::test]
    async fn webhook_posts_json_with_bearer_token() {
        let (url, server) = one_shot_server("202 Accepted").await;
        let notifier = WebhookVendorNotifier::new(
            url,
            Some(SecretString::from("s3cr3t".to_string())),
            Duration::from_secs(5),
        )
        .expect("client");

        notifier.notify_vendor(&notice()).await.expect("delivered");

        let request = server.await.expect("server task");
        assert!(request.starts_with("POST /hooks/quotes"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer s3cr3t"));
        assert!(request.contains("\"quote_id\":\"quote-42\""));
    }

    #[tokio::test]
    async fn webhook_non_success_status_is_rejected() {
        let (url, server) = one_shot_server("503 Service Unavailable").await;
        let notifier =
            WebhookVendorNotifier::new(url, None, Duration::from_secs(5)).expect("client");

        let error = notifier.notify_vendor(&notice()).await.expect_err("rejected");

        assert_eq!(error, NotificationError::Rejected { status: 503 });
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn unreachable_webhook_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let url = format!("http://{}/", listener.local_addr().expect("addr"));
        drop(listener);

        let notifier =
            WebhookVendorNotifier::new(url, None, Duration::from_secs(2)).expect("client");
        let error = notifier.notify_vendor(&notice()).await.expect_err("unreachable");

        assert!(matches!(error, NotificationError::Transport(_)));
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let notifier = LogVendorNotifier::new(Some("ventas@vitral.co".to_string()));
        assert!(notifier.notify_vendor(&notice()).await.is_ok());
    }
}
