use std::sync::Arc;

use clap::Subcommand;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use vitral_core::config::AppConfig;
use vitral_core::domain::quote::{ProjectAddress, QuoteId, UserId};
use vitral_db::repositories::SqlCatalogRepository;
use vitral_db::{AddItemRequest, DbPool, QuoteLifecycleService, SendQuoteRequest};
use vitral_notify::{notifier_from_config, ChannelEventSink, DispatchSummary, VendorDispatcher};

use crate::commands::price::ItemArgs;
use crate::commands::{open_database, run_with_config, CommandResult, Failure};

#[derive(Debug, Clone, Subcommand)]
pub enum QuoteCommand {
    #[command(about = "Open an empty draft quote")]
    Create {
        #[arg(long)]
        user: String,
        #[arg(long, help = "Project street address")]
        street: Option<String>,
        #[arg(long)]
        city: Option<String>,
    },
    #[command(
        about = "Price a window and add it to a draft quote (opens one when --quote is omitted)"
    )]
    Add {
        #[arg(long)]
        user: String,
        #[arg(long)]
        quote: Option<String>,
        #[command(flatten)]
        item: ItemArgs,
    },
    #[command(about = "Send a draft quote to the vendor")]
    Send {
        #[arg(long)]
        user: String,
        #[arg(long)]
        quote: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        email: Option<String>,
    },
    #[command(about = "Cancel a draft quote")]
    Cancel {
        #[arg(long)]
        user: String,
        #[arg(long)]
        quote: String,
    },
    #[command(about = "Show a quote with its items")]
    Show {
        #[arg(long)]
        user: String,
        #[arg(long)]
        quote: String,
    },
}

impl QuoteCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "quote create",
            Self::Add { .. } => "quote add",
            Self::Send { .. } => "quote send",
            Self::Cancel { .. } => "quote cancel",
            Self::Show { .. } => "quote show",
        }
    }
}

pub fn run(command: QuoteCommand) -> CommandResult {
    let name = command.name();
    run_with_config(name, move |config| execute(config, command))
}

async fn execute(config: AppConfig, command: QuoteCommand) -> Result<CommandResult, Failure> {
    let name = command.name();
    let pool = open_database(&config).await?;
    let (service, dispatcher) = lifecycle(&config, &pool)?;

    let outcome = dispatch(&service, command).await;

    // The service owns the last sender; dropping it lets the dispatcher finish.
    drop(service);
    let notifications = match dispatcher {
        Some(handle) => Some(
            handle
                .await
                .map_err(|error| Failure::new("notification", error.to_string(), 3))?,
        ),
        None => None,
    };
    pool.close().await;

    let (message, mut data) = outcome?;
    if let (Some(summary), Value::Object(fields)) = (notifications, &mut data) {
        fields.insert(
            "notifications".to_string(),
            json!({
                "delivered": summary.delivered,
                "failed": summary.failed,
                "skipped": summary.skipped,
            }),
        );
    }

    Ok(CommandResult::success_with_data(name, message, Some(data)))
}

fn lifecycle(
    config: &AppConfig,
    pool: &DbPool,
) -> Result<(QuoteLifecycleService, Option<JoinHandle<DispatchSummary>>), Failure> {
    let catalog = Arc::new(SqlCatalogRepository::new(pool.clone()));
    let service = QuoteLifecycleService::new(pool.clone(), catalog, config.tenant_settings());

    if !config.notifications.enabled {
        return Ok((service, None));
    }

    let notifier = notifier_from_config(&config.notifications)
        .map_err(|error| Failure::new("notification_setup", error.to_string(), 2))?;
    let (sink, receiver) = ChannelEventSink::new();
    let handle = VendorDispatcher::new(receiver, notifier).spawn();

    Ok((service.with_event_sink(Arc::new(sink)), Some(handle)))
}

async fn dispatch(
    service: &QuoteLifecycleService,
    command: QuoteCommand,
) -> Result<(String, Value), Failure> {
    match command {
        QuoteCommand::Create { user, street, city } => {
            let address = street.map(|street| ProjectAddress {
                street,
                city,
                region: None,
                reference: None,
            });
            let quote = service.create_draft_quote(UserId(user), address).await?;
            Ok((format!("draft quote {} created", quote.id.0), to_value(&quote)?))
        }
        QuoteCommand::Add { user, quote, item } => {
            let added = service
                .add_item_to_quote(AddItemRequest {
                    quote_id: quote.map(QuoteId),
                    user_id: UserId(user),
                    configuration: item.configuration(),
                })
                .await?;
            Ok((
                format!(
                    "item {} added to {}; quote total {}",
                    added.item_id.0, added.quote_id.0, added.quote_total
                ),
                to_value(&added)?,
            ))
        }
        QuoteCommand::Send { user, quote, phone, email } => {
            let sent = service
                .send_quote_to_vendor(SendQuoteRequest {
                    quote_id: QuoteId(quote),
                    user_id: UserId(user),
                    contact_phone: phone,
                    contact_email: email,
                })
                .await?;
            Ok((format!("quote {} sent to vendor", sent.id.0), to_value(&sent)?))
        }
        QuoteCommand::Cancel { user, quote } => {
            let canceled = service.cancel_quote(&QuoteId(quote), &UserId(user)).await?;
            Ok((format!("quote {} canceled", canceled.id.0), to_value(&canceled)?))
        }
        QuoteCommand::Show { user, quote } => {
            let quote = service.get_quote(&QuoteId(quote), &UserId(user)).await?;
            let message = format!(
                "quote {} is {} with {} item(s)",
                quote.id.0,
                quote.status.as_str(),
                quote.items.len()
            );
            Ok((message, to_value(&quote)?))
        }
    }
}

fn to_value(value: &impl Serialize) -> Result<Value, Failure> {
    serde_json::to_value(value).map_err(|error| Failure::new("serialization", error.to_string(), 6))
}
