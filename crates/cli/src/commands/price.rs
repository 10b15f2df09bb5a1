use std::str::FromStr;
use std::sync::Arc;

use clap::Args;
use rust_decimal::Decimal;

use vitral_core::config::AppConfig;
use vitral_core::cpq::{ItemConfiguration, ServiceSelection};
use vitral_core::domain::catalog::{GlassTypeId, MeasureUnit, ModelId, ServiceId};
use vitral_core::domain::quote::{Adjustment, AdjustmentSign};
use vitral_db::repositories::SqlCatalogRepository;
use vitral_db::QuoteLifecycleService;

use crate::commands::{open_database, run_with_config, CommandResult, Failure};

/// Window configuration flags shared by `price` and `quote add`.
#[derive(Debug, Clone, Args)]
pub struct ItemArgs {
    #[arg(long, help = "Catalog model id, e.g. mdl-corrediza-2h")]
    pub model: String,
    #[arg(long, help = "Glass type id, e.g. gls-claro-6")]
    pub glass: String,
    #[arg(long, help = "Width in millimetres")]
    pub width: u32,
    #[arg(long, help = "Height in millimetres")]
    pub height: u32,
    #[arg(long, default_value_t = 1, help = "Number of identical units")]
    pub quantity: u32,
    #[arg(long, help = "Include the model accessory kit")]
    pub accessory: bool,
    #[arg(
        long = "service",
        value_name = "ID[=QTY]",
        value_parser = parse_service_selection,
        help = "Add a service; QTY overrides the measured quantity"
    )]
    pub services: Vec<ServiceSelection>,
    #[arg(
        long = "adjustment",
        value_name = "CONCEPT:SIGN:UNIT:VALUE",
        value_parser = parse_adjustment,
        help = "Manual correction, e.g. \"Descuento obra:negative:unit:10\""
    )]
    pub adjustments: Vec<Adjustment>,
}

impl ItemArgs {
    pub fn configuration(&self) -> ItemConfiguration {
        ItemConfiguration {
            model_id: ModelId(self.model.clone()),
            glass_type_id: GlassTypeId(self.glass.clone()),
            width_mm: self.width,
            height_mm: self.height,
            quantity: self.quantity,
            include_accessory: self.accessory,
            services: self.services.clone(),
            adjustments: self.adjustments.clone(),
        }
    }
}

pub fn parse_service_selection(raw: &str) -> Result<ServiceSelection, String> {
    let (id, quantity) = match raw.split_once('=') {
        Some((id, quantity)) => {
            let quantity = Decimal::from_str(quantity.trim())
                .map_err(|error| format!("invalid service quantity `{quantity}`: {error}"))?;
            (id, Some(quantity))
        }
        None => (raw, None),
    };

    let id = id.trim();
    if id.is_empty() {
        return Err("service id must not be empty".to_string());
    }

    Ok(ServiceSelection { service_id: ServiceId(id.to_string()), quantity })
}

/// Parses `CONCEPT:SIGN:UNIT:VALUE`. The concept may itself contain `:`.
pub fn parse_adjustment(raw: &str) -> Result<Adjustment, String> {
    let mut parts = raw.rsplitn(4, ':');
    let (Some(value), Some(unit), Some(sign), Some(concept)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected CONCEPT:SIGN:UNIT:VALUE, got `{raw}`"));
    };

    let concept = concept.trim();
    if concept.is_empty() {
        return Err("adjustment concept must not be empty".to_string());
    }
    let sign = match sign.trim() {
        "+" => AdjustmentSign::Positive,
        "-" => AdjustmentSign::Negative,
        other => AdjustmentSign::parse(other).ok_or_else(|| {
            format!("unknown adjustment sign `{other}` (use positive, negative, + or -)")
        })?,
    };
    let unit = MeasureUnit::parse(unit)
        .ok_or_else(|| format!("unknown adjustment unit `{}` (use sqm, ml or unit)", unit.trim()))?;
    let value = Decimal::from_str(value.trim())
        .map_err(|error| format!("invalid adjustment value `{}`: {error}", value.trim()))?;

    Ok(Adjustment { concept: concept.to_string(), sign, unit, value })
}

pub fn run(args: &ItemArgs) -> CommandResult {
    let configuration = args.configuration();
    run_with_config("price", move |config| preview(config, configuration))
}

async fn preview(
    config: AppConfig,
    configuration: ItemConfiguration,
) -> Result<CommandResult, Failure> {
    let pool = open_database(&config).await?;
    let catalog = Arc::new(SqlCatalogRepository::new(pool.clone()));
    let service = QuoteLifecycleService::new(pool.clone(), catalog, config.tenant_settings());

    let outcome = service.preview_price(&configuration).await;
    pool.close().await;
    let preview = outcome?;

    let data = serde_json::to_value(&preview)
        .map_err(|error| Failure::new("serialization", error.to_string(), 6))?;
    Ok(CommandResult::success_with_data(
        "price",
        format!(
            "{} {} x {} mm: {} {} ({} u.)",
            configuration.model_id.0,
            configuration.width_mm,
            configuration.height_mm,
            preview.line_subtotal,
            config.tenant.currency,
            preview.quantity
        ),
        Some(data),
    ))
}
