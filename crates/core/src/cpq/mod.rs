pub mod metadata;
pub mod pricing;
pub mod validation;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{GlassType, GlassTypeId, Model, ModelId, Service, ServiceId};
use crate::domain::quote::Adjustment;
use crate::errors::DomainError;

use self::pricing::{
    calculate_price_item, GlassPricing, ModelPricing, PriceBreakdown, PriceItemInput,
    ServiceCharge,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceSelection {
    pub service_id: ServiceId,
    pub quantity: Option<Decimal>,
}

/// What the customer asked for, before catalog rows are resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemConfiguration {
    pub model_id: ModelId,
    pub glass_type_id: GlassTypeId,
    pub width_mm: u32,
    pub height_mm: u32,
    pub quantity: u32,
    pub include_accessory: bool,
    pub services: Vec<ServiceSelection>,
    pub adjustments: Vec<Adjustment>,
}

/// Checks a configuration against its resolved catalog rows and prices one unit.
///
/// `services` must hold the catalog rows for the selected service ids; a
/// selection without a matching row fails with `NotFound`.
pub fn price_configuration(
    configuration: &ItemConfiguration,
    model: &Model,
    glass: &GlassType,
    services: &[Service],
) -> Result<PriceBreakdown, DomainError> {
    validation::validate_model_quotable(model)?;
    validation::validate_glass_compatibility(model, &configuration.glass_type_id)?;
    validation::validate_dimensions(model, configuration.width_mm, configuration.height_mm)?;
    validation::validate_quantity(configuration.quantity)?;

    let charges = configuration
        .services
        .iter()
        .map(|selection| {
            let service = services
                .iter()
                .find(|service| service.id == selection.service_id)
                .ok_or_else(|| DomainError::not_found("Servicio", selection.service_id.0.clone()))?;
            if selection.quantity.is_some_and(|quantity| quantity < Decimal::ZERO) {
                return Err(DomainError::invalid_argument(format!(
                    "La cantidad del servicio {} no puede ser negativa",
                    service.name
                )));
            }
            Ok(ServiceCharge { service: service.clone(), quantity_override: selection.quantity })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(adjustment) =
        configuration.adjustments.iter().find(|adjustment| adjustment.value < Decimal::ZERO)
    {
        return Err(DomainError::invalid_argument(format!(
            "El ajuste `{}` debe tener un valor positivo; usa el signo para restar",
            adjustment.concept
        )));
    }

    Ok(calculate_price_item(&PriceItemInput {
        model: ModelPricing::from(model),
        glass: GlassPricing {
            price_per_sqm: glass.price_per_sqm,
            discount_width_mm: model.glass_discount_width_mm,
            discount_height_mm: model.glass_discount_height_mm,
        },
        width_mm: configuration.width_mm,
        height_mm: configuration.height_mm,
        include_accessory: configuration.include_accessory,
        services: charges,
        adjustments: configuration.adjustments.clone(),
    }))
}
