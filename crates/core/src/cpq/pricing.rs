//! Price item calculator.
//!
//! Pure decimal arithmetic: no I/O, no clock. The caller resolves catalog rows
//! and checks dimensional bounds before building a [`PriceItemInput`].

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{MeasureUnit, Model, Service, ServiceId, ServiceType};
use crate::domain::quote::{Adjustment, AdjustmentSign};

const SQ_MM_PER_SQ_M: i64 = 1_000_000;
const MM_PER_M: i64 = 1_000;
const MONEY_DECIMAL_PLACES: u32 = 2;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub base_price: Decimal,
    pub cost_per_mm_width: Decimal,
    pub cost_per_mm_height: Decimal,
    pub accessory_price: Option<Decimal>,
}

impl From<&Model> for ModelPricing {
    fn from(model: &Model) -> Self {
        Self {
            base_price: model.base_price,
            cost_per_mm_width: model.cost_per_mm_width,
            cost_per_mm_height: model.cost_per_mm_height,
            accessory_price: model.accessory_price,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlassPricing {
    pub price_per_sqm: Decimal,
    pub discount_width_mm: u32,
    pub discount_height_mm: u32,
}

/// A catalog service selected for the item, optionally with an explicit quantity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceCharge {
    pub service: Service,
    pub quantity_override: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceItemInput {
    pub model: ModelPricing,
    pub glass: GlassPricing,
    pub width_mm: u32,
    pub height_mm: u32,
    pub include_accessory: bool,
    pub services: Vec<ServiceCharge>,
    pub adjustments: Vec<Adjustment>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLine {
    pub service_id: ServiceId,
    pub name: String,
    pub unit: MeasureUnit,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentLine {
    pub concept: String,
    pub sign: AdjustmentSign,
    pub unit: MeasureUnit,
    pub value: Decimal,
    pub magnitude: Decimal,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub dim_price: Decimal,
    pub acc_price: Decimal,
    pub glass_area_sqm: Decimal,
    pub glass_price: Decimal,
    pub services: Vec<ServiceLine>,
    pub adjustments: Vec<AdjustmentLine>,
    pub subtotal: Decimal,
    pub trace: Vec<PricingTraceStep>,
}

impl PriceBreakdown {
    /// Frozen subtotal of a quote line holding `quantity` identical units.
    pub fn line_subtotal(&self, quantity: u32) -> Decimal {
        self.subtotal * Decimal::from(quantity)
    }
}

/// Measures of one item that services and adjustments are billed against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemMeasures {
    pub area_sqm: Decimal,
    pub perimeter_ml: Decimal,
}

impl ItemMeasures {
    pub fn for_unit(&self, unit: MeasureUnit) -> Decimal {
        match unit {
            MeasureUnit::Sqm => self.area_sqm,
            MeasureUnit::Ml => self.perimeter_ml,
            MeasureUnit::Unit => Decimal::ONE,
        }
    }

    pub fn for_service_type(&self, service_type: ServiceType) -> Decimal {
        match service_type {
            ServiceType::Area => self.area_sqm,
            ServiceType::Perimeter => self.perimeter_ml,
            ServiceType::Fixed => Decimal::ONE,
        }
    }
}

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DECIMAL_PLACES, RoundingStrategy::MidpointNearestEven)
}

/// Cuttable glass area in m². Each side loses its discount twice; a side that
/// would go negative counts as zero.
pub fn glass_area_sqm(
    width_mm: u32,
    height_mm: u32,
    discount_width_mm: u32,
    discount_height_mm: u32,
) -> Decimal {
    let width = cut_length_mm(width_mm, discount_width_mm);
    let height = cut_length_mm(height_mm, discount_height_mm);
    Decimal::from(width) * Decimal::from(height) / Decimal::from(SQ_MM_PER_SQ_M)
}

pub fn perimeter_ml(width_mm: u32, height_mm: u32) -> Decimal {
    let perimeter_mm = 2 * (i64::from(width_mm) + i64::from(height_mm));
    Decimal::from(perimeter_mm) / Decimal::from(MM_PER_M)
}

fn cut_length_mm(length_mm: u32, discount_mm: u32) -> i64 {
    (i64::from(length_mm) - 2 * i64::from(discount_mm)).max(0)
}

pub fn calculate_price_item(input: &PriceItemInput) -> PriceBreakdown {
    let mut trace = Vec::new();

    let dim_price = round_money(
        input.model.base_price
            + Decimal::from(input.width_mm) * input.model.cost_per_mm_width
            + Decimal::from(input.height_mm) * input.model.cost_per_mm_height,
    );
    trace.push(PricingTraceStep {
        stage: "dimensional".to_string(),
        detail: format!(
            "base + {}mm * width rate + {}mm * height rate",
            input.width_mm, input.height_mm
        ),
        amount: dim_price,
    });

    let acc_price = match input.model.accessory_price {
        Some(price) if input.include_accessory => round_money(price),
        _ => Decimal::ZERO,
    };
    trace.push(PricingTraceStep {
        stage: "accessory".to_string(),
        detail: (if input.include_accessory { "included" } else { "not included" }).to_string(),
        amount: acc_price,
    });

    let glass_area = glass_area_sqm(
        input.width_mm,
        input.height_mm,
        input.glass.discount_width_mm,
        input.glass.discount_height_mm,
    );
    let glass_price = round_money(glass_area * input.glass.price_per_sqm);
    trace.push(PricingTraceStep {
        stage: "glass".to_string(),
        detail: format!("{glass_area} m2 * {} per m2", input.glass.price_per_sqm),
        amount: glass_price,
    });

    let measures = ItemMeasures {
        area_sqm: glass_area,
        perimeter_ml: perimeter_ml(input.width_mm, input.height_mm),
    };

    let services = input
        .services
        .iter()
        .map(|charge| price_service(charge, &measures))
        .collect::<Vec<_>>();
    for line in &services {
        trace.push(PricingTraceStep {
            stage: format!("service:{}", line.service_id.0),
            detail: format!("{} {} * {}", line.quantity, line.unit.as_str(), line.rate),
            amount: line.amount,
        });
    }

    let adjustments = input
        .adjustments
        .iter()
        .map(|adjustment| price_adjustment(adjustment, &measures))
        .collect::<Vec<_>>();
    for line in &adjustments {
        trace.push(PricingTraceStep {
            stage: "adjustment".to_string(),
            detail: format!("{} ({})", line.concept, line.sign.as_str()),
            amount: line.amount,
        });
    }

    let subtotal = dim_price
        + acc_price
        + glass_price
        + services.iter().map(|line| line.amount).sum::<Decimal>()
        + adjustments.iter().map(|line| line.amount).sum::<Decimal>();
    trace.push(PricingTraceStep {
        stage: "subtotal".to_string(),
        detail: "dimensional + accessory + glass + services + adjustments".to_string(),
        amount: subtotal,
    });

    PriceBreakdown {
        dim_price,
        acc_price,
        glass_area_sqm: glass_area,
        glass_price,
        services,
        adjustments,
        subtotal,
        trace,
    }
}

fn price_service(charge: &ServiceCharge, measures: &ItemMeasures) -> ServiceLine {
    let service = &charge.service;
    let requested = charge
        .quantity_override
        .unwrap_or_else(|| measures.for_service_type(service.service_type));
    let quantity = requested.max(service.minimum_billing_unit);

    ServiceLine {
        service_id: service.id.clone(),
        name: service.name.clone(),
        unit: service.unit,
        quantity,
        rate: service.rate,
        amount: round_money(quantity * service.rate),
    }
}

fn price_adjustment(adjustment: &Adjustment, measures: &ItemMeasures) -> AdjustmentLine {
    let magnitude = measures.for_unit(adjustment.unit);
    let amount = round_money(magnitude * adjustment.value);

    AdjustmentLine {
        concept: adjustment.concept.clone(),
        sign: adjustment.sign,
        unit: adjustment.unit,
        value: adjustment.value,
        magnitude,
        amount: match adjustment.sign {
            AdjustmentSign::Positive => amount,
            AdjustmentSign::Negative => -amount,
        },
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::catalog::{MeasureUnit, Service, ServiceId, ServiceType};
    use crate::domain::quote::{Adjustment, AdjustmentSign};

    use super::{
        calculate_price_item, glass_area_sqm, perimeter_ml, round_money, GlassPricing,
        ModelPricing, PriceItemInput, ServiceCharge,
    };

    fn scenario_a() -> PriceItemInput {
        PriceItemInput {
            model: ModelPricing {
                base_price: Decimal::new(100, 0),
                cost_per_mm_width: Decimal::new(5, 2),
                cost_per_mm_height: Decimal::new(4, 2),
                accessory_price: Some(Decimal::new(25, 0)),
            },
            glass: GlassPricing {
                price_per_sqm: Decimal::new(20, 0),
                discount_width_mm: 25,
                discount_height_mm: 25,
            },
            width_mm: 1000,
            height_mm: 1500,
            include_accessory: true,
            services: Vec::new(),
            adjustments: Vec::new(),
        }
    }

    fn service(service_type: ServiceType, unit: MeasureUnit, rate: i64, minimum: Decimal) -> Service {
        Service {
            id: ServiceId(format!("svc-{}", service_type.as_str())),
            name: format!("Servicio {}", service_type.as_str()),
            service_type,
            unit,
            rate: Decimal::new(rate, 0),
            minimum_billing_unit: minimum,
        }
    }

    fn installation() -> ServiceCharge {
        ServiceCharge {
            service: service(ServiceType::Fixed, MeasureUnit::Unit, 15, Decimal::ONE),
            quantity_override: None,
        }
    }

    #[test]
    fn scenario_a_prices_dimensions_glass_and_accessory() {
        let breakdown = calculate_price_item(&scenario_a());

        assert_eq!(breakdown.dim_price, Decimal::new(210, 0));
        assert_eq!(breakdown.glass_area_sqm, Decimal::new(13775, 4));
        assert_eq!(breakdown.glass_price, Decimal::new(2755, 2));
        assert_eq!(breakdown.acc_price, Decimal::new(25, 0));
        assert_eq!(breakdown.subtotal, Decimal::new(26255, 2));
    }

    #[test]
    fn scenario_b_adds_fixed_service() {
        let mut input = scenario_a();
        input.services.push(installation());

        let breakdown = calculate_price_item(&input);

        assert_eq!(breakdown.services.len(), 1);
        assert_eq!(breakdown.services[0].quantity, Decimal::ONE);
        assert_eq!(breakdown.services[0].amount, Decimal::new(15, 0));
        assert_eq!(breakdown.subtotal, Decimal::new(27755, 2));
    }

    #[test]
    fn scenario_c_negative_unit_adjustment_reduces_subtotal() {
        let mut input = scenario_a();
        input.services.push(installation());
        input.adjustments.push(Adjustment {
            concept: "Descuento cliente frecuente".to_string(),
            sign: AdjustmentSign::Negative,
            unit: MeasureUnit::Unit,
            value: Decimal::new(10, 0),
        });

        let breakdown = calculate_price_item(&input);

        assert_eq!(breakdown.adjustments[0].amount, Decimal::new(-10, 0));
        assert_eq!(breakdown.subtotal, Decimal::new(26755, 2));
    }

    #[test]
    fn accessory_is_skipped_when_not_requested() {
        let mut input = scenario_a();
        input.include_accessory = false;

        let breakdown = calculate_price_item(&input);

        assert_eq!(breakdown.acc_price, Decimal::ZERO);
        assert_eq!(breakdown.subtotal, Decimal::new(23755, 2));
    }

    #[test]
    fn calculation_is_deterministic() {
        let mut input = scenario_a();
        input.services.push(installation());
        input.services.push(ServiceCharge {
            service: service(ServiceType::Perimeter, MeasureUnit::Ml, 3, Decimal::ZERO),
            quantity_override: None,
        });

        assert_eq!(calculate_price_item(&input), calculate_price_item(&input));
    }

    #[test]
    fn minimum_billing_unit_floors_small_quantities() {
        let mut input = scenario_a();
        input.width_mm = 400;
        input.height_mm = 400;
        input.services.push(ServiceCharge {
            service: service(ServiceType::Area, MeasureUnit::Sqm, 12, Decimal::new(2, 0)),
            quantity_override: None,
        });

        let breakdown = calculate_price_item(&input);

        assert_eq!(breakdown.services[0].quantity, Decimal::new(2, 0));
        assert_eq!(breakdown.services[0].amount, Decimal::new(24, 0));
    }

    #[test]
    fn explicit_quantity_override_is_still_floored() {
        let mut input = scenario_a();
        input.services.push(ServiceCharge {
            service: service(ServiceType::Fixed, MeasureUnit::Unit, 15, Decimal::new(2, 0)),
            quantity_override: Some(Decimal::ONE),
        });
        input.services.push(ServiceCharge {
            service: service(ServiceType::Fixed, MeasureUnit::Unit, 15, Decimal::ONE),
            quantity_override: Some(Decimal::new(3, 0)),
        });

        let breakdown = calculate_price_item(&input);

        assert_eq!(breakdown.services[0].quantity, Decimal::new(2, 0));
        assert_eq!(breakdown.services[1].amount, Decimal::new(45, 0));
    }

    #[test]
    fn perimeter_service_uses_full_dimensions() {
        let mut input = scenario_a();
        input.services.push(ServiceCharge {
            service: service(ServiceType::Perimeter, MeasureUnit::Ml, 4, Decimal::ZERO),
            quantity_override: None,
        });

        let breakdown = calculate_price_item(&input);

        assert_eq!(breakdown.services[0].quantity, Decimal::new(5, 0));
        assert_eq!(breakdown.services[0].amount, Decimal::new(20, 0));
    }

    #[test]
    fn area_adjustment_scales_with_glass_area() {
        let mut input = scenario_a();
        input.adjustments.push(Adjustment {
            concept: "Película de seguridad".to_string(),
            sign: AdjustmentSign::Positive,
            unit: MeasureUnit::Sqm,
            value: Decimal::new(10, 0),
        });

        let breakdown = calculate_price_item(&input);

        assert_eq!(breakdown.adjustments[0].magnitude, Decimal::new(13775, 4));
        assert_eq!(breakdown.adjustments[0].amount, Decimal::new(1378, 2));
    }

    #[test]
    fn glass_discount_never_produces_negative_area() {
        assert_eq!(glass_area_sqm(100, 1500, 50, 25), Decimal::ZERO);
        assert_eq!(glass_area_sqm(1000, 40, 25, 25), Decimal::ZERO);
        assert_eq!(glass_area_sqm(1000, 1500, 0, 0), Decimal::new(15, 1));

        let mut input = scenario_a();
        input.width_mm = 50;
        let breakdown = calculate_price_item(&input);
        assert_eq!(breakdown.glass_price, Decimal::ZERO);
    }

    #[test]
    fn large_negative_adjustments_are_not_clamped() {
        let mut input = scenario_a();
        input.adjustments.push(Adjustment {
            concept: "Nota crédito".to_string(),
            sign: AdjustmentSign::Negative,
            unit: MeasureUnit::Unit,
            value: Decimal::new(1000, 0),
        });

        let breakdown = calculate_price_item(&input);

        assert!(breakdown.subtotal < Decimal::ZERO);
        assert_eq!(breakdown.subtotal, Decimal::new(26255, 2) - Decimal::new(1000, 0));
    }

    #[test]
    fn subtotal_equals_sum_of_rounded_components() {
        let mut input = scenario_a();
        input.model.cost_per_mm_width = Decimal::new(1234, 5);
        input.glass.price_per_sqm = Decimal::new(3333, 2);
        input.services.push(ServiceCharge {
            service: service(ServiceType::Area, MeasureUnit::Sqm, 7, Decimal::ZERO),
            quantity_override: None,
        });

        let breakdown = calculate_price_item(&input);
        let parts = breakdown.dim_price
            + breakdown.acc_price
            + breakdown.glass_price
            + breakdown.services.iter().map(|line| line.amount).sum::<Decimal>();

        assert_eq!(breakdown.subtotal, parts);
        assert!(breakdown.subtotal.scale() <= 2);
    }

    #[test]
    fn line_subtotal_multiplies_by_quantity() {
        let breakdown = calculate_price_item(&scenario_a());
        assert_eq!(breakdown.line_subtotal(3), Decimal::new(78765, 2));
    }

    #[test]
    fn glass_area_handles_the_largest_cut_lengths() {
        let side = Decimal::from(u32::MAX);

        let area = glass_area_sqm(u32::MAX, u32::MAX, 0, 0);

        assert_eq!(area, side * side / Decimal::from(1_000_000));
    }

    #[test]
    fn helpers_use_metres() {
        assert_eq!(perimeter_ml(1000, 1500), Decimal::new(5, 0));
        assert_eq!(round_money(Decimal::new(12345, 3)), Decimal::new(1234, 2));
        assert_eq!(round_money(Decimal::new(12355, 3)), Decimal::new(1236, 2));
    }
}
