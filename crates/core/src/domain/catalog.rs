//! Catalog reference data consumed by the pricing engine.
//!
//! Models, glass types and services are owned by the catalog and are read-only
//! here: quotes copy the amounts they need at pricing time and never re-read them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlassTypeId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Draft,
    Published,
}

impl ModelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            _ => None,
        }
    }
}

/// A window/door template with its price parameters and dimensional bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: ModelId,
    pub name: String,
    pub status: ModelStatus,
    pub base_price: Decimal,
    pub cost_per_mm_width: Decimal,
    pub cost_per_mm_height: Decimal,
    pub accessory_price: Option<Decimal>,
    pub min_width_mm: u32,
    pub max_width_mm: u32,
    pub min_height_mm: u32,
    pub max_height_mm: u32,
    pub compatible_glass_type_ids: Vec<GlassTypeId>,
    /// Millimetres trimmed from each side of the width before computing glass area.
    pub glass_discount_width_mm: u32,
    /// Millimetres trimmed from each side of the height before computing glass area.
    pub glass_discount_height_mm: u32,
}

impl Model {
    pub fn is_quotable(&self) -> bool {
        self.status == ModelStatus::Published
    }

    pub fn accepts_glass(&self, glass_type_id: &GlassTypeId) -> bool {
        self.compatible_glass_type_ids.iter().any(|id| id == glass_type_id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlassType {
    pub id: GlassTypeId,
    pub name: String,
    pub price_per_sqm: Decimal,
}

/// How a service measures the quantity it bills for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Area,
    Perimeter,
    Fixed,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Area => "area",
            Self::Perimeter => "perimeter",
            Self::Fixed => "fixed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "area" => Some(Self::Area),
            "perimeter" => Some(Self::Perimeter),
            "fixed" => Some(Self::Fixed),
            _ => None,
        }
    }
}

/// Unit of measure shared by services and adjustments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureUnit {
    /// Square metres.
    Sqm,
    /// Linear metres.
    Ml,
    Unit,
}

impl MeasureUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqm => "sqm",
            Self::Ml => "ml",
            Self::Unit => "unit",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqm" => Some(Self::Sqm),
            "ml" => Some(Self::Ml),
            "unit" => Some(Self::Unit),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub service_type: ServiceType,
    pub unit: MeasureUnit,
    pub rate: Decimal,
    pub minimum_billing_unit: Decimal,
}
