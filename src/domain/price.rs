//! PositionAveragePrice. `method_data` is a typed subrecord for WAC rather
//! than a free-form JSON blob; unknown fields are ignored on read to allow
//! forward-compatible additions, which `#[serde(default)]` gives us for free
//! on any field added later.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::PriceMethod;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WacMethodData {
    pub total_cost_basis: Decimal,
    pub last_updated_sequence: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionAveragePrice {
    pub position_key: String,
    pub business_date: NaiveDate,
    pub price_method: PriceMethod,
    pub price: Decimal,
    pub method_data: WacMethodData,
    pub calculation_version: i64,
    pub calculated_at: DateTime<Utc>,
}
