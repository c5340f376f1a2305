//! The calc-request wire message.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{ChangeReason, DateBasis, KeyFormat, PriceMethod};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionCalcRequest {
    pub request_id: String,
    pub position_id: i64,
    pub position_key: String,
    pub date_basis: DateBasis,
    pub business_date: NaiveDate,
    pub price_methods: Vec<PriceMethod>,
    /// Carried for observability only; the engine never gates processing on
    /// it.
    pub triggering_trade_sequence: i64,
    pub change_reason: ChangeReason,
    pub key_format: KeyFormat,
}
