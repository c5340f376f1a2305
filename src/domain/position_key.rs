//! PositionKey: surrogate row identifying one calculated view.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::enums::ConfigType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionKeyRow {
    pub position_id: i64,
    pub position_key: String,
    pub config_id: i64,
    pub config_type: ConfigType,
    pub config_name: String,
    pub book: Option<String>,
    pub counterparty: Option<String>,
    pub instrument: Option<String>,
    pub last_trade_date: NaiveDate,
    pub last_settlement_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub created_by_sequence: i64,
}

/// The dimension projection relevant to a given `KeyFormat`.
#[derive(Debug, Clone, Default)]
pub struct DimensionProjection {
    pub book: Option<String>,
    pub counterparty: Option<String>,
    pub instrument: Option<String>,
}

/// Result of `upsertPositionKey`: the surrogate id plus the dates that were
/// current *before* this upsert — callers need the prior values to classify
/// late trades.
#[derive(Debug, Clone, Copy)]
pub struct PositionKeyUpsertResult {
    pub position_id: i64,
    pub prior_last_trade_date: Option<NaiveDate>,
    pub prior_last_settlement_date: Option<NaiveDate>,
}
