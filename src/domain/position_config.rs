//! PositionConfig: static-ish descriptor of one position view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{ConfigType, KeyFormat, PriceMethod};
use super::scope::Scope;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionConfig {
    pub config_id: i64,
    pub config_type: ConfigType,
    pub name: String,
    pub key_format: KeyFormat,
    pub price_methods: Vec<PriceMethod>,
    pub scope: Scope,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a new config; `configId`/timestamps are assigned
/// by the store.
#[derive(Debug, Clone)]
pub struct NewPositionConfig {
    pub config_type: ConfigType,
    pub name: String,
    pub key_format: KeyFormat,
    pub price_methods: Vec<PriceMethod>,
    pub scope: Scope,
    pub active: bool,
}

impl PositionConfig {
    /// The default OFFICIAL seed config: BCI key, WAC only, ALL scope.
    pub fn official_seed() -> NewPositionConfig {
        NewPositionConfig {
            config_type: ConfigType::Official,
            name: "Official Positions".to_string(),
            key_format: KeyFormat::BookCounterpartyInstrument,
            price_methods: vec![PriceMethod::Wac],
            scope: Scope::All,
            active: true,
        }
    }
}
