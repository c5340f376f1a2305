//! Data model shared across the ingestion coordinator, calculation engine,
//! and persistence layer.

pub mod calc_request;
pub mod enums;
pub mod position_config;
pub mod position_key;
pub mod price;
pub mod scope;
pub mod snapshot;
pub mod trade;

pub use calc_request::PositionCalcRequest;
pub use enums::{CalculationMethod, ChangeReason, ConfigType, DateBasis, KeyFormat, PriceMethod, ScopeField};
pub use position_config::{NewPositionConfig, PositionConfig};
pub use position_key::{DimensionProjection, PositionKeyRow, PositionKeyUpsertResult};
pub use price::{PositionAveragePrice, WacMethodData};
pub use scope::Scope;
pub use snapshot::{PositionSnapshot, PositionSnapshotHistoryRow, TradeMetrics};
pub use trade::{Trade, TradeEvent, TradeValidationError};
