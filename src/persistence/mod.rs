//! Persistence contracts: typed, transactional operations over the six
//! logical tables. Every operation is a pure function of the store state
//! plus inputs; each is async because a real implementation talks to a
//! database and may suspend.

pub mod sqlite_store;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{
    ChangeReason, ConfigType, DateBasis, DimensionProjection, NewPositionConfig,
    PositionAveragePrice, PositionConfig, PositionKeyUpsertResult, PositionSnapshot,
    PositionSnapshotHistoryRow, PriceMethod, Trade, TradeMetrics,
};
use crate::error::StoreResult;

pub use sqlite_store::SqliteStore;

/// The persistence contracts. Implemented once by [`SqliteStore`]; kept as
/// a trait so the calc engine and ingestion coordinator can be exercised in
/// tests against an in-memory SQLite file without a shared fixture database.
#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn insert_trade(&self, trade: &Trade) -> StoreResult<bool>;

    /// Single transaction; returns the subset actually inserted, in the
    /// same order, skipping pre-existing `sequenceNum`s.
    async fn batch_insert_trades(&self, trades: &[Trade]) -> StoreResult<Vec<Trade>>;

    #[allow(clippy::too_many_arguments)]
    async fn upsert_position_key(
        &self,
        position_key: &str,
        config_id: i64,
        config_type: ConfigType,
        config_name: &str,
        dims: &DimensionProjection,
        trade_date: NaiveDate,
        settlement_date: NaiveDate,
        sequence_num: i64,
    ) -> StoreResult<PositionKeyUpsertResult>;

    async fn aggregate_metrics(
        &self,
        position_key: &str,
        business_date: NaiveDate,
        basis: DateBasis,
    ) -> StoreResult<Option<TradeMetrics>>;

    async fn aggregate_metrics_by_dimensions(
        &self,
        dims: &DimensionProjection,
        business_date: NaiveDate,
        basis: DateBasis,
    ) -> StoreResult<Option<TradeMetrics>>;

    async fn find_trades_after_sequence(
        &self,
        position_key: &str,
        business_date: NaiveDate,
        basis: DateBasis,
        after_seq: i64,
    ) -> StoreResult<Vec<Trade>>;

    /// Dimensional counterpart of `find_trades_after_sequence`, for non-BCI
    /// `keyFormat`s where `position_trades.position_key` (always canonical
    /// BCI) cannot be matched directly — same dimensional/canonical split
    /// as `aggregate_metrics`/`find_trades_by_*`; both variants yield
    /// identical result types.
    async fn find_trades_after_sequence_by_dimensions(
        &self,
        dims: &DimensionProjection,
        business_date: NaiveDate,
        basis: DateBasis,
        after_seq: i64,
    ) -> StoreResult<Vec<Trade>>;

    async fn find_trades_by_position_key_and_date(
        &self,
        position_key: &str,
        business_date: NaiveDate,
        basis: DateBasis,
    ) -> StoreResult<Vec<Trade>>;

    async fn find_trades_by_dimensions(
        &self,
        dims: &DimensionProjection,
        business_date: NaiveDate,
        basis: DateBasis,
    ) -> StoreResult<Vec<Trade>>;

    async fn find_snapshot(
        &self,
        position_key: &str,
        business_date: NaiveDate,
        basis: DateBasis,
    ) -> StoreResult<Option<PositionSnapshot>>;

    async fn find_price(
        &self,
        position_key: &str,
        business_date: NaiveDate,
        price_method: PriceMethod,
        basis: DateBasis,
    ) -> StoreResult<Option<PositionAveragePrice>>;

    async fn find_prices_for_snapshot(
        &self,
        position_key: &str,
        business_date: NaiveDate,
        basis: DateBasis,
    ) -> StoreResult<Vec<PositionAveragePrice>>;

    /// Upsert with history bookkeeping, all in one transaction.
    async fn save_snapshot(
        &self,
        snapshot: &PositionSnapshot,
        basis: DateBasis,
        reason: ChangeReason,
    ) -> StoreResult<()>;

    async fn save_price(&self, price: &PositionAveragePrice, basis: DateBasis) -> StoreResult<()>;

    async fn find_snapshots_for_position(
        &self,
        position_key: &str,
        basis: DateBasis,
        from_date: Option<NaiveDate>,
        to_date: Option<NaiveDate>,
    ) -> StoreResult<Vec<PositionSnapshot>>;

    async fn find_snapshot_history(
        &self,
        position_key: &str,
        business_date: NaiveDate,
        basis: DateBasis,
    ) -> StoreResult<Vec<PositionSnapshotHistoryRow>>;

    // --- Configuration store ---

    async fn find_all_configs(&self) -> StoreResult<Vec<PositionConfig>>;
    async fn find_active_configs(&self) -> StoreResult<Vec<PositionConfig>>;
    async fn find_config_by_id(&self, config_id: i64) -> StoreResult<Option<PositionConfig>>;
    async fn create_config(&self, new_config: NewPositionConfig) -> StoreResult<PositionConfig>;
    async fn update_config(
        &self,
        config_id: i64,
        new_config: NewPositionConfig,
    ) -> StoreResult<PositionConfig>;
    async fn deactivate_config(&self, config_id: i64) -> StoreResult<()>;
}
