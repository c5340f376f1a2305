//! PositionSnapshot and PositionSnapshotHistory.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{CalculationMethod, ChangeReason};

/// Counting metrics shared by snapshots, history rows, and intermediate
/// aggregation results. Kept as its own type so the calc engine can produce
/// one before deciding what to write.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeMetrics {
    pub net_quantity: i64,
    pub gross_long: i64,
    pub gross_short: i64,
    pub trade_count: i64,
    pub total_notional: Decimal,
    pub last_sequence_num: i64,
    pub last_trade_time: DateTime<Utc>,
}

impl TradeMetrics {
    pub fn zero(at: DateTime<Utc>) -> Self {
        Self {
            net_quantity: 0,
            gross_long: 0,
            gross_short: 0,
            trade_count: 0,
            total_notional: Decimal::ZERO,
            last_sequence_num: 0,
            last_trade_time: at,
        }
    }

    /// `netQuantity = grossLong - grossShort` invariant check.
    pub fn is_consistent(&self) -> bool {
        self.net_quantity == self.gross_long - self.gross_short
            && self.gross_long >= 0
            && self.gross_short >= 0
            && self.trade_count >= 0
            && self.total_notional >= Decimal::ZERO
    }

    /// Fold one trade's contribution into a running metrics accumulator
    /// (used by same-day incremental and full recalculation).
    pub fn apply(&mut self, seq: i64, signed_quantity: i64, price: Decimal, trade_time: DateTime<Utc>) {
        self.net_quantity += signed_quantity;
        if signed_quantity > 0 {
            self.gross_long += signed_quantity;
        } else {
            self.gross_short += signed_quantity.unsigned_abs() as i64;
        }
        self.trade_count += 1;
        self.total_notional += Decimal::from(signed_quantity.unsigned_abs()) * price;
        self.last_sequence_num = seq;
        if trade_time > self.last_trade_time {
            self.last_trade_time = trade_time;
        }
    }

    /// Cross-day additive combination: `previous + today` component-wise,
    /// with sequence/time taken from today, used by cross-day incremental.
    pub fn combine_cross_day(previous: &TradeMetrics, today: &TradeMetrics) -> TradeMetrics {
        TradeMetrics {
            net_quantity: previous.net_quantity + today.net_quantity,
            gross_long: previous.gross_long + today.gross_long,
            gross_short: previous.gross_short + today.gross_short,
            trade_count: previous.trade_count + today.trade_count,
            total_notional: previous.total_notional + today.total_notional,
            last_sequence_num: today.last_sequence_num,
            last_trade_time: today.last_trade_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub position_key: String,
    pub business_date: NaiveDate,
    pub metrics: TradeMetrics,
    pub calculation_version: i64,
    pub calculated_at: DateTime<Utc>,
    pub calculation_method: CalculationMethod,
    pub calculation_request_id: String,
}

impl PositionSnapshot {
    pub fn new(
        position_key: String,
        business_date: NaiveDate,
        metrics: TradeMetrics,
        calculation_version: i64,
        calculated_at: DateTime<Utc>,
        calculation_method: CalculationMethod,
        calculation_request_id: String,
    ) -> Self {
        Self {
            position_key,
            business_date,
            metrics,
            calculation_version,
            calculated_at,
            calculation_method,
            calculation_request_id,
        }
    }
}

/// An append-only history entry. Invariant: for any coordinate, exactly
/// zero or one row has `superseded_at = None`, and it carries the highest
/// `calculation_version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshotHistoryRow {
    pub position_key: String,
    pub business_date: NaiveDate,
    pub calculation_version: i64,
    pub metrics: TradeMetrics,
    pub calculated_at: DateTime<Utc>,
    pub superseded_at: Option<DateTime<Utc>>,
    pub change_reason: ChangeReason,
    pub previous_net_quantity: Option<i64>,
    pub calculation_request_id: String,
    pub calculation_method: CalculationMethod,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn apply_tracks_gross_long_and_short_separately() {
        let now = Utc::now();
        let mut m = TradeMetrics::zero(now);
        m.apply(1, 1000, dec!(150), now);
        m.apply(2, -400, dec!(155), now);
        assert_eq!(m.net_quantity, 600);
        assert_eq!(m.gross_long, 1000);
        assert_eq!(m.gross_short, 400);
        assert_eq!(m.trade_count, 2);
        assert!(m.is_consistent());
    }

    #[test]
    fn cross_day_combine_is_additive() {
        let now = Utc::now();
        let mut prev = TradeMetrics::zero(now);
        prev.apply(1, 1000, dec!(150), now);
        let mut today = TradeMetrics::zero(now);
        today.apply(2, 500, dec!(160), now);
        let combined = TradeMetrics::combine_cross_day(&prev, &today);
        assert_eq!(combined.net_quantity, 1500);
        assert_eq!(combined.last_sequence_num, 2);
    }
}
