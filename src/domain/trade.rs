//! Trade: an immutable fact identified by a globally unique monotonic
//! `sequenceNum`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Wire shape delivered by the external trade ingestion log.
/// Parse failures are logged and dropped, never retried — the sequence
/// number space is the source of truth, not redelivery of a bad payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub sequence_num: i64,
    pub book: String,
    pub counterparty: String,
    pub instrument: String,
    pub signed_quantity: i64,
    pub price: Decimal,
    pub trade_time: DateTime<Utc>,
    pub trade_date: NaiveDate,
    pub settlement_date: NaiveDate,
    pub source: String,
    pub source_id: String,
}

impl TradeEvent {
    /// Validate the non-zero-quantity / positive-price invariants.
    /// A violation is a constraint violation: the single trade is rejected,
    /// the rest of the batch is unaffected.
    pub fn validate(&self) -> Result<(), TradeValidationError> {
        if self.signed_quantity == 0 {
            return Err(TradeValidationError::ZeroQuantity);
        }
        if self.signed_quantity == i64::MIN {
            // guard abs() overflow; practically unreachable.
            return Err(TradeValidationError::QuantityOverflow);
        }
        if self.price <= Decimal::ZERO {
            return Err(TradeValidationError::NonPositivePrice);
        }
        Ok(())
    }

    pub fn into_trade(self) -> Result<Trade, TradeValidationError> {
        self.validate()?;
        Ok(Trade {
            sequence_num: self.sequence_num,
            book: self.book,
            counterparty: self.counterparty,
            instrument: self.instrument,
            signed_quantity: self.signed_quantity,
            price: self.price,
            trade_time: self.trade_time,
            trade_date: self.trade_date,
            settlement_date: self.settlement_date,
            source: self.source,
            source_id: self.source_id,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TradeValidationError {
    #[error("signedQuantity must be non-zero")]
    ZeroQuantity,
    #[error("signedQuantity overflows on abs()")]
    QuantityOverflow,
    #[error("price must be > 0")]
    NonPositivePrice,
}

/// The validated, store-resident trade record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub sequence_num: i64,
    pub book: String,
    pub counterparty: String,
    pub instrument: String,
    pub signed_quantity: i64,
    pub price: Decimal,
    pub trade_time: DateTime<Utc>,
    pub trade_date: NaiveDate,
    pub settlement_date: NaiveDate,
    pub source: String,
    pub source_id: String,
}

impl Trade {
    /// Canonical BOOK_COUNTERPARTY_INSTRUMENT key, used as `position_trades.positionKey`
    /// regardless of the config-specific key format under which a snapshot is computed.
    pub fn canonical_key(&self) -> String {
        format!("{}#{}#{}", self.book, self.counterparty, self.instrument)
    }

    pub fn business_date(&self, basis: crate::domain::enums::DateBasis) -> NaiveDate {
        match basis {
            crate::domain::enums::DateBasis::TradeDate => self.trade_date,
            crate::domain::enums::DateBasis::SettlementDate => self.settlement_date,
        }
    }

    pub fn notional(&self) -> Decimal {
        Decimal::from(self.signed_quantity.unsigned_abs()) * self.price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn event() -> TradeEvent {
        TradeEvent {
            sequence_num: 1,
            book: "B".into(),
            counterparty: "C".into(),
            instrument: "I".into(),
            signed_quantity: 1000,
            price: dec!(150.0),
            trade_time: Utc::now(),
            trade_date: NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
            settlement_date: NaiveDate::from_ymd_opt(2025, 1, 22).unwrap(),
            source: "S".into(),
            source_id: "s1".into(),
        }
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut e = event();
        e.signed_quantity = 0;
        assert_eq!(e.validate(), Err(TradeValidationError::ZeroQuantity));
    }

    #[test]
    fn non_positive_price_is_rejected() {
        let mut e = event();
        e.price = dec!(0.0);
        assert_eq!(e.validate(), Err(TradeValidationError::NonPositivePrice));
        e.price = dec!(-1.0);
        assert_eq!(e.validate(), Err(TradeValidationError::NonPositivePrice));
    }

    #[test]
    fn canonical_key_joins_book_counterparty_instrument() {
        let t = event().into_trade().unwrap();
        assert_eq!(t.canonical_key(), "B#C#I");
    }

    #[test]
    fn notional_is_abs_qty_times_price() {
        let t = event().into_trade().unwrap();
        assert_eq!(t.notional(), dec!(150000.0));
    }
}
