//! `PositionConfig.scope`: a sealed variant persisted as tagged JSON.
//!
//! Serializes as `{"type":"ALL"}` or `{"type":"CRITERIA","criteria":{...}}`,
//! the same sum-type-with-serialized-discriminator shape used throughout the
//! domain module. The codec is
//! bidirectional via serde and rejects unknown `type` tags (serde's default
//! behavior for an untagged-less adjacently/internally tagged enum already
//! does this — we use an internally tagged enum to match the wire shape
//! exactly).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::enums::ScopeField;
use super::trade::Trade;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Scope {
    #[serde(rename = "ALL")]
    All,
    #[serde(rename = "CRITERIA")]
    Criteria {
        /// Field -> required-equal value. Empty map matches everything.
        criteria: BTreeMap<ScopeField, String>,
    },
}

impl Scope {
    /// `ALL` matches every trade; `CRITERIA` requires every entry to satisfy
    /// `field.extract(trade) == value` (AND semantics, §4.4 "Scope matching").
    pub fn matches(&self, trade: &Trade) -> bool {
        match self {
            Scope::All => true,
            Scope::Criteria { criteria } => criteria
                .iter()
                .all(|(field, value)| extract(*field, trade) == value.as_str()),
        }
    }
}

fn extract(field: ScopeField, trade: &Trade) -> &str {
    match field {
        ScopeField::Book => trade.book.as_str(),
        ScopeField::Counterparty => trade.counterparty.as_str(),
        ScopeField::Instrument => trade.instrument.as_str(),
        ScopeField::Source => trade.source.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade::Trade;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn sample_trade() -> Trade {
        Trade {
            sequence_num: 1,
            book: "BOOK1".into(),
            counterparty: "CPTY1".into(),
            instrument: "AAPL".into(),
            signed_quantity: 100,
            price: dec!(10.0),
            trade_time: Utc::now(),
            trade_date: NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
            settlement_date: NaiveDate::from_ymd_opt(2025, 1, 22).unwrap(),
            source: "BLOOMBERG".into(),
            source_id: "x1".into(),
        }
    }

    #[test]
    fn all_matches_everything() {
        assert!(Scope::All.matches(&sample_trade()));
    }

    #[test]
    fn criteria_requires_every_field_to_match() {
        let mut criteria = BTreeMap::new();
        criteria.insert(ScopeField::Book, "BOOK1".to_string());
        criteria.insert(ScopeField::Instrument, "AAPL".to_string());
        let scope = Scope::Criteria { criteria };
        assert!(scope.matches(&sample_trade()));
    }

    #[test]
    fn criteria_rejects_on_single_mismatch() {
        let mut criteria = BTreeMap::new();
        criteria.insert(ScopeField::Book, "OTHER_BOOK".to_string());
        let scope = Scope::Criteria { criteria };
        assert!(!scope.matches(&sample_trade()));
    }

    #[test]
    fn empty_criteria_matches_all() {
        let scope = Scope::Criteria {
            criteria: BTreeMap::new(),
        };
        assert!(scope.matches(&sample_trade()));
    }

    #[test]
    fn json_round_trip_rejects_unknown_tag() {
        let all_json = serde_json::to_string(&Scope::All).unwrap();
        assert_eq!(all_json, r#"{"type":"ALL"}"#);
        let back: Scope = serde_json::from_str(&all_json).unwrap();
        assert_eq!(back, Scope::All);

        let bad = r#"{"type":"SOMETHING_ELSE"}"#;
        assert!(serde_json::from_str::<Scope>(bad).is_err());
    }
}
