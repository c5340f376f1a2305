//! Finite tagged enumerations shared across the position engine.
//!
//! Each serializes as its bare variant name (`serde(rename_all = "SCREAMING_SNAKE_CASE")`
//! where the wire format uses upper-case tokens, lower-case elsewhere),
//! matching the sum-type-with-serialized-discriminator pattern used throughout
//! this corpus for trade sides, change reasons, and the like.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which calendar the business date of a snapshot is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DateBasis {
    TradeDate,
    SettlementDate,
}

impl DateBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateBasis::TradeDate => "TRADE_DATE",
            DateBasis::SettlementDate => "SETTLEMENT_DATE",
        }
    }
}

impl fmt::Display for DateBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a snapshot write happened; carried into history but not used by the
/// engine to branch strategy selection (CORRECTION follows the same rules as
/// LATE_TRADE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeReason {
    Initial,
    LateTrade,
    Correction,
}

impl ChangeReason {
    /// Merge rule used when folding two cascade pairs into one calc intent
    /// (§4.4 step 4): LATE_TRADE always wins over INITIAL. The cascade
    /// generator never emits CORRECTION itself; it is accepted here only so
    /// a caller merging externally-sourced intents has a total order.
    pub fn promote(self, other: ChangeReason) -> ChangeReason {
        use ChangeReason::*;
        if self == LateTrade || other == LateTrade {
            LateTrade
        } else if self == Correction || other == Correction {
            Correction
        } else {
            Initial
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculationMethod {
    FullRecalc,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriceMethod {
    Wac,
}

impl PriceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceMethod::Wac => "WAC",
        }
    }
}

impl fmt::Display for PriceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigType {
    Official,
    User,
    Desk,
}

/// Position key layout. Dimensions are joined by `#` in the order named by
/// the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyFormat {
    BookCounterpartyInstrument,
    BookInstrument,
    CounterpartyInstrument,
    Instrument,
    Book,
}

impl KeyFormat {
    /// Generate the `#`-joined position key from raw trade dimensions.
    pub fn generate(&self, book: &str, counterparty: &str, instrument: &str) -> String {
        match self {
            KeyFormat::BookCounterpartyInstrument => {
                format!("{book}#{counterparty}#{instrument}")
            }
            KeyFormat::BookInstrument => format!("{book}#{instrument}"),
            KeyFormat::CounterpartyInstrument => format!("{counterparty}#{instrument}"),
            KeyFormat::Instrument => instrument.to_string(),
            KeyFormat::Book => book.to_string(),
        }
    }

    /// Which dimension columns are populated for this key format.
    pub fn dimensions(&self) -> (bool, bool, bool) {
        // (book, counterparty, instrument)
        match self {
            KeyFormat::BookCounterpartyInstrument => (true, true, true),
            KeyFormat::BookInstrument => (true, false, true),
            KeyFormat::CounterpartyInstrument => (false, true, true),
            KeyFormat::Instrument => (false, false, true),
            KeyFormat::Book => (true, false, false),
        }
    }

    /// Inverse of `generate`: split a position key back into its dimension
    /// projection, positionally per format. Used by the calc engine to
    /// recover the dimension filter for non-BCI aggregation when only the
    /// key string is carried on a calc request.
    pub fn parse_dimensions(&self, key: &str) -> super::position_key::DimensionProjection {
        use super::position_key::DimensionProjection;
        let parts: Vec<&str> = key.split('#').collect();
        match self {
            KeyFormat::BookCounterpartyInstrument => DimensionProjection {
                book: parts.first().map(|s| s.to_string()),
                counterparty: parts.get(1).map(|s| s.to_string()),
                instrument: parts.get(2).map(|s| s.to_string()),
            },
            KeyFormat::BookInstrument => DimensionProjection {
                book: parts.first().map(|s| s.to_string()),
                counterparty: None,
                instrument: parts.get(1).map(|s| s.to_string()),
            },
            KeyFormat::CounterpartyInstrument => DimensionProjection {
                book: None,
                counterparty: parts.first().map(|s| s.to_string()),
                instrument: parts.get(1).map(|s| s.to_string()),
            },
            KeyFormat::Instrument => DimensionProjection {
                book: None,
                counterparty: None,
                instrument: parts.first().map(|s| s.to_string()),
            },
            KeyFormat::Book => DimensionProjection {
                book: parts.first().map(|s| s.to_string()),
                counterparty: None,
                instrument: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScopeField {
    Book,
    Counterparty,
    Instrument,
    Source,
}
