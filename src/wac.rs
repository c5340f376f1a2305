//! Weighted average cost state machine.
//!
//! Pure value type, no I/O: `applyTrade` is referentially transparent and
//! must be folded over trades in ascending `sequenceNum` order. Tested
//! independently against worked scenarios without a runtime or store.

use rust_decimal::Decimal;

/// Scale WAC's final price is rounded to whenever re-derived.
pub const WAC_PRICE_SCALE: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WacState {
    pub avg_price: Decimal,
    pub total_cost_basis: Decimal,
    pub net_quantity: i64,
    pub last_sequence: i64,
}

impl Default for WacState {
    fn default() -> Self {
        Self {
            avg_price: Decimal::ZERO,
            total_cost_basis: Decimal::ZERO,
            net_quantity: 0,
            last_sequence: 0,
        }
    }
}

impl WacState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one trade, returning the resulting state. Evaluates the four
    /// rules below in order; exactly one fires.
    pub fn apply_trade(&self, seq: i64, qty: i64, price: Decimal) -> WacState {
        let old = self.net_quantity;
        let new = old + qty;

        let (avg_price, total_cost_basis) = if crosses_zero(old, new) {
            // R1: cross zero — restart from the trade price on the new side.
            (round_wac(price), price * Decimal::from(new))
        } else if new == 0 {
            // R2: flat.
            (Decimal::ZERO, Decimal::ZERO)
        } else if old != 0 && signum(old) != signum(qty) {
            // R3: toward zero but not flattening or crossing — avgPrice unchanged.
            (self.avg_price, self.total_cost_basis + self.avg_price * Decimal::from(qty))
        } else if old == 0 {
            // R4a: first trade from flat.
            (round_wac(price), price * Decimal::from(new))
        } else {
            // R4b: away from zero.
            let cost = self.total_cost_basis + price * Decimal::from(qty);
            (round_wac((cost / Decimal::from(new)).abs()), cost)
        };

        WacState {
            avg_price,
            total_cost_basis,
            net_quantity: new,
            last_sequence: seq,
        }
    }

    /// Fold `apply_trade` over a sequence of `(seq, qty, price)` triples,
    /// already sorted ascending by `seq`.
    pub fn fold<I>(mut self, trades: I) -> WacState
    where
        I: IntoIterator<Item = (i64, i64, Decimal)>,
    {
        for (seq, qty, price) in trades {
            self = self.apply_trade(seq, qty, price);
        }
        self
    }
}

fn signum(n: i64) -> i64 {
    n.signum()
}

fn crosses_zero(old: i64, new: i64) -> bool {
    (old > 0 && new < 0) || (old < 0 && new > 0)
}

fn round_wac(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(WAC_PRICE_SCALE, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn first_trade_from_flat_uses_trade_price_directly() {
        let s = WacState::new().apply_trade(1, 1000, dec!(150.0));
        assert_eq!(s.avg_price, dec!(150.000000000000));
        assert_eq!(s.total_cost_basis, dec!(150000.0));
        assert_eq!(s.net_quantity, 1000);
        assert_eq!(s.last_sequence, 1);
    }

    #[test]
    fn three_trade_intra_day_build_rederives_weighted_price() {
        let s = WacState::new()
            .apply_trade(1, 1000, dec!(150.0))
            .apply_trade(2, 500, dec!(160.0))
            .apply_trade(3, -400, dec!(155.0));
        assert_eq!(s.net_quantity, 1100);
        assert_eq!(s.avg_price, dec!(153.333333333333));
    }

    #[test]
    fn zero_cross_restarts_from_trade_price() {
        // old=+500, trade=-800@160 => net=-300, WAC=160
        let s = WacState {
            avg_price: dec!(150.0),
            total_cost_basis: dec!(75000.0),
            net_quantity: 500,
            last_sequence: 1,
        }
        .apply_trade(2, -800, dec!(160.0));
        assert_eq!(s.net_quantity, -300);
        assert_eq!(s.avg_price, dec!(160.000000000000));
        assert_eq!(s.total_cost_basis, dec!(-48000.0));
    }

    #[test]
    fn exact_flatten_zeroes_everything() {
        let s = WacState {
            avg_price: dec!(150.0),
            total_cost_basis: dec!(75000.0),
            net_quantity: 500,
            last_sequence: 1,
        }
        .apply_trade(2, -500, dec!(155.0));
        assert_eq!(s.net_quantity, 0);
        assert_eq!(s.avg_price, Decimal::ZERO);
        assert_eq!(s.total_cost_basis, Decimal::ZERO);
    }

    #[test]
    fn toward_zero_preserves_avg_price_exactly() {
        let s = WacState {
            avg_price: dec!(153.333333333333),
            total_cost_basis: dec!(230000.0),
            net_quantity: 1500,
            last_sequence: 2,
        }
        .apply_trade(3, -300, dec!(155.0));
        assert_eq!(s.net_quantity, 1200);
        assert_eq!(s.avg_price, dec!(153.333333333333));
    }

    #[test]
    fn away_from_zero_rederives_weighted_price() {
        let s = WacState::new()
            .apply_trade(1, 1000, dec!(150.0))
            .apply_trade(2, 500, dec!(160.0));
        assert_eq!(s.net_quantity, 1500);
        assert_eq!(s.avg_price, dec!(153.333333333333));
        assert_eq!(s.total_cost_basis, dec!(230000.0));
    }

    #[test]
    fn last_sequence_always_advances_to_applied_trade() {
        let s = WacState::new().apply_trade(42, 10, dec!(1.0));
        assert_eq!(s.last_sequence, 42);
    }

    #[test]
    fn multi_day_build_carries_wac_forward() {
        let d1 = WacState::new().apply_trade(1, 1000, dec!(150.0));
        assert_eq!(d1.avg_price, dec!(150.000000000000));
        let d2 = d1.apply_trade(2, 500, dec!(160.0));
        assert_eq!(d2.avg_price, dec!(153.333333333333));
        let d3 = d2.apply_trade(3, -300, dec!(155.0));
        assert_eq!(d3.avg_price, dec!(153.333333333333));
        assert_eq!(d3.net_quantity, 1200);
    }

    #[test]
    fn same_day_incremental_fold_matches_full_recalc_fold() {
        let trades = vec![
            (1_i64, 1000_i64, dec!(150.0)),
            (2, 500, dec!(160.0)),
            (3, -400, dec!(155.0)),
            (4, -1200, dec!(158.0)),
        ];

        let full = WacState::new().fold(trades.clone());

        let first_half = WacState::new().fold(trades[..2].to_vec());
        let incremental = first_half.fold(trades[2..].to_vec());

        assert_eq!(full, incremental);
    }
}
