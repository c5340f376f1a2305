//! Calculation Engine: consumes a single calc request, chooses a strategy,
//! reads prior state, computes the new snapshot and WAC, and commits
//! snapshot + price atomically.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::domain::{
    CalculationMethod, ChangeReason, DimensionProjection, KeyFormat, PositionAveragePrice,
    PositionCalcRequest, PositionSnapshot, PriceMethod, Trade, TradeMetrics, WacMethodData,
};
use crate::error::StoreResult;
use crate::persistence::PositionStore;
use crate::wac::WacState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    SameDayIncremental,
    CrossDayIncremental,
    FullRecalc,
}

pub struct CalculationEngine {
    store: Arc<dyn PositionStore>,
    clock: Arc<dyn Clock>,
}

impl CalculationEngine {
    pub fn new(store: Arc<dyn PositionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Process one calc request end to end. Returns the written snapshot, or
    /// `None` if the strategy determined there was nothing to write (no
    /// trades for the date, or a same-day incremental with no new trades).
    pub async fn process(&self, request: &PositionCalcRequest) -> anyhow::Result<Option<PositionSnapshot>> {
        let dims = request.key_format.parse_dimensions(&request.position_key);
        let current = self
            .store
            .find_snapshot(&request.position_key, request.business_date, request.date_basis)
            .await?;
        let previous_date = request
            .business_date
            .pred_opt()
            .expect("calendar date underflow");
        let previous = self
            .store
            .find_snapshot(&request.position_key, previous_date, request.date_basis)
            .await?;

        let strategy = select_strategy(request.change_reason, current.is_some(), previous.is_some());
        debug!(
            position_key = %request.position_key,
            business_date = %request.business_date,
            basis = %request.date_basis,
            strategy = ?strategy,
            "calc strategy selected"
        );

        let snapshot = match strategy {
            Strategy::SameDayIncremental => {
                self.same_day_incremental(request, &dims, current.expect("same-day incremental requires a current snapshot")).await?
            }
            Strategy::CrossDayIncremental => {
                self.cross_day_incremental(request, &dims, previous_date, previous.expect("cross-day incremental requires a previous snapshot")).await?
            }
            Strategy::FullRecalc => self.full_recalc(request, &dims).await?,
        };

        if let Some(snapshot) = &snapshot {
            self.store
                .save_snapshot(snapshot, request.date_basis, request.change_reason)
                .await?;
        }

        Ok(snapshot)
    }

    async fn same_day_incremental(
        &self,
        request: &PositionCalcRequest,
        dims: &DimensionProjection,
        current: PositionSnapshot,
    ) -> anyhow::Result<Option<PositionSnapshot>> {
        let new_trades = if request.key_format == KeyFormat::BookCounterpartyInstrument {
            self.store
                .find_trades_after_sequence(
                    &request.position_key,
                    request.business_date,
                    request.date_basis,
                    current.metrics.last_sequence_num,
                )
                .await?
        } else {
            self.store
                .find_trades_after_sequence_by_dimensions(
                    dims,
                    request.business_date,
                    request.date_basis,
                    current.metrics.last_sequence_num,
                )
                .await?
        };

        if new_trades.is_empty() {
            return Ok(None);
        }

        let mut metrics = current.metrics;
        for trade in &new_trades {
            metrics.apply(trade.sequence_num, trade.signed_quantity, trade.price, trade.trade_time);
        }

        if request.price_methods.contains(&PriceMethod::Wac) {
            let prior_price = self
                .store
                .find_price(&request.position_key, request.business_date, PriceMethod::Wac, request.date_basis)
                .await?;
            let mut wac = match &prior_price {
                Some(p) => WacState {
                    avg_price: p.price,
                    total_cost_basis: p.method_data.total_cost_basis,
                    net_quantity: current.metrics.net_quantity,
                    last_sequence: p.method_data.last_updated_sequence,
                },
                None => WacState::new(),
            };
            for trade in &new_trades {
                wac = wac.apply_trade(trade.sequence_num, trade.signed_quantity, trade.price);
            }
            self.save_wac_price(request, wac).await?;
        }

        Ok(Some(PositionSnapshot::new(
            request.position_key.clone(),
            request.business_date,
            metrics,
            current.calculation_version,
            self.clock.now(),
            CalculationMethod::Incremental,
            request.request_id.clone(),
        )))
    }

    async fn cross_day_incremental(
        &self,
        request: &PositionCalcRequest,
        dims: &DimensionProjection,
        previous_date: NaiveDate,
        previous: PositionSnapshot,
    ) -> anyhow::Result<Option<PositionSnapshot>> {
        let today_metrics = self.aggregate(request, dims).await?;

        let metrics = match today_metrics {
            None => {
                // Carry-forward: no trades today, copy yesterday's metrics
                // under today's business date.
                previous.metrics
            }
            Some(today) => TradeMetrics::combine_cross_day(&previous.metrics, &today),
        };

        if today_metrics.is_none() {
            self.copy_prices_forward(request, previous_date).await?;
            return Ok(Some(PositionSnapshot::new(
                request.position_key.clone(),
                request.business_date,
                metrics,
                previous.calculation_version,
                self.clock.now(),
                CalculationMethod::Incremental,
                request.request_id.clone(),
            )));
        }

        if request.price_methods.contains(&PriceMethod::Wac) {
            let previous_wac = self
                .store
                .find_price(&request.position_key, previous_date, PriceMethod::Wac, request.date_basis)
                .await?;

            match previous_wac {
                Some(prior) => {
                    let trades = self.trades_for_today(request, dims).await?;
                    let mut wac = WacState {
                        avg_price: prior.price,
                        total_cost_basis: prior.method_data.total_cost_basis,
                        net_quantity: previous.metrics.net_quantity,
                        last_sequence: prior.method_data.last_updated_sequence,
                    };
                    for trade in &trades {
                        wac = wac.apply_trade(trade.sequence_num, trade.signed_quantity, trade.price);
                    }
                    self.save_wac_price(request, wac).await?;
                }
                None => {
                    // No prior-day price to extend: fall back to a full
                    // WAC rebuild for today only, not the position's history.
                    warn!(
                        position_key = %request.position_key,
                        business_date = %request.business_date,
                        "cross-day incremental WAC fallback: no prior-day price found, rebuilding today only"
                    );
                    let trades = self.trades_for_today(request, dims).await?;
                    let wac = WacState::new().fold(
                        trades
                            .iter()
                            .map(|t| (t.sequence_num, t.signed_quantity, t.price)),
                    );
                    self.save_wac_price(request, wac).await?;
                }
            }
        }

        Ok(Some(PositionSnapshot::new(
            request.position_key.clone(),
            request.business_date,
            metrics,
            previous.calculation_version,
            self.clock.now(),
            CalculationMethod::Incremental,
            request.request_id.clone(),
        )))
    }

    async fn full_recalc(
        &self,
        request: &PositionCalcRequest,
        dims: &DimensionProjection,
    ) -> anyhow::Result<Option<PositionSnapshot>> {
        let metrics = match self.aggregate(request, dims).await? {
            Some(m) => m,
            None => return Ok(None),
        };

        if request.price_methods.contains(&PriceMethod::Wac) {
            let trades = self.trades_for_today(request, dims).await?;
            let wac = WacState::new().fold(
                trades
                    .iter()
                    .map(|t| (t.sequence_num, t.signed_quantity, t.price)),
            );
            self.save_wac_price(request, wac).await?;
        }

        Ok(Some(PositionSnapshot::new(
            request.position_key.clone(),
            request.business_date,
            metrics,
            0,
            self.clock.now(),
            CalculationMethod::FullRecalc,
            request.request_id.clone(),
        )))
    }

    async fn aggregate(
        &self,
        request: &PositionCalcRequest,
        dims: &DimensionProjection,
    ) -> StoreResult<Option<TradeMetrics>> {
        if request.key_format == KeyFormat::BookCounterpartyInstrument {
            self.store
                .aggregate_metrics(&request.position_key, request.business_date, request.date_basis)
                .await
        } else {
            self.store
                .aggregate_metrics_by_dimensions(dims, request.business_date, request.date_basis)
                .await
        }
    }

    async fn trades_for_today(
        &self,
        request: &PositionCalcRequest,
        dims: &DimensionProjection,
    ) -> StoreResult<Vec<Trade>> {
        if request.key_format == KeyFormat::BookCounterpartyInstrument {
            self.store
                .find_trades_by_position_key_and_date(&request.position_key, request.business_date, request.date_basis)
                .await
        } else {
            self.store
                .find_trades_by_dimensions(dims, request.business_date, request.date_basis)
                .await
        }
    }

    async fn save_wac_price(&self, request: &PositionCalcRequest, wac: WacState) -> StoreResult<()> {
        let current_version = self
            .store
            .find_price(&request.position_key, request.business_date, PriceMethod::Wac, request.date_basis)
            .await?
            .map(|p| p.calculation_version)
            .unwrap_or(0);

        let price = PositionAveragePrice {
            position_key: request.position_key.clone(),
            business_date: request.business_date,
            price_method: PriceMethod::Wac,
            price: wac.avg_price,
            method_data: WacMethodData {
                total_cost_basis: wac.total_cost_basis,
                last_updated_sequence: wac.last_sequence,
            },
            calculation_version: current_version + 1,
            calculated_at: self.clock.now(),
        };
        self.store.save_price(&price, request.date_basis).await
    }

    /// Copy yesterday's prices verbatim to today's business date, as part
    /// of the cross-day incremental carry-forward path.
    async fn copy_prices_forward(
        &self,
        request: &PositionCalcRequest,
        previous_date: NaiveDate,
    ) -> StoreResult<()> {
        let prices = self
            .store
            .find_prices_for_snapshot(&request.position_key, previous_date, request.date_basis)
            .await?;
        for prior in prices {
            let copied = PositionAveragePrice {
                position_key: request.position_key.clone(),
                business_date: request.business_date,
                price_method: prior.price_method,
                price: prior.price,
                method_data: prior.method_data,
                calculation_version: prior.calculation_version,
                calculated_at: self.clock.now(),
            };
            self.store.save_price(&copied, request.date_basis).await?;
        }
        Ok(())
    }
}

/// Strategy selection: INITIAL with an existing same-day snapshot goes
/// same-day incremental; LATE_TRADE/CORRECTION always fall through to
/// cross-day or full, because a cascade must recompute from updated
/// prior-day state rather than extend the existing row.
fn select_strategy(change_reason: ChangeReason, has_current: bool, has_previous: bool) -> Strategy {
    if change_reason == ChangeReason::Initial && has_current {
        Strategy::SameDayIncremental
    } else if has_previous {
        Strategy::CrossDayIncremental
    } else {
        Strategy::FullRecalc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_with_current_snapshot_is_same_day_incremental() {
        assert_eq!(
            select_strategy(ChangeReason::Initial, true, true),
            Strategy::SameDayIncremental
        );
    }

    #[test]
    fn late_trade_never_uses_same_day_incremental_even_with_current() {
        assert_eq!(
            select_strategy(ChangeReason::LateTrade, true, true),
            Strategy::CrossDayIncremental
        );
    }

    #[test]
    fn no_current_no_previous_is_full_recalc() {
        assert_eq!(select_strategy(ChangeReason::Initial, false, false), Strategy::FullRecalc);
    }

    #[test]
    fn no_current_with_previous_is_cross_day_incremental() {
        assert_eq!(
            select_strategy(ChangeReason::Initial, false, true),
            Strategy::CrossDayIncremental
        );
    }
}
