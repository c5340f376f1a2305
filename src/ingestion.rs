//! Ingestion Coordinator: turns a trade batch into persisted trades,
//! upserted position-key rows, and a deduplicated set of calc requests on
//! the calc-request log.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::config_cache::ConfigurationCache;
use crate::domain::{
    ChangeReason, DateBasis, DimensionProjection, PositionCalcRequest, TradeEvent,
};
use crate::partitioned_log::PartitionedLog;
use crate::persistence::PositionStore;

/// Merge key for the calc-intent deduplication map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IntentKey {
    position_id: i64,
    date_basis: DateBasis,
    business_date: NaiveDate,
}

#[derive(Debug, Clone)]
struct CalcIntent {
    position_id: i64,
    position_key: String,
    date_basis: DateBasis,
    business_date: NaiveDate,
    sequence_num: i64,
    change_reason: ChangeReason,
    key_format: crate::domain::KeyFormat,
    price_methods: Vec<crate::domain::PriceMethod>,
}

#[derive(Debug, Default)]
pub struct IngestionOutcome {
    pub trades_received: usize,
    pub trades_inserted: usize,
    pub trades_rejected: usize,
    pub calc_requests_published: usize,
}

pub struct IngestionCoordinator {
    store: Arc<dyn PositionStore>,
    config_cache: Arc<ConfigurationCache>,
    calc_log: Arc<dyn PartitionedLog<PositionCalcRequest>>,
    batch_max: usize,
}

impl IngestionCoordinator {
    pub fn new(
        store: Arc<dyn PositionStore>,
        config_cache: Arc<ConfigurationCache>,
        calc_log: Arc<dyn PartitionedLog<PositionCalcRequest>>,
        batch_max: usize,
    ) -> Self {
        Self {
            store,
            config_cache,
            calc_log,
            batch_max,
        }
    }

    /// Process one batch of `TradeEvent`s delivered by the external trade
    /// log, in arbitrary order within the batch.
    pub async fn ingest_batch(&self, events: Vec<TradeEvent>) -> anyhow::Result<IngestionOutcome> {
        let mut outcome = IngestionOutcome {
            trades_received: events.len(),
            ..Default::default()
        };

        if events.len() > self.batch_max {
            warn!(
                received = events.len(),
                cap = self.batch_max,
                "trade batch exceeds configured maximum; processing the cap only"
            );
        }
        let events = events.into_iter().take(self.batch_max.max(1));

        // Validate and batch-insert, in one transaction.
        let mut candidates = Vec::new();
        for event in events {
            match event.into_trade() {
                Ok(trade) => candidates.push(trade),
                Err(err) => {
                    warn!(error = %err, "dropping malformed trade event");
                    outcome.trades_rejected += 1;
                }
            }
        }

        let inserted_trades = self.store.batch_insert_trades(&candidates).await?;
        outcome.trades_inserted = inserted_trades.len();
        debug!(
            inserted = inserted_trades.len(),
            skipped = candidates.len() - inserted_trades.len(),
            "batch insert complete"
        );

        if inserted_trades.is_empty() {
            return Ok(outcome);
        }

        // The active config set, via the process-local cache.
        let configs = self.config_cache.active_configs().await?;

        // Build the deduplicated intents map.
        let mut intents: HashMap<IntentKey, CalcIntent> = HashMap::new();

        for trade in &inserted_trades {
            for config in configs.iter() {
                if !config.scope.matches(trade) {
                    continue;
                }

                let position_key = config.key_format.generate(&trade.book, &trade.counterparty, &trade.instrument);
                let (has_book, has_cpty, has_inst) = config.key_format.dimensions();
                let dims = DimensionProjection {
                    book: has_book.then(|| trade.book.clone()),
                    counterparty: has_cpty.then(|| trade.counterparty.clone()),
                    instrument: has_inst.then(|| trade.instrument.clone()),
                };

                let upsert = self
                    .store
                    .upsert_position_key(
                        &position_key,
                        config.config_id,
                        config.config_type,
                        &config.name,
                        &dims,
                        trade.trade_date,
                        trade.settlement_date,
                        trade.sequence_num,
                    )
                    .await?;

                for basis in [DateBasis::TradeDate, DateBasis::SettlementDate] {
                    let t_date = trade.business_date(basis);
                    let last_date = match basis {
                        DateBasis::TradeDate => upsert.prior_last_trade_date,
                        DateBasis::SettlementDate => upsert.prior_last_settlement_date,
                    };

                    let pairs = cascade_pairs(t_date, last_date);
                    for (business_date, change_reason) in pairs {
                        let key = IntentKey {
                            position_id: upsert.position_id,
                            date_basis: basis,
                            business_date,
                        };
                        intents
                            .entry(key)
                            .and_modify(|intent| {
                                intent.sequence_num = intent.sequence_num.max(trade.sequence_num);
                                intent.change_reason = intent.change_reason.promote(change_reason);
                            })
                            .or_insert(CalcIntent {
                                position_id: upsert.position_id,
                                position_key: position_key.clone(),
                                date_basis: basis,
                                business_date,
                                sequence_num: trade.sequence_num,
                                change_reason,
                                key_format: config.key_format,
                                price_methods: config.price_methods.clone(),
                            });
                    }
                }
            }
        }

        // Publish each intent as one calc request, partitioned by
        // positionId. Publish failures are logged and never abort the
        // already-committed trade insert.
        for intent in intents.into_values() {
            let request = PositionCalcRequest {
                request_id: uuid::Uuid::new_v4().to_string(),
                position_id: intent.position_id,
                position_key: intent.position_key,
                date_basis: intent.date_basis,
                business_date: intent.business_date,
                price_methods: intent.price_methods,
                triggering_trade_sequence: intent.sequence_num,
                change_reason: intent.change_reason,
                key_format: intent.key_format,
            };
            match self.calc_log.publish(intent.position_id, request).await {
                Ok(()) => outcome.calc_requests_published += 1,
                Err(err) => {
                    warn!(
                        position_id = intent.position_id,
                        error = %err,
                        "failed to publish calc request; will be corrected on next trade for this coordinate"
                    );
                }
            }
        }

        info!(
            trades_inserted = outcome.trades_inserted,
            calc_requests_published = outcome.calc_requests_published,
            "ingestion batch processed"
        );

        Ok(outcome)
    }
}

/// Cascade list for one date basis: a single `(date, INITIAL)` pair unless
/// the trade lands strictly before the cached last date, in which case every
/// calendar day from the trade date through the last date is emitted with
/// `LATE_TRADE`.
fn cascade_pairs(t_date: NaiveDate, last_date: Option<NaiveDate>) -> Vec<(NaiveDate, ChangeReason)> {
    match last_date {
        Some(last) if t_date < last => {
            let mut out = Vec::new();
            let mut d = t_date;
            while d <= last {
                out.push((d, ChangeReason::LateTrade));
                d = d.succ_opt().expect("calendar date overflow");
            }
            out
        }
        _ => vec![(t_date, ChangeReason::Initial)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn no_prior_date_never_cascades() {
        let pairs = cascade_pairs(d(2025, 1, 20), None);
        assert_eq!(pairs, vec![(d(2025, 1, 20), ChangeReason::Initial)]);
    }

    #[test]
    fn on_time_trade_is_initial_only() {
        let pairs = cascade_pairs(d(2025, 1, 20), Some(d(2025, 1, 18)));
        assert_eq!(pairs, vec![(d(2025, 1, 20), ChangeReason::Initial)]);
    }

    #[test]
    fn late_trade_cascades_every_day_through_last_date() {
        let pairs = cascade_pairs(d(2025, 1, 21), Some(d(2025, 1, 25)));
        assert_eq!(
            pairs,
            vec![
                (d(2025, 1, 21), ChangeReason::LateTrade),
                (d(2025, 1, 22), ChangeReason::LateTrade),
                (d(2025, 1, 23), ChangeReason::LateTrade),
                (d(2025, 1, 24), ChangeReason::LateTrade),
                (d(2025, 1, 25), ChangeReason::LateTrade),
            ]
        );
    }

    #[test]
    fn same_date_as_last_is_not_late() {
        let pairs = cascade_pairs(d(2025, 1, 20), Some(d(2025, 1, 20)));
        assert_eq!(pairs, vec![(d(2025, 1, 20), ChangeReason::Initial)]);
    }
}
