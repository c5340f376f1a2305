//! Cross-module scenario tests wiring the store, ingestion coordinator,
//! calculation engine, and partitioned log together end to end, covering
//! worked examples: a single buy from flat, a three-trade intra-day build,
//! a multi-day carry-forward, a late-trade cascade, a zero-cross, and
//! idempotent duplicate delivery.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;

use position_engine::clock::{Clock, FixedClock};
use position_engine::config_cache::ConfigurationCache;
use position_engine::domain::{DateBasis, PositionCalcRequest, TradeEvent};
use position_engine::ingestion::IngestionCoordinator;
use position_engine::partitioned_log::{InProcessPartitionedLog, PartitionedLog};
use position_engine::persistence::{PositionStore, SqliteStore};
use position_engine::CalculationEngine;

const BOOK: &str = "DESK1";
const CPTY: &str = "ACME";
const INSTRUMENT: &str = "AAPL";
const POSITION_KEY: &str = "DESK1#ACME#AAPL";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn event(seq: i64, qty: i64, price: rust_decimal::Decimal, trade_date: NaiveDate) -> TradeEvent {
    TradeEvent {
        sequence_num: seq,
        book: BOOK.into(),
        counterparty: CPTY.into(),
        instrument: INSTRUMENT.into(),
        signed_quantity: qty,
        price,
        trade_time: Utc.from_utc_datetime(&trade_date.and_hms_opt(14, 30, 0).unwrap()),
        trade_date,
        settlement_date: trade_date.succ_opt().unwrap().succ_opt().unwrap(),
        source: "TEST".into(),
        source_id: format!("t{seq}"),
    }
}

struct Harness {
    store: Arc<dyn PositionStore>,
    coordinator: IngestionCoordinator,
    engine: CalculationEngine,
    calc_log: Arc<dyn PartitionedLog<PositionCalcRequest>>,
}

async fn harness() -> Harness {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 1, 20, 9, 0, 0).unwrap()));
    let sqlite_store = SqliteStore::open_in_memory(clock.clone()).unwrap();
    sqlite_store.ensure_seed_config().await.unwrap();
    let store: Arc<dyn PositionStore> = Arc::new(sqlite_store);

    let config_cache = Arc::new(ConfigurationCache::new(store.clone(), clock.clone(), Duration::from_secs(60)));
    let calc_log: Arc<dyn PartitionedLog<PositionCalcRequest>> =
        Arc::new(InProcessPartitionedLog::new(4, 1000));
    let coordinator = IngestionCoordinator::new(store.clone(), config_cache, calc_log.clone(), 5000);
    let engine = CalculationEngine::new(store.clone(), clock.clone());

    Harness { store, coordinator, engine, calc_log }
}

impl Harness {
    async fn ingest(&self, events: Vec<TradeEvent>) -> position_engine::ingestion::IngestionOutcome {
        self.coordinator.ingest_batch(events).await.unwrap()
    }

    /// Drain every partition until each goes quiet, processing every
    /// calc request through the calculation engine.
    async fn drain(&self) {
        for partition in 0..self.calc_log.partition_count() {
            loop {
                let next = tokio::time::timeout(Duration::from_millis(20), self.calc_log.recv(partition)).await;
                match next {
                    Ok(Some(request)) => {
                        self.engine.process(&request).await.unwrap();
                    }
                    _ => break,
                }
            }
        }
    }

    async fn snapshot(&self, business_date: NaiveDate) -> position_engine::domain::PositionSnapshot {
        self.store
            .find_snapshot(POSITION_KEY, business_date, DateBasis::TradeDate)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("expected a snapshot for {business_date}"))
    }
}

/// S1: a single buy from flat produces an incremental snapshot whose WAC
/// equals the trade price exactly.
#[tokio::test]
async fn single_buy_from_flat() {
    let h = harness().await;
    let day = date(2025, 1, 20);
    h.ingest(vec![event(1, 1000, dec!(150.00), day)]).await;
    h.drain().await;

    let snapshot = h.snapshot(day).await;
    assert_eq!(snapshot.metrics.net_quantity, 1000);
    let price = h
        .store
        .find_price(POSITION_KEY, day, position_engine::domain::PriceMethod::Wac, DateBasis::TradeDate)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(price.price, dec!(150.000000000000));
}

/// S2: three intra-day buys fold into one WAC via same-day incremental
/// recalculation, each trade triggering its own calc request.
#[tokio::test]
async fn three_trade_intra_day_build() {
    let h = harness().await;
    let day = date(2025, 1, 20);
    let outcome = h
        .ingest(vec![
            event(1, 1000, dec!(150.00), day),
            event(2, 500, dec!(152.00), day),
            event(3, 300, dec!(158.00), day),
        ])
        .await;
    assert_eq!(outcome.trades_inserted, 3);
    h.drain().await;

    let snapshot = h.snapshot(day).await;
    assert_eq!(snapshot.metrics.net_quantity, 1800);
    assert_eq!(snapshot.metrics.trade_count, 3);

    let price = h
        .store
        .find_price(POSITION_KEY, day, position_engine::domain::PriceMethod::Wac, DateBasis::TradeDate)
        .await
        .unwrap()
        .unwrap();
    // (1000*150 + 500*152 + 300*158) / 1800 = 153.333333333333
    assert_eq!(price.price, dec!(153.333333333333));
}

/// S3: a position built over two days carries its prior-day WAC forward and
/// folds the new day's trades on top of it.
#[tokio::test]
async fn multi_day_build_carries_wac_forward() {
    let h = harness().await;
    let day1 = date(2025, 1, 20);
    let day2 = date(2025, 1, 21);

    h.ingest(vec![event(1, 1000, dec!(150.00), day1)]).await;
    h.drain().await;

    h.ingest(vec![event(2, 500, dec!(160.00), day2)]).await;
    h.drain().await;

    let snapshot = h.snapshot(day2).await;
    assert_eq!(snapshot.metrics.net_quantity, 1500);

    let price = h
        .store
        .find_price(POSITION_KEY, day2, position_engine::domain::PriceMethod::Wac, DateBasis::TradeDate)
        .await
        .unwrap()
        .unwrap();
    // (1000*150 + 500*160) / 1500 = 153.333333333333
    assert_eq!(price.price, dec!(153.333333333333));
}

/// S4: a trade that arrives late, dated before the position's last-seen
/// trade date, cascades a recalculation through every day up to and
/// including the last day that already had a snapshot.
#[tokio::test]
async fn late_trade_cascades_through_every_intervening_day() {
    let h = harness().await;
    let day1 = date(2025, 1, 20);
    let day2 = date(2025, 1, 21);
    let day3 = date(2025, 1, 22);

    h.ingest(vec![event(1, 1000, dec!(150.00), day1)]).await;
    h.drain().await;
    h.ingest(vec![event(2, 500, dec!(160.00), day2)]).await;
    h.drain().await;
    h.ingest(vec![event(3, -200, dec!(162.00), day3)]).await;
    h.drain().await;

    // Trade 4 is dated day1 but delivered after day3 already has a snapshot.
    let outcome = h.ingest(vec![event(4, 300, dec!(149.00), day1)]).await;
    assert_eq!(outcome.trades_inserted, 1);
    h.drain().await;

    for d in [day1, day2, day3] {
        let snapshot = h.snapshot(d).await;
        assert!(snapshot.metrics.is_consistent());
    }

    let final_snapshot = h.snapshot(day3).await;
    // net = 1000 + 300 (late) + 500 - 200 = 1600
    assert_eq!(final_snapshot.metrics.net_quantity, 1600);
}

/// S5: selling through a long position crosses zero and rebases the WAC to
/// the crossing trade's own price.
#[tokio::test]
async fn zero_cross_rebases_wac_to_crossing_trade_price() {
    let h = harness().await;
    let day = date(2025, 1, 20);
    h.ingest(vec![
        event(1, 1000, dec!(150.00), day),
        event(2, -1300, dec!(160.00), day),
    ])
    .await;
    h.drain().await;

    let snapshot = h.snapshot(day).await;
    assert_eq!(snapshot.metrics.net_quantity, -300);

    let price = h
        .store
        .find_price(POSITION_KEY, day, position_engine::domain::PriceMethod::Wac, DateBasis::TradeDate)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(price.price, dec!(160.000000000000));
}

/// S6: redelivering the exact same trade sequence numbers inserts nothing
/// and produces no further calc requests.
#[tokio::test]
async fn duplicate_delivery_is_idempotent() {
    let h = harness().await;
    let day = date(2025, 1, 20);
    let batch = vec![event(1, 1000, dec!(150.00), day), event(2, 500, dec!(152.00), day)];

    let first = h.ingest(batch.clone()).await;
    assert_eq!(first.trades_inserted, 2);
    h.drain().await;

    let second = h.ingest(batch).await;
    assert_eq!(second.trades_inserted, 0);
    assert_eq!(second.calc_requests_published, 0);
}
