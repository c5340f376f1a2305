//! Replay Tool
//!
//! Feeds a fixed trade fixture through ingestion and calculation end to end
//! and prints the resulting snapshots. Useful for manually eyeballing a
//! worked example (a single buy from flat, a three-trade intra-day build, a
//! multi-day carry-forward, a late-trade cascade, and a zero-cross) without
//! standing up a real trade log or calc-request transport.
//!
//! Usage:
//!   cargo run --release --bin replay
//!   cargo run --release --bin replay -- --db-path ./replay.db

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{NaiveDate, TimeZone, Utc};
use clap::Parser;
use rust_decimal_macros::dec;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use position_engine::clock::{FixedClock, SystemClock};
use position_engine::config_cache::ConfigurationCache;
use position_engine::domain::{PositionCalcRequest, TradeEvent};
use position_engine::ingestion::IngestionCoordinator;
use position_engine::partitioned_log::{InProcessPartitionedLog, PartitionedLog};
use position_engine::persistence::{PositionStore, SqliteStore};
use position_engine::CalculationEngine;

/// Replay a fixed trade fixture through the position engine.
#[derive(Parser, Debug)]
#[command(name = "replay")]
#[command(about = "Feed a fixture of trades through ingestion and calculation, printing snapshots")]
struct Cli {
    /// Persist to a file-backed database pair instead of in-memory. The
    /// settlement-date store is written alongside with a `_settlement`
    /// suffix inserted before the extension.
    #[arg(long)]
    db_path: Option<String>,
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid fixture date")
}

fn event(seq: i64, qty: i64, price: rust_decimal::Decimal, trade_date: NaiveDate) -> TradeEvent {
    TradeEvent {
        sequence_num: seq,
        book: "DESK1".into(),
        counterparty: "ACME".into(),
        instrument: "AAPL".into(),
        signed_quantity: qty,
        price,
        trade_time: Utc.from_utc_datetime(&trade_date.and_hms_opt(14, 30, 0).unwrap()),
        trade_date,
        settlement_date: trade_date.succ_opt().unwrap().succ_opt().unwrap(),
        source: "REPLAY".into(),
        source_id: format!("r{seq}"),
    }
}

fn settlement_path_for(db_path: &str) -> String {
    match db_path.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_settlement.{ext}"),
        None => format!("{db_path}_settlement"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "position_engine=info,replay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let clock: Arc<dyn position_engine::Clock> =
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 1, 20, 14, 30, 0).unwrap()));

    let sqlite_store = match &cli.db_path {
        Some(path) => SqliteStore::open(path, &settlement_path_for(path), clock.clone())?,
        None => SqliteStore::open_in_memory(clock.clone())?,
    };
    sqlite_store.ensure_seed_config().await?;
    let store: Arc<dyn PositionStore> = Arc::new(sqlite_store);

    let config_cache = Arc::new(ConfigurationCache::new(store.clone(), clock.clone(), Duration::from_secs(60)));
    let calc_log: Arc<dyn PartitionedLog<PositionCalcRequest>> =
        Arc::new(InProcessPartitionedLog::new(4, 1000));
    let coordinator = IngestionCoordinator::new(store.clone(), config_cache, calc_log.clone(), 5000);
    let engine = CalculationEngine::new(store.clone(), Arc::new(SystemClock));

    // Day 1: three intra-day buys.
    let day1 = date(2025, 1, 20);
    let outcome = coordinator
        .ingest_batch(vec![
            event(1, 1000, dec!(150.00), day1),
            event(2, 500, dec!(152.00), day1),
            event(3, 300, dec!(158.00), day1),
        ])
        .await?;
    println!("day 1 ingest: {outcome:?}");
    drain_and_process(&calc_log, &engine).await?;
    print_snapshot(&store, "DESK1#ACME#AAPL", day1).await?;

    // Day 2: carry-forward with one new trade.
    let day2 = date(2025, 1, 21);
    let outcome = coordinator
        .ingest_batch(vec![event(4, -400, dec!(159.00), day2)])
        .await?;
    println!("day 2 ingest: {outcome:?}");
    drain_and_process(&calc_log, &engine).await?;
    print_snapshot(&store, "DESK1#ACME#AAPL", day2).await?;

    // Day 3: a zero-cross sell-through.
    let day3 = date(2025, 1, 22);
    let outcome = coordinator
        .ingest_batch(vec![event(5, -2000, dec!(160.00), day3)])
        .await?;
    println!("day 3 ingest: {outcome:?}");
    drain_and_process(&calc_log, &engine).await?;
    print_snapshot(&store, "DESK1#ACME#AAPL", day3).await?;

    // A late trade dated day 1, arriving after day 3 has already settled,
    // cascades a recalculation through every intervening day.
    let outcome = coordinator
        .ingest_batch(vec![event(6, 200, dec!(149.00), day1)])
        .await?;
    println!("late trade ingest: {outcome:?}");
    drain_and_process(&calc_log, &engine).await?;
    for d in [day1, day2, day3] {
        print_snapshot(&store, "DESK1#ACME#AAPL", d).await?;
    }

    // Re-ingesting the same batch of sequence numbers is a no-op.
    let outcome = coordinator
        .ingest_batch(vec![event(6, 200, dec!(149.00), day1)])
        .await?;
    println!("duplicate ingest (expect 0 inserted): {outcome:?}");

    Ok(())
}

async fn drain_and_process(
    calc_log: &Arc<dyn PartitionedLog<PositionCalcRequest>>,
    engine: &CalculationEngine,
) -> Result<()> {
    for partition in 0..calc_log.partition_count() {
        while let Ok(Some(request)) =
            tokio::time::timeout(Duration::from_millis(50), calc_log.recv(partition)).await
        {
            engine.process(&request).await?;
        }
    }
    Ok(())
}

async fn print_snapshot(store: &Arc<dyn PositionStore>, position_key: &str, business_date: NaiveDate) -> Result<()> {
    let snapshot = store
        .find_snapshot(position_key, business_date, position_engine::domain::DateBasis::TradeDate)
        .await?;
    match snapshot {
        Some(s) => println!(
            "{position_key} {business_date}: net={} version={} method={:?}",
            s.metrics.net_quantity, s.calculation_version, s.calculation_method
        ),
        None => println!("{position_key} {business_date}: <no snapshot>"),
    }
    Ok(())
}
