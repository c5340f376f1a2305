//! Position Engine service entry point.
//!
//! Wires the persistence store, configuration cache, calc-request log, and
//! one Calculation Engine worker per partition, then idles until shutdown.
//! The external trade log and calc-request transport are abstract
//! collaborators; this binary wires up
//! [`position_engine::partitioned_log::InProcessPartitionedLog`], the
//! in-process implementation that stands in for them (see
//! [`position_engine::partitioned_log`]), and the worker loop that drains
//! it. A real deployment swaps in a Kafka-backed
//! [`position_engine::partitioned_log::PartitionedLog`] implementation
//! without touching the coordinator or engine.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use position_engine::calc_engine::CalculationEngine;
use position_engine::clock::SystemClock;
use position_engine::config::Config;
use position_engine::config_cache::ConfigurationCache;
use position_engine::domain::PositionCalcRequest;
use position_engine::ingestion::IngestionCoordinator;
use position_engine::partitioned_log::{InProcessPartitionedLog, PartitionedLog};
use position_engine::persistence::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env().context("load configuration")?;
    info!(
        database_path = %config.database_path,
        settlement_database_path = %config.settlement_database_path,
        partitions = config.calc_request_partitions,
        "position engine starting"
    );

    let clock = Arc::new(SystemClock);
    let store = Arc::new(
        SqliteStore::open(&config.database_path, &config.settlement_database_path, clock.clone())
            .context("open position store")?,
    );
    store.ensure_seed_config().await.context("seed default config")?;

    let config_cache = Arc::new(ConfigurationCache::new(
        store.clone(),
        clock.clone(),
        Duration::from_secs(config.config_cache_refresh_interval_secs),
    ));

    let calc_log: Arc<dyn PartitionedLog<PositionCalcRequest>> =
        Arc::new(InProcessPartitionedLog::new(
            config.calc_request_partitions,
            config.log_channel_capacity,
        ));

    let _ingestion = IngestionCoordinator::new(
        store.clone(),
        config_cache.clone(),
        calc_log.clone(),
        config.ingestion_batch_max,
    );

    let engine = Arc::new(CalculationEngine::new(store.clone(), clock.clone()));
    let deadline = Duration::from_secs(config.calc_request_deadline_secs);

    for partition in 0..calc_log.partition_count() {
        let calc_log = calc_log.clone();
        let engine = engine.clone();
        tokio::spawn(async move {
            loop {
                let Some(request) = calc_log.recv(partition).await else {
                    break;
                };
                let request_id = request.request_id.clone();
                match tokio::time::timeout(deadline, engine.process(&request)).await {
                    Ok(Ok(_snapshot)) => {
                        tracing::debug!(request_id, partition, "calc request processed");
                    }
                    Ok(Err(err)) => {
                        tracing::error!(request_id, partition, error = %err, "calc request failed");
                    }
                    Err(_) => {
                        tracing::warn!(
                            request_id,
                            partition,
                            "calc request exceeded deadline; leaving for redelivery"
                        );
                    }
                }
            }
        });
    }

    info!("position engine ready; awaiting shutdown signal");
    tokio::signal::ctrl_c().await.context("listen for shutdown signal")?;
    info!("shutting down");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "position_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
