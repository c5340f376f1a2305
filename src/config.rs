//! Process configuration, loaded the way `models.rs::Config::from_env`
//! does elsewhere in this codebase: `dotenv().ok()` first, then
//! `env::var(...).unwrap_or_else(|| default)` per field.

#[derive(Debug, Clone)]
pub struct Config {
    /// Primary store: trades, position keys, configs, and the TRADE_DATE
    /// snapshot/price/history tables.
    pub database_path: String,
    /// Disjoint store holding only the SETTLEMENT_DATE snapshot/price/
    /// history tables.
    pub settlement_database_path: String,
    /// Upper bound on one ingestion batch.
    pub ingestion_batch_max: usize,
    /// Deadline for processing a single calc request before it is left
    /// un-acked for redelivery (default >= 30s).
    pub calc_request_deadline_secs: u64,
    /// TTL for the configuration cache (default 60s).
    pub config_cache_refresh_interval_secs: u64,
    /// Number of calc-request log partitions; one worker runs per partition.
    pub calc_request_partitions: usize,
    /// Bounded channel capacity backing the in-process partitioned log;
    /// there is no in-memory unbounded queue.
    pub log_channel_capacity: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./position_engine.db".to_string());

        let settlement_database_path = std::env::var("SETTLEMENT_DATABASE_PATH")
            .unwrap_or_else(|_| "./position_engine_settlement.db".to_string());

        let ingestion_batch_max = std::env::var("INGESTION_BATCH_MAX")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .unwrap_or(5000);

        let calc_request_deadline_secs = std::env::var("CALC_REQUEST_DEADLINE_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let config_cache_refresh_interval_secs = std::env::var("CONFIG_CACHE_REFRESH_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);

        let calc_request_partitions = std::env::var("CALC_REQUEST_PARTITIONS")
            .unwrap_or_else(|_| "8".to_string())
            .parse()
            .unwrap_or(8);

        let log_channel_capacity = std::env::var("LOG_CHANNEL_CAPACITY")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()
            .unwrap_or(10000);

        Ok(Self {
            database_path,
            settlement_database_path,
            ingestion_batch_max,
            calc_request_deadline_secs,
            config_cache_refresh_interval_secs,
            calc_request_partitions,
            log_channel_capacity,
        })
    }
}
