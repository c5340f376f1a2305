//! Position Engine
//!
//! Maintains real-time trading positions by consuming a stream of immutable
//! trade events and producing versioned, bitemporal per-date snapshots with
//! weighted average cost (WAC) prices. Two independent views are kept per
//! position: one keyed by trade date, one by settlement date.
//!
//! The core decomposes into five pieces, leaves first: [`wac`] (pure WAC
//! arithmetic), [`persistence`] (typed store contracts over six logical
//! tables), [`config_cache`] (process-local active-config snapshot),
//! [`ingestion`] (trade batching and calc-request dedup), and [`calc_engine`]
//! (strategy selection and snapshot computation). [`domain`] holds the
//! shared data model; [`partitioned_log`] stands in for the external
//! Kafka-like transport both sides drive.

pub mod calc_engine;
pub mod clock;
pub mod config;
pub mod config_cache;
pub mod domain;
pub mod error;
pub mod ingestion;
pub mod partitioned_log;
pub mod persistence;
pub mod wac;

pub use calc_engine::CalculationEngine;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use config_cache::ConfigurationCache;
pub use ingestion::IngestionCoordinator;
pub use partitioned_log::{InProcessPartitionedLog, PartitionedLog};
pub use persistence::{PositionStore, SqliteStore};
pub use wac::WacState;
