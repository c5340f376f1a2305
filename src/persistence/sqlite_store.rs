//! SQLite implementation of [`super::PositionStore`].
//!
//! Mirrors the `VaultDb` pattern used elsewhere in this codebase
//! (`vault/vault_db.rs`): a `Connection` behind a `tokio::sync::Mutex`, WAL
//! mode, schema created idempotently on open, async methods that just hold
//! the lock across a handful of synchronous `rusqlite` calls (SQLite's own
//! file lock already serializes writers, so this is not a bottleneck at the
//! core's scale).
//!
//! Trades, position keys, and configs are basis-independent and always live
//! in the primary connection. Snapshots, prices, and history are kept in
//! two disjoint physical databases — primary for TRADE_DATE, a second file
//! for SETTLEMENT_DATE. This resolves the schema's `[_settled]` table-name
//! suffix as "same schema, different database file" rather than literal
//! suffixed tables in one file, which keeps the two bases impossible to
//! accidentally join in a query.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::domain::{
    CalculationMethod, ChangeReason, ConfigType, DateBasis, DimensionProjection, KeyFormat,
    NewPositionConfig, PositionAveragePrice, PositionConfig, PositionKeyUpsertResult,
    PositionSnapshot, PositionSnapshotHistoryRow, PriceMethod, Trade, TradeMetrics,
    WacMethodData,
};
use crate::error::{StoreError, StoreResult};

use super::PositionStore;

pub struct SqliteStore {
    primary: Arc<Mutex<Connection>>,
    settlement: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
}

const SNAPSHOT_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS position_snapshots (
    position_key TEXT NOT NULL,
    business_date TEXT NOT NULL,
    net_quantity INTEGER NOT NULL,
    gross_long INTEGER NOT NULL,
    gross_short INTEGER NOT NULL,
    trade_count INTEGER NOT NULL,
    total_notional TEXT NOT NULL,
    calculation_version INTEGER NOT NULL,
    calculated_at TEXT NOT NULL,
    calculation_method TEXT NOT NULL,
    calculation_request_id TEXT NOT NULL,
    last_sequence_num INTEGER NOT NULL,
    last_trade_time TEXT NOT NULL,
    PRIMARY KEY (position_key, business_date)
);
CREATE TABLE IF NOT EXISTS position_average_prices (
    position_key TEXT NOT NULL,
    business_date TEXT NOT NULL,
    price_method TEXT NOT NULL,
    price TEXT NOT NULL,
    total_cost_basis TEXT NOT NULL,
    last_updated_sequence INTEGER NOT NULL,
    calculation_version INTEGER NOT NULL,
    calculated_at TEXT NOT NULL,
    PRIMARY KEY (position_key, business_date, price_method)
);
CREATE TABLE IF NOT EXISTS position_snapshots_history (
    history_id INTEGER PRIMARY KEY AUTOINCREMENT,
    position_key TEXT NOT NULL,
    business_date TEXT NOT NULL,
    calculation_version INTEGER NOT NULL,
    net_quantity INTEGER NOT NULL,
    gross_long INTEGER NOT NULL,
    gross_short INTEGER NOT NULL,
    trade_count INTEGER NOT NULL,
    total_notional TEXT NOT NULL,
    calculated_at TEXT NOT NULL,
    superseded_at TEXT,
    change_reason TEXT NOT NULL,
    previous_net_quantity INTEGER,
    calculation_request_id TEXT NOT NULL,
    last_sequence_num INTEGER NOT NULL,
    last_trade_time TEXT NOT NULL,
    calculation_method TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_snapshot_history_coord
    ON position_snapshots_history(position_key, business_date, calculation_version);
";

const PRIMARY_ONLY_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS position_configs (
    config_id INTEGER PRIMARY KEY AUTOINCREMENT,
    config_type TEXT NOT NULL,
    name TEXT NOT NULL,
    key_format TEXT NOT NULL,
    price_methods TEXT NOT NULL,
    scope TEXT NOT NULL,
    active INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(config_type, key_format, scope)
);
CREATE TABLE IF NOT EXISTS position_keys (
    position_id INTEGER PRIMARY KEY AUTOINCREMENT,
    position_key TEXT NOT NULL,
    config_id INTEGER NOT NULL,
    config_type TEXT NOT NULL,
    config_name TEXT NOT NULL,
    book TEXT,
    counterparty TEXT,
    instrument TEXT,
    last_trade_date TEXT NOT NULL,
    last_settlement_date TEXT NOT NULL,
    created_at TEXT NOT NULL,
    created_by_sequence INTEGER NOT NULL,
    UNIQUE(position_key, config_id)
);
CREATE TABLE IF NOT EXISTS position_trades (
    sequence_num INTEGER PRIMARY KEY,
    position_key TEXT NOT NULL,
    trade_time TEXT NOT NULL,
    trade_date TEXT NOT NULL,
    settlement_date TEXT NOT NULL,
    book TEXT NOT NULL,
    counterparty TEXT NOT NULL,
    instrument TEXT NOT NULL,
    signed_quantity INTEGER NOT NULL,
    price TEXT NOT NULL,
    source TEXT NOT NULL,
    source_id TEXT NOT NULL,
    processed_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_trades_key_date ON position_trades(position_key, trade_date);
CREATE INDEX IF NOT EXISTS idx_trades_key_settle ON position_trades(position_key, settlement_date);
CREATE INDEX IF NOT EXISTS idx_trades_dims_date
    ON position_trades(book, counterparty, instrument, trade_date);
CREATE INDEX IF NOT EXISTS idx_trades_dims_settle
    ON position_trades(book, counterparty, instrument, settlement_date);
";

impl SqliteStore {
    pub fn open(
        database_path: &str,
        settlement_database_path: &str,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        use anyhow::Context;

        let primary = Connection::open(database_path).context("open primary position store")?;
        primary.pragma_update(None, "journal_mode", "WAL").ok();
        primary.pragma_update(None, "synchronous", "NORMAL").ok();
        primary
            .execute_batch(SNAPSHOT_SCHEMA)
            .context("create primary trade-date snapshot schema")?;
        primary
            .execute_batch(PRIMARY_ONLY_SCHEMA)
            .context("create trade/key/config schema")?;

        let settlement =
            Connection::open(settlement_database_path).context("open settlement position store")?;
        settlement.pragma_update(None, "journal_mode", "WAL").ok();
        settlement.pragma_update(None, "synchronous", "NORMAL").ok();
        settlement
            .execute_batch(SNAPSHOT_SCHEMA)
            .context("create settlement-date snapshot schema")?;

        Ok(Self {
            primary: Arc::new(Mutex::new(primary)),
            settlement: Arc::new(Mutex::new(settlement)),
            clock,
        })
    }

    /// In-memory variant for tests: fast, file-less, still WAL-free since
    /// `:memory:` ignores journal pragmas.
    pub fn open_in_memory(clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let primary = Connection::open_in_memory()?;
        primary.execute_batch(SNAPSHOT_SCHEMA)?;
        primary.execute_batch(PRIMARY_ONLY_SCHEMA)?;
        let settlement = Connection::open_in_memory()?;
        settlement.execute_batch(SNAPSHOT_SCHEMA)?;
        Ok(Self {
            primary: Arc::new(Mutex::new(primary)),
            settlement: Arc::new(Mutex::new(settlement)),
            clock,
        })
    }

    fn conn_for(&self, basis: DateBasis) -> &Arc<Mutex<Connection>> {
        match basis {
            DateBasis::TradeDate => &self.primary,
            DateBasis::SettlementDate => &self.settlement,
        }
    }

    async fn seed_official_config_if_absent(&self) -> StoreResult<()> {
        let active = self.find_active_configs().await?;
        if active.iter().any(|c| c.config_type == ConfigType::Official) {
            return Ok(());
        }
        self.create_config(PositionConfig::official_seed()).await.map(|_| ())
    }
}

fn decimal_to_sql(d: Decimal) -> String {
    d.to_string()
}

fn decimal_from_sql(s: &str) -> StoreResult<Decimal> {
    Decimal::from_str(s).map_err(|e| StoreError::Permanent(format!("bad decimal {s:?}: {e}")))
}

fn date_to_sql(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn date_from_sql(s: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| StoreError::Permanent(format!("bad date {s:?}: {e}")))
}

fn time_to_sql(t: DateTime<Utc>) -> String {
    t.to_rfc3339()
}

fn time_from_sql(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Permanent(format!("bad timestamp {s:?}: {e}")))
}

#[async_trait]
impl PositionStore for SqliteStore {
    async fn insert_trade(&self, trade: &Trade) -> StoreResult<bool> {
        let conn = self.primary.lock().await;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO position_trades
             (sequence_num, position_key, trade_time, trade_date, settlement_date,
              book, counterparty, instrument, signed_quantity, price, source, source_id, processed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                trade.sequence_num,
                trade.canonical_key(),
                time_to_sql(trade.trade_time),
                date_to_sql(trade.trade_date),
                date_to_sql(trade.settlement_date),
                trade.book,
                trade.counterparty,
                trade.instrument,
                trade.signed_quantity,
                decimal_to_sql(trade.price),
                trade.source,
                trade.source_id,
                time_to_sql(self.clock.now()),
            ],
        )?;
        Ok(changed > 0)
    }

    async fn batch_insert_trades(&self, trades: &[Trade]) -> StoreResult<Vec<Trade>> {
        let mut conn = self.primary.lock().await;
        let tx = conn.transaction()?;
        let mut inserted = Vec::with_capacity(trades.len());
        let processed_at = time_to_sql(self.clock.now());
        for trade in trades {
            let changed = tx.execute(
                "INSERT OR IGNORE INTO position_trades
                 (sequence_num, position_key, trade_time, trade_date, settlement_date,
                  book, counterparty, instrument, signed_quantity, price, source, source_id, processed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    trade.sequence_num,
                    trade.canonical_key(),
                    time_to_sql(trade.trade_time),
                    date_to_sql(trade.trade_date),
                    date_to_sql(trade.settlement_date),
                    trade.book,
                    trade.counterparty,
                    trade.instrument,
                    trade.signed_quantity,
                    decimal_to_sql(trade.price),
                    trade.source,
                    trade.source_id,
                    processed_at,
                ],
            )?;
            if changed > 0 {
                inserted.push(trade.clone());
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    async fn upsert_position_key(
        &self,
        position_key: &str,
        config_id: i64,
        config_type: ConfigType,
        config_name: &str,
        dims: &DimensionProjection,
        trade_date: NaiveDate,
        settlement_date: NaiveDate,
        sequence_num: i64,
    ) -> StoreResult<PositionKeyUpsertResult> {
        let mut conn = self.primary.lock().await;
        let tx = conn.transaction()?;

        let existing: Option<(i64, String, String)> = tx
            .query_row(
                "SELECT position_id, last_trade_date, last_settlement_date
                 FROM position_keys WHERE position_key = ?1 AND config_id = ?2",
                params![position_key, config_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let result = if let Some((position_id, prior_trade, prior_settle)) = existing {
            let prior_trade_date = date_from_sql(&prior_trade)?;
            let prior_settlement_date = date_from_sql(&prior_settle)?;
            let new_trade_date = prior_trade_date.max(trade_date);
            let new_settlement_date = prior_settlement_date.max(settlement_date);
            tx.execute(
                "UPDATE position_keys SET last_trade_date = ?1, last_settlement_date = ?2
                 WHERE position_id = ?3",
                params![
                    date_to_sql(new_trade_date),
                    date_to_sql(new_settlement_date),
                    position_id
                ],
            )?;
            PositionKeyUpsertResult {
                position_id,
                prior_last_trade_date: Some(prior_trade_date),
                prior_last_settlement_date: Some(prior_settlement_date),
            }
        } else {
            tx.execute(
                "INSERT INTO position_keys
                 (position_key, config_id, config_type, config_name, book, counterparty, instrument,
                  last_trade_date, last_settlement_date, created_at, created_by_sequence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    position_key,
                    config_id,
                    config_type_str(config_type),
                    config_name,
                    dims.book,
                    dims.counterparty,
                    dims.instrument,
                    date_to_sql(trade_date),
                    date_to_sql(settlement_date),
                    time_to_sql(self.clock.now()),
                    sequence_num,
                ],
            )?;
            let position_id = tx.last_insert_rowid();
            PositionKeyUpsertResult {
                position_id,
                prior_last_trade_date: None,
                prior_last_settlement_date: None,
            }
        };

        tx.commit()?;
        Ok(result)
    }

    async fn aggregate_metrics(
        &self,
        position_key: &str,
        business_date: NaiveDate,
        basis: DateBasis,
    ) -> StoreResult<Option<TradeMetrics>> {
        let conn = self.primary.lock().await;
        let date_col = date_column(basis);
        let sql = format!(
            "SELECT signed_quantity, price, sequence_num, trade_time FROM position_trades
             WHERE position_key = ?1 AND {date_col} = ?2 ORDER BY sequence_num ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![position_key, date_to_sql(business_date)], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        metrics_from_rows(rows)
    }

    async fn aggregate_metrics_by_dimensions(
        &self,
        dims: &DimensionProjection,
        business_date: NaiveDate,
        basis: DateBasis,
    ) -> StoreResult<Option<TradeMetrics>> {
        let conn = self.primary.lock().await;
        let (sql, binds) = dimension_query(
            "SELECT signed_quantity, price, sequence_num, trade_time FROM position_trades",
            dims,
            basis,
            business_date,
        );
        let mut stmt = conn.prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> = binds.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(params_ref.as_slice(), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        metrics_from_rows(rows)
    }

    async fn find_trades_after_sequence(
        &self,
        position_key: &str,
        business_date: NaiveDate,
        basis: DateBasis,
        after_seq: i64,
    ) -> StoreResult<Vec<Trade>> {
        let conn = self.primary.lock().await;
        let date_col = date_column(basis);
        let sql = format!(
            "SELECT sequence_num, book, counterparty, instrument, signed_quantity, price,
                    trade_time, trade_date, settlement_date, source, source_id
             FROM position_trades
             WHERE position_key = ?1 AND {date_col} = ?2 AND sequence_num > ?3
             ORDER BY sequence_num ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![position_key, date_to_sql(business_date), after_seq],
            trade_row_mapper,
        )?;
        collect_trades(rows)
    }

    async fn find_trades_after_sequence_by_dimensions(
        &self,
        dims: &DimensionProjection,
        business_date: NaiveDate,
        basis: DateBasis,
        after_seq: i64,
    ) -> StoreResult<Vec<Trade>> {
        let conn = self.primary.lock().await;
        let (sql, mut binds) = dimension_query(
            "SELECT sequence_num, book, counterparty, instrument, signed_quantity, price,
                    trade_time, trade_date, settlement_date, source, source_id
             FROM position_trades",
            dims,
            basis,
            business_date,
        );
        let sql = format!("{sql} AND sequence_num > ?{} ORDER BY sequence_num ASC", binds.len() + 1);
        binds.push(Box::new(after_seq));
        let mut stmt = conn.prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> = binds.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(params_ref.as_slice(), trade_row_mapper)?;
        collect_trades(rows)
    }

    async fn find_trades_by_position_key_and_date(
        &self,
        position_key: &str,
        business_date: NaiveDate,
        basis: DateBasis,
    ) -> StoreResult<Vec<Trade>> {
        let conn = self.primary.lock().await;
        let date_col = date_column(basis);
        let sql = format!(
            "SELECT sequence_num, book, counterparty, instrument, signed_quantity, price,
                    trade_time, trade_date, settlement_date, source, source_id
             FROM position_trades
             WHERE position_key = ?1 AND {date_col} = ?2
             ORDER BY sequence_num ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![position_key, date_to_sql(business_date)], trade_row_mapper)?;
        collect_trades(rows)
    }

    async fn find_trades_by_dimensions(
        &self,
        dims: &DimensionProjection,
        business_date: NaiveDate,
        basis: DateBasis,
    ) -> StoreResult<Vec<Trade>> {
        let conn = self.primary.lock().await;
        let (sql, binds) = dimension_query(
            "SELECT sequence_num, book, counterparty, instrument, signed_quantity, price,
                    trade_time, trade_date, settlement_date, source, source_id
             FROM position_trades",
            dims,
            basis,
            business_date,
        );
        let sql = format!("{sql} ORDER BY sequence_num ASC");
        let mut stmt = conn.prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> = binds.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(params_ref.as_slice(), trade_row_mapper)?;
        collect_trades(rows)
    }

    async fn find_snapshot(
        &self,
        position_key: &str,
        business_date: NaiveDate,
        basis: DateBasis,
    ) -> StoreResult<Option<PositionSnapshot>> {
        let conn = self.conn_for(basis).lock().await;
        let row = conn
            .query_row(
                "SELECT position_key, business_date, net_quantity, gross_long, gross_short,
                        trade_count, total_notional, calculation_version, calculated_at,
                        calculation_method, calculation_request_id, last_sequence_num, last_trade_time
                 FROM position_snapshots WHERE position_key = ?1 AND business_date = ?2",
                params![position_key, date_to_sql(business_date)],
                snapshot_row_mapper,
            )
            .optional()?;
        row.transpose()
    }

    async fn find_price(
        &self,
        position_key: &str,
        business_date: NaiveDate,
        price_method: PriceMethod,
        basis: DateBasis,
    ) -> StoreResult<Option<PositionAveragePrice>> {
        let conn = self.conn_for(basis).lock().await;
        let row = conn
            .query_row(
                "SELECT position_key, business_date, price_method, price, total_cost_basis,
                        last_updated_sequence, calculation_version, calculated_at
                 FROM position_average_prices
                 WHERE position_key = ?1 AND business_date = ?2 AND price_method = ?3",
                params![position_key, date_to_sql(business_date), price_method.as_str()],
                price_row_mapper,
            )
            .optional()?;
        row.transpose()
    }

    async fn find_prices_for_snapshot(
        &self,
        position_key: &str,
        business_date: NaiveDate,
        basis: DateBasis,
    ) -> StoreResult<Vec<PositionAveragePrice>> {
        let conn = self.conn_for(basis).lock().await;
        let mut stmt = conn.prepare(
            "SELECT position_key, business_date, price_method, price, total_cost_basis,
                    last_updated_sequence, calculation_version, calculated_at
             FROM position_average_prices WHERE position_key = ?1 AND business_date = ?2",
        )?;
        let rows = stmt.query_map(params![position_key, date_to_sql(business_date)], price_row_mapper)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r??);
        }
        Ok(out)
    }

    async fn save_snapshot(
        &self,
        snapshot: &PositionSnapshot,
        basis: DateBasis,
        reason: ChangeReason,
    ) -> StoreResult<()> {
        let mut conn = self.conn_for(basis).lock().await;
        let tx = conn.transaction()?;

        let existing: Option<(i64, i64)> = tx
            .query_row(
                "SELECT calculation_version, net_quantity FROM position_snapshots
                 WHERE position_key = ?1 AND business_date = ?2",
                params![snapshot.position_key, date_to_sql(snapshot.business_date)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (new_version, previous_net_quantity) = match existing {
            Some((prior_version, prior_net_quantity)) => {
                tx.execute(
                    "UPDATE position_snapshots_history SET superseded_at = ?1
                     WHERE position_key = ?2 AND business_date = ?3 AND superseded_at IS NULL",
                    params![
                        time_to_sql(snapshot.calculated_at),
                        snapshot.position_key,
                        date_to_sql(snapshot.business_date)
                    ],
                )?;
                (prior_version + 1, Some(prior_net_quantity))
            }
            None => (1, None),
        };

        tx.execute(
            "INSERT INTO position_snapshots
             (position_key, business_date, net_quantity, gross_long, gross_short, trade_count,
              total_notional, calculation_version, calculated_at, calculation_method,
              calculation_request_id, last_sequence_num, last_trade_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(position_key, business_date) DO UPDATE SET
                net_quantity = excluded.net_quantity,
                gross_long = excluded.gross_long,
                gross_short = excluded.gross_short,
                trade_count = excluded.trade_count,
                total_notional = excluded.total_notional,
                calculation_version = excluded.calculation_version,
                calculated_at = excluded.calculated_at,
                calculation_method = excluded.calculation_method,
                calculation_request_id = excluded.calculation_request_id,
                last_sequence_num = excluded.last_sequence_num,
                last_trade_time = excluded.last_trade_time",
            params![
                snapshot.position_key,
                date_to_sql(snapshot.business_date),
                snapshot.metrics.net_quantity,
                snapshot.metrics.gross_long,
                snapshot.metrics.gross_short,
                snapshot.metrics.trade_count,
                decimal_to_sql(snapshot.metrics.total_notional),
                new_version,
                time_to_sql(snapshot.calculated_at),
                calc_method_str(snapshot.calculation_method),
                snapshot.calculation_request_id,
                snapshot.metrics.last_sequence_num,
                time_to_sql(snapshot.metrics.last_trade_time),
            ],
        )?;

        tx.execute(
            "INSERT INTO position_snapshots_history
             (position_key, business_date, calculation_version, net_quantity, gross_long,
              gross_short, trade_count, total_notional, calculated_at, superseded_at,
              change_reason, previous_net_quantity, calculation_request_id, last_sequence_num,
              last_trade_time, calculation_method)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                snapshot.position_key,
                date_to_sql(snapshot.business_date),
                new_version,
                snapshot.metrics.net_quantity,
                snapshot.metrics.gross_long,
                snapshot.metrics.gross_short,
                snapshot.metrics.trade_count,
                decimal_to_sql(snapshot.metrics.total_notional),
                time_to_sql(snapshot.calculated_at),
                change_reason_str(reason),
                previous_net_quantity,
                snapshot.calculation_request_id,
                snapshot.metrics.last_sequence_num,
                time_to_sql(snapshot.metrics.last_trade_time),
                calc_method_str(snapshot.calculation_method),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    async fn save_price(&self, price: &PositionAveragePrice, basis: DateBasis) -> StoreResult<()> {
        let conn = self.conn_for(basis).lock().await;
        conn.execute(
            "INSERT INTO position_average_prices
             (position_key, business_date, price_method, price, total_cost_basis,
              last_updated_sequence, calculation_version, calculated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(position_key, business_date, price_method) DO UPDATE SET
                price = excluded.price,
                total_cost_basis = excluded.total_cost_basis,
                last_updated_sequence = excluded.last_updated_sequence,
                calculation_version = excluded.calculation_version,
                calculated_at = excluded.calculated_at",
            params![
                price.position_key,
                date_to_sql(price.business_date),
                price.price_method.as_str(),
                decimal_to_sql(price.price),
                decimal_to_sql(price.method_data.total_cost_basis),
                price.method_data.last_updated_sequence,
                price.calculation_version,
                time_to_sql(price.calculated_at),
            ],
        )?;
        Ok(())
    }

    async fn find_snapshots_for_position(
        &self,
        position_key: &str,
        basis: DateBasis,
        from_date: Option<NaiveDate>,
        to_date: Option<NaiveDate>,
    ) -> StoreResult<Vec<PositionSnapshot>> {
        let conn = self.conn_for(basis).lock().await;
        let mut sql = String::from(
            "SELECT position_key, business_date, net_quantity, gross_long, gross_short,
                    trade_count, total_notional, calculation_version, calculated_at,
                    calculation_method, calculation_request_id, last_sequence_num, last_trade_time
             FROM position_snapshots WHERE position_key = ?1",
        );
        let mut binds: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(position_key.to_string())];
        if let Some(from) = from_date {
            sql.push_str(&format!(" AND business_date >= ?{}", binds.len() + 1));
            binds.push(Box::new(date_to_sql(from)));
        }
        if let Some(to) = to_date {
            sql.push_str(&format!(" AND business_date <= ?{}", binds.len() + 1));
            binds.push(Box::new(date_to_sql(to)));
        }
        sql.push_str(" ORDER BY business_date ASC");
        let mut stmt = conn.prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> = binds.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(params_ref.as_slice(), snapshot_row_mapper)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r??);
        }
        Ok(out)
    }

    async fn find_snapshot_history(
        &self,
        position_key: &str,
        business_date: NaiveDate,
        basis: DateBasis,
    ) -> StoreResult<Vec<PositionSnapshotHistoryRow>> {
        let conn = self.conn_for(basis).lock().await;
        let mut stmt = conn.prepare(
            "SELECT position_key, business_date, calculation_version, net_quantity, gross_long,
                    gross_short, trade_count, total_notional, calculated_at, superseded_at,
                    change_reason, previous_net_quantity, calculation_request_id,
                    last_sequence_num, last_trade_time, calculation_method
             FROM position_snapshots_history
             WHERE position_key = ?1 AND business_date = ?2
             ORDER BY calculation_version ASC",
        )?;
        let rows = stmt.query_map(params![position_key, date_to_sql(business_date)], history_row_mapper)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r??);
        }
        Ok(out)
    }

    async fn find_all_configs(&self) -> StoreResult<Vec<PositionConfig>> {
        let conn = self.primary.lock().await;
        let mut stmt = conn.prepare(
            "SELECT config_id, config_type, name, key_format, price_methods, scope, active,
                    created_at, updated_at FROM position_configs ORDER BY config_id ASC",
        )?;
        let rows = stmt.query_map([], config_row_mapper)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r??);
        }
        Ok(out)
    }

    async fn find_active_configs(&self) -> StoreResult<Vec<PositionConfig>> {
        let conn = self.primary.lock().await;
        let mut stmt = conn.prepare(
            "SELECT config_id, config_type, name, key_format, price_methods, scope, active,
                    created_at, updated_at FROM position_configs WHERE active = 1
             ORDER BY config_id ASC",
        )?;
        let rows = stmt.query_map([], config_row_mapper)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r??);
        }
        Ok(out)
    }

    async fn find_config_by_id(&self, config_id: i64) -> StoreResult<Option<PositionConfig>> {
        let conn = self.primary.lock().await;
        let row = conn
            .query_row(
                "SELECT config_id, config_type, name, key_format, price_methods, scope, active,
                        created_at, updated_at FROM position_configs WHERE config_id = ?1",
                params![config_id],
                config_row_mapper,
            )
            .optional()?;
        row.transpose()
    }

    async fn create_config(&self, new_config: NewPositionConfig) -> StoreResult<PositionConfig> {
        let conn = self.primary.lock().await;
        let now = time_to_sql(self.clock.now());
        conn.execute(
            "INSERT INTO position_configs
             (config_type, name, key_format, price_methods, scope, active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                config_type_str(new_config.config_type),
                new_config.name,
                key_format_str(new_config.key_format),
                price_methods_to_sql(&new_config.price_methods),
                serde_json::to_string(&new_config.scope)
                    .map_err(|e| StoreError::Permanent(e.to_string()))?,
                new_config.active,
                now,
            ],
        )?;
        let config_id = conn.last_insert_rowid();
        drop(conn);
        self.find_config_by_id(config_id)
            .await?
            .ok_or_else(|| StoreError::Permanent("config vanished after insert".into()))
    }

    async fn update_config(
        &self,
        config_id: i64,
        new_config: NewPositionConfig,
    ) -> StoreResult<PositionConfig> {
        let conn = self.primary.lock().await;
        let now = time_to_sql(self.clock.now());
        let changed = conn.execute(
            "UPDATE position_configs SET config_type = ?1, name = ?2, key_format = ?3,
                price_methods = ?4, scope = ?5, active = ?6, updated_at = ?7
             WHERE config_id = ?8",
            params![
                config_type_str(new_config.config_type),
                new_config.name,
                key_format_str(new_config.key_format),
                price_methods_to_sql(&new_config.price_methods),
                serde_json::to_string(&new_config.scope)
                    .map_err(|e| StoreError::Permanent(e.to_string()))?,
                new_config.active,
                now,
                config_id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("config {config_id}")));
        }
        drop(conn);
        self.find_config_by_id(config_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("config {config_id}")))
    }

    async fn deactivate_config(&self, config_id: i64) -> StoreResult<()> {
        let conn = self.primary.lock().await;
        let changed = conn.execute(
            "UPDATE position_configs SET active = 0 WHERE config_id = ?1",
            params![config_id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("config {config_id}")));
        }
        Ok(())
    }
}

impl SqliteStore {
    /// Seed the OFFICIAL default config if no OFFICIAL config is
    /// currently active. Exposed so binaries/tests can call it once at
    /// startup without duplicating the default on every open.
    pub async fn ensure_seed_config(&self) -> StoreResult<()> {
        self.seed_official_config_if_absent().await
    }
}

fn date_column(basis: DateBasis) -> &'static str {
    match basis {
        DateBasis::TradeDate => "trade_date",
        DateBasis::SettlementDate => "settlement_date",
    }
}

fn dimension_query(
    select: &str,
    dims: &DimensionProjection,
    basis: DateBasis,
    business_date: NaiveDate,
) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
    let mut sql = format!("{select} WHERE {} = ?1", date_column(basis));
    let mut binds: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(date_to_sql(business_date))];
    if let Some(book) = &dims.book {
        sql.push_str(&format!(" AND book = ?{}", binds.len() + 1));
        binds.push(Box::new(book.clone()));
    }
    if let Some(cpty) = &dims.counterparty {
        sql.push_str(&format!(" AND counterparty = ?{}", binds.len() + 1));
        binds.push(Box::new(cpty.clone()));
    }
    if let Some(inst) = &dims.instrument {
        sql.push_str(&format!(" AND instrument = ?{}", binds.len() + 1));
        binds.push(Box::new(inst.clone()));
    }
    (sql, binds)
}

fn metrics_from_rows(
    rows: impl Iterator<Item = rusqlite::Result<(i64, String, i64, String)>>,
) -> StoreResult<Option<TradeMetrics>> {
    let mut metrics: Option<TradeMetrics> = None;
    for row in rows {
        let (qty, price_s, seq, time_s) = row?;
        let price = decimal_from_sql(&price_s)?;
        let time = time_from_sql(&time_s)?;
        let m = metrics.get_or_insert_with(|| TradeMetrics::zero(time));
        m.apply(seq, qty, price, time);
    }
    Ok(metrics)
}

type TradeRowTuple = (i64, String, String, String, i64, String, String, String, String, String, String);

fn trade_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<TradeRowTuple> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn collect_trades(
    rows: impl Iterator<Item = rusqlite::Result<TradeRowTuple>>,
) -> StoreResult<Vec<Trade>> {
    let mut out = Vec::new();
    for row in rows {
        let (seq, book, cpty, inst, qty, price, trade_time, trade_date, settlement_date, source, source_id) =
            row?;
        out.push(Trade {
            sequence_num: seq,
            book,
            counterparty: cpty,
            instrument: inst,
            signed_quantity: qty,
            price: decimal_from_sql(&price)?,
            trade_time: time_from_sql(&trade_time)?,
            trade_date: date_from_sql(&trade_date)?,
            settlement_date: date_from_sql(&settlement_date)?,
            source,
            source_id,
        });
    }
    Ok(out)
}

#[allow(clippy::type_complexity)]
fn snapshot_row_mapper(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<StoreResult<PositionSnapshot>> {
    let position_key: String = row.get(0)?;
    let business_date: String = row.get(1)?;
    let net_quantity: i64 = row.get(2)?;
    let gross_long: i64 = row.get(3)?;
    let gross_short: i64 = row.get(4)?;
    let trade_count: i64 = row.get(5)?;
    let total_notional: String = row.get(6)?;
    let calculation_version: i64 = row.get(7)?;
    let calculated_at: String = row.get(8)?;
    let calculation_method: String = row.get(9)?;
    let calculation_request_id: String = row.get(10)?;
    let last_sequence_num: i64 = row.get(11)?;
    let last_trade_time: String = row.get(12)?;

    Ok((|| {
        Ok(PositionSnapshot {
            position_key,
            business_date: date_from_sql(&business_date)?,
            metrics: TradeMetrics {
                net_quantity,
                gross_long,
                gross_short,
                trade_count,
                total_notional: decimal_from_sql(&total_notional)?,
                last_sequence_num,
                last_trade_time: time_from_sql(&last_trade_time)?,
            },
            calculation_version,
            calculated_at: time_from_sql(&calculated_at)?,
            calculation_method: calc_method_from_str(&calculation_method)?,
            calculation_request_id,
        })
    })())
}

fn price_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoreResult<PositionAveragePrice>> {
    let position_key: String = row.get(0)?;
    let business_date: String = row.get(1)?;
    let price_method: String = row.get(2)?;
    let price: String = row.get(3)?;
    let total_cost_basis: String = row.get(4)?;
    let last_updated_sequence: i64 = row.get(5)?;
    let calculation_version: i64 = row.get(6)?;
    let calculated_at: String = row.get(7)?;

    Ok((|| {
        Ok(PositionAveragePrice {
            position_key,
            business_date: date_from_sql(&business_date)?,
            price_method: price_method_from_str(&price_method)?,
            price: decimal_from_sql(&price)?,
            method_data: WacMethodData {
                total_cost_basis: decimal_from_sql(&total_cost_basis)?,
                last_updated_sequence,
            },
            calculation_version,
            calculated_at: time_from_sql(&calculated_at)?,
        })
    })())
}

fn history_row_mapper(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<StoreResult<PositionSnapshotHistoryRow>> {
    let position_key: String = row.get(0)?;
    let business_date: String = row.get(1)?;
    let calculation_version: i64 = row.get(2)?;
    let net_quantity: i64 = row.get(3)?;
    let gross_long: i64 = row.get(4)?;
    let gross_short: i64 = row.get(5)?;
    let trade_count: i64 = row.get(6)?;
    let total_notional: String = row.get(7)?;
    let calculated_at: String = row.get(8)?;
    let superseded_at: Option<String> = row.get(9)?;
    let change_reason: String = row.get(10)?;
    let previous_net_quantity: Option<i64> = row.get(11)?;
    let calculation_request_id: String = row.get(12)?;
    let last_sequence_num: i64 = row.get(13)?;
    let last_trade_time: String = row.get(14)?;
    let calculation_method: String = row.get(15)?;

    Ok((|| {
        Ok(PositionSnapshotHistoryRow {
            position_key,
            business_date: date_from_sql(&business_date)?,
            calculation_version,
            metrics: TradeMetrics {
                net_quantity,
                gross_long,
                gross_short,
                trade_count,
                total_notional: decimal_from_sql(&total_notional)?,
                last_sequence_num,
                last_trade_time: time_from_sql(&last_trade_time)?,
            },
            calculated_at: time_from_sql(&calculated_at)?,
            superseded_at: superseded_at.map(|s| time_from_sql(&s)).transpose()?,
            change_reason: change_reason_from_str(&change_reason)?,
            previous_net_quantity,
            calculation_request_id,
            calculation_method: calc_method_from_str(&calculation_method)?,
        })
    })())
}

fn config_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoreResult<PositionConfig>> {
    let config_id: i64 = row.get(0)?;
    let config_type: String = row.get(1)?;
    let name: String = row.get(2)?;
    let key_format: String = row.get(3)?;
    let price_methods: String = row.get(4)?;
    let scope: String = row.get(5)?;
    let active: bool = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok((|| {
        Ok(PositionConfig {
            config_id,
            config_type: config_type_from_str(&config_type)?,
            name,
            key_format: key_format_from_str(&key_format)?,
            price_methods: price_methods_from_sql(&price_methods)?,
            scope: serde_json::from_str(&scope)
                .map_err(|e| StoreError::Permanent(format!("bad scope json: {e}")))?,
            active,
            created_at: time_from_sql(&created_at)?,
            updated_at: time_from_sql(&updated_at)?,
        })
    })())
}

fn config_type_str(t: ConfigType) -> &'static str {
    match t {
        ConfigType::Official => "OFFICIAL",
        ConfigType::User => "USER",
        ConfigType::Desk => "DESK",
    }
}

fn config_type_from_str(s: &str) -> StoreResult<ConfigType> {
    match s {
        "OFFICIAL" => Ok(ConfigType::Official),
        "USER" => Ok(ConfigType::User),
        "DESK" => Ok(ConfigType::Desk),
        other => Err(StoreError::Permanent(format!("unknown config_type {other:?}"))),
    }
}

fn key_format_str(k: KeyFormat) -> &'static str {
    match k {
        KeyFormat::BookCounterpartyInstrument => "BOOK_COUNTERPARTY_INSTRUMENT",
        KeyFormat::BookInstrument => "BOOK_INSTRUMENT",
        KeyFormat::CounterpartyInstrument => "COUNTERPARTY_INSTRUMENT",
        KeyFormat::Instrument => "INSTRUMENT",
        KeyFormat::Book => "BOOK",
    }
}

fn key_format_from_str(s: &str) -> StoreResult<KeyFormat> {
    match s {
        "BOOK_COUNTERPARTY_INSTRUMENT" => Ok(KeyFormat::BookCounterpartyInstrument),
        "BOOK_INSTRUMENT" => Ok(KeyFormat::BookInstrument),
        "COUNTERPARTY_INSTRUMENT" => Ok(KeyFormat::CounterpartyInstrument),
        "INSTRUMENT" => Ok(KeyFormat::Instrument),
        "BOOK" => Ok(KeyFormat::Book),
        other => Err(StoreError::Permanent(format!("unknown key_format {other:?}"))),
    }
}

fn calc_method_str(m: CalculationMethod) -> &'static str {
    match m {
        CalculationMethod::FullRecalc => "FULL_RECALC",
        CalculationMethod::Incremental => "INCREMENTAL",
    }
}

fn calc_method_from_str(s: &str) -> StoreResult<CalculationMethod> {
    match s {
        "FULL_RECALC" => Ok(CalculationMethod::FullRecalc),
        "INCREMENTAL" => Ok(CalculationMethod::Incremental),
        other => Err(StoreError::Permanent(format!("unknown calculation_method {other:?}"))),
    }
}

fn change_reason_str(r: ChangeReason) -> &'static str {
    match r {
        ChangeReason::Initial => "INITIAL",
        ChangeReason::LateTrade => "LATE_TRADE",
        ChangeReason::Correction => "CORRECTION",
    }
}

fn change_reason_from_str(s: &str) -> StoreResult<ChangeReason> {
    match s {
        "INITIAL" => Ok(ChangeReason::Initial),
        "LATE_TRADE" => Ok(ChangeReason::LateTrade),
        "CORRECTION" => Ok(ChangeReason::Correction),
        other => Err(StoreError::Permanent(format!("unknown change_reason {other:?}"))),
    }
}

fn price_method_from_str(s: &str) -> StoreResult<PriceMethod> {
    match s {
        "WAC" => Ok(PriceMethod::Wac),
        other => Err(StoreError::Permanent(format!("unknown price_method {other:?}"))),
    }
}

fn price_methods_to_sql(methods: &[PriceMethod]) -> String {
    methods.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(",")
}

fn price_methods_from_sql(s: &str) -> StoreResult<Vec<PriceMethod>> {
    s.split(',')
        .filter(|s| !s.is_empty())
        .map(price_method_from_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory(Arc::new(SystemClock)).unwrap()
    }

    fn trade(seq: i64, qty: i64, price: Decimal, date: NaiveDate) -> Trade {
        Trade {
            sequence_num: seq,
            book: "B".into(),
            counterparty: "C".into(),
            instrument: "I".into(),
            signed_quantity: qty,
            price,
            trade_time: Utc::now(),
            trade_date: date,
            settlement_date: date,
            source: "TEST".into(),
            source_id: format!("s{seq}"),
        }
    }

    #[tokio::test]
    async fn insert_trade_is_idempotent_by_sequence() {
        let store = store();
        let d = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        let t = trade(1, 100, dec!(10.0), d);
        assert!(store.insert_trade(&t).await.unwrap());
        assert!(!store.insert_trade(&t).await.unwrap());

        let found = store
            .find_trades_by_position_key_and_date("B#C#I", d, DateBasis::TradeDate)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn batch_insert_skips_duplicates_and_preserves_order() {
        let store = store();
        let d = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        let t1 = trade(1, 100, dec!(10.0), d);
        let t2 = trade(2, 200, dec!(11.0), d);
        store.insert_trade(&t1).await.unwrap();

        let inserted = store.batch_insert_trades(&[t1.clone(), t2.clone()]).await.unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].sequence_num, 2);
    }

    #[tokio::test]
    async fn upsert_position_key_returns_prior_dates_and_takes_max() {
        let store = store();
        let d1 = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 1, 22).unwrap();
        let dims = DimensionProjection {
            book: Some("B".into()),
            counterparty: Some("C".into()),
            instrument: Some("I".into()),
        };

        let first = store
            .upsert_position_key("B#C#I", 1, ConfigType::Official, "Official Positions", &dims, d1, d1, 1)
            .await
            .unwrap();
        assert!(first.prior_last_trade_date.is_none());

        let second = store
            .upsert_position_key("B#C#I", 1, ConfigType::Official, "Official Positions", &dims, d2, d2, 2)
            .await
            .unwrap();
        assert_eq!(second.position_id, first.position_id);
        assert_eq!(second.prior_last_trade_date, Some(d1));

        // An earlier trade date must not regress last_trade_date.
        let third = store
            .upsert_position_key("B#C#I", 1, ConfigType::Official, "Official Positions", &dims, d1, d1, 3)
            .await
            .unwrap();
        assert_eq!(third.prior_last_trade_date, Some(d2));
    }

    #[tokio::test]
    async fn save_snapshot_versions_and_history_follow_supersession_invariant() {
        let store = store();
        let d = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        let now = Utc::now();
        let metrics = TradeMetrics {
            net_quantity: 100,
            gross_long: 100,
            gross_short: 0,
            trade_count: 1,
            total_notional: dec!(1000),
            last_sequence_num: 1,
            last_trade_time: now,
        };
        let snap = PositionSnapshot::new(
            "B#C#I".into(),
            d,
            metrics,
            0,
            now,
            CalculationMethod::FullRecalc,
            "req-1".into(),
        );
        store.save_snapshot(&snap, DateBasis::TradeDate, ChangeReason::Initial).await.unwrap();

        let mut metrics2 = snap.metrics;
        metrics2.net_quantity = 200;
        let snap2 = PositionSnapshot::new(
            "B#C#I".into(),
            d,
            metrics2,
            0,
            now + chrono::Duration::seconds(1),
            CalculationMethod::Incremental,
            "req-2".into(),
        );
        store.save_snapshot(&snap2, DateBasis::TradeDate, ChangeReason::Initial).await.unwrap();

        let current = store.find_snapshot("B#C#I", d, DateBasis::TradeDate).await.unwrap().unwrap();
        assert_eq!(current.calculation_version, 2);
        assert_eq!(current.metrics.net_quantity, 200);

        let history = store.find_snapshot_history("B#C#I", d, DateBasis::TradeDate).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].calculation_version, 1);
        assert!(history[0].superseded_at.is_some());
        assert_eq!(history[0].previous_net_quantity, None);
        assert_eq!(history[1].calculation_version, 2);
        assert!(history[1].superseded_at.is_none());
        assert_eq!(history[1].previous_net_quantity, Some(100));
    }

    #[tokio::test]
    async fn trade_date_and_settlement_date_snapshots_never_share_rows() {
        let store = store();
        let d = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        let now = Utc::now();
        let metrics = TradeMetrics {
            net_quantity: 1,
            gross_long: 1,
            gross_short: 0,
            trade_count: 1,
            total_notional: dec!(1),
            last_sequence_num: 1,
            last_trade_time: now,
        };
        let snap = PositionSnapshot::new(
            "B#C#I".into(),
            d,
            metrics,
            0,
            now,
            CalculationMethod::FullRecalc,
            "req-1".into(),
        );
        store.save_snapshot(&snap, DateBasis::TradeDate, ChangeReason::Initial).await.unwrap();
        let settle = store.find_snapshot("B#C#I", d, DateBasis::SettlementDate).await.unwrap();
        assert!(settle.is_none());
    }

    #[tokio::test]
    async fn seed_official_config_is_idempotent() {
        let store = store();
        store.ensure_seed_config().await.unwrap();
        store.ensure_seed_config().await.unwrap();
        let active = store.find_active_configs().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].config_type, ConfigType::Official);
    }

    #[tokio::test]
    async fn open_creates_two_physically_separate_database_files() {
        let primary = tempfile::NamedTempFile::new().unwrap();
        let settlement = tempfile::NamedTempFile::new().unwrap();
        let store = SqliteStore::open(
            primary.path().to_str().unwrap(),
            settlement.path().to_str().unwrap(),
            Arc::new(SystemClock),
        )
        .unwrap();

        let d = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        let snapshot = PositionSnapshot::new(
            "B#C#I".into(),
            d,
            TradeMetrics::zero(Utc::now()),
            0,
            Utc::now(),
            CalculationMethod::FullRecalc,
            "req-1".into(),
        );
        store
            .save_snapshot(&snapshot, DateBasis::SettlementDate, ChangeReason::Initial)
            .await
            .unwrap();

        assert!(
            store
                .find_snapshot("B#C#I", d, DateBasis::TradeDate)
                .await
                .unwrap()
                .is_none(),
            "a snapshot saved under SETTLEMENT_DATE must not appear in the primary file's TRADE_DATE table"
        );
        assert!(store
            .find_snapshot("B#C#I", d, DateBasis::SettlementDate)
            .await
            .unwrap()
            .is_some());

        let settlement_bytes = std::fs::read(settlement.path()).unwrap();
        assert!(!settlement_bytes.is_empty(), "settlement file must have been written to independently of the primary file");
    }
}
