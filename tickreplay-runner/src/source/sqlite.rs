//! SQLite tick source over per-symbol vendor tables.
//!
//! Each symbol lives in its own table named from a template (`TB_{symbol}MI`
//! by default) with the vendor's column layout:
//!
//! | column | meaning |
//! |---|---|
//! | `ndate` | trading date, `YYYY-MM-DD` |
//! | `ntime` | time of day, `HH:MM:SS[.fff]` |
//! | `price` | last price |
//! | `vol` | traded volume |
//! | `position_vol` | open interest |
//! | `bid1_price`, `bid1_vol` | best bid |
//! | `sell1_price`, `sell1_vol` | best ask |
//!
//! Queries are paged with `LIMIT`/`OFFSET` so a batch never has to be held by
//! the driver all at once.

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use std::path::PathBuf;
use tickreplay_core::data::source::row_time;
use tickreplay_core::data::{QueryRange, SourceError, TickCursor, TickRow, TickSource};
use tracing::{debug, info};

/// Default per-symbol table name.
pub const DEFAULT_TABLE_TEMPLATE: &str = "TB_{symbol}MI";

const SELECT_COLUMNS: &str = "ndate || ' ' || ntime AS update_time, price, vol, position_vol, \
     bid1_price, bid1_vol, sell1_price, sell1_vol";

pub struct SqliteTickSource {
    path: Option<PathBuf>,
    table_template: String,
    conn: Option<Connection>,
}

impl SqliteTickSource {
    /// A source that opens `path` read-only on `connect`. A missing path is a
    /// configuration error reported at connect time.
    pub fn new(path: Option<PathBuf>, table_template: impl Into<String>) -> Self {
        Self {
            path,
            table_template: table_template.into(),
            conn: None,
        }
    }

    /// Wrap an already-open connection.
    pub fn from_connection(conn: Connection, table_template: impl Into<String>) -> Self {
        Self {
            path: None,
            table_template: table_template.into(),
            conn: Some(conn),
        }
    }

    /// Quoted table name for `symbol`.
    fn table_for(&self, symbol: &str) -> Result<String, SourceError> {
        if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(SourceError::Query(format!("invalid symbol '{symbol}'")));
        }
        Ok(format!("\"{}\"", self.table_template.replace("{symbol}", symbol)))
    }

    fn conn(&self) -> Result<&Connection, SourceError> {
        self.conn
            .as_ref()
            .ok_or_else(|| SourceError::Connection("sqlite source not connected".into()))
    }
}

fn query_error(e: rusqlite::Error) -> SourceError {
    SourceError::Query(e.to_string())
}

impl TickSource for SqliteTickSource {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        let Some(path) = self.path.as_ref() else {
            if self.conn.is_some() {
                return Ok(());
            }
            return Err(SourceError::Config("sqlite source has no database path".into()));
        };

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| SourceError::Connection(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), "sqlite tick database opened");
        self.conn = Some(conn);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn query<'a>(
        &'a mut self,
        symbol: &str,
        range: QueryRange,
    ) -> Result<Box<dyn TickCursor + 'a>, SourceError> {
        let table = self.table_for(symbol)?;
        let conn = self.conn()?;

        let (filter, bounds) = match range {
            QueryRange::Between { start, end } => (
                "ndate BETWEEN ?1 AND ?2",
                vec![Value::Text(start.to_string()), Value::Text(end.to_string())],
            ),
            QueryRange::From { start } => ("ndate >= ?1", vec![Value::Text(start.to_string())]),
            QueryRange::All => ("1 = 1", Vec::new()),
        };

        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {table} WHERE {filter}"),
                params_from_iter(bounds.iter()),
                |row| row.get(0),
            )
            .map_err(query_error)?;
        debug!(symbol, %table, ?range, rows = total, "sqlite query planned");

        let next = bounds.len() + 1;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM {table} WHERE {filter} \
             ORDER BY ndate, ntime LIMIT ?{next} OFFSET ?{}",
            next + 1
        );

        Ok(Box::new(SqliteCursor {
            conn,
            sql,
            bounds,
            symbol: symbol.to_string(),
            offset: 0,
            total: usize::try_from(total).ok(),
        }))
    }

    fn trading_day_before(
        &mut self,
        symbol: &str,
        date: NaiveDate,
        n: u32,
    ) -> Result<Option<NaiveDate>, SourceError> {
        if n == 0 {
            return Err(SourceError::Query("lookback must be at least one day".into()));
        }
        let table = self.table_for(symbol)?;
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                &format!(
                    "SELECT DISTINCT ndate FROM {table} WHERE ndate < ?1 \
                     ORDER BY ndate DESC LIMIT 1 OFFSET ?2"
                ),
                params![date.to_string(), i64::from(n - 1)],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_error)?;

        raw.map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|e| SourceError::Query(format!("bad trading date '{s}': {e}")))
        })
        .transpose()
    }
}

struct SqliteCursor<'a> {
    conn: &'a Connection,
    sql: String,
    bounds: Vec<Value>,
    symbol: String,
    offset: usize,
    total: Option<usize>,
}

impl TickCursor for SqliteCursor<'_> {
    fn row_count_hint(&self) -> Option<usize> {
        self.total
    }

    fn fetch_many(&mut self, n: usize) -> Result<Vec<TickRow>, SourceError> {
        let mut stmt = self.conn.prepare_cached(&self.sql).map_err(query_error)?;
        let mut values = self.bounds.clone();
        values.push(Value::Integer(n as i64));
        values.push(Value::Integer(self.offset as i64));

        let raw = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                    row.get::<_, Option<f64>>(6)?,
                    row.get::<_, Option<f64>>(7)?,
                ))
            })
            .map_err(query_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;

        let mut page = Vec::with_capacity(raw.len());
        for (time, price, vol, oi, bid, bid_vol, ask, ask_vol) in raw {
            let update_time = row_time::parse(&time)
                .ok_or_else(|| SourceError::Query(format!("bad update time '{time}'")))?;
            page.push(TickRow {
                instrument_id: self.symbol.clone(),
                update_time,
                last_price: price.unwrap_or(0.0),
                volume: vol.map(to_count),
                open_interest: oi,
                bid_price1: bid,
                bid_volume1: bid_vol.map(to_count),
                ask_price1: ask,
                ask_volume1: ask_vol.map(to_count),
            });
        }
        self.offset += page.len();
        Ok(page)
    }
}

/// Vendor tables store counts as REAL as often as INTEGER.
fn to_count(v: f64) -> u64 {
    if v.is_finite() && v > 0.0 {
        v.round() as u64
    } else {
        0
    }
}
