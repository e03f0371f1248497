//! Remote tick source trait and structured error types.
//!
//! The `TickSource` trait abstracts over the historical tick store (a relational
//! table, a directory of CSV files, an in-memory fixture) so the cache layer can
//! fetch batches without knowing which backend it talks to. Sources own their
//! connection handle explicitly; nothing is held in process-wide state.

use crate::domain::TickRecord;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error types for tick source operations.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("invalid connection configuration: {0}")]
    Config(String),

    #[error("query failed: {0}")]
    Query(String),
}

/// Raw tick row as returned by a source driver.
///
/// Quote and volume columns may be NULL in the backend; they are carried as
/// `Option` here and collapse to the empty-quote sentinel on conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TickRow {
    #[serde(rename = "InstrumentID")]
    pub instrument_id: String,
    #[serde(with = "row_time")]
    pub update_time: NaiveDateTime,
    pub last_price: f64,
    #[serde(default)]
    pub volume: Option<u64>,
    #[serde(default)]
    pub open_interest: Option<f64>,
    #[serde(default)]
    pub bid_price1: Option<f64>,
    #[serde(default)]
    pub bid_volume1: Option<u64>,
    #[serde(default)]
    pub ask_price1: Option<f64>,
    #[serde(default)]
    pub ask_volume1: Option<u64>,
}

impl From<TickRow> for TickRecord {
    fn from(row: TickRow) -> Self {
        TickRecord {
            instrument_id: row.instrument_id,
            update_time: row.update_time,
            last_price: finite_or_zero(Some(row.last_price)),
            volume: row.volume.unwrap_or(0),
            open_interest: finite_or_zero(row.open_interest),
            bid_price1: finite_or_zero(row.bid_price1),
            bid_volume1: row.bid_volume1.unwrap_or(0),
            ask_price1: finite_or_zero(row.ask_price1),
            ask_volume1: row.ask_volume1.unwrap_or(0),
        }
    }
}

/// NULL and non-finite prices collapse to `0.0`, the empty-quote sentinel.
/// Keeps every stored tick representable in JSON.
fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// The three query shapes a source understands, chosen by which date bounds
/// are present. Bounds are trading dates, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryRange {
    /// `start <= date <= end`
    Between { start: NaiveDate, end: NaiveDate },
    /// `date >= start`
    From { start: NaiveDate },
    /// Everything the source holds for the symbol.
    All,
}

impl QueryRange {
    /// Select the query shape from optional bounds.
    ///
    /// An end bound without a start bound, or an end before the start, is a
    /// malformed query.
    pub fn from_bounds(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Self, SourceError> {
        match (start, end) {
            (Some(start), Some(end)) if end < start => Err(SourceError::Query(format!(
                "end date {end} is before start date {start}"
            ))),
            (Some(start), Some(end)) => Ok(QueryRange::Between { start, end }),
            (Some(start), None) => Ok(QueryRange::From { start }),
            (None, None) => Ok(QueryRange::All),
            (None, Some(end)) => Err(SourceError::Query(format!(
                "end date {end} given without a start date"
            ))),
        }
    }

    /// Whether a trading date falls inside this range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        match *self {
            QueryRange::Between { start, end } => start <= date && date <= end,
            QueryRange::From { start } => date >= start,
            QueryRange::All => true,
        }
    }
}

/// Paged result set of a single query.
pub trait TickCursor {
    /// Total number of rows the query will yield, if the driver knows it up front.
    fn row_count_hint(&self) -> Option<usize>;

    /// Fetch up to `n` further rows. An empty vector means the cursor is exhausted.
    fn fetch_many(&mut self, n: usize) -> Result<Vec<TickRow>, SourceError>;
}

/// Trait for historical tick stores.
///
/// Implementations handle the specifics of one backend. The cache layer sits
/// above this trait; sources don't know about the cache.
pub trait TickSource: Send {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Open (or reopen) the connection.
    fn connect(&mut self) -> Result<(), SourceError>;

    fn is_connected(&self) -> bool;

    /// Run a range query for one symbol. Rows come back ordered by update time.
    fn query<'a>(
        &'a mut self,
        symbol: &str,
        range: QueryRange,
    ) -> Result<Box<dyn TickCursor + 'a>, SourceError>;

    /// The `n`-th distinct trading date strictly before `date` (`n` >= 1), or
    /// `None` if the source holds fewer than `n` earlier dates.
    fn trading_day_before(
        &mut self,
        symbol: &str,
        date: NaiveDate,
        n: u32,
    ) -> Result<Option<NaiveDate>, SourceError>;
}

impl<T: TickSource + ?Sized> TickSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        (**self).connect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn query<'a>(
        &'a mut self,
        symbol: &str,
        range: QueryRange,
    ) -> Result<Box<dyn TickCursor + 'a>, SourceError> {
        (**self).query(symbol, range)
    }

    fn trading_day_before(
        &mut self,
        symbol: &str,
        date: NaiveDate,
        n: u32,
    ) -> Result<Option<NaiveDate>, SourceError> {
        (**self).trading_day_before(symbol, date, n)
    }
}

/// Serde adapter for row timestamps.
///
/// Accepts `YYYY-mm-dd HH:MM:SS` (what SQL backends and CSV exports produce)
/// as well as the ISO `T` separator, with optional fractional seconds.
pub mod row_time {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

    pub fn parse(s: &str) -> Option<NaiveDateTime> {
        FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s.trim(), fmt).ok())
    }

    pub fn serialize<S: Serializer>(t: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format("%Y-%m-%d %H:%M:%S%.f").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid update time '{raw}'")))
    }
}
