//! In-memory tick source.
//!
//! Holds rows per symbol and records every query it answers, which makes it
//! the fixture of choice for cache and replay tests. Connection and query
//! failures can be scripted to exercise the degrade-to-partial policy.

use super::source::{QueryRange, SourceError, TickCursor, TickRow, TickSource};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

/// A query the source has answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryLogEntry {
    pub symbol: String,
    pub range: QueryRange,
}

#[derive(Debug, Default)]
pub struct MemoryTickSource {
    rows: HashMap<String, Vec<TickRow>>,
    connected: bool,
    refuse_connect: bool,
    /// Zero-based index of the query that should fail, if any.
    fail_query_at: Option<usize>,
    queries: Vec<QueryLogEntry>,
    pages_served: usize,
}

impl MemoryTickSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rows for a symbol. Rows are kept in update-time order.
    pub fn with_rows(mut self, symbol: &str, rows: Vec<TickRow>) -> Self {
        let entry = self.rows.entry(symbol.to_string()).or_default();
        entry.extend(rows);
        entry.sort_by_key(|r| r.update_time);
        self
    }

    /// Make every `connect` call fail.
    pub fn refusing_connections(mut self) -> Self {
        self.refuse_connect = true;
        self
    }

    /// Make the `index`-th query (zero-based) fail with a query error.
    pub fn failing_query_at(mut self, index: usize) -> Self {
        self.fail_query_at = Some(index);
        self
    }

    /// Every query answered or attempted so far, in order.
    pub fn queries(&self) -> &[QueryLogEntry] {
        &self.queries
    }

    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    /// Number of non-empty pages handed out across all cursors.
    pub fn pages_served(&self) -> usize {
        self.pages_served
    }
}

impl TickSource for MemoryTickSource {
    fn name(&self) -> &str {
        "memory"
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        if self.refuse_connect {
            self.connected = false;
            return Err(SourceError::Connection("memory source refuses connections".into()));
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn query<'a>(
        &'a mut self,
        symbol: &str,
        range: QueryRange,
    ) -> Result<Box<dyn TickCursor + 'a>, SourceError> {
        if !self.connected {
            return Err(SourceError::Connection("not connected".into()));
        }

        let index = self.queries.len();
        self.queries.push(QueryLogEntry {
            symbol: symbol.to_string(),
            range,
        });
        if self.fail_query_at == Some(index) {
            return Err(SourceError::Query(format!("scripted failure on query {index}")));
        }

        let rows: Vec<TickRow> = self
            .rows
            .get(symbol)
            .map(|rows| {
                rows.iter()
                    .filter(|r| range.contains(r.update_time.date()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(Box::new(MemoryCursor {
            rows,
            position: 0,
            pages_served: &mut self.pages_served,
        }))
    }

    fn trading_day_before(
        &mut self,
        symbol: &str,
        date: NaiveDate,
        n: u32,
    ) -> Result<Option<NaiveDate>, SourceError> {
        if !self.connected {
            return Err(SourceError::Connection("not connected".into()));
        }
        if n == 0 {
            return Err(SourceError::Query("lookback must be at least one day".into()));
        }
        let dates: BTreeSet<NaiveDate> = self
            .rows
            .get(symbol)
            .map(|rows| {
                rows.iter()
                    .map(|r| r.update_time.date())
                    .filter(|d| *d < date)
                    .collect()
            })
            .unwrap_or_default();
        Ok(dates.iter().rev().nth(n as usize - 1).copied())
    }
}

struct MemoryCursor<'a> {
    rows: Vec<TickRow>,
    position: usize,
    pages_served: &'a mut usize,
}

impl TickCursor for MemoryCursor<'_> {
    fn row_count_hint(&self) -> Option<usize> {
        Some(self.rows.len())
    }

    fn fetch_many(&mut self, n: usize) -> Result<Vec<TickRow>, SourceError> {
        let end = (self.position + n).min(self.rows.len());
        let page = self.rows[self.position..end].to_vec();
        self.position = end;
        if !page.is_empty() {
            *self.pages_served += 1;
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::source::row_time;

    fn row(ts: &str, last: f64) -> TickRow {
        TickRow {
            instrument_id: "X".into(),
            update_time: row_time::parse(ts).unwrap(),
            last_price: last,
            volume: Some(1),
            open_interest: None,
            bid_price1: Some(last - 1.0),
            bid_volume1: Some(1),
            ask_price1: Some(last + 1.0),
            ask_volume1: Some(1),
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn query_requires_connection() {
        let mut src = MemoryTickSource::new();
        assert!(src.query("X", QueryRange::All).is_err());
        src.connect().unwrap();
        assert!(src.query("X", QueryRange::All).is_ok());
    }

    #[test]
    fn cursor_pages_filtered_rows() {
        let mut src = MemoryTickSource::new().with_rows(
            "X",
            vec![
                row("2024-01-01 09:00:00", 10.0),
                row("2024-01-02 09:00:00", 11.0),
                row("2024-01-03 09:00:00", 12.0),
            ],
        );
        src.connect().unwrap();
        {
            let mut cursor = src
                .query(
                    "X",
                    QueryRange::Between {
                        start: d(2024, 1, 2),
                        end: d(2024, 1, 3),
                    },
                )
                .unwrap();
            assert_eq!(cursor.row_count_hint(), Some(2));
            assert_eq!(cursor.fetch_many(1).unwrap().len(), 1);
            assert_eq!(cursor.fetch_many(1).unwrap()[0].last_price, 12.0);
            assert!(cursor.fetch_many(1).unwrap().is_empty());
        }
        assert_eq!(src.pages_served(), 2);
        assert_eq!(src.query_count(), 1);
    }

    #[test]
    fn trading_day_lookback() {
        let mut src = MemoryTickSource::new().with_rows(
            "X",
            vec![
                row("2024-01-02 09:00:00", 10.0),
                row("2024-01-02 10:00:00", 10.5),
                row("2024-01-03 09:00:00", 11.0),
                row("2024-01-05 09:00:00", 12.0),
            ],
        );
        src.connect().unwrap();
        assert_eq!(
            src.trading_day_before("X", d(2024, 1, 5), 1).unwrap(),
            Some(d(2024, 1, 3))
        );
        assert_eq!(
            src.trading_day_before("X", d(2024, 1, 5), 2).unwrap(),
            Some(d(2024, 1, 2))
        );
        assert_eq!(src.trading_day_before("X", d(2024, 1, 5), 3).unwrap(), None);
    }

    #[test]
    fn scripted_query_failure() {
        let mut src = MemoryTickSource::new().failing_query_at(1);
        src.connect().unwrap();
        assert!(src.query("X", QueryRange::All).is_ok());
        assert!(matches!(
            src.query("X", QueryRange::All),
            Err(SourceError::Query(_))
        ));
    }
}
