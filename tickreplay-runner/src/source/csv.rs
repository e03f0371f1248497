//! CSV tick source: one `{dir}/{symbol}.csv` file per symbol.
//!
//! Headers use the gateway field names (`InstrumentID`, `UpdateTime`,
//! `LastPrice`, `Volume`, `OpenInterest`, `BidPrice1`, `BidVolume1`,
//! `AskPrice1`, `AskVolume1`). Empty cells are read as missing values.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tickreplay_core::data::{QueryRange, SourceError, TickCursor, TickRow, TickSource};
use tracing::debug;

pub struct CsvTickSource {
    dir: PathBuf,
    connected: bool,
}

impl CsvTickSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            connected: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, symbol: &str) -> Result<PathBuf, SourceError> {
        if symbol.is_empty() || symbol.contains(['/', '\\']) || symbol.starts_with('.') {
            return Err(SourceError::Query(format!("invalid symbol '{symbol}'")));
        }
        Ok(self.dir.join(format!("{symbol}.csv")))
    }

    /// Every row in the symbol's file, sorted by update time.
    fn read_rows(&self, symbol: &str) -> Result<Vec<TickRow>, SourceError> {
        if !self.connected {
            return Err(SourceError::Connection("csv source not connected".into()));
        }
        let path = self.file_for(symbol)?;
        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| SourceError::Query(format!("{}: {e}", path.display())))?;

        let mut rows = Vec::new();
        for (i, record) in reader.deserialize::<TickRow>().enumerate() {
            let row = record.map_err(|e| {
                SourceError::Query(format!("{} row {}: {e}", path.display(), i + 1))
            })?;
            rows.push(row);
        }
        rows.sort_by_key(|r| r.update_time);
        debug!(symbol, path = %path.display(), rows = rows.len(), "csv file read");
        Ok(rows)
    }
}

impl TickSource for CsvTickSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        if !self.dir.is_dir() {
            self.connected = false;
            return Err(SourceError::Connection(format!(
                "tick directory {} does not exist",
                self.dir.display()
            )));
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
        let mut rows = self.read_rows(symbol)?;
        rows.retain(|r| range.contains(r.update_time.date()));
        Ok(Box::new(CsvCursor {
            rows: rows.into_iter(),
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
        let dates: BTreeSet<NaiveDate> = self
            .read_rows(symbol)?
            .iter()
            .map(|r| r.update_time.date())
            .filter(|d| *d < date)
            .collect();
        Ok(dates.into_iter().rev().nth(n as usize - 1))
    }
}

struct CsvCursor {
    rows: std::vec::IntoIter<TickRow>,
}

impl TickCursor for CsvCursor {
    fn row_count_hint(&self) -> Option<usize> {
        Some(self.rows.len())
    }

    fn fetch_many(&mut self, n: usize) -> Result<Vec<TickRow>, SourceError> {
        Ok(self.rows.by_ref().take(n).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const IF1706: &str = "\
InstrumentID,UpdateTime,LastPrice,Volume,OpenInterest,BidPrice1,BidVolume1,AskPrice1,AskVolume1
IF1706,2017-05-03 09:30:00,3001.0,5,4500,3000.8,1,3001.2,1
IF1706,2017-05-02 09:30:01,3000.2,6,4500,3000.0,1,,
IF1706,2017-05-02 09:30:00,3000.0,5,4500,2999.8,1,3000.2,1
IF1706,2017-05-04 09:30:00.500,3002.0,5,4500,3001.8,1,3002.2,1
";

    fn source() -> (TempDir, CsvTickSource) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("IF1706.csv"), IF1706).unwrap();
        let mut src = CsvTickSource::new(dir.path());
        src.connect().unwrap();
        (dir, src)
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 5, day).unwrap()
    }

    #[test]
    fn rows_are_sorted_and_filtered() {
        let (_dir, mut src) = source();
        let mut cursor = src
            .query(
                "IF1706",
                QueryRange::Between {
                    start: d(2),
                    end: d(3),
                },
            )
            .unwrap();
        assert_eq!(cursor.row_count_hint(), Some(3));
        let first = cursor.fetch_many(2).unwrap();
        assert_eq!(first[0].last_price, 3000.0);
        assert_eq!(first[1].ask_price1, None);
        assert_eq!(cursor.fetch_many(2).unwrap().len(), 1);
        assert!(cursor.fetch_many(2).unwrap().is_empty());
    }

    #[test]
    fn missing_directory_fails_to_connect() {
        let mut src = CsvTickSource::new("/nonexistent/ticks");
        assert!(matches!(src.connect(), Err(SourceError::Connection(_))));
    }

    #[test]
    fn missing_symbol_file_is_query_error() {
        let (_dir, mut src) = source();
        assert!(matches!(
            src.query("IF1709", QueryRange::All).err(),
            Some(SourceError::Query(_))
        ));
    }

    #[test]
    fn lookback_counts_distinct_dates() {
        let (_dir, mut src) = source();
        assert_eq!(src.trading_day_before("IF1706", d(4), 2).unwrap(), Some(d(2)));
        assert_eq!(src.trading_day_before("IF1706", d(2), 1).unwrap(), None);
    }
}
