//! Date-range batching for remote fetches.

use chrono::{Duration, NaiveDate};

/// Default batch width in calendar days.
pub const DEFAULT_BATCH_DAYS: u32 = 10;

/// Default driver page size in rows.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Split `[start, end]` (inclusive) into consecutive, non-overlapping batches
/// of at most `days` calendar days, in ascending order.
///
/// Returns no batches when `end < start`. A width of zero is treated as one.
pub fn date_batches(start: NaiveDate, end: NaiveDate, days: u32) -> Vec<(NaiveDate, NaiveDate)> {
    let width = Duration::days(i64::from(days.max(1)));
    let mut batches = Vec::new();
    let mut batch_start = start;
    while batch_start <= end {
        let batch_end = (batch_start + width - Duration::days(1)).min(end);
        batches.push((batch_start, batch_end));
        batch_start = batch_end + Duration::days(1);
    }
    batches
}
