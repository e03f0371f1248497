//! Concrete tick sources.

pub mod csv;
pub mod sqlite;

pub use self::csv::CsvTickSource;
pub use self::sqlite::{SqliteTickSource, DEFAULT_TABLE_TEMPLATE};

use crate::config::SourceSection;
use tickreplay_core::data::TickSource;

/// Build the source a config section describes. Nothing is opened yet; the
/// loader connects on first use.
pub fn build_source(section: &SourceSection) -> Box<dyn TickSource> {
    match section {
        SourceSection::Sqlite {
            path,
            table_template,
        } => Box::new(SqliteTickSource::new(path.clone(), table_template.clone())),
        SourceSection::Csv { dir } => Box::new(CsvTickSource::new(dir.clone())),
    }
}
