//! TOML session configuration.
//!
//! ```toml
//! [session]
//! symbol = "IF1706"
//! start_date = "2017-05-02"
//! end_date = "2017-05-31"     # optional, defaults to today
//! min_diff = 0.2
//! strategy = "momentum"       # passive | momentum
//! lookback_days = 2           # optional warm-up in trading days
//!
//! [data]
//! cache_dir = "cache"
//! batch_days = 10
//! page_size = 1000
//!
//! [source]
//! kind = "sqlite"
//! path = "ticks.db"
//! table_template = "TB_{symbol}MI"
//!
//! [ledger]
//! store_dir = "ledger"
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tickreplay_core::data::{LoadOptions, DEFAULT_BATCH_DAYS, DEFAULT_PAGE_SIZE};
use tickreplay_core::engine::SessionConfig;

use crate::source::DEFAULT_TABLE_TEMPLATE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Built-in strategies selectable from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Never trades. Useful for validating data and the cache.
    #[default]
    Passive,
    /// Breakout on the last N ticks, one lot at a time.
    Momentum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSection {
    pub symbol: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub min_diff: f64,
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Move the start back this many trading days before loading.
    #[serde(default)]
    pub lookback_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSection {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_batch_days")]
    pub batch_days: u32,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            batch_days: default_batch_days(),
            page_size: default_page_size(),
        }
    }
}

/// Where ticks come from on a cache miss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSection {
    Sqlite {
        path: Option<PathBuf>,
        #[serde(default = "default_table_template")]
        table_template: String,
    },
    Csv {
        dir: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSection {
    #[serde(default = "default_ledger_dir")]
    pub store_dir: PathBuf,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            store_dir: default_ledger_dir(),
        }
    }
}

/// Full configuration of one replay session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub session: SessionSection,
    #[serde(default)]
    pub data: DataSection,
    pub source: SourceSection,
    #[serde(default)]
    pub ledger: LedgerSection,
}

impl ReplayConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ReplayConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.session;
        if s.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("session.symbol must not be empty".into()));
        }
        if !(s.min_diff.is_finite() && s.min_diff > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "session.min_diff must be positive, got {}",
                s.min_diff
            )));
        }
        if let Some(end) = s.end_date {
            if end < s.start_date {
                return Err(ConfigError::Invalid(format!(
                    "session.end_date {end} is before start_date {}",
                    s.start_date
                )));
            }
        }
        if s.lookback_days == Some(0) {
            return Err(ConfigError::Invalid("session.lookback_days must be at least 1".into()));
        }
        if self.data.batch_days == 0 {
            return Err(ConfigError::Invalid("data.batch_days must be positive".into()));
        }
        if self.data.page_size == 0 {
            return Err(ConfigError::Invalid("data.page_size must be positive".into()));
        }
        if let SourceSection::Sqlite { table_template, .. } = &self.source {
            if !table_template.contains("{symbol}") {
                return Err(ConfigError::Invalid(format!(
                    "source.table_template '{table_template}' has no {{symbol}} placeholder"
                )));
            }
        }
        Ok(())
    }

    /// Apply CLI overrides, then re-validate.
    pub fn with_overrides(
        mut self,
        symbol: Option<String>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Self, ConfigError> {
        if let Some(symbol) = symbol {
            self.session.symbol = symbol;
        }
        if let Some(start) = start {
            self.session.start_date = start;
        }
        if end.is_some() {
            self.session.end_date = end;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            batch_days: self.data.batch_days,
            page_size: self.data.page_size,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            symbol: self.session.symbol.clone(),
            start_date: self.session.start_date,
            end_date: self.session.end_date,
            min_diff: self.session.min_diff,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_ledger_dir() -> PathBuf {
    PathBuf::from("ledger")
}

fn default_batch_days() -> u32 {
    DEFAULT_BATCH_DAYS
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_table_template() -> String {
    DEFAULT_TABLE_TEMPLATE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[session]
symbol = "IF1706"
start_date = "2017-05-02"
min_diff = 0.2

[source]
kind = "csv"
dir = "ticks"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = ReplayConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(cfg.session.end_date, None);
        assert_eq!(cfg.session.strategy, StrategyKind::Passive);
        assert_eq!(cfg.data.batch_days, 10);
        assert_eq!(cfg.data.page_size, 1000);
        assert_eq!(cfg.data.cache_dir, PathBuf::from("cache"));
        assert_eq!(cfg.ledger.store_dir, PathBuf::from("ledger"));
        assert_eq!(
            cfg.source,
            SourceSection::Csv {
                dir: PathBuf::from("ticks")
            }
        );
    }

    #[test]
    fn sqlite_source_defaults_table_template() {
        let toml = r#"
[session]
symbol = "IF1706"
start_date = "2017-05-02"
end_date = "2017-05-31"
min_diff = 0.2
strategy = "momentum"

[source]
kind = "sqlite"
path = "ticks.db"
"#;
        let cfg = ReplayConfig::from_toml(toml).unwrap();
        assert_eq!(cfg.session.strategy, StrategyKind::Momentum);
        match cfg.source {
            SourceSection::Sqlite {
                path,
                table_template,
            } => {
                assert_eq!(path, Some(PathBuf::from("ticks.db")));
                assert_eq!(table_template, "TB_{symbol}MI");
            }
            other => panic!("expected sqlite source, got {other:?}"),
        }
    }

    #[test]
    fn rejects_end_before_start() {
        let toml = MINIMAL.replace("min_diff = 0.2", "min_diff = 0.2\nend_date = \"2017-05-01\"");
        let err = ReplayConfig::from_toml(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
    }

    #[test]
    fn rejects_non_positive_min_diff() {
        let toml = MINIMAL.replace("min_diff = 0.2", "min_diff = 0.0");
        assert!(matches!(
            ReplayConfig::from_toml(&toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_empty_symbol() {
        let toml = MINIMAL.replace("\"IF1706\"", "\"  \"");
        assert!(ReplayConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn rejects_zero_batch_days() {
        let toml = format!("{MINIMAL}\n[data]\nbatch_days = 0\n");
        assert!(matches!(
            ReplayConfig::from_toml(&toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_template_without_placeholder() {
        let toml = MINIMAL.replace("kind = \"csv\"\ndir = \"ticks\"", "kind = \"sqlite\"\npath = \"t.db\"\ntable_template = \"ticks\"");
        assert!(matches!(
            ReplayConfig::from_toml(&toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn unknown_strategy_is_parse_error() {
        let toml = MINIMAL.replace("min_diff = 0.2", "min_diff = 0.2\nstrategy = \"martingale\"");
        assert!(matches!(
            ReplayConfig::from_toml(&toml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn overrides_are_validated() {
        let cfg = ReplayConfig::from_toml(MINIMAL).unwrap();
        let d = |m, day| NaiveDate::from_ymd_opt(2017, m, day).unwrap();

        let moved = cfg
            .clone()
            .with_overrides(Some("IF1709".into()), Some(d(6, 1)), Some(d(6, 30)))
            .unwrap();
        assert_eq!(moved.session.symbol, "IF1709");
        assert_eq!(moved.session.end_date, Some(d(6, 30)));

        assert!(cfg.with_overrides(None, None, Some(d(4, 1))).is_err());
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = ReplayConfig::from_file(Path::new("/nonexistent/replay.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
