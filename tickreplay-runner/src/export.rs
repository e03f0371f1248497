//! Session artifacts: trades CSV and the JSON session report.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tickreplay_core::domain::Trade;

use crate::session::SessionOutcome;

// ─── CSV export ─────────────────────────────────────────────────────

/// Render trades as CSV, one row per fill in ledger order.
///
/// Columns: trade_id, order_ref, instrument_id, direction, offset, price,
/// volume, trade_time
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "trade_id",
        "order_ref",
        "instrument_id",
        "direction",
        "offset",
        "price",
        "volume",
        "trade_time",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.trade_id.to_string(),
            &t.order_ref.to_string(),
            &t.instrument_id,
            &format!("{:?}", t.direction),
            &format!("{:?}", t.offset),
            &t.price.to_string(),
            &t.volume.to_string(),
            &t.trade_time.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        ])?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// Write the CSV rendering of `trades` to `path`.
pub fn write_trades_csv(trades: &[Trade], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let csv = export_trades_csv(trades)?;
    std::fs::write(path, csv).with_context(|| format!("failed to write trades CSV {}", path.display()))
}

// ─── JSON report ────────────────────────────────────────────────────

/// Pretty-printed JSON of a finished session.
pub fn export_report_json(outcome: &SessionOutcome) -> Result<String> {
    serde_json::to_string_pretty(outcome).context("failed to serialize session report")
}

/// Write `report.json` and `trades.csv` into `{output_dir}/{symbol}_{session_id}/`.
/// Returns the artifact directory.
pub fn save_session_artifacts(outcome: &SessionOutcome, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = output_dir.join(format!(
        "{}_{}",
        outcome.report.symbol, outcome.report.session_id
    ));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_report_json(outcome)?)?;
    write_trades_csv(&outcome.trades, &run_dir.join("trades.csv"))?;

    Ok(run_dir)
}
