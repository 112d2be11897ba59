//! Screen leaderboard CSV export.

use std::path::Path;

use anyhow::{Context, Result};
use marketlab_core::signals::ScreenItem;

pub const SCREEN_COLUMNS: [&str; 8] = [
    "symbol",
    "recommendation",
    "confidence",
    "momentum",
    "rsi",
    "trend",
    "sentiment",
    "overall",
];

/// Render screen rows as CSV (header included).
pub fn screen_csv(rows: &[ScreenItem]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(SCREEN_COLUMNS)?;
    for r in rows {
        wtr.write_record([
            r.symbol.clone(),
            r.recommendation.to_string(),
            format!("{:.6}", r.confidence),
            format!("{:.6}", r.signals.momentum),
            format!("{:.6}", r.signals.rsi),
            format!("{:.6}", r.signals.trend),
            format!("{:.6}", r.signals.sentiment),
            format!("{:.6}", r.signals.overall),
        ])?;
    }
    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

pub fn write_screen_csv(path: &Path, rows: &[ScreenItem]) -> Result<()> {
    let text = screen_csv(rows)?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write screen CSV {}", path.display()))
}
