//! Markdown summary of a run.

use std::fmt::Write;

use super::RunReport;

pub const LEADERBOARD_ROWS: usize = 10;

fn num(x: f64) -> String {
    if x.is_finite() {
        format!("{x:.2}")
    } else {
        "n/a".into()
    }
}

fn pct(x: f64) -> String {
    if x.is_finite() {
        format!("{:.1}%", x * 100.0)
    } else {
        "n/a".into()
    }
}

pub fn render(report: &RunReport) -> String {
    let art = &report.artifacts;
    let mut out = String::new();

    let _ = writeln!(out, "# Daily Market Research (Autonomous Agent)");
    let _ = writeln!(out, "**Date:** {}", report.date.format("%Y-%m-%d %H:%M"));
    let _ = writeln!(out);
    let _ = writeln!(out, "Universe size: **{}**", report.universe.len());
    let _ = writeln!(out);
    let _ = writeln!(out, "## Top Picks");

    if report.picks.is_empty() {
        let _ = writeln!(out, "- No confident candidates today.");
    }
    for pick in &report.picks {
        let _ = writeln!(
            out,
            "- **{}** — {} (confidence: {})",
            pick.symbol,
            pick.recommendation,
            num(pick.confidence)
        );
        if let Some(a) = art.analysis.get(&pick.symbol) {
            let s = &a.signals;
            let _ = writeln!(
                out,
                "  - Signals: momentum {}, rsi {}, trend {}, sentiment {}, overall {}",
                num(s.momentum),
                num(s.rsi),
                num(s.trend),
                num(s.sentiment),
                num(s.overall)
            );
        }
        if let Some(opt) = art.optimizations.get(&pick.symbol) {
            let best = &opt.result.best;
            let os = &best.out_of_sample;
            let _ = writeln!(
                out,
                "  - Optimized params: fast={}, slow={} (OS Sharpe {}, OS CAGR {}, OS MaxDD {})",
                best.fast,
                best.slow,
                num(os.sharpe),
                pct(os.cagr),
                pct(os.max_drawdown)
            );
        }
        if let Some(bt) = art.backtests.get(&pick.symbol) {
            let m = &bt.metrics;
            let _ = writeln!(
                out,
                "  - Backtest: Sharpe {}, CAGR {}, MaxDD {}, WinRate {}",
                num(m.sharpe),
                pct(m.cagr),
                pct(m.max_drawdown),
                pct(m.win_rate)
            );
        }
    }

    let rows = art.screen_results();
    if !rows.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Screen Leaderboard (Top {LEADERBOARD_ROWS})");
        let _ = writeln!(out, "| Symbol | Rec | Confidence | Momentum | Trend | Sentiment | Overall |");
        let _ = writeln!(out, "|---|---:|---:|---:|---:|---:|---:|");
        for r in rows.iter().take(LEADERBOARD_ROWS) {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} | {} |",
                r.symbol,
                r.recommendation,
                num(r.confidence),
                num(r.signals.momentum),
                num(r.signals.trend),
                num(r.signals.sentiment),
                num(r.signals.overall)
            );
        }
    }

    let failed = report.failed_steps();
    let _ = writeln!(out);
    let _ = writeln!(out, "## Notes");
    let _ = writeln!(
        out,
        "This report was generated by an autonomous planner calling research tools ({} steps, {} failed).",
        report.steps_executed.len(),
        failed
    );
    let _ = writeln!(out, "_{}_", report.disclaimer);
    out
}
