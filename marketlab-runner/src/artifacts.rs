//! Per-run artifacts and pick selection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use marketlab_core::signals::ScreenItem;
use marketlab_core::{Analysis, Recommendation, ScreenOutcome};

use crate::tools::{BacktestReport, OptimizationReport, StepOutput};

/// Picks below this confidence are not reported.
pub const MIN_CONF: f64 = 0.60;

/// How many screened symbols get auto-analyzed (and stand in for picks).
pub const TOP_SCREENED: usize = 3;

/// Successful outputs of one run, keyed by stage and symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunArtifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<ScreenOutcome>,
    #[serde(default)]
    pub analysis: BTreeMap<String, Analysis>,
    #[serde(default)]
    pub optimizations: BTreeMap<String, OptimizationReport>,
    #[serde(default)]
    pub backtests: BTreeMap<String, BacktestReport>,
}

impl RunArtifacts {
    /// File a step output under its stage. A later screen replaces an earlier one.
    pub fn record(&mut self, output: &StepOutput) {
        match output {
            StepOutput::Screen(s) => self.screen = Some(s.clone()),
            StepOutput::Analysis(a) => {
                self.analysis.insert(a.symbol.clone(), a.clone());
            }
            StepOutput::Optimization(o) => {
                self.optimizations.insert(o.symbol.clone(), o.clone());
            }
            StepOutput::Backtest(b) => {
                self.backtests.insert(b.symbol.clone(), b.clone());
            }
        }
    }

    pub fn screen_results(&self) -> &[ScreenItem] {
        self.screen.as_ref().map_or(&[], |s| s.results.as_slice())
    }

    pub fn has_screen(&self) -> bool {
        self.screen.is_some()
    }

    /// Up to `n` screened symbols, highest confidence first.
    pub fn top_screened(&self, n: usize) -> Vec<String> {
        let mut rows: Vec<&ScreenItem> = self.screen_results().iter().collect();
        rows.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        rows.into_iter().take(n).map(|r| r.symbol.clone()).collect()
    }

    /// Highest-confidence analyzed symbol; ties go to the first in symbol order.
    pub fn top_analyzed(&self) -> Option<String> {
        self.analysis
            .values()
            .fold(None, |best: Option<&Analysis>, a| match best {
                Some(b) if b.confidence >= a.confidence => Some(b),
                _ => Some(a),
            })
            .map(|a| a.symbol.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub symbol: String,
    pub recommendation: Recommendation,
    pub confidence: f64,
}

/// Picks from analyzed symbols (or the top screened ones when nothing was
/// analyzed), preferring analysis values, filtered by `min_conf` and
/// ordered by confidence descending.
pub fn pick_top_candidates(artifacts: &RunArtifacts, min_conf: f64) -> Vec<Pick> {
    let candidates: Vec<String> = if artifacts.analysis.is_empty() {
        artifacts.top_screened(TOP_SCREENED)
    } else {
        artifacts.analysis.keys().cloned().collect()
    };

    let mut picks: Vec<Pick> = candidates
        .into_iter()
        .filter_map(|symbol| {
            let (recommendation, confidence) = match artifacts.analysis.get(&symbol) {
                Some(a) => (a.recommendation, a.confidence),
                None => {
                    let row = artifacts.screen_results().iter().find(|r| r.symbol == symbol)?;
                    (row.recommendation, row.confidence)
                }
            };
            (confidence >= min_conf).then_some(Pick {
                symbol,
                recommendation,
                confidence,
            })
        })
        .collect();
    picks.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    picks
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketlab_core::SignalScores;

    fn scores(overall: f64) -> SignalScores {
        SignalScores {
            momentum: 0.5,
            rsi: 0.5,
            trend: 1.0,
            sentiment: 0.5,
            overall,
        }
    }

    fn screen_item(symbol: &str, conf: f64) -> ScreenItem {
        ScreenItem {
            symbol: symbol.into(),
            recommendation: Recommendation::from_overall(conf),
            confidence: conf,
            signals: scores(conf),
        }
    }

    fn analysis(symbol: &str, conf: f64) -> Analysis {
        Analysis {
            symbol: symbol.into(),
            signals: scores(conf),
            sentiment_compound: 0.0,
            recommendation: Recommendation::from_overall(conf),
            confidence: conf,
            rationale: String::new(),
        }
    }

    fn with_screen(rows: &[(&str, f64)]) -> RunArtifacts {
        RunArtifacts {
            screen: Some(ScreenOutcome {
                results: rows.iter().map(|(s, c)| screen_item(s, *c)).collect(),
                errors: Vec::new(),
            }),
            ..RunArtifacts::default()
        }
    }

    #[test]
    fn screen_only_uses_top_three() {
        let art = with_screen(&[("A", 0.9), ("B", 0.8), ("C", 0.5), ("D", 0.95)]);
        let picks = pick_top_candidates(&art, MIN_CONF);
        let symbols: Vec<_> = picks.iter().map(|p| p.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["D", "A", "B"]);
    }

    #[test]
    fn analysis_overrides_screen() {
        let mut art = with_screen(&[("A", 0.9), ("B", 0.8)]);
        art.analysis.insert("A".into(), analysis("A", 0.55));
        art.analysis.insert("B".into(), analysis("B", 0.7));
        let picks = pick_top_candidates(&art, MIN_CONF);
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].symbol, "B");
        assert_eq!(picks[0].confidence, 0.7);
    }

    #[test]
    fn empty_artifacts_no_picks() {
        assert!(pick_top_candidates(&RunArtifacts::default(), MIN_CONF).is_empty());
    }

    #[test]
    fn top_analyzed_breaks_ties_by_first_symbol() {
        let mut art = RunArtifacts::default();
        assert_eq!(art.top_analyzed(), None);
        for (sym, conf) in [("MSFT", 0.7), ("AAPL", 0.7), ("NVDA", 0.65)] {
            art.analysis.insert(sym.into(), analysis(sym, conf));
        }
        assert_eq!(art.top_analyzed().as_deref(), Some("AAPL"));
        art.analysis.insert("ZM".into(), analysis("ZM", 0.71));
        assert_eq!(art.top_analyzed().as_deref(), Some("ZM"));
    }

    #[test]
    fn threshold_is_inclusive() {
        let art = with_screen(&[("A", 0.60)]);
        assert_eq!(pick_top_candidates(&art, 0.60).len(), 1);
    }
}
