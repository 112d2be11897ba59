//! Headline sentiment scoring.

use vader_sentiment::SentimentIntensityAnalyzer;

/// Scores a piece of text with a compound polarity in [-1, 1].
pub trait SentimentScorer: Send + Sync {
    fn compound(&self, text: &str) -> f64;
}

/// VADER lexicon scorer (social media and news tuned).
pub struct VaderScorer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl VaderScorer {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }
}

impl Default for VaderScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentScorer for VaderScorer {
    fn compound(&self, text: &str) -> f64 {
        if text.trim().is_empty() {
            return 0.0;
        }
        let scores = self.analyzer.polarity_scores(text);
        scores
            .get("compound")
            .copied()
            .unwrap_or(0.0)
            .clamp(-1.0, 1.0)
    }
}

/// Mean compound score over `titles`; 0.0 when there are none.
pub fn average_compound(scorer: &dyn SentimentScorer, titles: &[String]) -> f64 {
    if titles.is_empty() {
        return 0.0;
    }
    let total: f64 = titles.iter().map(|t| scorer.compound(t)).sum();
    total / titles.len() as f64
}
