use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use strategy_core::StrategyKind;

/// ticker -> strategy id -> best average out-of-sample return.
pub type HistoryScores = BTreeMap<String, BTreeMap<String, f64>>;

/// Best walk-forward scores from past runs, persisted as JSON.
///
/// Loading and saving are explicit; nothing touches the file in between.
#[derive(Debug, Clone, Default)]
pub struct RunHistory {
    path: PathBuf,
    scores: HistoryScores,
}

impl RunHistory {
    /// Read the history file; a missing file is an empty history.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let scores = match tokio::fs::read_to_string(&path).await {
            Ok(json) => serde_json::from_str(&json)
                .with_context(|| format!("parsing history file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No history at {}, starting fresh", path.display());
                HistoryScores::new()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading history file {}", path.display()));
            }
        };
        Ok(Self { path, scores })
    }

    pub async fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.scores)?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("writing history file {}", self.path.display()))?;
        tracing::debug!(tickers = self.scores.len(), "Saved history to {}", self.path.display());
        Ok(())
    }

    /// Store a score rounded to 4 decimals, replacing any earlier one.
    /// Non-finite scores are ignored.
    pub fn record(&mut self, ticker: &str, strategy: StrategyKind, score: f64) {
        if !score.is_finite() {
            return;
        }
        let rounded = (score * 10_000.0).round() / 10_000.0;
        self.scores
            .entry(ticker.to_string())
            .or_default()
            .insert(strategy.id().to_string(), rounded);
    }

    /// Best stored strategy for `ticker`. Ties go to the first id in order.
    pub fn recommend(&self, ticker: &str) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (id, &score) in self.scores.get(ticker)? {
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((id.as_str(), score));
            }
        }
        best
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("strategy-lab-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_record_rounds_and_replaces() {
        let mut history = RunHistory::default();
        history.record("AAPL", StrategyKind::Momentum, 0.123456);
        assert_eq!(history.recommend("AAPL"), Some(("Momentum", 0.1235)));

        history.record("AAPL", StrategyKind::Momentum, -0.02);
        assert_eq!(history.recommend("AAPL"), Some(("Momentum", -0.02)));

        history.record("AAPL", StrategyKind::RsiThreshold, f64::NEG_INFINITY);
        assert_eq!(history.recommend("AAPL"), Some(("Momentum", -0.02)));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_recommend_picks_best_score() {
        let mut history = RunHistory::default();
        assert_eq!(history.recommend("AAPL"), None);

        history.record("AAPL", StrategyKind::MovingAverageCross, 0.01);
        history.record("AAPL", StrategyKind::MacdCross, 0.05);
        history.record("AAPL", StrategyKind::MeanReversion, -0.03);
        history.record("MSFT", StrategyKind::RsiThreshold, 0.9);

        assert_eq!(history.recommend("AAPL"), Some(("MACD", 0.05)));
        assert_eq!(history.recommend("MSFT"), Some(("RSI", 0.9)));
        assert_eq!(history.recommend("TSLA"), None);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let history = RunHistory::load(temp_path("missing")).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let path = temp_path("roundtrip");
        let mut history = RunHistory::load(&path).await.unwrap();
        history.record("SPY", StrategyKind::RollingBreakout, 0.0412);
        history.save().await.unwrap();

        let reloaded = RunHistory::load(&path).await.unwrap();
        assert_eq!(reloaded.recommend("SPY"), Some(("Breakout", 0.0412)));
        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let path = temp_path("corrupt");
        tokio::fs::write(&path, "{not json").await.unwrap();
        assert!(RunHistory::load(&path).await.is_err());
        tokio::fs::remove_file(&path).await.ok();
    }
}
