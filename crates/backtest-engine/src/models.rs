use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strategy_core::{ParameterSet, SignalPair, SimulationConfig, StrategyError, StrategyKind};

/// Configuration for a walk-forward optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Bars skipped before each test slice (~3 years of trading days).
    pub train_window: usize,
    /// Bars per out-of-sample test slice (~6 months of trading days).
    pub test_window: usize,
    pub simulation: SimulationConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            train_window: 756,
            test_window: 126,
            simulation: SimulationConfig::default(),
        }
    }
}

/// Best parameter set found for one strategy.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    pub strategy: StrategyKind,
    /// `None` when no candidate produced a finite score.
    pub best_params: Option<ParameterSet>,
    /// Mean out-of-sample total return of `best_params`; `-inf` with no winner.
    /// Only comparable with other results of the same strategy.
    pub best_score: f64,
    pub candidates_evaluated: usize,
    /// Test slices evaluated per candidate.
    pub windows_evaluated: usize,
}

impl OptimizationResult {
    pub fn no_winner(strategy: StrategyKind, candidates_evaluated: usize, windows_evaluated: usize) -> Self {
        Self {
            strategy,
            best_params: None,
            best_score: f64::NEG_INFINITY,
            candidates_evaluated,
            windows_evaluated,
        }
    }

    pub fn has_winner(&self) -> bool {
        self.best_params.is_some()
    }
}

/// One strategy's optimization outcome inside a batch. A failed unit carries
/// its error instead of aborting its siblings.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub strategy: StrategyKind,
    pub result: Result<OptimizationResult, StrategyError>,
}

/// Which series the correlation stacker compares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMetric {
    /// Per-bar returns of each strategy's isolated simulation.
    #[default]
    Returns,
    /// Bars where a new entry signal fires.
    Signals,
}

impl fmt::Display for CorrelationMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationMetric::Returns => f.write_str("returns"),
            CorrelationMetric::Signals => f.write_str("signals"),
        }
    }
}

impl FromStr for CorrelationMetric {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "returns" => Ok(CorrelationMetric::Returns),
            "signals" => Ok(CorrelationMetric::Signals),
            other => Err(StrategyError::Config(format!(
                "unknown correlation metric '{other}' (expected 'returns' or 'signals')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Most recent bars used for the comparison series.
    pub lookback: usize,
    /// Candidates are accepted while |correlation| stays strictly below this.
    pub corr_threshold: f64,
    pub metric: CorrelationMetric,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            lookback: 252,
            corr_threshold: 0.3,
            metric: CorrelationMetric::Returns,
        }
    }
}

/// Strategies chosen for a stack and their combined signals.
#[derive(Debug, Clone, Serialize)]
pub struct StackSelection {
    pub chosen: Vec<(StrategyKind, ParameterSet)>,
    pub signals: SignalPair,
}

impl StackSelection {
    pub fn chosen_ids(&self) -> Vec<StrategyKind> {
        self.chosen.iter().map(|(k, _)| *k).collect()
    }
}
