use std::fmt::Write as _;
use std::sync::Arc;

use backtest_engine::{
    annualized_sharpe, optimize_strategies, stack_by_correlation, stack_strategies, SignalBacktester,
};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use strategy_core::{
    ParameterGrid, ParameterSet, PortfolioSimulator, PriceSeries, PriceSource, SignalPair,
    StrategyError, StrategyKind,
};
use technical_analysis::build_signals;

use crate::config::{LabConfig, StackMode};
use crate::history::RunHistory;

/// A strategy that produced winning walk-forward parameters.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyScore {
    pub strategy: StrategyKind,
    pub params: ParameterSet,
    /// Average out-of-sample total return.
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyFailure {
    pub strategy: StrategyKind,
    pub error: String,
}

/// Final full-history backtest of the combined signals.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestSummary {
    pub chosen: Vec<StrategyScore>,
    pub total_return: f64,
    pub sharpe: Option<f64>,
    pub max_drawdown: f64,
    pub total_trades: usize,
    pub entry_signals: usize,
    pub exit_signals: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TickerReport {
    pub ticker: String,
    pub bars: usize,
    pub stack_mode: StackMode,
    pub winners: Vec<StrategyScore>,
    pub no_winner: Vec<StrategyKind>,
    pub failures: Vec<StrategyFailure>,
    /// `None` when no strategy won.
    pub backtest: Option<BacktestSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TickerOutcome {
    Analyzed(TickerReport),
    Skipped { ticker: String, reason: String },
}

impl TickerOutcome {
    pub fn ticker(&self) -> &str {
        match self {
            TickerOutcome::Analyzed(report) => &report.ticker,
            TickerOutcome::Skipped { ticker, .. } => ticker,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub config: LabConfig,
    pub tickers: Vec<TickerOutcome>,
}

/// Optimize, stack and backtest one ticker.
pub fn analyze_ticker<S: PortfolioSimulator + ?Sized>(
    ticker: &str,
    price: &PriceSeries,
    config: &LabConfig,
    grid: &ParameterGrid,
    simulator: &S,
) -> Result<TickerReport, StrategyError> {
    let outcomes = optimize_strategies(price, &config.strategies, grid, &config.optimizer, simulator);

    let mut winners = Vec::new();
    let mut no_winner = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(result) => match result.best_params {
                Some(params) => winners.push(StrategyScore {
                    strategy: result.strategy,
                    params,
                    score: result.best_score,
                }),
                None => {
                    tracing::warn!(ticker, strategy = %result.strategy, "No winning parameters");
                    no_winner.push(result.strategy);
                }
            },
            Err(e) => failures.push(StrategyFailure {
                strategy: outcome.strategy,
                error: e.to_string(),
            }),
        }
    }

    let backtest = if winners.is_empty() {
        tracing::warn!(ticker, "No portfolio generated");
        None
    } else {
        Some(final_backtest(price, &winners, config, simulator)?)
    };

    Ok(TickerReport {
        ticker: ticker.to_string(),
        bars: price.len(),
        stack_mode: config.stack_mode,
        winners,
        no_winner,
        failures,
        backtest,
    })
}

fn final_backtest<S: PortfolioSimulator + ?Sized>(
    price: &PriceSeries,
    winners: &[StrategyScore],
    config: &LabConfig,
    simulator: &S,
) -> Result<BacktestSummary, StrategyError> {
    let (chosen, signals): (Vec<StrategyScore>, SignalPair) = match config.stack_mode {
        StackMode::None => {
            // First maximum wins, matching grid-order tie-breaks.
            let mut top = &winners[0];
            for w in &winners[1..] {
                if w.score > top.score {
                    top = w;
                }
            }
            let build = build_signals(price, top.strategy, &top.params);
            (vec![top.clone()], build.signals)
        }
        StackMode::Or => {
            let selection = selection_of(winners);
            (winners.to_vec(), stack_strategies(price, &selection))
        }
        StackMode::Correlation => {
            let selection = selection_of(winners);
            let stack = stack_by_correlation(
                price,
                &selection,
                &config.correlation,
                &config.optimizer.simulation,
                simulator,
            )?;
            let chosen = stack
                .chosen_ids()
                .into_iter()
                .filter_map(|kind| winners.iter().find(|w| w.strategy == kind).cloned())
                .collect();
            (chosen, stack.signals)
        }
    };

    let report = simulator.simulate(price, &signals, &config.optimizer.simulation)?;
    if report.total_trades == 0 {
        tracing::warn!("No trades executed by the combined strategy");
    }

    Ok(BacktestSummary {
        chosen,
        total_return: report.total_return,
        sharpe: annualized_sharpe(&report.returns),
        max_drawdown: max_drawdown(&report.equity_curve),
        total_trades: report.total_trades,
        entry_signals: signals.entry_count(),
        exit_signals: signals.exit_count(),
    })
}

fn selection_of(winners: &[StrategyScore]) -> Vec<(StrategyKind, ParameterSet)> {
    winners.iter().map(|w| (w.strategy, w.params.clone())).collect()
}

/// Largest peak-to-trough decline of an equity curve, as a positive decimal.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &value in equity {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.max((peak - value) / peak);
        }
    }
    worst
}

/// Fetch every ticker concurrently, then analyze each on the blocking pool.
///
/// A ticker that fails to load, has no bars, or errors during analysis is
/// reported as skipped; the rest of the batch carries on.
pub async fn run_batch<P: PriceSource + ?Sized>(
    source: &P,
    config: Arc<LabConfig>,
    grid: Arc<ParameterGrid>,
) -> Vec<TickerOutcome> {
    let fetches = join_all(
        config
            .tickers
            .iter()
            .map(|ticker| source.fetch(ticker, config.date_range)),
    )
    .await;

    let mut handles = Vec::with_capacity(fetches.len());
    for (ticker, fetched) in config.tickers.iter().cloned().zip(fetches) {
        let price = match fetched {
            Ok(price) if price.is_empty() => {
                tracing::warn!(ticker = %ticker, "No price data, skipping");
                handles.push((ticker, Err("no price data".to_string())));
                continue;
            }
            Ok(price) => price,
            Err(e) => {
                tracing::warn!(ticker = %ticker, "Price fetch failed: {}", e);
                handles.push((ticker, Err(e.to_string())));
                continue;
            }
        };

        tracing::info!(ticker = %ticker, bars = price.len(), "Analyzing");
        let config = Arc::clone(&config);
        let grid = Arc::clone(&grid);
        let name = ticker.clone();
        let handle = tokio::task::spawn_blocking(move || {
            analyze_ticker(&name, &price, &config, &grid, &SignalBacktester)
        });
        handles.push((ticker, Ok(handle)));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (ticker, handle) in handles {
        let reason = match handle {
            Err(reason) => reason,
            Ok(task) => match task.await {
                Ok(Ok(report)) => {
                    outcomes.push(TickerOutcome::Analyzed(report));
                    continue;
                }
                Ok(Err(e)) => {
                    tracing::warn!(ticker = %ticker, "Analysis failed: {}", e);
                    e.to_string()
                }
                Err(e) => {
                    tracing::error!(ticker = %ticker, "Analysis task panicked: {}", e);
                    format!("analysis task failed: {e}")
                }
            },
        };
        outcomes.push(TickerOutcome::Skipped { ticker, reason });
    }
    outcomes
}

/// Merge every winning score into the history store.
pub fn record_scores(history: &mut RunHistory, outcomes: &[TickerOutcome]) {
    for outcome in outcomes {
        if let TickerOutcome::Analyzed(report) = outcome {
            for w in &report.winners {
                history.record(&report.ticker, w.strategy, w.score);
            }
        }
    }
}

/// Plain-text summary table plus history recommendations.
pub fn format_summary(outcomes: &[TickerOutcome], history: &RunHistory) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<8} {:>6} {:>10} {:>8} {:>8} {:>7}  {}",
        "TICKER", "BARS", "RETURN", "SHARPE", "MAXDD", "TRADES", "STRATEGIES"
    );

    for outcome in outcomes {
        match outcome {
            TickerOutcome::Skipped { ticker, reason } => {
                let _ = writeln!(out, "{:<8} skipped: {}", ticker, reason);
            }
            TickerOutcome::Analyzed(report) => match &report.backtest {
                None => {
                    let _ = writeln!(out, "{:<8} {:>6} no winning strategy", report.ticker, report.bars);
                }
                Some(bt) => {
                    let chosen = bt
                        .chosen
                        .iter()
                        .map(|s| format!("{}({})", s.strategy, s.params))
                        .collect::<Vec<_>>()
                        .join(" + ");
                    let sharpe = bt
                        .sharpe
                        .map(|s| format!("{s:.2}"))
                        .unwrap_or_else(|| "-".to_string());
                    let _ = writeln!(
                        out,
                        "{:<8} {:>6} {:>9.2}% {:>8} {:>7.2}% {:>7}  {}",
                        report.ticker,
                        report.bars,
                        bt.total_return * 100.0,
                        sharpe,
                        bt.max_drawdown * 100.0,
                        bt.total_trades,
                        chosen
                    );
                }
            },
        }
    }

    for outcome in outcomes {
        if let Some((strategy, score)) = history.recommend(outcome.ticker()) {
            let _ = writeln!(
                out,
                "Based on past runs, {} has performed best for {} ({:.2}%)",
                strategy,
                outcome.ticker(),
                score * 100.0
            );
        }
    }
    out
}
