use std::ops::Range;

use rayon::prelude::*;
use statrs::statistics::Statistics;
use strategy_core::{
    ParameterGrid, ParameterSet, PortfolioSimulator, PriceSeries, SimulationConfig, StrategyError,
    StrategyKind,
};
use technical_analysis::build_signals;

use crate::models::*;

/// Out-of-sample test slices for a series of `len` bars.
///
/// The window pointer starts at 0 and advances by `test_window`; each step
/// skips `train_window` bars and tests the following `test_window` bars. Stops
/// once `train_window + test_window` no longer fits before the end, or no
/// longer fits in a `usize`.
pub fn walk_forward_windows(len: usize, train_window: usize, test_window: usize) -> Vec<Range<usize>> {
    let mut windows = Vec::new();
    if test_window == 0 {
        return windows;
    }

    let mut start: usize = 0;
    while let Some(test_start) = start.checked_add(train_window) {
        let Some(test_end) = test_start.checked_add(test_window) else {
            break;
        };
        if test_end > len {
            break;
        }
        windows.push(test_start..test_end);
        start += test_window;
    }
    windows
}

/// Run walk-forward optimization with parameter grid search.
///
/// Every candidate of the strategy's grid entry is scored by its mean total
/// return across the out-of-sample slices. Candidates are evaluated in
/// parallel; the first candidate in grid order reaching the maximum wins.
///
/// Short series and strategies without a grid entry are not errors: they
/// return no winner with a `-inf` score. Only simulator failures propagate.
pub fn walk_forward_optimize<S: PortfolioSimulator + ?Sized>(
    price: &PriceSeries,
    kind: StrategyKind,
    grid: &ParameterGrid,
    config: &OptimizerConfig,
    simulator: &S,
) -> Result<OptimizationResult, StrategyError> {
    let Some(entry) = grid.get(kind) else {
        tracing::warn!(strategy = %kind, "No parameter grid entry, skipping optimization");
        return Ok(OptimizationResult::no_winner(kind, 0, 0));
    };

    let candidates = entry.candidates();
    let windows = walk_forward_windows(price.len(), config.train_window, config.test_window);
    let slices: Vec<PriceSeries> = windows.iter().map(|w| price.slice(w.clone())).collect();

    tracing::debug!(
        strategy = %kind,
        candidates = candidates.len(),
        windows = slices.len(),
        "Starting walk-forward grid search"
    );

    let scores: Vec<f64> = candidates
        .par_iter()
        .map(|params| score_candidate(kind, params, &slices, &config.simulation, simulator))
        .collect::<Result<_, _>>()?;

    let mut best_params: Option<&ParameterSet> = None;
    let mut best_score = f64::NEG_INFINITY;
    for (params, &score) in candidates.iter().zip(&scores) {
        tracing::debug!(strategy = %kind, params = %params, score, "Candidate scored");
        if score > best_score {
            best_score = score;
            best_params = Some(params);
        }
    }

    match best_params {
        Some(params) => tracing::info!(
            strategy = %kind,
            params = %params,
            "Best avg out-of-sample return {:.2}%",
            best_score * 100.0
        ),
        None => tracing::info!(strategy = %kind, windows = slices.len(), "No winning parameters"),
    }

    Ok(OptimizationResult {
        strategy: kind,
        best_params: best_params.cloned(),
        best_score,
        candidates_evaluated: candidates.len(),
        windows_evaluated: slices.len(),
    })
}

/// Mean out-of-sample total return of one candidate, `-inf` with no slices.
fn score_candidate<S: PortfolioSimulator + ?Sized>(
    kind: StrategyKind,
    params: &ParameterSet,
    slices: &[PriceSeries],
    simulation: &SimulationConfig,
    simulator: &S,
) -> Result<f64, StrategyError> {
    if slices.is_empty() {
        return Ok(f64::NEG_INFINITY);
    }

    let mut oos_returns = Vec::with_capacity(slices.len());
    for slice in slices {
        // Signals only see the test slice itself.
        let build = build_signals(slice, kind, params);
        let report = simulator.simulate(slice, &build.signals, simulation)?;
        oos_returns.push(report.total_return);
    }
    Ok(oos_returns.iter().mean())
}

/// Optimize several strategies over the same price series in parallel.
///
/// Outcomes come back in the order of `strategies`, each with its own result.
pub fn optimize_strategies<S: PortfolioSimulator + ?Sized>(
    price: &PriceSeries,
    strategies: &[StrategyKind],
    grid: &ParameterGrid,
    config: &OptimizerConfig,
    simulator: &S,
) -> Vec<StrategyOutcome> {
    strategies
        .par_iter()
        .map(|&strategy| {
            let result = walk_forward_optimize(price, strategy, grid, config, simulator);
            if let Err(e) = &result {
                tracing::warn!(strategy = %strategy, "Optimization failed: {}", e);
            }
            StrategyOutcome { strategy, result }
        })
        .collect()
}
