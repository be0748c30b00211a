use rayon::prelude::*;
use statrs::statistics::Statistics;
use strategy_core::{
    ParameterSet, PortfolioSimulator, PriceSeries, SignalPair, SimulationConfig, StrategyError,
    StrategyKind,
};
use technical_analysis::build_signals;

use crate::models::*;

/// OR-stack the signals of every strategy in `selection`, bar by bar.
///
/// Entries are unioned with entries and exits with exits; the result does not
/// depend on the order of `selection`. An empty selection is the flat pair.
pub fn stack_strategies(price: &PriceSeries, selection: &[(StrategyKind, ParameterSet)]) -> SignalPair {
    let mut combined = SignalPair::flat(price.len());
    for (kind, params) in selection {
        let build = build_signals(price, *kind, params);
        combined.union_with(&build.signals);
    }
    combined
}

/// Greedy decorrelated stacking.
///
/// Each strategy gets a comparison series over the last `lookback` bars. The
/// first strategy is always chosen and seeds the aggregate; each later one is
/// accepted when its |correlation| with the aggregate (the bar-wise mean of
/// all chosen series) is strictly below `corr_threshold`. Single forward
/// sweep: a rejected strategy is never reconsidered. The chosen strategies are
/// then OR-stacked over the full price history.
pub fn stack_by_correlation<S: PortfolioSimulator + ?Sized>(
    price: &PriceSeries,
    selection: &[(StrategyKind, ParameterSet)],
    corr: &CorrelationConfig,
    simulation: &SimulationConfig,
    simulator: &S,
) -> Result<StackSelection, StrategyError> {
    let series: Vec<Vec<Option<f64>>> = selection
        .par_iter()
        .map(|(kind, params)| comparison_series(price, *kind, params, corr, simulation, simulator))
        .collect::<Result<_, _>>()?;

    let chosen: Vec<(StrategyKind, ParameterSet)> = select_decorrelated(&series, corr.corr_threshold)
        .into_iter()
        .map(|i| selection[i].clone())
        .collect();

    tracing::info!(
        metric = %corr.metric,
        threshold = corr.corr_threshold,
        "Correlation stack chose {}/{}: {}",
        chosen.len(),
        selection.len(),
        chosen.iter().map(|(k, _)| k.id()).collect::<Vec<_>>().join(", ")
    );

    let signals = stack_strategies(price, &chosen);
    Ok(StackSelection { chosen, signals })
}

/// Indices of the series kept by the greedy sweep, in input order.
///
/// The aggregate is a plain mean of the chosen series, so the guarantee is
/// only against that mean: two chosen series may still correlate pairwise at
/// or above the threshold.
pub fn select_decorrelated(series: &[Vec<Option<f64>>], corr_threshold: f64) -> Vec<usize> {
    let Some((first, rest)) = series.split_first() else {
        return Vec::new();
    };
    let mut chosen = vec![0];
    let mut aggregate = RunningMean::seed(first);

    for (offset, candidate) in rest.iter().enumerate() {
        let i = offset + 1;
        let mean = aggregate.mean();
        let correlation = if has_defined(candidate) && has_defined(&mean) {
            pearson_correlation(&mean, candidate)
        } else {
            Some(0.0)
        };

        match correlation {
            Some(c) if c.abs() < corr_threshold => {
                tracing::debug!(candidate = i, correlation = c, "Accepted into stack");
                chosen.push(i);
                aggregate.add(candidate);
            }
            _ => tracing::debug!(candidate = i, ?correlation, "Rejected from stack"),
        }
    }
    chosen
}

/// Pearson correlation over the bars where both series are defined.
///
/// `None` when fewer than two bars overlap or either side has zero variance.
pub fn pearson_correlation(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .unzip();
    if xs.len() < 2 {
        return None;
    }

    let cov = xs.iter().covariance(ys.iter());
    let denom = xs.iter().std_dev() * ys.iter().std_dev();
    let r = cov / denom;
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// 1 where an entry signal switches on, 0 elsewhere (first bar is 0).
pub fn new_signal_activity(entries: &[bool]) -> Vec<f64> {
    let mut activity = vec![0.0; entries.len()];
    for i in 1..entries.len() {
        if entries[i] && !entries[i - 1] {
            activity[i] = 1.0;
        }
    }
    activity
}

fn comparison_series<S: PortfolioSimulator + ?Sized>(
    price: &PriceSeries,
    kind: StrategyKind,
    params: &ParameterSet,
    corr: &CorrelationConfig,
    simulation: &SimulationConfig,
    simulator: &S,
) -> Result<Vec<Option<f64>>, StrategyError> {
    let build = build_signals(price, kind, params);
    let full: Vec<Option<f64>> = match corr.metric {
        CorrelationMetric::Returns => simulator
            .simulate(price, &build.signals, simulation)?
            .returns
            .into_iter()
            .map(|r| r.is_finite().then_some(r))
            .collect(),
        CorrelationMetric::Signals => new_signal_activity(&build.signals.entries)
            .into_iter()
            .map(Some)
            .collect(),
    };

    let start = full.len().saturating_sub(corr.lookback);
    Ok(full[start..].to_vec())
}

fn has_defined(series: &[Option<f64>]) -> bool {
    series.iter().any(Option::is_some)
}

/// Bar-wise mean of the accepted series, skipping undefined bars.
struct RunningMean {
    sums: Vec<f64>,
    counts: Vec<usize>,
}

impl RunningMean {
    fn seed(series: &[Option<f64>]) -> Self {
        let mut mean = Self {
            sums: vec![0.0; series.len()],
            counts: vec![0; series.len()],
        };
        mean.add(series);
        mean
    }

    fn add(&mut self, series: &[Option<f64>]) {
        for (i, value) in series.iter().enumerate().take(self.sums.len()) {
            if let Some(v) = value {
                self.sums[i] += v;
                self.counts[i] += 1;
            }
        }
    }

    fn mean(&self) -> Vec<Option<f64>> {
        self.sums
            .iter()
            .zip(&self.counts)
            .map(|(s, &n)| (n > 0).then(|| s / n as f64))
            .collect()
    }
}
