use rust_decimal::prelude::*;
use statrs::statistics::Statistics;
use strategy_core::{
    ParameterSet, PortfolioSimulator, PriceSeries, SignalPair, SimulationConfig, SimulationReport,
    StrategyError, StrategyKind,
};
use technical_analysis::build_signals;

/// Close-to-close signal backtester.
///
/// Long-only, all-in/all-out at the bar close with a proportional fee on each
/// fill. An entry opens a position only when flat and an exit closes it only
/// when long; a bar carrying both flags is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalBacktester;

impl SignalBacktester {
    pub fn new() -> Self {
        Self
    }
}

impl PortfolioSimulator for SignalBacktester {
    fn simulate(
        &self,
        price: &PriceSeries,
        signals: &SignalPair,
        config: &SimulationConfig,
    ) -> Result<SimulationReport, StrategyError> {
        if signals.entries.len() != price.len() || signals.exits.len() != price.len() {
            return Err(StrategyError::Simulation(format!(
                "signals cover {}/{} bars but the price series has {}",
                signals.entries.len(),
                signals.exits.len(),
                price.len()
            )));
        }
        let initial_cash = config
            .initial_cash
            .to_f64()
            .filter(|c| c.is_finite() && *c > 0.0)
            .ok_or_else(|| {
                StrategyError::Simulation(format!("initial cash must be positive, got {}", config.initial_cash))
            })?;
        if !(0.0..1.0).contains(&config.fee_rate) {
            return Err(StrategyError::Simulation(format!(
                "fee rate must be in [0, 1), got {}",
                config.fee_rate
            )));
        }

        let mut cash = initial_cash;
        let mut shares = 0.0_f64;
        let mut total_trades = 0usize;
        let mut prev_equity = initial_cash;
        let mut returns = Vec::with_capacity(price.len());
        let mut equity_curve = Vec::with_capacity(price.len());

        for (i, &close) in price.closes().iter().enumerate() {
            let enter = signals.entries[i] && !signals.exits[i];
            let exit = signals.exits[i] && !signals.entries[i];

            if shares == 0.0 && enter {
                shares = cash / (close * (1.0 + config.fee_rate));
                cash = 0.0;
                total_trades += 1;
            } else if shares > 0.0 && exit {
                cash += shares * close * (1.0 - config.fee_rate);
                shares = 0.0;
            }

            let equity = cash + shares * close;
            returns.push(equity / prev_equity - 1.0);
            equity_curve.push(equity);
            prev_equity = equity;
        }

        let total_return = equity_curve
            .last()
            .map(|e| e / initial_cash - 1.0)
            .unwrap_or(0.0);

        Ok(SimulationReport {
            total_return,
            returns,
            equity_curve,
            total_trades,
        })
    }
}

/// Annualized Sharpe ratio of per-bar returns (252 bars/year, 2% risk-free).
pub fn annualized_sharpe(returns: &[f64]) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let mean = returns.iter().mean();
    // Sample standard deviation (Bessel's correction: n-1)
    let std_dev = returns.iter().std_dev();
    let rf_daily = 0.02 / 252.0;

    if std_dev > 0.0 && std_dev.is_finite() {
        Some(((mean - rf_daily) / std_dev) * 252.0_f64.sqrt())
    } else {
        None
    }
}

/// Backtest one strategy over the full price history.
pub fn run_backtest<S: PortfolioSimulator + ?Sized>(
    price: &PriceSeries,
    kind: StrategyKind,
    params: &ParameterSet,
    config: &SimulationConfig,
    simulator: &S,
) -> Result<SimulationReport, StrategyError> {
    let build = build_signals(price, kind, params);
    simulator.simulate(price, &build.signals, config)
}
