use strategy_core::{ParameterSet, PriceSeries, SignalPair, StrategyError, StrategyKind};

use crate::indicators::*;

/// Outcome of a degrading signal build.
///
/// `signals` is always usable and aligned to the price index. `diagnostic` is
/// set when the requested strategy could not be computed and the flat pair was
/// substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBuild {
    pub signals: SignalPair,
    pub diagnostic: Option<StrategyError>,
}

impl SignalBuild {
    pub fn is_degraded(&self) -> bool {
        self.diagnostic.is_some()
    }

    fn flat(len: usize, reason: StrategyError) -> Self {
        Self {
            signals: SignalPair::flat(len),
            diagnostic: Some(reason),
        }
    }
}

/// Build entry/exit signals, failing on malformed parameters.
pub fn try_build_signals(
    price: &PriceSeries,
    kind: StrategyKind,
    params: &ParameterSet,
) -> Result<SignalPair, StrategyError> {
    let closes = price.closes();
    let signals = match kind {
        StrategyKind::MovingAverageCross => moving_average_cross(closes, params)?,
        StrategyKind::RsiThreshold => rsi_threshold(closes, params)?,
        StrategyKind::MacdCross => macd_cross(closes, params)?,
        StrategyKind::BollingerBreakout => bollinger_breakout(closes, params)?,
        StrategyKind::RollingBreakout => rolling_breakout(closes, params)?,
        StrategyKind::Momentum => momentum(closes, params)?,
        StrategyKind::MeanReversion => mean_reversion(closes, params)?,
    };
    debug_assert_eq!(signals.len(), price.len());
    Ok(signals)
}

/// Build entry/exit signals, degrading any failure to the flat pair.
///
/// The error is logged and handed back as a diagnostic, never propagated.
pub fn build_signals(price: &PriceSeries, kind: StrategyKind, params: &ParameterSet) -> SignalBuild {
    match try_build_signals(price, kind, params) {
        Ok(signals) => SignalBuild {
            signals,
            diagnostic: None,
        },
        Err(e) => {
            tracing::warn!(strategy = %kind, params = %params, "Signal build failed, using no-signal: {}", e);
            SignalBuild::flat(price.len(), e)
        }
    }
}

/// Build signals for a strategy named by its identifier. Unknown identifiers
/// produce the flat pair.
pub fn build_signals_by_id(price: &PriceSeries, strategy_id: &str, params: &ParameterSet) -> SignalBuild {
    match strategy_id.parse::<StrategyKind>() {
        Ok(kind) => build_signals(price, kind, params),
        Err(e) => {
            tracing::warn!(strategy = strategy_id, "Unknown strategy, using no-signal");
            SignalBuild::flat(price.len(), e)
        }
    }
}

fn moving_average_cross(closes: &[f64], params: &ParameterSet) -> Result<SignalPair, StrategyError> {
    let fast = sma(closes, params.window(&["fast"])?);
    let slow = sma(closes, params.window(&["slow"])?);
    Ok(SignalPair {
        entries: greater(&fast, &slow),
        exits: greater(&slow, &fast),
    })
}

fn rsi_threshold(closes: &[f64], params: &ParameterSet) -> Result<SignalPair, StrategyError> {
    let window = params.window(&["window"])?;
    let overbought = params.float_or(&["overbought"], 70.0)?;
    let oversold = params.float_or(&["oversold"], 30.0)?;

    let rsi = rsi(closes, window);
    Ok(SignalPair {
        entries: rsi.iter().map(|v| matches!(v, Some(r) if *r < oversold)).collect(),
        exits: rsi.iter().map(|v| matches!(v, Some(r) if *r > overbought)).collect(),
    })
}

fn macd_cross(closes: &[f64], params: &ParameterSet) -> Result<SignalPair, StrategyError> {
    let fast = params.window(&["fast_window", "fast"])?;
    let slow = params.window(&["slow_window", "slow"])?;
    let signal = params.window(&["signal_window", "signal"])?;
    let ewm = params.float_or(&["ewm"], 0.0)? != 0.0;

    let result = macd(closes, fast, slow, signal, ewm);
    Ok(SignalPair {
        entries: greater(&result.macd_line, &result.signal_line),
        exits: greater(&result.signal_line, &result.macd_line),
    })
}

fn bollinger_breakout(closes: &[f64], params: &ParameterSet) -> Result<SignalPair, StrategyError> {
    let window = params.window(&["window"])?;
    let width = params.float_or(&["std", "alpha"], 2.0)?;

    let bands = bollinger_bands(closes, window, width);
    Ok(SignalPair {
        entries: closes
            .iter()
            .zip(&bands.lower)
            .map(|(c, l)| matches!(l, Some(l) if c < l))
            .collect(),
        exits: closes
            .iter()
            .zip(&bands.upper)
            .map(|(c, u)| matches!(u, Some(u) if c > u))
            .collect(),
    })
}

fn rolling_breakout(closes: &[f64], params: &ParameterSet) -> Result<SignalPair, StrategyError> {
    let window = params.window(&["window"])?;
    let highs = prior_rolling_max(closes, window);
    let lows = prior_rolling_min(closes, window);
    Ok(SignalPair {
        entries: closes
            .iter()
            .zip(&highs)
            .map(|(c, h)| matches!(h, Some(h) if c > h))
            .collect(),
        exits: closes
            .iter()
            .zip(&lows)
            .map(|(c, l)| matches!(l, Some(l) if c < l))
            .collect(),
    })
}

fn momentum(closes: &[f64], params: &ParameterSet) -> Result<SignalPair, StrategyError> {
    let change = pct_change(closes, params.window(&["window"])?);
    Ok(SignalPair {
        entries: change.iter().map(|v| matches!(v, Some(m) if *m > 0.0)).collect(),
        exits: change.iter().map(|v| matches!(v, Some(m) if *m < 0.0)).collect(),
    })
}

fn mean_reversion(closes: &[f64], params: &ParameterSet) -> Result<SignalPair, StrategyError> {
    let window = params.window(&["window"])?;
    let threshold = params.float(&["zscore"])?;

    let z = zscore(closes, window);
    Ok(SignalPair {
        entries: z.iter().map(|v| matches!(v, Some(z) if *z < -threshold)).collect(),
        exits: z.iter().map(|v| matches!(v, Some(z) if *z > threshold)).collect(),
    })
}

/// Bar-wise `a > b`; undefined on either side is false.
fn greater(a: &[Option<f64>], b: &[Option<f64>]) -> Vec<bool> {
    a.iter()
        .zip(b)
        .map(|(x, y)| matches!((x, y), (Some(x), Some(y)) if x > y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use strategy_core::ParameterGrid;

    fn series(closes: Vec<f64>) -> PriceSeries {
        PriceSeries::daily(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), closes).unwrap()
    }

    fn random_walk(n: usize, seed: u64) -> PriceSeries {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut price = 100.0;
        let closes = (0..n)
            .map(|_| {
                price *= 1.0 + rng.gen_range(-0.03..0.03);
                price
            })
            .collect();
        series(closes)
    }

    #[test]
    fn test_every_strategy_aligned_to_index() {
        let grid = ParameterGrid::default();
        for len in [0, 1, 5, 30, 400] {
            let price = random_walk(len, 7);
            for kind in StrategyKind::ALL {
                for params in grid.get(kind).unwrap().candidates() {
                    let build = build_signals(&price, kind, &params);
                    assert!(!build.is_degraded(), "{kind} {params} degraded");
                    assert_eq!(build.signals.entries.len(), len);
                    assert_eq!(build.signals.exits.len(), len);
                }
            }
        }
    }

    #[test]
    fn test_warmup_bars_are_false() {
        let price = random_walk(300, 11);
        let params = ParameterSet::new().with("fast", 10).with("slow", 50);
        let pair = try_build_signals(&price, StrategyKind::MovingAverageCross, &params).unwrap();
        assert!(pair.entries[..49].iter().all(|e| !e));
        assert!(pair.exits[..49].iter().all(|e| !e));
        // After warm-up the cross condition is one or the other on a random walk.
        assert!(pair.entry_count() + pair.exit_count() > 200);
    }

    #[test]
    fn test_momentum_signs() {
        let price = series(vec![10.0, 11.0, 12.0, 11.0, 10.0, 10.0]);
        let params = ParameterSet::new().with("window", 1);
        let pair = try_build_signals(&price, StrategyKind::Momentum, &params).unwrap();
        assert_eq!(pair.entries, vec![false, true, true, false, false, false]);
        assert_eq!(pair.exits, vec![false, false, false, true, true, false]);
    }

    #[test]
    fn test_breakout_uses_previous_bars_only() {
        let price = series(vec![10.0, 11.0, 12.0, 13.0, 9.0, 14.0]);
        let params = ParameterSet::new().with("window", 2);
        let pair = try_build_signals(&price, StrategyKind::RollingBreakout, &params).unwrap();
        assert_eq!(pair.entries, vec![false, false, true, true, false, true]);
        assert_eq!(pair.exits, vec![false, false, false, false, true, false]);
    }

    #[test]
    fn test_mean_reversion_extremes() {
        let mut closes = vec![100.0, 101.0, 99.0, 100.0, 101.0, 99.0, 100.0, 101.0, 99.0, 100.0];
        closes.push(80.0);
        closes.push(100.0);
        closes.push(101.0);
        closes.push(99.0);
        closes.push(125.0);
        let price = series(closes);
        let params = ParameterSet::new().with("window", 10).with("zscore", 2.0);
        let pair = try_build_signals(&price, StrategyKind::MeanReversion, &params).unwrap();
        assert!(pair.entries[10]);
        assert!(pair.exits[14]);
        assert!(pair.entries[..10].iter().all(|e| !e));
    }

    #[test]
    fn test_flat_prices_produce_no_mean_reversion_signal() {
        let price = series(vec![50.0; 40]);
        let params = ParameterSet::new().with("window", 20).with("zscore", 1.5);
        let pair = try_build_signals(&price, StrategyKind::MeanReversion, &params).unwrap();
        assert!(pair.is_flat());
    }

    #[test]
    fn test_rsi_defaults_and_extremes() {
        let mut closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        closes.extend((0..20).map(|i| 81.0 + i as f64 * 2.0));
        let price = series(closes);
        let params = ParameterSet::new().with("window", 5);
        let pair = try_build_signals(&price, StrategyKind::RsiThreshold, &params).unwrap();
        // Steady decline pins RSI at 0 (oversold), steady rally at 100 (overbought).
        assert!(pair.entries[10]);
        assert!(pair.exits[35]);
        assert!(!pair.entries[4]);
    }

    #[test]
    fn test_bollinger_alias_and_break() {
        let mut closes = vec![100.0, 101.0, 100.0, 99.0, 100.0, 101.0, 100.0, 99.0];
        closes.push(110.0);
        let price = series(closes);
        let with_alias = ParameterSet::new().with("window", 8).with("alpha", 2.0);
        let with_std = ParameterSet::new().with("window", 8).with("std", 2.0);
        let a = try_build_signals(&price, StrategyKind::BollingerBreakout, &with_alias).unwrap();
        let b = try_build_signals(&price, StrategyKind::BollingerBreakout, &with_std).unwrap();
        assert_eq!(a, b);
        assert!(a.exits[8]);
    }

    #[test]
    fn test_macd_accepts_short_names() {
        let price = random_walk(200, 3);
        let long = ParameterSet::new()
            .with("fast_window", 12)
            .with("slow_window", 26)
            .with("signal_window", 9);
        let short = ParameterSet::new().with("fast", 12).with("slow", 26).with("signal", 9);
        let a = try_build_signals(&price, StrategyKind::MacdCross, &long).unwrap();
        let b = try_build_signals(&price, StrategyKind::MacdCross, &short).unwrap();
        assert_eq!(a, b);
        // Signal line needs slow + signal - 1 bars of history.
        assert!(a.entries[..33].iter().all(|e| !e) && a.exits[..33].iter().all(|e| !e));
    }

    #[test]
    fn test_macd_swapped_windows_mirror_signals() {
        let price = random_walk(200, 11);
        let normal = ParameterSet::new().with("fast", 12).with("slow", 26).with("signal", 9);
        let swapped = ParameterSet::new().with("fast", 26).with("slow", 12).with("signal", 9);

        let a = try_build_signals(&price, StrategyKind::MacdCross, &normal).unwrap();
        let b = try_build_signals(&price, StrategyKind::MacdCross, &swapped).unwrap();
        assert_eq!(b.entries, a.exits);
        assert_eq!(b.exits, a.entries);
        assert!(a.entries.iter().any(|e| *e));
    }

    #[test]
    fn test_macd_ewm_flag_changes_signals() {
        let price = random_walk(200, 13);
        let simple = ParameterSet::new().with("fast", 12).with("slow", 26).with("signal", 9);
        let weighted = simple.clone().with("ewm", 1);

        let a = try_build_signals(&price, StrategyKind::MacdCross, &simple).unwrap();
        let b = try_build_signals(&price, StrategyKind::MacdCross, &weighted).unwrap();
        assert_eq!(a.entries.len(), b.entries.len());
        assert_ne!(a, b);
    }

    #[test]
    fn test_bad_parameters_degrade_to_flat() {
        let price = random_walk(100, 5);
        let cases = [
            (StrategyKind::Momentum, ParameterSet::new().with("window", 0)),
            (StrategyKind::Momentum, ParameterSet::new()),
            (StrategyKind::MeanReversion, ParameterSet::new().with("window", 2.5).with("zscore", 2)),
            (
                StrategyKind::MacdCross,
                ParameterSet::new().with("fast", 12).with("slow", 26).with("signal", 0),
            ),
        ];
        for (kind, params) in cases {
            assert!(try_build_signals(&price, kind, &params).is_err());
            let build = build_signals(&price, kind, &params);
            assert!(build.is_degraded());
            assert!(matches!(build.diagnostic, Some(StrategyError::InvalidParameter { .. })));
            assert_eq!(build.signals, SignalPair::flat(100));
        }
    }

    #[test]
    fn test_unknown_strategy_is_flat() {
        let price = random_walk(50, 9);
        let build = build_signals_by_id(&price, "Ichimoku", &ParameterSet::new());
        assert_eq!(build.signals, SignalPair::flat(50));
        assert_eq!(
            build.diagnostic,
            Some(StrategyError::UnknownStrategy("Ichimoku".to_string()))
        );

        let known = build_signals_by_id(&price, "momentum", &ParameterSet::new().with("window", 5));
        assert!(!known.is_degraded());
    }

    #[test]
    fn test_deterministic() {
        let price = random_walk(250, 21);
        let params = ParameterSet::new().with("window", 20).with("std", 1.5);
        let a = build_signals(&price, StrategyKind::BollingerBreakout, &params);
        let b = build_signals(&price, StrategyKind::BollingerBreakout, &params);
        assert_eq!(a, b);
    }
}
