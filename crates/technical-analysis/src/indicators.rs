//! Indicator math aligned to the input index.
//!
//! Every function returns a vector of the same length as its input. Positions
//! without enough history to compute the indicator hold `None`.

/// Simple Moving Average
pub fn sma(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return result;
    }

    for i in period - 1..data.len() {
        let sum: f64 = data[i + 1 - period..=i].iter().sum();
        result[i] = Some(sum / period as f64);
    }
    result
}

/// Rolling standard deviation with `ddof` delta degrees of freedom
/// (0 = population, 1 = sample).
pub fn rolling_std(data: &[f64], period: usize, ddof: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || period <= ddof || data.len() < period {
        return result;
    }

    for i in period - 1..data.len() {
        let slice = &data[i + 1 - period..=i];
        let mean = slice.iter().sum::<f64>() / period as f64;
        let variance =
            slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (period - ddof) as f64;
        result[i] = Some(variance.sqrt());
    }
    result
}

/// Exponential Moving Average, seeded with the SMA of the first `period` values.
pub fn ema(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return result;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut prev = data[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = Some(prev);

    for i in period..data.len() {
        prev = (data[i] - prev) * multiplier + prev;
        result[i] = Some(prev);
    }
    result
}

/// Apply `average` to a series whose defined values form one contiguous tail.
fn average_of_defined(
    series: &[Option<f64>],
    period: usize,
    average: fn(&[f64], usize) -> Vec<Option<f64>>,
) -> Vec<Option<f64>> {
    let mut result = vec![None; series.len()];
    let Some(start) = series.iter().position(Option::is_some) else {
        return result;
    };
    let defined: Vec<f64> = series[start..].iter().map(|v| v.unwrap_or(f64::NAN)).collect();
    for (offset, value) in average(&defined, period).into_iter().enumerate() {
        result[start + offset] = value.filter(|v| v.is_finite());
    }
    result
}

/// Relative Strength Index from rolling means of gains and losses.
///
/// Defined from index `period` onward. A window with neither gains nor losses
/// has no RSI.
pub fn rsi(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period + 1 {
        return result;
    }

    let mut gains = vec![0.0; data.len()];
    let mut losses = vec![0.0; data.len()];
    for i in 1..data.len() {
        let change = data[i] - data[i - 1];
        if change > 0.0 {
            gains[i] = change;
        } else {
            losses[i] = -change;
        }
    }

    for i in period..data.len() {
        let avg_gain = gains[i + 1 - period..=i].iter().sum::<f64>() / period as f64;
        let avg_loss = losses[i + 1 - period..=i].iter().sum::<f64>() / period as f64;

        result[i] = if avg_loss == 0.0 && avg_gain == 0.0 {
            None
        } else if avg_loss == 0.0 {
            Some(100.0)
        } else {
            let rs = avg_gain / avg_loss;
            Some(100.0 - (100.0 / (1.0 + rs)))
        };
    }
    result
}

/// MACD (Moving Average Convergence Divergence)
pub struct MacdResult {
    pub macd_line: Vec<Option<f64>>,
    pub signal_line: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

/// MACD line as the difference of the fast and slow moving averages, with the
/// signal line averaged over the defined MACD values.
///
/// Simple moving averages by default; `ewm` switches both stages to EMAs.
/// Any pair of positive windows is computed, a fast window above the slow one
/// just flips the sign of the line.
pub fn macd(
    data: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
    ewm: bool,
) -> MacdResult {
    let empty = vec![None; data.len()];
    if fast_period == 0 || slow_period == 0 || signal_period == 0 {
        return MacdResult {
            macd_line: empty.clone(),
            signal_line: empty.clone(),
            histogram: empty,
        };
    }

    let average: fn(&[f64], usize) -> Vec<Option<f64>> = if ewm { ema } else { sma };
    let fast = average(data, fast_period);
    let slow = average(data, slow_period);

    let macd_line: Vec<Option<f64>> = fast
        .iter()
        .zip(&slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal_line = average_of_defined(&macd_line, signal_period, average);
    let histogram = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| Some((*m)? - (*s)?))
        .collect();

    MacdResult {
        macd_line,
        signal_line,
        histogram,
    }
}

/// Bollinger Bands
pub struct BollingerBands {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// Bands at `std_dev` population standard deviations around the SMA.
pub fn bollinger_bands(data: &[f64], period: usize, std_dev: f64) -> BollingerBands {
    let middle = sma(data, period);
    let spread = rolling_std(data, period, 0);

    let upper = middle
        .iter()
        .zip(&spread)
        .map(|(m, s)| Some((*m)? + std_dev * (*s)?))
        .collect();
    let lower = middle
        .iter()
        .zip(&spread)
        .map(|(m, s)| Some((*m)? - std_dev * (*s)?))
        .collect();

    BollingerBands {
        upper,
        middle,
        lower,
    }
}

/// Highest value of the `period` bars strictly before each position.
pub fn prior_rolling_max(data: &[f64], period: usize) -> Vec<Option<f64>> {
    prior_rolling_extreme(data, period, f64::max)
}

/// Lowest value of the `period` bars strictly before each position.
pub fn prior_rolling_min(data: &[f64], period: usize) -> Vec<Option<f64>> {
    prior_rolling_extreme(data, period, f64::min)
}

fn prior_rolling_extreme(data: &[f64], period: usize, pick: fn(f64, f64) -> f64) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 {
        return result;
    }
    for i in period..data.len() {
        result[i] = data[i - period..i].iter().copied().reduce(pick);
    }
    result
}

/// Fractional change over `period` bars: `data[i] / data[i - period] - 1`.
pub fn pct_change(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 {
        return result;
    }
    for i in period..data.len() {
        let base = data[i - period];
        if base != 0.0 {
            result[i] = Some(data[i] / base - 1.0);
        }
    }
    result
}

/// Rolling z-score against the SMA and sample standard deviation.
/// Windows with zero dispersion have no z-score.
pub fn zscore(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mean = sma(data, period);
    let std = rolling_std(data, period, 1);

    data.iter()
        .zip(mean.iter().zip(&std))
        .map(|(x, (m, s))| match (m, s) {
            (Some(m), Some(s)) if *s > 0.0 => Some((x - m) / s),
            _ => None,
        })
        .collect()
}
