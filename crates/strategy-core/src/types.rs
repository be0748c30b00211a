use std::ops::Range;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::StrategyError;

/// Daily closing prices indexed by strictly increasing dates.
///
/// The empty series is valid: a price source that found nothing returns one,
/// and every downstream component treats it as "no evaluable history".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPriceSeries")]
pub struct PriceSeries {
    dates: Vec<NaiveDate>,
    closes: Vec<f64>,
}

/// Unchecked wire form; deserialization goes through `PriceSeries::new`.
#[derive(Deserialize)]
struct RawPriceSeries {
    dates: Vec<NaiveDate>,
    closes: Vec<f64>,
}

impl TryFrom<RawPriceSeries> for PriceSeries {
    type Error = StrategyError;

    fn try_from(raw: RawPriceSeries) -> Result<Self, Self::Error> {
        PriceSeries::new(raw.dates, raw.closes)
    }
}

impl PriceSeries {
    pub fn new(dates: Vec<NaiveDate>, closes: Vec<f64>) -> Result<Self, StrategyError> {
        if dates.len() != closes.len() {
            return Err(StrategyError::InvalidSeries(format!(
                "{} dates but {} closes",
                dates.len(),
                closes.len()
            )));
        }
        if let Some((i, close)) = closes
            .iter()
            .enumerate()
            .find(|(_, c)| !c.is_finite() || **c <= 0.0)
        {
            return Err(StrategyError::InvalidSeries(format!(
                "close at position {i} is not a positive number: {close}"
            )));
        }
        if let Some(w) = dates.windows(2).find(|w| w[1] <= w[0]) {
            return Err(StrategyError::InvalidSeries(format!(
                "dates must be strictly increasing ({} followed by {})",
                w[0], w[1]
            )));
        }
        Ok(Self { dates, closes })
    }

    /// Build a series on consecutive calendar days starting at `start`.
    pub fn daily(start: NaiveDate, closes: Vec<f64>) -> Result<Self, StrategyError> {
        let dates = (0..closes.len())
            .map(|i| start + Duration::days(i as i64))
            .collect();
        Self::new(dates, closes)
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Owned copy of the bars in `range`, clamped to the series bounds.
    pub fn slice(&self, range: Range<usize>) -> PriceSeries {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        PriceSeries {
            dates: self.dates[start..end].to_vec(),
            closes: self.closes[start..end].to_vec(),
        }
    }

    /// The most recent `n` bars (the whole series when shorter).
    pub fn tail(&self, n: usize) -> PriceSeries {
        self.slice(self.len().saturating_sub(n)..self.len())
    }
}

/// Entry and exit flags positionally aligned with a [`PriceSeries`].
///
/// Entries and exits may both be set on the same bar; the simulator decides
/// which one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalPair {
    pub entries: Vec<bool>,
    pub exits: Vec<bool>,
}

impl SignalPair {
    /// The "no signal" pair: every bar false.
    pub fn flat(len: usize) -> Self {
        Self {
            entries: vec![false; len],
            exits: vec![false; len],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// OR `other` into `self` bar by bar. Both pairs must share the same index.
    pub fn union_with(&mut self, other: &SignalPair) {
        debug_assert_eq!(self.len(), other.len());
        for (a, b) in self.entries.iter_mut().zip(&other.entries) {
            *a |= *b;
        }
        for (a, b) in self.exits.iter_mut().zip(&other.exits) {
            *a |= *b;
        }
    }

    pub fn entry_count(&self) -> usize {
        self.entries.iter().filter(|e| **e).count()
    }

    pub fn exit_count(&self) -> usize {
        self.exits.iter().filter(|e| **e).count()
    }

    pub fn is_flat(&self) -> bool {
        self.entry_count() == 0 && self.exit_count() == 0
    }
}

/// Cash and cost assumptions handed to every simulator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub initial_cash: Decimal,
    /// Proportional fee per fill, as decimal (0.001 = 0.1%).
    pub fee_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_cash: dec!(100000),
            fee_rate: 0.001,
        }
    }
}

/// What a portfolio simulator reports for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Total return over the simulated span, as decimal (0.12 = +12%).
    pub total_return: f64,
    /// Per-bar returns, same length as the simulated price series.
    pub returns: Vec<f64>,
    /// Portfolio value at each bar close.
    pub equity_curve: Vec<f64>,
    pub total_trades: usize,
}
