use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{PriceSeries, SignalPair, SimulationConfig, SimulationReport, StrategyError};

/// Turns a price series plus entry/exit flags into portfolio returns.
///
/// Implementations must not fail on degenerate but well-formed input (all-false
/// signals, empty series): those simulate to a neutral zero return. Errors are
/// reserved for failures the caller cannot fix by changing strategy parameters.
pub trait PortfolioSimulator: Send + Sync {
    fn simulate(
        &self,
        price: &PriceSeries,
        signals: &SignalPair,
        config: &SimulationConfig,
    ) -> Result<SimulationReport, StrategyError>;
}

/// Inclusive date bounds for a price request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Trait for closing-price providers
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self, ticker: &str, range: DateRange) -> Result<PriceSeries, StrategyError>;
}
