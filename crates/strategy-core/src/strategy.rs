use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::StrategyError;

/// The closed set of signal strategies the lab knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Fast/slow simple moving average cross.
    #[serde(rename = "MA")]
    MovingAverageCross,
    /// RSI below oversold enters, above overbought exits.
    #[serde(rename = "RSI")]
    RsiThreshold,
    /// MACD line crossing its signal line.
    #[serde(rename = "MACD")]
    MacdCross,
    /// Close outside the Bollinger bands.
    #[serde(rename = "Bollinger")]
    BollingerBreakout,
    /// Close breaking the previous rolling high/low.
    #[serde(rename = "Breakout")]
    RollingBreakout,
    /// Sign of the N-bar percentage change.
    #[serde(rename = "Momentum")]
    Momentum,
    /// Rolling z-score of the close.
    #[serde(rename = "MeanReversion")]
    MeanReversion,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 7] = [
        StrategyKind::MovingAverageCross,
        StrategyKind::RsiThreshold,
        StrategyKind::MacdCross,
        StrategyKind::BollingerBreakout,
        StrategyKind::RollingBreakout,
        StrategyKind::Momentum,
        StrategyKind::MeanReversion,
    ];

    /// Short identifier used in grids, history files and reports.
    pub fn id(&self) -> &'static str {
        match self {
            StrategyKind::MovingAverageCross => "MA",
            StrategyKind::RsiThreshold => "RSI",
            StrategyKind::MacdCross => "MACD",
            StrategyKind::BollingerBreakout => "Bollinger",
            StrategyKind::RollingBreakout => "Breakout",
            StrategyKind::Momentum => "Momentum",
            StrategyKind::MeanReversion => "MeanReversion",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for StrategyKind {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| StrategyError::UnknownStrategy(wanted.to_string()))
    }
}
