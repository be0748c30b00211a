use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Invalid series: {0}")]
    InvalidSeries(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Price source error: {0}")]
    PriceSource(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StrategyError {
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
