use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use backtest_engine::{CorrelationConfig, CorrelationMetric, OptimizerConfig};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strategy_core::{DateRange, ParameterGrid, SimulationConfig, StrategyKind};

/// How the winning strategies of a ticker are combined for the final backtest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackMode {
    /// Top-scoring strategy alone.
    None,
    /// OR-stack every winner.
    Or,
    /// Greedy decorrelated stack.
    #[default]
    Correlation,
}

impl fmt::Display for StackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackMode::None => f.write_str("none"),
            StackMode::Or => f.write_str("or"),
            StackMode::Correlation => f.write_str("correlation"),
        }
    }
}

impl FromStr for StackMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(StackMode::None),
            "or" => Ok(StackMode::Or),
            "correlation" | "corr" => Ok(StackMode::Correlation),
            other => bail!("unknown stack mode '{other}' (expected none, or, correlation)"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabConfig {
    pub tickers: Vec<String>,
    pub strategies: Vec<StrategyKind>,

    // Files
    pub price_dir: PathBuf,
    pub grid_file: Option<PathBuf>,
    pub history_file: PathBuf,
    pub output: Option<PathBuf>,

    pub date_range: DateRange,
    pub optimizer: OptimizerConfig,
    pub stack_mode: StackMode,
    pub correlation: CorrelationConfig,
}

impl LabConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from any variable lookup; unset keys take their defaults.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let initial_cash = Decimal::from_str(get("INIT_CASH", "100000").trim())
            .context("INIT_CASH must be a decimal amount")?;

        let config = Self {
            tickers: parse_tickers(&get("STRATEGY_LAB_TICKERS", "AAPL")),
            strategies: match var("STRATEGY_LAB_STRATEGIES") {
                Some(list) => parse_strategies(&list)?,
                None => StrategyKind::ALL.to_vec(),
            },

            price_dir: PathBuf::from(get("PRICE_DIR", "data")),
            grid_file: var("GRID_FILE").map(PathBuf::from),
            history_file: PathBuf::from(get("HISTORY_FILE", "history.json")),
            output: None,

            date_range: DateRange {
                start: var("START_DATE").map(|s| parse_date("START_DATE", &s)).transpose()?,
                end: var("END_DATE").map(|s| parse_date("END_DATE", &s)).transpose()?,
            },
            optimizer: OptimizerConfig {
                train_window: get("TRAIN_WINDOW", "756")
                    .trim()
                    .parse()
                    .context("TRAIN_WINDOW must be a bar count")?,
                test_window: get("TEST_WINDOW", "126")
                    .trim()
                    .parse()
                    .context("TEST_WINDOW must be a bar count")?,
                simulation: SimulationConfig {
                    initial_cash,
                    fee_rate: get("FEE_RATE", "0.001")
                        .trim()
                        .parse()
                        .context("FEE_RATE must be a number")?,
                },
            },
            stack_mode: get("STACK_MODE", "correlation").parse()?,
            correlation: CorrelationConfig {
                lookback: get("CORR_LOOKBACK", "252")
                    .trim()
                    .parse()
                    .context("CORR_LOOKBACK must be a bar count")?,
                corr_threshold: get("CORR_THRESHOLD", "0.3")
                    .trim()
                    .parse()
                    .context("CORR_THRESHOLD must be a number")?,
                metric: get("CORR_METRIC", "returns").parse()?,
            },
        };

        Ok(config)
    }

    /// Apply command-line overrides on top of the environment.
    pub fn apply_args(&mut self, args: &[String]) -> Result<()> {
        if let Some(tickers) = list_flag(args, "--tickers") {
            self.tickers = parse_tickers(&tickers.join(","));
        }
        if let Some(strategies) = list_flag(args, "--strategies") {
            self.strategies = parse_strategies(&strategies.join(","))?;
        }
        if let Some(mode) = value_flag(args, "--stack")? {
            self.stack_mode = mode.parse()?;
        }
        if let Some(metric) = value_flag(args, "--metric")? {
            self.correlation.metric = metric.parse()?;
        }
        if let Some(threshold) = value_flag(args, "--threshold")? {
            self.correlation.corr_threshold = threshold
                .parse()
                .with_context(|| format!("--threshold expects a number, got '{threshold}'"))?;
        }
        if let Some(dir) = value_flag(args, "--prices")? {
            self.price_dir = PathBuf::from(dir);
        }
        if let Some(path) = value_flag(args, "--grid")? {
            self.grid_file = Some(PathBuf::from(path));
        }
        if let Some(path) = value_flag(args, "--history")? {
            self.history_file = PathBuf::from(path);
        }
        if let Some(path) = value_flag(args, "--output")? {
            self.output = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.tickers.is_empty() {
            bail!("no tickers configured (set STRATEGY_LAB_TICKERS or pass --tickers)");
        }
        if self.strategies.is_empty() {
            bail!("no strategies selected");
        }
        if self.optimizer.train_window == 0 || self.optimizer.test_window == 0 {
            bail!(
                "walk-forward windows must be positive (train={}, test={})",
                self.optimizer.train_window,
                self.optimizer.test_window
            );
        }
        if self.optimizer.simulation.initial_cash <= Decimal::ZERO {
            bail!("INIT_CASH must be positive");
        }
        let fee = self.optimizer.simulation.fee_rate;
        if !(0.0..1.0).contains(&fee) {
            bail!("FEE_RATE must be in [0, 1), got {fee}");
        }
        let threshold = self.correlation.corr_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            bail!("correlation threshold must be non-negative, got {threshold}");
        }
        if let (Some(start), Some(end)) = (self.date_range.start, self.date_range.end) {
            if start > end {
                bail!("START_DATE {start} is after END_DATE {end}");
            }
        }
        Ok(())
    }

    /// Grid from `grid_file`, or the built-in grid when none is configured.
    pub async fn load_grid(&self) -> Result<ParameterGrid> {
        let Some(path) = &self.grid_file else {
            return Ok(ParameterGrid::default());
        };
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading grid file {}", path.display()))?;
        let grid = ParameterGrid::from_json_str(&json)
            .with_context(|| format!("parsing grid file {}", path.display()))?;
        Ok(grid)
    }
}

fn parse_tickers(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_strategies(list: &str) -> Result<Vec<StrategyKind>> {
    let mut strategies = Vec::new();
    for id in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind: StrategyKind = id.parse()?;
        if !strategies.contains(&kind) {
            strategies.push(kind);
        }
    }
    Ok(strategies)
}

fn parse_date(key: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("{key} must be YYYY-MM-DD, got '{value}'"))
}

/// Values following `flag` up to the next `--` option.
fn list_flag<'a>(args: &'a [String], flag: &str) -> Option<Vec<&'a str>> {
    let idx = args.iter().position(|a| a == flag)?;
    Some(
        args[idx + 1..]
            .iter()
            .take_while(|a| !a.starts_with("--"))
            .map(String::as_str)
            .collect(),
    )
}

fn value_flag<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>> {
    match args.iter().position(|a| a == flag) {
        None => Ok(None),
        Some(i) => match args.get(i + 1) {
            Some(v) if !v.starts_with("--") => Ok(Some(v.as_str())),
            _ => bail!("{flag} expects a value"),
        },
    }
}
