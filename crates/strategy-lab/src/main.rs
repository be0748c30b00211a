//! strategy-lab: walk-forward optimize signal strategies per ticker and backtest
//! the stacked winners.
//!
//! Prices come from `<PRICE_DIR>/<TICKER>.csv` (`date,close` columns). Best
//! scores are kept in a JSON history file across runs.
//!
//! Usage:
//!   cargo run -p strategy-lab -- --tickers AAPL MSFT
//!   cargo run -p strategy-lab -- --tickers SPY --strategies MA,RSI --stack or
//!   cargo run -p strategy-lab -- --tickers QQQ --metric signals --threshold 0.5 --output report.json

mod config;
mod history;
mod pipeline;
mod price_source;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;

use config::LabConfig;
use history::RunHistory;
use pipeline::{format_summary, record_scores, run_batch, BatchReport};
use price_source::CsvPriceSource;

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  strategy-lab [--tickers T1 T2 ...] [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --strategies LIST   Comma-separated ids (MA,RSI,MACD,Bollinger,Breakout,Momentum,MeanReversion)");
    eprintln!("  --stack MODE        none | or | correlation (default: correlation)");
    eprintln!("  --metric METRIC     returns | signals (default: returns)");
    eprintln!("  --threshold X       Correlation threshold (default: 0.3)");
    eprintln!("  --prices DIR        Directory of <TICKER>.csv files (default: data)");
    eprintln!("  --grid PATH         JSON parameter grid (default: built-in grid)");
    eprintln!("  --history PATH      Run history file (default: history.json)");
    eprintln!("  --output PATH       Write a JSON report");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("strategy_lab=info,backtest_engine=info,technical_analysis=warn")
        })
    };
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let mut config = LabConfig::from_env().context("loading configuration from environment")?;
    config.apply_args(&args)?;
    if let Err(e) = config.validate() {
        print_usage();
        return Err(e);
    }
    let grid = config.load_grid().await?;

    tracing::info!(
        "strategy-lab: {} tickers, {} strategies, stack={}, train={}, test={}",
        config.tickers.len(),
        config.strategies.len(),
        config.stack_mode,
        config.optimizer.train_window,
        config.optimizer.test_window
    );

    let mut history = RunHistory::load(&config.history_file).await?;
    if history.is_empty() {
        tracing::info!("Starting with an empty run history");
    } else {
        tracing::info!("Run history holds {} tickers", history.len());
    }
    let source = CsvPriceSource::new(&config.price_dir);
    let config = Arc::new(config);

    let outcomes = run_batch(&source, Arc::clone(&config), Arc::new(grid)).await;

    record_scores(&mut history, &outcomes);
    history.save().await?;

    print!("{}", format_summary(&outcomes, &history));

    if let Some(path) = &config.output {
        let report = BatchReport {
            generated_at: Utc::now(),
            config: config.as_ref().clone(),
            tickers: outcomes,
        };
        let json = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing report {}", path.display()))?;
        tracing::info!("Report written to {}", path.display());
    }

    Ok(())
}
