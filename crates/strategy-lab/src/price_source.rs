use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use strategy_core::{DateRange, PriceSeries, PriceSource, StrategyError};

/// Reads daily closes from `<dir>/<TICKER>.csv`.
///
/// The file needs a header row with `date` and `close` columns (any case,
/// any position); other columns are ignored.
#[derive(Debug, Clone)]
pub struct CsvPriceSource {
    dir: PathBuf,
}

impl CsvPriceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", ticker.trim()))
    }
}

#[async_trait]
impl PriceSource for CsvPriceSource {
    async fn fetch(&self, ticker: &str, range: DateRange) -> Result<PriceSeries, StrategyError> {
        let path = self.path_for(ticker);
        let data = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| StrategyError::PriceSource(format!("{}: {}", path.display(), e)))?;

        let series = parse_price_csv(&data, range)?;
        tracing::debug!(ticker, bars = series.len(), "Loaded prices from {}", path.display());
        Ok(series)
    }
}

/// Parse `date,close` rows into a sorted series restricted to `range`.
///
/// Rows with an unparsable date or a missing, non-numeric or non-positive
/// close are skipped. Repeated dates keep their first row.
pub fn parse_price_csv(data: &str, range: DateRange) -> Result<PriceSeries, StrategyError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| StrategyError::PriceSource(format!("bad CSV header: {e}")))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| StrategyError::PriceSource(format!("missing '{name}' column")))
    };
    let date_col = column("date")?;
    let close_col = column("close")?;

    let mut rows: Vec<(NaiveDate, f64)> = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record.map_err(|e| StrategyError::PriceSource(format!("bad CSV row: {e}")))?;

        let date = record
            .get(date_col)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        let close = record
            .get(close_col)
            .and_then(|c| c.parse::<f64>().ok())
            .filter(|c| c.is_finite() && *c > 0.0);

        match (date, close) {
            (Some(date), Some(close)) => {
                if range.contains(date) {
                    rows.push((date, close));
                }
            }
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(skipped, "Skipped unparsable price rows");
    }

    rows.sort_by_key(|(date, _)| *date);
    rows.dedup_by_key(|(date, _)| *date);

    let (dates, closes) = rows.into_iter().unzip();
    PriceSeries::new(dates, closes)
}
