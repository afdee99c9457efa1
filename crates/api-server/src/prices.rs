use analysis_core::{normalize_symbol, AnalysisError, MarketDataProvider, PriceSeries};
use chrono::NaiveDate;
use futures_util::future::join_all;
use quant_analysis::{PriceTable, ReturnTable};
use serde::Deserialize;

use crate::AppError;

/// Tickers and date range shared by every price page
#[derive(Debug, Clone, Deserialize)]
pub struct PriceRange {
    pub tickers: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Upper-cased, de-duplicated tickers in request order.
pub fn clean_tickers(raw: &[String]) -> Result<Vec<String>, AppError> {
    let mut tickers: Vec<String> = Vec::new();
    for t in raw {
        let t = normalize_symbol(t).to_uppercase();
        if !t.is_empty() && !tickers.contains(&t) {
            tickers.push(t);
        }
    }
    if tickers.is_empty() {
        return Err(AppError::bad_request("Select at least one ticker"));
    }
    Ok(tickers)
}

impl PriceRange {
    pub fn validate(&self) -> Result<Vec<String>, AppError> {
        if self.start >= self.end {
            return Err(AppError::bad_request("Start date must be before end date"));
        }
        clean_tickers(&self.tickers)
    }
}

/// Fetch every ticker concurrently; a failed fetch yields an empty series.
pub async fn fetch_series(
    provider: &dyn MarketDataProvider,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<PriceSeries> {
    join_all(tickers.iter().map(|ticker| async move {
        match provider.daily_closes(ticker, start, end).await {
            Ok(points) => PriceSeries::new(ticker.clone(), points),
            Err(e) => {
                tracing::warn!(ticker = %ticker, error = %e, "price fetch failed");
                PriceSeries::new(ticker.clone(), Vec::new())
            }
        }
    }))
    .await
}

/// Price and return tables for pages that need complete data for every ticker.
pub async fn load_returns(
    provider: &dyn MarketDataProvider,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(PriceTable, ReturnTable), AppError> {
    let series = fetch_series(provider, tickers, start, end).await;
    let missing: Vec<&str> = series
        .iter()
        .filter(|s| s.is_empty())
        .map(|s| s.ticker.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(AnalysisError::InsufficientData(format!(
            "No price data for {}",
            missing.join(", ")
        ))
        .into());
    }

    let prices = PriceTable::from_series(&series);
    let returns = prices.daily_returns();
    if returns.len() < 2 {
        return Err(AnalysisError::InsufficientData(
            "Not enough overlapping price history in the selected range".to_string(),
        )
        .into());
    }
    Ok((prices, returns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockProvider;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_validation() {
        let range = PriceRange {
            tickers: vec![" aapl ".into(), "AAPL".into(), "^gspc".into(), "".into()],
            start: date(2024, 1, 1),
            end: date(2024, 6, 1),
        };
        assert_eq!(range.validate().unwrap(), vec!["AAPL", "GSPC"]);

        let reversed = PriceRange {
            start: date(2024, 6, 1),
            end: date(2024, 6, 1),
            ..range.clone()
        };
        let err = reversed.validate().unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);

        let empty = PriceRange {
            tickers: vec![],
            ..range
        };
        assert!(empty.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_returns_rejects_missing_ticker() {
        let provider = MockProvider::default();
        let tickers = vec!["AAPL".to_string(), "NODATA".to_string()];
        let err = load_returns(&provider, &tickers, date(2024, 1, 1), date(2024, 3, 1))
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);

        let tickers = vec!["AAPL".to_string(), "MSFT".to_string()];
        let (prices, returns) = load_returns(&provider, &tickers, date(2024, 1, 1), date(2024, 3, 1))
            .await
            .unwrap();
        assert_eq!(prices.tickers(), tickers.as_slice());
        assert_eq!(returns.len(), prices.dates().len() - 1);
    }
}
