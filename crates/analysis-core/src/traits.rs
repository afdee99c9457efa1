use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    AnalysisError, DividendRecord, FinancialStatement, PricePoint, StatementPeriod, TickerListing,
    TickerProfile,
};

/// Source of prices and fundamentals for every dashboard page
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Daily closes in `[start, end)`, ascending.
    async fn daily_closes(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, AnalysisError>;

    /// Statements for the period type, newest first.
    async fn statements(
        &self,
        ticker: &str,
        period: StatementPeriod,
        limit: u32,
    ) -> Result<Vec<FinancialStatement>, AnalysisError>;

    async fn ticker_profile(&self, ticker: &str) -> Result<TickerProfile, AnalysisError>;

    /// Cash dividends, newest first.
    async fn dividends(&self, ticker: &str, limit: u32) -> Result<Vec<DividendRecord>, AnalysisError>;

    async fn list_tickers(&self, limit: usize) -> Result<Vec<TickerListing>, AnalysisError>;
}
