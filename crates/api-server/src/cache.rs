use analysis_core::{
    AnalysisError, DividendRecord, FinancialStatement, MarketDataProvider, PricePoint,
    StatementPeriod, TickerListing, TickerProfile,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry<T> {
    value: T,
    stored: Instant,
}

/// Time-bounded memo of provider answers
struct TtlCache<K, V> {
    entries: DashMap<K, Entry<V>>,
    ttl: Duration,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.stored.elapsed() < self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    fn insert(&self, key: K, value: V) {
        self.entries.insert(
            key,
            Entry {
                value,
                stored: Instant::now(),
            },
        );
    }
}

/// Provider wrapper that memoizes the master ticker list and statement
/// lookups; prices, profiles and dividends always go to the source.
pub struct CachedProvider {
    inner: Arc<dyn MarketDataProvider>,
    statements: TtlCache<(String, StatementPeriod, u32), Vec<FinancialStatement>>,
    tickers: TtlCache<usize, Vec<TickerListing>>,
}

impl CachedProvider {
    pub fn new(inner: Arc<dyn MarketDataProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            statements: TtlCache::new(ttl),
            tickers: TtlCache::new(ttl),
        }
    }
}

#[async_trait]
impl MarketDataProvider for CachedProvider {
    async fn daily_closes(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, AnalysisError> {
        self.inner.daily_closes(ticker, start, end).await
    }

    async fn statements(
        &self,
        ticker: &str,
        period: StatementPeriod,
        limit: u32,
    ) -> Result<Vec<FinancialStatement>, AnalysisError> {
        let key = (ticker.to_uppercase(), period, limit);
        if let Some(hit) = self.statements.get(&key) {
            tracing::debug!(ticker, ?period, "statements cache hit");
            return Ok(hit);
        }
        let fresh = self.inner.statements(ticker, period, limit).await?;
        self.statements.insert(key, fresh.clone());
        Ok(fresh)
    }

    async fn ticker_profile(&self, ticker: &str) -> Result<TickerProfile, AnalysisError> {
        self.inner.ticker_profile(ticker).await
    }

    async fn dividends(&self, ticker: &str, limit: u32) -> Result<Vec<DividendRecord>, AnalysisError> {
        self.inner.dividends(ticker, limit).await
    }

    async fn list_tickers(&self, limit: usize) -> Result<Vec<TickerListing>, AnalysisError> {
        if let Some(hit) = self.tickers.get(&limit) {
            return Ok(hit);
        }
        let fresh = self.inner.list_tickers(limit).await?;
        tracing::info!(count = fresh.len(), "master ticker list loaded");
        self.tickers.insert(limit, fresh.clone());
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockProvider;

    #[tokio::test]
    async fn test_statements_are_cached_per_ticker_and_period() {
        let mock = Arc::new(MockProvider::default());
        let cached = CachedProvider::new(mock.clone(), Duration::from_secs(60));

        cached.statements("AAPL", StatementPeriod::Annual, 2).await.unwrap();
        cached.statements("aapl", StatementPeriod::Annual, 2).await.unwrap();
        assert_eq!(mock.statement_calls(), 1);

        cached.statements("AAPL", StatementPeriod::Quarterly, 2).await.unwrap();
        assert_eq!(mock.statement_calls(), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let mock = Arc::new(MockProvider::default());
        let cached = CachedProvider::new(mock.clone(), Duration::ZERO);

        cached.list_tickers(10).await.unwrap();
        cached.list_tickers(10).await.unwrap();
        assert_eq!(mock.ticker_list_calls(), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let mock = Arc::new(MockProvider::default());
        let cached = CachedProvider::new(mock.clone(), Duration::from_secs(60));

        assert!(cached.statements("NODATA", StatementPeriod::Annual, 2).await.is_err());
        assert!(cached.statements("NODATA", StatementPeriod::Annual, 2).await.is_err());
        assert_eq!(mock.statement_calls(), 2);
    }
}
