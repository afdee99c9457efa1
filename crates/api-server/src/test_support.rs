use analysis_core::{
    AnalysisError, DividendRecord, FinancialStatement, MarketDataProvider, PricePoint,
    StatementPeriod, TickerListing, TickerProfile,
};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

use crate::config::Config;
use crate::{build_router, AppState};

/// Deterministic provider: "NODATA" fails everywhere, "EMPTY" has no prices.
#[derive(Default)]
pub struct MockProvider {
    statement_calls: AtomicUsize,
    ticker_list_calls: AtomicUsize,
}

impl MockProvider {
    pub fn statement_calls(&self) -> usize {
        self.statement_calls.load(Ordering::SeqCst)
    }

    pub fn ticker_list_calls(&self) -> usize {
        self.ticker_list_calls.load(Ordering::SeqCst)
    }
}

fn seed(ticker: &str) -> f64 {
    ticker.bytes().map(f64::from).sum::<f64>()
}

fn annual(ticker: &str, year: i32, scale: f64) -> FinancialStatement {
    FinancialStatement {
        symbol: ticker.to_string(),
        period: Some(StatementPeriod::Annual),
        fiscal_year: year,
        fiscal_period: "FY".to_string(),
        end_date: NaiveDate::from_ymd_opt(year, 12, 31),
        revenue: Some(1000.0e9 * scale),
        cost_of_revenue: Some(600.0e9 * scale),
        net_income: Some(100.0e9 * scale),
        eps: Some(6.0 * scale),
        depreciation_and_amortization: Some(50.0e9),
        weighted_average_shares: Some(16.0e9),
        net_receivables: Some(200.0e9 * scale),
        total_current_assets: Some(500.0e9),
        property_plant_equipment_net: Some(300.0e9),
        total_assets: Some(1000.0e9),
        total_current_liabilities: Some(250.0e9),
        total_liabilities: Some(400.0e9),
        shareholders_equity: Some(600.0e9),
        operating_cash_flow: Some(150.0e9 * scale),
        ..Default::default()
    }
}

fn quarterly(ticker: &str, year: i32, quarter: u32) -> FinancialStatement {
    FinancialStatement {
        symbol: ticker.to_string(),
        period: Some(StatementPeriod::Quarterly),
        fiscal_year: year,
        fiscal_period: format!("Q{}", quarter),
        end_date: NaiveDate::from_ymd_opt(year, quarter * 3, 28),
        revenue: Some(250.0e9),
        net_income: Some(25.0e9),
        eps: Some(1.5),
        ..Default::default()
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    async fn daily_closes(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, AnalysisError> {
        match ticker {
            "NODATA" => return Err(AnalysisError::NotFound(ticker.to_string())),
            "EMPTY" => return Ok(Vec::new()),
            _ => {}
        }
        let s = seed(ticker);
        let base = 50.0 + s % 100.0;
        let mut points = Vec::new();
        let mut day = start;
        let mut i = 0.0;
        while day < end {
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                let close = base * (1.0 + 0.02 * (i * 0.7 + s).sin() + 0.001 * i);
                points.push(PricePoint { date: day, close });
                i += 1.0;
            }
            day += Duration::days(1);
        }
        Ok(points)
    }

    async fn statements(
        &self,
        ticker: &str,
        period: StatementPeriod,
        limit: u32,
    ) -> Result<Vec<FinancialStatement>, AnalysisError> {
        self.statement_calls.fetch_add(1, Ordering::SeqCst);
        if ticker == "NODATA" {
            return Err(AnalysisError::NotFound(format!("no financials for {}", ticker)));
        }
        let all = match period {
            StatementPeriod::Annual => vec![annual(ticker, 2023, 1.1), annual(ticker, 2022, 1.0)],
            StatementPeriod::Quarterly => (1..=4).rev().map(|q| quarterly(ticker, 2023, q)).collect(),
        };
        Ok(all.into_iter().take(limit as usize).collect())
    }

    async fn ticker_profile(&self, ticker: &str) -> Result<TickerProfile, AnalysisError> {
        Ok(TickerProfile {
            ticker: ticker.to_string(),
            name: format!("{} Corp", ticker),
            market_cap: Some(2.5e12),
            homepage_url: Some("https://www.example.com".to_string()),
            weighted_shares_outstanding: Some(16.0e9),
        })
    }

    async fn dividends(&self, _ticker: &str, limit: u32) -> Result<Vec<DividendRecord>, AnalysisError> {
        let today = Utc::now().date_naive();
        Ok([30, 120, 210, 300]
            .into_iter()
            .take(limit as usize)
            .map(|days| DividendRecord {
                cash_amount: Some(0.25),
                ex_dividend_date: Some(today - Duration::days(days)),
                frequency: Some(4),
            })
            .collect())
    }

    async fn list_tickers(&self, limit: usize) -> Result<Vec<TickerListing>, AnalysisError> {
        self.ticker_list_calls.fetch_add(1, Ordering::SeqCst);
        Ok([
            ("AAPL", "Apple Inc."),
            ("AMZN", "Amazon.com, Inc."),
            ("MSFT", "Microsoft Corporation"),
            ("SPY", "SPDR S&P 500 ETF Trust"),
            ("^GSPC", "S&P 500 Index"),
        ]
        .iter()
        .take(limit)
        .map(|(s, n)| TickerListing::new(s, n))
        .collect())
    }
}

pub fn test_config(filings_dir: PathBuf) -> Config {
    Config {
        polygon_api_key: "test".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        fraud_model_path: None,
        filings_dir,
        openai_api_key: None,
        openai_model: "gpt-3.5-turbo".to_string(),
        benchmark_ticker: "SPY".to_string(),
        ticker_list_limit: 100,
        cache_ttl: std::time::Duration::from_secs(60),
    }
}

pub fn test_state() -> AppState {
    let dir = std::env::temp_dir().join("api-server-no-filings");
    AppState::new(&test_config(dir), Arc::new(MockProvider::default()))
        .expect("test state builds without a model")
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body collects");
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

pub async fn get(state: AppState, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request");
    send(build_router(state), request).await
}

pub async fn post_json(
    state: AppState,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request");
    send(build_router(state), request).await
}
