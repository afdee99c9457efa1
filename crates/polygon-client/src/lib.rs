use analysis_core::{
    AnalysisError, DividendRecord, FinancialStatement, MarketDataProvider, PricePoint,
    StatementPeriod, TickerListing, TickerProfile,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const BASE_URL: &str = "https://api.polygon.io";

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let oldest = match ts.front() {
                Some(&front) => front,
                None => continue,
            };
            let sleep_dur = (oldest + self.window).saturating_duration_since(now)
                + Duration::from_millis(50);
            drop(ts);
            tracing::debug!(
                "Rate limiter: waiting {:.1}s for Polygon API slot",
                sleep_dur.as_secs_f64()
            );
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl PolygonClient {
    pub fn new(api_key: String) -> Self {
        // Starter plan allows 500 req/min. Free tier users should set POLYGON_RATE_LIMIT=5.
        let rate_limit: usize = std::env::var("POLYGON_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);

        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            client,
            rate_limiter: RateLimiter::new(rate_limit, Duration::from_secs(60)),
        }
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AnalysisError> {
        let request = builder
            .build()
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| AnalysisError::ApiError("Cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(req_clone)
                .await
                .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            let wait_secs = 15u64;
            tracing::warn!(
                "Polygon 429 rate limited, waiting {}s before retry {}/3",
                wait_secs,
                attempt + 1
            );
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(AnalysisError::ApiError(
            "Rate limited by Polygon after 3 retries".to_string(),
        ))
    }

    async fn error_from(response: reqwest::Response) -> AnalysisError {
        let status = response.status();
        if status.as_u16() == 404 {
            return AnalysisError::NotFound(response.url().path().to_string());
        }
        AnalysisError::ApiError(format!(
            "HTTP {}: {}",
            status,
            response.text().await.unwrap_or_default()
        ))
    }

    /// Get adjusted daily closes for `[from, to]`
    pub async fn get_aggregates(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, AnalysisError> {
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}",
            BASE_URL,
            symbol,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );

        let response = self
            .send_request(self.client.get(&url).query(&[
                ("apiKey", self.api_key.as_str()),
                ("adjusted", "true"),
                ("sort", "asc"),
                ("limit", "50000"),
            ]))
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let agg_response: AggregateResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        Ok(agg_response
            .results
            .into_iter()
            .filter_map(|r| {
                DateTime::from_timestamp_millis(r.t).map(|ts| PricePoint {
                    date: ts.date_naive(),
                    close: r.c,
                })
            })
            .collect())
    }

    /// Get company financials, newest first
    pub async fn get_financials(
        &self,
        symbol: &str,
        period: StatementPeriod,
        limit: u32,
    ) -> Result<Vec<FinancialStatement>, AnalysisError> {
        let url = format!("{}/vX/reference/financials", BASE_URL);
        let limit = limit.to_string();

        let response = self
            .send_request(self.client.get(&url).query(&[
                ("ticker", symbol),
                ("timeframe", period.as_timeframe()),
                ("order", "desc"),
                ("sort", "period_of_report_date"),
                ("apiKey", self.api_key.as_str()),
                ("limit", limit.as_str()),
            ]))
            .await?;

        if !response.status().is_success() {
            if response.status().as_u16() == 403 || response.status().as_u16() == 401 {
                tracing::warn!("Financials not available on this Polygon plan for {}", symbol);
                return Ok(Vec::new());
            }
            return Err(Self::error_from(response).await);
        }

        let fin_response: FinancialsResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        Ok(fin_response
            .results
            .into_iter()
            .map(|r| statement_from_result(symbol, period, r))
            .collect())
    }

    /// Get ticker details
    pub async fn get_ticker_details(&self, symbol: &str) -> Result<TickerDetails, AnalysisError> {
        let url = format!("{}/v3/reference/tickers/{}", BASE_URL, symbol);

        let response = self
            .send_request(self.client.get(&url).query(&[("apiKey", &self.api_key)]))
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let details_response: TickerDetailsResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        Ok(details_response.results)
    }

    /// Get dividend history for a symbol
    pub async fn get_dividends(
        &self,
        symbol: &str,
        limit: u32,
    ) -> Result<Vec<DividendInfo>, AnalysisError> {
        let url = format!("{}/v3/reference/dividends", BASE_URL);

        let response = self
            .send_request(self.client.get(&url).query(&[
                ("ticker", symbol),
                ("apiKey", &self.api_key as &str),
                ("limit", &limit.to_string()),
                ("order", "desc"),
            ]))
            .await?;

        if !response.status().is_success() {
            if response.status().as_u16() == 403 || response.status().as_u16() == 401 {
                return Ok(Vec::new());
            }
            return Err(Self::error_from(response).await);
        }

        let div_response: DividendResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        Ok(div_response.results)
    }

    /// List active stock and ETF tickers with their names.
    /// Paginates automatically. Returns up to `max_tickers` entries.
    pub async fn list_tickers(
        &self,
        max_tickers: usize,
    ) -> Result<Vec<TickerListing>, AnalysisError> {
        let mut tickers = Vec::new();
        let mut cursor: Option<String> = None;
        let page_limit = 1000;

        loop {
            let mut builder = self
                .client
                .get(&format!("{}/v3/reference/tickers", BASE_URL))
                .query(&[
                    ("apiKey", self.api_key.as_str()),
                    ("market", "stocks"),
                    ("active", "true"),
                    ("limit", &page_limit.to_string()),
                    ("order", "asc"),
                    ("sort", "ticker"),
                ]);

            if let Some(ref c) = cursor {
                builder = builder.query(&[("cursor", c.as_str())]);
            }

            let response = self.send_request(builder).await?;
            if !response.status().is_success() {
                tracing::warn!("Ticker listing stopped at HTTP {}", response.status());
                break;
            }

            let body: TickerListResponse = response
                .json()
                .await
                .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

            for t in &body.results {
                tickers.push(TickerListing::new(&t.ticker, t.name.as_deref().unwrap_or("")));
                if tickers.len() >= max_tickers {
                    return Ok(tickers);
                }
            }

            cursor = body.next_url.as_deref().and_then(cursor_from_next_url);
            if cursor.is_none() {
                break;
            }
        }

        Ok(tickers)
    }
}

#[async_trait]
impl MarketDataProvider for PolygonClient {
    async fn daily_closes(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, AnalysisError> {
        // Polygon's range is inclusive; the dashboard treats `end` as exclusive.
        let last = end.pred_opt().unwrap_or(end);
        self.get_aggregates(ticker, start, last).await
    }

    async fn statements(
        &self,
        ticker: &str,
        period: StatementPeriod,
        limit: u32,
    ) -> Result<Vec<FinancialStatement>, AnalysisError> {
        self.get_financials(ticker, period, limit).await
    }

    async fn ticker_profile(&self, ticker: &str) -> Result<TickerProfile, AnalysisError> {
        let details = self.get_ticker_details(ticker).await?;
        Ok(TickerProfile {
            ticker: details.ticker,
            name: details.name,
            market_cap: details.market_cap,
            homepage_url: details.homepage_url,
            weighted_shares_outstanding: details.weighted_shares_outstanding,
        })
    }

    async fn dividends(&self, ticker: &str, limit: u32) -> Result<Vec<DividendRecord>, AnalysisError> {
        Ok(self
            .get_dividends(ticker, limit)
            .await?
            .into_iter()
            .map(|d| DividendRecord {
                cash_amount: d.cash_amount,
                ex_dividend_date: d
                    .ex_dividend_date
                    .as_deref()
                    .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
                frequency: d.frequency,
            })
            .collect())
    }

    async fn list_tickers(&self, limit: usize) -> Result<Vec<TickerListing>, AnalysisError> {
        PolygonClient::list_tickers(self, limit).await
    }
}

/// Extract the `cursor` query parameter from Polygon's `next_url`.
fn cursor_from_next_url(next: &str) -> Option<String> {
    let url = reqwest::Url::parse(next).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "cursor")
        .map(|(_, value)| value.into_owned())
        .filter(|c| !c.is_empty())
}

fn line_item(section: &HashMap<String, serde_json::Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| {
        section
            .get(*k)
            .and_then(|v| v.get("value"))
            .and_then(|v| v.as_f64())
    })
}

fn statement_from_result(
    symbol: &str,
    period: StatementPeriod,
    r: FinancialResult,
) -> FinancialStatement {
    let income = &r.financials.income_statement;
    let balance = &r.financials.balance_sheet;
    let cash_flow = &r.financials.cash_flow_statement;

    FinancialStatement {
        symbol: symbol.to_string(),
        period: Some(period),
        fiscal_year: r.fiscal_year.parse().unwrap_or(0),
        fiscal_period: r.fiscal_period,
        end_date: r
            .end_date
            .as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
        revenue: line_item(income, &["revenues"]),
        cost_of_revenue: line_item(income, &["cost_of_revenue"]),
        gross_profit: line_item(income, &["gross_profit"]),
        operating_income: line_item(income, &["operating_income_loss"]),
        ebit: None,
        net_income: line_item(income, &["net_income_loss", "net_income_loss_attributable_to_parent"]),
        eps: line_item(income, &["basic_earnings_per_share", "diluted_earnings_per_share"]),
        depreciation_and_amortization: line_item(income, &["depreciation_and_amortization"])
            .or_else(|| line_item(cash_flow, &["depreciation_and_amortization"])),
        weighted_average_shares: line_item(income, &["basic_average_shares", "diluted_average_shares"]),
        net_receivables: line_item(balance, &["accounts_receivable", "other_current_assets_receivable"]),
        total_current_assets: line_item(balance, &["current_assets"]),
        property_plant_equipment_net: line_item(balance, &["fixed_assets"]),
        total_assets: line_item(balance, &["assets"]),
        total_current_liabilities: line_item(balance, &["current_liabilities"]),
        total_liabilities: line_item(balance, &["liabilities"]),
        shareholders_equity: line_item(balance, &["equity", "equity_attributable_to_parent"]),
        operating_cash_flow: line_item(
            cash_flow,
            &[
                "net_cash_flow_from_operating_activities",
                "net_cash_flow_from_operating_activities_continuing",
            ],
        ),
    }
}

// Ticker list response
#[derive(Debug, Deserialize)]
struct TickerListResponse {
    #[serde(default)]
    results: Vec<TickerListEntry>,
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TickerListEntry {
    ticker: String,
    #[serde(default)]
    name: Option<String>,
}

// Response structures
#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Vec<AggregateResult>,
}

#[derive(Debug, Deserialize)]
struct AggregateResult {
    t: i64, // timestamp
    c: f64, // close
}

#[derive(Debug, Deserialize)]
struct FinancialsResponse {
    #[serde(default)]
    results: Vec<FinancialResult>,
}

#[derive(Debug, Deserialize)]
struct FinancialResult {
    #[serde(default)]
    fiscal_period: String,
    #[serde(default)]
    fiscal_year: String,
    #[serde(default)]
    end_date: Option<String>,
    financials: FinancialStatements,
}

#[derive(Debug, Default, Deserialize)]
struct FinancialStatements {
    #[serde(default)]
    income_statement: HashMap<String, serde_json::Value>,
    #[serde(default)]
    balance_sheet: HashMap<String, serde_json::Value>,
    #[serde(default)]
    cash_flow_statement: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TickerDetailsResponse {
    results: TickerDetails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TickerDetails {
    pub ticker: String,
    pub name: String,
    pub market_cap: Option<f64>,
    pub homepage_url: Option<String>,
    pub weighted_shares_outstanding: Option<f64>,
}

// Dividend types
#[derive(Debug, Deserialize)]
struct DividendResponse {
    #[serde(default)]
    results: Vec<DividendInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DividendInfo {
    pub cash_amount: Option<f64>,
    pub ex_dividend_date: Option<String>,
    pub frequency: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cursor_from_next_url() {
        let next = "https://api.polygon.io/v3/reference/tickers?cursor=YWN0aXZl&limit=1000";
        assert_eq!(cursor_from_next_url(next), Some("YWN0aXZl".to_string()));
        assert_eq!(cursor_from_next_url("https://api.polygon.io/v3/reference/tickers"), None);
        // percent-encoded cursors are decoded; other keys ending in "cursor" are ignored
        let encoded = "https://api.polygon.io/v3/reference/tickers?precursor=x&cursor=YQ%3D%3D";
        assert_eq!(cursor_from_next_url(encoded), Some("YQ==".to_string()));
        assert_eq!(cursor_from_next_url("not a url"), None);
    }

    #[test]
    fn test_statement_mapping() {
        let raw = json!({
            "fiscal_period": "FY",
            "fiscal_year": "2023",
            "end_date": "2023-09-30",
            "financials": {
                "income_statement": {
                    "revenues": {"value": 383285000000.0, "unit": "USD"},
                    "cost_of_revenue": {"value": 214137000000.0},
                    "net_income_loss": {"value": 96995000000.0},
                    "basic_average_shares": {"value": 15744231000.0}
                },
                "balance_sheet": {
                    "assets": {"value": 352583000000.0},
                    "current_assets": {"value": 143566000000.0},
                    "liabilities": {"value": 290437000000.0}
                },
                "cash_flow_statement": {
                    "net_cash_flow_from_operating_activities": {"value": 110543000000.0}
                }
            }
        });
        let result: FinancialResult = serde_json::from_value(raw).unwrap();
        let st = statement_from_result("AAPL", StatementPeriod::Annual, result);

        assert_eq!(st.fiscal_year, 2023);
        assert_eq!(st.end_date, NaiveDate::from_ymd_opt(2023, 9, 30));
        assert_eq!(st.revenue, Some(383285000000.0));
        assert_eq!(st.total_assets, Some(352583000000.0));
        assert_eq!(st.operating_cash_flow, Some(110543000000.0));
        assert_eq!(st.weighted_average_shares, Some(15744231000.0));
        assert!(st.net_receivables.is_none());
        assert!(st.ebit.is_none());
    }

    #[tokio::test]
    async fn test_rate_limiter_admits_up_to_capacity() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let started = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(limiter.timestamps.lock().await.len(), 3);
    }
}
