use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily closing price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Closing prices of one ticker, ascending by date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series, sorting by date and dropping non-finite closes.
    pub fn new(ticker: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.retain(|p| p.close.is_finite());
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Self {
            ticker: ticker.into(),
            points,
        }
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }
}

/// Reporting cadence of a financial statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementPeriod {
    Annual,
    Quarterly,
}

impl StatementPeriod {
    /// Polygon's `timeframe` query value
    pub fn as_timeframe(&self) -> &'static str {
        match self {
            StatementPeriod::Annual => "annual",
            StatementPeriod::Quarterly => "quarterly",
        }
    }
}

/// One period of income statement, balance sheet and cash-flow line items.
///
/// Every line item is optional because providers omit fields freely; consumers
/// decide whether a gap means zero or "not available".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinancialStatement {
    pub symbol: String,
    pub period: Option<StatementPeriod>,
    pub fiscal_year: i32,
    pub fiscal_period: String,
    pub end_date: Option<NaiveDate>,
    // Income statement
    pub revenue: Option<f64>,
    pub cost_of_revenue: Option<f64>,
    pub gross_profit: Option<f64>,
    pub operating_income: Option<f64>,
    pub ebit: Option<f64>,
    pub net_income: Option<f64>,
    pub eps: Option<f64>,
    pub depreciation_and_amortization: Option<f64>,
    pub weighted_average_shares: Option<f64>,
    // Balance sheet
    pub net_receivables: Option<f64>,
    pub total_current_assets: Option<f64>,
    pub property_plant_equipment_net: Option<f64>,
    pub total_assets: Option<f64>,
    pub total_current_liabilities: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub shareholders_equity: Option<f64>,
    // Cash flow
    pub operating_cash_flow: Option<f64>,
}

/// Company reference data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickerProfile {
    pub ticker: String,
    pub name: String,
    pub market_cap: Option<f64>,
    pub homepage_url: Option<String>,
    pub weighted_shares_outstanding: Option<f64>,
}

impl TickerProfile {
    pub fn logo_url(&self) -> Option<String> {
        self.homepage_url.as_deref().and_then(logo_url)
    }
}

/// Entry of the searchable master ticker list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerListing {
    pub symbol: String,
    pub name: String,
}

impl TickerListing {
    pub fn new(symbol: &str, name: &str) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            name: name.to_string(),
        }
    }

    /// Text shown in the ticker picker, e.g. `AAPL - Apple Inc.`
    pub fn display(&self) -> String {
        format!("{} - {}", self.symbol, self.name)
    }
}

/// Cash dividend event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DividendRecord {
    pub cash_amount: Option<f64>,
    pub ex_dividend_date: Option<NaiveDate>,
    pub frequency: Option<i32>,
}

/// Index symbols such as `^GSPC` are stored without the caret.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().replace('^', "")
}

/// Clearbit logo URL derived from a company homepage.
pub fn logo_url(homepage: &str) -> Option<String> {
    let host = homepage
        .trim()
        .trim_start_matches("https://www.")
        .trim_start_matches("http://www.")
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or_default();
    if host.is_empty() {
        None
    } else {
        Some(format!("https://logo.clearbit.com/{}", host))
    }
}
