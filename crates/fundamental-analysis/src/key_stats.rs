use analysis_core::{
    DividendRecord, FinancialStatement, MarketDataProvider, StatementPeriod, TickerProfile,
};
use chrono::{Duration, NaiveDate};
use serde::Serialize;

/// Statements fetched per ticker; four quarters cover a trailing year
const STATEMENT_LIMIT: u32 = 8;
const DIVIDEND_LIMIT: u32 = 12;

/// One row of the key-statistics table
#[derive(Debug, Clone, Serialize)]
pub struct KeyStatsRow {
    pub ticker: String,
    pub report_date: Option<NaiveDate>,
    pub available_dates: Vec<NaiveDate>,
    /// Latest close over the newest trailing EPS, whatever `report_date` is
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub market_cap: Option<f64>,
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeyStatsEntry {
    Row(KeyStatsRow),
    Warning { ticker: String, message: String },
}

pub fn format_billions(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("${:.2} B", v / 1e9),
        _ => "N/A".to_string(),
    }
}

/// Trailing EPS: latest annual figure, or the sum of the latest four quarters.
pub fn trailing_eps(statements: &[FinancialStatement], period: StatementPeriod) -> Option<f64> {
    match period {
        StatementPeriod::Annual => statements.first().and_then(|s| s.eps),
        StatementPeriod::Quarterly => {
            let quarters: Vec<f64> = statements.iter().take(4).filter_map(|s| s.eps).collect();
            (quarters.len() == 4).then(|| quarters.iter().sum())
        }
    }
}

pub fn trailing_pe(price: Option<f64>, eps: Option<f64>) -> Option<f64> {
    match (price, eps) {
        (Some(p), Some(e)) if e > 0.0 => Some(p / e),
        _ => None,
    }
}

/// Cash dividends with an ex-date in the year before `as_of`, over `price`.
pub fn dividend_yield(dividends: &[DividendRecord], price: Option<f64>, as_of: NaiveDate) -> Option<f64> {
    let price = price.filter(|p| *p > 0.0)?;
    let window_start = as_of - Duration::days(365);
    let total: f64 = dividends
        .iter()
        .filter(|d| {
            d.ex_dividend_date
                .map(|date| date > window_start && date <= as_of)
                .unwrap_or(false)
        })
        .filter_map(|d| d.cash_amount)
        .sum();
    Some(total / price)
}

/// Statement for the requested report date, or the most recent one.
pub fn select_statement(
    statements: &[FinancialStatement],
    requested: Option<NaiveDate>,
) -> Option<&FinancialStatement> {
    match requested {
        Some(date) => statements.iter().find(|s| s.end_date == Some(date)),
        None => statements.first(),
    }
}

/// Inputs gathered from the provider for one ticker
#[derive(Debug, Clone, Default)]
pub struct KeyStatsInputs {
    pub statements: Vec<FinancialStatement>,
    pub profile: Option<TickerProfile>,
    pub last_close: Option<f64>,
    pub dividends: Vec<DividendRecord>,
}

/// Row for the selected report date. Revenue and net income come from that
/// statement; P/E and dividend yield are current figures built from the
/// latest close and the newest statements.
pub fn build_entry(
    ticker: &str,
    period: StatementPeriod,
    inputs: &KeyStatsInputs,
    requested: Option<NaiveDate>,
    as_of: NaiveDate,
) -> KeyStatsEntry {
    let period_label = match period {
        StatementPeriod::Annual => "Annual",
        StatementPeriod::Quarterly => "Quarterly",
    };
    if inputs.statements.is_empty() {
        return KeyStatsEntry::Warning {
            ticker: ticker.to_string(),
            message: format!("No {} financial data available for {}.", period_label, ticker),
        };
    }

    let Some(statement) = select_statement(&inputs.statements, requested) else {
        return KeyStatsEntry::Warning {
            ticker: ticker.to_string(),
            message: format!("No {} report for {} on the requested date.", period_label, ticker),
        };
    };

    KeyStatsEntry::Row(KeyStatsRow {
        ticker: ticker.to_string(),
        report_date: statement.end_date,
        available_dates: inputs.statements.iter().filter_map(|s| s.end_date).collect(),
        trailing_pe: trailing_pe(inputs.last_close, trailing_eps(&inputs.statements, period)),
        forward_pe: None,
        dividend_yield: dividend_yield(&inputs.dividends, inputs.last_close, as_of),
        market_cap: inputs.profile.as_ref().and_then(|p| p.market_cap),
        revenue: statement.revenue,
        net_income: statement.net_income,
    })
}

/// Gather everything for one ticker. Only a statements failure becomes a
/// warning; price, profile and dividend gaps leave their fields empty.
pub async fn key_stats(
    provider: &dyn MarketDataProvider,
    ticker: &str,
    period: StatementPeriod,
    requested: Option<NaiveDate>,
    as_of: NaiveDate,
) -> KeyStatsEntry {
    let statements = match provider.statements(ticker, period, STATEMENT_LIMIT).await {
        Ok(s) => s,
        Err(e) => {
            return KeyStatsEntry::Warning {
                ticker: ticker.to_string(),
                message: format!("Could not retrieve financials for {}: {}", ticker, e),
            }
        }
    };

    let profile = provider
        .ticker_profile(ticker)
        .await
        .map_err(|e| tracing::warn!(ticker, error = %e, "ticker profile unavailable"))
        .ok();
    let last_close = provider
        .daily_closes(ticker, as_of - Duration::days(10), as_of + Duration::days(1))
        .await
        .map_err(|e| tracing::warn!(ticker, error = %e, "last close unavailable"))
        .ok()
        .and_then(|points| points.last().map(|p| p.close));
    let dividends = provider
        .dividends(ticker, DIVIDEND_LIMIT)
        .await
        .map_err(|e| tracing::warn!(ticker, error = %e, "dividends unavailable"))
        .unwrap_or_default();

    let inputs = KeyStatsInputs {
        statements,
        profile,
        last_close,
        dividends,
    };
    build_entry(ticker, period, &inputs, requested, as_of)
}
