use analysis_core::StatementPeriod;
use axum::{extract::State, routing::post, Json, Router};
use chrono::{NaiveDate, Utc};
use fundamental_analysis::{format_billions, key_stats, KeyStatsEntry};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use crate::prices::clean_tickers;
use crate::{ApiResponse, AppError, AppState};

fn default_period() -> StatementPeriod {
    StatementPeriod::Annual
}

#[derive(Deserialize)]
pub struct FinancialsRequest {
    pub tickers: Vec<String>,
    #[serde(default = "default_period")]
    pub period: StatementPeriod,
    /// Statement end date to report; latest when absent
    pub report_date: Option<NaiveDate>,
}

/// Table row with money columns formatted in billions
#[derive(Serialize)]
pub struct KeyStatsDisplay {
    pub ticker: String,
    pub report_date: Option<NaiveDate>,
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub market_cap: String,
    pub revenue: String,
    pub net_income: String,
}

#[derive(Serialize)]
pub struct FinancialsResponse {
    pub period: StatementPeriod,
    pub table: Vec<KeyStatsDisplay>,
    pub entries: Vec<KeyStatsEntry>,
}

pub fn financials_routes() -> Router<AppState> {
    Router::new().route("/api/financials", post(financials))
}

async fn financials(
    State(state): State<AppState>,
    Json(req): Json<FinancialsRequest>,
) -> Result<Json<ApiResponse<FinancialsResponse>>, AppError> {
    let tickers = clean_tickers(&req.tickers)?;
    tracing::info!(?tickers, period = ?req.period, "key statistics");

    let as_of = Utc::now().date_naive();
    let provider = state.provider.as_ref();
    let entries = join_all(
        tickers
            .iter()
            .map(|t| key_stats(provider, t, req.period, req.report_date, as_of)),
    )
    .await;

    let table = entries
        .iter()
        .filter_map(|entry| match entry {
            KeyStatsEntry::Row(row) => Some(KeyStatsDisplay {
                ticker: row.ticker.clone(),
                report_date: row.report_date,
                trailing_pe: row.trailing_pe,
                forward_pe: row.forward_pe,
                dividend_yield: row.dividend_yield,
                market_cap: format_billions(row.market_cap),
                revenue: format_billions(row.revenue),
                net_income: format_billions(row.net_income),
            }),
            KeyStatsEntry::Warning { .. } => None,
        })
        .collect();

    Ok(Json(ApiResponse::success(FinancialsResponse {
        period: req.period,
        table,
        entries,
    })))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{post_json, test_state};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_annual_key_stats_with_warning() {
        let (status, body) = post_json(
            test_state(),
            "/api/financials",
            json!({ "tickers": ["AAPL", "NODATA"] }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["period"], "annual");

        let table = data["table"].as_array().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0]["ticker"], "AAPL");
        assert_eq!(table[0]["report_date"], "2023-12-31");
        assert_eq!(table[0]["market_cap"], "$2500.00 B");
        assert_eq!(table[0]["revenue"], "$1100.00 B");
        assert!(table[0]["forward_pe"].is_null());
        assert!(table[0]["trailing_pe"].as_f64().unwrap() > 0.0);
        // four 0.25 dividends in the trailing year
        assert!(table[0]["dividend_yield"].as_f64().unwrap() > 0.0);

        assert_eq!(data["entries"][1]["kind"], "warning");
        assert_eq!(data["entries"][1]["ticker"], "NODATA");
    }

    #[tokio::test]
    async fn test_requested_quarterly_date() {
        let (status, body) = post_json(
            test_state(),
            "/api/financials",
            json!({ "tickers": ["MSFT"], "period": "quarterly", "report_date": "2023-06-28" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let row = &body["data"]["entries"][0];
        assert_eq!(row["kind"], "row");
        assert_eq!(row["report_date"], "2023-06-28");
        assert_eq!(row["available_dates"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_requires_tickers() {
        let (status, _) = post_json(test_state(), "/api/financials", json!({ "tickers": [] })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
