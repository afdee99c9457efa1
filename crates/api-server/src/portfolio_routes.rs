use axum::{extract::State, routing::post, Json, Router};
use futures_util::future::join_all;
use quant_analysis::{
    evaluate, simulate_growth, snapshot, GrowthSimulation, OverviewExtra, PerformanceReport,
    PriceRow, PriceTable, StockSnapshot, TickerSummary,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::prices::{fetch_series, load_returns, PriceRange};
use crate::{ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct OverviewRequest {
    #[serde(flatten)]
    pub range: PriceRange,
    #[serde(default)]
    pub extras: Vec<OverviewExtra>,
}

#[derive(Serialize)]
pub struct CompanyCard {
    pub ticker: String,
    pub name: Option<String>,
    pub logo_url: Option<String>,
}

#[derive(Serialize)]
pub struct OverviewResponse {
    pub prices: Vec<PriceRow>,
    pub summaries: Vec<TickerSummary>,
    pub snapshots: Vec<StockSnapshot>,
    pub companies: Vec<CompanyCard>,
}

#[derive(Deserialize)]
pub struct PerformanceRequest {
    #[serde(flatten)]
    pub range: PriceRange,
    /// Dollar amount invested per ticker
    pub allocations: HashMap<String, f64>,
    pub benchmark: Option<String>,
}

#[derive(Serialize)]
pub struct PerformanceResponse {
    pub benchmark: String,
    pub growth: GrowthSimulation,
    pub metrics: PerformanceReport,
}

pub fn portfolio_routes() -> Router<AppState> {
    Router::new()
        .route("/api/portfolio/overview", post(overview))
        .route("/api/portfolio/performance", post(performance))
}

async fn overview(
    State(state): State<AppState>,
    Json(req): Json<OverviewRequest>,
) -> Result<Json<ApiResponse<OverviewResponse>>, AppError> {
    let tickers = req.range.validate()?;
    tracing::info!(?tickers, start = %req.range.start, end = %req.range.end, "portfolio overview");

    let provider = state.provider.as_ref();
    let series = fetch_series(provider, &tickers, req.range.start, req.range.end).await;
    let table = PriceTable::from_series(&series);

    let snapshots = series
        .iter()
        .map(|s| snapshot(&s.ticker, &s.points, &req.extras))
        .collect();

    let companies = join_all(tickers.iter().map(|ticker| async move {
        match provider.ticker_profile(ticker).await {
            Ok(profile) => CompanyCard {
                ticker: ticker.clone(),
                logo_url: profile.logo_url(),
                name: Some(profile.name).filter(|n| !n.is_empty()),
            },
            Err(e) => {
                tracing::debug!(ticker = %ticker, error = %e, "no company profile");
                CompanyCard {
                    ticker: ticker.clone(),
                    name: None,
                    logo_url: None,
                }
            }
        }
    }))
    .await;

    Ok(Json(ApiResponse::success(OverviewResponse {
        prices: table.long_rows(),
        summaries: table.ticker_summaries(),
        snapshots,
        companies,
    })))
}

async fn performance(
    State(state): State<AppState>,
    Json(req): Json<PerformanceRequest>,
) -> Result<Json<ApiResponse<PerformanceResponse>>, AppError> {
    let tickers = req.range.validate()?;
    if req.allocations.values().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(AppError::bad_request("Investment amounts cannot be negative"));
    }
    let allocations: HashMap<String, f64> = req
        .allocations
        .iter()
        .map(|(t, v)| (t.trim().to_uppercase(), *v))
        .filter(|(t, _)| tickers.contains(t))
        .collect();

    let benchmark = req
        .benchmark
        .as_deref()
        .map(|b| b.trim().to_uppercase())
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| state.benchmark_ticker.clone());
    tracing::info!(?tickers, %benchmark, "portfolio performance");

    let provider = state.provider.as_ref();
    let (prices, returns) = load_returns(provider, &tickers, req.range.start, req.range.end).await?;
    let benchmark_prices = provider
        .daily_closes(&benchmark, req.range.start, req.range.end)
        .await
        .map_err(|e| tracing::warn!(%benchmark, error = %e, "benchmark prices unavailable"))
        .ok()
        .filter(|p| !p.is_empty());

    let metrics = evaluate(&returns, &allocations, benchmark_prices.as_deref())?;
    let growth = simulate_growth(&prices, &allocations);

    Ok(Json(ApiResponse::success(PerformanceResponse {
        benchmark,
        growth,
        metrics,
    })))
}
