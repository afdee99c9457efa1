use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{ApiResponse, AppError, AppState};

const DEFAULT_MATCHES: usize = 50;
const MAX_MATCHES: usize = 500;

#[derive(Deserialize)]
pub struct TickerQuery {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct TickerOption {
    pub symbol: String,
    pub name: String,
    pub display: String,
}

pub fn ticker_routes() -> Router<AppState> {
    Router::new().route("/api/tickers", get(search_tickers))
}

/// Case-insensitive substring search over "SYMBOL - Name".
async fn search_tickers(
    State(state): State<AppState>,
    Query(query): Query<TickerQuery>,
) -> Result<Json<ApiResponse<Vec<TickerOption>>>, AppError> {
    let listings = state.provider.list_tickers(state.ticker_list_limit).await?;
    let needle = query.q.unwrap_or_default().trim().to_lowercase();
    let limit = query.limit.unwrap_or(DEFAULT_MATCHES).clamp(1, MAX_MATCHES);

    let matches: Vec<TickerOption> = listings
        .iter()
        .map(|l| (l, l.display()))
        .filter(|(_, display)| needle.is_empty() || display.to_lowercase().contains(&needle))
        .take(limit)
        .map(|(l, display)| TickerOption {
            symbol: l.symbol.clone(),
            name: l.name.clone(),
            display,
        })
        .collect();

    tracing::info!(query = %needle, matches = matches.len(), "ticker search");
    Ok(Json(ApiResponse::success(matches)))
}
