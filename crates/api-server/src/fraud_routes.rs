use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use fundamental_analysis::{FraudMethod, FraudReport, GlossaryEntry, FEATURE_GLOSSARY};
use serde::{Deserialize, Serialize};

use crate::prices::clean_tickers;
use crate::{ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct FraudRequest {
    pub ticker: String,
    pub method: FraudMethod,
}

#[derive(Serialize)]
pub struct FraudResponse {
    pub flagged: bool,
    #[serde(flatten)]
    pub report: FraudReport,
}

pub fn fraud_routes() -> Router<AppState> {
    Router::new()
        .route("/api/fraud", post(screen))
        .route("/api/fraud/glossary", get(glossary))
}

async fn screen(
    State(state): State<AppState>,
    Json(req): Json<FraudRequest>,
) -> Result<Json<ApiResponse<FraudResponse>>, AppError> {
    let ticker = clean_tickers(std::slice::from_ref(&req.ticker))
        .map_err(|_| AppError::bad_request("Enter a ticker"))?
        .remove(0);
    tracing::info!(%ticker, method = ?req.method, "fraud screen requested");

    let report = state.screener.screen(&ticker, req.method).await?;
    Ok(Json(ApiResponse::success(FraudResponse {
        flagged: report.flagged(),
        report,
    })))
}

async fn glossary() -> Json<ApiResponse<Vec<GlossaryEntry>>> {
    Json(ApiResponse::success(FEATURE_GLOSSARY.to_vec()))
}
