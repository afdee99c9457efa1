use axum::{extract::State, routing::post, Json, Router};
use portfolio_optimizer::{
    bayesian_optimize, markowitz_simulate, BayesianConfig, BayesianResult, FrontierSummary,
    MarkowitzConfig, OptimizerError, SimulatedPortfolio,
};
use serde::{Deserialize, Serialize};

use crate::prices::{load_returns, PriceRange};
use crate::{ApiResponse, AppError, AppState};

const MIN_PORTFOLIOS: usize = 100;

fn default_num_portfolios() -> usize {
    2000
}

fn default_max_weight() -> f64 {
    1.0
}

#[derive(Deserialize)]
pub struct MarkowitzRequest {
    #[serde(flatten)]
    pub range: PriceRange,
    #[serde(default = "default_num_portfolios")]
    pub num_portfolios: usize,
    /// Annual risk-free rate as a fraction
    #[serde(default)]
    pub risk_free_rate: f64,
    #[serde(default)]
    pub min_weight: f64,
    #[serde(default = "default_max_weight")]
    pub max_weight: f64,
    pub seed: Option<u64>,
}

#[derive(Serialize)]
pub struct MarkowitzResponse {
    pub tickers: Vec<String>,
    pub attempts: usize,
    pub portfolios: Vec<SimulatedPortfolio>,
    #[serde(flatten)]
    pub summary: FrontierSummary,
}

#[derive(Deserialize)]
pub struct BayesianRequest {
    #[serde(flatten)]
    pub range: PriceRange,
    pub n_calls: Option<usize>,
    pub n_initial_points: Option<usize>,
    pub seed: Option<u64>,
}

pub fn optimizer_routes() -> Router<AppState> {
    Router::new()
        .route("/api/optimizer/markowitz", post(markowitz))
        .route("/api/optimizer/bayesian", post(bayesian))
}

async fn markowitz(
    State(state): State<AppState>,
    Json(req): Json<MarkowitzRequest>,
) -> Result<Json<ApiResponse<MarkowitzResponse>>, AppError> {
    let tickers = req.range.validate()?;
    if req.num_portfolios < MIN_PORTFOLIOS {
        return Err(AppError::bad_request(format!(
            "Number of portfolios must be at least {}",
            MIN_PORTFOLIOS
        )));
    }
    tracing::info!(?tickers, num_portfolios = req.num_portfolios, "markowitz simulation");

    let (_, returns) =
        load_returns(state.provider.as_ref(), &tickers, req.range.start, req.range.end).await?;
    let config = MarkowitzConfig {
        num_portfolios: req.num_portfolios,
        risk_free_rate: req.risk_free_rate,
        min_weight: req.min_weight,
        max_weight: req.max_weight,
        seed: req.seed,
    };

    let (frontier, summary) = tokio::task::spawn_blocking(move || {
        let frontier = markowitz_simulate(&returns, &config)?;
        let summary = frontier.summary()?;
        Ok::<_, OptimizerError>((frontier, summary))
    })
    .await??;

    Ok(Json(ApiResponse::success(MarkowitzResponse {
        tickers: frontier.tickers,
        attempts: frontier.attempts,
        portfolios: frontier.portfolios,
        summary,
    })))
}

async fn bayesian(
    State(state): State<AppState>,
    Json(req): Json<BayesianRequest>,
) -> Result<Json<ApiResponse<BayesianResult>>, AppError> {
    let tickers = req.range.validate()?;
    let defaults = BayesianConfig::default();
    let config = BayesianConfig {
        n_calls: req.n_calls.unwrap_or(defaults.n_calls),
        n_initial_points: req.n_initial_points.unwrap_or(defaults.n_initial_points),
        seed: req.seed.unwrap_or(defaults.seed),
        ..defaults
    };
    tracing::info!(?tickers, n_calls = config.n_calls, "bayesian optimization");

    let (_, returns) =
        load_returns(state.provider.as_ref(), &tickers, req.range.start, req.range.end).await?;
    let result = tokio::task::spawn_blocking(move || bayesian_optimize(&returns, &config)).await??;

    Ok(Json(ApiResponse::success(result)))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{post_json, test_state};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_markowitz_frontier() {
        let (status, body) = post_json(
            test_state(),
            "/api/optimizer/markowitz",
            json!({
                "tickers": ["AAPL", "MSFT", "AMZN"],
                "start": "2023-01-01",
                "end": "2024-01-01",
                "num_portfolios": 200,
                "seed": 7
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["portfolios"].as_array().unwrap().len(), 200);
        let weights = data["max_sharpe"]["weights"].as_array().unwrap();
        assert_eq!(weights.len(), 3);
        let total: f64 = weights.iter().map(|w| w["weight"].as_f64().unwrap()).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(
            data["min_volatility"]["volatility"].as_f64().unwrap()
                <= data["max_sharpe"]["volatility"].as_f64().unwrap()
        );
    }

    #[tokio::test]
    async fn test_markowitz_validation() {
        let (status, _) = post_json(
            test_state(),
            "/api/optimizer/markowitz",
            json!({ "tickers": ["AAPL", "MSFT"], "start": "2023-01-01", "end": "2024-01-01", "num_portfolios": 10 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // two assets can never both stay at or below 10%
        let (status, body) = post_json(
            test_state(),
            "/api/optimizer/markowitz",
            json!({
                "tickers": ["AAPL", "MSFT"],
                "start": "2023-01-01",
                "end": "2024-01-01",
                "num_portfolios": 100,
                "max_weight": 0.1,
                "seed": 1
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "No portfolios met weight constraints");
    }

    #[tokio::test]
    async fn test_bayesian_weights_sum_to_one() {
        let (status, body) = post_json(
            test_state(),
            "/api/optimizer/bayesian",
            json!({
                "tickers": ["AAPL", "MSFT"],
                "start": "2023-01-01",
                "end": "2024-01-01",
                "n_calls": 15,
                "n_initial_points": 5
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["evaluations"].as_array().unwrap().len(), 15);
        let total: f64 = data["weights"]
            .as_array()
            .unwrap()
            .iter()
            .map(|w| w["weight"].as_f64().unwrap())
            .sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
