//! JSON API for the PortfolioLens dashboard pages.

use analysis_core::{AnalysisError, MarketDataProvider};
use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use dashmap::DashMap;
use filings::{FilingError, LoadedFiling, OpenAiAnswerer};
use fundamental_analysis::{FraudScreener, TreeEnsemble};
use polygon_client::PolygonClient;
use portfolio_optimizer::OptimizerError;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod cache;
pub mod config;
mod filing_routes;
mod financials_routes;
mod fraud_routes;
mod optimizer_routes;
mod portfolio_routes;
mod prices;
mod ticker_routes;

#[cfg(test)]
mod test_support;

use cache::CachedProvider;
use config::Config;

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn MarketDataProvider>,
    pub screener: FraudScreener,
    pub filings_dir: PathBuf,
    /// Parsed filings keyed by (ticker, accession)
    pub filings: Arc<DashMap<(String, String), Arc<LoadedFiling>>>,
    pub openai: Option<OpenAiAnswerer>,
    pub benchmark_ticker: String,
    pub ticker_list_limit: usize,
}

impl AppState {
    pub fn new(config: &Config, source: Arc<dyn MarketDataProvider>) -> anyhow::Result<Self> {
        let provider: Arc<dyn MarketDataProvider> =
            Arc::new(CachedProvider::new(source, config.cache_ttl));

        let model = match &config.fraud_model_path {
            Some(path) => {
                let model = TreeEnsemble::load(path)
                    .with_context(|| format!("loading fraud model from {}", path.display()))?;
                tracing::info!(trees = model.tree_count(), "fraud model loaded");
                Some(Arc::new(model))
            }
            None => {
                tracing::warn!("FRAUD_MODEL_PATH not set, model-based screening disabled");
                None
            }
        };

        let openai = match &config.openai_api_key {
            Some(key) => Some(OpenAiAnswerer::new(key.clone(), config.openai_model.clone())?),
            None => None,
        };

        Ok(Self {
            screener: FraudScreener::new(provider.clone(), model),
            provider,
            filings_dir: config.filings_dir.clone(),
            filings: Arc::new(DashMap::new()),
            openai,
            benchmark_ticker: config.benchmark_ticker.clone(),
            ticker_list_limit: config.ticker_list_limit,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Handler error carrying the HTTP status derived from the underlying error
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: anyhow::anyhow!(message.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

fn status_for(error: &anyhow::Error) -> StatusCode {
    if let Some(e) = error.downcast_ref::<AnalysisError>() {
        return match e {
            AnalysisError::InvalidData(_) => StatusCode::BAD_REQUEST,
            AnalysisError::NotFound(_) => StatusCode::NOT_FOUND,
            AnalysisError::InsufficientData(_) | AnalysisError::CalculationError(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AnalysisError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            AnalysisError::ApiError(_) => StatusCode::BAD_GATEWAY,
        };
    }
    if let Some(e) = error.downcast_ref::<OptimizerError>() {
        return match e {
            OptimizerError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            OptimizerError::InsufficientData | OptimizerError::NoFeasiblePortfolio => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            OptimizerError::Numerical(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
    }
    if let Some(e) = error.downcast_ref::<FilingError>() {
        return match e {
            FilingError::NotFound(_) => StatusCode::NOT_FOUND,
            FilingError::Unsupported(_) | FilingError::MissingApiKey(_) => {
                StatusCode::NOT_IMPLEMENTED
            }
            FilingError::RequestFailed(_)
            | FilingError::ServiceUnavailable(_)
            | FilingError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
            FilingError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
    }
    StatusCode::INTERNAL_SERVER_ERROR
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let error = err.into();
        Self {
            status: status_for(&error),
            error,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, "request failed: {:#}", self.error);
        } else {
            tracing::warn!(status = %self.status, "request rejected: {}", self.error);
        }
        let body = ApiResponse::<()>::error(self.error.to_string());
        (self.status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
    fraud_model: bool,
    openai: bool,
}

async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::success(HealthStatus {
        status: "ok",
        fraud_model: state.screener.has_model(),
        openai: state.openai.is_some(),
    }))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .merge(ticker_routes::ticker_routes())
        .merge(portfolio_routes::portfolio_routes())
        .merge(optimizer_routes::optimizer_routes())
        .merge(financials_routes::financials_routes())
        .merge(fraud_routes::fraud_routes())
        .merge(filing_routes::filing_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub fn init_tracing() {
    let json_logging = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "api_server=info,polygon_client=warn".into())
    };

    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;
    let polygon: Arc<dyn MarketDataProvider> =
        Arc::new(PolygonClient::new(config.polygon_api_key.clone()));
    let state = AppState::new(&config, polygon)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(
        "PortfolioLens API v{} listening on {}",
        env!("CARGO_PKG_VERSION"),
        config.bind_addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
