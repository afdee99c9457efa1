use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use filings::{
    is_valid_ticker, ExtractiveAnswerer, FilingError, FilingIndex, FilingRecord, HeadlineMetrics,
    LoadedFiling, QuestionAnswerer,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct FilingsQuery {
    /// Comma-separated tickers; every ticker directory when absent
    pub tickers: Option<String>,
    /// Comma-separated filing years; every filing when absent
    pub years: Option<String>,
}

#[derive(Serialize)]
pub struct FilingListing {
    pub years: Vec<i32>,
    pub filings: Vec<FilingRecord>,
}

#[derive(Deserialize)]
pub struct FilingRef {
    pub ticker: String,
    pub accession: String,
}

#[derive(Serialize)]
pub struct FilingMetricsResponse {
    pub filing: FilingRecord,
    pub metrics: HeadlineMetrics,
    pub chunks: usize,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswererKind {
    #[default]
    Local,
    OpenAi,
}

#[derive(Deserialize)]
pub struct AskRequest {
    #[serde(flatten)]
    pub filing: FilingRef,
    pub question: String,
    #[serde(default)]
    pub answerer: AnswererKind,
}

#[derive(Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub answerer: &'static str,
}

pub fn filing_routes() -> Router<AppState> {
    Router::new()
        .route("/api/filings", get(list_filings))
        .route("/api/filings/metrics", post(filing_metrics))
        .route("/api/filings/ask", post(ask))
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

async fn list_filings(
    State(state): State<AppState>,
    Query(query): Query<FilingsQuery>,
) -> Result<Json<ApiResponse<FilingListing>>, AppError> {
    let tickers: Vec<String> = split_list(query.tickers.as_deref())
        .into_iter()
        .map(|t| t.to_uppercase())
        .collect();
    if let Some(bad) = tickers.iter().find(|t| !is_valid_ticker(t)) {
        return Err(AppError::bad_request(format!("Invalid ticker: {}", bad)));
    }
    let years = split_list(query.years.as_deref())
        .iter()
        .map(|y| y.parse::<i32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| AppError::bad_request("Years must be numbers such as 2023"))?;
    tracing::info!(?tickers, ?years, "listing 10-K filings");

    let root = state.filings_dir.clone();
    let index = tokio::task::spawn_blocking(move || FilingIndex::scan(root, &tickers)).await??;

    let filings = if years.is_empty() {
        index.records().to_vec()
    } else {
        index.select(&years)
    };
    Ok(Json(ApiResponse::success(FilingListing {
        years: index.years(),
        filings,
    })))
}

/// Parsed filing from the cache, reading it from disk on first use.
async fn load_filing(state: &AppState, filing: &FilingRef) -> Result<Arc<LoadedFiling>, AppError> {
    let ticker = filing.ticker.trim().to_uppercase();
    let accession = filing.accession.trim().to_string();
    if !is_valid_ticker(&ticker) || accession.is_empty() {
        return Err(AppError::bad_request("Select a filing"));
    }
    let key = (ticker.clone(), accession.clone());
    if let Some(hit) = state.filings.get(&key) {
        return Ok(Arc::clone(hit.value()));
    }

    let root = state.filings_dir.clone();
    let loaded = tokio::task::spawn_blocking(move || {
        let index = FilingIndex::scan(root, std::slice::from_ref(&ticker))?;
        let record = index
            .find(&ticker, &accession)
            .cloned()
            .ok_or_else(|| FilingError::NotFound(format!("{} {}", ticker, accession)))?;
        LoadedFiling::load(record)
    })
    .await??;

    let loaded = Arc::new(loaded);
    state.filings.insert(key, loaded.clone());
    Ok(loaded)
}

async fn filing_metrics(
    State(state): State<AppState>,
    Json(req): Json<FilingRef>,
) -> Result<Json<ApiResponse<FilingMetricsResponse>>, AppError> {
    tracing::info!(ticker = %req.ticker, accession = %req.accession, "10-K headline figures");
    let filing = load_filing(&state, &req).await?;
    Ok(Json(ApiResponse::success(FilingMetricsResponse {
        filing: filing.record.clone(),
        metrics: filing.metrics.clone(),
        chunks: filing.retriever.len(),
    })))
}

async fn ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<ApiResponse<AskResponse>>, AppError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(AppError::bad_request("Enter a question"));
    }
    let answerer: &dyn QuestionAnswerer = match req.answerer {
        AnswererKind::Local => &ExtractiveAnswerer,
        AnswererKind::OpenAi => state
            .openai
            .as_ref()
            .ok_or(FilingError::MissingApiKey("OpenAI"))?,
    };
    tracing::info!(
        ticker = %req.filing.ticker,
        accession = %req.filing.accession,
        answerer = answerer.name(),
        "10-K question"
    );

    let filing = load_filing(&state, &req.filing).await?;
    let answer = filing.ask(answerer, question).await?;
    Ok(Json(ApiResponse::success(AskResponse {
        answer,
        answerer: answerer.name(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{get, post_json, test_config, MockProvider};
    use axum::http::StatusCode;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    const FILING_HTML: &str = "<html><body>\
        <p>Total revenue was $383,285 million for fiscal 2023.</p>\
        <p>Net income of $96,995 million.</p>\
        <p>Total assets $352,583 million.</p>\
        <p>Our fiscal year ends on the last Saturday of September.</p>\
        </body></html>";

    fn filings_root() -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let root = std::env::temp_dir().join(format!(
            "api-server-filings-{}-{}",
            std::process::id(),
            n
        ));
        let _ = std::fs::remove_dir_all(&root);
        for (ticker, accession) in [
            ("AAPL", "0000320193-22-000108"),
            ("AAPL", "0000320193-23-000106"),
            ("MSFT", "0000789019-23-000014"),
        ] {
            let dir = root.join(ticker).join("10-K").join(accession);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("primary-document.htm"), FILING_HTML).unwrap();
        }
        root
    }

    fn state_for(root: PathBuf) -> AppState {
        AppState::new(&test_config(root), Arc::new(MockProvider::default())).unwrap()
    }

    #[tokio::test]
    async fn test_list_and_select_years() {
        let root = filings_root();
        let (status, body) = get(state_for(root.clone()), "/api/filings").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["filings"].as_array().unwrap().len(), 3);
        assert_eq!(body["data"]["years"], json!([2022, 2023]));

        let (_, body) = get(state_for(root.clone()), "/api/filings?tickers=aapl&years=2023").await;
        let filings = body["data"]["filings"].as_array().unwrap();
        assert_eq!(filings.len(), 1);
        assert_eq!(filings[0]["accession"], "0000320193-23-000106");
        assert!(filings[0].get("path").is_none());

        let (status, _) = get(state_for(root.clone()), "/api/filings?years=last").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_metrics_and_local_answer() {
        let root = filings_root();
        let state = state_for(root.clone());
        let filing = json!({ "ticker": "AAPL", "accession": "0000320193-23-000106" });

        let (status, body) = post_json(state.clone(), "/api/filings/metrics", filing.clone()).await;
        assert_eq!(status, StatusCode::OK);
        let metrics = &body["data"]["metrics"];
        assert_eq!(metrics["Total revenue"], "$383,285 million");
        assert_eq!(metrics["Net income"], "$96,995 million");
        assert_eq!(metrics["Total assets"], "$352,583 million");
        assert_eq!(metrics["Cash & equivalents"], "N/A");
        assert_eq!(state.filings.len(), 1);

        let (status, body) = post_json(
            state.clone(),
            "/api/filings/ask",
            json!({
                "ticker": "AAPL",
                "accession": "0000320193-23-000106",
                "question": "When does the fiscal year end?"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["answerer"], "local");
        assert_eq!(
            body["data"]["answer"],
            "Our fiscal year ends on the last Saturday of September."
        );
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_ticker_paths_are_rejected() {
        let root = filings_root();
        let (status, body) = post_json(
            state_for(root.clone()),
            "/api/filings/metrics",
            json!({ "ticker": "../AAPL", "accession": "0000320193-23-000106" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Select a filing");

        let (status, _) = get(state_for(root.clone()), "/api/filings?tickers=..%2FAAPL").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_unknown_filing_and_missing_openai_key() {
        let root = filings_root();
        let state = state_for(root.clone());

        let (status, _) = post_json(
            state.clone(),
            "/api/filings/metrics",
            json!({ "ticker": "AAPL", "accession": "0000320193-99-000001" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = post_json(
            state,
            "/api/filings/ask",
            json!({
                "ticker": "AAPL",
                "accession": "0000320193-23-000106",
                "question": "What was net income?",
                "answerer": "openai"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
        assert_eq!(body["error"], "No API key configured for OpenAI");
        std::fs::remove_dir_all(&root).unwrap();
    }
}
