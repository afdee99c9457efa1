use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Filing not found: {0}")]
    NotFound(String),

    #[error("Unsupported document: {0}")]
    Unsupported(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No API key configured for {0}")]
    MissingApiKey(&'static str),
}

pub type FilingResult<T> = Result<T, FilingError>;
