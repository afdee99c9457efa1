use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("Not enough data for optimization")]
    InsufficientData,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("No portfolios met weight constraints")]
    NoFeasiblePortfolio,

    #[error("Numerical error: {0}")]
    Numerical(String),
}
