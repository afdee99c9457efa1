pub mod bayesian;
pub mod error;
pub mod markowitz;

pub use bayesian::{optimize as bayesian_optimize, sharpe_objective, BayesianConfig, BayesianResult};
pub use error::OptimizerError;
pub use markowitz::{
    simulate as markowitz_simulate, AssetWeight, Frontier, FrontierSummary, MarkowitzConfig,
    PortfolioPick, SimulatedPortfolio,
};

/// Pair weights with tickers, adding a percent figure rounded to 2 decimals.
pub fn label_weights(tickers: &[String], weights: &[f64]) -> Vec<AssetWeight> {
    tickers
        .iter()
        .zip(weights)
        .map(|(ticker, &weight)| AssetWeight {
            ticker: ticker.clone(),
            weight,
            weight_pct: (weight * 10_000.0).round() / 100.0,
        })
        .collect()
}
