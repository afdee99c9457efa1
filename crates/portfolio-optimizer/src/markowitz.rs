use analysis_core::TRADING_DAYS;
use nalgebra::{DMatrix, DVector};
use quant_analysis::ReturnTable;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Exp1};
use rayon::prelude::*;
use serde::Serialize;

use crate::{label_weights, OptimizerError};

/// Candidates drawn per rayon task
const CHUNK_SIZE: usize = 256;
/// Attempt budget as a multiple of the requested portfolio count
const ATTEMPT_FACTOR: usize = 10;

#[derive(Debug, Clone)]
pub struct MarkowitzConfig {
    pub num_portfolios: usize,
    pub risk_free_rate: f64,
    pub min_weight: f64,
    pub max_weight: f64,
    /// Fixed seed for reproducible frontiers; random when `None`
    pub seed: Option<u64>,
}

impl Default for MarkowitzConfig {
    fn default() -> Self {
        Self {
            num_portfolios: 5000,
            risk_free_rate: 0.0,
            min_weight: 0.0,
            max_weight: 1.0,
            seed: None,
        }
    }
}

impl MarkowitzConfig {
    fn validate(&self) -> Result<(), OptimizerError> {
        if self.num_portfolios == 0 {
            return Err(OptimizerError::InvalidParameter(
                "num_portfolios must be positive".to_string(),
            ));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(OptimizerError::InvalidParameter(
                "risk_free_rate must be finite".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_weight)
            || !(0.0..=1.0).contains(&self.max_weight)
            || self.min_weight > self.max_weight
        {
            return Err(OptimizerError::InvalidParameter(format!(
                "weight bounds [{}, {}] must satisfy 0 <= min <= max <= 1",
                self.min_weight, self.max_weight
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetWeight {
    pub ticker: String,
    pub weight: f64,
    pub weight_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulatedPortfolio {
    #[serde(rename = "return")]
    pub ret: f64,
    pub volatility: f64,
    pub sharpe: Option<f64>,
    pub weights: Vec<f64>,
}

/// Cloud of accepted random portfolios
#[derive(Debug, Clone, Serialize)]
pub struct Frontier {
    pub tickers: Vec<String>,
    pub portfolios: Vec<SimulatedPortfolio>,
    pub attempts: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioPick {
    #[serde(rename = "return")]
    pub ret: f64,
    pub volatility: f64,
    pub sharpe: Option<f64>,
    pub weights: Vec<AssetWeight>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrontierSummary {
    pub max_sharpe: PortfolioPick,
    pub min_volatility: PortfolioPick,
}

impl Frontier {
    /// Highest Sharpe ratio; portfolios without one are skipped, ties keep the first.
    pub fn max_sharpe(&self) -> Option<&SimulatedPortfolio> {
        self.portfolios
            .iter()
            .filter(|p| p.sharpe.is_some())
            .fold(None, |best: Option<&SimulatedPortfolio>, p| match best {
                Some(b) if b.sharpe >= p.sharpe => Some(b),
                _ => Some(p),
            })
    }

    pub fn min_volatility(&self) -> Option<&SimulatedPortfolio> {
        self.portfolios.iter().fold(None, |best, p| match best {
            Some(b) if b.volatility <= p.volatility => Some(b),
            _ => Some(p),
        })
    }

    pub fn pick(&self, portfolio: &SimulatedPortfolio) -> PortfolioPick {
        PortfolioPick {
            ret: portfolio.ret,
            volatility: portfolio.volatility,
            sharpe: portfolio.sharpe,
            weights: label_weights(&self.tickers, &portfolio.weights),
        }
    }

    pub fn summary(&self) -> Result<FrontierSummary, OptimizerError> {
        let min_vol = self
            .min_volatility()
            .ok_or(OptimizerError::NoFeasiblePortfolio)?;
        // every volatility can be zero, fall back to the least volatile pick
        let max_sharpe = self.max_sharpe().unwrap_or(min_vol);
        Ok(FrontierSummary {
            max_sharpe: self.pick(max_sharpe),
            min_volatility: self.pick(min_vol),
        })
    }
}

/// Annualized mean vector and sample covariance matrix of the return table.
pub fn annualized_moments(returns: &ReturnTable) -> (DVector<f64>, DMatrix<f64>) {
    let n = returns.n_assets();
    let t = returns.len();
    let flat: Vec<f64> = returns.rows().iter().flatten().copied().collect();
    let data = DMatrix::from_row_slice(t, n, &flat);

    let means = DVector::from_iterator(n, data.column_iter().map(|c| c.mean()));
    let mut centered = data;
    for (j, mut col) in centered.column_iter_mut().enumerate() {
        col.add_scalar_mut(-means[j]);
    }
    let denom = (t.max(2) - 1) as f64;
    let cov = centered.transpose() * &centered / denom;

    (means * TRADING_DAYS, cov * TRADING_DAYS)
}

fn random_weights(n: usize, rng: &mut StdRng) -> Vec<f64> {
    let raw: Vec<f64> = (0..n).map(|_| Exp1.sample(rng)).collect();
    let sum: f64 = raw.iter().sum();
    raw.iter().map(|v| v / sum).collect()
}

fn chunk_seed(base: u64, chunk: usize) -> u64 {
    base.wrapping_add((chunk as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Monte-Carlo frontier: Dirichlet draws kept only inside the weight bounds.
///
/// Candidates are evaluated in parallel batches. Each chunk gets its own
/// seeded generator, so a fixed seed reproduces the same frontier regardless
/// of thread count.
pub fn simulate(returns: &ReturnTable, config: &MarkowitzConfig) -> Result<Frontier, OptimizerError> {
    config.validate()?;
    if returns.n_assets() == 0 || returns.len() < 2 {
        return Err(OptimizerError::InsufficientData);
    }

    let n = returns.n_assets();
    let (mu, sigma) = annualized_moments(returns);
    let (mu, sigma) = (&mu, &sigma);
    let base_seed = config.seed.unwrap_or_else(rand::random);
    let target = config.num_portfolios;
    let budget = target * ATTEMPT_FACTOR;

    let mut portfolios: Vec<SimulatedPortfolio> = Vec::with_capacity(target);
    let mut attempts = 0usize;
    let mut next_chunk = 0usize;

    while portfolios.len() < target && attempts < budget {
        let round = target.min(budget - attempts);
        let chunks = round.div_ceil(CHUNK_SIZE);
        let first_chunk = next_chunk;

        let accepted: Vec<SimulatedPortfolio> = (0..chunks)
            .into_par_iter()
            .flat_map_iter(|c| {
                let size = CHUNK_SIZE.min(round - c * CHUNK_SIZE);
                let mut rng = StdRng::seed_from_u64(chunk_seed(base_seed, first_chunk + c));
                (0..size).filter_map(move |_| {
                    let w = random_weights(n, &mut rng);
                    if w
                        .iter()
                        .any(|x| *x < config.min_weight || *x > config.max_weight)
                    {
                        return None;
                    }
                    let wv = DVector::from_column_slice(&w);
                    let ret = wv.dot(mu);
                    let volatility = (wv.transpose() * sigma * &wv)[(0, 0)].max(0.0).sqrt();
                    let sharpe = if volatility != 0.0 {
                        Some((ret - config.risk_free_rate) / volatility)
                    } else {
                        None
                    };
                    Some(SimulatedPortfolio {
                        ret,
                        volatility,
                        sharpe,
                        weights: w,
                    })
                })
            })
            .collect();

        attempts += round;
        next_chunk += chunks;
        portfolios.extend(accepted);
    }
    portfolios.truncate(target);

    tracing::debug!(
        accepted = portfolios.len(),
        attempts,
        "markowitz simulation finished"
    );

    if portfolios.is_empty() {
        return Err(OptimizerError::NoFeasiblePortfolio);
    }

    Ok(Frontier {
        tickers: returns.tickers().to_vec(),
        portfolios,
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn table(rows: Vec<Vec<f64>>, tickers: &[&str]) -> ReturnTable {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let dates = (0..rows.len())
            .map(|i| start + Duration::days(i as i64))
            .collect();
        ReturnTable::new(tickers.iter().map(|t| t.to_string()).collect(), dates, rows).unwrap()
    }

    fn sample_table() -> ReturnTable {
        let rows = (0..60)
            .map(|i| {
                let x = i as f64;
                vec![
                    0.001 + 0.01 * (x * 0.7).sin(),
                    0.0005 + 0.02 * (x * 1.3).cos(),
                    0.0008 + 0.005 * (x * 0.4).sin(),
                ]
            })
            .collect();
        table(rows, &["AAA", "BBB", "CCC"])
    }

    #[test]
    fn test_annualized_moments() {
        let t = table(vec![vec![0.01, 0.02], vec![0.03, 0.0]], &["A", "B"]);
        let (mu, sigma) = annualized_moments(&t);
        assert!((mu[0] - 0.02 * 252.0).abs() < 1e-12);
        assert!((mu[1] - 0.01 * 252.0).abs() < 1e-12);
        // var([0.01, 0.03]) = 0.0002, cov = -0.0002
        assert!((sigma[(0, 0)] - 0.0002 * 252.0).abs() < 1e-12);
        assert!((sigma[(0, 1)] + 0.0002 * 252.0).abs() < 1e-12);
        assert!((sigma[(1, 0)] - sigma[(0, 1)]).abs() < 1e-15);
    }

    #[test]
    fn test_weights_sum_to_one_and_respect_bounds() {
        let config = MarkowitzConfig {
            num_portfolios: 500,
            min_weight: 0.1,
            max_weight: 0.6,
            seed: Some(7),
            ..Default::default()
        };
        let frontier = simulate(&sample_table(), &config).unwrap();
        assert!(!frontier.portfolios.is_empty());
        assert!(frontier.portfolios.len() <= 500);
        assert!(frontier.attempts <= 5000);
        for p in &frontier.portfolios {
            let sum: f64 = p.weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
            assert!(p.weights.iter().all(|w| (0.1..=0.6).contains(w)));
            assert!(p.volatility > 0.0);
        }
    }

    #[test]
    fn test_seed_reproduces_frontier() {
        let config = MarkowitzConfig {
            num_portfolios: 300,
            seed: Some(42),
            ..Default::default()
        };
        let a = simulate(&sample_table(), &config).unwrap();
        let b = simulate(&sample_table(), &config).unwrap();
        assert_eq!(a.portfolios.len(), 300);
        assert_eq!(a.portfolios[17].weights, b.portfolios[17].weights);
    }

    #[test]
    fn test_infeasible_bounds_yield_error() {
        // three assets can never all sit at or above 0.5
        let config = MarkowitzConfig {
            num_portfolios: 100,
            min_weight: 0.5,
            max_weight: 1.0,
            seed: Some(1),
            ..Default::default()
        };
        let err = simulate(&sample_table(), &config).unwrap_err();
        assert_eq!(err.to_string(), "No portfolios met weight constraints");
    }

    #[test]
    fn test_summary_picks_extremes() {
        let config = MarkowitzConfig {
            num_portfolios: 400,
            risk_free_rate: 0.02,
            seed: Some(3),
            ..Default::default()
        };
        let frontier = simulate(&sample_table(), &config).unwrap();
        let summary = frontier.summary().unwrap();

        let best = frontier
            .portfolios
            .iter()
            .filter_map(|p| p.sharpe)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(summary.max_sharpe.sharpe, Some(best));

        let lowest = frontier
            .portfolios
            .iter()
            .map(|p| p.volatility)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(summary.min_volatility.volatility, lowest);
        assert_eq!(summary.min_volatility.weights.len(), 3);
        assert_eq!(summary.min_volatility.weights[0].ticker, "AAA");
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let config = MarkowitzConfig {
            min_weight: 0.7,
            max_weight: 0.2,
            ..Default::default()
        };
        assert!(matches!(
            simulate(&sample_table(), &config),
            Err(OptimizerError::InvalidParameter(_))
        ));
    }
}
