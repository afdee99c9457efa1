use analysis_core::{stats, TRADING_DAYS};
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use quant_analysis::ReturnTable;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal as Gaussian;
use rayon::prelude::*;
use serde::Serialize;
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

use crate::{label_weights, AssetWeight, OptimizerError};

/// Objective value for weightings that cannot be scored
pub const PENALTY: f64 = 1e6;

#[derive(Debug, Clone)]
pub struct BayesianConfig {
    pub n_calls: usize,
    pub n_initial_points: usize,
    /// Random points scored by the acquisition function per step
    pub n_candidates: usize,
    pub seed: u64,
    pub length_scale: f64,
    pub jitter: f64,
    /// Exploration margin in Expected Improvement
    pub xi: f64,
}

impl Default for BayesianConfig {
    fn default() -> Self {
        Self {
            n_calls: 50,
            n_initial_points: 10,
            n_candidates: 2000,
            seed: 42,
            length_scale: 0.5,
            jitter: 1e-6,
            xi: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BayesianResult {
    pub weights: Vec<AssetWeight>,
    /// Best objective seen, the negated annual return / volatility ratio
    pub best_objective: f64,
    pub sharpe: Option<f64>,
    pub evaluations: Vec<f64>,
}

fn normalize(raw: &[f64]) -> Vec<f64> {
    let sum: f64 = raw.iter().sum();
    if sum == 0.0 {
        return raw.to_vec();
    }
    raw.iter().map(|w| w / sum).collect()
}

/// Negative annualized return over annualized volatility for raw weights.
pub fn sharpe_objective(returns: &ReturnTable, raw: &[f64]) -> f64 {
    let weights = normalize(raw);
    let port = returns.portfolio_returns(&weights);
    if port.is_empty() || port.iter().any(|r| r.is_nan()) {
        return PENALTY;
    }

    let growth: f64 = port.iter().map(|r| 1.0 + r).product();
    let annual_return = growth.powf(TRADING_DAYS / port.len() as f64) - 1.0;
    let annual_vol = match stats::std_dev(&port) {
        Some(sd) => sd * TRADING_DAYS.sqrt(),
        None => return PENALTY,
    };
    if annual_vol == 0.0 {
        return PENALTY;
    }

    let value = -annual_return / annual_vol;
    if value.is_finite() {
        value
    } else {
        PENALTY
    }
}

fn matern52(a: &[f64], b: &[f64], length_scale: f64) -> f64 {
    let dist = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt();
    let r = 5.0_f64.sqrt() * dist / length_scale;
    (1.0 + r + r * r / 3.0) * (-r).exp()
}

/// Zero-mean GP over standardized targets
struct GaussianProcess<'a> {
    xs: &'a [Vec<f64>],
    chol: Cholesky<f64, Dyn>,
    alpha: DVector<f64>,
    y_mean: f64,
    y_scale: f64,
    length_scale: f64,
}

impl<'a> GaussianProcess<'a> {
    fn fit(xs: &'a [Vec<f64>], ys: &[f64], length_scale: f64, jitter: f64) -> Result<Self, OptimizerError> {
        let n = xs.len();
        let y_mean = stats::mean(ys).unwrap_or(0.0);
        let y_scale = stats::std_dev(ys).filter(|s| *s > 0.0).unwrap_or(1.0);
        let y = DVector::from_iterator(n, ys.iter().map(|v| (v - y_mean) / y_scale));

        let k = DMatrix::from_fn(n, n, |i, j| {
            matern52(&xs[i], &xs[j], length_scale) + if i == j { jitter } else { 0.0 }
        });
        let chol = Cholesky::new(k).ok_or_else(|| {
            OptimizerError::Numerical("kernel matrix is not positive definite".to_string())
        })?;
        let alpha = chol.solve(&y);

        Ok(Self {
            xs,
            chol,
            alpha,
            y_mean,
            y_scale,
            length_scale,
        })
    }

    /// Posterior mean and standard deviation in objective units.
    fn predict(&self, x: &[f64]) -> (f64, f64) {
        let k_star = DVector::from_iterator(
            self.xs.len(),
            self.xs.iter().map(|xi| matern52(xi, x, self.length_scale)),
        );
        let mean = k_star.dot(&self.alpha);
        let v = self.chol.solve(&k_star);
        let var = (1.0 - k_star.dot(&v)).max(1e-12);
        (
            mean * self.y_scale + self.y_mean,
            var.sqrt() * self.y_scale,
        )
    }
}

fn expected_improvement(mean: f64, sd: f64, best: f64, xi: f64, normal: &Normal) -> f64 {
    let improvement = best - mean - xi;
    let z = improvement / sd;
    improvement * normal.cdf(z) + sd * normal.pdf(z)
}

/// Penalized points would swamp the standardized surrogate, so they are
/// capped just above the worst scorable value before fitting.
fn surrogate_targets(ys: &[f64]) -> Vec<f64> {
    let worst = ys
        .iter()
        .copied()
        .filter(|v| *v < PENALTY)
        .fold(f64::NEG_INFINITY, f64::max);
    let cap = if worst.is_finite() { worst + 1.0 } else { 1.0 };
    ys.iter().map(|v| v.min(cap)).collect()
}

fn propose(
    xs: &[Vec<f64>],
    ys: &[f64],
    dim: usize,
    config: &BayesianConfig,
    rng: &mut StdRng,
    normal: &Normal,
) -> Result<Vec<f64>, OptimizerError> {
    let targets = surrogate_targets(ys);
    let gp = GaussianProcess::fit(xs, &targets, config.length_scale, config.jitter)?;
    let best = targets.iter().copied().fold(f64::INFINITY, f64::min);
    let incumbent = &xs[ys
        .iter()
        .enumerate()
        .fold(0, |b, (i, v)| if *v < ys[b] { i } else { b })];

    // half global uniform samples, half local perturbations of the incumbent
    let local = Gaussian::new(0.0, 0.1).map_err(|e| OptimizerError::Numerical(e.to_string()))?;
    let candidates: Vec<Vec<f64>> = (0..config.n_candidates.max(1))
        .map(|i| {
            if i % 2 == 0 {
                (0..dim).map(|_| rng.gen::<f64>()).collect()
            } else {
                incumbent
                    .iter()
                    .map(|x| (x + rng.sample(local)).clamp(0.0, 1.0))
                    .collect()
            }
        })
        .collect();

    let scored: Vec<f64> = candidates
        .par_iter()
        .map(|c| {
            let (mean, sd) = gp.predict(c);
            expected_improvement(mean, sd, best, config.xi, normal)
        })
        .collect();

    let pick = scored
        .iter()
        .enumerate()
        .fold(0, |b, (i, v)| if *v > scored[b] { i } else { b });
    Ok(candidates[pick].clone())
}

/// Search raw weights in [0, 1]^n minimizing [`sharpe_objective`].
///
/// The first `n_initial_points` evaluations are uniform draws, the rest are
/// chosen by Expected Improvement under a Matérn 5/2 Gaussian process.
pub fn optimize(returns: &ReturnTable, config: &BayesianConfig) -> Result<BayesianResult, OptimizerError> {
    if returns.is_empty() || returns.len() < 2 {
        return Err(OptimizerError::InsufficientData);
    }
    if config.n_calls == 0 {
        return Err(OptimizerError::InvalidParameter(
            "n_calls must be positive".to_string(),
        ));
    }

    let dim = returns.n_assets();
    if dim == 1 {
        let value = sharpe_objective(returns, &[1.0]);
        return Ok(BayesianResult {
            weights: label_weights(returns.tickers(), &[1.0]),
            best_objective: value,
            sharpe: (value < PENALTY).then_some(-value),
            evaluations: vec![value],
        });
    }

    let normal = Normal::new(0.0, 1.0).map_err(|e| OptimizerError::Numerical(e.to_string()))?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut xs: Vec<Vec<f64>> = Vec::with_capacity(config.n_calls);
    let mut ys: Vec<f64> = Vec::with_capacity(config.n_calls);

    for call in 0..config.n_calls {
        let x = if call < config.n_initial_points.max(1) {
            (0..dim).map(|_| rng.gen::<f64>()).collect()
        } else {
            match propose(&xs, &ys, dim, config, &mut rng, &normal) {
                Ok(x) => x,
                Err(e) => {
                    tracing::warn!(error = %e, "surrogate fit failed, sampling at random");
                    (0..dim).map(|_| rng.gen::<f64>()).collect()
                }
            }
        };
        ys.push(sharpe_objective(returns, &x));
        xs.push(x);
    }

    let best_idx = ys
        .iter()
        .enumerate()
        .fold(0, |b, (i, v)| if *v < ys[b] { i } else { b });
    let best_objective = ys[best_idx];
    let mut weights = normalize(&xs[best_idx]);
    if weights.iter().sum::<f64>() == 0.0 {
        weights = vec![1.0 / dim as f64; dim];
    }

    tracing::debug!(calls = ys.len(), best_objective, "bayesian optimization finished");

    Ok(BayesianResult {
        weights: label_weights(returns.tickers(), &weights),
        best_objective,
        sharpe: (best_objective < PENALTY).then_some(-best_objective),
        evaluations: ys,
    })
}
