//! Descriptive statistics shared by the analytics crates.
//!
//! Conventions follow the dataframe tooling most dashboards are prototyped in:
//! `std_dev` and `covariance` are sample estimates (n - 1), `percentile` uses
//! linear interpolation between closest ranks, and everything returns `None`
//! instead of NaN when the input cannot support the statistic.

use statrs::statistics::Statistics;

/// `None` for the NaN statrs returns on empty or too-short input.
fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> Option<f64> {
    finite(data.mean())
}

/// Sample standard deviation (n - 1).
pub fn std_dev(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    finite(data.std_dev())
}

/// Sample variance (n - 1).
pub fn sample_variance(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    finite(data.variance())
}

/// Population variance (n).
pub fn population_variance(data: &[f64]) -> Option<f64> {
    finite(data.population_variance())
}

/// Sample covariance (n - 1) of two equally long series.
pub fn covariance(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    finite(a.covariance(b))
}

/// Pearson correlation. `None` when either side has no variance.
pub fn correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    let cov = covariance(a, b)?;
    let sa = std_dev(a)?;
    let sb = std_dev(b)?;
    if sa < f64::EPSILON || sb < f64::EPSILON {
        return None;
    }
    Some(cov / (sa * sb))
}

/// Percentile (0-100 scale) with linear interpolation between closest ranks.
pub fn percentile(data: &[f64], pct: f64) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Running product of `1 + r`.
pub fn cumulative_growth(returns: &[f64]) -> Vec<f64> {
    let mut acc = 1.0;
    returns
        .iter()
        .map(|r| {
            acc *= 1.0 + r;
            acc
        })
        .collect()
}

/// Running maximum of a series.
pub fn running_max(values: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    values
        .iter()
        .map(|&v| {
            if v > peak {
                peak = v;
            }
            peak
        })
        .collect()
}

/// Simple returns between consecutive values. A zero base yields no entry.
pub fn simple_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter_map(|w| if w[0] != 0.0 { Some(w[1] / w[0] - 1.0) } else { None })
        .collect()
}
