use analysis_core::{stats, AnalysisError, PricePoint, TRADING_DAYS};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::table::{PriceTable, ReturnTable};

/// Value of one ticker's allocation on one date
#[derive(Debug, Clone, Serialize)]
pub struct GrowthPoint {
    pub date: NaiveDate,
    pub ticker: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrowthSimulation {
    pub points: Vec<GrowthPoint>,
    /// Sum over tickers per date
    pub totals: Vec<(NaiveDate, f64)>,
    pub total_invested: f64,
}

/// Grow each dollar allocation with its ticker's price relative to the first
/// observed price: `value_t = allocation * (1 + (p_t - p_0) / p_0)`.
pub fn simulate_growth(table: &PriceTable, allocations: &HashMap<String, f64>) -> GrowthSimulation {
    let mut points = Vec::new();
    let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for ticker in table.tickers() {
        let amount = allocations.get(ticker).copied().unwrap_or(0.0);
        let column = table.column(ticker);
        let Some(base) = column.first().map(|p| p.close).filter(|b| *b != 0.0) else {
            continue;
        };
        for p in column {
            let value = amount * (1.0 + (p.close - base) / base);
            *totals.entry(p.date).or_insert(0.0) += value;
            points.push(GrowthPoint {
                date: p.date,
                ticker: ticker.clone(),
                value,
            });
        }
    }

    GrowthSimulation {
        points,
        totals: totals.into_iter().collect(),
        total_invested: table
            .tickers()
            .iter()
            .filter_map(|t| allocations.get(t))
            .sum(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkComparison {
    pub common_days: usize,
    pub beta: Option<f64>,
    pub r_squared: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub weights: Vec<(String, f64)>,
    pub trading_days: usize,
    pub annual_return: f64,
    pub annual_volatility: Option<f64>,
    pub sharpe: Option<f64>,
    pub sortino: Option<f64>,
    pub calmar: Option<f64>,
    pub max_drawdown: f64,
    pub var_95: f64,
    pub cvar_95: f64,
    pub benchmark: Option<BenchmarkComparison>,
    pub cumulative: Vec<(NaiveDate, f64)>,
    pub drawdown: Vec<(NaiveDate, f64)>,
}

/// Portfolio risk/return metrics for dollar allocations over a return table.
///
/// Sharpe, Sortino and Calmar use the annual return as numerator with no
/// risk-free adjustment, matching how the dashboard presents them.
pub fn evaluate(
    returns: &ReturnTable,
    allocations: &HashMap<String, f64>,
    benchmark: Option<&[PricePoint]>,
) -> Result<PerformanceReport, AnalysisError> {
    if returns.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "Not enough data to compute metrics".to_string(),
        ));
    }

    let total: f64 = allocations.values().sum();
    if total <= 0.0 {
        return Err(AnalysisError::InvalidData(
            "Enter at least one positive investment amount".to_string(),
        ));
    }

    let weights: Vec<f64> = returns
        .tickers()
        .iter()
        .map(|t| allocations.get(t).copied().unwrap_or(0.0) / total)
        .collect();
    let port = returns.portfolio_returns(&weights);
    let n = port.len() as f64;

    let cumulative = stats::cumulative_growth(&port);
    let final_growth = cumulative.last().copied().unwrap_or(1.0);
    let annual_return = final_growth.powf(TRADING_DAYS / n) - 1.0;

    let annual_volatility = stats::std_dev(&port).map(|sd| sd * TRADING_DAYS.sqrt());
    let sharpe = annual_volatility
        .filter(|v| *v > 0.0)
        .map(|v| annual_return / v);

    let downside: Vec<f64> = port.iter().copied().filter(|r| *r < 0.0).collect();
    let sortino = stats::std_dev(&downside)
        .map(|sd| sd * TRADING_DAYS.sqrt())
        .filter(|d| *d > 0.0)
        .map(|d| annual_return / d);

    let peaks = stats::running_max(&cumulative);
    let drawdown: Vec<f64> = cumulative
        .iter()
        .zip(&peaks)
        .map(|(c, p)| (c - p) / p)
        .collect();
    let max_drawdown = drawdown.iter().copied().fold(0.0_f64, f64::min);
    let calmar = if max_drawdown != 0.0 {
        Some(annual_return / max_drawdown.abs())
    } else {
        None
    };

    let var_95 = stats::percentile(&port, 5.0).unwrap_or(0.0);
    let tail: Vec<f64> = port.iter().copied().filter(|r| *r <= var_95).collect();
    let cvar_95 = stats::mean(&tail).unwrap_or(var_95);

    let benchmark = benchmark.map(|prices| compare_to_benchmark(returns.dates(), &port, prices));

    let dates = returns.dates();
    Ok(PerformanceReport {
        weights: returns.tickers().iter().cloned().zip(weights).collect(),
        trading_days: port.len(),
        annual_return,
        annual_volatility,
        sharpe,
        sortino,
        calmar,
        max_drawdown,
        var_95,
        cvar_95,
        benchmark,
        cumulative: dates.iter().copied().zip(cumulative).collect(),
        drawdown: dates.iter().copied().zip(drawdown).collect(),
    })
}

/// Beta and R² of portfolio returns against benchmark returns on common dates.
fn compare_to_benchmark(
    dates: &[NaiveDate],
    port: &[f64],
    prices: &[PricePoint],
) -> BenchmarkComparison {
    let bench: HashMap<NaiveDate, f64> = prices
        .windows(2)
        .filter(|w| w[0].close != 0.0)
        .map(|w| (w[1].date, w[1].close / w[0].close - 1.0))
        .collect();

    let (p, b): (Vec<f64>, Vec<f64>) = dates
        .iter()
        .zip(port)
        .filter_map(|(d, r)| bench.get(d).map(|br| (*r, *br)))
        .unzip();

    let beta = match (stats::covariance(&p, &b), stats::sample_variance(&b)) {
        (Some(cov), Some(var)) if var > 0.0 => Some(cov / var),
        _ => None,
    };
    let r_squared = stats::correlation(&p, &b).map(|c| c * c);

    tracing::debug!(common_days = p.len(), ?beta, "benchmark comparison");
    BenchmarkComparison {
        common_days: p.len(),
        beta,
        r_squared,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::PriceSeries;
    use chrono::Duration;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn series(ticker: &str, closes: &[f64]) -> PriceSeries {
        PriceSeries::new(
            ticker,
            closes
                .iter()
                .enumerate()
                .map(|(i, c)| PricePoint {
                    date: start() + Duration::days(i as i64),
                    close: *c,
                })
                .collect(),
        )
    }

    fn allocations(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(t, a)| (t.to_string(), *a)).collect()
    }

    #[test]
    fn test_growth_simulation() {
        let table = PriceTable::from_series(&[
            series("AAA", &[10.0, 12.0, 15.0]),
            series("BBB", &[20.0, 10.0, 20.0]),
        ]);
        let sim = simulate_growth(&table, &allocations(&[("AAA", 100.0), ("BBB", 50.0)]));
        assert_eq!(sim.points.len(), 6);
        assert_eq!(sim.total_invested, 150.0);
        let last = sim.totals.last().unwrap().1;
        // AAA: 100 * 1.5, BBB: 50 * 1.0
        assert!((last - 200.0).abs() < 1e-9);
        let mid = sim.totals[1].1;
        assert!((mid - (120.0 + 25.0)).abs() < 1e-9);
    }

    #[test]
    fn test_zero_allocation_is_rejected() {
        let table = PriceTable::from_series(&[series("AAA", &[10.0, 11.0, 12.0])]);
        let err = evaluate(&table.daily_returns(), &allocations(&[("AAA", 0.0)]), None);
        assert!(matches!(err, Err(AnalysisError::InvalidData(_))));
    }

    #[test]
    fn test_metrics_for_known_path() {
        // returns: +10%, -10%, +10%, -5%, +10%
        let closes = [100.0, 110.0, 99.0, 108.9, 103.455, 113.8005];
        let table = PriceTable::from_series(&[series("AAA", &closes)]);
        let report = evaluate(&table.daily_returns(), &allocations(&[("AAA", 1000.0)]), None).unwrap();

        assert_eq!(report.trading_days, 5);
        let growth: f64 = 113.8005 / 100.0;
        let expected_annual = growth.powf(252.0 / 5.0) - 1.0;
        assert!((report.annual_return - expected_annual).abs() < 1e-6);

        // peak 1.1, trough 0.99 -> -10%
        assert!((report.max_drawdown + 0.1).abs() < 1e-9);
        let calmar = report.calmar.unwrap();
        assert!((calmar - report.annual_return / 0.1).abs() < 1e-6);

        // sorted [-0.1, -0.05, 0.1, 0.1, 0.1]: rank 0.2 -> -0.1 + 0.2 * 0.05
        assert!((report.var_95 + 0.09).abs() < 1e-9);
        assert!((report.cvar_95 + 0.1).abs() < 1e-9);

        let downside_dev = (0.05_f64.powi(2) / 2.0).sqrt() * 252.0_f64.sqrt();
        assert!((report.sortino.unwrap() - report.annual_return / downside_dev).abs() < 1e-6);
        assert!(report.sharpe.unwrap() > 0.0);
        assert!(report.benchmark.is_none());
    }

    #[test]
    fn test_weights_follow_allocations() {
        let table = PriceTable::from_series(&[
            series("AAA", &[10.0, 11.0, 12.0]),
            series("BBB", &[10.0, 10.0, 10.0]),
        ]);
        let report = evaluate(
            &table.daily_returns(),
            &allocations(&[("AAA", 300.0), ("BBB", 100.0)]),
            None,
        )
        .unwrap();
        assert_eq!(report.weights[0], ("AAA".to_string(), 0.75));
        assert_eq!(report.weights[1], ("BBB".to_string(), 0.25));
    }

    #[test]
    fn test_beta_against_scaled_benchmark() {
        let bench_closes = [100.0, 101.0, 99.0, 102.0, 100.0, 103.0];
        // portfolio moves exactly twice the benchmark each day
        let mut closes = vec![50.0];
        for w in bench_closes.windows(2) {
            let r = w[1] / w[0] - 1.0;
            let last = *closes.last().unwrap();
            closes.push(last * (1.0 + 2.0 * r));
        }
        let table = PriceTable::from_series(&[series("AAA", &closes)]);
        let bench = series("SPY", &bench_closes);

        let report = evaluate(
            &table.daily_returns(),
            &allocations(&[("AAA", 1.0)]),
            Some(&bench.points),
        )
        .unwrap();
        let cmp = report.benchmark.unwrap();
        assert_eq!(cmp.common_days, 5);
        assert!((cmp.beta.unwrap() - 2.0).abs() < 1e-9);
        assert!((cmp.r_squared.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_beta_uses_common_dates_only() {
        let dates: Vec<NaiveDate> = (1..=4).map(|i| start() + Duration::days(i)).collect();
        let port = [0.01, 0.03, -0.02, 0.02];
        // benchmark returns 1%, 2%, -1%, 0% on the portfolio dates plus a jump
        // on a later date the portfolio does not cover
        let bench = series("SPY", &[100.0, 101.0, 103.02, 101.9898, 101.9898, 120.0]);

        let cmp = compare_to_benchmark(&dates, &port, &bench.points);
        assert_eq!(cmp.common_days, 4);
        // cross deviations 0.0007, benchmark deviations 0.0005
        assert!((cmp.beta.unwrap() - 1.4).abs() < 1e-6);
        // 0.0007^2 / (0.0005 * 0.0014)
        assert!((cmp.r_squared.unwrap() - 0.7).abs() < 1e-6);
    }
}
