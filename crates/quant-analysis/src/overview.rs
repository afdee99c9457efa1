use analysis_core::{stats, PricePoint, TRADING_DAYS};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Optional indicators a client can ask for on top of the core snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverviewExtra {
    #[serde(rename = "20-Day SMA")]
    Sma20,
    #[serde(rename = "200-Day SMA")]
    Sma200,
    #[serde(rename = "Annualized Volatility")]
    AnnualizedVolatility,
    #[serde(rename = "Cumulative Return")]
    CumulativeReturn,
}

/// Compact per-ticker metrics shown next to the price chart
#[derive(Debug, Clone, Default, Serialize)]
pub struct StockSnapshot {
    pub ticker: String,
    pub no_data: bool,
    pub last_price: Option<f64>,
    pub avg_50d: Option<f64>,
    pub low_1y: Option<f64>,
    pub high_1y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma_20: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma_200: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annualized_volatility: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cumulative_return: Option<f64>,
}

/// Mean of the last `window` values, `None` until the window is full.
fn trailing_mean(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }
    Some(values[values.len() - window..].mean())
}

fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

pub fn snapshot(ticker: &str, prices: &[PricePoint], extras: &[OverviewExtra]) -> StockSnapshot {
    if prices.is_empty() {
        return StockSnapshot {
            ticker: ticker.to_string(),
            no_data: true,
            ..Default::default()
        };
    }

    let closes: Vec<f64> = prices.iter().map(|p| p.close).collect();
    let year = tail(&closes, 365);

    let mut snap = StockSnapshot {
        ticker: ticker.to_string(),
        no_data: false,
        last_price: closes.last().copied(),
        avg_50d: trailing_mean(&closes, 50),
        low_1y: Some(Statistics::min(year)),
        high_1y: Some(Statistics::max(year)),
        ..Default::default()
    };

    for extra in extras {
        match extra {
            OverviewExtra::Sma20 => snap.sma_20 = trailing_mean(&closes, 20),
            OverviewExtra::Sma200 => snap.sma_200 = trailing_mean(&closes, 200),
            OverviewExtra::AnnualizedVolatility => {
                let returns = stats::simple_returns(&closes);
                snap.annualized_volatility =
                    stats::std_dev(&returns).map(|sd| sd * TRADING_DAYS.sqrt());
            }
            OverviewExtra::CumulativeReturn => {
                let first = closes[0];
                snap.cumulative_return = closes
                    .last()
                    .filter(|_| first != 0.0)
                    .map(|last| last / first - 1.0);
            }
        }
    }

    snap
}
