use analysis_core::{AnalysisError, PricePoint, PriceSeries};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Wide price table: one row per date (union of all tickers), one column per ticker.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    tickers: Vec<String>,
    dates: Vec<NaiveDate>,
    /// `rows[d][t]` is the close of ticker `t` on `dates[d]`
    rows: Vec<Vec<Option<f64>>>,
}

/// Long ("melted") representation of a single cell
#[derive(Debug, Clone, Serialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub ticker: String,
    pub price: f64,
}

/// First/last price and percentage moves of one ticker over the range
#[derive(Debug, Clone, Serialize)]
pub struct TickerSummary {
    pub ticker: String,
    pub price_first: f64,
    pub price_end: f64,
    pub total_change: f64,
    pub daily_changes: Vec<f64>,
}

impl PriceTable {
    /// Pivot several series into a table; column order follows `series`.
    pub fn from_series(series: &[PriceSeries]) -> Self {
        let dates: Vec<NaiveDate> = series
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.date))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut rows = vec![vec![None; series.len()]; dates.len()];
        for (col, s) in series.iter().enumerate() {
            for p in &s.points {
                if let Some(&row) = index.get(&p.date) {
                    rows[row][col] = Some(p.close);
                }
            }
        }

        Self {
            tickers: series.iter().map(|s| s.ticker.clone()).collect(),
            dates,
            rows,
        }
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.tickers.is_empty()
    }

    /// Observed prices of one ticker, ascending by date.
    pub fn column(&self, ticker: &str) -> Vec<PricePoint> {
        let Some(col) = self.tickers.iter().position(|t| t == ticker) else {
            return Vec::new();
        };
        self.dates
            .iter()
            .zip(&self.rows)
            .filter_map(|(date, row)| row[col].map(|close| PricePoint { date: *date, close }))
            .collect()
    }

    /// Melted rows for charting, skipping missing cells.
    pub fn long_rows(&self) -> Vec<PriceRow> {
        let mut out = Vec::new();
        for (date, row) in self.dates.iter().zip(&self.rows) {
            for (ticker, cell) in self.tickers.iter().zip(row) {
                if let Some(price) = cell {
                    out.push(PriceRow {
                        date: *date,
                        ticker: ticker.clone(),
                        price: *price,
                    });
                }
            }
        }
        out
    }

    pub fn ticker_summaries(&self) -> Vec<TickerSummary> {
        self.tickers
            .iter()
            .filter_map(|ticker| {
                let closes: Vec<f64> = self.column(ticker).iter().map(|p| p.close).collect();
                let (&first, &end) = (closes.first()?, closes.last()?);
                Some(TickerSummary {
                    ticker: ticker.clone(),
                    price_first: first,
                    price_end: end,
                    total_change: if first != 0.0 { (end - first) / first } else { 0.0 },
                    daily_changes: analysis_core::stats::simple_returns(&closes),
                })
            })
            .collect()
    }

    /// Daily simple returns of every column.
    ///
    /// Gaps are forward-filled before differencing, so a missing day contributes
    /// a zero return; dates before every ticker has a first price are dropped,
    /// as is the first date.
    pub fn daily_returns(&self) -> ReturnTable {
        let mut filled: Vec<Option<f64>> = vec![None; self.tickers.len()];
        let mut dates = Vec::new();
        let mut rows = Vec::new();

        for (date, row) in self.dates.iter().zip(&self.rows) {
            let prev = filled.clone();
            for (slot, cell) in filled.iter_mut().zip(row) {
                if cell.is_some() {
                    *slot = *cell;
                }
            }

            let returns: Option<Vec<f64>> = prev
                .iter()
                .zip(&filled)
                .map(|(p, c)| match (p, c) {
                    (Some(p), Some(c)) if *p != 0.0 => Some(c / p - 1.0),
                    _ => None,
                })
                .collect();

            if let Some(returns) = returns {
                dates.push(*date);
                rows.push(returns);
            }
        }

        ReturnTable {
            tickers: self.tickers.clone(),
            dates,
            rows,
        }
    }
}

/// Daily simple returns, complete rows only.
#[derive(Debug, Clone, Default)]
pub struct ReturnTable {
    tickers: Vec<String>,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<f64>>,
}

impl ReturnTable {
    pub fn new(
        tickers: Vec<String>,
        dates: Vec<NaiveDate>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, AnalysisError> {
        if dates.len() != rows.len() {
            return Err(AnalysisError::InvalidData(format!(
                "{} dates for {} return rows",
                dates.len(),
                rows.len()
            )));
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != tickers.len()) {
            return Err(AnalysisError::InvalidData(format!(
                "return row has {} columns, expected {}",
                bad.len(),
                tickers.len()
            )));
        }
        Ok(Self { tickers, dates, rows })
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn n_assets(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.tickers.is_empty()
    }

    pub fn column(&self, idx: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[idx]).collect()
    }

    /// Weighted sum of each row. `weights` follows column order.
    pub fn portfolio_returns(&self, weights: &[f64]) -> Vec<f64> {
        self.rows
            .iter()
            .map(|r| r.iter().zip(weights).map(|(x, w)| x * w).sum())
            .collect()
    }
}
