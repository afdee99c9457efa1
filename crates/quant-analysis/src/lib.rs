//! Return and risk analytics over daily closing prices.
//!
//! Everything here is synchronous and pure: callers fetch prices through a
//! `MarketDataProvider`, build a [`PriceTable`], and derive overview snapshots,
//! simulated growth, or performance metrics from it.

pub mod overview;
pub mod performance;
pub mod table;

pub use overview::{snapshot, OverviewExtra, StockSnapshot};
pub use performance::{
    evaluate, simulate_growth, BenchmarkComparison, GrowthPoint, GrowthSimulation,
    PerformanceReport,
};
pub use table::{PriceRow, PriceTable, ReturnTable, TickerSummary};
