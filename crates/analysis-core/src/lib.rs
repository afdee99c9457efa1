pub mod error;
pub mod stats;
pub mod traits;
pub mod types;

pub use error::*;
pub use traits::*;
pub use types::*;

/// Trading days per year used for every annualization in the workspace.
pub const TRADING_DAYS: f64 = 252.0;
