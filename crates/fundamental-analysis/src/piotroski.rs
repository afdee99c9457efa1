use serde::Serialize;

use crate::ratios::FraudFeatures;

/// Scores at or below this are considered weak
pub const WEAK_THRESHOLD: u8 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct PiotroskiSignal {
    pub name: &'static str,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PiotroskiScore {
    pub f_score: u8,
    pub flagged: bool,
    pub signals: Vec<PiotroskiSignal>,
}

/// Nine-point Piotroski F-Score from year-over-year ratios.
pub fn piotroski(f: &FraudFeatures) -> PiotroskiScore {
    let signals = vec![
        ("Positive ROA", f.roa > 0.0),
        ("Positive operating cash flow", f.cfo > 0.0),
        ("ROA improved", f.roa - f.prev_roa > 0.0),
        ("Cash flow exceeds ROA", f.cfo > f.roa),
        ("Leverage decreased", f.leverage < f.prev_leverage),
        ("Current ratio improved", f.curr_ratio > f.prev_cr),
        ("Gross margin improved", f.gross_margin - f.prev_gm > 0.0),
        ("Asset turnover improved", f.asset_turn - f.prev_at > 0.0),
        ("No new shares issued", f.shares <= f.prev_shares),
    ];

    let f_score = signals.iter().filter(|(_, passed)| *passed).count() as u8;
    PiotroskiScore {
        f_score,
        flagged: f_score <= WEAK_THRESHOLD,
        signals: signals
            .into_iter()
            .map(|(name, passed)| PiotroskiSignal { name, passed })
            .collect(),
    }
}
