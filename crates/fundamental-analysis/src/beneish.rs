use serde::Serialize;

use crate::ratios::FraudFeatures;

/// M-Scores above this line suggest earnings manipulation
pub const MANIPULATION_THRESHOLD: f64 = -2.22;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BeneishScore {
    pub m_score: f64,
    pub flagged: bool,
}

/// Seven-variable Beneish M-Score (the leverage index is left out).
pub fn beneish(f: &FraudFeatures) -> BeneishScore {
    let m_score = -4.84 + 0.92 * f.dsri + 0.528 * f.gmi + 0.404 * f.aqi + 0.892 * f.sgi
        + 0.115 * f.depi
        - 0.172 * f.sgai
        + 4.679 * f.tata;
    BeneishScore {
        m_score,
        flagged: m_score > MANIPULATION_THRESHOLD,
    }
}
