//! Company fundamentals: the key-statistics table and the fraud screens
//! (ratio features, Beneish M-Score, Piotroski F-Score and a tree model
//! with SHAP explanations).

pub mod beneish;
pub mod glossary;
pub mod key_stats;
pub mod model;
pub mod piotroski;
pub mod ratios;
pub mod screener;

pub use beneish::{beneish, BeneishScore};
pub use glossary::{GlossaryEntry, FEATURE_GLOSSARY};
pub use key_stats::{format_billions, key_stats, KeyStatsEntry, KeyStatsRow};
pub use model::{Explanation, FeatureImpact, ModelError, TreeEnsemble};
pub use piotroski::{piotroski, PiotroskiScore};
pub use ratios::{FraudFeatures, FEATURE_NAMES};
pub use screener::{FraudMethod, FraudReport, FraudScreener};
