use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Characters allowed between a label and its figure
const WINDOW_CHARS: usize = 50;
const NOT_AVAILABLE: &str = "N/A";

/// Optional `$`, 1-3 digits, thousands groups, decimals and a unit word.
const DOLLAR: &str = r"\$?\s?[0-9]{1,3}(?:,[0-9]{3})+(?:\.[0-9]+)?\s?(?:million|billion)?";

const TOTAL_REVENUE: &str = r"total\s+revenue";
const NET_INCOME: &str = r"net\s+income";
const TOTAL_ASSETS: &str = r"total\s+assets";
const TOTAL_LIABILITIES: &str = r"total\s+liabilit";
const SHAREHOLDERS_EQUITY: &str = r"shareholders.? equity";
const CASH_EQUIVALENTS: &str = r"cash\s+and\s+cash\s+equivalents";

/// Label followed by the nearest figure in the window. The lazy window picks
/// the leftmost figure and `[^$]` stops it at the next dollar sign.
fn figure_pattern(label: &str) -> Regex {
    let pattern = format!(r"(?i){label}[^$]{{0,{WINDOW_CHARS}}}?({DOLLAR})");
    Regex::new(&pattern).expect("headline figure pattern")
}

static PATTERNS: LazyLock<[Regex; 6]> = LazyLock::new(|| {
    [
        TOTAL_REVENUE,
        NET_INCOME,
        TOTAL_ASSETS,
        TOTAL_LIABILITIES,
        SHAREHOLDERS_EQUITY,
        CASH_EQUIVALENTS,
    ]
    .map(figure_pattern)
});

/// Headline dollar figures quoted in a 10-K, as written in the filing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadlineMetrics {
    #[serde(rename = "Total revenue")]
    pub total_revenue: String,
    #[serde(rename = "Net income")]
    pub net_income: String,
    #[serde(rename = "Total assets")]
    pub total_assets: String,
    #[serde(rename = "Total liabilities")]
    pub total_liabilities: String,
    #[serde(rename = "Shareholders' equity")]
    pub shareholders_equity: String,
    #[serde(rename = "Cash & equivalents")]
    pub cash_and_equivalents: String,
}

fn find_figure(pattern: &Regex, text: &str) -> String {
    pattern
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

pub fn headline_metrics(text: &str) -> HeadlineMetrics {
    let [revenue, income, assets, liabilities, equity, cash] = &*PATTERNS;
    HeadlineMetrics {
        total_revenue: find_figure(revenue, text),
        net_income: find_figure(income, text),
        total_assets: find_figure(assets, text),
        total_liabilities: find_figure(liabilities, text),
        shareholders_equity: find_figure(equity, text),
        cash_and_equivalents: find_figure(cash, text),
    }
}
