use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GlossaryEntry {
    pub feature: &'static str,
    pub description: &'static str,
}

const fn entry(feature: &'static str, description: &'static str) -> GlossaryEntry {
    GlossaryEntry {
        feature,
        description,
    }
}

/// Plain-language meaning of every fraud feature, in model order.
pub const FEATURE_GLOSSARY: [GlossaryEntry; 25] = [
    entry("DSRI", "Days-sales-in-receivables index. Receivables growing faster than sales can point to inflated revenue."),
    entry("GMI", "Gross-margin index. Values above 1 mean margins deteriorated, a pressure to manipulate."),
    entry("AQI", "Asset-quality index. A growing share of intangible or illiquid assets is riskier."),
    entry("SGI", "Sales-growth index. Rapid growth puts pressure on managers to keep it up."),
    entry("DEPI", "Depreciation index. Slower depreciation flatters earnings."),
    entry("SGAI", "SG&A index. Overhead rising relative to sales signals cost pressure."),
    entry("LVGI", "Leverage index. Rising leverage increases default risk and the incentive to dress up results."),
    entry("TATA", "Total accruals to total assets. Large positive accruals often accompany earnings manipulation."),
    entry("leverage", "Total liabilities divided by total assets."),
    entry("profitability", "Net income divided by total assets."),
    entry("liquidity", "Current assets divided by current liabilities."),
    entry("EBIT_to_assets", "Operating profit divided by total assets."),
    entry("soft_asset_ratio", "Share of assets that are neither current assets nor plant and equipment."),
    entry("ROA", "Return on assets for the current year."),
    entry("Prev_ROA", "Return on assets for the prior year."),
    entry("CFO", "Operating cash flow divided by total assets."),
    entry("GrossMargin", "Gross profit divided by revenue for the current year."),
    entry("Prev_GM", "Gross margin for the prior year."),
    entry("AssetTurn", "Revenue divided by total assets for the current year."),
    entry("Prev_AT", "Asset turnover for the prior year."),
    entry("CurrRatio", "Current ratio for the current year."),
    entry("Prev_CR", "Current ratio for the prior year."),
    entry("Shares", "Weighted average shares outstanding for the current year."),
    entry("Prev_Shares", "Weighted average shares outstanding for the prior year."),
    entry("Prev_leverage", "Liabilities to assets for the prior year."),
];

pub fn describe(feature: &str) -> Option<&'static str> {
    FEATURE_GLOSSARY
        .iter()
        .find(|e| e.feature == feature)
        .map(|e| e.description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratios::FEATURE_NAMES;

    #[test]
    fn test_glossary_covers_every_feature_in_order() {
        for (entry, name) in FEATURE_GLOSSARY.iter().zip(FEATURE_NAMES) {
            assert_eq!(entry.feature, name);
        }
        assert!(describe("TATA").unwrap().contains("accruals"));
        assert!(describe("unknown").is_none());
    }
}
