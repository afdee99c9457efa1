use analysis_core::FinancialStatement;
use serde::Serialize;

/// Feature order expected by the fraud model
pub const FEATURE_NAMES: [&str; 25] = [
    "DSRI",
    "GMI",
    "AQI",
    "SGI",
    "DEPI",
    "SGAI",
    "LVGI",
    "TATA",
    "leverage",
    "profitability",
    "liquidity",
    "EBIT_to_assets",
    "soft_asset_ratio",
    "ROA",
    "Prev_ROA",
    "CFO",
    "GrossMargin",
    "Prev_GM",
    "AssetTurn",
    "Prev_AT",
    "CurrRatio",
    "Prev_CR",
    "Shares",
    "Prev_Shares",
    "Prev_leverage",
];

/// Year-over-year ratios of two consecutive annual statements.
///
/// Beneish indices come first, then the model extras and Piotroski helpers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FraudFeatures {
    #[serde(rename = "DSRI")]
    pub dsri: f64,
    #[serde(rename = "GMI")]
    pub gmi: f64,
    #[serde(rename = "AQI")]
    pub aqi: f64,
    #[serde(rename = "SGI")]
    pub sgi: f64,
    #[serde(rename = "DEPI")]
    pub depi: f64,
    #[serde(rename = "SGAI")]
    pub sgai: f64,
    #[serde(rename = "LVGI")]
    pub lvgi: f64,
    #[serde(rename = "TATA")]
    pub tata: f64,
    pub leverage: f64,
    pub profitability: f64,
    pub liquidity: f64,
    #[serde(rename = "EBIT_to_assets")]
    pub ebit_to_assets: f64,
    pub soft_asset_ratio: f64,
    #[serde(rename = "ROA")]
    pub roa: f64,
    #[serde(rename = "Prev_ROA")]
    pub prev_roa: f64,
    #[serde(rename = "CFO")]
    pub cfo: f64,
    #[serde(rename = "GrossMargin")]
    pub gross_margin: f64,
    #[serde(rename = "Prev_GM")]
    pub prev_gm: f64,
    #[serde(rename = "AssetTurn")]
    pub asset_turn: f64,
    #[serde(rename = "Prev_AT")]
    pub prev_at: f64,
    #[serde(rename = "CurrRatio")]
    pub curr_ratio: f64,
    #[serde(rename = "Prev_CR")]
    pub prev_cr: f64,
    #[serde(rename = "Shares")]
    pub shares: f64,
    #[serde(rename = "Prev_Shares")]
    pub prev_shares: f64,
    #[serde(rename = "Prev_leverage")]
    pub prev_leverage: f64,
}

impl FraudFeatures {
    /// Values in [`FEATURE_NAMES`] order.
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.dsri,
            self.gmi,
            self.aqi,
            self.sgi,
            self.depi,
            self.sgai,
            self.lvgi,
            self.tata,
            self.leverage,
            self.profitability,
            self.liquidity,
            self.ebit_to_assets,
            self.soft_asset_ratio,
            self.roa,
            self.prev_roa,
            self.cfo,
            self.gross_margin,
            self.prev_gm,
            self.asset_turn,
            self.prev_at,
            self.curr_ratio,
            self.prev_cr,
            self.shares,
            self.prev_shares,
            self.prev_leverage,
        ]
    }

    pub fn named(&self) -> Vec<(&'static str, f64)> {
        FEATURE_NAMES.iter().copied().zip(self.to_vec()).collect()
    }
}

/// `n / d`, or `None` for a zero or non-finite denominator.
fn div(n: f64, d: f64) -> Option<f64> {
    if d == 0.0 || !d.is_finite() {
        None
    } else {
        Some(n / d)
    }
}

/// Collapse a failed ratio chain to zero.
fn or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Line items of one statement with missing values read as zero
struct Items {
    receivables: f64,
    sales: f64,
    cogs: f64,
    current_assets: f64,
    ppe: f64,
    assets: f64,
    depreciation: f64,
    net_income: f64,
    liabilities: f64,
    current_liabilities: f64,
    ebit: f64,
    operating_cash_flow: f64,
    shares: f64,
}

impl From<&FinancialStatement> for Items {
    fn from(s: &FinancialStatement) -> Self {
        let g = |v: Option<f64>| v.unwrap_or(0.0);
        let net_income = g(s.net_income);
        Self {
            receivables: g(s.net_receivables),
            sales: g(s.revenue),
            cogs: g(s.cost_of_revenue),
            current_assets: g(s.total_current_assets),
            ppe: g(s.property_plant_equipment_net),
            assets: g(s.total_assets),
            depreciation: g(s.depreciation_and_amortization),
            net_income,
            liabilities: g(s.total_liabilities),
            current_liabilities: g(s.total_current_liabilities),
            ebit: s.ebit.unwrap_or(net_income),
            operating_cash_flow: g(s.operating_cash_flow),
            shares: g(s.weighted_average_shares),
        }
    }
}

/// The two most recent statements ordered (prior, current).
fn latest_pair(statements: &[FinancialStatement]) -> Option<(&FinancialStatement, &FinancialStatement)> {
    let mut sorted: Vec<&FinancialStatement> = statements.iter().collect();
    sorted.sort_by_key(|s| (s.end_date, s.fiscal_year));
    match sorted.as_slice() {
        [.., prior, current] => Some((*prior, *current)),
        _ => None,
    }
}

/// Ratio features from the latest two annual statements; `None` with fewer than two.
pub fn compute(statements: &[FinancialStatement]) -> Option<FraudFeatures> {
    let (prior, current) = latest_pair(statements)?;
    let c = Items::from(current);
    let p = Items::from(prior);

    let gross_margin = |i: &Items| div(i.sales - i.cogs, i.sales);
    let non_current_share = |i: &Items| div(i.current_assets + i.ppe, i.assets).map(|r| 1.0 - r);
    let depreciation_rate = |i: &Items| div(i.depreciation, i.depreciation + i.ppe);
    let sga_share = |i: &Items| div(i.sales - i.cogs - i.net_income, i.sales);

    Some(FraudFeatures {
        dsri: or_zero(
            div(c.receivables, c.sales)
                .zip(div(p.receivables, p.sales))
                .and_then(|(a, b)| div(a, b)),
        ),
        gmi: or_zero(gross_margin(&p).zip(gross_margin(&c)).and_then(|(a, b)| div(a, b))),
        aqi: or_zero(
            non_current_share(&c)
                .zip(non_current_share(&p))
                .and_then(|(a, b)| div(a, b)),
        ),
        sgi: or_zero(div(c.sales, p.sales)),
        depi: or_zero(
            depreciation_rate(&p)
                .zip(depreciation_rate(&c))
                .and_then(|(a, b)| div(a, b)),
        ),
        sgai: or_zero(sga_share(&c).zip(sga_share(&p)).and_then(|(a, b)| div(a, b))),
        lvgi: or_zero(
            div(c.liabilities, c.assets)
                .zip(div(p.liabilities, p.assets))
                .and_then(|(a, b)| div(a, b)),
        ),
        tata: or_zero(div(
            c.current_assets - c.current_liabilities - c.depreciation,
            c.assets,
        )),
        leverage: or_zero(div(c.liabilities, c.assets)),
        profitability: or_zero(div(c.net_income, c.assets)),
        liquidity: or_zero(div(c.current_assets, c.current_liabilities)),
        ebit_to_assets: or_zero(div(c.ebit, c.assets)),
        soft_asset_ratio: or_zero(div(c.current_assets - c.ppe, c.assets)),
        roa: or_zero(div(c.net_income, c.assets)),
        prev_roa: or_zero(div(p.net_income, p.assets)),
        cfo: or_zero(div(c.operating_cash_flow, c.assets)),
        gross_margin: or_zero(gross_margin(&c)),
        prev_gm: or_zero(gross_margin(&p)),
        asset_turn: or_zero(div(c.sales, c.assets)),
        prev_at: or_zero(div(p.sales, p.assets)),
        curr_ratio: or_zero(div(c.current_assets, c.current_liabilities)),
        prev_cr: or_zero(div(p.current_assets, p.current_liabilities)),
        shares: c.shares,
        prev_shares: p.shares,
        prev_leverage: or_zero(div(p.liabilities, p.assets)),
    })
}
