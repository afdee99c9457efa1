use analysis_core::{AnalysisError, FinancialStatement, MarketDataProvider, StatementPeriod};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::beneish::{beneish, BeneishScore};
use crate::model::{FeatureImpact, TreeEnsemble};
use crate::piotroski::{piotroski, PiotroskiScore};
use crate::ratios::{self, FraudFeatures};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FraudMethod {
    #[serde(rename = "Custom Trained Model")]
    Model,
    #[serde(rename = "Beneish M-Score")]
    Beneish,
    #[serde(rename = "Piotroski F-Score")]
    Piotroski,
}

#[derive(Debug, Clone, Serialize)]
pub struct FraudReport {
    pub ticker: String,
    pub method: FraudMethod,
    pub probability: Option<f64>,
    pub base_value: Option<f64>,
    pub impacts: Option<Vec<FeatureImpact>>,
    pub features: FraudFeatures,
    pub beneish: Option<BeneishScore>,
    pub piotroski: Option<PiotroskiScore>,
}

impl FraudReport {
    pub fn flagged(&self) -> bool {
        match self.method {
            FraudMethod::Model => self.probability.map(|p| p > 0.5).unwrap_or(false),
            FraudMethod::Beneish => self.beneish.map(|b| b.flagged).unwrap_or(false),
            FraudMethod::Piotroski => self.piotroski.as_ref().map(|p| p.flagged).unwrap_or(false),
        }
    }
}

/// Runs one of the fraud screens on a ticker's last two fiscal years
#[derive(Clone)]
pub struct FraudScreener {
    provider: Arc<dyn MarketDataProvider>,
    model: Option<Arc<TreeEnsemble>>,
}

impl FraudScreener {
    pub fn new(provider: Arc<dyn MarketDataProvider>, model: Option<Arc<TreeEnsemble>>) -> Self {
        Self { provider, model }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub async fn annual_statements(&self, ticker: &str) -> Result<Vec<FinancialStatement>, AnalysisError> {
        self.provider.statements(ticker, StatementPeriod::Annual, 2).await
    }

    pub async fn screen(&self, ticker: &str, method: FraudMethod) -> Result<FraudReport, AnalysisError> {
        let statements = self.annual_statements(ticker).await?;
        self.screen_statements(ticker, method, &statements)
    }

    /// Screen already-fetched statements.
    pub fn screen_statements(
        &self,
        ticker: &str,
        method: FraudMethod,
        statements: &[FinancialStatement],
    ) -> Result<FraudReport, AnalysisError> {
        let features = ratios::compute(statements).ok_or_else(|| {
            AnalysisError::InsufficientData(
                "Could not retrieve two full fiscal years for this ticker.".to_string(),
            )
        })?;

        let mut report = FraudReport {
            ticker: ticker.to_string(),
            method,
            probability: None,
            base_value: None,
            impacts: None,
            features,
            beneish: None,
            piotroski: None,
        };

        match method {
            FraudMethod::Model => {
                let model = self.model.as_ref().ok_or_else(|| {
                    AnalysisError::Unsupported("No fraud model is loaded".to_string())
                })?;
                let explanation = model
                    .explain(&report.features)
                    .map_err(|e| AnalysisError::CalculationError(e.to_string()))?;
                report.probability = Some(explanation.probability);
                report.base_value = Some(explanation.base_value);
                report.impacts = Some(explanation.impacts);
            }
            FraudMethod::Beneish => report.beneish = Some(beneish(&report.features)),
            FraudMethod::Piotroski => report.piotroski = Some(piotroski(&report.features)),
        }

        tracing::info!(ticker, ?method, flagged = report.flagged(), "fraud screen");
        Ok(report)
    }
}
