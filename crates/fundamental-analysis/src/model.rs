//! Gradient-boosted oblivious trees loaded from CatBoost's JSON export.
//!
//! Each tree applies the same split at every node of a level, so a sample's
//! leaf is a bit pattern: bit `i` is set when the sample's value exceeds the
//! border of split `i`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::ratios::{FraudFeatures, FEATURE_NAMES};

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read model file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse model JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid model: {0}")]
    Invalid(String),

    #[error("Expected {expected} feature values, got {got}")]
    FeatureCount { expected: usize, got: usize },
}

#[derive(Deserialize)]
struct RawModel {
    features_info: RawFeaturesInfo,
    oblivious_trees: Vec<RawTree>,
    #[serde(default)]
    scale_and_bias: Option<(f64, RawBias)>,
}

#[derive(Deserialize)]
struct RawFeaturesInfo {
    #[serde(default)]
    float_features: Vec<RawFloatFeature>,
}

#[derive(Deserialize)]
struct RawFloatFeature {
    #[serde(default)]
    feature_id: Option<String>,
}

#[derive(Deserialize)]
struct RawTree {
    leaf_values: Vec<f64>,
    #[serde(default)]
    leaf_weights: Vec<f64>,
    splits: Vec<RawSplit>,
}

#[derive(Deserialize)]
struct RawSplit {
    float_feature_index: usize,
    border: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBias {
    Scalar(f64),
    Vector(Vec<f64>),
}

#[derive(Debug, Clone)]
struct Split {
    /// Column in [`FEATURE_NAMES`] order
    feature: usize,
    border: f64,
}

#[derive(Debug, Clone)]
struct ObliviousTree {
    splits: Vec<Split>,
    leaf_values: Vec<f64>,
    leaf_weights: Vec<f64>,
}

impl ObliviousTree {
    fn leaf_index(&self, x: &[f64]) -> usize {
        self.splits
            .iter()
            .enumerate()
            .fold(0, |idx, (i, s)| if x[s.feature] > s.border { idx | (1 << i) } else { idx })
    }

    /// Leaf-weighted mean of leaves reachable when only the splits in `known`
    /// are resolved against `x`.
    fn conditional_expectation(&self, goes_right: &[bool], known: &[bool]) -> f64 {
        let mut weighted = 0.0;
        let mut total = 0.0;
        let mut plain = 0.0;
        let mut count = 0usize;

        for (leaf, (&value, &weight)) in self.leaf_values.iter().zip(&self.leaf_weights).enumerate() {
            let consistent = goes_right
                .iter()
                .zip(known)
                .enumerate()
                .all(|(i, (&right, &k))| !k || ((leaf >> i) & 1 == 1) == right);
            if consistent {
                weighted += value * weight;
                total += weight;
                plain += value;
                count += 1;
            }
        }

        if total > 0.0 {
            weighted / total
        } else if count > 0 {
            plain / count as f64
        } else {
            0.0
        }
    }

    /// Exact Shapley values of this tree over its distinct features, added
    /// into `phi`. Returns the tree's unconditional expectation.
    fn shap_into(&self, x: &[f64], phi: &mut [f64]) -> f64 {
        let mut features: Vec<usize> = self.splits.iter().map(|s| s.feature).collect();
        features.sort_unstable();
        features.dedup();
        let d = features.len();

        let goes_right: Vec<bool> = self.splits.iter().map(|s| x[s.feature] > s.border).collect();
        let position: Vec<usize> = self
            .splits
            .iter()
            .map(|s| features.iter().position(|f| *f == s.feature).unwrap_or(0))
            .collect();

        let values: Vec<f64> = (0..1usize << d)
            .map(|mask| {
                let known: Vec<bool> = position.iter().map(|p| (mask >> p) & 1 == 1).collect();
                self.conditional_expectation(&goes_right, &known)
            })
            .collect();

        let factorial: Vec<f64> = (0..=d)
            .scan(1.0, |acc, k| {
                if k > 0 {
                    *acc *= k as f64;
                }
                Some(*acc)
            })
            .collect();

        for (i, feature) in features.iter().enumerate() {
            let bit = 1usize << i;
            let mut contribution = 0.0;
            for mask in (0..1usize << d).filter(|m| m & bit == 0) {
                let s = mask.count_ones() as usize;
                let weight = factorial[s] * factorial[d - s - 1] / factorial[d];
                contribution += weight * (values[mask | bit] - values[mask]);
            }
            phi[*feature] += contribution;
        }

        values[0]
    }
}

/// Contribution of one feature to a prediction, in log-odds
#[derive(Debug, Clone, Serialize)]
pub struct FeatureImpact {
    pub feature: String,
    pub value: f64,
    pub shap: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub probability: f64,
    pub raw_score: f64,
    pub base_value: f64,
    pub impacts: Vec<FeatureImpact>,
}

impl Explanation {
    /// Impacts sorted by absolute SHAP value, largest first.
    pub fn top(&self, n: usize) -> &[FeatureImpact] {
        &self.impacts[..n.min(self.impacts.len())]
    }
}

#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    trees: Vec<ObliviousTree>,
    scale: f64,
    bias: f64,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl TreeEnsemble {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse a CatBoost JSON model. Float features are matched to the fraud
    /// feature set by `feature_id`, or by position when ids are absent.
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let raw: RawModel = serde_json::from_str(json)?;

        let by_name: HashMap<&str, usize> =
            FEATURE_NAMES.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let columns: Vec<usize> = raw
            .features_info
            .float_features
            .iter()
            .enumerate()
            .map(|(i, f)| match f.feature_id.as_deref() {
                Some(id) => by_name
                    .get(id)
                    .copied()
                    .ok_or_else(|| ModelError::Invalid(format!("unknown feature '{}'", id))),
                None if i < FEATURE_NAMES.len() => Ok(i),
                None => Err(ModelError::Invalid(format!("float feature {} has no column", i))),
            })
            .collect::<Result<_, _>>()?;

        let trees = raw
            .oblivious_trees
            .into_iter()
            .enumerate()
            .map(|(t, tree)| {
                let depth = tree.splits.len();
                if tree.leaf_values.len() != 1 << depth {
                    return Err(ModelError::Invalid(format!(
                        "tree {} has {} leaves for depth {}",
                        t,
                        tree.leaf_values.len(),
                        depth
                    )));
                }
                let splits = tree
                    .splits
                    .iter()
                    .map(|s| {
                        columns
                            .get(s.float_feature_index)
                            .map(|&feature| Split {
                                feature,
                                border: s.border,
                            })
                            .ok_or_else(|| {
                                ModelError::Invalid(format!(
                                    "tree {} splits on missing float feature {}",
                                    t, s.float_feature_index
                                ))
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let leaf_weights = if tree.leaf_weights.len() == tree.leaf_values.len() {
                    tree.leaf_weights
                } else {
                    vec![1.0; tree.leaf_values.len()]
                };
                Ok(ObliviousTree {
                    splits,
                    leaf_values: tree.leaf_values,
                    leaf_weights,
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        let (scale, bias) = match raw.scale_and_bias {
            Some((scale, RawBias::Scalar(b))) => (scale, b),
            Some((scale, RawBias::Vector(b))) => (scale, b.first().copied().unwrap_or(0.0)),
            None => (1.0, 0.0),
        };

        tracing::info!(trees = trees.len(), "loaded fraud model");
        Ok(Self { trees, scale, bias })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn check(&self, x: &[f64]) -> Result<(), ModelError> {
        if x.len() != FEATURE_NAMES.len() {
            return Err(ModelError::FeatureCount {
                expected: FEATURE_NAMES.len(),
                got: x.len(),
            });
        }
        Ok(())
    }

    /// Log-odds: `scale * sum(leaf values) + bias`.
    pub fn raw_score(&self, x: &[f64]) -> Result<f64, ModelError> {
        self.check(x)?;
        let sum: f64 = self
            .trees
            .iter()
            .map(|t| t.leaf_values[t.leaf_index(x)])
            .sum();
        Ok(self.scale * sum + self.bias)
    }

    /// Probability of the positive (fraud) class.
    pub fn predict_proba(&self, x: &[f64]) -> Result<f64, ModelError> {
        self.raw_score(x).map(sigmoid)
    }

    /// Per-feature SHAP values and the base value; `base + sum(phi)` equals
    /// the raw score.
    pub fn shap_values(&self, x: &[f64]) -> Result<(f64, Vec<f64>), ModelError> {
        self.check(x)?;
        let mut phi = vec![0.0; x.len()];
        let mut base = 0.0;
        for tree in &self.trees {
            let mut tree_phi = vec![0.0; x.len()];
            base += tree.shap_into(x, &mut tree_phi);
            for (p, t) in phi.iter_mut().zip(tree_phi) {
                *p += self.scale * t;
            }
        }
        Ok((self.scale * base + self.bias, phi))
    }

    pub fn explain(&self, features: &FraudFeatures) -> Result<Explanation, ModelError> {
        let x = features.to_vec();
        let raw_score = self.raw_score(&x)?;
        let (base_value, phi) = self.shap_values(&x)?;

        let mut impacts: Vec<FeatureImpact> = FEATURE_NAMES
            .iter()
            .zip(x.iter().zip(phi))
            .map(|(name, (value, shap))| FeatureImpact {
                feature: name.to_string(),
                value: *value,
                shap,
            })
            .collect();
        impacts.sort_by(|a, b| {
            b.shap
                .abs()
                .partial_cmp(&a.shap.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(Explanation {
            probability: sigmoid(raw_score),
            raw_score,
            base_value,
            impacts,
        })
    }
}
