//! Model families: the fit capability and the fitted artifacts it produces.
//!
//! Each family implements [`ModelFamily`] and is registered by identifier in a
//! [`ModelCatalog`]. Fitting yields a [`FittedModel`] that remembers the
//! feature order it was trained on, so scoring can realign a matrix whose
//! columns arrive in a different order.

mod baseline;
mod linear;
mod params;
mod tree;

use std::collections::BTreeMap;
use std::sync::Arc;

use fitcache_state::FeatureImportanceRow;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::error::{FitcacheError, Result};
use crate::matrix::FeatureMatrix;

pub use baseline::PriorRate;
pub use linear::LogisticRegression;
pub use tree::{DecisionStump, Split};

/// Errors raised by a model family while fitting.
#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("unknown hyperparameter {name}")]
    UnknownHyperparameter { name: String },

    #[error("invalid hyperparameter {name}: {reason}")]
    InvalidHyperparameter { name: String, reason: String },

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("{rows} rows but {labels} labels")]
    LabelMismatch { rows: usize, labels: usize },

    #[error("fit diverged: {0}")]
    Diverged(String),
}

/// The fit capability of one model family.
pub trait ModelFamily: Send + Sync {
    /// Identifier used in grids and model rows.
    fn model_type(&self) -> &'static str;

    fn fit(
        &self,
        matrix: &FeatureMatrix,
        labels: &[bool],
        params: &Map<String, Value>,
    ) -> std::result::Result<FittedModel, FitError>;
}

/// Per-feature importance reported by a fitted model.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureImportances {
    /// Non-negative weights from a tree-style learner.
    FeatureWeights(Vec<f64>),
    /// Signed linear coefficients.
    Coefficients(Vec<f64>),
    Unavailable,
}

impl FeatureImportances {
    /// Pair each importance with its feature name.
    pub fn into_rows(self, feature_names: &[String]) -> Vec<FeatureImportanceRow> {
        let values = match self {
            FeatureImportances::FeatureWeights(v) | FeatureImportances::Coefficients(v) => v,
            FeatureImportances::Unavailable => return Vec::new(),
        };
        feature_names
            .iter()
            .zip(values)
            .map(|(feature, importance)| FeatureImportanceRow {
                feature: feature.clone(),
                importance,
            })
            .collect()
    }
}

/// Learned parameters of one model family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    PriorRate {
        rate: f64,
    },
    LogisticRegression {
        intercept: f64,
        coefficients: Vec<f64>,
    },
    DecisionStump {
        split: Option<tree::Split>,
        left: f64,
        right: f64,
    },
}

impl Estimator {
    fn score(&self, row: &[f64]) -> f64 {
        match self {
            Estimator::PriorRate { rate } => *rate,
            Estimator::LogisticRegression {
                intercept,
                coefficients,
            } => linear::sigmoid(linear::dot(coefficients, row) + intercept),
            Estimator::DecisionStump { split, left, right } => match split {
                Some(s) if row[s.feature] > s.threshold => *right,
                _ => *left,
            },
        }
    }
}

/// A trained model together with the feature order it expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub feature_names: Vec<String>,
    pub estimator: Estimator,
}

impl FittedModel {
    /// Positive-class scores for every row of `matrix`, in row order.
    pub fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>> {
        let rows = matrix.select_columns(&self.feature_names)?;
        Ok(rows.iter().map(|row| self.estimator.score(row)).collect())
    }

    pub fn feature_importances(&self) -> FeatureImportances {
        match &self.estimator {
            Estimator::PriorRate { .. } => FeatureImportances::Unavailable,
            Estimator::LogisticRegression { coefficients, .. } => {
                FeatureImportances::Coefficients(coefficients.clone())
            }
            Estimator::DecisionStump { split, .. } => {
                let mut weights = vec![0.0; self.feature_names.len()];
                if let Some(s) = split {
                    weights[s.feature] = 1.0;
                }
                FeatureImportances::FeatureWeights(weights)
            }
        }
    }
}

/// Registry of model families by identifier.
#[derive(Clone, Default)]
pub struct ModelCatalog {
    families: BTreeMap<String, Arc<dyn ModelFamily>>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with every built-in family registered.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(Arc::new(PriorRate));
        catalog.register(Arc::new(LogisticRegression));
        catalog.register(Arc::new(DecisionStump));
        catalog
    }

    pub fn register(&mut self, family: Arc<dyn ModelFamily>) {
        self.families
            .insert(family.model_type().to_string(), family);
    }

    pub fn get(&self, model_type: &str) -> Option<Arc<dyn ModelFamily>> {
        self.families.get(model_type).cloned()
    }

    /// Like [`get`](Self::get), but an unknown identifier is a configuration error.
    pub fn resolve(&self, model_type: &str) -> Result<Arc<dyn ModelFamily>> {
        self.get(model_type).ok_or_else(|| {
            FitcacheError::Configuration(format!(
                "unknown model type {model_type} (known: {})",
                self.model_types().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    pub fn model_types(&self) -> impl Iterator<Item = &str> {
        self.families.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ModelCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCatalog")
            .field("families", &self.model_types().collect::<Vec<_>>())
            .finish()
    }
}

fn check_training_set(matrix: &FeatureMatrix, labels: &[bool]) -> std::result::Result<(), FitError> {
    if matrix.n_rows() != labels.len() {
        return Err(FitError::LabelMismatch {
            rows: matrix.n_rows(),
            labels: labels.len(),
        });
    }
    if labels.is_empty() {
        return Err(FitError::EmptyTrainingSet);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::matrix::FeatureMatrix;

    /// Four rows, two features; `x` separates the classes at 2.5.
    pub fn separable() -> (FeatureMatrix, Vec<bool>) {
        let matrix = FeatureMatrix::new(
            vec![1, 2, 3, 4],
            vec!["x".into(), "noise".into()],
            vec![
                vec![1.0, 0.3],
                vec![2.0, 0.1],
                vec![3.0, 0.4],
                vec![4.0, 0.2],
            ],
        )
        .unwrap();
        (matrix, vec![false, false, true, true])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_catalog_knows_every_family() {
        let catalog = ModelCatalog::builtin();
        assert_eq!(
            catalog.model_types().collect::<Vec<_>>(),
            vec![
                "fitcache.baseline.PriorRate",
                "fitcache.linear.LogisticRegression",
                "fitcache.tree.DecisionStump",
            ]
        );
        assert!(matches!(
            catalog.resolve("sklearn.svm.SVC"),
            Err(FitcacheError::Configuration(_))
        ));
    }

    #[test]
    fn predict_realigns_columns() {
        let (matrix, labels) = testing::separable();
        let model = DecisionStump
            .fit(&matrix, &labels, &Map::new())
            .unwrap();

        let swapped = FeatureMatrix::new(
            matrix.entity_ids.clone(),
            vec!["noise".into(), "x".into()],
            matrix.rows.iter().map(|r| vec![r[1], r[0]]).collect(),
        )
        .unwrap();
        assert_eq!(model.predict(&matrix).unwrap(), model.predict(&swapped).unwrap());
    }

    #[test]
    fn predict_fails_on_missing_feature() {
        let (matrix, labels) = testing::separable();
        let model = LogisticRegression.fit(&matrix, &labels, &Map::new()).unwrap();
        let narrow = FeatureMatrix::new(vec![1], vec!["x".into()], vec![vec![1.0]]).unwrap();
        assert!(matches!(model.predict(&narrow), Err(FitcacheError::Configuration(_))));
    }

    #[test]
    fn importances_resolved_by_variant() {
        let (matrix, labels) = testing::separable();
        let names = matrix.feature_names.clone();

        let prior = PriorRate.fit(&matrix, &labels, &Map::new()).unwrap();
        assert_eq!(prior.feature_importances(), FeatureImportances::Unavailable);
        assert!(prior.feature_importances().into_rows(&names).is_empty());

        let stump = DecisionStump.fit(&matrix, &labels, &Map::new()).unwrap();
        assert_eq!(
            stump.feature_importances(),
            FeatureImportances::FeatureWeights(vec![1.0, 0.0])
        );

        let params = json!({ "max_iter": 5 });
        let linear = LogisticRegression
            .fit(&matrix, &labels, params.as_object().unwrap())
            .unwrap();
        let rows = linear.feature_importances().into_rows(&names);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].feature, "x");
        assert!(matches!(linear.feature_importances(), FeatureImportances::Coefficients(_)));
    }

    #[test]
    fn fitted_model_serde_round_trip_predicts_identically() {
        let (matrix, labels) = testing::separable();
        let model = LogisticRegression.fit(&matrix, &labels, &Map::new()).unwrap();
        let bytes = serde_json::to_vec(&model).unwrap();
        let loaded: FittedModel = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(loaded.predict(&matrix).unwrap(), model.predict(&matrix).unwrap());
    }

    #[test]
    fn label_count_mismatch_is_fit_error() {
        let (matrix, _) = testing::separable();
        assert_eq!(
            PriorRate.fit(&matrix, &[true], &Map::new()),
            Err(FitError::LabelMismatch { rows: 4, labels: 1 })
        );
    }
}
