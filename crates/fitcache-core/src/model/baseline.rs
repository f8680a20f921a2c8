use serde_json::{Map, Value};

use super::params::Hyperparameters;
use super::{check_training_set, Estimator, FitError, FittedModel, ModelFamily};
use crate::matrix::FeatureMatrix;

/// Scores every entity with the positive rate seen in training.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorRate;

impl ModelFamily for PriorRate {
    fn model_type(&self) -> &'static str {
        "fitcache.baseline.PriorRate"
    }

    fn fit(
        &self,
        matrix: &FeatureMatrix,
        labels: &[bool],
        params: &Map<String, Value>,
    ) -> Result<FittedModel, FitError> {
        Hyperparameters::new(params, &[])?;
        check_training_set(matrix, labels)?;

        let positives = labels.iter().filter(|l| **l).count();
        Ok(FittedModel {
            feature_names: matrix.feature_names.clone(),
            estimator: Estimator::PriorRate {
                rate: positives as f64 / labels.len() as f64,
            },
        })
    }
}
