use serde_json::{Map, Value};

use super::params::Hyperparameters;
use super::{check_training_set, Estimator, FitError, FittedModel, ModelFamily};
use crate::matrix::FeatureMatrix;

/// L2-regularized logistic regression fitted by batch gradient descent.
///
/// Hyperparameters: `learning_rate` (> 0, default 0.1), `max_iter` (>= 1,
/// default 100), `l2` (>= 0, default 0). The intercept is not penalized.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogisticRegression;

impl ModelFamily for LogisticRegression {
    fn model_type(&self) -> &'static str {
        "fitcache.linear.LogisticRegression"
    }

    fn fit(
        &self,
        matrix: &FeatureMatrix,
        labels: &[bool],
        params: &Map<String, Value>,
    ) -> Result<FittedModel, FitError> {
        let hp = Hyperparameters::new(params, &["learning_rate", "max_iter", "l2"])?;
        let learning_rate = hp.f64_at_least("learning_rate", 0.1, 0.0, false)?;
        let max_iter = hp.usize_at_least("max_iter", 100, 1)?;
        let l2 = hp.f64_at_least("l2", 0.0, 0.0, true)?;
        check_training_set(matrix, labels)?;

        let n = matrix.n_features();
        let m = labels.len() as f64;
        let mut weights = vec![0.0; n];
        let mut intercept = 0.0;

        for _ in 0..max_iter {
            let mut grad = vec![0.0; n];
            let mut grad_intercept = 0.0;
            for (row, &label) in matrix.rows.iter().zip(labels) {
                let err = sigmoid(dot(&weights, row) + intercept) - if label { 1.0 } else { 0.0 };
                for (g, x) in grad.iter_mut().zip(row) {
                    *g += err * x;
                }
                grad_intercept += err;
            }

            for (w, g) in weights.iter_mut().zip(&grad) {
                *w -= learning_rate * (g / m + l2 * *w);
            }
            intercept -= learning_rate * grad_intercept / m;

            if !intercept.is_finite() || weights.iter().any(|w| !w.is_finite()) {
                return Err(FitError::Diverged(format!(
                    "non-finite weights with learning_rate {learning_rate}"
                )));
            }
        }

        Ok(FittedModel {
            feature_names: matrix.feature_names.clone(),
            estimator: Estimator::LogisticRegression {
                intercept,
                coefficients: weights,
            },
        })
    }
}

pub(super) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Numerically stable logistic function.
pub(super) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
