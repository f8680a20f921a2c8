use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::params::Hyperparameters;
use super::{check_training_set, Estimator, FitError, FittedModel, ModelFamily};
use crate::matrix::FeatureMatrix;

/// Threshold test on one feature; rows with `x > threshold` go right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub feature: usize,
    pub threshold: f64,
}

/// Depth-one decision tree choosing the Gini-optimal threshold split.
///
/// Hyperparameter: `min_samples_leaf` (>= 1, default 1). When no split leaves
/// enough rows on both sides the stump predicts the training rate everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionStump;

impl ModelFamily for DecisionStump {
    fn model_type(&self) -> &'static str {
        "fitcache.tree.DecisionStump"
    }

    fn fit(
        &self,
        matrix: &FeatureMatrix,
        labels: &[bool],
        params: &Map<String, Value>,
    ) -> Result<FittedModel, FitError> {
        let hp = Hyperparameters::new(params, &["min_samples_leaf"])?;
        let min_leaf = hp.usize_at_least("min_samples_leaf", 1, 1)?;
        check_training_set(matrix, labels)?;

        let total = labels.len();
        let total_pos = labels.iter().filter(|l| **l).count();
        let mut best: Option<(f64, Split, f64, f64)> = None;

        for feature in 0..matrix.n_features() {
            let mut column: Vec<(f64, bool)> = matrix
                .rows
                .iter()
                .zip(labels)
                .map(|(row, &label)| (row[feature], label))
                .collect();
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_pos = 0;
            for k in 1..total {
                if column[k - 1].1 {
                    left_pos += 1;
                }
                let distinct = column[k - 1].0 < column[k].0;
                if !distinct || k < min_leaf || total - k < min_leaf {
                    continue;
                }

                let right_pos = total_pos - left_pos;
                let impurity = (k as f64 * gini(left_pos, k)
                    + (total - k) as f64 * gini(right_pos, total - k))
                    / total as f64;
                if best.map_or(true, |(b, ..)| impurity < b) {
                    best = Some((
                        impurity,
                        Split {
                            feature,
                            threshold: (column[k - 1].0 + column[k].0) / 2.0,
                        },
                        left_pos as f64 / k as f64,
                        right_pos as f64 / (total - k) as f64,
                    ));
                }
            }
        }

        let estimator = match best {
            Some((_, split, left, right)) => Estimator::DecisionStump {
                split: Some(split),
                left,
                right,
            },
            None => {
                let rate = total_pos as f64 / total as f64;
                Estimator::DecisionStump {
                    split: None,
                    left: rate,
                    right: rate,
                }
            }
        };

        Ok(FittedModel {
            feature_names: matrix.feature_names.clone(),
            estimator,
        })
    }
}

fn gini(positives: usize, n: usize) -> f64 {
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing;
    use serde_json::json;

    #[test]
    fn finds_the_separating_threshold() {
        let (matrix, labels) = testing::separable();
        let model = DecisionStump.fit(&matrix, &labels, &Map::new()).unwrap();
        assert_eq!(
            model.estimator,
            Estimator::DecisionStump {
                split: Some(Split {
                    feature: 0,
                    threshold: 2.5
                }),
                left: 0.0,
                right: 1.0,
            }
        );
        assert_eq!(model.predict(&matrix).unwrap(), vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn min_samples_leaf_can_forbid_every_split() {
        let (matrix, labels) = testing::separable();
        let params = json!({ "min_samples_leaf": 3 });
        let model = DecisionStump
            .fit(&matrix, &labels, params.as_object().unwrap())
            .unwrap();
        assert_eq!(model.predict(&matrix).unwrap(), vec![0.5; 4]);
        assert_eq!(
            model.feature_importances(),
            crate::model::FeatureImportances::FeatureWeights(vec![0.0, 0.0])
        );
    }

    #[test]
    fn constant_column_never_splits() {
        let matrix = FeatureMatrix::new(
            vec![1, 2, 3],
            vec!["c".into()],
            vec![vec![1.0], vec![1.0], vec![1.0]],
        )
        .unwrap();
        let model = DecisionStump
            .fit(&matrix, &[true, false, false], &Map::new())
            .unwrap();
        assert!(matches!(
            model.estimator,
            Estimator::DecisionStump { split: None, .. }
        ));
    }

    #[test]
    fn zero_min_samples_leaf_rejected() {
        let (matrix, labels) = testing::separable();
        let params = json!({ "min_samples_leaf": 0 });
        assert!(matches!(
            DecisionStump.fit(&matrix, &labels, params.as_object().unwrap()),
            Err(FitError::InvalidHyperparameter { .. })
        ));
    }

    #[test]
    fn gini_bounds() {
        assert_eq!(gini(0, 4), 0.0);
        assert_eq!(gini(4, 4), 0.0);
        assert_eq!(gini(2, 4), 0.5);
    }
}
