//! Feature matrices and their training metadata.
//!
//! A [`MatrixStore`] pairs a [`FeatureMatrix`] with the label vector split out
//! of it and the metadata document that describes how it was built. The
//! metadata takes part in every model fingerprint, so the same hyperparameters
//! over a different dataset yield a different identity.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::{FitcacheError, Result};

/// Dense row-major feature matrix keyed by entity id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub entity_ids: Vec<i64>,
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Build a matrix, checking its shape and key uniqueness.
    pub fn new(entity_ids: Vec<i64>, feature_names: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let matrix = FeatureMatrix {
            entity_ids,
            feature_names,
            rows,
        };
        matrix.validate()?;
        Ok(matrix)
    }

    fn validate(&self) -> Result<()> {
        if self.rows.len() != self.entity_ids.len() {
            return Err(FitcacheError::Configuration(format!(
                "matrix has {} rows but {} entity ids",
                self.rows.len(),
                self.entity_ids.len()
            )));
        }
        if let Some((i, row)) = self
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.feature_names.len())
        {
            return Err(FitcacheError::Configuration(format!(
                "row {i} has {} values, expected {}",
                row.len(),
                self.feature_names.len()
            )));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self.entity_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(FitcacheError::Configuration(format!(
                "duplicate entity id {dup} in feature matrix"
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self
            .feature_names
            .iter()
            .map(String::as_str)
            .find(|name| !seen.insert(*name))
        {
            return Err(FitcacheError::Configuration(format!(
                "duplicate feature {dup} in feature matrix"
            )));
        }
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|f| f == name)
    }

    /// Rows reordered to `names`, failing on the first missing column.
    pub fn select_columns(&self, names: &[String]) -> Result<Vec<Vec<f64>>> {
        let indices = names
            .iter()
            .map(|name| {
                self.column_index(name).ok_or_else(|| {
                    FitcacheError::Configuration(format!("feature {name} missing from matrix"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i]).collect())
            .collect())
    }

    /// Remove a column and return its values.
    fn pop_column(&mut self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        self.feature_names.remove(idx);
        Some(self.rows.iter_mut().map(|row| row.remove(idx)).collect())
    }
}

/// A feature matrix with its labels split out, plus its metadata.
#[derive(Debug, Clone)]
pub struct MatrixStore {
    matrix: FeatureMatrix,
    labels: Vec<bool>,
    metadata: Map<String, Value>,
    as_of_date: NaiveDate,
}

impl MatrixStore {
    /// Build from a matrix that still contains the label column.
    ///
    /// `metadata.label_name` names the label column; `metadata.end_time` is
    /// the as-of date of every prediction made over this matrix.
    pub fn in_memory(matrix_with_label: FeatureMatrix, metadata: Value) -> Result<Self> {
        matrix_with_label.validate()?;
        let metadata = match metadata {
            Value::Object(map) => map,
            _ => {
                return Err(FitcacheError::Configuration(
                    "matrix metadata must be a mapping".to_string(),
                ))
            }
        };

        let label_name = metadata
            .get("label_name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                FitcacheError::Configuration("matrix metadata has no label_name".to_string())
            })?
            .to_string();
        let end_time = metadata
            .get("end_time")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                FitcacheError::Configuration("matrix metadata has no end_time".to_string())
            })?;
        let as_of_date = parse_as_of_date(end_time)?;

        let mut matrix = matrix_with_label;
        let labels = matrix
            .pop_column(&label_name)
            .ok_or_else(|| {
                FitcacheError::Configuration(format!("label column {label_name} not in matrix"))
            })?
            .into_iter()
            .map(|v| v != 0.0)
            .collect();

        Ok(MatrixStore {
            matrix,
            labels,
            metadata,
            as_of_date,
        })
    }

    /// Load a JSON matrix (`entity_ids`, `feature_names`, `rows`) and its
    /// JSON metadata document.
    pub fn from_json_files(matrix_path: impl AsRef<Path>, metadata_path: impl AsRef<Path>) -> Result<Self> {
        let matrix: FeatureMatrix =
            serde_json::from_slice(&std::fs::read(matrix_path.as_ref())?)?;
        let metadata: Value = serde_json::from_slice(&std::fs::read(metadata_path.as_ref())?)?;
        tracing::debug!(
            path = %matrix_path.as_ref().display(),
            rows = matrix.n_rows(),
            "loaded feature matrix"
        );
        Self::in_memory(matrix, metadata)
    }

    /// Features without the label column.
    pub fn matrix(&self) -> &FeatureMatrix {
        &self.matrix
    }

    pub fn labels(&self) -> &[bool] {
        &self.labels
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn as_of_date(&self) -> NaiveDate {
        self.as_of_date
    }
}

fn parse_as_of_date(text: &str) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.date_naive());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|dt| dt.date())
        .ok_or_else(|| FitcacheError::Configuration(format!("unparseable end_time {text}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matrix() -> FeatureMatrix {
        FeatureMatrix::new(
            vec![10, 11, 12],
            vec!["f1".into(), "outcome".into(), "f2".into()],
            vec![vec![1.0, 0.0, 5.0], vec![2.0, 1.0, 6.0], vec![3.0, 2.0, 7.0]],
        )
        .unwrap()
    }

    #[test]
    fn label_column_is_split_out() {
        let store = MatrixStore::in_memory(
            matrix(),
            json!({ "label_name": "outcome", "end_time": "2016-01-01" }),
        )
        .unwrap();
        assert_eq!(store.matrix().feature_names, vec!["f1", "f2"]);
        assert_eq!(store.matrix().rows[1], vec![2.0, 6.0]);
        assert_eq!(store.labels(), &[false, true, true]);
        assert_eq!(store.as_of_date(), NaiveDate::from_ymd_opt(2016, 1, 1).unwrap());
    }

    #[test]
    fn end_time_accepts_datetime_forms() {
        for end_time in ["2016-01-01 00:00:00", "2016-01-01T00:00:00", "2016-01-01T00:00:00Z"] {
            assert_eq!(
                parse_as_of_date(end_time).unwrap(),
                NaiveDate::from_ymd_opt(2016, 1, 1).unwrap()
            );
        }
        assert!(parse_as_of_date("January").is_err());
    }

    #[test]
    fn missing_label_or_end_time_is_configuration_error() {
        for metadata in [
            json!({ "end_time": "2016-01-01" }),
            json!({ "label_name": "outcome" }),
            json!({ "label_name": "nope", "end_time": "2016-01-01" }),
            json!([1, 2]),
        ] {
            assert!(matches!(
                MatrixStore::in_memory(matrix(), metadata),
                Err(FitcacheError::Configuration(_))
            ));
        }
    }

    #[test]
    fn duplicate_entity_ids_rejected() {
        let err = FeatureMatrix::new(vec![1, 1], vec!["f".into()], vec![vec![0.0], vec![1.0]]);
        assert!(matches!(err, Err(FitcacheError::Configuration(msg)) if msg.contains("duplicate entity")));
    }

    #[test]
    fn ragged_rows_rejected() {
        let err = FeatureMatrix::new(vec![1, 2], vec!["f".into()], vec![vec![0.0], vec![1.0, 2.0]]);
        assert!(err.is_err());
    }

    #[test]
    fn select_columns_reorders_and_reports_missing() {
        let m = matrix();
        let rows = m.select_columns(&["f2".into(), "f1".into()]).unwrap();
        assert_eq!(rows[0], vec![5.0, 1.0]);
        assert!(m.select_columns(&["f3".into()]).is_err());
    }

    #[test]
    fn from_json_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let matrix_path = dir.path().join("matrix.json");
        let metadata_path = dir.path().join("metadata.json");
        std::fs::write(&matrix_path, serde_json::to_vec(&matrix()).unwrap()).unwrap();
        std::fs::write(
            &metadata_path,
            br#"{"label_name": "outcome", "end_time": "2017-06-30", "feature_start_time": "2010-01-01"}"#,
        )
        .unwrap();

        let store = MatrixStore::from_json_files(&matrix_path, &metadata_path).unwrap();
        assert_eq!(store.matrix().n_rows(), 3);
        assert_eq!(store.metadata()["feature_start_time"], "2010-01-01");
    }
}
