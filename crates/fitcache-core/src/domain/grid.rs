//! Hyperparameter grid specification and lazy cartesian expansion.
//!
//! A grid is a JSON mapping `model identifier → { hyperparameter → [candidates] }`.
//! Expansion walks identifiers in document order; within one identifier the
//! hyperparameter names are sorted and the last name varies fastest.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::{FitcacheError, Result};

/// One concrete configuration produced by expanding a [`GridSpec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub model_type: String,
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
struct GridEntry {
    model_type: String,
    /// Sorted by hyperparameter name; every candidate list is non-empty.
    axes: Vec<(String, Vec<Value>)>,
}

impl GridEntry {
    fn point(&self, counters: &[usize]) -> GridPoint {
        let parameters = self
            .axes
            .iter()
            .zip(counters)
            .map(|((name, values), &i)| (name.clone(), values[i].clone()))
            .collect();
        GridPoint {
            model_type: self.model_type.clone(),
            parameters,
        }
    }

    fn combinations(&self) -> usize {
        self.axes.iter().map(|(_, values)| values.len()).product()
    }
}

/// Validated hyperparameter grid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct GridSpec {
    entries: Vec<GridEntry>,
}

impl GridSpec {
    /// Validate a grid document.
    pub fn from_value(value: Value) -> Result<Self> {
        let models = match value {
            Value::Object(models) => models,
            other => {
                return Err(FitcacheError::Configuration(format!(
                    "grid must be a mapping of model identifier to hyperparameters, got {}",
                    json_kind(&other)
                )));
            }
        };

        let mut entries = Vec::with_capacity(models.len());
        for (model_type, params) in models {
            let params = match params {
                Value::Object(params) => params,
                other => {
                    return Err(FitcacheError::Configuration(format!(
                        "hyperparameters for {model_type} must be a mapping, got {}",
                        json_kind(&other)
                    )));
                }
            };

            let mut axes = Vec::with_capacity(params.len());
            for (name, candidates) in params {
                match candidates {
                    Value::Array(values) if values.is_empty() => {
                        return Err(FitcacheError::Configuration(format!(
                            "{model_type}.{name} has an empty candidate list"
                        )));
                    }
                    Value::Array(values) => axes.push((name, values)),
                    other => {
                        return Err(FitcacheError::Configuration(format!(
                            "{model_type}.{name} must be a list of candidates, got {}",
                            json_kind(&other)
                        )));
                    }
                }
            }
            axes.sort_by(|a, b| a.0.cmp(&b.0));
            entries.push(GridEntry { model_type, axes });
        }
        Ok(GridSpec { entries })
    }

    /// Parse and validate a grid from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Model identifiers in document order.
    pub fn model_types(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.model_type.as_str())
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.entries.iter().map(GridEntry::combinations).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start a fresh expansion.
    pub fn expand(&self) -> GridPoints<'_> {
        GridPoints {
            spec: self,
            entry: 0,
            counters: Vec::new(),
            fresh: true,
        }
    }
}

impl TryFrom<Value> for GridSpec {
    type Error = FitcacheError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl<'a> IntoIterator for &'a GridSpec {
    type Item = GridPoint;
    type IntoIter = GridPoints<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.expand()
    }
}

/// Lazy odometer over every grid point.
pub struct GridPoints<'a> {
    spec: &'a GridSpec,
    entry: usize,
    counters: Vec<usize>,
    fresh: bool,
}

impl Iterator for GridPoints<'_> {
    type Item = GridPoint;

    fn next(&mut self) -> Option<GridPoint> {
        loop {
            let entry = self.spec.entries.get(self.entry)?;

            if self.fresh {
                self.fresh = false;
                self.counters = vec![0; entry.axes.len()];
                return Some(entry.point(&self.counters));
            }

            // Increment from the last axis, carrying leftwards.
            let mut axis = entry.axes.len();
            while axis > 0 {
                axis -= 1;
                self.counters[axis] += 1;
                if self.counters[axis] < entry.axes[axis].1.len() {
                    return Some(entry.point(&self.counters));
                }
                self.counters[axis] = 0;
            }

            self.entry += 1;
            self.fresh = true;
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(points: &[GridPoint]) -> Vec<Value> {
        points
            .iter()
            .map(|p| Value::Object(p.parameters.clone()))
            .collect()
    }

    #[test]
    fn test_last_sorted_name_varies_fastest() {
        let spec = GridSpec::from_value(json!({
            "m": { "max_depth": [1, 5], "criterion": ["gini", "entropy"] }
        }))
        .unwrap();
        let points: Vec<_> = spec.expand().collect();
        assert_eq!(
            params(&points),
            vec![
                json!({ "criterion": "gini", "max_depth": 1 }),
                json!({ "criterion": "gini", "max_depth": 5 }),
                json!({ "criterion": "entropy", "max_depth": 1 }),
                json!({ "criterion": "entropy", "max_depth": 5 }),
            ]
        );
    }

    #[test]
    fn test_identifiers_in_document_order() {
        let spec = GridSpec::from_value(json!({
            "zeta": { "a": [1, 2] },
            "alpha": { "b": [1] }
        }))
        .unwrap();
        let types: Vec<_> = spec.expand().map(|p| p.model_type).collect();
        assert_eq!(types, vec!["zeta", "zeta", "alpha"]);
        assert_eq!(spec.model_types().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_count_is_sum_of_products() {
        let spec = GridSpec::from_value(json!({
            "a": { "x": [1, 2, 3], "y": [1, 2], "z": ["p"] },
            "b": { "x": [1, 2, 3, 4] },
            "c": {}
        }))
        .unwrap();
        assert_eq!(spec.len(), 3 * 2 + 4 + 1);
        assert_eq!(spec.expand().count(), spec.len());
    }

    #[test]
    fn test_every_combination_exactly_once() {
        let spec = GridSpec::from_value(json!({
            "a": { "x": [1, 2, 3], "y": [true, false], "z": [null, "s"] }
        }))
        .unwrap();
        let seen: Vec<String> = spec
            .expand()
            .map(|p| serde_json::to_string(&p.parameters).unwrap())
            .collect();
        let unique: std::collections::HashSet<_> = seen.iter().collect();
        assert_eq!(seen.len(), 12);
        assert_eq!(unique.len(), 12);
    }

    #[test]
    fn test_empty_inner_mapping_yields_one_empty_point() {
        let spec = GridSpec::from_value(json!({ "fitcache.baseline.PriorRate": {} })).unwrap();
        let points: Vec<_> = spec.expand().collect();
        assert_eq!(points.len(), 1);
        assert!(points[0].parameters.is_empty());
    }

    #[test]
    fn test_expand_is_restartable() {
        let spec = GridSpec::from_value(json!({ "a": { "x": [1, 2] } })).unwrap();
        let first: Vec<_> = spec.expand().collect();
        let second: Vec<_> = (&spec).into_iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_grid_expands_to_nothing() {
        let spec = GridSpec::from_value(json!({})).unwrap();
        assert!(spec.is_empty());
        assert_eq!(spec.expand().next(), None);
    }

    #[test]
    fn test_invalid_grids_rejected_at_construction() {
        let bad = [
            json!(["not", "a", "mapping"]),
            json!({ "a": [1, 2] }),
            json!({ "a": { "x": 3 } }),
            json!({ "a": { "x": [] } }),
        ];
        for grid in bad {
            assert!(
                matches!(GridSpec::from_value(grid.clone()), Err(FitcacheError::Configuration(_))),
                "{grid}"
            );
        }
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: GridSpec = serde_json::from_str(r#"{"a": {"x": [1]}}"#).unwrap();
        assert_eq!(ok.len(), 1);
        assert!(serde_json::from_str::<GridSpec>(r#"{"a": {"x": 1}}"#).is_err());
    }
}
