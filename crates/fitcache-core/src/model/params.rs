//! Typed access to a grid point's hyperparameters.

use serde_json::{Map, Value};

use super::FitError;

/// Reads hyperparameters by name and rejects any the family does not know.
pub(super) struct Hyperparameters<'a> {
    params: &'a Map<String, Value>,
}

impl<'a> Hyperparameters<'a> {
    /// Fails on the first name not in `known`.
    pub fn new(params: &'a Map<String, Value>, known: &[&str]) -> Result<Self, FitError> {
        if let Some(name) = params.keys().find(|k| !known.contains(&k.as_str())) {
            return Err(FitError::UnknownHyperparameter { name: name.clone() });
        }
        Ok(Self { params })
    }

    pub fn f64_at_least(&self, name: &str, default: f64, min: f64, inclusive: bool) -> Result<f64, FitError> {
        let value = match self.params.get(name) {
            None => return Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| invalid(name, "expected a number"))?,
        };
        let ok = if inclusive { value >= min } else { value > min };
        if !ok {
            let op = if inclusive { ">=" } else { ">" };
            return Err(invalid(name, &format!("must be {op} {min}, got {value}")));
        }
        Ok(value)
    }

    pub fn usize_at_least(&self, name: &str, default: usize, min: usize) -> Result<usize, FitError> {
        let value = match self.params.get(name) {
            None => return Ok(default),
            Some(v) => as_whole_number(v).ok_or_else(|| invalid(name, "expected a whole number"))?,
        };
        if value < min as u64 {
            return Err(invalid(name, &format!("must be >= {min}, got {value}")));
        }
        usize::try_from(value).map_err(|_| invalid(name, "out of range"))
    }
}

/// Accepts `5` and `5.0` alike; grids are often written with floats.
fn as_whole_number(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

fn invalid(name: &str, reason: &str) -> FitError {
    FitError::InvalidHyperparameter {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
