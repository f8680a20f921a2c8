//! Canonical JSON normalization and fingerprint computation (RFC 8785-class).
//!
//! This module turns any serializable configuration into a stable identity:
//! - UTF-16 code unit ordering for object keys, at every depth (RFC 8785 §3.2.3)
//! - Number normalization (integer-valued floats → integers; reject NaN/Infinity)
//! - Compact JSON, hashed with an explicit [`DigestAlgorithm`], hex encoded
//!
//! Dates and datetimes go through chrono's serde form (`YYYY-MM-DD`, RFC 3339).

use fitcache_state::Fingerprint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::domain::error::{FitcacheError, Result};

/// Hash function applied to the canonical bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    fn digest(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha256 => Sha256::digest(bytes).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(bytes).to_vec(),
        }
    }
}

/// Computes fingerprints with a fixed digest algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fingerprinter {
    algorithm: DigestAlgorithm,
}

impl Fingerprinter {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Fingerprint of `config`'s canonical JSON.
    pub fn fingerprint<T: Serialize + ?Sized>(&self, config: &T) -> Result<Fingerprint> {
        let canonical = canonical_json(&to_config_value(config)?)?;
        Ok(Fingerprint::from_digest(
            &self.algorithm.digest(canonical.as_bytes()),
        ))
    }
}

/// Fingerprint `config` with the default algorithm (SHA-256).
pub fn fingerprint<T: Serialize + ?Sized>(config: &T) -> Result<Fingerprint> {
    Fingerprinter::default().fingerprint(config)
}

/// Lower a serializable configuration to a JSON value.
///
/// serde_json silently maps non-finite floats to `null`, so they are rejected
/// here first.
pub fn to_config_value<T: Serialize + ?Sized>(config: &T) -> Result<serde_json::Value> {
    config
        .serialize(finite::FiniteProbe)
        .map_err(|e| FitcacheError::Configuration(e.to_string()))?;
    Ok(serde_json::to_value(config)?)
}

/// Recursively sort JSON object keys using UTF-16 code unit ordering (RFC 8785 §3.2.3).
///
/// Relies on serde_json's `preserve_order` so the rebuilt map keeps insertion order.
fn sort_keys_utf16(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));

            let mut sorted = serde_json::Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.to_string(), sort_keys_utf16(v));
                }
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(sort_keys_utf16).collect())
        }
        other => other.clone(),
    }
}

/// Normalize numbers: integer-valued floats → integer repr; reject NaN/Infinity.
fn normalize_value(value: &serde_json::Value) -> Result<serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => {
            let mut normalized = serde_json::Map::new();
            for (k, v) in map.iter() {
                normalized.insert(k.clone(), normalize_value(v)?);
            }
            Ok(serde_json::Value::Object(normalized))
        }
        serde_json::Value::Array(arr) => {
            let normalized = arr
                .iter()
                .map(normalize_value)
                .collect::<Result<Vec<_>>>()?;
            Ok(serde_json::Value::Array(normalized))
        }
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => {
            Ok(serde_json::Value::Number(n.clone()))
        }
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if !f.is_finite() => Err(FitcacheError::Configuration(
                "NaN/Infinity not permitted in a configuration".to_string(),
            )),
            // i64::MAX as f64 rounds up to 2^63, which is out of range.
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                Ok(serde_json::Value::Number(serde_json::Number::from(f as i64)))
            }
            _ => Ok(serde_json::Value::Number(n.clone())),
        },
        other => Ok(other.clone()),
    }
}

/// Convert JSON value to canonical form: normalize numbers → sort keys → compact JSON.
pub fn canonical_json(value: &serde_json::Value) -> Result<String> {
    let normalized = normalize_value(value)?;
    let sorted = sort_keys_utf16(&normalized);
    Ok(serde_json::to_string(&sorted)?)
}

/// A serializer that produces nothing and fails on the first non-finite float.
mod finite {
    use serde::ser::{self, Serialize};
    use std::fmt;

    #[derive(Debug)]
    pub struct NonFinite(String);

    impl fmt::Display for NonFinite {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl std::error::Error for NonFinite {}

    impl ser::Error for NonFinite {
        fn custom<T: fmt::Display>(msg: T) -> Self {
            NonFinite(msg.to_string())
        }
    }

    type Probe = std::result::Result<(), NonFinite>;

    #[derive(Clone, Copy)]
    pub struct FiniteProbe;

    fn check(v: f64) -> Probe {
        if v.is_finite() {
            Ok(())
        } else {
            Err(NonFinite(format!(
                "non-finite number {v} not permitted in a configuration"
            )))
        }
    }

    impl ser::Serializer for FiniteProbe {
        type Ok = ();
        type Error = NonFinite;
        type SerializeSeq = Self;
        type SerializeTuple = Self;
        type SerializeTupleStruct = Self;
        type SerializeTupleVariant = Self;
        type SerializeMap = Self;
        type SerializeStruct = Self;
        type SerializeStructVariant = Self;

        fn serialize_bool(self, _: bool) -> Probe {
            Ok(())
        }
        fn serialize_i8(self, _: i8) -> Probe {
            Ok(())
        }
        fn serialize_i16(self, _: i16) -> Probe {
            Ok(())
        }
        fn serialize_i32(self, _: i32) -> Probe {
            Ok(())
        }
        fn serialize_i64(self, _: i64) -> Probe {
            Ok(())
        }
        fn serialize_u8(self, _: u8) -> Probe {
            Ok(())
        }
        fn serialize_u16(self, _: u16) -> Probe {
            Ok(())
        }
        fn serialize_u32(self, _: u32) -> Probe {
            Ok(())
        }
        fn serialize_u64(self, _: u64) -> Probe {
            Ok(())
        }
        fn serialize_f32(self, v: f32) -> Probe {
            check(f64::from(v))
        }
        fn serialize_f64(self, v: f64) -> Probe {
            check(v)
        }
        fn serialize_char(self, _: char) -> Probe {
            Ok(())
        }
        fn serialize_str(self, _: &str) -> Probe {
            Ok(())
        }
        fn serialize_bytes(self, _: &[u8]) -> Probe {
            Ok(())
        }
        fn serialize_none(self) -> Probe {
            Ok(())
        }
        fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Probe {
            value.serialize(self)
        }
        fn serialize_unit(self) -> Probe {
            Ok(())
        }
        fn serialize_unit_struct(self, _: &'static str) -> Probe {
            Ok(())
        }
        fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Probe {
            Ok(())
        }
        fn serialize_newtype_struct<T: ?Sized + Serialize>(
            self,
            _: &'static str,
            value: &T,
        ) -> Probe {
            value.serialize(self)
        }
        fn serialize_newtype_variant<T: ?Sized + Serialize>(
            self,
            _: &'static str,
            _: u32,
            _: &'static str,
            value: &T,
        ) -> Probe {
            value.serialize(self)
        }
        fn serialize_seq(self, _: Option<usize>) -> Result<Self, NonFinite> {
            Ok(self)
        }
        fn serialize_tuple(self, _: usize) -> Result<Self, NonFinite> {
            Ok(self)
        }
        fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Self, NonFinite> {
            Ok(self)
        }
        fn serialize_tuple_variant(
            self,
            _: &'static str,
            _: u32,
            _: &'static str,
            _: usize,
        ) -> Result<Self, NonFinite> {
            Ok(self)
        }
        fn serialize_map(self, _: Option<usize>) -> Result<Self, NonFinite> {
            Ok(self)
        }
        fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self, NonFinite> {
            Ok(self)
        }
        fn serialize_struct_variant(
            self,
            _: &'static str,
            _: u32,
            _: &'static str,
            _: usize,
        ) -> Result<Self, NonFinite> {
            Ok(self)
        }
    }

    impl ser::SerializeSeq for FiniteProbe {
        type Ok = ();
        type Error = NonFinite;
        fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Probe {
            value.serialize(*self)
        }
        fn end(self) -> Probe {
            Ok(())
        }
    }

    impl ser::SerializeTuple for FiniteProbe {
        type Ok = ();
        type Error = NonFinite;
        fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Probe {
            value.serialize(*self)
        }
        fn end(self) -> Probe {
            Ok(())
        }
    }

    impl ser::SerializeTupleStruct for FiniteProbe {
        type Ok = ();
        type Error = NonFinite;
        fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Probe {
            value.serialize(*self)
        }
        fn end(self) -> Probe {
            Ok(())
        }
    }

    impl ser::SerializeTupleVariant for FiniteProbe {
        type Ok = ();
        type Error = NonFinite;
        fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Probe {
            value.serialize(*self)
        }
        fn end(self) -> Probe {
            Ok(())
        }
    }

    impl ser::SerializeMap for FiniteProbe {
        type Ok = ();
        type Error = NonFinite;
        fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Probe {
            key.serialize(*self)
        }
        fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Probe {
            value.serialize(*self)
        }
        fn end(self) -> Probe {
            Ok(())
        }
    }

    impl ser::SerializeStruct for FiniteProbe {
        type Ok = ();
        type Error = NonFinite;
        fn serialize_field<T: ?Sized + Serialize>(&mut self, _: &'static str, value: &T) -> Probe {
            value.serialize(*self)
        }
        fn end(self) -> Probe {
            Ok(())
        }
    }

    impl ser::SerializeStructVariant for FiniteProbe {
        type Ok = ();
        type Error = NonFinite;
        fn serialize_field<T: ?Sized + Serialize>(&mut self, _: &'static str, value: &T) -> Probe {
            value.serialize(*self)
        }
        fn end(self) -> Probe {
            Ok(())
        }
    }
}
