// crates/arc-core/src/core/hashing.rs
// ============================================================================
// Module: Canonical JSON Hashing
// Description: Deterministic canonical-JSON encoding and digesting.
// Purpose: Bind manifests, diffs, and attestations to their exact inputs
//          regardless of key order or numeric spelling.
// Dependencies: serde_json, sha2
// ============================================================================

//! ## Overview
//! [`canonical_json_bytes`] produces a byte-stable encoding of a
//! [`serde_json::Value`]: object keys are sorted, and numbers are normalized
//! so `1` and `1.0` hash identically. [`hash_canonical_json`] and
//! [`hash_bytes`] wrap that encoding with a digest algorithm. This is what
//! makes `manifest_hash` and `diff_hash` reproducible byte-for-byte given
//! identical logical inputs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    /// SHA-256.
    #[default]
    Sha256,
}

/// A hex-encoded digest, tagged with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashDigest {
    /// Algorithm used to compute the digest.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex-encoded digest bytes.
    pub hex: String,
}

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Canonical hashing errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    /// The value contained a non-finite float (`NaN` or infinite), which has
    /// no canonical JSON representation.
    #[error("cannot canonicalize non-finite float")]
    NonFiniteFloat,
    /// Serialization to JSON failed.
    #[error("serialization failed: {0}")]
    Serialize(String),
    /// The canonical encoding exceeded the caller-supplied size limit.
    #[error("canonical encoding too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual encoded size in bytes.
        actual_bytes: usize,
    },
}

// ============================================================================
// SECTION: Canonicalization
// ============================================================================

/// Encodes `value` as canonical JSON bytes: object keys sorted
/// lexicographically at every level, numbers normalized, no insignificant
/// whitespace.
///
/// # Errors
///
/// Returns [`HashError::NonFiniteFloat`] if any number in `value` is `NaN`
/// or infinite.
pub fn canonical_json_bytes(value: &Value) -> Result<Vec<u8>, HashError> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out.into_bytes())
}

/// Writes the canonical form of `value` into `out`.
fn write_canonical(value: &Value, out: &mut String) -> Result<(), HashError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            if let Some(f) = n.as_f64()
                && !f.is_finite()
            {
                return Err(HashError::NonFiniteFloat);
            }
            out.push_str(&normalize_number(n));
        }
        Value::String(s) => {
            let encoded = serde_json::to_string(s).map_err(|e| HashError::Serialize(e.to_string()))?;
            out.push_str(&encoded);
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let encoded_key =
                    serde_json::to_string(key).map_err(|e| HashError::Serialize(e.to_string()))?;
                out.push_str(&encoded_key);
                out.push(':');
                write_canonical(&map[*key], out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

/// Normalizes a JSON number so integral floats (`1.0`) and integers (`1`)
/// produce the same text.
fn normalize_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    if let Some(f) = n.as_f64() {
        #[allow(clippy::cast_possible_truncation, reason = "exactness checked before truncation")]
        if f.fract() == 0.0 && f.abs() < 1e15 {
            return (f as i64).to_string();
        }
        return format!("{f}");
    }
    n.to_string()
}

// ============================================================================
// SECTION: Digesting
// ============================================================================

/// Hashes raw bytes with the given algorithm.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            let digest = hasher.finalize();
            HashDigest {
                algorithm,
                hex: hex::encode(digest),
            }
        }
    }
}

/// Hashes the canonical JSON encoding of `value`.
///
/// # Errors
///
/// Returns [`HashError`] when `value` cannot be canonicalized.
pub fn hash_canonical_json(algorithm: HashAlgorithm, value: &Value) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(algorithm, &bytes))
}

/// Hashes the canonical JSON encoding of `value`, rejecting encodings larger
/// than `max_bytes`.
///
/// # Errors
///
/// Returns [`HashError::TooLarge`] when the canonical encoding exceeds
/// `max_bytes`, or another [`HashError`] variant if canonicalization fails.
pub fn hash_canonical_json_with_limit(
    algorithm: HashAlgorithm,
    value: &Value,
    max_bytes: usize,
) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes(value)?;
    if bytes.len() > max_bytes {
        return Err(HashError::TooLarge {
            max_bytes,
            actual_bytes: bytes.len(),
        });
    }
    Ok(hash_bytes(algorithm, &bytes))
}

/// Hashes the canonical JSON encoding of any `Serialize` value.
///
/// # Errors
///
/// Returns [`HashError::Serialize`] when `value` cannot be converted to JSON,
/// or another [`HashError`] variant if canonicalization fails.
pub fn hash_canonical<T: Serialize>(algorithm: HashAlgorithm, value: &T) -> Result<HashDigest, HashError> {
    let json = serde_json::to_value(value).map_err(|e| HashError::Serialize(e.to_string()))?;
    hash_canonical_json(algorithm, &json)
}

#[cfg(test)]
mod tests {
    use serde_json::Map;
    use serde_json::Value;
    use serde_json::json;

    use super::HashAlgorithm;
    use super::HashError;
    use super::canonical_json_bytes;
    use super::hash_canonical_json;
    use super::hash_canonical_json_with_limit;

    #[test]
    fn canonical_hash_is_order_independent_for_maps() {
        let mut map_a = Map::new();
        map_a.insert("b".to_string(), json!(2));
        map_a.insert("a".to_string(), json!(1));

        let mut map_b = Map::new();
        map_b.insert("a".to_string(), json!(1));
        map_b.insert("b".to_string(), json!(2));

        let hash_a = hash_canonical_json(HashAlgorithm::Sha256, &Value::Object(map_a)).expect("hash a");
        let hash_b = hash_canonical_json(HashAlgorithm::Sha256, &Value::Object(map_b)).expect("hash b");

        assert_eq!(hash_a, hash_b);
    }

    #[test]
    fn canonical_hash_normalizes_numeric_representation() {
        let hash_a = hash_canonical_json(HashAlgorithm::Sha256, &json!(1.0)).expect("hash a");
        let hash_b = hash_canonical_json(HashAlgorithm::Sha256, &json!(1)).expect("hash b");
        assert_eq!(hash_a, hash_b);
    }

    #[test]
    fn non_finite_float_is_rejected() {
        let value = json!({"x": f64::NAN});
        let err = canonical_json_bytes(&value).unwrap_err();
        assert_eq!(err, HashError::NonFiniteFloat);
    }

    #[test]
    fn oversized_encoding_is_rejected() {
        let value = json!({"x": "y".repeat(100)});
        let err = hash_canonical_json_with_limit(HashAlgorithm::Sha256, &value, 8).unwrap_err();
        assert!(matches!(err, HashError::TooLarge { .. }));
    }
}
