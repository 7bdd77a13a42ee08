//! Deduplication key derivation
//!
//! Payloads are reduced to a canonical text form and hashed with SHA-256.
//! Object keys are sorted recursively so field order never changes the key;
//! strings are hashed as their raw value.

use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Deterministic identifier of a logical request
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey(String);

impl DedupKey {
    /// Derive a key from any serializable payload
    pub fn from_request<R: Serialize + ?Sized>(request: &R) -> Result<Self> {
        let value = serde_json::to_value(request)?;
        Ok(Self::from_value(&value))
    }

    /// Derive a key from an already parsed JSON value
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(raw) => Self::digest("raw", raw),
            other => {
                let mut canonical = String::new();
                write_canonical(other, &mut canonical);
                Self::digest("json", &canonical)
            }
        }
    }

    /// Hex digest of the key
    pub fn as_str(&self) -> &str {
        &self.0
    }

    // The domain label keeps the string "1" apart from the number 1
    fn digest(domain: &str, canonical: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain.as_bytes());
        hasher.update([0u8]);
        hasher.update(canonical.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
