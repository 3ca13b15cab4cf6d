//! Order-stable digests of query result sets

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::types::{ResultSet, Value};

/// Hex-encoded SHA-256 of a canonical result-set encoding
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSetDigest(String);

impl ResultSetDigest {
    /// Compute the digest of a result set.
    ///
    /// Column names and every cell are fed to the hasher type-tagged and
    /// length-prefixed, so `("ab", "c")` and `("a", "bc")` never collide and
    /// `NULL` differs from the text `"NULL"`. Row order is significant.
    pub fn of(set: &ResultSet) -> Self {
        let mut hasher = Sha256::new();

        hasher.update((set.columns.len() as u64).to_be_bytes());
        for column in &set.columns {
            write_bytes(&mut hasher, column.as_bytes());
        }

        hasher.update((set.rows.len() as u64).to_be_bytes());
        for row in &set.rows {
            hasher.update((row.len() as u64).to_be_bytes());
            for value in row {
                write_value(&mut hasher, value);
            }
        }

        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResultSetDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn write_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

fn write_value(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Null => hasher.update([0u8]),
        Value::Integer(i) => {
            hasher.update([1u8]);
            hasher.update(i.to_be_bytes());
        }
        Value::Real(r) => {
            hasher.update([2u8]);
            hasher.update(r.to_bits().to_be_bytes());
        }
        Value::Text(s) => {
            hasher.update([3u8]);
            write_bytes(hasher, s.as_bytes());
        }
        Value::Blob(b) => {
            hasher.update([4u8]);
            write_bytes(hasher, b);
        }
    }
}
