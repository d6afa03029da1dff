use envm_core::errors::EnvmError;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::serde::to_canonical_json_bytes;

/// Computes a stable hexadecimal SHA-256 of the canonical JSON encoding.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, EnvmError> {
    let bytes = to_canonical_json_bytes(value)?;
    Ok(format!("{:x}", Sha256::digest(bytes)))
}

/// Rounds to the precision used in hashed payloads, so last-bit noise from
/// parallel reductions does not change a report hash.
pub fn round_f64(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    (value * 1e9).round() / 1e9
}
