//! Hex Encoding Utilities
//!
//! The messaging surface writes byte buffers as `0x`-prefixed hex and
//! accepts them with or without the prefix.

use crate::error::ValidationError;

/// Drop a leading `0x`/`0X`
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Encode bytes as `0x`-prefixed lowercase hex
pub fn to_prefixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode a caller-supplied hex field, naming the field on failure
pub fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, ValidationError> {
    hex::decode(strip_hex_prefix(value.trim())).map_err(|e| ValidationError::invalid_hex(field, e))
}
