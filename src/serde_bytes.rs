//! Serde helpers for byte payloads
//!
//! Byte buffers travel as hex strings on the messaging surface.

use serde::{Deserialize, Deserializer, Serializer};

/// Serialize/deserialize Vec<u8> as hex string, `0x` prefix optional on input
pub mod hex_vec {
    use super::*;
    use crate::utils::encoding::{strip_hex_prefix, to_prefixed_hex};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&to_prefixed_hex(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(strip_hex_prefix(&s)).map_err(serde::de::Error::custom)
    }
}
