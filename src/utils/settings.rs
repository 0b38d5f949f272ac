//! Signer Configuration
//!
//! Settings shared by both pipelines, with presets and JSON loading.
//! Every field has a default so partial JSON documents are accepted.

use crate::error::{SignerError, SignerResult};
use serde::{Deserialize, Serialize};

/// Fee-rate ceiling used when the network info carries none (sat/vB)
pub const DEFAULT_MAX_FEE_RATE: u64 = 5_000;

/// Signer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignerSettings {
    /// Fee-rate ceiling applied when `NetworkInfo::max_fee_rate` is unset
    pub default_max_fee_rate: u64,
    /// Version of the unsigned transaction
    pub tx_version: i32,
    /// nSequence for every input
    pub sequence: u32,
    /// Require the account key to match each input's script before signing
    pub enforce_key_match: bool,
    /// Accept recovery ids in the 27..=30 range and shift them to 0..=3
    pub normalize_recovery_id: bool,
    /// Set the compressed-key flag in message signature headers
    pub compressed_message_signature: bool,
}

impl Default for SignerSettings {
    fn default() -> Self {
        Self::standard()
    }
}

impl SignerSettings {
    /// Standard preset
    pub fn standard() -> Self {
        Self {
            default_max_fee_rate: DEFAULT_MAX_FEE_RATE,
            tx_version: 2,
            sequence: 0xffff_ffff,
            enforce_key_match: true,
            normalize_recovery_id: true,
            compressed_message_signature: false,
        }
    }

    /// Strict preset: low fee ceiling, only raw 0..=3 recovery ids
    pub fn strict() -> Self {
        Self {
            default_max_fee_rate: 1_000,
            normalize_recovery_id: false,
            ..Self::standard()
        }
    }

    /// Load from JSON; missing fields take the standard values
    pub fn from_json(json: &str) -> SignerResult<Self> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| SignerError::configuration(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that would make every transaction unsignable
    pub fn validate(&self) -> SignerResult<()> {
        if self.default_max_fee_rate == 0 {
            return Err(SignerError::configuration("defaultMaxFeeRate must be greater than zero"));
        }
        if !(1..=2).contains(&self.tx_version) {
            return Err(SignerError::configuration(format!(
                "unsupported transaction version {}",
                self.tx_version
            )));
        }
        Ok(())
    }
}
