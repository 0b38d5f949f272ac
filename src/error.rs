//! Unified error types for the delegated signer
//!
//! Every pipeline failure is one of a small set of tagged kinds so callers
//! can tell "unsupported device", "bad input data" and "signer refused"
//! apart without inspecting message text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for all signing operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignerError {
    /// Hardware-backed signing was requested. No remote call was made.
    #[error("operation not supported: {0}")]
    UnsupportedCapability(String),

    /// The caller's payload is inconsistent with the network or the account.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The remote signer refused; the descriptor is carried verbatim.
    #[error("remote signer error: {0}")]
    RemoteSign(ErrorDescriptor),

    /// Signatures were collected but the inputs could not be finalized.
    #[error("finalization failed: {0}")]
    Finalization(String),

    /// The remote signer answered with something that is not a signature.
    #[error("malformed signer response: {0}")]
    MalformedResponse(String),

    /// The signing channel itself failed.
    #[error("signing channel failed: {0}")]
    Transport(String),

    /// Signer settings could not be loaded or are unusable.
    #[error("invalid settings: {0}")]
    Configuration(String),
}

impl SignerError {
    pub fn hardware_not_implemented() -> Self {
        Self::UnsupportedCapability("btc-hardware not implemented".to_string())
    }

    pub fn finalization(msg: impl Into<String>) -> Self {
        Self::Finalization(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Stable code for the outbound envelope
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedCapability(_) => ErrorCode::UnsupportedCapability,
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::RemoteSign(_) => ErrorCode::RemoteSignError,
            Self::Finalization(_) => ErrorCode::FinalizationError,
            Self::MalformedResponse(_) => ErrorCode::MalformedResponse,
            Self::Transport(_) => ErrorCode::TransportError,
            Self::Configuration(_) => ErrorCode::ConfigurationError,
        }
    }

    /// Render for the `{ "error": ... }` half of a reply.
    ///
    /// Remote errors are passed through unchanged; everything else gets a
    /// code and a human-readable message.
    pub fn to_body(&self) -> ErrorBody {
        match self {
            Self::RemoteSign(descriptor) => ErrorBody::Remote(descriptor.clone()),
            other => ErrorBody::Local {
                code: other.code(),
                message: other.to_string(),
            },
        }
    }
}

/// Payload problems detected before any remote call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("input {index}: witness network requires witnessUtxo")]
    MissingWitnessUtxo { index: usize },

    #[error("input {index}: legacy network requires raw previous transaction")]
    MissingRawTransaction { index: usize },

    #[error("input {index}: both witnessUtxo and raw supplied")]
    UnexpectedUtxoVariant { index: usize },

    #[error("invalid hex in {field}: {reason}")]
    InvalidHex { field: String, reason: String },

    #[error("input {index}: invalid previous transaction hash")]
    InvalidTxid { index: usize },

    #[error("input {index}: raw previous transaction does not match outpoint")]
    PrevoutMismatch { index: usize },

    #[error("output {index}: {reason}")]
    InvalidOutput { index: usize, reason: String },

    #[error("invalid account public key: {0}")]
    InvalidPublicKey(String),

    #[error("input {index}: account key cannot sign this input")]
    KeyMismatch { index: usize },

    #[error("outputs ({outputs} sat) spend more than inputs ({inputs} sat)")]
    SpendsMoreThanInputs { inputs: u64, outputs: u64 },

    #[error("fee rate {fee_rate} sat/vB exceeds maximum {max_fee_rate} sat/vB")]
    FeeRateExceeded { fee_rate: u64, max_fee_rate: u64 },

    #[error("input {index}: cannot compute sighash: {reason}")]
    Sighash { index: usize, reason: String },

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),
}

impl ValidationError {
    pub fn invalid_hex(field: impl Into<String>, e: hex::FromHexError) -> Self {
        Self::InvalidHex {
            field: field.into(),
            reason: e.to_string(),
        }
    }
}

/// Error object returned by the remote signer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ErrorDescriptor {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }
}

impl std::fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Error half of the outbound envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorBody {
    Local { code: ErrorCode, message: String },
    Remote(ErrorDescriptor),
}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    UnsupportedCapability,
    ValidationError,
    RemoteSignError,
    FinalizationError,
    MalformedResponse,
    TransportError,
    ConfigurationError,
}

/// Result type alias for signing operations
pub type SignerResult<T> = Result<T, SignerError>;

impl From<hex::FromHexError> for SignerError {
    fn from(e: hex::FromHexError) -> Self {
        SignerError::Validation(ValidationError::invalid_hex("hex", e))
    }
}

impl From<serde_json::Error> for SignerError {
    fn from(e: serde_json::Error) -> Self {
        SignerError::MalformedResponse(format!("JSON error: {}", e))
    }
}
