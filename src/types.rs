//! Shared types for the delegated signer
//!
//! All data structures that cross module boundaries are defined here
//! so the inbound payloads and outbound replies serialize consistently.

use crate::error::{ErrorBody, SignerError, ValidationError};
use crate::utils::encoding::strip_hex_prefix;
use bitcoin::{Network, PublicKey};
use serde::{Deserialize, Serialize};

// =============================================================================
// Account
// =============================================================================

/// Identity used for signing.
///
/// `address` holds the hex-encoded public key. Any other fields the caller
/// attaches are opaque to this crate and forwarded to the remote signer
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub address: String,
    #[serde(default)]
    pub is_hardware: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Account {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            is_hardware: false,
            extra: serde_json::Map::new(),
        }
    }

    pub fn hardware(address: impl Into<String>) -> Self {
        Self {
            is_hardware: true,
            ..Self::new(address)
        }
    }

    /// Attach an opaque field that travels with the account
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Parse the account's public key
    pub fn public_key(&self) -> Result<PublicKey, ValidationError> {
        let bytes = hex::decode(strip_hex_prefix(self.address.trim()))
            .map_err(|e| ValidationError::InvalidPublicKey(format!("account.address: {}", e)))?;
        PublicKey::from_slice(&bytes).map_err(|e| ValidationError::InvalidPublicKey(e.to_string()))
    }

    /// Both pipelines refuse hardware accounts before doing anything else
    pub fn ensure_software(&self) -> Result<(), SignerError> {
        if self.is_hardware {
            return Err(SignerError::hardware_not_implemented());
        }
        Ok(())
    }
}

// =============================================================================
// Network
// =============================================================================

/// Script scheme used to lock the account's coins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    /// Native SegWit v0 key hash
    P2WPKH,
    /// Legacy key hash
    P2PKH,
}

impl PaymentType {
    pub fn is_witness(&self) -> bool {
        matches!(self, PaymentType::P2WPKH)
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentType::P2WPKH => write!(f, "p2wpkh"),
            PaymentType::P2PKH => write!(f, "p2pkh"),
        }
    }
}

/// Chain parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub name: String,
    pub network: Network,
    /// Fee-rate ceiling in sat/vB. Falls back to the settings default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_rate: Option<u64>,
}

impl NetworkInfo {
    pub fn bitcoin() -> Self {
        Self {
            name: "Bitcoin".to_string(),
            network: Network::Bitcoin,
            max_fee_rate: Some(5_000),
        }
    }

    pub fn testnet() -> Self {
        Self {
            name: "Bitcoin Testnet".to_string(),
            network: Network::Testnet,
            max_fee_rate: Some(5_000),
        }
    }

    pub fn signet() -> Self {
        Self {
            name: "Bitcoin Signet".to_string(),
            network: Network::Signet,
            max_fee_rate: Some(5_000),
        }
    }

    pub fn regtest() -> Self {
        Self {
            name: "Bitcoin Regtest".to_string(),
            network: Network::Regtest,
            max_fee_rate: Some(100_000),
        }
    }
}

/// Network the transaction is built for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDescriptor {
    pub network_info: NetworkInfo,
    pub payment_type: PaymentType,
}

impl NetworkDescriptor {
    pub fn new(network_info: NetworkInfo) -> Self {
        Self {
            network_info,
            payment_type: PaymentType::P2WPKH,
        }
    }

    pub fn with_payment_type(mut self, payment_type: PaymentType) -> Self {
        self.payment_type = payment_type;
        self
    }

    pub fn network(&self) -> Network {
        self.network_info.network
    }
}

// =============================================================================
// Transaction Payload
// =============================================================================

/// Witness descriptor of a spent output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessUtxo {
    /// scriptPubKey, hex
    pub script: String,
    /// Amount in satoshis
    pub value: u64,
}

/// One spendable input as supplied by the caller.
///
/// Exactly one of `witness_utxo` / `raw` must be set, matching the
/// network's payment type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoReference {
    /// Previous transaction id, display (big-endian) hex
    pub hash: String,
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness_utxo: Option<WitnessUtxo>,
    /// Full previous transaction, hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl UtxoReference {
    pub fn witness(hash: impl Into<String>, index: u32, script: impl Into<String>, value: u64) -> Self {
        Self {
            hash: hash.into(),
            index,
            witness_utxo: Some(WitnessUtxo {
                script: script.into(),
                value,
            }),
            raw: None,
        }
    }

    pub fn legacy(hash: impl Into<String>, index: u32, raw: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            index,
            witness_utxo: None,
            raw: Some(raw.into()),
        }
    }
}

/// Output as supplied by the caller: either an address or a raw script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    pub value: u64,
}

impl OutputDescriptor {
    pub fn to_address(address: impl Into<String>, value: u64) -> Self {
        Self {
            address: Some(address.into()),
            script: None,
            value,
        }
    }

    pub fn to_script(script_hex: impl Into<String>, value: u64) -> Self {
        Self {
            address: None,
            script: Some(script_hex.into()),
            value,
        }
    }
}

/// Ordered inputs and outputs of the transaction to sign
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPayload {
    pub inputs: Vec<UtxoReference>,
    pub outputs: Vec<OutputDescriptor>,
}

/// Inbound transaction signing request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSignRequest {
    pub account: Account,
    pub network: NetworkDescriptor,
    pub payload: TransactionPayload,
}

// =============================================================================
// Message Payload
// =============================================================================

/// Opaque bytes to sign off-chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessagePayload(#[serde(with = "crate::serde_bytes::hex_vec")] pub Vec<u8>);

impl MessagePayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for MessagePayload {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for MessagePayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Inbound message signing request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSignRequest {
    pub account: Account,
    pub payload: MessagePayload,
}

// =============================================================================
// Response Envelope
// =============================================================================

/// Reply shape shared with the rest of the messaging surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignerResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl SignerResponse {
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            result: Some(result.into()),
            error: None,
        }
    }

    pub fn err(error: &SignerError) -> Self {
        Self {
            result: None,
            error: Some(error.to_body()),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"error":{"code":"malformed_response","message":"Serialization failed"}}"#.to_string()
        })
    }
}

impl<T: Into<String>> From<Result<T, SignerError>> for SignerResponse {
    fn from(result: Result<T, SignerError>) -> Self {
        match result {
            Ok(value) => SignerResponse::ok(value),
            Err(e) => SignerResponse::err(&e),
        }
    }
}
