//! Message Signing Module
//!
//! Off-chain attestation (proof of address ownership) using the Bitcoin
//! signed-message scheme. The digest is signed remotely; the full 65-byte
//! `r || s || recid` reply is turned into an encoded recoverable signature
//! and returned as a JSON-string of `0x` hex inside the usual envelope.

pub mod signed_message;

pub use signed_message::{encode_signature, signed_message_hash, verify_message, verify_message_hex};

use crate::bridge::RemoteSigner;
use crate::error::{SignerError, SignerResult};
use crate::types::{Account, MessagePayload, MessageSignRequest, SignerResponse};
use crate::utils::encoding::{strip_hex_prefix, to_prefixed_hex};
use crate::utils::settings::SignerSettings;
use crate::{log_debug, log_info};
use bitcoin::hashes::Hash;

/// Delegated message signer
#[derive(Debug, Clone)]
pub struct MessageSigner<S> {
    bridge: S,
    settings: SignerSettings,
}

impl<S: RemoteSigner> MessageSigner<S> {
    pub fn new(bridge: S) -> Self {
        Self::with_settings(bridge, SignerSettings::default())
    }

    pub fn with_settings(bridge: S, settings: SignerSettings) -> Self {
        Self { bridge, settings }
    }

    pub fn bridge(&self) -> &S {
        &self.bridge
    }

    /// Sign `payload` and wrap the encoded signature in the reply envelope
    pub async fn sign(&self, account: &Account, payload: &MessagePayload) -> SignerResult<SignerResponse> {
        let signature = self.sign_signature(account, payload).await?;
        Ok(SignerResponse::ok(encode_result(&signature)))
    }

    /// Sign `payload` and return the 65-byte encoded signature
    pub async fn sign_signature(&self, account: &Account, payload: &MessagePayload) -> SignerResult<[u8; 65]> {
        account.ensure_software()?;
        account.public_key()?;
        log_info!(
            "message",
            "Signing message",
            account = account.address,
            length = payload.as_bytes().len(),
        );

        let digest = signed_message_hash(payload.as_bytes());
        self.sign_digest(account, digest.as_byte_array()).await
    }

    /// Sign an already computed 32-byte message digest
    pub async fn sign_digest(&self, account: &Account, digest: &[u8]) -> SignerResult<[u8; 65]> {
        account.ensure_software()?;
        account.public_key()?;
        signed_message::ensure_digest(digest)?;

        let raw = self.bridge.sign(digest, account).await?;
        let encoded = encode_signature(
            &raw.recoverable()?,
            self.settings.normalize_recovery_id,
            self.settings.compressed_message_signature,
        )?;
        log_debug!("message", "Message signed", signature = to_prefixed_hex(&encoded));
        Ok(encoded)
    }

    /// Serve an inbound request; failures are carried in the envelope
    pub async fn handle(&self, request: &MessageSignRequest) -> SignerResponse {
        match self.sign(&request.account, &request.payload).await {
            Ok(response) => response,
            Err(e) => SignerResponse::err(&e),
        }
    }
}

/// JSON-string of the `0x` hex signature, as carried in `result`
pub fn encode_result(signature: &[u8]) -> String {
    serde_json::Value::String(to_prefixed_hex(signature)).to_string()
}

/// Inverse of [`encode_result`]
pub fn decode_result(result: &str) -> SignerResult<Vec<u8>> {
    let hex_str: String = serde_json::from_str(result)?;
    let bytes = hex::decode(strip_hex_prefix(&hex_str))
        .map_err(|e| SignerError::malformed(format!("result is not hex: {}", e)))?;
    Ok(bytes)
}
