//! Messenger-backed bridge
//!
//! Speaks the `{ method: "sign", params: [digestHex, account] }` request and
//! `{ result?, error? }` response envelope over an injected transport.

use super::{RawSignature, RemoteSigner};
use crate::error::{ErrorDescriptor, SignerError, SignerResult};
use crate::types::Account;
use crate::utils::encoding::{strip_hex_prefix, to_prefixed_hex};
use crate::{log_debug, log_warn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

/// Method name understood by the signing peer
pub const SIGN_METHOD: &str = "sign";

/// Request sent to the signing peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignRequest {
    pub method: String,
    /// `[digestHex, account]`
    pub params: (String, Account),
}

impl SignRequest {
    pub fn sign(digest: &[u8], account: &Account) -> Self {
        Self {
            method: SIGN_METHOD.to_string(),
            params: (to_prefixed_hex(digest), account.clone()),
        }
    }

    pub fn digest_hex(&self) -> &str {
        &self.params.0
    }

    pub fn account(&self) -> &Account {
        &self.params.1
    }
}

/// Reply from the signing peer; exactly one field is populated
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignResponse {
    /// JSON-encoded hex string of the raw signature bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
}

impl SignResponse {
    /// Success reply carrying `bytes` the way the peer encodes them
    pub fn signature(bytes: &[u8]) -> Self {
        let hex = to_prefixed_hex(bytes);
        Self {
            result: Some(serde_json::Value::String(hex).to_string()),
            error: None,
        }
    }

    pub fn error(descriptor: ErrorDescriptor) -> Self {
        Self {
            result: None,
            error: Some(descriptor),
        }
    }

    /// Turn the envelope into signature bytes or the peer's error
    pub fn into_signature(self) -> SignerResult<RawSignature> {
        match (self.result, self.error) {
            (None, Some(error)) => Err(SignerError::RemoteSign(error)),
            (Some(result), None) => {
                let hex_str: String = serde_json::from_str(&result).map_err(|e| {
                    SignerError::malformed(format!("result is not a JSON string: {}", e))
                })?;
                let bytes = hex::decode(strip_hex_prefix(&hex_str))
                    .map_err(|e| SignerError::malformed(format!("result is not hex: {}", e)))?;
                Ok(RawSignature::new(bytes))
            }
            (Some(_), Some(_)) => Err(SignerError::malformed("both result and error populated")),
            (None, None) => Err(SignerError::malformed("neither result nor error populated")),
        }
    }
}

/// Channel the bridge sends requests over
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Deliver one request and wait for its single reply
    async fn send(&self, request: SignRequest) -> SignerResult<SignResponse>;
}

/// [`RemoteSigner`] that forwards every digest over a [`MessageTransport`]
#[derive(Debug, Clone)]
pub struct MessengerBridge<T> {
    transport: T,
}

impl<T: MessageTransport> MessengerBridge<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[async_trait]
impl<T: MessageTransport> RemoteSigner for MessengerBridge<T> {
    async fn sign(&self, digest: &[u8], account: &Account) -> SignerResult<RawSignature> {
        let request = SignRequest::sign(digest, account);
        log_debug!(
            "bridge",
            "Requesting remote signature",
            digest = request.digest_hex(),
            account = account.address,
        );

        let response = self.transport.send(request).await?;
        let signature = response.into_signature();
        if let Err(ref e) = signature {
            log_warn!("bridge", "Remote signing failed", reason = e);
        }
        signature
    }
}

/// A request waiting for the signing peer's answer
#[derive(Debug)]
pub struct PendingSign {
    pub request: SignRequest,
    reply: oneshot::Sender<SignResponse>,
}

impl PendingSign {
    /// Answer the request. Returns false if the requester has gone away.
    pub fn respond(self, response: SignResponse) -> bool {
        self.reply.send(response).is_ok()
    }
}

/// In-process transport: requests go down an mpsc queue, each with its own
/// oneshot for the reply.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    sender: mpsc::Sender<PendingSign>,
}

impl ChannelTransport {
    /// Create the transport and the receiving end the signing peer drains
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<PendingSign>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl MessageTransport for ChannelTransport {
    async fn send(&self, request: SignRequest) -> SignerResult<SignResponse> {
        let (reply, answer) = oneshot::channel();
        self.sender
            .send(PendingSign { request, reply })
            .await
            .map_err(|_| SignerError::transport("signing peer is not listening"))?;
        answer
            .await
            .map_err(|_| SignerError::transport("signing peer dropped the request"))
    }
}
