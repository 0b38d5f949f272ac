//! Remote Signing Bridge
//!
//! The private key never lives in this crate. Both pipelines hand a digest
//! and the account to a [`RemoteSigner`] and get raw signature bytes back:
//! one round trip per digest, no retry, no caching.

mod messenger;

pub use messenger::*;

use crate::error::{SignerError, SignerResult};
use crate::types::Account;
use async_trait::async_trait;
use std::sync::Arc;

/// Length of a compact `r || s` signature
pub const COMPACT_SIGNATURE_LEN: usize = 64;

/// Length of a compact signature followed by its recovery id
pub const RECOVERABLE_SIGNATURE_LEN: usize = 65;

/// External signer for blind digests
#[async_trait]
pub trait RemoteSigner: Send + Sync {
    /// Sign `digest` exactly as given with the key behind `account`
    async fn sign(&self, digest: &[u8], account: &Account) -> SignerResult<RawSignature>;
}

#[async_trait]
impl<T: RemoteSigner + ?Sized> RemoteSigner for Arc<T> {
    async fn sign(&self, digest: &[u8], account: &Account) -> SignerResult<RawSignature> {
        (**self).sign(digest, account).await
    }
}

/// Signature bytes as returned by the remote signer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSignature(Vec<u8>);

impl RawSignature {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bytes [0, 64): the compact signature used for transaction inputs.
    /// Anything after byte 64 is ignored.
    pub fn compact(&self) -> SignerResult<[u8; COMPACT_SIGNATURE_LEN]> {
        if self.0.len() < COMPACT_SIGNATURE_LEN {
            return Err(SignerError::malformed(format!(
                "expected at least {} signature bytes, got {}",
                COMPACT_SIGNATURE_LEN,
                self.0.len()
            )));
        }
        let mut out = [0u8; COMPACT_SIGNATURE_LEN];
        out.copy_from_slice(&self.0[..COMPACT_SIGNATURE_LEN]);
        Ok(out)
    }

    /// All 65 bytes: compact signature plus recovery id
    pub fn recoverable(&self) -> SignerResult<[u8; RECOVERABLE_SIGNATURE_LEN]> {
        if self.0.len() < RECOVERABLE_SIGNATURE_LEN {
            return Err(SignerError::malformed(format!(
                "expected {} signature bytes with recovery id, got {}",
                RECOVERABLE_SIGNATURE_LEN,
                self.0.len()
            )));
        }
        let mut out = [0u8; RECOVERABLE_SIGNATURE_LEN];
        out.copy_from_slice(&self.0[..RECOVERABLE_SIGNATURE_LEN]);
        Ok(out)
    }
}

impl From<Vec<u8>> for RawSignature {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}
