//! Bitcoin signed-message scheme
//!
//! Digest: `SHA256d("\x18Bitcoin Signed Message:\n" || varint(len) || message)`.
//! Encoding: 65 bytes `header || r || s` with `header = 27 + recid`, plus 4
//! when the signature is flagged as coming from a compressed key.

use crate::error::{SignerError, SignerResult, ValidationError};
use crate::types::Account;
use crate::utils::encoding::decode_hex;
use bitcoin::consensus::encode::{serialize, VarInt};
use bitcoin::hashes::{sha256d, Hash, HashEngine};
use bitcoin::secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use bitcoin::secp256k1::Secp256k1;
use bitcoin::sign_message::{MessageSignature, BITCOIN_SIGNED_MSG_PREFIX};

/// First header byte for an uncompressed-key signature
const HEADER_BASE: u8 = 27;

/// Digest the remote signer signs for `message`
pub fn signed_message_hash(message: &[u8]) -> sha256d::Hash {
    let mut engine = sha256d::Hash::engine();
    engine.input(BITCOIN_SIGNED_MSG_PREFIX);
    engine.input(&serialize(&VarInt(message.len() as u64)));
    engine.input(message);
    sha256d::Hash::from_engine(engine)
}

/// Turn the signer's `r || s || recid` into the encoded message signature.
///
/// With `normalize` set, a recovery byte already in header form (27..=30)
/// is shifted back to 0..=3.
pub fn encode_signature(raw: &[u8; 65], normalize: bool, compressed: bool) -> SignerResult<[u8; 65]> {
    let mut recid = raw[64];
    if normalize && (HEADER_BASE..HEADER_BASE + 4).contains(&recid) {
        recid -= HEADER_BASE;
    }
    if recid > 3 {
        return Err(SignerError::malformed(format!("recovery id {} out of range", raw[64])));
    }

    let recovery_id = RecoveryId::from_i32(i32::from(recid))
        .map_err(|e| SignerError::malformed(format!("invalid recovery id: {}", e)))?;
    let signature = RecoverableSignature::from_compact(&raw[..64], recovery_id)
        .map_err(|e| SignerError::malformed(format!("invalid signature: {}", e)))?;

    Ok(MessageSignature::new(signature, compressed).serialize())
}

/// Check that `signature` over `message` was made by the account's key
pub fn verify_message(account: &Account, message: &[u8], signature: &[u8]) -> SignerResult<bool> {
    let expected = account.public_key()?;
    let decoded = MessageSignature::from_slice(signature)
        .map_err(|e| SignerError::malformed(format!("invalid message signature: {}", e)))?;

    let secp = Secp256k1::verification_only();
    match decoded.recover_pubkey(&secp, signed_message_hash(message)) {
        Ok(recovered) => Ok(recovered.inner == expected.inner),
        Err(_) => Ok(false),
    }
}

/// [`verify_message`] for a `0x`-hex signature as returned in the envelope
pub fn verify_message_hex(account: &Account, message: &[u8], signature_hex: &str) -> SignerResult<bool> {
    let bytes = decode_hex("signature", signature_hex)?;
    verify_message(account, message, &bytes)
}

/// Reject digests the remote signer cannot sign blind
pub(crate) fn ensure_digest(digest: &[u8]) -> Result<(), ValidationError> {
    if digest.len() != 32 {
        return Err(ValidationError::InvalidDigest(format!(
            "expected 32 bytes, got {}",
            digest.len()
        )));
    }
    Ok(())
}
