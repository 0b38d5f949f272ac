#![allow(dead_code)]

use async_trait::async_trait;
use bitcoin::secp256k1::{Message, Secp256k1, SecretKey};
use bitcoin::{PublicKey, ScriptBuf};
use btc_delegated_signer::{
    Account, ErrorDescriptor, PendingSign, RawSignature, RemoteSigner, SignResponse, SignerError,
    SignerResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

pub const GENERATOR_HEX: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
pub const GENERATOR_P2WPKH: &str = "0014751e76e8199196d454941c45d1b3a323f1433bd6";

/// `r = 0x01 * 32`, `s = 0x02 * 32`, followed by `recid`
pub fn fixed_signature(recid: u8) -> Vec<u8> {
    let mut sig = vec![0x01u8; 32];
    sig.extend_from_slice(&[0x02u8; 32]);
    sig.push(recid);
    sig
}

/// Replies with the same bytes to every digest
pub struct FixedSigner {
    reply: Vec<u8>,
    pub calls: AtomicUsize,
}

impl FixedSigner {
    pub fn new(reply: Vec<u8>) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSigner for FixedSigner {
    async fn sign(&self, _digest: &[u8], _account: &Account) -> SignerResult<RawSignature> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RawSignature::new(self.reply.clone()))
    }
}

/// Signs with a local key, as a key vault would, and records each digest
pub struct LocalKeySigner {
    secret: SecretKey,
    fail_at: Option<usize>,
    pub digests: Mutex<Vec<Vec<u8>>>,
}

impl LocalKeySigner {
    pub fn new(secret_byte: u8) -> Self {
        Self {
            secret: SecretKey::from_slice(&[secret_byte; 32]).expect("valid scalar"),
            fail_at: None,
            digests: Mutex::new(Vec::new()),
        }
    }

    /// Refuse the call numbered `call` (zero based)
    pub fn failing_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::new(self.secret.public_key(&Secp256k1::new()))
    }

    pub fn account(&self) -> Account {
        Account::new(self.public_key().to_string())
    }

    pub fn p2wpkh_script(&self) -> ScriptBuf {
        ScriptBuf::new_p2wpkh(&self.public_key().wpubkey_hash().expect("compressed key"))
    }

    pub fn p2pkh_script(&self) -> ScriptBuf {
        ScriptBuf::new_p2pkh(&self.public_key().pubkey_hash())
    }

    pub fn calls(&self) -> usize {
        self.digests.lock().unwrap().len()
    }

    /// `r || s || recid` over a 32-byte digest
    pub fn sign_digest(&self, digest: &[u8]) -> Vec<u8> {
        let digest: [u8; 32] = digest.try_into().expect("32-byte digest");
        let (recid, compact) = Secp256k1::new()
            .sign_ecdsa_recoverable(&Message::from_digest(digest), &self.secret)
            .serialize_compact();
        let mut raw = compact.to_vec();
        raw.push(recid.to_i32() as u8);
        raw
    }
}

#[async_trait]
impl RemoteSigner for LocalKeySigner {
    async fn sign(&self, digest: &[u8], _account: &Account) -> SignerResult<RawSignature> {
        let call = {
            let mut digests = self.digests.lock().unwrap();
            digests.push(digest.to_vec());
            digests.len() - 1
        };
        if Some(call) == self.fail_at {
            return Err(SignerError::RemoteSign(
                ErrorDescriptor::new("user rejected the request").with_code(4001),
            ));
        }
        Ok(RawSignature::new(self.sign_digest(digest)))
    }
}

/// Drain the messenger queue, answering every request with `signer`
pub async fn serve_requests(signer: LocalKeySigner, mut requests: mpsc::Receiver<PendingSign>) -> usize {
    let mut served = 0;
    while let Some(pending) = requests.recv().await {
        let digest = hex::decode(pending.request.digest_hex().trim_start_matches("0x")).expect("hex digest");
        let reply = SignResponse::signature(&signer.sign_digest(&digest));
        pending.respond(reply);
        served += 1;
    }
    served
}
