//! Signature attachment and finalization
//!
//! `UnsignedTransaction` -> `PartiallySignedTransaction` -> `FinalizedTransaction`.
//! Each step consumes the previous state, so a finalized transaction can
//! never gain another signature.

use super::builder::{spent_output, UnsignedTransaction};
use crate::error::{SignerError, SignerResult, ValidationError};
use crate::types::PaymentType;
use bitcoin::consensus::encode;
use bitcoin::psbt::{ExtractTxError, Psbt};
use bitcoin::script::PushBytesBuf;
use bitcoin::secp256k1::ecdsa;
use bitcoin::sighash::EcdsaSighashType;
use bitcoin::{Amount, FeeRate, PublicKey, ScriptBuf, Transaction, Txid, Witness};

impl UnsignedTransaction {
    /// Freeze inputs and outputs and start collecting signatures for `key`
    pub fn begin_signing(self, key: PublicKey) -> PartiallySignedTransaction {
        PartiallySignedTransaction { inner: self, key }
    }
}

/// Transaction whose inputs are being signed, one slot per input
#[derive(Debug, Clone)]
pub struct PartiallySignedTransaction {
    inner: UnsignedTransaction,
    key: PublicKey,
}

impl PartiallySignedTransaction {
    pub fn input_count(&self) -> usize {
        self.inner.input_count()
    }

    pub fn signing_key(&self) -> &PublicKey {
        &self.key
    }

    /// Number of inputs that already carry a signature
    pub fn signed_count(&self) -> usize {
        self.inner
            .psbt
            .inputs
            .iter()
            .filter(|input| input.partial_sigs.contains_key(&self.key))
            .count()
    }

    /// Record the compact `r || s` signature for input `index` as SIGHASH_ALL.
    ///
    /// The signature is not checked against the digest; the remote signer
    /// is trusted to have signed what it was given.
    pub fn attach_signature(&mut self, index: usize, compact: &[u8; 64]) -> SignerResult<()> {
        let signature = ecdsa::Signature::from_compact(compact)
            .map_err(|e| SignerError::malformed(format!("input {}: invalid signature: {}", index, e)))?;

        let input = self
            .inner
            .psbt
            .inputs
            .get_mut(index)
            .ok_or_else(|| SignerError::finalization(format!("input {} does not exist", index)))?;
        if input.partial_sigs.contains_key(&self.key) {
            return Err(SignerError::finalization(format!("input {} is already signed", index)));
        }

        input.partial_sigs.insert(
            self.key,
            bitcoin::ecdsa::Signature {
                signature,
                sighash_type: EcdsaSighashType::All,
            },
        );
        Ok(())
    }

    /// Build the unlocking data of every input.
    ///
    /// Fails if any input lacks a signature or its spent script is not the
    /// payment type this transaction was built for.
    pub fn finalize(mut self) -> SignerResult<FinalizedTransaction> {
        let key = self.key;
        let payment_type = self.inner.payment_type;

        for index in 0..self.inner.input_count() {
            let script_pubkey = spent_output(&self.inner.psbt, index)
                .map(|out| out.script_pubkey.clone())
                .ok_or_else(|| SignerError::finalization(format!("input {}: spent output unknown", index)))?;

            let input = &mut self.inner.psbt.inputs[index];
            let signature = input
                .partial_sigs
                .get(&key)
                .ok_or_else(|| SignerError::finalization(format!("input {} has no signature", index)))?
                .to_vec();

            match payment_type {
                PaymentType::P2WPKH => {
                    if !script_pubkey.is_p2wpkh() {
                        return Err(SignerError::finalization(format!(
                            "input {}: spent script is not p2wpkh",
                            index
                        )));
                    }
                    let mut witness = Witness::new();
                    witness.push(signature);
                    witness.push(key.to_bytes());
                    input.final_script_witness = Some(witness);
                }
                PaymentType::P2PKH => {
                    if !script_pubkey.is_p2pkh() {
                        return Err(SignerError::finalization(format!(
                            "input {}: spent script is not p2pkh",
                            index
                        )));
                    }
                    let push = PushBytesBuf::try_from(signature)
                        .map_err(|e| SignerError::finalization(format!("input {}: {}", index, e)))?;
                    let script_sig = ScriptBuf::builder().push_slice(push).push_key(&key).into_script();
                    input.final_script_sig = Some(script_sig);
                }
            }

            input.partial_sigs.clear();
            input.sighash_type = None;
            input.redeem_script = None;
            input.witness_script = None;
            input.bip32_derivation.clear();
        }

        Ok(FinalizedTransaction {
            psbt: self.inner.psbt,
            max_fee_rate: self.inner.max_fee_rate,
        })
    }
}

/// Fully signed transaction, ready to extract
#[derive(Debug, Clone)]
pub struct FinalizedTransaction {
    psbt: Psbt,
    max_fee_rate: u64,
}

impl FinalizedTransaction {
    pub fn psbt(&self) -> &Psbt {
        &self.psbt
    }

    pub fn input_count(&self) -> usize {
        self.psbt.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.psbt.outputs.len()
    }

    /// Extract the network transaction, enforcing the fee-rate ceiling
    pub fn extract_tx(&self) -> SignerResult<Transaction> {
        let limit = FeeRate::from_sat_per_vb(self.max_fee_rate).unwrap_or(FeeRate::MAX);
        self.psbt
            .clone()
            .extract_tx_with_fee_rate_limit(limit)
            .map_err(|e| match e {
                ExtractTxError::AbsurdFeeRate { fee_rate, .. } => ValidationError::FeeRateExceeded {
                    fee_rate: fee_rate.to_sat_per_vb_floor(),
                    max_fee_rate: self.max_fee_rate,
                }
                .into(),
                other => ValidationError::InvalidTransaction(other.to_string()).into(),
            })
    }

    /// Consensus-serialized transaction as lowercase hex
    pub fn to_hex(&self) -> SignerResult<String> {
        Ok(encode::serialize_hex(&self.extract_tx()?))
    }

    pub fn txid(&self) -> SignerResult<Txid> {
        Ok(self.extract_tx()?.compute_txid())
    }

    pub fn fee(&self) -> SignerResult<Amount> {
        self.psbt
            .fee()
            .map_err(|e| ValidationError::InvalidTransaction(e.to_string()).into())
    }

    pub fn vsize(&self) -> SignerResult<usize> {
        Ok(self.extract_tx()?.vsize())
    }

    /// BIP-174 serialization of the finalized PSBT
    pub fn psbt_bytes(&self) -> Vec<u8> {
        self.psbt.serialize()
    }
}
