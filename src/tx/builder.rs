//! Unsigned Transaction Builder
//!
//! Translates the caller's payload into a PSBT under construction. Inputs and
//! outputs keep payload order, since input order decides each input's digest
//! and signature slot.

use crate::error::ValidationError;
use crate::types::{NetworkDescriptor, OutputDescriptor, PaymentType, TransactionPayload, UtxoReference};
use crate::utils::encoding::{decode_hex, strip_hex_prefix};
use crate::utils::settings::SignerSettings;
use bitcoin::consensus::encode;
use bitcoin::hashes::Hash;
use bitcoin::psbt::{self, Psbt};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::{predict_weight, InputWeightPrediction, Version};
use bitcoin::{
    absolute::LockTime, Address, Amount, Network, OutPoint, PublicKey, ScriptBuf, Sequence,
    Transaction, TxIn, TxOut, Txid, Witness,
};
use std::str::FromStr;

/// Output being spent, in the form the network's payment type requires
#[derive(Debug, Clone, PartialEq)]
pub enum SpentUtxo {
    /// Script and value, for witness spends
    Witness(TxOut),
    /// Whole previous transaction, for legacy spends
    NonWitness(Transaction),
}

/// One translated input, ready to append
#[derive(Debug, Clone, PartialEq)]
pub struct InputDescriptor {
    pub outpoint: OutPoint,
    pub utxo: SpentUtxo,
}

/// Translate a caller UTXO into an input descriptor for `payment_type`
pub fn translate_input(
    index: usize,
    utxo: &UtxoReference,
    payment_type: PaymentType,
) -> Result<InputDescriptor, ValidationError> {
    let txid = Txid::from_str(strip_hex_prefix(utxo.hash.trim()))
        .map_err(|_| ValidationError::InvalidTxid { index })?;
    let outpoint = OutPoint::new(txid, utxo.index);

    if utxo.witness_utxo.is_some() && utxo.raw.is_some() {
        return Err(ValidationError::UnexpectedUtxoVariant { index });
    }

    let spent = match payment_type {
        PaymentType::P2WPKH => {
            let witness = utxo
                .witness_utxo
                .as_ref()
                .ok_or(ValidationError::MissingWitnessUtxo { index })?;
            let script = decode_hex(&format!("inputs[{}].witnessUtxo.script", index), &witness.script)?;
            SpentUtxo::Witness(TxOut {
                value: Amount::from_sat(witness.value),
                script_pubkey: ScriptBuf::from_bytes(script),
            })
        }
        PaymentType::P2PKH => {
            let raw = utxo
                .raw
                .as_ref()
                .ok_or(ValidationError::MissingRawTransaction { index })?;
            let field = format!("inputs[{}].raw", index);
            let bytes = decode_hex(&field, raw)?;
            let prev_tx: Transaction = encode::deserialize(&bytes).map_err(|e| ValidationError::InvalidHex {
                field,
                reason: e.to_string(),
            })?;
            if prev_tx.compute_txid() != txid || prev_tx.output.len() <= utxo.index as usize {
                return Err(ValidationError::PrevoutMismatch { index });
            }
            SpentUtxo::NonWitness(prev_tx)
        }
    };

    Ok(InputDescriptor { outpoint, utxo: spent })
}

/// Translate a caller output into a `TxOut` valid on `network`
pub fn translate_output(
    index: usize,
    output: &OutputDescriptor,
    network: Network,
) -> Result<TxOut, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidOutput { index, reason };

    let script_pubkey = match (&output.address, &output.script) {
        (Some(address), None) => Address::from_str(address.trim())
            .map_err(|e| invalid(format!("invalid address: {}", e)))?
            .require_network(network)
            .map_err(|e| invalid(e.to_string()))?
            .script_pubkey(),
        (None, Some(script)) => ScriptBuf::from_bytes(decode_hex(&format!("outputs[{}].script", index), script)?),
        (Some(_), Some(_)) => return Err(invalid("both address and script supplied".to_string())),
        (None, None) => return Err(invalid("address or script required".to_string())),
    };

    Ok(TxOut {
        value: Amount::from_sat(output.value),
        script_pubkey,
    })
}

/// Translate the whole payload, then append it in order.
///
/// Every input and output is validated before anything is appended, so a
/// bad entry anywhere aborts the build.
pub fn build_unsigned_transaction(
    network: &NetworkDescriptor,
    payload: &TransactionPayload,
    settings: &SignerSettings,
) -> Result<UnsignedTransaction, ValidationError> {
    let inputs = payload
        .inputs
        .iter()
        .enumerate()
        .map(|(i, utxo)| translate_input(i, utxo, network.payment_type))
        .collect::<Result<Vec<_>, _>>()?;
    let outputs = payload
        .outputs
        .iter()
        .enumerate()
        .map(|(i, output)| translate_output(i, output, network.network()))
        .collect::<Result<Vec<_>, _>>()?;

    let mut tx = UnsignedTransaction::new(network, settings)?;
    for input in inputs {
        tx.add_input(input);
    }
    for output in outputs {
        tx.add_output(output);
    }
    Ok(tx)
}

/// A PSBT that can still gain inputs and outputs
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    pub(crate) psbt: Psbt,
    pub(crate) payment_type: PaymentType,
    pub(crate) max_fee_rate: u64,
    sequence: Sequence,
}

impl UnsignedTransaction {
    /// Empty transaction context for `network`
    pub fn new(network: &NetworkDescriptor, settings: &SignerSettings) -> Result<Self, ValidationError> {
        let tx = Transaction {
            version: Version(settings.tx_version),
            lock_time: LockTime::ZERO,
            input: Vec::new(),
            output: Vec::new(),
        };
        let psbt = Psbt::from_unsigned_tx(tx).map_err(|e| ValidationError::InvalidTransaction(e.to_string()))?;

        Ok(Self {
            psbt,
            payment_type: network.payment_type,
            max_fee_rate: network
                .network_info
                .max_fee_rate
                .unwrap_or(settings.default_max_fee_rate),
            sequence: Sequence(settings.sequence),
        })
    }

    pub fn add_input(&mut self, input: InputDescriptor) {
        self.psbt.unsigned_tx.input.push(TxIn {
            previous_output: input.outpoint,
            script_sig: ScriptBuf::new(),
            sequence: self.sequence,
            witness: Witness::default(),
        });

        let mut psbt_input = psbt::Input::default();
        match input.utxo {
            SpentUtxo::Witness(txout) => psbt_input.witness_utxo = Some(txout),
            SpentUtxo::NonWitness(prev_tx) => psbt_input.non_witness_utxo = Some(prev_tx),
        }
        self.psbt.inputs.push(psbt_input);
    }

    pub fn add_output(&mut self, output: TxOut) {
        self.psbt.unsigned_tx.output.push(output);
        self.psbt.outputs.push(psbt::Output::default());
    }

    pub fn input_count(&self) -> usize {
        self.psbt.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.psbt.outputs.len()
    }

    pub fn max_fee_rate(&self) -> u64 {
        self.max_fee_rate
    }

    pub fn psbt(&self) -> &Psbt {
        &self.psbt
    }

    /// Output spent by input `index`
    pub(crate) fn spent_output(&self, index: usize) -> Option<&TxOut> {
        spent_output(&self.psbt, index)
    }

    /// Check that `key` can produce the unlocking data for every input
    pub fn ensure_signable_by(&self, key: &PublicKey) -> Result<(), ValidationError> {
        let expected = match self.payment_type {
            PaymentType::P2WPKH => match key.wpubkey_hash() {
                Ok(hash) => Some(ScriptBuf::new_p2wpkh(&hash)),
                // uncompressed keys cannot sign witness v0 inputs
                Err(_) => None,
            },
            PaymentType::P2PKH => Some(ScriptBuf::new_p2pkh(&key.pubkey_hash())),
        };

        for index in 0..self.input_count() {
            let spk = self.spent_output(index).map(|out| &out.script_pubkey);
            if spk.is_none() || spk != expected.as_ref() {
                return Err(ValidationError::KeyMismatch { index });
            }
        }
        Ok(())
    }

    /// Virtual size once every input carries a signature from `key`
    pub fn predicted_vsize(&self, key: &PublicKey) -> u64 {
        let prediction = match self.payment_type {
            PaymentType::P2WPKH => InputWeightPrediction::P2WPKH_MAX,
            PaymentType::P2PKH if key.compressed => InputWeightPrediction::P2PKH_COMPRESSED_MAX,
            PaymentType::P2PKH => InputWeightPrediction::P2PKH_UNCOMPRESSED_MAX,
        };
        let weight = predict_weight(
            std::iter::repeat(prediction).take(self.input_count()),
            self.psbt.unsigned_tx.output.iter().map(|out| out.script_pubkey.len()),
        );
        weight.to_vbytes_ceil().max(1)
    }

    /// Reject the transaction if its predicted fee rate is above the ceiling
    pub fn check_fee_rate(&self, key: &PublicKey) -> Result<(), ValidationError> {
        if self.input_count() == 0 {
            return Ok(());
        }

        let mut input_total = Amount::ZERO;
        for index in 0..self.input_count() {
            let value = self
                .spent_output(index)
                .map(|out| out.value)
                .ok_or_else(|| ValidationError::InvalidTransaction(format!("input {} has no spent output", index)))?;
            input_total = input_total
                .checked_add(value)
                .ok_or_else(|| ValidationError::InvalidTransaction("input total overflows".to_string()))?;
        }
        let mut output_total = Amount::ZERO;
        for out in &self.psbt.unsigned_tx.output {
            output_total = output_total
                .checked_add(out.value)
                .ok_or_else(|| ValidationError::InvalidTransaction("output total overflows".to_string()))?;
        }

        let fee = input_total
            .checked_sub(output_total)
            .ok_or(ValidationError::SpendsMoreThanInputs {
                inputs: input_total.to_sat(),
                outputs: output_total.to_sat(),
            })?;

        let fee_rate = fee.to_sat() / self.predicted_vsize(key);

        if fee_rate > self.max_fee_rate {
            return Err(ValidationError::FeeRateExceeded {
                fee_rate,
                max_fee_rate: self.max_fee_rate,
            });
        }
        Ok(())
    }

    /// SIGHASH_ALL digest of every input, in input order
    pub fn sighashes(&self) -> Result<Vec<[u8; 32]>, ValidationError> {
        let mut cache = SighashCache::new(&self.psbt.unsigned_tx);
        let mut digests = Vec::with_capacity(self.input_count());

        for index in 0..self.input_count() {
            let spent = spent_output(&self.psbt, index).ok_or_else(|| ValidationError::Sighash {
                index,
                reason: "spent output unknown".to_string(),
            })?;
            let sighash_err = |reason: String| ValidationError::Sighash { index, reason };

            let digest = match self.payment_type {
                PaymentType::P2WPKH => cache
                    .p2wpkh_signature_hash(index, &spent.script_pubkey, spent.value, EcdsaSighashType::All)
                    .map_err(|e| sighash_err(e.to_string()))?
                    .to_byte_array(),
                PaymentType::P2PKH => cache
                    .legacy_signature_hash(index, &spent.script_pubkey, EcdsaSighashType::All.to_u32())
                    .map_err(|e| sighash_err(e.to_string()))?
                    .to_byte_array(),
            };
            digests.push(digest);
        }
        Ok(digests)
    }
}

/// Output spent by input `index` of `psbt`, from whichever UTXO field is set
pub(crate) fn spent_output(psbt: &Psbt, index: usize) -> Option<&TxOut> {
    let input = psbt.inputs.get(index)?;
    if let Some(ref txout) = input.witness_utxo {
        return Some(txout);
    }
    let vout = psbt.unsigned_tx.input.get(index)?.previous_output.vout;
    input.non_witness_utxo.as_ref()?.output.get(vout as usize)
}
