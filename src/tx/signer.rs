//! Transaction Signer
//!
//! Builds the PSBT, has the remote signer sign one digest per input and
//! finalizes the result. All digests are computed before the first remote
//! call; remote calls run one at a time in input order and the first
//! failure aborts the whole request.

use super::builder::build_unsigned_transaction;
use super::finalizer::FinalizedTransaction;
use crate::bridge::RemoteSigner;
use crate::error::SignerResult;
use crate::types::{Account, NetworkDescriptor, TransactionPayload, TransactionSignRequest};
use crate::utils::settings::SignerSettings;
use crate::{log_debug, log_error, log_info, log_warn};

/// Delegated transaction signer
#[derive(Debug, Clone)]
pub struct TransactionSigner<S> {
    bridge: S,
    settings: SignerSettings,
}

impl<S: RemoteSigner> TransactionSigner<S> {
    pub fn new(bridge: S) -> Self {
        Self::with_settings(bridge, SignerSettings::default())
    }

    pub fn with_settings(bridge: S, settings: SignerSettings) -> Self {
        Self { bridge, settings }
    }

    pub fn bridge(&self) -> &S {
        &self.bridge
    }

    pub fn settings(&self) -> &SignerSettings {
        &self.settings
    }

    /// Sign every input of `payload` with the key behind `account`
    pub async fn sign(
        &self,
        account: &Account,
        network: &NetworkDescriptor,
        payload: &TransactionPayload,
    ) -> SignerResult<FinalizedTransaction> {
        account.ensure_software()?;
        let key = account.public_key()?;

        log_info!(
            "tx",
            "Signing transaction",
            account = account.address,
            network = network.network_info.name,
            payment_type = network.payment_type,
            inputs = payload.inputs.len(),
            outputs = payload.outputs.len(),
        );

        let unsigned = build_unsigned_transaction(network, payload, &self.settings)?;
        if self.settings.enforce_key_match {
            unsigned.ensure_signable_by(&key)?;
        }
        unsigned.check_fee_rate(&key)?;

        let digests = unsigned.sighashes()?;
        let mut partial = unsigned.begin_signing(key);

        for (index, digest) in digests.iter().enumerate() {
            log_debug!("tx", "Requesting input signature", index = index, digest = hex::encode(digest));
            let signature = match self.bridge.sign(digest, account).await {
                Ok(signature) => signature,
                Err(e) => {
                    log_warn!("tx", "Input signing failed", index = index, reason = e);
                    return Err(e);
                }
            };
            partial.attach_signature(index, &signature.compact()?)?;
        }

        let finalized = partial.finalize().map_err(|e| {
            log_error!("tx", "Finalization failed", reason = e);
            e
        })?;
        // extraction re-checks the fee ceiling against the final size
        let tx = finalized.extract_tx()?;
        log_info!("tx", "Transaction signed", txid = tx.compute_txid(), vsize = tx.vsize());
        Ok(finalized)
    }

    /// Sign an inbound request envelope
    pub async fn sign_request(&self, request: &TransactionSignRequest) -> SignerResult<FinalizedTransaction> {
        self.sign(&request.account, &request.network, &request.payload).await
    }
}
