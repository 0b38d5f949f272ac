mod common;

use bitcoin::consensus::encode;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{ecdsa, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{absolute::LockTime, Amount, Transaction, TxIn, TxOut};
use btc_delegated_signer::utils::logging::init_logging;
use btc_delegated_signer::{
    Account, ChannelTransport, MessengerBridge, NetworkDescriptor, NetworkInfo, OutputDescriptor,
    PaymentType, SignerError, TransactionPayload, TransactionSignRequest, TransactionSigner,
    UtxoReference, ValidationError,
};
use common::*;

fn mainnet() -> NetworkDescriptor {
    NetworkDescriptor::new(NetworkInfo::bitcoin())
}

fn golden_payload() -> TransactionPayload {
    TransactionPayload {
        inputs: vec![
            UtxoReference::witness("aa".repeat(32), 0, GENERATOR_P2WPKH, 100_000),
            UtxoReference::witness("bb".repeat(32), 1, GENERATOR_P2WPKH, 100_000),
        ],
        outputs: vec![OutputDescriptor::to_script(GENERATOR_P2WPKH, 190_000)],
    }
}

fn witness_payload(signer: &LocalKeySigner, inputs: usize) -> TransactionPayload {
    let script = hex::encode(signer.p2wpkh_script().as_bytes());
    TransactionPayload {
        inputs: (0..inputs)
            .map(|i| UtxoReference::witness(format!("{:02x}", i + 1).repeat(32), i as u32, script.clone(), 50_000))
            .collect(),
        outputs: vec![
            OutputDescriptor::to_address("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", 30_000),
            OutputDescriptor::to_script(script.clone(), 10_000),
        ],
    }
}

#[tokio::test]
async fn two_input_p2wpkh_serializes_to_expected_hex() {
    init_logging("debug", false);
    let witness = concat!(
        "02",
        "47",
        "3044",
        "0220",
        "0101010101010101010101010101010101010101010101010101010101010101",
        "0220",
        "0202020202020202020202020202020202020202020202020202020202020202",
        "01",
        "21",
        "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
    );
    let expected = [
        "02000000",
        "0001",
        "02",
        &"aa".repeat(32),
        "00000000",
        "00",
        "ffffffff",
        &"bb".repeat(32),
        "01000000",
        "00",
        "ffffffff",
        "01",
        "30e6020000000000",
        "16",
        GENERATOR_P2WPKH,
        witness,
        witness,
        "00000000",
    ]
    .concat();

    let signer = TransactionSigner::new(FixedSigner::new(fixed_signature(0)));
    let tx = signer
        .sign(&Account::new(GENERATOR_HEX), &mainnet(), &golden_payload())
        .await
        .unwrap();

    assert_eq!(tx.to_hex().unwrap(), expected);
    assert_eq!(tx.fee().unwrap(), Amount::from_sat(10_000));
    assert_eq!(signer.bridge().calls(), 2);
}

#[tokio::test]
async fn recovery_byte_is_ignored_for_inputs() {
    let with_recid = TransactionSigner::new(FixedSigner::new(fixed_signature(3)));
    let compact_only = TransactionSigner::new(FixedSigner::new(fixed_signature(0)[..64].to_vec()));
    let account = Account::new(GENERATOR_HEX);

    let a = with_recid.sign(&account, &mainnet(), &golden_payload()).await.unwrap();
    let b = compact_only.sign(&account, &mainnet(), &golden_payload()).await.unwrap();
    assert_eq!(a.to_hex().unwrap(), b.to_hex().unwrap());
}

#[tokio::test]
async fn hardware_accounts_are_rejected_before_any_call() {
    let signer = TransactionSigner::new(FixedSigner::new(fixed_signature(0)));
    let err = signer
        .sign(&Account::hardware(GENERATOR_HEX), &mainnet(), &golden_payload())
        .await
        .unwrap_err();

    assert!(matches!(err, SignerError::UnsupportedCapability(_)));
    assert_eq!(err.to_string(), "operation not supported: btc-hardware not implemented");
    assert_eq!(signer.bridge().calls(), 0);
}

#[tokio::test]
async fn non_ascii_address_is_a_validation_error() {
    let signer = TransactionSigner::new(FixedSigner::new(fixed_signature(0)));
    let err = signer
        .sign(&Account::new("aéééééééééééé"), &mainnet(), &golden_payload())
        .await
        .unwrap_err();

    assert!(matches!(err, SignerError::Validation(ValidationError::InvalidPublicKey(_))));
    assert_eq!(signer.bridge().calls(), 0);
}

#[tokio::test]
async fn empty_payload_signs_without_remote_calls() {
    let signer = TransactionSigner::new(FixedSigner::new(fixed_signature(0)));
    let finalized = signer
        .sign(&Account::new(GENERATOR_HEX), &mainnet(), &TransactionPayload::default())
        .await
        .unwrap();

    assert_eq!(signer.bridge().calls(), 0);
    assert_eq!(finalized.input_count(), 0);
    let tx = finalized.extract_tx().unwrap();
    assert!(tx.input.is_empty());
    assert!(tx.output.is_empty());
    assert_eq!(finalized.to_hex().unwrap(), "020000000001000000000000");
}

#[tokio::test]
async fn utxo_variant_must_match_payment_type() {
    let signer = TransactionSigner::new(FixedSigner::new(fixed_signature(0)));
    let legacy = mainnet().with_payment_type(PaymentType::P2PKH);

    let err = signer
        .sign(&Account::new(GENERATOR_HEX), &legacy, &golden_payload())
        .await
        .unwrap_err();
    assert_eq!(err, SignerError::Validation(ValidationError::MissingRawTransaction { index: 0 }));
    assert_eq!(signer.bridge().calls(), 0);
}

#[tokio::test]
async fn signatures_verify_against_each_input() {
    let signer = LocalKeySigner::new(0x11);
    let account = signer.account();
    let payload = witness_payload(&signer, 3);
    let spk = signer.p2wpkh_script();
    let key = signer.public_key();

    let tx = TransactionSigner::new(signer)
        .sign(&account, &mainnet(), &payload)
        .await
        .unwrap()
        .extract_tx()
        .unwrap();

    let secp = Secp256k1::verification_only();
    let mut cache = SighashCache::new(&tx);
    for (index, input) in tx.input.iter().enumerate() {
        let sighash = cache
            .p2wpkh_signature_hash(index, &spk, Amount::from_sat(50_000), EcdsaSighashType::All)
            .unwrap();
        let der = input.witness.nth(0).unwrap();
        let sig = ecdsa::Signature::from_der(&der[..der.len() - 1]).unwrap();
        secp.verify_ecdsa(&Message::from(sighash), &sig, &key.inner).unwrap();
        assert_eq!(input.witness.nth(1).unwrap(), key.to_bytes().as_slice());
    }
}

#[tokio::test]
async fn digests_are_requested_in_input_order() {
    let signer = LocalKeySigner::new(0x22);
    let account = signer.account();
    let payload = witness_payload(&signer, 4);

    let tx_signer = TransactionSigner::new(signer);
    let finalized = tx_signer.sign(&account, &mainnet(), &payload).await.unwrap();
    let tx = finalized.extract_tx().unwrap();

    let spk = tx_signer.bridge().p2wpkh_script();
    let mut cache = SighashCache::new(&tx);
    let expected: Vec<Vec<u8>> = (0..4)
        .map(|i| {
            cache
                .p2wpkh_signature_hash(i, &spk, Amount::from_sat(50_000), EcdsaSighashType::All)
                .unwrap()
                .to_byte_array()
                .to_vec()
        })
        .collect();
    assert_eq!(*tx_signer.bridge().digests.lock().unwrap(), expected);
}

#[tokio::test]
async fn legacy_inputs_get_script_sig() {
    let signer = LocalKeySigner::new(0x33);
    let account = signer.account();
    let prev = Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input: vec![TxIn::default()],
        output: vec![
            TxOut {
                value: Amount::from_sat(1_000),
                script_pubkey: signer.p2wpkh_script(),
            },
            TxOut {
                value: Amount::from_sat(80_000),
                script_pubkey: signer.p2pkh_script(),
            },
        ],
    };
    let payload = TransactionPayload {
        inputs: vec![UtxoReference::legacy(
            prev.compute_txid().to_string(),
            1,
            encode::serialize_hex(&prev),
        )],
        outputs: vec![OutputDescriptor::to_script(hex::encode(signer.p2pkh_script().as_bytes()), 70_000)],
    };
    let network = mainnet().with_payment_type(PaymentType::P2PKH);
    let spk = signer.p2pkh_script();
    let key = signer.public_key();

    let tx = TransactionSigner::new(signer)
        .sign(&account, &network, &payload)
        .await
        .unwrap()
        .extract_tx()
        .unwrap();

    let input = &tx.input[0];
    assert!(input.witness.is_empty());
    let pushes: Vec<Vec<u8>> = input
        .script_sig
        .instructions()
        .map(|ins| ins.unwrap().push_bytes().unwrap().as_bytes().to_vec())
        .collect();
    assert_eq!(pushes.len(), 2);
    assert_eq!(pushes[1], key.to_bytes());
    assert_eq!(*pushes[0].last().unwrap(), 0x01);

    let sighash = SighashCache::new(&tx)
        .legacy_signature_hash(0, &spk, EcdsaSighashType::All.to_u32())
        .unwrap();
    let sig = ecdsa::Signature::from_der(&pushes[0][..pushes[0].len() - 1]).unwrap();
    Secp256k1::verification_only()
        .verify_ecdsa(&Message::from(sighash), &sig, &key.inner)
        .unwrap();
}

#[tokio::test]
async fn remote_refusal_aborts_without_artifact() {
    let signer = LocalKeySigner::new(0x44).failing_at(2);
    let account = signer.account();
    let payload = witness_payload(&signer, 5);

    let tx_signer = TransactionSigner::new(signer);
    let err = tx_signer.sign(&account, &mainnet(), &payload).await.unwrap_err();

    match err {
        SignerError::RemoteSign(descriptor) => {
            assert_eq!(descriptor.code, Some(4001));
            assert_eq!(descriptor.message, "user rejected the request");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(tx_signer.bridge().calls(), 3);
}

#[tokio::test]
async fn signing_is_deterministic() {
    let signer = TransactionSigner::new(LocalKeySigner::new(0x55));
    let account = signer.bridge().account();
    let payload = witness_payload(signer.bridge(), 2);

    let first = signer.sign(&account, &mainnet(), &payload).await.unwrap();
    let second = signer.sign(&account, &mainnet(), &payload).await.unwrap();
    assert_eq!(first.to_hex().unwrap(), second.to_hex().unwrap());
    assert_eq!(first.txid().unwrap(), second.txid().unwrap());
}

#[tokio::test]
async fn fee_ceiling_is_enforced_before_signing() {
    let signer = TransactionSigner::new(FixedSigner::new(fixed_signature(0)));
    let mut payload = golden_payload();
    payload.outputs[0].value = 1_000;
    let mut info = NetworkInfo::bitcoin();
    info.max_fee_rate = Some(50);

    let err = signer
        .sign(&Account::new(GENERATOR_HEX), &NetworkDescriptor::new(info), &payload)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SignerError::Validation(ValidationError::FeeRateExceeded { max_fee_rate: 50, .. })
    ));
    assert_eq!(signer.bridge().calls(), 0);
}

#[tokio::test]
async fn messenger_bridge_round_trip() {
    let peer_signer = LocalKeySigner::new(0x66);
    let account = peer_signer.account().with_field("walletId", serde_json::json!(7));
    let payload = witness_payload(&peer_signer, 2);

    let (transport, requests) = ChannelTransport::new(8);
    let peer = tokio::spawn(serve_requests(peer_signer, requests));

    let request = TransactionSignRequest {
        account,
        network: NetworkDescriptor::new(NetworkInfo::bitcoin()),
        payload,
    };
    let signer = TransactionSigner::new(MessengerBridge::new(transport));
    let tx = signer.sign_request(&request).await.unwrap();
    assert_eq!(tx.input_count(), 2);
    assert!(tx.extract_tx().is_ok());

    drop(signer);
    assert_eq!(peer.await.unwrap(), 2);
}

#[test]
fn inbound_request_schema() {
    let json = serde_json::json!({
        "account": { "address": GENERATOR_HEX, "isHardware": false },
        "network": {
            "networkInfo": { "name": "bitcoin", "network": "bitcoin", "maxFeeRate": 100 },
            "paymentType": "p2wpkh"
        },
        "payload": {
            "inputs": [{
                "hash": "aa".repeat(32),
                "index": 0,
                "witnessUtxo": { "script": GENERATOR_P2WPKH, "value": 100000 }
            }],
            "outputs": [{ "script": GENERATOR_P2WPKH, "value": 90000 }]
        }
    });

    let request: TransactionSignRequest = serde_json::from_value(json).unwrap();
    assert_eq!(request.network.payment_type, PaymentType::P2WPKH);
    assert_eq!(request.network.network_info.max_fee_rate, Some(100));
    assert_eq!(request.payload.inputs[0].witness_utxo.as_ref().unwrap().value, 100_000);
}
