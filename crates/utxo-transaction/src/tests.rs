//! Tests for the utxo-transaction crate.
//!
//! Covers wire-format parsing, the builder's spend scenarios for every
//! supported template, the mutation guards, multisig reordering and
//! resuming sessions from partially signed transactions.

use utxo_primitives::ec::PrivateKey;
use utxo_primitives::schnorr;
use utxo_primitives::taproot::tweak_public_key;
use utxo_script::chunk::script_to_stack;
use utxo_script::signature::decode_ecdsa_signature;
use utxo_script::taproot::{control_block, leaf_hash, LEAF_VERSION_TAPSCRIPT};
use utxo_script::templates::{p2ms, p2pk, p2pkh, p2sh, p2tr, p2tr_ns, p2wpkh, p2wsh};
use utxo_script::Script;

use crate::builder::{PrevOutScriptType, SignRequest, TransactionBuilder};
use crate::config::BuilderConfig;
use crate::input::DEFAULT_SEQUENCE_NUMBER;
use crate::output::TransactionOutput;
use crate::sighash::{SIGHASH_ALL, SIGHASH_ANYONECANPAY, SIGHASH_DEFAULT, SIGHASH_NONE, SIGHASH_SINGLE};
use crate::transaction::Transaction;
use crate::TransactionError;

// -----------------------------------------------------------------------
// Raw transaction vectors
// -----------------------------------------------------------------------

/// A one-input, two-output legacy transaction.
const SOURCE_RAW_TX: &str = "010000000138c7c61c14ffb063c3bb2664041a3e29ea6ea0412a0c18ff725ba4e9e12afae2030000006a47304402203e9ab8e4c14addf3b4741540b556cfb0e0efb67dc1a7b5ce84c3ac56b3fd447802203c9f49f7bd893ebd7060176dfc36bcaff9d2c443d9a0dd6cd2d59b372c024d20412102798913bc057b344de675dac34faafe3dc2f312c758cd9068209f810877306d66ffffffff02dc050000000000002076a914eb0bd5edba389198e73f8efabddfc61666969ff788ac6a0568656c6c6faa0d0000000000001976a914eb0bd5edba389198e73f8efabddfc61666969ff788ac00000000";

/// A coinbase transaction.
const COINBASE_TX_HEX: &str = "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff17033f250d2f43555656452f2c903fb60859897700d02700ffffffff01d864a012000000001976a914d648686cf603c11850f39600e37312738accca8f88ac00000000";

// -----------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------

fn config() -> BuilderConfig {
    BuilderConfig::new(2500)
}

fn key(seed: u8) -> PrivateKey {
    PrivateKey::from_bytes(&[seed; 32]).expect("valid private key")
}

fn pubkey(key: &PrivateKey) -> Vec<u8> {
    key.pub_key().to_compressed().to_vec()
}

fn destination() -> Script {
    p2pkh::output_script_for_pubkey(&pubkey(&key(99)))
}

fn p2sh_multisig_request<'a>(signer: &'a PrivateKey, redeem: &'a Script) -> SignRequest<'a> {
    SignRequest::new(0, signer, PrevOutScriptType::P2shP2ms).with_redeem_script(redeem.to_bytes())
}

fn p2wsh_multisig_request<'a>(signer: &'a PrivateKey, witness_script: &'a Script) -> SignRequest<'a> {
    SignRequest::new(0, signer, PrevOutScriptType::P2wshP2ms)
        .with_witness_script(witness_script.to_bytes())
        .with_witness_value(80_000)
}

fn p2sh_p2wsh_multisig_request<'a>(signer: &'a PrivateKey, redeem: &'a Script, witness_script: &'a Script) -> SignRequest<'a> {
    SignRequest::new(0, signer, PrevOutScriptType::P2shP2wshP2ms)
        .with_redeem_script(redeem.to_bytes())
        .with_witness_script(witness_script.to_bytes())
        .with_witness_value(60_000)
}

fn taproot_n_of_n_request<'a>(signer: &'a PrivateKey, tapscript: &'a Script, control_block: &'a [u8]) -> SignRequest<'a> {
    SignRequest::new(0, signer, PrevOutScriptType::P2trP2ns)
        .with_witness_script(tapscript.to_bytes())
        .with_control_block(control_block)
}

fn assert_ecdsa_valid(key: &PrivateKey, hash: &[u8; 32], encoded: &[u8]) {
    let (sig, _) = decode_ecdsa_signature(encoded).expect("decodable signature");
    assert!(key.pub_key().verify(hash, &sig), "signature must verify");
}

// -----------------------------------------------------------------------
// Wire format
// -----------------------------------------------------------------------

#[test]
fn test_from_hex_roundtrip() {
    let tx = Transaction::from_hex(SOURCE_RAW_TX).expect("should parse source tx hex");
    assert_eq!(tx.version, 1, "version should be 1");
    assert_eq!(tx.inputs.len(), 1, "should have 1 input");
    assert_eq!(tx.outputs.len(), 2, "should have 2 outputs");
    assert_eq!(tx.inputs[0].sequence, DEFAULT_SEQUENCE_NUMBER);
    assert!(!tx.has_witness());
    assert_eq!(tx.to_hex(), SOURCE_RAW_TX, "hex roundtrip should be identical");
}

#[test]
fn test_coinbase_detection() {
    let tx = Transaction::from_hex(COINBASE_TX_HEX).expect("should parse coinbase");
    assert!(tx.is_coinbase());
    let regular = Transaction::from_hex(SOURCE_RAW_TX).expect("should parse source tx");
    assert!(!regular.is_coinbase());
}

// -----------------------------------------------------------------------
// Spend scenarios
// -----------------------------------------------------------------------

#[test]
fn test_p2wpkh_spend() {
    let signer = key(1);
    let prev = p2wpkh::output_script_for_pubkey(&pubkey(&signer));

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([1; 32], 0, None, Some(&prev), Some(100_000)).expect("add input");
    builder.add_output(destination(), 90_000).expect("add output");
    builder
        .sign(
            SignRequest::new(0, &signer, PrevOutScriptType::P2wpkh)
                .with_witness_value(100_000)
                .with_hash_type(SIGHASH_ALL),
        )
        .expect("sign");

    let tx = builder.build().expect("build");
    let input = &tx.inputs[0];
    assert!(input.script_sig.is_empty(), "native segwit has an empty scriptSig");
    assert_eq!(input.witness.len(), 2, "witness is [signature, pubkey]");
    assert_eq!(input.witness[1], pubkey(&signer));

    let script_code = p2pkh::output_script_for_pubkey(&pubkey(&signer));
    let hash = tx
        .hash_for_witness_v0(0, script_code.to_bytes(), 100_000, SIGHASH_ALL)
        .expect("sighash");
    assert_ecdsa_valid(&signer, &hash, &input.witness[0]);
    assert_eq!(tx.version, 2, "sessions default to version 2");
}

#[test]
fn test_p2pkh_spend_with_low_r() {
    let signer = key(2);
    let prev = p2pkh::output_script_for_pubkey(&pubkey(&signer));

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.set_low_r(true);
    builder.add_input([2; 32], 3, Some(0xffff_fffe), Some(&prev), Some(20_000)).expect("add input");
    builder.add_output(destination(), 19_000).expect("add output");
    builder
        .sign(SignRequest::new(0, &signer, PrevOutScriptType::P2pkh))
        .expect("sign");

    let tx = builder.build().expect("build");
    let (sig, pk) = p2pkh::decode_input(tx.inputs[0].script_sig.to_bytes()).expect("p2pkh scriptSig");
    assert_eq!(pk, pubkey(&signer));
    let (decoded, hash_type) = decode_ecdsa_signature(&sig).expect("decodable");
    assert_eq!(hash_type, SIGHASH_ALL);
    assert!(decoded.has_low_r(), "low-R grinding was requested");

    let hash = tx.hash_for_signature(0, prev.to_bytes(), SIGHASH_ALL).expect("sighash");
    assert!(signer.pub_key().verify(&hash, &decoded));
    assert_eq!(tx.inputs[0].sequence, 0xffff_fffe);
}

#[test]
fn test_p2pk_spend() {
    let signer = key(3);
    let prev = p2pk::output_script(&pubkey(&signer)).expect("p2pk output");

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([3; 32], 0, None, Some(&prev), Some(5_000)).expect("add input");
    builder.add_output(destination(), 4_000).expect("add output");
    builder
        .sign(SignRequest::new(0, &signer, PrevOutScriptType::P2pk))
        .expect("sign");

    let tx = builder.build().expect("build");
    let sig = p2pk::decode_input(tx.inputs[0].script_sig.to_bytes()).expect("p2pk scriptSig");
    let hash = tx.hash_for_signature(0, prev.to_bytes(), SIGHASH_ALL).expect("sighash");
    assert_ecdsa_valid(&signer, &hash, &sig);
}

#[test]
fn test_p2sh_p2wpkh_spend() {
    let signer = key(4);
    let redeem = p2wpkh::output_script_for_pubkey(&pubkey(&signer));
    let prev = p2sh::output_script_for_redeem(redeem.to_bytes());

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([4; 32], 0, None, Some(&prev), Some(60_000)).expect("add input");
    builder.add_output(destination(), 59_000).expect("add output");
    builder
        .sign(
            SignRequest::new(0, &signer, PrevOutScriptType::P2shP2wpkh)
                .with_redeem_script(redeem.to_bytes())
                .with_witness_value(60_000),
        )
        .expect("sign");

    let tx = builder.build().expect("build");
    let (inner, redeem_out) = p2sh::decode_input(tx.inputs[0].script_sig.to_bytes()).expect("p2sh scriptSig");
    assert!(inner.is_empty(), "nested segwit pushes only the redeem script");
    assert_eq!(redeem_out, redeem.to_bytes());
    assert_eq!(tx.inputs[0].witness.len(), 2);

    let script_code = p2pkh::output_script_for_pubkey(&pubkey(&signer));
    let hash = tx
        .hash_for_witness_v0(0, script_code.to_bytes(), 60_000, SIGHASH_ALL)
        .expect("sighash");
    assert_ecdsa_valid(&signer, &hash, &tx.inputs[0].witness[0]);
}

#[test]
fn test_incomplete_p2sh_multisig() {
    let keys = [key(11), key(12), key(13)];
    let pubkeys: Vec<Vec<u8>> = keys.iter().map(pubkey).collect();
    let redeem = p2ms::output_script(2, &pubkeys).expect("multisig");

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([5; 32], 0, None, None, None).expect("add input");
    builder.add_output(destination(), 10_000).expect("add output");
    builder
        .sign(p2sh_multisig_request(&keys[0], &redeem))
        .expect("sign with key #1");

    let partial = builder.build_incomplete().expect("incomplete build");
    let (inner, redeem_out) = p2sh::decode_input(partial.inputs[0].script_sig.to_bytes()).expect("p2sh scriptSig");
    assert_eq!(redeem_out, redeem.to_bytes());
    let slots = p2ms::decode_input(&inner).expect("multisig scriptSig");
    assert_eq!(slots.len(), 3, "one entry per key");
    assert!(slots[0].is_some(), "key #1 signed");
    assert!(slots[1].is_none() && slots[2].is_none(), "placeholders for keys #2 and #3");

    assert!(
        matches!(builder.build(), Err(TransactionError::BuildIncomplete(_))),
        "strict build needs two signatures"
    );

    builder
        .sign(p2sh_multisig_request(&keys[2], &redeem))
        .expect("sign with key #3");
    let tx = builder.build().expect("complete build");
    let (inner, _) = p2sh::decode_input(tx.inputs[0].script_sig.to_bytes()).expect("p2sh scriptSig");
    let stack = script_to_stack(&inner).expect("push only");
    assert_eq!(stack.len(), 3, "dummy plus two signatures");
    assert!(stack[0].is_empty());

    let hash = tx.hash_for_signature(0, redeem.to_bytes(), SIGHASH_ALL).expect("sighash");
    assert_ecdsa_valid(&keys[0], &hash, &stack[1]);
    assert_ecdsa_valid(&keys[2], &hash, &stack[2]);
}

#[test]
fn test_p2wsh_multisig_spend() {
    let keys = [key(21), key(22)];
    let pubkeys: Vec<Vec<u8>> = keys.iter().map(pubkey).collect();
    let witness_script = p2ms::output_script(2, &pubkeys).expect("multisig");
    let prev = p2wsh::output_script_for_witness_script(witness_script.to_bytes());

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([6; 32], 1, None, Some(&prev), Some(80_000)).expect("add input");
    builder.add_output(destination(), 79_000).expect("add output");
    for signer in &keys {
        builder
            .sign(
                SignRequest::new(0, signer, PrevOutScriptType::P2wshP2ms)
                    .with_witness_script(witness_script.to_bytes())
                    .with_witness_value(80_000),
            )
            .expect("sign");
    }

    let tx = builder.build().expect("build");
    let witness = &tx.inputs[0].witness;
    assert!(tx.inputs[0].script_sig.is_empty());
    assert_eq!(witness.len(), 4, "dummy, two signatures, witness script");
    assert!(witness[0].is_empty());
    assert_eq!(witness[3], witness_script.to_bytes());

    let hash = tx
        .hash_for_witness_v0(0, witness_script.to_bytes(), 80_000, SIGHASH_ALL)
        .expect("sighash");
    assert_ecdsa_valid(&keys[0], &hash, &witness[1]);
    assert_ecdsa_valid(&keys[1], &hash, &witness[2]);
}

#[test]
fn test_p2sh_p2wsh_p2pkh_spend() {
    let signer = key(23);
    let witness_script = p2pkh::output_script_for_pubkey(&pubkey(&signer));
    let redeem = p2wsh::output_script_for_witness_script(witness_script.to_bytes());
    let prev = p2sh::output_script_for_redeem(redeem.to_bytes());

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([7; 32], 0, None, Some(&prev), Some(30_000)).expect("add input");
    builder.add_output(destination(), 29_000).expect("add output");
    builder
        .sign(
            SignRequest::new(0, &signer, PrevOutScriptType::P2shP2wshP2pkh)
                .with_redeem_script(redeem.to_bytes())
                .with_witness_script(witness_script.to_bytes())
                .with_witness_value(30_000),
        )
        .expect("sign");

    let tx = builder.build().expect("build");
    let (_, redeem_out) = p2sh::decode_input(tx.inputs[0].script_sig.to_bytes()).expect("p2sh scriptSig");
    assert_eq!(redeem_out, redeem.to_bytes());
    let witness = &tx.inputs[0].witness;
    assert_eq!(witness.len(), 3, "signature, pubkey, witness script");
    assert_eq!(witness[1], pubkey(&signer));
    assert_eq!(witness[2], witness_script.to_bytes());
}

#[test]
fn test_taproot_key_path_spend() {
    let signer = key(31);
    let prev = p2tr::output_script_for_internal_key(&signer.pub_key().x_only(), None).expect("p2tr output");

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([8; 32], 0, None, Some(&prev), Some(50_000)).expect("add input");
    builder.add_output(destination(), 40_000).expect("add output");
    builder
        .sign(SignRequest::new(0, &signer, PrevOutScriptType::P2tr).with_hash_type(SIGHASH_DEFAULT))
        .expect("sign");

    let tx = builder.build().expect("build");
    let witness = &tx.inputs[0].witness;
    assert_eq!(witness.len(), 1, "key path witness is a single signature");
    assert_eq!(witness[0].len(), 64, "DEFAULT omits the hash-type byte");

    let prevouts = [TransactionOutput::new(50_000, prev.clone())];
    let hash = tx
        .hash_for_witness_v1(0, &prevouts, SIGHASH_DEFAULT, None, None)
        .expect("sighash");
    let output_key = p2tr::output_key(prev.to_bytes()).expect("output key");
    assert!(schnorr::verify(&output_key, &hash, &witness[0]), "signature verifies under the tweaked key");
}

#[test]
fn test_taproot_script_path_n_of_n() {
    let keys = [key(41), key(42)];
    let x_only: Vec<Vec<u8>> = keys.iter().map(|k| k.pub_key().x_only().to_vec()).collect();
    let tapscript = p2tr_ns::output_script(&x_only).expect("n-of-n tapscript");
    let leaf = leaf_hash(LEAF_VERSION_TAPSCRIPT, tapscript.to_bytes());
    let internal = key(43).pub_key().x_only();
    let output_key = tweak_public_key(&internal, Some(&leaf)).expect("tweak");
    let cb = control_block(LEAF_VERSION_TAPSCRIPT, output_key.parity, &internal, &[]);
    let prev = p2tr::output_script(&output_key.x_only);

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([9; 32], 2, None, Some(&prev), Some(70_000)).expect("add input");
    builder.add_output(destination(), 69_000).expect("add output");
    for signer in keys.iter().rev() {
        builder
            .sign(
                SignRequest::new(0, signer, PrevOutScriptType::P2trP2ns)
                    .with_witness_script(tapscript.to_bytes())
                    .with_control_block(&cb),
            )
            .expect("sign");
    }

    let tx = builder.build().expect("build");
    let witness = &tx.inputs[0].witness;
    assert_eq!(witness.len(), 4, "two signatures, tapscript, control block");
    assert_eq!(witness[2], tapscript.to_bytes());
    assert_eq!(witness[3], cb);

    let prevouts = [TransactionOutput::new(70_000, prev)];
    let hash = tx
        .hash_for_witness_v1(0, &prevouts, SIGHASH_DEFAULT, Some(&leaf), None)
        .expect("sighash");
    // Stack order is reversed: the last key's signature is consumed first.
    assert!(schnorr::verify(&x_only[1], &hash, &witness[0]));
    assert!(schnorr::verify(&x_only[0], &hash, &witness[1]));
}

#[test]
fn test_taproot_needs_every_prevout() {
    let signer = key(32);
    let prev = p2tr::output_script_for_internal_key(&signer.pub_key().x_only(), None).expect("p2tr output");

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([10; 32], 0, None, Some(&prev), Some(50_000)).expect("add input");
    builder.add_input([11; 32], 0, None, None, None).expect("add input");
    builder.add_output(destination(), 40_000).expect("add output");
    let result = builder.sign(SignRequest::new(0, &signer, PrevOutScriptType::P2tr));
    assert!(matches!(result, Err(TransactionError::SigningState(_))), "input #1 prevout unknown");
    assert!(!builder.inputs()[0].has_signatures(), "failed sign leaves no trace");
}

// -----------------------------------------------------------------------
// Fee sanity
// -----------------------------------------------------------------------

#[test]
fn test_fee_sanity_rejection() {
    let signer = key(51);
    let prev = p2pkh::output_script_for_pubkey(&pubkey(&signer));

    let mut builder = TransactionBuilder::new(BuilderConfig::new(1)).expect("builder");
    builder.add_input([12; 32], 0, None, Some(&prev), Some(600)).expect("add input");
    builder.add_input([13; 32], 0, None, Some(&prev), Some(400)).expect("add input");
    builder.add_output(destination(), 10).expect("add output");
    for vin in 0..2 {
        builder
            .sign(SignRequest::new(vin, &signer, PrevOutScriptType::P2pkh))
            .expect("sign");
    }

    match builder.build() {
        Err(TransactionError::FeeSanity { fee_rate, maximum }) => {
            assert_eq!(maximum, 1);
            assert!(fee_rate >= 2, "990 sats over a few hundred vbytes");
        }
        other => panic!("expected fee sanity error, got {:?}", other),
    }
    assert!(builder.build_incomplete().is_ok(), "incomplete builds skip the fee check");
}

// -----------------------------------------------------------------------
// Signing state
// -----------------------------------------------------------------------

#[test]
fn test_out_of_order_signing_lands_in_key_slots() {
    let keys = [key(61), key(62), key(63)];
    let pubkeys: Vec<Vec<u8>> = keys.iter().map(pubkey).collect();
    let redeem = p2ms::output_script(2, &pubkeys).expect("multisig");

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([14; 32], 0, None, None, None).expect("add input");
    builder.add_output(destination(), 1_000).expect("add output");
    builder.sign(p2sh_multisig_request(&keys[2], &redeem)).expect("sign key #3");
    builder.sign(p2sh_multisig_request(&keys[0], &redeem)).expect("sign key #1");

    let slots = &builder.inputs()[0].slots;
    assert_eq!(slots.len(), 3);
    assert!(slots[0].is_signed() && !slots[1].is_signed() && slots[2].is_signed());
    assert_eq!(slots[2].pubkey.as_deref(), Some(&pubkeys[2][..]));

    let before = builder.inputs().to_vec();
    let again = builder.sign(p2sh_multisig_request(&keys[0], &redeem));
    assert!(matches!(again, Err(TransactionError::SigningState(_))), "double sign rejected");
    let stranger = key(64);
    let foreign = builder.sign(p2sh_multisig_request(&stranger, &redeem));
    assert!(matches!(foreign, Err(TransactionError::SigningState(_))), "foreign key rejected");
    assert_eq!(builder.inputs(), &before[..], "failed signs leave the session unchanged");
}

#[test]
fn test_sign_requires_outputs() {
    let signer = key(65);
    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([15; 32], 0, None, None, None).expect("add input");
    let result = builder.sign(SignRequest::new(0, &signer, PrevOutScriptType::P2pkh));
    assert!(matches!(result, Err(TransactionError::SigningState(_))));
    builder
        .sign(SignRequest::new(0, &signer, PrevOutScriptType::P2pkh).with_hash_type(SIGHASH_NONE))
        .expect("NONE commits to no outputs");
}

#[test]
fn test_redeem_script_mismatch() {
    let keys = [key(66), key(67)];
    let pubkeys: Vec<Vec<u8>> = keys.iter().map(pubkey).collect();
    let redeem = p2ms::output_script(1, &pubkeys).expect("multisig");
    let prev = p2sh::output_script_for_redeem(p2ms::output_script(2, &pubkeys).expect("multisig").to_bytes());

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([16; 32], 0, None, Some(&prev), None).expect("add input");
    builder.add_output(destination(), 1_000).expect("add output");
    let result = builder.sign(
        SignRequest::new(0, &keys[0], PrevOutScriptType::P2shP2ms).with_redeem_script(redeem.to_bytes()),
    );
    assert!(matches!(result, Err(TransactionError::InconsistentMetadata(_))));

    let result = builder.sign(SignRequest::new(0, &keys[0], PrevOutScriptType::P2wpkh).with_witness_value(1));
    assert!(
        matches!(result, Err(TransactionError::InconsistentMetadata(_))),
        "recorded P2SH prevout cannot be signed as P2WPKH"
    );
}

#[test]
fn test_declared_shape_must_match_prepared_input() {
    let signer = key(68);
    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([24; 32], 0, None, None, Some(100_000)).expect("add input");
    builder.add_output(destination(), 99_000).expect("add output");

    let segwit = builder.sign(SignRequest::new(0, &signer, PrevOutScriptType::P2wpkh).with_witness_value(100_000));
    assert!(
        matches!(segwit, Err(TransactionError::InconsistentMetadata(_))),
        "without a prevout the input is prepared as P2PKH"
    );
    let taproot = builder.sign(SignRequest::new(0, &signer, PrevOutScriptType::P2tr));
    assert!(matches!(taproot, Err(TransactionError::InconsistentMetadata(_))));
    assert_eq!(builder.inputs()[0].path, None, "failed sign leaves no trace");
    assert!(!builder.inputs()[0].has_signatures());

    builder
        .sign(SignRequest::new(0, &signer, PrevOutScriptType::P2pkh))
        .expect("sign as P2PKH");
    let tx = builder.build().expect("build");
    let (_, pubkey_out) = p2pkh::decode_input(tx.inputs[0].script_sig.to_bytes()).expect("p2pkh scriptSig");
    assert_eq!(pubkey_out, pubkey(&signer));
    assert!(tx.inputs[0].witness.is_empty());
}

#[test]
fn test_wrapping_rejection() {
    let signer = key(71);
    let wrapped = p2wpkh::output_script_for_pubkey(&pubkey(&signer));

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([17; 32], 0, None, None, Some(1_000)).expect("add input");
    builder.add_input([18; 32], 0, None, None, Some(1_000)).expect("add input");
    builder.add_output(destination(), 500).expect("add output");

    let result = builder.sign(
        SignRequest::new(0, &signer, PrevOutScriptType::P2wshP2pkh)
            .with_witness_script(wrapped.to_bytes())
            .with_witness_value(1_000),
    );
    assert!(matches!(result, Err(TransactionError::InvalidWrapping(_))), "P2WSH(P2WPKH)");

    let redeem = p2wsh::output_script_for_witness_script(wrapped.to_bytes());
    let result = builder.sign(
        SignRequest::new(1, &signer, PrevOutScriptType::P2shP2wshP2pkh)
            .with_redeem_script(redeem.to_bytes())
            .with_witness_script(wrapped.to_bytes())
            .with_witness_value(1_000),
    );
    assert!(matches!(result, Err(TransactionError::InvalidWrapping(_))), "P2SH(P2WSH(P2WPKH))");
}

// -----------------------------------------------------------------------
// Mutation guards
// -----------------------------------------------------------------------

fn signed_session(hash_type: u8, inputs: u8, outputs: usize) -> TransactionBuilder {
    let signer = key(81);
    let prev = p2pkh::output_script_for_pubkey(&pubkey(&signer));
    let mut builder = TransactionBuilder::new(config()).expect("builder");
    for n in 0..inputs {
        builder.add_input([100 + n; 32], 0, None, Some(&prev), Some(10_000)).expect("add input");
    }
    for _ in 0..outputs {
        builder.add_output(destination(), 1_000).expect("add output");
    }
    builder
        .sign(SignRequest::new(0, &signer, PrevOutScriptType::P2pkh).with_hash_type(hash_type))
        .expect("sign");
    builder
}

#[test]
fn test_sighash_all_freezes_everything() {
    let mut builder = signed_session(SIGHASH_ALL, 1, 1);
    assert!(matches!(
        builder.add_input([200; 32], 0, None, None, None),
        Err(TransactionError::MutationInvalidation(_))
    ));
    assert!(matches!(
        builder.add_output(destination(), 1),
        Err(TransactionError::MutationInvalidation(_))
    ));
    assert!(matches!(builder.set_lock_time(500), Err(TransactionError::MutationInvalidation(_))));
    assert_eq!(builder.transaction().inputs.len(), 1, "rejected mutations change nothing");
    assert_eq!(builder.transaction().outputs.len(), 1);
}

#[test]
fn test_anyonecanpay_allows_inputs() {
    let mut builder = signed_session(SIGHASH_ALL | SIGHASH_ANYONECANPAY, 1, 1);
    builder.add_input([201; 32], 0, None, None, None).expect("ANYONECANPAY permits inputs");
    assert!(builder.add_output(destination(), 1).is_err(), "ALL still commits to outputs");
}

#[test]
fn test_sighash_none_allows_outputs() {
    let mut builder = signed_session(SIGHASH_NONE, 1, 1);
    builder.add_output(destination(), 1).expect("NONE permits outputs");
    assert!(builder.add_input([202; 32], 0, None, None, None).is_err());
}

#[test]
fn test_sighash_single_output_guard() {
    let mut builder = signed_session(SIGHASH_SINGLE, 2, 1);
    builder.add_output(destination(), 1).expect("2 inputs <= 2 outputs after append");

    let mut crowded = signed_session(SIGHASH_SINGLE, 3, 1);
    assert!(matches!(
        crowded.add_output(destination(), 1),
        Err(TransactionError::MutationInvalidation(_))
    ));
}

#[test]
fn test_duplicate_and_coinbase_inputs() {
    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([1; 32], 0, None, None, None).expect("add input");
    assert!(matches!(
        builder.add_input([1; 32], 0, None, None, None),
        Err(TransactionError::InvalidArgument(_))
    ));
    builder.add_input([1; 32], 1, None, None, None).expect("different vout");
    assert!(matches!(
        builder.add_input([0; 32], 0, None, None, None),
        Err(TransactionError::InvalidArgument(_))
    ));
}

#[test]
fn test_add_input_from_transaction() {
    let signer = key(82);
    let mut funding = Transaction::new();
    funding.add_output(TransactionOutput::new(
        25_000,
        p2wpkh::output_script_for_pubkey(&pubkey(&signer)),
    ));

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input_from_transaction(&funding, 0, None).expect("add input");
    assert!(builder.add_input_from_transaction(&funding, 1, None).is_err(), "no output #1");
    builder.add_output(destination(), 24_000).expect("add output");
    builder
        .sign(SignRequest::new(0, &signer, PrevOutScriptType::P2wpkh).with_witness_value(25_000))
        .expect("sign");
    let tx = builder.build().expect("build");
    assert_eq!(tx.inputs[0].txid, funding.tx_id());
}

// -----------------------------------------------------------------------
// Resuming sessions
// -----------------------------------------------------------------------

#[test]
fn test_from_transaction_roundtrip_p2wpkh() {
    let signer = key(91);
    let prev = p2wpkh::output_script_for_pubkey(&pubkey(&signer));
    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.set_lock_time(700_000).expect("no signatures yet");
    builder.add_input([20; 32], 0, None, Some(&prev), Some(100_000)).expect("add input");
    builder.add_output(destination(), 99_000).expect("add output");
    builder
        .sign(SignRequest::new(0, &signer, PrevOutScriptType::P2wpkh).with_witness_value(100_000))
        .expect("sign");
    let tx = builder.build().expect("build");

    let parsed = Transaction::from_hex(&tx.to_hex()).expect("parse");
    assert_eq!(parsed, tx);
    let prevouts = [TransactionOutput::new(100_000, prev)];
    let resumed = TransactionBuilder::from_transaction(&parsed, Some(&prevouts[..]), config()).expect("resume");
    assert_eq!(resumed.inputs()[0].value, Some(100_000));
    assert_eq!(resumed.build().expect("rebuild"), tx, "a complete transaction rebuilds unchanged");

    let mut resumed = resumed;
    let again = resumed.sign(SignRequest::new(0, &signer, PrevOutScriptType::P2wpkh).with_witness_value(100_000));
    assert!(matches!(again, Err(TransactionError::SigningState(_))));
}

#[test]
fn test_from_transaction_continues_multisig() {
    let keys = [key(92), key(93), key(94)];
    let pubkeys: Vec<Vec<u8>> = keys.iter().map(pubkey).collect();
    let redeem = p2ms::output_script(2, &pubkeys).expect("multisig");

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([21; 32], 0, None, None, None).expect("add input");
    builder.add_output(destination(), 5_000).expect("add output");
    builder
        .sign(p2sh_multisig_request(&keys[1], &redeem))
        .expect("sign key #2");
    let partial = builder.build_incomplete().expect("incomplete");

    let mut resumed = TransactionBuilder::from_transaction(&partial, None, config()).expect("resume");
    let slots = &resumed.inputs()[0].slots;
    assert!(!slots[0].is_signed() && slots[1].is_signed() && !slots[2].is_signed());
    resumed
        .sign(p2sh_multisig_request(&keys[2], &redeem))
        .expect("sign key #3");
    let tx = resumed.build().expect("complete");

    let mut direct = builder;
    direct
        .sign(p2sh_multisig_request(&keys[2], &redeem))
        .expect("sign key #3");
    assert_eq!(tx, direct.build().expect("complete"), "resumed and direct sessions agree");
}

#[test]
fn test_multisig_reorder_by_verification() {
    let keys = [key(95), key(96), key(97)];
    let pubkeys: Vec<Vec<u8>> = keys.iter().map(pubkey).collect();
    let redeem = p2ms::output_script(2, &pubkeys).expect("multisig");

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([22; 32], 0, None, None, None).expect("add input");
    builder.add_output(destination(), 5_000).expect("add output");
    for signer in [&keys[0], &keys[2]] {
        builder
            .sign(p2sh_multisig_request(signer, &redeem))
            .expect("sign");
    }
    let tx = builder.build().expect("build");

    // Swap the two signatures inside the scriptSig.
    let (inner, redeem_out) = p2sh::decode_input(tx.inputs[0].script_sig.to_bytes()).expect("p2sh scriptSig");
    let stack = script_to_stack(&inner).expect("push only");
    let reversed = p2ms::input_script(&[stack[2].clone(), stack[1].clone()]).expect("multisig scriptSig");
    let mut shuffled = tx.clone();
    shuffled.inputs[0].script_sig = p2sh::input_script(reversed.to_bytes(), &redeem_out).expect("p2sh scriptSig");
    assert_ne!(shuffled, tx);

    let resumed = TransactionBuilder::from_transaction(&shuffled, None, config()).expect("resume");
    let record = &resumed.inputs()[0];
    assert!(record.unmatched_signatures.is_empty(), "both signatures matched a key");
    assert_eq!(record.slots[0].signature.as_deref(), Some(&stack[1][..]));
    assert!(!record.slots[1].is_signed());
    assert_eq!(record.slots[2].signature.as_deref(), Some(&stack[2][..]));
    assert_eq!(resumed.build().expect("rebuild"), tx, "reordering restores key order");
}

#[test]
fn test_from_transaction_keeps_nonstandard_inputs() {
    let mut tx = Transaction::new();
    let mut input = crate::input::TransactionInput::new([23; 32], 0, None);
    input.script_sig = Script::from_bytes(&[0x51]);
    tx.add_input(input);
    tx.add_output(TransactionOutput::new(1_000, destination()));

    let resumed = TransactionBuilder::from_transaction(&tx, None, config()).expect("resume");
    assert_eq!(resumed.build_incomplete().expect("incomplete"), tx);
    assert!(matches!(resumed.build(), Err(TransactionError::Unsupported(_))));
}

#[test]
fn test_from_transaction_keeps_supplied_witness_program() {
    let mut witness_script = vec![0xc0];
    witness_script.extend([0x11; 32]);
    let prev = p2wsh::output_script_for_witness_script(&witness_script);

    let mut tx = Transaction::new();
    let mut input = crate::input::TransactionInput::new([25; 32], 0, None);
    input.witness = vec![vec![0x22; 32], witness_script];
    tx.add_input(input);
    tx.add_output(TransactionOutput::new(1_000, destination()));

    let prevouts = [TransactionOutput::new(2_000, prev.clone())];
    let resumed = TransactionBuilder::from_transaction(&tx, Some(&prevouts[..]), config()).expect("resume");
    let record = &resumed.inputs()[0];
    assert_eq!(record.prev_out_script.as_deref(), Some(prev.to_bytes()));
    assert_eq!(record.path, None, "a P2WSH witness is never read as a script path");
    assert_eq!(resumed.build_incomplete().expect("incomplete"), tx);
    assert!(matches!(resumed.build(), Err(TransactionError::BuildIncomplete(_))));
}

#[test]
fn test_from_transaction_rejects_foreign_prevout() {
    let signer = key(80);
    let prev = p2pkh::output_script_for_pubkey(&pubkey(&signer));
    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([26; 32], 0, None, Some(&prev), None).expect("add input");
    builder.add_output(destination(), 5_000).expect("add output");
    builder
        .sign(SignRequest::new(0, &signer, PrevOutScriptType::P2pkh))
        .expect("sign");
    let tx = builder.build().expect("build");

    let foreign = [TransactionOutput::new(6_000, p2pkh::output_script_for_pubkey(&pubkey(&key(81))))];
    let result = TransactionBuilder::from_transaction(&tx, Some(&foreign[..]), config());
    assert!(matches!(result, Err(TransactionError::InconsistentMetadata(_))));

    let own = [TransactionOutput::new(6_000, prev)];
    let resumed = TransactionBuilder::from_transaction(&tx, Some(&own[..]), config()).expect("resume");
    assert_eq!(resumed.build().expect("rebuild"), tx);
}

#[test]
fn test_from_transaction_continues_p2wsh_multisig() {
    let keys = [key(82), key(83)];
    let pubkeys: Vec<Vec<u8>> = keys.iter().map(pubkey).collect();
    let witness_script = p2ms::output_script(2, &pubkeys).expect("multisig");
    let prev = p2wsh::output_script_for_witness_script(witness_script.to_bytes());

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([27; 32], 0, None, Some(&prev), Some(80_000)).expect("add input");
    builder.add_output(destination(), 79_000).expect("add output");
    builder.sign(p2wsh_multisig_request(&keys[0], &witness_script)).expect("sign key #1");
    let partial = builder.build_incomplete().expect("incomplete");

    let prevouts = [TransactionOutput::new(80_000, prev)];
    let mut resumed = TransactionBuilder::from_transaction(&partial, Some(&prevouts[..]), config()).expect("resume");
    let slots = &resumed.inputs()[0].slots;
    assert!(slots[0].is_signed() && !slots[1].is_signed());
    resumed.sign(p2wsh_multisig_request(&keys[1], &witness_script)).expect("sign key #2");

    let mut direct = builder;
    direct.sign(p2wsh_multisig_request(&keys[1], &witness_script)).expect("sign key #2");
    assert_eq!(
        resumed.build().expect("complete"),
        direct.build().expect("complete"),
        "resumed and direct sessions agree"
    );
}

#[test]
fn test_from_transaction_continues_p2sh_p2wsh_multisig() {
    let keys = [key(84), key(85), key(86)];
    let pubkeys: Vec<Vec<u8>> = keys.iter().map(pubkey).collect();
    let witness_script = p2ms::output_script(2, &pubkeys).expect("multisig");
    let redeem = p2wsh::output_script_for_witness_script(witness_script.to_bytes());
    let prev = p2sh::output_script_for_redeem(redeem.to_bytes());

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([28; 32], 1, None, Some(&prev), Some(60_000)).expect("add input");
    builder.add_output(destination(), 59_000).expect("add output");
    builder.sign(p2sh_p2wsh_multisig_request(&keys[2], &redeem, &witness_script)).expect("sign key #3");
    let partial = builder.build_incomplete().expect("incomplete");

    let prevouts = [TransactionOutput::new(60_000, prev)];
    let mut resumed = TransactionBuilder::from_transaction(&partial, Some(&prevouts[..]), config()).expect("resume");
    let slots = &resumed.inputs()[0].slots;
    assert!(!slots[0].is_signed() && !slots[1].is_signed() && slots[2].is_signed());
    resumed.sign(p2sh_p2wsh_multisig_request(&keys[0], &redeem, &witness_script)).expect("sign key #1");
    let tx = resumed.build().expect("complete");

    let mut direct = builder;
    direct.sign(p2sh_p2wsh_multisig_request(&keys[0], &redeem, &witness_script)).expect("sign key #1");
    assert_eq!(tx, direct.build().expect("complete"), "resumed and direct sessions agree");
    let (_, redeem_out) = p2sh::decode_input(tx.inputs[0].script_sig.to_bytes()).expect("p2sh scriptSig");
    assert_eq!(redeem_out, redeem.to_bytes());
}

#[test]
fn test_from_transaction_roundtrip_taproot_key_path() {
    let signer = key(87);
    let prev = p2tr::output_script_for_internal_key(&signer.pub_key().x_only(), None).expect("p2tr output");
    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([29; 32], 0, None, Some(&prev), Some(50_000)).expect("add input");
    builder.add_output(destination(), 49_000).expect("add output");
    builder
        .sign(SignRequest::new(0, &signer, PrevOutScriptType::P2tr).with_hash_type(SIGHASH_ALL))
        .expect("sign");
    let tx = builder.build().expect("build");

    let prevouts = [TransactionOutput::new(50_000, prev)];
    let mut resumed = TransactionBuilder::from_transaction(&tx, Some(&prevouts[..]), config()).expect("resume");
    assert_eq!(resumed.build().expect("rebuild"), tx, "a complete transaction rebuilds unchanged");
    let again = resumed.sign(SignRequest::new(0, &signer, PrevOutScriptType::P2tr));
    assert!(matches!(again, Err(TransactionError::SigningState(_))));
}

#[test]
fn test_from_transaction_continues_taproot_n_of_n() {
    let keys = [key(88), key(89)];
    let x_only: Vec<Vec<u8>> = keys.iter().map(|k| k.pub_key().x_only().to_vec()).collect();
    let tapscript = p2tr_ns::output_script(&x_only).expect("n-of-n tapscript");
    let leaf = leaf_hash(LEAF_VERSION_TAPSCRIPT, tapscript.to_bytes());
    let internal = key(90).pub_key().x_only();
    let output_key = tweak_public_key(&internal, Some(&leaf)).expect("tweak");
    let cb = control_block(LEAF_VERSION_TAPSCRIPT, output_key.parity, &internal, &[]);
    let prev = p2tr::output_script(&output_key.x_only);

    let mut builder = TransactionBuilder::new(config()).expect("builder");
    builder.add_input([30; 32], 0, None, Some(&prev), Some(70_000)).expect("add input");
    builder.add_output(destination(), 69_000).expect("add output");
    builder.sign(taproot_n_of_n_request(&keys[1], &tapscript, &cb)).expect("sign key #2");
    let partial = builder.build_incomplete().expect("incomplete");

    let prevouts = [TransactionOutput::new(70_000, prev)];
    let mut resumed = TransactionBuilder::from_transaction(&partial, Some(&prevouts[..]), config()).expect("resume");
    resumed.sign(taproot_n_of_n_request(&keys[0], &tapscript, &cb)).expect("sign key #1");
    let tx = resumed.build().expect("complete");

    let witness = &tx.inputs[0].witness;
    assert_eq!(witness.len(), 4, "two signatures, tapscript, control block");
    assert_eq!(witness[0], partial.inputs[0].witness[0], "earlier signature survives the resume");
    assert_eq!(witness[2], tapscript.to_bytes());
    assert_eq!(witness[3], cb);
    let hash = tx
        .hash_for_witness_v1(0, &prevouts, SIGHASH_DEFAULT, Some(&leaf), None)
        .expect("sighash");
    assert!(schnorr::verify(&x_only[1], &hash, &witness[0]));
    assert!(schnorr::verify(&x_only[0], &hash, &witness[1]));
}
