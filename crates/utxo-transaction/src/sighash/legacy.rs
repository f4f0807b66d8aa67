//! Legacy (pre-segwit) signature hash.
//!
//! Hashes a modified copy of the transaction: every scriptSig is blanked,
//! the signed input carries the script code, and the hash type prunes
//! inputs and outputs before the copy is serialized without witnesses.

use utxo_primitives::hash::sha256d;
use utxo_primitives::util::Writer;
use utxo_script::Script;

use super::{check_input_index, SIGHASH_ANYONECANPAY, SIGHASH_MASK, SIGHASH_NONE, SIGHASH_SINGLE};
use crate::output::TransactionOutput;
use crate::transaction::Transaction;
use crate::TransactionError;

/// Digest returned for SIGHASH_SINGLE without a matching output: the
/// integer one, little-endian.
pub const SIGHASH_SINGLE_BUG_DIGEST: [u8; 32] = [
    0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// Compute the legacy signature hash for an input.
///
/// # Arguments
/// * `tx` - The transaction being signed.
/// * `input_index` - Index of the input being signed.
/// * `script_code` - The script being satisfied (prevout or redeem script).
/// * `hash_type` - The sighash flags.
///
/// # Returns
/// The 32-byte digest to sign.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    hash_type: u8,
) -> Result<[u8; 32], TransactionError> {
    check_input_index(tx, input_index)?;
    let script_code = Script::from_bytes(script_code).without_codeseparators()?;

    let mut tmp = tx.clone();
    for input in &mut tmp.inputs {
        input.script_sig = Script::new();
        input.witness.clear();
    }

    match hash_type & SIGHASH_MASK {
        SIGHASH_NONE => {
            tmp.outputs.clear();
            zero_other_sequences(&mut tmp, input_index);
        }
        SIGHASH_SINGLE => {
            if input_index >= tx.outputs.len() {
                return Ok(SIGHASH_SINGLE_BUG_DIGEST);
            }
            tmp.outputs.truncate(input_index + 1);
            for output in tmp.outputs.iter_mut().take(input_index) {
                *output = TransactionOutput::new(u64::MAX, Script::new());
            }
            zero_other_sequences(&mut tmp, input_index);
        }
        _ => {}
    }

    if hash_type & SIGHASH_ANYONECANPAY != 0 {
        let mut signed = tmp.inputs.swap_remove(input_index);
        signed.script_sig = script_code;
        tmp.inputs = vec![signed];
    } else {
        tmp.inputs[input_index].script_sig = script_code;
    }

    let mut writer = Writer::new();
    writer.write_bytes(&tmp.to_bytes_no_witness());
    writer.write_u32_le(u32::from(hash_type));
    Ok(sha256d(writer.as_bytes()))
}

fn zero_other_sequences(tx: &mut Transaction, input_index: usize) {
    for (i, input) in tx.inputs.iter_mut().enumerate() {
        if i != input_index {
            input.sequence = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::TransactionInput;
    use crate::sighash::SIGHASH_ALL;
    use utxo_primitives::ec::{PublicKey, Signature};

    fn two_in_one_out() -> Transaction {
        let mut tx = Transaction::new();
        tx.add_input(TransactionInput::new([1u8; 32], 0, None));
        tx.add_input(TransactionInput::new([2u8; 32], 1, None));
        tx.add_output(TransactionOutput::new(5000, Script::from_bytes(&[0x51])));
        tx
    }

    #[test]
    fn test_single_without_output_returns_one() {
        let tx = two_in_one_out();
        let hash = signature_hash(&tx, 1, &[0x51], SIGHASH_SINGLE).expect("sighash");
        assert_eq!(hash, SIGHASH_SINGLE_BUG_DIGEST);
    }

    #[test]
    fn test_codeseparator_is_ignored() {
        let tx = two_in_one_out();
        let plain = signature_hash(&tx, 0, &[0x51], SIGHASH_ALL).expect("sighash");
        let with_sep = signature_hash(&tx, 0, &[0xab, 0x51], SIGHASH_ALL).expect("sighash");
        assert_eq!(plain, with_sep);
    }

    #[test]
    fn test_anyonecanpay_ignores_other_inputs() {
        let tx = two_in_one_out();
        let mut other = tx.clone();
        other.inputs[1].txid = [9u8; 32];
        let flags = SIGHASH_ALL | SIGHASH_ANYONECANPAY;
        assert_eq!(
            signature_hash(&tx, 0, &[0x51], flags).expect("sighash"),
            signature_hash(&other, 0, &[0x51], flags).expect("sighash"),
        );
        assert_ne!(
            signature_hash(&tx, 0, &[0x51], SIGHASH_ALL).expect("sighash"),
            signature_hash(&other, 0, &[0x51], SIGHASH_ALL).expect("sighash"),
        );
    }

    /// First input of the BIP143 native P2WPKH example: a P2PK output
    /// spent with a legacy signature.
    #[test]
    fn test_legacy_p2pk_vector() {
        let tx = Transaction::from_hex(
            "0100000002fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f0000000000eeffffffef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec68a0100000000ffffffff02202cb206000000001976a9148280b37df378db99f66f85c95a783a76ac7a6d5988ac9093510d000000001976a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa815988ac11000000",
        )
        .expect("valid tx");
        let script_code = hex::decode("2103c9f4836b9a4f77fc0d81f7bcb01b7f1b35916864b9476c241ce9fc198bd25432ac")
            .expect("valid hex");

        let hash = signature_hash(&tx, 0, &script_code, SIGHASH_ALL).expect("sighash");
        assert_eq!(
            hex::encode(hash),
            "63cec688ee06a91e913875356dd4dea2f8e0f2a2659885372da2a37e32c7532e"
        );

        let pubkey = PublicKey::from_hex("03c9f4836b9a4f77fc0d81f7bcb01b7f1b35916864b9476c241ce9fc198bd25432")
            .expect("valid pubkey");
        let der = hex::decode(
            "30450221008b9d1dc26ba6a9cb62127b02742fa9d754cd3bebf337f7a55d114c8e5cdd30be022040529b194ba3f9281a99f2b1c0a19c0489bc22ede944ccf4ecbab4cc618ef3ed",
        )
        .expect("valid hex");
        let sig = Signature::from_der(&der).expect("valid DER");
        assert!(pubkey.verify(&hash, &sig), "published signature verifies");
    }

    #[test]
    fn test_out_of_range_input() {
        let tx = two_in_one_out();
        assert!(signature_hash(&tx, 2, &[0x51], SIGHASH_ALL).is_err());
    }
}
