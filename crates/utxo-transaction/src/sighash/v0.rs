//! BIP143 signature hash for segwit v0 inputs.
//!
//! Commits to the value of the spent output and hashes the shared fields
//! (prevouts, sequences, outputs) once per transaction.
//!
//! See <https://github.com/bitcoin/bips/blob/master/bip-0143.mediawiki>

use utxo_primitives::hash::sha256d;
use utxo_primitives::util::Writer;

use super::{check_input_index, SIGHASH_ANYONECANPAY, SIGHASH_MASK, SIGHASH_NONE, SIGHASH_SINGLE};
use crate::transaction::Transaction;
use crate::TransactionError;

/// Compute the BIP143 signature hash for an input.
///
/// # Arguments
/// * `tx` - The transaction being signed.
/// * `input_index` - Index of the input being signed.
/// * `script_code` - The script code (P2PKH form for P2WPKH, the witness
///   script for P2WSH).
/// * `value` - Value of the output being spent.
/// * `hash_type` - The sighash flags.
///
/// # Returns
/// The double-SHA256 of the preimage.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    value: u64,
    hash_type: u8,
) -> Result<[u8; 32], TransactionError> {
    let preimage = calc_preimage(tx, input_index, script_code, value, hash_type)?;
    Ok(sha256d(&preimage))
}

/// Compute the BIP143 preimage before double-hashing.
///
/// The preimage consists of:
/// 1. nVersion (4 bytes LE)
/// 2. hashPrevouts (32 bytes) - sha256d of all outpoints unless ANYONECANPAY
/// 3. hashSequence (32 bytes) - sha256d of all sequences unless ANYONECANPAY/SINGLE/NONE
/// 4. outpoint (32+4 bytes) - txid + vout of the input being signed
/// 5. scriptCode (varint + script)
/// 6. value (8 bytes LE) - amount of the output being spent
/// 7. nSequence (4 bytes LE) - sequence of the input being signed
/// 8. hashOutputs (32 bytes) - sha256d of all outputs or one output
/// 9. nLocktime (4 bytes LE)
/// 10. sighashType (4 bytes LE)
pub fn calc_preimage(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    value: u64,
    hash_type: u8,
) -> Result<Vec<u8>, TransactionError> {
    check_input_index(tx, input_index)?;

    let input = &tx.inputs[input_index];
    let base_type = hash_type & SIGHASH_MASK;
    let anyone_can_pay = hash_type & SIGHASH_ANYONECANPAY != 0;

    let hash_prevouts = if !anyone_can_pay {
        prevouts_hash(tx)
    } else {
        [0u8; 32]
    };

    let hash_sequence = if !anyone_can_pay && base_type != SIGHASH_SINGLE && base_type != SIGHASH_NONE {
        sequence_hash(tx)
    } else {
        [0u8; 32]
    };

    let hash_outputs = if base_type != SIGHASH_SINGLE && base_type != SIGHASH_NONE {
        outputs_hash(tx, None)
    } else if base_type == SIGHASH_SINGLE && input_index < tx.outputs.len() {
        outputs_hash(tx, Some(input_index))
    } else {
        [0u8; 32]
    };

    let mut writer = Writer::with_capacity(256);
    writer.write_u32_le(tx.version);
    writer.write_bytes(&hash_prevouts);
    writer.write_bytes(&hash_sequence);

    // Outpoint (txid + vout)
    writer.write_bytes(&input.txid);
    writer.write_u32_le(input.vout);

    writer.write_var_bytes(script_code);
    writer.write_u64_le(value);
    writer.write_u32_le(input.sequence);
    writer.write_bytes(&hash_outputs);
    writer.write_u32_le(tx.lock_time);
    writer.write_u32_le(u32::from(hash_type));

    Ok(writer.into_bytes())
}

// -----------------------------------------------------------------------
// Internal helper functions
// -----------------------------------------------------------------------

/// Double-SHA256 of all input outpoints concatenated.
fn prevouts_hash(tx: &Transaction) -> [u8; 32] {
    let mut writer = Writer::with_capacity(tx.inputs.len() * 36);
    for input in &tx.inputs {
        writer.write_bytes(&input.txid);
        writer.write_u32_le(input.vout);
    }
    sha256d(writer.as_bytes())
}

/// Double-SHA256 of all input sequence numbers concatenated.
fn sequence_hash(tx: &Transaction) -> [u8; 32] {
    let mut writer = Writer::with_capacity(tx.inputs.len() * 4);
    for input in &tx.inputs {
        writer.write_u32_le(input.sequence);
    }
    sha256d(writer.as_bytes())
}

/// Double-SHA256 of all serialized outputs, or only the one at `index`.
fn outputs_hash(tx: &Transaction, index: Option<usize>) -> [u8; 32] {
    let mut writer = Writer::new();
    match index {
        None => {
            for output in &tx.outputs {
                output.write_to(&mut writer);
            }
        }
        Some(i) => tx.outputs[i].write_to(&mut writer),
    }
    sha256d(writer.as_bytes())
}
