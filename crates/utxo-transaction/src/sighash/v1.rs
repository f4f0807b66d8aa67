//! BIP341 signature hash for Taproot inputs.
//!
//! The message commits to every spent output (amounts and scripts) unless
//! ANYONECANPAY is set, and to the annex and tapleaf when present.
//!
//! See <https://github.com/bitcoin/bips/blob/master/bip-0341.mediawiki#common-signature-message>

use utxo_primitives::hash::{sha256, tagged_hash, TAG_TAP_SIGHASH};
use utxo_primitives::util::{VarInt, Writer};

use super::{
    check_input_index, is_valid_taproot_hash_type, SIGHASH_ANYONECANPAY, SIGHASH_NONE,
    SIGHASH_OUTPUT_MASK, SIGHASH_SINGLE,
};
use crate::output::TransactionOutput;
use crate::transaction::Transaction;
use crate::TransactionError;

const EPOCH: u8 = 0x00;
const KEY_VERSION: u8 = 0x00;
const NO_CODESEPARATOR: u32 = 0xFFFF_FFFF;

/// Compute the BIP341 signature hash for an input.
///
/// # Arguments
/// * `tx` - The transaction being signed.
/// * `input_index` - Index of the input being signed.
/// * `prevouts` - The outputs spent by every input, in input order.
/// * `hash_type` - DEFAULT, or ALL/NONE/SINGLE optionally with ANYONECANPAY.
/// * `leaf_hash` - TapLeaf hash for script-path spends.
/// * `annex` - The annex, if the witness carries one.
///
/// # Returns
/// The `TapSighash` tagged hash of the signature message.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    prevouts: &[TransactionOutput],
    hash_type: u8,
    leaf_hash: Option<&[u8; 32]>,
    annex: Option<&[u8]>,
) -> Result<[u8; 32], TransactionError> {
    check_input_index(tx, input_index)?;
    if !is_valid_taproot_hash_type(hash_type) {
        return Err(TransactionError::InvalidArgument(format!(
            "invalid taproot hash type 0x{:02x}",
            hash_type
        )));
    }
    if prevouts.len() != tx.inputs.len() {
        return Err(TransactionError::InvalidArgument(format!(
            "taproot sighash needs {} prevouts, got {}",
            tx.inputs.len(),
            prevouts.len()
        )));
    }

    let output_type = hash_type & SIGHASH_OUTPUT_MASK;
    let anyone_can_pay = hash_type & SIGHASH_ANYONECANPAY != 0;

    let mut msg = Writer::with_capacity(256);
    msg.write_u8(EPOCH);
    msg.write_u8(hash_type);
    msg.write_u32_le(tx.version);
    msg.write_u32_le(tx.lock_time);

    if !anyone_can_pay {
        let mut prevouts_data = Writer::new();
        let mut amounts = Writer::new();
        let mut scripts = Writer::new();
        let mut sequences = Writer::new();
        for (input, prevout) in tx.inputs.iter().zip(prevouts) {
            prevouts_data.write_bytes(&input.txid);
            prevouts_data.write_u32_le(input.vout);
            amounts.write_u64_le(prevout.value);
            scripts.write_var_bytes(prevout.script_pubkey.to_bytes());
            sequences.write_u32_le(input.sequence);
        }
        msg.write_bytes(&sha256(prevouts_data.as_bytes()));
        msg.write_bytes(&sha256(amounts.as_bytes()));
        msg.write_bytes(&sha256(scripts.as_bytes()));
        msg.write_bytes(&sha256(sequences.as_bytes()));
    }

    if output_type != SIGHASH_NONE && output_type != SIGHASH_SINGLE {
        let mut outputs = Writer::new();
        for output in &tx.outputs {
            output.write_to(&mut outputs);
        }
        msg.write_bytes(&sha256(outputs.as_bytes()));
    }

    let spend_type = (u8::from(leaf_hash.is_some()) << 1) | u8::from(annex.is_some());
    msg.write_u8(spend_type);

    let input = &tx.inputs[input_index];
    if anyone_can_pay {
        let prevout = &prevouts[input_index];
        msg.write_bytes(&input.txid);
        msg.write_u32_le(input.vout);
        msg.write_u64_le(prevout.value);
        msg.write_var_bytes(prevout.script_pubkey.to_bytes());
        msg.write_u32_le(input.sequence);
    } else {
        msg.write_u32_le(input_index as u32);
    }

    if let Some(annex) = annex {
        let mut annex_data = Writer::with_capacity(annex.len() + 9);
        annex_data.write_varint(VarInt::from(annex.len()));
        annex_data.write_bytes(annex);
        msg.write_bytes(&sha256(annex_data.as_bytes()));
    }

    if output_type == SIGHASH_SINGLE {
        let output = tx.outputs.get(input_index).ok_or_else(|| {
            TransactionError::InvalidArgument(format!(
                "SIGHASH_SINGLE input {} has no matching output",
                input_index
            ))
        })?;
        msg.write_bytes(&sha256(&output.to_bytes()));
    }

    if let Some(leaf_hash) = leaf_hash {
        msg.write_bytes(leaf_hash);
        msg.write_u8(KEY_VERSION);
        msg.write_u32_le(NO_CODESEPARATOR);
    }

    Ok(tagged_hash(TAG_TAP_SIGHASH, msg.as_bytes()))
}
