//! Pay-to-script-hash: `OP_HASH160 <20> OP_EQUAL`.
//!
//! The scriptSig pushes the inner scriptSig items followed by the redeem
//! script. A lone redeem script push is a nested segwit spend.

use utxo_primitives::hash::hash160;

use super::{p2ms, p2pk, p2pkh, p2wpkh, p2wsh, push_data};
use crate::chunk::{decode_script, encode_chunks, ScriptChunk};
use crate::opcodes::*;
use crate::{Script, ScriptError};

/// Length of a P2SH output script.
pub const OUTPUT_LEN: usize = 23;

/// Whether `script` is a P2SH output.
pub fn check_output(script: &[u8]) -> bool {
    script.len() == OUTPUT_LEN
        && script[0] == OP_HASH160
        && script[1] == OP_DATA_20
        && script[22] == OP_EQUAL
}

/// Whether `chunks` is a P2SH scriptSig wrapping a recognized redeem script.
pub fn check_input(chunks: &[ScriptChunk], allow_incomplete: bool) -> bool {
    let Some((last, inner)) = chunks.split_last() else {
        return false;
    };
    let Some(redeem) = push_data(last) else {
        return false;
    };
    let Ok(redeem_chunks) = decode_script(redeem) else {
        return false;
    };
    if !inner.iter().all(ScriptChunk::is_push) {
        return false;
    }
    if inner.is_empty() {
        return p2wsh::check_output(redeem) || p2wpkh::check_output(redeem);
    }

    // Re-decompile the inner scriptSig in its minimal encoding.
    let Ok(inner) = encode_chunks(inner).and_then(|bytes| decode_script(&bytes)) else {
        return false;
    };
    (p2pkh::check_input(&inner) && p2pkh::check_output(redeem))
        || (p2ms::check_input(&inner, allow_incomplete) && p2ms::check_output(&redeem_chunks, false))
        || (p2pk::check_input(&inner) && p2pk::check_output(&redeem_chunks))
}

/// The committed script hash of a P2SH output.
pub fn script_hash(script: &[u8]) -> Option<[u8; 20]> {
    if !check_output(script) {
        return None;
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&script[2..22]);
    Some(hash)
}

/// Build a P2SH output for a script hash.
pub fn output_script(script_hash: &[u8; 20]) -> Script {
    let mut bytes = Vec::with_capacity(OUTPUT_LEN);
    bytes.extend_from_slice(&[OP_HASH160, OP_DATA_20]);
    bytes.extend_from_slice(script_hash);
    bytes.push(OP_EQUAL);
    Script::from(bytes)
}

/// Build the P2SH output committing to `redeem_script`.
pub fn output_script_for_redeem(redeem_script: &[u8]) -> Script {
    output_script(&hash160(redeem_script))
}

/// Build a P2SH scriptSig from the inner scriptSig and the redeem script.
pub fn input_script(script_sig: &[u8], redeem_script: &[u8]) -> Result<Script, ScriptError> {
    let mut script = Script::from_bytes(script_sig);
    script.append_push_data(redeem_script)?;
    Ok(script)
}

/// Split a P2SH scriptSig into the inner scriptSig and the redeem script.
pub fn decode_input(script: &[u8]) -> Result<(Vec<u8>, Vec<u8>), ScriptError> {
    let chunks = decode_script(script)?;
    let (last, inner) = chunks
        .split_last()
        .ok_or_else(|| ScriptError::InvalidTemplate("empty p2sh input".to_string()))?;
    let redeem = push_data(last)
        .ok_or_else(|| ScriptError::InvalidTemplate("p2sh input must end with a push".to_string()))?;
    Ok((encode_chunks(inner)?, redeem.to_vec()))
}
