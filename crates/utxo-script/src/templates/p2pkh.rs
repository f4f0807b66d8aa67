//! Pay-to-pubkey-hash: `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`.

use utxo_primitives::hash::hash160;

use super::push_data;
use crate::chunk::{decode_script, ScriptChunk};
use crate::opcodes::*;
use crate::signature::{is_canonical_pubkey, is_canonical_script_signature};
use crate::{Script, ScriptError};

/// Length of a P2PKH output script.
pub const OUTPUT_LEN: usize = 25;

/// Whether `script` is a P2PKH output.
pub fn check_output(script: &[u8]) -> bool {
    script.len() == OUTPUT_LEN
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == OP_DATA_20
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
}

/// Whether `chunks` is a P2PKH scriptSig: `<sig> <pubkey>`.
pub fn check_input(chunks: &[ScriptChunk]) -> bool {
    match chunks {
        [sig, pubkey] => {
            push_data(sig).map_or(false, is_canonical_script_signature)
                && push_data(pubkey).map_or(false, is_canonical_pubkey)
        }
        _ => false,
    }
}

/// The committed pubkey hash of a P2PKH output.
pub fn pubkey_hash(script: &[u8]) -> Option<[u8; 20]> {
    if !check_output(script) {
        return None;
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&script[3..23]);
    Some(hash)
}

/// Build a P2PKH output for a pubkey hash.
pub fn output_script(pubkey_hash: &[u8; 20]) -> Script {
    let mut bytes = Vec::with_capacity(OUTPUT_LEN);
    bytes.extend_from_slice(&[OP_DUP, OP_HASH160, OP_DATA_20]);
    bytes.extend_from_slice(pubkey_hash);
    bytes.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    Script::from(bytes)
}

/// Build the P2PKH output paying to `pubkey`.
pub fn output_script_for_pubkey(pubkey: &[u8]) -> Script {
    output_script(&hash160(pubkey))
}

/// Build a P2PKH scriptSig.
pub fn input_script(signature: &[u8], pubkey: &[u8]) -> Result<Script, ScriptError> {
    let mut script = Script::new();
    script.append_push_data(signature)?;
    script.append_push_data(pubkey)?;
    Ok(script)
}

/// Split a P2PKH scriptSig into its signature and public key.
pub fn decode_input(script: &[u8]) -> Result<(Vec<u8>, Vec<u8>), ScriptError> {
    let chunks = decode_script(script)?;
    if !check_input(&chunks) {
        return Err(ScriptError::InvalidTemplate("not a p2pkh input".to_string()));
    }
    let item = |i: usize| push_data(&chunks[i]).map(<[u8]>::to_vec).unwrap_or_default();
    Ok((item(0), item(1)))
}
