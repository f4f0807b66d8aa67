//! Pay-to-pubkey: `<pubkey> OP_CHECKSIG`.

use super::push_data;
use crate::chunk::{decode_script, ScriptChunk};
use crate::opcodes::OP_CHECKSIG;
use crate::signature::{is_canonical_pubkey, is_canonical_script_signature};
use crate::{Script, ScriptError};

/// Whether `chunks` is a P2PK output.
pub fn check_output(chunks: &[ScriptChunk]) -> bool {
    match chunks {
        [pubkey, checksig] => {
            push_data(pubkey).map_or(false, is_canonical_pubkey)
                && checksig.data().is_none()
                && checksig.op == OP_CHECKSIG
        }
        _ => false,
    }
}

/// Whether `chunks` is a P2PK scriptSig: a single canonical signature.
pub fn check_input(chunks: &[ScriptChunk]) -> bool {
    match chunks {
        [sig] => push_data(sig).map_or(false, is_canonical_script_signature),
        _ => false,
    }
}

/// The public key of a P2PK output.
pub fn pubkey(script: &[u8]) -> Result<Vec<u8>, ScriptError> {
    let chunks = decode_script(script)?;
    if !check_output(&chunks) {
        return Err(ScriptError::InvalidTemplate("not a p2pk output".to_string()));
    }
    Ok(push_data(&chunks[0]).map(<[u8]>::to_vec).unwrap_or_default())
}

/// Build a P2PK output.
pub fn output_script(pubkey: &[u8]) -> Result<Script, ScriptError> {
    if !is_canonical_pubkey(pubkey) {
        return Err(ScriptError::InvalidTemplate("p2pk requires a valid public key".to_string()));
    }
    let mut script = Script::new();
    script.append_push_data(pubkey)?;
    script.append_opcodes(&[OP_CHECKSIG])?;
    Ok(script)
}

/// Build a P2PK scriptSig.
pub fn input_script(signature: &[u8]) -> Result<Script, ScriptError> {
    let mut script = Script::new();
    script.append_push_data(signature)?;
    Ok(script)
}

/// The signature of a P2PK scriptSig.
pub fn decode_input(script: &[u8]) -> Result<Vec<u8>, ScriptError> {
    let chunks = decode_script(script)?;
    if !check_input(&chunks) {
        return Err(ScriptError::InvalidTemplate("not a p2pk input".to_string()));
    }
    Ok(push_data(&chunks[0]).map(<[u8]>::to_vec).unwrap_or_default())
}
