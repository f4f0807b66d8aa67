//! Bare multisig: `m <pubkey>... n OP_CHECKMULTISIG`.
//!
//! The scriptSig is `OP_0 <sig>...`, with the leading `OP_0` consumed by
//! the CHECKMULTISIG off-by-one.

use super::{is_placeholder, push_data};
use crate::chunk::{decode_script, ScriptChunk};
use crate::opcodes::*;
use crate::signature::{is_canonical_pubkey, is_canonical_script_signature};
use crate::{Script, ScriptError};

/// Maximum number of keys in a standard multisig script.
pub const MAX_PUBKEYS: usize = 16;

/// Whether `chunks` is a multisig output.
///
/// With `allow_incomplete` the key chunks are not checked for validity.
pub fn check_output(chunks: &[ScriptChunk], allow_incomplete: bool) -> bool {
    if chunks.len() < 4 {
        return false;
    }
    let last = &chunks[chunks.len() - 1];
    if last.data.is_some() || last.op != OP_CHECKMULTISIG {
        return false;
    }
    let (Some(m), Some(n)) = (small_int(&chunks[0]), small_int(&chunks[chunks.len() - 2])) else {
        return false;
    };
    if m == 0 || n > MAX_PUBKEYS || m > n || n != chunks.len() - 3 {
        return false;
    }
    if allow_incomplete {
        return true;
    }
    chunks[1..chunks.len() - 2]
        .iter()
        .all(|chunk| push_data(chunk).map_or(false, is_canonical_pubkey))
}

/// Whether `chunks` is a multisig scriptSig.
///
/// With `allow_incomplete`, `OP_0` placeholders may stand in for signatures.
pub fn check_input(chunks: &[ScriptChunk], allow_incomplete: bool) -> bool {
    if chunks.len() < 2 || chunks[0].data.is_some() || chunks[0].op != OP_0 {
        return false;
    }
    chunks[1..].iter().all(|chunk| {
        (allow_incomplete && is_placeholder(chunk))
            || push_data(chunk).map_or(false, is_canonical_script_signature)
    })
}

fn small_int(chunk: &ScriptChunk) -> Option<usize> {
    if chunk.data.is_some() {
        return None;
    }
    small_int_value(chunk.op).map(usize::from)
}

/// A decoded multisig output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Multisig {
    /// Required signature count.
    pub m: usize,
    /// Public keys in script order.
    pub pubkeys: Vec<Vec<u8>>,
}

/// Decode a multisig output script.
pub fn decode_output(script: &[u8]) -> Result<Multisig, ScriptError> {
    let chunks = decode_script(script)?;
    if !check_output(&chunks, false) {
        return Err(ScriptError::InvalidTemplate("not a multisig output".to_string()));
    }
    let m = small_int(&chunks[0]).unwrap_or_default();
    let pubkeys = chunks[1..chunks.len() - 2]
        .iter()
        .filter_map(|chunk| push_data(chunk).map(<[u8]>::to_vec))
        .collect();
    Ok(Multisig { m, pubkeys })
}

/// Signature slots of a multisig scriptSig; placeholders decode as `None`.
pub fn decode_input(script: &[u8]) -> Result<Vec<Option<Vec<u8>>>, ScriptError> {
    let chunks = decode_script(script)?;
    if !check_input(&chunks, true) {
        return Err(ScriptError::InvalidTemplate("not a multisig input".to_string()));
    }
    Ok(chunks[1..]
        .iter()
        .map(|chunk| {
            if is_placeholder(chunk) {
                None
            } else {
                push_data(chunk).map(<[u8]>::to_vec)
            }
        })
        .collect())
}

/// Build an m-of-n multisig output.
pub fn output_script(m: usize, pubkeys: &[Vec<u8>]) -> Result<Script, ScriptError> {
    let n = pubkeys.len();
    if m == 0 || m > n || n > MAX_PUBKEYS {
        return Err(ScriptError::InvalidTemplate(format!("invalid multisig {}-of-{}", m, n)));
    }
    if let Some(bad) = pubkeys.iter().position(|key| !is_canonical_pubkey(key)) {
        return Err(ScriptError::InvalidTemplate(format!("invalid multisig pubkey at index {}", bad)));
    }
    let (Some(m_op), Some(n_op)) = (small_int_op(m as u8), small_int_op(n as u8)) else {
        return Err(ScriptError::InvalidTemplate(format!("invalid multisig {}-of-{}", m, n)));
    };
    let mut script = Script::new();
    script.append_opcodes(&[m_op])?;
    for key in pubkeys {
        script.append_push_data(key)?;
    }
    script.append_opcodes(&[n_op, OP_CHECKMULTISIG])?;
    Ok(script)
}

/// Build a multisig scriptSig. Empty entries become `OP_0` placeholders.
pub fn input_script(signatures: &[Vec<u8>]) -> Result<Script, ScriptError> {
    let mut script = Script::new();
    script.append_opcodes(&[OP_0])?;
    for sig in signatures {
        if sig.is_empty() {
            script.append_opcodes(&[OP_0])?;
        } else {
            script.append_push_data(sig)?;
        }
    }
    Ok(script)
}
