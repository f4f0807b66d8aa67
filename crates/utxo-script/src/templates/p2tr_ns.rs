//! Taproot n-of-n tapscript:
//! `<xonly_1> OP_CHECKSIGVERIFY ... <xonly_n> OP_CHECKSIG`.
//!
//! The witness stack holds one Schnorr signature per key, in reverse key
//! order since the last key is checked first.

use super::push_data;
use crate::chunk::{decode_script, ScriptChunk};
use crate::opcodes::{OP_CHECKSIG, OP_CHECKSIGVERIFY};
use crate::signature::{is_canonical_schnorr_signature, is_xonly_pubkey};
use crate::{Script, ScriptError};

/// Maximum number of keys.
pub const MAX_PUBKEYS: usize = 16;

/// Whether `chunks` is an n-of-n tapscript with at least two keys.
///
/// With `allow_incomplete` the key chunks are not checked for validity.
pub fn check_output(chunks: &[ScriptChunk], allow_incomplete: bool) -> bool {
    if chunks.len() < 4 || chunks.len() % 2 != 0 || chunks.len() / 2 > MAX_PUBKEYS {
        return false;
    }
    let ops_ok = chunks.iter().skip(1).step_by(2).enumerate().all(|(i, chunk)| {
        let want = if 2 * i + 2 == chunks.len() { OP_CHECKSIG } else { OP_CHECKSIGVERIFY };
        chunk.data.is_none() && chunk.op == want
    });
    if !ops_ok {
        return false;
    }
    chunks.iter().step_by(2).all(|chunk| match push_data(chunk) {
        Some(key) => allow_incomplete || is_xonly_pubkey(key),
        None => false,
    })
}

/// Whether `witness` holds one Schnorr signature per stack slot.
///
/// With `allow_incomplete`, empty items may stand in for signatures.
pub fn check_witness(witness: &[Vec<u8>], allow_incomplete: bool) -> bool {
    !witness.is_empty()
        && witness
            .iter()
            .all(|sig| (allow_incomplete && sig.is_empty()) || is_canonical_schnorr_signature(sig))
}

/// The x-only keys of an n-of-n tapscript, in script order.
pub fn pubkeys(script: &[u8]) -> Result<Vec<Vec<u8>>, ScriptError> {
    let chunks = decode_script(script)?;
    if !check_output(&chunks, false) {
        return Err(ScriptError::InvalidTemplate("not an n-of-n tapscript".to_string()));
    }
    Ok(chunks
        .iter()
        .step_by(2)
        .filter_map(|chunk| push_data(chunk).map(<[u8]>::to_vec))
        .collect())
}

/// Build an n-of-n tapscript.
pub fn output_script(pubkeys: &[Vec<u8>]) -> Result<Script, ScriptError> {
    if pubkeys.len() < 2 || pubkeys.len() > MAX_PUBKEYS {
        return Err(ScriptError::InvalidTemplate(format!(
            "n-of-n tapscript needs 2..={} keys, got {}",
            MAX_PUBKEYS,
            pubkeys.len()
        )));
    }
    let mut script = Script::new();
    for (i, key) in pubkeys.iter().enumerate() {
        if !is_xonly_pubkey(key) {
            return Err(ScriptError::InvalidTemplate(format!("invalid x-only key at index {}", i)));
        }
        script.append_push_data(key)?;
        let op = if i + 1 == pubkeys.len() { OP_CHECKSIG } else { OP_CHECKSIGVERIFY };
        script.append_opcodes(&[op])?;
    }
    Ok(script)
}

/// Build the witness stack items for signatures given in key order.
///
/// Missing signatures become empty items.
pub fn witness(signatures: &[Option<Vec<u8>>]) -> Vec<Vec<u8>> {
    signatures.iter().rev().map(|sig| sig.clone().unwrap_or_default()).collect()
}

/// Signatures in key order from witness stack items; empty items decode
/// as `None`.
pub fn decode_witness(items: &[Vec<u8>]) -> Vec<Option<Vec<u8>>> {
    items
        .iter()
        .rev()
        .map(|item| if item.is_empty() { None } else { Some(item.clone()) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use utxo_primitives::ec::PrivateKey;

    #[test]
    fn test_tapscript_roundtrip() {
        let keys: Vec<Vec<u8>> = (0..3).map(|_| PrivateKey::new().pub_key().x_only().to_vec()).collect();
        let script = output_script(&keys).expect("3-of-3");
        assert!(check_output(&script.chunks().expect("decode"), false));
        assert_eq!(pubkeys(script.to_bytes()).expect("pubkeys"), keys);
        assert!(output_script(&keys[..1]).is_err(), "single key is not n-of-n");
    }

    #[test]
    fn test_witness_is_reversed() {
        let sigs = vec![Some(vec![1u8; 64]), None];
        let stack = witness(&sigs);
        assert_eq!(stack, vec![Vec::new(), vec![1u8; 64]]);
        assert!(check_witness(&stack, true));
        assert!(!check_witness(&stack, false));
        assert_eq!(decode_witness(&stack), sigs);
    }
}
