//! Pay-to-witness-script-hash: `OP_0 <32>`.
//!
//! The witness carries the inner stack items followed by the witness script.

use utxo_primitives::hash::sha256;

use super::{p2ms, p2pk, p2pkh};
use crate::chunk::{compile_stack, decode_script};
use crate::opcodes::{OP_0, OP_DATA_32};
use crate::Script;

/// Length of a P2WSH output script.
pub const OUTPUT_LEN: usize = 34;

/// Whether `script` is a P2WSH output.
pub fn check_output(script: &[u8]) -> bool {
    script.len() == OUTPUT_LEN && script[0] == OP_0 && script[1] == OP_DATA_32
}

/// Whether `witness` is a P2WSH witness wrapping a recognized script.
pub fn check_witness(witness: &[Vec<u8>], allow_incomplete: bool) -> bool {
    let Some((witness_script, items)) = witness.split_last() else {
        return false;
    };
    let script_chunks = match decode_script(witness_script) {
        Ok(chunks) if !chunks.is_empty() => chunks,
        _ => return false,
    };
    let Ok(script_sig) = compile_stack(items).and_then(|bytes| decode_script(&bytes)) else {
        return false;
    };

    (p2pkh::check_input(&script_sig) && p2pkh::check_output(witness_script))
        || (p2ms::check_input(&script_sig, allow_incomplete) && p2ms::check_output(&script_chunks, false))
        || (p2pk::check_input(&script_sig) && p2pk::check_output(&script_chunks))
}

/// The committed script hash of a P2WSH output.
pub fn script_hash(script: &[u8]) -> Option<[u8; 32]> {
    if !check_output(script) {
        return None;
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&script[2..]);
    Some(hash)
}

/// Build a P2WSH output for a script hash.
pub fn output_script(script_hash: &[u8; 32]) -> Script {
    let mut bytes = Vec::with_capacity(OUTPUT_LEN);
    bytes.extend_from_slice(&[OP_0, OP_DATA_32]);
    bytes.extend_from_slice(script_hash);
    Script::from(bytes)
}

/// Build the P2WSH output committing to `witness_script`.
pub fn output_script_for_witness_script(witness_script: &[u8]) -> Script {
    output_script(&sha256(witness_script))
}

/// Build a P2WSH witness: the inner items followed by the witness script.
pub fn witness(items: &[Vec<u8>], witness_script: &[u8]) -> Vec<Vec<u8>> {
    let mut stack = items.to_vec();
    stack.push(witness_script.to_vec());
    stack
}
