//! Pay-to-witness-pubkey-hash: `OP_0 <20>`, witness `[sig, pubkey]`.

use utxo_primitives::ec::public_key::COMPRESSED_LEN;
use utxo_primitives::hash::hash160;

use crate::opcodes::{OP_0, OP_DATA_20};
use crate::signature::{is_canonical_pubkey, is_canonical_script_signature};
use crate::Script;

/// Length of a P2WPKH output script.
pub const OUTPUT_LEN: usize = 22;

/// Whether `script` is a P2WPKH output.
pub fn check_output(script: &[u8]) -> bool {
    script.len() == OUTPUT_LEN && script[0] == OP_0 && script[1] == OP_DATA_20
}

/// Whether `witness` is a P2WPKH witness: a signature and a compressed key.
pub fn check_witness(witness: &[Vec<u8>]) -> bool {
    match witness {
        [sig, pubkey] => {
            is_canonical_script_signature(sig)
                && pubkey.len() == COMPRESSED_LEN
                && is_canonical_pubkey(pubkey)
        }
        _ => false,
    }
}

/// The committed pubkey hash of a P2WPKH output.
pub fn pubkey_hash(script: &[u8]) -> Option<[u8; 20]> {
    if !check_output(script) {
        return None;
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&script[2..]);
    Some(hash)
}

/// Build a P2WPKH output for a pubkey hash.
pub fn output_script(pubkey_hash: &[u8; 20]) -> Script {
    let mut bytes = Vec::with_capacity(OUTPUT_LEN);
    bytes.extend_from_slice(&[OP_0, OP_DATA_20]);
    bytes.extend_from_slice(pubkey_hash);
    Script::from(bytes)
}

/// Build the P2WPKH output paying to `pubkey`.
pub fn output_script_for_pubkey(pubkey: &[u8]) -> Script {
    output_script(&hash160(pubkey))
}

/// Build a P2WPKH witness stack.
pub fn witness(signature: &[u8], pubkey: &[u8]) -> Vec<Vec<u8>> {
    vec![signature.to_vec(), pubkey.to_vec()]
}
