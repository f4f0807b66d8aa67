//! BIP341 witness parsing and script tree commitments.
//!
//! A script-path witness is `[stack..., tapscript, control_block, annex?]`.
//! The control block carries the leaf version with the output key parity
//! in its first byte, the internal key, and the Merkle path to the root.

use utxo_primitives::hash::{tagged_hash, TAG_TAP_BRANCH, TAG_TAP_LEAF};
use utxo_primitives::taproot::{tweak_public_key, TweakedKey};
use utxo_primitives::util::{VarInt, Writer};

use crate::signature::is_canonical_schnorr_signature;
use crate::templates::p2tr;
use crate::{Script, ScriptError};

/// First byte of an annex witness item.
pub const ANNEX_TAG: u8 = 0x50;
/// Leaf version of BIP342 tapscript.
pub const LEAF_VERSION_TAPSCRIPT: u8 = 0xc0;
/// Mask selecting the leaf version from the control block's first byte.
pub const LEAF_VERSION_MASK: u8 = 0xfe;

const CONTROL_BLOCK_BASE_SIZE: usize = 33;
const CONTROL_BLOCK_NODE_SIZE: usize = 32;
const CONTROL_BLOCK_MAX_NODES: usize = 128;

/// A parsed Taproot witness stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaprootWitness {
    /// A key-path spend: one Schnorr signature.
    KeyPath {
        /// The signature, 64 or 65 bytes.
        signature: Vec<u8>,
        /// Optional annex.
        annex: Option<Vec<u8>>,
    },
    /// A script-path spend revealing one leaf.
    ScriptPath {
        /// Stack items consumed by the tapscript.
        stack: Vec<Vec<u8>>,
        /// The revealed leaf script.
        tapscript: Vec<u8>,
        /// Control block proving the leaf's membership.
        control_block: Vec<u8>,
        /// Optional annex.
        annex: Option<Vec<u8>>,
    },
}

impl TaprootWitness {
    /// The annex, if present.
    pub fn annex(&self) -> Option<&[u8]> {
        match self {
            TaprootWitness::KeyPath { annex, .. } | TaprootWitness::ScriptPath { annex, .. } => {
                annex.as_deref()
            }
        }
    }
}

/// Parse a witness stack as a Taproot spend.
///
/// # Returns
/// The key-path or script-path view, or `InvalidTaprootWitness` when the
/// stack is empty, a key-path signature is malformed, or the control block
/// has an invalid size.
pub fn parse_taproot_witness(witness: &[Vec<u8>]) -> Result<TaprootWitness, ScriptError> {
    let (items, annex) = match witness.split_last() {
        Some((last, rest)) if witness.len() >= 2 && last.first() == Some(&ANNEX_TAG) => {
            (rest, Some(last.clone()))
        }
        _ => (witness, None),
    };

    match items {
        [] => Err(ScriptError::InvalidTaprootWitness(
            "witness stack must have at least one element".to_string(),
        )),
        [signature] => {
            if !is_canonical_schnorr_signature(signature) {
                return Err(ScriptError::InvalidTaprootWitness("invalid key path signature".to_string()));
            }
            Ok(TaprootWitness::KeyPath { signature: signature.clone(), annex })
        }
        [stack @ .., tapscript, control_block] => {
            validate_control_block(control_block)?;
            Ok(TaprootWitness::ScriptPath {
                stack: stack.to_vec(),
                tapscript: tapscript.clone(),
                control_block: control_block.clone(),
                annex,
            })
        }
    }
}

/// Check a control block's size: 33 bytes plus up to 128 path nodes.
pub fn validate_control_block(control_block: &[u8]) -> Result<(), ScriptError> {
    let len = control_block.len();
    if len < CONTROL_BLOCK_BASE_SIZE
        || (len - CONTROL_BLOCK_BASE_SIZE) % CONTROL_BLOCK_NODE_SIZE != 0
        || (len - CONTROL_BLOCK_BASE_SIZE) / CONTROL_BLOCK_NODE_SIZE > CONTROL_BLOCK_MAX_NODES
    {
        return Err(ScriptError::InvalidTaprootWitness(format!(
            "invalid control block length {}",
            len
        )));
    }
    Ok(())
}

/// Build a control block.
pub fn control_block(leaf_version: u8, parity: u8, internal_key: &[u8; 32], path: &[[u8; 32]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(CONTROL_BLOCK_BASE_SIZE + path.len() * CONTROL_BLOCK_NODE_SIZE);
    out.push((leaf_version & LEAF_VERSION_MASK) | (parity & 1));
    out.extend_from_slice(internal_key);
    for node in path {
        out.extend_from_slice(node);
    }
    out
}

/// The internal key recorded in a control block.
pub fn internal_key(control_block: &[u8]) -> Result<[u8; 32], ScriptError> {
    validate_control_block(control_block)?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&control_block[1..CONTROL_BLOCK_BASE_SIZE]);
    Ok(key)
}

/// TapLeaf hash of a script under a leaf version.
pub fn leaf_hash(leaf_version: u8, script: &[u8]) -> [u8; 32] {
    let mut writer = Writer::with_capacity(script.len() + 10);
    writer.write_u8(leaf_version & LEAF_VERSION_MASK);
    writer.write_varint(VarInt::from(script.len()));
    writer.write_bytes(script);
    tagged_hash(TAG_TAP_LEAF, writer.as_bytes())
}

/// TapLeaf hash of a revealed script, using the control block's leaf version.
pub fn tap_leaf_hash(control_block: &[u8], script: &[u8]) -> Result<[u8; 32], ScriptError> {
    validate_control_block(control_block)?;
    Ok(leaf_hash(control_block[0], script))
}

/// TapBranch hash of two child nodes, ordered lexicographically.
pub fn tap_branch_hash(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(lo);
    data[32..].copy_from_slice(hi);
    tagged_hash(TAG_TAP_BRANCH, &data)
}

/// Root of the script tree, folding the control block path into a leaf hash.
pub fn taptree_root(control_block: &[u8], leaf_hash: &[u8; 32]) -> Result<[u8; 32], ScriptError> {
    validate_control_block(control_block)?;
    let root = control_block[CONTROL_BLOCK_BASE_SIZE..]
        .chunks_exact(CONTROL_BLOCK_NODE_SIZE)
        .fold(*leaf_hash, |node, sibling| {
            let mut sibling_hash = [0u8; 32];
            sibling_hash.copy_from_slice(sibling);
            tap_branch_hash(&node, &sibling_hash)
        });
    Ok(root)
}

/// The output key a control block and revealed script commit to.
///
/// Fails when the control block's parity bit disagrees with the tweaked key.
pub fn output_key_from_control_block(control_block: &[u8], tapscript: &[u8]) -> Result<TweakedKey, ScriptError> {
    let leaf = tap_leaf_hash(control_block, tapscript)?;
    let root = taptree_root(control_block, &leaf)?;
    let tweaked = tweak_public_key(&internal_key(control_block)?, Some(&root))?;
    if tweaked.parity != control_block[0] & 1 {
        return Err(ScriptError::InvalidTaprootWitness(
            "control block parity does not match output key".to_string(),
        ));
    }
    Ok(tweaked)
}

/// The P2TR output script a control block and revealed script commit to.
pub fn output_script_from_control_block(control_block: &[u8], tapscript: &[u8]) -> Result<Script, ScriptError> {
    let tweaked = output_key_from_control_block(control_block, tapscript)?;
    Ok(p2tr::output_script(&tweaked.x_only))
}

#[cfg(test)]
mod tests {
    use super::*;
    use utxo_primitives::ec::PrivateKey;

    fn single_leaf_control_block(tapscript: &[u8]) -> (Vec<u8>, [u8; 32]) {
        let internal = PrivateKey::new().pub_key().x_only();
        let leaf = leaf_hash(LEAF_VERSION_TAPSCRIPT, tapscript);
        let tweaked = tweak_public_key(&internal, Some(&leaf)).expect("tweak");
        (control_block(LEAF_VERSION_TAPSCRIPT, tweaked.parity, &internal, &[]), tweaked.x_only)
    }

    #[test]
    fn test_parse_key_path_with_annex() {
        let witness = vec![vec![1u8; 64], vec![ANNEX_TAG, 0xaa]];
        match parse_taproot_witness(&witness).expect("parse") {
            TaprootWitness::KeyPath { signature, annex } => {
                assert_eq!(signature.len(), 64);
                assert_eq!(annex, Some(vec![ANNEX_TAG, 0xaa]));
            }
            other => panic!("expected key path, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        assert!(parse_taproot_witness(&[]).is_err());
        assert!(parse_taproot_witness(&[vec![1u8; 63]]).is_err(), "short signature");
        assert!(
            parse_taproot_witness(&[vec![0x51], vec![0xc0; 34]]).is_err(),
            "control block of 34 bytes"
        );
    }

    #[test]
    fn test_script_path_commitment() {
        let tapscript = vec![0x51];
        let (cb, output_key) = single_leaf_control_block(&tapscript);
        let witness = vec![vec![], tapscript.clone(), cb.clone()];
        let parsed = parse_taproot_witness(&witness).expect("parse");
        assert!(matches!(parsed, TaprootWitness::ScriptPath { ref stack, .. } if stack.len() == 1));

        let derived = output_key_from_control_block(&cb, &tapscript).expect("derive");
        assert_eq!(derived.x_only, output_key);
        let script = output_script_from_control_block(&cb, &tapscript).expect("script");
        assert_eq!(p2tr::output_key(script.to_bytes()), Some(output_key));

        let mut flipped = cb.clone();
        flipped[0] ^= 1;
        assert!(output_key_from_control_block(&flipped, &tapscript).is_err(), "parity mismatch");
    }

    #[test]
    fn test_branch_hash_is_order_independent() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert_eq!(tap_branch_hash(&a, &b), tap_branch_hash(&b, &a));

        let mut cb = vec![LEAF_VERSION_TAPSCRIPT];
        cb.extend_from_slice(&[3u8; 32]);
        cb.extend_from_slice(&b);
        assert_eq!(taptree_root(&cb, &a).expect("root"), tap_branch_hash(&a, &b));
    }
}
