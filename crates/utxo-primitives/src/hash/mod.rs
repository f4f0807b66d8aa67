//! Hash function primitives.
//!
//! Provides SHA-256, double SHA-256, RIPEMD-160, Hash160 and the BIP340
//! tagged hash used by Taproot (`TapLeaf`, `TapBranch`, `TapTweak`,
//! `TapSighash`).

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Tag for Taproot leaf hashes.
pub const TAG_TAP_LEAF: &str = "TapLeaf";

/// Tag for Taproot Merkle branch hashes.
pub const TAG_TAP_BRANCH: &str = "TapBranch";

/// Tag for the Taproot output key tweak.
pub const TAG_TAP_TWEAK: &str = "TapTweak";

/// Tag for the BIP341 signature message.
pub const TAG_TAP_SIGHASH: &str = "TapSighash";

/// Compute SHA-256 hash of the input data.
///
/// # Arguments
/// * `data` - Byte slice to hash.
///
/// # Returns
/// A 32-byte SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute double SHA-256 (SHA-256d) hash of the input data.
///
/// This is the hash used for transaction IDs and the legacy and
/// segwit v0 signature hashes.
///
/// # Arguments
/// * `data` - Byte slice to hash.
///
/// # Returns
/// A 32-byte double-SHA-256 digest.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Compute RIPEMD-160 hash of the input data.
///
/// # Arguments
/// * `data` - Byte slice to hash.
///
/// # Returns
/// A 20-byte RIPEMD-160 digest.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 20];
    output.copy_from_slice(&result);
    output
}

/// Compute Hash160: RIPEMD-160(SHA-256(data)).
///
/// Commits public keys in P2PKH/P2WPKH and redeem scripts in P2SH.
///
/// # Arguments
/// * `data` - Byte slice to hash.
///
/// # Returns
/// A 20-byte Hash160 digest.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}

/// Compute a BIP340 tagged hash: `SHA256(SHA256(tag) || SHA256(tag) || data)`.
///
/// # Arguments
/// * `tag` - The domain separation tag, e.g. `"TapLeaf"`.
/// * `data` - The message bytes.
///
/// # Returns
/// A 32-byte digest.
pub fn tagged_hash(tag: &str, data: &[u8]) -> [u8; 32] {
    let tag_hash = sha256(tag.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    hasher.update(data);
    hasher.finalize().into()
}
