/// UTXO SDK - Cryptographic primitives, hashing, and utilities.
///
/// This crate provides the foundational building blocks for the SDK:
/// - Hash functions (SHA-256, SHA-256d, RIPEMD-160, Hash160, BIP340 tagged hashes)
/// - secp256k1 keys with ECDSA (DER, low-S, optional low-R) and BIP340 Schnorr signing
/// - Taproot output key tweaking for public and private keys
/// - Variable-length integer encoding and little-endian reader/writer

pub mod hash;
pub mod util;
pub mod ec;
pub mod schnorr;
pub mod taproot;

mod error;
pub use error::PrimitivesError;
