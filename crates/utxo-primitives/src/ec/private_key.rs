//! secp256k1 private key.
//!
//! Wraps a k256 signing key and provides RFC6979 ECDSA signing with an
//! optional low-R grinding mode, plus access to the scalar for BIP340
//! Schnorr signing and Taproot tweaking.

use k256::ecdsa::signature::hazmat::{PrehashSigner, RandomizedPrehashSigner};
use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;

use crate::ec::public_key::PublicKey;
use crate::ec::signature::Signature;
use crate::PrimitivesError;

/// Length of a serialized private key in bytes.
const PRIVATE_KEY_BYTES_LEN: usize = 32;

/// Upper bound on low-R grinding attempts. Each attempt succeeds with
/// probability one half.
const MAX_LOW_R_ATTEMPTS: usize = 256;

/// A secp256k1 private key for signing.
#[derive(Clone, Debug)]
pub struct PrivateKey {
    inner: SigningKey,
}

impl PrivateKey {
    /// Generate a new random private key using the OS random number generator.
    pub fn new() -> Self {
        PrivateKey {
            inner: SigningKey::random(&mut OsRng),
        }
    }

    /// Create a private key from a raw 32-byte scalar.
    ///
    /// # Arguments
    /// * `bytes` - A 32-byte slice representing the private key scalar.
    ///
    /// # Returns
    /// `Ok(PrivateKey)` if the bytes represent a valid scalar on secp256k1,
    /// or an error if the scalar is zero or out of range.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        if bytes.len() != PRIVATE_KEY_BYTES_LEN {
            return Err(PrimitivesError::InvalidKeyLength {
                expected: PRIVATE_KEY_BYTES_LEN,
                got: bytes.len(),
            });
        }
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|e| PrimitivesError::InvalidPrivateKey(e.to_string()))?;
        Ok(PrivateKey { inner: signing_key })
    }

    /// Create a private key from a hexadecimal string.
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        if hex_str.is_empty() {
            return Err(PrimitivesError::InvalidPrivateKey(
                "private key hex is empty".to_string(),
            ));
        }
        let bytes = hex::decode(hex_str)?;
        Self::from_bytes(&bytes)
    }

    /// Serialize the private key scalar as 32 big-endian bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes().into()
    }

    /// Serialize the private key scalar as a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Derive the corresponding public key.
    pub fn pub_key(&self) -> PublicKey {
        PublicKey::from_verifying_key(self.inner.verifying_key())
    }

    /// Sign a 32-byte digest using RFC6979 deterministic nonces.
    ///
    /// # Returns
    /// A low-S normalized `Signature`.
    pub fn sign(&self, hash: &[u8; 32]) -> Result<Signature, PrimitivesError> {
        let sig: k256::ecdsa::Signature = self
            .inner
            .sign_prehash(hash)
            .map_err(|e| PrimitivesError::InvalidSignature(e.to_string()))?;
        Ok(Signature::from_k256(&sig))
    }

    /// Sign a 32-byte digest, retrying with fresh nonce entropy until R
    /// encodes without a padding byte.
    ///
    /// The first attempt is the deterministic RFC6979 signature, so keys
    /// that already produce a low R sign identically to [`PrivateKey::sign`].
    pub fn sign_low_r(&self, hash: &[u8; 32]) -> Result<Signature, PrimitivesError> {
        let mut sig = self.sign(hash)?;
        let mut attempts = 0;
        while !sig.has_low_r() {
            attempts += 1;
            if attempts > MAX_LOW_R_ATTEMPTS {
                return Err(PrimitivesError::InvalidSignature(
                    "could not produce a low-R signature".to_string(),
                ));
            }
            let grinded: k256::ecdsa::Signature = self
                .inner
                .sign_prehash_with_rng(&mut OsRng, hash)
                .map_err(|e| PrimitivesError::InvalidSignature(e.to_string()))?;
            sig = Signature::from_k256(&grinded);
        }
        Ok(sig)
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.inner
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PrivateKey {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256;

    #[test]
    fn test_private_key_hex_roundtrip() {
        let hex_str = "e91671c46231f833a6406ccbea0e3e392c76c167bac1cb013f6f1013980455c2";
        let key = PrivateKey::from_hex(hex_str).expect("valid key");
        assert_eq!(key.to_hex(), hex_str);
        assert_eq!(PrivateKey::from_bytes(&key.to_bytes()).expect("roundtrip"), key);
    }

    #[test]
    fn test_private_key_rejects_bad_input() {
        assert!(PrivateKey::from_hex("").is_err());
        assert!(PrivateKey::from_hex("zz").is_err());
        assert!(matches!(
            PrivateKey::from_bytes(&[1u8; 31]),
            Err(PrimitivesError::InvalidKeyLength { expected: 32, got: 31 })
        ));
        assert!(PrivateKey::from_bytes(&[0u8; 32]).is_err(), "zero scalar is invalid");
    }

    #[test]
    fn test_sign_low_r_produces_short_r() {
        let key = PrivateKey::new();
        for i in 0u8..8 {
            let hash = sha256(&[i]);
            let sig = key.sign_low_r(&hash).expect("low-R signing");
            assert!(sig.has_low_r(), "R must not need DER padding");
            assert!(sig.verify(&hash, &key.pub_key()));
            assert!(sig.to_der().len() <= 70);
        }
    }
}
