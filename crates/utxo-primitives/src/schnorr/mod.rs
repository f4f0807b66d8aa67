//! BIP340 Schnorr signatures over secp256k1.
//!
//! Signing uses fresh auxiliary randomness per signature. Keys are handled
//! in their 32-byte x-only form; k256 negates the secret internally when
//! the full point has an odd Y coordinate.

use k256::schnorr::{Signature as K256Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::ec::PrivateKey;
use crate::PrimitivesError;

/// Length of a BIP340 signature without a hash type suffix.
pub const SCHNORR_SIGNATURE_LEN: usize = 64;

/// Sign a 32-byte digest with BIP340 Schnorr.
///
/// # Arguments
/// * `key` - The signing key. Taproot key-path spends pass the tweaked key.
/// * `hash` - The message digest (a BIP341 sighash).
///
/// # Returns
/// The 64-byte signature.
pub fn sign(key: &PrivateKey, hash: &[u8; 32]) -> Result<[u8; SCHNORR_SIGNATURE_LEN], PrimitivesError> {
    let signing_key = SigningKey::from_bytes(&key.to_bytes())
        .map_err(|e| PrimitivesError::InvalidPrivateKey(e.to_string()))?;
    let mut aux_rand = [0u8; 32];
    OsRng.fill_bytes(&mut aux_rand);
    let sig = signing_key
        .sign_raw(hash, &aux_rand)
        .map_err(|e| PrimitivesError::InvalidSignature(e.to_string()))?;
    Ok(sig.to_bytes())
}

/// Verify a 64-byte BIP340 signature against an x-only public key.
///
/// # Returns
/// `true` when the signature is valid; any malformed input yields `false`.
pub fn verify(x_only: &[u8], hash: &[u8; 32], signature: &[u8]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(x_only) else {
        return false;
    };
    let Ok(sig) = K256Signature::try_from(signature) else {
        return false;
    };
    verifying_key.verify_raw(hash, &sig).is_ok()
}

impl PrivateKey {
    /// Sign a digest with BIP340 Schnorr. See [`sign`].
    pub fn sign_schnorr(&self, hash: &[u8; 32]) -> Result<[u8; SCHNORR_SIGNATURE_LEN], PrimitivesError> {
        sign(self, hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256;

    #[test]
    fn test_schnorr_sign_verify() {
        let key = PrivateKey::new();
        let hash = sha256(b"taproot");
        let sig = key.sign_schnorr(&hash).expect("schnorr signing");
        let x_only = key.pub_key().x_only();
        assert!(verify(&x_only, &hash, &sig));

        let other = sha256(b"other");
        assert!(!verify(&x_only, &other, &sig), "wrong message must fail");
    }

    #[test]
    fn test_schnorr_verify_rejects_malformed() {
        let hash = sha256(b"x");
        assert!(!verify(&[0u8; 31], &hash, &[0u8; 64]));
        let key = PrivateKey::new();
        assert!(!verify(&key.pub_key().x_only(), &hash, &[0u8; 63]));
    }
}
