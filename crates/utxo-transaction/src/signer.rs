//! Signing capability consumed by the builder.
//!
//! The builder never sees private key material directly; it asks a
//! [`Signer`] for its public key and for signatures over sighash digests.

use utxo_primitives::ec::{PrivateKey, Signature};
use utxo_primitives::schnorr::SCHNORR_SIGNATURE_LEN;
use utxo_primitives::taproot::tweak_private_key;

use crate::TransactionError;

/// A key that can sign transaction digests.
pub trait Signer {
    /// SEC1 encoded public key (33-byte compressed for segwit inputs).
    fn public_key(&self) -> Vec<u8>;

    /// ECDSA-sign a digest. `low_r` asks for a signature whose R value
    /// encodes in 32 bytes.
    fn sign_ecdsa(&self, hash: &[u8; 32], low_r: bool) -> Result<Signature, TransactionError>;

    /// BIP340-sign a digest with the untweaked key.
    fn sign_schnorr(&self, hash: &[u8; 32]) -> Result<[u8; SCHNORR_SIGNATURE_LEN], TransactionError>;

    /// BIP340-sign a digest with the key tweaked for a Taproot key-path
    /// spend. Signers without access to the secret cannot tweak.
    fn sign_schnorr_tweaked(
        &self,
        _hash: &[u8; 32],
        _merkle_root: Option<&[u8; 32]>,
    ) -> Result<[u8; SCHNORR_SIGNATURE_LEN], TransactionError> {
        Err(TransactionError::Unsupported(
            "signer cannot produce taproot key-path signatures".to_string(),
        ))
    }
}

impl Signer for PrivateKey {
    fn public_key(&self) -> Vec<u8> {
        self.pub_key().to_compressed().to_vec()
    }

    fn sign_ecdsa(&self, hash: &[u8; 32], low_r: bool) -> Result<Signature, TransactionError> {
        let sig = if low_r { self.sign_low_r(hash)? } else { self.sign(hash)? };
        Ok(sig)
    }

    fn sign_schnorr(&self, hash: &[u8; 32]) -> Result<[u8; SCHNORR_SIGNATURE_LEN], TransactionError> {
        Ok(PrivateKey::sign_schnorr(self, hash)?)
    }

    fn sign_schnorr_tweaked(
        &self,
        hash: &[u8; 32],
        merkle_root: Option<&[u8; 32]>,
    ) -> Result<[u8; SCHNORR_SIGNATURE_LEN], TransactionError> {
        let tweaked = tweak_private_key(self, merkle_root)?;
        Ok(tweaked.sign_schnorr(hash)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utxo_primitives::hash::sha256;
    use utxo_primitives::schnorr;
    use utxo_primitives::taproot::tweak_public_key;

    #[test]
    fn test_private_key_signer() {
        let key = PrivateKey::new();
        let hash = sha256(b"signer");
        assert_eq!(Signer::public_key(&key).len(), 33);

        let sig = key.sign_ecdsa(&hash, true).expect("sign");
        assert!(sig.has_low_r());
        assert!(key.pub_key().verify(&hash, &sig));

        let tweaked_sig = key.sign_schnorr_tweaked(&hash, None).expect("tweaked sign");
        let output_key = tweak_public_key(&key.pub_key().x_only(), None).expect("tweak");
        assert!(schnorr::verify(&output_key.x_only, &hash, &tweaked_sig));
    }
}
