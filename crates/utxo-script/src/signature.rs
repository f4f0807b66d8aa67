//! Script-level signature and public key encodings.
//!
//! ECDSA signatures appear in scripts as strict DER followed by a one-byte
//! hash type. BIP340 Schnorr signatures are 64 bytes, with a 65th hash type
//! byte only when the hash type is not `SIGHASH_DEFAULT`.

use utxo_primitives::ec::{PublicKey, Signature};
use utxo_primitives::taproot::is_valid_x_only;

use crate::ScriptError;

// ---- hash type flags ----

/// Taproot only: commit to everything, encoded without a suffix byte.
pub const SIGHASH_DEFAULT: u8 = 0x00;
/// Commit to all inputs and all outputs.
pub const SIGHASH_ALL: u8 = 0x01;
/// Commit to all inputs and no outputs.
pub const SIGHASH_NONE: u8 = 0x02;
/// Commit to all inputs and the output at the signed input's index.
pub const SIGHASH_SINGLE: u8 = 0x03;
/// Commit only to the signed input.
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;
/// Mask selecting the output mode (ALL/NONE/SINGLE).
pub const SIGHASH_OUTPUT_MASK: u8 = 0x03;

/// Whether `hash_type` is ALL, NONE or SINGLE, optionally with ANYONECANPAY.
pub fn is_defined_hash_type(hash_type: u8) -> bool {
    let base = hash_type & !SIGHASH_ANYONECANPAY;
    base > 0x00 && base < 0x04
}

/// Strict DER check (BIP66) on a signature without its hash type byte.
pub fn is_strict_der(sig: &[u8]) -> bool {
    if sig.len() < 8 || sig.len() > 72 {
        return false;
    }
    if sig[0] != 0x30 || sig[1] as usize != sig.len() - 2 || sig[2] != 0x02 {
        return false;
    }
    let len_r = sig[3] as usize;
    if len_r == 0 || 5 + len_r >= sig.len() {
        return false;
    }
    if sig[4 + len_r] != 0x02 {
        return false;
    }
    let len_s = sig[5 + len_r] as usize;
    if len_s == 0 || 6 + len_r + len_s != sig.len() {
        return false;
    }
    // Negative or needlessly zero-padded integers are not canonical.
    if sig[4] & 0x80 != 0 || (len_r > 1 && sig[4] == 0x00 && sig[5] & 0x80 == 0) {
        return false;
    }
    let s = 6 + len_r;
    if sig[s] & 0x80 != 0 || (len_s > 1 && sig[s] == 0x00 && sig[s + 1] & 0x80 == 0) {
        return false;
    }
    true
}

/// Whether `bytes` is a strict-DER ECDSA signature with a defined hash type.
pub fn is_canonical_script_signature(bytes: &[u8]) -> bool {
    match bytes.split_last() {
        Some((&hash_type, der)) => is_defined_hash_type(hash_type) && is_strict_der(der),
        None => false,
    }
}

/// Whether `bytes` is a Schnorr signature in script encoding.
pub fn is_canonical_schnorr_signature(bytes: &[u8]) -> bool {
    match bytes.len() {
        64 => true,
        65 => is_defined_hash_type(bytes[64]),
        _ => false,
    }
}

/// Whether `bytes` is a valid SEC1 public key (compressed or uncompressed).
pub fn is_canonical_pubkey(bytes: &[u8]) -> bool {
    PublicKey::from_bytes(bytes).is_ok()
}

/// Whether `bytes` is a valid 32-byte x-only public key.
pub fn is_xonly_pubkey(bytes: &[u8]) -> bool {
    is_valid_x_only(bytes)
}

/// Encode an ECDSA signature for a script: DER plus the hash type byte.
pub fn encode_ecdsa_signature(sig: &Signature, hash_type: u8) -> Result<Vec<u8>, ScriptError> {
    if !is_defined_hash_type(hash_type) {
        return Err(ScriptError::InvalidScript(format!(
            "invalid hash type 0x{:02x}",
            hash_type
        )));
    }
    let mut out = sig.to_der();
    out.push(hash_type);
    Ok(out)
}

/// Decode a script ECDSA signature into the signature and its hash type.
pub fn decode_ecdsa_signature(bytes: &[u8]) -> Result<(Signature, u8), ScriptError> {
    let (&hash_type, der) = bytes
        .split_last()
        .ok_or_else(|| ScriptError::InvalidScript("empty signature".to_string()))?;
    if !is_defined_hash_type(hash_type) {
        return Err(ScriptError::InvalidScript(format!(
            "invalid hash type 0x{:02x}",
            hash_type
        )));
    }
    Ok((Signature::from_der(der)?, hash_type))
}

/// Encode a Schnorr signature for a witness, appending the hash type
/// unless it is `SIGHASH_DEFAULT`.
pub fn encode_schnorr_signature(sig: &[u8; 64], hash_type: u8) -> Vec<u8> {
    let mut out = sig.to_vec();
    if hash_type != SIGHASH_DEFAULT {
        out.push(hash_type);
    }
    out
}

/// The hash type a script signature was produced with.
///
/// A bare 64-byte Schnorr signature signals `SIGHASH_DEFAULT`; every other
/// encoding carries the hash type in its last byte.
pub fn signature_hash_type(bytes: &[u8]) -> u8 {
    if bytes.len() == 64 {
        return SIGHASH_DEFAULT;
    }
    bytes.last().copied().unwrap_or(SIGHASH_DEFAULT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use utxo_primitives::ec::PrivateKey;
    use utxo_primitives::hash::sha256;

    #[test]
    fn test_defined_hash_types() {
        for ht in [0x01, 0x02, 0x03, 0x81, 0x82, 0x83] {
            assert!(is_defined_hash_type(ht), "0x{:02x}", ht);
        }
        for ht in [0x00, 0x04, 0x80, 0x41] {
            assert!(!is_defined_hash_type(ht), "0x{:02x}", ht);
        }
    }

    #[test]
    fn test_ecdsa_script_signature_roundtrip() {
        let key = PrivateKey::new();
        let sig = key.sign(&sha256(b"msg")).expect("sign");
        let encoded = encode_ecdsa_signature(&sig, SIGHASH_ALL | SIGHASH_ANYONECANPAY).expect("encode");
        assert!(is_canonical_script_signature(&encoded));
        assert_eq!(signature_hash_type(&encoded), 0x81);
        let (decoded, hash_type) = decode_ecdsa_signature(&encoded).expect("decode");
        assert_eq!(decoded, sig);
        assert_eq!(hash_type, 0x81);
        assert!(encode_ecdsa_signature(&sig, SIGHASH_DEFAULT).is_err());
    }

    #[test]
    fn test_strict_der_rejects_padding() {
        // R with an unnecessary leading zero.
        let mut der = vec![0x30, 0x07, 0x02, 0x02, 0x00, 0x01, 0x02, 0x01, 0x01];
        assert!(!is_strict_der(&der));
        der = vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01];
        assert!(is_strict_der(&der));
        der[4] = 0x81;
        assert!(!is_strict_der(&der), "negative R");
    }

    #[test]
    fn test_schnorr_encoding() {
        let sig = [0x11u8; 64];
        let default = encode_schnorr_signature(&sig, SIGHASH_DEFAULT);
        assert_eq!(default.len(), 64);
        assert_eq!(signature_hash_type(&default), SIGHASH_DEFAULT);
        let all = encode_schnorr_signature(&sig, SIGHASH_ALL);
        assert_eq!(all.len(), 65);
        assert_eq!(signature_hash_type(&all), SIGHASH_ALL);
        assert!(is_canonical_schnorr_signature(&default));
        assert!(is_canonical_schnorr_signature(&all));
        let mut explicit_default = sig.to_vec();
        explicit_default.push(0x00);
        assert!(!is_canonical_schnorr_signature(&explicit_default));
    }

    #[test]
    fn test_pubkey_checks() {
        let key = PrivateKey::new().pub_key();
        assert!(is_canonical_pubkey(&key.to_compressed()));
        assert!(is_canonical_pubkey(&key.to_uncompressed()));
        assert!(!is_canonical_pubkey(&key.x_only()));
        assert!(is_xonly_pubkey(&key.x_only()));
        assert!(!is_xonly_pubkey(&key.to_compressed()));
    }
}
