//! Taproot (BIP341) key tweaking.
//!
//! The output key of a Taproot output is `Q = P + t*G` where `P` is the
//! internal key lifted to even Y and `t = TapTweak(P.x || merkle_root)`.
//! Key-path spends sign with the matching tweaked secret
//! `d' = ±d + t`, negated first when `d*G` has odd Y.

use k256::elliptic_curve::point::AffineCoordinates;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::{AffinePoint, FieldBytes, ProjectivePoint, PublicKey as K256PublicKey, Scalar};

use crate::ec::PrivateKey;
use crate::hash::{tagged_hash, TAG_TAP_TWEAK};
use crate::PrimitivesError;

/// A tweaked Taproot output key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TweakedKey {
    /// X coordinate of the output key, as committed in the scriptPubKey.
    pub x_only: [u8; 32],
    /// Y parity of the output key (0 even, 1 odd), as committed in the
    /// first byte of a script-path control block.
    pub parity: u8,
}

/// Whether `bytes` is the X coordinate of a point on secp256k1.
pub fn is_valid_x_only(bytes: &[u8]) -> bool {
    lift_x(bytes).is_ok()
}

/// Lift an x-only key to the curve point with even Y.
fn lift_x(x: &[u8]) -> Result<AffinePoint, PrimitivesError> {
    if x.len() != 32 {
        return Err(PrimitivesError::InvalidXOnlyKey);
    }
    let mut sec1 = [0u8; 33];
    sec1[0] = 0x02;
    sec1[1..].copy_from_slice(x);
    let key = K256PublicKey::from_sec1_bytes(&sec1).map_err(|_| PrimitivesError::InvalidXOnlyKey)?;
    Ok(*key.as_affine())
}

/// Compute the TapTweak hash for an internal key and optional Merkle root.
///
/// Without a script tree the tweak commits to the internal key alone.
pub fn tap_tweak_hash(internal_key: &[u8; 32], merkle_root: Option<&[u8; 32]>) -> [u8; 32] {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(internal_key);
    if let Some(root) = merkle_root {
        data.extend_from_slice(root);
    }
    tagged_hash(TAG_TAP_TWEAK, &data)
}

fn tweak_scalar(internal_key: &[u8; 32], merkle_root: Option<&[u8; 32]>) -> Result<Scalar, PrimitivesError> {
    let hash = tap_tweak_hash(internal_key, merkle_root);
    Option::<Scalar>::from(Scalar::from_repr(FieldBytes::from(hash)))
        .ok_or_else(|| PrimitivesError::InvalidTweak("tweak exceeds curve order".to_string()))
}

/// Tweak an x-only internal key into a Taproot output key.
///
/// # Arguments
/// * `internal_key` - The 32-byte x-only internal key.
/// * `merkle_root` - Root of the script tree, or `None` for key-path-only outputs.
///
/// # Returns
/// The tweaked output key with its Y parity.
pub fn tweak_public_key(
    internal_key: &[u8; 32],
    merkle_root: Option<&[u8; 32]>,
) -> Result<TweakedKey, PrimitivesError> {
    let point = lift_x(internal_key)?;
    let tweak = tweak_scalar(internal_key, merkle_root)?;
    let output = (ProjectivePoint::from(point) + ProjectivePoint::GENERATOR * tweak).to_affine();
    let encoded = output.to_encoded_point(true);
    let bytes = encoded.as_bytes();
    if bytes.len() != 33 {
        return Err(PrimitivesError::InvalidTweak("tweaked key is the point at infinity".to_string()));
    }
    let mut x_only = [0u8; 32];
    x_only.copy_from_slice(&bytes[1..]);
    Ok(TweakedKey {
        x_only,
        parity: bytes[0] & 1,
    })
}

/// Tweak a private key so that it signs for the Taproot output key derived
/// from its own x-only public key.
///
/// # Arguments
/// * `key` - The untweaked private key.
/// * `merkle_root` - Root of the script tree, or `None` for key-path-only outputs.
///
/// # Returns
/// The tweaked private key.
pub fn tweak_private_key(
    key: &PrivateKey,
    merkle_root: Option<&[u8; 32]>,
) -> Result<PrivateKey, PrimitivesError> {
    let secret: Scalar = *key.signing_key().as_nonzero_scalar().as_ref();
    let point = (ProjectivePoint::GENERATOR * secret).to_affine();
    let secret = if bool::from(point.y_is_odd()) { -secret } else { secret };

    let internal_key: [u8; 32] = point.x().into();
    let tweaked = secret + tweak_scalar(&internal_key, merkle_root)?;
    PrivateKey::from_bytes(&tweaked.to_repr())
}
