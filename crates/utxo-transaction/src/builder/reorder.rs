//! Bind recovered multisig signatures to the keys that made them.

use tracing::warn;
use utxo_primitives::ec::PublicKey;
use utxo_script::signature::decode_ecdsa_signature;
use utxo_script::ScriptType;

use super::record::{InputRecord, SpendPath};
use crate::transaction::Transaction;
use crate::TransactionError;

/// Match each of `record`'s unmatched signatures to the first multisig
/// key it verifies against, in key order.
///
/// Digests use the legacy algorithm over the redeem (or bare) script, or
/// BIP143 over the witness script when the multisig sits behind P2WSH.
/// Signatures that verify against no key are dropped.
pub(crate) fn fix_multisig_order(tx: &Transaction, vin: usize, record: &mut InputRecord) -> Result<(), TransactionError> {
    if record.unmatched_signatures.is_empty() {
        return Ok(());
    }
    let Some(path) = record.path.clone() else {
        return Ok(());
    };
    if path.sign_type() != ScriptType::P2ms {
        return Ok(());
    }

    let witness_v0 = path.is_witness_v0();
    let script_code = match (&path, witness_v0) {
        (_, true) => path.witness_script().map(<[u8]>::to_vec),
        (SpendPath::P2sh { redeem_script, .. }, false) => Some(redeem_script.clone()),
        (SpendPath::Leaf(_), false) => record.prev_out_script.clone(),
        _ => None,
    };
    let Some(script_code) = script_code else {
        return Err(TransactionError::SigningState(format!(
            "input #{} multisig script unknown, cannot order signatures",
            vin
        )));
    };
    let value = if witness_v0 {
        Some(record.value.ok_or_else(|| {
            TransactionError::SigningState(format!(
                "input #{} needs its prevout value to order multisig signatures",
                vin
            ))
        })?)
    } else {
        None
    };

    let mut pool: Vec<Option<Vec<u8>>> = record.unmatched_signatures.drain(..).map(Some).collect();
    for slot in record.slots.iter_mut() {
        if slot.is_signed() {
            continue;
        }
        let Some(pubkey) = slot.pubkey.as_deref().and_then(|bytes| PublicKey::from_bytes(bytes).ok()) else {
            continue;
        };
        for candidate in pool.iter_mut() {
            let Some(bytes) = candidate.as_deref() else {
                continue;
            };
            let Ok((signature, hash_type)) = decode_ecdsa_signature(bytes) else {
                continue;
            };
            let hash = match value {
                Some(value) => tx.hash_for_witness_v0(vin, &script_code, value, hash_type)?,
                None => tx.hash_for_signature(vin, &script_code, hash_type)?,
            };
            if pubkey.verify(&hash, &signature) {
                slot.signature = candidate.take();
                break;
            }
        }
    }

    for leftover in pool.into_iter().flatten() {
        warn!(vin, signature = %hex::encode(&leftover), "discarding multisig signature that matches no key");
    }
    Ok(())
}
