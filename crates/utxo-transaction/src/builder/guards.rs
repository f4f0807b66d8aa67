//! Checks that keep existing signatures valid and fees sane.

use utxo_script::signature::signature_hash_type;

use super::record::InputRecord;
use crate::sighash::{SIGHASH_ALL, SIGHASH_ANYONECANPAY, SIGHASH_DEFAULT, SIGHASH_MASK, SIGHASH_NONE, SIGHASH_SINGLE};
use crate::transaction::Transaction;
use crate::TransactionError;

fn existing_hash_types(records: &[InputRecord]) -> impl Iterator<Item = u8> + '_ {
    records
        .iter()
        .flat_map(|record| record.signatures())
        .map(signature_hash_type)
}

/// Whether any input already carries a signature.
pub(crate) fn has_any_signature(records: &[InputRecord]) -> bool {
    records.iter().any(InputRecord::has_signatures)
}

/// Inputs may be added only if every existing signature is ANYONECANPAY.
pub(crate) fn can_modify_inputs(records: &[InputRecord]) -> bool {
    existing_hash_types(records).all(|hash_type| hash_type & SIGHASH_ANYONECANPAY != 0)
}

/// Outputs may be added only if every existing signature leaves them
/// uncommitted: NONE always, SINGLE while inputs do not outnumber outputs
/// once the new output is in place.
pub(crate) fn can_modify_outputs(records: &[InputRecord], n_inputs: usize, n_outputs: usize) -> bool {
    existing_hash_types(records).all(|hash_type| match hash_type & SIGHASH_MASK {
        SIGHASH_NONE => true,
        SIGHASH_SINGLE => n_inputs <= n_outputs + 1,
        _ => false,
    })
}

/// Whether signing with `hash_type` would commit to outputs that do not
/// exist yet.
pub(crate) fn needs_outputs(records: &[InputRecord], n_outputs: usize, hash_type: u8) -> bool {
    if n_outputs > 0 {
        return false;
    }
    let base = hash_type & SIGHASH_MASK;
    if base == SIGHASH_ALL || hash_type == SIGHASH_DEFAULT {
        return true;
    }
    existing_hash_types(records).any(|existing| existing & SIGHASH_MASK != SIGHASH_NONE)
}

/// Reject a finished transaction whose fee rate exceeds `maximum` sat/vB.
///
/// Inputs without a recorded value count as zero.
pub(crate) fn check_fee_rate(records: &[InputRecord], tx: &Transaction, maximum: u64) -> Result<(), TransactionError> {
    let incoming: u128 = records.iter().filter_map(|record| record.value).map(u128::from).sum();
    let outgoing: u128 = tx.outputs.iter().map(|output| u128::from(output.value)).sum();
    let Some(fee) = incoming.checked_sub(outgoing) else {
        return Ok(());
    };
    let vsize = tx.virtual_size().max(1) as u128;
    if fee > u128::from(maximum) * vsize {
        let fee_rate = u64::try_from(fee / vsize).unwrap_or(u64::MAX);
        return Err(TransactionError::FeeSanity { fee_rate, maximum });
    }
    Ok(())
}
