//! Signature hash computation for transaction signing.
//!
//! Three algorithms, selected by the witness version of the spent output:
//! - [`legacy`]: the original scheme, hashing a modified copy of the transaction.
//! - [`v0`]: BIP143, committing to the spent value (segwit v0).
//! - [`v1`]: BIP341, committing to every spent output (Taproot).

pub mod legacy;
pub mod v0;
pub mod v1;

pub use utxo_script::signature::{
    is_defined_hash_type, SIGHASH_ALL, SIGHASH_ANYONECANPAY, SIGHASH_DEFAULT, SIGHASH_NONE,
    SIGHASH_OUTPUT_MASK, SIGHASH_SINGLE,
};

use crate::transaction::Transaction;
use crate::TransactionError;

/// Mask applied to extract the base sighash type for legacy and v0 hashing.
pub const SIGHASH_MASK: u8 = 0x1f;

/// Whether `hash_type` is allowed for a Taproot signature.
pub fn is_valid_taproot_hash_type(hash_type: u8) -> bool {
    hash_type == SIGHASH_DEFAULT || is_defined_hash_type(hash_type)
}

fn check_input_index(tx: &Transaction, input_index: usize) -> Result<(), TransactionError> {
    if input_index >= tx.inputs.len() {
        return Err(TransactionError::InvalidArgument(format!(
            "input index {} out of range (tx has {} inputs)",
            input_index,
            tx.inputs.len()
        )));
    }
    Ok(())
}
