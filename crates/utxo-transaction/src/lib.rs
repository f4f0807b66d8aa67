/// UTXO SDK - Transaction model, signature hashing and the signing builder.
///
/// Provides the Transaction type with segwit-aware serialization, the
/// legacy, BIP143 and BIP341 signature hash algorithms, and the
/// TransactionBuilder that prepares, signs and assembles inputs.

pub mod transaction;
pub mod input;
pub mod output;
pub mod sighash;
pub mod signer;
pub mod config;
pub mod builder;

mod error;
pub use error::TransactionError;
pub use transaction::Transaction;
pub use input::TransactionInput;
pub use output::TransactionOutput;
pub use signer::Signer;
pub use config::BuilderConfig;
pub use builder::{InputRecord, KeySlot, PrevOutScriptType, SignRequest, SpendPath, TransactionBuilder};

#[cfg(test)]
mod tests;
