#![deny(missing_docs)]

//! UTXO SDK - transaction construction and signing.
//!
//! Re-exports the SDK components for convenient single-crate usage.

pub use utxo_primitives as primitives;
pub use utxo_script as script;
pub use utxo_transaction as transaction;
