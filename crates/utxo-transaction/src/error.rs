/// Error types for transaction operations.
///
/// One variant per failure kind of the builder, plus wire-format and
/// forwarded lower-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// A script could not be decompiled.
    #[error("decode error: {0}")]
    Decode(String),
    /// Supplied redeem/witness/control-block material does not match what
    /// is already known about the input.
    #[error("inconsistent metadata: {0}")]
    InconsistentMetadata(String),
    /// A structurally invalid nesting such as P2WSH(P2WPKH).
    #[error("invalid wrapping: {0}")]
    InvalidWrapping(String),
    /// Re-signing a slot, signing with an unknown key, or signing before
    /// the input is ready.
    #[error("signing state: {0}")]
    SigningState(String),
    /// The mutation would invalidate an existing signature.
    #[error("mutation would invalidate signatures: {0}")]
    MutationInvalidation(String),
    /// `build()` was called before every input was complete.
    #[error("transaction is not complete: {0}")]
    BuildIncomplete(String),
    /// The fee rate exceeds the configured ceiling.
    #[error("fee rate {fee_rate} sat/vB exceeds maximum {maximum}")]
    FeeSanity {
        /// Computed fee rate in sat/vB.
        fee_rate: u64,
        /// Configured ceiling in sat/vB.
        maximum: u64,
    },
    /// The script type cannot be handled for this operation.
    #[error("not supported: {0}")]
    Unsupported(String),
    /// A caller-supplied argument is malformed or not allowed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// An error occurred during binary/hex serialization or deserialization.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// An underlying script error (forwarded from `utxo-script`).
    #[error("script error: {0}")]
    Script(#[from] utxo_script::ScriptError),
    /// An underlying primitives error (forwarded from `utxo-primitives`).
    #[error("primitives error: {0}")]
    Primitives(#[from] utxo_primitives::PrimitivesError),
}
