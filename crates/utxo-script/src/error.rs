/// Error types for script operations.
///
/// Covers decompilation failures, encoding limits, and malformed template
/// or Taproot witness data.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Generic invalid script error.
    #[error("invalid script: {0}")]
    InvalidScript(String),

    /// Invalid opcode data encountered during ASM parsing.
    #[error("invalid opcode data")]
    InvalidOpcodeData,

    /// Attempted to use append_opcodes for a push data opcode.
    #[error("use append_push_data for push data funcs: {0}")]
    InvalidOpcodeType(String),

    /// Invalid hex string.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Not enough data in script to complete a push operation.
    #[error("not enough data")]
    DataTooSmall,

    /// Push data exceeds maximum allowed size.
    #[error("data too big")]
    DataTooBig,

    /// A script that must only push data executes another opcode.
    #[error("script is not push-only")]
    NotPushOnly,

    /// Arguments to a template constructor violate the template's shape.
    #[error("invalid template arguments: {0}")]
    InvalidTemplate(String),

    /// A Taproot witness stack or control block is malformed.
    #[error("invalid taproot witness: {0}")]
    InvalidTaprootWitness(String),

    /// Error from primitives crate.
    #[error("primitives error: {0}")]
    Primitives(#[from] utxo_primitives::PrimitivesError),
}
