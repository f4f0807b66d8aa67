/// UTXO SDK - Script parsing, templates and classification.
///
/// Provides the Script type, opcode definitions, chunk decompilation, the
/// standard script templates with their classifier, script signature
/// encodings and BIP341 witness helpers.

pub mod script;
pub mod opcodes;
pub mod chunk;
pub mod signature;
pub mod templates;
pub mod classify;
pub mod taproot;

mod error;
pub use error::ScriptError;
pub use script::Script;
pub use chunk::ScriptChunk;
pub use classify::{classify_input, classify_output, classify_witness, ScriptType};
pub use taproot::TaprootWitness;
