//! Standard script templates.
//!
//! Each submodule recognizes one standard script shape and builds scripts
//! of that shape. Matchers are pure predicates: byte-pattern templates
//! (P2PKH, P2SH, P2WPKH, P2WSH, P2TR, NULLDATA, witness commitment) look at
//! raw bytes, the rest inspect decompiled chunks or witness stack items.

pub mod nulldata;
pub mod p2ms;
pub mod p2pk;
pub mod p2pkh;
pub mod p2sh;
pub mod p2tr;
pub mod p2tr_ns;
pub mod p2wpkh;
pub mod p2wsh;
pub mod witness_commitment;

use crate::chunk::ScriptChunk;
use crate::opcodes::OP_0;

/// Whether a chunk is the `OP_0` stand-in for a missing signature.
pub(crate) fn is_placeholder(chunk: &ScriptChunk) -> bool {
    chunk.op == OP_0 || chunk.data().map_or(false, <[u8]>::is_empty)
}

/// Data pushed by a chunk, when it is a data push.
pub(crate) fn push_data(chunk: &ScriptChunk) -> Option<&[u8]> {
    chunk.data()
}
