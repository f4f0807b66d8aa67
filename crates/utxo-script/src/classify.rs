//! Script classification.
//!
//! Dispatches output scripts, scriptSigs and witness stacks to the matching
//! template in [`crate::templates`]. Output matching tries the fixed-size
//! byte patterns first, then the templates that need full decompilation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chunk::decode_script;
use crate::taproot::parse_taproot_witness;
use crate::templates::*;
use crate::ScriptError;

/// Standard script shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptType {
    /// Pay-to-pubkey.
    #[serde(rename = "pubkey")]
    P2pk,
    /// Pay-to-pubkey-hash.
    #[serde(rename = "pubkeyhash")]
    P2pkh,
    /// Pay-to-script-hash.
    #[serde(rename = "scripthash")]
    P2sh,
    /// Pay-to-witness-pubkey-hash.
    #[serde(rename = "witnesspubkeyhash")]
    P2wpkh,
    /// Pay-to-witness-script-hash.
    #[serde(rename = "witnessscripthash")]
    P2wsh,
    /// Bare m-of-n multisig.
    #[serde(rename = "multisig")]
    P2ms,
    /// Taproot output (key path when spent with a single signature).
    #[serde(rename = "taproot")]
    P2tr,
    /// Taproot n-of-n tapscript.
    #[serde(rename = "taprootnofn")]
    P2trNs,
    /// `OP_RETURN` data carrier.
    #[serde(rename = "nulldata")]
    NullData,
    /// Coinbase witness commitment.
    #[serde(rename = "witnesscommitment")]
    WitnessCommitment,
    /// Anything else.
    #[serde(rename = "nonstandard")]
    NonStandard,
}

impl ScriptType {
    /// The conventional lowercase name of this script type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptType::P2pk => "pubkey",
            ScriptType::P2pkh => "pubkeyhash",
            ScriptType::P2sh => "scripthash",
            ScriptType::P2wpkh => "witnesspubkeyhash",
            ScriptType::P2wsh => "witnessscripthash",
            ScriptType::P2ms => "multisig",
            ScriptType::P2tr => "taproot",
            ScriptType::P2trNs => "taprootnofn",
            ScriptType::NullData => "nulldata",
            ScriptType::WitnessCommitment => "witnesscommitment",
            ScriptType::NonStandard => "nonstandard",
        }
    }

    /// Whether this type is a segwit v0 program.
    pub fn is_witness_v0(&self) -> bool {
        matches!(self, ScriptType::P2wpkh | ScriptType::P2wsh)
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an output script.
///
/// # Returns
/// The matching type, `NonStandard` when nothing matches, or a decode
/// error when the script cannot be decompiled.
pub fn classify_output(script: &[u8]) -> Result<ScriptType, ScriptError> {
    if p2wpkh::check_output(script) {
        return Ok(ScriptType::P2wpkh);
    }
    if p2wsh::check_output(script) {
        return Ok(ScriptType::P2wsh);
    }
    if p2tr::check_output(script) {
        return Ok(ScriptType::P2tr);
    }
    if p2pkh::check_output(script) {
        return Ok(ScriptType::P2pkh);
    }
    if p2sh::check_output(script) {
        return Ok(ScriptType::P2sh);
    }

    let chunks = decode_script(script)?;
    if p2ms::check_output(&chunks, false) {
        return Ok(ScriptType::P2ms);
    }
    if p2tr_ns::check_output(&chunks, false) {
        return Ok(ScriptType::P2trNs);
    }
    if p2pk::check_output(&chunks) {
        return Ok(ScriptType::P2pk);
    }
    if witness_commitment::check_output(script) {
        return Ok(ScriptType::WitnessCommitment);
    }
    if nulldata::check_output(script) {
        return Ok(ScriptType::NullData);
    }
    Ok(ScriptType::NonStandard)
}

/// Classify a scriptSig.
///
/// `allow_incomplete` accepts `OP_0` placeholders in multisig inputs.
pub fn classify_input(script: &[u8], allow_incomplete: bool) -> Result<ScriptType, ScriptError> {
    let chunks = decode_script(script)?;
    if p2pkh::check_input(&chunks) {
        return Ok(ScriptType::P2pkh);
    }
    if p2sh::check_input(&chunks, allow_incomplete) {
        return Ok(ScriptType::P2sh);
    }
    if p2ms::check_input(&chunks, allow_incomplete) {
        return Ok(ScriptType::P2ms);
    }
    if p2pk::check_input(&chunks) {
        return Ok(ScriptType::P2pk);
    }
    Ok(ScriptType::NonStandard)
}

/// Classify a witness stack.
///
/// `allow_incomplete` accepts placeholder items in wrapped multisig stacks.
pub fn classify_witness(witness: &[Vec<u8>], allow_incomplete: bool) -> ScriptType {
    if p2wpkh::check_witness(witness) {
        return ScriptType::P2wpkh;
    }
    if p2wsh::check_witness(witness, allow_incomplete) {
        return ScriptType::P2wsh;
    }
    if parse_taproot_witness(witness).is_ok() {
        return ScriptType::P2tr;
    }
    ScriptType::NonStandard
}
