//! Per-input signing state.

use serde::{Deserialize, Serialize};
use utxo_script::ScriptType;

use crate::TransactionError;

/// One expected signer: a public key and, once produced, its signature.
///
/// Either side may be unknown. Keys recovered from a scriptSig without the
/// spent script have no public key; freshly prepared slots have no
/// signature.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeySlot {
    /// Public key bytes: 33-byte SEC1 for ECDSA paths, 32-byte x-only for
    /// Taproot paths.
    pub pubkey: Option<Vec<u8>>,
    /// Encoded signature including its hash-type byte, when present.
    pub signature: Option<Vec<u8>>,
}

impl KeySlot {
    /// A slot awaiting a signature from `pubkey`.
    pub fn for_key(pubkey: Vec<u8>) -> Self {
        KeySlot {
            pubkey: Some(pubkey),
            signature: None,
        }
    }

    /// Whether a non-empty signature has been recorded.
    pub fn is_signed(&self) -> bool {
        self.signature.as_ref().map_or(false, |sig| !sig.is_empty())
    }
}

/// How an input's spent output is unlocked.
///
/// Wrappers nest: `P2sh { inner: P2wsh { inner: Leaf(P2ms) } }` is a
/// P2SH-wrapped P2WSH multisig.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpendPath {
    /// A directly signed template: P2PKH, P2PK, P2WPKH, P2MS, P2TR key path
    /// or P2TR_NS.
    Leaf(ScriptType),
    /// Pay-to-script-hash with its redeem script.
    P2sh {
        redeem_script: Vec<u8>,
        inner: Box<SpendPath>,
    },
    /// Pay-to-witness-script-hash with its witness script.
    P2wsh {
        witness_script: Vec<u8>,
        inner: Box<SpendPath>,
    },
    /// Taproot script path through a revealed tapscript leaf.
    P2trScript {
        tapscript: Vec<u8>,
        control_block: Vec<u8>,
        inner: Box<SpendPath>,
    },
}

impl SpendPath {
    /// Type of the output being spent.
    pub fn prev_out_type(&self) -> ScriptType {
        match self {
            SpendPath::Leaf(ty) => *ty,
            SpendPath::P2sh { .. } => ScriptType::P2sh,
            SpendPath::P2wsh { .. } => ScriptType::P2wsh,
            SpendPath::P2trScript { .. } => ScriptType::P2tr,
        }
    }

    /// Type of the innermost template, the one signatures are made for.
    pub fn sign_type(&self) -> ScriptType {
        match self {
            SpendPath::Leaf(ty) => *ty,
            SpendPath::P2sh { inner, .. }
            | SpendPath::P2wsh { inner, .. }
            | SpendPath::P2trScript { inner, .. } => inner.sign_type(),
        }
    }

    /// Type of the P2SH redeem script, if wrapped.
    pub fn redeem_script_type(&self) -> Option<ScriptType> {
        match self {
            SpendPath::P2sh { inner, .. } => Some(inner.prev_out_type()),
            _ => None,
        }
    }

    /// Type of the P2WSH witness script or tapscript leaf, if any.
    pub fn witness_script_type(&self) -> Option<ScriptType> {
        match self {
            SpendPath::P2sh { inner, .. } => inner.witness_script_type(),
            SpendPath::P2wsh { inner, .. } | SpendPath::P2trScript { inner, .. } => {
                Some(inner.prev_out_type())
            }
            SpendPath::Leaf(_) => None,
        }
    }

    pub fn redeem_script(&self) -> Option<&[u8]> {
        match self {
            SpendPath::P2sh { redeem_script, .. } => Some(redeem_script),
            _ => None,
        }
    }

    /// The P2WSH witness script or the tapscript leaf.
    pub fn witness_script(&self) -> Option<&[u8]> {
        match self {
            SpendPath::P2sh { inner, .. } => inner.witness_script(),
            SpendPath::P2wsh { witness_script, .. } => Some(witness_script),
            SpendPath::P2trScript { tapscript, .. } => Some(tapscript),
            SpendPath::Leaf(_) => None,
        }
    }

    pub fn control_block(&self) -> Option<&[u8]> {
        match self {
            SpendPath::P2trScript { control_block, .. } => Some(control_block),
            _ => None,
        }
    }

    /// Whether the signed script sits behind a segwit v0 witness program.
    pub fn is_witness_v0(&self) -> bool {
        match self {
            SpendPath::Leaf(ty) => *ty == ScriptType::P2wpkh,
            SpendPath::P2sh { inner, .. } => inner.is_witness_v0(),
            SpendPath::P2wsh { .. } => true,
            SpendPath::P2trScript { .. } => false,
        }
    }
}

/// Accumulated knowledge about one input.
///
/// `slots` keeps public keys and signatures aligned by index. Signatures
/// recovered from a partially signed multisig input whose key order is not
/// yet known wait in `unmatched_signatures` until they are reordered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputRecord {
    /// Value of the spent output in satoshis.
    pub value: Option<u64>,
    /// 0 for segwit v0 sighash, 1 for Taproot, `None` for legacy.
    pub witness_version: Option<u8>,
    /// Script committed to by the sighash (script code or tapscript).
    pub sign_script: Option<Vec<u8>>,
    /// Locking script of the spent output.
    pub prev_out_script: Option<Vec<u8>>,
    /// Classified type of `prev_out_script`.
    pub prev_out_type: Option<ScriptType>,
    /// Full unlocking structure, once known.
    pub path: Option<SpendPath>,
    pub slots: Vec<KeySlot>,
    /// Signatures not yet bound to a key.
    pub unmatched_signatures: Vec<Vec<u8>>,
    /// Signatures the leaf template needs (m for multisig, n for P2TR_NS).
    pub max_signatures: Option<usize>,
    /// Taproot annex, including its 0x50 tag.
    pub annex: Option<Vec<u8>>,
}

impl InputRecord {
    /// Whether the record holds enough to compute a sighash and sign.
    pub fn can_sign(&self) -> bool {
        self.sign_script.is_some()
            && self.path.is_some()
            && !self.slots.is_empty()
            && (self.witness_version.is_none() || self.value.is_some())
    }

    /// Whether any signature is present.
    pub fn has_signatures(&self) -> bool {
        self.slots.iter().any(KeySlot::is_signed) || !self.unmatched_signatures.is_empty()
    }

    /// Every signature present, bound or not.
    pub fn signatures(&self) -> impl Iterator<Item = &[u8]> {
        self.slots
            .iter()
            .filter(|slot| slot.is_signed())
            .filter_map(|slot| slot.signature.as_deref())
            .chain(self.unmatched_signatures.iter().map(Vec::as_slice))
    }

    /// Install the path and keep `prev_out_type` in step with it.
    pub(crate) fn set_path(&mut self, path: SpendPath) {
        self.prev_out_type = Some(path.prev_out_type());
        self.path = Some(path);
    }

    /// Pair recovered public keys and signatures into slots.
    ///
    /// Equal-length lists are zipped. Without keys every signature gets an
    /// anonymous slot. Otherwise keys get empty slots and the signatures
    /// wait for reordering.
    pub(crate) fn bind_slots(&mut self, pubkeys: Vec<Option<Vec<u8>>>, signatures: Vec<Option<Vec<u8>>>) {
        if pubkeys.len() == signatures.len() {
            self.slots = pubkeys
                .into_iter()
                .zip(signatures)
                .map(|(pubkey, signature)| KeySlot { pubkey, signature })
                .collect();
        } else if pubkeys.is_empty() {
            self.slots = signatures
                .into_iter()
                .map(|signature| KeySlot { pubkey: None, signature })
                .collect();
        } else {
            self.slots = pubkeys
                .into_iter()
                .map(|pubkey| KeySlot { pubkey, signature: None })
                .collect();
            self.unmatched_signatures = signatures.into_iter().flatten().collect();
        }
    }

    /// Keep already-present signatures when slots are rebuilt from a
    /// freshly expanded script.
    pub(crate) fn merge_slots(&self, fresh: Vec<KeySlot>) -> Result<Vec<KeySlot>, TransactionError> {
        if !self.slots.iter().any(KeySlot::is_signed) {
            return Ok(fresh);
        }
        if self.slots.len() != fresh.len() {
            return Err(TransactionError::InconsistentMetadata(format!(
                "{} existing signature slots do not match {} script keys",
                self.slots.len(),
                fresh.len()
            )));
        }
        Ok(fresh
            .into_iter()
            .zip(&self.slots)
            .map(|(slot, existing)| KeySlot {
                pubkey: slot.pubkey,
                signature: existing.signature.clone(),
            })
            .collect())
    }
}

/// Spend shape declared by the caller of `sign`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrevOutScriptType {
    P2pkh,
    P2pk,
    P2wpkh,
    P2ms,
    P2shP2pkh,
    P2shP2pk,
    P2shP2wpkh,
    P2shP2ms,
    P2wshP2pkh,
    P2wshP2pk,
    P2wshP2ms,
    P2shP2wshP2pkh,
    P2shP2wshP2pk,
    P2shP2wshP2ms,
    P2tr,
    P2trP2ns,
}

impl PrevOutScriptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrevOutScriptType::P2pkh => "p2pkh",
            PrevOutScriptType::P2pk => "p2pk",
            PrevOutScriptType::P2wpkh => "p2wpkh",
            PrevOutScriptType::P2ms => "p2ms",
            PrevOutScriptType::P2shP2pkh => "p2sh-p2pkh",
            PrevOutScriptType::P2shP2pk => "p2sh-p2pk",
            PrevOutScriptType::P2shP2wpkh => "p2sh-p2wpkh",
            PrevOutScriptType::P2shP2ms => "p2sh-p2ms",
            PrevOutScriptType::P2wshP2pkh => "p2wsh-p2pkh",
            PrevOutScriptType::P2wshP2pk => "p2wsh-p2pk",
            PrevOutScriptType::P2wshP2ms => "p2wsh-p2ms",
            PrevOutScriptType::P2shP2wshP2pkh => "p2sh-p2wsh-p2pkh",
            PrevOutScriptType::P2shP2wshP2pk => "p2sh-p2wsh-p2pk",
            PrevOutScriptType::P2shP2wshP2ms => "p2sh-p2wsh-p2ms",
            PrevOutScriptType::P2tr => "p2tr",
            PrevOutScriptType::P2trP2ns => "p2tr-p2ns",
        }
    }

    /// Classified type of the output this shape spends.
    pub fn output_type(&self) -> ScriptType {
        match self {
            PrevOutScriptType::P2pkh => ScriptType::P2pkh,
            PrevOutScriptType::P2pk => ScriptType::P2pk,
            PrevOutScriptType::P2wpkh => ScriptType::P2wpkh,
            PrevOutScriptType::P2ms => ScriptType::P2ms,
            PrevOutScriptType::P2shP2pkh
            | PrevOutScriptType::P2shP2pk
            | PrevOutScriptType::P2shP2wpkh
            | PrevOutScriptType::P2shP2ms
            | PrevOutScriptType::P2shP2wshP2pkh
            | PrevOutScriptType::P2shP2wshP2pk
            | PrevOutScriptType::P2shP2wshP2ms => ScriptType::P2sh,
            PrevOutScriptType::P2wshP2pkh | PrevOutScriptType::P2wshP2pk | PrevOutScriptType::P2wshP2ms => {
                ScriptType::P2wsh
            }
            PrevOutScriptType::P2tr | PrevOutScriptType::P2trP2ns => ScriptType::P2tr,
        }
    }

    /// Innermost template the signatures satisfy.
    pub fn sign_type(&self) -> ScriptType {
        match self {
            PrevOutScriptType::P2pkh
            | PrevOutScriptType::P2shP2pkh
            | PrevOutScriptType::P2wshP2pkh
            | PrevOutScriptType::P2shP2wshP2pkh => ScriptType::P2pkh,
            PrevOutScriptType::P2pk
            | PrevOutScriptType::P2shP2pk
            | PrevOutScriptType::P2wshP2pk
            | PrevOutScriptType::P2shP2wshP2pk => ScriptType::P2pk,
            PrevOutScriptType::P2wpkh | PrevOutScriptType::P2shP2wpkh => ScriptType::P2wpkh,
            PrevOutScriptType::P2ms
            | PrevOutScriptType::P2shP2ms
            | PrevOutScriptType::P2wshP2ms
            | PrevOutScriptType::P2shP2wshP2ms => ScriptType::P2ms,
            PrevOutScriptType::P2tr => ScriptType::P2tr,
            PrevOutScriptType::P2trP2ns => ScriptType::P2trNs,
        }
    }

    /// Sighash version: 0 for segwit v0, 1 for Taproot, `None` for legacy.
    pub fn witness_version(&self) -> Option<u8> {
        if self.is_taproot() {
            Some(1)
        } else if self.is_segwit() {
            Some(0)
        } else {
            None
        }
    }

    pub fn is_taproot(&self) -> bool {
        matches!(self, PrevOutScriptType::P2tr | PrevOutScriptType::P2trP2ns)
    }

    /// Whether the signature commits to the spent value.
    pub fn is_segwit(&self) -> bool {
        !matches!(
            self,
            PrevOutScriptType::P2pkh
                | PrevOutScriptType::P2pk
                | PrevOutScriptType::P2ms
                | PrevOutScriptType::P2shP2pkh
                | PrevOutScriptType::P2shP2pk
                | PrevOutScriptType::P2shP2ms
        )
    }

    /// Whether a redeem script must accompany the request.
    pub fn needs_redeem_script(&self) -> bool {
        self.output_type() == ScriptType::P2sh
    }

    /// Whether a witness script (or tapscript) must accompany the request.
    pub fn needs_witness_script(&self) -> bool {
        matches!(
            self,
            PrevOutScriptType::P2wshP2pkh
                | PrevOutScriptType::P2wshP2pk
                | PrevOutScriptType::P2wshP2ms
                | PrevOutScriptType::P2shP2wshP2pkh
                | PrevOutScriptType::P2shP2wshP2pk
                | PrevOutScriptType::P2shP2wshP2ms
                | PrevOutScriptType::P2trP2ns
        )
    }
}

impl std::fmt::Display for PrevOutScriptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PrevOutScriptType {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_PREV_OUT_SCRIPT_TYPES
            .iter()
            .copied()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| TransactionError::InvalidArgument(format!("unknown prevOutScriptType {}", s)))
    }
}

/// Every supported spend shape.
pub const ALL_PREV_OUT_SCRIPT_TYPES: [PrevOutScriptType; 16] = [
    PrevOutScriptType::P2pkh,
    PrevOutScriptType::P2pk,
    PrevOutScriptType::P2wpkh,
    PrevOutScriptType::P2ms,
    PrevOutScriptType::P2shP2pkh,
    PrevOutScriptType::P2shP2pk,
    PrevOutScriptType::P2shP2wpkh,
    PrevOutScriptType::P2shP2ms,
    PrevOutScriptType::P2wshP2pkh,
    PrevOutScriptType::P2wshP2pk,
    PrevOutScriptType::P2wshP2ms,
    PrevOutScriptType::P2shP2wshP2pkh,
    PrevOutScriptType::P2shP2wshP2pk,
    PrevOutScriptType::P2shP2wshP2ms,
    PrevOutScriptType::P2tr,
    PrevOutScriptType::P2trP2ns,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prev_out_script_type_names() {
        for ty in ALL_PREV_OUT_SCRIPT_TYPES {
            let parsed: PrevOutScriptType = ty.as_str().parse().expect("known name");
            assert_eq!(parsed, ty);
            let json = serde_json::to_string(&ty).expect("serialize");
            assert_eq!(json, format!("\"{}\"", ty.as_str()), "serde name for {}", ty);
        }
        assert!("p2sh-p2tr".parse::<PrevOutScriptType>().is_err());
    }

    #[test]
    fn test_prev_out_script_type_shapes() {
        assert_eq!(PrevOutScriptType::P2shP2wpkh.sign_type(), ScriptType::P2wpkh);
        assert_eq!(PrevOutScriptType::P2shP2wpkh.witness_version(), Some(0));
        assert_eq!(PrevOutScriptType::P2shP2wshP2ms.sign_type(), ScriptType::P2ms);
        assert_eq!(PrevOutScriptType::P2trP2ns.sign_type(), ScriptType::P2trNs);
        assert_eq!(PrevOutScriptType::P2tr.witness_version(), Some(1));
        assert_eq!(PrevOutScriptType::P2shP2pk.witness_version(), None);
    }

    #[test]
    fn test_nested_path_accessors() {
        let path = SpendPath::P2sh {
            redeem_script: vec![0x00, 0x20],
            inner: Box::new(SpendPath::P2wsh {
                witness_script: vec![0x52],
                inner: Box::new(SpendPath::Leaf(ScriptType::P2ms)),
            }),
        };
        assert_eq!(path.prev_out_type(), ScriptType::P2sh);
        assert_eq!(path.redeem_script_type(), Some(ScriptType::P2wsh));
        assert_eq!(path.witness_script_type(), Some(ScriptType::P2ms));
        assert_eq!(path.sign_type(), ScriptType::P2ms);
        assert_eq!(path.witness_script(), Some(&[0x52][..]));
        assert!(path.is_witness_v0());
    }

    #[test]
    fn test_bind_slots_unaligned_signatures_wait() {
        let mut record = InputRecord::default();
        record.bind_slots(
            vec![Some(vec![2; 33]), Some(vec![3; 33]), Some(vec![4; 33])],
            vec![Some(vec![0x30]), None],
        );
        assert_eq!(record.slots.len(), 3);
        assert!(record.slots.iter().all(|slot| slot.signature.is_none()));
        assert_eq!(record.unmatched_signatures, vec![vec![0x30]]);
        assert!(record.has_signatures());
    }

    #[test]
    fn test_can_sign_requires_value_for_segwit() {
        let mut record = InputRecord {
            sign_script: Some(vec![0x76]),
            path: Some(SpendPath::Leaf(ScriptType::P2wpkh)),
            slots: vec![KeySlot::for_key(vec![2; 33])],
            witness_version: Some(0),
            ..Default::default()
        };
        assert!(!record.can_sign());
        record.value = Some(1000);
        assert!(record.can_sign());
    }
}
