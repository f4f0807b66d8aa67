//! Turn collected signatures into final scriptSigs and witnesses.

use utxo_script::chunk::script_to_stack;
use utxo_script::templates::{p2ms, p2pk, p2pkh, p2sh, p2tr_ns, p2wpkh};
use utxo_script::ScriptType;

use super::record::{InputRecord, SpendPath};
use crate::TransactionError;

/// Unlocking data for one input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Assembled {
    /// `None` leaves the input's scriptSig untouched.
    pub script_sig: Option<Vec<u8>>,
    pub witness: Vec<Vec<u8>>,
}

/// Assemble the unlocking data for `record` along `path`.
///
/// # Returns
/// `None` when the input lacks the keys or signatures its template needs.
/// With `allow_incomplete`, missing multisig signatures become
/// placeholders; otherwise a multisig needs exactly its threshold.
pub(crate) fn assemble(
    path: &SpendPath,
    record: &InputRecord,
    allow_incomplete: bool,
) -> Result<Option<Assembled>, TransactionError> {
    match path {
        SpendPath::Leaf(ty) => assemble_leaf(*ty, record, allow_incomplete),
        SpendPath::P2sh { redeem_script, inner } => {
            let Some(inner) = assemble(inner, record, allow_incomplete)? else {
                return Ok(None);
            };
            let inner_script_sig = inner.script_sig.unwrap_or_default();
            let script_sig = p2sh::input_script(&inner_script_sig, redeem_script)?;
            Ok(Some(Assembled {
                script_sig: Some(script_sig.into_bytes()),
                witness: inner.witness,
            }))
        }
        SpendPath::P2wsh { witness_script, inner } => {
            let Some(inner) = assemble(inner, record, allow_incomplete)? else {
                return Ok(None);
            };
            let mut witness = stack_items(inner)?;
            witness.push(witness_script.clone());
            Ok(Some(Assembled {
                script_sig: Some(Vec::new()),
                witness,
            }))
        }
        SpendPath::P2trScript {
            tapscript,
            control_block,
            inner,
        } => {
            let Some(inner) = assemble(inner, record, allow_incomplete)? else {
                return Ok(None);
            };
            let mut witness = stack_items(inner)?;
            witness.push(tapscript.clone());
            witness.push(control_block.clone());
            witness.extend(record.annex.clone());
            Ok(Some(Assembled {
                script_sig: Some(Vec::new()),
                witness,
            }))
        }
    }
}

fn stack_items(inner: Assembled) -> Result<Vec<Vec<u8>>, TransactionError> {
    let mut items = match inner.script_sig {
        Some(script_sig) => script_to_stack(&script_sig)?,
        None => Vec::new(),
    };
    items.extend(inner.witness);
    Ok(items)
}

fn assemble_leaf(
    ty: ScriptType,
    record: &InputRecord,
    allow_incomplete: bool,
) -> Result<Option<Assembled>, TransactionError> {
    let first = record.slots.first();
    let first_signature = first.and_then(|slot| slot.signature.as_deref()).filter(|sig| !sig.is_empty());
    let first_pubkey = first.and_then(|slot| slot.pubkey.as_deref());

    match ty {
        ScriptType::P2pkh => {
            let (Some(signature), Some(pubkey)) = (first_signature, first_pubkey) else {
                return Ok(None);
            };
            Ok(Some(Assembled {
                script_sig: Some(p2pkh::input_script(signature, pubkey)?.into_bytes()),
                witness: Vec::new(),
            }))
        }
        ScriptType::P2wpkh => {
            let (Some(signature), Some(pubkey)) = (first_signature, first_pubkey) else {
                return Ok(None);
            };
            Ok(Some(Assembled {
                script_sig: Some(Vec::new()),
                witness: p2wpkh::witness(signature, pubkey),
            }))
        }
        ScriptType::P2pk => {
            let Some(signature) = first_signature else {
                return Ok(None);
            };
            Ok(Some(Assembled {
                script_sig: Some(p2pk::input_script(signature)?.into_bytes()),
                witness: Vec::new(),
            }))
        }
        ScriptType::P2ms => {
            let Some(signatures) = threshold_signatures(record, allow_incomplete)? else {
                return Ok(None);
            };
            let flat: Vec<Vec<u8>> = signatures.into_iter().map(Option::unwrap_or_default).collect();
            Ok(Some(Assembled {
                script_sig: Some(p2ms::input_script(&flat)?.into_bytes()),
                witness: Vec::new(),
            }))
        }
        ScriptType::P2trNs => {
            let Some(signatures) = threshold_signatures(record, allow_incomplete)? else {
                return Ok(None);
            };
            Ok(Some(Assembled {
                script_sig: None,
                witness: p2tr_ns::witness(&signatures),
            }))
        }
        ScriptType::P2tr => {
            let Some(signature) = first_signature else {
                return Ok(None);
            };
            let mut witness = vec![signature.to_vec()];
            witness.extend(record.annex.clone());
            Ok(Some(Assembled {
                script_sig: Some(Vec::new()),
                witness,
            }))
        }
        _ => Ok(None),
    }
}

/// Signatures for a threshold template in key order.
///
/// Incomplete assembly keeps one entry per key with `None` for the
/// missing ones; strict assembly keeps only present signatures and
/// requires exactly the threshold.
fn threshold_signatures(
    record: &InputRecord,
    allow_incomplete: bool,
) -> Result<Option<Vec<Option<Vec<u8>>>>, TransactionError> {
    if record.slots.is_empty() {
        return Ok(None);
    }
    let signatures: Vec<Option<Vec<u8>>> = record
        .slots
        .iter()
        .map(|slot| slot.signature.clone().filter(|sig| !sig.is_empty()))
        .collect();
    if allow_incomplete {
        return Ok(Some(signatures));
    }

    let present: Vec<Option<Vec<u8>>> = signatures.into_iter().filter(Option::is_some).collect();
    if let Some(required) = record.max_signatures {
        if present.len() != required {
            return Err(TransactionError::BuildIncomplete(format!(
                "{} of {} required signatures present",
                present.len(),
                required
            )));
        }
    } else if present.is_empty() {
        return Ok(None);
    }
    Ok(Some(present))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::record::KeySlot;

    fn sig(tag: u8) -> Vec<u8> {
        vec![0x30, 0x06, 0x02, 0x01, tag, 0x02, 0x01, 0x01, 0x01]
    }

    fn multisig_record(signatures: Vec<Option<Vec<u8>>>, m: usize) -> InputRecord {
        InputRecord {
            slots: signatures
                .into_iter()
                .map(|signature| KeySlot {
                    pubkey: Some(vec![2; 33]),
                    signature,
                })
                .collect(),
            max_signatures: Some(m),
            ..Default::default()
        }
    }

    #[test]
    fn test_incomplete_multisig_keeps_placeholders() {
        let record = multisig_record(vec![None, Some(sig(1)), None], 2);
        let built = assemble(&SpendPath::Leaf(ScriptType::P2ms), &record, true)
            .expect("assemble")
            .expect("some");
        let script_sig = built.script_sig.expect("scriptSig");
        let stack = script_to_stack(&script_sig).expect("push only");
        assert_eq!(stack.len(), 4, "dummy plus one item per key");
        assert!(stack[1].is_empty() && stack[3].is_empty());
        assert_eq!(stack[2], sig(1));
    }

    #[test]
    fn test_strict_multisig_needs_threshold() {
        let record = multisig_record(vec![None, Some(sig(1)), None], 2);
        let result = assemble(&SpendPath::Leaf(ScriptType::P2ms), &record, false);
        assert!(matches!(result, Err(TransactionError::BuildIncomplete(_))));

        let record = multisig_record(vec![Some(sig(1)), None, Some(sig(3))], 2);
        let built = assemble(&SpendPath::Leaf(ScriptType::P2ms), &record, false)
            .expect("assemble")
            .expect("some");
        let stack = script_to_stack(&built.script_sig.expect("scriptSig")).expect("push only");
        assert_eq!(stack, vec![Vec::new(), sig(1), sig(3)]);
    }

    #[test]
    fn test_p2wsh_moves_script_sig_into_witness() {
        let record = multisig_record(vec![Some(sig(1)), Some(sig(2))], 2);
        let path = SpendPath::P2wsh {
            witness_script: vec![0xae],
            inner: Box::new(SpendPath::Leaf(ScriptType::P2ms)),
        };
        let built = assemble(&path, &record, false).expect("assemble").expect("some");
        assert_eq!(built.script_sig, Some(Vec::new()));
        assert_eq!(built.witness, vec![Vec::new(), sig(1), sig(2), vec![0xae]]);
    }

    #[test]
    fn test_p2pkh_without_signature_is_skipped() {
        let record = InputRecord {
            slots: vec![KeySlot::for_key(vec![2; 33])],
            ..Default::default()
        };
        let built = assemble(&SpendPath::Leaf(ScriptType::P2pkh), &record, true).expect("assemble");
        assert!(built.is_none());
    }

    #[test]
    fn test_taproot_key_path_with_annex() {
        let record = InputRecord {
            slots: vec![KeySlot {
                pubkey: None,
                signature: Some(vec![7; 64]),
            }],
            annex: Some(vec![0x50, 1]),
            ..Default::default()
        };
        let built = assemble(&SpendPath::Leaf(ScriptType::P2tr), &record, false)
            .expect("assemble")
            .expect("some");
        assert_eq!(built.witness, vec![vec![7; 64], vec![0x50, 1]]);
    }
}
