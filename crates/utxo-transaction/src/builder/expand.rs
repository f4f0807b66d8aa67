//! Recover signing state from existing scripts.
//!
//! [`expand_input`] reads a scriptSig and witness back into keys,
//! signatures and the spend path, and [`expand_spend`] does the same
//! against a known locking script. [`expand_output`] lists the keys a
//! locking script expects signatures from.

use utxo_primitives::hash::hash160;
use utxo_script::chunk::compile_stack;
use utxo_script::templates::{p2ms, p2pk, p2pkh, p2sh, p2tr, p2tr_ns, p2wpkh, p2wsh};
use utxo_script::{classify_input, classify_output, classify_witness, ScriptType, TaprootWitness};
use utxo_script::taproot::{output_script_from_control_block, parse_taproot_witness};

use super::record::{KeySlot, SpendPath};
use crate::TransactionError;

/// What an existing scriptSig and witness reveal about an input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ExpandedInput {
    pub prev_out_script: Option<Vec<u8>>,
    pub path: Option<SpendPath>,
    pub pubkeys: Vec<Option<Vec<u8>>>,
    pub signatures: Vec<Option<Vec<u8>>>,
    pub max_signatures: Option<usize>,
    pub annex: Option<Vec<u8>>,
}

impl ExpandedInput {
    fn leaf(ty: ScriptType) -> Self {
        ExpandedInput {
            path: Some(SpendPath::Leaf(ty)),
            ..Default::default()
        }
    }
}

/// Expand an input's unlocking data.
///
/// # Arguments
/// * `script_sig` - The input's scriptSig.
/// * `witness` - The input's witness stack.
/// * `known_type` - Forces the template, used when recursing into wrapped scripts.
/// * `known_script` - The locking script (or redeem/witness script) being satisfied.
///
/// # Returns
/// An empty expansion when both scriptSig and witness are empty, a
/// `NonStandard` leaf when no template matches.
pub(crate) fn expand_input(
    script_sig: &[u8],
    witness: &[Vec<u8>],
    known_type: Option<ScriptType>,
    known_script: Option<&[u8]>,
) -> Result<ExpandedInput, TransactionError> {
    if script_sig.is_empty() && witness.is_empty() {
        return Ok(ExpandedInput::default());
    }

    let ty = match known_type {
        Some(ty) => ty,
        None => {
            let from_script_sig = if script_sig.is_empty() {
                ScriptType::NonStandard
            } else {
                classify_input(script_sig, true)?
            };
            if from_script_sig == ScriptType::NonStandard {
                classify_witness(witness, true)
            } else {
                from_script_sig
            }
        }
    };

    match ty {
        ScriptType::P2wpkh => {
            let [signature, pubkey] = witness else {
                return Err(TransactionError::Decode("P2WPKH witness must have two items".to_string()));
            };
            Ok(ExpandedInput {
                prev_out_script: Some(p2wpkh::output_script_for_pubkey(pubkey).into_bytes()),
                pubkeys: vec![Some(pubkey.clone())],
                signatures: vec![Some(signature.clone())],
                ..ExpandedInput::leaf(ScriptType::P2wpkh)
            })
        }
        ScriptType::P2pkh => {
            let (signature, pubkey) = p2pkh::decode_input(script_sig)?;
            Ok(ExpandedInput {
                prev_out_script: Some(p2pkh::output_script_for_pubkey(&pubkey).into_bytes()),
                pubkeys: vec![Some(pubkey)],
                signatures: vec![Some(signature)],
                ..ExpandedInput::leaf(ScriptType::P2pkh)
            })
        }
        ScriptType::P2pk => {
            let signature = p2pk::decode_input(script_sig)?;
            let pubkey = known_script.map(p2pk::pubkey).transpose()?;
            Ok(ExpandedInput {
                prev_out_script: known_script.map(<[u8]>::to_vec),
                pubkeys: vec![pubkey],
                signatures: vec![Some(signature)],
                ..ExpandedInput::leaf(ScriptType::P2pk)
            })
        }
        ScriptType::P2ms => {
            let signatures = p2ms::decode_input(script_sig)?;
            let multisig = known_script.map(p2ms::decode_output).transpose()?;
            let (pubkeys, max_signatures) = match multisig {
                Some(ms) => (ms.pubkeys.into_iter().map(Some).collect(), Some(ms.m)),
                None => (Vec::new(), None),
            };
            Ok(ExpandedInput {
                prev_out_script: known_script.map(<[u8]>::to_vec),
                pubkeys,
                signatures,
                max_signatures,
                ..ExpandedInput::leaf(ScriptType::P2ms)
            })
        }
        ScriptType::P2trNs => {
            let pubkeys = known_script.map(p2tr_ns::pubkeys).transpose()?.unwrap_or_default();
            let max_signatures = if pubkeys.is_empty() { None } else { Some(pubkeys.len()) };
            Ok(ExpandedInput {
                prev_out_script: known_script.map(<[u8]>::to_vec),
                pubkeys: pubkeys.into_iter().map(Some).collect(),
                signatures: p2tr_ns::decode_witness(witness),
                max_signatures,
                ..ExpandedInput::leaf(ScriptType::P2trNs)
            })
        }
        ScriptType::P2sh => {
            let (inner_script_sig, redeem_script) = p2sh::decode_input(script_sig)?;
            let redeem_type = classify_output(&redeem_script)?;
            let inner = expand_input(&inner_script_sig, witness, Some(redeem_type), Some(&redeem_script))?;
            let Some(inner_path) = inner.path else {
                return Ok(ExpandedInput::default());
            };
            Ok(ExpandedInput {
                prev_out_script: Some(p2sh::output_script_for_redeem(&redeem_script).into_bytes()),
                path: Some(SpendPath::P2sh {
                    redeem_script,
                    inner: Box::new(inner_path),
                }),
                ..inner
            })
        }
        ScriptType::P2wsh => {
            let Some((witness_script, items)) = witness.split_last() else {
                return Err(TransactionError::Decode("P2WSH witness is empty".to_string()));
            };
            let witness_type = classify_output(witness_script)?;
            if witness_type == ScriptType::P2wpkh {
                return Err(TransactionError::InvalidWrapping(
                    "P2WSH(P2WPKH) is a consensus failure".to_string(),
                ));
            }
            let inner_script_sig = compile_stack(items)?;
            let inner = expand_input(&inner_script_sig, &[], Some(witness_type), Some(witness_script))?;
            let Some(inner_path) = inner.path else {
                return Ok(ExpandedInput::default());
            };
            Ok(ExpandedInput {
                prev_out_script: Some(p2wsh::output_script_for_witness_script(witness_script).into_bytes()),
                path: Some(SpendPath::P2wsh {
                    witness_script: witness_script.clone(),
                    inner: Box::new(inner_path),
                }),
                ..inner
            })
        }
        ScriptType::P2tr => match parse_taproot_witness(witness)? {
            TaprootWitness::KeyPath { signature, annex } => Ok(ExpandedInput {
                prev_out_script: known_script.map(<[u8]>::to_vec),
                signatures: vec![Some(signature)],
                annex,
                ..ExpandedInput::leaf(ScriptType::P2tr)
            }),
            TaprootWitness::ScriptPath {
                stack,
                tapscript,
                control_block,
                annex,
            } => {
                let prev_out_script = output_script_from_control_block(&control_block, &tapscript)?;
                let leaf_type = classify_output(&tapscript)?;
                let inner = expand_input(&[], &stack, Some(leaf_type), Some(&tapscript))?;
                let inner_path = inner.path.unwrap_or(SpendPath::Leaf(leaf_type));
                Ok(ExpandedInput {
                    prev_out_script: Some(prev_out_script.into_bytes()),
                    path: Some(SpendPath::P2trScript {
                        tapscript,
                        control_block,
                        inner: Box::new(inner_path),
                    }),
                    annex,
                    pubkeys: inner.pubkeys,
                    signatures: inner.signatures,
                    max_signatures: inner.max_signatures,
                })
            }
        },
        _ => Ok(ExpandedInput {
            prev_out_script: known_script.map(<[u8]>::to_vec),
            ..ExpandedInput::leaf(ScriptType::NonStandard)
        }),
    }
}

/// Expand an input against the locking script it spends, when known.
///
/// A native witness program picks the template from `prev_out_script`
/// rather than from the witness shape. A witness that does not fit that
/// program yields no path. Unlocking data whose derived locking script
/// differs from `prev_out_script` is rejected.
pub(crate) fn expand_spend(
    script_sig: &[u8],
    witness: &[Vec<u8>],
    prev_out_script: Option<&[u8]>,
) -> Result<ExpandedInput, TransactionError> {
    let Some(prev_out_script) = prev_out_script else {
        return expand_input(script_sig, witness, None, None);
    };
    if script_sig.is_empty() && witness.is_empty() {
        return Ok(ExpandedInput::default());
    }

    let prev_out_type = classify_output(prev_out_script)?;
    let known_type = match prev_out_type {
        ScriptType::P2wpkh | ScriptType::P2wsh | ScriptType::P2tr if script_sig.is_empty() => {
            if classify_witness(witness, true) != prev_out_type {
                return Ok(ExpandedInput {
                    prev_out_script: Some(prev_out_script.to_vec()),
                    ..Default::default()
                });
            }
            Some(prev_out_type)
        }
        _ => None,
    };

    let expanded = expand_input(script_sig, witness, known_type, Some(prev_out_script))?;
    if let Some(derived) = &expanded.prev_out_script {
        if derived.as_slice() != prev_out_script {
            return Err(TransactionError::InconsistentMetadata(format!(
                "unlocking data spends {}, not the supplied {} prevout",
                classify_output(derived)?,
                prev_out_type
            )));
        }
    }
    Ok(expanded)
}

/// Keys a locking script expects signatures from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ExpandedOutput {
    pub script_type: ScriptType,
    /// `None` when the script is not signable with the keys at hand.
    pub slots: Option<Vec<KeySlot>>,
    pub max_signatures: Option<usize>,
}

/// Expand a locking script against an optional signer key.
///
/// Hash-committed templates (P2PKH, P2WPKH, P2TR key path) only yield a
/// slot when `our_pubkey` matches the commitment. Taproot keys are
/// compared in x-only form.
pub(crate) fn expand_output(script: &[u8], our_pubkey: Option<&[u8]>) -> Result<ExpandedOutput, TransactionError> {
    let script_type = classify_output(script)?;
    let mut expanded = ExpandedOutput {
        script_type,
        slots: None,
        max_signatures: None,
    };

    match script_type {
        ScriptType::P2pkh | ScriptType::P2wpkh => {
            let committed = if script_type == ScriptType::P2pkh {
                p2pkh::pubkey_hash(script)
            } else {
                p2wpkh::pubkey_hash(script)
            };
            if let Some(pubkey) = our_pubkey {
                if committed == Some(hash160(pubkey)) {
                    expanded.slots = Some(vec![KeySlot::for_key(pubkey.to_vec())]);
                }
            }
        }
        ScriptType::P2tr => {
            if let Some(x_only) = our_pubkey.and_then(to_x_only) {
                let ours = p2tr::output_script_for_internal_key(&x_only, None)?;
                if ours.to_bytes() == script {
                    expanded.slots = Some(vec![KeySlot::for_key(x_only.to_vec())]);
                }
            }
        }
        ScriptType::P2trNs => {
            let pubkeys = p2tr_ns::pubkeys(script)?;
            expanded.max_signatures = Some(pubkeys.len());
            expanded.slots = Some(pubkeys.into_iter().map(KeySlot::for_key).collect());
        }
        ScriptType::P2ms => {
            let multisig = p2ms::decode_output(script)?;
            expanded.max_signatures = Some(multisig.m);
            expanded.slots = Some(multisig.pubkeys.into_iter().map(KeySlot::for_key).collect());
        }
        ScriptType::P2pk => {
            expanded.slots = Some(vec![KeySlot::for_key(p2pk::pubkey(script)?)]);
        }
        _ => {}
    }
    Ok(expanded)
}

/// Reduce a 33-byte compressed key to its x coordinate; 32-byte keys pass
/// through.
pub(crate) fn to_x_only(pubkey: &[u8]) -> Option<[u8; 32]> {
    let x = match pubkey.len() {
        33 => &pubkey[1..],
        32 => pubkey,
        _ => return None,
    };
    x.try_into().ok()
}
