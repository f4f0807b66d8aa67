//! Derive the signing script and key slots for an input from the scripts
//! supplied with a sign request.

use utxo_script::templates::{p2pkh, p2sh, p2wsh};
use utxo_script::taproot::output_script_from_control_block;
use utxo_script::{classify_output, Script, ScriptType};

use super::expand::{expand_output, ExpandedOutput};
use super::record::{InputRecord, KeySlot, SpendPath};
use crate::TransactionError;

/// Scripts accompanying a sign request.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct PrepareScripts<'a> {
    pub redeem_script: Option<&'a [u8]>,
    pub witness_script: Option<&'a [u8]>,
    pub control_block: Option<&'a [u8]>,
    pub annex: Option<&'a [u8]>,
}

/// Build a fresh record for `current` from the supplied scripts.
///
/// Branches, in order: P2SH-P2WSH, P2SH, Taproot script path, P2WSH, a
/// known prevout script, and finally a P2PKH of `our_pubkey`. Existing
/// signatures survive; the value is carried over unchanged.
pub(crate) fn prepare_input(
    current: &InputRecord,
    our_pubkey: &[u8],
    scripts: PrepareScripts<'_>,
) -> Result<InputRecord, TransactionError> {
    let mut prepared = InputRecord {
        value: current.value,
        annex: scripts.annex.map(<[u8]>::to_vec).or_else(|| current.annex.clone()),
        ..Default::default()
    };

    match scripts {
        PrepareScripts {
            redeem_script: Some(redeem_script),
            witness_script: Some(witness_script),
            ..
        } => {
            let p2wsh_output = p2wsh::output_script_for_witness_script(witness_script);
            if redeem_script != p2wsh_output.to_bytes() {
                return Err(TransactionError::InconsistentMetadata(
                    "witness script inconsistent with redeem script".to_string(),
                ));
            }
            let p2sh_output = p2sh::output_script_for_redeem(redeem_script);
            check_known_prev_out(current, &p2sh_output, "redeem script")?;
            reject_wrapped_p2wpkh(witness_script, "P2SH(P2WSH(P2WPKH))")?;

            let (expanded, slots) = signable(expand_output(witness_script, Some(our_pubkey))?, witness_script)?;
            finish(&mut prepared, current, slots, expanded.max_signatures)?;
            prepared.set_path(SpendPath::P2sh {
                redeem_script: redeem_script.to_vec(),
                inner: Box::new(SpendPath::P2wsh {
                    witness_script: witness_script.to_vec(),
                    inner: Box::new(SpendPath::Leaf(expanded.script_type)),
                }),
            });
            prepared.prev_out_script = Some(p2sh_output.into_bytes());
            prepared.sign_script = Some(witness_script.to_vec());
            prepared.witness_version = Some(0);
        }
        PrepareScripts {
            redeem_script: Some(redeem_script),
            ..
        } => {
            let p2sh_output = p2sh::output_script_for_redeem(redeem_script);
            if let Some(prev_out_type) = current.prev_out_type {
                if current.prev_out_script.is_some() && prev_out_type != ScriptType::P2sh {
                    return Err(TransactionError::InconsistentMetadata(format!(
                        "prevOutScript is {}, not P2SH",
                        prev_out_type
                    )));
                }
            }
            check_known_prev_out(current, &p2sh_output, "redeem script")?;

            let (expanded, slots) = signable(expand_output(redeem_script, Some(our_pubkey))?, redeem_script)?;
            let is_p2wpkh = expanded.script_type == ScriptType::P2wpkh;
            prepared.sign_script = Some(if is_p2wpkh {
                p2wpkh_script_code(&slots)?
            } else {
                redeem_script.to_vec()
            });
            if is_p2wpkh {
                prepared.witness_version = Some(0);
            }
            finish(&mut prepared, current, slots, expanded.max_signatures)?;
            prepared.set_path(SpendPath::P2sh {
                redeem_script: redeem_script.to_vec(),
                inner: Box::new(SpendPath::Leaf(expanded.script_type)),
            });
            prepared.prev_out_script = Some(p2sh_output.into_bytes());
        }
        PrepareScripts {
            witness_script: Some(tapscript),
            control_block: Some(control_block),
            ..
        } => {
            let prev_out_script = output_script_from_control_block(control_block, tapscript)?;
            check_known_prev_out(current, &prev_out_script, "control block")?;

            let (expanded, slots) = signable(expand_output(tapscript, Some(our_pubkey))?, tapscript)?;
            finish(&mut prepared, current, slots, expanded.max_signatures)?;
            prepared.set_path(SpendPath::P2trScript {
                tapscript: tapscript.to_vec(),
                control_block: control_block.to_vec(),
                inner: Box::new(SpendPath::Leaf(expanded.script_type)),
            });
            prepared.prev_out_script = Some(prev_out_script.into_bytes());
            prepared.sign_script = Some(tapscript.to_vec());
            prepared.witness_version = Some(1);
        }
        PrepareScripts {
            witness_script: Some(witness_script),
            ..
        } => {
            let p2wsh_output = p2wsh::output_script_for_witness_script(witness_script);
            if let Some(prev_out_type) = current.prev_out_type {
                if current.prev_out_script.is_some() && prev_out_type != ScriptType::P2wsh {
                    return Err(TransactionError::InconsistentMetadata(format!(
                        "prevOutScript is {}, not P2WSH",
                        prev_out_type
                    )));
                }
            }
            check_known_prev_out(current, &p2wsh_output, "witness script")?;
            reject_wrapped_p2wpkh(witness_script, "P2WSH(P2WPKH)")?;

            let (expanded, slots) = signable(expand_output(witness_script, Some(our_pubkey))?, witness_script)?;
            finish(&mut prepared, current, slots, expanded.max_signatures)?;
            prepared.set_path(SpendPath::P2wsh {
                witness_script: witness_script.to_vec(),
                inner: Box::new(SpendPath::Leaf(expanded.script_type)),
            });
            prepared.prev_out_script = Some(p2wsh_output.into_bytes());
            prepared.sign_script = Some(witness_script.to_vec());
            prepared.witness_version = Some(0);
        }
        _ => match (&current.prev_out_script, current.prev_out_type) {
            (Some(prev_out_script), Some(prev_out_type)) => {
                match prev_out_type {
                    ScriptType::P2sh => {
                        return Err(TransactionError::InvalidArgument(
                            "prevOutScript is P2SH, a redeem script is required".to_string(),
                        ))
                    }
                    ScriptType::P2wsh => {
                        return Err(TransactionError::InvalidArgument(
                            "prevOutScript is P2WSH, a witness script is required".to_string(),
                        ))
                    }
                    _ => {}
                }
                let (expanded, slots) =
                    signable(expand_output(prev_out_script, Some(our_pubkey))?, prev_out_script)?;
                prepared.sign_script = Some(match expanded.script_type {
                    ScriptType::P2wpkh => p2wpkh_script_code(&slots)?,
                    _ => prev_out_script.clone(),
                });
                prepared.witness_version = match expanded.script_type {
                    ScriptType::P2wpkh => Some(0),
                    ScriptType::P2tr => Some(1),
                    _ => None,
                };
                finish(&mut prepared, current, slots, expanded.max_signatures)?;
                prepared.set_path(SpendPath::Leaf(expanded.script_type));
                prepared.prev_out_script = Some(prev_out_script.clone());
            }
            _ => {
                let prev_out_script = p2pkh::output_script_for_pubkey(our_pubkey);
                finish(&mut prepared, current, vec![KeySlot::for_key(our_pubkey.to_vec())], None)?;
                prepared.set_path(SpendPath::Leaf(ScriptType::P2pkh));
                prepared.sign_script = Some(prev_out_script.to_bytes().to_vec());
                prepared.prev_out_script = Some(prev_out_script.into_bytes());
            }
        },
    }

    Ok(prepared)
}

fn signable(expanded: ExpandedOutput, script: &[u8]) -> Result<(ExpandedOutput, Vec<KeySlot>), TransactionError> {
    match expanded.slots.clone() {
        Some(slots) => Ok((expanded, slots)),
        None => Err(TransactionError::Unsupported(format!(
            "{} not supported as signing script ({})",
            expanded.script_type,
            Script::from_bytes(script).to_asm()
        ))),
    }
}

fn finish(
    prepared: &mut InputRecord,
    current: &InputRecord,
    slots: Vec<KeySlot>,
    max_signatures: Option<usize>,
) -> Result<(), TransactionError> {
    prepared.slots = current.merge_slots(slots)?;
    prepared.unmatched_signatures = current.unmatched_signatures.clone();
    prepared.max_signatures = max_signatures;
    Ok(())
}

fn check_known_prev_out(current: &InputRecord, derived: &Script, source: &str) -> Result<(), TransactionError> {
    match &current.prev_out_script {
        Some(known) if known.as_slice() != derived.to_bytes() => Err(TransactionError::InconsistentMetadata(
            format!("{} inconsistent with prevOutScript", source),
        )),
        _ => Ok(()),
    }
}

fn reject_wrapped_p2wpkh(witness_script: &[u8], shape: &str) -> Result<(), TransactionError> {
    if classify_output(witness_script)? == ScriptType::P2wpkh {
        return Err(TransactionError::InvalidWrapping(format!("{} is a consensus failure", shape)));
    }
    Ok(())
}

/// BIP143 script code for a P2WPKH key: the equivalent P2PKH script.
fn p2wpkh_script_code(slots: &[KeySlot]) -> Result<Vec<u8>, TransactionError> {
    match slots.first().and_then(|slot| slot.pubkey.as_deref()) {
        Some(pubkey) => Ok(p2pkh::output_script_for_pubkey(pubkey).into_bytes()),
        None => Err(TransactionError::SigningState("P2WPKH input has no public key".to_string())),
    }
}
