//! Sign requests and the per-input signing step.

use tracing::trace;
use utxo_script::signature::{encode_ecdsa_signature, encode_schnorr_signature};
use utxo_script::taproot::tap_leaf_hash;
use utxo_script::{Script, ScriptType};

use super::expand::to_x_only;
use super::record::{InputRecord, PrevOutScriptType, SpendPath};
use crate::signer::Signer;
use crate::sighash::{is_defined_hash_type, is_valid_taproot_hash_type, SIGHASH_ALL, SIGHASH_DEFAULT};
use crate::transaction::Transaction;
use crate::{TransactionError, TransactionOutput};

/// Everything needed to add one signature to one input.
///
/// Build with [`SignRequest::new`] and the `with_*` setters.
pub struct SignRequest<'a> {
    pub vin: usize,
    pub signer: &'a dyn Signer,
    pub prev_out_script_type: PrevOutScriptType,
    pub redeem_script: Option<&'a [u8]>,
    /// Defaults to DEFAULT for Taproot and ALL otherwise.
    pub hash_type: Option<u8>,
    /// Value of the spent output; segwit v0 only.
    pub witness_value: Option<u64>,
    pub witness_script: Option<&'a [u8]>,
    pub control_block: Option<&'a [u8]>,
    pub annex: Option<&'a [u8]>,
}

impl<'a> SignRequest<'a> {
    pub fn new(vin: usize, signer: &'a dyn Signer, prev_out_script_type: PrevOutScriptType) -> Self {
        SignRequest {
            vin,
            signer,
            prev_out_script_type,
            redeem_script: None,
            hash_type: None,
            witness_value: None,
            witness_script: None,
            control_block: None,
            annex: None,
        }
    }

    pub fn with_redeem_script(mut self, redeem_script: &'a [u8]) -> Self {
        self.redeem_script = Some(redeem_script);
        self
    }

    pub fn with_hash_type(mut self, hash_type: u8) -> Self {
        self.hash_type = Some(hash_type);
        self
    }

    pub fn with_witness_value(mut self, value: u64) -> Self {
        self.witness_value = Some(value);
        self
    }

    pub fn with_witness_script(mut self, witness_script: &'a [u8]) -> Self {
        self.witness_script = Some(witness_script);
        self
    }

    pub fn with_control_block(mut self, control_block: &'a [u8]) -> Self {
        self.control_block = Some(control_block);
        self
    }

    pub fn with_annex(mut self, annex: &'a [u8]) -> Self {
        self.annex = Some(annex);
        self
    }
}

/// Validate request arguments against the declared spend shape and the
/// input's recorded type.
pub(crate) fn check_sign_args(record: &InputRecord, request: &SignRequest<'_>) -> Result<(), TransactionError> {
    let shape = request.prev_out_script_type;
    let expected = shape.output_type();
    if let Some(recorded) = record.prev_out_type {
        if recorded != expected {
            return Err(TransactionError::InconsistentMetadata(format!(
                "input #{} is not of type {}: {}",
                request.vin, shape, recorded
            )));
        }
    }

    let invalid = |what: &str| -> Result<(), TransactionError> {
        Err(TransactionError::InvalidArgument(format!("{} not allowed for {}", what, shape)))
    };
    let missing = |what: &str| -> Result<(), TransactionError> {
        Err(TransactionError::InvalidArgument(format!("{} required for {}", what, shape)))
    };

    if shape.needs_redeem_script() != request.redeem_script.is_some() {
        return if shape.needs_redeem_script() { missing("redeemScript") } else { invalid("redeemScript") };
    }
    if shape.needs_witness_script() != request.witness_script.is_some() {
        return if shape.needs_witness_script() { missing("witnessScript") } else { invalid("witnessScript") };
    }
    if (shape == PrevOutScriptType::P2trP2ns) != request.control_block.is_some() {
        return if shape == PrevOutScriptType::P2trP2ns { missing("controlBlock") } else { invalid("controlBlock") };
    }
    if !shape.is_taproot() && request.annex.is_some() {
        return invalid("annex");
    }

    if shape.is_taproot() {
        if request.witness_value.is_some() {
            return invalid("witnessValue");
        }
        if record.value.is_none() {
            return missing("prevout value");
        }
    } else if shape.is_segwit() {
        if request.witness_value.is_none() && record.value.is_none() {
            return missing("witnessValue");
        }
    } else if request.witness_value.is_some() {
        return invalid("witnessValue");
    }

    if let Some(hash_type) = request.hash_type {
        let valid = if shape.is_taproot() {
            is_valid_taproot_hash_type(hash_type)
        } else {
            is_defined_hash_type(hash_type)
        };
        if !valid {
            return Err(TransactionError::InvalidArgument(format!(
                "hash type {:#04x} not allowed for {}",
                hash_type, shape
            )));
        }
    }
    Ok(())
}

/// Fail unless the prepared record has the shape the request declared.
///
/// Preparation falls back to P2PKH of the signer's key when nothing else
/// is known, which must not satisfy a segwit or Taproot request.
pub(crate) fn check_prepared_shape(record: &InputRecord, request: &SignRequest<'_>) -> Result<(), TransactionError> {
    let shape = request.prev_out_script_type;
    let sign_type = record.path.as_ref().map(SpendPath::sign_type);
    if record.prev_out_type == Some(shape.output_type())
        && sign_type == Some(shape.sign_type())
        && record.witness_version == shape.witness_version()
    {
        return Ok(());
    }
    Err(TransactionError::InconsistentMetadata(format!(
        "input #{} prepared as {} spend, not {}",
        request.vin,
        describe_path(record),
        shape
    )))
}

fn describe_path(record: &InputRecord) -> String {
    let leaf = record
        .path
        .as_ref()
        .map_or_else(|| "unknown".to_string(), |path| path.sign_type().to_string());
    match record.witness_version {
        Some(version) => format!("{} (witness v{})", leaf, version),
        None => format!("{} (legacy)", leaf),
    }
}

/// Default sighash type for an input's witness version.
pub(crate) fn default_hash_type(witness_version: Option<u8>) -> u8 {
    if witness_version == Some(1) {
        SIGHASH_DEFAULT
    } else {
        SIGHASH_ALL
    }
}

/// Digest the signature for input `vin` commits to.
///
/// Taproot digests need the script and value of every spent output.
pub(crate) fn signing_hash(
    tx: &Transaction,
    records: &[InputRecord],
    vin: usize,
    record: &InputRecord,
    hash_type: u8,
) -> Result<[u8; 32], TransactionError> {
    let sign_script = record
        .sign_script
        .as_deref()
        .ok_or_else(|| TransactionError::SigningState(format!("input #{} has no signing script", vin)))?;

    match record.witness_version {
        None => tx.hash_for_signature(vin, sign_script, hash_type),
        Some(0) => {
            let value = record
                .value
                .ok_or_else(|| TransactionError::SigningState(format!("input #{} has no value", vin)))?;
            tx.hash_for_witness_v0(vin, sign_script, value, hash_type)
        }
        Some(1) => {
            let prevouts = taproot_prevouts(records, vin, record)?;
            let leaf = match &record.path {
                Some(SpendPath::P2trScript {
                    tapscript, control_block, ..
                }) => Some(tap_leaf_hash(control_block, tapscript)?),
                _ => None,
            };
            tx.hash_for_witness_v1(vin, &prevouts, hash_type, leaf.as_ref(), record.annex.as_deref())
        }
        Some(version) => Err(TransactionError::Unsupported(format!("witness version {}", version))),
    }
}

fn taproot_prevouts(
    records: &[InputRecord],
    vin: usize,
    current: &InputRecord,
) -> Result<Vec<TransactionOutput>, TransactionError> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let record = if index == vin { current } else { record };
            match (&record.prev_out_script, record.value) {
                (Some(script), Some(value)) => Ok(TransactionOutput::new(value, Script::from_bytes(script))),
                _ => Err(TransactionError::SigningState(format!(
                    "taproot signing needs the prevout script and value of input #{}",
                    index
                ))),
            }
        })
        .collect()
}

/// Sign every slot held by `signer`'s key.
///
/// Nothing is written unless every matching slot signs.
pub(crate) fn sign_slots(
    record: &mut InputRecord,
    signer: &dyn Signer,
    hash: &[u8; 32],
    hash_type: u8,
    low_r: bool,
) -> Result<(), TransactionError> {
    let taproot = record.witness_version == Some(1);
    let mut our_pubkey = signer.public_key();
    if taproot && our_pubkey.len() == 33 {
        our_pubkey = to_x_only(&our_pubkey).map(|x| x.to_vec()).unwrap_or(our_pubkey);
    }
    let key_path = taproot && !matches!(record.path, Some(SpendPath::P2trScript { .. }));

    let mut produced = Vec::new();
    for (index, slot) in record.slots.iter().enumerate() {
        if slot.pubkey.as_deref() != Some(our_pubkey.as_slice()) {
            continue;
        }
        if slot.is_signed() {
            return Err(TransactionError::SigningState("signature already exists".to_string()));
        }
        match record.witness_version {
            Some(0) if our_pubkey.len() != 33 => {
                return Err(TransactionError::SigningState(
                    "segwit v0 inputs require a compressed public key".to_string(),
                ))
            }
            Some(1) if our_pubkey.len() != 32 => {
                return Err(TransactionError::SigningState(
                    "taproot inputs require a 32-byte public key".to_string(),
                ))
            }
            _ => {}
        }

        let encoded = if taproot {
            let sig = if key_path {
                signer.sign_schnorr_tweaked(hash, None)?
            } else {
                signer.sign_schnorr(hash)?
            };
            encode_schnorr_signature(&sig, hash_type)
        } else {
            let sig = signer.sign_ecdsa(hash, low_r)?;
            encode_ecdsa_signature(&sig, hash_type)?
        };
        trace!(slot = index, "produced signature");
        produced.push((index, encoded));
    }

    if produced.is_empty() {
        return Err(TransactionError::SigningState(
            "key pair cannot sign for this input".to_string(),
        ));
    }
    for (index, signature) in produced {
        record.slots[index].signature = Some(signature);
    }
    Ok(())
}

/// Type label used in "not supported" errors.
pub(crate) fn describe(record: &InputRecord, request: &SignRequest<'_>) -> String {
    record
        .prev_out_type
        .map(|ty: ScriptType| ty.to_string())
        .unwrap_or_else(|| request.prev_out_script_type.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use utxo_primitives::ec::PrivateKey;

    #[test]
    fn test_arg_table() {
        let key = PrivateKey::new();
        let record = InputRecord::default();

        let request = SignRequest::new(0, &key, PrevOutScriptType::P2pkh);
        assert!(check_sign_args(&record, &request).is_ok());

        let request = SignRequest::new(0, &key, PrevOutScriptType::P2pkh).with_witness_value(1);
        assert!(matches!(check_sign_args(&record, &request), Err(TransactionError::InvalidArgument(_))));

        let request = SignRequest::new(0, &key, PrevOutScriptType::P2shP2ms);
        assert!(matches!(check_sign_args(&record, &request), Err(TransactionError::InvalidArgument(_))));

        let request = SignRequest::new(0, &key, PrevOutScriptType::P2wpkh);
        assert!(matches!(check_sign_args(&record, &request), Err(TransactionError::InvalidArgument(_))));

        let request = SignRequest::new(0, &key, PrevOutScriptType::P2wshP2ms)
            .with_witness_script(&[0x51])
            .with_witness_value(10);
        assert!(check_sign_args(&record, &request).is_ok());

        let request = SignRequest::new(0, &key, PrevOutScriptType::P2tr);
        assert!(
            check_sign_args(&record, &request).is_err(),
            "taproot needs the prevout value recorded at add_input"
        );
    }

    #[test]
    fn test_arg_recorded_type_mismatch() {
        let key = PrivateKey::new();
        let record = InputRecord {
            prev_out_type: Some(ScriptType::P2wpkh),
            ..Default::default()
        };
        let request = SignRequest::new(0, &key, PrevOutScriptType::P2pkh);
        assert!(matches!(
            check_sign_args(&record, &request),
            Err(TransactionError::InconsistentMetadata(_))
        ));
    }

    #[test]
    fn test_taproot_hash_types() {
        let key = PrivateKey::new();
        let record = InputRecord {
            value: Some(1000),
            ..Default::default()
        };
        let request = SignRequest::new(0, &key, PrevOutScriptType::P2tr).with_hash_type(SIGHASH_DEFAULT);
        assert!(check_sign_args(&record, &request).is_ok());
        let request = SignRequest::new(0, &key, PrevOutScriptType::P2pkh).with_hash_type(SIGHASH_DEFAULT);
        assert!(check_sign_args(&record, &request).is_err());
    }

    #[test]
    fn test_default_hash_type() {
        assert_eq!(default_hash_type(Some(1)), SIGHASH_DEFAULT);
        assert_eq!(default_hash_type(Some(0)), SIGHASH_ALL);
        assert_eq!(default_hash_type(None), SIGHASH_ALL);
    }
}
