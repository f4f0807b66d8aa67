//! Incremental transaction builder.
//!
//! A [`TransactionBuilder`] accumulates inputs and outputs, signs inputs one
//! key at a time and assembles the final scriptSigs and witnesses. Each
//! input's progress lives in an [`InputRecord`]; signing never disturbs
//! another input, and a failed call leaves the session unchanged.
//!
//! Supported spends: P2PKH, P2PK, P2WPKH, bare multisig, P2SH and P2WSH
//! wrappings of those (including P2SH-P2WSH), Taproot key path and Taproot
//! N-of-N script path.

mod assemble;
mod expand;
mod guards;
mod prepare;
mod record;
mod reorder;
mod sign;

pub use record::{InputRecord, KeySlot, PrevOutScriptType, SpendPath, ALL_PREV_OUT_SCRIPT_TYPES};
pub use sign::SignRequest;

use std::collections::HashSet;

use tracing::{debug, trace, warn};
use utxo_script::{Script, ScriptType};

use crate::config::BuilderConfig;
use crate::input::TransactionInput;
use crate::output::TransactionOutput;
use crate::transaction::Transaction;
use crate::TransactionError;

use assemble::assemble;
use expand::{expand_output, expand_spend};
use prepare::{prepare_input, PrepareScripts};

/// Version given to new sessions.
pub const DEFAULT_TX_VERSION: u32 = 2;

/// A signing session for one transaction.
#[derive(Clone, Debug)]
pub struct TransactionBuilder {
    config: BuilderConfig,
    tx: Transaction,
    inputs: Vec<InputRecord>,
    outpoints: HashSet<String>,
}

/// Optional data attached to a new input.
#[derive(Clone, Debug, Default)]
struct InputOptions {
    sequence: Option<u32>,
    script_sig: Script,
    witness: Vec<Vec<u8>>,
    prev_out_script: Option<Vec<u8>>,
    value: Option<u64>,
}

impl TransactionBuilder {
    /// Start an empty session: version 2, locktime 0.
    pub fn new(config: BuilderConfig) -> Result<Self, TransactionError> {
        config.validate()?;
        let mut tx = Transaction::new();
        tx.version = DEFAULT_TX_VERSION;
        Ok(TransactionBuilder {
            config,
            tx,
            inputs: Vec::new(),
            outpoints: HashSet::new(),
        })
    }

    /// Rebuild a session from a (possibly partially signed) transaction.
    ///
    /// # Arguments
    /// * `tx` - The transaction to resume.
    /// * `prev_outputs` - The spent outputs, one per input, when known. They
    ///   supply values for segwit inputs and keys for bare multisig.
    /// * `config` - Session configuration.
    ///
    /// # Returns
    /// The session, with recovered multisig signatures bound to their keys.
    pub fn from_transaction(
        tx: &Transaction,
        prev_outputs: Option<&[TransactionOutput]>,
        config: BuilderConfig,
    ) -> Result<Self, TransactionError> {
        if let Some(prev_outputs) = prev_outputs {
            if prev_outputs.len() != tx.inputs.len() {
                return Err(TransactionError::InvalidArgument(format!(
                    "{} prevouts given for {} inputs",
                    prev_outputs.len(),
                    tx.inputs.len()
                )));
            }
        }

        let mut builder = TransactionBuilder::new(config)?;
        builder.tx.version = tx.version;
        builder.tx.lock_time = tx.lock_time;

        for output in &tx.outputs {
            builder.add_output(output.script_pubkey.clone(), output.value)?;
        }
        for (index, input) in tx.inputs.iter().enumerate() {
            let prev_out = prev_outputs.map(|outputs| &outputs[index]);
            builder.add_input_unchecked(
                input.txid,
                input.vout,
                InputOptions {
                    sequence: Some(input.sequence),
                    script_sig: input.script_sig.clone(),
                    witness: input.witness.clone(),
                    prev_out_script: prev_out.map(|output| output.script_pubkey.to_bytes().to_vec()),
                    value: prev_out.map(|output| output.value),
                },
            )?;
        }

        for (vin, record) in builder.inputs.iter_mut().enumerate() {
            reorder::fix_multisig_order(&builder.tx, vin, record)?;
        }
        Ok(builder)
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Signing state of every input, by index.
    pub fn inputs(&self) -> &[InputRecord] {
        &self.inputs
    }

    /// The unsigned transaction being assembled.
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn set_version(&mut self, version: u32) {
        self.tx.version = version;
    }

    /// Set the locktime. Rejected once any input is signed.
    pub fn set_lock_time(&mut self, lock_time: u32) -> Result<(), TransactionError> {
        if guards::has_any_signature(&self.inputs) {
            return Err(TransactionError::MutationInvalidation(
                "locktime is committed to by existing signatures".to_string(),
            ));
        }
        self.tx.lock_time = lock_time;
        Ok(())
    }

    pub fn set_low_r(&mut self, low_r: bool) {
        self.config.low_r = low_r;
    }

    /// Add an input spending `txid:vout`.
    ///
    /// # Arguments
    /// * `txid` - The previous transaction id in internal byte order.
    /// * `vout` - The output index being spent.
    /// * `sequence` - Defaults to `0xffffffff`.
    /// * `prev_out_script` - The spent locking script, if known.
    /// * `value` - The spent value; required later for segwit and Taproot signing.
    ///
    /// # Returns
    /// The new input's index.
    pub fn add_input(
        &mut self,
        txid: [u8; 32],
        vout: u32,
        sequence: Option<u32>,
        prev_out_script: Option<&Script>,
        value: Option<u64>,
    ) -> Result<usize, TransactionError> {
        if !guards::can_modify_inputs(&self.inputs) {
            return Err(TransactionError::MutationInvalidation(
                "adding an input would invalidate existing signatures".to_string(),
            ));
        }
        self.add_input_unchecked(
            txid,
            vout,
            InputOptions {
                sequence,
                prev_out_script: prev_out_script.map(|script| script.to_bytes().to_vec()),
                value,
                ..Default::default()
            },
        )
    }

    /// Add an input by display-order (reversed hex) transaction id.
    pub fn add_input_hex(
        &mut self,
        txid_hex: &str,
        vout: u32,
        sequence: Option<u32>,
        prev_out_script: Option<&Script>,
        value: Option<u64>,
    ) -> Result<usize, TransactionError> {
        let bytes = hex::decode(txid_hex).map_err(|e| TransactionError::InvalidArgument(format!("txid: {}", e)))?;
        let mut txid: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TransactionError::InvalidArgument("txid must be 32 bytes".to_string()))?;
        txid.reverse();
        self.add_input(txid, vout, sequence, prev_out_script, value)
    }

    /// Add an input spending output `vout` of `prev_tx`, taking its script
    /// and value from there.
    pub fn add_input_from_transaction(
        &mut self,
        prev_tx: &Transaction,
        vout: u32,
        sequence: Option<u32>,
    ) -> Result<usize, TransactionError> {
        let output = prev_tx.outputs.get(vout as usize).ok_or_else(|| {
            TransactionError::InvalidArgument(format!(
                "output {} out of range (tx has {} outputs)",
                vout,
                prev_tx.outputs.len()
            ))
        })?;
        let script = output.script_pubkey.clone();
        let value = output.value;
        self.add_input(prev_tx.tx_id(), vout, sequence, Some(&script), Some(value))
    }

    fn add_input_unchecked(&mut self, txid: [u8; 32], vout: u32, options: InputOptions) -> Result<usize, TransactionError> {
        if TransactionInput::is_coinbase_hash(&txid) {
            return Err(TransactionError::InvalidArgument("coinbase inputs not supported".to_string()));
        }
        let mut input = TransactionInput::new(txid, vout, options.sequence);
        let outpoint = input.outpoint();
        if self.outpoints.contains(&outpoint) {
            return Err(TransactionError::InvalidArgument(format!("duplicate outpoint {}", outpoint)));
        }

        let mut record = InputRecord {
            value: options.value,
            ..Default::default()
        };
        let expanded = expand_spend(
            options.script_sig.to_bytes(),
            &options.witness,
            options.prev_out_script.as_deref(),
        )?;
        record.prev_out_script = expanded.prev_out_script;
        record.max_signatures = expanded.max_signatures;
        record.annex = expanded.annex;
        if let Some(path) = expanded.path {
            record.set_path(path);
        }
        record.bind_slots(expanded.pubkeys, expanded.signatures);

        if let Some(prev_out_script) = options.prev_out_script {
            let known = expand_output(&prev_out_script, None)?;
            if record.prev_out_script.is_none() {
                record.prev_out_script = Some(prev_out_script.clone());
            }
            if record.prev_out_type.is_none() {
                record.prev_out_type = Some(known.script_type);
            }
            if record.slots.is_empty() {
                if let Some(slots) = known.slots {
                    record.slots = slots;
                    record.max_signatures = known.max_signatures;
                }
            }
        }

        input.script_sig = options.script_sig;
        input.witness = options.witness;
        let vin = self.tx.add_input(input);
        self.inputs.push(record);
        self.outpoints.insert(outpoint.clone());
        debug!(vin, %outpoint, "added input");
        Ok(vin)
    }

    /// Append an output paying `value` to `script`.
    pub fn add_output(&mut self, script: Script, value: u64) -> Result<usize, TransactionError> {
        if !guards::can_modify_outputs(&self.inputs, self.tx.inputs.len(), self.tx.outputs.len()) {
            return Err(TransactionError::MutationInvalidation(
                "adding an output would invalidate existing signatures".to_string(),
            ));
        }
        let index = self.tx.add_output(TransactionOutput::new(value, script));
        debug!(index, value, "added output");
        Ok(index)
    }

    /// Add one signature to one input.
    ///
    /// The input is prepared from the request's scripts the first time it
    /// is signed. Every slot held by the signer's key is signed. On error
    /// the session is left unchanged.
    pub fn sign(&mut self, request: SignRequest<'_>) -> Result<(), TransactionError> {
        let vin = request.vin;
        let Some(current) = self.inputs.get(vin) else {
            return Err(TransactionError::InvalidArgument(format!("no input at index {}", vin)));
        };
        sign::check_sign_args(current, &request)?;

        if let (Some(recorded), Some(requested)) = (
            current.path.as_ref().and_then(SpendPath::redeem_script),
            request.redeem_script,
        ) {
            if recorded != requested {
                return Err(TransactionError::InconsistentMetadata(
                    "inconsistent redeem script".to_string(),
                ));
            }
        }

        let mut record = current.clone();
        let our_pubkey = request.signer.public_key();
        if !record.can_sign() {
            if let Some(witness_value) = request.witness_value {
                if record.value.map_or(false, |value| value != witness_value) {
                    return Err(TransactionError::InconsistentMetadata(
                        "input value does not match witness value".to_string(),
                    ));
                }
                record.value = Some(witness_value);
            }
            if !record.can_sign() {
                record = prepare_input(
                    &record,
                    &our_pubkey,
                    PrepareScripts {
                        redeem_script: request.redeem_script,
                        witness_script: request.witness_script,
                        control_block: request.control_block,
                        annex: request.annex,
                    },
                )?;
            }
            if !record.can_sign() {
                return Err(TransactionError::Unsupported(format!(
                    "{} not supported",
                    sign::describe(&record, &request)
                )));
            }
        }
        sign::check_prepared_shape(&record, &request)?;

        let hash_type = request
            .hash_type
            .unwrap_or_else(|| sign::default_hash_type(record.witness_version));
        if guards::needs_outputs(&self.inputs, self.tx.outputs.len(), hash_type) {
            return Err(TransactionError::SigningState(
                "transaction needs outputs".to_string(),
            ));
        }

        let hash = sign::signing_hash(&self.tx, &self.inputs, vin, &record, hash_type)?;
        sign::sign_slots(&mut record, request.signer, &hash, hash_type, self.config.low_r)?;

        debug!(vin, hash_type, prev_out_type = %sign::describe(&record, &request), "signed input");
        self.inputs[vin] = record;
        Ok(())
    }

    /// Assemble the final transaction.
    ///
    /// Every input must be fully signed and the fee rate must not exceed
    /// the configured ceiling.
    pub fn build(&self) -> Result<Transaction, TransactionError> {
        self.build_internal(false)
    }

    /// Assemble whatever is signed so far. Missing multisig signatures are
    /// filled with `OP_0` placeholders; inputs that cannot be assembled
    /// keep their current scripts. No fee check.
    pub fn build_incomplete(&self) -> Result<Transaction, TransactionError> {
        self.build_internal(true)
    }

    fn build_internal(&self, allow_incomplete: bool) -> Result<Transaction, TransactionError> {
        if !allow_incomplete {
            if self.tx.inputs.is_empty() {
                return Err(TransactionError::BuildIncomplete("transaction has no inputs".to_string()));
            }
            if self.tx.outputs.is_empty() {
                return Err(TransactionError::BuildIncomplete("transaction has no outputs".to_string()));
            }
        }

        let mut tx = self.tx.clone();
        for (vin, record) in self.inputs.iter().enumerate() {
            let Some(path) = &record.path else {
                if allow_incomplete {
                    trace!(vin, "skipping input without a known type");
                    continue;
                }
                return Err(TransactionError::BuildIncomplete(format!("input #{} has no known type", vin)));
            };
            match assemble(path, record, allow_incomplete)? {
                Some(assembled) => {
                    if let Some(script_sig) = assembled.script_sig {
                        tx.inputs[vin].script_sig = Script::from(script_sig);
                    }
                    tx.inputs[vin].witness = assembled.witness;
                }
                None if allow_incomplete => trace!(vin, "skipping unassembled input"),
                None if path.sign_type() == ScriptType::NonStandard => {
                    return Err(TransactionError::Unsupported(format!("input #{} has an unknown type", vin)));
                }
                None => {
                    return Err(TransactionError::BuildIncomplete(format!(
                        "input #{} does not have enough information",
                        vin
                    )))
                }
            }
        }

        if !allow_incomplete {
            if let Err(err) = guards::check_fee_rate(&self.inputs, &tx, self.config.maximum_fee_rate) {
                warn!(error = %err, "rejecting build");
                return Err(err);
            }
        }
        debug!(
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            complete = !allow_incomplete,
            "built transaction"
        );
        Ok(tx)
    }
}
