//! Core transaction type.
//!
//! Represents a transaction with version, inputs, outputs, witnesses and
//! locktime. Supports the legacy and BIP144 segwit wire formats, txid and
//! weight computation, and the three signature hash algorithms.

use utxo_primitives::hash::sha256d;
use utxo_primitives::util::{Reader, VarInt, Writer};

use crate::input::TransactionInput;
use crate::output::TransactionOutput;
use crate::sighash;
use crate::TransactionError;

const SEGWIT_MARKER: u8 = 0x00;
const SEGWIT_FLAG: u8 = 0x01;
const WITNESS_SCALE_FACTOR: usize = 4;

/// A transaction consisting of a version, a set of inputs, a set of
/// outputs, and a lock time.
///
/// # Wire format
///
/// | Field          | Size                      |
/// |----------------|---------------------------|
/// | version        | 4 bytes (LE)              |
/// | marker, flag   | 2 bytes, segwit only      |
/// | input count    | VarInt                    |
/// | inputs         | variable (per input)      |
/// | output count   | VarInt                    |
/// | outputs        | variable (per output)     |
/// | witnesses      | per input, segwit only    |
/// | lock_time      | 4 bytes (LE)              |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Transaction format version.
    pub version: u32,

    /// Ordered list of transaction inputs.
    pub inputs: Vec<TransactionInput>,

    /// Ordered list of transaction outputs.
    pub outputs: Vec<TransactionOutput>,

    /// Lock time. If non-zero, the transaction is not valid until the
    /// specified block height or Unix timestamp.
    pub lock_time: u32,
}

impl Transaction {
    /// Create a new empty transaction with version 1 and lock time 0.
    pub fn new() -> Self {
        Transaction {
            version: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }

    // -----------------------------------------------------------------
    // Deserialization
    // -----------------------------------------------------------------

    /// Parse a transaction from a hex-encoded string.
    pub fn from_hex(hex_str: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(hex_str).map_err(|e| {
            TransactionError::Serialization(format!("invalid hex: {}", e))
        })?;
        Self::from_bytes(&bytes)
    }

    /// Parse a transaction from raw bytes.
    ///
    /// This method requires the byte slice to contain exactly one complete
    /// transaction with no trailing data.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut reader = Reader::new(bytes);
        let tx = Self::read_from(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(TransactionError::Serialization(
                format!("trailing {} bytes after transaction", reader.remaining()),
            ));
        }
        Ok(tx)
    }

    /// Deserialize a transaction from a `Reader`, detecting the segwit
    /// marker and flag.
    pub fn read_from(reader: &mut Reader) -> Result<Self, TransactionError> {
        let version = reader.read_u32_le().map_err(|e| {
            TransactionError::Serialization(format!("reading version: {}", e))
        })?;

        let mut has_witnesses = false;
        if reader.peek_u8() == Some(SEGWIT_MARKER) {
            reader.read_u8().map_err(|e| {
                TransactionError::Serialization(format!("reading segwit marker: {}", e))
            })?;
            let flag = reader.read_u8().map_err(|e| {
                TransactionError::Serialization(format!("reading segwit flag: {}", e))
            })?;
            if flag != SEGWIT_FLAG {
                return Err(TransactionError::Serialization(format!(
                    "unsupported segwit flag 0x{:02x}",
                    flag
                )));
            }
            has_witnesses = true;
        }

        let input_count = reader.read_varint().map_err(|e| {
            TransactionError::Serialization(format!("reading input count: {}", e))
        })?;
        let mut inputs = Vec::new();
        for _ in 0..input_count.value() {
            inputs.push(TransactionInput::read_from(reader)?);
        }

        let output_count = reader.read_varint().map_err(|e| {
            TransactionError::Serialization(format!("reading output count: {}", e))
        })?;
        let mut outputs = Vec::new();
        for _ in 0..output_count.value() {
            outputs.push(TransactionOutput::read_from(reader)?);
        }

        if has_witnesses {
            for input in &mut inputs {
                input.read_witness(reader)?;
            }
            if inputs.iter().all(|input| input.witness.is_empty()) {
                return Err(TransactionError::Serialization(
                    "segwit transaction without witness data".to_string(),
                ));
            }
        }

        let lock_time = reader.read_u32_le().map_err(|e| {
            TransactionError::Serialization(format!("reading lock time: {}", e))
        })?;

        Ok(Transaction {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    // -----------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------

    fn serialize(&self, with_witness: bool) -> Vec<u8> {
        let with_witness = with_witness && self.has_witness();
        let mut writer = Writer::with_capacity(256);
        writer.write_u32_le(self.version);
        if with_witness {
            writer.write_u8(SEGWIT_MARKER);
            writer.write_u8(SEGWIT_FLAG);
        }

        writer.write_varint(VarInt::from(self.inputs.len()));
        for input in &self.inputs {
            input.write_to(&mut writer);
        }

        writer.write_varint(VarInt::from(self.outputs.len()));
        for output in &self.outputs {
            output.write_to(&mut writer);
        }

        if with_witness {
            for input in &self.inputs {
                input.write_witness(&mut writer);
            }
        }

        writer.write_u32_le(self.lock_time);
        writer.into_bytes()
    }

    /// Serialize this transaction, including witnesses when any input has one.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.serialize(true)
    }

    /// Serialize this transaction in the legacy format, without witnesses.
    pub fn to_bytes_no_witness(&self) -> Vec<u8> {
        self.serialize(false)
    }

    /// Serialize this transaction to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Whether any input carries witness data.
    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    // -----------------------------------------------------------------
    // Transaction ID and size
    // -----------------------------------------------------------------

    /// Compute the transaction ID (double SHA-256 of the witness-stripped
    /// serialization), in internal byte order.
    pub fn tx_id(&self) -> [u8; 32] {
        sha256d(&self.to_bytes_no_witness())
    }

    /// Compute the transaction ID as a display (byte-reversed) hex string.
    pub fn tx_id_hex(&self) -> String {
        let mut id = self.tx_id();
        id.reverse();
        hex::encode(id)
    }

    /// Transaction weight: three times the base size plus the total size.
    pub fn weight(&self) -> usize {
        let base = self.to_bytes_no_witness().len();
        let total = self.to_bytes().len();
        base * (WITNESS_SCALE_FACTOR - 1) + total
    }

    /// Virtual size in vbytes, rounded up.
    pub fn virtual_size(&self) -> usize {
        (self.weight() + WITNESS_SCALE_FACTOR - 1) / WITNESS_SCALE_FACTOR
    }

    /// Return the size of the full serialization in bytes.
    pub fn size(&self) -> usize {
        self.to_bytes().len()
    }

    // -----------------------------------------------------------------
    // Inputs and outputs
    // -----------------------------------------------------------------

    /// Append an input and return its index.
    pub fn add_input(&mut self, input: TransactionInput) -> usize {
        self.inputs.push(input);
        self.inputs.len() - 1
    }

    /// Append an output and return its index.
    pub fn add_output(&mut self, output: TransactionOutput) -> usize {
        self.outputs.push(output);
        self.outputs.len() - 1
    }

    /// Compute the sum of all output values.
    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }

    /// Whether this is a coinbase transaction: a single input spending the
    /// all-zero hash.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && TransactionInput::is_coinbase_hash(&self.inputs[0].txid)
    }

    // -----------------------------------------------------------------
    // Signature hashes
    // -----------------------------------------------------------------

    /// Legacy signature hash. See [`sighash::legacy`].
    pub fn hash_for_signature(
        &self,
        input_index: usize,
        script_code: &[u8],
        hash_type: u8,
    ) -> Result<[u8; 32], TransactionError> {
        sighash::legacy::signature_hash(self, input_index, script_code, hash_type)
    }

    /// BIP143 segwit v0 signature hash. See [`sighash::v0`].
    pub fn hash_for_witness_v0(
        &self,
        input_index: usize,
        script_code: &[u8],
        value: u64,
        hash_type: u8,
    ) -> Result<[u8; 32], TransactionError> {
        sighash::v0::signature_hash(self, input_index, script_code, value, hash_type)
    }

    /// BIP341 Taproot signature hash. See [`sighash::v1`].
    pub fn hash_for_witness_v1(
        &self,
        input_index: usize,
        prevouts: &[TransactionOutput],
        hash_type: u8,
        leaf_hash: Option<&[u8; 32]>,
        annex: Option<&[u8]>,
    ) -> Result<[u8; 32], TransactionError> {
        sighash::v1::signature_hash(self, input_index, prevouts, hash_type, leaf_hash, annex)
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Transaction {
    /// Display the transaction as its hex-encoded serialization.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
