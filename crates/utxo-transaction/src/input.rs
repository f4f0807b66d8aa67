//! Transaction input referencing a previous output.
//!
//! Contains the outpoint being spent, the scriptSig, the sequence number
//! and the segwit witness stack. Provides binary serialization following
//! the Bitcoin wire format; witnesses are encoded separately by the
//! transaction since they trail all outputs.

use utxo_primitives::util::{Reader, VarInt, Writer};
use utxo_script::Script;

use crate::TransactionError;

/// Default sequence number indicating a finalized input (no relative lock-time).
pub const DEFAULT_SEQUENCE_NUMBER: u32 = 0xFFFF_FFFF;

/// A single transaction input.
///
/// # Wire format (without witness)
///
/// | Field         | Size          |
/// |---------------|---------------|
/// | txid          | 32 bytes (LE) |
/// | vout          | 4 bytes (LE)  |
/// | script length | VarInt        |
/// | script_sig    | variable      |
/// | sequence      | 4 bytes (LE)  |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionInput {
    /// The 32-byte transaction ID of the output being spent, in internal
    /// (little-endian) byte order.
    pub txid: [u8; 32],

    /// Index of the output within the source transaction.
    pub vout: u32,

    /// Sequence number. Defaults to `0xFFFFFFFF` (finalized).
    pub sequence: u32,

    /// The unlocking script. Empty until the input is signed or for
    /// native segwit spends.
    pub script_sig: Script,

    /// Witness stack items. Empty for legacy spends.
    pub witness: Vec<Vec<u8>>,
}

impl TransactionInput {
    /// Create an unsigned input spending `txid:vout`.
    ///
    /// # Arguments
    /// * `txid` - Previous transaction ID in internal byte order.
    /// * `vout` - Output index being spent.
    /// * `sequence` - Sequence number, or `None` for the finalized default.
    pub fn new(txid: [u8; 32], vout: u32, sequence: Option<u32>) -> Self {
        TransactionInput {
            txid,
            vout,
            sequence: sequence.unwrap_or(DEFAULT_SEQUENCE_NUMBER),
            script_sig: Script::new(),
            witness: Vec::new(),
        }
    }

    /// Whether `txid` is the all-zero hash referenced by coinbase inputs.
    pub fn is_coinbase_hash(txid: &[u8; 32]) -> bool {
        txid.iter().all(|b| *b == 0)
    }

    /// The outpoint as `<display txid>:<vout>`.
    pub fn outpoint(&self) -> String {
        let mut id = self.txid;
        id.reverse();
        format!("{}:{}", hex::encode(id), self.vout)
    }

    /// Deserialize an input (without its witness) from a `Reader`.
    ///
    /// # Returns
    /// `Ok(TransactionInput)` on success, or a `TransactionError` if the
    /// data is truncated or malformed.
    pub fn read_from(reader: &mut Reader) -> Result<Self, TransactionError> {
        let txid = reader.read_array::<32>().map_err(|e| {
            TransactionError::Serialization(format!("reading source txid: {}", e))
        })?;

        let vout = reader.read_u32_le().map_err(|e| {
            TransactionError::Serialization(format!("reading output index: {}", e))
        })?;

        let script_bytes = reader.read_var_bytes().map_err(|e| {
            TransactionError::Serialization(format!("reading scriptSig: {}", e))
        })?;

        let sequence = reader.read_u32_le().map_err(|e| {
            TransactionError::Serialization(format!("reading sequence number: {}", e))
        })?;

        Ok(TransactionInput {
            txid,
            vout,
            sequence,
            script_sig: Script::from_bytes(script_bytes),
            witness: Vec::new(),
        })
    }

    /// Serialize this input (without its witness) into a `Writer`.
    pub fn write_to(&self, writer: &mut Writer) {
        writer.write_bytes(&self.txid);
        writer.write_u32_le(self.vout);
        writer.write_var_bytes(self.script_sig.to_bytes());
        writer.write_u32_le(self.sequence);
    }

    /// Read a witness stack into this input.
    pub fn read_witness(&mut self, reader: &mut Reader) -> Result<(), TransactionError> {
        let count = reader.read_varint().map_err(|e| {
            TransactionError::Serialization(format!("reading witness count: {}", e))
        })?;
        let mut witness = Vec::new();
        for _ in 0..count.value() {
            let item = reader.read_var_bytes().map_err(|e| {
                TransactionError::Serialization(format!("reading witness item: {}", e))
            })?;
            witness.push(item.to_vec());
        }
        self.witness = witness;
        Ok(())
    }

    /// Serialize this input's witness stack.
    pub fn write_witness(&self, writer: &mut Writer) {
        writer.write_varint(VarInt::from(self.witness.len()));
        for item in &self.witness {
            writer.write_var_bytes(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_roundtrip() {
        let mut input = TransactionInput::new([7u8; 32], 3, Some(0xfffffffd));
        input.script_sig = Script::from_bytes(&[0x51]);
        let mut writer = Writer::new();
        input.write_to(&mut writer);
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), 32 + 4 + 1 + 1 + 4);

        let mut reader = Reader::new(&bytes);
        let decoded = TransactionInput::read_from(&mut reader).expect("decode");
        assert_eq!(decoded, input);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_outpoint_is_display_order() {
        let mut txid = [0u8; 32];
        txid[0] = 0xab;
        let input = TransactionInput::new(txid, 1, None);
        assert!(input.outpoint().ends_with("ab:1"));
        assert_eq!(input.sequence, DEFAULT_SEQUENCE_NUMBER);
        assert!(TransactionInput::is_coinbase_hash(&[0u8; 32]));
    }
}
