//! Transaction output with a value and a scriptPubKey.

use utxo_primitives::util::{Reader, Writer};
use utxo_script::Script;

use crate::TransactionError;

/// A single transaction output.
///
/// # Wire format
///
/// | Field         | Size         |
/// |---------------|--------------|
/// | value         | 8 bytes (LE) |
/// | script length | VarInt       |
/// | script_pubkey | variable     |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionOutput {
    /// Amount in satoshis.
    pub value: u64,

    /// The locking script.
    pub script_pubkey: Script,
}

impl TransactionOutput {
    /// Create an output paying `value` to `script_pubkey`.
    pub fn new(value: u64, script_pubkey: Script) -> Self {
        TransactionOutput { value, script_pubkey }
    }

    /// Deserialize an output from a `Reader`.
    pub fn read_from(reader: &mut Reader) -> Result<Self, TransactionError> {
        let value = reader.read_u64_le().map_err(|e| {
            TransactionError::Serialization(format!("reading value: {}", e))
        })?;

        let script_bytes = reader.read_var_bytes().map_err(|e| {
            TransactionError::Serialization(format!("reading scriptPubKey: {}", e))
        })?;

        Ok(TransactionOutput {
            value,
            script_pubkey: Script::from_bytes(script_bytes),
        })
    }

    /// Serialize this output into a `Writer`.
    pub fn write_to(&self, writer: &mut Writer) {
        writer.write_u64_le(self.value);
        writer.write_var_bytes(self.script_pubkey.to_bytes());
    }

    /// Serialize this output to a byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        self.write_to(&mut writer);
        writer.into_bytes()
    }
}
