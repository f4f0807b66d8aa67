//! Script chunk parsing and encoding.
//!
//! A script chunk is either an opcode or a data push with its associated
//! bytes. This module decompiles raw script bytes into chunks, compiles
//! chunks back with minimal push encoding, and converts between push-only
//! scripts and witness stacks.

use crate::opcodes::*;
use crate::ScriptError;

/// A single parsed element of a script.
///
/// Each chunk is either a standalone opcode (like OP_DUP) or a data push
/// that carries the opcode byte and the pushed data bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptChunk {
    /// The opcode byte. For direct pushes (1-75 bytes), this is the length.
    pub op: u8,
    /// The data payload, if this chunk is a push operation.
    pub data: Option<Vec<u8>>,
}

impl ScriptChunk {
    /// A bare opcode chunk.
    pub fn op(op: u8) -> Self {
        ScriptChunk { op, data: None }
    }

    /// A data push chunk using the minimal encoding for `data`.
    ///
    /// Empty data becomes OP_0, single bytes 1..=16 become OP_1..OP_16 and
    /// 0x81 becomes OP_1NEGATE, matching how a witness item is re-encoded
    /// as a scriptSig push.
    pub fn push(data: &[u8]) -> Self {
        match data {
            [] => ScriptChunk::op(OP_0),
            [n @ 1..=16] => ScriptChunk::op(OP_1 + *n - 1),
            [0x81] => ScriptChunk::op(OP_1NEGATE),
            _ => {
                let op = match data.len() {
                    len if len <= OP_DATA_75 as usize => len as u8,
                    len if len <= 0xff => OP_PUSHDATA1,
                    len if len <= 0xffff => OP_PUSHDATA2,
                    _ => OP_PUSHDATA4,
                };
                ScriptChunk { op, data: Some(data.to_vec()) }
            }
        }
    }

    /// Whether this chunk only pushes a value onto the stack.
    pub fn is_push(&self) -> bool {
        self.data.is_some() || self.op == OP_0 || self.op == OP_1NEGATE || (OP_1..=OP_16).contains(&self.op)
    }

    /// The pushed data, if any.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// The stack item this chunk produces when executed, for push chunks.
    pub fn to_stack_item(&self) -> Option<Vec<u8>> {
        if let Some(data) = &self.data {
            return Some(data.clone());
        }
        match self.op {
            OP_0 => Some(Vec::new()),
            OP_1NEGATE => Some(vec![0x81]),
            OP_1..=OP_16 => Some(vec![self.op - OP_1 + 1]),
            _ => None,
        }
    }

    /// Serialize this chunk exactly as written, keeping its original push opcode.
    pub fn to_bytes(&self) -> Vec<u8> {
        let Some(data) = &self.data else {
            return vec![self.op];
        };
        let mut out = vec![self.op];
        match self.op {
            OP_PUSHDATA1 => out.push(data.len() as u8),
            OP_PUSHDATA2 => out.extend_from_slice(&(data.len() as u16).to_le_bytes()),
            OP_PUSHDATA4 => out.extend_from_slice(&(data.len() as u32).to_le_bytes()),
            _ => {}
        }
        out.extend_from_slice(data);
        out
    }

    /// Convert this chunk to its ASM string representation.
    pub fn to_asm_string(&self) -> String {
        match &self.data {
            Some(data) => hex::encode(data),
            None => opcode_to_string(self.op).to_string(),
        }
    }
}

/// Decode raw script bytes into a vector of `ScriptChunk` values.
///
/// # Arguments
/// * `bytes` - The raw script bytes to decode.
///
/// # Returns
/// A vector of parsed chunks, or `DataTooSmall` if a push is truncated.
pub fn decode_script(bytes: &[u8]) -> Result<Vec<ScriptChunk>, ScriptError> {
    let mut chunks = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let op = bytes[pos];
        let (header, length) = match op {
            OP_DATA_1..=OP_DATA_75 => (1, op as usize),
            OP_PUSHDATA1 => {
                let raw = bytes.get(pos + 1..pos + 2).ok_or(ScriptError::DataTooSmall)?;
                (2, raw[0] as usize)
            }
            OP_PUSHDATA2 => {
                let raw = bytes.get(pos + 1..pos + 3).ok_or(ScriptError::DataTooSmall)?;
                (3, u16::from_le_bytes([raw[0], raw[1]]) as usize)
            }
            OP_PUSHDATA4 => {
                let raw = bytes.get(pos + 1..pos + 5).ok_or(ScriptError::DataTooSmall)?;
                (5, u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize)
            }
            _ => {
                chunks.push(ScriptChunk::op(op));
                pos += 1;
                continue;
            }
        };
        let start = pos + header;
        let data = bytes
            .get(start..start + length)
            .ok_or(ScriptError::DataTooSmall)?;
        chunks.push(ScriptChunk { op, data: Some(data.to_vec()) });
        pos = start + length;
    }

    Ok(chunks)
}

/// Encode chunks back into raw script bytes.
///
/// Push chunks are re-encoded with the minimal prefix for their data.
pub fn encode_chunks(chunks: &[ScriptChunk]) -> Result<Vec<u8>, ScriptError> {
    let mut out = Vec::new();
    for chunk in chunks {
        match &chunk.data {
            Some(data) => {
                let minimal = ScriptChunk::push(data);
                match minimal.data {
                    Some(_) => {
                        out.extend_from_slice(&push_data_prefix(data.len())?);
                        out.extend_from_slice(data);
                    }
                    None => out.push(minimal.op),
                }
            }
            None => out.push(chunk.op),
        }
    }
    Ok(out)
}

/// Compute the OP_PUSHDATA prefix bytes for a data payload of the given length.
///
/// # Returns
/// The prefix to prepend to the data, or `DataTooBig` if the length does
/// not fit in OP_PUSHDATA4.
pub fn push_data_prefix(data_len: usize) -> Result<Vec<u8>, ScriptError> {
    if data_len <= OP_DATA_75 as usize {
        Ok(vec![data_len as u8])
    } else if data_len <= 0xff {
        Ok(vec![OP_PUSHDATA1, data_len as u8])
    } else if data_len <= 0xffff {
        let mut buf = vec![OP_PUSHDATA2];
        buf.extend_from_slice(&(data_len as u16).to_le_bytes());
        Ok(buf)
    } else if data_len <= 0xffff_ffff {
        let mut buf = vec![OP_PUSHDATA4];
        buf.extend_from_slice(&(data_len as u32).to_le_bytes());
        Ok(buf)
    } else {
        Err(ScriptError::DataTooBig)
    }
}

/// Compile stack items into a push-only script.
pub fn compile_stack(items: &[Vec<u8>]) -> Result<Vec<u8>, ScriptError> {
    let chunks: Vec<ScriptChunk> = items.iter().map(|item| ScriptChunk::push(item)).collect();
    encode_chunks(&chunks)
}

/// Convert a push-only script into the stack items it would produce.
///
/// # Returns
/// The items in push order, or `NotPushOnly` if any chunk executes an
/// opcode other than a push.
pub fn script_to_stack(bytes: &[u8]) -> Result<Vec<Vec<u8>>, ScriptError> {
    decode_script(bytes)?
        .iter()
        .map(|chunk| chunk.to_stack_item().ok_or(ScriptError::NotPushOnly))
        .collect()
}
