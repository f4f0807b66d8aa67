//! Segwit witness commitment: `OP_RETURN <0xaa21a9ed || commitment>`.

use crate::Script;

/// Prefix shared by every witness commitment output.
pub const HEADER: [u8; 6] = [0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed];

/// Whether `script` is a witness commitment output.
pub fn check_output(script: &[u8]) -> bool {
    script.len() > 37 && script.starts_with(&HEADER)
}

/// The 32-byte commitment hash.
pub fn commitment(script: &[u8]) -> Option<[u8; 32]> {
    if !check_output(script) {
        return None;
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&script[6..38]);
    Some(hash)
}

/// Build a witness commitment output.
pub fn output_script(commitment: &[u8; 32]) -> Script {
    let mut bytes = HEADER.to_vec();
    bytes.extend_from_slice(commitment);
    Script::from(bytes)
}
