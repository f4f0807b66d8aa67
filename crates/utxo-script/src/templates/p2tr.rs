//! Pay-to-taproot: `OP_1 <32-byte output key>`.

use utxo_primitives::taproot::tweak_public_key;

use crate::opcodes::{OP_1, OP_DATA_32};
use crate::{Script, ScriptError};

/// Length of a P2TR output script.
pub const OUTPUT_LEN: usize = 34;

/// Whether `script` is a P2TR output.
pub fn check_output(script: &[u8]) -> bool {
    script.len() == OUTPUT_LEN && script[0] == OP_1 && script[1] == OP_DATA_32
}

/// The output key committed by a P2TR output.
pub fn output_key(script: &[u8]) -> Option<[u8; 32]> {
    if !check_output(script) {
        return None;
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&script[2..]);
    Some(key)
}

/// Build a P2TR output for an already tweaked output key.
pub fn output_script(output_key: &[u8; 32]) -> Script {
    let mut bytes = Vec::with_capacity(OUTPUT_LEN);
    bytes.extend_from_slice(&[OP_1, OP_DATA_32]);
    bytes.extend_from_slice(output_key);
    Script::from(bytes)
}

/// Build the P2TR output for an internal key and optional script tree root.
pub fn output_script_for_internal_key(
    internal_key: &[u8; 32],
    merkle_root: Option<&[u8; 32]>,
) -> Result<Script, ScriptError> {
    let tweaked = tweak_public_key(internal_key, merkle_root)?;
    Ok(output_script(&tweaked.x_only))
}

#[cfg(test)]
mod tests {
    use super::*;
    use utxo_primitives::ec::PrivateKey;

    #[test]
    fn test_key_path_output() {
        let internal = PrivateKey::new().pub_key().x_only();
        let script = output_script_for_internal_key(&internal, None).expect("tweak");
        assert!(check_output(script.to_bytes()));
        let key = output_key(script.to_bytes()).expect("output key");
        assert_ne!(key, internal, "output key is tweaked");
    }
}
