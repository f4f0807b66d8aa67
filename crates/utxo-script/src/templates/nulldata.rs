//! Null data: `OP_RETURN <data>...`.

use crate::opcodes::OP_RETURN;
use crate::{Script, ScriptError};

/// Whether `script` is a null-data output.
pub fn check_output(script: &[u8]) -> bool {
    script.len() > 1 && script[0] == OP_RETURN
}

/// Build an `OP_RETURN` output carrying `data` as successive pushes.
pub fn output_script(data: &[&[u8]]) -> Result<Script, ScriptError> {
    let mut script = Script::new();
    script.append_opcodes(&[OP_RETURN])?;
    for item in data {
        script.append_push_data(item)?;
    }
    Ok(script)
}
