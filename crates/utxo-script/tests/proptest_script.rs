use proptest::prelude::*;

use utxo_script::chunk::{compile_stack, script_to_stack};
use utxo_script::templates::{nulldata, p2ms};
use utxo_script::{classify_output, Script, ScriptType};
use utxo_primitives::ec::PrivateKey;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn script_hex_roundtrip(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let script = Script::from_bytes(&data);
        let hex_str = script.to_hex();
        let script2 = Script::from_hex(&hex_str).unwrap();
        prop_assert_eq!(script.to_bytes(), script2.to_bytes());
    }

    #[test]
    fn stack_compiles_to_push_only_script(
        items in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..80), 0..8)
    ) {
        let compiled = compile_stack(&items).unwrap();
        prop_assert!(Script::from_bytes(&compiled).is_push_only());
        prop_assert_eq!(script_to_stack(&compiled).unwrap(), items);
    }

    #[test]
    fn classify_output_never_panics(data in prop::collection::vec(any::<u8>(), 0..128)) {
        let _ = classify_output(&data);
    }

    #[test]
    fn nulldata_always_classifies(data in prop::collection::vec(any::<u8>(), 1..80)) {
        let script = nulldata::output_script(&[&data[..]]).unwrap();
        prop_assert_eq!(classify_output(script.to_bytes()).unwrap(), ScriptType::NullData);
    }

    #[test]
    fn multisig_outputs_classify(n in 1usize..=5, m_seed in any::<usize>()) {
        let m = 1 + m_seed % n;
        let keys: Vec<Vec<u8>> = (0..n)
            .map(|_| PrivateKey::new().pub_key().to_compressed().to_vec())
            .collect();
        let script = p2ms::output_script(m, &keys).unwrap();
        prop_assert_eq!(classify_output(script.to_bytes()).unwrap(), ScriptType::P2ms);
        let decoded = p2ms::decode_output(script.to_bytes()).unwrap();
        prop_assert_eq!(decoded.m, m);
        prop_assert_eq!(decoded.pubkeys, keys);
    }
}
