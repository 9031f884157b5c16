use std::collections::BTreeMap;

use dyldtrie::trie::{DyldExportsTrie, ExportInfo, ParseMode, decoder, encoder};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn arb_name() -> impl Strategy<Value = String> {
    // Mach-O style symbol names: leading underscore or letter, short
    // ASCII tail.
    "[_A-Za-z][A-Za-z0-9_.$]{0,24}"
}

fn arb_export(name: String) -> impl Strategy<Value = ExportInfo> {
    let n = name;
    prop_oneof![
        (Just(n.clone()), any::<u64>()).prop_map(|(n, addr)| ExportInfo::regular(n, addr)),
        (Just(n.clone()), any::<u64>()).prop_map(|(n, addr)| ExportInfo::weak(n, addr)),
        (Just(n.clone()), any::<u64>()).prop_map(|(n, addr)| ExportInfo::thread_local(n, addr)),
        (Just(n.clone()), any::<u64>()).prop_map(|(n, addr)| ExportInfo::absolute(n, addr)),
        (Just(n.clone()), 0u64..512, "([_A-Za-z][A-Za-z0-9_]{0,12})?")
            .prop_map(|(n, ordinal, reexport)| ExportInfo::reexport(n, ordinal, reexport)),
        (Just(n), any::<u64>(), any::<u64>())
            .prop_map(|(n, stub, resolver)| ExportInfo::stub_resolver(n, stub, resolver)),
    ]
}

fn arb_export_set() -> impl Strategy<Value = Vec<ExportInfo>> {
    proptest::collection::btree_set(arb_name(), 0..64)
        .prop_flat_map(|names| names.into_iter().map(arb_export).collect::<Vec<_>>())
}

fn by_name(exports: &[ExportInfo]) -> BTreeMap<String, ExportInfo> {
    exports
        .iter()
        .map(|e| (e.name().to_string(), e.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn prop_encode_decode_roundtrip(exports in arb_export_set()) {
        let buf = encoder::encode(&exports).unwrap();
        let decoded = decoder::decode(&buf).unwrap();
        prop_assert_eq!(by_name(&decoded), by_name(&exports));
    }

    #[test]
    fn prop_encoding_is_deterministic(exports in arb_export_set()) {
        let mut shuffled = exports.clone();
        shuffled.reverse();
        prop_assert_eq!(encoder::encode(&exports).unwrap(), encoder::encode(&shuffled).unwrap());
    }

    #[test]
    fn prop_quick_and_deep_modes_agree(exports in arb_export_set()) {
        let buf = encoder::encode(&exports).unwrap();
        let mut quick = DyldExportsTrie::from_content(&buf[..], ParseMode::Quick).unwrap();
        let mut deep = DyldExportsTrie::from_content(&buf[..], ParseMode::Deep).unwrap();
        prop_assert_eq!(quick.exports().unwrap(), deep.exports().unwrap());
    }

    #[test]
    fn prop_decode_never_panics_on_arbitrary_bytes(
        data in proptest::collection::vec(any::<u8>(), 0..1024)
    ) {
        // Errors are fine; panics and hangs are not.
        let _ = decoder::decode(&data);
    }

    #[test]
    fn prop_lookup_agrees_with_full_decode(exports in arb_export_set()) {
        let buf = encoder::encode(&exports).unwrap();
        for info in &exports {
            let hit = decoder::lookup(&buf, info.name()).unwrap();
            prop_assert_eq!(hit.as_ref(), Some(info));
        }
        prop_assert_eq!(decoder::lookup(&buf, "\u{1}no_such_symbol").unwrap(), None);
    }
}
