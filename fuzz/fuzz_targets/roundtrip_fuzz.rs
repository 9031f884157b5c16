#![no_main]
use libfuzzer_sys::fuzz_target;

use dyldtrie::trie::{decoder, encoder};

fuzz_target!(|data: &[u8]| {
    // Any payload that decodes must re-encode and decode back to the
    // same export set (the fuzzer finds decodable inputs via coverage).
    let Ok(exports) = decoder::decode(data) else {
        return;
    };

    // Degenerate-but-decodable layouts (empty edge labels) can require
    // more than 255 children on rebuild, which the encoder rejects.
    let Ok(rebuilt) = encoder::encode(&exports) else {
        return;
    };
    let mut again = decoder::decode(&rebuilt).expect("re-encoded payload must decode");

    let mut expected = exports;
    expected.sort_by(|a, b| a.name().cmp(b.name()));
    again.sort_by(|a, b| a.name().cmp(b.name()));
    assert_eq!(again, expected);
});
