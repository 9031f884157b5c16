#![no_main]
use dyldtrie::trie::decoder;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Fuzz the decoder with arbitrary bytes.
    // The decoder must never panic or hang — only return errors.
    let _ = decoder::decode(data);

    // Also fuzz the single-symbol lookup path.
    if data.len() >= 2 {
        let split = data.len() / 2;
        let (payload, name) = data.split_at(split);
        let name = String::from_utf8_lossy(name);
        let _ = decoder::lookup(payload, &name);
    }
});
