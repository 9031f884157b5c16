// Mach-O exports-trie format implementation.
//
// Covers the payload of the LC_DYLD_EXPORTS_TRIE load command: the
// prefix tree over exported-symbol names that modern binaries carry in
// place of the legacy flat dyld-info export buffer.
//
// # Modules
//
// - `uleb128`   — Variable-length integer encoding (base-128, little-endian)
// - `export`    — ExportInfo model: kinds, flags, payloads
// - `decoder`   — Trie walk: raw payload to export collection
// - `encoder`   — Trie rebuild: export collection to canonical payload
// - `container` — DyldExportsTrie: payload span, collection, location fields

pub mod container;
pub mod decoder;
pub mod encoder;
pub mod export;
pub mod uleb128;

// Re-export key types for convenience.
pub use container::{DyldExportsTrie, EncodeOptions, ParseMode};
pub use export::{ExportInfo, ExportKind, ExportPayload, ExportSymbolFlags};
