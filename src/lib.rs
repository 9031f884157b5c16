//! Dyldtrie: codec for the Mach-O dyld exports trie.
//!
//! The crate decodes and re-encodes the `LC_DYLD_EXPORTS_TRIE` payload:
//! the compact prefix tree a Mach-O binary carries in its link-edit
//! region to describe every exported symbol, together with how each
//! symbol resolves (address, re-export, or stub-and-resolver pair).
//!
//! Container parsing, symbol tables and file I/O are the caller's
//! concern; this crate only transforms the raw payload span.
//!
//! # Quick Start
//!
//! ```
//! use dyldtrie::trie::{DyldExportsTrie, EncodeOptions, ExportInfo, ParseMode};
//!
//! let mut trie = DyldExportsTrie::new();
//! trie.add(ExportInfo::regular("_main", 0x1000)).unwrap();
//! trie.add(ExportInfo::reexport("_helper", 1, "_real_helper")).unwrap();
//!
//! let payload = trie.rebuild(EncodeOptions::default()).unwrap().to_vec();
//! let mut reparsed = DyldExportsTrie::from_content(&payload[..], ParseMode::Deep).unwrap();
//! assert_eq!(reparsed.exports().unwrap().len(), 2);
//! ```

pub mod error;
pub mod trie;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::TrieError;
pub use trie::{DyldExportsTrie, EncodeOptions, ExportInfo, ExportKind, ParseMode};
