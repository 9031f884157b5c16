// Error taxonomy for the exports-trie codec.
//
// Every variant is recoverable: the caller decides whether a malformed
// trie aborts the surrounding binary load or is downgraded to a warning.

use thiserror::Error;

/// Errors produced while decoding or rebuilding an exports trie.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrieError {
    /// A variable-length integer was truncated or exceeded its target width.
    #[error("malformed varint at offset {offset:#x} ({reason})")]
    MalformedVarInt { offset: usize, reason: &'static str },

    /// Structural corruption: out-of-bounds or revisited child offset,
    /// truncated terminal payload, or a flags/payload combination that
    /// cannot be represented.
    #[error("malformed exports trie at offset {offset:#x}: {reason}")]
    MalformedTrie { offset: usize, reason: &'static str },

    /// A symbol name occurred twice, either inside a decoded trie or on
    /// an attempted insert.
    #[error("duplicate export symbol `{name}`")]
    DuplicateExport { name: String },

    /// The rebuilt payload no longer fits the reserved link-edit region.
    #[error("exports trie payload needs {needed} bytes but only {available} are available")]
    BufferTooSmall { needed: usize, available: usize },

    /// A symbol name that cannot be encoded (empty, or contains the NUL
    /// edge-label separator). Detected before any bytes are emitted.
    #[error("invalid export symbol name {name:?}: {reason}")]
    InvalidExportName { name: String, reason: &'static str },
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TrieError>;
