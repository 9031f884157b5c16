// In-memory model of one exported symbol.
//
// The wire format stores a flags varint plus kind-dependent fields; in
// memory the kind-specific data lives in a tagged `ExportPayload` so
// exactly one payload exists per entry. Decode reconstructs the variant
// from the flags, encode performs the inverse projection.

use bitflags::bitflags;

use crate::error::{Result, TrieError};

bitflags! {
    /// `EXPORT_SYMBOL_FLAGS_*` bitfield from `<mach-o/loader.h>`.
    ///
    /// The low two bits are a kind field (`KIND_MASK`), not independent
    /// flags; `REGULAR` is its zero value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ExportSymbolFlags: u64 {
        const KIND_THREAD_LOCAL   = 0x01;
        const KIND_ABSOLUTE       = 0x02;
        const WEAK_DEFINITION     = 0x04;
        const REEXPORT            = 0x08;
        const STUB_AND_RESOLVER   = 0x10;
    }
}

impl ExportSymbolFlags {
    /// Kind field mask (low two bits).
    pub const KIND_MASK: u64 = 0x03;
    /// Kind value for a regular export.
    pub const KIND_REGULAR: u64 = 0x00;

    /// The two-bit kind field.
    #[inline]
    pub fn kind_bits(self) -> u64 {
        self.bits() & Self::KIND_MASK
    }
}

/// The resolved kind of an export, derived from flags plus payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportKind {
    /// Plain exported definition at a file-relative address.
    Regular,
    /// Regular export carrying the weak-definition marker.
    RegularWeakDefinition,
    /// Thread-local variable export.
    ThreadLocal,
    /// Address is absolute, not an image-relative offset.
    Absolute,
    /// Forwarded to a symbol in another library.
    Reexport,
    /// Lazily-bound export backed by a resolver function.
    StubResolver,
}

/// Kind-specific payload. Exactly one per entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExportPayload {
    /// Regular / weak / thread-local / absolute exports.
    Address { address: u64 },
    /// Re-export from another library. An empty `symbol_name` means
    /// "same name as the export itself".
    Reexport {
        library_ordinal: u64,
        symbol_name: String,
    },
    /// Stub-and-resolver pair.
    StubResolver {
        stub_offset: u64,
        resolver_offset: u64,
    },
}

/// One exported symbol: name, raw flags and the kind payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExportInfo {
    name: String,
    flags: ExportSymbolFlags,
    payload: ExportPayload,
}

impl ExportInfo {
    /// Regular export at a file-relative virtual offset.
    pub fn regular(name: impl Into<String>, address: u64) -> Self {
        Self {
            name: name.into(),
            flags: ExportSymbolFlags::empty(),
            payload: ExportPayload::Address { address },
        }
    }

    /// Regular export with the weak-definition marker.
    pub fn weak(name: impl Into<String>, address: u64) -> Self {
        Self {
            name: name.into(),
            flags: ExportSymbolFlags::WEAK_DEFINITION,
            payload: ExportPayload::Address { address },
        }
    }

    /// Thread-local variable export.
    pub fn thread_local(name: impl Into<String>, address: u64) -> Self {
        Self {
            name: name.into(),
            flags: ExportSymbolFlags::KIND_THREAD_LOCAL,
            payload: ExportPayload::Address { address },
        }
    }

    /// Export whose value is an absolute address.
    pub fn absolute(name: impl Into<String>, address: u64) -> Self {
        Self {
            name: name.into(),
            flags: ExportSymbolFlags::KIND_ABSOLUTE,
            payload: ExportPayload::Address { address },
        }
    }

    /// Re-export of `symbol_name` from the library at `library_ordinal`.
    /// Pass an empty `symbol_name` to forward under the same name.
    pub fn reexport(
        name: impl Into<String>,
        library_ordinal: u64,
        symbol_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            flags: ExportSymbolFlags::REEXPORT,
            payload: ExportPayload::Reexport {
                library_ordinal,
                symbol_name: symbol_name.into(),
            },
        }
    }

    /// Stub-and-resolver export.
    pub fn stub_resolver(name: impl Into<String>, stub_offset: u64, resolver_offset: u64) -> Self {
        Self {
            name: name.into(),
            flags: ExportSymbolFlags::STUB_AND_RESOLVER,
            payload: ExportPayload::StubResolver {
                stub_offset,
                resolver_offset,
            },
        }
    }

    /// Rebuild an entry from decoded parts, checking that the flags and
    /// the payload agree. Decode uses this so an inconsistent wire
    /// combination surfaces as an error instead of being coerced.
    pub fn from_parts(name: String, flags: ExportSymbolFlags, payload: ExportPayload) -> Result<Self> {
        let consistent = match payload {
            ExportPayload::Reexport { .. } => {
                flags.contains(ExportSymbolFlags::REEXPORT)
                    && !flags.contains(ExportSymbolFlags::STUB_AND_RESOLVER)
            }
            ExportPayload::StubResolver { .. } => {
                flags.contains(ExportSymbolFlags::STUB_AND_RESOLVER)
                    && !flags.contains(ExportSymbolFlags::REEXPORT)
            }
            ExportPayload::Address { .. } => {
                !flags.contains(ExportSymbolFlags::REEXPORT)
                    && !flags.contains(ExportSymbolFlags::STUB_AND_RESOLVER)
            }
        };
        if !consistent {
            return Err(TrieError::MalformedTrie {
                offset: 0,
                reason: "export flags disagree with payload",
            });
        }
        Ok(Self {
            name,
            flags,
            payload,
        })
    }

    /// The symbol name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw flags bitfield.
    #[inline]
    pub fn flags(&self) -> ExportSymbolFlags {
        self.flags
    }

    /// The kind payload.
    #[inline]
    pub fn payload(&self) -> &ExportPayload {
        &self.payload
    }

    /// The resolved export kind.
    pub fn kind(&self) -> ExportKind {
        match self.payload {
            ExportPayload::Reexport { .. } => ExportKind::Reexport,
            ExportPayload::StubResolver { .. } => ExportKind::StubResolver,
            ExportPayload::Address { .. } => match self.flags.kind_bits() {
                k if k == ExportSymbolFlags::KIND_THREAD_LOCAL.bits() => ExportKind::ThreadLocal,
                k if k == ExportSymbolFlags::KIND_ABSOLUTE.bits() => ExportKind::Absolute,
                _ if self.flags.contains(ExportSymbolFlags::WEAK_DEFINITION) => {
                    ExportKind::RegularWeakDefinition
                }
                _ => ExportKind::Regular,
            },
        }
    }

    /// Address for address-carrying kinds, `None` for re-exports and
    /// stub-resolvers.
    pub fn address(&self) -> Option<u64> {
        match self.payload {
            ExportPayload::Address { address } => Some(address),
            _ => None,
        }
    }

    /// Ordinal of the source library for re-exports.
    pub fn reexport_library_ordinal(&self) -> Option<u64> {
        match self.payload {
            ExportPayload::Reexport {
                library_ordinal, ..
            } => Some(library_ordinal),
            _ => None,
        }
    }

    /// Name of the re-exported symbol (empty = same name).
    pub fn reexport_symbol_name(&self) -> Option<&str> {
        match &self.payload {
            ExportPayload::Reexport { symbol_name, .. } => Some(symbol_name),
            _ => None,
        }
    }

    /// Stub and resolver offsets for stub-resolver exports.
    pub fn stub_and_resolver(&self) -> Option<(u64, u64)> {
        match self.payload {
            ExportPayload::StubResolver {
                stub_offset,
                resolver_offset,
            } => Some((stub_offset, resolver_offset)),
            _ => None,
        }
    }

    #[inline]
    pub fn is_weak(&self) -> bool {
        self.flags.contains(ExportSymbolFlags::WEAK_DEFINITION)
    }

    #[inline]
    pub fn is_reexport(&self) -> bool {
        matches!(self.payload, ExportPayload::Reexport { .. })
    }

    #[inline]
    pub fn is_stub_and_resolver(&self) -> bool {
        matches!(self.payload, ExportPayload::StubResolver { .. })
    }

    /// Check the name against the wire constraints: non-empty, and no
    /// embedded NUL (the edge-label separator). Called by the encoder
    /// before any bytes are emitted.
    pub fn validate_name(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(TrieError::InvalidExportName {
                name: self.name.clone(),
                reason: "empty name",
            });
        }
        if self.name.as_bytes().contains(&0) {
            return Err(TrieError::InvalidExportName {
                name: self.name.clone(),
                reason: "embedded NUL byte",
            });
        }
        match &self.payload {
            ExportPayload::Reexport { symbol_name, .. }
                if symbol_name.as_bytes().contains(&0) =>
            {
                Err(TrieError::InvalidExportName {
                    name: symbol_name.clone(),
                    reason: "embedded NUL byte in re-export name",
                })
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for ExportInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.payload {
            ExportPayload::Address { address } => {
                write!(f, "{} {{addr: {address:#x}", self.name)?;
                match self.kind() {
                    ExportKind::RegularWeakDefinition => write!(f, ", weak")?,
                    ExportKind::ThreadLocal => write!(f, ", thread-local")?,
                    ExportKind::Absolute => write!(f, ", absolute")?,
                    _ => {}
                }
                write!(f, "}}")
            }
            ExportPayload::Reexport {
                library_ordinal,
                symbol_name,
            } => {
                if symbol_name.is_empty() {
                    write!(f, "{} {{reexport: ordinal {library_ordinal}}}", self.name)
                } else {
                    write!(
                        f,
                        "{} {{reexport: {symbol_name} from ordinal {library_ordinal}}}",
                        self.name
                    )
                }
            }
            ExportPayload::StubResolver {
                stub_offset,
                resolver_offset,
            } => write!(
                f,
                "{} {{stub: {stub_offset:#x}, resolver: {resolver_offset:#x}}}",
                self.name
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_from_constructors() {
        assert_eq!(ExportInfo::regular("_a", 0).kind(), ExportKind::Regular);
        assert_eq!(
            ExportInfo::weak("_a", 0).kind(),
            ExportKind::RegularWeakDefinition
        );
        assert_eq!(
            ExportInfo::thread_local("_a", 0).kind(),
            ExportKind::ThreadLocal
        );
        assert_eq!(ExportInfo::absolute("_a", 0).kind(), ExportKind::Absolute);
        assert_eq!(
            ExportInfo::reexport("_a", 1, "").kind(),
            ExportKind::Reexport
        );
        assert_eq!(
            ExportInfo::stub_resolver("_a", 0, 0).kind(),
            ExportKind::StubResolver
        );
    }

    #[test]
    fn from_parts_rejects_disagreement() {
        // REEXPORT flag with an address payload.
        let err = ExportInfo::from_parts(
            "_a".into(),
            ExportSymbolFlags::REEXPORT,
            ExportPayload::Address { address: 0x1000 },
        )
        .unwrap_err();
        assert!(matches!(err, TrieError::MalformedTrie { .. }));

        // Stub payload without the flag.
        let err = ExportInfo::from_parts(
            "_a".into(),
            ExportSymbolFlags::empty(),
            ExportPayload::StubResolver {
                stub_offset: 1,
                resolver_offset: 2,
            },
        )
        .unwrap_err();
        assert!(matches!(err, TrieError::MalformedTrie { .. }));
    }

    #[test]
    fn name_validation() {
        assert!(ExportInfo::regular("_ok", 0).validate_name().is_ok());
        assert!(matches!(
            ExportInfo::regular("", 0).validate_name(),
            Err(TrieError::InvalidExportName { .. })
        ));
        assert!(matches!(
            ExportInfo::regular("bad\0name", 0).validate_name(),
            Err(TrieError::InvalidExportName { .. })
        ));
        assert!(matches!(
            ExportInfo::reexport("_ok", 1, "bad\0ree").validate_name(),
            Err(TrieError::InvalidExportName { .. })
        ));
    }

    #[test]
    fn display_lines() {
        assert_eq!(
            ExportInfo::regular("_main", 0x1000).to_string(),
            "_main {addr: 0x1000}"
        );
        assert_eq!(
            ExportInfo::reexport("_f", 3, "").to_string(),
            "_f {reexport: ordinal 3}"
        );
    }
}
