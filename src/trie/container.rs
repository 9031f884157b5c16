// The LC_DYLD_EXPORTS_TRIE payload container.
//
// Owns the raw payload (a borrowed view into the parent binary's
// link-edit buffer until a rebuild swaps in an owned buffer), the
// decoded export collection, and the load-command location fields the
// surrounding builder patches after a rebuild.

use std::borrow::Cow;
use std::collections::BTreeMap;

use log::debug;

use crate::error::{Result, TrieError};

use super::decoder;
use super::encoder;
use super::export::ExportInfo;

/// Parse strategy for the exports trie.
///
/// `Quick` defers the trie walk until the collection is first accessed;
/// `Deep` walks eagerly at construction. Both produce the identical
/// collection, only the timing of a malformed-trie error differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    #[default]
    Quick,
    Deep,
}

/// Options for rebuilding the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOptions {
    /// Keep the original byte layout when the collection was never
    /// mutated since decode. Off by default: the canonical sorted
    /// encoding is produced even for untouched tries.
    pub preserve_layout: bool,
}

/// The exports-trie payload plus its decoded export collection.
#[derive(Debug, Clone, Default)]
pub struct DyldExportsTrie<'a> {
    /// Raw payload. Borrowed from the parent binary until `rebuild`
    /// replaces it with an owned buffer.
    content: Cow<'a, [u8]>,
    /// File offset of the payload inside the link-edit region.
    data_offset: u32,
    /// Byte length of the payload.
    data_size: u32,
    /// Memoized decode result (`None` until first access in quick mode).
    exports: Option<Vec<ExportInfo>>,
    /// Collection mutated since decode; clears layout preservation.
    dirty: bool,
}

impl<'a> DyldExportsTrie<'a> {
    /// Wrap a raw payload span. `Deep` mode decodes immediately and
    /// surfaces malformed input here; `Quick` mode defers the identical
    /// walk (and any error) to the first collection access.
    pub fn from_content(content: impl Into<Cow<'a, [u8]>>, mode: ParseMode) -> Result<Self> {
        let content = content.into();
        let mut trie = Self {
            data_size: content.len() as u32,
            content,
            data_offset: 0,
            exports: None,
            dirty: false,
        };
        if mode == ParseMode::Deep {
            trie.decode_exports()?;
        }
        Ok(trie)
    }

    /// Build a container from scratch, starting with an empty set.
    pub fn new() -> Self {
        Self {
            content: Cow::Owned(Vec::new()),
            data_offset: 0,
            data_size: 0,
            exports: Some(Vec::new()),
            dirty: false,
        }
    }

    /// The decoded export collection, in decode (trie walk) order.
    /// Triggers the deferred decode on first call in quick mode.
    pub fn exports(&mut self) -> Result<&[ExportInfo]> {
        self.decode_exports()?;
        Ok(self.exports.as_deref().unwrap_or_default())
    }

    /// Mutable access to the collection. Marks the container dirty, so
    /// a later `preserve_layout` rebuild falls back to re-encoding.
    pub fn exports_mut(&mut self) -> Result<&mut Vec<ExportInfo>> {
        self.decode_exports()?;
        self.dirty = true;
        Ok(self.exports.as_mut().expect("decoded above"))
    }

    /// Append one export. Fails with `DuplicateExport` if the name is
    /// already present.
    pub fn add(&mut self, info: ExportInfo) -> Result<()> {
        self.decode_exports()?;
        let exports = self.exports.as_mut().expect("decoded above");
        if exports.iter().any(|e| e.name() == info.name()) {
            return Err(TrieError::DuplicateExport {
                name: info.name().to_string(),
            });
        }
        exports.push(info);
        self.dirty = true;
        Ok(())
    }

    /// Remove the export with the given name, if present.
    pub fn remove(&mut self, name: &str) -> Result<Option<ExportInfo>> {
        self.decode_exports()?;
        let exports = self.exports.as_mut().expect("decoded above");
        let Some(pos) = exports.iter().position(|e| e.name() == name) else {
            return Ok(None);
        };
        self.dirty = true;
        Ok(Some(exports.remove(pos)))
    }

    /// Look up one symbol. Uses the memoized collection when available,
    /// otherwise walks only the matching spine of the raw payload.
    pub fn lookup(&self, name: &str) -> Result<Option<ExportInfo>> {
        match &self.exports {
            Some(exports) => Ok(exports.iter().find(|e| e.name() == name).cloned()),
            None => decoder::lookup(&self.content, name),
        }
    }

    /// Re-encode the collection into a fresh payload, replace the raw
    /// span with the owned buffer and update `data_size`. Returns the
    /// new payload.
    ///
    /// With `preserve_layout` set and no mutation since decode, the
    /// original bytes are kept verbatim instead.
    pub fn rebuild(&mut self, options: EncodeOptions) -> Result<&[u8]> {
        if options.preserve_layout && !self.dirty {
            return Ok(&self.content);
        }
        self.decode_exports()?;
        let encoded = encoder::encode(self.exports.as_deref().expect("decoded above"))?;
        debug!(
            "rebuilt exports trie payload: {} -> {} bytes",
            self.content.len(),
            encoded.len()
        );
        self.data_size = encoded.len() as u32;
        self.content = Cow::Owned(encoded);
        self.dirty = false;
        Ok(&self.content)
    }

    /// Like `rebuild`, but the payload must fit a reserved link-edit
    /// region of `capacity` bytes. On `BufferTooSmall` the container is
    /// left untouched so the caller can grow the region and retry.
    pub fn rebuild_into_region(
        &mut self,
        capacity: usize,
        options: EncodeOptions,
    ) -> Result<&[u8]> {
        if options.preserve_layout && !self.dirty {
            let len = self.content.len();
            if len > capacity {
                return Err(TrieError::BufferTooSmall {
                    needed: len,
                    available: capacity,
                });
            }
            return Ok(&self.content);
        }
        self.decode_exports()?;
        let encoded = encoder::encode(self.exports.as_deref().expect("decoded above"))?;
        if encoded.len() > capacity {
            return Err(TrieError::BufferTooSmall {
                needed: encoded.len(),
                available: capacity,
            });
        }
        self.data_size = encoded.len() as u32;
        self.content = Cow::Owned(encoded);
        self.dirty = false;
        Ok(&self.content)
    }

    /// Current raw payload: the rebuilt buffer after a rebuild, the
    /// original undecoded bytes otherwise.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// File offset of the payload inside the link-edit region.
    pub fn data_offset(&self) -> u32 {
        self.data_offset
    }

    /// Byte length of the payload.
    pub fn data_size(&self) -> u32 {
        self.data_size
    }

    pub fn set_data_offset(&mut self, offset: u32) {
        self.data_offset = offset;
    }

    pub fn set_data_size(&mut self, size: u32) {
        self.data_size = size;
    }

    /// Human-readable dump of the export entries, one per line.
    /// Undecodable content yields the error message instead.
    pub fn show(&self) -> String {
        match self.decoded() {
            Ok(exports) => {
                let mut out = String::new();
                for info in exports.iter() {
                    out.push_str(&info.to_string());
                    out.push('\n');
                }
                out
            }
            Err(e) => format!("<{e}>\n"),
        }
    }

    /// Detach the container from the parent buffer by cloning the
    /// payload into an owned allocation.
    pub fn into_owned(self) -> DyldExportsTrie<'static> {
        DyldExportsTrie {
            content: Cow::Owned(self.content.into_owned()),
            data_offset: self.data_offset,
            data_size: self.data_size,
            exports: self.exports,
            dirty: self.dirty,
        }
    }

    fn decode_exports(&mut self) -> Result<()> {
        if self.exports.is_none() {
            self.exports = Some(decoder::decode(&self.content)?);
        }
        Ok(())
    }

    /// Decoded collection without memoizing: reuses the cached result
    /// or walks the payload afresh.
    fn decoded(&self) -> Result<Cow<'_, [ExportInfo]>> {
        match &self.exports {
            Some(exports) => Ok(Cow::Borrowed(exports)),
            None => decoder::decode(&self.content).map(Cow::Owned),
        }
    }
}

/// Containers are equal iff their decoded collections are equal as
/// name-keyed sets, independent of byte layout or entry order.
/// Undecodable content never compares equal.
impl PartialEq for DyldExportsTrie<'_> {
    fn eq(&self, other: &Self) -> bool {
        let (Ok(lhs), Ok(rhs)) = (self.decoded(), other.decoded()) else {
            return false;
        };
        let key = |exports: &[ExportInfo]| -> BTreeMap<String, ExportInfo> {
            exports
                .iter()
                .map(|e| (e.name().to_string(), e.clone()))
                .collect()
        };
        key(&lhs) == key(&rhs)
    }
}
