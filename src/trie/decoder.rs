// Exports-trie decoder: walks the flat payload as a prefix tree.
//
// Node layout (root at offset 0):
//   uleb128 terminal_size
//   [terminal payload: terminal_size bytes]
//   u8 child_count
//   child_count * (NUL-terminated edge label, uleb128 absolute child offset)
//
// Robustness notes:
//   - Child offsets are tracked in a visited set; revisiting any offset
//     (cycle or shared subtree) fails with MalformedTrie so the walk
//     terminates on corrupt input
//   - Terminal payloads are parsed inside their declared size only
//   - Errors abort the walk; no partial collection is returned

use std::collections::HashSet;

use log::debug;

use crate::error::{Result, TrieError};

use super::export::{ExportInfo, ExportPayload, ExportSymbolFlags};
use super::uleb128;

/// Recursion guard. Edge labels may be empty on corrupt input, so depth
/// is not bounded by the longest symbol name alone.
const MAX_NODE_DEPTH: usize = 4096;

/// Decode a full exports-trie payload into its export collection.
///
/// An empty buffer decodes to an empty collection. Iteration order is
/// the encounter order of terminal nodes during the depth-first walk,
/// which re-encoding preserves up to the canonical name sort.
pub fn decode(buf: &[u8]) -> Result<Vec<ExportInfo>> {
    let mut exports = Vec::new();
    if buf.is_empty() {
        return Ok(exports);
    }
    let mut walk = Walk {
        buf,
        visited: HashSet::new(),
        names: HashSet::new(),
    };
    let mut path = String::new();
    walk.node(0, &mut path, 0, &mut exports)?;
    debug!("decoded exports trie: {} entries", exports.len());
    Ok(exports)
}

/// Look up a single symbol without materializing the whole collection.
///
/// Follows at most one edge per level (the one whose label is a prefix
/// of the remaining name), so it touches only the matching spine.
pub fn lookup(buf: &[u8], name: &str) -> Result<Option<ExportInfo>> {
    if buf.is_empty() {
        return Ok(None);
    }
    let mut walk = Walk {
        buf,
        visited: HashSet::new(),
        names: HashSet::new(),
    };
    walk.lookup_node(0, name, 0, 0)
}

struct Walk<'a> {
    buf: &'a [u8],
    /// Offsets of every node already entered. Any repeat is a cycle or
    /// an aliased subtree; both are rejected.
    visited: HashSet<usize>,
    /// Symbol names seen so far, for duplicate detection.
    names: HashSet<String>,
}

impl<'a> Walk<'a> {
    fn node(
        &mut self,
        offset: usize,
        path: &mut String,
        depth: usize,
        out: &mut Vec<ExportInfo>,
    ) -> Result<()> {
        let (terminal, children) = self.open_node(offset, depth)?;

        if let Some((payload, payload_offset)) = terminal {
            if path.is_empty() {
                return Err(TrieError::MalformedTrie {
                    offset,
                    reason: "terminal payload with an empty symbol name",
                });
            }
            let info = parse_terminal(payload, payload_offset, path)?;
            if !self.names.insert(path.clone()) {
                return Err(TrieError::DuplicateExport { name: path.clone() });
            }
            out.push(info);
        }

        let mut cursor = children;
        let child_count = self.child_count(offset, &mut cursor)?;
        for _ in 0..child_count {
            let label = self.edge_label(offset, &mut cursor)?;
            let child_offset = self.child_offset(offset, &mut cursor)?;
            let keep = path.len();
            path.push_str(&String::from_utf8_lossy(label));
            self.node(child_offset, path, depth + 1, out)?;
            path.truncate(keep);
        }
        Ok(())
    }

    fn lookup_node(
        &mut self,
        offset: usize,
        name: &str,
        matched: usize,
        depth: usize,
    ) -> Result<Option<ExportInfo>> {
        let (terminal, children) = self.open_node(offset, depth)?;

        if matched == name.len() {
            return match terminal {
                Some((payload, payload_offset)) => {
                    parse_terminal(payload, payload_offset, name).map(Some)
                }
                None => Ok(None),
            };
        }

        let remaining = &name.as_bytes()[matched..];
        let mut cursor = children;
        let child_count = self.child_count(offset, &mut cursor)?;
        for _ in 0..child_count {
            let label = self.edge_label(offset, &mut cursor)?;
            let child_offset = self.child_offset(offset, &mut cursor)?;
            if !label.is_empty() && remaining.starts_with(label) {
                return self.lookup_node(child_offset, name, matched + label.len(), depth + 1);
            }
        }
        Ok(None)
    }

    /// Enter the node at `offset`: bounds/cycle checks, then split off
    /// the terminal payload. Returns the optional payload (with its
    /// absolute offset, for diagnostics) and the cursor just past it,
    /// relative to `offset`.
    #[allow(clippy::type_complexity)]
    fn open_node(&mut self, offset: usize, depth: usize) -> Result<(Option<(&'a [u8], usize)>, usize)> {
        if depth > MAX_NODE_DEPTH {
            return Err(TrieError::MalformedTrie {
                offset,
                reason: "node nesting exceeds depth limit",
            });
        }
        if offset >= self.buf.len() {
            return Err(TrieError::MalformedTrie {
                offset,
                reason: "node offset out of bounds",
            });
        }
        if !self.visited.insert(offset) {
            return Err(TrieError::MalformedTrie {
                offset,
                reason: "child offset revisits an already-walked node",
            });
        }

        let buf = self.buf;
        let node = &buf[offset..];
        let (terminal_size, n) = uleb128::read_usize(node).map_err(|e| varint_err(offset, e))?;
        let mut cursor = n;

        let terminal = if terminal_size > 0 {
            let end = cursor.checked_add(terminal_size).filter(|&e| e <= node.len());
            let Some(end) = end else {
                return Err(TrieError::MalformedTrie {
                    offset,
                    reason: "terminal payload runs past the buffer end",
                });
            };
            let payload = &node[cursor..end];
            let payload_offset = offset + cursor;
            cursor = end;
            Some((payload, payload_offset))
        } else {
            None
        };
        Ok((terminal, cursor))
    }

    fn child_count(&self, offset: usize, cursor: &mut usize) -> Result<u8> {
        let node = &self.buf[offset..];
        let Some(&count) = node.get(*cursor) else {
            return Err(TrieError::MalformedTrie {
                offset,
                reason: "node truncated before child count",
            });
        };
        *cursor += 1;
        Ok(count)
    }

    fn edge_label(&self, offset: usize, cursor: &mut usize) -> Result<&'a [u8]> {
        let buf = self.buf;
        let rest = &buf[offset + *cursor..];
        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            return Err(TrieError::MalformedTrie {
                offset,
                reason: "edge label is missing its NUL terminator",
            });
        };
        *cursor += nul + 1;
        Ok(&rest[..nul])
    }

    fn child_offset(&self, offset: usize, cursor: &mut usize) -> Result<usize> {
        let node = &self.buf[offset..];
        let (child, n) =
            uleb128::read_usize(&node[*cursor..]).map_err(|e| varint_err(offset + *cursor, e))?;
        *cursor += n;
        Ok(child)
    }
}

/// Parse one terminal payload into an `ExportInfo` for `name`.
///
/// `payload` is exactly the declared terminal span, so any read past it
/// is reported as corruption rather than leaking into sibling fields.
fn parse_terminal(payload: &[u8], offset: usize, name: &str) -> Result<ExportInfo> {
    let (raw_flags, mut cursor) = uleb128::read_u64(payload).map_err(|e| varint_err(offset, e))?;

    let Some(flags) = ExportSymbolFlags::from_bits(raw_flags) else {
        return Err(TrieError::MalformedTrie {
            offset,
            reason: "unknown bits in export flags",
        });
    };
    if flags.kind_bits() == ExportSymbolFlags::KIND_MASK {
        return Err(TrieError::MalformedTrie {
            offset,
            reason: "invalid export kind field",
        });
    }
    if flags.contains(ExportSymbolFlags::REEXPORT | ExportSymbolFlags::STUB_AND_RESOLVER) {
        return Err(TrieError::MalformedTrie {
            offset,
            reason: "re-export and stub-resolver flags are mutually exclusive",
        });
    }

    let payload_value = if flags.contains(ExportSymbolFlags::REEXPORT) {
        let (library_ordinal, n) =
            uleb128::read_u64(&payload[cursor..]).map_err(|e| varint_err(offset + cursor, e))?;
        cursor += n;
        let rest = &payload[cursor..];
        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            return Err(TrieError::MalformedTrie {
                offset: offset + cursor,
                reason: "re-export name is missing its NUL terminator",
            });
        };
        let symbol_name = String::from_utf8_lossy(&rest[..nul]).into_owned();
        ExportPayload::Reexport {
            library_ordinal,
            symbol_name,
        }
    } else if flags.contains(ExportSymbolFlags::STUB_AND_RESOLVER) {
        let (stub_offset, n) =
            uleb128::read_u64(&payload[cursor..]).map_err(|e| varint_err(offset + cursor, e))?;
        cursor += n;
        let (resolver_offset, _) =
            uleb128::read_u64(&payload[cursor..]).map_err(|e| varint_err(offset + cursor, e))?;
        ExportPayload::StubResolver {
            stub_offset,
            resolver_offset,
        }
    } else {
        let (address, _) =
            uleb128::read_u64(&payload[cursor..]).map_err(|e| varint_err(offset + cursor, e))?;
        ExportPayload::Address { address }
    };

    ExportInfo::from_parts(name.to_string(), flags, payload_value).map_err(|_| {
        TrieError::MalformedTrie {
            offset,
            reason: "export flags disagree with payload",
        }
    })
}

fn varint_err(offset: usize, e: uleb128::VarIntError) -> TrieError {
    TrieError::MalformedVarInt {
        offset,
        reason: e.reason(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::export::ExportKind;

    // Hand-assembled single-export trie:
    //   root: terminal 0, 1 child "_main" -> node at 9
    //   node 9: terminal {flags 0, addr 0x1000}, 0 children
    fn single_export_trie() -> Vec<u8> {
        let mut buf = vec![0x00, 0x01];
        buf.extend_from_slice(b"_main\0");
        buf.push(0x09); // child offset
        buf.extend_from_slice(&[0x03, 0x00, 0x80, 0x20, 0x00]); // terminal size 3, flags, uleb(0x1000), 0 children
        buf
    }

    #[test]
    fn decodes_single_export() {
        let exports = decode(&single_export_trie()).unwrap();
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].name(), "_main");
        assert_eq!(exports[0].address(), Some(0x1000));
        assert_eq!(exports[0].kind(), ExportKind::Regular);
    }

    #[test]
    fn empty_buffer_is_empty_collection() {
        assert_eq!(decode(&[]).unwrap(), Vec::new());
    }

    #[test]
    fn dead_end_node_emits_nothing() {
        // root: terminal 0, 1 child "x" -> node with terminal 0 and zero
        // children. Legal, just no export on that path.
        let buf = [0x00, 0x01, b'x', 0x00, 0x05, 0x00, 0x00];
        assert_eq!(decode(&buf).unwrap(), Vec::new());
    }

    #[test]
    fn self_referencing_child_is_rejected() {
        // root's child points back at the root.
        let buf = [0x00, 0x01, b'a', 0x00, 0x00];
        let err = decode(&buf).unwrap_err();
        assert!(matches!(err, TrieError::MalformedTrie { .. }), "{err}");
    }

    #[test]
    fn out_of_bounds_child_is_rejected() {
        let buf = [0x00, 0x01, b'a', 0x00, 0x7F];
        let err = decode(&buf).unwrap_err();
        assert!(matches!(err, TrieError::MalformedTrie { .. }), "{err}");
    }

    #[test]
    fn duplicate_name_via_empty_label_is_rejected() {
        // root -> "a" -> terminal node that also has an empty-label child
        // to a second terminal node: the path "a" terminates twice.
        let mut buf = vec![0x00, 0x01, b'a', 0x00, 0x05];
        // node at 5: terminal {0, 0}, 1 child "" -> node at 11
        buf.extend_from_slice(&[0x02, 0x00, 0x00, 0x01, 0x00, 0x0B]);
        // node at 11 (a second terminal for "a")
        buf.extend_from_slice(&[0x02, 0x00, 0x00, 0x00]);
        let err = decode(&buf).unwrap_err();
        assert_eq!(
            err,
            TrieError::DuplicateExport {
                name: "a".to_string()
            }
        );
    }

    #[test]
    fn missing_child_count_is_rejected() {
        // A node that ends right after its terminal payload.
        let buf = [0x00, 0x01, b'a', 0x00, 0x05, 0x02, 0x00, 0x00];
        let err = decode(&buf).unwrap_err();
        assert!(matches!(err, TrieError::MalformedTrie { .. }), "{err}");
    }

    #[test]
    fn terminal_extends_past_buffer() {
        // Terminal size claims 0x40 bytes, buffer has 2.
        let buf = [0x40, 0x00];
        let err = decode(&buf).unwrap_err();
        assert!(matches!(err, TrieError::MalformedTrie { .. }), "{err}");
    }

    #[test]
    fn root_terminal_is_rejected() {
        // flags 0, addr 0 payload directly at the root: would export "".
        let buf = [0x02, 0x00, 0x00, 0x00];
        let err = decode(&buf).unwrap_err();
        assert!(matches!(err, TrieError::MalformedTrie { .. }), "{err}");
    }

    #[test]
    fn conflicting_flags_are_rejected() {
        // flags = REEXPORT | STUB_AND_RESOLVER = 0x18
        let buf = [0x00, 0x01, b'a', 0x00, 0x05, 0x03, 0x18, 0x01, 0x00, 0x00];
        let err = decode(&buf).unwrap_err();
        assert!(matches!(err, TrieError::MalformedTrie { .. }), "{err}");
    }

    #[test]
    fn lookup_follows_matching_spine() {
        let buf = single_export_trie();
        let hit = lookup(&buf, "_main").unwrap().unwrap();
        assert_eq!(hit.address(), Some(0x1000));
        assert_eq!(lookup(&buf, "_other").unwrap(), None);
        assert_eq!(lookup(&buf, "_mai").unwrap(), None);
    }
}
