// Exports-trie encoder: rebuilds the flat payload from an export set.
//
// Three stages:
//   1. Compressed-trie construction over the (sorted) symbol names,
//      splitting edges on partial prefix matches
//   2. Offset assignment by fixed-point iteration: child offsets are
//      varints, so a node's size depends on offsets that depend on
//      sizes; offsets only grow, so iterating until no offset moves
//      terminates
//   3. Depth-first emission, root first, with absolute child offsets
//
// Output is canonical for a given export set: names are sorted before
// insertion, so encoding the same set twice is byte-identical.

use log::debug;

use crate::error::{Result, TrieError};

use super::export::{ExportInfo, ExportPayload};
use super::uleb128;

/// Encode an export collection into a fresh trie payload.
///
/// Names are validated (non-empty, no NUL) and checked for duplicates
/// before any bytes are produced. An empty collection encodes to an
/// empty buffer.
pub fn encode(exports: &[ExportInfo]) -> Result<Vec<u8>> {
    if exports.is_empty() {
        return Ok(Vec::new());
    }

    let mut sorted: Vec<&ExportInfo> = exports.iter().collect();
    sorted.sort_by(|a, b| a.name().cmp(b.name()));
    for pair in sorted.windows(2) {
        if pair[0].name() == pair[1].name() {
            return Err(TrieError::DuplicateExport {
                name: pair[0].name().to_string(),
            });
        }
    }
    for info in &sorted {
        info.validate_name()?;
    }

    let mut builder = TrieBuilder::new();
    for info in &sorted {
        builder.insert(info.name().as_bytes(), terminal_payload(info));
    }
    let out = builder.serialize()?;
    debug!(
        "encoded exports trie: {} entries, {} nodes, {} bytes",
        sorted.len(),
        builder.nodes.len(),
        out.len()
    );
    Ok(out)
}

/// Serialize one terminal payload: flags varint, then the kind fields.
/// The inverse of the decode-side projection.
fn terminal_payload(info: &ExportInfo) -> Vec<u8> {
    let mut out = Vec::new();
    uleb128::write_u64(info.flags().bits(), &mut out);
    match info.payload() {
        ExportPayload::Address { address } => {
            uleb128::write_u64(*address, &mut out);
        }
        ExportPayload::Reexport {
            library_ordinal,
            symbol_name,
        } => {
            uleb128::write_u64(*library_ordinal, &mut out);
            out.extend_from_slice(symbol_name.as_bytes());
            out.push(0);
        }
        ExportPayload::StubResolver {
            stub_offset,
            resolver_offset,
        } => {
            uleb128::write_u64(*stub_offset, &mut out);
            uleb128::write_u64(*resolver_offset, &mut out);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Trie construction
// ---------------------------------------------------------------------------

struct Edge {
    label: Vec<u8>,
    child: usize,
}

struct Node {
    /// Serialized terminal payload, present iff a symbol ends here.
    terminal: Option<Vec<u8>>,
    children: Vec<Edge>,
    /// Assigned byte offset in the output buffer.
    offset: usize,
}

struct TrieBuilder {
    nodes: Vec<Node>,
}

impl TrieBuilder {
    fn new() -> Self {
        Self {
            nodes: vec![Node {
                terminal: None,
                children: Vec::new(),
                offset: 0,
            }],
        }
    }

    fn push_node(&mut self, terminal: Option<Vec<u8>>) -> usize {
        self.nodes.push(Node {
            terminal,
            children: Vec::new(),
            offset: 0,
        });
        self.nodes.len() - 1
    }

    /// Insert one name/payload pair, splitting an edge on a partial
    /// prefix match. Callers pass names in sorted order, which keeps
    /// child lists sorted without an extra pass.
    fn insert(&mut self, name: &[u8], payload: Vec<u8>) {
        let mut node = 0;
        let mut rest = name;
        loop {
            if rest.is_empty() {
                self.nodes[node].terminal = Some(payload);
                return;
            }

            let mut descend = None;
            for i in 0..self.nodes[node].children.len() {
                let label = &self.nodes[node].children[i].label;
                let common = common_prefix_len(label, rest);
                if common == 0 {
                    continue;
                }
                if common < label.len() {
                    // Partial match: split the edge at the shared prefix.
                    let tail = label[common..].to_vec();
                    let old_child = self.nodes[node].children[i].child;
                    let mid = self.push_node(None);
                    self.nodes[mid].children.push(Edge {
                        label: tail,
                        child: old_child,
                    });
                    let edge = &mut self.nodes[node].children[i];
                    edge.label.truncate(common);
                    edge.child = mid;
                    descend = Some((mid, common));
                } else {
                    descend = Some((self.nodes[node].children[i].child, common));
                }
                break;
            }

            match descend {
                Some((next, common)) => {
                    node = next;
                    rest = &rest[common..];
                }
                None => {
                    let leaf = self.push_node(Some(payload));
                    self.nodes[node].children.push(Edge {
                        label: rest.to_vec(),
                        child: leaf,
                    });
                    return;
                }
            }
        }
    }

    /// Pre-order node indices (root first, children depth-first).
    /// Emission and offset assignment both follow this order.
    fn preorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![0usize];
        while let Some(idx) = stack.pop() {
            order.push(idx);
            for edge in self.nodes[idx].children.iter().rev() {
                stack.push(edge.child);
            }
        }
        order
    }

    /// Encoded size of one node under the current offset assignment.
    fn node_size(&self, idx: usize) -> usize {
        let node = &self.nodes[idx];
        let terminal_len = node.terminal.as_ref().map_or(0, Vec::len);
        let mut size = uleb128::encoded_len_u64(terminal_len as u64) + terminal_len;
        size += 1; // child count byte
        for edge in &node.children {
            size += edge.label.len() + 1;
            size += uleb128::encoded_len_u64(self.nodes[edge.child].offset as u64);
        }
        size
    }

    fn serialize(&mut self) -> Result<Vec<u8>> {
        for node in &self.nodes {
            if node.children.len() > usize::from(u8::MAX) {
                return Err(TrieError::MalformedTrie {
                    offset: 0,
                    reason: "trie node exceeds 255 children",
                });
            }
        }

        let order = self.preorder();

        // Fixed-point offset assignment. Offsets can only grow between
        // iterations (wider varints push later nodes further out), so
        // this converges.
        loop {
            let mut changed = false;
            let mut offset = 0usize;
            for &idx in &order {
                if self.nodes[idx].offset != offset {
                    self.nodes[idx].offset = offset;
                    changed = true;
                }
                offset += self.node_size(idx);
            }
            if !changed {
                break;
            }
        }

        let total: usize = order.iter().map(|&idx| self.node_size(idx)).sum();
        let mut out = Vec::with_capacity(total);
        for &idx in &order {
            debug_assert_eq!(out.len(), self.nodes[idx].offset);
            let node = &self.nodes[idx];
            match &node.terminal {
                Some(payload) => {
                    uleb128::write_u64(payload.len() as u64, &mut out);
                    out.extend_from_slice(payload);
                }
                None => out.push(0),
            }
            out.push(node.children.len() as u8);
            for edge in &node.children {
                out.extend_from_slice(&edge.label);
                out.push(0);
                uleb128::write_u64(self.nodes[edge.child].offset as u64, &mut out);
            }
        }
        Ok(out)
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
