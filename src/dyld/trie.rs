//! Export trie parsing.
//!
//! Exported symbols are stored as a prefix tree. Each node is
//! `[ULEB128 terminal_size][payload][u8 child_count]` followed by
//! `child_count` edges of `[NUL-terminated label][ULEB128 child_offset]`.
//! A non-zero terminal size marks the node's accumulated prefix as an
//! exported name and the payload carries its flags and value.
//!
//! Traversal is iterative with an explicit stack: the format is a tree,
//! but offsets come from untrusted bytes, so recursion depth must not be
//! attacker-controlled. Capping visited nodes at the trie's byte length
//! rejects offset cycles.

use crate::cursor::ParseCursor;
use crate::error::{Error, Result};

/// Cap on the byte length of any symbol name produced by the trie.
pub const MAX_SYMBOL_NAME_LEN: usize = 4096;

// =============================================================================
// Export Flags
// =============================================================================

/// Kind of an exported symbol, the low two bits of its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// Ordinary symbol, offset relative to the image
    Regular,
    /// Thread-local variable
    ThreadLocal,
    /// Absolute address, not relative to any section
    Absolute,
}

/// Flags attached to an exported symbol's terminal payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFlags(pub u64);

impl ExportFlags {
    const KIND_MASK: u64 = 0x03;
    const WEAK_DEFINITION: u64 = 0x04;
    const REEXPORT: u64 = 0x08;
    const STUB_AND_RESOLVER: u64 = 0x10;
    const STATIC_RESOLVER: u64 = 0x20;
    const FUNCTION_VARIANT: u64 = 0x40;

    /// Decodes the kind field; the fourth encoding is undefined.
    pub fn kind(&self) -> Result<ExportKind> {
        match self.0 & Self::KIND_MASK {
            0 => Ok(ExportKind::Regular),
            1 => Ok(ExportKind::ThreadLocal),
            2 => Ok(ExportKind::Absolute),
            _ => Err(Error::InvalidExportFlags(self.0)),
        }
    }

    /// True for absolute-kind symbols.
    #[inline]
    pub fn is_absolute(&self) -> bool {
        self.0 & Self::KIND_MASK == 2
    }

    /// Weak definition.
    #[inline]
    pub fn is_weak_definition(&self) -> bool {
        self.0 & Self::WEAK_DEFINITION != 0
    }

    /// Re-export from another dylib.
    #[inline]
    pub fn is_reexport(&self) -> bool {
        self.0 & Self::REEXPORT != 0
    }

    /// Stub with a runtime resolver function.
    #[inline]
    pub fn is_stub_and_resolver(&self) -> bool {
        self.0 & Self::STUB_AND_RESOLVER != 0
    }

    /// Statically resolved.
    #[inline]
    pub fn is_static_resolver(&self) -> bool {
        self.0 & Self::STATIC_RESOLVER != 0
    }

    /// Function variant entry.
    #[inline]
    pub fn is_function_variant(&self) -> bool {
        self.0 & Self::FUNCTION_VARIANT != 0
    }
}

/// One exported symbol, as decoded from a terminal payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSymbol {
    /// Symbol name (the accumulated edge prefix)
    pub name: String,
    /// Raw flags
    pub flags: ExportFlags,
    /// Image-relative value for non-re-exports
    pub offset: Option<u64>,
    /// Ordinal of the source dylib for re-exports
    pub reexport_ordinal: Option<u64>,
    /// Imported name for re-exports, when it differs from `name`
    pub imported_name: Option<String>,
    /// Resolver function offset for stub-and-resolver exports
    pub resolver_offset: Option<u64>,
}

// =============================================================================
// Trie Walker
// =============================================================================

/// A parsed-on-demand export trie over a borrowed byte slice.
#[derive(Debug, Clone, Copy)]
pub struct ExportTrie<'a> {
    data: &'a [u8],
}

/// One resolved child edge: label and absolute node offset.
type Edge = (String, usize);

impl<'a> ExportTrie<'a> {
    /// Wraps trie bytes. An empty slice is a valid, empty trie.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Looks up a single symbol by exact name.
    ///
    /// Returns `Ok(None)` when the trie has no terminal for `name`.
    pub fn lookup(&self, name: &str) -> Result<Option<ExportSymbol>> {
        if self.data.is_empty() {
            return Ok(None);
        }

        let mut offset = 0usize;
        let mut matched = 0usize;
        // Every edge consumes at least one byte of the name, so the walk
        // cannot visit more nodes than the name has bytes.
        for _ in 0..=name.len() {
            let node = self.parse_node(offset, matched == name.len())?;
            if matched == name.len() {
                return Ok(node
                    .terminal
                    .map(|payload| payload.into_symbol(name.to_string())));
            }

            let remaining = &name.as_bytes()[matched..];
            let Some((label, child)) = node
                .edges
                .into_iter()
                .find(|(label, _)| remaining.starts_with(label.as_bytes()))
            else {
                return Ok(None);
            };
            matched += label.len();
            offset = child;
        }
        Ok(None)
    }

    /// Collects every exported symbol, depth-first.
    pub fn all_symbols(&self) -> Result<Vec<ExportSymbol>> {
        self.iter().collect()
    }

    /// Collects exported symbols, stopping at the first parse error and
    /// returning whatever was gathered before it.
    pub fn all_symbols_best_effort(&self) -> Vec<ExportSymbol> {
        let mut symbols = Vec::new();
        for item in self.iter() {
            match item {
                Ok(symbol) => symbols.push(symbol),
                Err(err) => {
                    tracing::warn!(%err, "export trie truncated; returning partial symbols");
                    break;
                }
            }
        }
        symbols
    }

    /// Returns a lazy depth-first iterator over every exported symbol.
    ///
    /// The iterator owns a mutable traversal stack: share the trie across
    /// threads freely, but give each thread its own iterator.
    pub fn iter(&self) -> ExportTrieIter<'a> {
        ExportTrieIter {
            trie: ExportTrie { data: self.data },
            stack: if self.data.is_empty() {
                Vec::new()
            } else {
                vec![(0, String::new())]
            },
            visited: 0,
            failed: false,
        }
    }

    /// Parses the node at `offset`: optional terminal payload plus
    /// resolved child edges. `want_terminal` skips payload decoding when
    /// the caller only needs the edges.
    fn parse_node(&self, offset: usize, want_terminal: bool) -> Result<ParsedNode> {
        if offset >= self.data.len() {
            return Err(Error::UnexpectedEndOfTrie { offset });
        }

        let mut cursor = ParseCursor::new(self.data);
        cursor.seek(offset)?;

        let terminal_size = cursor.read_uleb128()? as usize;
        let terminal = if terminal_size > 0 {
            let payload = cursor.take(terminal_size).map_err(|_| {
                Error::UnexpectedEndOfTrie {
                    offset: cursor.position(),
                }
            })?;
            if want_terminal {
                Some(TerminalPayload::parse(payload)?)
            } else {
                None
            }
        } else {
            None
        };

        let child_count = cursor.read_u8().map_err(|_| Error::UnexpectedEndOfTrie {
            offset: cursor.position(),
        })? as usize;

        let mut edges = Vec::with_capacity(child_count);
        for _ in 0..child_count {
            let label = cursor.read_nul_string()?;
            if label.is_empty() {
                return Err(Error::trie(format!(
                    "empty edge label at offset {:#x}",
                    cursor.position()
                )));
            }
            let child_offset = cursor.read_uleb128()? as usize;
            if child_offset >= self.data.len() {
                return Err(Error::UnexpectedEndOfTrie {
                    offset: child_offset,
                });
            }
            edges.push((label, child_offset));
        }

        Ok(ParsedNode { terminal, edges })
    }
}

struct ParsedNode {
    terminal: Option<TerminalPayload>,
    edges: Vec<Edge>,
}

/// Decoded terminal payload, still missing its name.
struct TerminalPayload {
    flags: ExportFlags,
    offset: Option<u64>,
    reexport_ordinal: Option<u64>,
    imported_name: Option<String>,
    resolver_offset: Option<u64>,
}

impl TerminalPayload {
    fn parse(payload: &[u8]) -> Result<Self> {
        let mut cursor = ParseCursor::new(payload);
        let flags = ExportFlags(cursor.read_uleb128()?);
        flags.kind()?;

        if flags.is_reexport() {
            let ordinal = cursor.read_uleb128()?;
            let imported = cursor.read_nul_string()?;
            Ok(Self {
                flags,
                offset: None,
                reexport_ordinal: Some(ordinal),
                imported_name: (!imported.is_empty()).then_some(imported),
                resolver_offset: None,
            })
        } else {
            let offset = cursor.read_uleb128()?;
            let resolver_offset = if flags.is_stub_and_resolver() {
                Some(cursor.read_uleb128()?)
            } else {
                None
            };
            Ok(Self {
                flags,
                offset: Some(offset),
                reexport_ordinal: None,
                imported_name: None,
                resolver_offset,
            })
        }
    }

    fn into_symbol(self, name: String) -> ExportSymbol {
        ExportSymbol {
            name,
            flags: self.flags,
            offset: self.offset,
            reexport_ordinal: self.reexport_ordinal,
            imported_name: self.imported_name,
            resolver_offset: self.resolver_offset,
        }
    }
}

// =============================================================================
// Lazy Iterator
// =============================================================================

/// Depth-first iterator over a trie's exported symbols.
///
/// Holds a mutable stack of pending `(node_offset, prefix)` pairs; not
/// shareable across threads. A parse error ends the iteration after being
/// yielded once.
pub struct ExportTrieIter<'a> {
    trie: ExportTrie<'a>,
    stack: Vec<(usize, String)>,
    visited: usize,
    failed: bool,
}

impl Iterator for ExportTrieIter<'_> {
    type Item = Result<ExportSymbol>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        while let Some((offset, prefix)) = self.stack.pop() {
            // A tree never revisits a node; more visits than the trie has
            // bytes means the offsets form a cycle.
            self.visited += 1;
            if self.visited > self.trie.data.len() {
                self.failed = true;
                return Some(Err(Error::trie(
                    "node offsets form a cycle".to_string(),
                )));
            }

            let node = match self.trie.parse_node(offset, true) {
                Ok(node) => node,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            };

            // Reverse push keeps children in on-disk order.
            for (label, child_offset) in node.edges.into_iter().rev() {
                if prefix.len() + label.len() > MAX_SYMBOL_NAME_LEN {
                    self.failed = true;
                    return Some(Err(Error::trie(format!(
                        "symbol name exceeds {MAX_SYMBOL_NAME_LEN} bytes"
                    ))));
                }
                let mut child_prefix = String::with_capacity(prefix.len() + label.len());
                child_prefix.push_str(&prefix);
                child_prefix.push_str(&label);
                self.stack.push((child_offset, child_prefix));
            }

            if let Some(payload) = node.terminal {
                return Some(Ok(payload.into_symbol(prefix)));
            }
        }

        None
    }
}
