//! Local (non-exported) symbol resolution.
//!
//! Local symbols for every image live in one central region: a header,
//! a per-image entry table, one big nlist array, and a shared string
//! pool. The pool can run to hundreds of megabytes, so it is streamed
//! into a temp file and memory-mapped; pools under 4 MiB stay in memory.
//! One [`LocalSymbolsContext`] is built per region and reused across
//! every image a caller symbolicates.

use std::io::Write;

use memmap2::Mmap;
use tempfile::NamedTempFile;
use tracing::debug;
use zerocopy::FromBytes;

use super::structs::{
    LocalSymbolsEntry, LocalSymbolsEntry32, LocalSymbolsEntry64, LocalSymbolsInfo,
};
use crate::error::{Error, Result};
use crate::macho::Nlist64;
use crate::source::ByteSource;
use crate::util::memchr_null;

/// Pools below this size are held in memory instead of a temp file.
const SMALL_POOL_LIMIT: u64 = 4 * 1024 * 1024;

/// Streaming chunk size for temp-file spills.
const POOL_CHUNK_SIZE: usize = 4 * 1024 * 1024;

// =============================================================================
// String Pool
// =============================================================================

/// The local-symbols string pool, memory-mapped or held in memory.
///
/// Immutable after construction. Dropping the pool deletes any temp file
/// that was created to back it; deletion failures are ignored.
#[derive(Debug)]
pub struct LazyStringPool {
    backing: PoolBacking,
}

#[derive(Debug)]
enum PoolBacking {
    InMemory(Vec<u8>),
    // The temp file must outlive its mapping; drop order removes the map
    // first, then the file (which unlinks it).
    Mapped { mmap: Mmap, _file: NamedTempFile },
}

impl LazyStringPool {
    /// Builds a pool over `total_size` bytes at `base_offset` in the
    /// source.
    ///
    /// Large pools stream through a fresh temp file in 4 MiB chunks and
    /// are then memory-mapped; any failure on the way removes the partial
    /// file before the error propagates.
    pub fn new<S: ByteSource + ?Sized>(
        source: &S,
        base_offset: u64,
        total_size: u64,
    ) -> Result<Self> {
        if total_size < SMALL_POOL_LIMIT {
            let bytes = source.read_exact_at(base_offset, total_size as usize)?;
            return Ok(Self {
                backing: PoolBacking::InMemory(bytes.into_owned()),
            });
        }

        let mut file = NamedTempFile::new()?;
        let mut written = 0u64;
        while written < total_size {
            let want = POOL_CHUNK_SIZE.min((total_size - written) as usize);
            let chunk = source.read_exact_at(base_offset + written, want)?;
            file.write_all(&chunk)?;
            written += want as u64;
        }
        file.flush()?;

        let mmap = unsafe { Mmap::map(file.as_file()) }?;
        debug!(size = total_size, "string pool spilled to temp file");
        Ok(Self {
            backing: PoolBacking::Mapped { mmap, _file: file },
        })
    }

    /// The pool's bytes.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        match &self.backing {
            PoolBacking::InMemory(bytes) => bytes,
            PoolBacking::Mapped { mmap, .. } => mmap,
        }
    }

    /// Size of the pool in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.bytes().len() as u64
    }

    /// Reads the NUL-terminated string at `pool_offset`.
    ///
    /// Scans forward to the first NUL; invalid UTF-8 is replaced. An
    /// out-of-bounds offset yields the empty string.
    pub fn string_at(&self, pool_offset: u64) -> String {
        let bytes = self.bytes();
        if pool_offset >= bytes.len() as u64 {
            return String::new();
        }
        let tail = &bytes[pool_offset as usize..];
        let end = memchr_null(tail);
        String::from_utf8_lossy(&tail[..end]).into_owned()
    }
}

// =============================================================================
// Shared Context
// =============================================================================

/// One local symbol: a resolved name plus its nlist record fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSymbol {
    /// Symbol name from the shared pool
    pub name: String,
    /// Symbol value (an unslid address for section symbols)
    pub value: u64,
    /// Raw nlist type byte
    pub n_type: u8,
    /// Section number
    pub n_sect: u8,
    /// Description bits
    pub n_desc: u16,
}

/// Decoded local-symbols region: header, derived offsets, and the shared
/// string pool. Build once, query per image.
#[derive(Debug)]
pub struct LocalSymbolsContext {
    info: LocalSymbolsInfo,
    entries_offset: u64,
    nlist_offset: u64,
    use_64bit_entries: bool,
    pool: LazyStringPool,
}

impl LocalSymbolsContext {
    /// Builds a context over the local-symbols region at `base_offset`.
    ///
    /// `use_64bit_entries` selects the per-image entry width; the format
    /// does not self-describe it.
    pub fn new<S: ByteSource + ?Sized>(
        source: &S,
        base_offset: u64,
        use_64bit_entries: bool,
    ) -> Result<Self> {
        let bytes = source.read_exact_at(base_offset, LocalSymbolsInfo::SIZE)?;
        let info = LocalSymbolsInfo::read_from_bytes(&bytes)
            .map_err(|_| Error::InvalidLocalSymbolsInfo {
                reason: "truncated info header".into(),
            })?;

        let strings_start = base_offset
            .checked_add(info.strings_offset as u64)
            .ok_or_else(|| Error::InvalidLocalSymbolsInfo {
                reason: "strings offset overflows".into(),
            })?;
        let strings_end = strings_start
            .checked_add(info.strings_size as u64)
            .ok_or_else(|| Error::InvalidLocalSymbolsInfo {
                reason: "strings size overflows".into(),
            })?;
        if strings_end > source.size() {
            return Err(Error::InvalidLocalSymbolsInfo {
                reason: format!(
                    "string pool {:#x}..{:#x} exceeds source size {:#x}",
                    strings_start,
                    strings_end,
                    source.size()
                ),
            });
        }

        let entries_offset = base_offset
            .checked_add(info.entries_offset as u64)
            .ok_or_else(|| Error::InvalidLocalSymbolsInfo {
                reason: "entries offset overflows".into(),
            })?;
        let nlist_offset = base_offset
            .checked_add(info.nlist_offset as u64)
            .ok_or_else(|| Error::InvalidLocalSymbolsInfo {
                reason: "nlist offset overflows".into(),
            })?;

        let pool = LazyStringPool::new(source, strings_start, info.strings_size as u64)?;
        debug!(
            entries = info.entries_count,
            nlists = info.nlist_count,
            pool_size = info.strings_size,
            "local symbols context ready"
        );

        Ok(Self {
            info,
            entries_offset,
            nlist_offset,
            use_64bit_entries,
            pool,
        })
    }

    /// The region header.
    #[inline]
    pub fn info(&self) -> &LocalSymbolsInfo {
        &self.info
    }

    /// The shared string pool.
    #[inline]
    pub fn pool(&self) -> &LazyStringPool {
        &self.pool
    }

    /// Number of images the region describes.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.info.entries_count as usize
    }

    /// Reads the per-image entry at `index`.
    pub fn entry<S: ByteSource + ?Sized>(
        &self,
        source: &S,
        index: usize,
    ) -> Result<LocalSymbolsEntry> {
        if index >= self.info.entries_count as usize {
            return Err(Error::ImageIndexOutOfBounds {
                index,
                total: self.info.entries_count as usize,
            });
        }

        let entry_size = if self.use_64bit_entries {
            LocalSymbolsEntry64::SIZE
        } else {
            LocalSymbolsEntry32::SIZE
        };
        let offset = self.entries_offset + (index as u64) * (entry_size as u64);
        let bytes = source.read_exact_at(offset, entry_size)?;

        let entry = if self.use_64bit_entries {
            LocalSymbolsEntry64::read_from_bytes(&bytes)
                .map_err(|_| Error::InvalidLocalSymbolsInfo {
                    reason: format!("malformed entry {index}"),
                })?
                .into()
        } else {
            LocalSymbolsEntry32::read_from_bytes(&bytes)
                .map_err(|_| Error::InvalidLocalSymbolsInfo {
                    reason: format!("malformed entry {index}"),
                })?
                .into()
        };
        Ok(entry)
    }

    /// Resolves the local symbols of image `index`, preserving the
    /// on-disk nlist order. Records whose pool name is empty are dropped.
    pub fn symbols_for_image<S: ByteSource + ?Sized>(
        &self,
        source: &S,
        index: usize,
    ) -> Result<Vec<LocalSymbol>> {
        let entry = self.entry(source, index)?;

        let in_bounds = entry
            .nlist_start_index
            .checked_add(entry.nlist_count)
            .is_some_and(|end| end <= self.info.nlist_count);
        if !in_bounds {
            return Err(Error::InvalidLocalSymbolsInfo {
                reason: format!(
                    "entry {index} claims nlists {}..+{} of {}",
                    entry.nlist_start_index, entry.nlist_count, self.info.nlist_count
                ),
            });
        }

        let start = self.nlist_offset
            + (entry.nlist_start_index as u64) * (Nlist64::SIZE as u64);
        let byte_len = (entry.nlist_count as usize) * Nlist64::SIZE;
        let bytes = source.read_exact_at(start, byte_len)?;

        let mut symbols = Vec::with_capacity(entry.nlist_count as usize);
        for chunk in bytes.chunks_exact(Nlist64::SIZE) {
            let nlist = Nlist64::read_from_bytes(chunk).map_err(|_| {
                Error::InvalidLocalSymbolsInfo {
                    reason: "malformed nlist record".into(),
                }
            })?;
            let name = self.pool.string_at(nlist.n_strx as u64);
            if name.is_empty() {
                continue;
            }
            symbols.push(LocalSymbol {
                name,
                value: nlist.n_value,
                n_type: nlist.n_type,
                n_sect: nlist.n_sect,
                n_desc: nlist.n_desc,
            });
        }
        Ok(symbols)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::source::MemorySource;
    use zerocopy::IntoBytes;

    /// Lays out a local-symbols region at the given base inside a buffer:
    /// info header, entries, nlists, strings.
    pub(crate) fn build_region(
        base: usize,
        entries: &[LocalSymbolsEntry64],
        nlists: &[Nlist64],
        strings: &[u8],
        use_64bit: bool,
    ) -> Vec<u8> {
        let mut entry_bytes = Vec::new();
        for e in entries {
            if use_64bit {
                entry_bytes.extend_from_slice(e.as_bytes());
            } else {
                let narrow = LocalSymbolsEntry32 {
                    dylib_offset: e.dylib_offset as u32,
                    nlist_start_index: e.nlist_start_index,
                    nlist_count: e.nlist_count,
                };
                entry_bytes.extend_from_slice(narrow.as_bytes());
            }
        }
        let mut nlist_bytes = Vec::new();
        for n in nlists {
            nlist_bytes.extend_from_slice(n.as_bytes());
        }

        let entries_offset = LocalSymbolsInfo::SIZE as u32;
        let nlist_offset = entries_offset + entry_bytes.len() as u32;
        let strings_offset = nlist_offset + nlist_bytes.len() as u32;
        let info = LocalSymbolsInfo {
            nlist_offset,
            nlist_count: nlists.len() as u32,
            strings_offset,
            strings_size: strings.len() as u32,
            entries_offset,
            entries_count: entries.len() as u32,
        };

        let mut buf = vec![0u8; base];
        buf.extend_from_slice(info.as_bytes());
        buf.extend_from_slice(&entry_bytes);
        buf.extend_from_slice(&nlist_bytes);
        buf.extend_from_slice(strings);
        buf
    }

    fn nlist(n_strx: u32, n_value: u64) -> Nlist64 {
        Nlist64 {
            n_strx,
            n_type: 0x0E, // N_SECT
            n_sect: 1,
            n_desc: 0,
            n_value,
        }
    }

    #[test]
    fn test_pool_string_at() {
        let source = MemorySource::new(b"\0_alpha\0_beta\0".to_vec());
        let pool = LazyStringPool::new(&source, 0, 14).unwrap();
        assert_eq!(pool.string_at(1), "_alpha");
        assert_eq!(pool.string_at(8), "_beta");
        assert_eq!(pool.string_at(0), "");
        assert_eq!(pool.string_at(1000), "");
    }

    #[test]
    fn test_pool_truncated_source() {
        let source = MemorySource::new(vec![0u8; 16]);
        assert!(matches!(
            LazyStringPool::new(&source, 8, 16),
            Err(Error::RangeOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_resolve_symbols_64bit_entries() {
        let strings = b"\0_local_a\0_local_b\0";
        let nlists = [nlist(1, 0x1_8000_1000), nlist(10, 0x1_8000_2000)];
        let entries = [LocalSymbolsEntry64 {
            dylib_offset: 0x4000,
            nlist_start_index: 0,
            nlist_count: 2,
        }];
        let buf = build_region(0x100, &entries, &nlists, strings, true);
        let source = MemorySource::new(buf);

        let ctx = LocalSymbolsContext::new(&source, 0x100, true).unwrap();
        assert_eq!(ctx.image_count(), 1);
        let symbols = ctx.symbols_for_image(&source, 0).unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "_local_a");
        assert_eq!(symbols[0].value, 0x1_8000_1000);
        assert_eq!(symbols[1].name, "_local_b");
    }

    #[test]
    fn test_resolve_symbols_32bit_entries() {
        let strings = b"\0_only\0";
        let nlists = [nlist(1, 0x1000)];
        let entries = [LocalSymbolsEntry64 {
            dylib_offset: 0x4000,
            nlist_start_index: 0,
            nlist_count: 1,
        }];
        let buf = build_region(0, &entries, &nlists, strings, false);
        let source = MemorySource::new(buf);

        let ctx = LocalSymbolsContext::new(&source, 0, false).unwrap();
        let symbols = ctx.symbols_for_image(&source, 0).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "_only");
    }

    #[test]
    fn test_empty_names_dropped() {
        // n_strx 0 points at the leading NUL: name resolves empty.
        let strings = b"\0_kept\0";
        let nlists = [nlist(0, 0x1000), nlist(1, 0x2000)];
        let entries = [LocalSymbolsEntry64 {
            dylib_offset: 0,
            nlist_start_index: 0,
            nlist_count: 2,
        }];
        let buf = build_region(0, &entries, &nlists, strings, true);
        let source = MemorySource::new(buf);

        let ctx = LocalSymbolsContext::new(&source, 0, true).unwrap();
        let symbols = ctx.symbols_for_image(&source, 0).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "_kept");
    }

    #[test]
    fn test_image_index_out_of_bounds() {
        let buf = build_region(0, &[], &[], b"\0", true);
        let source = MemorySource::new(buf);
        let ctx = LocalSymbolsContext::new(&source, 0, true).unwrap();
        assert!(matches!(
            ctx.symbols_for_image(&source, 0),
            Err(Error::ImageIndexOutOfBounds { index: 0, total: 0 })
        ));
    }

    #[test]
    fn test_entry_claims_too_many_nlists() {
        let strings = b"\0x\0";
        let nlists = [nlist(1, 0x1000)];
        let entries = [LocalSymbolsEntry64 {
            dylib_offset: 0,
            nlist_start_index: 0,
            nlist_count: 99,
        }];
        let buf = build_region(0, &entries, &nlists, strings, true);
        let source = MemorySource::new(buf);
        let ctx = LocalSymbolsContext::new(&source, 0, true).unwrap();
        assert!(matches!(
            ctx.symbols_for_image(&source, 0),
            Err(Error::InvalidLocalSymbolsInfo { .. })
        ));
    }

    #[test]
    fn test_strings_region_must_fit_source() {
        let mut buf = build_region(0, &[], &[], b"\0\0\0\0", true);
        // Claim a string pool bigger than the file.
        buf[8..12].copy_from_slice(&0x1000_0000u32.to_le_bytes());
        let source = MemorySource::new(buf);
        assert!(matches!(
            LocalSymbolsContext::new(&source, 0, true),
            Err(Error::InvalidLocalSymbolsInfo { .. })
        ));
    }
}
