//! Abstract byte sources backing cache files.
//!
//! A [`ByteSource`] is a stateless random-access reader: total size plus a
//! clamped read. Everything above it (header decoding, table parsing,
//! cross-file reads) stays generic over the backend, so a cache can live in
//! a memory buffer, a memory-mapped file, or behind a remote reader.
//!
//! Reads are clamped, not checked: an out-of-range offset yields an empty
//! slice and EOF truncates. Bounds enforcement belongs to callers that know
//! what the bytes mean. Only real I/O failures surface as errors.

use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{Error, Result};
use crate::util::memchr_null;

/// Default cap for NUL-terminated string reads (256 KiB).
pub const MAX_STRING_BYTES: usize = 256 * 1024;

/// Chunk size for probing NUL-terminated strings (4 KiB).
pub const STRING_CHUNK_SIZE: usize = 4096;

/// A boxed byte source, as handed out by a [`SourceOpener`].
pub type BoxedSource = Box<dyn ByteSource>;

/// Resolves a sibling file path to a byte source.
///
/// Returning `Ok(None)` means "file does not exist"; any other failure must
/// be raised as an I/O error.
pub type SourceOpener<'a> = dyn Fn(&Path) -> Result<Option<BoxedSource>> + 'a;

/// Random-access reader over the bytes of one cache file.
///
/// Implementations must be safe for concurrent `read_at` calls; wrappers
/// around a shared file handle serialise internally.
pub trait ByteSource: Send + Sync {
    /// Total size of the source in bytes.
    fn size(&self) -> u64;

    /// Reads up to `len` bytes starting at `offset`.
    ///
    /// Returns exactly `len` bytes unless EOF truncates the read; an
    /// offset at or past the end yields an empty slice. Implementations
    /// may return borrowed or owned bytes; callers must not assume
    /// zero-based indexing into the result.
    fn read_at(&self, offset: u64, len: usize) -> Result<Cow<'_, [u8]>>;

    /// Reads exactly `len` bytes or fails with [`Error::RangeOutOfBounds`].
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Cow<'_, [u8]>> {
        let bytes = self.read_at(offset, len)?;
        if bytes.len() != len {
            return Err(Error::range(offset, len as u64, self.size()));
        }
        Ok(bytes)
    }

    /// Reads a NUL-terminated string starting at `offset`.
    ///
    /// Probes in [`STRING_CHUNK_SIZE`] chunks and stops at the first NUL
    /// byte or after `max_bytes`, whichever comes first. Invalid UTF-8 is
    /// replaced, never rejected. An out-of-range offset yields an empty
    /// string.
    fn read_nul_terminated_string(&self, offset: u64, max_bytes: usize) -> Result<String> {
        let mut collected: Vec<u8> = Vec::new();
        let mut cursor = offset;

        while collected.len() < max_bytes {
            let want = STRING_CHUNK_SIZE.min(max_bytes - collected.len());
            let chunk = self.read_at(cursor, want)?;
            if chunk.is_empty() {
                break;
            }
            let nul = memchr_null(&chunk);
            collected.extend_from_slice(&chunk[..nul]);
            if nul < chunk.len() {
                break;
            }
            cursor += chunk.len() as u64;
        }

        Ok(String::from_utf8_lossy(&collected).into_owned())
    }
}

// =============================================================================
// In-Memory Source
// =============================================================================

/// A byte source over an owned in-memory buffer.
///
/// The backing of choice for tests and small inputs.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    /// Wraps a byte buffer.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl From<Vec<u8>> for MemorySource {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl ByteSource for MemorySource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, len: usize) -> Result<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(clamp_slice(&self.data, offset, len)))
    }
}

// =============================================================================
// Memory-Mapped File Source
// =============================================================================

/// A byte source over a memory-mapped file.
#[derive(Debug)]
pub struct MmapSource {
    mmap: Mmap,
    path: PathBuf,
}

impl MmapSource {
    /// Opens and maps the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mmap = unsafe { Mmap::map(&file) }?;
        Ok(Self { mmap, path })
    }

    /// Returns the path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for MmapSource {
    fn size(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn read_at(&self, offset: u64, len: usize) -> Result<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(clamp_slice(&self.mmap, offset, len)))
    }
}

/// Returns an opener backed by [`MmapSource`].
///
/// A missing file maps to `Ok(None)`; every other open failure is an I/O
/// error.
pub fn mmap_opener() -> impl Fn(&Path) -> Result<Option<BoxedSource>> {
    |path: &Path| match MmapSource::open(path) {
        Ok(source) => Ok(Some(Box::new(source) as BoxedSource)),
        Err(Error::FileReadError { source }) if source.kind() == std::io::ErrorKind::NotFound => {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Clamps `(offset, len)` against a slice, yielding the in-range window.
fn clamp_slice(data: &[u8], offset: u64, len: usize) -> &[u8] {
    if offset >= data.len() as u64 {
        return &[];
    }
    let start = offset as usize;
    let end = start.saturating_add(len).min(data.len());
    &data[start..end]
}
