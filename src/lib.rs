//! dscview - a read-only inspector for Apple's dyld shared cache.
//!
//! The dyld shared cache packs hundreds of system libraries and their
//! metadata into one or more memory-mapped files. This library parses the
//! container: header and mapping metadata, the cached image list,
//! subcache topology, VM-to-file address resolution across a split cache,
//! exported and local symbol enumeration, and PC symbolication.
//!
//! Everything is bounds-checked against the byte source it came from;
//! truncated or hostile input yields typed errors, never a fault. All
//! parsed structures are immutable after open and safe to share across
//! threads (the lazy export-trie iterator is the one per-thread object).
//!
//! # Example
//!
//! ```no_run
//! use dscview::{mmap_opener, MultiCacheReader, ReaderOptions};
//!
//! fn main() -> dscview::Result<()> {
//!     let opener = mmap_opener();
//!     let cache = MultiCacheReader::open(
//!         "/System/Volumes/Preboot/Cryptexes/OS/System/Library/dyld/dyld_shared_cache_arm64e",
//!         &opener,
//!         ReaderOptions::default(),
//!     )?;
//!
//!     for path in cache.image_paths()? {
//!         println!("{path}");
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cursor;
pub mod dyld;
pub mod error;
pub mod macho;
pub mod source;
pub mod util;

// Re-export main types
pub use dyld::{
    Architecture, CacheHeader, ExportSymbol, ExportTrie, LocalSymbol, MultiCacheReader,
    ReaderOptions, SingleCacheView, SlideInfo, SymbolicationResult, VMAddressResolver,
};
pub use error::{Error, Result};
pub use source::{mmap_opener, ByteSource, MemorySource, MmapSource};
