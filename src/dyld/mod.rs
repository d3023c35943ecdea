//! Dyld shared cache parsing.
//!
//! The cache is a container packing hundreds of system libraries into a
//! few memory-mapped files. This module decodes it:
//!
//! - `structs`: the fixed on-disk records
//! - `header`: the version-tolerant main header
//! - `view`: one file's parsed metadata and address resolver
//! - `slide`: slide-info variants (which pointers get rebased)
//! - `trie`: export-trie walking
//! - `localsyms`: the central local-symbols region
//! - `reader`: the multi-file coordinator and symbolication
//!
//! # Split caches
//!
//! Since iOS 15 / macOS 12 a cache ships as several files: the main
//! cache, suffixed subcaches (`.01`, `.02`, …), and optionally a
//! `.symbols` sidecar holding local symbols. Each subcache is declared in
//! the main header together with the UUID its file must carry.

mod header;
mod localsyms;
mod reader;
mod resolver;
mod slide;
mod structs;
mod trie;
mod view;

pub use header::*;
pub use localsyms::*;
pub use reader::*;
pub use resolver::*;
pub use slide::*;
pub use structs::*;
pub use trie::*;
pub use view::*;
