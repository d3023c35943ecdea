//! Error types for dyld shared cache inspection.
//!
//! All parsing operations return typed errors; untrusted bytes never cause
//! panics or memory faults. Each variant names the condition that produced it.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for cache inspection operations.
#[derive(Error, Debug)]
pub enum Error {
    // ==================== Header Errors ====================
    #[error("invalid dyld cache magic: {0:?}")]
    InvalidMagic(String),

    #[error("unsupported cache architecture: {0:?}")]
    UnsupportedArchitecture(String),

    #[error("cache header too small: need {needed:#x} bytes, have {available:#x}")]
    HeaderTooSmall { needed: usize, available: usize },

    #[error("unsupported cache format version: {0}")]
    UnsupportedFormatVersion(u32),

    // ==================== Bounds Errors ====================
    #[error("offset {offset:#x} out of bounds (size: {size:#x})")]
    OffsetOutOfBounds { offset: u64, size: u64 },

    #[error("range {offset:#x}+{len:#x} out of bounds (size: {size:#x})")]
    RangeOutOfBounds { offset: u64, len: u64, size: u64 },

    #[error("image index {index} out of bounds (total: {total})")]
    ImageIndexOutOfBounds { index: usize, total: usize },

    #[error("invalid string offset {offset:#x}")]
    InvalidStringOffset { offset: u64 },

    #[error("address {addr:#x} not mapped by any cache file")]
    VmAddressNotMapped { addr: u64 },

    // ==================== Structure Errors ====================
    #[error("invalid mapping info at offset {offset:#x}")]
    InvalidMappingInfo { offset: u64 },

    #[error("invalid image info at offset {offset:#x}")]
    InvalidImageInfo { offset: u64 },

    #[error("invalid local symbols info: {reason}")]
    InvalidLocalSymbolsInfo { reason: String },

    // ==================== Export Trie Errors ====================
    #[error("invalid export trie format: {0}")]
    InvalidExportTrieFormat(String),

    #[error("unexpected end of export trie at offset {offset:#x}")]
    UnexpectedEndOfTrie { offset: usize },

    #[error("invalid ULEB128 at offset {offset:#x}")]
    InvalidUleb128 { offset: usize },

    // ==================== Mach-O Errors ====================
    #[error("invalid Mach-O: {0}")]
    InvalidMachO(String),

    // ==================== Slide Info Errors ====================
    #[error("unknown slide info version: {0}")]
    UnknownSlideInfoVersion(u32),

    #[error("slide info parse error: {0}")]
    SlideInfoParseError(String),

    // ==================== Multi-Cache Errors ====================
    #[error("subcache file not found: {path}")]
    SubCacheNotFound { path: PathBuf },

    #[error("symbols file not found: {path}")]
    SymbolsFileNotFound { path: PathBuf },

    #[error("cache UUID mismatch for '{path}': expected {expected}, got {actual}")]
    SubCacheUuidMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ==================== Symbol Errors ====================
    #[error("symbol not found: {name}")]
    SymbolNotFound { name: String },

    #[error("invalid symbol type: {0:#x}")]
    InvalidSymbolType(u8),

    #[error("invalid export flags: {0:#x}")]
    InvalidExportFlags(u64),

    // ==================== I/O Errors ====================
    #[error("file read error: {source}")]
    FileReadError {
        #[source]
        source: std::io::Error,
    },

    #[error("file too small: need {needed:#x} bytes, have {available:#x}")]
    FileTooSmall { needed: u64, available: u64 },
}

/// A specialized Result type for cache inspection operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::FileReadError { source }
    }
}

impl Error {
    /// Creates a range error from checked-arithmetic context.
    #[inline]
    pub fn range(offset: u64, len: u64, size: u64) -> Self {
        Error::RangeOutOfBounds { offset, len, size }
    }

    /// Creates an invalid-Mach-O error with a formatted reason.
    #[inline]
    pub fn macho(reason: impl Into<String>) -> Self {
        Error::InvalidMachO(reason.into())
    }

    /// Creates an invalid-trie error with a formatted reason.
    #[inline]
    pub fn trie(reason: impl Into<String>) -> Self {
        Error::InvalidExportTrieFormat(reason.into())
    }
}
