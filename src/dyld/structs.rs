//! Dyld shared cache wire records.
//!
//! Fixed-layout structures matching the on-disk format, decoded zero-copy
//! via the `zerocopy` crate. All integers are little-endian unsigned. Each
//! record carries a `SIZE` constant naming its wire width; table readers
//! multiply by it under checked arithmetic.

use std::fmt;

use bitflags::bitflags;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

// =============================================================================
// Mapping Records
// =============================================================================

/// Basic mapping entry: how one contiguous region of cache bytes is laid
/// out in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct MappingInfo {
    /// Virtual memory address
    pub address: u64,
    /// Size in bytes
    pub size: u64,
    /// File offset
    pub file_offset: u64,
    /// Maximum memory protection
    pub max_prot: u32,
    /// Initial memory protection
    pub init_prot: u32,
}

impl MappingInfo {
    /// Wire size in bytes.
    pub const SIZE: usize = 32;
}

/// Extended mapping entry with per-mapping slide info.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct MappingAndSlideInfo {
    /// Virtual memory address
    pub address: u64,
    /// Size in bytes
    pub size: u64,
    /// File offset
    pub file_offset: u64,
    /// File offset of this mapping's slide info (0 if none)
    pub slide_info_file_offset: u64,
    /// Size of this mapping's slide info (0 if none)
    pub slide_info_file_size: u64,
    /// Mapping flags, see [`MappingFlags`]
    pub flags: u64,
    /// Maximum memory protection
    pub max_prot: u32,
    /// Initial memory protection
    pub init_prot: u32,
}

impl MappingAndSlideInfo {
    /// Wire size in bytes.
    pub const SIZE: usize = 56;

    /// Returns the decoded flag set.
    pub fn mapping_flags(&self) -> MappingFlags {
        MappingFlags::from_bits_truncate(self.flags)
    }

    /// A mapping has slide info exactly when its slide region is non-empty.
    #[inline]
    pub fn has_slide_info(&self) -> bool {
        self.slide_info_file_size > 0
    }
}

bitflags! {
    /// Flags carried by extended mapping entries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MappingFlags: u64 {
        /// Mapping contains authenticated (PAC) pointers
        const AUTH_DATA = 1 << 0;
        /// Mapping contains dirty data
        const DIRTY_DATA = 1 << 1;
        /// Mapping contains const data
        const CONST_DATA = 1 << 2;
        /// Mapping holds text stubs
        const TEXT_STUBS = 1 << 3;
        /// Mapping holds the dynamic config region
        const DYNAMIC_CONFIG_DATA = 1 << 4;
        /// Mapping is read-only after fixups
        const READ_ONLY_DATA = 1 << 5;
        /// Mapping holds TPRO const data
        const CONST_TPRO_DATA = 1 << 6;
    }
}

// =============================================================================
// Image Records
// =============================================================================

/// Information about one dylib in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct ImageInfo {
    /// Unslid address of the Mach-O header
    pub address: u64,
    /// Modification time
    pub mod_time: u64,
    /// Inode
    pub inode: u64,
    /// Offset of the path string within the same file as this record
    pub path_file_offset: u32,
    /// Padding
    pub pad: u32,
}

impl ImageInfo {
    /// Wire size in bytes.
    pub const SIZE: usize = 32;
}

/// Text-segment info for one image; parallel to the image array when both
/// are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct ImageTextInfo {
    /// UUID of the image
    pub uuid: [u8; 16],
    /// Unslid load address of the image
    pub load_address: u64,
    /// Size of the text segment
    pub text_segment_size: u32,
    /// Offset of the path string
    pub path_offset: u32,
}

impl ImageTextInfo {
    /// Wire size in bytes.
    pub const SIZE: usize = 32;
}

// =============================================================================
// Subcache Records
// =============================================================================

/// Subcache entry, v1 shape (no embedded suffix; the file suffix is
/// synthesised as `.<1-based-index>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SubCacheEntryV1 {
    /// UUID of the subcache file
    pub uuid: [u8; 16],
    /// VM offset of the subcache from the main cache base
    pub cache_vm_offset: u64,
}

impl SubCacheEntryV1 {
    /// Wire size in bytes.
    pub const SIZE: usize = 24;
}

/// Subcache entry, v2 shape (embedded NUL-padded file suffix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SubCacheEntryV2 {
    /// UUID of the subcache file
    pub uuid: [u8; 16],
    /// VM offset of the subcache from the main cache base
    pub cache_vm_offset: u64,
    /// File suffix, NUL-padded (e.g. ".01", ".25.dylddata")
    pub file_suffix: [u8; 32],
}

impl SubCacheEntryV2 {
    /// Wire size in bytes.
    pub const SIZE: usize = 56;

    /// Returns the file suffix as a string, stopping at the first NUL.
    pub fn suffix_str(&self) -> &str {
        let end = self.file_suffix.iter().position(|&b| b == 0).unwrap_or(32);
        std::str::from_utf8(&self.file_suffix[..end]).unwrap_or("")
    }
}

/// A decoded subcache entry, independent of its wire shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubCacheEntry {
    /// UUID the subcache file must carry
    pub uuid: [u8; 16],
    /// VM offset of the subcache from the main cache base
    pub cache_vm_offset: u64,
    /// File suffix appended to the main cache path
    pub file_suffix: String,
}

// =============================================================================
// Local Symbols Records
// =============================================================================

/// Local symbols region header. All offsets are relative to the start of
/// the local-symbols region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct LocalSymbolsInfo {
    /// Offset to the nlist array
    pub nlist_offset: u32,
    /// Number of nlist entries
    pub nlist_count: u32,
    /// Offset to the string pool
    pub strings_offset: u32,
    /// Size of the string pool
    pub strings_size: u32,
    /// Offset to the per-image entries
    pub entries_offset: u32,
    /// Number of per-image entries
    pub entries_count: u32,
}

impl LocalSymbolsInfo {
    /// Wire size in bytes.
    pub const SIZE: usize = 24;
}

/// Per-image local symbols entry, 32-bit dylib offset shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct LocalSymbolsEntry32 {
    /// File offset of the image's Mach-O header
    pub dylib_offset: u32,
    /// Index of the image's first nlist record
    pub nlist_start_index: u32,
    /// Number of nlist records for the image
    pub nlist_count: u32,
}

impl LocalSymbolsEntry32 {
    /// Wire size in bytes.
    pub const SIZE: usize = 12;
}

/// Per-image local symbols entry, 64-bit dylib offset shape (newer caches).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct LocalSymbolsEntry64 {
    /// File offset of the image's Mach-O header
    pub dylib_offset: u64,
    /// Index of the image's first nlist record
    pub nlist_start_index: u32,
    /// Number of nlist records for the image
    pub nlist_count: u32,
}

impl LocalSymbolsEntry64 {
    /// Wire size in bytes.
    pub const SIZE: usize = 16;
}

/// One decoded per-image entry, independent of its wire shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSymbolsEntry {
    /// File offset of the image's Mach-O header
    pub dylib_offset: u64,
    /// Index of the image's first nlist record
    pub nlist_start_index: u32,
    /// Number of nlist records for the image
    pub nlist_count: u32,
}

impl From<LocalSymbolsEntry32> for LocalSymbolsEntry {
    fn from(e: LocalSymbolsEntry32) -> Self {
        Self {
            dylib_offset: e.dylib_offset as u64,
            nlist_start_index: e.nlist_start_index,
            nlist_count: e.nlist_count,
        }
    }
}

impl From<LocalSymbolsEntry64> for LocalSymbolsEntry {
    fn from(e: LocalSymbolsEntry64) -> Self {
        Self {
            dylib_offset: e.dylib_offset,
            nlist_start_index: e.nlist_start_index,
            nlist_count: e.nlist_count,
        }
    }
}

// =============================================================================
// Slide Info Headers
// =============================================================================

/// Slide info header, version 1 (legacy TOC format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SlideInfoHeader1 {
    /// Version (1)
    pub version: u32,
    /// Offset of the table of contents
    pub toc_offset: u32,
    /// Number of TOC entries
    pub toc_count: u32,
    /// Offset of the entries array
    pub entries_offset: u32,
    /// Number of entries
    pub entries_count: u32,
    /// Size of one entry
    pub entries_size: u32,
}

impl SlideInfoHeader1 {
    /// Wire size in bytes.
    pub const SIZE: usize = 24;
}

/// Slide info header, version 2 (arm64, 4K pages).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SlideInfoHeader2 {
    /// Version (2)
    pub version: u32,
    /// Page size
    pub page_size: u32,
    /// Offset of the page-starts array
    pub page_starts_offset: u32,
    /// Number of page-starts entries
    pub page_starts_count: u32,
    /// Offset of the page-extras array
    pub page_extras_offset: u32,
    /// Number of page-extras entries
    pub page_extras_count: u32,
    /// Mask isolating the delta field of an encoded pointer
    pub delta_mask: u64,
    /// Value added to rebased pointers
    pub value_add: u64,
}

impl SlideInfoHeader2 {
    /// Wire size in bytes.
    pub const SIZE: usize = 40;

    /// Mask isolating the value portion of an encoded pointer.
    pub fn value_mask(&self) -> u64 {
        !self.delta_mask
    }

    /// Shift amount for the delta field.
    pub fn delta_shift(&self) -> u32 {
        self.delta_mask.trailing_zeros()
    }
}

/// Slide info header, version 3 (arm64e with PAC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SlideInfoHeader3 {
    /// Version (3)
    pub version: u32,
    /// Page size
    pub page_size: u32,
    /// Number of page-starts entries
    pub page_starts_count: u32,
    /// Padding
    pub _pad: u32,
    /// Value added to authenticated pointers
    pub auth_value_add: u64,
    // Followed by page_starts[page_starts_count] of u16
}

impl SlideInfoHeader3 {
    /// Wire size in bytes (page-starts array follows).
    pub const SIZE: usize = 24;
}

/// Slide info header, version 4 (watchOS arm64_32).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SlideInfoHeader4 {
    /// Version (4)
    pub version: u32,
    /// Page size
    pub page_size: u32,
    /// Offset of the page-starts array
    pub page_starts_offset: u32,
    /// Number of page-starts entries
    pub page_starts_count: u32,
    /// Offset of the page-extras array
    pub page_extras_offset: u32,
    /// Number of page-extras entries
    pub page_extras_count: u32,
    /// Mask isolating the delta field of an encoded pointer
    pub delta_mask: u64,
    /// Value added to rebased pointers
    pub value_add: u64,
}

impl SlideInfoHeader4 {
    /// Wire size in bytes.
    pub const SIZE: usize = 40;
}

/// Slide info header, version 5 (arm64e, iOS 18+).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SlideInfoHeader5 {
    /// Version (5)
    pub version: u32,
    /// Page size
    pub page_size: u32,
    /// Number of page-starts entries
    pub page_starts_count: u32,
    /// Padding
    pub _pad: u32,
    /// Value added to rebased pointers
    pub value_add: u64,
    // Followed by page_starts[page_starts_count] of u16
}

impl SlideInfoHeader5 {
    /// Wire size in bytes (page-starts array follows).
    pub const SIZE: usize = 24;
}

// =============================================================================
// UUID Formatting
// =============================================================================

/// Formats a raw UUID as the conventional hex string.
pub fn uuid_to_string(uuid: &[u8; 16]) -> String {
    format!(
        "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
        uuid[0], uuid[1], uuid[2], uuid[3],
        uuid[4], uuid[5],
        uuid[6], uuid[7],
        uuid[8], uuid[9],
        uuid[10], uuid[11], uuid[12], uuid[13], uuid[14], uuid[15]
    )
}

/// Wrapper displaying a UUID without allocating the formatted string.
pub struct UuidDisplay<'a>(pub &'a [u8; 16]);

impl fmt::Display for UuidDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&uuid_to_string(self.0))
    }
}
