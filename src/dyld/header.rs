//! Tolerant decoder for the main cache header.
//!
//! The header is a self-describing, append-only structure: newer OS
//! releases add fields at the end, and `mapping_offset` records where the
//! header stops and the tables begin. The decoder therefore zero-extends
//! short windows before the fixed-layout read, so fields past a supplied
//! (older) header decode as zero, and gates feature probes on
//! `mapping_offset`.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};

/// Minimum header window a caller must supply (through the dylibs trie
/// fields). Anything shorter cannot be a cache header.
pub const MIN_HEADER_SIZE: usize = 0x118;

/// Full wire size of the newest known header layout.
pub const RAW_HEADER_SIZE: usize = 0x208;

/// Magic prefix shared by all cache versions.
pub const MAGIC_PREFIX: &[u8] = b"dyld_v";

// =============================================================================
// Raw Layout
// =============================================================================

/// The on-disk cache header. Field offsets are part of the format
/// contract; several reserved/obsolete fields exist only to keep them.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct RawCacheHeader {
    /// Magic identifier, e.g. "dyld_v1   arm64e"
    pub magic: [u8; 16],
    /// File offset of the first mapping record; doubles as the header's
    /// own length
    pub mapping_offset: u32,
    /// Number of mapping records
    pub mapping_count: u32,
    /// Legacy file offset of the image array
    pub images_offset_old: u32,
    /// Legacy number of images
    pub images_count_old: u32,
    /// Base address of dyld when the cache was built
    pub dyld_base_address: u64,
    /// File offset of the code signature
    pub code_signature_offset: u64,
    /// Size of the code signature
    pub code_signature_size: u64,
    /// Obsolete global slide info offset
    pub slide_info_offset_unused: u64,
    /// Obsolete global slide info size
    pub slide_info_size_unused: u64,
    /// File offset of the local-symbols region
    pub local_symbols_offset: u64,
    /// Size of the local-symbols region
    pub local_symbols_size: u64,
    /// UUID of this cache file
    pub uuid: [u8; 16],
    /// Cache type: 0=development, 1=production, 2=multi
    pub cache_type: u64,
    /// Offset to branch pool addresses
    pub branch_pools_offset: u32,
    /// Number of branch pool addresses
    pub branch_pools_count: u32,
    /// Unslid address of dyld's mach header in the cache
    pub dyld_in_cache_mh: u64,
    /// Unslid address of dyld's entry point in the cache
    pub dyld_in_cache_entry: u64,
    /// File offset of the image-TEXT array
    pub images_text_offset: u64,
    /// Number of image-TEXT records
    pub images_text_count: u64,
    /// Address of patch info
    pub patch_info_addr: u64,
    /// Size of patch info
    pub patch_info_size: u64,
    /// Obsolete other-image-group address
    pub other_image_group_addr_unused: u64,
    /// Obsolete other-image-group size
    pub other_image_group_size_unused: u64,
    /// Address of program closures
    pub prog_closures_addr: u64,
    /// Size of program closures
    pub prog_closures_size: u64,
    /// Address of the program closures trie
    pub prog_closures_trie_addr: u64,
    /// Size of the program closures trie
    pub prog_closures_trie_size: u64,
    /// Platform id
    pub platform: u32,
    /// Format version (low 8 bits) plus feature bits
    pub format_version_and_flags: u32,
    /// Start of the shared region
    pub shared_region_start: u64,
    /// Size of the shared region
    pub shared_region_size: u64,
    /// Maximum allowed slide
    pub max_slide: u64,
    /// Address of the dylibs image array
    pub dylibs_image_array_addr: u64,
    /// Size of the dylibs image array
    pub dylibs_image_array_size: u64,
    /// Address of the dylibs trie
    pub dylibs_trie_addr: u64,
    /// Size of the dylibs trie
    pub dylibs_trie_size: u64,
    /// Address of the other-image array
    pub other_image_array_addr: u64,
    /// Size of the other-image array
    pub other_image_array_size: u64,
    /// Address of the other-image trie
    pub other_trie_addr: u64,
    /// Size of the other-image trie
    pub other_trie_size: u64,
    /// File offset of the extended (slide-bearing) mapping records
    pub mapping_with_slide_offset: u32,
    /// Number of extended mapping records
    pub mapping_with_slide_count: u32,
    /// Obsolete PBL state array address
    pub dylibs_pbl_state_array_addr_unused: u64,
    /// Address of the dylibs PBL set
    pub dylibs_pbl_set_addr: u64,
    /// Address of the programs PBL set pool
    pub programs_pbl_set_pool_addr: u64,
    /// Size of the programs PBL set pool
    pub programs_pbl_set_pool_size: u64,
    /// Address of the program trie
    pub program_trie_addr: u64,
    /// Size of the program trie
    pub program_trie_size: u32,
    /// Packed OS version
    pub os_version: u32,
    /// Alternative platform id
    pub alt_platform: u32,
    /// Packed alternative OS version
    pub alt_os_version: u32,
    /// VM offset of the Swift optimizations header
    pub swift_opts_offset: u64,
    /// Size of the Swift optimizations header
    pub swift_opts_size: u64,
    /// File offset of the subcache entry array
    pub sub_cache_array_offset: u32,
    /// Number of subcache entries
    pub sub_cache_array_count: u32,
    /// UUID of the .symbols sidecar (all-zero when absent)
    pub symbols_file_uuid: [u8; 16],
    /// Address of the Rosetta read-only region
    pub rosetta_read_only_addr: u64,
    /// Size of the Rosetta read-only region
    pub rosetta_read_only_size: u64,
    /// Address of the Rosetta read-write region
    pub rosetta_read_write_addr: u64,
    /// Size of the Rosetta read-write region
    pub rosetta_read_write_size: u64,
    /// File offset of the image array (current location)
    pub images_offset: u32,
    /// Number of images (current location)
    pub images_count: u32,
    /// Sub-cache type
    pub cache_sub_type: u32,
    /// Padding
    pub _pad1: u32,
    /// VM offset of the ObjC optimizations header
    pub objc_opts_offset: u64,
    /// Size of the ObjC optimizations header
    pub objc_opts_size: u64,
    /// VM offset of the cache atlas
    pub cache_atlas_offset: u64,
    /// Size of the cache atlas
    pub cache_atlas_size: u64,
    /// VM offset of the dynamic data header
    pub dynamic_data_offset: u64,
    /// Maximum size of the dynamic data region
    pub dynamic_data_max_size: u64,
    /// File offset of the TPRO mapping records
    pub tpro_mappings_offset: u32,
    /// Number of TPRO mapping records
    pub tpro_mappings_count: u32,
}

// =============================================================================
// Derived Enums
// =============================================================================

/// Cache architecture, derived from the magic suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types, missing_docs)]
pub enum Architecture {
    Arm64,
    Arm64e,
    Arm64_32,
    X86_64,
    X86_64h,
    I386,
}

impl Architecture {
    /// Maps a trimmed magic suffix to an architecture.
    pub fn from_magic_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "arm64" => Some(Self::Arm64),
            "arm64e" => Some(Self::Arm64e),
            "arm64_32" => Some(Self::Arm64_32),
            "x86_64" => Some(Self::X86_64),
            "x86_64h" => Some(Self::X86_64h),
            "i386" => Some(Self::I386),
            _ => None,
        }
    }

    /// Display name, identical to the magic suffix.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Arm64 => "arm64",
            Self::Arm64e => "arm64e",
            Self::Arm64_32 => "arm64_32",
            Self::X86_64 => "x86_64",
            Self::X86_64h => "x86_64h",
            Self::I386 => "i386",
        }
    }

    /// True for architectures with 8-byte pointers.
    #[inline]
    pub fn is_64bit(&self) -> bool {
        self.pointer_size() == 8
    }

    /// Pointer width in bytes.
    #[inline]
    pub fn pointer_size(&self) -> usize {
        match self {
            Self::Arm64 | Self::Arm64e | Self::X86_64 | Self::X86_64h => 8,
            Self::Arm64_32 | Self::I386 => 4,
        }
    }

    /// True when the architecture authenticates pointers (PAC).
    #[inline]
    pub fn uses_pac(&self) -> bool {
        matches!(self, Self::Arm64e)
    }
}

/// Platform the cache was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Platform {
    MacOs,
    Ios,
    TvOs,
    WatchOs,
    BridgeOs,
    MacCatalyst,
    IosSimulator,
    TvOsSimulator,
    WatchOsSimulator,
    DriverKit,
    VisionOs,
    VisionOsSimulator,
    Unknown,
}

impl Platform {
    /// Maps the raw platform id; unrecognised ids decode as `Unknown`.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::MacOs,
            2 => Self::Ios,
            3 => Self::TvOs,
            4 => Self::WatchOs,
            5 => Self::BridgeOs,
            6 => Self::MacCatalyst,
            7 => Self::IosSimulator,
            8 => Self::TvOsSimulator,
            9 => Self::WatchOsSimulator,
            10 => Self::DriverKit,
            11 => Self::VisionOs,
            12 => Self::VisionOsSimulator,
            _ => Self::Unknown,
        }
    }
}

/// How the cache was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum CacheKind {
    Development,
    Production,
    Multi,
}

impl CacheKind {
    /// Maps the raw cache type; unrecognised values decode as
    /// `Development`.
    pub fn from_raw(raw: u64) -> Self {
        match raw {
            1 => Self::Production,
            2 => Self::Multi,
            _ => Self::Development,
        }
    }
}

/// The packed format-version-and-flags field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheFlags(pub u32);

impl CacheFlags {
    const DYLIBS_EXPECTED_ON_DISK: u32 = 0x100;
    const SIMULATOR: u32 = 0x200;
    const LOCALLY_BUILT: u32 = 0x400;
    const BUILT_FROM_CHAINED_FIXUPS: u32 = 0x800;
    const NEW_FORMAT_TLVS: u32 = 0x1000;

    /// Format version, the low 8 bits.
    #[inline]
    pub fn format_version(&self) -> u32 {
        self.0 & 0xFF
    }

    /// Dylibs are expected to also exist on disk.
    #[inline]
    pub fn dylibs_expected_on_disk(&self) -> bool {
        self.0 & Self::DYLIBS_EXPECTED_ON_DISK != 0
    }

    /// Cache built for a simulator platform.
    #[inline]
    pub fn simulator(&self) -> bool {
        self.0 & Self::SIMULATOR != 0
    }

    /// Cache built locally rather than by Apple's build train.
    #[inline]
    pub fn locally_built(&self) -> bool {
        self.0 & Self::LOCALLY_BUILT != 0
    }

    /// Cache built from chained fixups.
    #[inline]
    pub fn built_from_chained_fixups(&self) -> bool {
        self.0 & Self::BUILT_FROM_CHAINED_FIXUPS != 0
    }

    /// Cache uses the new thread-local-variable format.
    #[inline]
    pub fn new_format_tlvs(&self) -> bool {
        self.0 & Self::NEW_FORMAT_TLVS != 0
    }
}

/// One (offset, count) table descriptor from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRef {
    /// File offset of the first entry
    pub offset: u64,
    /// Number of entries
    pub count: u64,
}

impl TableRef {
    /// A table is absent when its offset or count is zero.
    #[inline]
    pub fn is_absent(&self) -> bool {
        self.offset == 0 || self.count == 0
    }
}

// =============================================================================
// Decoded Header
// =============================================================================

/// A decoded, validated cache header.
#[derive(Debug, Clone)]
pub struct CacheHeader {
    raw: RawCacheHeader,
    architecture: Architecture,
}

impl CacheHeader {
    /// Decodes a header from the given window.
    ///
    /// The window must be at least [`MIN_HEADER_SIZE`] bytes. Fields past
    /// the end of the window (late additions such as the ObjC opts, atlas,
    /// dynamic-data and TPRO descriptors) decode as zero.
    pub fn decode(window: &[u8]) -> Result<Self> {
        if window.len() < MIN_HEADER_SIZE {
            return Err(Error::HeaderTooSmall {
                needed: MIN_HEADER_SIZE,
                available: window.len(),
            });
        }

        let mut buf = [0u8; RAW_HEADER_SIZE];
        let take = window.len().min(RAW_HEADER_SIZE);
        buf[..take].copy_from_slice(&window[..take]);

        let raw = RawCacheHeader::read_from_bytes(&buf)
            .map_err(|_| Error::InvalidMagic(String::new()))?;

        let magic_str = magic_to_str(&raw.magic);
        if !raw.magic.starts_with(MAGIC_PREFIX) {
            return Err(Error::InvalidMagic(magic_str));
        }

        // "dyld_v1   arm64e" -> skip the version tag, trim the padding.
        let suffix = magic_str[MAGIC_PREFIX.len()..]
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .trim();
        let architecture = Architecture::from_magic_suffix(suffix)
            .ok_or_else(|| Error::InvalidMagic(magic_str.clone()))?;

        Ok(Self { raw, architecture })
    }

    /// The raw fixed-layout header.
    #[inline]
    pub fn raw(&self) -> &RawCacheHeader {
        &self.raw
    }

    /// The magic string with trailing NULs removed.
    pub fn magic_str(&self) -> String {
        magic_to_str(&self.raw.magic)
    }

    /// Architecture derived from the magic suffix.
    #[inline]
    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    /// UUID of this cache file.
    #[inline]
    pub fn uuid(&self) -> &[u8; 16] {
        &self.raw.uuid
    }

    /// UUID the `.symbols` sidecar must carry; all-zero when absent.
    #[inline]
    pub fn symbols_file_uuid(&self) -> &[u8; 16] {
        &self.raw.symbols_file_uuid
    }

    /// True when a `.symbols` sidecar is declared.
    #[inline]
    pub fn has_symbols_file(&self) -> bool {
        self.raw.symbols_file_uuid != [0u8; 16]
    }

    /// Platform id, mapped to the closed enum.
    #[inline]
    pub fn platform(&self) -> Platform {
        Platform::from_raw(self.raw.platform)
    }

    /// Cache kind, mapped to the closed enum.
    #[inline]
    pub fn cache_kind(&self) -> CacheKind {
        CacheKind::from_raw(self.raw.cache_type)
    }

    /// Format version and feature flags.
    #[inline]
    pub fn flags(&self) -> CacheFlags {
        CacheFlags(self.raw.format_version_and_flags)
    }

    /// Start address of the shared region.
    #[inline]
    pub fn shared_region_start(&self) -> u64 {
        self.raw.shared_region_start
    }

    /// Size of the shared region.
    #[inline]
    pub fn shared_region_size(&self) -> u64 {
        self.raw.shared_region_size
    }

    /// Maximum allowed slide.
    #[inline]
    pub fn max_slide(&self) -> u64 {
        self.raw.max_slide
    }

    /// OS version as a (major, minor, patch) triple.
    pub fn os_version(&self) -> (u16, u8, u8) {
        unpack_version(self.raw.os_version)
    }

    /// Alternative OS version as a (major, minor, patch) triple.
    pub fn alt_os_version(&self) -> (u16, u8, u8) {
        unpack_version(self.raw.alt_os_version)
    }

    /// True when `field_offset` lies within the header as written; used to
    /// gate probes of fields this cache predates.
    #[inline]
    pub fn contains_field(&self, field_offset: usize) -> bool {
        field_offset < self.raw.mapping_offset as usize
    }

    /// Basic mapping table.
    pub fn mapping_table(&self) -> TableRef {
        TableRef {
            offset: self.raw.mapping_offset as u64,
            count: self.raw.mapping_count as u64,
        }
    }

    /// Extended (slide-bearing) mapping table.
    pub fn mapping_with_slide_table(&self) -> TableRef {
        TableRef {
            offset: self.raw.mapping_with_slide_offset as u64,
            count: self.raw.mapping_with_slide_count as u64,
        }
    }

    /// Image table, preferring the current location over the legacy one.
    pub fn images_table(&self) -> TableRef {
        if self.raw.images_offset != 0 {
            TableRef {
                offset: self.raw.images_offset as u64,
                count: self.raw.images_count as u64,
            }
        } else {
            TableRef {
                offset: self.raw.images_offset_old as u64,
                count: self.raw.images_count_old as u64,
            }
        }
    }

    /// Image-TEXT table.
    pub fn images_text_table(&self) -> TableRef {
        TableRef {
            offset: self.raw.images_text_offset,
            count: self.raw.images_text_count,
        }
    }

    /// Subcache entry table.
    pub fn subcache_table(&self) -> TableRef {
        TableRef {
            offset: self.raw.sub_cache_array_offset as u64,
            count: self.raw.sub_cache_array_count as u64,
        }
    }

    /// TPRO mapping table (zero on caches predating it).
    pub fn tpro_mappings_table(&self) -> TableRef {
        TableRef {
            offset: self.raw.tpro_mappings_offset as u64,
            count: self.raw.tpro_mappings_count as u64,
        }
    }

    /// Local-symbols region as (file offset, byte size).
    pub fn local_symbols_region(&self) -> (u64, u64) {
        (self.raw.local_symbols_offset, self.raw.local_symbols_size)
    }

    /// Subcache entries use the v1 wire shape when the header predates the
    /// embedded-suffix format.
    #[inline]
    pub fn uses_v1_subcache_entries(&self) -> bool {
        self.raw.mapping_offset < 0x200
    }
}

fn magic_to_str(magic: &[u8; 16]) -> String {
    let end = magic.iter().position(|&b| b == 0).unwrap_or(16);
    String::from_utf8_lossy(&magic[..end]).into_owned()
}

fn unpack_version(v: u32) -> (u16, u8, u8) {
    ((v >> 16) as u16, (v >> 8) as u8, v as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn header_bytes(magic: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; RAW_HEADER_SIZE];
        buf[..magic.len()].copy_from_slice(magic);
        // mapping_offset past every field so contains_field() sees all.
        buf[0x10..0x14].copy_from_slice(&(RAW_HEADER_SIZE as u32).to_le_bytes());
        buf
    }

    #[test]
    fn test_arm64e_magic_recognition() {
        let buf = header_bytes(b"dyld_v1  arm64e");
        let header = CacheHeader::decode(&buf).unwrap();
        assert_eq!(header.architecture(), Architecture::Arm64e);
        assert!(header.architecture().is_64bit());
        assert!(header.architecture().uses_pac());
    }

    #[test]
    fn test_all_architectures() {
        for (magic, arch, ptr) in [
            (&b"dyld_v1   arm64"[..], Architecture::Arm64, 8),
            (b"dyld_v1  arm64e", Architecture::Arm64e, 8),
            (b"dyld_v1arm64_32", Architecture::Arm64_32, 4),
            (b"dyld_v1  x86_64", Architecture::X86_64, 8),
            (b"dyld_v1 x86_64h", Architecture::X86_64h, 8),
            (b"dyld_v1    i386", Architecture::I386, 4),
        ] {
            let header = CacheHeader::decode(&header_bytes(magic)).unwrap();
            assert_eq!(header.architecture(), arch);
            assert_eq!(header.architecture().pointer_size(), ptr);
        }
    }

    #[test]
    fn test_unknown_architecture_is_invalid_magic() {
        let buf = header_bytes(b"dyld_v1    foo");
        assert!(matches!(
            CacheHeader::decode(&buf),
            Err(Error::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_bad_prefix() {
        let buf = header_bytes(b"Dyld_v1  arm64e");
        assert!(matches!(
            CacheHeader::decode(&buf),
            Err(Error::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_minimum_window() {
        let buf = header_bytes(b"dyld_v1  arm64e");
        assert!(CacheHeader::decode(&buf[..MIN_HEADER_SIZE]).is_ok());
        assert!(matches!(
            CacheHeader::decode(&buf[..MIN_HEADER_SIZE - 1]),
            Err(Error::HeaderTooSmall { .. })
        ));
    }

    #[test]
    fn test_late_fields_default_to_zero() {
        let mut buf = header_bytes(b"dyld_v1  arm64e");
        buf[0x200..0x204].copy_from_slice(&0x1234u32.to_le_bytes());
        buf[0x204..0x208].copy_from_slice(&7u32.to_le_bytes());

        // Full window sees the TPRO table.
        let header = CacheHeader::decode(&buf).unwrap();
        assert_eq!(
            header.tpro_mappings_table(),
            TableRef {
                offset: 0x1234,
                count: 7
            }
        );

        // A window that predates the TPRO fields decodes them as zero.
        let header = CacheHeader::decode(&buf[..0x200]).unwrap();
        assert!(header.tpro_mappings_table().is_absent());
    }

    #[test]
    fn test_flags_decode() {
        let mut buf = header_bytes(b"dyld_v1  arm64e");
        buf[0xDC..0xE0].copy_from_slice(&0x1F7Fu32.to_le_bytes());
        let flags = CacheHeader::decode(&buf).unwrap().flags();
        assert_eq!(flags.format_version(), 0x7F);
        assert!(flags.dylibs_expected_on_disk());
        assert!(flags.simulator());
        assert!(flags.locally_built());
        assert!(flags.built_from_chained_fixups());
        assert!(flags.new_format_tlvs());
    }

    #[test]
    fn test_platform_and_kind_defaults() {
        let mut buf = header_bytes(b"dyld_v1  arm64e");
        buf[0xD8..0xDC].copy_from_slice(&2u32.to_le_bytes()); // platform = iOS
        buf[0x68..0x70].copy_from_slice(&1u64.to_le_bytes()); // cache_type = production
        let header = CacheHeader::decode(&buf).unwrap();
        assert_eq!(header.platform(), Platform::Ios);
        assert_eq!(header.cache_kind(), CacheKind::Production);

        let mut buf = header_bytes(b"dyld_v1  arm64e");
        buf[0xD8..0xDC].copy_from_slice(&99u32.to_le_bytes());
        buf[0x68..0x70].copy_from_slice(&99u64.to_le_bytes());
        let header = CacheHeader::decode(&buf).unwrap();
        assert_eq!(header.platform(), Platform::Unknown);
        assert_eq!(header.cache_kind(), CacheKind::Development);
    }

    #[test]
    fn test_os_version_triple() {
        let mut buf = header_bytes(b"dyld_v1  arm64e");
        // 17.4.1 packs as 0x00110401.
        buf[0x16C..0x170].copy_from_slice(&0x0011_0401u32.to_le_bytes());
        let header = CacheHeader::decode(&buf).unwrap();
        assert_eq!(header.os_version(), (17, 4, 1));
    }

    #[test]
    fn test_symbols_file_uuid_absent_when_zero() {
        let buf = header_bytes(b"dyld_v1  arm64e");
        let header = CacheHeader::decode(&buf).unwrap();
        assert!(!header.has_symbols_file());

        let mut buf = header_bytes(b"dyld_v1  arm64e");
        buf[0x190] = 0xAB;
        let header = CacheHeader::decode(&buf).unwrap();
        assert!(header.has_symbols_file());
    }

    #[test]
    fn test_images_table_prefers_new_location() {
        let mut buf = header_bytes(b"dyld_v1  arm64e");
        buf[0x18..0x1C].copy_from_slice(&0x100u32.to_le_bytes()); // legacy offset
        buf[0x1C..0x20].copy_from_slice(&10u32.to_le_bytes()); // legacy count
        let header = CacheHeader::decode(&buf).unwrap();
        assert_eq!(
            header.images_table(),
            TableRef {
                offset: 0x100,
                count: 10
            }
        );

        buf[0x1C0..0x1C4].copy_from_slice(&0x2000u32.to_le_bytes());
        buf[0x1C4..0x1C8].copy_from_slice(&20u32.to_le_bytes());
        let header = CacheHeader::decode(&buf).unwrap();
        assert_eq!(
            header.images_table(),
            TableRef {
                offset: 0x2000,
                count: 20
            }
        );
    }
}
