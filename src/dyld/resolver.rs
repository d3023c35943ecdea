//! VM-address to file-offset resolution over one file's mapping set.

use super::structs::{MappingAndSlideInfo, MappingFlags, MappingInfo};

/// A unified mapping entry covering both the basic and the extended wire
/// shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMapping {
    /// Virtual memory address
    pub address: u64,
    /// Size in bytes
    pub size: u64,
    /// File offset
    pub file_offset: u64,
    /// Maximum protection
    pub max_prot: u32,
    /// Initial protection
    pub init_prot: u32,
    /// File offset of the mapping's slide info (0 if none)
    pub slide_info_file_offset: u64,
    /// Size of the mapping's slide info (0 if none)
    pub slide_info_file_size: u64,
    /// Mapping flags
    pub flags: MappingFlags,
}

impl CacheMapping {
    /// Creates a mapping entry from a basic record.
    pub fn from_basic(info: &MappingInfo) -> Self {
        Self {
            address: info.address,
            size: info.size,
            file_offset: info.file_offset,
            max_prot: info.max_prot,
            init_prot: info.init_prot,
            slide_info_file_offset: 0,
            slide_info_file_size: 0,
            flags: MappingFlags::empty(),
        }
    }

    /// Creates a mapping entry from an extended record.
    pub fn from_extended(info: &MappingAndSlideInfo) -> Self {
        Self {
            address: info.address,
            size: info.size,
            file_offset: info.file_offset,
            max_prot: info.max_prot,
            init_prot: info.init_prot,
            slide_info_file_offset: info.slide_info_file_offset,
            slide_info_file_size: info.slide_info_file_size,
            flags: info.mapping_flags(),
        }
    }

    /// True when both the VM range and the file range survive checked
    /// addition. Mappings that fail contain nothing on either axis.
    #[inline]
    fn end_addresses(&self) -> Option<(u64, u64)> {
        let vm_end = self.address.checked_add(self.size)?;
        let file_end = self.file_offset.checked_add(self.size)?;
        Some((vm_end, file_end))
    }

    /// True when `addr` falls inside this mapping. Mappings whose range
    /// arithmetic overflows contain nothing.
    #[inline]
    pub fn contains_vm(&self, addr: u64) -> bool {
        match self.end_addresses() {
            Some((vm_end, _)) => addr >= self.address && addr < vm_end,
            None => false,
        }
    }

    /// True when `offset` falls inside this mapping's file range.
    #[inline]
    pub fn contains_file_offset(&self, offset: u64) -> bool {
        match self.end_addresses() {
            Some((_, file_end)) => offset >= self.file_offset && offset < file_end,
            None => false,
        }
    }

    /// Converts an in-range virtual address to its file offset.
    #[inline]
    pub fn vm_to_file_offset(&self, addr: u64) -> u64 {
        self.file_offset + (addr - self.address)
    }

    /// Converts an in-range file offset to its virtual address.
    #[inline]
    pub fn file_offset_to_vm(&self, offset: u64) -> u64 {
        self.address + (offset - self.file_offset)
    }

    /// True when this mapping has slide info.
    #[inline]
    pub fn has_slide_info(&self) -> bool {
        self.slide_info_file_size > 0
    }

    /// Bytes left in the mapping at and after `addr`.
    #[inline]
    pub fn remaining_from(&self, addr: u64) -> u64 {
        self.size - (addr - self.address)
    }
}

/// Bidirectional VA↔file-offset resolver over one file's mappings.
///
/// Lookup is a linear scan; mapping counts stay in the low dozens.
/// Mappings are assumed non-overlapping, so the first hit wins. Absence is
/// not an error here; callers decide what an unmapped address means.
#[derive(Debug, Clone, Default)]
pub struct VMAddressResolver {
    mappings: Vec<CacheMapping>,
}

impl VMAddressResolver {
    /// Builds a resolver over the given mapping set.
    pub fn new(mappings: Vec<CacheMapping>) -> Self {
        Self { mappings }
    }

    /// The mapping set backing this resolver.
    #[inline]
    pub fn mappings(&self) -> &[CacheMapping] {
        &self.mappings
    }

    /// Returns the mapping containing the given virtual address.
    pub fn mapping_for_vm(&self, addr: u64) -> Option<&CacheMapping> {
        self.mappings.iter().find(|m| m.contains_vm(addr))
    }

    /// Returns the mapping containing the given file offset.
    pub fn mapping_for_file_offset(&self, offset: u64) -> Option<&CacheMapping> {
        self.mappings.iter().find(|m| m.contains_file_offset(offset))
    }

    /// Converts a virtual address to a file offset.
    pub fn file_offset_for_vm(&self, addr: u64) -> Option<u64> {
        self.mapping_for_vm(addr).map(|m| m.vm_to_file_offset(addr))
    }

    /// Converts a file offset to a virtual address.
    pub fn vm_for_file_offset(&self, offset: u64) -> Option<u64> {
        self.mapping_for_file_offset(offset)
            .map(|m| m.file_offset_to_vm(offset))
    }

    /// True when some mapping contains the address.
    #[inline]
    pub fn is_valid_vm(&self, addr: u64) -> bool {
        self.mapping_for_vm(addr).is_some()
    }

    /// True when some mapping contains the file offset.
    #[inline]
    pub fn is_valid_file_offset(&self, offset: u64) -> bool {
        self.mapping_for_file_offset(offset).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(address: u64, size: u64, file_offset: u64) -> CacheMapping {
        CacheMapping {
            address,
            size,
            file_offset,
            max_prot: 5,
            init_prot: 5,
            slide_info_file_offset: 0,
            slide_info_file_size: 0,
            flags: MappingFlags::empty(),
        }
    }

    #[test]
    fn test_round_trip() {
        let resolver = VMAddressResolver::new(vec![
            mapping(0x1_8000_0000, 0x1000, 0),
            mapping(0x1_9000_0000, 0x2000, 0x1000),
        ]);

        for addr in [0x1_8000_0000, 0x1_8000_0FFF, 0x1_9000_0000, 0x1_9000_1FFF] {
            let off = resolver.file_offset_for_vm(addr).unwrap();
            assert_eq!(resolver.vm_for_file_offset(off), Some(addr));
        }
        for off in [0u64, 0xFFF, 0x1000, 0x2FFF] {
            let addr = resolver.vm_for_file_offset(off).unwrap();
            assert_eq!(resolver.file_offset_for_vm(addr), Some(off));
        }
    }

    #[test]
    fn test_unmapped_is_absent() {
        let resolver = VMAddressResolver::new(vec![mapping(0x1000, 0x1000, 0)]);
        assert_eq!(resolver.file_offset_for_vm(0xFFF), None);
        assert_eq!(resolver.file_offset_for_vm(0x2000), None);
        assert!(!resolver.is_valid_vm(0x2000));
        assert!(resolver.is_valid_vm(0x1FFF));
        assert_eq!(resolver.vm_for_file_offset(0x1000), None);
    }

    #[test]
    fn test_overflowing_mapping_is_skipped() {
        let resolver = VMAddressResolver::new(vec![
            mapping(u64::MAX - 0x10, 0x100, 0),
            mapping(0x1000, 0x1000, 0x40),
        ]);
        // Queries inside the overflowing mapping return absent, not a fault.
        assert_eq!(resolver.file_offset_for_vm(u64::MAX - 0x8), None);
        // The sane mapping still resolves.
        assert_eq!(resolver.file_offset_for_vm(0x1000), Some(0x40));
    }

    #[test]
    fn test_first_mapping_wins() {
        let resolver = VMAddressResolver::new(vec![
            mapping(0x1000, 0x1000, 0x0),
            mapping(0x1000, 0x1000, 0x9000),
        ]);
        assert_eq!(resolver.file_offset_for_vm(0x1800), Some(0x800));
    }

    #[test]
    fn test_file_offset_overflow_skipped() {
        let resolver = VMAddressResolver::new(vec![mapping(0x1000, 0x100, u64::MAX - 0x10)]);
        assert_eq!(resolver.mapping_for_file_offset(u64::MAX - 0x8), None);
        // The VM side of an overflowing mapping is absent too.
        assert_eq!(resolver.file_offset_for_vm(0x1080), None);
    }
}
