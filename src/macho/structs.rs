//! Mach-O wire structures.
//!
//! Fixed-layout records matching the on-disk format, restricted to what
//! the exports-trie locator and the local-symbols decoder consume.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::constants::*;

// =============================================================================
// Headers
// =============================================================================

/// 32-bit Mach-O header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct MachHeader32 {
    /// Magic number (MH_MAGIC)
    pub magic: u32,
    /// CPU type
    pub cputype: u32,
    /// CPU subtype
    pub cpusubtype: u32,
    /// File type
    pub filetype: u32,
    /// Number of load commands
    pub ncmds: u32,
    /// Total size of load commands
    pub sizeofcmds: u32,
    /// Flags
    pub flags: u32,
}

impl MachHeader32 {
    /// Size of the header in bytes.
    pub const SIZE: usize = 28;
}

/// 64-bit Mach-O header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct MachHeader64 {
    /// Magic number (MH_MAGIC_64)
    pub magic: u32,
    /// CPU type
    pub cputype: u32,
    /// CPU subtype
    pub cpusubtype: u32,
    /// File type
    pub filetype: u32,
    /// Number of load commands
    pub ncmds: u32,
    /// Total size of load commands
    pub sizeofcmds: u32,
    /// Flags
    pub flags: u32,
    /// Reserved
    pub reserved: u32,
}

impl MachHeader64 {
    /// Size of the header in bytes.
    pub const SIZE: usize = 32;
}

/// Generic load command header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct LoadCommand {
    /// Type of load command
    pub cmd: u32,
    /// Size of load command, including this header
    pub cmdsize: u32,
}

impl LoadCommand {
    /// Size of the load command header.
    pub const SIZE: usize = 8;
}

// =============================================================================
// Segment Commands
// =============================================================================

/// 32-bit segment command (prefix only; section records follow on disk).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SegmentCommand32 {
    /// LC_SEGMENT
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// Segment name, NUL-padded
    pub segname: [u8; 16],
    /// Virtual memory address
    pub vmaddr: u32,
    /// Virtual memory size
    pub vmsize: u32,
    /// File offset
    pub fileoff: u32,
    /// File size
    pub filesize: u32,
    /// Maximum protection
    pub maxprot: u32,
    /// Initial protection
    pub initprot: u32,
    /// Number of sections
    pub nsects: u32,
    /// Flags
    pub flags: u32,
}

impl SegmentCommand32 {
    /// Size of the fixed command prefix.
    pub const SIZE: usize = 56;

    /// True for the linkedit segment.
    #[inline]
    pub fn is_linkedit(&self) -> bool {
        &self.segname == SEG_LINKEDIT
    }
}

/// 64-bit segment command (prefix only; section records follow on disk).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SegmentCommand64 {
    /// LC_SEGMENT_64
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// Segment name, NUL-padded
    pub segname: [u8; 16],
    /// Virtual memory address
    pub vmaddr: u64,
    /// Virtual memory size
    pub vmsize: u64,
    /// File offset
    pub fileoff: u64,
    /// File size
    pub filesize: u64,
    /// Maximum protection
    pub maxprot: u32,
    /// Initial protection
    pub initprot: u32,
    /// Number of sections
    pub nsects: u32,
    /// Flags
    pub flags: u32,
}

impl SegmentCommand64 {
    /// Size of the fixed command prefix.
    pub const SIZE: usize = 72;

    /// True for the linkedit segment.
    #[inline]
    pub fn is_linkedit(&self) -> bool {
        &self.segname == SEG_LINKEDIT
    }
}

// =============================================================================
// Linkedit Commands
// =============================================================================

/// Compressed dyld info command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct DyldInfoCommand {
    /// LC_DYLD_INFO or LC_DYLD_INFO_ONLY
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// File offset of rebase info
    pub rebase_off: u32,
    /// Size of rebase info
    pub rebase_size: u32,
    /// File offset of binding info
    pub bind_off: u32,
    /// Size of binding info
    pub bind_size: u32,
    /// File offset of weak binding info
    pub weak_bind_off: u32,
    /// Size of weak binding info
    pub weak_bind_size: u32,
    /// File offset of lazy binding info
    pub lazy_bind_off: u32,
    /// Size of lazy binding info
    pub lazy_bind_size: u32,
    /// File offset of export info
    pub export_off: u32,
    /// Size of export info
    pub export_size: u32,
}

impl DyldInfoCommand {
    /// Size of this command.
    pub const SIZE: usize = 48;
}

/// Generic linkedit data command (LC_DYLD_EXPORTS_TRIE among others).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct LinkeditDataCommand {
    /// Command type
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// File offset of the data
    pub dataoff: u32,
    /// Size of the data
    pub datasize: u32,
}

impl LinkeditDataCommand {
    /// Size of this command.
    pub const SIZE: usize = 16;
}

// =============================================================================
// Symbol Table Entries
// =============================================================================

/// 32-bit symbol table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Nlist32 {
    /// Index into the string table
    pub n_strx: u32,
    /// Type flags
    pub n_type: u8,
    /// Section number or NO_SECT
    pub n_sect: u8,
    /// Description
    pub n_desc: u16,
    /// Value
    pub n_value: u32,
}

impl Nlist32 {
    /// Size of an entry.
    pub const SIZE: usize = 12;
}

/// 64-bit symbol table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Nlist64 {
    /// Index into the string table
    pub n_strx: u32,
    /// Type flags
    pub n_type: u8,
    /// Section number or NO_SECT
    pub n_sect: u8,
    /// Description
    pub n_desc: u16,
    /// Value
    pub n_value: u64,
}

impl Nlist64 {
    /// Size of an entry.
    pub const SIZE: usize = 16;

    /// True for external symbols.
    #[inline]
    pub fn is_external(&self) -> bool {
        (self.n_type & N_EXT) != 0
    }

    /// True for private external symbols.
    #[inline]
    pub fn is_private_external(&self) -> bool {
        (self.n_type & N_PEXT) != 0
    }

    /// True for debugging (stab) entries.
    #[inline]
    pub fn is_stab(&self) -> bool {
        (self.n_type & N_STAB) != 0
    }

    /// The masked type field.
    #[inline]
    pub fn type_field(&self) -> u8 {
        self.n_type & N_TYPE
    }

    /// True for undefined symbols.
    #[inline]
    pub fn is_undefined(&self) -> bool {
        self.type_field() == N_UNDF
    }

    /// True for symbols defined in a section.
    #[inline]
    pub fn is_defined_in_section(&self) -> bool {
        self.type_field() == N_SECT
    }

    /// True for absolute symbols.
    #[inline]
    pub fn is_absolute(&self) -> bool {
        self.type_field() == N_ABS
    }
}
