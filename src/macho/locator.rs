//! Exports-trie location.
//!
//! Given a buffer holding one image's Mach-O header and load commands,
//! find the unslid VM address and size of its exports trie. Only three
//! commands are interpreted: the segment commands (for __LINKEDIT),
//! LC_DYLD_EXPORTS_TRIE, and LC_DYLD_INFO(_ONLY) as the legacy fallback.

use zerocopy::FromBytes;

use super::constants::*;
use super::structs::*;
use crate::error::{Error, Result};
use crate::util::read_u32_le;

/// Upper bound on header + load commands for one image (16 MiB).
pub const MAX_HEADER_AND_COMMANDS: u64 = 16 * 1024 * 1024;

/// Location of an image's exports trie within the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrieLocation {
    /// Unslid VM address of the first trie byte
    pub vm_addr: u64,
    /// Byte size of the trie
    pub size: u64,
}

/// Header and load-command geometry read ahead of the full scan.
#[derive(Debug, Clone, Copy)]
pub struct HeaderGeometry {
    /// Size of the mach header itself
    pub header_size: usize,
    /// Number of load commands
    pub ncmds: u32,
    /// Total size of the load commands
    pub sizeofcmds: u32,
}

impl HeaderGeometry {
    /// Total bytes needed to hold the header plus all load commands.
    pub fn total_size(&self) -> u64 {
        self.header_size as u64 + self.sizeofcmds as u64
    }
}

/// Reads the header geometry from the first bytes of an image.
///
/// `data` must hold at least the mach header. The total size is bounded
/// by [`MAX_HEADER_AND_COMMANDS`]; a header claiming more cannot be an
/// image in a cache.
pub fn read_header_geometry(data: &[u8]) -> Result<HeaderGeometry> {
    if data.len() < 4 {
        return Err(Error::macho("buffer too small for a magic"));
    }

    let geometry = match read_u32_le(data) {
        MH_MAGIC_64 => {
            let header = MachHeader64::read_from_prefix(data)
                .map_err(|_| Error::macho("buffer too small for a 64-bit header"))?
                .0;
            HeaderGeometry {
                header_size: MachHeader64::SIZE,
                ncmds: header.ncmds,
                sizeofcmds: header.sizeofcmds,
            }
        }
        MH_MAGIC => {
            let header = MachHeader32::read_from_prefix(data)
                .map_err(|_| Error::macho("buffer too small for a 32-bit header"))?
                .0;
            HeaderGeometry {
                header_size: MachHeader32::SIZE,
                ncmds: header.ncmds,
                sizeofcmds: header.sizeofcmds,
            }
        }
        other => {
            return Err(Error::macho(format!("bad magic {other:#x}")));
        }
    };

    if geometry.total_size() > MAX_HEADER_AND_COMMANDS {
        return Err(Error::macho(format!(
            "header and load commands claim {:#x} bytes",
            geometry.total_size()
        )));
    }

    Ok(geometry)
}

/// Locates the exports trie of the image whose header and load commands
/// fill `data`.
///
/// Returns `Ok(None)` when the image has no trie (no __LINKEDIT, or a
/// zero export size).
pub fn locate_exports_trie(data: &[u8]) -> Result<Option<TrieLocation>> {
    let geometry = read_header_geometry(data)?;

    let mut linkedit: Option<(u64, u64)> = None; // (vmaddr, fileoff)
    let mut exports: Option<(u64, u64)> = None; // (dataoff, datasize)
    let mut from_exports_trie = false;

    let commands_end = (geometry.total_size() as usize).min(data.len());
    let mut offset = geometry.header_size;

    for _ in 0..geometry.ncmds {
        if offset + LoadCommand::SIZE > commands_end {
            return Err(Error::macho(format!(
                "load command at {offset:#x} extends past the command area"
            )));
        }
        let lc = LoadCommand::read_from_prefix(&data[offset..])
            .map_err(|_| Error::macho("truncated load command"))?
            .0;
        let cmdsize = lc.cmdsize as usize;
        if cmdsize < LoadCommand::SIZE || offset + cmdsize > commands_end {
            return Err(Error::macho(format!(
                "load command at {offset:#x} has unreasonable size {cmdsize:#x}"
            )));
        }
        let command = &data[offset..offset + cmdsize];

        match lc.cmd {
            LC_SEGMENT_64 if cmdsize >= SegmentCommand64::SIZE => {
                let seg = SegmentCommand64::read_from_prefix(command)
                    .map_err(|_| Error::macho("truncated segment command"))?
                    .0;
                if seg.is_linkedit() {
                    linkedit = Some((seg.vmaddr, seg.fileoff));
                }
            }
            LC_SEGMENT if cmdsize >= SegmentCommand32::SIZE => {
                let seg = SegmentCommand32::read_from_prefix(command)
                    .map_err(|_| Error::macho("truncated segment command"))?
                    .0;
                if seg.is_linkedit() {
                    linkedit = Some((seg.vmaddr as u64, seg.fileoff as u64));
                }
            }
            LC_DYLD_EXPORTS_TRIE if cmdsize >= LinkeditDataCommand::SIZE => {
                let cmd = LinkeditDataCommand::read_from_prefix(command)
                    .map_err(|_| Error::macho("truncated linkedit data command"))?
                    .0;
                exports = Some((cmd.dataoff as u64, cmd.datasize as u64));
                from_exports_trie = true;
            }
            LC_DYLD_INFO | LC_DYLD_INFO_ONLY if cmdsize >= DyldInfoCommand::SIZE => {
                // The dedicated trie command wins over the legacy blob.
                if !from_exports_trie {
                    let cmd = DyldInfoCommand::read_from_prefix(command)
                        .map_err(|_| Error::macho("truncated dyld info command"))?
                        .0;
                    exports = Some((cmd.export_off as u64, cmd.export_size as u64));
                }
            }
            _ => {}
        }

        offset += cmdsize;
    }

    let (Some((linkedit_vmaddr, linkedit_fileoff)), Some((export_off, export_size))) =
        (linkedit, exports)
    else {
        return Ok(None);
    };
    if export_size == 0 {
        return Ok(None);
    }

    let vm_addr = linkedit_vmaddr
        .checked_add(export_off)
        .and_then(|addr| addr.checked_sub(linkedit_fileoff))
        .ok_or_else(|| Error::macho("exports trie address arithmetic overflows"))?;

    Ok(Some(TrieLocation {
        vm_addr,
        size: export_size,
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use zerocopy::IntoBytes;

    /// Builds a 64-bit Mach-O header + load commands buffer for tests.
    pub(crate) struct MachOBuilder {
        commands: Vec<u8>,
        ncmds: u32,
    }

    impl MachOBuilder {
        pub fn new() -> Self {
            Self {
                commands: Vec::new(),
                ncmds: 0,
            }
        }

        pub fn segment64(mut self, name: &[u8], vmaddr: u64, fileoff: u64) -> Self {
            let mut segname = [0u8; 16];
            segname[..name.len()].copy_from_slice(name);
            let seg = SegmentCommand64 {
                cmd: LC_SEGMENT_64,
                cmdsize: SegmentCommand64::SIZE as u32,
                segname,
                vmaddr,
                vmsize: 0x4000,
                fileoff,
                filesize: 0x4000,
                maxprot: 1,
                initprot: 1,
                nsects: 0,
                flags: 0,
            };
            self.commands.extend_from_slice(seg.as_bytes());
            self.ncmds += 1;
            self
        }

        pub fn exports_trie(mut self, dataoff: u32, datasize: u32) -> Self {
            let cmd = LinkeditDataCommand {
                cmd: LC_DYLD_EXPORTS_TRIE,
                cmdsize: LinkeditDataCommand::SIZE as u32,
                dataoff,
                datasize,
            };
            self.commands.extend_from_slice(cmd.as_bytes());
            self.ncmds += 1;
            self
        }

        pub fn dyld_info(mut self, export_off: u32, export_size: u32) -> Self {
            let cmd = DyldInfoCommand {
                cmd: LC_DYLD_INFO_ONLY,
                cmdsize: DyldInfoCommand::SIZE as u32,
                rebase_off: 0,
                rebase_size: 0,
                bind_off: 0,
                bind_size: 0,
                weak_bind_off: 0,
                weak_bind_size: 0,
                lazy_bind_off: 0,
                lazy_bind_size: 0,
                export_off,
                export_size,
            };
            self.commands.extend_from_slice(cmd.as_bytes());
            self.ncmds += 1;
            self
        }

        pub fn build(self) -> Vec<u8> {
            let header = MachHeader64 {
                magic: MH_MAGIC_64,
                cputype: 0x0100_000C, // arm64
                cpusubtype: 0,
                filetype: 6, // MH_DYLIB
                ncmds: self.ncmds,
                sizeofcmds: self.commands.len() as u32,
                flags: 0,
                reserved: 0,
            };
            let mut data = header.as_bytes().to_vec();
            data.extend_from_slice(&self.commands);
            data
        }
    }

    #[test]
    fn test_locate_via_exports_trie_command() {
        let data = MachOBuilder::new()
            .segment64(b"__TEXT", 0x1_8000_0000, 0)
            .segment64(b"__LINKEDIT", 0x1_9000_0000, 0x100_0000)
            .exports_trie(0x100_2000, 0x800)
            .build();
        let loc = locate_exports_trie(&data).unwrap().unwrap();
        assert_eq!(loc.vm_addr, 0x1_9000_2000);
        assert_eq!(loc.size, 0x800);
    }

    #[test]
    fn test_locate_via_dyld_info_fallback() {
        let data = MachOBuilder::new()
            .segment64(b"__LINKEDIT", 0x1_9000_0000, 0x100_0000)
            .dyld_info(0x100_4000, 0x400)
            .build();
        let loc = locate_exports_trie(&data).unwrap().unwrap();
        assert_eq!(loc.vm_addr, 0x1_9000_4000);
        assert_eq!(loc.size, 0x400);
    }

    #[test]
    fn test_exports_trie_wins_over_dyld_info() {
        // Order must not matter: the dedicated command is authoritative
        // even when the legacy blob appears after it.
        let data = MachOBuilder::new()
            .segment64(b"__LINKEDIT", 0x1_9000_0000, 0x100_0000)
            .exports_trie(0x100_2000, 0x800)
            .dyld_info(0x100_4000, 0x400)
            .build();
        let loc = locate_exports_trie(&data).unwrap().unwrap();
        assert_eq!(loc.vm_addr, 0x1_9000_2000);
    }

    #[test]
    fn test_no_linkedit_is_absent() {
        let data = MachOBuilder::new()
            .segment64(b"__TEXT", 0x1_8000_0000, 0)
            .exports_trie(0x2000, 0x800)
            .build();
        assert_eq!(locate_exports_trie(&data).unwrap(), None);
    }

    #[test]
    fn test_zero_export_size_is_absent() {
        let data = MachOBuilder::new()
            .segment64(b"__LINKEDIT", 0x1_9000_0000, 0x100_0000)
            .exports_trie(0x100_2000, 0)
            .build();
        assert_eq!(locate_exports_trie(&data).unwrap(), None);
    }

    #[test]
    fn test_bad_magic() {
        let data = [0u8; 64];
        assert!(matches!(
            locate_exports_trie(&data),
            Err(Error::InvalidMachO(_))
        ));
    }

    #[test]
    fn test_oversized_commands_rejected() {
        let mut data = MachOBuilder::new()
            .segment64(b"__LINKEDIT", 0x1_9000_0000, 0x100_0000)
            .build();
        // Claim more command bytes than the 16 MiB cap allows.
        data[20..24].copy_from_slice(&(MAX_HEADER_AND_COMMANDS as u32).to_le_bytes());
        assert!(matches!(
            locate_exports_trie(&data),
            Err(Error::InvalidMachO(_))
        ));
    }

    #[test]
    fn test_truncated_command_area() {
        let mut data = MachOBuilder::new()
            .segment64(b"__LINKEDIT", 0x1_9000_0000, 0x100_0000)
            .build();
        data.truncate(data.len() - 8);
        assert!(matches!(
            locate_exports_trie(&data),
            Err(Error::InvalidMachO(_))
        ));
    }
}
