//! Slide info decoding.
//!
//! Each slide-bearing mapping points at a slide-info region whose leading
//! u32 selects one of five header layouts. Versions 3 and 5 are the live
//! formats on arm64/arm64e; for those the page-starts array is
//! materialised and the encoded-pointer bit layouts are exposed. For the
//! remaining versions only the header is decoded.

use zerocopy::FromBytes;

use super::structs::{
    SlideInfoHeader1, SlideInfoHeader2, SlideInfoHeader3, SlideInfoHeader4, SlideInfoHeader5,
};
use crate::error::{Error, Result};
use crate::util::{read_u16_le, read_u32_le};

/// Upper bound on a materialised page-starts array.
pub const MAX_PAGE_STARTS: u32 = 1_000_000;

/// Page-start sentinel: the page needs no rebasing (v3 and v5).
pub const PAGE_ATTR_NO_REBASE: u16 = 0xFFFF;

/// Decoded slide info for one mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideInfo {
    /// Version 1 header (legacy TOC format)
    V1(SlideInfoHeader1),
    /// Version 2 header (arm64, 4K pages)
    V2(SlideInfoHeader2),
    /// Version 3 header and page starts (arm64e)
    V3 {
        /// Fixed header
        header: SlideInfoHeader3,
        /// One entry per page; [`PAGE_ATTR_NO_REBASE`] marks clean pages
        page_starts: Vec<u16>,
    },
    /// Version 4 header (arm64_32)
    V4(SlideInfoHeader4),
    /// Version 5 header and page starts (arm64e, iOS 18+)
    V5 {
        /// Fixed header
        header: SlideInfoHeader5,
        /// One entry per page; [`PAGE_ATTR_NO_REBASE`] marks clean pages
        page_starts: Vec<u16>,
    },
}

impl SlideInfo {
    /// Decodes a slide-info region, dispatching on the leading version.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::SlideInfoParseError(
                "slide info shorter than its version field".into(),
            ));
        }

        match read_u32_le(data) {
            1 => Ok(Self::V1(read_header::<SlideInfoHeader1>(
                data,
                SlideInfoHeader1::SIZE,
            )?)),
            2 => Ok(Self::V2(read_header::<SlideInfoHeader2>(
                data,
                SlideInfoHeader2::SIZE,
            )?)),
            3 => {
                let header = read_header::<SlideInfoHeader3>(data, SlideInfoHeader3::SIZE)?;
                let page_starts =
                    read_page_starts(data, SlideInfoHeader3::SIZE, header.page_starts_count)?;
                Ok(Self::V3 {
                    header,
                    page_starts,
                })
            }
            4 => Ok(Self::V4(read_header::<SlideInfoHeader4>(
                data,
                SlideInfoHeader4::SIZE,
            )?)),
            5 => {
                let header = read_header::<SlideInfoHeader5>(data, SlideInfoHeader5::SIZE)?;
                let page_starts =
                    read_page_starts(data, SlideInfoHeader5::SIZE, header.page_starts_count)?;
                Ok(Self::V5 {
                    header,
                    page_starts,
                })
            }
            other => Err(Error::UnknownSlideInfoVersion(other)),
        }
    }

    /// The format version.
    pub fn version(&self) -> u32 {
        match self {
            Self::V1(_) => 1,
            Self::V2(_) => 2,
            Self::V3 { .. } => 3,
            Self::V4(_) => 4,
            Self::V5 { .. } => 5,
        }
    }

    /// Page size, where the version defines one.
    pub fn page_size(&self) -> Option<u32> {
        match self {
            Self::V1(_) => None,
            Self::V2(h) => Some(h.page_size),
            Self::V3 { header, .. } => Some(header.page_size),
            Self::V4(h) => Some(h.page_size),
            Self::V5 { header, .. } => Some(header.page_size),
        }
    }

    /// Base added to rebased pointer values, where the version defines
    /// one.
    pub fn value_add(&self) -> Option<u64> {
        match self {
            Self::V1(_) => None,
            Self::V2(h) => Some(h.value_add),
            Self::V3 { header, .. } => Some(header.auth_value_add),
            Self::V4(h) => Some(h.value_add),
            Self::V5 { header, .. } => Some(header.value_add),
        }
    }
}

fn read_header<T: FromBytes + Copy>(data: &[u8], size: usize) -> Result<T> {
    if data.len() < size {
        return Err(Error::SlideInfoParseError(format!(
            "slide info header truncated: need {size} bytes, have {}",
            data.len()
        )));
    }
    T::read_from_prefix(data)
        .map(|(header, _)| header)
        .map_err(|_| Error::SlideInfoParseError("malformed slide info header".into()))
}

fn read_page_starts(data: &[u8], header_size: usize, count: u32) -> Result<Vec<u16>> {
    if count > MAX_PAGE_STARTS {
        return Err(Error::SlideInfoParseError(format!(
            "page starts count {count} exceeds cap {MAX_PAGE_STARTS}"
        )));
    }
    let bytes_needed = (count as usize) * 2;
    let array = data
        .get(header_size..header_size + bytes_needed)
        .ok_or_else(|| {
            Error::SlideInfoParseError(format!(
                "page starts array truncated: need {bytes_needed} bytes past the header"
            ))
        })?;
    Ok(array.chunks_exact(2).map(read_u16_le).collect())
}

// =============================================================================
// Encoded Pointers
// =============================================================================

/// An encoded pointer under slide info v3.
#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
pub struct SlidePointer3(pub u64);

impl SlidePointer3 {
    /// True for authenticated (PAC) pointers.
    #[inline]
    pub fn is_auth(&self) -> bool {
        (self.0 >> 63) & 1 != 0
    }

    /// Offset to the next rebase location, in 8-byte units.
    #[inline]
    pub fn offset_to_next(&self) -> u64 {
        (self.0 >> 51) & 0x7FF
    }

    /// For authenticated pointers: offset from the auth base.
    #[inline]
    pub fn auth_offset(&self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    /// For plain pointers: the decoded target with the high byte
    /// reassembled.
    #[inline]
    pub fn plain_value(&self) -> u64 {
        let value = self.0 & 0x0007_FFFF_FFFF_FFFF;
        let top8 = (self.0 >> 43) & 0xFF;
        (top8 << 56) | value
    }

    /// The unslid target this pointer encodes, given the header's
    /// `auth_value_add`.
    #[inline]
    pub fn unslid_target(&self, auth_value_add: u64) -> u64 {
        if self.is_auth() {
            auth_value_add.wrapping_add(self.auth_offset() as u64)
        } else {
            self.plain_value()
        }
    }
}

/// An encoded pointer under slide info v5.
#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
pub struct SlidePointer5(pub u64);

impl SlidePointer5 {
    /// True for authenticated (PAC) pointers.
    #[inline]
    pub fn is_auth(&self) -> bool {
        (self.0 >> 63) & 1 != 0
    }

    /// Offset to the next rebase location, in 8-byte units.
    #[inline]
    pub fn offset_to_next(&self) -> u64 {
        (self.0 >> 51) & 0x7FF
    }

    /// Runtime offset from the value-add base (auth and plain alike).
    #[inline]
    pub fn runtime_offset(&self) -> u64 {
        self.0 & 0x0007_FFFF_FFFF_FFFF
    }

    /// For plain pointers: the high 8 bits to reassemble.
    #[inline]
    pub fn high8(&self) -> u8 {
        ((self.0 >> 43) & 0xFF) as u8
    }

    /// The unslid target this pointer encodes, given the header's
    /// `value_add`.
    #[inline]
    pub fn unslid_target(&self, value_add: u64) -> u64 {
        value_add.wrapping_add(self.runtime_offset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::IntoBytes;

    fn v3_region(page_starts: &[u16]) -> Vec<u8> {
        let header = SlideInfoHeader3 {
            version: 3,
            page_size: 0x4000,
            page_starts_count: page_starts.len() as u32,
            _pad: 0,
            auth_value_add: 0x1_8000_0000,
        };
        let mut data = header.as_bytes().to_vec();
        for &s in page_starts {
            data.extend_from_slice(&s.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_v3_parse() {
        let data = v3_region(&[0, 8, PAGE_ATTR_NO_REBASE]);
        match SlideInfo::parse(&data).unwrap() {
            SlideInfo::V3 {
                header,
                page_starts,
            } => {
                assert_eq!(header.page_size, 0x4000);
                assert_eq!(header.auth_value_add, 0x1_8000_0000);
                assert_eq!(page_starts, vec![0, 8, PAGE_ATTR_NO_REBASE]);
            }
            other => panic!("unexpected variant {other:?}"),
        }
    }

    #[test]
    fn test_v2_parse_header_only() {
        let header = SlideInfoHeader2 {
            version: 2,
            page_size: 0x1000,
            page_starts_offset: 40,
            page_starts_count: 16,
            page_extras_offset: 72,
            page_extras_count: 0,
            delta_mask: 0x00FF_FF00_0000_0000,
            value_add: 0,
        };
        let info = SlideInfo::parse(header.as_bytes()).unwrap();
        assert_eq!(info.version(), 2);
        assert_eq!(info.page_size(), Some(0x1000));
        match info {
            SlideInfo::V2(h) => {
                assert_eq!(h.delta_shift(), 40);
                assert_eq!(h.value_mask(), !0x00FF_FF00_0000_0000u64);
            }
            other => panic!("unexpected variant {other:?}"),
        }
    }

    #[test]
    fn test_unknown_version() {
        let mut data = vec![0u8; 40];
        data[..4].copy_from_slice(&9u32.to_le_bytes());
        assert!(matches!(
            SlideInfo::parse(&data),
            Err(Error::UnknownSlideInfoVersion(9))
        ));
    }

    #[test]
    fn test_page_starts_cap() {
        let mut data = v3_region(&[]);
        // Claim more page starts than the cap without supplying them.
        data[8..12].copy_from_slice(&(MAX_PAGE_STARTS + 1).to_le_bytes());
        assert!(matches!(
            SlideInfo::parse(&data),
            Err(Error::SlideInfoParseError(_))
        ));
    }

    #[test]
    fn test_truncated_page_starts() {
        let mut data = v3_region(&[0, 8]);
        data.truncate(data.len() - 1);
        assert!(matches!(
            SlideInfo::parse(&data),
            Err(Error::SlideInfoParseError(_))
        ));
    }

    #[test]
    fn test_truncated_header() {
        let data = 5u32.to_le_bytes();
        assert!(matches!(
            SlideInfo::parse(&data),
            Err(Error::SlideInfoParseError(_))
        ));
    }

    #[test]
    fn test_slide_pointer3_plain() {
        // Plain pointer: top8 = 0xFF in bits 43..51, low value 0x1000.
        let raw = (0xFFu64 << 43) | 0x1000;
        let ptr = SlidePointer3(raw);
        assert!(!ptr.is_auth());
        assert_eq!(ptr.plain_value(), (0xFFu64 << 56) | 0x1000);
        assert_eq!(ptr.unslid_target(0), ptr.plain_value());
    }

    #[test]
    fn test_slide_pointer3_auth() {
        let raw = (1u64 << 63) | (3u64 << 51) | 0x2468;
        let ptr = SlidePointer3(raw);
        assert!(ptr.is_auth());
        assert_eq!(ptr.offset_to_next(), 3);
        assert_eq!(ptr.auth_offset(), 0x2468);
        assert_eq!(ptr.unslid_target(0x1_8000_0000), 0x1_8000_2468);
    }

    #[test]
    fn test_slide_pointer5() {
        let raw = (1u64 << 63) | (2u64 << 51) | 0x4_2000;
        let ptr = SlidePointer5(raw);
        assert!(ptr.is_auth());
        assert_eq!(ptr.offset_to_next(), 2);
        assert_eq!(ptr.runtime_offset(), 0x4_2000);
        assert_eq!(ptr.unslid_target(0x1_8000_0000), 0x1_8004_2000);
    }
}
