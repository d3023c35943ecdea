//! Bounds-checked sequential reader over a byte slice.
//!
//! Every table and trie decoder in the crate walks bytes through a
//! [`ParseCursor`]; short reads surface as typed errors, never panics.

use crate::error::{Error, Result};
use crate::util;

/// Cap applied to NUL-terminated reads inside tries and tables.
///
/// Matches the maximum symbol name length the export trie accepts.
pub const MAX_NUL_STRING_LEN: usize = 4096;

/// A bounds-checked cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct ParseCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ParseCursor<'a> {
    /// Creates a cursor at position 0.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current absolute position.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes remaining after the current position.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true when the cursor has consumed the whole slice.
    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Seeks to an absolute offset within the slice.
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(Error::OffsetOutOfBounds {
                offset: offset as u64,
                size: self.data.len() as u64,
            });
        }
        self.pos = offset;
        Ok(())
    }

    /// Takes the next `len` bytes as a sub-slice.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| Error::range(self.pos as u64, len as u64, self.data.len() as u64))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Reads a fixed-width byte array.
    pub fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Reads a little-endian u8.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a little-endian u16.
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(util::read_u16_le(self.take(2)?))
    }

    /// Reads a little-endian u32.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(util::read_u32_le(self.take(4)?))
    }

    /// Reads a little-endian u64.
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(util::read_u64_le(self.take(8)?))
    }

    /// Reads a NUL-terminated UTF-8 string, capped at
    /// [`MAX_NUL_STRING_LEN`] bytes. Invalid UTF-8 is replaced.
    pub fn read_nul_string(&mut self) -> Result<String> {
        let window_end = self
            .pos
            .saturating_add(MAX_NUL_STRING_LEN + 1)
            .min(self.data.len());
        let window = &self.data[self.pos..window_end];
        let nul = util::memchr_null(window);
        if nul == window.len() {
            // No terminator inside the window: either the slice ended or
            // the string exceeds the cap.
            if window_end == self.data.len() {
                return Err(Error::UnexpectedEndOfTrie { offset: self.pos });
            }
            return Err(Error::trie(format!(
                "unterminated string at offset {:#x} exceeds {} bytes",
                self.pos, MAX_NUL_STRING_LEN
            )));
        }
        let s = String::from_utf8_lossy(&window[..nul]).into_owned();
        self.pos += nul + 1;
        Ok(s)
    }

    /// Reads a ULEB128-encoded unsigned integer.
    pub fn read_uleb128(&mut self) -> Result<u64> {
        let (value, consumed) = util::read_uleb128(&self.data[self.pos..]).ok_or({
            Error::InvalidUleb128 { offset: self.pos }
        })?;
        self.pos += consumed;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_reads() {
        let data = [
            0x01, // u8
            0x34, 0x12, // u16
            0x78, 0x56, 0x34, 0x12, // u32
            0xEF, 0xCD, 0xAB, 0x89, 0x67, 0x45, 0x23, 0x01, // u64
        ];
        let mut cur = ParseCursor::new(&data);
        assert_eq!(cur.read_u8().unwrap(), 0x01);
        assert_eq!(cur.read_u16().unwrap(), 0x1234);
        assert_eq!(cur.read_u32().unwrap(), 0x12345678);
        assert_eq!(cur.read_u64().unwrap(), 0x0123456789ABCDEF);
        assert!(cur.is_at_end());
    }

    #[test]
    fn test_short_read_fails() {
        let mut cur = ParseCursor::new(&[0x01, 0x02]);
        assert!(matches!(
            cur.read_u32(),
            Err(Error::RangeOutOfBounds { .. })
        ));
        // Position unchanged after a failed read.
        assert_eq!(cur.position(), 0);
    }

    #[test]
    fn test_seek() {
        let data = [0u8; 8];
        let mut cur = ParseCursor::new(&data);
        cur.seek(8).unwrap();
        assert!(cur.is_at_end());
        assert!(matches!(
            cur.seek(9),
            Err(Error::OffsetOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_nul_string() {
        let data = b"_main\0rest";
        let mut cur = ParseCursor::new(data);
        assert_eq!(cur.read_nul_string().unwrap(), "_main");
        assert_eq!(cur.position(), 6);
    }

    #[test]
    fn test_nul_string_unterminated() {
        let mut cur = ParseCursor::new(b"abc");
        assert!(matches!(
            cur.read_nul_string(),
            Err(Error::UnexpectedEndOfTrie { .. })
        ));
    }

    #[test]
    fn test_nul_string_over_cap() {
        let mut data = vec![b'a'; MAX_NUL_STRING_LEN + 1];
        data.push(0);
        let mut cur = ParseCursor::new(&data);
        assert!(matches!(
            cur.read_nul_string(),
            Err(Error::InvalidExportTrieFormat(_))
        ));
    }

    #[test]
    fn test_uleb128() {
        let mut cur = ParseCursor::new(&[0xE5, 0x8E, 0x26, 0x7F]);
        assert_eq!(cur.read_uleb128().unwrap(), 624485);
        assert_eq!(cur.read_uleb128().unwrap(), 127);
        assert!(matches!(
            cur.read_uleb128(),
            Err(Error::InvalidUleb128 { .. })
        ));
    }

    #[test]
    fn test_read_bytes() {
        let mut cur = ParseCursor::new(&[1, 2, 3, 4]);
        let arr: [u8; 4] = cur.read_bytes().unwrap();
        assert_eq!(arr, [1, 2, 3, 4]);
    }
}
