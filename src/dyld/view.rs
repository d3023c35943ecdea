//! Parsed metadata for one cache file.
//!
//! A [`SingleCacheView`] is the decoded header plus the metadata tables of
//! exactly one on-disk file (main cache, subcache, or symbols sidecar),
//! with a [`VMAddressResolver`] built over its mappings. Views hold no
//! reference to the byte source; the coordinator owns sources and pairs
//! them back up with views.

use tracing::debug;
use zerocopy::{FromBytes, Immutable, KnownLayout};

use super::header::{CacheHeader, TableRef};
use super::resolver::{CacheMapping, VMAddressResolver};
use super::structs::{
    ImageInfo, ImageTextInfo, MappingAndSlideInfo, MappingInfo, SubCacheEntry, SubCacheEntryV1,
    SubCacheEntryV2,
};
use crate::error::{Error, Result};
use crate::source::ByteSource;

/// Largest header window worth requesting at open.
const HEADER_WINDOW: usize = 4096;

/// Header plus parsed metadata tables for one cache file.
#[derive(Debug)]
pub struct SingleCacheView {
    header: CacheHeader,
    file_size: u64,
    mappings: Vec<MappingInfo>,
    mappings_with_slide: Vec<MappingAndSlideInfo>,
    images: Vec<ImageInfo>,
    images_text: Vec<ImageTextInfo>,
    subcaches: Vec<SubCacheEntry>,
    resolver: VMAddressResolver,
}

impl SingleCacheView {
    /// Parses one cache file's metadata from a byte source.
    pub fn parse<S: ByteSource + ?Sized>(source: &S) -> Result<Self> {
        let file_size = source.size();
        let window_len = (file_size.min(HEADER_WINDOW as u64)) as usize;
        let window = source.read_at(0, window_len)?;
        let header = CacheHeader::decode(&window)?;

        let mappings: Vec<MappingInfo> =
            read_table(source, header.mapping_table(), MappingInfo::SIZE)?;
        let mappings_with_slide: Vec<MappingAndSlideInfo> = read_table(
            source,
            header.mapping_with_slide_table(),
            MappingAndSlideInfo::SIZE,
        )?;
        let images: Vec<ImageInfo> = read_table(source, header.images_table(), ImageInfo::SIZE)?;
        let images_text: Vec<ImageTextInfo> =
            read_table(source, header.images_text_table(), ImageTextInfo::SIZE)?;
        let subcaches = read_subcache_table(source, &header)?;

        // Slide-bearing mappings carry more detail; fall back to the basic
        // set when the cache predates them.
        let resolver = if !mappings_with_slide.is_empty() {
            VMAddressResolver::new(
                mappings_with_slide
                    .iter()
                    .map(CacheMapping::from_extended)
                    .collect(),
            )
        } else {
            VMAddressResolver::new(mappings.iter().map(CacheMapping::from_basic).collect())
        };

        debug!(
            arch = header.architecture().name(),
            mappings = mappings.len(),
            slide_mappings = mappings_with_slide.len(),
            images = images.len(),
            subcaches = subcaches.len(),
            "parsed cache view"
        );

        Ok(Self {
            header,
            file_size,
            mappings,
            mappings_with_slide,
            images,
            images_text,
            subcaches,
            resolver,
        })
    }

    /// The decoded header.
    #[inline]
    pub fn header(&self) -> &CacheHeader {
        &self.header
    }

    /// Size of the backing file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Basic mapping records.
    #[inline]
    pub fn mappings(&self) -> &[MappingInfo] {
        &self.mappings
    }

    /// Extended mapping records (empty on older caches).
    #[inline]
    pub fn mappings_with_slide(&self) -> &[MappingAndSlideInfo] {
        &self.mappings_with_slide
    }

    /// Image records.
    #[inline]
    pub fn images(&self) -> &[ImageInfo] {
        &self.images
    }

    /// Image-TEXT records (parallel to `images` when both are present).
    #[inline]
    pub fn images_text(&self) -> &[ImageTextInfo] {
        &self.images_text
    }

    /// Decoded subcache entries.
    #[inline]
    pub fn subcaches(&self) -> &[SubCacheEntry] {
        &self.subcaches
    }

    /// Address resolver over this file's mappings.
    #[inline]
    pub fn resolver(&self) -> &VMAddressResolver {
        &self.resolver
    }
}

/// Reads `table.count` fixed-size records starting at `table.offset`.
///
/// A zero offset or count yields an empty list. The byte extent is checked
/// with widening arithmetic before any read; overflow means the table
/// cannot be real.
fn read_table<S, T>(source: &S, table: TableRef, entry_size: usize) -> Result<Vec<T>>
where
    S: ByteSource + ?Sized,
    T: FromBytes + KnownLayout + Immutable + Copy,
{
    if table.is_absent() {
        return Ok(Vec::new());
    }

    let byte_len = table
        .count
        .checked_mul(entry_size as u64)
        .and_then(|len| table.offset.checked_add(len).map(|_| len))
        .ok_or_else(|| {
            Error::macho(format!(
                "unreasonable table at {:#x} with {} entries",
                table.offset, table.count
            ))
        })?;

    let file_size = source.size();
    if table.offset + byte_len > file_size {
        return Err(Error::range(table.offset, byte_len, file_size));
    }

    let bytes = source.read_exact_at(table.offset, byte_len as usize)?;
    let mut entries = Vec::with_capacity(table.count as usize);
    for chunk in bytes.chunks_exact(entry_size) {
        let entry = T::read_from_bytes(chunk)
            .map_err(|_| Error::macho(format!("malformed table entry at {:#x}", table.offset)))?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Reads and normalises the subcache table, selecting the wire shape from
/// the header and synthesising `.<1-based-index>` suffixes for v1 entries.
fn read_subcache_table<S: ByteSource + ?Sized>(
    source: &S,
    header: &CacheHeader,
) -> Result<Vec<SubCacheEntry>> {
    let table = header.subcache_table();
    if header.uses_v1_subcache_entries() {
        let raw: Vec<SubCacheEntryV1> = read_table(source, table, SubCacheEntryV1::SIZE)?;
        Ok(raw
            .iter()
            .enumerate()
            .map(|(i, e)| SubCacheEntry {
                uuid: e.uuid,
                cache_vm_offset: e.cache_vm_offset,
                file_suffix: format!(".{}", i + 1),
            })
            .collect())
    } else {
        let raw: Vec<SubCacheEntryV2> = read_table(source, table, SubCacheEntryV2::SIZE)?;
        Ok(raw
            .iter()
            .map(|e| SubCacheEntry {
                uuid: e.uuid,
                cache_vm_offset: e.cache_vm_offset,
                file_suffix: e.suffix_str().to_string(),
            })
            .collect())
    }
}
