//! Multi-file cache coordination.
//!
//! Modern caches are split: a main file, ordered subcaches discovered by
//! file suffix, and an optional `.symbols` sidecar. The
//! [`MultiCacheReader`] opens the whole set through a caller-supplied
//! opener, enforces UUID consistency between parent entries and the files
//! they name, and answers every cross-file question: VM reads spanning
//! file boundaries, per-image exports, local symbols, and PC
//! symbolication.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::localsyms::{LocalSymbol, LocalSymbolsContext};
use super::slide::SlideInfo;
use super::structs::{uuid_to_string, ImageInfo, ImageTextInfo, SubCacheEntry};
use super::trie::{ExportSymbol, ExportTrie};
use super::view::SingleCacheView;
use crate::error::{Error, Result};
use crate::macho::{self, MachHeader64};
use crate::source::{BoxedSource, SourceOpener, MAX_STRING_BYTES};

/// Strictness and decoding options for opening a split cache.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Fail when a declared subcache file is missing (instead of
    /// skipping it)
    pub require_all_subcaches: bool,
    /// Fail when the declared `.symbols` sidecar is missing
    pub require_symbols_file: bool,
    /// Width of local-symbol entries; `None` derives it from the
    /// presence of a symbols-file UUID
    pub locals_use_64bit_offsets: Option<bool>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            require_all_subcaches: true,
            require_symbols_file: false,
            locals_use_64bit_offsets: None,
        }
    }
}

/// One opened cache file: parsed view plus its byte source.
struct CacheFile {
    view: SingleCacheView,
    source: BoxedSource,
    path: PathBuf,
}

impl std::fmt::Debug for CacheFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheFile")
            .field("view", &self.view)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// A loaded subcache, keyed by the UUID its parent declared.
struct SubCache {
    uuid: [u8; 16],
    file: CacheFile,
}

impl std::fmt::Debug for SubCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubCache")
            .field("uuid", &self.uuid)
            .field("file", &self.file)
            .finish()
    }
}

/// Where the local-symbols region lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalsHome {
    MainFile,
    SymbolsFile,
}

#[derive(Debug)]
struct LocalsState {
    context: LocalSymbolsContext,
    home: LocalsHome,
}

/// Result of symbolicating one PC value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicationResult {
    /// Name of the nearest preceding symbol
    pub name: String,
    /// PC relative to the image's load address
    pub pc_offset: u64,
    /// Matched symbol's offset relative to the image
    pub symbol_offset: u64,
    /// `pc_offset - symbol_offset`
    pub addend: u64,
}

/// Read-only coordinator over a main cache, its subcaches, and the
/// optional symbols sidecar. Immutable once opened; share freely across
/// threads.
#[derive(Debug)]
pub struct MultiCacheReader {
    main: CacheFile,
    subcaches: Vec<SubCache>,
    symbols_file: Option<CacheFile>,
    locals: Option<LocalsState>,
}

impl MultiCacheReader {
    /// Opens the cache set rooted at `main_path`.
    ///
    /// The opener maps a path to a byte source, returning `Ok(None)` for
    /// files that do not exist. Subcache paths are derived as
    /// `basename(main) + suffix` in the main file's directory; the
    /// symbols sidecar as `main_path + ".symbols"`.
    pub fn open<P: AsRef<Path>>(
        main_path: P,
        opener: &SourceOpener<'_>,
        options: ReaderOptions,
    ) -> Result<Self> {
        let main_path = main_path.as_ref().to_path_buf();
        let source = opener(&main_path)?.ok_or_else(|| Error::FileReadError {
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("main cache not found: {}", main_path.display()),
            ),
        })?;
        let view = SingleCacheView::parse(&*source)?;
        let main = CacheFile {
            view,
            source,
            path: main_path,
        };

        let subcaches = Self::open_subcaches(&main, opener, &options)?;
        let symbols_file = Self::open_symbols_file(&main, opener, &options)?;
        let locals = Self::open_locals(&main, symbols_file.as_ref(), &options)?;

        debug!(
            path = %main.path.display(),
            subcaches = subcaches.len(),
            has_symbols_file = symbols_file.is_some(),
            has_locals = locals.is_some(),
            "opened split cache"
        );

        Ok(Self {
            main,
            subcaches,
            symbols_file,
            locals,
        })
    }

    fn open_subcaches(
        main: &CacheFile,
        opener: &SourceOpener<'_>,
        options: &ReaderOptions,
    ) -> Result<Vec<SubCache>> {
        let parent = main.path.parent().unwrap_or(Path::new("."));
        let main_name = main
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        let mut subcaches = Vec::with_capacity(main.view.subcaches().len());
        for entry in main.view.subcaches() {
            let path = parent.join(format!("{}{}", main_name, entry.file_suffix));
            let Some(source) = opener(&path)? else {
                if options.require_all_subcaches {
                    return Err(Error::SubCacheNotFound { path });
                }
                warn!(path = %path.display(), "declared subcache missing; skipping");
                continue;
            };

            let view = SingleCacheView::parse(&*source)?;
            check_uuid(&path, &entry.uuid, view.header().uuid())?;

            subcaches.push(SubCache {
                uuid: entry.uuid,
                file: CacheFile { view, source, path },
            });
        }
        Ok(subcaches)
    }

    fn open_symbols_file(
        main: &CacheFile,
        opener: &SourceOpener<'_>,
        options: &ReaderOptions,
    ) -> Result<Option<CacheFile>> {
        if !main.view.header().has_symbols_file() {
            return Ok(None);
        }

        let mut name = main.path.as_os_str().to_owned();
        name.push(".symbols");
        let path = PathBuf::from(name);

        let Some(source) = opener(&path)? else {
            if options.require_symbols_file {
                return Err(Error::SymbolsFileNotFound { path });
            }
            warn!(path = %path.display(), "declared symbols file missing; skipping");
            return Ok(None);
        };

        let view = SingleCacheView::parse(&*source)?;
        check_uuid(&path, main.view.header().symbols_file_uuid(), view.header().uuid())?;

        Ok(Some(CacheFile { view, source, path }))
    }

    fn open_locals(
        main: &CacheFile,
        symbols_file: Option<&CacheFile>,
        options: &ReaderOptions,
    ) -> Result<Option<LocalsState>> {
        let use_64bit = options
            .locals_use_64bit_offsets
            .unwrap_or_else(|| main.view.header().has_symbols_file());

        // Newer caches keep local symbols in the sidecar; older ones keep
        // them in the main file.
        let (file, home) = match symbols_file {
            Some(symbols) if symbols.view.header().local_symbols_region().0 != 0 => {
                (symbols, LocalsHome::SymbolsFile)
            }
            _ => (main, LocalsHome::MainFile),
        };

        let (offset, size) = file.view.header().local_symbols_region();
        if offset == 0 || size == 0 {
            return Ok(None);
        }

        let context = LocalSymbolsContext::new(&*file.source, offset, use_64bit)?;
        Ok(Some(LocalsState { context, home }))
    }

    // =========================================================================
    // File and Metadata Access
    // =========================================================================

    /// The main file's parsed view.
    #[inline]
    pub fn main_view(&self) -> &SingleCacheView {
        &self.main.view
    }

    /// Path the main file was opened from.
    #[inline]
    pub fn main_path(&self) -> &Path {
        &self.main.path
    }

    /// Number of loaded subcaches.
    #[inline]
    pub fn subcache_count(&self) -> usize {
        self.subcaches.len()
    }

    /// The subcache view loaded for `uuid`, if any.
    pub fn subcache_view(&self, uuid: &[u8; 16]) -> Option<&SingleCacheView> {
        self.subcaches
            .iter()
            .find(|s| &s.uuid == uuid)
            .map(|s| &s.file.view)
    }

    /// The symbols sidecar view, when one was loaded.
    pub fn symbols_view(&self) -> Option<&SingleCacheView> {
        self.symbols_file.as_ref().map(|f| &f.view)
    }

    /// True when local symbols are available.
    #[inline]
    pub fn has_local_symbols(&self) -> bool {
        self.locals.is_some()
    }

    /// All files carrying VM mappings, main first, subcaches in declared
    /// order.
    fn mapped_files(&self) -> impl Iterator<Item = &CacheFile> {
        std::iter::once(&self.main).chain(self.subcaches.iter().map(|s| &s.file))
    }

    // =========================================================================
    // Images
    // =========================================================================

    /// Number of images in the cache.
    pub fn image_count(&self) -> usize {
        let images = self.main.view.images().len();
        if images != 0 {
            images
        } else {
            self.main.view.images_text().len()
        }
    }

    /// The image records of the main file.
    #[inline]
    pub fn images(&self) -> &[ImageInfo] {
        self.main.view.images()
    }

    /// The image-TEXT records of the main file.
    #[inline]
    pub fn images_text(&self) -> &[ImageTextInfo] {
        self.main.view.images_text()
    }

    /// The subcache entries declared by the main file.
    #[inline]
    pub fn subcache_entries(&self) -> &[SubCacheEntry] {
        self.main.view.subcaches()
    }

    /// Unslid address of image `index`'s Mach-O header.
    pub fn image_address(&self, index: usize) -> Result<u64> {
        if let Some(info) = self.main.view.images().get(index) {
            return Ok(info.address);
        }
        if let Some(text) = self.main.view.images_text().get(index) {
            return Ok(text.load_address);
        }
        Err(Error::ImageIndexOutOfBounds {
            index,
            total: self.image_count(),
        })
    }

    /// Install path of image `index`.
    ///
    /// The path string lives in the same file as the image record.
    pub fn image_path(&self, index: usize) -> Result<String> {
        let offset = if let Some(info) = self.main.view.images().get(index) {
            info.path_file_offset as u64
        } else if let Some(text) = self.main.view.images_text().get(index) {
            text.path_offset as u64
        } else {
            return Err(Error::ImageIndexOutOfBounds {
                index,
                total: self.image_count(),
            });
        };

        if offset == 0 || offset >= self.main.source.size() {
            return Err(Error::InvalidStringOffset { offset });
        }
        self.main
            .source
            .read_nul_terminated_string(offset, MAX_STRING_BYTES)
    }

    /// Install paths of every image, in image order.
    pub fn image_paths(&self) -> Result<Vec<String>> {
        (0..self.image_count()).map(|i| self.image_path(i)).collect()
    }

    /// Index of the image whose TEXT record carries `uuid`.
    pub fn image_index_for_uuid(&self, uuid: &[u8; 16]) -> Option<usize> {
        self.main
            .view
            .images_text()
            .iter()
            .position(|t| &t.uuid == uuid)
    }

    // =========================================================================
    // Cross-File VM Reads
    // =========================================================================

    /// Reads `size` bytes starting at the unslid address `vm_addr`,
    /// crossing file boundaries as mappings dictate.
    ///
    /// Every byte must be mapped by some loaded file; the first unmapped
    /// byte fails the whole read with [`Error::VmAddressNotMapped`].
    pub fn read_vm_bytes(&self, vm_addr: u64, size: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(size);
        let mut cursor = vm_addr;
        let mut remaining = size;

        while remaining > 0 {
            let Some((file, mapping)) = self.mapped_files().find_map(|file| {
                file.view
                    .resolver()
                    .mapping_for_vm(cursor)
                    .map(|mapping| (file, mapping))
            }) else {
                return Err(Error::VmAddressNotMapped { addr: cursor });
            };

            let file_offset = mapping.vm_to_file_offset(cursor);
            let available = mapping.remaining_from(cursor);
            let take = (remaining as u64).min(available) as usize;
            let bytes = file.source.read_exact_at(file_offset, take)?;
            out.extend_from_slice(&bytes);

            cursor += take as u64;
            remaining -= take;
        }

        Ok(out)
    }

    /// Resolves an unslid address to (file path, file offset).
    pub fn resolve_vm_address(&self, vm_addr: u64) -> Option<(&Path, u64)> {
        self.mapped_files().find_map(|file| {
            file.view
                .resolver()
                .file_offset_for_vm(vm_addr)
                .map(|offset| (file.path.as_path(), offset))
        })
    }

    /// Decodes the slide info of every slide-bearing mapping, main file
    /// first, then subcaches in declared order.
    pub fn slide_infos(&self) -> Result<Vec<SlideInfo>> {
        let mut infos = Vec::new();
        for file in self.mapped_files() {
            for mapping in file.view.mappings_with_slide() {
                if !mapping.has_slide_info() {
                    continue;
                }
                let bytes = file.source.read_exact_at(
                    mapping.slide_info_file_offset,
                    mapping.slide_info_file_size as usize,
                )?;
                infos.push(SlideInfo::parse(&bytes)?);
            }
        }
        Ok(infos)
    }

    // =========================================================================
    // Symbols
    // =========================================================================

    /// Enumerates the exported symbols of image `index`, best-effort: a
    /// trie truncated mid-walk yields the symbols gathered before the
    /// damage.
    pub fn exported_symbols(&self, index: usize) -> Result<Vec<ExportSymbol>> {
        let address = self.image_address(index)?;

        // First read just enough header to learn the command area size,
        // then re-read the whole thing.
        let head = self.read_vm_bytes(address, MachHeader64::SIZE)?;
        let geometry = macho::read_header_geometry(&head)?;
        let image = self.read_vm_bytes(address, geometry.total_size() as usize)?;

        let Some(location) = macho::locate_exports_trie(&image)? else {
            return Ok(Vec::new());
        };

        let trie_bytes = self.read_vm_bytes(location.vm_addr, location.size as usize)?;
        Ok(ExportTrie::new(&trie_bytes).all_symbols_best_effort())
    }

    /// Looks up one exported symbol of image `index` by exact name.
    pub fn lookup_export(&self, index: usize, name: &str) -> Result<ExportSymbol> {
        let address = self.image_address(index)?;
        let head = self.read_vm_bytes(address, MachHeader64::SIZE)?;
        let geometry = macho::read_header_geometry(&head)?;
        let image = self.read_vm_bytes(address, geometry.total_size() as usize)?;

        let location = macho::locate_exports_trie(&image)?.ok_or_else(|| {
            Error::SymbolNotFound {
                name: name.to_string(),
            }
        })?;
        let trie_bytes = self.read_vm_bytes(location.vm_addr, location.size as usize)?;
        ExportTrie::new(&trie_bytes)
            .lookup(name)?
            .ok_or_else(|| Error::SymbolNotFound {
                name: name.to_string(),
            })
    }

    /// Resolves the local symbols of image `index`.
    pub fn local_symbols(&self, index: usize) -> Result<Vec<LocalSymbol>> {
        let Some(locals) = &self.locals else {
            return Err(Error::InvalidLocalSymbolsInfo {
                reason: "cache carries no local symbols".into(),
            });
        };
        let source = match (locals.home, &self.symbols_file) {
            (LocalsHome::SymbolsFile, Some(symbols)) => &symbols.source,
            _ => &self.main.source,
        };
        locals.context.symbols_for_image(&**source, index)
    }

    // =========================================================================
    // Symbolication
    // =========================================================================

    /// Symbolicates a PC value against the image carrying `image_uuid`.
    ///
    /// The PC must be an unslid address at or above the image's load
    /// address. When `prefer_locals` is set and the cache carries local
    /// symbols, only those are consulted, even for an image that resolves
    /// to no usable local entries; export-trie symbols are used only when
    /// locals were not requested or the cache has none.
    pub fn symbolicate(
        &self,
        pc: u64,
        image_uuid: &[u8; 16],
        prefer_locals: bool,
    ) -> Result<SymbolicationResult> {
        let index = self
            .image_index_for_uuid(image_uuid)
            .ok_or_else(|| Error::SymbolNotFound {
                name: format!("image {}", uuid_to_string(image_uuid)),
            })?;
        let load_address = self.main.view.images_text()[index].load_address;

        if pc < load_address {
            return Err(Error::VmAddressNotMapped { addr: pc });
        }
        let pc_offset = pc - load_address;

        let mut entries = self.symbol_entries(index, load_address, prefer_locals)?;
        entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        // Largest entry at or below the PC offset.
        let position = entries.partition_point(|&(offset, _)| offset <= pc_offset);
        let Some((symbol_offset, name)) = position.checked_sub(1).map(|i| entries.swap_remove(i))
        else {
            return Err(Error::SymbolNotFound {
                name: format!("pc {pc:#x}"),
            });
        };

        Ok(SymbolicationResult {
            name,
            pc_offset,
            symbol_offset,
            addend: pc_offset - symbol_offset,
        })
    }

    /// Builds the (image-relative offset, name) candidates for
    /// symbolication.
    fn symbol_entries(
        &self,
        index: usize,
        load_address: u64,
        prefer_locals: bool,
    ) -> Result<Vec<(u64, String)>> {
        if prefer_locals && self.has_local_symbols() {
            // The caller chose the source; an image with no usable local
            // entries fails the lookup rather than silently switching to
            // exports.
            let locals = self.local_symbols(index)?;
            return Ok(locals
                .into_iter()
                .filter(|s| s.value >= load_address)
                .map(|s| (s.value - load_address, s.name))
                .collect());
        }

        let exports = self.exported_symbols(index)?;
        Ok(exports
            .into_iter()
            .filter_map(|symbol| {
                let value = symbol.offset?;
                if symbol.flags.is_absolute() {
                    // Absolute values are unslid addresses; anything below
                    // the image cannot belong to it.
                    if value < load_address {
                        return None;
                    }
                    Some((value - load_address, symbol.name))
                } else {
                    // Trie offsets are already image-relative.
                    Some((value, symbol.name))
                }
            })
            .collect())
    }
}

fn check_uuid(path: &Path, expected: &[u8; 16], actual: &[u8; 16]) -> Result<()> {
    if expected != actual {
        return Err(Error::SubCacheUuidMismatch {
            path: path.to_path_buf(),
            expected: uuid_to_string(expected),
            actual: uuid_to_string(actual),
        });
    }
    Ok(())
}
