//! dscview - inspect Apple's dyld shared cache from the command line.
//!
//! Thin presentation layer over the library: open a split cache, print
//! header metadata, list images, dump symbols, symbolicate a PC.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use dscview::dyld::uuid_to_string;
use dscview::{mmap_opener, MultiCacheReader, ReaderOptions};

/// Default locations to search for dyld shared caches on macOS.
const DEFAULT_CACHE_PATHS: &[&str] = &[
    // macOS Ventura+ (cryptex)
    "/System/Volumes/Preboot/Cryptexes/OS/System/Library/dyld",
    // Traditional location
    "/System/Library/dyld",
];

/// A read-only inspector for dyld shared caches.
#[derive(Parser, Debug)]
#[command(name = "dscview")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Tolerate missing subcache files
    #[arg(long, global = true)]
    allow_missing_subcaches: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print header metadata for a cache
    Info {
        /// Path to the main cache file (searches system locations if omitted)
        cache: Option<PathBuf>,
    },

    /// List all images in the cache
    List {
        /// Filter images by substring match
        #[arg(short, long)]
        filter: Option<String>,

        /// Path to the main cache file (searches system locations if omitted)
        cache: Option<PathBuf>,
    },

    /// Print the symbols of one image
    Symbols {
        /// Image index or path substring
        #[arg(short, long)]
        image: String,

        /// Print local symbols instead of exports
        #[arg(long)]
        locals: bool,

        /// Path to the main cache file (searches system locations if omitted)
        cache: Option<PathBuf>,
    },

    /// Symbolicate a PC value against an image
    Symbolicate {
        /// Unslid PC value (hex accepted with 0x prefix)
        #[arg(short, long, value_parser = parse_address)]
        pc: u64,

        /// Image index or path substring
        #[arg(short, long)]
        image: String,

        /// Prefer local symbols over exports
        #[arg(long)]
        locals: bool,

        /// Path to the main cache file (searches system locations if omitted)
        cache: Option<PathBuf>,
    },
}

fn parse_address(s: &str) -> std::result::Result<u64, String> {
    let trimmed = s.trim();
    let (digits, radix) = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(rest) => (rest, 16),
        None => (trimmed, 10),
    };
    u64::from_str_radix(digits, radix).map_err(|e| format!("invalid address '{s}': {e}"))
}

/// Searches the default system locations for a main cache file.
fn locate_default_cache() -> Result<PathBuf> {
    for dir in DEFAULT_CACHE_PATHS {
        let Ok(entries) = std::fs::read_dir(dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            // Main cache files have no numeric or .symbols suffix.
            if name.starts_with("dyld_shared_cache_") && !name.contains('.') {
                return Ok(entry.path());
            }
        }
    }
    bail!("no dyld shared cache found in default locations; pass a path")
}

fn open_cache(path: Option<&PathBuf>, allow_missing_subcaches: bool) -> Result<MultiCacheReader> {
    let path = match path {
        Some(path) => path.clone(),
        None => locate_default_cache()?,
    };
    let opener = mmap_opener();
    let options = ReaderOptions {
        require_all_subcaches: !allow_missing_subcaches,
        ..Default::default()
    };
    MultiCacheReader::open(&path, &opener, options)
        .with_context(|| format!("failed to open cache at {}", path.display()))
}

/// Resolves `--image` as an index first, then as a path substring.
fn resolve_image(cache: &MultiCacheReader, selector: &str) -> Result<usize> {
    if let Ok(index) = selector.parse::<usize>() {
        if index < cache.image_count() {
            return Ok(index);
        }
        bail!(
            "image index {index} out of bounds ({} images)",
            cache.image_count()
        );
    }
    for (index, path) in cache.image_paths()?.iter().enumerate() {
        if path.contains(selector) {
            return Ok(index);
        }
    }
    bail!("no image matches '{selector}'");
}

fn cmd_info(cache: &MultiCacheReader) -> Result<()> {
    let header = cache.main_view().header();
    let (major, minor, patch) = header.os_version();
    let flags = header.flags();

    println!("magic:          {}", header.magic_str());
    println!("architecture:   {}", header.architecture().name());
    println!("uuid:           {}", uuid_to_string(header.uuid()));
    println!("platform:       {:?}", header.platform());
    println!("cache kind:     {:?}", header.cache_kind());
    println!("os version:     {major}.{minor}.{patch}");
    println!("format version: {}", flags.format_version());
    println!(
        "shared region:  {:#x} + {:#x}",
        header.shared_region_start(),
        header.shared_region_size()
    );
    println!("max slide:      {:#x}", header.max_slide());
    println!("images:         {}", cache.image_count());
    println!("mappings:       {}", cache.main_view().mappings().len());
    println!(
        "slide mappings: {}",
        cache.main_view().mappings_with_slide().len()
    );
    println!(
        "subcaches:      {} declared, {} loaded",
        cache.subcache_entries().len(),
        cache.subcache_count()
    );
    if header.has_symbols_file() {
        println!(
            "symbols file:   {} ({})",
            uuid_to_string(header.symbols_file_uuid()),
            if cache.symbols_view().is_some() {
                "loaded"
            } else {
                "missing"
            }
        );
    }
    if cache.has_local_symbols() {
        println!("local symbols:  available");
    }
    Ok(())
}

fn cmd_list(cache: &MultiCacheReader, filter: Option<&str>) -> Result<()> {
    for (index, path) in cache.image_paths()?.iter().enumerate() {
        if let Some(filter) = filter {
            if !path.contains(filter) {
                continue;
            }
        }
        let address = cache.image_address(index)?;
        println!("{address:#014x}  {path}");
    }
    Ok(())
}

fn cmd_symbols(cache: &MultiCacheReader, selector: &str, locals: bool) -> Result<()> {
    let index = resolve_image(cache, selector)?;
    if locals {
        let symbols = cache
            .local_symbols(index)
            .context("local symbols unavailable")?;
        for symbol in symbols {
            println!("{:#014x}  {}", symbol.value, symbol.name);
        }
    } else {
        for symbol in cache.exported_symbols(index)? {
            match symbol.offset {
                Some(offset) => println!("{offset:#014x}  {}", symbol.name),
                None => println!("{:>14}  {} (re-export)", "-", symbol.name),
            }
        }
    }
    Ok(())
}

fn cmd_symbolicate(cache: &MultiCacheReader, pc: u64, selector: &str, locals: bool) -> Result<()> {
    let index = resolve_image(cache, selector)?;
    let text = cache
        .images_text()
        .get(index)
        .context("cache has no image TEXT records; cannot symbolicate")?;
    let uuid = text.uuid;

    let result = cache.symbolicate(pc, &uuid, locals)?;
    println!(
        "{} + {:#x}  (pc offset {:#x}, symbol at {:#x})",
        result.name, result.addend, result.pc_offset, result.symbol_offset
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.command {
        Commands::Info { cache } => {
            let cache = open_cache(cache.as_ref(), cli.allow_missing_subcaches)?;
            cmd_info(&cache)
        }
        Commands::List { filter, cache } => {
            let cache = open_cache(cache.as_ref(), cli.allow_missing_subcaches)?;
            cmd_list(&cache, filter.as_deref())
        }
        Commands::Symbols {
            image,
            locals,
            cache,
        } => {
            let cache = open_cache(cache.as_ref(), cli.allow_missing_subcaches)?;
            cmd_symbols(&cache, image, *locals)
        }
        Commands::Symbolicate {
            pc,
            image,
            locals,
            cache,
        } => {
            let cache = open_cache(cache.as_ref(), cli.allow_missing_subcaches)?;
            cmd_symbolicate(&cache, *pc, image, *locals)
        }
    }
}
