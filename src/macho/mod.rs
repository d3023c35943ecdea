//! Minimal Mach-O surface.
//!
//! The cache stores each image as a regular Mach-O; this crate only needs
//! enough of the format to find an image's exports trie and to decode
//! nlist symbol records. Everything else about Mach-O is out of scope.

mod constants;
mod locator;
mod structs;

pub use constants::*;
pub use locator::*;
pub use structs::*;

#[cfg(test)]
pub(crate) use locator::tests::MachOBuilder;
