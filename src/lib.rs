//! RawPick - RAW+JPEG culling core
//!
//! This crate provides the engine behind a photo culling session: pairing
//! camera files into groups, folding repeated imports into the collection,
//! decoding RAW files into previews with a single-flight cache, and the
//! double-buffered viewer state that shows them.

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod fileops;
pub mod metadata;
pub mod presentation;
pub mod raw;
pub mod scan;

// Re-export primary types for convenience
pub use config::UserConfig;
pub use domain::{
    group_assets, merge_import, AssetFile, AssetKind, ExifData, FileDescriptor, GroupFilter, GroupStatus,
    LibraryStatistics, MergeOutcome, PhotoGroup, PhotoLibrary, Selection,
};
pub use error::{RawPickError, Result};
pub use fileops::{ExportMode, ExportRequest, FileOperations, SystemFileOps, TransferOp};
pub use presentation::{LoadState, PresentationBuffer};
pub use raw::{CacheLookup, DecodeCache, DecodeError, DecodeMode, RawDecodeEngine, RenderedImage};
pub use scan::{scan_files, scan_folder};
