//! RAW decode pipeline
//!
//! This module handles:
//! - The decoder capability and its rawloader-backed adapter (`codec`)
//! - Turning one RAW file into an encoded preview (`engine`)
//! - Memoizing results and collapsing concurrent requests (`cache`)

pub mod cache;
pub mod codec;
pub mod engine;

pub use cache::{CacheLookup, DecodeCache, PendingDecode};
pub use codec::{CodecOptions, Interpolation, RawCodec, RawHandle, RawMetadata, RawloaderCodec};
pub use engine::{rgb_to_rgba, target_dimensions, DecodedFrame, EngineSettings, RawDecodeEngine};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Quality tier of a decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum DecodeMode {
    /// Small, fast preview for the filmstrip
    Thumbnail,
    /// Higher quality image for the main viewer
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecodeKey {
    pub path: PathBuf,
    pub mode: DecodeMode,
}

impl DecodeKey {
    pub fn new(path: impl Into<PathBuf>, mode: DecodeMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }
}

/// Why a RAW file could not be turned into a preview.
///
/// Cloneable so one failed decode can be reported to every caller that was
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Failed to read {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("RAW codec failure: {0}")]
    CodecFailure(String),

    #[error("No image data returned from RAW decoder")]
    EmptyPayload,

    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Pixel buffer holds {actual} bytes, expected {expected}")]
    PayloadMismatch { expected: usize, actual: usize },

    #[error("Failed to encode preview: {0}")]
    Encode(String),

    #[error("Decode task failed: {0}")]
    TaskFailed(String),
}

/// A decoded RAW file, re-encoded as a JPEG ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub mode: DecodeMode,
    pub width: u32,
    pub height: u32,
    /// Dimensions the codec produced before any downscale
    pub source_width: u32,
    pub source_height: u32,
    pub jpeg: Vec<u8>,
}

impl RenderedImage {
    pub fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }

    pub fn byte_len(&self) -> usize {
        self.jpeg.len()
    }
}
