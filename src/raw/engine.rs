//! RAW decode engine
//!
//! Reads a RAW file, runs it through a [`RawCodec`], validates what comes
//! back, downscales thumbnails and re-encodes the result as a JPEG.

use super::codec::{CodecOptions, RawCodec, RawHandle, RawloaderCodec};
use super::{DecodeError, DecodeMode, RenderedImage};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Pixels converted per iteration of the RGB → RGBA fast path
const RGBA_BATCH: usize = 8;

/// Output tuning for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Thumbnails wider than this are downscaled to it
    pub thumbnail_max_width: u32,
    pub thumbnail_quality: u8,
    pub full_quality: u8,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            thumbnail_max_width: 320,
            thumbnail_quality: 60,
            full_quality: 90,
        }
    }
}

impl EngineSettings {
    pub fn quality(&self, mode: DecodeMode) -> u8 {
        match mode {
            DecodeMode::Thumbnail => self.thumbnail_quality,
            DecodeMode::Full => self.full_quality,
        }
    }
}

/// Codec output after validation: dimensions are non-zero and the buffer
/// holds exactly `width * height` packed RGB pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

impl DecodedFrame {
    pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 {
            return Err(DecodeError::InvalidDimensions { width, height });
        }
        if rgb.is_empty() {
            return Err(DecodeError::EmptyPayload);
        }
        let expected = width as usize * height as usize * 3;
        if rgb.len() != expected {
            return Err(DecodeError::PayloadMismatch {
                expected,
                actual: rgb.len(),
            });
        }
        Ok(Self { width, height, rgb })
    }

    /// Pulls pixels and metadata out of an opened handle.
    pub fn from_handle(handle: &mut dyn RawHandle) -> Result<Self, DecodeError> {
        let rgb = handle.image_data().filter(|data| !data.is_empty());
        let Some(rgb) = rgb else {
            return Err(DecodeError::EmptyPayload);
        };

        let metadata = handle.metadata();
        match (metadata.width, metadata.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Self::new(width, height, rgb),
            (width, height) => Err(DecodeError::InvalidDimensions {
                width: width.unwrap_or(0),
                height: height.unwrap_or(0),
            }),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Expands packed RGB into RGBA with an opaque alpha channel.
///
/// Whole batches of eight pixels go through the fast path; whatever is left
/// over is converted one pixel at a time so the tail of the image is never
/// dropped.
pub fn rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    let pixels = rgb.len() / 3;
    let mut rgba = vec![0u8; pixels * 4];

    let mut src = rgb[..pixels * 3].chunks_exact(3 * RGBA_BATCH);
    let mut dst = rgba.chunks_exact_mut(4 * RGBA_BATCH);
    for (s, d) in (&mut src).zip(&mut dst) {
        for i in 0..RGBA_BATCH {
            d[i * 4] = s[i * 3];
            d[i * 4 + 1] = s[i * 3 + 1];
            d[i * 4 + 2] = s[i * 3 + 2];
            d[i * 4 + 3] = 255;
        }
    }

    // Remainder pass
    for (s, d) in src.remainder().chunks_exact(3).zip(dst.into_remainder().chunks_exact_mut(4)) {
        d[0] = s[0];
        d[1] = s[1];
        d[2] = s[2];
        d[3] = 255;
    }

    rgba
}

/// Output size for a decode: thumbnails wider than `max_width` are scaled
/// down to that width keeping the aspect ratio, everything else keeps its
/// native size.
pub fn target_dimensions(width: u32, height: u32, mode: DecodeMode, max_width: u32) -> (u32, u32) {
    if mode == DecodeMode::Thumbnail && width > max_width && max_width > 0 {
        let scale = f64::from(max_width) / f64::from(width);
        let scaled_height = (f64::from(height) * scale).round().max(1.0) as u32;
        (max_width, scaled_height)
    } else {
        (width, height)
    }
}

/// Decodes RAW files into display-ready JPEGs.
#[derive(Clone)]
pub struct RawDecodeEngine {
    codec: Arc<dyn RawCodec>,
    settings: EngineSettings,
}

impl std::fmt::Debug for RawDecodeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawDecodeEngine")
            .field("settings", &self.settings)
            .finish()
    }
}

impl RawDecodeEngine {
    pub fn new(codec: Arc<dyn RawCodec>, settings: EngineSettings) -> Self {
        Self { codec, settings }
    }

    /// Engine using the bundled rawloader adapter.
    pub fn with_rawloader(settings: EngineSettings) -> Self {
        Self::new(Arc::new(RawloaderCodec), settings)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Reads and decodes `path`. File reading is async; codec work runs on
    /// the blocking pool.
    pub async fn decode(&self, path: &Path, mode: DecodeMode) -> Result<RenderedImage, DecodeError> {
        let started = Instant::now();
        let bytes = tokio::fs::read(path).await.map_err(|e| DecodeError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!(
            path = %path.display(),
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "read RAW file"
        );

        let engine = self.clone();
        let rendered = tokio::task::spawn_blocking(move || engine.render(&bytes, mode))
            .await
            .map_err(|e| DecodeError::TaskFailed(e.to_string()))??;

        debug!(
            path = %path.display(),
            ?mode,
            width = rendered.width,
            height = rendered.height,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "decoded RAW file"
        );
        Ok(rendered)
    }

    /// Synchronous decode of in-memory RAW bytes.
    pub fn render(&self, bytes: &[u8], mode: DecodeMode) -> Result<RenderedImage, DecodeError> {
        let options = CodecOptions::for_mode(mode);
        let mut handle = self.codec.open(bytes, &options).map_err(DecodeError::CodecFailure)?;
        let frame = DecodedFrame::from_handle(handle.as_mut())?;

        let (target_w, target_h) = target_dimensions(
            frame.width,
            frame.height,
            mode,
            self.settings.thumbnail_max_width,
        );

        let rgba = rgb_to_rgba(&frame.rgb);
        let expected = frame.pixel_count() * 4;
        let actual = rgba.len();
        let native = RgbaImage::from_raw(frame.width, frame.height, rgba)
            .ok_or(DecodeError::PayloadMismatch { expected, actual })?;

        let resized = if (target_w, target_h) == (frame.width, frame.height) {
            native
        } else {
            imageops::resize(&native, target_w, target_h, FilterType::Triangle)
        };

        let rgb = DynamicImage::ImageRgba8(resized).to_rgb8();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.settings.quality(mode))
            .encode_image(&rgb)
            .map_err(|e| DecodeError::Encode(e.to_string()))?;

        Ok(RenderedImage {
            mode,
            width: target_w,
            height: target_h,
            source_width: frame.width,
            source_height: frame.height,
            jpeg,
        })
    }
}
