//! RAW codec capability
//!
//! The engine only talks to a decoder through [`RawCodec`] and [`RawHandle`].
//! [`RawloaderCodec`] is the bundled adapter: rawloader reads the sensor data
//! and this module develops it into 8-bit sRGB at half resolution.

use super::DecodeMode;
use std::io::Cursor;

/// Demosaic quality requested from the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Fastest available interpolation (bilinear)
    Linear,
    /// Higher quality variable-number-of-gradients interpolation
    Vng,
}

/// Options handed to the codec when opening a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecOptions {
    /// Collapse each 2x2 sensor block into one pixel instead of demosaicing
    pub half_size: bool,
    pub output_bits: u8,
    pub use_auto_wb: bool,
    pub use_camera_wb: bool,
    pub interpolation: Interpolation,
    pub median_passes: u32,
    pub noise_reduction: bool,
}

impl CodecOptions {
    /// Options tuned for each decode mode. Both modes decode at half size
    /// without noise reduction or auto white balance.
    pub fn for_mode(mode: DecodeMode) -> Self {
        match mode {
            DecodeMode::Thumbnail => Self {
                half_size: true,
                output_bits: 8,
                use_auto_wb: false,
                use_camera_wb: true,
                interpolation: Interpolation::Linear,
                median_passes: 0,
                noise_reduction: false,
            },
            DecodeMode::Full => Self {
                half_size: true,
                output_bits: 8,
                use_auto_wb: false,
                use_camera_wb: true,
                interpolation: Interpolation::Vng,
                median_passes: 0,
                noise_reduction: false,
            },
        }
    }
}

/// Loosely typed metadata as reported by a codec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub make: Option<String>,
    pub model: Option<String>,
}

/// An opened RAW file.
pub trait RawHandle: Send {
    /// Packed 8-bit RGB pixels, row-major. `None` when the codec produced
    /// nothing.
    fn image_data(&mut self) -> Option<Vec<u8>>;

    fn metadata(&self) -> RawMetadata;
}

/// Something that can open RAW file bytes.
pub trait RawCodec: Send + Sync {
    fn open(&self, bytes: &[u8], options: &CodecOptions) -> Result<Box<dyn RawHandle>, String>;
}

/// Codec backed by the `rawloader` crate.
///
/// rawloader only reads sensor data, so development happens here: each 2x2
/// CFA block becomes one pixel, black/white levels are normalized, white
/// balance and the camera color matrix are applied, and the result is gamma
/// encoded to sRGB. Only half-size decodes are supported.
///
/// Binning needs no demosaic, so `interpolation` and `median_passes` are
/// ignored here and both modes develop identically. They still differ in
/// output size and JPEG quality, which the engine applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawloaderCodec;

impl RawCodec for RawloaderCodec {
    fn open(&self, bytes: &[u8], options: &CodecOptions) -> Result<Box<dyn RawHandle>, String> {
        if !options.half_size {
            return Err("full-resolution demosaic is not supported by the rawloader backend".into());
        }
        if options.output_bits != 8 {
            return Err(format!("unsupported output depth: {} bits", options.output_bits));
        }

        let image = rawloader::decode(&mut Cursor::new(bytes))
            .map_err(|e| format!("Failed to decode RAW: {:?}", e))?;

        Ok(Box::new(RawloaderHandle {
            image,
            options: options.clone(),
        }))
    }
}

struct RawloaderHandle {
    image: rawloader::RawImage,
    options: CodecOptions,
}

impl RawloaderHandle {
    fn samples(&self) -> (Vec<f32>, [f32; 4], [f32; 4]) {
        match &self.image.data {
            rawloader::RawImageData::Integer(values) => {
                let black = self.image.blacklevels.map(f32::from);
                let white = self.image.whitelevels.map(f32::from);
                (values.iter().map(|&v| f32::from(v)).collect(), black, white)
            }
            rawloader::RawImageData::Float(values) => (values.clone(), [0.0; 4], [1.0; 4]),
        }
    }

    fn crops(&self) -> Crops {
        let [top, right, bottom, left] = self.image.crops;
        Crops {
            top,
            right,
            bottom,
            left,
        }
    }
}

impl RawHandle for RawloaderHandle {
    fn image_data(&mut self) -> Option<Vec<u8>> {
        let (samples, black, white) = self.samples();
        let levels = Levels { black, white };
        let crops = self.crops();
        let (width, height) = (self.image.width, self.image.height);

        let linear = if self.image.cpp == 3 {
            bin_rgb(&samples, width, height, crops, &levels)
        } else {
            let cfa = &self.image.cfa;
            bin_mosaic(&samples, width, height, crops, &levels, |row, col| cfa.color_at(row, col))
        };
        if linear.is_empty() {
            return None;
        }

        let multipliers = if self.options.use_auto_wb {
            gray_world_multipliers(&linear)
        } else if self.options.use_camera_wb {
            camera_multipliers(self.image.wb_coeffs)
        } else {
            [1.0; 3]
        };
        let matrix = camera_to_srgb(&self.image.xyz_to_cam);

        let mut rgb = Vec::with_capacity(linear.len() * 3);
        for px in &linear {
            let balanced = [px[0] * multipliers[0], px[1] * multipliers[1], px[2] * multipliers[2]];
            for row in &matrix {
                let v = row[0] * balanced[0] + row[1] * balanced[1] + row[2] * balanced[2];
                rgb.push(encode_srgb(v));
            }
        }
        Some(rgb)
    }

    fn metadata(&self) -> RawMetadata {
        let crops = self.crops();
        let (width, height) = half_dimensions(self.image.width, self.image.height, crops);
        RawMetadata {
            width: Some(width as u32),
            height: Some(height as u32),
            make: Some(self.image.clean_make.clone()),
            model: Some(self.image.clean_model.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Crops {
    top: usize,
    right: usize,
    bottom: usize,
    left: usize,
}

struct Levels {
    black: [f32; 4],
    white: [f32; 4],
}

impl Levels {
    fn normalize(&self, value: f32, channel: usize) -> f32 {
        let range = (self.white[channel] - self.black[channel]).max(1e-6);
        ((value - self.black[channel]) / range).clamp(0.0, 1.0)
    }
}

fn half_dimensions(width: usize, height: usize, crops: Crops) -> (usize, usize) {
    let active_w = width.saturating_sub(crops.left + crops.right);
    let active_h = height.saturating_sub(crops.top + crops.bottom);
    (active_w / 2, active_h / 2)
}

/// Collapses every 2x2 block of a single-channel CFA mosaic into one linear
/// RGB pixel. `color_at` maps absolute (row, col) to 0=R, 1=G, 2=B, 3=second
/// green.
fn bin_mosaic(
    samples: &[f32],
    width: usize,
    height: usize,
    crops: Crops,
    levels: &Levels,
    color_at: impl Fn(usize, usize) -> usize,
) -> Vec<[f32; 3]> {
    let (out_w, out_h) = half_dimensions(width, height, crops);
    if samples.len() < width * height {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(out_w * out_h);
    for y in 0..out_h {
        for x in 0..out_w {
            let mut sum = [0.0f32; 3];
            let mut count = [0u32; 3];
            for dy in 0..2 {
                for dx in 0..2 {
                    let row = crops.top + 2 * y + dy;
                    let col = crops.left + 2 * x + dx;
                    let color = color_at(row, col);
                    let value = levels.normalize(samples[row * width + col], color.min(3));
                    let channel = if color == 3 { 1 } else { color.min(2) };
                    sum[channel] += value;
                    count[channel] += 1;
                }
            }
            out.push([0, 1, 2].map(|c| if count[c] > 0 { sum[c] / count[c] as f32 } else { 0.0 }));
        }
    }
    out
}

/// Averages 2x2 blocks of an already demosaiced three-channel image.
fn bin_rgb(samples: &[f32], width: usize, height: usize, crops: Crops, levels: &Levels) -> Vec<[f32; 3]> {
    let (out_w, out_h) = half_dimensions(width, height, crops);
    if samples.len() < width * height * 3 {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(out_w * out_h);
    for y in 0..out_h {
        for x in 0..out_w {
            let mut px = [0.0f32; 3];
            for dy in 0..2 {
                for dx in 0..2 {
                    let row = crops.top + 2 * y + dy;
                    let col = crops.left + 2 * x + dx;
                    let base = (row * width + col) * 3;
                    for (c, value) in px.iter_mut().enumerate() {
                        *value += levels.normalize(samples[base + c], c) / 4.0;
                    }
                }
            }
            out.push(px);
        }
    }
    out
}

/// As-shot white balance normalized so green is 1.0.
fn camera_multipliers(coeffs: [f32; 4]) -> [f32; 3] {
    let valid = |v: f32| v.is_finite() && v > 0.0;
    if !valid(coeffs[0]) || !valid(coeffs[1]) || !valid(coeffs[2]) {
        return [1.0; 3];
    }
    [coeffs[0] / coeffs[1], 1.0, coeffs[2] / coeffs[1]]
}

/// Gray-world estimate: scale red and blue so their means match green.
fn gray_world_multipliers(pixels: &[[f32; 3]]) -> [f32; 3] {
    let mut sum = [0.0f64; 3];
    for px in pixels {
        for c in 0..3 {
            sum[c] += f64::from(px[c]);
        }
    }
    if sum.iter().any(|&s| s <= f64::EPSILON) {
        return [1.0; 3];
    }
    [(sum[1] / sum[0]) as f32, 1.0, (sum[1] / sum[2]) as f32]
}

const SRGB_TO_XYZ: [[f32; 3]; 3] = [
    [0.412_453, 0.357_580, 0.180_423],
    [0.212_671, 0.715_160, 0.072_169],
    [0.019_334, 0.119_193, 0.950_227],
];

const IDENTITY: [[f32; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Builds the camera RGB → linear sRGB matrix from the camera's XYZ → camera
/// matrix. Falls back to identity when the camera matrix is missing or
/// singular.
fn camera_to_srgb(xyz_to_cam: &[[f32; 3]; 4]) -> [[f32; 3]; 3] {
    let mut cam_rgb = [[0.0f32; 3]; 3];
    for (i, row) in cam_rgb.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| xyz_to_cam[i][k] * SRGB_TO_XYZ[k][j]).sum();
        }
    }

    for row in cam_rgb.iter_mut() {
        let total: f32 = row.iter().sum();
        if total.abs() < 1e-6 {
            return IDENTITY;
        }
        for cell in row.iter_mut() {
            *cell /= total;
        }
    }

    invert3(&cam_rgb).unwrap_or(IDENTITY)
}

fn invert3(m: &[[f32; 3]; 3]) -> Option<[[f32; 3]; 3]> {
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
    if det.abs() < 1e-9 {
        return None;
    }
    let inv = 1.0 / det;
    Some([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv,
        ],
    ])
}

fn encode_srgb(linear: f32) -> u8 {
    let v = linear.clamp(0.0, 1.0);
    let encoded = if v <= 0.003_130_8 {
        12.92 * v
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    };
    (encoded * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    const RGGB: [[usize; 2]; 2] = [[0, 1], [3, 2]];

    fn rggb(row: usize, col: usize) -> usize {
        RGGB[row % 2][col % 2]
    }

    fn unit_levels() -> Levels {
        Levels {
            black: [0.0; 4],
            white: [1.0; 4],
        }
    }

    #[test]
    fn test_mode_options() {
        let thumb = CodecOptions::for_mode(DecodeMode::Thumbnail);
        let full = CodecOptions::for_mode(DecodeMode::Full);

        assert!(thumb.half_size && full.half_size);
        assert!(!thumb.noise_reduction && !full.noise_reduction);
        assert!(!thumb.use_auto_wb && !full.use_auto_wb);
        assert!(full.use_camera_wb);
        assert_eq!(thumb.median_passes, 0);
        assert_eq!(thumb.interpolation, Interpolation::Linear);
        assert_eq!(full.interpolation, Interpolation::Vng);
        assert_eq!(thumb.output_bits, 8);
    }

    #[test]
    fn test_rawloader_rejects_full_resolution() {
        let mut options = CodecOptions::for_mode(DecodeMode::Full);
        options.half_size = false;
        assert!(RawloaderCodec.open(&[0u8; 16], &options).is_err());
    }

    #[test]
    fn test_rawloader_rejects_garbage() {
        let options = CodecOptions::for_mode(DecodeMode::Thumbnail);
        assert!(RawloaderCodec.open(b"definitely not a raw file", &options).is_err());
    }

    #[test]
    fn test_bin_mosaic_collapses_quads() {
        // 4x2 RGGB mosaic -> 2x1 output
        let samples = [
            1.0, 0.5, 0.0, 0.25, //
            0.5, 0.2, 0.75, 0.4,
        ];
        let out = bin_mosaic(&samples, 4, 2, Crops::default(), &unit_levels(), rggb);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0], [1.0, 0.5, 0.2]);
        assert_eq!(out[1], [0.0, 0.5, 0.4]);
    }

    #[test]
    fn test_bin_mosaic_applies_levels() {
        let samples = [600.0, 600.0, 600.0, 600.0];
        let levels = Levels {
            black: [100.0; 4],
            white: [1100.0; 4],
        };
        let out = bin_mosaic(&samples, 2, 2, Crops::default(), &levels, rggb);
        assert_eq!(out, vec![[0.5, 0.5, 0.5]]);
    }

    #[test]
    fn test_bin_mosaic_respects_crops() {
        let crops = Crops {
            top: 0,
            right: 0,
            bottom: 0,
            left: 2,
        };
        let samples = [0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0];
        let out = bin_mosaic(&samples, 4, 2, crops, &unit_levels(), rggb);
        assert_eq!(out, vec![[1.0, 1.0, 1.0]]);
    }

    #[test]
    fn test_bin_mosaic_short_buffer() {
        let out = bin_mosaic(&[0.0; 3], 2, 2, Crops::default(), &unit_levels(), rggb);
        assert!(out.is_empty());
    }

    #[test]
    fn test_bin_rgb_averages() {
        let mut samples = Vec::new();
        for v in [0.0, 0.2, 0.4, 0.6] {
            samples.extend_from_slice(&[v, v, 1.0]);
        }
        let out = bin_rgb(&samples, 2, 2, Crops::default(), &unit_levels());
        assert_eq!(out.len(), 1);
        assert!((out[0][0] - 0.3).abs() < 1e-6);
        assert!((out[0][2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_camera_multipliers() {
        assert_eq!(camera_multipliers([2.0, 1.0, 1.5, 1.0]), [2.0, 1.0, 1.5]);
        assert_eq!(camera_multipliers([4.0, 2.0, 3.0, f32::NAN]), [2.0, 1.0, 1.5]);
        assert_eq!(camera_multipliers([f32::NAN, 1.0, 1.0, 1.0]), [1.0; 3]);
    }

    #[test]
    fn test_gray_world_multipliers() {
        let pixels = [[0.25, 0.5, 1.0], [0.25, 0.5, 1.0]];
        assert_eq!(gray_world_multipliers(&pixels), [2.0, 1.0, 0.5]);
        assert_eq!(gray_world_multipliers(&[[0.0, 0.5, 0.5]]), [1.0; 3]);
    }

    #[test]
    fn test_missing_color_matrix_is_identity() {
        assert_eq!(camera_to_srgb(&[[0.0; 3]; 4]), IDENTITY);
    }

    #[test]
    fn test_srgb_camera_matrix_is_identity() {
        // A camera whose native space is sRGB: xyz_to_cam = inverse(SRGB_TO_XYZ)
        let inverse = invert3(&SRGB_TO_XYZ).unwrap();
        let xyz_to_cam = [inverse[0], inverse[1], inverse[2], [0.0; 3]];
        let matrix = camera_to_srgb(&xyz_to_cam);
        for (i, row) in matrix.iter().enumerate() {
            for (j, cell) in row.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((cell - expected).abs() < 1e-3, "m[{i}][{j}] = {cell}");
            }
        }
    }

    #[test]
    fn test_invert3_singular() {
        assert!(invert3(&[[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]]).is_none());
    }

    #[test]
    fn test_encode_srgb() {
        assert_eq!(encode_srgb(0.0), 0);
        assert_eq!(encode_srgb(1.0), 255);
        assert_eq!(encode_srgb(2.0), 255);
        assert_eq!(encode_srgb(-1.0), 0);
        // Mid grey lands near 188 after gamma encoding
        assert_eq!(encode_srgb(0.5), 188);
    }
}
