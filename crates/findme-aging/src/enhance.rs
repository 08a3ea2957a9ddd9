//! Local image enhancement and JPEG re-encoding

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageResult, RgbImage};

/// Enhancement parameters
#[derive(Debug, Clone, Copy)]
pub struct EnhanceOptions {
    /// Images whose shortest side is smaller get upscaled to this length
    pub min_side: u32,
    pub jpeg_quality: u8,
    /// Fraction of darkest and brightest pixels clipped by auto-contrast
    pub contrast_cutoff: f64,
    pub sharpen_sigma: f32,
    pub sharpen_threshold: i32,
}

impl Default for EnhanceOptions {
    fn default() -> Self {
        Self {
            min_side: 1024,
            jpeg_quality: 92,
            contrast_cutoff: 0.01,
            sharpen_sigma: 1.2,
            sharpen_threshold: 3,
        }
    }
}

/// Decode, upscale, auto-contrast, sharpen and re-encode as JPEG.
///
/// Fails only if `bytes` is not a decodable image.
pub fn enhance(bytes: &[u8], options: &EnhanceOptions) -> ImageResult<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;

    let (width, height) = (img.width(), img.height());
    let short = width.min(height);
    let img = if short > 0 && short < options.min_side {
        let scale = f64::from(options.min_side) / f64::from(short);
        img.resize_exact(
            (f64::from(width) * scale).round() as u32,
            (f64::from(height) * scale).round() as u32,
            FilterType::Lanczos3,
        )
    } else {
        img
    };

    let mut rgb = img.to_rgb8();
    autocontrast(&mut rgb, options.contrast_cutoff);
    let sharpened = imageops::unsharpen(&rgb, options.sharpen_sigma, options.sharpen_threshold);

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, options.jpeg_quality).encode_image(&sharpened)?;
    Ok(out)
}

/// Stretch each channel so the `cutoff` tails map to 0 and 255
fn autocontrast(img: &mut RgbImage, cutoff: f64) {
    let total = u64::from(img.width()) * u64::from(img.height());
    if total == 0 {
        return;
    }
    let clip = (total as f64 * cutoff) as u64;

    let mut histograms = [[0u64; 256]; 3];
    for pixel in img.pixels() {
        for (channel, value) in pixel.0.iter().enumerate() {
            histograms[channel][usize::from(*value)] += 1;
        }
    }

    let mut lut = [[0u8; 256]; 3];
    for (channel, histogram) in histograms.iter().enumerate() {
        let (low, high) = clip_range(histogram, clip);
        for (value, slot) in lut[channel].iter_mut().enumerate() {
            *slot = if high <= low {
                value as u8
            } else {
                let scaled = (value as f64 - f64::from(low)) * 255.0 / f64::from(high - low);
                scaled.round().clamp(0.0, 255.0) as u8
            };
        }
    }

    for pixel in img.pixels_mut() {
        for (channel, value) in pixel.0.iter_mut().enumerate() {
            *value = lut[channel][usize::from(*value)];
        }
    }
}

/// Lowest and highest values left after dropping `clip` pixels from each end
fn clip_range(histogram: &[u64; 256], clip: u64) -> (u8, u8) {
    let mut seen = 0u64;
    let mut low = 0u8;
    for (value, count) in histogram.iter().enumerate() {
        seen += count;
        if seen > clip {
            low = value as u8;
            break;
        }
    }

    seen = 0;
    let mut high = 255u8;
    for (value, count) in histogram.iter().enumerate().rev() {
        seen += count;
        if seen > clip {
            high = value as u8;
            break;
        }
    }

    (low, high)
}
