//! Scan resolution stored in raster headers.
//!
//! Scanners record the DPI they scanned at: TIFF in `XResolution`, PNG in
//! `pHYs`, JPEG in the JFIF density fields. Decoding through `image` drops
//! it, so the headers are read here before the raster is resampled.

use super::extension_of;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tiff::decoder::ifd::Value;
use tiff::tags::Tag;
use tracing::debug;

const METERS_PER_INCH: f32 = 0.0254;
const CM_PER_INCH: f32 = 2.54;

/// Anything outside this range is a placeholder, not a scan resolution.
const PLAUSIBLE_DPI: std::ops::RangeInclusive<f32> = 10.0..=4800.0;

/// Horizontal resolution of the raster at `path`, when its header has one.
pub fn source_dpi(path: &Path) -> Option<f32> {
    let dpi = match extension_of(path)?.as_str() {
        "tif" | "tiff" => tiff_dpi(path),
        "png" => png_dpi(path),
        "jpg" | "jpeg" => jfif_dpi(path),
        _ => None,
    }?;
    if PLAUSIBLE_DPI.contains(&dpi) {
        debug!("{} declares {:.1} DPI", path.display(), dpi);
        Some(dpi)
    } else {
        None
    }
}

fn tiff_dpi(path: &Path) -> Option<f32> {
    let file = File::open(path).ok()?;
    let mut decoder = tiff::decoder::Decoder::new(BufReader::new(file)).ok()?;
    let resolution = match decoder.find_tag(Tag::XResolution).ok()?? {
        Value::Rational(n, d) if d != 0 => n as f32 / d as f32,
        _ => return None,
    };
    // ResolutionUnit: 1 = none, 2 = inch (the default), 3 = centimetre.
    let unit = decoder
        .find_tag(Tag::ResolutionUnit)
        .ok()
        .flatten()
        .and_then(|v| v.into_u16().ok())
        .unwrap_or(2);
    match unit {
        2 => Some(resolution),
        3 => Some(resolution * CM_PER_INCH),
        _ => None,
    }
}

fn png_dpi(path: &Path) -> Option<f32> {
    let file = File::open(path).ok()?;
    let reader = png::Decoder::new(BufReader::new(file)).read_info().ok()?;
    let dims = reader.info().pixel_dims?;
    match dims.unit {
        png::Unit::Meter => Some(dims.xppu as f32 * METERS_PER_INCH),
        png::Unit::Unspecified => None,
    }
}

/// Reads the APP0 segment that directly follows SOI.
fn jfif_dpi(path: &Path) -> Option<f32> {
    let mut header = [0u8; 16];
    File::open(path).ok()?.read_exact(&mut header).ok()?;
    jfif_density(&header)
}

fn jfif_density(header: &[u8; 16]) -> Option<f32> {
    if header[..4] != [0xFF, 0xD8, 0xFF, 0xE0] || &header[6..11] != b"JFIF\0" {
        return None;
    }
    let density = f32::from(u16::from_be_bytes([header[14], header[15]]));
    match header[13] {
        1 => Some(density),
        2 => Some(density * CM_PER_INCH),
        _ => None,
    }
}

/// Pixel size of a `width`×`height` scan at `source_dpi` once resampled to
/// `target_dpi`, with neither side above `max_pixels`.
pub fn resampled_size(
    width: u32,
    height: u32,
    source_dpi: f32,
    target_dpi: u32,
    max_pixels: u32,
) -> (u32, u32) {
    let mut scale = target_dpi as f32 / source_dpi;
    let longest = width.max(height) as f32 * scale;
    if max_pixels > 0 && longest > max_pixels as f32 {
        scale *= max_pixels as f32 / longest;
    }
    let w = ((width as f32 * scale).round() as u32).max(1);
    let h = ((height as f32 * scale).round() as u32).max(1);
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::{JpegEncoder, PixelDensity};
    use image::{Rgb, RgbImage};

    #[test]
    fn jpeg_density_in_inches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.jpg");
        let file = File::create(&path).unwrap();
        let mut encoder = JpegEncoder::new_with_quality(file, 90);
        encoder.set_pixel_density(PixelDensity::dpi(150));
        encoder
            .encode_image(&RgbImage::from_pixel(8, 8, Rgb([255, 255, 255])))
            .unwrap();

        assert_eq!(source_dpi(&path), Some(150.0));
    }

    #[test]
    fn jfif_aspect_ratio_only_is_unknown() {
        let mut header = [0u8; 16];
        header[..4].copy_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
        header[6..11].copy_from_slice(b"JFIF\0");
        header[13] = 0;
        header[14..16].copy_from_slice(&1u16.to_be_bytes());
        assert_eq!(jfif_density(&header), None);

        header[13] = 2;
        header[14..16].copy_from_slice(&100u16.to_be_bytes());
        assert!((jfif_density(&header).unwrap() - 254.0).abs() < 1e-3);
    }

    #[test]
    fn png_density_from_phys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        let file = File::create(&path).unwrap();
        let mut encoder = png::Encoder::new(std::io::BufWriter::new(file), 4, 4);
        encoder.set_color(png::ColorType::Grayscale);
        encoder.set_depth(png::BitDepth::Eight);
        // 200 DPI ≈ 7874 px/m
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: 7874,
            yppu: 7874,
            unit: png::Unit::Meter,
        }));
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&[255u8; 16]).unwrap();
        writer.finish().unwrap();

        let dpi = source_dpi(&path).unwrap();
        assert!((dpi - 200.0).abs() < 0.1, "got {dpi}");
    }

    #[test]
    fn png_without_phys_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.png");
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])).save(&path).unwrap();
        assert_eq!(source_dpi(&path), None);
    }

    #[test]
    fn resample_scales_and_caps() {
        assert_eq!(resampled_size(1275, 1650, 150.0, 300, 10_000), (2550, 3300));
        assert_eq!(resampled_size(600, 300, 300.0, 300, 10_000), (600, 300));
        assert_eq!(resampled_size(3000, 1500, 100.0, 300, 4500), (4500, 2250));
    }
}
