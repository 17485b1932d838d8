//! Compress stage: `{index}.tiff` → `{index}.{dpi}.{quality}.jpeg`.
//!
//! The TIFF is rendered at OCR resolution (300 DPI by default) which is far
//! more than a page background needs. This stage rescales it to the preview
//! DPI and JPEG-encodes it; the result is what the output PDF embeds.

use crate::error::{Error, Result};
use crate::naming;
use crate::progress::StageContext;
use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Preview size for a `width × height` raster at `source_dpi` shown at `target_dpi`.
///
/// Never collapses to zero, so tiny inputs still produce a valid JPEG.
pub fn scaled_dimensions(width: u32, height: u32, source_dpi: u32, target_dpi: u32) -> (u32, u32) {
    let scale = target_dpi as f64 / source_dpi.max(1) as f64;
    let w = ((width as f64 * scale) as u32).max(1);
    let h = ((height as f64 * scale) as u32).max(1);
    (w, h)
}

/// Resize and JPEG-encode one raster.
pub fn encode_jpeg(
    img: &DynamicImage,
    source_dpi: u32,
    dpi: u32,
    quality: u8,
) -> Result<Vec<u8>, image::ImageError> {
    let (w, h) = scaled_dimensions(img.width(), img.height(), source_dpi, dpi);
    let resized = if (w, h) == (img.width(), img.height()) {
        img.to_rgb8()
    } else {
        image::imageops::resize(&img.to_rgb8(), w, h, FilterType::Lanczos3)
    };

    let mut buf = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
        encoder.set_pixel_density(PixelDensity::dpi(dpi.min(u16::MAX as u32) as u16));
        encoder.encode_image(&resized)?;
    }
    debug!("Encoded {}x{} JPEG → {} bytes", w, h, buf.len());
    Ok(buf)
}

/// Write a preview JPEG for every page raster.
///
/// `tiffs` pairs each page index with its raster, as returned by the render
/// stage. Existing JPEGs are kept unless `overwrite` is set.
pub fn generate_jpegs(
    tiffs: &[(usize, PathBuf)],
    work_dir: &Path,
    source_dpi: u32,
    dpi: u32,
    quality: u8,
    overwrite: bool,
    ctx: StageContext<'_>,
) -> Result<Vec<PathBuf>> {
    let total = tiffs.len();
    info!(
        "Compressing {} pages to {} DPI, quality {}",
        total, dpi, quality
    );
    ctx.start(total);

    let mut jpegs = Vec::with_capacity(total);
    for (done, (index, tiff)) in tiffs.iter().enumerate() {
        ctx.check(done, total)?;

        let path = work_dir.join(naming::jpeg_page(*index, dpi, quality));
        let regenerate = naming::should_generate(&path, overwrite);
        if regenerate {
            let img = image::open(tiff).map_err(|e| Error::image(tiff, e))?;
            let bytes =
                encode_jpeg(&img, source_dpi, dpi, quality).map_err(|e| Error::image(&path, e))?;
            naming::write_artifact(&path, &bytes)?;
        } else {
            debug!("Keeping existing {}", path.display());
        }

        jpegs.push(path);
        ctx.page_done(*index, done + 1, total, regenerate);
    }

    ctx.finish();
    Ok(jpegs)
}
