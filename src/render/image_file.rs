//! Single raster files (scans saved as TIFF, PNG, JPEG, ...) as one-page documents.
//!
//! When the header records the scan resolution the raster is resampled to
//! the render DPI, so every `{index}.tiff` is at the same resolution as a
//! rendered PDF page. Without one it is taken to already be at render DPI.

use super::{density, extension_of, write_tiff, PageRenderer, RenderOptions};
use crate::error::{Error, Result};
use crate::naming;
use crate::output::DocumentMetadata;
use crate::progress::StageContext;
use std::path::{Path, PathBuf};
use image::imageops::FilterType;
use tracing::{debug, info};

/// Treats an image file as a document with exactly one page, index 0.
#[derive(Debug, Clone)]
pub struct ImageRenderer {
    path: PathBuf,
}

impl ImageRenderer {
    pub const FORMATS: &'static [&'static str] =
        &["tif", "tiff", "png", "jpg", "jpeg", "bmp", "gif", "webp"];

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PageRenderer for ImageRenderer {
    fn source(&self) -> &Path {
        &self.path
    }

    fn inspect(&self, _password: Option<&str>) -> Result<DocumentMetadata> {
        // Header-only read; fails the same way a full decode would on junk.
        image::image_dimensions(&self.path).map_err(|e| Error::image(&self.path, e))?;
        Ok(DocumentMetadata {
            format: extension_of(&self.path).unwrap_or_default(),
            page_count: 1,
            source_dpi: density::source_dpi(&self.path).map(|d| d.round() as u32),
            ..DocumentMetadata::default()
        })
    }

    fn generate_tiffs(
        &self,
        work_dir: &Path,
        opts: &RenderOptions,
        ctx: StageContext<'_>,
    ) -> Result<Vec<(usize, PathBuf)>> {
        let indices = opts.pages.to_indices(1);
        if indices.is_empty() {
            return Err(Error::PageOutOfRange {
                page: opts.pages.first_requested(),
                total: 1,
            });
        }

        info!("Rasterising image {}", self.path.display());
        ctx.start(1);
        ctx.check(0, 1)?;

        let path = work_dir.join(naming::tiff_page(0));
        let regenerate = naming::should_generate(&path, opts.overwrite);
        if regenerate {
            let mut image = image::open(&self.path).map_err(|e| Error::image(&self.path, e))?;
            if let Some(source_dpi) = density::source_dpi(&self.path) {
                let (w, h) = density::resampled_size(
                    image.width(),
                    image.height(),
                    source_dpi,
                    opts.dpi,
                    opts.max_rendered_pixels,
                );
                if (w, h) != (image.width(), image.height()) {
                    debug!("Resampling {:.0} DPI scan to {} DPI", source_dpi, opts.dpi);
                    image = image.resize_exact(w, h, FilterType::Lanczos3);
                }
            }
            write_tiff(&image, &path)?;
            debug!(
                "Converted {} → {}x{} px ({})",
                self.path.display(),
                image.width(),
                image.height(),
                path.display()
            );
        } else {
            debug!("Keeping existing {}", path.display());
        }

        ctx.page_done(0, 1, 1, regenerate);
        ctx.finish();
        Ok(vec![(0, path)])
    }
}
