//! Render stage: source document → one `{index}.tiff` raster per page.
//!
//! Each input format has a [`PageRenderer`]. The registry at the bottom of
//! this file maps file extensions to renderer constructors, so adding a
//! format means adding one entry to [`REGISTRY`].

pub mod density;
pub mod image_file;
pub mod pdf;

pub use image_file::ImageRenderer;
pub use pdf::PdfRenderer;

use crate::config::{PageSelection, PipelineConfig};
use crate::error::{Error, Result};
use crate::output::DocumentMetadata;
use crate::progress::StageContext;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// The subset of [`PipelineConfig`] a renderer needs.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub dpi: u32,
    pub max_rendered_pixels: u32,
    pub pages: PageSelection,
    pub password: Option<String>,
    pub overwrite: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for RenderOptions {
    fn from(c: &PipelineConfig) -> Self {
        Self {
            dpi: c.render_dpi,
            max_rendered_pixels: c.max_rendered_pixels,
            pages: c.pages.clone(),
            password: c.password.clone(),
            overwrite: c.overwrite,
        }
    }
}

/// Turns one source file into page rasters.
pub trait PageRenderer: Send {
    /// Path of the source document.
    fn source(&self) -> &Path;

    /// Read metadata without rendering.
    fn inspect(&self, password: Option<&str>) -> Result<DocumentMetadata>;

    /// Write `{index}.tiff` for every selected page into `work_dir`.
    ///
    /// Returns `(page_index, path)` pairs in page order. Existing rasters are
    /// kept unless `opts.overwrite` is set.
    fn generate_tiffs(
        &self,
        work_dir: &Path,
        opts: &RenderOptions,
        ctx: StageContext<'_>,
    ) -> Result<Vec<(usize, PathBuf)>>;
}

type Constructor = fn(PathBuf) -> Box<dyn PageRenderer>;

/// Extension → renderer table.
const REGISTRY: &[(&[&str], Constructor)] = &[
    (PdfRenderer::FORMATS, new_pdf_renderer),
    (ImageRenderer::FORMATS, new_image_renderer),
];

fn new_pdf_renderer(path: PathBuf) -> Box<dyn PageRenderer> {
    Box::new(PdfRenderer::new(path))
}

fn new_image_renderer(path: PathBuf) -> Box<dyn PageRenderer> {
    Box::new(ImageRenderer::new(path))
}

/// Lower-case extension of `path`, without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .filter(|e| !e.is_empty())
}

/// Pick the renderer for `path` by its extension.
pub fn renderer_for_path(path: &Path) -> Option<Box<dyn PageRenderer>> {
    let ext = extension_of(path)?;
    REGISTRY
        .iter()
        .find(|(formats, _)| formats.contains(&ext.as_str()))
        .map(|(_, ctor)| ctor(path.to_path_buf()))
}

/// Like [`renderer_for_path`] but with a descriptive error.
pub fn require_renderer(path: &Path) -> Result<Box<dyn PageRenderer>> {
    renderer_for_path(path).ok_or_else(|| Error::UnsupportedFormat {
        path: path.to_path_buf(),
        extension: extension_of(path).unwrap_or_default(),
        supported: supported_formats().join(", "),
    })
}

/// Every extension some renderer accepts.
pub fn supported_formats() -> Vec<&'static str> {
    REGISTRY
        .iter()
        .flat_map(|(formats, _)| formats.iter().copied())
        .collect()
}

/// Encode `image` as TIFF and write it to `path`.
///
/// Alpha is dropped first: pdfium hands back BGRA bitmaps, and an opaque
/// RGB raster is what both tesseract and the JPEG stage expect.
pub(crate) fn write_tiff(image: &DynamicImage, path: &Path) -> Result<()> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buf), ImageFormat::Tiff)
        .map_err(|e| Error::image(path, e))?;
    crate::naming::write_artifact(path, &buf)
}
