//! PDF rasterisation via pdfium.
//!
//! The page loop holds a single open document and renders one page at a
//! time, so peak memory is one page bitmap regardless of document length.

use super::{write_tiff, PageRenderer, RenderOptions};
use crate::error::{Error, Result};
use crate::naming;
use crate::output::DocumentMetadata;
use crate::pdfium::bind_pdfium;
use crate::progress::StageContext;
use crate::PDF_TAG;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Renders PDF pages with pdfium.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    path: PathBuf,
}

impl PdfRenderer {
    pub const FORMATS: &'static [&'static str] = &["pdf"];

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load<'a>(
        &self,
        pdfium: &'a Pdfium,
        password: Option<&'a str>,
    ) -> Result<PdfDocument<'a>> {
        pdfium
            .load_pdf_from_file(&self.path, password)
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                if err_str.contains("Password") || err_str.contains("password") {
                    if password.is_some() {
                        Error::WrongPassword {
                            path: self.path.clone(),
                        }
                    } else {
                        Error::PasswordRequired {
                            path: self.path.clone(),
                        }
                    }
                } else {
                    Error::CorruptPdf {
                        path: self.path.clone(),
                        detail: err_str,
                    }
                }
            })
    }
}

/// Whether the Creator/Producer fields mark a PDF this crate wrote.
pub fn is_generated_by_us(creator: Option<&str>, producer: Option<&str>) -> bool {
    creator.is_some_and(|c| c == PDF_TAG) || producer.is_some_and(|p| p.starts_with(PDF_TAG))
}

fn metadata_value(document: &PdfDocument<'_>, tag: PdfDocumentMetadataTagType) -> Option<String> {
    document.metadata().get(tag).and_then(|t| {
        let v = t.value().trim().to_string();
        if v.is_empty() {
            None
        } else {
            Some(v)
        }
    })
}

impl PageRenderer for PdfRenderer {
    fn source(&self) -> &Path {
        &self.path
    }

    fn inspect(&self, password: Option<&str>) -> Result<DocumentMetadata> {
        let pdfium = bind_pdfium()?;
        let document = self.load(&pdfium, password)?;

        let creator = metadata_value(&document, PdfDocumentMetadataTagType::Creator);
        let producer = metadata_value(&document, PdfDocumentMetadataTagType::Producer);

        Ok(DocumentMetadata {
            format: "pdf".to_string(),
            title: metadata_value(&document, PdfDocumentMetadataTagType::Title),
            author: metadata_value(&document, PdfDocumentMetadataTagType::Author),
            subject: metadata_value(&document, PdfDocumentMetadataTagType::Subject),
            already_processed: is_generated_by_us(creator.as_deref(), producer.as_deref()),
            creator,
            producer,
            page_count: document.pages().len() as usize,
            pdf_version: Some(format!("{:?}", document.version())),
            source_dpi: None,
        })
    }

    fn generate_tiffs(
        &self,
        work_dir: &Path,
        opts: &RenderOptions,
        ctx: StageContext<'_>,
    ) -> Result<Vec<(usize, PathBuf)>> {
        let pdfium = bind_pdfium()?;
        let document = self.load(&pdfium, opts.password.as_deref())?;

        let creator = metadata_value(&document, PdfDocumentMetadataTagType::Creator);
        let producer = metadata_value(&document, PdfDocumentMetadataTagType::Producer);
        if is_generated_by_us(creator.as_deref(), producer.as_deref()) {
            return Err(Error::AlreadyProcessed {
                path: self.path.clone(),
                tag: PDF_TAG.to_string(),
            });
        }

        let pages = document.pages();
        let page_count = pages.len() as usize;
        let indices = opts.pages.to_indices(page_count);
        if indices.is_empty() {
            return Err(Error::PageOutOfRange {
                page: opts.pages.first_requested(),
                total: page_count,
            });
        }
        info!(
            "Rendering {} of {} pages at {} DPI",
            indices.len(),
            page_count,
            opts.dpi
        );

        let max_px = opts.max_rendered_pixels as i32;
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(opts.dpi as f32 / 72.0)
            .set_maximum_width(max_px)
            .set_maximum_height(max_px);

        let total = indices.len();
        ctx.start(total);

        let mut tiffs = Vec::with_capacity(total);
        for (done, &idx) in indices.iter().enumerate() {
            ctx.check(done, total)?;

            let path = work_dir.join(naming::tiff_page(idx));
            let regenerate = naming::should_generate(&path, opts.overwrite);
            if regenerate {
                let page = pages
                    .get(idx as u16)
                    .map_err(|e| Error::RasterisationFailed {
                        page: idx + 1,
                        detail: format!("{:?}", e),
                    })?;

                let bitmap = page.render_with_config(&render_config).map_err(|e| {
                    Error::RasterisationFailed {
                        page: idx + 1,
                        detail: format!("{:?}", e),
                    }
                })?;

                let image = bitmap.as_image();
                write_tiff(&image, &path)?;
                debug!(
                    "Rendered page {} → {}x{} px ({})",
                    idx,
                    image.width(),
                    image.height(),
                    path.display()
                );
            } else {
                debug!("Keeping existing {}", path.display());
            }

            tiffs.push((idx, path));
            ctx.page_done(idx, done + 1, total, regenerate);
        }

        ctx.finish();
        Ok(tiffs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_own_output() {
        assert!(is_generated_by_us(Some(PDF_TAG), None));
        assert!(is_generated_by_us(
            None,
            Some(&format!("{PDF_TAG} {}", env!("CARGO_PKG_VERSION")))
        ));
        assert!(!is_generated_by_us(Some("Microsoft Word"), Some("macOS Quartz")));
        assert!(!is_generated_by_us(None, None));
    }

    #[test]
    fn missing_pdf_does_not_panic() {
        // Either pdfium is missing (binding error) or the file is (load error).
        let r = PdfRenderer::new("/nonexistent/scan.pdf").inspect(None);
        assert!(r.is_err());
    }
}
