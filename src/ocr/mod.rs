//! OCR stage: rendered page → recognised words with boxes and confidences.
//!
//! Recognition itself is delegated to an [`OcrEngine`]; the shipped engine
//! is [`TesseractEngine`]. This module owns the record types, the TSV debug
//! dump and the per-page loop that writes `{index}.{languages}.tsv`.

pub mod tesseract;
pub mod tsv;

pub use tesseract::{TesseractConfig, TesseractEngine};

use crate::error::{Error, Result};
use crate::naming;
use crate::progress::StageContext;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Axis-aligned box in the pixel space of the rendered page.
///
/// `(x1, y1)` is the top-left corner, `(x2, y2)` the bottom-right; y grows
/// downward as in the image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OcrRect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl OcrRect {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from tesseract's `left, top, width, height`.
    pub fn from_ltwh(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }
}

/// One recognised text region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrRecord {
    pub rect: OcrRect,
    pub text: String,
    /// 0–100.
    pub confidence: f32,
}

/// Everything recognised on one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrOutput {
    pub records: Vec<OcrRecord>,
}

impl OcrOutput {
    pub fn new(records: Vec<OcrRecord>) -> Self {
        Self { records }
    }

    /// Zip the three parallel sequences some engines hand back.
    ///
    /// Fails with [`Error::MismatchedOcrRecord`] when the lengths differ
    /// rather than silently truncating to the shortest.
    pub fn from_parallel(
        rects: Vec<OcrRect>,
        texts: Vec<String>,
        confidences: Vec<f32>,
    ) -> Result<Self> {
        if rects.len() != texts.len() || texts.len() != confidences.len() {
            return Err(Error::MismatchedOcrRecord {
                rects: rects.len(),
                texts: texts.len(),
                confidences: confidences.len(),
            });
        }
        let records = rects
            .into_iter()
            .zip(texts)
            .zip(confidences)
            .map(|((rect, text), confidence)| OcrRecord {
                rect,
                text,
                confidence,
            })
            .collect();
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records at or above `min_confidence`.
    pub fn confident(&self, min_confidence: f32) -> impl Iterator<Item = &OcrRecord> {
        self.records
            .iter()
            .filter(move |r| r.confidence >= min_confidence)
    }
}

/// A text recogniser for a single page image.
///
/// Implementations must be usable from the blocking thread the pipeline
/// runs on; no async is involved.
pub trait OcrEngine: Send + Sync {
    /// Short identifier used in logs and error messages.
    fn name(&self) -> &str;

    /// Recognise the words on the image at `image_path`.
    fn recognize(&self, image_path: &Path, languages: &[String]) -> Result<OcrOutput>;
}

/// Run OCR over every page raster and write `{index}.{languages}.tsv`.
///
/// `tiffs` pairs each page index with its raster. An existing TSV is kept
/// unless `overwrite` is set. Returns the TSV paths in the same order.
pub fn generate_tsvs(
    tiffs: &[(usize, PathBuf)],
    work_dir: &Path,
    languages: &[String],
    engine: &dyn OcrEngine,
    overwrite: bool,
    ctx: StageContext<'_>,
) -> Result<Vec<PathBuf>> {
    let tag = naming::languages_to_string(languages);
    if tag.is_empty() {
        return Err(Error::InvalidConfig(
            "at least one OCR language is required".into(),
        ));
    }

    let total = tiffs.len();
    info!(
        "OCR on {} pages with {} ({})",
        total,
        engine.name(),
        tag
    );
    ctx.start(total);

    let mut tsvs = Vec::with_capacity(total);
    for (done, (index, tiff)) in tiffs.iter().enumerate() {
        ctx.check(done, total)?;

        let path = work_dir.join(naming::tsv_page(*index, &tag));
        let regenerate = naming::should_generate(&path, overwrite);
        if regenerate {
            let output = engine.recognize(tiff, languages)?;
            tsv::write_tsv(&path, &output, tsv::DEFAULT_ORIGIN)?;
            debug!(
                "OCR page {} → {} words ({})",
                index,
                output.len(),
                path.display()
            );
        } else {
            debug!("Keeping existing {}", path.display());
        }

        tsvs.push(path);
        ctx.page_done(*index, done + 1, total, regenerate);
    }

    ctx.finish();
    Ok(tsvs)
}
