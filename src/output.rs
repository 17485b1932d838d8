//! Result types returned by [`crate::convert`] and [`crate::inspect`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a conversion produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The searchable PDF.
    pub output: PathBuf,
    /// Where the intermediate artifacts live (removed if `keep_artifacts` is off).
    pub work_dir: PathBuf,
    /// Per-page artifact paths, in page order.
    pub pages: Vec<PageArtifacts>,
    pub metadata: DocumentMetadata,
    pub stats: ConversionStats,
}

/// The three intermediate files of one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageArtifacts {
    /// 0-based index of the page in the source document.
    pub page_index: usize,
    pub tiff: PathBuf,
    pub jpeg: PathBuf,
    pub tsv: PathBuf,
}

impl PageArtifacts {
    /// Zip the per-stage artifact lists into per-page records.
    ///
    /// All three lists must describe the same pages in the same order.
    pub fn collate(
        tiffs: &[(usize, PathBuf)],
        jpegs: &[PathBuf],
        tsvs: &[PathBuf],
    ) -> Result<Vec<PageArtifacts>> {
        if tiffs.len() != jpegs.len() || tiffs.len() != tsvs.len() {
            return Err(Error::InvalidConfig(format!(
                "artifact lists differ in length: {} TIFFs, {} JPEGs, {} TSVs",
                tiffs.len(),
                jpegs.len(),
                tsvs.len()
            )));
        }
        Ok(tiffs
            .iter()
            .zip(jpegs)
            .zip(tsvs)
            .map(|(((page_index, tiff), jpeg), tsv)| PageArtifacts {
                page_index: *page_index,
                tiff: tiff.clone(),
                jpeg: jpeg.clone(),
                tsv: tsv.clone(),
            })
            .collect())
    }
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Pages written to the output PDF.
    pub processed_pages: usize,
    /// Artifacts written this run, summed over render/compress/OCR.
    pub regenerated_artifacts: usize,
    /// Artifacts reused from an earlier run.
    pub reused_artifacts: usize,
    /// Words placed in the text layer.
    pub words_kept: usize,
    /// Words below the confidence threshold.
    pub words_dropped: usize,
    pub render_duration_ms: u64,
    pub compress_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub assemble_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// What [`crate::inspect`] can tell about a source without converting it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Lower-case extension the renderer was chosen by.
    pub format: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    /// Only set for PDF sources.
    pub pdf_version: Option<String>,
    /// Scan resolution declared by an image header.
    pub source_dpi: Option<u32>,
    /// The source is a PDF this crate generated.
    pub already_processed: bool,
}
