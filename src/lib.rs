//! # searchable-pdf
//!
//! Turn scanned documents into searchable PDFs.
//!
//! A scan is a picture of text: you can look at it but not select, copy or
//! search it. This crate OCRs every page and writes a new PDF where each page
//! shows a compressed copy of the scan with the recognised words laid over it
//! as *invisible* text, positioned where the words appear. Viewers then find,
//! highlight and copy text as if the document had been born digital.
//!
//! ## Pipeline Overview
//!
//! ```text
//! scan.pdf / scan.png
//!  │
//!  ├─ 1. Render    page → {i}.tiff at OCR resolution (pdfium / image)
//!  ├─ 2. Compress  TIFF → {i}.{dpi}.{quality}.jpeg preview
//!  ├─ 3. OCR       TIFF → {i}.{langs}.tsv word boxes (tesseract)
//!  └─ 4. Assemble  JPEG + TSV → one page of the output PDF (printpdf)
//! ```
//!
//! Each stage writes its artifact to a work directory and skips pages whose
//! artifact already exists, so an interrupted run resumes where it stopped.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use searchable_pdf::{convert, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .languages(["eng", "deu"])
//!         .build()?;
//!     let output = convert("scan.pdf", "scan.searchable.pdf", &config).await?;
//!     eprintln!(
//!         "{} pages, {} words",
//!         output.stats.processed_pages, output.stats.words_kept
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocrpdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ## Runtime requirements
//!
//! - the pdfium shared library for PDF input (see [`pdfium`]);
//! - the `tesseract` executable plus the `.traineddata` of each language.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod naming;
pub mod ocr;
pub mod output;
pub mod pdfium;
pub mod pipeline;
pub mod progress;
pub mod render;

/// Written to the Creator and Producer of every generated PDF.
///
/// The PDF renderer refuses inputs carrying it, so a searchable PDF is never
/// fed back through OCR by accident.
pub const PDF_TAG: &str = "searchable-pdf";

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PageSelection, PipelineConfig, PipelineConfigBuilder};
pub use convert::{convert, convert_sync, convert_with_engine, default_work_dir, inspect};
pub use error::{Error, Result};
pub use ocr::{OcrEngine, OcrOutput, OcrRecord, OcrRect, TesseractConfig, TesseractEngine};
pub use output::{ConversionOutput, ConversionStats, DocumentMetadata, PageArtifacts};
pub use progress::{
    CancellationFlag, ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage,
};
pub use render::{renderer_for_path, supported_formats, PageRenderer};
