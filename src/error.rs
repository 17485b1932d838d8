//! Error type for the searchable-pdf library.
//!
//! Every stage fails fast: the first error aborts the document and is
//! returned from the top-level [`crate::convert`] functions. There is no
//! per-page recovery, because a searchable PDF with a silently missing page
//! is worse than no PDF at all.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All errors returned by the searchable-pdf library.
#[derive(Debug, Error)]
pub enum Error {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// No registered renderer handles this file extension.
    #[error("Unsupported input format '{extension}' for '{path}'\nSupported: {supported}")]
    UnsupportedFormat {
        path: PathBuf,
        extension: String,
        supported: String,
    },

    /// The input is itself a searchable PDF produced by this tool.
    #[error("'{path}' was already generated by {tag}; refusing to process it again")]
    AlreadyProcessed { path: PathBuf, tag: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection matched no page of the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Image errors ──────────────────────────────────────────────────────
    /// Decoding, resizing or encoding a page image failed.
    #[error("Image error on '{path}': {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// The OCR engine binary could not be started.
    #[error(
        "OCR engine '{engine}' is not available: {detail}\n\
Install tesseract (e.g. `apt install tesseract-ocr`) or point --tesseract / TESSERACT_CMD at it."
    )]
    OcrEngineUnavailable { engine: String, detail: String },

    /// The OCR engine ran but reported a failure.
    #[error("OCR failed on '{path}': {detail}")]
    OcrFailed { path: PathBuf, detail: String },

    /// Parallel rect/text/confidence sequences had different lengths.
    #[error("OCR output is inconsistent: {rects} rects, {texts} texts, {confidences} confidences")]
    MismatchedOcrRecord {
        rects: usize,
        texts: usize,
        confidences: usize,
    },

    /// A TSV dump could not be parsed.
    #[error("Malformed OCR dump '{path}' at line {line}: {detail}")]
    TsvParse {
        path: PathBuf,
        line: usize,
        detail: String,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// printpdf could not place an image or text on a page.
    #[error("PDF assembly failed on page {page}: {detail}")]
    PdfAssembly { page: usize, detail: String },

    /// Could not create or write the output PDF.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic I/O failure on an intermediate artifact.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is needed to render PDF pages. You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium.\n\
  • Place libpdfium next to the ocrpdf executable.\n\
  • Install it system-wide (prebuilt: https://github.com/bblanchon/pdfium-binaries).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Control flow ──────────────────────────────────────────────────────
    /// The cancellation flag was raised between two pages.
    #[error("Cancelled during {stage} after {completed} of {total} pages")]
    Cancelled {
        stage: String,
        completed: usize,
        total: usize,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for wrapping an [`std::io::Error`] on an artifact path.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Shorthand for wrapping an [`image::ImageError`] on an artifact path.
    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Error::Image {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_processed_display() {
        let e = Error::AlreadyProcessed {
            path: "scan.pdf".into(),
            tag: "searchable-pdf".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("scan.pdf"), "got: {msg}");
        assert!(msg.contains("searchable-pdf"), "got: {msg}");
    }

    #[test]
    fn mismatched_record_display() {
        let e = Error::MismatchedOcrRecord {
            rects: 3,
            texts: 2,
            confidences: 3,
        };
        assert!(e.to_string().contains("3 rects, 2 texts"));
    }

    #[test]
    fn cancelled_display() {
        let e = Error::Cancelled {
            stage: "ocr".into(),
            completed: 4,
            total: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("ocr"));
        assert!(msg.contains("4 of 10"));
    }

    #[test]
    fn tsv_parse_display() {
        let e = Error::TsvParse {
            path: "0.eng.tsv".into(),
            line: 7,
            detail: "expected 7 columns".into(),
        };
        assert!(e.to_string().contains("line 7"));
    }

    #[test]
    fn io_helper_keeps_source() {
        use std::error::Error as _;
        let e = Error::io(
            "0.tiff",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(e.source().is_some());
        assert!(e.to_string().contains("0.tiff"));
    }
}
