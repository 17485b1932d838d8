//! Progress reporting and cooperative cancellation for the page loops.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as each stage walks the pages. Events are delivered synchronously
//! on the thread running the stage, after each page finishes.
//!
//! Cancellation is a shared [`CancellationFlag`] that every stage checks once
//! at the top of each page iteration. Raising it never interrupts a page in
//! flight; the stage stops before starting the next one.
//!
//! # Example
//!
//! ```rust
//! use searchable_pdf::{ConversionProgressCallback, PipelineConfig, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ConversionProgressCallback for Printer {
//!     fn on_page_complete(&self, stage: Stage, page: usize, done: usize, total: usize, _regenerated: bool) {
//!         eprintln!("{stage}: page {page} ({done}/{total})");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The four pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Source page → `{index}.tiff`.
    Render,
    /// TIFF → `{index}.{dpi}.{quality}.jpeg`.
    Compress,
    /// TIFF → `{index}.{languages}.tsv`.
    Ocr,
    /// JPEG + TSV → output PDF page.
    Assemble,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Render, Stage::Compress, Stage::Ocr, Stage::Assemble];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Render => "render",
            Stage::Compress => "compress",
            Stage::Ocr => "ocr",
            Stage::Assemble => "assemble",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Called by the pipeline as it processes each page of each stage.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `page_index` is always the 0-based ordinal of the
/// page in the source document, i.e. the number in the artifact file name.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after the source has been opened and pages selected.
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before the first page of a stage.
    fn on_stage_start(&self, stage: Stage, total_pages: usize) {
        let _ = (stage, total_pages);
    }

    /// Called after each page of a stage.
    ///
    /// `regenerated` is `false` when an existing artifact was reused.
    fn on_page_complete(
        &self,
        stage: Stage,
        page_index: usize,
        done: usize,
        total_pages: usize,
        regenerated: bool,
    ) {
        let _ = (stage, page_index, done, total_pages, regenerated);
    }

    /// Called once a stage has walked every page.
    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called once the output PDF is on disk.
    fn on_conversion_complete(&self, total_pages: usize) {
        let _ = total_pages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Cloneable cooperative cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every stage sharing this flag to stop at its next page boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-stage view of the progress callback and cancellation flag.
///
/// Each stage function takes one of these so the page loops share a single
/// definition of "check, work, report".
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    stage: Stage,
    progress: Option<&'a dyn ConversionProgressCallback>,
    cancel: Option<&'a CancellationFlag>,
}

impl<'a> StageContext<'a> {
    pub fn new(
        stage: Stage,
        progress: Option<&'a dyn ConversionProgressCallback>,
        cancel: Option<&'a CancellationFlag>,
    ) -> Self {
        Self {
            stage,
            progress,
            cancel,
        }
    }

    /// A context with no callback and no cancellation, for direct stage calls.
    pub fn detached(stage: Stage) -> Self {
        Self::new(stage, None, None)
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn start(&self, total: usize) {
        if let Some(cb) = self.progress {
            cb.on_stage_start(self.stage, total);
        }
    }

    /// Fail with [`Error::Cancelled`] if the flag has been raised.
    pub(crate) fn check(&self, completed: usize, total: usize) -> Result<()> {
        match self.cancel {
            Some(flag) if flag.is_cancelled() => Err(Error::Cancelled {
                stage: self.stage.to_string(),
                completed,
                total,
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn page_done(&self, page_index: usize, done: usize, total: usize, regenerated: bool) {
        if let Some(cb) = self.progress {
            cb.on_page_complete(self.stage, page_index, done, total, regenerated);
        }
    }

    pub(crate) fn finish(&self) {
        if let Some(cb) = self.progress {
            cb.on_stage_complete(self.stage);
        }
    }
}
