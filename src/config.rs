//! Configuration types for the searchable-PDF pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. The builder clamps obviously out-of-range
//! values and `build()` rejects the rest, so stages can trust what they get.

use crate::error::{Error, Result};
use crate::ocr::TesseractConfig;
use crate::progress::{CancellationFlag, ProgressCallback};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for one document conversion.
///
/// # Example
/// ```rust
/// use searchable_pdf::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .render_dpi(300)
///     .jpeg_quality(80)
///     .languages(["eng", "por"])
///     .min_confidence(40.0)
///     .build()
///     .unwrap();
/// assert_eq!(config.languages_tag(), "eng+por");
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// DPI at which PDF pages are rasterised into `{index}.tiff`. Range: 72–600. Default: 300.
    ///
    /// Image inputs that declare their scan resolution are resampled to it.
    /// Those that declare none are assumed to be at this resolution already.
    pub render_dpi: u32,

    /// Cap on either dimension of a rendered page, in pixels. Default: 10000.
    pub max_rendered_pixels: u32,

    /// Resolution of the preview JPEG embedded in the output PDF. Default: 100.
    pub jpeg_dpi: u32,

    /// JPEG quality, 1–100. Default: 100.
    pub jpeg_quality: u8,

    /// OCR language codes passed to tesseract. Default: `["eng"]`.
    pub languages: Vec<String>,

    /// Words recognised below this confidence (0–100) are left out of the
    /// text layer. They still appear in the TSV dump. Default: 25.
    pub min_confidence: f32,

    /// Regenerate intermediate artifacts even if they already exist. Default: false.
    pub overwrite: bool,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Directory holding the intermediate artifacts.
    /// If None, `<output>.work/` next to the output file.
    pub work_dir: Option<PathBuf>,

    /// Keep the artifacts after a successful run. Default: true.
    ///
    /// Keeping them is what lets a re-run skip finished pages. When false,
    /// only the files this run produced are removed, then the work directory
    /// if it is left empty.
    pub keep_artifacts: bool,

    /// How to invoke tesseract.
    pub tesseract: TesseractConfig,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Shared cancellation flag, checked once per page in every stage.
    pub cancel: CancellationFlag,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            render_dpi: 300,
            max_rendered_pixels: 10_000,
            jpeg_dpi: 100,
            jpeg_quality: 100,
            languages: vec!["eng".to_string()],
            min_confidence: 25.0,
            overwrite: false,
            pages: PageSelection::default(),
            password: None,
            work_dir: None,
            keep_artifacts: true,
            tesseract: TesseractConfig::default(),
            progress_callback: None,
            cancel: CancellationFlag::default(),
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("render_dpi", &self.render_dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("jpeg_dpi", &self.jpeg_dpi)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("languages", &self.languages)
            .field("min_confidence", &self.min_confidence)
            .field("overwrite", &self.overwrite)
            .field("pages", &self.pages)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("work_dir", &self.work_dir)
            .field("keep_artifacts", &self.keep_artifacts)
            .field("tesseract", &self.tesseract)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The language set as it appears in TSV file names and tesseract's `-l`.
    pub fn languages_tag(&self) -> String {
        crate::naming::languages_to_string(&self.languages)
    }

    /// Check the invariants every stage relies on.
    pub fn validate(&self) -> Result<()> {
        if !(72..=600).contains(&self.render_dpi) {
            return Err(Error::InvalidConfig(format!(
                "render DPI must be 72–600, got {}",
                self.render_dpi
            )));
        }
        if self.jpeg_dpi == 0 {
            return Err(Error::InvalidConfig("JPEG DPI must be ≥ 1".into()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                self.jpeg_quality
            )));
        }
        if !(0.0..=100.0).contains(&self.min_confidence) {
            return Err(Error::InvalidConfig(format!(
                "minimum confidence must be 0–100, got {}",
                self.min_confidence
            )));
        }
        if self.languages_tag().is_empty() {
            return Err(Error::InvalidConfig(
                "at least one OCR language is required".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineConfigBuilder {
    pub fn render_dpi(mut self, dpi: u32) -> Self {
        self.config.render_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn jpeg_dpi(mut self, dpi: u32) -> Self {
        self.config.jpeg_dpi = dpi.max(1);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Replace the language list. Comma-separated entries are split, so
    /// `["eng,por"]` and `["eng", "por"]` are equivalent.
    pub fn languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.languages = languages
            .into_iter()
            .flat_map(|l| {
                l.as_ref()
                    .split([',', '+'])
                    .map(|s| s.trim().to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|l| !l.is_empty())
            .collect();
        self
    }

    pub fn min_confidence(mut self, conf: f32) -> Self {
        self.config.min_confidence = conf.clamp(0.0, 100.0);
        self
    }

    pub fn overwrite(mut self, v: bool) -> Self {
        self.config.overwrite = v;
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = Some(dir.into());
        self
    }

    pub fn keep_artifacts(mut self, v: bool) -> Self {
        self.config.keep_artifacts = v;
        self
    }

    pub fn tesseract(mut self, tesseract: TesseractConfig) -> Self {
        self.config.tesseract = tesseract;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancellation(mut self, flag: CancellationFlag) -> Self {
        self.config.cancel = flag;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the source to convert.
///
/// Artifacts keep the page's index in the *source* document, so converting
/// pages 3–5 and later the whole document reuses the files from the first run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert a single page (1-indexed).
    Single(usize),
    /// Convert a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Convert specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// First 1-indexed page the selection asks for, for error messages.
    pub fn first_requested(&self) -> usize {
        match self {
            PageSelection::All => 1,
            PageSelection::Single(p) => *p,
            PageSelection::Range(start, _) => *start,
            PageSelection::Set(pages) => pages.iter().copied().min().unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = PipelineConfig::default();
        assert_eq!(c.render_dpi, 300);
        assert_eq!(c.jpeg_dpi, 100);
        assert_eq!(c.jpeg_quality, 100);
        assert_eq!(c.languages, vec!["eng"]);
        assert_eq!(c.min_confidence, 25.0);
        assert!(!c.overwrite);
        assert!(c.keep_artifacts);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn builder_clamps_values() {
        let c = PipelineConfig::builder()
            .render_dpi(5000)
            .jpeg_quality(0)
            .min_confidence(250.0)
            .build()
            .unwrap();
        assert_eq!(c.render_dpi, 600);
        assert_eq!(c.jpeg_quality, 1);
        assert_eq!(c.min_confidence, 100.0);
    }

    #[test]
    fn languages_split_and_tagged() {
        let c = PipelineConfig::builder()
            .languages(["eng,por", "deu"])
            .build()
            .unwrap();
        assert_eq!(c.languages, vec!["eng", "por", "deu"]);
        assert_eq!(c.languages_tag(), "eng+por+deu");
    }

    #[test]
    fn empty_languages_rejected() {
        let err = PipelineConfig::builder()
            .languages(Vec::<String>::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)), "got {err:?}");
    }

    #[test]
    fn script_model_language_accepted() {
        let c = PipelineConfig::builder()
            .languages(["eng", "script/Latin"])
            .build()
            .unwrap();
        assert_eq!(c.languages_tag(), "eng+script/Latin");
    }

    #[test]
    fn debug_redacts_password() {
        let c = PipelineConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(PageSelection::Single(3).to_indices(5), vec![2]);
        assert_eq!(PageSelection::Single(6).to_indices(5), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 4).to_indices(5), vec![1, 2, 3]);
        assert_eq!(PageSelection::Range(4, 99).to_indices(5), vec![3, 4]);
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3]).to_indices(5),
            vec![0, 2] // deduplicated and sorted
        );
        assert_eq!(PageSelection::Set(vec![9, 4]).first_requested(), 4);
    }
}
