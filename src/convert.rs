//! Whole-document conversion entry points.
//!
//! [`convert`] runs the four stages back to back for one document:
//!
//! ```text
//! source ─render─▶ {i}.tiff ─compress─▶ {i}.{dpi}.{q}.jpeg ─┐
//!                     │                                     ├─assemble─▶ output.pdf
//!                     └──────ocr──────▶ {i}.{langs}.tsv ────┘
//! ```
//!
//! Every stage is synchronous and file-based (pdfium, image codecs and the
//! tesseract subprocess all block), so the async entry points hand the whole
//! run to `spawn_blocking`. Artifacts already in the work directory are reused
//! unless `overwrite` is set, which makes an interrupted run cheap to resume.

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::ocr::{self, OcrEngine, TesseractEngine};
use crate::output::{ConversionOutput, ConversionStats, DocumentMetadata, PageArtifacts};
use crate::pipeline::{assemble, encode, input};
use crate::progress::{ConversionProgressCallback, Stage, StageContext};
use crate::render::{self, RenderOptions};
use crate::PDF_TAG;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a scanned PDF or image into a searchable PDF at `output`.
///
/// OCR runs through the `tesseract` CLI described by `config.tesseract`.
///
/// # Errors
/// The first failure in any stage aborts the run. If `config.cancel` is
/// raised the run stops with [`Error::Cancelled`] and no PDF is written;
/// artifacts finished so far stay in the work directory.
pub async fn convert(
    source: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<ConversionOutput> {
    let engine = Arc::new(tesseract_for(config));
    convert_with_engine(source, output, config, engine).await
}

/// Like [`convert`], with a caller-supplied OCR engine.
pub async fn convert_with_engine(
    source: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &PipelineConfig,
    engine: Arc<dyn OcrEngine>,
) -> Result<ConversionOutput> {
    let source = source.as_ref().to_path_buf();
    let output = output.as_ref().to_path_buf();
    let config = config.clone();

    tokio::task::spawn_blocking(move || run(&source, &output, &config, engine.as_ref()))
        .await
        .map_err(|e| Error::Internal(format!("conversion task failed: {e}")))?
}

/// Blocking variant of [`convert`] for callers without a tokio runtime.
pub fn convert_sync(
    source: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<ConversionOutput> {
    let engine = tesseract_for(config);
    run(source.as_ref(), output.as_ref(), config, &engine)
}

/// Read a source's metadata without converting it.
///
/// Does not need tesseract.
pub async fn inspect(source: impl AsRef<Path>, password: Option<&str>) -> Result<DocumentMetadata> {
    let source = source.as_ref().to_path_buf();
    let password = password.map(str::to_string);
    tokio::task::spawn_blocking(move || {
        let path = input::resolve_local(&source)?;
        render::require_renderer(&path)?.inspect(password.as_deref())
    })
    .await
    .map_err(|e| Error::Internal(format!("inspect task failed: {e}")))?
}

/// `<output>.work` next to the output file.
pub fn default_work_dir(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "output".into());
    name.push(".work");
    output.with_file_name(name)
}

fn tesseract_for(config: &PipelineConfig) -> TesseractEngine {
    let mut tesseract = config.tesseract.clone();
    tesseract.dpi.get_or_insert(config.render_dpi);
    TesseractEngine::new(tesseract)
}

/// Forwards events to the user's callback while counting reused artifacts.
struct StatsCollector<'a> {
    inner: Option<&'a dyn ConversionProgressCallback>,
    regenerated: AtomicUsize,
    reused: AtomicUsize,
}

impl<'a> StatsCollector<'a> {
    fn new(inner: Option<&'a dyn ConversionProgressCallback>) -> Self {
        Self {
            inner,
            regenerated: AtomicUsize::new(0),
            reused: AtomicUsize::new(0),
        }
    }
}

impl ConversionProgressCallback for StatsCollector<'_> {
    fn on_conversion_start(&self, total_pages: usize) {
        if let Some(cb) = self.inner {
            cb.on_conversion_start(total_pages);
        }
    }

    fn on_stage_start(&self, stage: Stage, total_pages: usize) {
        if let Some(cb) = self.inner {
            cb.on_stage_start(stage, total_pages);
        }
    }

    fn on_page_complete(
        &self,
        stage: Stage,
        page_index: usize,
        done: usize,
        total_pages: usize,
        regenerated: bool,
    ) {
        // The output PDF is always rebuilt; only cached artifacts count.
        if stage != Stage::Assemble {
            let counter = if regenerated {
                &self.regenerated
            } else {
                &self.reused
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(cb) = self.inner {
            cb.on_page_complete(stage, page_index, done, total_pages, regenerated);
        }
    }

    fn on_stage_complete(&self, stage: Stage) {
        if let Some(cb) = self.inner {
            cb.on_stage_complete(stage);
        }
    }

    fn on_conversion_complete(&self, total_pages: usize) {
        if let Some(cb) = self.inner {
            cb.on_conversion_complete(total_pages);
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Delete the artifacts of this run, then the work directory if that left
/// it empty. Anything else in the directory is never touched.
fn remove_artifacts(work_dir: &Path, pages: &[PageArtifacts]) {
    for path in pages.iter().flat_map(|p| [&p.tiff, &p.jpeg, &p.tsv]) {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Could not remove {}: {}", path.display(), e);
        }
    }
    if let Err(e) = std::fs::remove_dir(work_dir) {
        debug!("Keeping work dir {}: {}", work_dir.display(), e);
    }
}

fn run(
    input_path: &Path,
    output: &Path,
    config: &PipelineConfig,
    engine: &dyn OcrEngine,
) -> Result<ConversionOutput> {
    let total_start = Instant::now();
    config.validate()?;

    // ── Step 1: Resolve input and pick a renderer ───────────────────────
    let source = input::resolve_local(input_path)?;
    if input::would_overwrite(&source, output) {
        return Err(Error::InvalidConfig(format!(
            "output '{}' would overwrite the input",
            output.display()
        )));
    }
    let renderer = render::require_renderer(&source)?;
    let metadata = renderer.inspect(config.password.as_deref())?;
    if metadata.already_processed {
        return Err(Error::AlreadyProcessed {
            path: source,
            tag: PDF_TAG.to_string(),
        });
    }

    let selected = config.pages.to_indices(metadata.page_count).len();
    if selected == 0 {
        return Err(Error::PageOutOfRange {
            page: config.pages.first_requested(),
            total: metadata.page_count,
        });
    }
    info!(
        "Converting {} ({} of {} pages) → {}",
        source.display(),
        selected,
        metadata.page_count,
        output.display()
    );

    // ── Step 2: Prepare the work directory ──────────────────────────────
    let work_dir = config
        .work_dir
        .clone()
        .unwrap_or_else(|| default_work_dir(output));
    std::fs::create_dir_all(&work_dir).map_err(|e| Error::io(&work_dir, e))?;

    let collector = StatsCollector::new(config.progress_callback.as_deref());
    let ctx = |stage| StageContext::new(stage, Some(&collector), Some(&config.cancel));
    collector.on_conversion_start(selected);

    // ── Step 3: Render ──────────────────────────────────────────────────
    let start = Instant::now();
    let tiffs =
        renderer.generate_tiffs(&work_dir, &RenderOptions::from(config), ctx(Stage::Render))?;
    let render_duration_ms = elapsed_ms(start);

    // ── Step 4: Compress ────────────────────────────────────────────────
    let start = Instant::now();
    let jpegs = encode::generate_jpegs(
        &tiffs,
        &work_dir,
        config.render_dpi,
        config.jpeg_dpi,
        config.jpeg_quality,
        config.overwrite,
        ctx(Stage::Compress),
    )?;
    let compress_duration_ms = elapsed_ms(start);

    // ── Step 5: OCR ─────────────────────────────────────────────────────
    let start = Instant::now();
    let tsvs = ocr::generate_tsvs(
        &tiffs,
        &work_dir,
        &config.languages,
        engine,
        config.overwrite,
        ctx(Stage::Ocr),
    )?;
    let ocr_duration_ms = elapsed_ms(start);

    // ── Step 6: Assemble ────────────────────────────────────────────────
    let start = Instant::now();
    let pages = PageArtifacts::collate(&tiffs, &jpegs, &tsvs)?;
    let summary = assemble::generate_pdf(
        &pages,
        output,
        config.min_confidence,
        ctx(Stage::Assemble),
    )?;
    let assemble_duration_ms = elapsed_ms(start);

    collector.on_conversion_complete(summary.pages);

    if !config.keep_artifacts {
        remove_artifacts(&work_dir, &pages);
    }

    let stats = ConversionStats {
        total_pages: metadata.page_count,
        processed_pages: summary.pages,
        regenerated_artifacts: collector.regenerated.load(Ordering::Relaxed),
        reused_artifacts: collector.reused.load(Ordering::Relaxed),
        words_kept: summary.words_kept,
        words_dropped: summary.words_dropped,
        render_duration_ms,
        compress_duration_ms,
        ocr_duration_ms,
        assemble_duration_ms,
        total_duration_ms: elapsed_ms(total_start),
    };
    info!(
        "Conversion complete: {} pages, {} words, {}ms total ({} artifacts reused)",
        stats.processed_pages, stats.words_kept, stats.total_duration_ms, stats.reused_artifacts
    );

    Ok(ConversionOutput {
        output: output.to_path_buf(),
        work_dir,
        pages,
        metadata,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_dir_sits_next_to_output() {
        assert_eq!(
            default_work_dir(Path::new("/tmp/out/scan.pdf")),
            PathBuf::from("/tmp/out/scan.pdf.work")
        );
        assert_eq!(
            default_work_dir(Path::new("scan.pdf")),
            PathBuf::from("scan.pdf.work")
        );
    }

    #[test]
    fn tesseract_dpi_defaults_to_render_dpi() {
        let config = PipelineConfig::builder().render_dpi(200).build().unwrap();
        assert_eq!(tesseract_for(&config).config().dpi, Some(200));
    }

    #[test]
    fn collector_counts_cached_stages_only() {
        let c = StatsCollector::new(None);
        c.on_page_complete(Stage::Render, 0, 1, 1, true);
        c.on_page_complete(Stage::Compress, 0, 1, 1, false);
        c.on_page_complete(Stage::Ocr, 0, 1, 1, false);
        c.on_page_complete(Stage::Assemble, 0, 1, 1, true);
        assert_eq!(c.regenerated.load(Ordering::Relaxed), 1);
        assert_eq!(c.reused.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn missing_input_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let err = convert(
            dir.path().join("nope.pdf"),
            dir.path().join("out.pdf"),
            &PipelineConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("notes.txt");
        std::fs::write(&src, "hello").unwrap();
        let err = inspect(&src, None).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }), "got {err:?}");
    }
}
