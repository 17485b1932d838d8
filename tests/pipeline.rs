//! Pipeline integration tests that need neither pdfium nor tesseract.
//!
//! An image input goes through the real render, compress and assemble
//! stages; OCR is a scripted engine that returns fixed word boxes and counts
//! how often it is called.

use searchable_pdf::ocr::{generate_tsvs, tsv};
use searchable_pdf::pipeline::encode::generate_jpegs;
use searchable_pdf::progress::StageContext;
use searchable_pdf::render::{ImageRenderer, RenderOptions};
use searchable_pdf::{
    convert_with_engine, ConversionProgressCallback, Error, OcrEngine, OcrOutput, OcrRecord,
    OcrRect, PageRenderer, PipelineConfig, Result, Stage, PDF_TAG,
};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct ScriptedEngine {
    calls: AtomicUsize,
}

impl OcrEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn recognize(&self, _image_path: &Path, _languages: &[String]) -> Result<OcrOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(OcrOutput::new(vec![
            OcrRecord {
                rect: OcrRect::new(30.0, 30.0, 150.0, 60.0),
                text: "Invoice".into(),
                confidence: 96.0,
            },
            OcrRecord {
                rect: OcrRect::new(30.0, 90.0, 90.0, 120.0),
                text: "smudge".into(),
                confidence: 12.5,
            },
        ]))
    }
}

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
}

impl ConversionProgressCallback for EventLog {
    fn on_conversion_start(&self, total_pages: usize) {
        self.events.lock().unwrap().push(format!("start {total_pages}"));
    }

    fn on_stage_start(&self, stage: Stage, _total_pages: usize) {
        self.events.lock().unwrap().push(format!("{stage}"));
    }

    fn on_conversion_complete(&self, total_pages: usize) {
        self.events.lock().unwrap().push(format!("done {total_pages}"));
    }
}

/// A 300×150 white "scan" with a dark band where the text would be.
fn write_scan(dir: &Path) -> PathBuf {
    let mut img = RgbImage::from_pixel(300, 150, Rgb([255, 255, 255]));
    for x in 30..150 {
        for y in 30..60 {
            img.put_pixel(x, y, Rgb([20, 20, 20]));
        }
    }
    let path = dir.join("scan.png");
    img.save(&path).unwrap();
    path
}

/// The four numbers of the first `/MediaBox` array.
fn media_box(pdf: &str) -> Vec<f32> {
    let start = pdf.find("/MediaBox").expect("no MediaBox") + "/MediaBox".len();
    let rest = &pdf[start..];
    let open = rest.find('[').unwrap();
    let close = rest.find(']').unwrap();
    rest[open + 1..close]
        .split_whitespace()
        .map(|n| n.parse().unwrap())
        .collect()
}

fn config_in(dir: &Path) -> PipelineConfig {
    PipelineConfig::builder()
        .work_dir(dir.join("work"))
        .build()
        .unwrap()
}

// ── Full conversion ──────────────────────────────────────────────────────────

#[tokio::test]
async fn image_becomes_searchable_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let scan = write_scan(dir.path());
    let out = dir.path().join("scan.searchable.pdf");
    let engine = Arc::new(ScriptedEngine::default());

    let result = convert_with_engine(&scan, &out, &config_in(dir.path()), engine.clone())
        .await
        .expect("conversion should succeed");

    let bytes = std::fs::read(&out).unwrap();
    assert!(bytes.starts_with(b"%PDF"), "output is not a PDF");
    assert_eq!(result.output, out);

    // Content streams are stored uncompressed, so the text layer is readable.
    let pdf = String::from_utf8_lossy(&bytes);
    assert!(pdf.contains("/Creator"), "no Creator entry");
    assert!(pdf.contains(&format!("({PDF_TAG})")), "tag missing");
    assert!(pdf.contains("3 Tr"), "text is not invisible");
    assert!(pdf.contains("(Invoice) Tj"), "confident word missing");
    assert!(!pdf.contains("(smudge)"), "low-confidence word drawn");
    assert!(pdf.contains("/DCTDecode"), "page image is not a JPEG");

    // The page is the preview JPEG, one pixel per point.
    let mb = media_box(&pdf);
    assert_eq!(mb.len(), 4, "MediaBox {mb:?}");
    assert!((mb[2] - 100.0).abs() < 0.5 && (mb[3] - 50.0).abs() < 0.5, "MediaBox {mb:?}");

    let work = dir.path().join("work");
    assert!(work.join("0.tiff").exists());
    assert!(work.join("0.100.100.jpeg").exists());
    assert!(work.join("0.eng.tsv").exists());
    assert_eq!(result.pages.len(), 1);
    assert_eq!(result.pages[0].tsv, work.join("0.eng.tsv"));

    // 300 px at the 300 DPI render resolution → 100 px preview.
    assert_eq!(
        image::image_dimensions(work.join("0.100.100.jpeg")).unwrap(),
        (100, 50)
    );

    let stats = &result.stats;
    assert_eq!(stats.total_pages, 1);
    assert_eq!(stats.processed_pages, 1);
    assert_eq!(stats.words_kept, 1);
    assert_eq!(stats.words_dropped, 1);
    assert_eq!(stats.regenerated_artifacts, 3);
    assert_eq!(stats.reused_artifacts, 0);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);

    // The TSV keeps every word; only the text layer is filtered.
    let dump = tsv::read_tsv(&work.join("0.eng.tsv")).unwrap();
    assert_eq!(dump.len(), 2);

    // The preview is embedded byte for byte, not re-encoded.
    let jpeg = std::fs::read(work.join("0.100.100.jpeg")).unwrap();
    assert!(bytes.windows(jpeg.len()).any(|w| w == jpeg.as_slice()));
}

#[tokio::test]
async fn jpeg_quality_reaches_the_output() {
    let dir = tempfile::tempdir().unwrap();
    let scan = write_scan(dir.path());
    let engine: Arc<dyn OcrEngine> = Arc::new(ScriptedEngine::default());
    let mut sizes = Vec::new();
    for quality in [10u8, 100] {
        let config = PipelineConfig::builder()
            .work_dir(dir.path().join(format!("work{quality}")))
            .jpeg_dpi(300)
            .jpeg_quality(quality)
            .build()
            .unwrap();
        let out = dir.path().join(format!("q{quality}.pdf"));
        convert_with_engine(&scan, &out, &config, engine.clone())
            .await
            .unwrap();
        sizes.push(std::fs::metadata(&out).unwrap().len());
    }
    assert!(sizes[0] < sizes[1], "sizes {sizes:?}");
}

#[tokio::test]
async fn rerun_reuses_artifacts_and_overwrite_regenerates() {
    let dir = tempfile::tempdir().unwrap();
    let scan = write_scan(dir.path());
    let out = dir.path().join("out.pdf");
    let engine = Arc::new(ScriptedEngine::default());
    let config = config_in(dir.path());

    convert_with_engine(&scan, &out, &config, engine.clone())
        .await
        .unwrap();
    let second = convert_with_engine(&scan, &out, &config, engine.clone())
        .await
        .unwrap();
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1, "OCR must be skipped");
    assert_eq!(second.stats.reused_artifacts, 3);
    assert_eq!(second.stats.regenerated_artifacts, 0);

    let mut overwrite = config.clone();
    overwrite.overwrite = true;
    let third = convert_with_engine(&scan, &out, &overwrite, engine.clone())
        .await
        .unwrap();
    assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    assert_eq!(third.stats.regenerated_artifacts, 3);
}

#[tokio::test]
async fn cancelled_run_writes_no_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let scan = write_scan(dir.path());
    let out = dir.path().join("out.pdf");
    let config = config_in(dir.path());
    config.cancel.cancel();

    let err = convert_with_engine(&scan, &out, &config, Arc::new(ScriptedEngine::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled { .. }), "got {err:?}");
    assert!(!out.exists());
}

#[tokio::test]
async fn clean_run_removes_work_dir() {
    let dir = tempfile::tempdir().unwrap();
    let scan = write_scan(dir.path());
    let out = dir.path().join("out.pdf");
    let config = PipelineConfig::builder()
        .keep_artifacts(false)
        .build()
        .unwrap();

    let result = convert_with_engine(&scan, &out, &config, Arc::new(ScriptedEngine::default()))
        .await
        .unwrap();
    assert_eq!(result.work_dir, dir.path().join("out.pdf.work"));
    assert!(!result.work_dir.exists());
    assert!(out.exists());
}

#[tokio::test]
async fn clean_run_inside_shared_work_dir_keeps_other_files() {
    let dir = tempfile::tempdir().unwrap();
    let scan = write_scan(dir.path());
    let shared = dir.path().join("out");
    std::fs::create_dir_all(&shared).unwrap();
    std::fs::write(shared.join("notes.txt"), "keep me").unwrap();
    let out = shared.join("scan.pdf");
    let config = PipelineConfig::builder()
        .work_dir(&shared)
        .keep_artifacts(false)
        .build()
        .unwrap();

    convert_with_engine(&scan, &out, &config, Arc::new(ScriptedEngine::default()))
        .await
        .unwrap();

    assert!(out.exists(), "output inside the work dir was deleted");
    assert!(shared.join("notes.txt").exists());
    assert!(!shared.join("0.tiff").exists());
    assert!(!shared.join("0.100.100.jpeg").exists());
    assert!(!shared.join("0.eng.tsv").exists());
}

#[tokio::test]
async fn progress_events_follow_stage_order() {
    let dir = tempfile::tempdir().unwrap();
    let scan = write_scan(dir.path());
    let log = Arc::new(EventLog::default());
    let config = PipelineConfig::builder()
        .work_dir(dir.path().join("work"))
        .progress_callback(log.clone())
        .build()
        .unwrap();

    convert_with_engine(
        &scan,
        dir.path().join("out.pdf"),
        &config,
        Arc::new(ScriptedEngine::default()),
    )
    .await
    .unwrap();

    let events = log.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec!["start 1", "render", "compress", "ocr", "assemble", "done 1"]
    );
}

#[tokio::test]
async fn output_over_input_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let scan = write_scan(dir.path());
    let err = convert_with_engine(
        &scan,
        &scan,
        &config_in(dir.path()),
        Arc::new(ScriptedEngine::default()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)), "got {err:?}");
}

#[tokio::test]
async fn output_aliasing_input_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let scan = write_scan(dir.path());
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    let original = std::fs::read(&scan).unwrap();

    let err = convert_with_engine(
        &scan,
        dir.path().join("sub/../scan.png"),
        &config_in(dir.path()),
        Arc::new(ScriptedEngine::default()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)), "got {err:?}");
    assert_eq!(std::fs::read(&scan).unwrap(), original);
}

// ── Stage by stage ───────────────────────────────────────────────────────────

#[test]
fn stages_compose_by_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let scan = write_scan(dir.path());
    let work = dir.path().join("work");
    std::fs::create_dir_all(&work).unwrap();

    let tiffs = ImageRenderer::new(&scan)
        .generate_tiffs(
            &work,
            &RenderOptions::default(),
            StageContext::detached(Stage::Render),
        )
        .unwrap();

    let jpegs = generate_jpegs(
        &tiffs,
        &work,
        300,
        150,
        60,
        false,
        StageContext::detached(Stage::Compress),
    )
    .unwrap();
    assert_eq!(jpegs, vec![work.join("0.150.60.jpeg")]);

    let engine = ScriptedEngine::default();
    let langs = vec!["eng".to_string(), "por".to_string()];
    let tsvs = generate_tsvs(
        &tiffs,
        &work,
        &langs,
        &engine,
        false,
        StageContext::detached(Stage::Ocr),
    )
    .unwrap();
    assert_eq!(tsvs, vec![work.join("0.eng+por.tsv")]);

    let text = std::fs::read_to_string(&tsvs[0]).unwrap();
    assert!(text.starts_with(tsv::HEADER));
    assert!(text.contains("Invoice"));
}
