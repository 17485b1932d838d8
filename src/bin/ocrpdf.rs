//! CLI binary for searchable-pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use searchable_pdf::{
    convert, inspect, supported_formats, CancellationFlag, ConversionOutput,
    ConversionProgressCallback, DocumentMetadata, PageSelection, PipelineConfig, ProgressCallback,
    Stage, TesseractConfig, TesseractEngine,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar, reset at the start of every stage.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Pages of the current stage served from an existing artifact.
    reused: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            reused: AtomicUsize::new(0),
        })
    }

    fn stage_label(stage: Stage) -> &'static str {
        match stage {
            Stage::Render => "Rendering ",
            Stage::Compress => "Compressing",
            Stage::Ocr => "OCR       ",
            Stage::Assemble => "Assembling",
        }
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Making {total_pages} pages searchable…"))
        ));
    }

    fn on_stage_start(&self, stage: Stage, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.reused.store(0, Ordering::SeqCst);
        self.bar.set_style(style);
        self.bar.set_prefix(Self::stage_label(stage));
        self.bar.set_length(total_pages as u64);
        self.bar.set_position(0);
        self.bar.set_message("");
        self.bar.reset_eta();
    }

    fn on_page_complete(
        &self,
        _stage: Stage,
        page_index: usize,
        _done: usize,
        _total_pages: usize,
        regenerated: bool,
    ) {
        let reused = if regenerated {
            self.reused.load(Ordering::SeqCst)
        } else {
            self.reused.fetch_add(1, Ordering::SeqCst) + 1
        };
        let mut msg = format!("page {}", page_index + 1);
        if reused > 0 {
            msg.push_str(&dim(&format!("  {reused} cached")));
        }
        self.bar.set_message(msg);
        self.bar.inc(1);
    }

    fn on_stage_complete(&self, stage: Stage) {
        let reused = self.reused.load(Ordering::SeqCst);
        let note = if reused > 0 {
            dim(&format!("  ({reused} reused)"))
        } else {
            String::new()
        };
        self.bar.println(format!(
            "  {} {:<12} {:>3} pages{}",
            green("✓"),
            stage.as_str(),
            self.bar.position(),
            note
        ));
    }

    fn on_conversion_complete(&self, _total_pages: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (writes scan.searchable.pdf)
  ocrpdf scan.pdf

  # Explicit output, German + English OCR
  ocrpdf scan.pdf -o scan-ocr.pdf --lang deu,eng

  # A single photographed page
  ocrpdf receipt.jpg -o receipt.pdf

  # Pages 3 to 10 only, smaller preview images
  ocrpdf --pages 3-10 --jpeg-dpi 72 --quality 60 book.pdf

  # Redo everything from scratch, then drop the intermediate files
  ocrpdf --overwrite --clean scan.pdf

  # Inspect metadata without converting
  ocrpdf --inspect-only scan.pdf

WORK DIRECTORY:
  Rendered pages, preview JPEGs and OCR dumps are cached next to the output
  in <OUTPUT>.work/ as {page}.tiff, {page}.{dpi}.{quality}.jpeg and
  {page}.{langs}.tsv. A rerun reuses whatever is already there, so an
  interrupted conversion resumes where it stopped. Use --overwrite to
  regenerate and --clean to delete this run's files after success.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  TESSERACT_CMD           tesseract executable to run
  TESSDATA_PREFIX         Where tesseract looks for .traineddata files
  RUST_LOG                Log filter, overrides -v / -q
  OCRPDF_*                Every flag, e.g. OCRPDF_LANG=deu,eng

SETUP:
  1. Install tesseract and language data:  apt install tesseract-ocr tesseract-ocr-deu
  2. Get pdfium (PDF input only):          https://github.com/bblanchon/pdfium-binaries
  3. Convert:                              ocrpdf scan.pdf
"#;

/// Make scanned PDFs and images searchable with an invisible OCR text layer.
#[derive(Parser, Debug)]
#[command(
    name = "ocrpdf",
    version,
    about = "Make scanned PDFs and images searchable with an invisible OCR text layer",
    long_about = "Render every page of a scanned PDF or image, OCR it with tesseract and write \
a new PDF in which each page shows a compressed copy of the scan overlaid with invisible, \
selectable text positioned where the words appear.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Scanned PDF or image file.
    #[arg(required_unless_present = "list_formats")]
    input: Option<PathBuf>,

    /// Output PDF. Default: <INPUT stem>.searchable.pdf next to the input.
    #[arg(short, long, env = "OCRPDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Directory for intermediate artifacts. Default: <OUTPUT>.work
    #[arg(long, env = "OCRPDF_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// OCR languages (tesseract codes), comma-separated or repeated.
    #[arg(
        short,
        long = "lang",
        env = "OCRPDF_LANG",
        value_delimiter = ',',
        default_value = "eng"
    )]
    lang: Vec<String>,

    /// Rendering DPI for OCR (72–600).
    ///
    /// Image inputs whose header records a scan resolution are resampled to
    /// it; images without one are assumed to be scanned at this DPI.
    #[arg(long, env = "OCRPDF_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Resolution of the page images embedded in the output.
    #[arg(long, env = "OCRPDF_JPEG_DPI", default_value_t = 100,
          value_parser = clap::value_parser!(u32).range(1..=600))]
    jpeg_dpi: u32,

    /// JPEG quality of the embedded page images (1–100).
    #[arg(long, env = "OCRPDF_QUALITY", default_value_t = 100,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Minimum OCR confidence (0–100) for a word to enter the text layer.
    #[arg(long, env = "OCRPDF_MIN_CONF", default_value_t = 25.0)]
    min_conf: f32,

    /// Regenerate intermediate artifacts even if they exist.
    #[arg(long, env = "OCRPDF_OVERWRITE")]
    overwrite: bool,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "OCRPDF_PAGES", default_value = "all")]
    pages: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "OCRPDF_PASSWORD")]
    password: Option<String>,

    /// Tesseract page segmentation mode.
    #[arg(long, env = "OCRPDF_PSM", default_value_t = 3,
          value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: u8,

    /// tesseract executable. Default: $TESSERACT_CMD or `tesseract` on PATH.
    #[arg(long, env = "OCRPDF_TESSERACT")]
    tesseract: Option<PathBuf>,

    /// Directory holding tesseract's .traineddata files.
    #[arg(long, env = "OCRPDF_TESSDATA_DIR")]
    tessdata_dir: Option<PathBuf>,

    /// Delete this run's intermediate files after a successful conversion.
    #[arg(long, env = "OCRPDF_CLEAN")]
    clean: bool,

    /// Print source metadata only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// List supported input formats and exit.
    #[arg(long)]
    list_formats: bool,

    /// Print the result (ConversionOutput / metadata) as JSON on stdout.
    #[arg(long, env = "OCRPDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "OCRPDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCRPDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCRPDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The bar carries all the feedback while it is visible.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── List formats ─────────────────────────────────────────────────────
    if cli.list_formats {
        let formats = supported_formats();
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&formats).context("Failed to serialise formats")?
            );
        } else {
            for f in formats {
                println!("{f}");
            }
        }
        return Ok(());
    }

    let input = cli
        .input
        .clone()
        .context("An input file is required")?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&input, cli.password.as_deref())
            .await
            .context("Failed to inspect input")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?
            );
        } else {
            print_metadata(&input, &meta);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // A missing .traineddata otherwise only surfaces after rendering.
    let engine = TesseractEngine::new(config.tesseract.clone());
    let languages = config.languages.clone();
    tokio::task::spawn_blocking(move || engine.check_languages(&languages))
        .await
        .context("Language check task failed")?
        .context("OCR languages are not available")?;

    // Ctrl-C stops at the next page boundary; artifacts written so far stay.
    let cancel = config.cancel.clone();
    tokio::spawn(watch_ctrl_c(cancel, cli.quiet));

    // ── Run conversion ───────────────────────────────────────────────────
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output(&input));
    let output = convert(&input, &output_path, &config)
        .await
        .with_context(|| format!("Conversion of '{}' failed", input.display()))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
    } else if !cli.quiet {
        print_summary(&output);
    }

    Ok(())
}

async fn watch_ctrl_c(cancel: CancellationFlag, quiet: bool) {
    if tokio::signal::ctrl_c().await.is_ok() {
        if !quiet {
            eprintln!(
                "\n{} {}",
                red("✘"),
                bold("Interrupted, stopping after the current page…")
            );
        }
        cancel.cancel();
    }
}

fn print_metadata(input: &Path, meta: &DocumentMetadata) {
    println!("File:         {}", input.display());
    println!("Format:       {}", meta.format);
    if let Some(ref t) = meta.title {
        println!("Title:        {}", t);
    }
    if let Some(ref a) = meta.author {
        println!("Author:       {}", a);
    }
    if let Some(ref s) = meta.subject {
        println!("Subject:      {}", s);
    }
    println!("Pages:        {}", meta.page_count);
    if let Some(ref v) = meta.pdf_version {
        println!("PDF Version:  {}", v);
    }
    if let Some(dpi) = meta.source_dpi {
        println!("Scan DPI:     {}", dpi);
    }
    if let Some(ref p) = meta.producer {
        println!("Producer:     {}", p);
    }
    if let Some(ref c) = meta.creator {
        println!("Creator:      {}", c);
    }
    if meta.already_processed {
        println!("Searchable:   {}", cyan("yes (generated by ocrpdf)"));
    }
}

fn print_summary(output: &ConversionOutput) {
    let stats = &output.stats;
    eprintln!(
        "{}  {}/{} pages  {}ms  →  {}",
        green("✔"),
        stats.processed_pages,
        stats.total_pages,
        stats.total_duration_ms,
        bold(&output.output.display().to_string()),
    );
    eprintln!(
        "   {} words placed  /  {} below confidence  /  {} artifacts reused",
        dim(&stats.words_kept.to_string()),
        dim(&stats.words_dropped.to_string()),
        dim(&stats.reused_artifacts.to_string()),
    );
}

/// `<stem>.searchable.pdf` in the input's directory.
fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}.searchable.pdf"))
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let pages = parse_pages(&cli.pages)?;

    let mut tesseract = TesseractConfig {
        psm: cli.psm,
        tessdata_dir: cli.tessdata_dir.clone(),
        ..TesseractConfig::default()
    };
    if let Some(ref cmd) = cli.tesseract {
        tesseract.command = cmd.clone();
    }

    let mut builder = PipelineConfig::builder()
        .render_dpi(cli.dpi)
        .jpeg_dpi(cli.jpeg_dpi)
        .jpeg_quality(cli.quality)
        .languages(&cli.lang)
        .min_confidence(cli.min_conf)
        .overwrite(cli.overwrite)
        .pages(pages)
        .keep_artifacts(!cli.clean)
        .tesseract(tesseract);

    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref dir) = cli.work_dir {
        builder = builder.work_dir(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}
