//! [`OcrEngine`] backed by the `tesseract` command-line tool.
//!
//! The engine runs `tesseract <image> stdout -l <langs> --psm <n> tsv` and
//! keeps the word-level rows (level 5) of the resulting table. Each word's
//! `left, top, width, height` becomes an [`OcrRect`] in the pixel space of
//! the input image, and its `conf` column becomes the record's confidence.

use super::{OcrEngine, OcrOutput, OcrRecord, OcrRect};
use crate::error::{Error, Result};
use crate::naming;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, instrument, warn};

/// Tesseract's row level for individual words.
const WORD_LEVEL: u32 = 5;

/// Column count of tesseract's TSV output.
const TESSERACT_COLUMNS: usize = 12;

/// How to invoke tesseract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TesseractConfig {
    /// Executable to run. Default: `$TESSERACT_CMD` or `tesseract` on `PATH`.
    pub command: PathBuf,

    /// Page segmentation mode (`--psm`). Default: 3, fully automatic.
    pub psm: u8,

    /// Optional `--tessdata-dir` holding the `.traineddata` files.
    pub tessdata_dir: Option<PathBuf>,

    /// DPI hint passed with `--dpi`; the pipeline sets it to the render DPI.
    pub dpi: Option<u32>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            command: std::env::var_os("TESSERACT_CMD")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("tesseract")),
            psm: 3,
            tessdata_dir: None,
            dpi: None,
        }
    }
}

/// OCR engine wrapping the `tesseract` CLI.
#[derive(Debug, Clone, Default)]
pub struct TesseractEngine {
    config: TesseractConfig,
}

impl TesseractEngine {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TesseractConfig {
        &self.config
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.config.command);
        if let Some(ref dir) = self.config.tessdata_dir {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        let detail = if e.kind() == ErrorKind::NotFound {
            format!("'{}' not found on PATH", self.config.command.display())
        } else {
            e.to_string()
        };
        Error::OcrEngineUnavailable {
            engine: "tesseract".into(),
            detail,
        }
    }

    /// Languages tesseract can load, from `tesseract --list-langs`.
    pub fn available_languages(&self) -> Result<Vec<String>> {
        let output = self
            .base_command()
            .arg("--list-langs")
            .output()
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(Error::OcrEngineUnavailable {
                engine: "tesseract".into(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // Older versions print the list on stderr.
        let text = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        Ok(parse_language_list(&text))
    }

    /// Fail early with a readable error when a requested language is missing.
    pub fn check_languages(&self, languages: &[String]) -> Result<()> {
        let available = self.available_languages()?;
        let missing: Vec<&str> = languages
            .iter()
            .map(String::as_str)
            .filter(|l| !available.iter().any(|a| a == l))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidConfig(format!(
                "tesseract has no traineddata for: {} (installed: {})",
                missing.join(", "),
                available.join(", ")
            )))
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    #[instrument(level = "debug", skip_all, fields(image = %image_path.display()))]
    fn recognize(&self, image_path: &Path, languages: &[String]) -> Result<OcrOutput> {
        let langs = naming::languages_to_string(languages);
        let mut cmd = self.base_command();
        cmd.arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&langs)
            .arg("--psm")
            .arg(self.config.psm.to_string());
        if let Some(dpi) = self.config.dpi {
            cmd.arg("--dpi").arg(dpi.to_string());
        }
        cmd.arg("tsv");

        debug!("Running {:?}", cmd);
        let output = cmd.output().map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(Error::OcrFailed {
                path: image_path.to_path_buf(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed = parse_tesseract_tsv(&stdout);
        if parsed.is_empty() {
            warn!("No words recognised on {}", image_path.display());
        }
        Ok(parsed)
    }
}

/// Keep word rows with a non-negative confidence and non-blank text.
pub fn parse_tesseract_tsv(tsv: &str) -> OcrOutput {
    let mut records = Vec::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < TESSERACT_COLUMNS {
            continue;
        }
        if cols[0].parse::<u32>().ok() != Some(WORD_LEVEL) {
            continue;
        }

        let text = cols[11].trim();
        let conf: f32 = cols[10].trim().parse().unwrap_or(-1.0);
        if text.is_empty() || conf < 0.0 {
            continue;
        }

        let field = |i: usize| cols[i].trim().parse::<f32>().ok();
        let (Some(left), Some(top), Some(width), Some(height)) =
            (field(6), field(7), field(8), field(9))
        else {
            continue;
        };

        records.push(OcrRecord {
            rect: OcrRect::from_ltwh(left, top, width, height),
            text: text.to_string(),
            confidence: conf.min(100.0),
        });
    }

    OcrOutput::new(records)
}

fn parse_language_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of available languages"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t2480\t3508\t-1\t
4\t1\t1\t1\t1\t0\t120\t88\t400\t43\t-1\t
5\t1\t1\t1\t1\t1\t120\t88\t190\t43\t96.204819\tInvoice
5\t1\t1\t1\t1\t2\t330\t90\t120\t41\t91.5\tNo.
5\t1\t1\t1\t1\t3\t460\t90\t10\t41\t-1\t
5\t1\t1\t1\t1\t4\t480\t90\t10\t41\t12\t~
";

    #[test]
    fn parses_word_rows_only() {
        let out = parse_tesseract_tsv(SAMPLE);
        assert_eq!(out.len(), 3);
        assert_eq!(out.records[0].text, "Invoice");
        assert_eq!(out.records[0].rect, OcrRect::new(120.0, 88.0, 310.0, 131.0));
        assert!((out.records[0].confidence - 96.204819).abs() < 1e-4);
        assert_eq!(out.records[1].text, "No.");
        // Low confidence is kept here; filtering happens at assembly time.
        assert_eq!(out.records[2].confidence, 12.0);
    }

    #[test]
    fn empty_and_garbage_input() {
        assert!(parse_tesseract_tsv("").is_empty());
        assert!(parse_tesseract_tsv("not\ta\ttable\n1\t2\n").is_empty());
    }

    #[test]
    fn language_list_parsing() {
        let text = "List of available languages in \"/usr/share/tessdata/\" (3):\neng\nosd\npor\n";
        assert_eq!(parse_language_list(text), vec!["eng", "osd", "por"]);
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let engine = TesseractEngine::new(TesseractConfig {
            command: PathBuf::from("/nonexistent/tesseract-binary"),
            ..TesseractConfig::default()
        });
        let err = engine
            .recognize(Path::new("page.tiff"), &["eng".to_string()])
            .unwrap_err();
        assert!(
            matches!(err, Error::OcrEngineUnavailable { .. }),
            "got {err:?}"
        );
    }
}
