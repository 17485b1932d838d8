//! Tab-separated OCR dump: the on-disk hand-off between OCR and assembly.
//!
//! ```text
//! Origin\tX1\tY1\tX2\tY2\tConfidence\tText
//! OCROutput\t120\t88\t310\t131\t96.2\tInvoice
//! ```

use super::{OcrOutput, OcrRecord, OcrRect};
use crate::error::{Error, Result};
use crate::naming;
use std::path::Path;

pub const HEADER: &str = "Origin\tX1\tY1\tX2\tY2\tConfidence\tText";

/// Label written in the `Origin` column when the caller has none.
pub const DEFAULT_ORIGIN: &str = "OCROutput";

const COLUMNS: usize = 7;

/// Render `output` as TSV text.
pub fn to_tsv_string(output: &OcrOutput, origin: &str) -> String {
    let origin = sanitize(origin);
    let mut s = String::with_capacity(HEADER.len() + 1 + output.len() * 48);
    s.push_str(HEADER);
    s.push('\n');
    for r in &output.records {
        s.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            origin,
            r.rect.x1,
            r.rect.y1,
            r.rect.x2,
            r.rect.y2,
            r.confidence,
            sanitize(&r.text)
        ));
    }
    s
}

/// Write `output` to `path`, atomically.
pub fn write_tsv(path: &Path, output: &OcrOutput, origin: &str) -> Result<()> {
    naming::write_artifact(path, to_tsv_string(output, origin).as_bytes())
}

/// Parse TSV text produced by [`to_tsv_string`]. `path` is only used in errors.
pub fn parse_tsv(text: &str, path: &Path) -> Result<OcrOutput> {
    let mut lines = text.lines().enumerate();

    match lines.next() {
        Some((_, header)) if header.trim_end_matches('\r') == HEADER => {}
        Some((_, header)) => {
            return Err(Error::TsvParse {
                path: path.to_path_buf(),
                line: 1,
                detail: format!("unexpected header {header:?}"),
            })
        }
        None => {
            return Err(Error::TsvParse {
                path: path.to_path_buf(),
                line: 1,
                detail: "empty file".into(),
            })
        }
    }

    let mut records = Vec::new();
    for (idx, line) in lines {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let line_no = idx + 1;
        let cols: Vec<&str> = line.splitn(COLUMNS, '\t').collect();
        if cols.len() != COLUMNS {
            return Err(Error::TsvParse {
                path: path.to_path_buf(),
                line: line_no,
                detail: format!("expected {COLUMNS} columns, found {}", cols.len()),
            });
        }

        let num = |i: usize, name: &str| -> Result<f32> {
            cols[i].trim().parse::<f32>().map_err(|e| Error::TsvParse {
                path: path.to_path_buf(),
                line: line_no,
                detail: format!("{name} {:?}: {e}", cols[i]),
            })
        };

        records.push(OcrRecord {
            rect: OcrRect::new(num(1, "X1")?, num(2, "Y1")?, num(3, "X2")?, num(4, "Y2")?),
            confidence: num(5, "Confidence")?,
            text: cols[6].to_string(),
        });
    }

    Ok(OcrOutput::new(records))
}

/// Read a dump written by [`write_tsv`].
pub fn read_tsv(path: &Path) -> Result<OcrOutput> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_tsv(&text, path)
}

/// Tabs and line breaks would split a row; tesseract never emits them inside
/// a word, but other engines might.
fn sanitize(text: &str) -> String {
    text.replace(['\t', '\n', '\r'], " ")
}
