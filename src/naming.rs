//! Deterministic artifact names.
//!
//! Every intermediate file encodes the page index and the parameters that
//! produced it, so a second run with the same settings finds its earlier
//! output and skips the work, while a run with different settings (another
//! JPEG quality, another language set) writes alongside instead of
//! clobbering.

use crate::error::{Error, Result};
use std::path::Path;

/// `{index}.tiff`
pub fn tiff_page(index: usize) -> String {
    format!("{index}.tiff")
}

/// `{index}.{dpi}.{quality}.jpeg`
pub fn jpeg_page(index: usize, dpi: u32, quality: u8) -> String {
    format!("{index}.{dpi}.{quality}.jpeg")
}

/// `{index}.{languages}.tsv`, with `languages` already joined by
/// [`languages_to_string`].
///
/// Path separators in script models such as `script/Latin` become `-`, so
/// the name always stays inside the work directory.
pub fn tsv_page(index: usize, languages: &str) -> String {
    let tag = languages.replace(['/', '\\'], "-");
    format!("{index}.{tag}.tsv")
}

/// Join language codes the way tesseract's `-l` flag expects: `eng+por`.
pub fn languages_to_string<S: AsRef<str>>(languages: &[S]) -> String {
    languages
        .iter()
        .map(|l| l.as_ref().trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("+")
}

/// Whether a stage should (re)generate `path`.
pub fn should_generate(path: &Path, overwrite: bool) -> bool {
    overwrite || !path.exists()
}

/// Write an artifact via a sibling temp file and rename.
///
/// A run killed mid-write must not leave a truncated file behind, since the
/// next run would take its mere existence as "done".
pub fn write_artifact(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    std::fs::write(&tmp_path, bytes).map_err(|e| Error::io(&tmp_path, e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| Error::io(path, e))
}
