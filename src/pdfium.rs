//! Locate and bind the pdfium shared library.
//!
//! Search order, first hit wins:
//!
//! 1. `PDFIUM_LIB_PATH` — a library file, or a directory containing one.
//! 2. The directory of the running executable.
//! 3. The current working directory.
//! 4. The system library search path.
//!
//! Every call binds afresh; a [`Pdfium`] lives as long as the document work
//! that needs it.

use crate::error::{Error, Result};
use pdfium_render::prelude::Pdfium;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bind to the first pdfium library found.
pub fn bind_pdfium() -> Result<Pdfium> {
    bind_first_candidate().map_err(Error::PdfiumBindingFailed)
}

fn bind_first_candidate() -> std::result::Result<Pdfium, String> {
    let mut attempts = Vec::new();

    for candidate in candidate_paths() {
        if !candidate.exists() {
            continue;
        }
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", candidate.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => attempts.push(format!("{}: {}", candidate.display(), e)),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            debug!("Bound system pdfium");
            Ok(Pdfium::new(bindings))
        }
        Err(e) => {
            attempts.push(format!("system library: {}", e));
            Err(attempts.join("; "))
        }
    }
}

/// Library files worth trying before the system search path.
pub fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(env_path) = std::env::var_os("PDFIUM_LIB_PATH") {
        paths.push(resolve_library_path(Path::new(&env_path)));
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
    {
        paths.push(Pdfium::pdfium_platform_library_name_at_path(&exe_dir));
    }
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(Pdfium::pdfium_platform_library_name_at_path(&cwd));
    }

    paths
}

/// Accept either the library file itself or the directory that holds it.
fn resolve_library_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_resolves_to_platform_library() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_library_path(dir.path());
        assert_eq!(resolved.parent(), Some(dir.path()));
        let name = resolved.file_name().unwrap().to_string_lossy();
        assert!(name.contains("pdfium"), "got {name}");
    }

    #[test]
    fn file_path_is_kept() {
        let p = Path::new("/opt/pdfium/lib/libpdfium.so");
        assert_eq!(resolve_library_path(p), p.to_path_buf());
    }
}
