//! Input resolution: check the user-supplied path before any stage runs.
//!
//! pdfium reports a missing or truncated file as a generic load failure, so
//! existence, readability and the `%PDF` magic bytes are checked up front to
//! give callers a precise error instead.

use crate::error::{Error, Result};
use crate::render::extension_of;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Validate a local input file and return its path.
pub fn resolve_local(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref().to_path_buf();

    if !path.is_file() {
        return Err(Error::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Error::PermissionDenied { path });
        }
        Err(_) => return Err(Error::FileNotFound { path }),
    };

    if extension_of(&path).as_deref() == Some("pdf") {
        let mut magic = [0u8; 4];
        if file.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
            return Err(Error::CorruptPdf {
                path,
                detail: format!("missing %PDF header (starts with {:02x?})", magic),
            });
        }
    }

    debug!("Resolved input: {}", path.display());
    Ok(path)
}

/// The file `path` would actually name once written.
///
/// The longest prefix that exists is canonicalised (symlinks and `..`
/// resolved by the OS); the remaining components are folded lexically, which
/// is how they resolve once `create_dir_all` has made them.
pub fn physical_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let components: Vec<Component<'_>> = absolute.components().collect();

    let mut resolved = PathBuf::new();
    let mut existing = 0;
    for i in (1..=components.len()).rev() {
        let prefix: PathBuf = components[..i].iter().collect();
        if let Ok(canonical) = prefix.canonicalize() {
            resolved = canonical;
            existing = i;
            break;
        }
    }

    for component in &components[existing..] {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    resolved
}

/// Whether writing `output` would replace `input`.
pub fn would_overwrite(input: &Path, output: &Path) -> bool {
    physical_path(input) == physical_path(output)
}
