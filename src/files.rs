//! File-loading helpers shared by the template façades.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Template name for a loaded file: its base name.
pub(crate) fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Expands `pattern`, requiring at least one match. Matches are sorted so
/// the first file (and with it the primary template name) is stable.
pub(crate) fn glob_paths(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = glob::glob(pattern)
        .map_err(|e| Error::Load(format!("bad glob pattern {pattern:?}: {e}")))?;
    let mut paths = Vec::new();
    for entry in entries {
        paths.push(entry.map_err(|e| Error::Load(e.to_string()))?);
    }
    if paths.is_empty() {
        return Err(Error::Load(format!("pattern matches no files: {pattern:?}")));
    }
    paths.sort();
    Ok(paths)
}
