//! File utility functions.

use crate::error::{ImportError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Recursively find files with given extension in a directory.
///
/// When `pattern` is given, only files whose name matches the glob pattern
/// (e.g. `goblin*.json`) are returned. Results are sorted by path.
pub fn find_files_with_extension(dir: &Path, extension: &str, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(ImportError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Directory not found: {}", dir.display()),
        )));
    }

    let pattern = pattern
        .map(glob::Pattern::new)
        .transpose()
        .map_err(|e| ImportError::Config(format!("Invalid file pattern: {}", e)))?;

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != extension) {
            continue;
        }
        if let Some(pattern) = &pattern {
            let name = entry.file_name().to_string_lossy();
            if !pattern.matches(&name) {
                continue;
            }
        }
        files.push(path.to_path_buf());
    }
    files.sort();
    Ok(files)
}

/// Read a text file as UTF-8, falling back to Windows-1252 for exports saved
/// by legacy editors.
pub fn read_text_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text)),
        Err(e) => {
            tracing::debug!("{} is not UTF-8, decoding as Windows-1252", path.display());
            let (text, _, had_errors) = encoding_rs::WINDOWS_1252.decode(e.as_bytes());
            if had_errors {
                return Err(ImportError::Parse(format!(
                    "Failed to decode {} as Windows-1252",
                    path.display()
                )));
            }
            Ok(text.into_owned())
        }
    }
}
