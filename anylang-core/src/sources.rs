use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::CoreError;

pub const SOURCE_EXTENSION: &str = "any";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub name: String,
    pub contents: String,
}

/// Collects every file under `root` whose extension is exactly `extension`.
///
/// Entries are visited depth first with siblings sorted by file name, so the
/// result is stable across runs and platforms.
pub fn discover_sources(
    root: impl AsRef<Path>,
    extension: &str,
) -> Result<Vec<SourceFile>, CoreError> {
    let root = root.as_ref();
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != extension) {
            continue;
        }
        let source_err = |source| CoreError::SourceIo {
            path: path.to_path_buf(),
            source,
        };
        // Links are not followed while walking; a linked file still counts.
        let is_file = if entry.path_is_symlink() {
            fs::metadata(path).map_err(source_err)?.is_file()
        } else {
            entry.file_type().is_file()
        };
        if !is_file {
            continue;
        }
        let contents = fs::read_to_string(path).map_err(source_err)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        debug!(path = %path.display(), bytes = contents.len(), "discovered source");
        files.push(SourceFile {
            path: path.to_path_buf(),
            name,
            contents,
        });
    }
    if files.is_empty() {
        return Err(CoreError::NoSources {
            root: root.to_path_buf(),
            extension: extension.into(),
        });
    }
    Ok(files)
}
