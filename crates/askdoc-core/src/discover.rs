//! Discovery module: resolve the user's source path into the files to read

use std::fmt;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::{AskError, Config, Result};

/// A user-supplied path, tagged with how it should be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourcePath {
    /// Read one file as one document.
    File(PathBuf),
    /// Recursively read every eligible file below the directory.
    Directory(PathBuf),
}

impl SourcePath {
    /// Tag `path` according to the single-file toggle.
    pub fn new(path: impl Into<PathBuf>, single_file: bool) -> Self {
        if single_file {
            Self::File(path.into())
        } else {
            Self::Directory(path.into())
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::File(p) | Self::Directory(p) => p,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(p) => write!(f, "file {}", p.display()),
            Self::Directory(p) => write!(f, "directory {}", p.display()),
        }
    }
}

/// Check if a file should be indexed based on its extension.
pub fn should_index(path: &Path, config: &Config) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    // Check exclude list first
    if config.exclude_extensions.iter().any(|e| *e == ext) {
        return false;
    }

    // If include list is specified, only include those
    if !config.include_extensions.is_empty() {
        return config.include_extensions.iter().any(|e| *e == ext);
    }

    true
}

/// Recursively list the files below `root` that pass the configured filters,
/// in a stable (sorted) order. Nothing under `storage_dir` is listed.
pub fn walk_directory(root: &Path, config: &Config, storage_dir: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(AskError::Build(format!(
            "{} is not a readable directory",
            root.display()
        )));
    }

    let storage_dir = storage_dir.canonicalize().ok();

    let walker = WalkBuilder::new(root)
        .hidden(true) // Skip hidden files
        .parents(config.respect_gitignore)
        .ignore(config.respect_gitignore)
        .git_ignore(config.respect_gitignore)
        .git_global(config.respect_gitignore)
        .git_exclude(config.respect_gitignore)
        .require_git(false)
        .sort_by_file_path(|a, b| a.cmp(b))
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.path();

        // Skip the persisted index if it lives inside the source tree
        if let Some(storage) = &storage_dir {
            if path.canonicalize().is_ok_and(|p| p.starts_with(storage)) {
                continue;
            }
        }

        if !should_index(path, config) {
            tracing::debug!("Skipping {} (extension filter)", path.display());
            continue;
        }

        match entry.metadata() {
            Ok(m) if m.len() > config.max_file_size => {
                tracing::debug!("Skipping {} ({} bytes)", path.display(), m.len());
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        }

        files.push(path.to_path_buf());
    }

    Ok(files)
}
