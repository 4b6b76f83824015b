//! Local blob storage for uploaded document files.
//!
//! Raw uploads are written under a configured storage root at
//! `documents/<owner>/<millis>_<name>`; the relative path is recorded on the
//! document row and used for deletion. Extraction works from the in-memory
//! upload bytes, so these files exist for retention and re-download only.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::models::now_millis;

/// Filesystem-backed blob store rooted at a configured directory.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store uploaded bytes, returning the relative storage path.
    pub fn put(&self, bytes: &[u8], original_name: &str, owner_subject: &str) -> Result<String> {
        let name = sanitize_file_name(original_name);
        let relative = format!(
            "documents/{}/{}_{}",
            sanitize_file_name(owner_subject),
            now_millis(),
            name
        );
        let full = self.root.join(&relative);

        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create storage dir: {}", parent.display()))?;
        }
        std::fs::write(&full, bytes)
            .with_context(|| format!("Failed to write file: {}", full.display()))?;

        Ok(relative)
    }

    /// Remove a stored file. A file that is already gone is not an error.
    pub fn delete(&self, relative_path: &str) -> Result<()> {
        let full = self.root.join(relative_path);
        match std::fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to delete file: {}", full.display()))
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Keep filenames path-safe: strip separators and parent components.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.replace("..", "_");
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}
