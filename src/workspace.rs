//
// workspace.rs
// Dicom-Pseudonymizer-rs
//
// Prepares the mutable work area, stages a copy of the source tree into it, and fingerprints trees.
//

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{PseudonymError, Result};

/// Directory where all renaming happens; guaranteed empty right after [`WorkArea::prepare`].
#[derive(Debug, Clone)]
pub struct WorkArea {
    root: PathBuf,
}

impl WorkArea {
    /// Clear or create `root`, refusing any location that overlaps `source_root`.
    pub fn prepare(root: impl AsRef<Path>, source_root: &Path) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let canonical_source = source_root
            .canonicalize()
            .map_err(|e| PseudonymError::io(source_root, e))?;
        let absolute_root = absolute(&root)?;
        // Either containment direction would make the copy read what it writes or wipe the source.
        if absolute_root.starts_with(&canonical_source) || canonical_source.starts_with(&absolute_root)
        {
            return Err(PseudonymError::WorkAreaOverlap {
                work_dir: root,
                source_root: source_root.to_path_buf(),
            });
        }

        match fs::symlink_metadata(&root) {
            Ok(meta) if meta.is_dir() => {
                info!(work_dir = %root.display(), "clearing previous work area");
                fs::remove_dir_all(&root).map_err(|e| PseudonymError::io(&root, e))?;
            }
            Ok(_) => {
                fs::remove_file(&root).map_err(|e| PseudonymError::io(&root, e))?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(PseudonymError::io(&root, e)),
        }
        fs::create_dir_all(&root).map_err(|e| PseudonymError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Working copy of one provider subtree.
    pub fn provider_dir(&self, category: &str, provider: &str) -> PathBuf {
        self.root.join(category).join(provider)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Ok(canonical);
    }
    // Not created yet: anchor at the deepest existing ancestor.
    let mut missing = Vec::new();
    let mut cursor = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map_err(|e| PseudonymError::io(path, e))?
            .join(path)
    };
    loop {
        if let Ok(canonical) = cursor.canonicalize() {
            return Ok(missing.iter().rev().fold(canonical, |acc, part| acc.join(part)));
        }
        match (cursor.file_name().map(|n| n.to_os_string()), cursor.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name);
                cursor = parent.to_path_buf();
            }
            _ => return Ok(cursor),
        }
    }
}

/// Recursively copy every directory and file under `source` into `dest`.
///
/// Symbolic links are followed, so linked directories and files land in `dest` as real copies.
/// A link cycle is reported as an I/O error.
pub fn stage_copy(source: &Path, dest: &Path) -> Result<usize> {
    let mut files = 0;
    for entry in WalkDir::new(source).min_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| walk_error(source, e))?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| PseudonymError::io(&target, e))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| PseudonymError::io(entry.path(), e))?;
            files += 1;
        }
    }
    debug!(source = %source.display(), dest = %dest.display(), files, "source staged");
    Ok(files)
}

/// SHA-256 over every relative path and file content under `root`, in name order.
pub fn tree_fingerprint(root: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        if entry.file_type().is_file() {
            let bytes = fs::read(entry.path()).map_err(|e| PseudonymError::io(entry.path(), e))?;
            hasher.update(Sha256::digest(&bytes));
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

fn walk_error(root: &Path, err: walkdir::Error) -> PseudonymError {
    let path = err.path().unwrap_or(root).to_path_buf();
    PseudonymError::io(path, io::Error::from(err))
}
