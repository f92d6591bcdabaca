//! Manifest file reading and atomic writing
//!
//! This module provides:
//! - read_manifest / write_manifest helpers with path-carrying errors
//! - ManifestRollback, a guard that restores the original bytes unless committed

use crate::error::ManifestError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Read a manifest file content
pub fn read_manifest(path: &Path) -> Result<String, ManifestError> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ManifestError::not_found(path)
        } else {
            ManifestError::read_error(path, e)
        }
    })
}

/// Write content to a manifest file
///
/// The content lands in a sibling temp file first and is renamed over the
/// target, so readers never observe a half-written manifest. An existing
/// target keeps its permissions.
pub fn write_manifest(path: &Path, content: &[u8]) -> Result<(), ManifestError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| ManifestError::write_error(path, e))?;
    tmp.write_all(content)
        .map_err(|e| ManifestError::write_error(path, e))?;
    match fs::metadata(path) {
        Ok(metadata) => tmp
            .as_file()
            .set_permissions(metadata.permissions())
            .map_err(|e| ManifestError::write_error(path, e))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(ManifestError::write_error(path, e)),
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| ManifestError::write_error(path, e))?;
    tmp.persist(path)
        .map_err(|e| ManifestError::write_error(path, e.error))?;
    Ok(())
}

/// Restores a manifest to its original bytes unless committed
#[derive(Debug)]
pub struct ManifestRollback {
    path: PathBuf,
    original: Vec<u8>,
    armed: bool,
}

impl ManifestRollback {
    /// Snapshot the current content of `path`
    pub fn capture(path: impl Into<PathBuf>) -> Result<Self, ManifestError> {
        let path = path.into();
        let original = fs::read(&path).map_err(|e| ManifestError::read_error(&path, e))?;
        Ok(Self {
            path,
            original,
            armed: true,
        })
    }

    /// Path guarded by this rollback
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the current content
    pub fn commit(mut self) {
        self.armed = false;
    }

    /// Write the original bytes back now
    pub fn restore(mut self) -> Result<(), ManifestError> {
        self.armed = false;
        write_manifest(&self.path, &self.original)
    }
}

impl Drop for ManifestRollback {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = write_manifest(&self.path, &self.original) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to restore manifest");
        }
    }
}
