//! OS integration: trash, permanent delete and export

use crate::domain::{AssetFile, PhotoGroup};
use crate::error::{RawPickError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Which halves of a group an export carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    Jpg,
    Raw,
    #[default]
    Both,
}

impl ExportMode {
    fn files<'a>(&self, group: &'a PhotoGroup) -> Vec<&'a AssetFile> {
        match self {
            ExportMode::Jpg => group.jpg().into_iter().collect(),
            ExportMode::Raw => group.raw().into_iter().collect(),
            ExportMode::Both => group.assets().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransferOp {
    #[default]
    Copy,
    Move,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub mode: ExportMode,
    pub op: TransferOp,
    pub destination: PathBuf,
}

/// Filesystem side effects of bulk operations.
///
/// Each call processes every file it can and returns the paths handled. If
/// anything failed the whole call is an error listing each failure, and the
/// caller leaves its collection untouched.
pub trait FileOperations {
    fn move_to_trash(&self, groups: &[PhotoGroup]) -> Result<Vec<PathBuf>>;
    fn delete_permanently(&self, groups: &[PhotoGroup]) -> Result<Vec<PathBuf>>;
    fn export(&self, groups: &[PhotoGroup], request: &ExportRequest) -> Result<Vec<PathBuf>>;
}

/// [`FileOperations`] against the real filesystem and OS trash.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemFileOps;

impl SystemFileOps {
    fn remove_each<F>(groups: &[PhotoGroup], verb: &str, remove: F) -> Result<Vec<PathBuf>>
    where
        F: Fn(&Path) -> std::result::Result<(), String>,
    {
        let mut processed = Vec::new();
        let mut failures = Vec::new();

        for asset in groups.iter().flat_map(PhotoGroup::assets) {
            let path = asset.path();
            // Already gone is not a failure
            if !path.exists() {
                continue;
            }
            match remove(path) {
                Ok(()) => processed.push(path.to_path_buf()),
                Err(e) => failures.push(format!("Failed to {} {}: {}", verb, path.display(), e)),
            }
        }

        finish(processed, failures)
    }
}

impl FileOperations for SystemFileOps {
    fn move_to_trash(&self, groups: &[PhotoGroup]) -> Result<Vec<PathBuf>> {
        let moved = Self::remove_each(groups, "trash", |path| {
            trash::delete(path).map_err(|e| e.to_string())
        })?;
        info!(count = moved.len(), "moved files to trash");
        Ok(moved)
    }

    fn delete_permanently(&self, groups: &[PhotoGroup]) -> Result<Vec<PathBuf>> {
        let deleted = Self::remove_each(groups, "delete", |path| {
            fs::remove_file(path).map_err(|e| e.to_string())
        })?;
        info!(count = deleted.len(), "deleted files permanently");
        Ok(deleted)
    }

    fn export(&self, groups: &[PhotoGroup], request: &ExportRequest) -> Result<Vec<PathBuf>> {
        let destination = &request.destination;
        if !destination.exists() {
            return Err(RawPickError::NotFound(format!(
                "Destination folder does not exist: {}",
                destination.display()
            )));
        }
        if !destination.is_dir() {
            return Err(RawPickError::FileOperation(format!(
                "Destination path is not a directory: {}",
                destination.display()
            )));
        }

        let mut processed = Vec::new();
        let mut failures = Vec::new();

        for asset in groups.iter().flat_map(|group| request.mode.files(group)) {
            let source = asset.path();
            if !source.exists() {
                failures.push(format!("Source file not found: {}", source.display()));
                continue;
            }

            let Some(file_name) = source.file_name() else {
                failures.push(format!("Invalid file name: {}", source.display()));
                continue;
            };
            let target = destination.join(file_name);
            if target.exists() {
                failures.push(format!("Destination file already exists: {}", target.display()));
                continue;
            }

            let result = match request.op {
                TransferOp::Copy => fs::copy(source, &target).map(|_| ()),
                TransferOp::Move => fs::rename(source, &target),
            };
            match result {
                Ok(()) => {
                    debug!(from = %source.display(), to = %target.display(), op = ?request.op, "exported");
                    processed.push(target);
                }
                Err(e) => failures.push(format!("Failed to export {}: {}", source.display(), e)),
            }
        }

        if processed.is_empty() && failures.is_empty() {
            return Err(RawPickError::FileOperation("No files were exported".to_string()));
        }
        let exported = finish(processed, failures)?;
        info!(count = exported.len(), destination = %destination.display(), "export finished");
        Ok(exported)
    }
}

fn finish(processed: Vec<PathBuf>, failures: Vec<String>) -> Result<Vec<PathBuf>> {
    if failures.is_empty() {
        return Ok(processed);
    }
    for failure in &failures {
        warn!("{}", failure);
    }
    Err(RawPickError::FileOperation(format!(
        "{} of {} files failed:\n{}",
        failures.len(),
        failures.len() + processed.len(),
        failures.join("\n")
    )))
}
