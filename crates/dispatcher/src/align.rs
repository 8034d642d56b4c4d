//! Frame alignment post-pass
//!
//! Every leaf folder under a log directory is renumbered from `000000` and
//! truncated to the smallest file count among all leaves, so every sensor
//! ends with the same frames.
//!
//! A leaf is a folder that directly holds files (`GPS`), or each sensor
//! folder inside a condition folder.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::error::{DispatcherError, Result};
use crate::layout::frame_file_name;

/// Summary of an alignment pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignReport {
    /// Leaf folders visited, sorted
    pub folders: Vec<PathBuf>,
    /// Frame count every folder was cut to
    pub frame_count: usize,
    /// Files deleted past the common count
    pub removed: usize,
}

/// Renumber and truncate every leaf folder of `log_dir`
#[instrument(name = "align_log_dir", skip_all, fields(log_dir = %log_dir.display()))]
pub fn align_log_dir(log_dir: &Path) -> Result<AlignReport> {
    let folders = leaf_folders(log_dir)?;
    if folders.is_empty() {
        return Ok(AlignReport::default());
    }

    let mut listings = Vec::with_capacity(folders.len());
    for folder in &folders {
        listings.push(sorted_files(folder)?);
    }
    let frame_count = listings.iter().map(Vec::len).min().unwrap_or(0);

    let mut removed = 0;
    for (folder, files) in folders.iter().zip(listings) {
        removed += align_folder(folder, files, frame_count)?;
    }

    info!(folders = folders.len(), frame_count, removed, "log directory aligned");
    Ok(AlignReport {
        folders,
        frame_count,
        removed,
    })
}

fn align_folder(folder: &Path, files: Vec<PathBuf>, keep: usize) -> Result<usize> {
    let mut removed = 0;
    let mut staged = Vec::with_capacity(keep);

    for (index, file) in files.into_iter().enumerate() {
        if index >= keep {
            fs::remove_file(&file).map_err(|e| DispatcherError::io(&file, e))?;
            removed += 1;
            continue;
        }
        // Two-phase rename so a target name never collides with a pending source
        let temp = folder.join(format!(".align-{index}.tmp"));
        fs::rename(&file, &temp).map_err(|e| DispatcherError::io(&file, e))?;
        let extension = file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        staged.push((temp, extension));
    }

    for (index, (temp, extension)) in staged.into_iter().enumerate() {
        let target = folder.join(frame_file_name(index as u64, &extension));
        fs::rename(&temp, &target).map_err(|e| DispatcherError::io(&temp, e))?;
    }

    debug!(folder = %folder.display(), keep, removed, "folder aligned");
    Ok(removed)
}

fn leaf_folders(log_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut leaves = Vec::new();
    for top in subdirectories(log_dir)? {
        let nested = subdirectories(&top)?;
        if nested.is_empty() {
            leaves.push(top);
        } else {
            leaves.extend(nested);
        }
    }
    leaves.sort();
    Ok(leaves)
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| DispatcherError::io(dir, e))? {
        let entry = entry.map_err(|e| DispatcherError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| DispatcherError::io(dir, e))? {
        let entry = entry.map_err(|e| DispatcherError::io(dir, e))?;
        // Hidden names include staging files left by an interrupted run
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
