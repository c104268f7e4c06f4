use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::naming::{is_audio, is_valid_name};

/// Post-split growth factor that marks leftover whole-album images.
pub const BLOAT_RATIO: f64 = 1.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioSizes {
    pub total: u64,
    pub count: usize,
}

impl AudioSizes {
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total as f64 / self.count as f64
        }
    }
}

/// Sums the sizes of audio files directly inside `dir`.
pub fn measure(dir: &Path) -> io::Result<AudioSizes> {
    let mut sizes = AudioSizes::default();
    for (_, len) in audio_files(dir)? {
        sizes.total += len;
        sizes.count += 1;
    }
    Ok(sizes)
}

pub fn is_bloated(before: u64, after: u64) -> bool {
    before > 0 && after as f64 >= before as f64 * BLOAT_RATIO
}

/// Deletes leftover pre-split images after a split that grew the directory
/// past [`BLOAT_RATIO`]: audio files above the mean size whose names are not
/// split output. Returns the deleted paths.
pub fn prune_bloat(dir: &Path, before: u64) -> io::Result<Vec<PathBuf>> {
    let after = measure(dir)?;
    if !is_bloated(before, after.total) {
        log::debug!(
            "Audio size in '{}' went from {before} to {} bytes; nothing to prune.",
            dir.display(),
            after.total
        );
        return Ok(Vec::new());
    }

    let mean = after.mean();
    let mut pruned = Vec::new();
    for (path, len) in audio_files(dir)? {
        if len as f64 > mean && is_valid_name(&path) {
            fs::remove_file(&path)?;
            log::info!(
                "Deleted '{}' due to exceeding average size.",
                path.display()
            );
            pruned.push(path);
        }
    }
    Ok(pruned)
}

fn audio_files(dir: &Path) -> io::Result<Vec<(PathBuf, u64)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        let path = entry.path();
        if metadata.is_file() && is_audio(&path) {
            files.push((path, metadata.len()));
        }
    }
    files.sort();
    Ok(files)
}
