use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::cancel::CancellationToken;
use crate::cuesheet::{self, RepairOutcome};
use crate::naming::{is_audio, is_cue, is_known_invalid_pattern, is_valid_name};
use crate::report::Report;
use crate::sizes;
use crate::tools::{TargetFormat, ToolError, Toolchain};
use crate::transcode::{self, GateOutcome};

/// Reserved name whose presence marks a directory as in progress.
pub const MARKER_FILE: &str = ".processing";

/// On-disk state of one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirState {
    /// No marker, but valid source audio waiting to be processed.
    Untouched { candidates: Vec<PathBuf> },
    /// Marker present: an earlier run started here and never confirmed.
    InProgress,
    /// No marker and nothing to process.
    Complete,
}

impl DirState {
    pub fn inspect(dir: &Path) -> io::Result<Self> {
        if marker_path(dir).exists() {
            return Ok(DirState::InProgress);
        }

        let candidates: Vec<PathBuf> = list_files(dir)?
            .into_iter()
            .filter(|path| is_audio(path) && is_valid_name(path))
            .collect();

        if candidates.is_empty() {
            Ok(DirState::Complete)
        } else {
            Ok(DirState::Untouched { candidates })
        }
    }
}

/// How a directory left the state machine without a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirOutcome {
    /// Nothing to do; the directory was not modified.
    NotCandidate,
    /// All steps ran and the marker was removed.
    Completed,
    /// The splitter failed for a reason other than an interrupt; marker kept.
    SplitFailed,
    /// The run is being cancelled; marker kept if it was set.
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to {action} '{}'", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),
}

fn io_error<'a>(
    action: &'static str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> ProcessError + 'a {
    move |source| ProcessError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

pub fn marker_path(dir: &Path) -> PathBuf {
    dir.join(MARKER_FILE)
}

/// Drives one directory through sweep, cue repair, transcoding, splitting and
/// pruning while keeping the marker consistent.
pub struct DirectoryProcessor<'a> {
    tools: &'a Toolchain,
    target: TargetFormat,
    cancel: &'a CancellationToken,
}

enum Steps {
    Done,
    SplitFailed,
    Cancelled,
}

impl<'a> DirectoryProcessor<'a> {
    pub fn new(tools: &'a Toolchain, target: TargetFormat, cancel: &'a CancellationToken) -> Self {
        Self {
            tools,
            target,
            cancel,
        }
    }

    pub fn process(&self, dir: &Path, report: &mut Report) -> Result<DirOutcome, ProcessError> {
        if self.cancel.is_cancelled() {
            return Ok(DirOutcome::Cancelled);
        }

        let marker = marker_path(dir);
        match DirState::inspect(dir).map_err(io_error("inspect", dir))? {
            DirState::Complete => {
                log::debug!("No valid audio files found in '{}', skipping.", dir.display());
                return Ok(DirOutcome::NotCandidate);
            }
            DirState::InProgress => {
                log::info!("Resuming interrupted directory '{}'", dir.display());
                report.record_resume();
                let swept = sweep_invalid(dir)?;
                report.record_swept(swept);
            }
            DirState::Untouched { candidates } => {
                fs::File::create(&marker).map_err(io_error("create marker", &marker))?;
                log::info!(
                    "Started processing directory '{}' ({} source files)",
                    dir.display(),
                    candidates.len()
                );
            }
        }

        match self.run_steps(dir, report)? {
            Steps::Done => {
                fs::remove_file(&marker).map_err(io_error("remove marker", &marker))?;
                log::info!("Finished processing directory '{}'", dir.display());
                Ok(DirOutcome::Completed)
            }
            Steps::SplitFailed => Ok(DirOutcome::SplitFailed),
            Steps::Cancelled => {
                log::warn!(
                    "Stopped in '{}'; it stays marked for the next run.",
                    dir.display()
                );
                Ok(DirOutcome::Cancelled)
            }
        }
    }

    fn run_steps(&self, dir: &Path, report: &mut Report) -> Result<Steps, ProcessError> {
        let files = list_files(dir).map_err(io_error("list", dir))?;

        for cue in files.iter().filter(|path| is_cue(path)) {
            if self.cancel.is_cancelled() {
                return Ok(Steps::Cancelled);
            }
            match cuesheet::repair_cue(cue) {
                Ok(RepairOutcome::Converted { .. }) => report.record_cue_converted(),
                Ok(RepairOutcome::Restored(_)) => report.record_cue_restored(),
                Err(error) => {
                    report.record_cue_failure();
                    log::warn!("Cue repair failed for '{}': {error:#}", cue.display());
                }
            }
        }

        for track in files.iter().filter(|path| is_audio(path)) {
            if self.cancel.is_cancelled() {
                return Ok(Steps::Cancelled);
            }
            match transcode::apply(self.tools, track, &self.target) {
                Ok(GateOutcome::Transcoded) => report.record_transcoded(),
                Ok(GateOutcome::AlreadyCanonical) => {}
                Err(error) if error.is_interrupted() => {
                    self.cancel.cancel();
                    return Ok(Steps::Cancelled);
                }
                Err(transcode::GateError::Tool(error @ ToolError::Launch { .. })) => {
                    return Err(error.into());
                }
                Err(error) => {
                    report.record_transcode_failure();
                    log::warn!("Leaving '{}' unconverted: {error}", track.display());
                }
            }
        }

        if self.cancel.is_cancelled() {
            return Ok(Steps::Cancelled);
        }
        let before = sizes::measure(dir).map_err(io_error("measure", dir))?.total;

        log::info!("Splitting '{}' with {}", dir.display(), self.tools.splitter);
        match self.tools.split(dir) {
            Ok(()) => {}
            Err(ToolError::Interrupted { program }) => {
                log::warn!("'{program}' was interrupted in '{}'", dir.display());
                self.cancel.cancel();
                return Ok(Steps::Cancelled);
            }
            Err(ToolError::Failed { program, status }) if self.cancel.is_cancelled() => {
                log::warn!(
                    "'{program}' exited with {status} after cancellation in '{}'",
                    dir.display()
                );
                return Ok(Steps::Cancelled);
            }
            Err(ToolError::Failed { program, status }) => {
                report.record_split_failure();
                log::error!(
                    "Error running '{program}' in directory '{}': {status}",
                    dir.display()
                );
                return Ok(Steps::SplitFailed);
            }
            Err(error @ ToolError::Launch { .. }) => return Err(error.into()),
        }

        // Nothing pruned yet; the marker must survive.
        if self.cancel.is_cancelled() {
            return Ok(Steps::Cancelled);
        }

        let pruned = sizes::prune_bloat(dir, before).map_err(io_error("prune", dir))?;
        report.record_pruned(pruned.len());

        Ok(Steps::Done)
    }
}

/// Deletes byproducts of an earlier, unfinished split. Returns how many files
/// were removed.
fn sweep_invalid(dir: &Path) -> Result<usize, ProcessError> {
    let mut removed = 0;
    for path in list_files(dir).map_err(io_error("list", dir))? {
        let invalid = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(is_known_invalid_pattern);
        if invalid {
            fs::remove_file(&path).map_err(io_error("delete", &path))?;
            log::info!(
                "Deleted file '{}' due to invalid naming convention.",
                path.display()
            );
            removed += 1;
        }
    }
    Ok(removed)
}

/// Regular files directly inside `dir`, sorted by path.
fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
