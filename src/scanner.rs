use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use walkdir::{DirEntry, IntoIter, WalkDir};

use crate::cancel::CancellationToken;
use crate::processor::{DirOutcome, DirectoryProcessor};
use crate::report::Report;

/// What to do when a directory fails with a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the whole traversal.
    Halt,
    /// Log the failure and continue with the next directory.
    SkipDirectory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    Completed,
    Interrupted,
    Aborted,
}

impl WalkOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            WalkOutcome::Completed => 0,
            WalkOutcome::Interrupted => 130,
            WalkOutcome::Aborted => 1,
        }
    }
}

pub struct Scanner {
    root: PathBuf,
    follow_symlinks: bool,
    excluded: Arc<Vec<String>>,
    excluded_paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl Scanner {
    pub fn new(root: &Path, excluded: Vec<String>, follow_symlinks: bool) -> Self {
        let excluded: Vec<String> = excluded.into_iter().map(|name| name.to_lowercase()).collect();
        Self {
            root: root.to_path_buf(),
            follow_symlinks,
            excluded: Arc::new(excluded),
            excluded_paths: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Pre-order walk over directories, sorted by name, without descending
    /// into excluded ones.
    pub fn walk(&self) -> ScannerIter {
        let walkdir = WalkDir::new(&self.root)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name();

        ScannerIter {
            inner: walkdir.into_iter(),
            excluded: Arc::clone(&self.excluded),
            excluded_paths: Arc::clone(&self.excluded_paths),
        }
    }

    pub fn excluded_paths(&self) -> Vec<PathBuf> {
        match self.excluded_paths.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Feeds every directory to `processor` until the tree is exhausted, the
    /// run is cancelled, or a fatal error stops it under [`FailurePolicy::Halt`].
    pub fn run(
        &self,
        processor: &DirectoryProcessor<'_>,
        cancel: &CancellationToken,
        policy: FailurePolicy,
        report: &mut Report,
    ) -> WalkOutcome {
        let outcome = self.drive(processor, cancel, policy, report);

        let excluded = self.excluded_paths();
        for path in &excluded {
            log::info!("Skipped excluded directory '{}'", path.display());
        }
        report.record_excluded(excluded);
        if outcome == WalkOutcome::Interrupted {
            report.record_interrupted();
        }
        outcome
    }

    fn drive(
        &self,
        processor: &DirectoryProcessor<'_>,
        cancel: &CancellationToken,
        policy: FailurePolicy,
        report: &mut Report,
    ) -> WalkOutcome {
        for entry in self.walk() {
            let dir = match entry {
                Ok(dir) => dir,
                Err(error) => {
                    report.record_walk_error();
                    let path = error.path().map(|p| p.display().to_string());
                    match path {
                        Some(path) => log::warn!("Traversal error on '{}': {error}", path),
                        None => log::warn!("Traversal error: {error}"),
                    }
                    continue;
                }
            };

            if cancel.is_cancelled() {
                log::warn!("Cancellation requested; not starting '{}'", dir.display());
                return WalkOutcome::Interrupted;
            }

            report.record_visit();
            match processor.process(&dir, report) {
                Ok(DirOutcome::Cancelled) => return WalkOutcome::Interrupted,
                Ok(outcome) => report.record_outcome(outcome),
                Err(error) => {
                    report.record_fatal();
                    log::error!("Error processing directory '{}': {error:#}", dir.display());
                    if policy == FailurePolicy::Halt {
                        return WalkOutcome::Aborted;
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            WalkOutcome::Interrupted
        } else {
            WalkOutcome::Completed
        }
    }
}

pub struct ScannerIter {
    inner: IntoIter,
    excluded: Arc<Vec<String>>,
    excluded_paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl Iterator for ScannerIter {
    type Item = Result<PathBuf, walkdir::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(entry) = self.inner.next() {
            match entry {
                Ok(entry) => {
                    if !entry.file_type().is_dir() {
                        continue;
                    }
                    if is_excluded(&entry, &self.excluded) {
                        if let Ok(mut paths) = self.excluded_paths.lock() {
                            paths.push(entry.path().to_path_buf());
                        }
                        self.inner.skip_current_dir();
                        continue;
                    }
                    return Some(Ok(entry.into_path()));
                }
                Err(error) => return Some(Err(error)),
            }
        }
        None
    }
}

/// The root is never excluded, whatever its name.
fn is_excluded(entry: &DirEntry, excluded: &[String]) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .map(str::to_lowercase)
        .is_some_and(|name| excluded.iter().any(|candidate| *candidate == name))
}
