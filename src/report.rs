use std::path::PathBuf;

use log::{info, warn};
use serde::Serialize;

use crate::processor::DirOutcome;

#[derive(Debug, Default)]
pub struct Report {
    pub visited: usize,
    pub completed: usize,
    pub resumed: usize,
    pub not_candidates: usize,
    pub split_failures: usize,
    pub fatal_errors: usize,
    pub walk_errors: usize,
    pub excluded_paths: Vec<PathBuf>,
    pub cue_converted: usize,
    pub cue_restored: usize,
    pub cue_failures: usize,
    pub transcoded: usize,
    pub transcode_failures: usize,
    pub swept_files: usize,
    pub pruned_files: usize,
    pub discs_reconciled: usize,
    pub discs_ambiguous: usize,
    pub files_retagged: usize,
    pub tag_errors: usize,
    pub interrupted: bool,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub visited: usize,
    pub completed: usize,
    pub resumed: usize,
    pub not_candidates: usize,
    pub split_failures: usize,
    pub fatal_errors: usize,
    pub walk_errors: usize,
    pub excluded_dirs: usize,
    pub excluded_paths: Vec<PathBuf>,
    pub cue_converted: usize,
    pub cue_restored: usize,
    pub cue_failures: usize,
    pub transcoded: usize,
    pub transcode_failures: usize,
    pub swept_files: usize,
    pub pruned_files: usize,
    pub discs_reconciled: usize,
    pub discs_ambiguous: usize,
    pub files_retagged: usize,
    pub tag_errors: usize,
    pub interrupted: bool,
}

impl Report {
    pub fn record_visit(&mut self) {
        self.visited += 1;
    }

    pub fn record_outcome(&mut self, outcome: DirOutcome) {
        match outcome {
            DirOutcome::NotCandidate => self.not_candidates += 1,
            DirOutcome::Completed => self.completed += 1,
            // Counted where the failure or interrupt is observed.
            DirOutcome::SplitFailed | DirOutcome::Cancelled => {}
        }
    }

    pub fn record_resume(&mut self) {
        self.resumed += 1;
    }

    pub fn record_split_failure(&mut self) {
        self.split_failures += 1;
    }

    pub fn record_fatal(&mut self) {
        self.fatal_errors += 1;
    }

    pub fn record_walk_error(&mut self) {
        self.walk_errors += 1;
    }

    pub fn record_excluded(&mut self, paths: Vec<PathBuf>) {
        self.excluded_paths.extend(paths);
    }

    pub fn record_cue_converted(&mut self) {
        self.cue_converted += 1;
    }

    pub fn record_cue_restored(&mut self) {
        self.cue_restored += 1;
    }

    pub fn record_cue_failure(&mut self) {
        self.cue_failures += 1;
    }

    pub fn record_transcoded(&mut self) {
        self.transcoded += 1;
    }

    pub fn record_transcode_failure(&mut self) {
        self.transcode_failures += 1;
    }

    pub fn record_swept(&mut self, count: usize) {
        self.swept_files += count;
    }

    pub fn record_pruned(&mut self, count: usize) {
        self.pruned_files += count;
    }

    pub fn record_disc_group(&mut self, retagged: usize) {
        self.discs_reconciled += 1;
        self.files_retagged += retagged;
    }

    pub fn record_ambiguous(&mut self) {
        self.discs_ambiguous += 1;
    }

    pub fn record_tag_error(&mut self) {
        self.tag_errors += 1;
    }

    pub fn record_interrupted(&mut self) {
        self.interrupted = true;
    }

    pub fn summary(&self) -> Summary {
        Summary {
            visited: self.visited,
            completed: self.completed,
            resumed: self.resumed,
            not_candidates: self.not_candidates,
            split_failures: self.split_failures,
            fatal_errors: self.fatal_errors,
            walk_errors: self.walk_errors,
            excluded_dirs: self.excluded_paths.len(),
            excluded_paths: self.excluded_paths.clone(),
            cue_converted: self.cue_converted,
            cue_restored: self.cue_restored,
            cue_failures: self.cue_failures,
            transcoded: self.transcoded,
            transcode_failures: self.transcode_failures,
            swept_files: self.swept_files,
            pruned_files: self.pruned_files,
            discs_reconciled: self.discs_reconciled,
            discs_ambiguous: self.discs_ambiguous,
            files_retagged: self.files_retagged,
            tag_errors: self.tag_errors,
            interrupted: self.interrupted,
        }
    }

    pub fn emit_summary(&self) {
        info!(
            "Visited {visited} directories -- completed {completed}, resumed {resumed}, not candidates {skipped}, excluded {excluded}",
            visited = self.visited,
            completed = self.completed,
            resumed = self.resumed,
            skipped = self.not_candidates,
            excluded = self.excluded_paths.len(),
        );
        info!(
            "Cue sheets converted {converted}, restored {restored}; tracks transcoded {transcoded}; files swept {swept}, pruned {pruned}",
            converted = self.cue_converted,
            restored = self.cue_restored,
            transcoded = self.transcoded,
            swept = self.swept_files,
            pruned = self.pruned_files,
        );

        if self.discs_reconciled > 0 || self.discs_ambiguous > 0 {
            info!(
                "Reconciled {groups} multi-disc releases ({files} files retagged), {ambiguous} left ambiguous",
                groups = self.discs_reconciled,
                files = self.files_retagged,
                ambiguous = self.discs_ambiguous,
            );
        }

        if self.split_failures > 0 || self.fatal_errors > 0 {
            warn!(
                "Encountered {split} splitter failures and {fatal} directory errors; affected directories stay marked.",
                split = self.split_failures,
                fatal = self.fatal_errors,
            );
        }

        if self.walk_errors > 0
            || self.cue_failures > 0
            || self.transcode_failures > 0
            || self.tag_errors > 0
        {
            warn!(
                "Encountered {walk} traversal errors, {cue} cue repair failures, {transcode} transcode failures and {tags} tag errors.",
                walk = self.walk_errors,
                cue = self.cue_failures,
                transcode = self.transcode_failures,
                tags = self.tag_errors,
            );
        }

        if self.interrupted {
            warn!("Run was interrupted; marked directories resume on the next run.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_reflects_collected_counts() {
        let mut report = Report::default();
        report.record_visit();
        report.record_visit();
        report.record_visit();
        report.record_outcome(DirOutcome::Completed);
        report.record_outcome(DirOutcome::NotCandidate);
        report.record_outcome(DirOutcome::SplitFailed);
        report.record_split_failure();
        report.record_resume();
        report.record_swept(2);
        report.record_pruned(1);
        report.record_cue_converted();
        report.record_cue_restored();
        report.record_transcoded();
        report.record_walk_error();
        report.record_disc_group(3);
        report.record_ambiguous();
        report.record_tag_error();
        report.record_excluded(vec![PathBuf::from("scans")]);

        let summary = report.summary();

        assert_eq!(summary.visited, 3);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.not_candidates, 1);
        assert_eq!(summary.split_failures, 1);
        assert_eq!(summary.resumed, 1);
        assert_eq!(summary.swept_files, 2);
        assert_eq!(summary.pruned_files, 1);
        assert_eq!(summary.cue_converted, 1);
        assert_eq!(summary.cue_restored, 1);
        assert_eq!(summary.transcoded, 1);
        assert_eq!(summary.walk_errors, 1);
        assert_eq!(summary.discs_reconciled, 1);
        assert_eq!(summary.files_retagged, 3);
        assert_eq!(summary.discs_ambiguous, 1);
        assert_eq!(summary.tag_errors, 1);
        assert_eq!(summary.excluded_dirs, 1);
        assert_eq!(summary.excluded_paths, vec![PathBuf::from("scans")]);
        assert!(!summary.interrupted);
    }

    #[test]
    fn summary_serializes_interrupt_flag() {
        let mut report = Report::default();
        report.record_interrupted();

        let json = serde_json::to_value(report.summary()).unwrap();

        assert_eq!(json["interrupted"], true);
        assert_eq!(json["completed"], 0);
    }
}
