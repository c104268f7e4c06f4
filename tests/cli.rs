#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};

use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use tempfile::TempDir;

const MARKER: &str = ".processing";

fn albumnorm(root: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("albumnorm");
    cmd.arg(root)
        .arg("--ffprobe")
        .arg("true")
        .arg("--ffmpeg")
        .arg("true")
        .arg("--skip-reconcile");
    cmd
}

fn album(root: &Path, name: &str) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("Album.flac"), [0_u8; 64]).unwrap();
    fs::write(dir.join("Album.cue"), "TITLE \"Album\"\nFILE \"Album.flac\" WAVE\n").unwrap();
    dir
}

#[test]
fn processes_candidate_directory_and_clears_marker() {
    let temp = TempDir::new().unwrap();
    let dir = album(temp.path(), "Band - Album");

    albumnorm(temp.path())
        .arg("--splitter")
        .arg("true")
        .arg("--summary-json")
        .arg("summary/run.json")
        .assert()
        .success()
        .stderr(contains("Started processing directory").and(contains("Finished processing directory")));

    assert!(!dir.join(MARKER).exists());
    assert!(dir.join("Album.cue.backup").exists());
    assert_eq!(fs::read(dir.join("Album.flac")).unwrap(), vec![0_u8; 64]);

    let summary = fs::read_to_string(temp.path().join("summary/run.json")).expect("summary written");
    let json: serde_json::Value = serde_json::from_str(&summary).expect("valid json");
    assert_eq!(json["completed"], 1);
    assert_eq!(json["visited"], 2);
    assert_eq!(json["cue_converted"], 1);
    assert_eq!(json["interrupted"], false);
}

#[test]
fn failing_splitter_keeps_marker_and_continues() {
    let temp = TempDir::new().unwrap();
    let first = album(temp.path(), "a");
    let second = album(temp.path(), "b");

    albumnorm(temp.path())
        .arg("--splitter")
        .arg("false")
        .assert()
        .success()
        .stderr(contains("Error running"));

    assert!(first.join(MARKER).exists());
    assert!(second.join(MARKER).exists());
}

#[test]
fn resumed_directory_is_swept() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("album");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join(MARKER), b"").unwrap();
    fs::write(dir.join("01 Track.flac"), b"keep").unwrap();
    fs::write(dir.join("(01) [scan].flac"), b"junk").unwrap();
    fs::write(dir.join("03.flac"), b"junk").unwrap();

    albumnorm(temp.path())
        .arg("--splitter")
        .arg("true")
        .assert()
        .success()
        .stderr(contains("Resuming interrupted directory"));

    assert!(dir.join("01 Track.flac").exists());
    assert!(!dir.join("(01) [scan].flac").exists());
    assert!(!dir.join("03.flac").exists());
    assert!(!dir.join(MARKER).exists());
}

#[test]
fn excluded_directories_are_not_touched() {
    let temp = TempDir::new().unwrap();
    let scans = album(temp.path(), "Scans");

    albumnorm(temp.path())
        .arg("--splitter")
        .arg("false")
        .assert()
        .success();

    assert!(!scans.join(MARKER).exists());
    assert!(!scans.join("Album.cue.backup").exists());
}

#[test]
fn missing_splitter_stops_traversal_with_failure() {
    let temp = TempDir::new().unwrap();
    let first = album(temp.path(), "a");
    let second = album(temp.path(), "b");

    albumnorm(temp.path())
        .arg("--splitter")
        .arg("/nonexistent/albumnorm-splitter")
        .assert()
        .code(1)
        .stderr(contains("Error processing directory"));

    assert!(first.join(MARKER).exists());
    assert!(!second.join(MARKER).exists());
}

#[test]
fn keep_going_processes_remaining_directories() {
    let temp = TempDir::new().unwrap();
    let first = album(temp.path(), "a");
    let second = album(temp.path(), "b");

    albumnorm(temp.path())
        .arg("--splitter")
        .arg("/nonexistent/albumnorm-splitter")
        .arg("--keep-going")
        .assert()
        .success();

    assert!(first.join(MARKER).exists());
    assert!(second.join(MARKER).exists());
}

#[test]
fn missing_root_is_rejected() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("missing");

    assert_cmd::cargo::cargo_bin_cmd!("albumnorm")
        .arg(&missing)
        .assert()
        .failure()
        .stderr(contains("is not an existing directory"));
}

#[test]
fn reconcile_pass_ignores_plain_directories() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("notes")).unwrap();
    fs::write(temp.path().join("notes/readme.txt"), b"hello").unwrap();

    assert_cmd::cargo::cargo_bin_cmd!("albumnorm")
        .arg(temp.path())
        .arg("--splitter")
        .arg("true")
        .assert()
        .success()
        .stderr(contains("Reconciling multi-disc releases"));
}
