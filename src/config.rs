use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::cli::{CliArgs, DEFAULT_EXCLUDED_DIRS};
use crate::scanner::FailurePolicy;
use crate::tools::{ToolCommand, Toolchain};

#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub excluded_dirs: Vec<String>,
    pub follow_symlinks: bool,
    pub failure_policy: FailurePolicy,
    pub reconcile: bool,
    pub interactive: bool,
    pub summary_json: Option<PathBuf>,
    pub quiet: bool,
    pub tools: Toolchain,
}

impl Config {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let root = normalize_root(&args.root)?;
        let summary_json = args.summary_json.map(|path| make_absolute(&root, path));
        let excluded_dirs = parse_excluded(&args.exclude);
        let failure_policy = if args.keep_going {
            FailurePolicy::SkipDirectory
        } else {
            FailurePolicy::Halt
        };

        Ok(Self {
            root,
            excluded_dirs,
            follow_symlinks: args.follow_symlinks,
            failure_policy,
            reconcile: !args.skip_reconcile,
            interactive: args.interactive,
            summary_json,
            quiet: args.quiet,
            tools: Toolchain {
                probe: ToolCommand::new(args.ffprobe),
                transcoder: ToolCommand::new(args.ffmpeg),
                splitter: ToolCommand::new(args.splitter),
            },
        })
    }
}

fn normalize_root(root: &Path) -> Result<PathBuf> {
    let resolved = absolutize(root)?;
    ensure_directory(&resolved)?;
    Ok(resolved)
}

fn make_absolute(root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let cwd = std::env::current_dir().context("could not resolve current working directory")?;
        Ok(cwd.join(path))
    }
}

fn ensure_directory(path: &Path) -> Result<()> {
    anyhow::ensure!(
        path.is_dir(),
        "The provided root path '{}' is not an existing directory.",
        path.display()
    );
    Ok(())
}

fn parse_excluded(raw: &str) -> Vec<String> {
    let names: Vec<String> = split_names(raw);
    if names.is_empty() {
        split_names(DEFAULT_EXCLUDED_DIRS)
    } else {
        names
    }
}

fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_lowercase)
        .collect()
}
