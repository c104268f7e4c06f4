use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_EXCLUDED_DIRS: &str = "scans,scan,covers,artwork";

/// Command-line options for albumnorm.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Normalize album directories: fix cue encodings, convert to CD format, split images and reconcile disc tags."
)]
pub struct CliArgs {
    /// Root directory of the album tree to process.
    pub root: PathBuf,

    /// Comma-separated directory names to skip along with their contents (case-insensitive).
    #[arg(long, default_value = DEFAULT_EXCLUDED_DIRS)]
    pub exclude: String,

    /// Follow directory symlinks while walking.
    #[arg(long, default_value_t = false)]
    pub follow_symlinks: bool,

    /// Continue with the next directory after an unexpected directory error instead of stopping.
    #[arg(long, default_value_t = false)]
    pub keep_going: bool,

    /// Do not run the multi-disc tag pass after the walk.
    #[arg(long, default_value_t = false)]
    pub skip_reconcile: bool,

    /// Ask on the terminal which album name to use when a release is ambiguous.
    #[arg(long, default_value_t = false)]
    pub interactive: bool,

    /// Write a JSON summary report to the specified file.
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Reduce log verbosity to errors only.
    #[arg(long, default_value_t = false)]
    pub quiet: bool,

    /// Stream inspector program.
    #[arg(long, default_value = "ffprobe")]
    pub ffprobe: PathBuf,

    /// Transcoder program.
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Image splitter program, run inside each album directory.
    #[arg(long, default_value = "split2flac")]
    pub splitter: PathBuf,
}

impl CliArgs {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
