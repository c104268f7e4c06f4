use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::tools::{StreamInfo, TargetFormat, ToolError, Toolchain};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    AlreadyCanonical,
    Transcoded,
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("transcoder produced no output at '{0}'")]
    MissingOutput(PathBuf),

    #[error("failed to replace '{path}' with transcoded output")]
    Replace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GateError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, GateError::Tool(error) if error.is_interrupted())
    }
}

/// Sibling path the transcoder writes to: `Album.flac` -> `Album.tmp.flac`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_stem().unwrap_or_default().to_os_string();
    name.push(".tmp");
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}

/// Unparsable probe output counts as non-canonical.
pub fn needs_conversion(info: Option<StreamInfo>, target: &TargetFormat) -> bool {
    match info {
        Some(info) => info.sample_rate != target.sample_rate,
        None => true,
    }
}

/// Converts `path` in place when it is not already at the target rate.
pub fn apply(
    tools: &Toolchain,
    path: &Path,
    target: &TargetFormat,
) -> Result<GateOutcome, GateError> {
    let info = tools.probe(path)?;
    match info {
        Some(StreamInfo {
            sample_rate,
            bit_rate,
        }) => log::debug!(
            "'{}' reports {sample_rate} Hz at {} bit/s",
            path.display(),
            bit_rate.map_or_else(|| "unknown".to_string(), |rate| rate.to_string())
        ),
        None => log::warn!(
            "Unable to determine audio format for '{}'. Assuming conversion is needed.",
            path.display()
        ),
    }
    if !needs_conversion(info, target) {
        return Ok(GateOutcome::AlreadyCanonical);
    }

    let temp = temp_path_for(path);
    if let Err(error) = tools.transcode(path, &temp, target) {
        discard(&temp);
        return Err(error.into());
    }
    if !temp.exists() {
        return Err(GateError::MissingOutput(temp));
    }

    if let Err(source) = fs::rename(&temp, path) {
        discard(&temp);
        return Err(GateError::Replace {
            path: path.to_path_buf(),
            source,
        });
    }

    log::info!(
        "Converted '{}' to {} Hz.",
        path.display(),
        target.sample_rate
    );
    Ok(GateOutcome::Transcoded)
}

fn discard(temp: &Path) {
    if temp.exists() {
        if let Err(error) = fs::remove_file(temp) {
            log::warn!(
                "Failed to remove partial output '{}': {error}",
                temp.display()
            );
        }
    }
}
