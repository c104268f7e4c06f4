use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use encoding::label::encoding_from_whatwg_label;
use encoding::{DecoderTrap, EncodingRef};

/// Codepage every GB-family detection is decoded with.
pub const CHINESE_CODEPAGE: &str = "gb18030";

const GB_FAMILY: &[&str] = &["gb2312", "gbk", "x-gbk", "gb18030", "euc-cn", "hz-gb-2312", "cp936"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    /// Rewritten as UTF-8; the original bytes stay in the backup file.
    Converted { from: String },
    /// Original restored from backup.
    Restored(RestoreReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreReason {
    Undetected,
    UnknownLabel(String),
    DecodeFailed(String),
}

pub fn backup_path(cue: &Path) -> PathBuf {
    let mut name = cue.as_os_str().to_os_string();
    name.push(".backup");
    PathBuf::from(name)
}

/// Re-encodes one cue sheet to UTF-8, keeping a `.backup` of the original.
pub fn repair_cue(cue: &Path) -> Result<RepairOutcome> {
    let backup = backup_path(cue);
    fs::rename(cue, &backup).with_context(|| {
        format!(
            "failed to move '{}' to '{}'",
            cue.display(),
            backup.display()
        )
    })?;

    match convert_from_backup(cue, &backup) {
        Ok(RepairOutcome::Converted { from }) => Ok(RepairOutcome::Converted { from }),
        Ok(RepairOutcome::Restored(reason)) => {
            restore(cue, &backup)?;
            Ok(RepairOutcome::Restored(reason))
        }
        Err(error) => {
            if let Err(restore_error) = restore(cue, &backup) {
                log::error!("{restore_error:#}");
            }
            Err(error)
        }
    }
}

fn convert_from_backup(cue: &Path, backup: &Path) -> Result<RepairOutcome> {
    let raw = fs::read(backup)
        .with_context(|| format!("failed to read cue backup '{}'", backup.display()))?;

    let (charset, _confidence, _language) = chardet::detect(&raw);
    let label = match resolve_label(&charset) {
        Some(label) => label,
        None => {
            log::warn!(
                "Encoding detection failed for '{}'; restoring backup.",
                cue.display()
            );
            return Ok(RepairOutcome::Restored(RestoreReason::Undetected));
        }
    };
    log::info!("Detected encoding {label} for '{}'", cue.display());

    let text = match decode(&raw, &label) {
        Ok(text) => text,
        Err(reason) => {
            log::error!("Conversion failed for '{}': {reason:?}", cue.display());
            return Ok(RepairOutcome::Restored(reason));
        }
    };

    fs::write(cue, text.as_bytes())
        .with_context(|| format!("failed to write UTF-8 cue sheet '{}'", cue.display()))?;
    log::info!("Converted '{}' from {label} to UTF-8.", cue.display());

    Ok(RepairOutcome::Converted { from: label })
}

fn restore(cue: &Path, backup: &Path) -> Result<()> {
    fs::rename(backup, cue).with_context(|| {
        format!(
            "failed to restore '{}' from '{}'",
            cue.display(),
            backup.display()
        )
    })
}

/// Maps a detector charset name to a decoding label, folding every GB-family
/// name onto [`CHINESE_CODEPAGE`].
pub fn resolve_label(charset: &str) -> Option<String> {
    let trimmed = charset.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lowered = trimmed.to_ascii_lowercase();
    if GB_FAMILY.contains(&lowered.as_str()) {
        return Some(CHINESE_CODEPAGE.to_string());
    }

    let mapped = chardet::charset2encoding(&trimmed.to_string()).to_ascii_lowercase();
    if mapped.is_empty() {
        Some(lowered)
    } else {
        Some(mapped)
    }
}

/// Strictly decodes `raw` with the encoding named by `label`.
pub fn decode(raw: &[u8], label: &str) -> std::result::Result<String, RestoreReason> {
    let codec: EncodingRef = encoding_from_whatwg_label(label)
        .ok_or_else(|| RestoreReason::UnknownLabel(label.to_string()))?;

    codec
        .decode(raw, DecoderTrap::Strict)
        .map_err(|cause| RestoreReason::DecodeFailed(cause.into_owned()))
}
