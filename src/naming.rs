use std::path::Path;

/// Extensions treated as audio, compared case-insensitively.
pub const AUDIO_EXTENSIONS: &[&str] = &["flac", "mp3", "ogg", "wav", "aac", "m4a", "wma"];

/// Character positions of the stem that hold a track index in split output
/// such as `(01) [Artist] Title`.
pub const SPLIT_INDEX_POSITIONS: (usize, usize) = (1, 2);

/// Stems shorter than this are never considered valid source files.
pub const MIN_VALID_STEM_CHARS: usize = 3;

pub fn is_audio(path: &Path) -> bool {
    has_extension(path, AUDIO_EXTENSIONS)
}

pub fn is_cue(path: &Path) -> bool {
    has_extension(path, &["cue"])
}

/// Returns true for files that look like pre-existing source material rather
/// than something a previous split produced.
pub fn is_valid_name(path: &Path) -> bool {
    let stem = match path.file_stem().and_then(|stem| stem.to_str()) {
        Some(stem) => stem,
        None => return false,
    };

    let chars: Vec<char> = stem.chars().collect();
    if chars.len() < MIN_VALID_STEM_CHARS {
        return false;
    }

    let (first, second) = SPLIT_INDEX_POSITIONS;
    !(chars[first].is_ascii_digit() && chars[second].is_ascii_digit())
}

/// Matches byproducts of an interrupted or duplicate split: `(DD) [...` and
/// bare `DD.flac`.
pub fn is_known_invalid_pattern(name: &str) -> bool {
    is_bracketed_track(name) || is_bare_track(name)
}

fn is_bracketed_track(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() > 5
        && bytes[0] == b'('
        && bytes[1].is_ascii_digit()
        && bytes[2].is_ascii_digit()
        && bytes[3] == b')'
        && bytes[4] == b' '
        && bytes[5] == b'['
}

fn is_bare_track(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() == 7 && bytes[0].is_ascii_digit() && bytes[1].is_ascii_digit() && &name[2..] == ".flac"
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(value) => value.to_ascii_lowercase(),
        None => return false,
    };

    allowed.iter().any(|candidate| *candidate == ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_audio_extensions_case_insensitively() {
        assert!(is_audio(Path::new("Album.flac")));
        assert!(is_audio(Path::new("Album.FLAC")));
        assert!(is_audio(Path::new("dir/track.M4a")));
        assert!(!is_audio(Path::new("Album.cue")));
        assert!(!is_audio(Path::new("Album.cue.backup")));
        assert!(!is_audio(Path::new(".processing")));
        assert!(!is_audio(Path::new("flac")));
    }

    #[test]
    fn recognizes_cue_sheets() {
        assert!(is_cue(Path::new("Album.cue")));
        assert!(is_cue(Path::new("Album.CUE")));
        assert!(!is_cue(Path::new("Album.cue.backup")));
    }

    #[test]
    fn split_output_names_are_not_valid() {
        assert!(!is_valid_name(Path::new("(01) [Band] Opening.flac")));
        assert!(!is_valid_name(Path::new("101 Dalmatians.flac")));
        assert!(!is_valid_name(Path::new("x12.wav")));
    }

    #[test]
    fn ordinary_names_are_valid() {
        assert!(is_valid_name(Path::new("Album.flac")));
        assert!(is_valid_name(Path::new("01 Track.flac")));
        assert!(is_valid_name(Path::new("CD1.ape.wav")));
        assert!(is_valid_name(Path::new("专辑名称.flac")));
    }

    #[test]
    fn short_stems_are_not_valid() {
        assert!(!is_valid_name(Path::new("01.flac")));
        assert!(!is_valid_name(Path::new("ab.mp3")));
        assert!(is_valid_name(Path::new("abc.mp3")));
    }

    #[test]
    fn detects_known_invalid_patterns() {
        assert!(is_known_invalid_pattern("(01) [scan].flac"));
        assert!(is_known_invalid_pattern("(12) [Band] Title.flac"));
        assert!(is_known_invalid_pattern("03.flac"));

        assert!(!is_known_invalid_pattern("01 Track.flac"));
        assert!(!is_known_invalid_pattern("(01)[scan].flac"));
        assert!(!is_known_invalid_pattern("(1) [scan].flac"));
        assert!(!is_known_invalid_pattern("03.FLAC"));
        assert!(!is_known_invalid_pattern("103.flac"));
        assert!(!is_known_invalid_pattern("03.mp3"));
    }
}
