use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{anyhow, Context, Result};
use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::tag::{Accessor, Tag, TagExt};
use regex::Regex;
use walkdir::WalkDir;

use crate::cancel::CancellationToken;
use crate::naming::is_audio;
use crate::report::Report;
use crate::scanner::WalkOutcome;

/// Release folders start with a date such as `2004.05.21` or `1999-07`.
static RELEASE_DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}[.\-_]\d{2}(?:[.\-_]\d{2})?").unwrap());

static DISC_FRAGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[(\[]?\s*\b(?:disc|disk|cd)\s*(\d+)(?:\s*(?:of|/)\s*\d+)?\s*[)\]]?").unwrap()
});

/// Read/write access to the few tag fields the reconciler touches.
pub trait TagStore {
    /// Album title, or `None` when the file carries none.
    fn album(&self, path: &Path) -> Result<Option<String>>;

    fn write_disc(&self, path: &Path, album: &str, disc: u32, total: u32) -> Result<()>;
}

/// Chooses the album name when a release carries several.
pub trait AlbumNameResolver {
    fn resolve(&mut self, dir: &Path, candidates: &[String]) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscFragment {
    pub album: String,
    pub disc: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscGroup {
    pub album: String,
    pub members: Vec<(PathBuf, u32)>,
    pub total: u32,
}

impl DiscGroup {
    pub fn new(album: String, members: Vec<(PathBuf, u32)>) -> Self {
        let total = members.iter().map(|(_, disc)| *disc).max().unwrap_or(0);
        Self {
            album,
            members,
            total,
        }
    }
}

pub fn is_release_dir(name: &str) -> bool {
    RELEASE_DIR_RE.is_match(name)
}

/// Splits `Album (disc 2)` into `Album` and `2`.
pub fn parse_disc_fragment(album: &str) -> Option<DiscFragment> {
    let captures = DISC_FRAGMENT_RE.captures(album)?;
    let whole = captures.get(0)?;
    let disc = captures.get(1)?.as_str().parse().ok()?;

    let stripped = format!("{}{}", &album[..whole.start()], &album[whole.end()..]);
    let normalized = stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(is_separator)
        .to_string();

    if normalized.is_empty() {
        return None;
    }

    Some(DiscFragment {
        album: normalized,
        disc,
    })
}

fn is_separator(c: char) -> bool {
    matches!(c, '-' | ',' | ':') || c.is_whitespace()
}

pub struct LoftyTagStore;

impl TagStore for LoftyTagStore {
    fn album(&self, path: &Path) -> Result<Option<String>> {
        let tagged = lofty::read_from_path(path)
            .with_context(|| format!("failed to read tags from '{}'", path.display()))?;

        let album = tagged
            .primary_tag()
            .or_else(|| tagged.first_tag())
            .and_then(|tag| tag.album().map(|album| album.trim().to_string()))
            .filter(|album| !album.is_empty());

        Ok(album)
    }

    fn write_disc(&self, path: &Path, album: &str, disc: u32, total: u32) -> Result<()> {
        let mut tagged = lofty::read_from_path(path)
            .with_context(|| format!("failed to read tags from '{}'", path.display()))?;

        if tagged.primary_tag().is_none() {
            let tag_type = tagged.primary_tag_type();
            tagged.insert_tag(Tag::new(tag_type));
        }
        let tag = tagged
            .primary_tag_mut()
            .ok_or_else(|| anyhow!("no writable tag in '{}'", path.display()))?;

        tag.set_album(album.to_string());
        tag.set_disk(disc);
        tag.set_disk_total(total);
        tag.save_to_path(path, WriteOptions::default())
            .with_context(|| format!("failed to write tags to '{}'", path.display()))?;

        Ok(())
    }
}

/// Leaves ambiguous releases untouched.
pub struct SkipAmbiguous;

impl AlbumNameResolver for SkipAmbiguous {
    fn resolve(&mut self, dir: &Path, candidates: &[String]) -> Option<String> {
        log::warn!(
            "Multiple album names in '{}': {}; leaving tags unchanged.",
            dir.display(),
            candidates.join(" | ")
        );
        None
    }
}

/// Asks the operator to pick one of the candidates or type a name.
pub struct PromptResolver<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptResolver<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, dir: &Path, candidates: &[String]) -> std::io::Result<String> {
        writeln!(
            self.output,
            "Multiple album names found in '{}':",
            dir.display()
        )?;
        for (index, candidate) in candidates.iter().enumerate() {
            writeln!(self.output, "  {}) {candidate}", index + 1)?;
        }
        write!(
            self.output,
            "Enter a number or an album name (empty to skip): "
        )?;
        self.output.flush()?;

        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> AlbumNameResolver for PromptResolver<R, W> {
    fn resolve(&mut self, dir: &Path, candidates: &[String]) -> Option<String> {
        let answer = match self.ask(dir, candidates) {
            Ok(answer) => answer,
            Err(error) => {
                log::warn!("Could not read album name for '{}': {error}", dir.display());
                return None;
            }
        };

        if answer.is_empty() {
            log::info!("Skipped ambiguous release '{}'", dir.display());
            return None;
        }

        match answer.parse::<usize>() {
            Ok(choice) if (1..=candidates.len()).contains(&choice) => {
                Some(candidates[choice - 1].clone())
            }
            _ => Some(answer),
        }
    }
}

/// Second pass that gives multi-disc releases one album name and consistent
/// disc number / disc total tags.
pub struct Reconciler<'a> {
    store: &'a dyn TagStore,
    resolver: &'a mut dyn AlbumNameResolver,
    cancel: &'a CancellationToken,
    follow_symlinks: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        store: &'a dyn TagStore,
        resolver: &'a mut dyn AlbumNameResolver,
        cancel: &'a CancellationToken,
        follow_symlinks: bool,
    ) -> Self {
        Self {
            store,
            resolver,
            cancel,
            follow_symlinks,
        }
    }

    pub fn run(&mut self, root: &Path, report: &mut Report) -> WalkOutcome {
        let mut walker = WalkDir::new(root)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    report.record_walk_error();
                    log::warn!("Traversal error: {error}");
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            let is_release = entry.file_name().to_str().is_some_and(is_release_dir);
            if !is_release {
                continue;
            }

            if self.cancel.is_cancelled() {
                report.record_interrupted();
                return WalkOutcome::Interrupted;
            }
            self.reconcile_release(entry.path(), report);
            walker.skip_current_dir();
        }

        WalkOutcome::Completed
    }

    fn reconcile_release(&mut self, dir: &Path, report: &mut Report) {
        let mut names = BTreeSet::new();
        let mut members = Vec::new();

        for track in self.tracks(dir, report) {
            match self.store.album(&track) {
                Ok(Some(album)) => {
                    if let Some(fragment) = parse_disc_fragment(&album) {
                        names.insert(fragment.album);
                        members.push((track, fragment.disc));
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    report.record_tag_error();
                    log::warn!("{error:#}");
                }
            }
        }

        if members.is_empty() {
            return;
        }

        let names: Vec<String> = names.into_iter().collect();
        let album = if names.len() == 1 {
            names[0].clone()
        } else {
            match self.resolver.resolve(dir, &names) {
                Some(album) => album,
                None => {
                    report.record_ambiguous();
                    return;
                }
            }
        };

        let group = DiscGroup::new(album, members);
        let mut written = 0;
        for (track, disc) in &group.members {
            match self
                .store
                .write_disc(track, &group.album, *disc, group.total)
            {
                Ok(()) => written += 1,
                Err(error) => {
                    report.record_tag_error();
                    log::warn!("{error:#}");
                }
            }
        }

        log::info!(
            "Tagged {written} files in '{}' as '{}' ({} discs)",
            dir.display(),
            group.album,
            group.total
        );
        report.record_disc_group(written);
    }

    fn tracks(&self, dir: &Path, report: &mut Report) -> Vec<PathBuf> {
        let mut tracks = Vec::new();
        for entry in WalkDir::new(dir)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
        {
            match entry {
                Ok(entry) if entry.file_type().is_file() && is_audio(entry.path()) => {
                    tracks.push(entry.into_path());
                }
                Ok(_) => {}
                Err(error) => {
                    report.record_walk_error();
                    log::warn!("Traversal error: {error}");
                }
            }
        }
        tracks
    }
}
