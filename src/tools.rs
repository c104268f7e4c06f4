use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;

/// Output naming template handed to the splitter.
pub const SPLIT_TEMPLATE: &str = "(@track) [@performer] @title.@ext";

/// Exit code shells report for a child killed by SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[cfg(unix)]
const SIGINT: i32 = 2;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("'{program}' was interrupted")]
    Interrupted { program: String },

    #[error("'{program}' exited unsuccessfully ({status})")]
    Failed { program: String, status: ExitStatus },

    #[error("failed to launch '{program}'")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ToolError::Interrupted { .. })
    }
}

/// A program plus any leading arguments placed before the per-call ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program.to_string_lossy())
    }
}

/// Target parameters of the canonical PCM format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFormat {
    pub sample_rate: u32,
    pub channels: u8,
    pub sample_fmt: &'static str,
}

impl TargetFormat {
    /// 16-bit 44.1 kHz stereo.
    pub const CD: TargetFormat = TargetFormat {
        sample_rate: 44_100,
        channels: 2,
        sample_fmt: "s16",
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub sample_rate: u32,
    pub bit_rate: Option<u64>,
}

/// The external programs a run depends on.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub probe: ToolCommand,
    pub transcoder: ToolCommand,
    pub splitter: ToolCommand,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            probe: ToolCommand::new("ffprobe"),
            transcoder: ToolCommand::new("ffmpeg"),
            splitter: ToolCommand::new("split2flac"),
        }
    }
}

impl Toolchain {
    /// Reads sample and bit rate of the first audio stream. `Ok(None)` means
    /// the output could not be parsed.
    pub fn probe(&self, path: &Path) -> Result<Option<StreamInfo>, ToolError> {
        let output = self
            .probe
            .command()
            .args(["-v", "error", "-select_streams", "a:0", "-show_entries"])
            .arg("stream=sample_rate,bit_rate")
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(path)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|source| launch_error(&self.probe, source))?;

        if was_interrupted(&output.status) {
            return Err(ToolError::Interrupted {
                program: self.probe.name(),
            });
        }

        Ok(parse_probe_output(&String::from_utf8_lossy(&output.stdout)))
    }

    pub fn transcode(
        &self,
        input: &Path,
        output: &Path,
        target: &TargetFormat,
    ) -> Result<(), ToolError> {
        let status = self
            .transcoder
            .command()
            .args(["-nostdin", "-v", "error", "-y", "-i"])
            .arg(input)
            .arg("-ar")
            .arg(target.sample_rate.to_string())
            .arg("-ac")
            .arg(target.channels.to_string())
            .args(["-sample_fmt", target.sample_fmt])
            .arg(output)
            .stdin(Stdio::null())
            .status()
            .map_err(|source| launch_error(&self.transcoder, source))?;

        check_status(&self.transcoder, status)
    }

    /// Runs the splitter with `dir` as its working directory.
    pub fn split(&self, dir: &Path) -> Result<(), ToolError> {
        let status = self
            .splitter
            .command()
            .args(["./", "-of", SPLIT_TEMPLATE, "-F"])
            .current_dir(dir)
            .status()
            .map_err(|source| launch_error(&self.splitter, source))?;

        check_status(&self.splitter, status)
    }
}

/// Parses `ffprobe` output of the form `<sample_rate>\n<bit_rate>`.
pub fn parse_probe_output(stdout: &str) -> Option<StreamInfo> {
    let fields: Vec<&str> = stdout.split_whitespace().collect();
    let [sample_rate, bit_rate] = fields.as_slice() else {
        return None;
    };

    Some(StreamInfo {
        sample_rate: sample_rate.parse().ok()?,
        bit_rate: bit_rate.parse().ok(),
    })
}

pub fn was_interrupted(status: &ExitStatus) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if status.signal() == Some(SIGINT) {
            return true;
        }
    }
    status.code() == Some(INTERRUPTED_EXIT_CODE)
}

fn check_status(tool: &ToolCommand, status: ExitStatus) -> Result<(), ToolError> {
    if status.success() {
        Ok(())
    } else if was_interrupted(&status) {
        Err(ToolError::Interrupted {
            program: tool.name(),
        })
    } else {
        Err(ToolError::Failed {
            program: tool.name(),
            status,
        })
    }
}

fn launch_error(tool: &ToolCommand, source: std::io::Error) -> ToolError {
    ToolError::Launch {
        program: tool.name(),
        source,
    }
}

/// Shell-script stand-ins for the external tools. Scripts run through `sh`
/// so tests never execute a file that was just written.
#[cfg(all(test, unix))]
pub(crate) mod fixtures {
    use super::*;

    use std::fs;
    use std::path::PathBuf;

    pub const PROBE_CD: &str = "echo 44100\necho 1411200\n";

    /// Writes a fixed payload to its last argument.
    pub const TRANSCODE_STUB: &str =
        "while [ $# -gt 1 ]; do shift; done\nprintf 'converted' > \"$1\"\n";

    pub fn script(dir: &Path, name: &str, body: &str) -> ToolCommand {
        let path: PathBuf = dir.join(name);
        fs::write(&path, body).unwrap();
        ToolCommand {
            program: "sh".into(),
            args: vec![path.into_os_string()],
        }
    }

    pub fn toolchain(dir: &Path, probe: &str, transcode: &str, split: &str) -> Toolchain {
        Toolchain {
            probe: script(dir, "probe.sh", probe),
            transcoder: script(dir, "transcode.sh", transcode),
            splitter: script(dir, "split.sh", split),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sample_and_bit_rate() {
        let info = parse_probe_output("48000\n2304000\n").unwrap();
        assert_eq!(info.sample_rate, 48_000);
        assert_eq!(info.bit_rate, Some(2_304_000));
    }

    #[test]
    fn missing_bit_rate_value_is_tolerated() {
        let info = parse_probe_output("44100\nN/A\n").unwrap();
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.bit_rate, None);
    }

    #[test]
    fn unparsable_output_yields_none() {
        assert_eq!(parse_probe_output(""), None);
        assert_eq!(parse_probe_output("44100\n"), None);
        assert_eq!(parse_probe_output("N/A\n1411200\n"), None);
        assert_eq!(parse_probe_output("44100\n1411200\nextra\n"), None);
    }

    #[cfg(unix)]
    mod process {
        use super::super::fixtures::*;
        use super::super::*;

        use tempfile::TempDir;

        #[test]
        fn probe_reads_script_output() {
            let temp = TempDir::new().unwrap();
            let tools = toolchain(temp.path(), "echo 96000\necho N/A\n", "", "");

            let info = tools.probe(Path::new("whatever.flac")).unwrap().unwrap();
            assert_eq!(info.sample_rate, 96_000);
            assert_eq!(info.bit_rate, None);
        }

        #[test]
        fn splitter_runs_in_directory() {
            let temp = TempDir::new().unwrap();
            let album = temp.path().join("album");
            std::fs::create_dir(&album).unwrap();
            let tools = toolchain(temp.path(), "", "", "printf '%s' \"$3\" > template.txt\n");

            tools.split(&album).unwrap();

            let written = std::fs::read_to_string(album.join("template.txt")).unwrap();
            assert_eq!(written, SPLIT_TEMPLATE);
        }

        #[test]
        fn classifies_failures() {
            let temp = TempDir::new().unwrap();
            let tools = toolchain(temp.path(), "", "", "exit 3\n");

            let error = tools.split(temp.path()).unwrap_err();
            assert!(matches!(error, ToolError::Failed { .. }));
            assert!(!error.is_interrupted());
        }

        #[test]
        fn classifies_sigint_as_interrupted() {
            let temp = TempDir::new().unwrap();
            let tools = toolchain(temp.path(), "", "", "kill -INT $$\n");

            let error = tools.split(temp.path()).unwrap_err();
            assert!(error.is_interrupted(), "unexpected error: {error}");
        }

        #[test]
        fn exit_code_130_counts_as_interrupted() {
            let temp = TempDir::new().unwrap();
            let tools = toolchain(temp.path(), "", "", "exit 130\n");

            assert!(tools.split(temp.path()).unwrap_err().is_interrupted());
        }

        #[test]
        fn missing_program_is_a_launch_error() {
            let tools = Toolchain {
                splitter: ToolCommand::new("/nonexistent/albumnorm-splitter"),
                ..Toolchain::default()
            };

            let error = tools.split(Path::new(".")).unwrap_err();
            assert!(matches!(error, ToolError::Launch { .. }));
        }
    }
}
