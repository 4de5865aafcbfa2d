//! Media fetching through the `yt-dlp` command-line tool

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    fetch::{MediaFetcher, MetadataLookup, TrackMetadata},
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Audio-only format selector: prefer an Opus stream, fall back to best audio.
pub const DEFAULT_FORMAT: &str = "bestaudio[acodec=opus]/bestaudio";

/// `yt-dlp` backed fetcher and metadata lookup.
///
/// Downloads use a fixed output path so the caller controls where the
/// payload lands. Metadata comes from `--get-title --get-duration` without
/// downloading anything.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: PathBuf,
    format: String,
}

impl YtDlpFetcher {
    /// Use `yt-dlp` from `PATH` with the default audio format selector.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
            format: DEFAULT_FORMAT.to_string(),
        }
    }

    /// Use a specific executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Override the `-f` format selector.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    fn download_args(&self, url: &str, destination: &Path) -> Vec<OsString> {
        vec![
            "--quiet".into(),
            "--no-warnings".into(),
            "--no-playlist".into(),
            "--no-progress".into(),
            "-f".into(),
            self.format.clone().into(),
            "-o".into(),
            destination.as_os_str().to_owned(),
            "--".into(),
            url.into(),
        ]
    }

    fn metadata_args(url: &str) -> Vec<OsString> {
        vec![
            "--quiet".into(),
            "--no-warnings".into(),
            "--no-playlist".into(),
            "--get-title".into(),
            "--get-duration".into(),
            "--".into(),
            url.into(),
        ]
    }

    async fn run(&self, args: Vec<OsString>) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    BridgeError::NotAvailable(format!(
                        "{} executable not found",
                        self.program.display()
                    ))
                } else {
                    BridgeError::Io(e)
                }
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(status = %output.status, stderr = %stderr.trim(), "yt-dlp failed");
        Err(classify_failure(&stderr))
    }
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn download(&self, url: &str, destination: &Path) -> Result<()> {
        debug!(url, destination = %destination.display(), "Downloading audio");
        self.run(self.download_args(url, destination)).await?;

        match tokio::fs::metadata(destination).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            Ok(_) => Err(BridgeError::Decode(
                "yt-dlp produced an empty file".to_string(),
            )),
            Err(e) => Err(BridgeError::OperationFailed(format!(
                "yt-dlp reported success but {} is missing: {}",
                destination.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl MetadataLookup for YtDlpFetcher {
    async fn lookup(&self, url: &str) -> Result<TrackMetadata> {
        let stdout = self.run(Self::metadata_args(url)).await?;
        parse_metadata(&stdout)
    }
}

/// Parse `--get-title --get-duration` output: title line, then duration line.
fn parse_metadata(stdout: &str) -> Result<TrackMetadata> {
    let mut lines = stdout.lines().map(str::trim).filter(|l| !l.is_empty());
    let title = lines
        .next()
        .ok_or_else(|| BridgeError::Decode("yt-dlp returned no title".to_string()))?;
    let duration_secs = lines.next().and_then(parse_duration).unwrap_or(0);
    Ok(TrackMetadata::new(title, duration_secs))
}

/// Parse a yt-dlp duration (`ss`, `m:ss` or `h:mm:ss`) into seconds.
pub fn parse_duration(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let mut total = 0u64;
    let mut parts = 0;
    for part in text.split(':') {
        parts += 1;
        if parts > 3 || part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value: u64 = part.parse().ok()?;
        total = total.checked_mul(60)?.checked_add(value)?;
    }
    Some(total)
}

/// Map yt-dlp's stderr to a classified bridge error.
fn classify_failure(stderr: &str) -> BridgeError {
    let lower = stderr.to_ascii_lowercase();
    let message = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("yt-dlp exited with an error")
        .to_string();

    const UNSUPPORTED: &[&str] = &[
        "unsupported url",
        "video unavailable",
        "private video",
        "is not available",
        "sign in to confirm",
        "requested format is not available",
    ];
    const NETWORK: &[&str] = &[
        "unable to download",
        "timed out",
        "connection",
        "name resolution",
        "temporary failure",
        "network is unreachable",
        "http error 5",
    ];
    const DECODE: &[&str] = &["postprocessing", "ffmpeg", "ffprobe", "invalid data", "codec"];

    if UNSUPPORTED.iter().any(|p| lower.contains(p)) {
        BridgeError::Unsupported(message)
    } else if NETWORK.iter().any(|p| lower.contains(p)) {
        BridgeError::Network(message)
    } else if DECODE.iter().any(|p| lower.contains(p)) {
        BridgeError::Decode(message)
    } else {
        BridgeError::OperationFailed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_formats() {
        assert_eq!(parse_duration("45"), Some(45));
        assert_eq!(parse_duration("2:05"), Some(125));
        assert_eq!(parse_duration("1:02:03"), Some(3723));
        assert_eq!(parse_duration(" 0:59 "), Some(59));
    }

    #[test]
    fn rejects_malformed_durations() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("NA"), None);
        assert_eq!(parse_duration("1::2"), None);
        assert_eq!(parse_duration("1:2:3:4"), None);
        assert_eq!(parse_duration("-5"), None);
    }

    #[test]
    fn parses_metadata_output() {
        let metadata = parse_metadata("Song A\n2:05\n").unwrap();
        assert_eq!(metadata, TrackMetadata::new("Song A", 125));

        let live = parse_metadata("Live Stream\n").unwrap();
        assert_eq!(live.duration_secs, 0);

        assert!(parse_metadata("\n\n").is_err());
    }

    #[test]
    fn classifies_failures() {
        assert!(matches!(
            classify_failure("ERROR: [youtube] abc: Video unavailable"),
            BridgeError::Unsupported(_)
        ));
        assert!(matches!(
            classify_failure("ERROR: Unable to download webpage: <urlopen error timed out>"),
            BridgeError::Network(_)
        ));
        assert!(matches!(
            classify_failure("ERROR: Postprocessing: audio conversion failed"),
            BridgeError::Decode(_)
        ));
        assert!(matches!(
            classify_failure("something odd"),
            BridgeError::OperationFailed(_)
        ));
    }

    #[test]
    fn failure_message_is_last_stderr_line() {
        match classify_failure("WARNING: first\nERROR: Video unavailable\n\n") {
            BridgeError::Unsupported(message) => assert_eq!(message, "ERROR: Video unavailable"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn download_args_pin_output_path() {
        let fetcher = YtDlpFetcher::new();
        let args = fetcher.download_args("https://youtu.be/x", Path::new("/cache/k.opus.part"));
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let o = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[o + 1], "/cache/k.opus.part");
        let f = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(args[f + 1], DEFAULT_FORMAT);
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/x"));
    }

    #[tokio::test]
    async fn missing_executable_is_not_available() {
        let fetcher = YtDlpFetcher::new().with_program("/nonexistent/yt-dlp-for-tests");
        let err = fetcher.lookup("https://youtu.be/x").await.unwrap_err();
        assert!(matches!(err, BridgeError::NotAvailable(_)));
    }
}
