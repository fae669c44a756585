//! `yt-dlp` subprocess adapter.
//!
//! Probing runs the tool with `--dump-single-json` and deserializes the
//! metadata dump; materializing runs a full download with the format
//! selector for the requested quality and an mp4 merge. Every subprocess
//! failure is mapped to [`FetchrError::FetchFailed`] at this boundary —
//! nothing from the tool propagates as a panic.

use crate::config::Config;
use crate::error::{FetchrError, Result};
use crate::fetcher::{MediaFetcher, MediaMetadata, Quality};
use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

/// Media fetcher backed by the `yt-dlp` command-line tool
#[derive(Clone, Debug)]
pub struct YtDlpFetcher {
    bin: String,
    concurrent_fragments: u32,
    http_chunk_size: u64,
}

impl YtDlpFetcher {
    pub fn new(bin: String, concurrent_fragments: u32, http_chunk_size: u64) -> Self {
        Self {
            bin,
            concurrent_fragments,
            http_chunk_size,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.ytdlp_bin.clone(),
            config.concurrent_fragments,
            config.http_chunk_size,
        )
    }

    fn spawn_error(&self, e: std::io::Error) -> FetchrError {
        FetchrError::FetchFailed(format!("failed to run {}: {}", self.bin, e))
    }

    /// Map a non-zero exit into a fetch error carrying the tool's stderr
    fn check_status(output: &Output) -> Result<()> {
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = stderr.trim();
        Err(FetchrError::FetchFailed(if message.is_empty() {
            format!("fetch tool exited with {}", output.status)
        } else {
            message.to_string()
        }))
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn probe(&self, url: &str) -> Result<MediaMetadata> {
        debug!(url, "probing media metadata");

        let output = Command::new(&self.bin)
            .args(["--dump-single-json", "--no-playlist", "--quiet", "--no-warnings"])
            .arg(url)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        Self::check_status(&output)?;

        serde_json::from_slice(&output.stdout)
            .map_err(|e| FetchrError::FetchFailed(format!("unparseable metadata dump: {e}")))
    }

    async fn materialize(
        &self,
        url: &str,
        quality: Quality,
        output_template: &Path,
    ) -> Result<()> {
        debug!(url, quality = quality.label(), "downloading media");

        let output = Command::new(&self.bin)
            .arg("--format")
            .arg(quality.format_selector())
            .arg("--output")
            .arg(output_template)
            .args(["--merge-output-format", "mp4"])
            .args(["--no-playlist", "--quiet", "--no-warnings"])
            .arg("--concurrent-fragments")
            .arg(self.concurrent_fragments.to_string())
            .arg("--http-chunk-size")
            .arg(self.http_chunk_size.to_string())
            // Copy streams in the merge step instead of re-encoding
            .args(["--postprocessor-args", "-c copy"])
            .arg(url)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        Self::check_status(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    fn output(code: i32, stderr: &str) -> Output {
        Output {
            status: ExitStatus::from_raw(code),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[test]
    fn check_status_passes_success() {
        assert!(YtDlpFetcher::check_status(&output(0, "")).is_ok());
    }

    #[test]
    fn check_status_carries_stderr_message() {
        let err = YtDlpFetcher::check_status(&output(256, "ERROR: unsupported URL\n")).unwrap_err();
        match err {
            FetchrError::FetchFailed(msg) => assert_eq!(msg, "ERROR: unsupported URL"),
            other => panic!("expected FetchFailed, got {other:?}"),
        }
    }

    #[test]
    fn check_status_describes_silent_failures() {
        let err = YtDlpFetcher::check_status(&output(256, "")).unwrap_err();
        match err {
            FetchrError::FetchFailed(msg) => assert!(msg.contains("exited with")),
            other => panic!("expected FetchFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_a_fetch_error() {
        let fetcher = YtDlpFetcher::new("fetchr-test-no-such-binary".to_string(), 10, 10_485_760);
        let err = fetcher.probe("https://media.example/v").await.unwrap_err();
        assert!(matches!(err, FetchrError::FetchFailed(_)));
    }
}
