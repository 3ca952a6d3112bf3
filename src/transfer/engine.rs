//! Resumable transfer engine.
//!
//! Implements the transfer algorithm: short-circuit when the destination is
//! already complete, resume from the partial file's byte offset, probe the
//! source for its authoritative size and resolved URL, stream the ranged
//! response into the partial file, then verify the size and finalize.
//!
//! The engine performs exactly one attempt per call and never loops; retry
//! is the caller's job via [`super::RetryPolicy`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use super::client::SessionClient;
use super::progress::ProgressSink;
use crate::error::Error;

/// Attempts for the subtitle format selection POST.
pub const SUBTITLE_FORMAT_ATTEMPTS: u32 = 3;

/// Server-side transcript format requested before subtitle downloads.
const SUBTITLE_FORMAT: &str = "srt";

/// What kind of file a transfer task fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// A lecture video.
    Video,
    /// A subtitle/transcript file.
    Subtitle,
}

impl TransferKind {
    /// Returns the file extension for this kind.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Video => "mp4",
            Self::Subtitle => "srt",
        }
    }
}

/// One file to fetch. Ephemeral - created per download attempt, not persisted.
#[derive(Debug, Clone)]
pub struct TransferTask {
    /// Source URL.
    pub url: String,
    /// Final destination path.
    pub destination: PathBuf,
    /// What kind of file this is.
    pub kind: TransferKind,
    /// Human-readable name for progress and log lines.
    pub display_name: String,
}

/// Result of one transfer attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The destination already exists; no network call was made.
    AlreadyComplete,
    /// The file was completed and renamed into place.
    Success {
        /// Final size in bytes.
        bytes: u64,
    },
    /// The stream ended before the file reached the expected size. The
    /// partial file is kept; a later attempt resumes from its new offset.
    Incomplete {
        /// Expected size in bytes.
        expected: u64,
        /// Size reached in bytes.
        actual: u64,
    },
    /// The partial file exceeded the server-reported size (stale or
    /// mismatched content). The partial file was deleted, so the next
    /// attempt starts from offset 0.
    Corrupt {
        /// Expected size in bytes.
        expected: u64,
        /// Size the partial file had reached.
        actual: u64,
    },
}

/// Fetches a resource by URL into a local file with byte-range resumption.
#[derive(Debug, Clone)]
pub struct ResumableTransfer {
    client: SessionClient,
}

impl ResumableTransfer {
    /// Creates an engine over the given session client.
    #[must_use]
    pub fn new(client: SessionClient) -> Self {
        Self { client }
    }

    /// Transfers `task.url` into `task.destination`.
    ///
    /// Safe to re-invoke across runs: a finished destination short-circuits
    /// to [`TransferOutcome::AlreadyComplete`] with zero network calls, and
    /// an interrupted run leaves a `.part` file whose size becomes the
    /// resume offset of the next attempt.
    ///
    /// # Errors
    ///
    /// Returns a request error when the probe or the ranged fetch fails, or
    /// [`Error::Io`] when the partial file cannot be written. Verification
    /// failures are values ([`TransferOutcome::Incomplete`] /
    /// [`TransferOutcome::Corrupt`]), not errors.
    pub async fn transfer(
        &self,
        task: &TransferTask,
        progress: &dyn ProgressSink,
    ) -> Result<TransferOutcome, Error> {
        if fs::metadata(&task.destination).await.is_ok() {
            debug!(path = %task.destination.display(), "already downloaded, skipping");
            return Ok(TransferOutcome::AlreadyComplete);
        }

        let partial = partial_path(&task.destination);
        let already_have = match fs::metadata(&partial).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };

        let probe = self.client.probe(&task.url).await?;

        // The partial may already cover the whole resource (crash between
        // stream completion and rename), or exceed it (server content
        // changed). Settle both before issuing a doomed ranged fetch.
        if let Some(total) = probe.total_size {
            if already_have == total && total > 0 {
                finalize(&partial, &task.destination).await?;
                info!(path = %task.destination.display(), bytes = total, "partial was already complete");
                return Ok(TransferOutcome::Success { bytes: total });
            }
            if already_have > total {
                fs::remove_file(&partial)
                    .await
                    .map_err(|e| Error::io(partial.clone(), e))?;
                warn!(
                    path = %partial.display(),
                    expected = total,
                    actual = already_have,
                    "partial file larger than source, deleted"
                );
                return Ok(TransferOutcome::Corrupt {
                    expected: total,
                    actual: already_have,
                });
            }
        }

        if let Some(parent) = task.destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent.to_path_buf(), e))?;
        }

        debug!(
            url = %task.url,
            resolved = %probe.final_url,
            offset = already_have,
            "starting ranged fetch"
        );
        progress.begin(&task.display_name, already_have, probe.total_size);

        let response = match self.client.fetch_from(&probe.final_url, already_have).await {
            Ok(response) => response,
            Err(e) => {
                progress.finish();
                return Err(e);
            }
        };

        let stream_result = stream_to_partial(response, &partial, &task.url, progress).await;
        progress.finish();
        stream_result?;

        let actual = fs::metadata(&partial)
            .await
            .map_err(|e| Error::io(partial.clone(), e))?
            .len();

        match probe.total_size {
            None => {
                warn!(
                    url = %task.url,
                    bytes = actual,
                    "source reported no content length, finalizing unverified"
                );
                finalize(&partial, &task.destination).await?;
                Ok(TransferOutcome::Success { bytes: actual })
            }
            Some(total) if actual == total => {
                finalize(&partial, &task.destination).await?;
                info!(path = %task.destination.display(), bytes = total, "transfer complete");
                Ok(TransferOutcome::Success { bytes: total })
            }
            Some(total) if actual > total => {
                fs::remove_file(&partial)
                    .await
                    .map_err(|e| Error::io(partial.clone(), e))?;
                warn!(
                    path = %partial.display(),
                    expected = total,
                    actual,
                    "partial file overshot source size, deleted"
                );
                Ok(TransferOutcome::Corrupt {
                    expected: total,
                    actual,
                })
            }
            Some(total) => {
                debug!(
                    path = %partial.display(),
                    expected = total,
                    actual,
                    "stream ended early, partial kept for resume"
                );
                Ok(TransferOutcome::Incomplete {
                    expected: total,
                    actual,
                })
            }
        }
    }

    /// Sets the server-side transcript format before a subtitle transfer.
    ///
    /// Subtitle URLs served through the platform's transcript handler need a
    /// state-changing POST choosing the download format first; without it
    /// the handler serves whatever format the account last used. Direct
    /// CDN-style URLs have no such handler and skip this entirely.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SubtitleFormat`] when all attempts fail; the caller
    /// must abort the subtitle transfer.
    pub async fn select_subtitle_format(&self, subtitle_url: &str) -> Result<(), Error> {
        let Some(endpoint) = save_state_endpoint(subtitle_url) else {
            return Ok(());
        };

        for attempt in 1..=SUBTITLE_FORMAT_ATTEMPTS {
            match self
                .client
                .post_form(&endpoint, &[("transcript_download_format", SUBTITLE_FORMAT)])
                .await
            {
                Ok(()) => {
                    debug!(endpoint = %endpoint, attempt, "subtitle format selected");
                    return Ok(());
                }
                Err(e) if attempt < SUBTITLE_FORMAT_ATTEMPTS => {
                    warn!(
                        endpoint = %endpoint,
                        attempt,
                        error = %e,
                        "subtitle format selection failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(1 << (attempt - 1))).await;
                }
                Err(e) => {
                    warn!(endpoint = %endpoint, attempt, error = %e, "subtitle format selection failed");
                }
            }
        }

        Err(Error::SubtitleFormat {
            url: endpoint,
            attempts: SUBTITLE_FORMAT_ATTEMPTS,
        })
    }
}

/// Returns the in-progress sibling of a destination path (`.part` appended).
#[must_use]
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Derives the format selection endpoint from a transcript download URL.
///
/// Returns `None` for URLs that are not served through the transcript
/// handler (CDN-style direct downloads).
pub(crate) fn save_state_endpoint(subtitle_url: &str) -> Option<String> {
    if !subtitle_url.contains("/transcript/download") {
        return None;
    }
    Some(subtitle_url.replacen("/transcript/download", "/xmodule_handler/save_user_state", 1))
}

/// Streams the response body into the partial file, appending.
async fn stream_to_partial(
    response: reqwest::Response,
    partial: &Path,
    url: &str,
    progress: &dyn ProgressSink,
) -> Result<u64, Error> {
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(partial)
        .await
        .map_err(|e| Error::io(partial.to_path_buf(), e))?;

    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| Error::request(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| Error::io(partial.to_path_buf(), e))?;
        bytes_written += chunk.len() as u64;
        progress.advance(chunk.len() as u64);
    }

    writer
        .flush()
        .await
        .map_err(|e| Error::io(partial.to_path_buf(), e))?;

    Ok(bytes_written)
}

/// Renames a complete partial file to its final destination.
async fn finalize(partial: &Path, destination: &Path) -> Result<(), Error> {
    fs::rename(partial, destination)
        .await
        .map_err(|e| Error::io(destination.to_path_buf(), e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path_appends_part_suffix() {
        assert_eq!(
            partial_path(Path::new("/out/Week 1/Welcome - Intro.mp4")),
            PathBuf::from("/out/Week 1/Welcome - Intro.mp4.part")
        );
    }

    #[test]
    fn test_save_state_endpoint_for_transcript_handler_url() {
        let url = "https://courses.example.org/courses/course-v1:Org+CS101+2026/xblock/block-v1:Org+CS101+2026+type@video+block@abc/handler/transcript/download";
        let endpoint = save_state_endpoint(url).unwrap();
        assert!(
            endpoint.ends_with("/handler/xmodule_handler/save_user_state"),
            "got: {endpoint}"
        );
        assert!(!endpoint.contains("/transcript/download"), "got: {endpoint}");
    }

    #[test]
    fn test_save_state_endpoint_skips_direct_download_urls() {
        let url = "https://cdn.example.com/p/100/playManifest/entryId/abc/format/download";
        assert_eq!(save_state_endpoint(url), None);
    }

    #[test]
    fn test_transfer_kind_extensions() {
        assert_eq!(TransferKind::Video.extension(), "mp4");
        assert_eq!(TransferKind::Subtitle.extension(), "srt");
    }
}
