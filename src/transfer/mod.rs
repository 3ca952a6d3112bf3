//! Resumable HTTP transfers with streaming support.
//!
//! This module fetches discovered media into local files, resuming
//! interrupted downloads from a `.part` file's byte offset and verifying the
//! final size against the server's Content-Length.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large files)
//! - Byte-range resumption with post-transfer size verification
//! - Idempotent re-invocation: finished files are skipped without a request
//! - Subtitle format preselection for transcript-handler URLs
//! - Retry policy with exponential backoff and jitter for the caller

mod client;
mod engine;
mod progress;
mod retry;

pub use client::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, ProbeResult, SessionClient};
pub use engine::{
    ResumableTransfer, SUBTITLE_FORMAT_ATTEMPTS, TransferKind, TransferOutcome, TransferTask,
    partial_path,
};
pub use progress::{NullProgress, ProgressSink};
pub use retry::{DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error};
