//! Progress reporting hooks for transfers.
//!
//! Progress is observability only, never a correctness dependency: the
//! engine advances a monotonic byte counter through a sink while streaming.
//! The library ships a no-op sink; the CLI wires a progress bar.

/// Receives progress events for one transfer.
pub trait ProgressSink: Send + Sync {
    /// Called once before streaming starts. `already_have` is the size of
    /// the partial file being resumed (0 on a fresh transfer); `total_size`
    /// is the authoritative size when the server reported one.
    fn begin(&self, display_name: &str, already_have: u64, total_size: Option<u64>);

    /// Called after each chunk is written, with the chunk's byte count.
    fn advance(&self, bytes: u64);

    /// Called once after the stream completes, whatever the outcome.
    fn finish(&self);
}

/// Sink that discards all progress events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn begin(&self, _display_name: &str, _already_have: u64, _total_size: Option<u64>) {}
    fn advance(&self, _bytes: u64) {}
    fn finish(&self) {}
}
