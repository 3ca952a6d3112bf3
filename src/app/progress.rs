//! Terminal progress bar for transfers.

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

use coursedl::ProgressSink;

/// Renders one progress bar per transfer, seeded at the resume offset.
#[derive(Default)]
pub(crate) struct TransferBar {
    bar: Mutex<Option<ProgressBar>>,
}

impl TransferBar {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ProgressBar>> {
        self.bar
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ProgressSink for TransferBar {
    fn begin(&self, display_name: &str, already_have: u64, total_size: Option<u64>) {
        let bar = match total_size {
            Some(total) => {
                let bar = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::with_template(
                    "{msg:32!} {bytes:>10}/{total_bytes:10} {wide_bar} {bytes_per_sec}",
                ) {
                    bar.set_style(style);
                }
                bar
            }
            None => ProgressBar::new_spinner(),
        };
        bar.set_position(already_have);
        bar.set_message(display_name.to_string());
        *self.lock() = Some(bar);
    }

    fn advance(&self, bytes: u64) {
        if let Some(bar) = self.lock().as_ref() {
            bar.inc(bytes);
        }
    }

    fn finish(&self) {
        if let Some(bar) = self.lock().take() {
            bar.finish_and_clear();
        }
    }
}
