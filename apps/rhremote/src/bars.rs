//! Terminal progress bar fed by transfer progress reports.

use indicatif::{ProgressBar, ProgressStyle};

use rhremote_protocol::SessionFingerprint;
use rhremote_transfer::{InnerProgress, ProgressSink, TransferProgress};

/// Renders overall progress as a bar and the current file in its message.
pub struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(100)
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{bar:40.cyan/blue} {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}

impl ProgressSink for BarSink {
    fn on_progress(&self, progress: TransferProgress) {
        self.bar.set_position(progress.outer as u64);
        self.bar.set_message(describe(&progress));
    }
}

fn describe(progress: &TransferProgress) -> String {
    let file = (progress.files_done + 1).min(progress.files_total.max(1));
    match progress.inner {
        InnerProgress::AwaitingSize => {
            format!("{}/{} files", progress.files_done, progress.files_total)
        }
        InnerProgress::Percent(p) => {
            format!("file {file}/{} {p:>3}%", progress.files_total)
        }
    }
}

/// Fingerprint as colon-separated groups of four hex digits, for reading
/// aloud when comparing with the remote side.
pub fn format_fingerprint(fingerprint: &SessionFingerprint) -> String {
    let hex = fingerprint.to_hex();
    hex.as_bytes()
        .chunks(4)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect::<Vec<_>>()
        .join(":")
}
