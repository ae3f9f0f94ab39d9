//! Transfer progress display with progress bars.

use indicatif::{ProgressBar, ProgressBarIter, ProgressStyle};
use std::time::Duration;
use tokio::io::AsyncRead;

/// Per-file progress tracker
pub struct TransferProgress {
    bar: ProgressBar,
}

impl TransferProgress {
    /// Create a new progress tracker
    #[must_use]
    pub fn new(total_bytes: u64, filename: &str) -> Self {
        let bar = ProgressBar::new(total_bytes);

        let style = ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);

        bar.set_message(format!("Sending: {filename}"));

        Self { bar }
    }

    /// Wrap a reader so every byte read advances the bar
    pub fn wrap_async_read<R>(&self, reader: R) -> ProgressBarIter<R>
    where
        R: AsyncRead + Unpin,
    {
        self.bar.wrap_async_read(reader)
    }

    /// Finish with custom message
    pub fn finish_with_message(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }

    /// Abandon the progress bar (for errors)
    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

/// Format bytes in human-readable format
///
/// # Example
///
/// ```
/// use skiff_cli::progress::format_bytes;
///
/// assert_eq!(format_bytes(1024), "1.00 KB");
/// assert_eq!(format_bytes(1024 * 1024), "1.00 MB");
/// assert_eq!(format_bytes(1024 * 1024 * 1024), "1.00 GB");
/// ```
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{size:.2} {}", UNITS[unit_idx])
}

/// Format speed in human-readable format (bytes/sec)
///
/// # Example
///
/// ```
/// use skiff_cli::progress::format_speed;
///
/// assert_eq!(format_speed(1024.0), "1.00 KB/s");
/// ```
#[must_use]
pub fn format_speed(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec as u64))
}

/// Format duration in human-readable format
///
/// Sub-minute durations keep one decimal.
///
/// # Example
///
/// ```
/// use skiff_cli::progress::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}
