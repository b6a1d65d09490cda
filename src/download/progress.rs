//! Per-download byte progress bars.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str = "{msg:30!} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec})";
const SPINNER_TEMPLATE: &str = "{spinner} {msg:30!} {bytes} ({bytes_per_sec})";

/// Shared progress display for concurrent downloads.
///
/// When disabled every bar is hidden, so callers never branch on whether a
/// terminal is attached.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    multi: Option<MultiProgress>,
}

impl DownloadProgress {
    /// Draws bars on stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            multi: Some(MultiProgress::with_draw_target(ProgressDrawTarget::stderr())),
        }
    }

    /// Draws nothing.
    #[must_use]
    pub fn hidden() -> Self {
        Self { multi: None }
    }

    /// Returns true if bars are drawn.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.multi.is_some()
    }

    /// Creates a bar for one download. `total` is the content length when known.
    #[must_use]
    pub fn start(&self, name: &str, total: Option<u64>) -> ProgressBar {
        let Some(multi) = &self.multi else {
            return ProgressBar::hidden();
        };

        let bar = match total {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(
                    ProgressStyle::with_template(BAR_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("=> "),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::with_template(SPINNER_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar
            }
        };
        bar.set_message(name.to_string());
        multi.add(bar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_progress_returns_hidden_bars() {
        let progress = DownloadProgress::hidden();
        assert!(!progress.is_enabled());
        let bar = progress.start("tool.tar.gz", Some(10));
        assert!(bar.is_hidden());
        bar.inc(5);
        bar.finish_and_clear();
    }

    #[test]
    fn test_bar_tracks_total_when_known() {
        let progress = DownloadProgress {
            multi: Some(MultiProgress::with_draw_target(ProgressDrawTarget::hidden())),
        };
        let bar = progress.start("tool", Some(42));
        assert_eq!(bar.length(), Some(42));
        let spinner = progress.start("tool", None);
        assert_eq!(spinner.length(), None);
    }
}
