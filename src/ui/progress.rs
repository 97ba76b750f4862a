use crate::progress::{Flow, ProgressSink};
use crate::ui::GracefulShutdown;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

const TRACK_TEMPLATE: &str = "{spinner:.magenta} [{bar:32.magenta/blue}] {pos}/{len} tracks {wide_msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.magenta} {msg} [{elapsed}]";
const TICK: Duration = Duration::from_millis(120);

pub struct ProgressManager {
    multi_progress: MultiProgress,
    enabled: bool,
}

impl ProgressManager {
    pub fn new(enabled: bool) -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            enabled,
        }
    }

    /// Bar for a phase with a known number of tracks; the length may be set later.
    pub fn create_file_progress(&self, total: u64, message: &str) -> ProgressBar {
        self.add(ProgressBar::new(total), TRACK_TEMPLATE, message)
    }

    /// Spinner for directory discovery, where the total is unknown.
    pub fn create_spinner(&self, message: &str) -> ProgressBar {
        self.add(ProgressBar::new_spinner(), SPINNER_TEMPLATE, message)
    }

    fn add(&self, bar: ProgressBar, template: &str, message: &str) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let bar = self.multi_progress.add(bar);
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
            .tick_chars("♩♪♫♬ ");
        bar.set_style(style);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(TICK);
        bar
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Feeds pipeline progress into a bar and answers with the Ctrl+C state.
pub struct BarSink {
    bar: ProgressBar,
    shutdown: GracefulShutdown,
    noun: &'static str,
}

impl BarSink {
    pub fn new(bar: ProgressBar, shutdown: GracefulShutdown, noun: &'static str) -> Self {
        Self {
            bar,
            shutdown,
            noun,
        }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

impl ProgressSink for BarSink {
    fn report(&self, current: usize, total: usize, label: &str) -> Flow {
        if total == 0 {
            // size not known yet, count instead
            self.bar
                .set_message(format!("{} {} found", current + 1, self.noun));
        } else {
            if self.bar.length() != Some(total as u64) {
                self.bar.set_length(total as u64);
            }
            self.bar.set_position(current as u64);
            self.bar.set_message(short_label(label));
        }

        self.shutdown.flow()
    }
}

fn short_label(label: &str) -> String {
    Path::new(label)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| label.to_string())
}

pub fn finish_progress_with_summary(bar: &ProgressBar, message: &str, duration: Duration) {
    bar.finish_with_message(format!("{} in {}", message, format_duration(duration)));
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}
