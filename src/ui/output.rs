use crate::error::{PodExtractError, UserFriendlyError};
use crate::extractor::report::format_bytes;
use crate::extractor::ExecutionReport;
use crate::planner::CopyPlan;
use crate::ui::progress::format_duration;
use console::{style, Emoji, Term};
use std::path::Path;

pub const NO_DESTINATION: &str = "No destination folder!";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

impl OutputMode {
    pub fn from_string(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputMode::Json,
            "plain" => OutputMode::Plain,
            _ => OutputMode::Human,
        }
    }
}

// Emojis with text fallbacks
static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static MUSIC: Emoji = Emoji("🎵 ", "> ");

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", MUSIC, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                // keep stdout a single JSON document
                OutputMode::Json => {}
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    pub fn print_user_friendly_error(&self, error: &PodExtractError) {
        self.error(&error.user_message());

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => eprintln!("SUGGESTION: {}", suggestion),
            }
        }
    }

    /// Lists every planned copy. Without a destination the target column says so.
    pub fn print_plan(&self, plan: &CopyPlan, destination: Option<&Path>) {
        match self.mode {
            OutputMode::Human | OutputMode::Plain => {
                self.print_header("Extraction Plan");
                for line in plan_lines(plan, destination) {
                    println!("{}", line);
                }
                self.print_collisions(plan);
                self.print_separator();
                let stats = plan.stats();
                println!(
                    "{} files planned, {} skipped (unreadable tags), {} scanned",
                    stats.planned, stats.skipped, stats.files_seen
                );
            }
            OutputMode::Json => {
                let entries: Vec<_> = plan
                    .iter()
                    .map(|entry| {
                        serde_json::json!({
                            "source": entry.source,
                            "destination": destination.map(|root| entry.target(root)),
                            "relative_destination": entry.destination,
                        })
                    })
                    .collect();
                let collisions: Vec<_> = plan
                    .collisions()
                    .into_iter()
                    .map(|(destination, sources)| {
                        serde_json::json!({ "destination": destination, "sources": sources })
                    })
                    .collect();

                self.print_json_pretty(&serde_json::json!({
                    "type": "plan",
                    "entries": entries,
                    "collisions": collisions,
                    "stats": plan.stats(),
                }));
            }
        }
    }

    pub fn print_execution_report(&self, report: &ExecutionReport) {
        match self.mode {
            OutputMode::Human => self.print_human_report(report),
            OutputMode::Json => {
                let json_output =
                    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
                println!("{}", json_output);
            }
            OutputMode::Plain => self.print_plain_report(report),
        }
    }

    pub fn print_header(&self, title: &str) {
        if self.quiet {
            return;
        }

        if self.use_colors {
            println!();
            println!("{}{}", MUSIC, style(title).bold().cyan());
            println!();
        } else {
            println!("=== {} ===", title);
        }
    }

    pub fn print_separator(&self) {
        if self.quiet || self.mode == OutputMode::Json {
            return;
        }

        if self.use_colors {
            println!("{}", style("─".repeat(60)).dim());
        } else {
            println!("{}", "-".repeat(60));
        }
    }

    fn print_collisions(&self, plan: &CopyPlan) {
        for (destination, sources) in plan.collisions() {
            self.warning(&format!(
                "{} files map to {}; the last one copied wins",
                sources.len(),
                destination.display()
            ));
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        if self.use_colors {
            let line = match msg_type {
                MessageType::Success => format!("{}{}", CHECKMARK, style(message).green().bold()),
                MessageType::Error => format!("{}{}", CROSS, style(message).red().bold()),
                MessageType::Warning => format!("{}{}", WARNING, style(message).yellow().bold()),
                MessageType::Info => format!("{}{}", INFO, style(message).cyan()),
            };

            match msg_type {
                MessageType::Error => eprintln!("{}", line),
                _ => println!("{}", line),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        let object = serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        // diagnostics go to stderr so stdout holds only the result document
        eprintln!(
            "{}",
            serde_json::to_string(&object).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        eprintln!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn print_json_pretty(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn print_human_report(&self, report: &ExecutionReport) {
        println!();
        self.print_separator();

        let headline = if report.cancelled {
            "Extraction cancelled"
        } else if report.failed > 0 {
            "Extraction finished with errors"
        } else {
            "Extraction completed!"
        };

        if self.use_colors {
            let styled = if report.is_clean() {
                style(headline).green().bold()
            } else {
                style(headline).yellow().bold()
            };
            println!("{}{}", if report.is_clean() { CHECKMARK } else { WARNING }, styled);
        } else {
            println!("{}", headline);
        }

        println!();
        println!("  Destination:  {}", report.destination_root.display());
        println!("  Copied:       {}", self.highlight(report.succeeded.to_string()));
        println!("  Failed:       {}", self.highlight(report.failed.to_string()));
        println!("  Bytes copied: {}", self.highlight(format_bytes(report.bytes_copied)));
        println!("  Time taken:   {}", self.highlight(format_duration(report.duration)));

        if !report.failures.is_empty() {
            println!();
            println!("Issues encountered:");
            for failure in &report.failures {
                println!(
                    "  - [{}] {} -> {}: {}",
                    failure.kind,
                    failure.source.display(),
                    failure.destination.display(),
                    failure.reason
                );
            }
        }

        self.print_separator();
    }

    fn print_plain_report(&self, report: &ExecutionReport) {
        println!(
            "REPORT: {}",
            if report.cancelled { "cancelled" } else { "completed" }
        );
        println!("Destination: {}", report.destination_root.display());
        println!("Copied: {}", report.succeeded);
        println!("Failed: {}", report.failed);
        println!("Bytes: {}", report.bytes_copied);
        println!("Duration: {:?}", report.duration);

        for failure in &report.failures {
            println!(
                "FAILED [{}]: {} -> {}: {}",
                failure.kind,
                failure.source.display(),
                failure.destination.display(),
                failure.reason
            );
        }
    }

    fn highlight(&self, text: String) -> String {
        if self.use_colors {
            style(text).cyan().bold().to_string()
        } else {
            text
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}

/// `source -> destination` lines, with a placeholder when no root is chosen.
pub fn plan_lines(plan: &CopyPlan, destination: Option<&Path>) -> Vec<String> {
    plan.iter()
        .map(|entry| {
            let target = match destination {
                Some(root) => entry.target(root).display().to_string(),
                None => NO_DESTINATION.to_string(),
            };
            format!("{} -> {}", entry.source.display(), target)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PlanEntry;

    fn sample_plan() -> CopyPlan {
        let mut plan = CopyPlan::new();
        plan.insert(PlanEntry::new(
            "/ipod/F00/ABCD.mp3".into(),
            "AC_DC/Who Made Who/03 - Ride On.mp3".into(),
        ));
        plan
    }

    #[test]
    fn test_output_mode_parsing() {
        assert_eq!(OutputMode::from_string("human"), OutputMode::Human);
        assert_eq!(OutputMode::from_string("JSON"), OutputMode::Json);
        assert_eq!(OutputMode::from_string("plain"), OutputMode::Plain);
        assert_eq!(OutputMode::from_string("invalid"), OutputMode::Human);
    }

    #[test]
    fn test_quiet_mode() {
        let formatter = OutputFormatter::new(OutputMode::Human, 2, true);
        assert_eq!(formatter.verbose_level, 0);
        assert!(!formatter.should_show_message(0));
    }

    #[test]
    fn test_should_show_message() {
        let formatter = OutputFormatter::new(OutputMode::Plain, 1, false);
        assert!(formatter.should_show_message(0));
        assert!(formatter.should_show_message(1));
        assert!(!formatter.should_show_message(2));
    }

    #[test]
    fn test_plan_lines_without_destination() {
        let lines = plan_lines(&sample_plan(), None);
        assert_eq!(lines, vec![format!("/ipod/F00/ABCD.mp3 -> {}", NO_DESTINATION)]);
    }

    #[test]
    fn test_plan_lines_with_destination() {
        let lines = plan_lines(&sample_plan(), Some(Path::new("/music")));
        assert!(lines[0].ends_with("-> /music/AC_DC/Who Made Who/03 - Ride On.mp3"));
    }
}
