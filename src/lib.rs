pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod planner;
pub mod progress;
pub mod tags;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Config, OutputConfig, RuntimeConfig, ScanConfig};
pub use error::{PodExtractError, Result, UserFriendlyError};

// Core functionality re-exports
pub use extractor::{ExecutionReport, ExtractionExecutor, FailedEntry, FailureKind};
pub use planner::{plan_path, sanitize, CopyPlan, CopyPlanner, PlanEntry, PlanStats, SanitizedText};
pub use progress::{Flow, ProgressSink};
pub use tags::{DecodeError, TagDecoder, TagKey, TagReader, TagSet};
pub use ui::{BarSink, GracefulShutdown, OutputFormatter, OutputMode, ProgressManager};

use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::task;

/// Scan, plan and copy wired to the terminal: progress bars, Ctrl+C, output mode.
pub struct PodExtract {
    config: Config,
    reader: TagReader,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
}

impl PodExtract {
    /// Create a new PodExtract instance with the provided configuration
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        let shutdown = GracefulShutdown::new()?;
        Ok(Self::with_shutdown(config, output_mode, verbose, quiet, shutdown))
    }

    /// Instance without a Ctrl+C handler, so several can live in one process.
    pub fn new_for_test(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        Self::with_shutdown(config, output_mode, verbose, quiet, GracefulShutdown::new_for_test())
    }

    fn with_shutdown(
        config: Config,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
        shutdown: GracefulShutdown,
    ) -> Self {
        // bars would interleave with a JSON document on stdout
        let show_progress = !quiet && output_mode == OutputMode::Human;

        Self {
            config,
            reader: TagReader::new(),
            output_formatter: OutputFormatter::new(output_mode, verbose, quiet),
            progress_manager: ProgressManager::new(show_progress),
            shutdown,
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        Self::new(config, cli_args.output_mode(), cli_args.verbose, cli_args.quiet)
    }

    /// Scans `source` and plans a destination for every readable track.
    ///
    /// An empty plan is `NoMediaFound`: there is nothing to list or copy.
    pub async fn plan(&self, source: &Path) -> Result<CopyPlan> {
        self.shutdown.check_shutdown()?;
        self.output_formatter
            .start_operation(&format!("Scanning {}", source.display()));

        let started = Instant::now();
        let scan_bar = self.progress_manager.create_spinner("Looking for tracks...");
        let tag_bar = self.progress_manager.create_file_progress(0, "Reading tags...");

        let planner = CopyPlanner::new(&self.config.scan, self.reader.clone())
            .with_jobs(self.config.runtime.jobs);
        let scan_sink = BarSink::new(scan_bar.clone(), self.shutdown.clone(), "tracks");
        let tag_sink = BarSink::new(tag_bar.clone(), self.shutdown.clone(), "tracks");
        let source = source.to_path_buf();

        let result = task::spawn_blocking(move || {
            let scan: &dyn ProgressSink = &scan_sink;
            let tags: &dyn ProgressSink = &tag_sink;
            planner.build_plan(&source, Some(scan), Some(tags))
        })
        .await
        .map_err(|e| PodExtractError::Config {
            message: format!("Scan task failed: {}", e),
        })?;

        match &result {
            Ok(plan) => {
                scan_bar.finish_and_clear();
                ui::progress::finish_progress_with_summary(
                    &tag_bar,
                    &format!("Planned {} tracks", plan.len()),
                    started.elapsed(),
                );
                if plan.stats().skipped > 0 {
                    self.output_formatter.warning(&format!(
                        "{} files skipped because their tags could not be read",
                        plan.stats().skipped
                    ));
                }
            }
            Err(_) => {
                scan_bar.abandon();
                tag_bar.abandon();
            }
        }

        let plan = result?;
        if plan.is_empty() {
            return Err(PodExtractError::NoMediaFound {
                searched_extensions: self.reader.extensions(),
            });
        }

        Ok(plan)
    }

    /// Copies `plan` into `destination` and optionally leaves a JSON report there.
    pub async fn extract(&self, plan: &CopyPlan, destination: &Path) -> Result<ExecutionReport> {
        self.shutdown.check_shutdown()?;
        self.output_formatter
            .start_operation(&format!("Copying {} tracks to {}", plan.len(), destination.display()));

        let file_bar = self
            .progress_manager
            .create_file_progress(plan.len() as u64, "Copying...");

        let executor = ExtractionExecutor::from_config(&self.config.output);
        let sink = BarSink::new(file_bar.clone(), self.shutdown.clone(), "tracks");
        let plan = plan.clone();
        let destination = destination.to_path_buf();

        let report = task::spawn_blocking(move || {
            let progress: &dyn ProgressSink = &sink;
            executor.execute(&plan, &destination, Some(progress))
        })
        .await
        .map_err(|e| PodExtractError::Config {
            message: format!("Copy task failed: {}", e),
        })??;

        ui::progress::finish_progress_with_summary(
            &file_bar,
            &format!("Copied {} tracks", report.succeeded),
            report.duration,
        );

        if self.config.output.write_report {
            match report.save_json() {
                Ok(path) => self
                    .output_formatter
                    .info(&format!("Report written to {}", path.display())),
                Err(e) => self
                    .output_formatter
                    .warning(&format!("Could not write report: {}", e)),
            }
        }

        Ok(report)
    }

    /// Plans `source` and copies it into `destination` in one go.
    pub async fn run(&self, source: &Path, destination: &Path) -> Result<ExecutionReport> {
        let plan = self.plan(source).await?;
        self.extract(&plan, destination).await
    }

    /// Generate sample configuration file
    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    /// Handle error with user-friendly output
    pub fn handle_error(&self, error: &PodExtractError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

/// Default name for `--generate-config` when no `--config` path is given.
pub fn default_config_file() -> PathBuf {
    PathBuf::from("podextract.toml")
}

pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn mp3_titled(title: &str) -> Vec<u8> {
        let mut frame = b"TIT2".to_vec();
        frame.extend_from_slice(&((title.len() + 1) as u32).to_be_bytes());
        frame.extend_from_slice(&[0, 0, 0]);
        frame.extend_from_slice(title.as_bytes());

        let mut tag = b"ID3\x03\x00\x00".to_vec();
        tag.extend_from_slice(&[0, 0, 0, frame.len() as u8]);
        tag.extend_from_slice(&frame);
        tag
    }

    fn quiet_instance(config: Config) -> PodExtract {
        PodExtract::new_for_test(config, OutputMode::Plain, 0, true)
    }

    #[test]
    fn test_sample_config_generation() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sample.toml");

        PodExtract::generate_sample_config(&config_path).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[scan]"));
        assert!(content.contains("[output]"));
    }

    #[tokio::test]
    async fn test_run_end_to_end() {
        let source = TempDir::new().unwrap();
        let destination = TempDir::new().unwrap();
        let folder = source.path().join("iPod_Control/Music/F00");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("ABCD.mp3"), mp3_titled("Ride On")).unwrap();

        let mut config = Config::default();
        config.output.write_report = true;
        let app = quiet_instance(config);

        let report = app.run(source.path(), destination.path()).await.unwrap();

        assert_eq!(report.succeeded, 1);
        assert!(destination.path().join("Ride On.mp3").exists());
        assert!(destination
            .path()
            .join(extractor::report::REPORT_FILE_NAME)
            .exists());
    }

    #[tokio::test]
    async fn test_plan_without_usable_tracks() {
        let source = TempDir::new().unwrap();
        fs::write(source.path().join("BLNK.m4a"), [0u8; 32]).unwrap();
        let app = quiet_instance(Config::default());

        let err = app.plan(source.path()).await.unwrap_err();
        match err {
            PodExtractError::NoMediaFound { searched_extensions } => {
                assert!(searched_extensions.contains(&"mp3".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_cancels_plan() {
        let source = TempDir::new().unwrap();
        let app = quiet_instance(Config::default());

        app.request_shutdown();
        assert!(!app.is_running());

        let err = app.plan(source.path()).await.unwrap_err();
        assert!(matches!(err, PodExtractError::Cancelled));
    }

    #[test]
    fn test_version_info() {
        assert!(!version_info().is_empty());
    }
}
