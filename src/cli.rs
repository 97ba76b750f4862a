use crate::config::{CliOverrides, Config};
use crate::error::Result;
use crate::ui::OutputMode;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "podextract")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Copy music off an iPod into an Artist/Album/Track folder tree")]
#[command(
    long_about = "PodExtract scans the hidden iPod_Control/Music folders of an iPod, reads the \
                  ID3 and MP4 tags of every track and copies each one to \
                  DESTINATION/Artist/Album/NN - Title.ext."
)]
#[command(after_help = "EXAMPLES:\n  \
    podextract /media/IPOD                      list what would be copied\n  \
    podextract /media/IPOD ~/Music/iPod         copy everything\n  \
    podextract /media/IPOD ~/Music --dry-run    show the plan with final paths\n  \
    podextract /media/IPOD ~/Music --no-overwrite --write-report")]
pub struct Cli {
    /// iPod mount point or its iPod_Control/Music folder
    #[arg(required_unless_present = "generate_config")]
    pub source: Option<PathBuf>,

    /// Folder to copy into; without it the plan is only listed
    pub destination: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Keep files that already exist at the destination
    #[arg(long)]
    pub no_overwrite: bool,

    /// Maximum directory depth to scan
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Regex for paths to leave out (repeatable)
    #[arg(short, long)]
    pub exclude: Option<Vec<String>>,

    /// Write podextract-report.json into the destination
    #[arg(long)]
    pub write_report: bool,

    /// Worker threads for tag reading
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Dry run (show what would be copied without copying)
    #[arg(long, help = "Show the plan with final paths without copying anything")]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl From<&OutputFormat> for OutputMode {
    fn from(format: &OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        }
    }
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_max_depth(self.max_depth)
            .with_exclude(self.exclude.clone())
            .with_overwrite(self.no_overwrite.then_some(false))
            .with_write_report(self.write_report.then_some(true))
            .with_jobs(self.jobs)
    }

    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from(&self.output_format)
    }

    /// True when nothing should be copied: no destination, or `--dry-run`.
    pub fn is_listing(&self) -> bool {
        self.dry_run || self.destination.is_none()
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}
