use crate::error::{PodExtractError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Optional limit on directory depth below the source root. Unbounded when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    pub follow_links: bool,
    pub skip_hidden: bool,
    pub exclude_patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub overwrite: bool,
    pub preserve_mtime: bool,
    pub write_report: bool,
    pub buffer_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker threads for tag decoding when built with the `parallel` feature.
    pub jobs: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            follow_links: false,
            skip_hidden: true,
            exclude_patterns: vec![
                r"\.part$".to_string(),
                r"(^|[/\\])\.Trashes([/\\]|$)".to_string(),
            ],
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            overwrite: true,
            preserve_mtime: true,
            write_report: false,
            buffer_size: 64 * 1024, // 64KB buffer
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            jobs: num_cpus::get(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(PodExtractError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| PodExtractError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| PodExtractError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["podextract.toml", ".podextract.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(max_depth) = cli_args.max_depth {
            self.scan.max_depth = Some(max_depth);
        }

        if let Some(ref exclude) = cli_args.exclude {
            self.scan.exclude_patterns.extend(exclude.clone());
        }

        if let Some(overwrite) = cli_args.overwrite {
            self.output.overwrite = overwrite;
        }

        if let Some(write_report) = cli_args.write_report {
            self.output.write_report = write_report;
        }

        if let Some(jobs) = cli_args.jobs {
            self.runtime.jobs = jobs;
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| PodExtractError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| PodExtractError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan.max_depth == Some(0) {
            return Err(PodExtractError::Config {
                message: "Maximum directory depth must be greater than 0".to_string(),
            });
        }

        for pattern in &self.scan.exclude_patterns {
            if let Err(e) = Regex::new(pattern) {
                return Err(PodExtractError::Config {
                    message: format!("Invalid exclude pattern '{}': {}", pattern, e),
                });
            }
        }

        if self.output.buffer_size < 4096 {
            return Err(PodExtractError::Config {
                message: "Copy buffer must be at least 4096 bytes".to_string(),
            });
        }

        if self.runtime.jobs == 0 {
            return Err(PodExtractError::Config {
                message: "Worker count must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub max_depth: Option<usize>,
    pub exclude: Option<Vec<String>>,
    pub overwrite: Option<bool>,
    pub write_report: Option<bool>,
    pub jobs: Option<usize>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_exclude(mut self, exclude: Option<Vec<String>>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn with_overwrite(mut self, overwrite: Option<bool>) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_write_report(mut self, write_report: Option<bool>) -> Self {
        self.write_report = write_report;
        self
    }

    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.scan.skip_hidden);
        assert!(!config.scan.follow_links);
        assert!(config.output.overwrite);
        assert!(config.runtime.jobs > 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.scan.max_depth = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scan.exclude_patterns.push("([unclosed".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.buffer_size = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_operations() {
        let mut config = Config::default();
        config.output.overwrite = false;
        config.scan.max_depth = Some(5);
        let temp_file = NamedTempFile::new().unwrap();

        config.save_to_file(temp_file.path()).unwrap();

        let loaded_config = Config::load_from_file(temp_file.path()).unwrap();
        assert!(!loaded_config.output.overwrite);
        assert_eq!(loaded_config.scan.max_depth, config.scan.max_depth);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[output]\nwrite_report = true").unwrap();

        let config = Config::load_from_file(temp_file.path()).unwrap();
        assert!(config.output.write_report);
        assert!(config.output.overwrite);
        assert_eq!(config.scan.max_depth, None);
    }

    #[test]
    fn test_missing_config_file() {
        let err = Config::load_from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, PodExtractError::Config { .. }));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::default();
        let original_patterns = config.scan.exclude_patterns.len();

        let overrides = CliOverrides::new()
            .with_max_depth(Some(3))
            .with_exclude(Some(vec![r"Podcasts".to_string()]))
            .with_overwrite(Some(false))
            .with_jobs(Some(2));

        config.merge_with_cli_args(&overrides);

        assert_eq!(config.scan.max_depth, Some(3));
        assert_eq!(config.scan.exclude_patterns.len(), original_patterns + 1);
        assert!(!config.output.overwrite);
        assert_eq!(config.runtime.jobs, 2);
    }

    #[test]
    fn test_sample_config_generation() {
        let sample = Config::create_sample_config();
        assert!(sample.contains("[scan]"));
        assert!(sample.contains("[output]"));
        assert!(sample.contains("[runtime]"));
    }
}
