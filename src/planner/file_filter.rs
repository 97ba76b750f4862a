use crate::config::ScanConfig;
use regex::Regex;
use std::path::Path;
use tracing::warn;

/// Decides which entries of the source tree are worth a look.
pub struct FileFilter {
    skip_hidden: bool,
    exclude_patterns: Vec<Regex>,
}

impl FileFilter {
    pub fn new(config: &ScanConfig) -> Self {
        let exclude_patterns = config
            .exclude_patterns
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(err) => {
                    warn!(pattern = %pattern, error = %err, "ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();

        Self {
            skip_hidden: config.skip_hidden,
            exclude_patterns,
        }
    }

    /// False for hidden names (including `._` resource forks) and excluded paths.
    pub fn allows(&self, path: &Path) -> bool {
        if self.skip_hidden && is_hidden(path) {
            return false;
        }

        !self.matches_any_pattern(&path.to_string_lossy())
    }

    pub fn matches_any_pattern(&self, text: &str) -> bool {
        self.exclude_patterns
            .iter()
            .any(|pattern| pattern.is_match(text))
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::new(&ScanConfig::default())
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
}
