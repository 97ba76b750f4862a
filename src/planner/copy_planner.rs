use crate::config::ScanConfig;
use crate::error::{PodExtractError, Result};
use crate::planner::file_filter::FileFilter;
use crate::planner::path_planner::plan_path;
use crate::progress::{report, ProgressSink};
use crate::tags::{TagReader, TagSet};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// One file to copy: absolute source, destination relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl PlanEntry {
    pub fn new(source: PathBuf, destination: PathBuf) -> Self {
        Self {
            source,
            destination,
        }
    }

    pub fn target(&self, root: &Path) -> PathBuf {
        root.join(&self.destination)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanStats {
    /// Regular files visited during the scan.
    pub files_seen: usize,
    /// Files with a registered extension.
    pub supported: usize,
    pub planned: usize,
    /// Supported files left out because their tags could not be read.
    pub skipped: usize,
}

/// Source to destination mapping, ordered by source path.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CopyPlan {
    entries: BTreeMap<PathBuf, PlanEntry>,
    stats: PlanStats,
}

impl CopyPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, replacing any previous entry for the same source.
    pub fn insert(&mut self, entry: PlanEntry) {
        self.entries.insert(entry.source.clone(), entry);
    }

    pub fn get(&self, source: &Path) -> Option<&PlanEntry> {
        self.entries.get(source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.values()
    }

    pub fn stats(&self) -> &PlanStats {
        &self.stats
    }

    /// Pairs each source with its absolute destination under `root`.
    pub fn render(&self, root: &Path) -> Vec<(&Path, PathBuf)> {
        self.iter()
            .map(|entry| (entry.source.as_path(), entry.target(root)))
            .collect()
    }

    /// Relative destinations claimed by more than one source.
    pub fn collisions(&self) -> BTreeMap<&Path, Vec<&Path>> {
        let mut by_destination: BTreeMap<&Path, Vec<&Path>> = BTreeMap::new();
        for entry in self.iter() {
            by_destination
                .entry(entry.destination.as_path())
                .or_default()
                .push(entry.source.as_path());
        }

        by_destination.retain(|_, sources| sources.len() > 1);
        by_destination
    }
}

impl<'a> IntoIterator for &'a CopyPlan {
    type Item = &'a PlanEntry;
    type IntoIter = std::collections::btree_map::Values<'a, PathBuf, PlanEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

/// Walks a source tree and turns every taggable file into a plan entry.
pub struct CopyPlanner {
    filter: FileFilter,
    reader: TagReader,
    max_depth: Option<usize>,
    follow_links: bool,
    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    jobs: usize,
}

impl CopyPlanner {
    pub fn new(config: &ScanConfig, reader: TagReader) -> Self {
        Self {
            filter: FileFilter::new(config),
            reader,
            max_depth: config.max_depth,
            follow_links: config.follow_links,
            jobs: num_cpus::get(),
        }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn reader(&self) -> &TagReader {
        &self.reader
    }

    /// Scans `root`, reads tags and plans a destination for every supported file.
    ///
    /// `scan` is called once per supported file found, with an unknown (zero) total.
    /// `analyze` is called once per file before its tags are read. Either sink can
    /// cancel, in which case the partial plan is dropped.
    ///
    /// Only a missing or unreadable root is an error. A tree without usable tracks
    /// yields an empty plan whose stats say what was seen.
    pub fn build_plan(
        &self,
        root: &Path,
        scan: Option<&dyn ProgressSink>,
        analyze: Option<&dyn ProgressSink>,
    ) -> Result<CopyPlan> {
        let root = self.validate_root(root)?;
        let mut stats = PlanStats::default();

        let files = self.discover(&root, scan, &mut stats)?;
        info!(root = %root.display(), files = files.len(), "scan finished");

        let decoded = self.analyze(&files, analyze)?;

        let mut plan = CopyPlan::new();
        for (source, result) in decoded {
            match result {
                Ok(tags) => {
                    let destination = plan_path(&source, &tags);
                    debug!(source = %source.display(), destination = %destination.display(), "planned");
                    plan.insert(PlanEntry::new(source, destination));
                }
                Err(err) => {
                    warn!(source = %source.display(), error = %err, "skipping file");
                    stats.skipped += 1;
                }
            }
        }

        stats.planned = plan.len();
        plan.stats = stats;
        info!(
            planned = plan.stats.planned,
            skipped = plan.stats.skipped,
            "plan ready"
        );

        Ok(plan)
    }

    fn validate_root(&self, root: &Path) -> Result<PathBuf> {
        if !root.exists() {
            return Err(PodExtractError::InvalidPath {
                path: root.display().to_string(),
            });
        }

        if !root.is_dir() {
            return Err(PodExtractError::InvalidPath {
                path: format!("{} is not a directory", root.display()),
            });
        }

        if let Err(err) = std::fs::read_dir(root) {
            return Err(PodExtractError::InvalidPath {
                path: format!("{} ({})", root.display(), err),
            });
        }

        std::path::absolute(root).map_err(|err| PodExtractError::InvalidPath {
            path: format!("{} ({})", root.display(), err),
        })
    }

    fn discover(
        &self,
        root: &Path,
        progress: Option<&dyn ProgressSink>,
        stats: &mut PlanStats,
    ) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        let mut walker = WalkDir::new(root).follow_links(self.follow_links);
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        let walker = walker
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.should_visit(e, root));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "scan error");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            stats.files_seen += 1;

            let path = entry.into_path();
            if !self.reader.supports(&path) {
                continue;
            }

            let label = path.display().to_string();
            if report(progress, files.len(), 0, &label).is_cancel() {
                return Err(PodExtractError::Cancelled);
            }
            files.push(path);
        }

        stats.supported = files.len();
        files.sort();
        Ok(files)
    }

    fn should_visit(&self, entry: &DirEntry, root: &Path) -> bool {
        if entry.depth() == 0 {
            return true;
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        self.filter.allows(relative)
    }

    #[cfg(not(feature = "parallel"))]
    fn analyze(
        &self,
        files: &[PathBuf],
        progress: Option<&dyn ProgressSink>,
    ) -> Result<Vec<(PathBuf, Result<TagSet>)>> {
        let total = files.len();
        let mut decoded = Vec::with_capacity(total);

        for (index, path) in files.iter().enumerate() {
            let label = path.display().to_string();
            if report(progress, index, total, &label).is_cancel() {
                return Err(PodExtractError::Cancelled);
            }
            decoded.push((path.clone(), self.reader.tags_for(path)));
        }

        Ok(decoded)
    }

    #[cfg(feature = "parallel")]
    fn analyze(
        &self,
        files: &[PathBuf],
        progress: Option<&dyn ProgressSink>,
    ) -> Result<Vec<(PathBuf, Result<TagSet>)>> {
        use rayon::prelude::*;
        use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

        let total = files.len();
        let cancelled = AtomicBool::new(false);
        let started = AtomicUsize::new(0);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| PodExtractError::Config {
                message: format!("Failed to start worker pool: {}", e),
            })?;

        let decoded: Vec<_> = pool.install(|| {
            files
                .par_iter()
                .filter_map(|path| {
                    if cancelled.load(Ordering::Relaxed) {
                        return None;
                    }

                    let index = started.fetch_add(1, Ordering::Relaxed);
                    let label = path.display().to_string();
                    if report(progress, index, total, &label).is_cancel() {
                        cancelled.store(true, Ordering::Relaxed);
                        return None;
                    }

                    Some((path.clone(), self.reader.tags_for(path)))
                })
                .collect()
        });

        if cancelled.load(Ordering::Relaxed) {
            return Err(PodExtractError::Cancelled);
        }

        Ok(decoded)
    }
}
