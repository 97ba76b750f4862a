use crate::config::OutputConfig;
use crate::error::{PodExtractError, Result};
use crate::extractor::report::{ExecutionReport, FailedEntry};
use crate::planner::CopyPlan;
use crate::progress::{report, ProgressSink};
use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;
use tracing::{debug, info, warn};

const WRITE_PROBE_PREFIX: &str = ".podextract-write-test";
const WRITE_PROBE_ATTEMPTS: u32 = 16;

/// Applies a [`CopyPlan`] to a destination root, one entry at a time.
pub struct ExtractionExecutor {
    overwrite: bool,
    preserve_mtime: bool,
    buffer_size: usize,
}

impl ExtractionExecutor {
    pub fn new() -> Self {
        Self::from_config(&OutputConfig::default())
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self {
            overwrite: config.overwrite,
            preserve_mtime: config.preserve_mtime,
            buffer_size: config.buffer_size.max(4096),
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(4096); // Minimum 4KB buffer
        self
    }

    /// Copies every entry of `plan` below `destination_root`.
    ///
    /// Only an unusable destination root is fatal. Per-entry problems are recorded
    /// in the report and the run carries on. A cancel from `progress` stops before
    /// the next entry and the report comes back with `cancelled` set.
    pub fn execute(
        &self,
        plan: &CopyPlan,
        destination_root: &Path,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<ExecutionReport> {
        let started = Instant::now();
        prepare_destination(destination_root)?;

        let mut run = ExecutionReport::new(destination_root.to_path_buf());
        let total = plan.len();

        for (index, entry) in plan.iter().enumerate() {
            let label = entry.destination.display().to_string();
            if report(progress, index, total, &label).is_cancel() {
                info!(attempted = run.attempted(), total, "extraction cancelled");
                run.cancelled = true;
                break;
            }

            let target = entry.target(destination_root);

            if !self.overwrite && target.exists() {
                warn!(destination = %target.display(), "destination exists, not overwriting");
                run.record_failure(FailedEntry::destination_exists(&entry.source, &target));
                continue;
            }

            match self.copy_entry(&entry.source, &target) {
                Ok(bytes) => {
                    debug!(source = %entry.source.display(), destination = %target.display(), bytes, "copied");
                    run.record_success(bytes);
                }
                Err(err) => {
                    warn!(source = %entry.source.display(), error = %err, "copy failed");
                    run.record_failure(FailedEntry::from_error(&entry.source, &target, &err));
                }
            }
        }

        run.finish(started.elapsed());
        info!(
            succeeded = run.succeeded,
            failed = run.failed,
            bytes = run.bytes_copied,
            "extraction finished"
        );

        Ok(run)
    }

    fn copy_entry(&self, source: &Path, target: &Path) -> Result<u64> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| PodExtractError::DirectoryCreate {
                path: parent.display().to_string(),
                message: e.to_string(),
            })?;
        }

        let copy_error = |e: std::io::Error| PodExtractError::Copy {
            source_path: source.display().to_string(),
            destination: target.display().to_string(),
            message: e.to_string(),
        };

        let source_file = fs::File::open(source).map_err(copy_error)?;
        let bytes = self
            .copy_file_with_buffer(source_file, target)
            .map_err(copy_error)?;

        // a complete copy stays even when its timestamp cannot be set
        if self.preserve_mtime {
            preserve_mtime(source, target).map_err(copy_error)?;
        }

        Ok(bytes)
    }

    /// Writes `source_file` to `dest`. A destination this call created and could not
    /// fill is removed; a destination it could not open is left alone.
    fn copy_file_with_buffer(&self, source_file: fs::File, dest: &Path) -> io::Result<u64> {
        let dest_file = fs::File::create(dest)?;

        self.write_through(source_file, dest_file).map_err(|e| {
            let _ = fs::remove_file(dest);
            e
        })
    }

    fn write_through(&self, source_file: fs::File, dest_file: fs::File) -> io::Result<u64> {
        let mut reader = BufReader::with_capacity(self.buffer_size, source_file);
        let mut writer = BufWriter::with_capacity(self.buffer_size, dest_file);

        let mut total_bytes = 0u64;
        let mut buffer = vec![0u8; 8192];

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }

            writer.write_all(&buffer[..bytes_read])?;
            total_bytes += bytes_read as u64;
        }

        writer.flush()?;
        Ok(total_bytes)
    }
}

fn preserve_mtime(source: &Path, dest: &Path) -> io::Result<()> {
    let modified = fs::metadata(source)?.modified()?;
    filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(modified))
}

impl Default for ExtractionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates the destination root if needed and proves it accepts new files.
fn prepare_destination(root: &Path) -> Result<()> {
    let unwritable = || PodExtractError::DestinationUnwritable {
        path: root.display().to_string(),
    };

    if root.exists() && !root.is_dir() {
        return Err(unwritable());
    }

    fs::create_dir_all(root).map_err(|_| unwritable())?;

    // never touch a file this run did not create
    for attempt in 0..WRITE_PROBE_ATTEMPTS {
        let probe = write_probe_path(root, attempt);
        match fs::OpenOptions::new().write(true).create_new(true).open(&probe) {
            Ok(file) => {
                drop(file);
                let _ = fs::remove_file(&probe);
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(_) => return Err(unwritable()),
        }
    }

    Err(unwritable())
}

fn write_probe_path(root: &Path, attempt: u32) -> PathBuf {
    root.join(format!("{}-{}-{}", WRITE_PROBE_PREFIX, process::id(), attempt))
}
