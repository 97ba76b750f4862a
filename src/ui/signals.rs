use crate::error::{PodExtractError, Result};
use crate::progress::Flow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Ctrl+C turned into a flag the pipeline polls between files.
///
/// A second Ctrl+C exits immediately.
#[derive(Clone)]
pub struct GracefulShutdown {
    running: Arc<AtomicBool>,
    interrupted: Arc<AtomicBool>,
}

impl GracefulShutdown {
    pub fn new() -> Result<Self> {
        let shutdown = Self::new_for_test();
        let handle = shutdown.clone();

        ctrlc::set_handler(move || {
            handle.request_shutdown();
            if handle.interrupted.swap(true, Ordering::SeqCst) {
                eprintln!("\nInterrupted twice, leaving now.");
                std::process::exit(130);
            }
            eprintln!("\nFinishing the current track, press Ctrl+C again to quit at once.");
        })
        .map_err(|e| PodExtractError::Config {
            message: format!("Could not install the Ctrl+C handler: {}", e),
        })?;

        Ok(shutdown)
    }

    /// Instance without a signal handler, for tests and embedding.
    pub fn new_for_test() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once a stop was requested.
    pub fn check_shutdown(&self) -> Result<()> {
        match self.flow() {
            Flow::Continue => Ok(()),
            Flow::Cancel => Err(PodExtractError::Cancelled),
        }
    }

    /// What a progress sink should answer right now.
    pub fn flow(&self) -> Flow {
        if self.is_running() {
            Flow::Continue
        } else {
            Flow::Cancel
        }
    }

    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
