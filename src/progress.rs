//! Progress reporting shared by the scan, tag-plan and extract phases.

/// What a progress sink wants the running phase to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Cancel,
}

impl Flow {
    pub fn is_cancel(self) -> bool {
        self == Flow::Cancel
    }
}

/// Receives `(current_index, total, current_item_label)` once per file or entry.
///
/// A `total` of 0 means the phase does not know its size yet (directory scan).
/// Returning [`Flow::Cancel`] stops the phase before the next file.
pub trait ProgressSink: Sync {
    fn report(&self, current: usize, total: usize, label: &str) -> Flow;
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize, &str) -> Flow + Sync,
{
    fn report(&self, current: usize, total: usize, label: &str) -> Flow {
        self(current, total, label)
    }
}

/// Calls the sink when one was given.
pub(crate) fn report(sink: Option<&dyn ProgressSink>, current: usize, total: usize, label: &str) -> Flow {
    match sink {
        Some(sink) => sink.report(current, total, label),
        None => Flow::Continue,
    }
}
