//! Defines structures and types for progress reporting.

/// Represents a snapshot of the progress during a conversion.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// A description of the current stage (e.g., "Converting entries").
    pub stage_description: String,
    /// Number of items processed in the current stage.
    pub current_item: u64,
    /// Total number of items expected in the current stage (if known).
    pub total_items: Option<u64>,
    /// An optional message providing more context (e.g., "Entry 1000042").
    pub message: Option<String>,
}

/// Type alias for the progress callback function.
///
/// The callback receives a `ProgressUpdate` and returns `true` to continue,
/// or `false` to abort the conversion with [`crate::JmdictError::Aborted`].
pub type ProgressCallback = Box<dyn FnMut(ProgressUpdate) -> bool + Send>;

impl ProgressUpdate {
    /// Creates a new progress update for the start of a stage.
    pub fn new_stage(description: &str, total_items: Option<u64>) -> Self {
        ProgressUpdate {
            stage_description: description.to_string(),
            current_item: 0,
            total_items,
            message: None,
        }
    }

    /// Whether this update marks the end of a stage with a known total.
    pub fn is_finished(&self) -> bool {
        self.total_items
            .is_some_and(|total| self.current_item >= total)
    }
}

/// Optional callback wrapper so call sites don't repeat the `if let`.
pub(crate) struct Reporter {
    callback: Option<ProgressCallback>,
}

impl Reporter {
    pub(crate) fn new(callback: Option<ProgressCallback>) -> Self {
        Reporter { callback }
    }

    /// Forwards the update; returns `false` if the callback asked to stop.
    pub(crate) fn report(&mut self, update: ProgressUpdate) -> bool {
        match self.callback.as_mut() {
            Some(cb) => cb(update),
            None => true,
        }
    }
}
