use std::{io, path::PathBuf};

use thiserror::Error;

use crate::workflow::WorkflowStep;

/// Fatal engine errors. Per-row problems are not represented here; they are
/// accumulated into `FileState::parse_warning` and `ProgressState::row_errors`
/// so the embedder can render them while the workflow stays usable.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The file could not be read at all.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The external row consumer rejected a batch; processing of the current
    /// file stops and does not advance to the next queued file.
    #[error("row consumer failed on the batch starting at row {start_index}: {reason}")]
    Consumer { start_index: u64, reason: String },
    /// An attempt to enter processing with required fields still unmapped.
    #[error("required fields are unassigned: {}", missing.join(", "))]
    AssignmentIncomplete { missing: Vec<String> },
    /// More rows failed to map than the configured limit allows.
    #[error("row error limit of {limit} exceeded after skipping {skipped} row(s)")]
    RowErrorLimit { limit: usize, skipped: usize },
    /// A workflow operation was requested in a step where it is not defined.
    #[error("{operation} is not available in the {step} step")]
    InvalidStep {
        operation: &'static str,
        step: WorkflowStep,
    },
    #[error("restart is disabled by configuration")]
    RestartDisabled,
    #[error("import-all is disabled by configuration")]
    ImportAllDisabled,
    #[error("unknown encoding '{label}'")]
    UnknownEncoding { label: String },
}

/// A single row could not be mapped onto the field schema. The row is skipped
/// and the error recorded; it never aborts the batch or the file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing value for required field '{field}'")]
pub struct RowTransformError {
    pub field: String,
}

/// Failure reported by an external row consumer for one delivered batch.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct ConsumerFailure {
    pub reason: String,
}

impl ConsumerFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
