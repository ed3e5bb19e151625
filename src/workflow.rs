//! The three-step import workflow: file selection, field mapping, processing.
//!
//! One workflow instance owns every piece of mutable state — the parsed
//! preview, the field registry, the assignment map, progress — and external
//! collaborators only mutate through its operations, so there is a single
//! writer at all times. Only one file is ever processed at a time; queued
//! files drain one by one as the active file finishes.

use std::{
    collections::VecDeque,
    fmt,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    assign::{CompiledAssignment, FieldAssignments},
    columns::{ColumnPreview, build_columns},
    config::ImportConfig,
    error::ImportError,
    fields::FieldRegistry,
    preview::{FileState, parse_preview},
    stream::{CancelToken, ProgressState, RowConsumer, StreamOutcome, stream_file},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    AwaitingFile,
    AwaitingFields,
    Processing,
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowStep::AwaitingFile => "awaiting-file",
            WorkflowStep::AwaitingFields => "awaiting-fields",
            WorkflowStep::Processing => "processing",
        };
        f.write_str(name)
    }
}

/// Totals across every file the workflow has finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub files_processed: u64,
    pub rows_processed: u64,
    pub rows_skipped: u64,
}

type StartHook = Box<dyn FnMut(&Path)>;
type CompleteHook = Box<dyn FnMut(&ImportStats)>;
type CloseHook = Box<dyn FnMut()>;

pub struct ImportWorkflow {
    config: ImportConfig,
    step: WorkflowStep,
    registry: FieldRegistry,
    assignments: FieldAssignments,
    frozen: Option<CompiledAssignment>,
    file_state: Option<FileState>,
    file_accepted: bool,
    fields_accepted: bool,
    remaining: VecDeque<PathBuf>,
    skip_verification: bool,
    finished: bool,
    progress: ProgressState,
    stats: ImportStats,
    cancel: CancelToken,
    on_start: Option<StartHook>,
    on_complete: Option<CompleteHook>,
    on_close: Option<CloseHook>,
}

impl ImportWorkflow {
    pub fn new(config: ImportConfig) -> Self {
        Self {
            config,
            step: WorkflowStep::AwaitingFile,
            registry: FieldRegistry::new(),
            assignments: FieldAssignments::new(),
            frozen: None,
            file_state: None,
            file_accepted: false,
            fields_accepted: false,
            remaining: VecDeque::new(),
            skip_verification: false,
            finished: false,
            progress: ProgressState::new(),
            stats: ImportStats::default(),
            cancel: CancelToken::new(),
            on_start: None,
            on_complete: None,
            on_close: None,
        }
    }

    pub fn on_start(&mut self, hook: impl FnMut(&Path) + 'static) {
        self.on_start = Some(Box::new(hook));
    }

    pub fn on_complete(&mut self, hook: impl FnMut(&ImportStats) + 'static) {
        self.on_complete = Some(Box::new(hook));
    }

    pub fn on_close(&mut self, hook: impl FnMut() + 'static) {
        self.on_close = Some(Box::new(hook));
    }

    pub fn step(&self) -> WorkflowStep {
        self.step
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Field declarations may mount, update, and unmount at any time; they go
    /// through the registry, never at the workflow state directly.
    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FieldRegistry {
        &mut self.registry
    }

    pub fn file_state(&self) -> Option<&FileState> {
        self.file_state.as_ref()
    }

    pub fn assignments(&self) -> &FieldAssignments {
        &self.assignments
    }

    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    pub fn stats(&self) -> &ImportStats {
        &self.stats
    }

    pub fn skip_verification(&self) -> bool {
        self.skip_verification
    }

    pub fn queued_files(&self) -> usize {
        self.remaining.len()
    }

    /// True once the last queued file finished processing. The workflow then
    /// stays terminal until an explicit restart.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Handle the embedder (or the consumer itself) can use to request a
    /// cooperative stop at the next chunk boundary.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Selects one or more files. The first becomes the active file and is
    /// preview-parsed immediately; the rest wait in the queue. Replaces any
    /// previously selected, not-yet-accepted file wholesale.
    pub fn select_files(
        &mut self,
        paths: impl IntoIterator<Item = PathBuf>,
    ) -> Result<(), ImportError> {
        if self.step != WorkflowStep::AwaitingFile {
            return Err(ImportError::InvalidStep {
                operation: "select_files",
                step: self.step,
            });
        }
        let mut paths = paths.into_iter();
        let Some(active) = paths.next() else {
            return Ok(());
        };
        self.file_state = Some(parse_preview(&active, &self.config)?);
        self.remaining = paths.collect();
        info!(
            "Selected {active:?} ({} file(s) queued behind it)",
            self.remaining.len()
        );
        Ok(())
    }

    pub fn select_file(&mut self, path: PathBuf) -> Result<(), ImportError> {
        self.select_files([path])
    }

    /// Toggles the header flag on the active preview without re-reading.
    pub fn set_has_headers(&mut self, has_headers: bool) -> Result<(), ImportError> {
        match self.file_state.as_mut() {
            Some(state) => {
                state.set_has_headers(has_headers);
                Ok(())
            }
            None => Err(ImportError::InvalidStep {
                operation: "set_has_headers",
                step: self.step,
            }),
        }
    }

    /// Column previews derived on demand from the active preview.
    pub fn preview_columns(&self) -> Vec<ColumnPreview> {
        match &self.file_state {
            Some(state) => build_columns(state.first_rows(), state.has_headers()),
            None => Vec::new(),
        }
    }

    /// Accepts the active file. Moves to the fields step, or straight to
    /// processing when import-all already froze a mapping.
    pub fn accept_file(&mut self) -> Result<(), ImportError> {
        if self.step != WorkflowStep::AwaitingFile || self.file_state.is_none() {
            return Err(ImportError::InvalidStep {
                operation: "accept_file",
                step: self.step,
            });
        }
        self.file_accepted = true;
        if self.skip_verification && self.frozen.is_some() {
            debug!("Verification skipped; reusing the frozen assignment");
            self.step = WorkflowStep::Processing;
        } else {
            self.step = WorkflowStep::AwaitingFields;
        }
        Ok(())
    }

    /// Edits the live assignment map. Not available while a frozen mapping is
    /// being processed.
    pub fn assign(&mut self, field: &str, column: Option<usize>) -> Result<(), ImportError> {
        if self.step == WorkflowStep::Processing {
            return Err(ImportError::InvalidStep {
                operation: "assign",
                step: self.step,
            });
        }
        self.assignments.assign(field, column);
        Ok(())
    }

    /// Accepts the mapping and enters processing. Fails synchronously when a
    /// required field is unassigned; the workflow stays in the fields step.
    pub fn accept_fields(&mut self) -> Result<(), ImportError> {
        if self.step != WorkflowStep::AwaitingFields {
            return Err(ImportError::InvalidStep {
                operation: "accept_fields",
                step: self.step,
            });
        }
        self.frozen = Some(self.assignments.compile(&self.registry)?);
        self.fields_accepted = true;
        self.step = WorkflowStep::Processing;
        Ok(())
    }

    /// Returns to the file step, keeping the parsed preview so no re-parse is
    /// needed if the same file is accepted again.
    pub fn cancel_fields(&mut self) -> Result<(), ImportError> {
        if self.step != WorkflowStep::AwaitingFields {
            return Err(ImportError::InvalidStep {
                operation: "cancel_fields",
                step: self.step,
            });
        }
        self.file_accepted = false;
        self.step = WorkflowStep::AwaitingFile;
        Ok(())
    }

    /// Accepts the mapping for the active file and reuses it for every file
    /// still in the queue, bypassing their fields step. Irreversible for the
    /// remainder of the queue.
    pub fn import_all(&mut self) -> Result<(), ImportError> {
        if !self.config.allow_import_all {
            return Err(ImportError::ImportAllDisabled);
        }
        if self.step != WorkflowStep::AwaitingFields {
            return Err(ImportError::InvalidStep {
                operation: "import_all",
                step: self.step,
            });
        }
        self.frozen = Some(self.assignments.compile(&self.registry)?);
        self.fields_accepted = true;
        self.skip_verification = true;
        self.step = WorkflowStep::Processing;
        info!(
            "Import-all engaged; {} queued file(s) will reuse the current mapping",
            self.remaining.len()
        );
        Ok(())
    }

    /// Streams the active file into `consumer`, then advances the queue.
    ///
    /// On success the next queued file (if any) is preview-parsed and the
    /// workflow returns to the file step, or directly to processing under
    /// import-all. A consumer failure leaves the queue untouched and the
    /// progress status `Failed`; cancellation leaves the partial progress as
    /// it stood.
    pub fn process(&mut self, consumer: &mut dyn RowConsumer) -> Result<StreamOutcome, ImportError> {
        if self.step != WorkflowStep::Processing || self.finished {
            return Err(ImportError::InvalidStep {
                operation: "process",
                step: self.step,
            });
        }
        let (path, has_headers, total_raw_rows) = match &self.file_state {
            Some(state) => (
                state.path().to_path_buf(),
                state.has_headers(),
                state.known_raw_row_count(),
            ),
            None => {
                return Err(ImportError::InvalidStep {
                    operation: "process",
                    step: self.step,
                });
            }
        };
        let Some(assignment) = self.frozen.clone() else {
            return Err(ImportError::InvalidStep {
                operation: "process",
                step: self.step,
            });
        };

        if let Some(hook) = self.on_start.as_mut() {
            hook(&path);
        }
        self.progress = ProgressState::new();

        let outcome = stream_file(
            &path,
            &self.config,
            &assignment,
            has_headers,
            total_raw_rows,
            consumer,
            &mut self.progress,
            &self.cancel,
        )?;

        if let StreamOutcome::Completed { rows_skipped } = outcome {
            self.stats.files_processed += 1;
            self.stats.rows_processed += self.progress.rows_processed;
            self.stats.rows_skipped += rows_skipped;
            self.advance_queue()?;
        }
        Ok(outcome)
    }

    /// Restarts the workflow: drops the active file and, unless import-all is
    /// in effect, the field mapping. Pulls the next queued file forward when
    /// one exists, otherwise fully resets.
    pub fn restart(&mut self) -> Result<(), ImportError> {
        if !self.config.restartable {
            return Err(ImportError::RestartDisabled);
        }
        self.file_state = None;
        self.file_accepted = false;
        if !self.skip_verification {
            self.fields_accepted = false;
            self.assignments = FieldAssignments::new();
            self.frozen = None;
        }
        self.progress = ProgressState::new();
        self.finished = false;
        self.cancel = CancelToken::new();
        match self.remaining.pop_front() {
            Some(next) => self.activate(next),
            None => {
                self.step = WorkflowStep::AwaitingFile;
                info!("Workflow restarted with an empty queue");
                Ok(())
            }
        }
    }

    /// Fires the close hook; the embedder decides what closing means.
    pub fn close(&mut self) {
        if let Some(hook) = self.on_close.as_mut() {
            hook();
        }
    }

    fn advance_queue(&mut self) -> Result<(), ImportError> {
        match self.remaining.pop_front() {
            Some(next) => {
                if !self.skip_verification {
                    // A fresh file gets a fresh mapping unless import-all
                    // carried the previous one forward.
                    self.assignments = FieldAssignments::new();
                    self.frozen = None;
                    self.fields_accepted = false;
                }
                self.activate(next)
            }
            None => {
                self.finished = true;
                let stats = self.stats;
                if let Some(hook) = self.on_complete.as_mut() {
                    hook(&stats);
                }
                info!(
                    "Import finished: {} file(s), {} row(s), {} skipped",
                    stats.files_processed, stats.rows_processed, stats.rows_skipped
                );
                Ok(())
            }
        }
    }

    fn activate(&mut self, path: PathBuf) -> Result<(), ImportError> {
        self.file_state = Some(parse_preview(&path, &self.config)?);
        if self.skip_verification && self.frozen.is_some() {
            debug!("Dequeued {path:?} directly into processing");
            self.file_accepted = true;
            self.step = WorkflowStep::Processing;
        } else {
            debug!("Dequeued {path:?}; awaiting acceptance");
            self.file_accepted = false;
            self.step = WorkflowStep::AwaitingFile;
        }
        Ok(())
    }
}

impl fmt::Debug for ImportWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportWorkflow")
            .field("step", &self.step)
            .field("file_accepted", &self.file_accepted)
            .field("fields_accepted", &self.fields_accepted)
            .field("queued", &self.remaining.len())
            .field("skip_verification", &self.skip_verification)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
