//! Full-file chunked streaming into an external row consumer.
//!
//! The file is re-parsed from row zero (the preview prefix is only a sample),
//! mapped through the frozen assignment, and delivered in bounded batches.
//! Delivery is a blocking call into the consumer, so at most one batch is
//! ever in flight and the consumer controls pacing. Cancellation is
//! cooperative, checked at chunk boundaries only.

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, info};

use crate::{
    assign::{CompiledAssignment, Record},
    config::ImportConfig,
    error::{ConsumerFailure, ImportError},
    io_utils,
};

/// External row handler. Called once per batch; a failure aborts the current
/// file and is surfaced to the caller, never retried here.
pub trait RowConsumer {
    fn process_chunk(&mut self, records: Vec<Record>, info: &ChunkInfo)
    -> Result<(), ConsumerFailure>;
}

/// Position metadata delivered alongside each batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Data-row index of the first row covered by this batch.
    pub start_index: u64,
    /// Total data rows in the file, when the preview pass determined it.
    pub row_count: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    Parsing,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub row_index: u64,
    pub message: String,
}

/// Incremental progress for the active file. Terminal once `status` leaves
/// `Parsing`; a cancelled run is left in whatever partial state it reached.
#[derive(Debug, Clone)]
pub struct ProgressState {
    pub rows_processed: u64,
    pub row_errors: Vec<RowError>,
    pub status: ImportStatus,
}

impl ProgressState {
    pub fn new() -> Self {
        Self {
            rows_processed: 0,
            row_errors: Vec::new(),
            status: ImportStatus::Parsing,
        }
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative cancellation handle. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed { rows_skipped: u64 },
    /// Stopped at a chunk boundary; no partial batch was delivered twice.
    Cancelled,
}

/// Streams `path` through `assignment` into `consumer` in batches of
/// `config.chunk_size` rows.
///
/// Rows that fail to map are recorded into `progress.row_errors` and skipped;
/// a consumer failure or an exceeded row-error limit sets `status = Failed`
/// and returns the error. Rows are delivered in strictly increasing order,
/// exactly once each.
pub fn stream_file(
    path: &Path,
    config: &ImportConfig,
    assignment: &CompiledAssignment,
    has_headers: bool,
    total_raw_rows: Option<u64>,
    consumer: &mut dyn RowConsumer,
    progress: &mut ProgressState,
    cancel: &CancelToken,
) -> Result<StreamOutcome, ImportError> {
    let delimiter = io_utils::resolve_input_delimiter(path, config.delimiter);
    let encoding = io_utils::resolve_encoding(config.encoding.as_deref())?;
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter, config)?;

    let chunk_size = config.chunk_size.max(1);
    let row_count = total_raw_rows.map(|raw| {
        if has_headers {
            raw.saturating_sub(1)
        } else {
            raw
        }
    });

    info!(
        "Streaming {path:?} in chunk(s) of {chunk_size} row(s) (headers={has_headers}, delimiter '{}')",
        io_utils::printable_delimiter(delimiter)
    );

    let mut record = csv::ByteRecord::new();
    let mut raw_index = 0u64;
    let mut data_index = 0u64;
    let mut skipped = 0u64;
    let mut end_of_file = false;

    while !end_of_file {
        if cancel.is_cancelled() {
            debug!("Cancellation observed after {} delivered row(s)", progress.rows_processed);
            return Ok(StreamOutcome::Cancelled);
        }

        let batch_start = data_index;
        let mut batch: Vec<Record> = Vec::with_capacity(chunk_size);

        while batch.len() < chunk_size {
            match reader.read_byte_record(&mut record) {
                Ok(false) => {
                    end_of_file = true;
                    break;
                }
                Ok(true) => {
                    let is_header_row = has_headers && raw_index == 0;
                    raw_index += 1;
                    if is_header_row {
                        continue;
                    }
                    let (cells, had_decode_errors) =
                        io_utils::decode_record_lossy(&record, encoding);
                    if had_decode_errors {
                        progress.row_errors.push(RowError {
                            row_index: data_index,
                            message: format!(
                                "characters could not be decoded as {}",
                                encoding.name()
                            ),
                        });
                    }
                    match assignment.apply(&cells) {
                        Ok(mapped) => batch.push(mapped),
                        Err(err) => {
                            progress.row_errors.push(RowError {
                                row_index: data_index,
                                message: err.to_string(),
                            });
                            skipped += 1;
                            if let Some(limit) = config.row_error_limit
                                && skipped as usize > limit
                            {
                                progress.status = ImportStatus::Failed;
                                return Err(ImportError::RowErrorLimit {
                                    limit,
                                    skipped: skipped as usize,
                                });
                            }
                        }
                    }
                    data_index += 1;
                }
                Err(err) => {
                    let message = err.to_string();
                    match err.into_kind() {
                        csv::ErrorKind::Io(source) => {
                            progress.status = ImportStatus::Failed;
                            return Err(ImportError::Read {
                                path: path.to_path_buf(),
                                source,
                            });
                        }
                        _ => {
                            // Tokenizer-level trouble on one record: note it
                            // against the next data row and keep reading.
                            progress.row_errors.push(RowError {
                                row_index: data_index,
                                message: format!("row could not be tokenized: {message}"),
                            });
                            raw_index += 1;
                        }
                    }
                }
            }
        }

        if !batch.is_empty() {
            let info = ChunkInfo {
                start_index: batch_start,
                row_count,
            };
            let delivered = batch.len() as u64;
            if let Err(failure) = consumer.process_chunk(batch, &info) {
                progress.status = ImportStatus::Failed;
                return Err(ImportError::Consumer {
                    start_index: info.start_index,
                    reason: failure.to_string(),
                });
            }
            progress.rows_processed += delivered;
        }
    }

    progress.status = ImportStatus::Complete;
    info!(
        "Finished {path:?}: {} row(s) delivered, {skipped} skipped",
        progress.rows_processed
    );
    Ok(StreamOutcome::Completed {
        rows_skipped: skipped,
    })
}
