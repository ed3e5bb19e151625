#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

use csv_importer::{
    assign::Record,
    error::ConsumerFailure,
    stream::{CancelToken, ChunkInfo, RowConsumer},
};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }
}

/// Row consumer that records every delivered batch, and can be told to fail
/// or to trigger cooperative cancellation at a given call index.
pub struct RecordingConsumer {
    pub chunks: Vec<(ChunkInfo, Vec<Record>)>,
    pub fail_on_call: Option<usize>,
    pub cancel_on_call: Option<(usize, CancelToken)>,
}

impl RecordingConsumer {
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            fail_on_call: None,
            cancel_on_call: None,
        }
    }

    pub fn failing_at(call: usize) -> Self {
        let mut consumer = Self::new();
        consumer.fail_on_call = Some(call);
        consumer
    }

    pub fn cancelling_at(call: usize, token: CancelToken) -> Self {
        let mut consumer = Self::new();
        consumer.cancel_on_call = Some((call, token));
        consumer
    }

    /// All delivered records in delivery order.
    pub fn records(&self) -> Vec<&Record> {
        self.chunks
            .iter()
            .flat_map(|(_, records)| records.iter())
            .collect()
    }
}

impl RowConsumer for RecordingConsumer {
    fn process_chunk(
        &mut self,
        records: Vec<Record>,
        info: &ChunkInfo,
    ) -> Result<(), ConsumerFailure> {
        let call = self.chunks.len();
        if self.fail_on_call == Some(call) {
            return Err(ConsumerFailure::new("sink rejected batch"));
        }
        self.chunks.push((*info, records));
        if let Some((at, token)) = &self.cancel_on_call
            && call >= *at
        {
            token.cancel();
        }
        Ok(())
    }
}

/// Builds a record literal for assertions.
pub fn record(pairs: &[(&str, &str)]) -> Record {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect()
}
