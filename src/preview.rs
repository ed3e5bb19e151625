//! Bounded preview parsing and header-presence detection.
//!
//! The preview parser reads only a capped prefix of the file. It must never
//! fail on malformed content: ragged rows and undecodable bytes are recorded
//! as a non-fatal warning so the user can still inspect the file and react.
//! Only an unreadable file is fatal.

use std::path::{Path, PathBuf};

use log::debug;

use crate::{config::ImportConfig, error::ImportError, io_utils};

/// Rows examined when guessing whether the first row is a header.
const HEADER_DETECTION_SAMPLE_ROWS: usize = 6;

/// Upper bound on rows retained by the preview read. Large enough to expose a
/// representative first chunk, small enough to never approximate a full scan.
const FIRST_CHUNK_ROW_CAP: usize = 100;

const COMMON_HEADER_TOKENS: &[&str] = &[
    "id", "name", "email", "date", "time", "amount", "qty", "quantity", "price", "total",
    "description", "address", "city", "state", "zip", "postcode", "country", "phone", "status",
    "type", "category", "notes", "title", "first_name", "last_name", "full_name", "created_at",
    "updated_at", "username", "company", "currency",
];

/// Parsed preview of a selected file. Replaced wholesale when a new file is
/// selected; `has_headers` may be toggled afterwards without re-reading.
#[derive(Debug, Clone)]
pub struct FileState {
    path: PathBuf,
    has_headers: bool,
    first_rows: Vec<Vec<String>>,
    first_chunk: Vec<Vec<String>>,
    parse_warning: Option<String>,
    exhausted: bool,
}

impl FileState {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_headers(&self) -> bool {
        self.has_headers
    }

    /// Re-interprets the already-parsed rows; no file access happens here.
    pub fn set_has_headers(&mut self, has_headers: bool) {
        self.has_headers = has_headers;
    }

    /// Preview rows: a strict prefix of the file, header row included when
    /// one is present.
    pub fn first_rows(&self) -> &[Vec<String>] {
        &self.first_rows
    }

    /// The full bounded first chunk, of which `first_rows` is a prefix.
    pub fn first_chunk(&self) -> &[Vec<String>] {
        &self.first_chunk
    }

    pub fn parse_warning(&self) -> Option<&str> {
        self.parse_warning.as_deref()
    }

    /// True when the bounded read reached end of file, which makes the total
    /// row count known ahead of full streaming.
    pub fn exhausted(&self) -> bool {
        self.exhausted
    }

    /// Total raw rows in the file (header included), when determinable.
    pub fn known_raw_row_count(&self) -> Option<u64> {
        self.exhausted.then(|| self.first_chunk.len() as u64)
    }
}

/// Reads a bounded prefix of `path` and assembles a [`FileState`].
///
/// Header presence follows `config.has_headers` when forced, otherwise a
/// heuristic over the first few rows. Malformed content produces a
/// best-effort result with `parse_warning` set; only an I/O failure is fatal.
pub fn parse_preview(path: &Path, config: &ImportConfig) -> Result<FileState, ImportError> {
    let delimiter = io_utils::resolve_input_delimiter(path, config.delimiter);
    let encoding = io_utils::resolve_encoding(config.encoding.as_deref())?;
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter, config)?;

    let mut record = csv::ByteRecord::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut decode_trouble = false;
    let mut tokenizer_trouble = false;
    let mut exhausted = true;

    while rows.len() <= FIRST_CHUNK_ROW_CAP {
        match reader.read_byte_record(&mut record) {
            Ok(true) => {
                let (cells, had_errors) = io_utils::decode_record_lossy(&record, encoding);
                decode_trouble |= had_errors;
                rows.push(cells);
            }
            Ok(false) => break,
            Err(err) => {
                // Best effort: keep what parsed so far and warn.
                debug!("Preview tokenizer error in {path:?}: {err}");
                tokenizer_trouble = true;
                exhausted = false;
                break;
            }
        }
    }
    if rows.len() > FIRST_CHUNK_ROW_CAP {
        rows.truncate(FIRST_CHUNK_ROW_CAP);
        exhausted = false;
    }

    let has_headers = config
        .has_headers
        .unwrap_or_else(|| match rows.split_first() {
            Some((first, rest)) => {
                let sample_end = rest.len().min(HEADER_DETECTION_SAMPLE_ROWS - 1);
                infer_has_header(first, &rest[..sample_end])
            }
            None => true,
        });

    let widths: Vec<usize> = rows.iter().map(Vec::len).collect();
    let ragged = widths.windows(2).any(|pair| pair[0] != pair[1]);

    let mut warnings = Vec::new();
    if tokenizer_trouble {
        warnings.push("the file could not be fully tokenized; preview is truncated".to_string());
    }
    if decode_trouble {
        warnings.push(format!(
            "some characters could not be decoded as {}",
            encoding.name()
        ));
    }
    if ragged {
        warnings.push("rows have inconsistent column counts".to_string());
    }
    let parse_warning = if warnings.is_empty() {
        None
    } else {
        Some(warnings.join("; "))
    };

    let first_rows = rows
        .iter()
        .take(config.preview_row_cap.max(1))
        .cloned()
        .collect();

    debug!(
        "Preview of {path:?}: {} row(s), headers={has_headers}, exhausted={exhausted}",
        rows.len()
    );

    Ok(FileState {
        path: path.to_path_buf(),
        has_headers,
        first_rows,
        first_chunk: rows,
        parse_warning,
        exhausted,
    })
}

fn token_is_common_header(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return false;
    }
    let sanitized = normalized
        .chars()
        .map(|ch| match ch {
            ' ' | '-' | '/' => '_',
            other => other,
        })
        .collect::<String>();
    COMMON_HEADER_TOKENS
        .iter()
        .any(|token| normalized == *token || sanitized == *token)
}

fn looks_like_iso_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() >= 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit)
}

fn value_is_data_like(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    let lowered = trimmed.to_ascii_lowercase();
    if matches!(
        lowered.as_str(),
        "true" | "false" | "t" | "f" | "yes" | "no" | "y" | "n"
    ) {
        return true;
    }
    if trimmed.parse::<i64>().is_ok() || trimmed.parse::<f64>().is_ok() {
        return true;
    }
    looks_like_iso_date(trimmed)
}

fn value_is_header_like(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    if value_is_data_like(trimmed) {
        return false;
    }
    trimmed.chars().any(|c| c.is_ascii_alphabetic()) || token_is_common_header(trimmed)
}

fn header_tokens_match_dictionary(row: &[String]) -> bool {
    row.iter()
        .filter(|value| token_is_common_header(value.trim()))
        .count()
        >= 2
}

/// Column-wise vote: a first row whose cells read as labels above cells that
/// read as data is a header; ties fall back to the token dictionary.
fn infer_has_header(first_row: &[String], other_rows: &[Vec<String>]) -> bool {
    let header_like_first = first_row
        .iter()
        .filter(|value| value_is_header_like(value))
        .count();
    let data_like_first = first_row
        .iter()
        .filter(|value| value_is_data_like(value))
        .count();

    if header_like_first == 0 && data_like_first == 0 {
        return false;
    }

    if data_like_first > header_like_first {
        return false;
    }

    if other_rows.is_empty() {
        return header_like_first >= 2 || header_tokens_match_dictionary(first_row);
    }

    let mut header_signal = 0usize;
    let mut data_signal = 0usize;

    for column in 0..first_row.len() {
        let first_value = first_row.get(column).map(String::as_str).unwrap_or("");
        let first_is_header = value_is_header_like(first_value);
        let first_is_data = value_is_data_like(first_value);

        let mut other_has_data = false;
        for row in other_rows {
            if let Some(value) = row.get(column)
                && value_is_data_like(value)
            {
                other_has_data = true;
                break;
            }
        }

        if first_is_header && other_has_data {
            header_signal += 1;
        } else if first_is_data && other_has_data {
            data_signal += 1;
        }
    }

    if header_signal > data_signal {
        return true;
    }
    if data_signal > header_signal {
        return false;
    }

    if header_tokens_match_dictionary(first_row) && header_like_first >= 1 {
        return true;
    }

    header_like_first > data_like_first
}
