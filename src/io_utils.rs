//! Reader construction, delimiter resolution, and input decoding.
//!
//! Every read the engine performs flows through this module. Readers are
//! always built with `has_headers(false)` because header presence is a
//! user-togglable flag, not a tokenizer concern: the header row must stay
//! visible as row zero so the preview can re-interpret it without re-reading.

use std::{
    fs::File,
    io::BufReader,
    path::Path,
};

use encoding_rs::{Encoding, UTF_8};

use crate::{config::ImportConfig, error::ImportError};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding, ImportError> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes()).ok_or_else(|| {
            ImportError::UnknownEncoding {
                label: value.to_string(),
            }
        }),
        None => Ok(UTF_8),
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Builds a raw-row reader over any input. `flexible` is on so that ragged
/// rows surface as short records instead of hard errors.
pub fn open_csv_reader<R>(reader: R, delimiter: u8, config: &ImportConfig) -> csv::Reader<R>
where
    R: std::io::Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .quote(config.quote)
        .escape(config.escape)
        .double_quote(config.escape.is_none())
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
    config: &ImportConfig,
) -> Result<csv::Reader<BufReader<File>>, ImportError> {
    let file = File::open(path).map_err(|source| ImportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(open_csv_reader(BufReader::new(file), delimiter, config))
}

/// Decodes one record best-effort: undecodable bytes become replacement
/// characters and the flag reports that it happened, so callers can record a
/// warning without losing the row.
pub fn decode_record_lossy(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> (Vec<String>, bool) {
    let mut had_errors = false;
    let cells = record
        .iter()
        .map(|field| {
            let (text, _, errors) = encoding.decode(field);
            had_errors |= errors;
            text.into_owned()
        })
        .collect();
    (cells, had_errors)
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
