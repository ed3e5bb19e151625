use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Guided CSV import: preview, map columns to fields, stream records", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Preview a CSV file: detected headers, columns, and sample rows
    Preview(PreviewArgs),
    /// Import one or more CSV files into JSON Lines records
    Import(ImportArgs),
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Input CSV file to preview
    #[arg(short, long)]
    pub input: PathBuf,
    /// Number of preview rows to retain
    #[arg(long, default_value_t = 5)]
    pub rows: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Treat the first row as a header instead of guessing
    #[arg(long, conflicts_with = "no_headers")]
    pub headers: bool,
    /// Treat the first row as data instead of guessing
    #[arg(long)]
    pub no_headers: bool,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Input CSV files; the first is active, the rest are queued
    #[arg(short, long, num_args = 1.., required = true)]
    pub inputs: Vec<PathBuf>,
    /// Field declarations such as `id`, `note:optional`, or `qty:optional=Quantity`
    #[arg(short, long = "field", action = clap::ArgAction::Append, required = true)]
    pub fields: Vec<String>,
    /// Explicit assignments such as `id=0` (default: match fields to header labels)
    #[arg(short = 'M', long = "map", action = clap::ArgAction::Append)]
    pub maps: Vec<String>,
    /// Destination JSON Lines file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Rows per batch delivered to the sink
    #[arg(long, default_value_t = 100)]
    pub chunk_size: usize,
    /// Reuse the first file's mapping for every queued file
    #[arg(long = "import-all")]
    pub import_all: bool,
    /// Abort a file after this many rows fail to map
    #[arg(long)]
    pub row_error_limit: Option<usize>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Treat the first row of each file as a header instead of guessing
    #[arg(long, conflicts_with = "no_headers")]
    pub headers: bool,
    /// Treat the first row of each file as data instead of guessing
    #[arg(long)]
    pub no_headers: bool,
}

impl ImportArgs {
    pub fn header_override(&self) -> Option<bool> {
        header_override(self.headers, self.no_headers)
    }
}

impl PreviewArgs {
    pub fn header_override(&self) -> Option<bool> {
        header_override(self.headers, self.no_headers)
    }
}

fn header_override(headers: bool, no_headers: bool) -> Option<bool> {
    if headers {
        Some(true)
    } else if no_headers {
        Some(false)
    } else {
        None
    }
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
