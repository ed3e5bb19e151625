pub mod assign;
pub mod cli;
pub mod columns;
pub mod config;
pub mod error;
pub mod fields;
pub mod import_cmd;
pub mod io_utils;
pub mod preview;
pub mod stream;
pub mod table;
pub mod workflow;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, info, warn};

use crate::cli::{Cli, Commands, PreviewArgs};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_importer", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Preview(args) => handle_preview(&args),
        Commands::Import(args) => import_cmd::execute(&args),
    }
}

fn handle_preview(args: &PreviewArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    info!(
        "Previewing '{}' with delimiter '{}'",
        args.input.display(),
        io_utils::printable_delimiter(delimiter)
    );

    let config = config::ImportConfig {
        delimiter: args.delimiter,
        has_headers: args.header_override(),
        encoding: args.input_encoding.clone(),
        preview_row_cap: args.rows,
        ..config::ImportConfig::default()
    };
    let state = preview::parse_preview(&args.input, &config)?;
    let columns = columns::build_columns(state.first_rows(), state.has_headers());

    let headers = columns
        .iter()
        .map(columns::ColumnPreview::display_label)
        .collect::<Vec<_>>();
    let sample_depth = columns
        .iter()
        .map(|column| column.values.len())
        .max()
        .unwrap_or(0);
    let rows = (0..sample_depth)
        .map(|row| {
            columns
                .iter()
                .map(|column| column.values.get(row).cloned().unwrap_or_default())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);

    if let Some(warning) = state.parse_warning() {
        warn!("Preview warning: {warning}");
    }
    info!(
        "Detected {} column(s); first row {} a header",
        columns.len(),
        if state.has_headers() { "is" } else { "is not" }
    );
    Ok(())
}
