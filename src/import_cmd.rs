//! Non-interactive driver for the `import` subcommand: declares fields,
//! resolves column assignments, and streams every input file into a JSON
//! Lines sink through the workflow engine.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use itertools::Itertools;
use log::{debug, info};

use crate::{
    assign::Record,
    cli::ImportArgs,
    columns::ColumnPreview,
    config::ImportConfig,
    error::ConsumerFailure,
    fields::FieldDescriptor,
    stream::{ChunkInfo, RowConsumer},
    workflow::{ImportWorkflow, WorkflowStep},
};

pub fn execute(args: &ImportArgs) -> Result<()> {
    let config = ImportConfig {
        delimiter: args.delimiter,
        has_headers: args.header_override(),
        encoding: args.input_encoding.clone(),
        chunk_size: args.chunk_size,
        allow_import_all: args.import_all,
        row_error_limit: args.row_error_limit,
        ..ImportConfig::default()
    };

    let specs = args
        .fields
        .iter()
        .map(|spec| FieldSpec::parse(spec))
        .collect::<Result<Vec<_>>>()?;
    let explicit = parse_maps(&args.maps)?;

    info!(
        "Importing {} file(s) -> {}",
        args.inputs.len(),
        args.output
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".into())
    );

    let mut workflow = ImportWorkflow::new(config);
    for spec in specs {
        workflow
            .registry_mut()
            .register(spec.name, spec.label, spec.optional);
    }
    workflow.on_start(|path| info!("Processing {path:?}"));
    workflow.on_complete(|stats| {
        info!(
            "Imported {} row(s) from {} file(s), {} row(s) skipped",
            stats.rows_processed, stats.files_processed, stats.rows_skipped
        );
    });

    workflow.select_files(args.inputs.iter().cloned())?;
    let mut sink = JsonLinesSink::new(open_output(args.output.as_deref())?);

    workflow.accept_file()?;
    loop {
        match workflow.step() {
            WorkflowStep::AwaitingFile => workflow.accept_file()?,
            WorkflowStep::AwaitingFields => {
                if let Some(warning) = workflow.file_state().and_then(|s| s.parse_warning()) {
                    log::warn!("Preview warning: {warning}");
                }
                apply_mappings(&mut workflow, &explicit)?;
                if args.import_all {
                    workflow.import_all()?;
                } else {
                    workflow.accept_fields()?;
                }
            }
            WorkflowStep::Processing => {
                workflow.process(&mut sink)?;
                for error in &workflow.progress().row_errors {
                    log::warn!("Row {}: {}", error.row_index, error.message);
                }
                if workflow.is_finished() {
                    break;
                }
            }
        }
    }

    sink.flush()?;
    workflow.close();
    Ok(())
}

struct FieldSpec {
    name: String,
    label: String,
    optional: bool,
}

impl FieldSpec {
    /// Accepts `name`, `name:optional`, `name=Label`, `name:optional=Label`.
    fn parse(spec: &str) -> Result<Self> {
        let (head, label) = match spec.split_once('=') {
            Some((head, label)) => (head, Some(label)),
            None => (spec, None),
        };
        let (name, optional) = match head.split_once(':') {
            Some((name, "optional")) => (name, true),
            Some((_, flag)) => {
                return Err(anyhow!("Unknown field flag '{flag}' in '{spec}'"));
            }
            None => (head, false),
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("Field declaration '{spec}' is missing a name"));
        }
        Ok(FieldSpec {
            name: name.to_string(),
            label: label.unwrap_or(name).trim().to_string(),
            optional,
        })
    }
}

fn parse_maps(maps: &[String]) -> Result<Vec<(String, usize)>> {
    maps.iter()
        .map(|entry| {
            let (field, column) = entry
                .split_once('=')
                .ok_or_else(|| anyhow!("Mapping '{entry}' must look like field=COLUMN"))?;
            let index = column
                .trim()
                .parse::<usize>()
                .with_context(|| format!("Parsing column index in '{entry}'"))?;
            Ok((field.trim().to_string(), index))
        })
        .collect()
}

/// Explicit `--map` entries win; otherwise fields are matched to header
/// labels, or positionally for headerless files.
fn apply_mappings(workflow: &mut ImportWorkflow, explicit: &[(String, usize)]) -> Result<()> {
    if !explicit.is_empty() {
        for (field, column) in explicit {
            workflow.assign(field, Some(*column))?;
        }
        return Ok(());
    }

    let columns = workflow.preview_columns();
    let has_headers = workflow
        .file_state()
        .is_some_and(|state| state.has_headers());
    let planned = workflow
        .registry()
        .current()
        .iter()
        .enumerate()
        .map(|(position, field)| {
            let column = if has_headers {
                find_header_match(&columns, field)
            } else {
                (position < columns.len()).then_some(position)
            };
            (field.name.clone(), column)
        })
        .collect_vec();

    for (field, column) in planned {
        match column {
            Some(index) => workflow.assign(&field, Some(index))?,
            None => debug!("No column matched field '{field}'"),
        }
    }
    Ok(())
}

fn find_header_match(columns: &[ColumnPreview], field: &FieldDescriptor) -> Option<usize> {
    columns
        .iter()
        .find(|column| {
            column.header.as_deref().is_some_and(|header| {
                let normalized = normalize_label(header);
                normalized == normalize_label(&field.name)
                    || normalized == normalize_label(&field.label)
            })
        })
        .map(|column| column.index)
}

fn normalize_label(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|ch| match ch {
            ' ' | '-' | '/' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) => Ok(Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        ))),
        None => Ok(Box::new(std::io::stdout())),
    }
}

struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    fn new(writer: W) -> Self {
        Self { writer }
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Flushing output")
    }
}

impl<W: Write> RowConsumer for JsonLinesSink<W> {
    fn process_chunk(
        &mut self,
        records: Vec<Record>,
        _info: &ChunkInfo,
    ) -> Result<(), ConsumerFailure> {
        for record in &records {
            serde_json::to_writer(&mut self.writer, record)
                .map_err(|err| ConsumerFailure::new(format!("writing JSON record: {err}")))?;
            self.writer
                .write_all(b"\n")
                .map_err(|err| ConsumerFailure::new(format!("writing record terminator: {err}")))?;
        }
        Ok(())
    }
}
