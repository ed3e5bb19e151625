//! Field-to-column assignment and per-row record construction.

use std::collections::BTreeMap;

use crate::{
    error::{ImportError, RowTransformError},
    fields::FieldRegistry,
};

/// One emitted row: field name to cell value. Optional fields with no
/// assignment (or no cell in a ragged row) are simply absent.
pub type Record = BTreeMap<String, String>;

/// Mutable mapping from field name to source column index, edited during the
/// fields step. No column may serve two fields: assigning a column that is
/// already taken clears the previous holder (last writer wins per column).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldAssignments {
    columns: BTreeMap<String, usize>,
}

impl FieldAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, field: &str, column: Option<usize>) {
        match column {
            Some(index) => {
                self.columns.retain(|_, assigned| *assigned != index);
                self.columns.insert(field.to_string(), index);
            }
            None => {
                self.columns.remove(field);
            }
        }
    }

    pub fn column_for(&self, field: &str) -> Option<usize> {
        self.columns.get(field).copied()
    }

    pub fn field_for(&self, column: usize) -> Option<&str> {
        self.columns
            .iter()
            .find(|(_, assigned)| **assigned == column)
            .map(|(field, _)| field.as_str())
    }

    pub fn assigned_count(&self) -> usize {
        self.columns.len()
    }

    /// Required fields in the registry that have no column yet, in registry
    /// order.
    pub fn missing_required(&self, registry: &FieldRegistry) -> Vec<String> {
        registry
            .current()
            .iter()
            .filter(|field| !field.optional && !self.columns.contains_key(&field.name))
            .map(|field| field.name.clone())
            .collect()
    }

    /// True iff every non-optional field in the registry is assigned.
    pub fn is_complete(&self, registry: &FieldRegistry) -> bool {
        self.missing_required(registry).is_empty()
    }

    /// Freezes the mapping against the current registry for full-file
    /// processing. Rejected synchronously when required fields are missing.
    pub fn compile(&self, registry: &FieldRegistry) -> Result<CompiledAssignment, ImportError> {
        let missing = self.missing_required(registry);
        if !missing.is_empty() {
            return Err(ImportError::AssignmentIncomplete { missing });
        }
        let bindings = registry
            .current()
            .iter()
            .filter_map(|field| {
                self.columns.get(&field.name).map(|&column| Binding {
                    field: field.name.clone(),
                    column,
                    optional: field.optional,
                })
            })
            .collect();
        Ok(CompiledAssignment { bindings })
    }
}

#[derive(Debug, Clone)]
struct Binding {
    field: String,
    column: usize,
    optional: bool,
}

/// Immutable, resolved mapping applied once per row during streaming, so it
/// stays a straight walk over precomputed bindings.
#[derive(Debug, Clone)]
pub struct CompiledAssignment {
    bindings: Vec<Binding>,
}

impl CompiledAssignment {
    /// Builds a record from one raw row. A ragged row missing the cell of a
    /// required field fails; a missing optional cell is omitted.
    pub fn apply(&self, cells: &[String]) -> Result<Record, RowTransformError> {
        let mut record = Record::new();
        for binding in &self.bindings {
            match cells.get(binding.column) {
                Some(value) => {
                    record.insert(binding.field.clone(), value.clone());
                }
                None if binding.optional => {}
                None => {
                    return Err(RowTransformError {
                        field: binding.field.clone(),
                    });
                }
            }
        }
        Ok(record)
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }
}
