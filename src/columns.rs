//! Column previews derived from the parsed preview rows.

use serde::Serialize;

/// One source column as shown to the user while mapping fields. Derived,
/// read-only data: recomputed whenever the preview or the header flag
/// changes, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnPreview {
    pub index: usize,
    /// Header cell for this column, when the file has a header row.
    pub header: Option<String>,
    /// Sample values drawn from the preview rows.
    pub values: Vec<String>,
}

impl ColumnPreview {
    /// Header label, or a synthesized positional label for headerless files.
    pub fn display_label(&self) -> String {
        match &self.header {
            Some(header) if !header.trim().is_empty() => header.clone(),
            _ => format!("column_{}", self.index),
        }
    }
}

/// Derives the column list from preview rows. Pure: same inputs always yield
/// the same output. Column count is the widest row observed; ragged rows are
/// padded with empty cells rather than dropped.
pub fn build_columns(first_rows: &[Vec<String>], has_headers: bool) -> Vec<ColumnPreview> {
    let width = first_rows.iter().map(Vec::len).max().unwrap_or(0);
    let (header_row, sample_rows) = if has_headers {
        (first_rows.first(), first_rows.get(1..).unwrap_or_default())
    } else {
        (None, first_rows)
    };

    (0..width)
        .map(|index| ColumnPreview {
            index,
            header: header_row.and_then(|row| row.get(index)).cloned(),
            values: sample_rows
                .iter()
                .map(|row| row.get(index).cloned().unwrap_or_default())
                .collect(),
        })
        .collect()
}
