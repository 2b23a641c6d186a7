//! A minimal tabular input for bulk merges.
//!
//! A [`Frame`] is a list of column names and rows of JSON cells. Missing-value
//! markers (empty cells, `NaN`, `nan`, `NA`, `null`, non-finite floats) are
//! normalized to `null` when the frame is built.

use std::collections::HashMap;
use std::io::Read;

use serde_json::Value;

use crate::error::{NeontologyError, Result};
use crate::value::Properties;

const MISSING: &[&str] = &["", "NaN", "nan", "NA", "null"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    /// Build from columns and rows; every row must have one cell per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(NeontologyError::InvalidRecord(format!(
                "row {i} has {} cells, expected {}",
                row.len(),
                columns.len()
            )));
        }
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(normalize).collect())
            .collect();
        Ok(Frame { columns, rows })
    }

    /// Build from property maps. Columns are the union of keys, in first-seen
    /// order; absent keys become `null`.
    pub fn from_records(records: &[Properties]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        let rows = records
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| r.get(c).cloned().map(normalize).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Frame { columns, rows }
    }

    /// Read a CSV document with a header row. Cells are typed as integer,
    /// float or boolean when they parse as one, and kept as strings otherwise.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let columns = reader.headers()?.iter().map(str::to_owned).collect::<Vec<_>>();
        let rows = reader
            .records()
            .map(|record| Ok(record?.iter().map(infer_cell).collect()))
            .collect::<Result<Vec<Vec<Value>>>>()?;
        Frame::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as property maps, null cells included.
    pub fn records(&self) -> Vec<Properties> {
        self.rows
            .iter()
            .map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }

    /// Collapse rows identical across all columns.
    ///
    /// Returns the unique records (first occurrence order) and, for every
    /// original row, the index of its unique record.
    pub fn deduplicate(&self) -> (Vec<Properties>, Vec<usize>) {
        let mut unique: Vec<&Vec<Value>> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::with_capacity(self.rows.len());
        let mut positions = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let index = *seen.entry(row_key(row)).or_insert_with(|| {
                unique.push(row);
                unique.len() - 1
            });
            positions.push(index);
        }
        let records = unique
            .into_iter()
            .map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect();
        (records, positions)
    }
}

/// Cells in their JSON form, comma-joined. Strings stay quoted, so the key
/// is unambiguous.
fn row_key(row: &[Value]) -> String {
    row.iter().map(Value::to_string).collect::<Vec<_>>().join(",")
}

fn normalize(value: Value) -> Value {
    match value {
        Value::String(s) if MISSING.contains(&s.as_str()) => Value::Null,
        Value::Number(n) if n.as_f64().map_or(false, |f| !f.is_finite()) => Value::Null,
        other => other,
    }
}

fn infer_cell(cell: &str) -> Value {
    if MISSING.contains(&cell) {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = cell.parse::<f64>() {
        return serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null);
    }
    match cell {
        "true" | "True" => Value::Bool(true),
        "false" | "False" => Value::Bool(false),
        _ => Value::String(cell.to_owned()),
    }
}
