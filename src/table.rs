//! In-memory relational table handed to the host for each select.

use crate::error::RuntimeError;
use crate::value::{Value, ValueType};

/// Label of a projection that has neither an alias nor an inferable name.
pub const NO_COLUMN_NAME: &str = "(No column name)";

/// Output column of a select, as settled by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub label: String,
    pub ordinal: usize,
    pub value_type: ValueType,
}

impl Column {
    pub fn new(label: impl Into<String>, ordinal: usize, value_type: ValueType) -> Self {
        Column {
            label: label.into(),
            ordinal,
            value_type,
        }
    }
}

/// Ordered rows of typed cells under a fixed column sequence.
///
/// Columns are bound when the table is created; rows can only be appended,
/// and each must be exactly as wide as the column sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeTable {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl RuntimeTable {
    pub fn new(columns: Vec<Column>) -> Self {
        RuntimeTable {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), RuntimeError> {
        if row.len() != self.columns.len() {
            return Err(RuntimeError::RowWidth {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column labels in declaration order.
    pub fn labels(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.label.as_str()).collect()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Raw cell, `None` only when out of range.
    pub fn value(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Cell value, `None` when the cell is null (or out of range).
    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.value(row, column).filter(|v| !v.is_null())
    }

    /// Textual form of a cell, `None` when the cell is null.
    pub fn text(&self, row: usize, column: usize) -> Option<String> {
        self.cell(row, column).map(Value::to_string)
    }

    pub fn row(&self, index: usize) -> Option<&[Value]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Value]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }
}
