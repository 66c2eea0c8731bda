//! Named, schema-bound tables that live for one run of a script.

use std::collections::HashMap;

use crate::error::RuntimeError;
use crate::value::{Value, ValueType};

#[derive(Debug, Clone, PartialEq)]
pub struct BufferColumn {
    pub name: String,
    pub value_type: ValueType,
    pub identity: bool,
}

/// Declared columns of a buffer. At most one column is an identity column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BufferSchema {
    pub columns: Vec<BufferColumn>,
}

impl BufferSchema {
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn identity(&self) -> Option<usize> {
        self.columns.iter().position(|c| c.identity)
    }

    /// Indices of the columns an insert fills when it names no columns.
    pub fn insertable(&self) -> Vec<usize> {
        (0..self.columns.len())
            .filter(|&i| !self.columns[i].identity)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Buffer {
    pub name: String,
    pub schema: BufferSchema,
    next_identity: i64,
    rows: Vec<Vec<Value>>,
}

impl Buffer {
    pub fn new(name: impl Into<String>, schema: BufferSchema) -> Self {
        Buffer {
            name: name.into(),
            schema,
            next_identity: 1,
            rows: Vec::new(),
        }
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Appends one row built from `values` placed at `targets`.
    ///
    /// The identity column, if any, gets the next counter value; columns
    /// not targeted stay null. Returns the assigned identity.
    pub fn insert(&mut self, targets: &[usize], values: Vec<Value>) -> Result<Option<i64>, RuntimeError> {
        if targets.len() != values.len() {
            return Err(RuntimeError::RowWidth {
                expected: targets.len(),
                found: values.len(),
            });
        }

        let mut row = vec![Value::Null; self.schema.columns.len()];
        for (&index, value) in targets.iter().zip(values) {
            let column = &self.schema.columns[index];
            let text = value.to_string();
            row[index] = value
                .convert_to(column.value_type)
                .ok_or_else(|| RuntimeError::Conversion {
                    buffer: self.name.clone(),
                    column: column.name.clone(),
                    value: text,
                    target: column.value_type,
                })?;
        }

        let identity = self.schema.identity().map(|index| {
            let id = self.next_identity;
            row[index] = Value::Integer(id);
            id
        });

        self.rows.push(row);
        if identity.is_some() {
            self.next_identity += 1;
        }
        Ok(identity)
    }

}

/// All buffers of one script run, by name.
#[derive(Debug, Default)]
pub struct BufferStore {
    buffers: HashMap<String, Buffer>,
}

impl BufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, name: &str, schema: BufferSchema) -> Result<(), RuntimeError> {
        if self.buffers.contains_key(name) {
            return Err(RuntimeError::DuplicateBuffer(name.to_string()));
        }
        self.buffers
            .insert(name.to_string(), Buffer::new(name, schema));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Buffer, RuntimeError> {
        self.buffers
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownBuffer(name.to_string()))
    }

    pub fn insert(
        &mut self,
        name: &str,
        targets: &[usize],
        values: Vec<Value>,
    ) -> Result<Option<i64>, RuntimeError> {
        self.buffers
            .get_mut(name)
            .ok_or_else(|| RuntimeError::UnknownBuffer(name.to_string()))?
            .insert(targets, values)
    }
}
