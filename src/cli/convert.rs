//! Result tables as JSON

use crate::{RuntimeTable, Value};

/// Convert a cell to serde_json::Value
pub fn value_to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
    }
}

/// Convert a table to an array of objects keyed by column label.
///
/// Columns sharing a label (several unnamed projections, say) get their
/// ordinal appended so no cell is lost.
pub fn table_to_json(table: &RuntimeTable) -> serde_json::Value {
    let mut keys: Vec<String> = Vec::with_capacity(table.column_count());
    for column in table.columns() {
        let duplicate = table
            .columns()
            .iter()
            .filter(|c| c.label == column.label)
            .count()
            > 1;
        keys.push(if duplicate {
            format!("{} {}", column.label, column.ordinal)
        } else {
            column.label.clone()
        });
    }

    let rows = table
        .rows()
        .map(|row| {
            let object = keys
                .iter()
                .cloned()
                .zip(row.iter().map(value_to_json))
                .collect::<serde_json::Map<_, _>>();
            serde_json::Value::Object(object)
        })
        .collect();
    serde_json::Value::Array(rows)
}
