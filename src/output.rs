//! Text rendering of result tables.
//!
//! Tables are drawn as a boxed grid with one header line, cells padded to
//! the widest value of their column. Null cells render as `NULL`; control
//! characters inside cells are escaped so every row stays on one line.
//!
//! # Examples
//!
//! ```
//! use pickaxe_lang::{Column, RuntimeTable, Value, ValueType};
//! use pickaxe_lang::output::to_text;
//!
//! let mut table = RuntimeTable::new(vec![Column::new("num", 0, ValueType::Integer)]);
//! table.push_row(vec![Value::Integer(2)]).unwrap();
//!
//! assert_eq!(
//!     to_text(&table),
//!     "+-----+\n| num |\n+-----+\n| 2   |\n+-----+\n(1 row)\n"
//! );
//! ```

use std::fmt;

use crate::table::RuntimeTable;
use crate::value::Value;

pub struct TablePrinter {
    footer: bool,
}

impl TablePrinter {
    pub fn new(footer: bool) -> Self {
        TablePrinter { footer }
    }

    pub fn print(&self, table: &RuntimeTable) -> String {
        let header: Vec<String> = table.labels().iter().map(|l| self.escape(l)).collect();
        let rows: Vec<Vec<String>> = table
            .rows()
            .map(|row| row.iter().map(|v| self.cell(v)).collect())
            .collect();

        let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let rule = self.rule(&widths);
        let mut out = String::new();
        out.push_str(&rule);
        out.push_str(&self.line(&header, &widths));
        out.push_str(&rule);
        if !rows.is_empty() {
            for row in &rows {
                out.push_str(&self.line(row, &widths));
            }
            out.push_str(&rule);
        }
        if self.footer {
            let count = rows.len();
            out.push_str(&format!("({} row{})\n", count, if count == 1 { "" } else { "s" }));
        }
        out
    }

    fn cell(&self, value: &Value) -> String {
        self.escape(&value.to_string())
    }

    fn rule(&self, widths: &[usize]) -> String {
        let mut rule = String::from("+");
        for width in widths {
            rule.push_str(&"-".repeat(width + 2));
            rule.push('+');
        }
        rule.push('\n');
        rule
    }

    fn line(&self, cells: &[String], widths: &[usize]) -> String {
        let mut line = String::from("|");
        for (cell, width) in cells.iter().zip(widths) {
            let pad = width - cell.chars().count();
            line.push(' ');
            line.push_str(cell);
            line.push_str(&" ".repeat(pad + 1));
            line.push('|');
        }
        line.push('\n');
        line
    }

    fn escape(&self, s: &str) -> String {
        s.chars()
            .flat_map(|c| match c {
                '\n' => vec!['\\', 'n'],
                '\r' => vec!['\\', 'r'],
                '\t' => vec!['\\', 't'],
                c if c.is_control() => format!("\\u{:04x}", c as u32).chars().collect(),
                c => vec![c],
            })
            .collect()
    }
}

/// Renders a table as a text grid followed by its row count.
pub fn to_text(table: &RuntimeTable) -> String {
    TablePrinter::new(true).print(table)
}

impl fmt::Display for RuntimeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_text(self))
    }
}
