//! Pickaxe: a SQL-flavoured language for scraping web pages into tables.
//!
//! A script is compiled once into a [`Plan`] and run through a
//! [`Runnable`], which fetches pages through a [`RequestFactory`], parses
//! them through a [`DomFactory`] and hands every `select` result to the
//! host as a [`RuntimeTable`].
//!
//! ```text
//! create buffer temp(id identity, name string)
//!
//! insert into temp
//! select pick '.title' take text
//! from download page 'http://example.com' with thread 2
//!
//! select * from temp
//! ```

pub mod ast;
pub mod buffer;
#[cfg(feature = "cli")]
pub mod cli;
pub mod codegen;
pub mod config;
pub mod dom;
pub mod download;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod extract;
pub mod http;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod resolver;
pub mod table;
pub mod value;

pub use ast::{BinOp, Expr, Program, Statement, Token};
pub use codegen::Plan;
pub use config::{FailurePolicy, RuntimeConfig};
pub use dom::{DomFactory, ScraperDomFactory};
pub use error::{CompileError, Error, RuntimeError, SyntaxError};
pub use executor::Runnable;
pub use http::{DownloadError, RequestFactory, Wire};
pub use lexer::{LexError, Lexer, Position};
pub use output::to_text;
pub use parser::Parser;
pub use table::{Column, RuntimeTable};
pub use value::{Value, ValueType};

#[cfg(feature = "http")]
pub use http::HttpRequestFactory;

/// Parses, resolves and lowers `source` into a runnable plan.
pub fn compile(source: &str) -> Result<Plan, Error> {
    let mut program = parser::parse_program(source)?;
    resolver::resolve(&mut program)?;
    let plan = codegen::generate(&program)?;
    tracing::debug!(steps = plan.steps.len(), "compiled");
    Ok(plan)
}
