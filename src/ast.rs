//! # Pickaxe Query Language - Abstract Syntax Tree
//!
//! This module defines the Abstract Syntax Tree (AST) for Pickaxe, a SQL-like
//! language for scraping web pages into relational tables.
//!
//! ## Architecture Overview
//!
//! The AST module is organized into focused submodules:
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes (literals, columns, pick, case, operators)
//! - **[operators]** - Binary operators (comparison, arithmetic, logical)
//! - **[statements]** - `create buffer`, `insert into`, `select` and their sources
//! - **[program]** - A complete script
//! - **[visit]** - Read-only traversal shared by analysis passes
//!
//! ## Quick Start
//!
//! ```text
//! select
//!     pick '.price' take text match '[\d\.]+' as price,
//!     pick 'a' take attribute 'href' as link
//! from download page 'http://example.com/products' with thread 4
//! where nodes = 'div.product'
//! ```
//!
//! One row is produced per `div.product` element, and each `pick` is evaluated
//! inside that element.
//!
//! ## Core Concepts
//!
//! ### Buffers
//!
//! Buffers are named tables that live for one run of a script:
//!
//! ```text
//! create buffer links(id identity, url string)
//!
//! insert into links
//! select pick 'a' take attribute 'href'
//! from download page 'http://example.com'
//! where nodes = 'li'
//! ```
//!
//! The `identity` column is assigned 1, 2, 3... by the runtime.
//!
//! ### Case Expressions
//!
//! ```text
//! case id when 5 then 'five' else 'no' end
//! case when id < 5 and id > 2 then 'hit' end
//! ```
//!
//! The first matching branch wins; without `else` the result is null.
//!
//! ### Resolver Annotations
//!
//! [`SelectStatement`] carries two fields that the parser leaves empty:
//! `columns` and `resolved`. The resolver fills them in so later passes read
//! column labels and download hints directly off the statement.
pub mod tokens;
pub mod expressions;
pub mod operators;
pub mod statements;
pub mod program;
pub mod visit;

pub use tokens::Token;
pub use expressions::{CaseExpr, Expr, PickExpr, Take, WhenClause};
pub use operators::BinOp;
pub use statements::{
    ColumnDef, DownloadExpr, DownloadKind, Projection, ResolvedHints, SelectStatement, Source,
    Statement, TableHint, UrlSource,
};
pub use program::Program;
pub use visit::Visitor;
