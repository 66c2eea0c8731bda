use crate::ast::Expr;
use crate::lexer::Position;
use crate::table::Column;

/// Top-level script statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Buffer declaration
    ///
    /// # Example
    /// ```text
    /// create buffer temp(id identity, name string)
    /// ```
    CreateBuffer {
        name: String,
        columns: Vec<ColumnDef>,
        position: Position,
    },

    /// Append the rows of a select to a buffer
    ///
    /// # Example
    /// ```text
    /// insert into temp
    /// select 'test'
    /// ```
    Insert {
        target: String,
        /// Explicit target columns, `insert into temp(name) select ..`
        columns: Option<Vec<String>>,
        select: Box<SelectStatement>,
        position: Position,
    },

    /// Query producing one result table
    Select(SelectStatement),
}

/// One column of a `create buffer` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    /// Type name as written; validated by the resolver.
    pub type_name: String,
    /// Set by a trailing `identity` keyword or by the `identity` type itself.
    pub identity: bool,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `select *`
    Star(Position),
    /// `<expr> [as <alias>]`
    Item { expr: Expr, alias: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// `from download page ..` / `download json ..` / `download image ..`
    Download(DownloadExpr),
    /// `from <buffer>`
    Buffer { name: String, position: Position },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    /// HTML page, parsed into a document
    Page,
    /// JSON payload, one row per array element
    Json,
    /// Raw bytes of an image, one row per wire
    Image,
}

/// Where the URLs of a download come from.
#[derive(Debug, Clone, PartialEq)]
pub enum UrlSource {
    /// `download page 'http://..'`
    Literal(String),
    /// `download page (select url from links)`: one fetch per row
    Query(Box<SelectStatement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadExpr {
    pub kind: DownloadKind,
    pub urls: UrlSource,
    pub hints: Vec<TableHint>,
    pub position: Position,
}

/// `with thread <n>` / `with js`
#[derive(Debug, Clone, PartialEq)]
pub enum TableHint {
    Thread { count: i64, position: Position },
    Js,
}

/// Hints the resolver settled for a select, read as-is by the generator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedHints {
    pub threads: Option<usize>,
    pub js: bool,
    /// Selector from `where nodes = '..'`
    pub nodes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub projections: Vec<Projection>,
    pub source: Option<Source>,
    pub filter: Option<Expr>,
    /// Hints written after the whole statement
    pub hints: Vec<TableHint>,
    pub position: Position,

    // Filled in by the resolver
    /// Output columns, `*` already expanded
    pub columns: Vec<Column>,
    pub resolved: ResolvedHints,
}

impl SelectStatement {
    pub fn new(
        projections: Vec<Projection>,
        source: Option<Source>,
        filter: Option<Expr>,
        hints: Vec<TableHint>,
        position: Position,
    ) -> Self {
        SelectStatement {
            projections,
            source,
            filter,
            hints,
            position,
            columns: Vec::new(),
            resolved: ResolvedHints::default(),
        }
    }

    pub fn download(&self) -> Option<&DownloadExpr> {
        match &self.source {
            Some(Source::Download(download)) => Some(download),
            _ => None,
        }
    }
}
