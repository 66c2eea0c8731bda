//! Error taxonomy: syntax errors stop parsing, compile errors stop before
//! anything runs, runtime errors stop the current run.

use crate::http::DownloadError;
use crate::lexer::Position;
use crate::value::ValueType;

pub use crate::parser::SyntaxError;

/// Semantic failure found while resolving a parsed script.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("{position}: buffer '{name}' does not exist")]
    UnknownBuffer { name: String, position: Position },

    #[error("{position}: buffer '{name}' is already defined")]
    DuplicateBuffer { name: String, position: Position },

    #[error("{position}: unknown column '{name}'")]
    UnknownIdentifier { name: String, position: Position },

    #[error("{position}: unknown column type '{type_name}' for column '{column}'")]
    UnknownType {
        column: String,
        type_name: String,
        position: Position,
    },

    #[error("{position}: buffer '{buffer}' declares more than one identity column")]
    MultipleIdentity { buffer: String, position: Position },

    #[error("{position}: column '{column}' of buffer '{buffer}' is an identity column and cannot be inserted into")]
    IdentityInsert {
        buffer: String,
        column: String,
        position: Position,
    },

    #[error("{position}: column '{column}' of buffer '{buffer}' is listed more than once")]
    DuplicateColumn {
        buffer: String,
        column: String,
        position: Position,
    },

    #[error("{position}: buffer '{buffer}' has no column '{column}'")]
    UnknownColumn {
        buffer: String,
        column: String,
        position: Position,
    },

    #[error("{position}: insert into '{buffer}' expects {expected} column(s), select produces {found}")]
    ColumnCountMismatch {
        buffer: String,
        expected: usize,
        found: usize,
        position: Position,
    },

    #[error("{position}: {context}: {expected} is not compatible with {found}")]
    TypeMismatch {
        context: String,
        expected: ValueType,
        found: ValueType,
        position: Position,
    },

    #[error("{position}: 'pick' needs a 'download page' source")]
    PickWithoutDocument { position: Position },

    #[error("{position}: 'select *' needs a source with known columns")]
    StarWithoutSource { position: Position },

    #[error("{position}: thread count must be at least 1, got {count}")]
    InvalidThreadHint { count: i64, position: Position },

    #[error("{position}: a url query must select exactly one column, got {found}")]
    WireColumnCount { found: usize, position: Position },
}

impl CompileError {
    pub fn position(&self) -> Position {
        match self {
            CompileError::UnknownBuffer { position, .. }
            | CompileError::DuplicateBuffer { position, .. }
            | CompileError::UnknownIdentifier { position, .. }
            | CompileError::UnknownType { position, .. }
            | CompileError::MultipleIdentity { position, .. }
            | CompileError::IdentityInsert { position, .. }
            | CompileError::DuplicateColumn { position, .. }
            | CompileError::UnknownColumn { position, .. }
            | CompileError::ColumnCountMismatch { position, .. }
            | CompileError::TypeMismatch { position, .. }
            | CompileError::PickWithoutDocument { position }
            | CompileError::StarWithoutSource { position }
            | CompileError::InvalidThreadHint { position, .. }
            | CompileError::WireColumnCount { position, .. } => *position,
        }
    }
}

/// Failure while running a compiled plan. Aborts the run; the failing
/// statement delivers no table.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("download of wire {index} ({url}) failed: {source}")]
    Download {
        index: usize,
        url: String,
        #[source]
        source: DownloadError,
    },

    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("invalid regular expression '{pattern}': {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("cannot store '{value}' in {target} column '{column}' of buffer '{buffer}'")]
    Conversion {
        buffer: String,
        column: String,
        value: String,
        target: ValueType,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in {0}")]
    Overflow(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("buffer '{0}' does not exist")]
    UnknownBuffer(String),

    #[error("buffer '{0}' is already defined")]
    DuplicateBuffer(String),

    #[error("row has {found} cell(s), table has {expected} column(s)")]
    RowWidth { expected: usize, found: usize },
}

/// Any failure of compiling or running a script.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
