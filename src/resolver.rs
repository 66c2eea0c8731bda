//! Semantic pass between parsing and code generation.
//!
//! Walks the statements in order, tracking the buffers declared so far,
//! and checks every name, type and insert shape. On success each select
//! carries its output columns and settled hints; the generator never has
//! to re-validate anything.

use std::collections::HashMap;

use crate::ast::visit::PickFinder;
use crate::ast::{
    BinOp, ColumnDef, DownloadKind, Expr, Program, Projection, ResolvedHints, SelectStatement,
    Source, Statement, TableHint, UrlSource,
};
use crate::buffer::{BufferColumn, BufferSchema};
use crate::error::CompileError;
use crate::lexer::Position;
use crate::table::{Column, NO_COLUMN_NAME};
use crate::value::ValueType;

/// Intrinsic columns of every `download page` row.
pub const PAGE_COLUMNS: [(&str, ValueType); 3] = [
    ("url", ValueType::String),
    ("size", ValueType::Integer),
    ("date", ValueType::String),
];

/// Intrinsic columns of every `download image` row.
pub const IMAGE_COLUMNS: [(&str, ValueType); 4] = [
    ("url", ValueType::String),
    ("size", ValueType::Integer),
    ("date", ValueType::String),
    ("filename", ValueType::String),
];

/// Columns a download source provides on its own; JSON rows have none.
pub fn intrinsic_columns(kind: DownloadKind) -> &'static [(&'static str, ValueType)] {
    match kind {
        DownloadKind::Page => &PAGE_COLUMNS,
        DownloadKind::Image => &IMAGE_COLUMNS,
        DownloadKind::Json => &[],
    }
}

/// Names a select's expressions can refer to.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Scope<'a> {
    /// No `from`: a single row with no columns
    Empty,
    Buffer(&'a BufferSchema),
    /// HTML page rows: intrinsic columns plus picks
    Page,
    /// Image rows: intrinsic columns only
    Image,
    /// JSON object rows: any property name
    Json,
}

impl Scope<'_> {
    /// Columns every row of this scope carries without a pick.
    pub fn intrinsic(&self) -> &'static [(&'static str, ValueType)] {
        match self {
            Scope::Page => intrinsic_columns(DownloadKind::Page),
            Scope::Image => intrinsic_columns(DownloadKind::Image),
            _ => &[],
        }
    }

    fn column_type(&self, name: &str) -> Option<ValueType> {
        match self {
            Scope::Empty => None,
            Scope::Buffer(schema) => schema
                .position(name)
                .map(|i| schema.columns[i].value_type),
            Scope::Page | Scope::Image => self
                .intrinsic()
                .iter()
                .find(|(column, _)| column.eq_ignore_ascii_case(name))
                .map(|(_, ty)| *ty),
            Scope::Json => Some(ValueType::String),
        }
    }
}

/// Resolves `program` in place.
pub fn resolve(program: &mut Program) -> Result<(), CompileError> {
    Resolver::new().resolve_program(program)
}

#[derive(Debug, Default)]
pub struct Resolver {
    buffers: HashMap<String, BufferSchema>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve_program(&mut self, program: &mut Program) -> Result<(), CompileError> {
        for stmt in &mut program.statements {
            self.resolve_statement(stmt)?;
        }
        Ok(())
    }

    fn resolve_statement(&mut self, stmt: &mut Statement) -> Result<(), CompileError> {
        match stmt {
            Statement::CreateBuffer {
                name,
                columns,
                position,
            } => {
                if self.buffers.contains_key(name.as_str()) {
                    return Err(CompileError::DuplicateBuffer {
                        name: name.clone(),
                        position: *position,
                    });
                }
                let schema = schema_of(name, columns)?;
                tracing::trace!(buffer = %name, columns = schema.columns.len(), "buffer declared");
                self.buffers.insert(name.clone(), schema);
                Ok(())
            }
            Statement::Insert {
                target,
                columns,
                select,
                position,
            } => {
                let schema = self
                    .buffers
                    .get(target.as_str())
                    .ok_or_else(|| CompileError::UnknownBuffer {
                        name: target.clone(),
                        position: *position,
                    })?;
                self.resolve_select(select)?;

                let targets = insert_targets(target, schema, columns.as_deref(), *position)?;
                if targets.len() != select.columns.len() {
                    return Err(CompileError::ColumnCountMismatch {
                        buffer: target.clone(),
                        expected: targets.len(),
                        found: select.columns.len(),
                        position: *position,
                    });
                }
                for (&index, produced) in targets.iter().zip(&select.columns) {
                    let column = &schema.columns[index];
                    if !column.value_type.accepts(produced.value_type) {
                        return Err(CompileError::TypeMismatch {
                            context: format!("column '{}' of buffer '{}'", column.name, target),
                            expected: column.value_type,
                            found: produced.value_type,
                            position: *position,
                        });
                    }
                }
                Ok(())
            }
            Statement::Select(select) => self.resolve_select(select),
        }
    }

    fn resolve_select(&self, select: &mut SelectStatement) -> Result<(), CompileError> {
        if let Some(Source::Download(download)) = &mut select.source
            && let UrlSource::Query(query) = &mut download.urls
        {
            self.resolve_select(query)?;
            if query.columns.len() != 1 {
                return Err(CompileError::WireColumnCount {
                    found: query.columns.len(),
                    position: query.position,
                });
            }
        }

        let scope = self.scope(select.source.as_ref())?;
        let mut resolved = self.hints(select)?;

        if matches!(scope, Scope::Page)
            && let Some(filter) = select.filter.take()
        {
            let (nodes, rest) = lift_nodes(filter);
            resolved.nodes = nodes;
            select.filter = rest;
        }

        if !matches!(scope, Scope::Page)
            && let Some(position) = PickFinder::find(select).first()
        {
            return Err(CompileError::PickWithoutDocument {
                position: *position,
            });
        }

        let mut columns = Vec::new();
        for projection in &select.projections {
            match projection {
                Projection::Star(position) => match scope {
                    Scope::Empty | Scope::Json => {
                        return Err(CompileError::StarWithoutSource {
                            position: *position,
                        });
                    }
                    Scope::Buffer(schema) => {
                        for column in &schema.columns {
                            columns.push(Column::new(
                                column.name.clone(),
                                columns.len(),
                                column.value_type,
                            ));
                        }
                    }
                    Scope::Page | Scope::Image => {
                        for (name, ty) in scope.intrinsic() {
                            columns.push(Column::new(*name, columns.len(), *ty));
                        }
                    }
                },
                Projection::Item { expr, alias } => {
                    let value_type = self.infer(expr, &scope, select.position)?;
                    let label = alias
                        .clone()
                        .or_else(|| expr.inferred_name().map(str::to_string))
                        .unwrap_or_else(|| NO_COLUMN_NAME.to_string());
                    columns.push(Column::new(label, columns.len(), value_type));
                }
            }
        }

        if let Some(filter) = &select.filter {
            self.infer(filter, &scope, select.position)?;
        }

        select.columns = columns;
        select.resolved = resolved;
        Ok(())
    }

    fn scope<'a>(&'a self, source: Option<&Source>) -> Result<Scope<'a>, CompileError> {
        scope_of(&self.buffers, source)
    }

    /// Download-level hints win over statement-level ones.
    fn hints(&self, select: &SelectStatement) -> Result<ResolvedHints, CompileError> {
        let download_hints = select
            .download()
            .map(|d| d.hints.as_slice())
            .unwrap_or_default();

        let mut resolved = ResolvedHints::default();
        for hint in download_hints.iter().chain(&select.hints) {
            match hint {
                TableHint::Thread { count, position } => {
                    if *count < 1 {
                        return Err(CompileError::InvalidThreadHint {
                            count: *count,
                            position: *position,
                        });
                    }
                    if resolved.threads.is_none() {
                        resolved.threads = usize::try_from(*count).ok();
                    }
                }
                TableHint::Js => resolved.js = true,
            }
        }
        Ok(resolved)
    }

    fn infer(&self, expr: &Expr, scope: &Scope<'_>, at: Position) -> Result<ValueType, CompileError> {
        match expr {
            Expr::Float(_) => Ok(ValueType::Float),
            Expr::Integer(_) => Ok(ValueType::Integer),
            Expr::String(_) => Ok(ValueType::String),
            Expr::Boolean(_) => Ok(ValueType::Boolean),
            Expr::Null => Ok(ValueType::Null),
            Expr::Identifier { name, position } => {
                scope
                    .column_type(name)
                    .ok_or_else(|| CompileError::UnknownIdentifier {
                        name: name.clone(),
                        position: *position,
                    })
            }
            Expr::Pick(_) => Ok(ValueType::String),
            Expr::Case(case) => {
                if let Some(subject) = &case.subject {
                    self.infer(subject, scope, case.position)?;
                }
                let mut result_type = ValueType::Null;
                let results = case
                    .branches
                    .iter()
                    .map(|b| (Some(&b.condition), &b.result))
                    .chain(case.otherwise.as_deref().map(|e| (None, e)));
                for (condition, result) in results {
                    if let Some(condition) = condition {
                        self.infer(condition, scope, case.position)?;
                    }
                    let found = self.infer(result, scope, case.position)?;
                    result_type = result_type.unify(found).ok_or_else(|| {
                        CompileError::TypeMismatch {
                            context: "case branches".to_string(),
                            expected: result_type,
                            found,
                            position: case.position,
                        }
                    })?;
                }
                Ok(result_type)
            }
            Expr::BinaryOp {
                op,
                left,
                right,
                position,
            } => {
                let l = self.infer(left, scope, *position)?;
                let r = self.infer(right, scope, *position)?;
                binary_type(*op, l, r).ok_or_else(|| CompileError::TypeMismatch {
                    context: format!("operator '{}'", op),
                    expected: l,
                    found: r,
                    position: *position,
                })
            }
            Expr::Not(inner) => {
                self.infer(inner, scope, at)?;
                Ok(ValueType::Boolean)
            }
        }
    }
}

pub(crate) fn scope_of<'a>(
    buffers: &'a HashMap<String, BufferSchema>,
    source: Option<&Source>,
) -> Result<Scope<'a>, CompileError> {
    match source {
        None => Ok(Scope::Empty),
        Some(Source::Buffer { name, position }) => buffers
            .get(name.as_str())
            .map(Scope::Buffer)
            .ok_or_else(|| CompileError::UnknownBuffer {
                name: name.clone(),
                position: *position,
            }),
        Some(Source::Download(download)) => Ok(match download.kind {
            DownloadKind::Page => Scope::Page,
            DownloadKind::Image => Scope::Image,
            DownloadKind::Json => Scope::Json,
        }),
    }
}

/// Builds the schema of a `create buffer` declaration.
pub(crate) fn schema_of(buffer: &str, defs: &[ColumnDef]) -> Result<BufferSchema, CompileError> {
    let mut schema = BufferSchema::default();
    for def in defs {
        let value_type =
            ValueType::from_name(&def.type_name).ok_or_else(|| CompileError::UnknownType {
                column: def.name.clone(),
                type_name: def.type_name.clone(),
                position: def.position,
            })?;
        let identity = def.identity || def.type_name.eq_ignore_ascii_case("identity");

        if identity {
            if schema.identity().is_some() {
                return Err(CompileError::MultipleIdentity {
                    buffer: buffer.to_string(),
                    position: def.position,
                });
            }
            if value_type != ValueType::Integer {
                return Err(CompileError::TypeMismatch {
                    context: format!("identity column '{}'", def.name),
                    expected: ValueType::Integer,
                    found: value_type,
                    position: def.position,
                });
            }
        }

        schema.columns.push(BufferColumn {
            name: def.name.clone(),
            value_type,
            identity,
        });
    }
    Ok(schema)
}

/// Schema indices an insert writes, in select column order.
pub(crate) fn insert_targets(
    buffer: &str,
    schema: &BufferSchema,
    columns: Option<&[String]>,
    position: Position,
) -> Result<Vec<usize>, CompileError> {
    let Some(columns) = columns else {
        return Ok(schema.insertable());
    };

    let mut targets: Vec<usize> = Vec::with_capacity(columns.len());
    for name in columns {
        let index = schema
            .position(name)
            .ok_or_else(|| CompileError::UnknownColumn {
                buffer: buffer.to_string(),
                column: name.clone(),
                position,
            })?;
        if schema.columns[index].identity {
            return Err(CompileError::IdentityInsert {
                buffer: buffer.to_string(),
                column: name.clone(),
                position,
            });
        }
        if targets.contains(&index) {
            return Err(CompileError::DuplicateColumn {
                buffer: buffer.to_string(),
                column: name.clone(),
                position,
            });
        }
        targets.push(index);
    }
    Ok(targets)
}

/// Static result type of a binary operator.
///
/// Outside of `+` concatenation, strings are read as numbers at runtime
/// and typed like integers here, the same way an insert into an integer
/// column accepts a string and converts it when the row is stored.
/// Division always yields a float.
fn binary_type(op: BinOp, l: ValueType, r: ValueType) -> Option<ValueType> {
    use ValueType::*;

    if op.is_comparison() || op.is_logical() {
        return Some(Boolean);
    }
    let numeric = |t: ValueType| match t {
        String | Null => Integer,
        t => t,
    };
    match (l, r) {
        (Boolean, _) | (_, Boolean) => None,
        (String, _) | (_, String) if op == BinOp::Add => Some(String),
        (Null, Null) => Some(Null),
        _ if op == BinOp::Divide => Some(Float),
        (l, r) => match (numeric(l), numeric(r)) {
            (Integer, Integer) => Some(Integer),
            _ => Some(Float),
        },
    }
}

fn nodes_selector(expr: &Expr) -> Option<&str> {
    if let Expr::BinaryOp {
        op: BinOp::Equal,
        left,
        right,
        ..
    } = expr
        && let Expr::Identifier { name, .. } = left.as_ref()
        && name.eq_ignore_ascii_case("nodes")
        && let Expr::String(selector) = right.as_ref()
    {
        return Some(selector);
    }
    None
}

/// Splits a `nodes = '<selector>'` conjunct off a page filter.
fn lift_nodes(filter: Expr) -> (Option<String>, Option<Expr>) {
    if let Some(selector) = nodes_selector(&filter) {
        return (Some(selector.to_string()), None);
    }
    match filter {
        Expr::BinaryOp {
            op: BinOp::And,
            left,
            right,
            position,
        } => {
            let (nodes, left) = lift_nodes(*left);
            if nodes.is_some() {
                return (nodes, conjoin(left, Some(*right), position));
            }
            let (nodes, right) = lift_nodes(*right);
            (nodes, conjoin(left, right, position))
        }
        other => (None, Some(other)),
    }
}

fn conjoin(left: Option<Expr>, right: Option<Expr>, position: Position) -> Option<Expr> {
    match (left, right) {
        (Some(left), Some(right)) => Some(Expr::BinaryOp {
            op: BinOp::And,
            left: Box::new(left),
            right: Box::new(right),
            position,
        }),
        (one, None) | (None, one) => one,
    }
}
