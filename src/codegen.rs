//! Lowers a resolved program into an executable plan.
//!
//! Identifiers become column indices or page fields, `*` becomes explicit
//! operands, and picks get their default `take`. The plan holds no AST
//! nodes, so it can be run any number of times.

use std::collections::HashMap;

use crate::ast::{
    BinOp, DownloadKind, Expr, PickExpr, Program, Projection, SelectStatement, Source, Statement,
    Take, UrlSource,
};
use crate::buffer::BufferSchema;
use crate::error::CompileError;
use crate::resolver::{Scope, insert_targets, schema_of, scope_of};
use crate::table::Column;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    CreateBuffer {
        name: String,
        schema: BufferSchema,
    },
    Insert {
        buffer: String,
        /// Buffer column index for each select column
        targets: Vec<usize>,
        select: SelectStep,
    },
    Select(SelectStep),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStep {
    pub columns: Vec<Column>,
    /// One operand per output column
    pub projections: Vec<Operand>,
    pub source: SourceStep,
    pub filter: Option<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceStep {
    /// A single row with no columns
    Single,
    Buffer(String),
    Download(DownloadStep),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadStep {
    pub kind: DownloadKind,
    pub urls: UrlStep,
    pub threads: Option<usize>,
    pub js: bool,
    /// Context selector; each match becomes its own row
    pub nodes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UrlStep {
    Literal(String),
    Query(Box<SelectStep>),
}

/// Intrinsic column of a downloaded page or image row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageField {
    Url,
    Size,
    Date,
    /// Generated file name, images only
    Filename,
}

impl PageField {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "url" => Some(PageField::Url),
            "size" => Some(PageField::Size),
            "date" => Some(PageField::Date),
            "filename" => Some(PageField::Filename),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Value),
    /// Cell of the current buffer row
    Column(usize),
    PageField(PageField),
    /// Property of the current JSON object
    JsonField(String),
    Pick(PickStep),
    Case(CaseStep),
    Binary {
        op: BinOp,
        left: Box<Operand>,
        right: Box<Operand>,
    },
    Not(Box<Operand>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickStep {
    pub selector: String,
    pub take: Take,
    pub pattern: Option<String>,
    pub replace: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseStep {
    pub subject: Option<Box<Operand>>,
    /// `(when, then)` pairs in source order
    pub branches: Vec<(Operand, Operand)>,
    pub otherwise: Option<Box<Operand>>,
}

impl Operand {
    /// Every pick reachable from this operand.
    pub fn picks<'a>(&'a self, out: &mut Vec<&'a PickStep>) {
        match self {
            Operand::Literal(_)
            | Operand::Column(_)
            | Operand::PageField(_)
            | Operand::JsonField(_) => {}
            Operand::Pick(pick) => out.push(pick),
            Operand::Case(case) => {
                if let Some(subject) = &case.subject {
                    subject.picks(out);
                }
                for (when, then) in &case.branches {
                    when.picks(out);
                    then.picks(out);
                }
                if let Some(otherwise) = &case.otherwise {
                    otherwise.picks(out);
                }
            }
            Operand::Binary { left, right, .. } => {
                left.picks(out);
                right.picks(out);
            }
            Operand::Not(inner) => inner.picks(out),
        }
    }
}

impl SelectStep {
    /// Picks of the projections and filter, not of a nested url query.
    pub fn picks(&self) -> Vec<&PickStep> {
        let mut out = Vec::new();
        for projection in &self.projections {
            projection.picks(&mut out);
        }
        if let Some(filter) = &self.filter {
            filter.picks(&mut out);
        }
        out
    }

    pub fn download(&self) -> Option<&DownloadStep> {
        match &self.source {
            SourceStep::Download(download) => Some(download),
            _ => None,
        }
    }
}

/// Generates a plan from a program the resolver has accepted.
pub fn generate(program: &Program) -> Result<Plan, CompileError> {
    Generator::default().generate(program)
}

#[derive(Debug, Default)]
pub struct Generator {
    buffers: HashMap<String, BufferSchema>,
}

impl Generator {
    pub fn generate(mut self, program: &Program) -> Result<Plan, CompileError> {
        let mut steps = Vec::with_capacity(program.statements.len());
        for stmt in &program.statements {
            steps.push(self.statement(stmt)?);
        }
        Ok(Plan { steps })
    }

    fn statement(&mut self, stmt: &Statement) -> Result<Step, CompileError> {
        match stmt {
            Statement::CreateBuffer { name, columns, .. } => {
                let schema = schema_of(name, columns)?;
                self.buffers.insert(name.clone(), schema.clone());
                Ok(Step::CreateBuffer {
                    name: name.clone(),
                    schema,
                })
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
                let targets = insert_targets(target, schema, columns.as_deref(), *position)?;
                Ok(Step::Insert {
                    buffer: target.clone(),
                    targets,
                    select: self.select(select)?,
                })
            }
            Statement::Select(select) => Ok(Step::Select(self.select(select)?)),
        }
    }

    fn select(&self, select: &SelectStatement) -> Result<SelectStep, CompileError> {
        let scope = scope_of(&self.buffers, select.source.as_ref())?;

        let mut projections = Vec::with_capacity(select.columns.len());
        for projection in &select.projections {
            match projection {
                Projection::Star(_) => match scope {
                    Scope::Buffer(schema) => {
                        projections.extend((0..schema.columns.len()).map(Operand::Column));
                    }
                    _ => {
                        for (name, _) in scope.intrinsic() {
                            if let Some(field) = PageField::from_name(name) {
                                projections.push(Operand::PageField(field));
                            }
                        }
                    }
                },
                Projection::Item { expr, .. } => projections.push(self.operand(expr, &scope)?),
            }
        }

        let filter = select
            .filter
            .as_ref()
            .map(|f| self.operand(f, &scope))
            .transpose()?;

        let source = match &select.source {
            None => SourceStep::Single,
            Some(Source::Buffer { name, .. }) => SourceStep::Buffer(name.clone()),
            Some(Source::Download(download)) => {
                let urls = match &download.urls {
                    UrlSource::Literal(url) => UrlStep::Literal(url.clone()),
                    UrlSource::Query(query) => UrlStep::Query(Box::new(self.select(query)?)),
                };
                SourceStep::Download(DownloadStep {
                    kind: download.kind,
                    urls,
                    threads: select.resolved.threads,
                    js: select.resolved.js,
                    nodes: select.resolved.nodes.clone(),
                })
            }
        };

        Ok(SelectStep {
            columns: select.columns.clone(),
            projections,
            source,
            filter,
        })
    }

    fn operand(&self, expr: &Expr, scope: &Scope<'_>) -> Result<Operand, CompileError> {
        let operand = match expr {
            Expr::Float(n) => Operand::Literal(Value::Float(*n)),
            Expr::Integer(n) => Operand::Literal(Value::Integer(*n)),
            Expr::String(s) => Operand::Literal(Value::String(s.clone())),
            Expr::Boolean(b) => Operand::Literal(Value::Boolean(*b)),
            Expr::Null => Operand::Literal(Value::Null),
            Expr::Identifier { name, position } => {
                let unknown = || CompileError::UnknownIdentifier {
                    name: name.clone(),
                    position: *position,
                };
                match scope {
                    Scope::Empty => return Err(unknown()),
                    Scope::Buffer(schema) => {
                        Operand::Column(schema.position(name).ok_or_else(unknown)?)
                    }
                    Scope::Page | Scope::Image => {
                        let field = PageField::from_name(name).ok_or_else(unknown)?;
                        if !scope.intrinsic().iter().any(|(column, _)| column.eq_ignore_ascii_case(name)) {
                            return Err(unknown());
                        }
                        Operand::PageField(field)
                    }
                    Scope::Json => Operand::JsonField(name.clone()),
                }
            }
            Expr::Pick(pick) => Operand::Pick(pick_step(pick)),
            Expr::Case(case) => {
                let subject = case
                    .subject
                    .as_ref()
                    .map(|s| self.operand(s, scope).map(Box::new))
                    .transpose()?;
                let mut branches = Vec::with_capacity(case.branches.len());
                for branch in &case.branches {
                    branches.push((
                        self.operand(&branch.condition, scope)?,
                        self.operand(&branch.result, scope)?,
                    ));
                }
                let otherwise = case
                    .otherwise
                    .as_ref()
                    .map(|e| self.operand(e, scope).map(Box::new))
                    .transpose()?;
                Operand::Case(CaseStep {
                    subject,
                    branches,
                    otherwise,
                })
            }
            Expr::BinaryOp { op, left, right, .. } => Operand::Binary {
                op: *op,
                left: Box::new(self.operand(left, scope)?),
                right: Box::new(self.operand(right, scope)?),
            },
            Expr::Not(inner) => Operand::Not(Box::new(self.operand(inner, scope)?)),
        };
        Ok(operand)
    }
}

fn pick_step(pick: &PickExpr) -> PickStep {
    PickStep {
        selector: pick.selector.clone(),
        take: pick.take.clone().unwrap_or(Take::Text),
        pattern: pick.pattern.clone(),
        replace: pick.replace.clone(),
    }
}
