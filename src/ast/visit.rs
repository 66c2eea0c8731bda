//! Read-only traversal over the AST.
//!
//! A pass implements [`Visitor`] and overrides only the hooks it cares
//! about; the `walk_*` functions recurse into children with exhaustive
//! matches, so a new node kind cannot be skipped silently by any pass.

use crate::ast::{
    CaseExpr, DownloadExpr, Expr, PickExpr, Program, Projection, SelectStatement, Source,
    Statement, UrlSource,
};
use crate::lexer::Position;

pub trait Visitor {
    fn visit_program(&mut self, program: &Program) {
        walk_program(self, program);
    }

    fn visit_statement(&mut self, stmt: &Statement) {
        walk_statement(self, stmt);
    }

    fn visit_select(&mut self, select: &SelectStatement) {
        walk_select(self, select);
    }

    fn visit_source(&mut self, source: &Source) {
        walk_source(self, source);
    }

    fn visit_download(&mut self, download: &DownloadExpr) {
        walk_download(self, download);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_pick(&mut self, _pick: &PickExpr) {}

    fn visit_case(&mut self, case: &CaseExpr) {
        walk_case(self, case);
    }
}

pub fn walk_program<V: Visitor + ?Sized>(visitor: &mut V, program: &Program) {
    for stmt in &program.statements {
        visitor.visit_statement(stmt);
    }
}

pub fn walk_statement<V: Visitor + ?Sized>(visitor: &mut V, stmt: &Statement) {
    match stmt {
        Statement::CreateBuffer { .. } => {}
        Statement::Insert { select, .. } => visitor.visit_select(select),
        Statement::Select(select) => visitor.visit_select(select),
    }
}

pub fn walk_select<V: Visitor + ?Sized>(visitor: &mut V, select: &SelectStatement) {
    for projection in &select.projections {
        match projection {
            Projection::Star(_) => {}
            Projection::Item { expr, .. } => visitor.visit_expr(expr),
        }
    }
    if let Some(source) = &select.source {
        visitor.visit_source(source);
    }
    if let Some(filter) = &select.filter {
        visitor.visit_expr(filter);
    }
}

pub fn walk_source<V: Visitor + ?Sized>(visitor: &mut V, source: &Source) {
    match source {
        Source::Download(download) => visitor.visit_download(download),
        Source::Buffer { .. } => {}
    }
}

pub fn walk_download<V: Visitor + ?Sized>(visitor: &mut V, download: &DownloadExpr) {
    match &download.urls {
        UrlSource::Literal(_) => {}
        UrlSource::Query(select) => visitor.visit_select(select),
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    match expr {
        Expr::Pick(pick) => visitor.visit_pick(pick),
        Expr::Case(case) => visitor.visit_case(case),
        Expr::Float(_)
        | Expr::Integer(_)
        | Expr::String(_)
        | Expr::Boolean(_)
        | Expr::Null
        | Expr::Identifier { .. }
        | Expr::BinaryOp { .. }
        | Expr::Not(_) => {
            for child in expr.children() {
                visitor.visit_expr(child);
            }
        }
    }
}

pub fn walk_case<V: Visitor + ?Sized>(visitor: &mut V, case: &CaseExpr) {
    if let Some(subject) = &case.subject {
        visitor.visit_expr(subject);
    }
    for branch in &case.branches {
        visitor.visit_expr(&branch.condition);
        visitor.visit_expr(&branch.result);
    }
    if let Some(otherwise) = &case.otherwise {
        visitor.visit_expr(otherwise);
    }
}

/// Records the position of every pick in a single select. Nested selects
/// are skipped; they are checked against their own source.
#[derive(Debug, Default)]
pub struct PickFinder {
    pub positions: Vec<Position>,
}

impl PickFinder {
    pub fn find(select: &SelectStatement) -> Vec<Position> {
        let mut finder = PickFinder::default();
        finder.visit_select(select);
        finder.positions
    }
}

impl Visitor for PickFinder {
    fn visit_source(&mut self, _source: &Source) {}

    fn visit_pick(&mut self, pick: &PickExpr) {
        self.positions.push(pick.position);
    }
}

/// Counts the statement kinds and download sources of a whole program.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProgramSummary {
    pub buffers: usize,
    pub inserts: usize,
    pub selects: usize,
    pub downloads: usize,
    pub picks: usize,
}

impl ProgramSummary {
    pub fn of(program: &Program) -> Self {
        let mut summary = ProgramSummary::default();
        summary.visit_program(program);
        summary
    }
}

impl Visitor for ProgramSummary {
    fn visit_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::CreateBuffer { .. } => self.buffers += 1,
            Statement::Insert { .. } => self.inserts += 1,
            Statement::Select(_) => self.selects += 1,
        }
        walk_statement(self, stmt);
    }

    fn visit_download(&mut self, download: &DownloadExpr) {
        self.downloads += 1;
        walk_download(self, download);
    }

    fn visit_pick(&mut self, _pick: &PickExpr) {
        self.picks += 1;
    }
}
