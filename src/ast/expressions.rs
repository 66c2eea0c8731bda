use crate::ast::BinOp;
use crate::lexer::Position;

/// Abstract Syntax Tree node representing a parsed expression.
///
/// Expressions appear as projection items, `where` conditions, `case`
/// subjects and branches, and URL sources of a download.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    /// Literal floating point number
    ///
    /// # Example
    /// ```text
    /// 6.78
    /// ```
    Float(f64),

    /// Literal integer
    Integer(i64),

    /// String literal
    ///
    /// # Example
    /// ```text
    /// 'test'
    /// ```
    String(String),

    /// Boolean literal
    Boolean(bool),

    /// Null literal
    Null,

    // References
    /// Column reference resolved against the statement's source
    ///
    /// # Examples
    /// ```text
    /// id
    /// url
    /// ```
    Identifier { name: String, position: Position },

    /// CSS-selector extraction
    ///
    /// # Example
    /// ```text
    /// pick '.address' take html match '(.*)<br>(.*)' replace '$1'
    /// ```
    Pick(PickExpr),

    /// SQL-style case expression
    Case(CaseExpr),

    // Operations
    /// Binary operation (arithmetic, comparison, logical)
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        /// Position of the operator
        position: Position,
    },

    /// Logical negation (`not <expr>`)
    Not(Box<Expr>),
}

/// What a pick extracts from the matched element.
#[derive(Debug, Clone, PartialEq)]
pub enum Take {
    /// Text content (`take text`)
    Text,
    /// Inner markup (`take html`)
    Html,
    /// Named attribute (`take attribute 'href'`)
    Attribute(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickExpr {
    pub selector: String,
    /// `None` when the script omits the `take` clause; extraction falls back
    /// to text.
    pub take: Option<Take>,
    pub pattern: Option<String>,
    /// Only valid together with `pattern`.
    pub replace: Option<String>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhenClause {
    /// A literal (value-match form) or a predicate (boolean form)
    pub condition: Expr,
    pub result: Expr,
}

/// `case [subject] when .. then .. [else ..] end`
///
/// With a subject, each `when` operand is compared to the subject by value;
/// without one, each `when` operand is a predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseExpr {
    pub subject: Option<Box<Expr>>,
    pub branches: Vec<WhenClause>,
    pub otherwise: Option<Box<Expr>>,
    pub position: Position,
}

impl Expr {
    /// Direct child expressions, in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Float(_)
            | Expr::Integer(_)
            | Expr::String(_)
            | Expr::Boolean(_)
            | Expr::Null
            | Expr::Identifier { .. }
            | Expr::Pick(_) => Vec::new(),
            Expr::Case(case) => {
                let mut children = Vec::new();
                if let Some(subject) = &case.subject {
                    children.push(subject.as_ref());
                }
                for branch in &case.branches {
                    children.push(&branch.condition);
                    children.push(&branch.result);
                }
                if let Some(otherwise) = &case.otherwise {
                    children.push(otherwise.as_ref());
                }
                children
            }
            Expr::BinaryOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expr::Not(inner) => vec![inner.as_ref()],
        }
    }

    /// Column name a projection gets when it carries no alias.
    pub fn inferred_name(&self) -> Option<&str> {
        match self {
            Expr::Identifier { name, .. } => Some(name),
            _ => None,
        }
    }
}
