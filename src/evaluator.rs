use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};

use crate::{
    ast::BinOp,
    codegen::{CaseStep, Operand, PageField},
    dom::Element,
    download::{DownloadImage, DownloadPage},
    error::RuntimeError,
    extract::Extractor,
    http::DynamicObject,
    value::{Number, Value},
};

/// Everything an operand can read while one output row is computed.
#[derive(Clone, Copy, Default)]
pub struct RowContext<'r> {
    /// Current buffer row
    pub row: &'r [Value],
    pub page: Option<&'r DownloadPage>,
    pub image: Option<&'r DownloadImage>,
    /// Url of a wire that could not be fetched; its other fields are null
    pub failed_url: Option<&'r str>,
    pub json: Option<&'r DynamicObject>,
    /// Context element picks run against
    pub element: Option<&'r dyn Element>,
}

impl<'r> RowContext<'r> {
    pub fn buffer(row: &'r [Value]) -> Self {
        RowContext {
            row,
            ..Default::default()
        }
    }

    pub fn page(page: &'r DownloadPage, element: &'r dyn Element) -> Self {
        RowContext {
            page: Some(page),
            element: Some(element),
            ..Default::default()
        }
    }

    pub fn image(image: &'r DownloadImage) -> Self {
        RowContext {
            image: Some(image),
            ..Default::default()
        }
    }

    pub fn failed(url: &'r str) -> Self {
        RowContext {
            failed_url: Some(url),
            ..Default::default()
        }
    }

    pub fn json(object: &'r DynamicObject) -> Self {
        RowContext {
            json: Some(object),
            ..Default::default()
        }
    }
}

/// Computes operand values row by row.
///
/// Null flows through silently: a missing pick, an unknown property or a
/// null operand never fails, it just yields null.
pub struct Evaluator<'x> {
    extractor: &'x Extractor,
}

impl<'x> Evaluator<'x> {
    pub fn new(extractor: &'x Extractor) -> Self {
        Evaluator { extractor }
    }

    pub fn eval(&self, operand: &Operand, ctx: &RowContext<'_>) -> Result<Value, RuntimeError> {
        match operand {
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Column(index) => Ok(ctx.row.get(*index).cloned().unwrap_or(Value::Null)),
            Operand::PageField(field) => Ok(intrinsic_field(ctx, *field)),
            Operand::JsonField(name) => Ok(ctx
                .json
                .and_then(|object| object.get(name))
                .map(|text| Value::String(text.clone()))
                .unwrap_or(Value::Null)),
            Operand::Pick(pick) => match ctx.element {
                Some(element) => self.extractor.pick(pick, element),
                None => Ok(Value::Null),
            },
            Operand::Case(case) => self.eval_case(case, ctx),
            Operand::Binary { op, left, right } => match op {
                BinOp::And => {
                    let left = self.eval(left, ctx)?;
                    if !left.is_truthy() {
                        return Ok(Value::Boolean(false));
                    }
                    Ok(Value::Boolean(self.eval(right, ctx)?.is_truthy()))
                }
                BinOp::Or => {
                    let left = self.eval(left, ctx)?;
                    if left.is_truthy() {
                        return Ok(Value::Boolean(true));
                    }
                    Ok(Value::Boolean(self.eval(right, ctx)?.is_truthy()))
                }
                _ => {
                    let left = self.eval(left, ctx)?;
                    let right = self.eval(right, ctx)?;
                    apply_binop(*op, &left, &right)
                }
            },
            Operand::Not(inner) => match self.eval(inner, ctx)? {
                Value::Null => Ok(Value::Null),
                value => Ok(Value::Boolean(!value.is_truthy())),
            },
        }
    }

    /// First matching branch wins; the subject is evaluated once.
    fn eval_case(&self, case: &CaseStep, ctx: &RowContext<'_>) -> Result<Value, RuntimeError> {
        let subject = case
            .subject
            .as_ref()
            .map(|s| self.eval(s, ctx))
            .transpose()?;

        for (when, then) in &case.branches {
            let candidate = self.eval(when, ctx)?;
            let hit = match &subject {
                Some(subject) => subject.loose_eq(&candidate).unwrap_or(false),
                None => candidate.is_truthy(),
            };
            if hit {
                return self.eval(then, ctx);
            }
        }

        match &case.otherwise {
            Some(otherwise) => self.eval(otherwise, ctx),
            None => Ok(Value::Null),
        }
    }
}

fn intrinsic_field(ctx: &RowContext<'_>, field: PageField) -> Value {
    let size = |n: usize| Value::Integer(i64::try_from(n).unwrap_or(i64::MAX));
    if let Some(page) = ctx.page {
        return match field {
            PageField::Url => Value::String(page.url.clone()),
            PageField::Size => size(page.size),
            PageField::Date => Value::String(page.date_text()),
            PageField::Filename => Value::Null,
        };
    }
    if let Some(image) = ctx.image {
        return match field {
            PageField::Url => Value::String(image.url.clone()),
            PageField::Size => size(image.size()),
            PageField::Date => Value::String(image.date_text()),
            PageField::Filename => Value::String(image.filename.clone()),
        };
    }
    match (ctx.failed_url, field) {
        (Some(url), PageField::Url) => Value::String(url.to_string()),
        _ => Value::Null,
    }
}

/// Returns a human-readable type name for a Value
fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Boolean(_) => "boolean",
        Value::Integer(_) => "integer",
        Value::Float(_) => "float",
        Value::String(_) => "string",
    }
}

/// Applies a non-logical binary operator.
///
/// `+` concatenates when either side is a string. Other arithmetic reads
/// strings as numbers. Comparisons with null or incomparable operands give
/// null.
pub fn apply_binop(op: BinOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    if op.is_comparison() {
        let result = match op {
            BinOp::Equal => left.loose_eq(right),
            BinOp::NotEqual => left.loose_eq(right).map(|eq| !eq),
            BinOp::LessThan => left.compare(right).map(|o| o.is_lt()),
            BinOp::GreaterThan => left.compare(right).map(|o| o.is_gt()),
            BinOp::LessEqual => left.compare(right).map(|o| o.is_le()),
            BinOp::GreaterEqual => left.compare(right).map(|o| o.is_ge()),
            _ => None,
        };
        return Ok(result.map(Value::Boolean).unwrap_or(Value::Null));
    }

    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::String(a), b) if op == BinOp::Add => Ok(Value::String(format!("{}{}", a, b))),
        (a, Value::String(b)) if op == BinOp::Add => Ok(Value::String(format!("{}{}", a, b))),
        (Value::Boolean(_), _) | (_, Value::Boolean(_)) => Err(type_error(op, left, right)),
        (a, b) => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => arithmetic(op, x, y),
            _ => Err(type_error(op, left, right)),
        },
    }
}

fn type_error(op: BinOp, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::Type(format!(
        "cannot apply '{}' to {} and {}",
        op,
        type_name(left),
        type_name(right)
    ))
}

/// Integer operands stay integers except under `/`, which always yields a
/// float. Anything involving a float is a float.
fn arithmetic(op: BinOp, a: Number, b: Number) -> Result<Value, RuntimeError> {
    if matches!(op, BinOp::Divide | BinOp::Modulo) && b.as_f64() == 0.0 {
        return Err(RuntimeError::DivisionByZero);
    }

    match (a, b) {
        (Number::Integer(_), Number::Integer(_)) if op == BinOp::Divide => {
            Ok(decimal_op(op, a, b).unwrap_or_else(|| float_op(op, a.as_f64(), b.as_f64())))
        }
        (Number::Integer(x), Number::Integer(y)) => {
            let exact = match op {
                BinOp::Add => x.checked_add(y),
                BinOp::Subtract => x.checked_sub(y),
                BinOp::Multiply => x.checked_mul(y),
                BinOp::Modulo => x.checked_rem(y),
                _ => None,
            };
            exact
                .map(Value::Integer)
                .ok_or_else(|| RuntimeError::Overflow(format!("{} {} {}", x, op, y)))
        }
        (Number::Float(x), Number::Float(y)) => Ok(float_op(op, x, y)),
        // Mixed integer/float goes through Decimal
        (a, b) => Ok(decimal_op(op, a, b).unwrap_or_else(|| float_op(op, a.as_f64(), b.as_f64()))),
    }
}

fn to_decimal(n: Number) -> Option<Decimal> {
    match n {
        Number::Integer(i) => Decimal::from_i64(i),
        Number::Float(f) => Decimal::from_f64(f),
    }
}

fn decimal_op(op: BinOp, a: Number, b: Number) -> Option<Value> {
    let ad = to_decimal(a)?;
    let bd = to_decimal(b)?;
    let rd = match op {
        BinOp::Add => ad.checked_add(bd),
        BinOp::Subtract => ad.checked_sub(bd),
        BinOp::Multiply => ad.checked_mul(bd),
        BinOp::Divide => ad.checked_div(bd),
        BinOp::Modulo => ad.checked_rem(bd),
        _ => None,
    }?;
    rd.to_f64().map(Value::Float)
}

fn float_op(op: BinOp, x: f64, y: f64) -> Value {
    let r = match op {
        BinOp::Add => x + y,
        BinOp::Subtract => x - y,
        BinOp::Multiply => x * y,
        BinOp::Divide => x / y,
        BinOp::Modulo => x % y,
        _ => f64::NAN,
    };
    Value::Float(r)
}
