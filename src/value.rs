use std::cmp::Ordering;
use std::fmt;

/// A cell value produced while running a script.
///
/// Keeps the distinction between integers and floats; null is a regular
/// value that flows through extraction, case and arithmetic silently.
///
/// # Examples
///
/// ```
/// use pickaxe_lang::Value;
///
/// assert_eq!(Value::Integer(1).to_string(), "1");
/// assert_eq!(Value::Float(6.78).to_string(), "6.78");
/// assert_eq!(Value::String("test".into()).to_string(), "test");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value
    Null,

    /// Boolean (true/false)
    Boolean(bool),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// Floating-point number
    Float(f64),

    /// UTF-8 string
    String(String),
}

/// Static type of a column or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Integer,
    Float,
    String,
    Boolean,
    /// Only the null literal; unifies with every other type
    Null,
}

impl ValueType {
    /// Parses a column type name from a `create buffer` declaration.
    ///
    /// `identity` is an integer column whose values the runtime assigns.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "int" | "integer" | "bigint" | "identity" => Some(ValueType::Integer),
            "float" | "double" | "decimal" | "real" => Some(ValueType::Float),
            "string" | "text" | "varchar" => Some(ValueType::String),
            "bool" | "boolean" => Some(ValueType::Boolean),
            _ => None,
        }
    }

    /// Common type of two branches, or `None` when they cannot be reconciled.
    pub fn unify(self, other: ValueType) -> Option<ValueType> {
        use ValueType::*;
        match (self, other) {
            (a, b) if a == b => Some(a),
            (Null, t) | (t, Null) => Some(t),
            (Integer, Float) | (Float, Integer) => Some(Float),
            _ => None,
        }
    }

    /// Whether a value of type `from` may be stored in a column of this type.
    ///
    /// Strings are accepted by numeric columns and converted at insert time.
    pub fn accepts(self, from: ValueType) -> bool {
        use ValueType::*;
        match (self, from) {
            (_, Null) => true,
            (a, b) if a == b => true,
            (Float, Integer) => true,
            (Integer, Float) => false,
            (String, _) => true,
            (Integer | Float, String) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::Boolean => "boolean",
            ValueType::Null => "null",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if the value is truthy (for conditions). Null is false.
    pub fn is_truthy(&self) -> bool {
        use Value::*;
        match self {
            Null => false,
            Boolean(b) => *b,
            Float(n) => *n != 0.0,
            Integer(n) => *n != 0,
            String(s) => !s.is_empty(),
        }
    }

    /// Numeric view of the value. Strings count when their trimmed text
    /// parses as a number, so extracted text can be compared with literals.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Integer(n) => Some(Number::Integer(*n)),
            Value::Float(n) => Some(Number::Float(*n)),
            Value::String(s) => {
                let s = s.trim();
                if let Ok(n) = s.parse::<i64>() {
                    Some(Number::Integer(n))
                } else {
                    s.parse::<f64>().ok().map(Number::Float)
                }
            }
            _ => None,
        }
    }

    /// Value equality used by `=` and by `case <subject> when ..`.
    ///
    /// Null never equals anything. A number equals a string whose text
    /// parses to the same number.
    pub fn loose_eq(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::String(a), Value::String(b)) => Some(a == b),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a == b),
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => Some(x.compare(y) == Some(Ordering::Equal)),
                _ => Some(false),
            },
        }
    }

    /// Ordering used by `<`, `>`, `<=`, `>=`; `None` when incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x.compare(y),
                _ => None,
            },
        }
    }

    /// Converts the value for storage in a column of type `target`.
    ///
    /// Returns `None` when the text of a string cannot be read as the
    /// target type.
    pub fn convert_to(self, target: ValueType) -> Option<Value> {
        match (target, self) {
            (_, Value::Null) => Some(Value::Null),
            (ValueType::Integer, Value::Integer(n)) => Some(Value::Integer(n)),
            (ValueType::Integer, Value::Float(n))
                if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 =>
            {
                Some(Value::Integer(n as i64))
            }
            (ValueType::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::Integer),
            (ValueType::Float, Value::Float(n)) => Some(Value::Float(n)),
            (ValueType::Float, Value::Integer(n)) => Some(Value::Float(n as f64)),
            (ValueType::Float, Value::String(s)) => s.trim().parse::<f64>().ok().map(Value::Float),
            (ValueType::String, v) => Some(Value::String(v.to_string())),
            (ValueType::Boolean, Value::Boolean(b)) => Some(Value::Boolean(b)),
            (ValueType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Boolean(true)),
                "false" => Some(Value::Boolean(false)),
                _ => None,
            },
            (ValueType::Null, v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    /// Textual form of a cell. Null renders as `NULL`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

/// Numeric view of a value, see [`Value::as_number`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(n) => n as f64,
            Number::Float(n) => n,
        }
    }

    fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Integer(n) => Value::Integer(n),
            Number::Float(n) => Value::Float(n),
        }
    }
}
