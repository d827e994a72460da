use super::grammar::{FilterGrammar, Operator};
use crate::error::{OrmError, OrmResult};
use crate::statement::{Statement, StatementKind};
use crate::value::Value;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Right-hand side of a filter condition.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// A single bound value.
    Scalar(Value),
    /// A list of bound values (`in`, `between`).
    List(Vec<Value>),
    /// A compiled SELECT used as an `in` operand.
    SubQuery(Statement),
    /// A raw column or expression (`eqf`). Never pass untrusted input here.
    Field(String),
}

impl FilterValue {
    /// Reference another column, for `eqf` conditions.
    pub fn field(expr: impl Into<String>) -> Self {
        FilterValue::Field(expr.into())
    }

    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        FilterValue::List(values.into_iter().map(Into::into).collect())
    }

    fn describe(&self) -> &'static str {
        match self {
            FilterValue::Scalar(_) => "a scalar",
            FilterValue::List(_) => "a list",
            FilterValue::SubQuery(_) => "a subquery",
            FilterValue::Field(_) => "a field reference",
        }
    }
}

macro_rules! impl_filter_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FilterValue {
                fn from(v: $t) -> Self {
                    FilterValue::Scalar(v.into())
                }
            }

            impl From<Vec<$t>> for FilterValue {
                fn from(v: Vec<$t>) -> Self {
                    FilterValue::list(v)
                }
            }

            impl<const N: usize> From<[$t; N]> for FilterValue {
                fn from(v: [$t; N]) -> Self {
                    FilterValue::list(v)
                }
            }
        )*
    };
}

impl_filter_value!(
    i8,
    i16,
    i32,
    i64,
    u16,
    u32,
    f32,
    f64,
    bool,
    &str,
    String,
    Value,
    Uuid,
    DateTime<Utc>
);

impl From<u8> for FilterValue {
    fn from(v: u8) -> Self {
        FilterValue::Scalar(v.into())
    }
}

impl From<Vec<u8>> for FilterValue {
    fn from(v: Vec<u8>) -> Self {
        FilterValue::Scalar(Value::Bytes(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for FilterValue {
    fn from(v: Option<T>) -> Self {
        FilterValue::Scalar(v.into())
    }
}

impl From<Statement> for FilterValue {
    fn from(stmt: Statement) -> Self {
        FilterValue::SubQuery(stmt)
    }
}

/// One parsed `field__operator` predicate.
///
/// Operand shape is checked when the condition is built, so rendering never fails.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    field: String,
    op: Operator,
    operand: FilterValue,
}

impl FilterCondition {
    /// Parse a key against the grammar and validate the operand for its operator.
    pub fn parse(
        grammar: &FilterGrammar,
        key: &str,
        value: impl Into<FilterValue>,
    ) -> OrmResult<Self> {
        let (field, op) = grammar.parse_key(key)?;
        Self::new(field, op, value)
    }

    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<FilterValue>) -> OrmResult<Self> {
        let field = field.into();
        let operand = check_operand(&field, op, value.into())?;
        Ok(Self { field, op, operand })
    }

    /// Column-to-column equality, as used by join conditions.
    pub fn eqf(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            field: left.into(),
            op: Operator::Eqf,
            operand: FilterValue::Field(right.into()),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.op
    }

    pub fn operand(&self) -> &FilterValue {
        &self.operand
    }

    /// Render the SQL fragment and the values it binds.
    pub fn render(&self) -> (String, Vec<Value>) {
        let field = &self.field;
        match (&self.op, &self.operand) {
            (Operator::In, FilterValue::SubQuery(stmt)) => {
                (format!("{field} in ({})", stmt.text()), stmt.values().to_vec())
            }
            (Operator::In, FilterValue::List(values)) if values.is_empty() => {
                ("1=0".to_string(), Vec::new())
            }
            (Operator::In, FilterValue::List(values)) => {
                let placeholders = vec!["?"; values.len()].join(", ");
                (format!("{field} in ({placeholders})"), values.clone())
            }
            (Operator::Between, FilterValue::List(values)) => {
                (format!("({field} between ? AND ?)"), values.clone())
            }
            (Operator::Like, FilterValue::Scalar(v)) => (format!("{field} LIKE ?"), vec![v.clone()]),
            (Operator::Eqf, FilterValue::Field(expr)) => (format!("{field} = {expr}"), Vec::new()),
            (op, FilterValue::Scalar(v)) => {
                let symbol = op.symbol().unwrap_or("=");
                (format!("{field} {symbol} ?"), vec![v.clone()])
            }
            // Unreachable after `check_operand`.
            (op, operand) => (
                format!("{field} {op} {}", operand.describe()),
                Vec::new(),
            ),
        }
    }
}

fn check_operand(field: &str, op: Operator, operand: FilterValue) -> OrmResult<FilterValue> {
    let reject = |operand: &FilterValue| {
        Err(OrmError::grammar(format!(
            "operator '{op}' on '{field}' cannot take {}",
            operand.describe()
        )))
    };

    match op {
        Operator::In => match operand {
            FilterValue::Scalar(v) => Ok(FilterValue::List(vec![v])),
            FilterValue::List(_) => Ok(operand),
            FilterValue::SubQuery(ref stmt) if stmt.kind() != StatementKind::Select => {
                Err(OrmError::grammar(format!(
                    "subquery for '{field}__in' must be a SELECT, got {}",
                    stmt.kind()
                )))
            }
            FilterValue::SubQuery(_) => Ok(operand),
            FilterValue::Field(_) => reject(&operand),
        },
        Operator::Between => match operand {
            FilterValue::List(ref values) if values.len() == 2 => Ok(operand),
            FilterValue::List(ref values) => Err(OrmError::grammar(format!(
                "'{field}__between' needs exactly 2 values, got {}",
                values.len()
            ))),
            _ => reject(&operand),
        },
        Operator::Eqf => match operand {
            FilterValue::Field(ref expr) if !expr.trim().is_empty() => Ok(operand),
            _ => reject(&operand),
        },
        _ => match operand {
            FilterValue::Scalar(_) => Ok(operand),
            _ => reject(&operand),
        },
    }
}
