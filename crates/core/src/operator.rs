//! Filter operators and sort comparison shared by both backends.
//!
//! Type mismatches never raise: a filter whose operands do not fit the
//! operator simply does not match. Filters combine with AND only.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Error;

/// Comparison operator of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Contains,
    StartsWith,
    EndsWith,
}

impl Operator {
    pub const ALL: [Operator; 11] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::In,
        Operator::Nin,
        Operator::Contains,
        Operator::StartsWith,
        Operator::EndsWith,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::Nin => "nin",
            Operator::Contains => "contains",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
        }
    }

    /// Operators that compare strings case-insensitively.
    pub fn is_string_op(&self) -> bool {
        matches!(self, Operator::Contains | Operator::StartsWith | Operator::EndsWith)
    }

    pub fn is_numeric_op(&self) -> bool {
        matches!(self, Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Validation(format!("unknown operator '{s}'")))
    }
}

/// Evaluate `item <op> value`.
///
/// `item` is `None` when the record lacks the field.
pub fn evaluate(item: Option<&Value>, op: Operator, value: &Value) -> bool {
    match op {
        Operator::Eq => values_equal(item.unwrap_or(&Value::Null), value),
        Operator::Ne => !values_equal(item.unwrap_or(&Value::Null), value),
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            let (Some(a), Some(b)) = (item.and_then(Value::as_f64), value.as_f64()) else {
                return false;
            };
            match op {
                Operator::Gt => a > b,
                Operator::Gte => a >= b,
                Operator::Lt => a < b,
                _ => a <= b,
            }
        }
        Operator::In | Operator::Nin => {
            let Some(candidates) = value.as_array() else {
                return false;
            };
            let item = item.unwrap_or(&Value::Null);
            let found = candidates.iter().any(|c| values_equal(item, c));
            if op == Operator::In { found } else { !found }
        }
        Operator::Contains | Operator::StartsWith | Operator::EndsWith => {
            let (Some(a), Some(b)) = (item.and_then(Value::as_str), value.as_str()) else {
                return false;
            };
            let (a, b) = (a.to_lowercase(), b.to_lowercase());
            match op {
                Operator::Contains => a.contains(&b),
                Operator::StartsWith => a.starts_with(&b),
                _ => a.ends_with(&b),
            }
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Order two optional values: missing or null sorts before anything defined.
///
/// Values of different types compare equal so a stable sort keeps their
/// input order.
pub fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
