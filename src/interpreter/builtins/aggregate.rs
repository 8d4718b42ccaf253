//! Aggregations: `count()`, `sum()`, `avg()`, `min()`, `max()`.

use crate::ast::Call;
use crate::value::Value;
use super::super::value_utils::numeric_or_zero;

/// `field` of every element; elements that are not objects or lack the
/// field contribute null.
pub fn project(values: &[Value], field: &str) -> Vec<Value> {
    values
        .iter()
        .map(|v| {
            v.as_object()
                .and_then(|object| object.get(field))
                .cloned()
                .unwrap_or(Value::Null)
        })
        .collect()
}

pub fn count(values: &[Value]) -> Value {
    Value::int(values.len() as i64)
}

pub fn sum(values: &[Value]) -> Value {
    let total: f64 = values.iter().map(numeric_or_zero).sum();
    Value::number(total)
}

pub fn avg(values: &[Value]) -> Value {
    if values.is_empty() {
        return Value::int(0);
    }
    let total: f64 = values.iter().map(numeric_or_zero).sum();
    Value::number(total / values.len() as f64)
}

pub fn min(values: &[Value]) -> Value {
    values
        .iter()
        .filter_map(Value::to_number)
        .reduce(f64::min)
        .map_or(Value::Null, Value::number)
}

pub fn max(values: &[Value]) -> Value {
    values
        .iter()
        .filter_map(Value::to_number)
        .reduce(f64::max)
        .map_or(Value::Null, Value::number)
}

/// Applies an aggregation call to values already projected onto its field.
/// Returns `None` for calls that are not aggregations.
pub fn aggregate(call: &Call, values: &[Value]) -> Option<Value> {
    let result = match call {
        Call::Count => count(values),
        Call::Sum(_) => sum(values),
        Call::Avg(_) => avg(values),
        Call::Min(_) => min(values),
        Call::Max(_) => max(values),
        _ => return None,
    };
    Some(result)
}
