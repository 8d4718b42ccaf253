use crate::value::Value;
use std::cmp::Ordering;

/// `===`: same type and same content, recursively.
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a, _), Value::Number(b, _)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(arr_a), Value::Array(arr_b)) => {
            arr_a.len() == arr_b.len()
                && arr_a
                    .iter()
                    .zip(arr_b.iter())
                    .all(|(va, vb)| strict_equals(va, vb))
        }
        (Value::Object(obj_a), Value::Object(obj_b)) => {
            obj_a.len() == obj_b.len()
                && obj_a
                    .iter()
                    .all(|(k, va)| obj_b.get(k).is_some_and(|vb| strict_equals(va, vb)))
        }
        _ => false,
    }
}

/// `==`: like `===`, except a number and a numeric string compare by value
/// and a boolean compares to the number 1 or 0.
pub fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n, _), Value::String(_)) | (Value::String(_), Value::Number(n, _)) => {
            let other = if matches!(a, Value::String(_)) { a } else { b };
            other.to_number() == Some(*n)
        }
        (Value::Bool(flag), Value::Number(n, _)) | (Value::Number(n, _), Value::Bool(flag)) => {
            *n == if *flag { 1.0 } else { 0.0 }
        }
        _ => strict_equals(a, b),
    }
}

/// Ordering for `<`, `<=`, `>`, `>=`. Numbers (and numeric strings against
/// numbers) compare numerically, strings lexically; anything else is
/// unordered and every comparison on it is false.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Number(..), _) | (_, Value::Number(..)) => {
            let (x, y) = (a.to_number()?, b.to_number()?);
            x.partial_cmp(&y)
        }
        _ => None,
    }
}

/// Numeric reading used by `sum` and `avg`: missing or non-numeric is 0.
pub fn numeric_or_zero(value: &Value) -> f64 {
    value.to_number().unwrap_or(0.0)
}
