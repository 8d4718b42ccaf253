use crate::Value;
use indexmap::IndexMap;

pub fn json_to_value(json_val: serde_json::Value) -> Value {
    match json_val {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(json_number) => {
            let numeric_value = json_number.as_f64().unwrap_or(0.0);
            let number_string = json_number.to_string();
            let is_float = number_string.contains('.')
                || number_string.contains('e')
                || number_string.contains('E');
            Value::Number(numeric_value, is_float)
        }
        serde_json::Value::String(s) => Value::from(s),
        serde_json::Value::Array(array) => {
            Value::array(array.into_iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(object) => {
            let map: IndexMap<String, Value> = object
                .into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect();
            Value::object(map)
        }
    }
}

pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n, is_float) => {
            if !*is_float && n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
                serde_json::Value::from(*n as i64)
            } else {
                // NaN and infinities have no JSON form
                serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
        }
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
    }
}

impl From<serde_json::Value> for Value {
    fn from(json_val: serde_json::Value) -> Self {
        json_to_value(json_val)
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        value_to_json(&value)
    }
}

/// Parses a JSON document straight into a [`Value`].
pub fn parse_json(json_str: &str) -> Result<Value, String> {
    serde_json::from_str::<serde_json::Value>(json_str)
        .map(json_to_value)
        .map_err(|e| e.to_string())
}
