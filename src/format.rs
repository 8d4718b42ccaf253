use crate::Value;

pub fn value_to_json_string(value: &Value, compact: bool) -> String {
    format_json(value, if compact { None } else { Some(0) })
}

pub fn escape_json_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Renders a number the way it reads in a template: integral values
/// without a trailing `.0`.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

/// Text a value contributes when spliced into a template.
///
/// `null` contributes nothing; arrays and objects fall back to compact JSON.
pub fn value_to_display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n, _) => format_number(*n),
        Value::String(s) => s.to_string(),
        Value::Array(_) | Value::Object(_) => format_json(value, None),
    }
}

pub fn format_json(value: &Value, indent: Option<usize>) -> String {
    const INDENT_SIZE: usize = 2;

    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(numeric_value, is_float) => {
            if !numeric_value.is_finite() {
                "null".to_string()
            } else if *is_float {
                let formatted = numeric_value.to_string();
                if formatted.contains('.') || formatted.contains('e') || formatted.contains('E') {
                    formatted
                } else {
                    format!("{}.0", numeric_value)
                }
            } else {
                format!("{:.0}", numeric_value)
            }
        }
        Value::String(s) => format!("\"{}\"", escape_json_string(s)),
        Value::Array(items) => {
            if items.is_empty() {
                return "[]".to_string();
            }
            match indent {
                None => {
                    let elements: Vec<String> =
                        items.iter().map(|item| format_json(item, None)).collect();
                    format!("[{}]", elements.join(","))
                }
                Some(level) => {
                    let indent_str = " ".repeat(level * INDENT_SIZE);
                    let next_indent = " ".repeat((level + 1) * INDENT_SIZE);
                    let elements: Vec<String> = items
                        .iter()
                        .map(|item| format!("{}{}", next_indent, format_json(item, Some(level + 1))))
                        .collect();
                    format!("[\n{}\n{}]", elements.join(",\n"), indent_str)
                }
            }
        }
        Value::Object(map) => {
            if map.is_empty() {
                return "{}".to_string();
            }
            match indent {
                None => {
                    let fields: Vec<String> = map
                        .iter()
                        .map(|(k, v)| format!("\"{}\":{}", escape_json_string(k), format_json(v, None)))
                        .collect();
                    format!("{{{}}}", fields.join(","))
                }
                Some(level) => {
                    let indent_str = " ".repeat(level * INDENT_SIZE);
                    let next_indent = " ".repeat((level + 1) * INDENT_SIZE);
                    let fields: Vec<String> = map
                        .iter()
                        .map(|(k, v)| {
                            format!(
                                "{}\"{}\": {}",
                                next_indent,
                                escape_json_string(k),
                                format_json(v, Some(level + 1))
                            )
                        })
                        .collect();
                    format!("{{\n{}\n{}}}", fields.join(",\n"), indent_str)
                }
            }
        }
    }
}
