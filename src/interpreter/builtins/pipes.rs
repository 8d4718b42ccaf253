//! Formatting pipes. Every pipe returns its input unchanged when the input
//! cannot be converted.

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::fmt::Write;

use crate::ast::{Pipe, PipeOp};
use crate::format::format_number;
use crate::value::Value;

const MAX_DECIMALS: usize = 10;

pub fn apply_pipe(pipe: &Pipe, value: Value) -> Value {
    let formatted = match &pipe.op {
        PipeOp::Currency => currency(&value, &pipe.args),
        PipeOp::Date => date(&value, &pipe.args),
        PipeOp::Number => number(&value, &pipe.args),
        PipeOp::Upper => value.as_string().map(str::to_uppercase),
        PipeOp::Lower => value.as_string().map(str::to_lowercase),
        PipeOp::Unknown(_) => None,
    };
    formatted.map(Value::from).unwrap_or(value)
}

/// `$1,234.50`. A string argument replaces the symbol, a number argument
/// sets the decimals.
fn currency(value: &Value, args: &[Value]) -> Option<String> {
    let n = value.to_number()?;
    let mut symbol = "$";
    let mut decimals = 2;
    for arg in args {
        match arg {
            Value::String(s) => symbol = s.as_ref(),
            Value::Number(d, _) => decimals = decimals_arg(*d),
            _ => {}
        }
    }
    let digits = format!("{:.*}", decimals, n.abs());
    Some(format!("{}{}{}", sign(n, &digits), symbol, group_thousands(&digits)))
}

/// Thousands separators; decimals fixed when given, otherwise as written.
fn number(value: &Value, args: &[Value]) -> Option<String> {
    let n = value.to_number()?;
    let digits = match args.first().and_then(Value::as_number) {
        Some(d) => format!("{:.*}", decimals_arg(d), n.abs()),
        None => format_number(n.abs()),
    };
    if digits.contains(['e', 'i', 'N']) {
        return None;
    }
    Some(format!("{}{}", sign(n, &digits), group_thousands(&digits)))
}

/// Minus sign for `n` once rounded to `digits`; nothing when that rounds to zero.
fn sign(n: f64, digits: &str) -> &'static str {
    if n < 0.0 && digits.bytes().any(|b| matches!(b, b'1'..=b'9')) {
        "-"
    } else {
        ""
    }
}

/// `M/D/YYYY`, or the strftime pattern given as argument.
fn date(value: &Value, args: &[Value]) -> Option<String> {
    let datetime = to_datetime(value)?;
    match args.first().and_then(Value::as_string) {
        Some(pattern) => {
            let mut out = String::new();
            write!(out, "{}", datetime.format(pattern)).ok()?;
            Some(out)
        }
        None => Some(format!(
            "{}/{}/{}",
            datetime.month(),
            datetime.day(),
            datetime.year()
        )),
    }
}

fn to_datetime(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Number(ms, _) if ms.is_finite() => Utc
            .timestamp_millis_opt(*ms as i64)
            .single()
            .map(|dt| dt.naive_utc()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
                return Some(dt.naive_local());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        }
        _ => None,
    }
}

fn decimals_arg(d: f64) -> usize {
    if d.is_finite() && d > 0.0 {
        (d as usize).min(MAX_DECIMALS)
    } else {
        0
    }
}

/// Inserts `,` every three digits of the integer part of an unsigned number.
fn group_thousands(digits: &str) -> String {
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (digits, None),
    };

    let mut grouped = String::with_capacity(digits.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(frac_part) = frac_part {
        grouped.push('.');
        grouped.push_str(frac_part);
    }
    grouped
}
