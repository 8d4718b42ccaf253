//! Splitting template strings into literal text and `{{...}}` tokens.

use crate::ast::{ParsedExpression, Template, TemplatePart};
use crate::diagnostic::Span;
use crate::interpreter::parser::{parse_payload, ParseError, ParseErrorKind};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Literal text or a token payload, as byte ranges into the raw template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawPart {
    Text(Span),
    Token { payload: Span, whole: Span },
}

/// Finds the `}}` closing a token whose payload starts at `from`, skipping
/// quoted strings. Returns the byte offset of the `}}`.
fn find_close(raw: &str, from: usize) -> Result<usize, ParseError> {
    let bytes = raw.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = from;
    while i < bytes.len() {
        let byte = bytes[i];
        match quote {
            Some(q) => {
                if byte == b'\\' {
                    i += 1;
                } else if byte == q {
                    quote = None;
                }
            }
            None => {
                if byte == b'"' || byte == b'\'' {
                    quote = Some(byte);
                } else if bytes[i..].starts_with(CLOSE.as_bytes()) {
                    return Ok(i);
                } else if bytes[i..].starts_with(OPEN.as_bytes()) {
                    break;
                }
            }
        }
        i += 1;
    }
    let open = from - OPEN.len();
    Err(ParseError::new(
        ParseErrorKind::UnterminatedToken,
        "unterminated `{{`",
        Span::new(open, i.min(raw.len())),
    ))
}

fn scan(raw: &str) -> Result<Vec<RawPart>, ParseError> {
    let mut parts = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < raw.len() {
        if raw[i..].starts_with(OPEN) {
            if i > text_start {
                parts.push(RawPart::Text(Span::new(text_start, i)));
            }
            let payload_start = i + OPEN.len();
            let close = find_close(raw, payload_start)?;
            parts.push(RawPart::Token {
                payload: Span::new(payload_start, close),
                whole: Span::new(i, close + CLOSE.len()),
            });
            i = close + CLOSE.len();
            text_start = i;
        } else if raw[i..].starts_with(CLOSE) {
            return Err(ParseError::new(
                ParseErrorKind::UnterminatedToken,
                "`}}` without a matching `{{`",
                Span::new(i, i + CLOSE.len()),
            ));
        } else {
            i += raw[i..].chars().next().map_or(1, char::len_utf8);
        }
    }

    if text_start < raw.len() {
        parts.push(RawPart::Text(Span::new(text_start, raw.len())));
    }
    Ok(parts)
}

/// Parses a template: literal text interleaved with zero or more tokens.
pub fn parse_template(raw: &str) -> Result<Template, ParseError> {
    let mut parts = Vec::new();
    for part in scan(raw)? {
        match part {
            RawPart::Text(span) => parts.push(TemplatePart::Text(raw[span.start..span.end].to_string())),
            RawPart::Token { payload, whole } => {
                let mut expression = parse_payload(&raw[payload.start..payload.end], payload.start)
                    .map_err(|mut err| {
                        if err.kind == ParseErrorKind::EmptyExpression {
                            err.span = whole;
                        }
                        err
                    })?;
                expression.span = whole;
                parts.push(TemplatePart::Token(expression));
            }
        }
    }
    Ok(Template { parts })
}

/// Parses exactly one expression.
///
/// Accepts a single `{{...}}` token (surrounding whitespace allowed) or a
/// bare payload with no delimiters at all.
pub fn parse(raw: &str) -> Result<ParsedExpression, ParseError> {
    if !raw.contains(OPEN) && !raw.contains(CLOSE) {
        return parse_payload(raw, 0);
    }

    let template = parse_template(raw)?;
    let mut found: Option<ParsedExpression> = None;
    for part in template.parts {
        match part {
            TemplatePart::Text(text) if text.trim().is_empty() => {}
            TemplatePart::Token(expression) if found.is_none() => found = Some(expression),
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::NotASingleExpression,
                    "expected a single `{{...}}` expression",
                    Span::new(0, raw.len()),
                ))
            }
        }
    }
    found.ok_or_else(|| {
        ParseError::new(
            ParseErrorKind::EmptyExpression,
            "empty expression",
            Span::new(0, raw.len()),
        )
    })
}
