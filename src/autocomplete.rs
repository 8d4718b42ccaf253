//! Completions for a `{{` token being typed.
//!
//! The text between the last unclosed `{{` and the cursor is split on `.`
//! and walked through the data source tree one segment at a time; the last,
//! possibly empty, segment filters the children of the node reached. Pure
//! and cheap enough to run on every keystroke.

use serde::Serialize;
use tracing::trace;

use crate::ast::PipeOp;
use crate::classify::RepeaterScope;
use crate::tree::{is_identifier, Category, DataSourceNode, DataSourceTree, ValueType};

/// One entry of the completion dropdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    /// Everything that should follow `{{` once the suggestion is accepted.
    pub insert_text: String,
    pub label: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Suggestion {
    fn for_node(node: &DataSourceNode, insert_text: String, detail: String) -> Self {
        Self {
            insert_text,
            label: node.label.clone(),
            value_type: node.value_type,
            category: Some(node.category),
            description: node.description.clone(),
            detail: Some(detail),
        }
    }
}

/// The text typed so far inside the innermost unclosed `{{` before
/// `cursor`, a character offset clamped to the end of `raw`.
pub fn open_token(raw: &str, cursor: usize) -> Option<&str> {
    let end = raw.char_indices().nth(cursor).map(|(i, _)| i).unwrap_or(raw.len());
    let before = &raw[..end];
    let bytes = before.as_bytes();

    let mut open = None;
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let rest = &bytes[i..];
        match (open, quote) {
            (Some(_), Some(q)) => {
                if bytes[i] == b'\\' {
                    i += 2;
                    continue;
                }
                if bytes[i] == q {
                    quote = None;
                }
            }
            (Some(_), None) if bytes[i] == b'"' || bytes[i] == b'\'' => quote = Some(bytes[i]),
            (Some(_), None) if rest.starts_with(b"}}") => {
                open = None;
                i += 2;
                continue;
            }
            _ if rest.starts_with(b"{{") => {
                open = Some(i + 2);
                quote = None;
                i += 2;
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    open.map(|start| before[start..].trim_start())
}

pub fn suggest(raw: &str, cursor: usize, tree: &DataSourceTree) -> Vec<Suggestion> {
    suggest_in_scope(raw, cursor, tree, None)
}

/// [`suggest`], also offering `item` and `index` inside a repeater.
pub fn suggest_in_scope(
    raw: &str,
    cursor: usize,
    tree: &DataSourceTree,
    repeater: Option<&RepeaterScope>,
) -> Vec<Suggestion> {
    let Some(partial) = open_token(raw, cursor) else {
        return Vec::new();
    };

    let suggestions = match last_pipe(partial) {
        Some(bar) => suggest_pipes(partial, bar),
        None => suggest_path(partial, tree, repeater),
    };
    trace!(partial, suggestions = suggestions.len(), "suggest");
    suggestions
}

fn suggest_pipes(partial: &str, bar: usize) -> Vec<Suggestion> {
    let after = &partial[bar + 1..];
    let typed = after.trim_start();
    if !typed.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Vec::new();
    }
    let prefix = &partial[..partial.len() - typed.len()];
    let needle = typed.to_lowercase();

    PipeOp::KNOWN
        .iter()
        .filter(|(op, _)| op.name().contains(&needle))
        .map(|(op, description)| Suggestion {
            insert_text: format!("{}{}", prefix, op.name()),
            label: op.name().to_string(),
            value_type: ValueType::String,
            category: None,
            description: Some(description.to_string()),
            detail: Some("pipe".to_string()),
        })
        .collect()
}

fn suggest_path(partial: &str, tree: &DataSourceTree, repeater: Option<&RepeaterScope>) -> Vec<Suggestion> {
    let segments = split_path(partial);
    let Some((last, completed)) = segments.split_last() else {
        return Vec::new();
    };

    if completed.is_empty() {
        let needle = last.to_lowercase();
        let local = repeater.into_iter().flat_map(|scope| scope.roots());
        return local
            .chain(tree.all_roots())
            .filter(|node| node.id.to_lowercase().contains(&needle))
            .map(|node| Suggestion::for_node(node, node.expression(), node.category.to_string()))
            .collect();
    }

    let Some((node, indexed)) = resolve(completed, tree, repeater) else {
        return Vec::new();
    };

    let prefix = &partial[..partial.len() - last.len()];
    let needle = last.to_lowercase();
    node.children
        .iter()
        .filter(|child| !(indexed && child.is_call()))
        .filter(|child| child.name().to_lowercase().contains(&needle))
        .map(|child| {
            let name = child.name();
            let insert_text = if is_identifier(name) || child.is_call() {
                format!("{}{}", prefix, name)
            } else {
                format!("{}{}", prefix.trim_end_matches('.'), quoted_key(name))
            };
            let detail = if child.is_array {
                format!("{}[]", child.value_type)
            } else {
                child.value_type.to_string()
            };
            Suggestion::for_node(child, insert_text, detail)
        })
        .collect()
}

/// Follows the completed segments; `None` unless every one lands on a node
/// with children. The flag is set when the path ends on an indexed element,
/// which has the record's fields but none of the table's aggregates.
fn resolve<'t>(
    segments: &[&str],
    tree: &'t DataSourceTree,
    repeater: Option<&'t RepeaterScope>,
) -> Option<(&'t DataSourceNode, bool)> {
    let (first, rest) = segments.split_first()?;
    let mut head = steps(first).into_iter();

    let root_name = match head.next()? {
        Step::Child(name) => name,
        Step::Index | Step::Keep => return None,
    };
    let root = repeater
        .and_then(|scope| scope.root(&root_name))
        .or_else(|| tree.root(&root_name))?;
    let mut at = follow((root, false), head)?;

    for segment in rest {
        at = follow(at, steps(segment).into_iter())?;
    }
    Some(at)
}

fn follow<'t>(
    (mut node, mut indexed): (&'t DataSourceNode, bool),
    steps: impl Iterator<Item = Step>,
) -> Option<(&'t DataSourceNode, bool)> {
    for step in steps {
        match step {
            Step::Child(name) => {
                node = node.find_child(&name)?;
                indexed = false;
            }
            Step::Index => indexed = true,
            Step::Keep => {}
        }
    }
    node.has_children().then_some((node, indexed))
}

#[derive(Debug, PartialEq)]
enum Step {
    Child(String),
    /// `[n]` picks one element.
    Index,
    /// `filter`/`map` keep the collection shape.
    Keep,
}

fn steps(segment: &str) -> Vec<Step> {
    let segment = segment.trim();
    let head_end = segment.find(['[', '(']).unwrap_or(segment.len());
    let head = &segment[..head_end];
    let mut rest = &segment[head_end..];
    let mut out = Vec::new();

    if rest.starts_with('(') {
        let close = matching(rest, '(', ')').unwrap_or(rest.len() - 1);
        if head == "filter" || head == "map" {
            out.push(Step::Keep);
        } else {
            out.push(Step::Child(segment[..head_end + close + 1].to_string()));
        }
        rest = &rest[close + 1..];
    } else if !head.is_empty() {
        out.push(Step::Child(head.to_string()));
    }

    while rest.starts_with('[') {
        let Some(close) = matching(rest, '[', ']') else {
            break;
        };
        let inner = rest[1..close].trim();
        match unquote(inner) {
            Some(key) => out.push(Step::Child(key)),
            None => out.push(Step::Index),
        }
        rest = &rest[close + 1..];
    }
    out
}

/// Byte index of the bracket closing the one `text` starts with.
fn matching(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn unquote(text: &str) -> Option<String> {
    let q = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = text.strip_prefix(q)?.strip_suffix(q)?;
    Some(body.replace(&format!("\\{}", q), &q.to_string()).replace("\\\\", "\\"))
}

fn quoted_key(name: &str) -> String {
    format!("[\"{}\"]", name.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Splits on `.` outside brackets, parentheses and quotes. A trailing `.`
/// yields an empty final segment.
fn split_path(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => {
                out.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&text[start..]);
    out
}

/// Byte index of the last `|` that starts a pipe (not part of `||`, not
/// nested, not quoted).
fn last_pipe(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut quote = None;
    let mut escaped = false;
    let mut found = None;

    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b'|' if depth == 0 => {
                let doubled = bytes.get(i + 1) == Some(&b'|') || (i > 0 && bytes[i - 1] == b'|');
                if !doubled {
                    found = Some(i);
                }
            }
            _ => {}
        }
    }
    found
}
