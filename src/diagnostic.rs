use owo_colors::OwoColorize;
use std::fmt;

/// A byte range into the raw template text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }

    pub fn offset(self, by: usize) -> Span {
        Span::new(self.start + by, self.end + by)
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A message attached to a span of the source.
#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

impl Label {
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<String>,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(message)
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_label(mut self, label: Label) -> Self {
        self.labels.push(label);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.notes.push(format!("help: {}", help.into()));
        self
    }
}

/// Line and column (both 1-based) of a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

fn line_text(source: &str, line_num: usize) -> &str {
    source.split('\n').nth(line_num - 1).unwrap_or("")
}

pub struct DiagnosticRenderer<'a> {
    source: &'a str,
    origin: &'a str,
    use_color: bool,
}

impl<'a> DiagnosticRenderer<'a> {
    pub fn new(source: &'a str, origin: &'a str, use_color: bool) -> Self {
        Self {
            source,
            origin,
            use_color,
        }
    }

    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        let mut output = String::new();

        let severity = diagnostic.severity.to_string();
        let severity = match (self.use_color, diagnostic.severity) {
            (false, _) => severity,
            (true, Severity::Error) => severity.red().bold().to_string(),
            (true, Severity::Warning) => severity.yellow().bold().to_string(),
        };
        match &diagnostic.code {
            Some(code) => output.push_str(&format!("{}[{}]: {}\n", severity, code, self.bold(&diagnostic.message))),
            None => output.push_str(&format!("{}: {}\n", severity, self.bold(&diagnostic.message))),
        }

        for label in &diagnostic.labels {
            let (line, col) = line_col(self.source, label.span.start);
            let gutter = " ".repeat(line.to_string().len());
            output.push_str(&format!("{}{} {}:{}:{}\n", gutter, self.blue("-->"), self.origin, line, col));
            output.push_str(&format!("{} {}\n", gutter, self.blue("|")));
            output.push_str(&format!(
                "{} {} {}\n",
                self.blue(&line.to_string()),
                self.blue("|"),
                line_text(self.source, line)
            ));

            let text = line_text(self.source, line);
            let available = text.chars().count().saturating_sub(col - 1).max(1);
            let width = self.source[label.span.start.min(self.source.len())..label.span.end.min(self.source.len())]
                .chars()
                .count()
                .clamp(1, available);
            let marker = format!("{}{}", " ".repeat(col - 1), "^".repeat(width));
            let marker = if label.message.is_empty() {
                marker
            } else {
                format!("{} {}", marker, label.message)
            };
            output.push_str(&format!("{} {} {}\n", gutter, self.blue("|"), self.red(&marker)));
        }

        for note in &diagnostic.notes {
            output.push_str(&format!("  {} {}\n", self.blue("="), note));
        }

        output
    }

    fn red(&self, s: &str) -> String {
        if self.use_color {
            s.red().to_string()
        } else {
            s.to_string()
        }
    }

    fn blue(&self, s: &str) -> String {
        if self.use_color {
            s.blue().to_string()
        } else {
            s.to_string()
        }
    }

    fn bold(&self, s: &str) -> String {
        if self.use_color {
            s.bold().to_string()
        } else {
            s.to_string()
        }
    }
}

pub fn render_diagnostics(source: &str, origin: &str, diagnostics: &[Diagnostic], use_color: bool) -> String {
    let renderer = DiagnosticRenderer::new(source, origin, use_color);
    let mut output = String::new();

    for diagnostic in diagnostics {
        output.push_str(&renderer.render(diagnostic));
        output.push('\n');
    }

    let error_count = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    if error_count > 0 {
        output.push_str(&format!(
            "error: aborting due to {} error{}\n",
            error_count,
            if error_count == 1 { "" } else { "s" }
        ));
    }

    output
}
