use crate::diagnostic::{Diagnostic, Label, Span};

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// The root is neither in local scope nor in the tree.
    UnknownRoot { name: String },
    TypeMismatch { message: String },
    OutOfRange { index: usize, length: usize },
    FieldNotFound { field: String },
    UnknownFunction { name: String },
    DivisionByZero,
}

impl EvalError {
    pub fn unknown_root(name: impl Into<String>) -> Self {
        Self::UnknownRoot { name: name.into() }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            message: message.into(),
        }
    }

    pub fn out_of_range(index: usize, length: usize) -> Self {
        Self::OutOfRange { index, length }
    }

    pub fn field_not_found(field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            field: field.into(),
        }
    }

    pub fn unknown_function(name: impl Into<String>) -> Self {
        Self::UnknownFunction { name: name.into() }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownRoot { .. } => "E0201",
            Self::TypeMismatch { .. } => "E0202",
            Self::OutOfRange { .. } => "E0203",
            Self::FieldNotFound { .. } => "E0204",
            Self::UnknownFunction { .. } => "E0205",
            Self::DivisionByZero => "E0206",
        }
    }

    /// Convert to a diagnostic pointing at the token that failed.
    pub fn to_diagnostic_at(&self, span: Span) -> Diagnostic {
        let diagnostic = Diagnostic::error(self.to_string()).with_code(self.code());
        match self {
            Self::UnknownRoot { .. } => diagnostic
                .with_label(Label::primary(span, "not a data source or local name"))
                .with_help("`item` and `index` exist only inside a repeater"),
            Self::OutOfRange { index, .. } => {
                diagnostic.with_label(Label::primary(span, format!("index {} is out of range", index)))
            }
            Self::UnknownFunction { .. } => diagnostic
                .with_label(Label::primary(span, ""))
                .with_note("available calls: count, sum, avg, min, max, filter, map"),
            _ => diagnostic.with_label(Label::primary(span, "")),
        }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::UnknownRoot { name } => write!(f, "unknown data source `{}`", name),
            EvalError::TypeMismatch { message } => write!(f, "type mismatch: {}", message),
            EvalError::OutOfRange { index, length } => {
                write!(f, "index {} out of range for {} element(s)", index, length)
            }
            EvalError::FieldNotFound { field } => write!(f, "field `{}` not found", field),
            EvalError::UnknownFunction { name } => write!(f, "unknown function `{}`", name),
            EvalError::DivisionByZero => write!(f, "division by zero"),
        }
    }
}

impl std::error::Error for EvalError {}
