use std::fmt;
use std::rc::Rc;

use crate::diagnostic::Span;
use crate::format::format_json;
use crate::value::Value;

/// One parsed `{{...}}` payload: a root, a left-to-right walk of segments,
/// and the pipes applied to whatever the walk resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExpression {
    pub root: String,
    pub segments: Vec<Segment>,
    pub pipes: Vec<Pipe>,
    pub span: Span,
}

impl ParsedExpression {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            segments: Vec::new(),
            pipes: Vec::new(),
            span: Span::dummy(),
        }
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.segments.push(Segment::Field(name.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(Segment::Index(index));
        self
    }

    pub fn call(mut self, call: Call) -> Self {
        self.segments.push(Segment::Call(call));
        self
    }

    pub fn pipe(mut self, op: PipeOp, args: Vec<Value>) -> Self {
        self.pipes.push(Pipe { op, args });
        self
    }

    pub fn is_bare_root(&self) -> bool {
        self.segments.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Field(String),
    Index(usize),
    Call(Call),
}

/// Call segments, resolved from their name once at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Count,
    Sum(Option<String>),
    Avg(Option<String>),
    Min(Option<String>),
    Max(Option<String>),
    Filter(Lambda),
    Map(Lambda),
    Unknown { name: String, args: Vec<Expr> },
}

impl Call {
    pub fn name(&self) -> &str {
        match self {
            Call::Count => "count",
            Call::Sum(_) => "sum",
            Call::Avg(_) => "avg",
            Call::Min(_) => "min",
            Call::Max(_) => "max",
            Call::Filter(_) => "filter",
            Call::Map(_) => "map",
            Call::Unknown { name, .. } => name,
        }
    }

    /// Aggregations reduce a collection to one value and end the walk.
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Call::Count | Call::Sum(_) | Call::Avg(_) | Call::Min(_) | Call::Max(_)
        )
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            Call::Sum(field) | Call::Avg(field) | Call::Min(field) | Call::Max(field) => {
                field.as_deref()
            }
            _ => None,
        }
    }
}

/// Predicate passed to `filter`/`map`.
///
/// With no parameters the element is bound to `item` and its position to
/// `index`; otherwise to the named parameters, leaving any enclosing
/// `item` visible.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<Rc<str>>,
    pub body: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pipe {
    pub op: PipeOp,
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeOp {
    Currency,
    Date,
    Upper,
    Lower,
    Number,
    Unknown(String),
}

impl PipeOp {
    /// Known pipes with a short description, in suggestion order.
    pub const KNOWN: [(PipeOp, &'static str); 5] = [
        (PipeOp::Currency, "Format a number as $1,234.50"),
        (PipeOp::Date, "Format a date as M/D/YYYY"),
        (PipeOp::Number, "Format a number with thousands separators"),
        (PipeOp::Upper, "Uppercase text"),
        (PipeOp::Lower, "Lowercase text"),
    ];

    pub fn from_name(name: &str) -> Self {
        match name {
            "currency" => PipeOp::Currency,
            "date" => PipeOp::Date,
            "upper" => PipeOp::Upper,
            "lower" => PipeOp::Lower,
            "number" => PipeOp::Number,
            _ => PipeOp::Unknown(name.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PipeOp::Currency => "currency",
            PipeOp::Date => "date",
            PipeOp::Upper => "upper",
            PipeOp::Lower => "lower",
            PipeOp::Number => "number",
            PipeOp::Unknown(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Greater,
    Less,
    GreaterEq,
    LessEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Greater => ">",
            BinaryOp::Less => "<",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::LessEq => "<=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Predicate expressions inside `filter(...)` and `map(...)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(ParsedExpression),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

/// A template string split into literal text and parsed tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub parts: Vec<TemplatePart>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    Token(ParsedExpression),
}

impl Template {
    /// The expression when the template is exactly one token and nothing else.
    pub fn single_token(&self) -> Option<&ParsedExpression> {
        match self.parts.as_slice() {
            [TemplatePart::Token(expression)] => Some(expression),
            _ => None,
        }
    }

    pub fn tokens(&self) -> impl Iterator<Item = &ParsedExpression> {
        self.parts.iter().filter_map(|part| match part {
            TemplatePart::Token(expression) => Some(expression),
            TemplatePart::Text(_) => None,
        })
    }

    pub fn is_static(&self) -> bool {
        self.tokens().next().is_none()
    }
}

impl fmt::Display for ParsedExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for segment in &self.segments {
            write!(f, "{}", segment)?;
        }
        for pipe in &self.pipes {
            write!(f, "|{}", pipe.op.name())?;
            if !pipe.args.is_empty() {
                let args: Vec<String> = pipe.args.iter().map(|a| format_json(a, None)).collect();
                write!(f, "({})", args.join(", "))?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => write!(f, ".{}", name),
            Segment::Index(index) => write!(f, "[{}]", index),
            Segment::Call(call) => write!(f, ".{}", call),
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Call::Filter(lambda) | Call::Map(lambda) => write!(f, "{}({})", self.name(), lambda),
            Call::Unknown { name, args } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", name, args.join(", "))
            }
            _ => write!(f, "{}({})", self.name(), self.field().unwrap_or("")),
        }
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.params.as_slice() {
            [] => write!(f, "{}", self.body),
            [param] => write!(f, "{} => {}", param, self.body),
            params => {
                let names: Vec<&str> = params.iter().map(|p| p.as_ref()).collect();
                write!(f, "({}) => {}", names.join(", "), self.body)
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => write!(f, "{}", format_json(value, None)),
            Expr::Path(path) => write!(f, "{}", path),
            Expr::Unary(UnaryOp::Not, operand) => write!(f, "!{}", operand),
            Expr::Unary(UnaryOp::Neg, operand) => write!(f, "-{}", operand),
            Expr::Binary(op, left, right) => write!(f, "({} {} {})", left, op.symbol(), right),
        }
    }
}
