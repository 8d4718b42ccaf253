pub mod ast;
pub mod autocomplete;
pub mod binding;
pub mod builder;
pub mod classify;
pub mod cli;
pub mod config;
pub mod convert;
pub mod diagnostic;
pub mod format;
pub mod interpreter;
pub mod lexer;
pub mod template;
pub mod token;
pub mod tree;
pub mod value;
pub mod workspace;

pub use ast::{ParsedExpression, Template};
pub use autocomplete::{suggest, suggest_in_scope, Suggestion};
pub use binding::{available_sources, validate_binding, Accepts, BindingError, BindingExpression};
pub use builder::{build, TreeBuilder};
pub use classify::{classify, classify_template, Classification, RepeaterScope};
pub use interpreter::{evaluate, render, render_str, EvalError, EvalOptions, EvaluationContext};
pub use template::{parse, parse_template};
pub use tree::{Category, DataSourceNode, DataSourceTree, ValueType};
pub use value::Value;
pub use workspace::{Clock, FixedClock, SystemClock, Workspace};
