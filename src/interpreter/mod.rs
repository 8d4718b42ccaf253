pub mod parser;
pub mod scope;
pub mod error;
pub mod value_utils;
pub mod builtins;
pub mod evaluator;

pub use error::EvalError;
pub use scope::LocalScope;
pub use parser::{parse_payload, ParseError, ParseErrorKind, TokenParser};
pub use evaluator::{
    evaluate, render, render_str, render_with_diagnostics, EvalOptions, EvaluationContext, TokenError,
};
