use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals and Identifiers
    Ident(String),
    Number(f64, bool),
    String(String),
    True,
    False,
    Null,

    // Arithmetic Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Comparison Operators
    Eq,
    NotEq,
    /// `===`
    StrictEq,
    /// `!==`
    StrictNotEq,
    Greater,
    Less,
    GreaterEq,
    LessEq,

    // Logical Operators
    And,
    Or,
    Bang,

    // Special Operators
    /// `|` - pipe into a formatter
    Pipe,
    /// `=>` - predicate parameter arrow
    Arrow,
    Comma,

    // Delimiters
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "`{}`", name),
            Token::Number(n, _) => write!(f, "`{}`", n),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::True => write!(f, "`true`"),
            Token::False => write!(f, "`false`"),
            Token::Null => write!(f, "`null`"),
            other => {
                let symbol = match other {
                    Token::Plus => "+",
                    Token::Minus => "-",
                    Token::Star => "*",
                    Token::Slash => "/",
                    Token::Percent => "%",
                    Token::Eq => "==",
                    Token::NotEq => "!=",
                    Token::StrictEq => "===",
                    Token::StrictNotEq => "!==",
                    Token::Greater => ">",
                    Token::Less => "<",
                    Token::GreaterEq => ">=",
                    Token::LessEq => "<=",
                    Token::And => "&&",
                    Token::Or => "||",
                    Token::Bang => "!",
                    Token::Pipe => "|",
                    Token::Arrow => "=>",
                    Token::Comma => ",",
                    Token::Dot => ".",
                    Token::LParen => "(",
                    Token::RParen => ")",
                    Token::LBracket => "[",
                    _ => "]",
                };
                write!(f, "`{}`", symbol)
            }
        }
    }
}
