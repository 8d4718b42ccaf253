use crate::ast::{BinaryOp, Call, Expr, Lambda, ParsedExpression, Pipe, PipeOp, Segment, UnaryOp};
use crate::diagnostic::{Diagnostic, Label, Span};
use crate::lexer::lexer;
use crate::token::Token;
use crate::value::Value;
use chumsky::Parser as _;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// `{{` without `}}`, or `}}` without `{{`.
    UnterminatedToken,
    /// `{{ }}` with nothing inside.
    EmptyExpression,
    /// `[..]` whose content is not a non-negative integer or a quoted name.
    InvalidIndex,
    UnexpectedToken,
    UnexpectedCharacter,
    UnexpectedEnd,
    /// A segment following `count()`, `sum()`, `avg()`, `min()` or `max()`.
    TrailingSegment,
    /// A call argument of the wrong form.
    InvalidArgument,
    /// `parse` was handed literal text or several tokens.
    NotASingleExpression,
}

impl ParseErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ParseErrorKind::UnterminatedToken => "E0101",
            ParseErrorKind::EmptyExpression => "E0102",
            ParseErrorKind::InvalidIndex => "E0103",
            ParseErrorKind::UnexpectedToken => "E0104",
            ParseErrorKind::UnexpectedCharacter => "E0105",
            ParseErrorKind::UnexpectedEnd => "E0106",
            ParseErrorKind::TrailingSegment => "E0107",
            ParseErrorKind::InvalidArgument => "E0108",
            ParseErrorKind::NotASingleExpression => "E0109",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub span: Span,
    pub expected: Vec<String>,
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
            expected: Vec::new(),
            found: None,
        }
    }

    pub fn with_expected(mut self, expected: Vec<String>) -> Self {
        self.expected = expected;
        self
    }

    pub fn with_found(mut self, found: impl Into<String>) -> Self {
        self.found = Some(found.into());
        self
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut msg = self.message.clone();
        if !self.expected.is_empty() {
            msg = format!("expected {}", self.expected.join(" or "));
            if let Some(found) = &self.found {
                msg.push_str(&format!(", found {}", found));
            }
        }

        let mut diag = Diagnostic::error(msg)
            .with_code(self.kind.code())
            .with_label(Label::primary(self.span, ""));

        match self.kind {
            ParseErrorKind::UnterminatedToken => {
                diag = diag.with_help("every `{{` needs a matching `}}`");
            }
            ParseErrorKind::InvalidIndex => {
                diag = diag.with_help("indices are written as `[0]`, `[1]`, ...");
            }
            ParseErrorKind::TrailingSegment => {
                diag = diag.with_note("aggregations produce a single value and end the path");
            }
            _ => {}
        }

        diag
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.expected.is_empty() {
            write!(f, " (expected {}", self.expected.join(" or "))?;
            if let Some(found) = &self.found {
                write!(f, ", found {}", found)?;
            }
            write!(f, ")")?;
        }
        write!(f, " at {}..{}", self.span.start, self.span.end)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Parses the payload of one `{{...}}` token. `offset` is the byte position
/// of the payload inside the full template, so spans point into the template.
pub fn parse_payload(payload: &str, offset: usize) -> Result<ParsedExpression, ParseError> {
    let end = offset + payload.len();
    if payload.trim().is_empty() {
        return Err(ParseError::new(
            ParseErrorKind::EmptyExpression,
            "empty expression",
            Span::new(offset, end),
        ));
    }

    let (tokens, errors) = lexer().parse(payload).into_output_errors();
    if let Some(error) = errors.first() {
        let start = error.span().start.min(payload.len());
        let found = payload.get(start..).and_then(|rest| rest.chars().next());
        let span = Span::new(start, start + found.map_or(0, char::len_utf8)).offset(offset);
        return Err(match found {
            Some('"') | Some('\'') => ParseError::new(
                ParseErrorKind::UnexpectedCharacter,
                "unterminated string literal",
                span,
            ),
            Some(ch) => ParseError::new(
                ParseErrorKind::UnexpectedCharacter,
                format!("unexpected character `{}`", ch),
                span,
            ),
            None => ParseError::new(ParseErrorKind::UnexpectedEnd, "unexpected end of expression", span),
        });
    }

    let tokens = tokens.unwrap_or_default();
    let mut parser = TokenParser::from_lexer_output(tokens, offset, end);
    parser.parse_payload()
}

pub struct TokenParser {
    tokens: Vec<SpannedToken>,
    current: usize,
    source_end: usize,
}

impl TokenParser {
    pub fn new(tokens: Vec<SpannedToken>, source_end: usize) -> Self {
        Self {
            tokens,
            current: 0,
            source_end,
        }
    }

    pub fn from_lexer_output(
        tokens: Vec<(Token, chumsky::span::SimpleSpan)>,
        offset: usize,
        source_end: usize,
    ) -> Self {
        let spanned_tokens: Vec<SpannedToken> = tokens
            .into_iter()
            .map(|(token, span)| SpannedToken {
                token,
                span: Span::new(span.start, span.end).offset(offset),
            })
            .collect();
        Self::new(spanned_tokens, source_end)
    }

    fn current_token(&self) -> Option<&Token> {
        self.tokens.get(self.current).map(|st| &st.token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.current + ahead).map(|st| &st.token)
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.current)
            .map(|st| st.span)
            .unwrap_or_else(|| Span::new(self.source_end, self.source_end))
    }

    fn previous_span(&self) -> Span {
        if self.current > 0 {
            self.tokens[self.current - 1].span
        } else {
            Span::new(0, 0)
        }
    }

    fn advance(&mut self) -> Option<SpannedToken> {
        if self.current < self.tokens.len() {
            let st = self.tokens[self.current].clone();
            self.current += 1;
            Some(st)
        } else {
            None
        }
    }

    fn check(&self, expected: &Token) -> bool {
        matches!(self.current_token(), Some(token) if std::mem::discriminant(token) == std::mem::discriminant(expected))
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.current_token() {
            Some(token) => ParseError::new(ParseErrorKind::UnexpectedToken, "unexpected token", self.current_span())
                .with_expected(vec![expected.to_string()])
                .with_found(token.to_string()),
            None => ParseError::new(
                ParseErrorKind::UnexpectedEnd,
                "unexpected end of expression",
                self.current_span(),
            )
            .with_expected(vec![expected.to_string()]),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<Span, ParseError> {
        if self.check(&expected) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(self.unexpected(&expected.to_string()))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Span), ParseError> {
        match self.current_token() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                let span = self.current_span();
                self.advance();
                Ok((name, span))
            }
            _ => Err(self.unexpected(what)),
        }
    }

    pub fn parse_payload(&mut self) -> Result<ParsedExpression, ParseError> {
        let mut expression = self.parse_path()?;
        expression.pipes = self.parse_pipes()?;
        if self.current_token().is_some() {
            return Err(self.unexpected("`.`, `[` or `|`"));
        }
        expression.span = expression.span.merge(self.previous_span());
        Ok(expression)
    }

    /// `root ('.' name | '.' name '(' args ')' | '[' index ']')*`
    fn parse_path(&mut self) -> Result<ParsedExpression, ParseError> {
        let (root, root_span) = self.expect_ident("a data source name")?;
        let mut segments: Vec<Segment> = Vec::new();
        let mut terminal = false;

        loop {
            let segment_start = self.current_span();
            let segment = match self.current_token() {
                Some(Token::Dot) => {
                    self.advance();
                    let (name, _) = self.expect_ident("a field name")?;
                    if self.check(&Token::LParen) {
                        Segment::Call(self.parse_call(name)?)
                    } else {
                        Segment::Field(name)
                    }
                }
                Some(Token::LBracket) => self.parse_bracket()?,
                _ => break,
            };

            if terminal {
                return Err(ParseError::new(
                    ParseErrorKind::TrailingSegment,
                    "nothing can follow an aggregation",
                    segment_start.merge(self.previous_span()),
                ));
            }
            terminal = matches!(&segment, Segment::Call(call) if call.is_aggregate());
            segments.push(segment);
        }

        Ok(ParsedExpression {
            root,
            segments,
            pipes: Vec::new(),
            span: root_span.merge(self.previous_span()),
        })
    }

    fn parse_bracket(&mut self) -> Result<Segment, ParseError> {
        let open = self.expect(Token::LBracket)?;
        let segment = match self.current_token() {
            Some(Token::Number(n, false)) => {
                let index = *n as usize;
                self.advance();
                Segment::Index(index)
            }
            Some(Token::String(name)) => {
                let name = name.clone();
                self.advance();
                Segment::Field(name)
            }
            _ => {
                let mut span = open;
                while let Some(token) = self.current_token() {
                    if matches!(token, Token::RBracket) {
                        span = span.merge(self.current_span());
                        break;
                    }
                    span = span.merge(self.current_span());
                    self.advance();
                }
                return Err(ParseError::new(
                    ParseErrorKind::InvalidIndex,
                    "index must be a non-negative integer",
                    span,
                ));
            }
        };
        self.expect(Token::RBracket)?;
        Ok(segment)
    }

    fn parse_call(&mut self, name: String) -> Result<Call, ParseError> {
        self.expect(Token::LParen)?;
        let call = match name.as_str() {
            "count" => Call::Count,
            "sum" => Call::Sum(self.parse_field_arg()?),
            "avg" => Call::Avg(self.parse_field_arg()?),
            "min" => Call::Min(self.parse_field_arg()?),
            "max" => Call::Max(self.parse_field_arg()?),
            "filter" => Call::Filter(self.parse_lambda()?),
            "map" => Call::Map(self.parse_lambda()?),
            _ => Call::Unknown {
                name: name.clone(),
                args: self.parse_arg_list()?,
            },
        };
        self.expect(Token::RParen)?;
        Ok(call)
    }

    fn parse_field_arg(&mut self) -> Result<Option<String>, ParseError> {
        let field = match self.current_token() {
            Some(Token::RParen) => return Ok(None),
            Some(Token::Ident(name)) | Some(Token::String(name)) => name.clone(),
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidArgument,
                    "aggregations take a field name",
                    self.current_span(),
                ))
            }
        };
        self.advance();
        Ok(Some(field))
    }

    fn parse_lambda(&mut self) -> Result<Lambda, ParseError> {
        if self.check(&Token::RParen) {
            return Err(ParseError::new(
                ParseErrorKind::InvalidArgument,
                "expected a predicate",
                self.current_span(),
            ));
        }

        let mut params: Vec<Rc<str>> = Vec::new();
        let single = match (self.current_token(), self.peek_at(1)) {
            (Some(Token::Ident(name)), Some(Token::Arrow)) => Some(Rc::from(name.as_str())),
            _ => None,
        };
        if let Some(param) = single {
            params.push(param);
            self.current += 2;
        } else if self.check(&Token::LParen) {
            if let Some(names) = self.lambda_param_list() {
                self.current += names.len() * 2 + 2;
                params = names;
            }
        }

        let body = self.parse_expr()?;
        Ok(Lambda {
            params,
            body: Box::new(body),
        })
    }

    /// Recognises `(a) =>` or `(a, b) =>` without consuming anything.
    fn lambda_param_list(&self) -> Option<Vec<Rc<str>>> {
        let mut names = Vec::new();
        let mut ahead = 1;
        loop {
            match self.peek_at(ahead) {
                Some(Token::Ident(name)) => names.push(Rc::from(name.as_str())),
                _ => return None,
            }
            match self.peek_at(ahead + 1) {
                Some(Token::Comma) if names.len() < 2 => ahead += 2,
                Some(Token::RParen) => break,
                _ => return None,
            }
        }
        match self.peek_at(ahead + 2) {
            Some(Token::Arrow) => Some(names),
            _ => None,
        }
    }

    fn parse_arg_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.check(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(args)
    }

    fn parse_pipes(&mut self) -> Result<Vec<Pipe>, ParseError> {
        let mut pipes = Vec::new();
        while self.eat(&Token::Pipe) {
            let (name, _) = self.expect_ident("a pipe name")?;
            let mut args = Vec::new();
            if self.eat(&Token::LParen) {
                if !self.check(&Token::RParen) {
                    loop {
                        args.push(self.parse_literal()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(Token::RParen)?;
            }
            pipes.push(Pipe {
                op: PipeOp::from_name(&name),
                args,
            });
        }
        Ok(pipes)
    }

    fn parse_literal(&mut self) -> Result<Value, ParseError> {
        let value = match self.current_token() {
            Some(Token::Number(n, is_float)) => Value::Number(*n, *is_float),
            Some(Token::String(s)) => Value::string(s),
            Some(Token::True) => Value::Bool(true),
            Some(Token::False) => Value::Bool(false),
            Some(Token::Null) => Value::Null,
            Some(Token::Minus) => {
                self.advance();
                return match self.current_token() {
                    Some(Token::Number(n, is_float)) => {
                        let value = Value::Number(-*n, *is_float);
                        self.advance();
                        Ok(value)
                    }
                    _ => Err(self.unexpected("a number")),
                };
            }
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidArgument,
                    "pipe arguments must be literals",
                    self.current_span(),
                ))
            }
        };
        self.advance();
        Ok(value)
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::And) {
            let right = self.parse_equality()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.current_token() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                Some(Token::StrictEq) => BinaryOp::StrictEq,
                Some(Token::StrictNotEq) => BinaryOp::StrictNotEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current_token() {
                Some(Token::Greater) => BinaryOp::Greater,
                Some(Token::Less) => BinaryOp::Less,
                Some(Token::GreaterEq) => BinaryOp::GreaterEq,
                Some(Token::LessEq) => BinaryOp::LessEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current_token() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Bang) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        if self.eat(&Token::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.current_token() {
            Some(Token::Number(..))
            | Some(Token::String(_))
            | Some(Token::True)
            | Some(Token::False)
            | Some(Token::Null) => Ok(Expr::Literal(self.parse_literal()?)),
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(_)) => Ok(Expr::Path(self.parse_path()?)),
            _ => Err(self.unexpected("a value")),
        }
    }
}
