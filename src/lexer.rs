//! Lexer for the inside of a `{{...}}` token.

use chumsky::prelude::*;

use crate::token::Token;

pub fn lexer<'a>()
-> impl Parser<'a, &'a str, Vec<(Token, SimpleSpan)>, extra::Err<Simple<'a, char>>> {
    let number = text::int(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .map(|s: &str| Token::Number(s.parse().unwrap_or_default(), s.contains('.')));

    let escape = just('\\').ignore_then(choice((
        just('\\'),
        just('/'),
        just('"'),
        just('\''),
        just('n').to('\n'),
        just('r').to('\r'),
        just('t').to('\t'),
    )));

    let double_quoted = just('"')
        .ignore_then(none_of("\\\"").or(escape.clone()).repeated().collect::<String>())
        .then_ignore(just('"'))
        .map(Token::String);

    let single_quoted = just('\'')
        .ignore_then(none_of("\\'").or(escape).repeated().collect::<String>())
        .then_ignore(just('\''))
        .map(Token::String);

    let ident = text::ident().map(|s: &str| match s {
        "true" => Token::True,
        "false" => Token::False,
        "null" => Token::Null,
        _ => Token::Ident(s.to_string()),
    });

    let op_multi = choice((
        just("===").to(Token::StrictEq),
        just("!==").to(Token::StrictNotEq),
        just("==").to(Token::Eq),
        just("!=").to(Token::NotEq),
        just(">=").to(Token::GreaterEq),
        just("<=").to(Token::LessEq),
        just("&&").to(Token::And),
        just("||").to(Token::Or),
        just("=>").to(Token::Arrow),
    ));

    let op_single = choice((
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
        just('>').to(Token::Greater),
        just('<').to(Token::Less),
        just('|').to(Token::Pipe),
        just('!').to(Token::Bang),
        just('.').to(Token::Dot),
        just(',').to(Token::Comma),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('[').to(Token::LBracket),
        just(']').to(Token::RBracket),
    ));

    let token = number
        .or(double_quoted)
        .or(single_quoted)
        .or(ident)
        .or(op_multi)
        .or(op_single)
        .map_with(|tok, e| (tok, e.span()))
        .padded();

    token.repeated().collect().padded().then_ignore(end())
}
