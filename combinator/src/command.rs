use chumsky::{error::Error as _, prelude::*};
use combinator::{Combinator, Order};

pub type Error = Simple<char>;

pub trait SimpleParser<O>: Parser<char, O, Error = Error> + Clone {}
impl<O, T> SimpleParser<O> for T where T: Parser<char, O, Error = Error> + Clone {}

/// `N a b = body`: a name, its parameters and the definition, all single
/// symbols separated by optional whitespace.
pub fn definition() -> impl SimpleParser<Combinator> {
    let symbol = filter(|c: &char| !c.is_whitespace() && !matches!(c, '(' | ')' | '='));
    let name = symbol.clone().padded().labelled("combinator name");
    let parameters = symbol.padded().repeated().labelled("parameters");
    let body = filter(|c: &char| !c.is_whitespace() && *c != '=')
        .padded()
        .repeated()
        .at_least(1)
        .collect::<String>()
        .labelled("definition");
    name.then(parameters)
        .then_ignore(just('='))
        .then(body)
        .then_ignore(end())
        .try_map(|((name, arguments), definition), span| {
            Combinator::new(name, arguments, definition)
                .map_err(|e| Error::custom(span, format!("{e}")))
        })
}

pub fn order() -> impl SimpleParser<Order> {
    choice((
        text::keyword("normal").to(Order::Normal),
        text::keyword("applicative").to(Order::Applicative),
    ))
    .padded()
    .then_ignore(end())
}

pub fn count() -> impl SimpleParser<usize> {
    text::int::<char, Error>(10)
        .from_str::<usize>()
        .try_map(|r, span| r.map_err(|e| Error::custom(span, format!("{e}"))))
        .padded()
        .then_ignore(end())
}

/// Milliseconds, or `off`.
pub fn timeout() -> impl SimpleParser<Option<u64>> {
    let millis = text::int::<char, Error>(10)
        .from_str::<u64>()
        .try_map(|r, span| r.map_err(|e| Error::custom(span, format!("{e}"))))
        .map(Some);
    choice((text::keyword("off").to(None), millis))
        .padded()
        .then_ignore(end())
}
