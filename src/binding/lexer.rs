//! Placeholder tokenizer using nom.
//!
//! SQL is treated as text. The tokenizer only recognizes the regions where a
//! placeholder cannot live (quoted strings, quoted identifiers, comments,
//! `::` casts) and the three placeholder shapes:
//!
//! ```text
//! SELECT * FROM t WHERE a = :name AND b IN (?) AND c = ? -- ?
//!                           ─┬───          ─┬───       ┬   ─┬─
//!                            │              │          │    └── inert
//!                            │              │          └── bare
//!                            │              └── IN list
//!                            └── named
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_until, take_while, take_while1},
    character::complete::{anychar, char, multispace0, satisfy},
    combinator::{map, opt, recognize, rest},
    multi::many0,
    sequence::{pair, preceded, tuple},
    IResult,
};

/// A slice of SQL text, classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Ordinary SQL text.
    Text(&'a str),
    /// Quoted string, quoted identifier or comment.
    Inert(&'a str),
    /// `:name`, holding the name without the colon.
    Named(&'a str),
    /// `IN (?)`, holding the source text.
    InList(&'a str),
    /// A bare `?`.
    Bare,
}

impl<'a> Token<'a> {
    /// The source text this token was read from.
    pub fn source(&self) -> std::borrow::Cow<'a, str> {
        match self {
            Token::Text(s) | Token::Inert(s) | Token::InList(s) => (*s).into(),
            Token::Named(name) => format!(":{}", name).into(),
            Token::Bare => "?".into(),
        }
    }
}

/// Split SQL into tokens. Never fails: anything unrecognized is text.
pub fn tokenize(sql: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut input = sql;
    while !input.is_empty() {
        match parse_token(input) {
            Ok((remaining, token)) => {
                tokens.push(token);
                input = remaining;
            }
            Err(_) => {
                tokens.push(Token::Text(input));
                break;
            }
        }
    }
    tokens
}

/// Count `?` placeholders outside quotes and comments.
pub fn count_sql_placeholders(sql: &str) -> usize {
    tokenize(sql)
        .iter()
        .filter(|t| matches!(t, Token::Bare | Token::InList(_)))
        .count()
}

fn parse_token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        map(line_comment, Token::Inert),
        map(block_comment, Token::Inert),
        map(single_quoted, Token::Inert),
        map(double_quoted, Token::Inert),
        map(tag("::"), Token::Text),
        map(named, Token::Named),
        map(in_list, Token::InList),
        map(char('?'), |_| Token::Bare),
        map(recognize(pair(char('\\'), anychar)), Token::Text),
        map(word, Token::Text),
        map(recognize(anychar), Token::Text),
    ))(input)
}

/// `-- ...` up to, not including, the newline.
fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag("--"), take_while(|c: char| c != '\n')))(input)
}

/// `/* ... */`; an unterminated comment runs to the end.
fn block_comment(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        tag("/*"),
        alt((take_until("*/"), rest)),
        opt(tag("*/")),
    )))(input)
}

fn single_quoted(input: &str) -> IResult<&str, &str> {
    quoted_region(input, '\'')
}

fn double_quoted(input: &str) -> IResult<&str, &str> {
    quoted_region(input, '"')
}

/// A quoted region. A backslash escapes the next character; an unterminated
/// quote runs to the end.
fn quoted_region(input: &str, quote: char) -> IResult<&str, &str> {
    recognize(tuple((
        char(quote),
        many0(alt((
            take_while1(move |c: char| c != quote && c != '\\'),
            recognize(pair(char('\\'), opt(anychar))),
        ))),
        opt(char(quote)),
    )))(input)
}

fn named(input: &str) -> IResult<&str, &str> {
    preceded(
        char(':'),
        recognize(pair(
            satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        )),
    )(input)
}

fn in_list(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        tag_no_case("IN"),
        multispace0,
        char('('),
        multispace0,
        char('?'),
        multispace0,
        char(')'),
    )))(input)
}

/// Whole identifiers, so `IN` is only seen at a word start.
fn word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}
