//! Lexer (§4.1): turns source text into a flat, line-tagged token stream.
//!
//! Whitespace and `#`-prefixed comments are skipped here, not carried into
//! the token stream — downstream consumers see only semantically
//! significant tokens.

use nom::branch::alt;
use nom::bytes::complete::{is_not, tag, take_while, take_while1};
use nom::character::complete::{char as nchar, digit1};
use nom::combinator::{map, opt, recognize};
use nom::sequence::{pair, preceded, tuple};
use nom::IResult;
use rust_decimal::Decimal;

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Num(Decimal),
    Str(String),
    Ident(String),
    Sym(Sym),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sym {
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    EqEq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub tok: Token,
    pub line: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric()
}

fn lex_ident(input: &str) -> IResult<&str, Token> {
    map(
        recognize(pair(take_while1(is_ident_start), take_while(is_ident_continue))),
        |s: &str| Token::Ident(s.to_string()),
    )(input)
}

fn lex_number(input: &str) -> IResult<&str, Token> {
    map(
        recognize(tuple((digit1, opt(pair(nchar('.'), digit1))))),
        |s: &str| Token::Num(s.parse::<Decimal>().unwrap_or(Decimal::ZERO)),
    )(input)
}

fn lex_string(input: &str) -> IResult<&str, Token> {
    map(preceded(nchar('"'), nom::sequence::terminated(opt(is_not("\"")), nchar('"'))), |s: Option<&str>| {
        Token::Str(s.unwrap_or("").to_string())
    })(input)
}

fn lex_percent(input: &str) -> IResult<&str, Token> {
    map(nchar('%'), |_| Token::Ident("%".to_string()))(input)
}

fn lex_symbol(input: &str) -> IResult<&str, Token> {
    alt((
        map(tag("=="), |_| Token::Sym(Sym::EqEq)),
        map(tag("!="), |_| Token::Sym(Sym::Ne)),
        map(tag("<="), |_| Token::Sym(Sym::Le)),
        map(tag(">="), |_| Token::Sym(Sym::Ge)),
        map(nchar('<'), |_| Token::Sym(Sym::Lt)),
        map(nchar('>'), |_| Token::Sym(Sym::Gt)),
        map(nchar('+'), |_| Token::Sym(Sym::Plus)),
        map(nchar('-'), |_| Token::Sym(Sym::Minus)),
        map(nchar('*'), |_| Token::Sym(Sym::Star)),
        map(nchar('/'), |_| Token::Sym(Sym::Slash)),
        map(nchar('^'), |_| Token::Sym(Sym::Caret)),
        map(nchar('('), |_| Token::Sym(Sym::LParen)),
        map(nchar(')'), |_| Token::Sym(Sym::RParen)),
        map(nchar('['), |_| Token::Sym(Sym::LBracket)),
        map(nchar(']'), |_| Token::Sym(Sym::RBracket)),
        map(nchar(','), |_| Token::Sym(Sym::Comma)),
    ))(input)
}

fn lex_token(input: &str) -> IResult<&str, Token> {
    alt((lex_string, lex_number, lex_ident, lex_percent, lex_symbol))(input)
}

fn is_inline_ws(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\r' || c == '\n'
}

fn skip_trivia(mut input: &str) -> &str {
    loop {
        let before = input.len();
        input = input.trim_start_matches(is_inline_ws);
        if let Some(rest) = input.strip_prefix('#') {
            let end = rest.find('\n').unwrap_or(rest.len());
            input = &rest[end..];
        }
        if input.len() == before {
            return input;
        }
    }
}

/// Tokenize `source`, returning line-tagged tokens or the list of
/// `(line, message)` diagnostics encountered.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, Vec<ParseError>> {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut rest = source;
    let mut consumed = 0usize;

    loop {
        let before_trivia = rest;
        rest = skip_trivia(rest);
        consumed += before_trivia.len() - rest.len();
        if rest.is_empty() {
            break;
        }
        let line = 1 + source[..consumed].matches('\n').count();
        match lex_token(rest) {
            Ok((next, tok)) => {
                consumed += rest.len() - next.len();
                tokens.push(Spanned { tok, line });
                rest = next;
            }
            Err(_) => {
                let bad_char = rest.chars().next().unwrap_or('?');
                errors.push(ParseError::new(line, format!("unrecognized character '{bad_char}'")));
                let mut chars = rest.char_indices();
                chars.next();
                let next_idx = chars.next().map(|(i, _)| i).unwrap_or(rest.len());
                consumed += next_idx;
                rest = &rest[next_idx..];
            }
        }
    }

    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_a_simple_statement() {
        let toks = tokenize(r#"set manufacture to 100 kg during year 1"#).unwrap();
        let idents: Vec<_> = toks
            .iter()
            .filter_map(|s| match &s.tok {
                Token::Ident(i) => Some(i.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(idents, vec!["set", "manufacture", "to", "kg", "during", "year"]);
    }

    #[test]
    fn skips_comments() {
        let toks = tokenize("# a comment\nset x to 1").unwrap();
        assert!(matches!(toks[0].tok, Token::Ident(ref s) if s == "set"));
    }

    #[test]
    fn reports_line_numbers() {
        let toks = tokenize("set x\nto 1").unwrap();
        assert_eq!(toks[0].line, 1);
        assert_eq!(toks.iter().find(|s| s.tok == Token::Ident("to".into())).unwrap().line, 2);
    }
}
