//! S-expression reader.
//!
//! Turns source text into [`Value`] trees: proper and dotted lists, `#(...)` vector
//! literals, `'x` quote shorthand, strings with escapes, decimal, hexadecimal and
//! floating point numbers, `#t`/`#f` and symbols. `;` starts a comment that runs to
//! the end of the line.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_till, take_while1},
    character::complete::{char, multispace0},
    combinator::cut,
    error::ErrorKind,
};

use crate::ast::{NumberType, Value, is_valid_symbol};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Reader options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParseConfig {
    /// Treat `;` as the start of a line comment
    pub handle_comments: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            handle_comments: true,
        }
    }
}

fn fail(input: &str, code: ErrorKind) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(input, code))
}

/// Characters that end an atom
fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';' | '\'')
}

/// Skip whitespace and, when enabled, line comments
fn space(input: &str, config: ParseConfig) -> IResult<&str, ()> {
    let mut rest = input;
    loop {
        let (after_ws, _) = multispace0.parse(rest)?;
        match after_ws.strip_prefix(';') {
            Some(comment) if config.handle_comments => {
                let (after_comment, _) = take_till(|c| c == '\n').parse(comment)?;
                rest = after_comment;
            }
            _ => return Ok((after_ws, ())),
        }
    }
}

/// Text whose shape is numeric: optional sign, then a digit or `.digit`
fn looks_numeric(token: &str) -> bool {
    let unsigned = token.strip_prefix(['-', '+']).unwrap_or(token);
    let mut chars = unsigned.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// Parse a bare token: number, boolean or symbol
fn parse_atom(input: &str) -> IResult<&str, Value> {
    let (rest, token) = take_while1(|c: char| !is_delimiter(c)).parse(input)?;

    let value = match token {
        "#t" | "#true" => Value::Bool(true),
        "#f" | "#false" => Value::Bool(false),
        _ if token.starts_with("#x") || token.starts_with("#X") => {
            match NumberType::from_str_radix(&token[2..], 16) {
                Ok(n) => Value::Integer(n),
                Err(_) => return Err(fail(input, ErrorKind::HexDigit)),
            }
        }
        _ if looks_numeric(token) => {
            let digits = token.strip_prefix(['-', '+']).unwrap_or(token);
            if digits.chars().all(|c| c.is_ascii_digit()) {
                // Out-of-range integers are an error, never a silent float
                match token.parse::<NumberType>() {
                    Ok(n) => Value::Integer(n),
                    Err(_) => return Err(fail(input, ErrorKind::Digit)),
                }
            } else {
                match token.parse::<f64>() {
                    Ok(x) => Value::Float(x),
                    Err(_) => return Err(fail(input, ErrorKind::Float)),
                }
            }
        }
        _ if is_valid_symbol(token) => Value::symbol(token),
        _ => return Err(fail(input, ErrorKind::Verify)),
    };

    Ok((rest, value))
}

/// Parse a string literal
fn parse_string(input: &str) -> IResult<&str, Value> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut text = String::new();

    // Past the opening quote every failure is final
    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => return Ok((char_iter.as_str(), Value::String(text))),
            Some('\\') => {
                match char_iter.next() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    Some(_) => {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            remaining,
                            ErrorKind::Escaped,
                        )));
                    }
                    None => {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            char_iter.as_str(),
                            ErrorKind::Char,
                        )));
                    }
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                text.push(ch);
                remaining = char_iter.as_str();
            }
            None => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    remaining,
                    ErrorKind::Char,
                )));
            }
        }
    }
}

/// A lone `.` inside a list introduces the final tail
fn dot_separator(input: &str) -> Option<&str> {
    let rest = input.strip_prefix('.')?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if is_delimiter(c) => Some(rest),
        Some(_) => None,
    }
}

/// Elements up to the closing paren, with an optional dotted tail
fn parse_sequence(
    mut input: &str,
    config: ParseConfig,
    depth: usize,
    allow_dot: bool,
) -> IResult<&str, (Vec<Value>, Value)> {
    let mut items = Vec::new();
    loop {
        let (rest, _) = space(input, config)?;
        if let Some(rest) = rest.strip_prefix(')') {
            return Ok((rest, (items, Value::Nil)));
        }

        if allow_dot
            && !items.is_empty()
            && let Some(after_dot) = dot_separator(rest)
        {
            let (rest, tail) = parse_sexpr(after_dot, config, depth + 1)?;
            let (rest, _) = space(rest, config)?;
            let (rest, _) = char(')').parse(rest)?;
            return Ok((rest, (items, tail)));
        }

        let (rest, item) = parse_sexpr(rest, config, depth + 1)?;
        items.push(item);
        input = rest;
    }
}

fn parse_list(input: &str, config: ParseConfig, depth: usize) -> IResult<&str, Value> {
    let (input, _) = char('(').parse(input)?;
    let (input, (items, tail)) =
        cut(|i| parse_sequence(i, config, depth, true)).parse(input)?;
    Ok((input, Value::list_with_tail(items, tail)))
}

fn parse_vector(input: &str, config: ParseConfig, depth: usize) -> IResult<&str, Value> {
    let (input, _) = tag("#(").parse(input)?;
    let (input, (items, _)) = cut(|i| parse_sequence(i, config, depth, false)).parse(input)?;
    Ok((input, Value::vector(items)))
}

/// Parse quoted expression ('expr -> (quote expr))
fn parse_quote(input: &str, config: ParseConfig, depth: usize) -> IResult<&str, Value> {
    let (input, _) = char('\'').parse(input)?;
    let (input, expr) = cut(|i| parse_sexpr(i, config, depth + 1)).parse(input)?;
    Ok((input, Value::list(vec![Value::symbol("quote"), expr])))
}

/// Parse one S-expression, skipping leading whitespace and comments
fn parse_sexpr(input: &str, config: ParseConfig, depth: usize) -> IResult<&str, Value> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(fail(input, ErrorKind::TooLarge));
    }
    let (input, _) = space(input, config)?;
    alt((
        |i| parse_quote(i, config, depth),
        |i| parse_vector(i, config, depth),
        |i| parse_list(i, config, depth),
        parse_string,
        parse_atom,
    ))
    .parse(input)
}

/// Convert nom parsing errors to user-facing parse errors
fn to_parse_error(input: &str, error: nom::Err<nom::error::Error<&str>>) -> Error {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            let near: String = e.input.chars().take(10).collect();
            let (kind, message) = match e.code {
                ErrorKind::TooLarge => (
                    ParseErrorKind::TooDeeplyNested,
                    format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                ),
                _ if e.input.trim().is_empty() => (
                    ParseErrorKind::Incomplete,
                    "Unexpected end of input".to_owned(),
                ),
                ErrorKind::Digit => (
                    ParseErrorKind::InvalidSyntax,
                    format!("Integer literal out of range at position {position}"),
                ),
                ErrorKind::Escaped => (
                    ParseErrorKind::InvalidSyntax,
                    format!("Unknown escape sequence at position {position}"),
                ),
                ErrorKind::Char => (
                    ParseErrorKind::InvalidSyntax,
                    format!("Unexpected character at position {position}"),
                ),
                _ => (
                    ParseErrorKind::InvalidSyntax,
                    format!("Invalid syntax near '{near}'"),
                ),
            };
            ParseError::with_context(kind, message, input, position).into()
        }
        nom::Err::Incomplete(_) => {
            ParseError::from_message(ParseErrorKind::Incomplete, "Incomplete input").into()
        }
    }
}

/// Parse exactly one S-expression from input.
pub fn parse_scheme(input: &str) -> Result<Value, Error> {
    parse_scheme_with_config(input, ParseConfig::default())
}

pub fn parse_scheme_with_config(input: &str, config: ParseConfig) -> Result<Value, Error> {
    let (rest, value) =
        parse_sexpr(input, config, 0).map_err(|e| to_parse_error(input, e))?;
    let (rest, _) = space(rest, config).map_err(|e| to_parse_error(input, e))?;

    if rest.is_empty() {
        Ok(value)
    } else {
        Err(ParseError::with_context(
            ParseErrorKind::TrailingContent,
            format!("Unexpected remaining input: '{rest}'"),
            input,
            input.len() - rest.len(),
        )
        .into())
    }
}

/// Parse every top-level S-expression in `input`, in order
pub fn parse_scheme_all(input: &str) -> Result<Vec<Value>, Error> {
    let config = ParseConfig::default();
    let mut forms = Vec::new();
    let mut rest = input;
    loop {
        let (after_space, _) = space(rest, config).map_err(|e| to_parse_error(input, e))?;
        if after_space.is_empty() {
            return Ok(forms);
        }
        let (after_form, form) =
            parse_sexpr(after_space, config, 0).map_err(|e| to_parse_error(input, e))?;
        forms.push(form);
        rest = after_form;
    }
}
