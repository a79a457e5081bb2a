//! S-expression reader.
//!
//! Turns source text into [`Value`] trees: integers, floats, `#t`/`#f`,
//! symbols, proper lists and dotted pairs. `;` starts a comment running to the
//! end of the line. There are no strings and no quote syntax.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit0, digit1, multispace1, not_line_ending, one_of, satisfy},
    combinator::{eof, opt, peek, recognize, value},
    error::ErrorKind,
    multi::many0_count,
    sequence::{pair, preceded, terminated},
};

use crate::value::Value;
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Characters allowed in symbols besides alphanumerics
const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?_$%&:^~.";

/// Check if a token is a valid symbol name.
/// Tokens that look like numbers (leading digit, or a sign or dot followed by
/// a digit) and the lone dot are not symbols.
fn is_valid_symbol(name: &str) -> bool {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (None, _) => false,
        (Some(first), _) if first.is_ascii_digit() => false,
        (Some('+' | '-' | '.'), Some(second)) if second.is_ascii_digit() => false,
        (Some('.'), None) => false,
        _ => name
            .chars()
            .all(|c| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c)),
    }
}

/// Convert nom parsing errors to structured parse errors
fn to_parse_error(input: &str, error: nom::Err<nom::error::Error<&str>>) -> ParseError {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            let char_offset = input
                .get(..position)
                .map_or(0, |consumed| consumed.chars().count());
            let at_end = skip_ws(e.input).is_ok_and(|(rest, ())| rest.is_empty());

            match e.code {
                ErrorKind::TooLarge => ParseError::with_context(
                    ParseErrorKind::TooDeeplyNested,
                    format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                    input,
                    char_offset,
                ),
                ErrorKind::Digit => ParseError::with_context(
                    ParseErrorKind::InvalidSyntax,
                    format!("Number literal out of range at position {position}"),
                    input,
                    char_offset,
                ),
                _ if at_end => ParseError::with_context(
                    ParseErrorKind::Incomplete,
                    "Unexpected end of input",
                    input,
                    char_offset,
                ),
                _ => {
                    let remaining_chars: String = e.input.chars().take(10).collect();
                    ParseError::with_context(
                        ParseErrorKind::InvalidSyntax,
                        format!("Invalid syntax near '{remaining_chars}'"),
                        input,
                        char_offset,
                    )
                }
            }
        }
        nom::Err::Incomplete(_) => {
            ParseError::new(ParseErrorKind::Incomplete, "Incomplete input", None)
        }
    }
}

/// Skip whitespace and `;` comments
fn skip_ws(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0_count(alt((
            multispace1,
            recognize(pair(char(';'), not_line_ending)),
        ))),
    )
    .parse(input)
}

/// Succeeds without consuming input where a token may end
fn delimiter(input: &str) -> IResult<&str, ()> {
    peek(alt((
        value((), eof),
        value((), satisfy(|c| c.is_whitespace() || "();".contains(c))),
    )))
    .parse(input)
}

/// Parse a number: integers stay integers, anything with a fraction or
/// exponent is a float (`1.5`, `-2.`, `.5`, `1e3`)
fn parse_number(input: &str) -> IResult<&str, Value> {
    let (remaining, text) = terminated(
        recognize((
            opt(one_of("+-")),
            alt((
                recognize(pair(digit1, opt(pair(char('.'), digit0)))),
                recognize(pair(char('.'), digit1)),
            )),
            opt((one_of("eE"), opt(one_of("+-")), digit1)),
        )),
        delimiter,
    )
    .parse(input)?;

    let number = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>().ok().map(Value::Float)
    } else {
        text.parse::<i64>().ok().map(Value::Integer)
    };

    match number {
        Some(number) => Ok((remaining, number)),
        // Numeric syntax that does not fit; not a symbol either
        None => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::Digit,
        ))),
    }
}

/// Parse a boolean (#t or #f)
fn parse_bool(input: &str) -> IResult<&str, Value> {
    terminated(
        alt((
            value(Value::Bool(true), tag("#t")),
            value(Value::Bool(false), tag("#f")),
        )),
        delimiter,
    )
    .parse(input)
}

/// Parse a symbol (identifier)
fn parse_symbol(input: &str) -> IResult<&str, Value> {
    let symbol_chars =
        take_while1(|c: char| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c));

    let (remaining, candidate) = terminated(symbol_chars, delimiter).parse(input)?;

    if is_valid_symbol(candidate) {
        Ok((remaining, Value::symbol(candidate)))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Alpha,
        )))
    }
}

fn close_paren(input: &str) -> IResult<&str, char> {
    preceded(skip_ws, char(')')).parse(input)
}

/// The `.` separating the last cdr of a dotted list
fn dot(input: &str) -> IResult<&str, char> {
    preceded(skip_ws, terminated(char('.'), delimiter)).parse(input)
}

/// Parse a list, proper `(a b c)` or dotted `(a b . c)`
fn parse_list(input: &str, depth: usize) -> IResult<&str, Value> {
    let (mut input, _) = char('(').parse(input)?;
    let mut elements = Vec::new();

    let tail = loop {
        if let Ok((rest, _)) = close_paren(input) {
            input = rest;
            break Value::Nil;
        }

        if !elements.is_empty()
            && let Ok((rest, _)) = dot(input)
        {
            let (rest, tail) = parse_sexpr(rest, depth + 1)?;
            let (rest, _) = close_paren(rest)?;
            input = rest;
            break tail;
        }

        let (rest, element) = parse_sexpr(input, depth + 1)?;
        elements.push(element);
        input = rest;
    };

    let list = elements
        .into_iter()
        .rev()
        .fold(tail, |tail, element| Value::cons(element, tail));
    Ok((input, list))
}

/// Parse one S-expression, skipping leading whitespace and comments
fn parse_sexpr(input: &str, depth: usize) -> IResult<&str, Value> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    preceded(
        skip_ws,
        alt((
            |input| parse_list(input, depth),
            parse_number,
            parse_bool,
            parse_symbol,
        )),
    )
    .parse(input)
}

/// Parse exactly one S-expression from input.
pub fn parse_expr(input: &str) -> Result<Value, Error> {
    match terminated(|input| parse_sexpr(input, 0), skip_ws).parse(input) {
        Ok(("", value)) => Ok(value),
        Ok((remaining, _)) => {
            let position = input.len() - remaining.len();
            Err(ParseError::with_context(
                ParseErrorKind::TrailingContent,
                format!("Unexpected remaining input: '{remaining}'"),
                input,
                input[..position].chars().count(),
            )
            .into())
        }
        Err(e) => Err(to_parse_error(input, e).into()),
    }
}

/// Parse a whole program: zero or more top-level S-expressions
pub fn parse_program(input: &str) -> Result<Vec<Value>, Error> {
    let mut forms = Vec::new();
    let mut rest = input;
    loop {
        let (remaining, ()) = skip_ws(rest).map_err(|e| to_parse_error(input, e))?;
        if remaining.is_empty() {
            return Ok(forms);
        }
        let (remaining, form) = parse_sexpr(remaining, 0).map_err(|e| to_parse_error(input, e))?;
        forms.push(form);
        rest = remaining;
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::value::{nil, sym, val};

    /// Test result variants for parser tests
    #[derive(Debug)]
    enum ParseTestResult {
        Success(Value),         // Parsing should succeed with this value
        Rendered(&'static str), // Parsing should succeed and render as this text
        Fails(ParseErrorKind),  // Parsing should fail with this kind
    }
    use ParseTestResult::*;

    fn success<T: Into<Value>>(value: T) -> ParseTestResult {
        Success(val(value))
    }

    fn run_parse_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.into_iter().enumerate() {
            let test_id = format!("#{} '{input}'", i + 1);
            match (parse_expr(input), expected) {
                (Ok(actual), Success(expected)) => assert_eq!(actual, expected, "{test_id}"),
                (Ok(actual), Rendered(expected)) => {
                    assert_eq!(actual.to_string(), expected, "{test_id}");
                }
                (Err(Error::Parse(err)), Fails(kind)) => {
                    assert_eq!(err.kind, kind, "{test_id}: {err}");
                }
                (actual, expected) => panic!("{test_id}: expected {expected:?}, got {actual:?}"),
            }
        }
    }

    #[test]
    #[expect(clippy::too_many_lines)] // Comprehensive test coverage is intentionally thorough
    fn test_parser_comprehensive() {
        run_parse_tests(vec![
            // === INTEGERS ===
            ("42", success(42)),
            ("-5", success(-5)),
            ("+7", success(7)),
            ("0", success(0)),
            ("9223372036854775807", success(i64::MAX)),
            ("-9223372036854775808", success(i64::MIN)),
            ("9223372036854775808", Fails(ParseErrorKind::InvalidSyntax)),
            // === FLOATS ===
            ("1.5", success(1.5)),
            ("-2.", success(-2.0)),
            (".5", success(0.5)),
            ("-.25", success(-0.25)),
            ("1e3", success(1000.0)),
            ("2.5E-1", success(0.25)),
            // === BOOLEANS ===
            ("#t", success(true)),
            ("#f", success(false)),
            ("#true", Fails(ParseErrorKind::InvalidSyntax)),
            // === SYMBOLS ===
            ("foo", Success(sym("foo"))),
            ("null?", Success(sym("null?"))),
            ("set-car!", Success(sym("set-car!"))),
            ("+", Success(sym("+"))),
            ("-", Success(sym("-"))),
            ("...", Success(sym("..."))),
            ("<=", Success(sym("<="))),
            ("a.b", Success(sym("a.b"))),
            ("123abc", Fails(ParseErrorKind::InvalidSyntax)),
            ("1e", Fails(ParseErrorKind::InvalidSyntax)),
            (".", Fails(ParseErrorKind::InvalidSyntax)),
            // === LISTS ===
            ("()", Success(nil())),
            ("( )", Success(nil())),
            ("(1 2 3)", success([1, 2, 3])),
            ("(+ 1 2)", Success(val(vec![sym("+"), val(1), val(2)]))),
            ("(a(b)c)", Success(val(vec![sym("a"), val(vec![sym("b")]), sym("c")]))),
            ("(1 (2 (3)))", Rendered("(1 . ((2 . ((3 . nil) . nil)) . nil))")),
            ("(\n  1\t2\r\n)", success([1, 2])),
            // === DOTTED PAIRS ===
            ("(1 . 2)", Success(Value::cons(val(1), val(2)))),
            ("(1 2 . 3)", Rendered("(1 . (2 . 3))")),
            ("(a . (b))", Success(val(vec![sym("a"), sym("b")]))),
            ("(1 .5)", success(vec![val(1), val(0.5)])),
            ("(. 1)", Fails(ParseErrorKind::InvalidSyntax)),
            ("(1 . )", Fails(ParseErrorKind::InvalidSyntax)),
            ("(1 . 2 3)", Fails(ParseErrorKind::InvalidSyntax)),
            // === COMMENTS ===
            ("; leading comment\n42", success(42)),
            ("(1 ; inner comment\n 2)", success([1, 2])),
            ("42 ; trailing comment", success(42)),
            // === ERRORS ===
            ("", Fails(ParseErrorKind::Incomplete)),
            ("   ", Fails(ParseErrorKind::Incomplete)),
            ("(1 2", Fails(ParseErrorKind::Incomplete)),
            ("(1 (2 3)", Fails(ParseErrorKind::Incomplete)),
            ("(1 ; unclosed", Fails(ParseErrorKind::Incomplete)),
            (")", Fails(ParseErrorKind::InvalidSyntax)),
            ("\"string\"", Fails(ParseErrorKind::InvalidSyntax)),
            ("'quoted", Fails(ParseErrorKind::InvalidSyntax)),
            ("1 2", Fails(ParseErrorKind::TrailingContent)),
            ("(+ 1 2))", Fails(ParseErrorKind::TrailingContent)),
        ]);
    }

    #[test]
    fn test_parse_depth_limit() {
        let at_limit = format!(
            "{}{}",
            "(".repeat(MAX_PARSE_DEPTH),
            ")".repeat(MAX_PARSE_DEPTH)
        );
        assert!(parse_expr(&at_limit).is_ok());

        let over_limit = format!(
            "{}{}",
            "(".repeat(MAX_PARSE_DEPTH + 1),
            ")".repeat(MAX_PARSE_DEPTH + 1)
        );
        match parse_expr(&over_limit) {
            Err(Error::Parse(err)) => {
                assert_eq!(err.kind, ParseErrorKind::TooDeeplyNested);
                assert!(err.message.contains("too deeply nested"));
            }
            other => panic!("expected depth error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_program() {
        let forms = parse_program(
            "; first-class functions\n(define (f x) x)\n\n(f 1) 42\n#t; done\n",
        )
        .unwrap();
        assert_eq!(forms.len(), 4);
        assert_eq!(forms[1], val(vec![sym("f"), val(1)]));
        assert_eq!(forms[2], val(42));
        assert_eq!(forms[3], val(true));

        assert_eq!(parse_program("").unwrap(), vec![]);
        assert_eq!(parse_program("  ; only a comment").unwrap(), vec![]);

        let err = parse_program("(define x 1)\n(+ x").unwrap_err();
        assert!(matches!(
            err,
            Error::Parse(ParseError {
                kind: ParseErrorKind::Incomplete,
                ..
            })
        ));
    }

    #[test]
    fn test_error_context() {
        let Err(Error::Parse(err)) = parse_expr("(define x #bad)") else {
            panic!("expected parse error");
        };
        assert_eq!(err.kind, ParseErrorKind::InvalidSyntax);
        assert!(err.message.contains("#bad"), "{}", err.message);
        assert!(err.context.as_ref().unwrap().contains("#bad"));
        assert!(err.to_string().starts_with("ParseError: Invalid syntax"));
    }
}
