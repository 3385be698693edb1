// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Strict JSON grammar using nom
//!
//! This is the second stage of the lenient reader: the text handed in has
//! already had comments, dangling commas and bare-dot numbers cleaned up by
//! [`crate::reader`]. Anything still malformed fails here with the offset of
//! the deepest error, which drives the comma-repair pass.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, one_of},
    combinator::{cut, map, opt, recognize, value},
    error::{context, VerboseError, VerboseErrorKind},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};

use crate::error::ParseError;
use crate::value::{JObject, JValue};

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Skip whitespace
fn ws(input: &str) -> Res<'_, ()> {
    map(take_while(|c: char| c.is_whitespace()), |_| ())(input)
}

/// Parse literal: true, false, null
fn literal(input: &str) -> Res<'_, JValue> {
    alt((
        value(JValue::Bool(true), tag("true")),
        value(JValue::Bool(false), tag("false")),
        value(JValue::Null, tag("null")),
    ))(input)
}

/// Parse number: 42, -3.14, 1.5E-10, 2.
///
/// Integers that fit in an i64 stay integers; everything else is a float.
fn number(input: &str) -> Res<'_, JValue> {
    let (rest, text) = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), opt(digit1))),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;

    if !text.contains(['.', 'e', 'E']) {
        if let Ok(i) = text.parse::<i64>() {
            return Ok((rest, JValue::Int(i)));
        }
    }
    match fast_float::parse::<f64, _>(text) {
        Ok(f) => Ok((rest, JValue::Float(f))),
        Err(_) => Err(nom::Err::Error(VerboseError {
            errors: vec![(input, VerboseErrorKind::Context("number"))],
        })),
    }
}

/// Parse string literal: "text" with JSON escapes.
fn string(input: &str) -> Res<'_, String> {
    let (mut rest, _) = char('"')(input)?;
    let mut out = String::new();

    loop {
        let mut chars = rest.char_indices();
        let Some((_, c)) = chars.next() else {
            return Err(fail(rest, "unterminated string"));
        };
        match c {
            '"' => return Ok((&rest[1..], out)),
            '\\' => {
                let Some((_, esc)) = chars.next() else {
                    return Err(fail(rest, "unterminated escape"));
                };
                let consumed = 1 + esc.len_utf8();
                match esc {
                    '"' => out.push('"'),
                    '\\' => out.push('\\'),
                    '/' => out.push('/'),
                    'b' => out.push('\u{08}'),
                    'f' => out.push('\u{0c}'),
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    'u' => {
                        let (after, ch) = unicode_escape(&rest[2..])?;
                        out.push(ch);
                        rest = after;
                        continue;
                    }
                    // Lenient: keep unknown escapes verbatim.
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
                rest = &rest[consumed..];
            }
            '\n' => return Err(fail(rest, "newline in string")),
            c => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
}

fn hex4(input: &str) -> Res<'_, u32> {
    if input.len() < 4 || !input.is_char_boundary(4) {
        return Err(fail(input, "short unicode escape"));
    }
    u32::from_str_radix(&input[..4], 16)
        .map(|v| (&input[4..], v))
        .map_err(|_| fail(input, "invalid unicode escape"))
}

fn unicode_escape(input: &str) -> Res<'_, char> {
    let (rest, hi) = hex4(input)?;
    if (0xD800..0xDC00).contains(&hi) {
        if let Some(tail) = rest.strip_prefix("\\u") {
            let (after, lo) = hex4(tail)?;
            if (0xDC00..0xE000).contains(&lo) {
                let code = 0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00);
                return Ok((after, char::from_u32(code).unwrap_or('\u{FFFD}')));
            }
        }
        return Ok((rest, '\u{FFFD}'));
    }
    Ok((rest, char::from_u32(hi).unwrap_or('\u{FFFD}')))
}

fn fail<'a>(input: &'a str, what: &'static str) -> nom::Err<VerboseError<&'a str>> {
    nom::Err::Failure(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context(what))],
    })
}

/// Parse array: [1, "a", [2]]
fn array(input: &str) -> Res<'_, JValue> {
    context(
        "array",
        preceded(
            char('['),
            cut(terminated(
                map(
                    delimited(ws, separated_list0(char(','), json_value), ws),
                    JValue::Array,
                ),
                char(']'),
            )),
        ),
    )(input)
}

fn member(input: &str) -> Res<'_, (String, JValue)> {
    separated_pair(
        delimited(ws, string, ws),
        cut(char(':')),
        json_value,
    )(input)
}

/// Parse object: {"a": 1}
fn object(input: &str) -> Res<'_, JValue> {
    context(
        "object",
        preceded(
            char('{'),
            cut(terminated(
                map(
                    delimited(ws, separated_list0(char(','), member), ws),
                    |members| {
                        let mut map = JObject::with_capacity(members.len());
                        for (k, v) in members {
                            map.insert(k, v);
                        }
                        JValue::Object(map)
                    },
                ),
                char('}'),
            )),
        ),
    )(input)
}

/// Parse any value with optional surrounding whitespace
fn json_value(input: &str) -> Res<'_, JValue> {
    delimited(
        ws,
        alt((
            object,
            array,
            map(string, JValue::Str),
            number,
            literal,
        )),
        ws,
    )(input)
}

/// Parses a complete strict-JSON document.
pub fn parse_strict(text: &str) -> Result<JValue, ParseError> {
    match json_value(text) {
        Ok(("", value)) => Ok(value),
        Ok((rest, _)) => Err(ParseError::at(
            text,
            text.len() - rest.len(),
            "unexpected trailing characters",
        )),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let (at, kind) = e
                .errors
                .first()
                .map(|(rest, kind)| (text.len() - rest.len(), kind.clone()))
                .unwrap_or((0, VerboseErrorKind::Context("value")));
            let message = match kind {
                VerboseErrorKind::Context(what) => format!("invalid {what}"),
                VerboseErrorKind::Char(c) => format!("expected '{c}'"),
                VerboseErrorKind::Nom(kind) => format!("unexpected input ({kind:?})"),
            };
            Err(ParseError::at(text, at, message))
        }
        Err(nom::Err::Incomplete(_)) => {
            Err(ParseError::at(text, text.len(), "unexpected end of input"))
        }
    }
}
