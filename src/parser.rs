//! PDF object parser.
//!
//! Recursive descent over lexer tokens: primitives, arrays, dictionaries,
//! references, streams and `N G obj ... endobj` wrappers.
//!
//! Stream lengths are frequently stored as indirect objects (`/Length 12 0 R`).
//! Callers that can resolve those pass a [`LengthResolver`]; when no length is
//! known, or the declared length does not land on `endstream`, the data is
//! delimited by scanning for the `endstream` keyword instead.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dictionary, Object, ObjectRef};
use nom::IResult;
use std::collections::HashMap;

/// Looks up the integer value of an indirect `/Length` reference.
pub type LengthResolver<'r> = &'r dyn Fn(ObjectRef) -> Option<usize>;

/// Maximum array/dictionary nesting before parsing is abandoned.
pub const MAX_NESTING: u32 = 64;

fn no_lengths(_: ObjectRef) -> Option<usize> {
    None
}

fn fail(input: &[u8], kind: nom::error::ErrorKind) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, kind))
}

/// Decode escape sequences in a literal string body.
///
/// Handles `\n \r \t \b \f \( \) \\`, 1-3 digit octal escapes and
/// backslash-newline continuations. Unknown escapes drop the backslash.
///
/// ```
/// # use pdf_sealer::parser::decode_literal_string_escapes;
/// assert_eq!(decode_literal_string_escapes(b"a\\(b\\)\\101"), b"a(b)A");
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        let c = raw[i];
        if c != b'\\' || i + 1 >= raw.len() {
            out.push(c);
            i += 1;
            continue;
        }

        let next = raw[i + 1];
        i += 2;
        match next {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'\n' => {},
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut value = (next - b'0') as u32;
                let mut digits = 1;
                while digits < 3 {
                    match raw.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + (d - b'0') as u32;
                            i += 1;
                            digits += 1;
                        },
                        _ => break,
                    }
                }
                out.push((value & 0xFF) as u8);
            },
            other => out.push(other),
        }
    }

    out
}

/// Decode a hex string body; whitespace is ignored and an odd final digit
/// is padded with 0.
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = hex_bytes
        .iter()
        .copied()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let nibble = |c: u8| -> Result<u8> {
        (c as char)
            .to_digit(16)
            .map(|d| d as u8)
            .ok_or_else(|| Error::ParseError {
                offset: 0,
                reason: format!("Invalid hex digit '{}'", c as char),
            })
    };

    digits
        .chunks(2)
        .map(|pair| {
            let high = nibble(pair[0])?;
            let low = match pair.get(1) {
                Some(&c) => nibble(c)?,
                None => 0,
            };
            Ok(high << 4 | low)
        })
        .collect()
}

/// Parse a single object, delimiting streams by `/Length` when it is a
/// direct integer and by scanning otherwise.
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    parse_value(input, &no_lengths, 0)
}

/// Parse a single object, resolving indirect stream lengths through `resolve`.
pub fn parse_object_with<'a>(input: &'a [u8], resolve: LengthResolver<'_>) -> IResult<&'a [u8], Object> {
    parse_value(input, resolve, 0)
}

fn parse_value<'a>(input: &'a [u8], resolve: LengthResolver<'_>, depth: u32) -> IResult<&'a [u8], Object> {
    if depth > MAX_NESTING {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TooLarge,
        )));
    }

    let (rest, tok) = token(input)?;

    match tok {
        Token::Null => Ok((rest, Object::Null)),
        Token::True => Ok((rest, Object::Boolean(true))),
        Token::False => Ok((rest, Object::Boolean(false))),
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::Name(name) => Ok((rest, Object::Name(name))),

        Token::Integer(i) => {
            // "id gen R" is a reference; anything else leaves the integer alone
            if let Ok((after_gen, Token::Integer(gen))) = token(rest) {
                if let Ok((after_r, Token::R)) = token(after_gen) {
                    if let (Ok(id), Ok(gen)) = (u32::try_from(i), u16::try_from(gen)) {
                        return Ok((after_r, Object::Reference(ObjectRef::new(id, gen))));
                    }
                }
            }
            Ok((rest, Object::Integer(i)))
        },

        Token::LiteralString(raw) => Ok((rest, Object::String(decode_literal_string_escapes(raw)))),

        Token::HexString(raw) => match decode_hex(raw) {
            Ok(bytes) => Ok((rest, Object::String(bytes))),
            Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::HexDigit,
            ))),
        },

        Token::ArrayStart => parse_array(rest, resolve, depth + 1),

        Token::DictStart => {
            let (rest, dict) = parse_dictionary(rest, resolve, depth + 1)?;
            match token(rest) {
                Ok((stream_input, Token::StreamStart)) => {
                    let (rest, data) = parse_stream_data(stream_input, &dict, resolve)?;
                    Ok((rest, Object::stream(dict, data)))
                },
                _ => Ok((rest, Object::Dictionary(dict))),
            }
        },

        _ => Err(fail(input, nom::error::ErrorKind::Tag)),
    }
}

fn parse_array<'a>(input: &'a [u8], resolve: LengthResolver<'_>, depth: u32) -> IResult<&'a [u8], Object> {
    let mut items = Vec::new();
    let mut remaining = input;

    loop {
        if let Ok((rest, Token::ArrayEnd)) = token(remaining) {
            return Ok((rest, Object::Array(items)));
        }
        let (rest, item) = parse_value(remaining, resolve, depth)?;
        items.push(item);
        remaining = rest;
    }
}

fn parse_dictionary<'a>(
    input: &'a [u8],
    resolve: LengthResolver<'_>,
    depth: u32,
) -> IResult<&'a [u8], Dictionary> {
    let mut dict = HashMap::new();
    let mut remaining = input;

    loop {
        let (rest, tok) = token(remaining)?;
        match tok {
            Token::DictEnd => return Ok((rest, dict)),
            Token::Name(key) => {
                let (rest, value) = parse_value(rest, resolve, depth)?;
                // A null value is equivalent to the key being absent
                if !value.is_null() {
                    dict.insert(key, value);
                }
                remaining = rest;
            },
            _ => return Err(fail(remaining, nom::error::ErrorKind::Tag)),
        }
    }
}

/// Read the bytes between `stream` and `endstream`.
fn parse_stream_data<'a>(
    input: &'a [u8],
    dict: &Dictionary,
    resolve: LengthResolver<'_>,
) -> IResult<&'a [u8], Vec<u8>> {
    let body = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        input
    };

    let declared = match dict.get("Length") {
        Some(Object::Integer(n)) => usize::try_from(*n).ok(),
        Some(Object::Reference(r)) => resolve(*r),
        _ => None,
    };

    if let Some(length) = declared.filter(|&len| len <= body.len()) {
        if let Ok((rest, Token::StreamEnd)) = token(&body[length..]) {
            return Ok((rest, body[..length].to_vec()));
        }
        log::debug!("Stream /Length {} does not reach endstream, scanning", length);
    }

    let pos = find_endstream(body).ok_or_else(|| fail(input, nom::error::ErrorKind::Eof))?;
    let mut data = &body[..pos];
    if data.ends_with(b"\r\n") {
        data = &data[..data.len() - 2];
    } else if data.ends_with(b"\n") || data.ends_with(b"\r") {
        data = &data[..data.len() - 1];
    }
    let rest = &body[pos + b"endstream".len()..];
    Ok((rest, data.to_vec()))
}

fn find_endstream(input: &[u8]) -> Option<usize> {
    let keyword = b"endstream";
    input.windows(keyword.len()).position(|window| window == keyword)
}

/// Parse `id gen obj <object> endobj`; a missing `endobj` is tolerated.
pub fn parse_indirect_object<'a>(
    input: &'a [u8],
    resolve: LengthResolver<'_>,
) -> IResult<&'a [u8], (ObjectRef, Object)> {
    let (rest, id) = match token(input)? {
        (rest, Token::Integer(id)) => (rest, id),
        _ => return Err(fail(input, nom::error::ErrorKind::Digit)),
    };
    let (rest, gen) = match token(rest)? {
        (rest, Token::Integer(gen)) => (rest, gen),
        _ => return Err(fail(input, nom::error::ErrorKind::Digit)),
    };
    let (rest, _) = match token(rest)? {
        (rest, Token::ObjStart) => (rest, ()),
        _ => return Err(fail(input, nom::error::ErrorKind::Tag)),
    };

    let id = u32::try_from(id).map_err(|_| fail(input, nom::error::ErrorKind::Digit))?;
    let gen = u16::try_from(gen).map_err(|_| fail(input, nom::error::ErrorKind::Digit))?;

    let (rest, object) = parse_value(rest, resolve, 0)?;
    let rest = match token(rest) {
        Ok((after, Token::ObjEnd)) => after,
        _ => rest,
    };

    Ok((rest, (ObjectRef::new(id, gen), object)))
}

/// Parse the indirect object starting at `offset` in `data`.
pub fn parse_indirect_at(data: &[u8], offset: usize, resolve: LengthResolver<'_>) -> Result<(ObjectRef, Object)> {
    let input = data.get(offset..).ok_or_else(|| Error::ParseError {
        offset,
        reason: format!("offset beyond end of file ({} bytes)", data.len()),
    })?;

    match parse_indirect_object(input, resolve) {
        Ok((_, parsed)) => Ok(parsed),
        Err(nom::Err::Failure(e)) if e.code == nom::error::ErrorKind::TooLarge => {
            Err(Error::RecursionLimitExceeded(MAX_NESTING))
        },
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(Error::ParseError {
            offset: offset + (input.len() - e.input.len()),
            reason: format!("{:?}", e.code),
        }),
        Err(nom::Err::Incomplete(_)) => Err(Error::ParseError {
            offset,
            reason: "unexpected end of input".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> Object {
        parse_object(input).unwrap().1
    }

    #[test]
    fn test_parse_primitives() {
        assert_eq!(parse(b"null"), Object::Null);
        assert_eq!(parse(b"true"), Object::Boolean(true));
        assert_eq!(parse(b"42"), Object::Integer(42));
        assert_eq!(parse(b"1.5"), Object::Real(1.5));
        assert_eq!(parse(b"/Page"), Object::name("Page"));
        assert_eq!(parse(b"<48656C6C6F>"), Object::String(b"Hello".to_vec()));
        assert_eq!(parse(b"(Hi\\nthere)"), Object::String(b"Hi\nthere".to_vec()));
    }

    #[test]
    fn test_parse_reference_vs_integers() {
        assert_eq!(parse(b"10 0 R"), Object::Reference(ObjectRef::new(10, 0)));
        assert_eq!(
            parse(b"[1 2 3]"),
            Object::Array(vec![Object::Integer(1), Object::Integer(2), Object::Integer(3)])
        );
        assert_eq!(
            parse(b"[1 0 R 2]"),
            Object::Array(vec![Object::reference(1), Object::Integer(2)])
        );
    }

    #[test]
    fn test_parse_dictionary() {
        let obj = parse(b"<< /Type /Page /Kids [3 0 R] /Missing null /Nested << /A 1 >> >>");
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("Type").unwrap().as_name(), Some("Page"));
        assert!(dict.get("Missing").is_none());
        assert!(dict.get("Nested").unwrap().as_dict().is_some());
    }

    #[test]
    fn test_parse_unclosed_dictionary_fails() {
        assert!(parse_object(b"<< /Type /Page").is_err());
        assert!(parse_object(b"<< 1 2 >>").is_err());
    }

    #[test]
    fn test_parse_stream_with_direct_length() {
        let (rest, obj) = parse_object(b"<< /Length 5 >>\nstream\nHello\nendstream rest").unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"Hello"),
            other => panic!("expected stream, got {:?}", other),
        }
        assert_eq!(rest, b" rest");
    }

    #[test]
    fn test_parse_stream_with_wrong_length_scans() {
        let (_, obj) = parse_object(b"<< /Length 99 >>\r\nstream\r\nabc\r\nendstream").unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"abc"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_stream_with_indirect_length() {
        let resolve = |r: ObjectRef| if r.id == 9 { Some(9) } else { None };
        let input = b"<< /Length 9 0 R >>\nstream\nendstreamendstream";
        let (_, obj) = parse_object_with(input, &resolve).unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"endstream"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_indirect_object() {
        let (_, (r, obj)) =
            parse_indirect_object(b"7 0 obj\n<< /Type /Catalog >>\nendobj\n", &no_lengths).unwrap();
        assert_eq!(r, ObjectRef::new(7, 0));
        assert!(obj.has_type("Catalog"));
    }

    #[test]
    fn test_parse_indirect_at_reports_offset() {
        let data = b"%PDF-1.4\ngarbage";
        match parse_indirect_at(data, 9, &no_lengths) {
            Err(Error::ParseError { offset, .. }) => assert_eq!(offset, 9),
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(parse_indirect_at(data, 500, &no_lengths).is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let mut input = Vec::new();
        input.extend_from_slice(b"1 0 obj ");
        input.extend(std::iter::repeat(b'[').take(200));
        input.extend(std::iter::repeat(b']').take(200));
        assert!(matches!(
            parse_indirect_at(&input, 0, &no_lengths),
            Err(Error::RecursionLimitExceeded(_))
        ));
    }

    #[test]
    fn test_decode_literal_escapes() {
        assert_eq!(decode_literal_string_escapes(b"\\247"), vec![0xA7]);
        assert_eq!(decode_literal_string_escapes(b"a\\\nb"), b"ab");
        assert_eq!(decode_literal_string_escapes(b"\\q"), b"q");
        assert_eq!(decode_literal_string_escapes(b"\\\\"), b"\\");
    }

    #[test]
    fn test_decode_hex_odd_length() {
        assert_eq!(decode_hex(b"7").unwrap(), vec![0x70]);
        assert_eq!(decode_hex(b"").unwrap(), Vec::<u8>::new());
        assert!(decode_hex(b"zz").is_err());
    }
}
