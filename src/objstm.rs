//! Object streams (`/Type /ObjStm`).
//!
//! A compressed object stream starts with `/N` pairs of integers
//! (object number, offset relative to `/First`) followed by the objects
//! themselves, without `obj`/`endobj` wrappers.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::parse_object;
use std::collections::HashMap;

/// Parse every object in an object stream, keyed by object number.
///
/// Objects that fail to parse are skipped with a warning; the others are
/// still returned.
pub fn parse_object_stream(stream_obj: &Object) -> Result<HashMap<u32, Object>> {
    if !stream_obj.has_type("ObjStm") {
        return Err(Error::InvalidObjectType {
            expected: "ObjStm".to_string(),
            found: stream_obj.type_name().to_string(),
        });
    }
    let dict = stream_obj.as_dict().ok_or(Error::InvalidXref)?;

    let count = dict
        .get("N")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("object stream missing /N".to_string()))?;
    let first = dict
        .get("First")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("object stream missing /First".to_string()))?;
    let (count, first) = (count.max(0) as usize, first.max(0) as usize);

    let data = stream_obj.decode_stream_data()?;
    if data.len() < first {
        return Err(Error::InvalidPdf(format!(
            "object stream data too short: {} bytes, /First is {}",
            data.len(),
            first
        )));
    }

    let pairs = parse_pairs(&data[..first], count)?;
    let body = &data[first..];
    let mut objects = HashMap::with_capacity(pairs.len());

    for (id, offset) in pairs {
        let Some(slice) = body.get(offset..) else {
            log::warn!("Object {} offset {} is beyond object stream data", id, offset);
            continue;
        };
        match parse_object(slice) {
            Ok((_, obj)) => {
                objects.insert(id, obj);
            },
            Err(e) => log::warn!("Failed to parse object {} in object stream: {:?}", id, e),
        }
    }

    Ok(objects)
}

fn parse_pairs(mut data: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut pairs = Vec::with_capacity(count.min(data.len() / 4 + 1));
    let mut next_int = |data: &mut &[u8]| -> Option<i64> {
        match token(data) {
            Ok((rest, Token::Integer(n))) => {
                *data = rest;
                Some(n)
            },
            _ => None,
        }
    };

    for i in 0..count {
        let id = next_int(&mut data).and_then(|n| u32::try_from(n).ok());
        let offset = next_int(&mut data).and_then(|n| usize::try_from(n).ok());
        match (id, offset) {
            (Some(id), Some(offset)) => pairs.push((id, offset)),
            _ => {
                return Err(Error::ParseError {
                    offset: 0,
                    reason: format!("bad object stream header at pair {}", i),
                })
            },
        }
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::flate_encode;

    fn objstm(n: i64, first: i64, body: &[u8], compress: bool) -> Object {
        let mut dict = HashMap::new();
        dict.insert("Type".to_string(), Object::name("ObjStm"));
        dict.insert("N".to_string(), Object::Integer(n));
        dict.insert("First".to_string(), Object::Integer(first));
        let data = if compress {
            dict.insert("Filter".to_string(), Object::name("FlateDecode"));
            flate_encode(body).unwrap()
        } else {
            body.to_vec()
        };
        Object::stream(dict, data)
    }

    #[test]
    fn test_parse_object_stream() {
        let header = b"10 0 11 17 ";
        let body = b"<< /Type /Page >> [1 2 3]";
        let mut data = header.to_vec();
        data.extend_from_slice(body);

        let objects = parse_object_stream(&objstm(2, header.len() as i64, &data, true)).unwrap();
        assert!(objects[&10].has_type("Page"));
        assert_eq!(objects[&11].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_offset_past_end_is_skipped() {
        let data = b"5 0 6 999 42";
        let objects = parse_object_stream(&objstm(2, 10, data, false)).unwrap();
        assert_eq!(objects[&5], Object::Integer(42));
        assert!(!objects.contains_key(&6));
    }

    #[test]
    fn test_not_an_object_stream() {
        let obj = Object::stream(HashMap::new(), &b""[..]);
        assert!(parse_object_stream(&obj).is_err());
    }

    #[test]
    fn test_bad_header() {
        assert!(parse_object_stream(&objstm(2, 4, b"1 0 x", false)).is_err());
    }

    #[test]
    fn test_first_beyond_data() {
        assert!(parse_object_stream(&objstm(1, 100, b"1 0 7", false)).is_err());
    }
}
