//! Tests for object stream parsing (PDF 1.5+ feature).

use pdf_sealer::decoders::flate_encode;
use pdf_sealer::object::Object;
use pdf_sealer::objstm::parse_object_stream;
use std::collections::HashMap;

/// Helper to create an uncompressed object stream.
fn create_test_object_stream(n: i64, first: i64, data: &[u8]) -> Object {
    let mut dict = HashMap::new();
    dict.insert("Type".to_string(), Object::name("ObjStm"));
    dict.insert("N".to_string(), Object::Integer(n));
    dict.insert("First".to_string(), Object::Integer(first));
    dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
    Object::stream(dict, data.to_vec())
}

/// Pairs header followed by the object bodies.
fn stream_data(pairs: &[u8], objects: &[u8]) -> (i64, Vec<u8>) {
    let mut data = pairs.to_vec();
    data.extend_from_slice(objects);
    (pairs.len() as i64, data)
}

#[test]
fn test_parse_object_stream_basic() {
    let (first, data) = stream_data(b"10 0 11 3 ", b"42 /Test");
    let result = parse_object_stream(&create_test_object_stream(2, first, &data)).unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result[&10].as_integer(), Some(42));
    assert_eq!(result[&11].as_name(), Some("Test"));
}

#[test]
fn test_parse_object_stream_multiple_objects() {
    let (first, data) = stream_data(b"10 0 11 2 12 7 13 13 ", b"1 true false null");
    let result = parse_object_stream(&create_test_object_stream(4, first, &data)).unwrap();

    assert_eq!(result.len(), 4);
    assert_eq!(result[&10].as_integer(), Some(1));
    assert_eq!(result[&11], Object::Boolean(true));
    assert_eq!(result[&12], Object::Boolean(false));
    assert!(result[&13].is_null());
}

#[test]
fn test_parse_compressed_object_stream() {
    let (first, data) = stream_data(b"20 0 21 10 ", b"[ 1 2 3 ] << /Type /Page >>");
    let mut dict = HashMap::new();
    dict.insert("Type".to_string(), Object::name("ObjStm"));
    dict.insert("N".to_string(), Object::Integer(2));
    dict.insert("First".to_string(), Object::Integer(first));
    dict.insert("Filter".to_string(), Object::name("FlateDecode"));
    let stream = Object::stream(dict, flate_encode(&data).unwrap());

    let result = parse_object_stream(&stream).unwrap();
    let array = result[&20].as_array().unwrap();
    assert_eq!(array.len(), 3);
    assert_eq!(array[0].as_integer(), Some(1));
    assert!(result[&21].has_type("Page"));
}

#[test]
fn test_parse_object_stream_with_whitespace() {
    let (first, data) = stream_data(b"  10   0   11   3  ", b"42 99");
    let result = parse_object_stream(&create_test_object_stream(2, first, &data)).unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result[&10].as_integer(), Some(42));
    assert_eq!(result[&11].as_integer(), Some(99));
}

#[test]
fn test_parse_object_stream_not_stream() {
    assert!(parse_object_stream(&Object::Integer(42)).is_err());
}

#[test]
fn test_parse_object_stream_missing_n() {
    let mut dict = HashMap::new();
    dict.insert("Type".to_string(), Object::name("ObjStm"));
    dict.insert("First".to_string(), Object::Integer(5));
    let stream = Object::stream(dict, b"1 0 42".to_vec());
    assert!(parse_object_stream(&stream).is_err());
}

#[test]
fn test_parse_object_stream_missing_first() {
    let mut dict = HashMap::new();
    dict.insert("Type".to_string(), Object::name("ObjStm"));
    dict.insert("N".to_string(), Object::Integer(1));
    let stream = Object::stream(dict, b"1 0 42".to_vec());
    assert!(parse_object_stream(&stream).is_err());
}

#[test]
fn test_parse_object_stream_n_too_large() {
    let stream = create_test_object_stream(2_000_000, 5, b"1 0 42");
    assert!(parse_object_stream(&stream).is_err());
}

#[test]
fn test_parse_object_stream_first_beyond_data() {
    let stream = create_test_object_stream(1, 1000, b"1 0 42");
    assert!(parse_object_stream(&stream).is_err());
}

#[test]
fn test_parse_object_stream_strings() {
    let (first, data) = stream_data(b"30 0 31 13 ", b"(Hello World) <48656C6C6F>");
    let result = parse_object_stream(&create_test_object_stream(2, first, &data)).unwrap();

    assert_eq!(result[&30].as_string(), Some(&b"Hello World"[..]));
    assert_eq!(result[&31].as_string(), Some(&b"Hello"[..]));
}

#[test]
fn test_parse_object_stream_nested_structures() {
    let (first, data) = stream_data(b"40 0 ", b"<< /Array [ 1 [ 2 3 ] ] /Dict << /Nested true >> >>");
    let result = parse_object_stream(&create_test_object_stream(1, first, &data)).unwrap();

    let dict = result[&40].as_dict().unwrap();
    assert_eq!(dict["Array"].as_array().unwrap().len(), 2);
    assert_eq!(dict["Dict"].as_dict().unwrap()["Nested"], Object::Boolean(true));
}

#[test]
fn test_parse_object_stream_empty() {
    let result = parse_object_stream(&create_test_object_stream(0, 0, b"")).unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_parse_object_stream_references() {
    let (first, data) = stream_data(b"50 0 ", b"[ 10 0 R 20 0 R ]");
    let result = parse_object_stream(&create_test_object_stream(1, first, &data)).unwrap();

    let array = result[&50].as_array().unwrap();
    assert_eq!(array[0].as_reference().map(|r| r.id), Some(10));
    assert_eq!(array[1].as_reference().map(|r| r.id), Some(20));
}

#[test]
fn test_parse_object_stream_graceful_failure() {
    // The second object is malformed (unclosed arrays)
    let (first, data) = stream_data(b"60 0 61 5 ", b"true [[[[[");
    let result = parse_object_stream(&create_test_object_stream(2, first, &data)).unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result[&60], Object::Boolean(true));
    assert!(!result.contains_key(&61));
}
