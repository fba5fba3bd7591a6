//! PDF object types.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Dictionary type shared by dictionary and stream objects.
pub type Dictionary = HashMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (byte array)
    String(Vec<u8>),
    /// Name (starting with /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dictionary),
    /// Stream (dictionary + raw, still-encoded data)
    Stream {
        /// Stream dictionary
        dict: Dictionary,
        /// Stream data
        data: bytes::Bytes,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl Object {
    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Create a name object.
    pub fn name(name: impl Into<String>) -> Self {
        Object::Name(name.into())
    }

    /// Create a reference object.
    pub fn reference(id: u32) -> Self {
        Object::Reference(ObjectRef::new(id, 0))
    }

    /// Create a stream object whose /Length is filled in on serialization.
    pub fn stream(dict: Dictionary, data: impl Into<bytes::Bytes>) -> Self {
        Object::Stream {
            dict,
            data: data.into(),
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to cast to a number (integer or real).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Mutable dictionary access. Works for both Dictionary and Stream objects.
    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Check whether a dictionary or stream has the given /Type.
    pub fn has_type(&self, type_name: &str) -> bool {
        self.as_dict()
            .and_then(|d| d.get("Type"))
            .and_then(|t| t.as_name())
            == Some(type_name)
    }

    /// Decode stream data using the filters named in the stream dictionary.
    ///
    /// Only the filters needed to read document structure are supported
    /// (see [`crate::decoders`]); page content is never decoded.
    pub fn decode_stream_data(&self) -> Result<Vec<u8>> {
        match self {
            Object::Stream { dict, data } => {
                let filters = dict
                    .get("Filter")
                    .map(extract_filter_names)
                    .unwrap_or_default();

                if filters.is_empty() {
                    return Ok(data.to_vec());
                }

                let params = extract_decode_params(dict.get("DecodeParms"))?;
                crate::decoders::decode_stream(data, &filters, params.as_ref())
            },
            _ => Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: self.type_name().to_string(),
            }),
        }
    }
}

/// Extract filter names from a Filter object (single name or array).
fn extract_filter_names(filter_obj: &Object) -> Vec<String> {
    match filter_obj {
        Object::Name(name) => vec![name.clone()],
        Object::Array(arr) => arr
            .iter()
            .filter_map(|obj| obj.as_name().map(|s| s.to_string()))
            .collect(),
        _ => vec![],
    }
}

/// Extract predictor parameters from a DecodeParms object.
fn extract_decode_params(params_obj: Option<&Object>) -> Result<Option<crate::decoders::DecodeParams>> {
    let dict = match params_obj {
        Some(Object::Dictionary(d)) => d,
        Some(Object::Array(arr)) => match arr.iter().find_map(|obj| obj.as_dict()) {
            Some(d) => d,
            None => return Ok(None),
        },
        _ => return Ok(None),
    };

    let get = |key: &str, default: i64| dict.get(key).and_then(|o| o.as_integer()).unwrap_or(default);
    let predictor = get("Predictor", 1);
    if predictor == 1 {
        return Ok(None);
    }

    crate::decoders::DecodeParams::from_values(
        predictor,
        get("Columns", 1),
        get("Colors", 1),
        get("BitsPerComponent", 8),
    )
    .map(Some)
}

/// Decode a PDF text string (UTF-16BE with BOM, UTF-8 with BOM, or PDFDocEncoding).
pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(&bytes[3..]).into_owned();
    }
    // PDFDocEncoding matches Latin-1 for the printable range we care about
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode a text string for a PDF string object.
///
/// Plain ASCII is written as-is; anything else becomes UTF-16BE with a BOM.
pub fn encode_text_string(text: &str) -> Vec<u8> {
    if text.is_ascii() {
        return text.as_bytes().to_vec();
    }
    let mut out = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_accessors() {
        assert_eq!(Object::Integer(42).as_integer(), Some(42));
        assert_eq!(Object::Integer(42).as_number(), Some(42.0));
        assert_eq!(Object::Real(1.5).as_number(), Some(1.5));
        assert_eq!(Object::name("Type").as_name(), Some("Type"));
        assert!(Object::Null.is_null());
        assert_eq!(Object::String(b"Hi".to_vec()).as_string(), Some(&b"Hi"[..]));
        assert_eq!(Object::reference(7).as_reference(), Some(ObjectRef::new(7, 0)));
    }

    #[test]
    fn test_object_stream_dict_access() {
        let mut dict = HashMap::new();
        dict.insert("Type".to_string(), Object::name("XRef"));
        let mut obj = Object::stream(dict, &b"data"[..]);

        assert!(obj.has_type("XRef"));
        obj.as_dict_mut()
            .unwrap()
            .insert("Size".to_string(), Object::Integer(3));
        assert_eq!(obj.as_dict().unwrap().get("Size").unwrap().as_integer(), Some(3));
    }

    #[test]
    fn test_decode_params_out_of_range() {
        let mut params = HashMap::new();
        params.insert("Predictor".to_string(), Object::Integer(2));
        params.insert("Columns".to_string(), Object::Integer(2_305_843_009_213_693_952));
        let mut dict = HashMap::new();
        dict.insert("Filter".to_string(), Object::name("FlateDecode"));
        dict.insert("DecodeParms".to_string(), Object::Dictionary(params));
        let data = crate::decoders::flate_encode(&[1, 2, 3, 4]).unwrap();

        let stream = Object::stream(dict, data);
        assert!(matches!(stream.decode_stream_data(), Err(Error::Decode(_))));
    }

    #[test]
    fn test_object_ref_display() {
        assert_eq!(format!("{}", ObjectRef::new(10, 0)), "10 0 R");
    }

    #[test]
    fn test_decode_stream_no_filter() {
        let obj = Object::stream(HashMap::new(), &b"Hello"[..]);
        assert_eq!(obj.decode_stream_data().unwrap(), b"Hello");
    }

    #[test]
    fn test_decode_stream_not_a_stream() {
        match Object::Integer(42).decode_stream_data() {
            Err(Error::InvalidObjectType { expected, found }) => {
                assert_eq!(expected, "Stream");
                assert_eq!(found, "Integer");
            },
            other => panic!("Expected InvalidObjectType error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_stream_unknown_filter() {
        let mut dict = HashMap::new();
        dict.insert("Filter".to_string(), Object::name("JBIG2Decode"));
        let obj = Object::stream(dict, &b"xx"[..]);
        assert!(matches!(obj.decode_stream_data(), Err(Error::UnsupportedFilter(_))));
    }

    #[test]
    fn test_extract_filter_names() {
        let filter = Object::Array(vec![Object::name("ASCII85Decode"), Object::name("FlateDecode")]);
        assert_eq!(extract_filter_names(&filter), vec!["ASCII85Decode", "FlateDecode"]);
        assert!(extract_filter_names(&Object::Integer(1)).is_empty());
    }

    #[test]
    fn test_text_string_ascii() {
        assert_eq!(encode_text_string("Alice"), b"Alice");
        assert_eq!(decode_text_string(b"Alice"), "Alice");
    }

    #[test]
    fn test_text_string_unicode() {
        let encoded = encode_text_string("Zoë Ångström");
        assert_eq!(&encoded[..2], &[0xFE, 0xFF]);
        assert_eq!(decode_text_string(&encoded), "Zoë Ångström");
    }

    #[test]
    fn test_text_string_latin1_fallback() {
        assert_eq!(decode_text_string(&[0x43, 0x61, 0x66, 0xE9]), "Café");
    }
}
