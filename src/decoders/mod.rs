//! Stream filters needed to read document structure.
//!
//! Cross-reference streams and object streams are almost always
//! FlateDecode-compressed, usually with a PNG predictor on top. Those are
//! the only filters this crate decodes; page content streams are copied
//! byte-for-byte and never decoded.

use crate::error::{Error, Result};

mod flate;
mod predictor;

pub use flate::{flate_encode, FlateDecoder};
pub use predictor::{decode_predictor, DecodeParams};

/// Upper bound on decoded stream size (decompression bomb protection).
const MAX_DECODED_SIZE: usize = 100 * 1024 * 1024;

/// A single PDF stream filter.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Filter name as it appears in a `/Filter` entry.
    fn name(&self) -> &str;
}

fn decoder_for(filter: &str) -> Result<Box<dyn StreamDecoder>> {
    match filter {
        "FlateDecode" | "Fl" => Ok(Box::new(FlateDecoder)),
        other => Err(Error::UnsupportedFilter(other.to_string())),
    }
}

/// Apply `filters` in order, then the predictor described by `params`.
pub fn decode_stream(data: &[u8], filters: &[String], params: Option<&DecodeParams>) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for filter in filters {
        let decoder = decoder_for(filter)?;
        current = decoder.decode(&current)?;
        log::debug!("{}: {} -> {} bytes", decoder.name(), data.len(), current.len());

        if current.len() > MAX_DECODED_SIZE {
            return Err(Error::Decode(format!(
                "decoded size {} bytes exceeds limit {} bytes",
                current.len(),
                MAX_DECODED_SIZE
            )));
        }
    }

    match params {
        Some(params) if params.predictor != 1 => decode_predictor(&current, params),
        _ => Ok(current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_stream_no_filters() {
        assert_eq!(decode_stream(b"Hello", &[], None).unwrap(), b"Hello");
    }

    #[test]
    fn test_decode_stream_unsupported_filter() {
        match decode_stream(b"test", &["LZWDecode".to_string()], None) {
            Err(Error::UnsupportedFilter(name)) => assert_eq!(name, "LZWDecode"),
            other => panic!("Expected UnsupportedFilter error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_stream_flate_with_predictor() {
        // Two rows of three bytes, PNG Up on the second row
        let raw = vec![0, 1, 2, 3, 2, 1, 1, 1];
        let compressed = flate_encode(&raw).unwrap();
        let params = DecodeParams {
            predictor: 12,
            columns: 3,
            ..Default::default()
        };
        let decoded = decode_stream(&compressed, &["FlateDecode".to_string()], Some(&params)).unwrap();
        assert_eq!(decoded, vec![1, 2, 3, 2, 3, 4]);
    }
}
