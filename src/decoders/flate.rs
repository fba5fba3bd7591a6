//! FlateDecode (zlib/deflate) via flate2.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// FlateDecode filter.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => return Ok(output),
            Err(e) if !output.is_empty() => {
                log::warn!("FlateDecode partial recovery: {} bytes before error: {}", output.len(), e);
                return Ok(output);
            },
            Err(e) => log::debug!("Zlib decode failed ({}), trying raw deflate", e),
        }

        // Some writers emit raw deflate data without the zlib wrapper
        output.clear();
        match DeflateDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => Ok(output),
            Err(_) if !output.is_empty() => Ok(output),
            Err(e) => Err(Error::Decode(format!("FlateDecode failed: {}", e))),
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

/// Compress `data` with zlib at the default level.
pub fn flate_encode(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flate_round_trip() {
        let text = b"q 1 0 0 1 0 0 cm /SigOverlay1 Do Q".repeat(20);
        let compressed = flate_encode(&text).unwrap();
        assert!(compressed.len() < text.len());
        assert_eq!(FlateDecoder.decode(&compressed).unwrap(), text);
    }

    #[test]
    fn test_raw_deflate_fallback() {
        let mut encoder = flate2::write::DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"raw deflate").unwrap();
        let raw = encoder.finish().unwrap();
        assert_eq!(FlateDecoder.decode(&raw).unwrap(), b"raw deflate");
    }

    #[test]
    fn test_garbage_fails() {
        assert!(FlateDecoder.decode(&[0xFF, 0xFF, 0xFF, 0xFF]).is_err());
    }
}
