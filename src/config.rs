//! Signer configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Smallest RSA modulus accepted for generated or loaded keys.
pub const MIN_KEY_BITS: usize = 2048;

/// Settings shared by certificate generation, signing and verification.
///
/// Every field has a default, so a JSON file only needs the keys it changes:
///
/// ```
/// use pdf_sealer::SignerConfig;
///
/// let config: SignerConfig = serde_json::from_str(r#"{ "key_bits": 3072 }"#).unwrap();
/// assert_eq!(config.key_bits, 3072);
/// assert_eq!(config.producer, "PDF Sealer Digital Signature");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Written to `/Creator` of signed documents.
    pub creator: String,

    /// Written to `/Producer` of signed documents; verification compares
    /// against it.
    pub producer: String,

    /// RSA modulus size for generated keys.
    pub key_bits: usize,

    /// Overlay anchor used when the caller gives no position.
    pub default_position: (f64, f64),

    /// Certificate lifetime in years.
    pub validity_years: u32,

    /// Flate-compress the overlay content stream.
    pub compress_overlay: bool,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SignerConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self {
            creator: "PDF Sealer".to_string(),
            producer: "PDF Sealer Digital Signature".to_string(),
            key_bits: MIN_KEY_BITS,
            default_position: (400.0, 50.0),
            validity_years: 1,
            compress_overlay: false,
        }
    }

    /// Read a JSON configuration file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            Error::InvalidInput(format!("bad configuration {}: {}", path.as_ref().display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values can be used.
    pub fn validate(&self) -> Result<()> {
        if self.key_bits < MIN_KEY_BITS {
            return Err(Error::InvalidInput(format!(
                "key_bits must be at least {}, got {}",
                MIN_KEY_BITS, self.key_bits
            )));
        }
        if self.validity_years == 0 {
            return Err(Error::InvalidInput("validity_years must be at least 1".to_string()));
        }
        if self.producer.is_empty() {
            return Err(Error::InvalidInput("producer must not be empty".to_string()));
        }
        let (x, y) = self.default_position;
        if !x.is_finite() || !y.is_finite() {
            return Err(Error::InvalidInput("default_position must be finite".to_string()));
        }
        Ok(())
    }

    /// Set the `/Creator` string.
    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = creator.into();
        self
    }

    /// Set the `/Producer` string.
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }

    /// Set the RSA key size.
    pub fn with_key_bits(mut self, bits: usize) -> Self {
        self.key_bits = bits;
        self
    }

    /// Set the default overlay anchor.
    pub fn with_default_position(mut self, x: f64, y: f64) -> Self {
        self.default_position = (x, y);
        self
    }

    /// Set the certificate lifetime.
    pub fn with_validity_years(mut self, years: u32) -> Self {
        self.validity_years = years;
        self
    }

    /// Enable or disable overlay compression.
    pub fn with_compress_overlay(mut self, compress: bool) -> Self {
        self.compress_overlay = compress;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SignerConfig::default();
        assert_eq!(config.creator, "PDF Sealer");
        assert_eq!(config.key_bits, 2048);
        assert_eq!(config.default_position, (400.0, 50.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SignerConfig::new()
            .with_producer("Acme Signer")
            .with_key_bits(4096)
            .with_default_position(10.0, 20.0)
            .with_compress_overlay(true);
        assert_eq!(config.producer, "Acme Signer");
        assert_eq!(config.key_bits, 4096);
        assert_eq!(config.default_position, (10.0, 20.0));
        assert!(config.compress_overlay);
    }

    #[test]
    fn test_validate_rejects_small_keys() {
        let err = SignerConfig::new().with_key_bits(1024).validate().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Input);
        assert!(SignerConfig::new().with_validity_years(0).validate().is_err());
        assert!(SignerConfig::new().with_default_position(f64::NAN, 0.0).validate().is_err());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "creator": "Desk", "default_position": [100.0, 700.0] }}"#).unwrap();

        let config = SignerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.creator, "Desk");
        assert_eq!(config.default_position, (100.0, 700.0));
        assert_eq!(config.producer, "PDF Sealer Digital Signature");
    }

    #[test]
    fn test_from_json_file_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "key_bits": 512 }}"#).unwrap();
        assert!(SignerConfig::from_json_file(file.path()).is_err());

        let mut broken = tempfile::NamedTempFile::new().unwrap();
        writeln!(broken, "not json").unwrap();
        assert!(matches!(
            SignerConfig::from_json_file(broken.path()),
            Err(Error::InvalidInput(_))
        ));
    }
}
